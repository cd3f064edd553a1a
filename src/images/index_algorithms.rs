// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Index and primitive catalogs, plus index generation for grids.

[`Index`] and [`Primitive`] map the abstract index widths and primitive topologies onto
the native enums.  [`IndexGenerator`] produces a triangle list for a 2D grid of vertices.

# Example

```
use stages_and_passes::images::index_algorithms::{IndexGenerator, Primitive};

// A 3x3 grid of vertices has 2x2 cells, each split into two triangles.
let generator = IndexGenerator::new(3, 3);
assert_eq!(generator.num_triangles(), 8);
assert_eq!(generator.num_indices(), 24);
assert_eq!(Primitive::Triangles.primitive_count(generator.num_indices() as u32), 8);
```
*/

use crate::images::caps::Caps;
use crate::imp::gl;
use std::sync::Arc;

/// Width of one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
    U8,
    U16,
    /// Requires `OES_element_index_uint`.
    U32,
}

impl Index {
    pub const fn byte_size(self) -> u32 {
        match self {
            Index::U8 => 1,
            Index::U16 => 2,
            Index::U32 => 4,
        }
    }

    pub const fn native_type(self) -> u32 {
        match self {
            Index::U8 => gl::UNSIGNED_BYTE,
            Index::U16 => gl::UNSIGNED_SHORT,
            Index::U32 => gl::UNSIGNED_INT,
        }
    }

    pub fn supported(self, caps: &Caps) -> bool {
        self != Index::U32 || caps.index32
    }

    /// The narrowest index able to address `vertex_count` vertices.
    pub fn for_vertex_count(vertex_count: usize) -> Index {
        if vertex_count <= u8::MAX as usize + 1 {
            Index::U8
        } else if vertex_count <= u16::MAX as usize + 1 {
            Index::U16
        } else {
            Index::U32
        }
    }
}

/// CPU-side index data.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexData {
    U8(Arc<[u8]>),
    U16(Arc<[u16]>),
    U32(Arc<[u32]>),
}

impl IndexData {
    pub fn index(&self) -> Index {
        match self {
            IndexData::U8(_) => Index::U8,
            IndexData::U16(_) => Index::U16,
            IndexData::U32(_) => Index::U32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexData::U8(v) => v.len(),
            IndexData::U16(v) => v.len(),
            IndexData::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Largest index referenced.
    pub fn max_index(&self) -> Option<u32> {
        match self {
            IndexData::U8(v) => v.iter().max().map(|i| *i as u32),
            IndexData::U16(v) => v.iter().max().map(|i| *i as u32),
            IndexData::U32(v) => v.iter().max().copied(),
        }
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        match self {
            IndexData::U8(v) => v.to_vec(),
            IndexData::U16(v) => v.iter().flat_map(|i| i.to_ne_bytes()).collect(),
            IndexData::U32(v) => v.iter().flat_map(|i| i.to_ne_bytes()).collect(),
        }
    }
}

/// How vertices assemble into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Primitive {
    pub const fn native_mode(self) -> u32 {
        match self {
            Primitive::Points => gl::POINTS,
            Primitive::Lines => gl::LINES,
            Primitive::LineStrip => gl::LINE_STRIP,
            Primitive::LineLoop => gl::LINE_LOOP,
            Primitive::Triangles => gl::TRIANGLES,
            Primitive::TriangleStrip => gl::TRIANGLE_STRIP,
            Primitive::TriangleFan => gl::TRIANGLE_FAN,
        }
    }

    /// Number of primitives drawn from `count` vertices (or indices).
    pub const fn primitive_count(self, count: u32) -> u32 {
        match self {
            Primitive::Points => count,
            Primitive::Lines => count / 2,
            Primitive::LineStrip => count.saturating_sub(1),
            Primitive::LineLoop => {
                if count < 2 {
                    0
                } else {
                    count
                }
            }
            Primitive::Triangles => count / 3,
            Primitive::TriangleStrip | Primitive::TriangleFan => count.saturating_sub(2),
        }
    }
}

const VERTEX_PER_TRIANGLE: usize = 3;
const TRIANGLES_PER_CELL: usize = 2;
const VERTEX_PER_CELL: usize = VERTEX_PER_TRIANGLE * TRIANGLES_PER_CELL;

/**
Generates a triangle list for a grid of vertices.

Vertices are in row-major order with an upper-left origin.  Each cell becomes two
triangles with counter-clockwise winding:

```text
top_left ────── top_right
    │  ╲    2  ╱ │
    │ 1 ╲    ╱   │
    │    ╲  ╱    │
bottom_left ── bottom_right
```

- Triangle 1: (top_left, bottom_left, top_right)
- Triangle 2: (top_right, bottom_left, bottom_right)
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexGenerator {
    width: usize,
    height: usize,
}

impl IndexGenerator {
    /// `width` and `height` count vertices and must both exceed 1.
    ///
    /// # Panics
    /// Panics on a degenerate grid.
    pub fn new(width: usize, height: usize) -> Self {
        assert!(width > 1 && height > 1, "Invalid geometry");
        Self { width, height }
    }

    pub fn num_indices(&self) -> usize {
        self.num_triangles() * VERTEX_PER_TRIANGLE
    }

    pub fn num_triangles(&self) -> usize {
        (self.width - 1) * (self.height - 1) * TRIANGLES_PER_CELL
    }

    /**
    The vertex referenced at `buffer_pos` in the index list.

    ```
    use stages_and_passes::images::index_algorithms::IndexGenerator;
    // 0 - 1 - 2
    // 3 - 4 - 5
    // 6 - 7 - 8
    let generator = IndexGenerator::new(3, 3);
    let first_cell: Vec<usize> = (0..6).map(|i| generator.index_for(i)).collect();
    assert_eq!(first_cell, [0, 3, 1, 1, 3, 4]);
    ```
    */
    pub fn index_for(&self, buffer_pos: usize) -> usize {
        let cell_vertex = buffer_pos % VERTEX_PER_CELL;
        let cell = buffer_pos / VERTEX_PER_CELL;
        let cell_x = cell % (self.width - 1);
        let cell_y = cell / (self.width - 1);
        assert!(cell_y < self.height - 1, "Index out of bounds");
        let (x, y) = match cell_vertex {
            0 => (cell_x, cell_y),
            1 | 4 => (cell_x, cell_y + 1),
            2 | 3 => (cell_x + 1, cell_y),
            _ => (cell_x + 1, cell_y + 1),
        };
        y * self.width + x
    }

    /// Every index in order, at the narrowest width that fits.
    pub fn generate(&self) -> IndexData {
        let indices = (0..self.num_indices()).map(|i| self.index_for(i));
        match Index::for_vertex_count(self.width * self.height) {
            Index::U8 => IndexData::U8(indices.map(|i| i as u8).collect()),
            Index::U16 => IndexData::U16(indices.map(|i| i as u16).collect()),
            Index::U32 => IndexData::U32(indices.map(|i| i as u32).collect()),
        }
    }
}
