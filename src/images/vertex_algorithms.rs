// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Common vertex algorithms.
*/

use crate::images::index_algorithms::IndexGenerator;

/**
Generates a rectangular grid of points spanning the unit square centered on the origin.

Dimensions are given in cells, so a grid of `w`×`h` cells has `(w + 1)`×`(h + 1)` vertices.
*/
#[derive(Debug, Clone)]
pub struct GridGenerator {
    grid_width: usize,
    grid_height: usize,
}

impl GridGenerator {
    /// Returns `None` when either dimension is zero.
    pub fn new_grid(grid_width: usize, grid_height: usize) -> Option<Self> {
        (grid_width > 0 && grid_height > 0).then_some(Self {
            grid_width,
            grid_height,
        })
    }

    pub fn vertex_count_width(&self) -> usize {
        self.grid_width + 1
    }

    pub fn vertex_count_height(&self) -> usize {
        self.grid_height + 1
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count_width() * self.vertex_count_height()
    }

    /// Grid coordinate of a vertex.
    pub fn coordinates_for_vertex(&self, vertex: usize) -> (usize, usize) {
        (
            vertex % self.vertex_count_width(),
            vertex / self.vertex_count_width(),
        )
    }

    /// Texture coordinate of a vertex; `(0, 0)` is the upper left.
    pub fn uv_for_vertex(&self, vertex: usize) -> [f32; 2] {
        let (x, y) = self.coordinates_for_vertex(vertex);
        [
            x as f32 / self.grid_width as f32,
            y as f32 / self.grid_height as f32,
        ]
    }

    /// Position of a vertex in the z=0 plane, with +y up.
    pub fn position_for_vertex(&self, vertex: usize) -> [f32; 3] {
        let [u, v] = self.uv_for_vertex(vertex);
        [u - 0.5, 0.5 - v, 0.0]
    }

    pub fn index_generator(&self) -> IndexGenerator {
        IndexGenerator::new(self.vertex_count_width(), self.vertex_count_height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_span_unit_square() {
        let grid = GridGenerator::new_grid(2, 1).unwrap();
        assert_eq!(grid.vertex_count(), 6);
        assert_eq!(grid.position_for_vertex(0), [-0.5, 0.5, 0.0]);
        assert_eq!(grid.position_for_vertex(5), [0.5, -0.5, 0.0]);
        assert_eq!(grid.uv_for_vertex(4), [0.5, 1.0]);
        assert!(GridGenerator::new_grid(0, 3).is_none());
    }
}
