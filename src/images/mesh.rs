// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Meshes: named vertex attribute arrays, optional indices and a primitive topology.

A [`Mesh`] keeps its data on the CPU.  Native buffers are created on first draw and
again whenever the data changes or the context is restored, so a mesh never needs to
be re-described after context loss.

```
use stages_and_passes::images::mesh::Mesh;
use stages_and_passes::images::vertex_layout::Attribute;
use stages_and_passes::images::index_algorithms::Primitive;

let mut mesh = Mesh::new(Primitive::Triangles);
mesh.set_attribute("position", Attribute::Vec3, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0].into())
    .unwrap();
assert_eq!(mesh.vertex_count(), 3);
assert_eq!(mesh.bounds().unwrap().max.x, 1.0);
```
*/

use crate::error::{Result, ensure_config};
use crate::images::bounds::Aabb;
use crate::images::caps::Caps;
use crate::images::index_algorithms::{IndexData, Primitive};
use crate::images::registry::{Handle, Kind};
use crate::images::vertex_algorithms::GridGenerator;
use crate::images::vertex_layout::{Attribute, AttributeData};
use crate::imp::{Native, NativeObject, created, gl};
use glam::Vec3;

pub type MeshId = Handle<Mesh>;

/// Attribute name whose data provides bounds unless another is chosen.
pub const DEFAULT_POSITION_ATTRIBUTE: &str = "position";

#[derive(Debug, Clone)]
struct MeshAttribute {
    name: String,
    layout: Attribute,
    data: AttributeData,
    buffer: Option<NativeObject>,
}

#[derive(Debug, Clone)]
pub struct Mesh {
    primitive: Primitive,
    attributes: Vec<MeshAttribute>,
    indices: Option<IndexData>,
    index_buffer: Option<NativeObject>,
    position_name: String,
    explicit_bounds: Option<Aabb>,
    computed_bounds: Option<Aabb>,
    dirty: bool,
}

impl Kind for Mesh {
    const KIND: &'static str = "mesh";
}

impl Mesh {
    pub fn new(primitive: Primitive) -> Self {
        Self {
            primitive,
            attributes: Vec::new(),
            indices: None,
            index_buffer: None,
            position_name: DEFAULT_POSITION_ATTRIBUTE.to_string(),
            explicit_bounds: None,
            computed_bounds: None,
            dirty: true,
        }
    }

    /**
    A grid of `width`×`height` cells over the unit square in the z=0 plane, with
    `position` (vec3) and `uv` (vec2) attributes and a triangle index list.
    */
    pub fn grid(width: usize, height: usize) -> Result<Mesh> {
        let Some(grid) = GridGenerator::new_grid(width, height) else {
            return Err(crate::error::Error::config(format!(
                "grid of {width}x{height} cells is empty"
            )));
        };
        let vertices = 0..grid.vertex_count();
        let positions: Vec<f32> = vertices
            .clone()
            .flat_map(|v| grid.position_for_vertex(v))
            .collect();
        let uvs: Vec<f32> = vertices.flat_map(|v| grid.uv_for_vertex(v)).collect();
        let mut mesh = Mesh::new(Primitive::Triangles);
        mesh.set_attribute(DEFAULT_POSITION_ATTRIBUTE, Attribute::Vec3, positions.into())?;
        mesh.set_attribute("uv", Attribute::Vec2, uvs.into())?;
        mesh.set_indices(Some(grid.index_generator().generate()))?;
        Ok(mesh)
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    pub fn set_primitive(&mut self, primitive: Primitive) {
        self.primitive = primitive;
    }

    /// Sets or replaces an attribute.  Every attribute must describe the same number of vertices.
    pub fn set_attribute(&mut self, name: &str, layout: Attribute, data: AttributeData) -> Result<()> {
        ensure_config!(
            data.matches(layout),
            "attribute '{name}' data cannot hold {layout:?}"
        );
        let Some(count) = data.vertex_count(layout) else {
            return Err(crate::error::Error::config(format!(
                "attribute '{name}' has {} elements, not a multiple of {}",
                data.element_len(),
                layout.components()
            )));
        };
        if let Some(other) = self.attributes.iter().find(|a| a.name != name) {
            let other_count = other.data.vertex_count(other.layout).unwrap_or(0);
            ensure_config!(
                other_count == count,
                "attribute '{name}' has {count} vertices but '{}' has {other_count}",
                other.name
            );
        }
        let attribute = MeshAttribute {
            name: name.to_string(),
            layout,
            data,
            buffer: None,
        };
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => {
                //keep the native buffer; it is rewritten on the next upload
                let buffer = existing.buffer;
                *existing = MeshAttribute { buffer, ..attribute };
            }
            None => self.attributes.push(attribute),
        }
        self.dirty = true;
        self.update_bounds();
        Ok(())
    }

    /// Removes an attribute, returning whether it existed.
    pub fn remove_attribute(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|a| a.name != name);
        let removed = before != self.attributes.len();
        if removed {
            self.dirty = true;
            self.update_bounds();
        }
        removed
    }

    pub fn attribute(&self, name: &str) -> Option<(Attribute, &AttributeData)> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| (a.layout, &a.data))
    }

    /// Attribute names in the order they were first set.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }

    pub fn set_indices(&mut self, indices: Option<IndexData>) -> Result<()> {
        if let (Some(data), Some(max)) = (&indices, indices.as_ref().and_then(|i| i.max_index())) {
            let vertices = self.vertex_count();
            ensure_config!(
                vertices == 0 || (max as usize) < vertices,
                "index {max} is out of range for {vertices} vertices ({} indices)",
                data.len()
            );
        }
        self.indices = indices;
        self.dirty = true;
        Ok(())
    }

    pub fn indices(&self) -> Option<&IndexData> {
        self.indices.as_ref()
    }

    pub fn vertex_count(&self) -> usize {
        self.attributes
            .first()
            .and_then(|a| a.data.vertex_count(a.layout))
            .unwrap_or(0)
    }

    /// Vertices processed by one draw: the index count if indexed.
    pub fn draw_count(&self) -> usize {
        match &self.indices {
            Some(i) => i.len(),
            None => self.vertex_count(),
        }
    }

    /// Chooses which attribute bounds are computed from.
    pub fn set_position_attribute(&mut self, name: &str) {
        self.position_name = name.to_string();
        self.update_bounds();
    }

    /// Overrides the computed bounds; `None` returns to computing them.
    pub fn set_bounds(&mut self, bounds: Option<Aabb>) {
        self.explicit_bounds = bounds;
    }

    /// Object-space bounds, or `None` without position data.
    pub fn bounds(&self) -> Option<Aabb> {
        self.explicit_bounds.or(self.computed_bounds)
    }

    fn update_bounds(&mut self) {
        self.computed_bounds = self.attribute(&self.position_name).and_then(|(layout, data)| {
            let AttributeData::F32(values) = data else {
                return None;
            };
            let components = layout.components() as usize;
            Aabb::from_points(values.chunks_exact(components).map(|c| {
                Vec3::new(c[0], c.get(1).copied().unwrap_or(0.0), c.get(2).copied().unwrap_or(0.0))
            }))
        });
    }

    /// Creates or rewrites native buffers for dirty data.
    pub(crate) fn upload<N: Native>(&mut self, native: &mut N, caps: &Caps) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(indices) = &self.indices {
            ensure_config!(
                indices.index().supported(caps),
                "{:?} indices need OES_element_index_uint",
                indices.index()
            );
        }
        for attribute in &mut self.attributes {
            let buffer = match attribute.buffer {
                Some(b) => b,
                None => {
                    let b = created(native.create_buffer(), "create vertex buffer")?;
                    attribute.buffer = Some(b);
                    b
                }
            };
            native.bind_buffer(gl::ARRAY_BUFFER, Some(buffer));
            native.buffer_data(gl::ARRAY_BUFFER, &attribute.data.to_bytes(), gl::STATIC_DRAW);
        }
        match &self.indices {
            Some(indices) => {
                let buffer = match self.index_buffer {
                    Some(b) => b,
                    None => {
                        let b = created(native.create_buffer(), "create index buffer")?;
                        self.index_buffer = Some(b);
                        b
                    }
                };
                native.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, Some(buffer));
                native.buffer_data(gl::ELEMENT_ARRAY_BUFFER, &indices.to_bytes(), gl::STATIC_DRAW);
            }
            None => {
                if let Some(b) = self.index_buffer.take() {
                    native.delete_buffer(b);
                }
            }
        }
        self.dirty = false;
        Ok(())
    }

    /// Native buffer holding `name`, if uploaded.
    pub(crate) fn attribute_buffer(&self, name: &str) -> Option<(Attribute, NativeObject)> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.buffer.map(|b| (a.layout, b)))
    }

    pub(crate) fn index_buffer(&self) -> Option<NativeObject> {
        self.index_buffer
    }

    pub(crate) fn release<N: Native>(&mut self, native: &mut N) {
        for attribute in &mut self.attributes {
            if let Some(b) = attribute.buffer.take() {
                native.delete_buffer(b);
            }
        }
        if let Some(b) = self.index_buffer.take() {
            native.delete_buffer(b);
        }
        self.dirty = true;
    }

    /// Drops native names that died with the context.
    pub(crate) fn forget_native(&mut self) {
        for attribute in &mut self.attributes {
            attribute.buffer = None;
        }
        self.index_buffer = None;
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::index_algorithms::Index;

    #[test]
    fn mismatched_vertex_counts_rejected() {
        let mut mesh = Mesh::new(Primitive::Triangles);
        mesh.set_attribute("position", Attribute::Vec3, vec![0.0; 9].into())
            .unwrap();
        let e = mesh
            .set_attribute("uv", Attribute::Vec2, vec![0.0; 4].into())
            .unwrap_err();
        assert!(e.is_config());
        //replacing the only attribute may change the count
        mesh.set_attribute("position", Attribute::Vec3, vec![0.0; 12].into())
            .unwrap();
        assert_eq!(mesh.vertex_count(), 4);
    }

    #[test]
    fn indices_must_address_vertices() {
        let mut mesh = Mesh::new(Primitive::Triangles);
        mesh.set_attribute("position", Attribute::Vec2, vec![0.0; 6].into())
            .unwrap();
        assert!(
            mesh.set_indices(Some(IndexData::U8(vec![0u8, 1, 3].into())))
                .is_err()
        );
        mesh.set_indices(Some(IndexData::U8(vec![0u8, 1, 2].into())))
            .unwrap();
        assert_eq!(mesh.draw_count(), 3);
    }

    #[test]
    fn bounds_follow_positions() {
        let mut mesh = Mesh::new(Primitive::Points);
        assert!(mesh.bounds().is_none());
        mesh.set_attribute("position", Attribute::Vec2, vec![-1.0, 2.0, 3.0, -4.0].into())
            .unwrap();
        let b = mesh.bounds().unwrap();
        assert_eq!(b.min, Vec3::new(-1.0, -4.0, 0.0));
        assert_eq!(b.max, Vec3::new(3.0, 2.0, 0.0));
        let explicit = Aabb::new(Vec3::ZERO, Vec3::ONE);
        mesh.set_bounds(Some(explicit));
        assert_eq!(mesh.bounds(), Some(explicit));
    }

    #[test]
    fn grid_mesh() {
        let mesh = Mesh::grid(2, 2).unwrap();
        assert_eq!(mesh.vertex_count(), 9);
        assert_eq!(mesh.draw_count(), 24);
        assert_eq!(mesh.indices().unwrap().index(), Index::U8);
        assert!(mesh.attribute("uv").is_some());
        assert!(Mesh::grid(0, 1).is_err());
    }
}
