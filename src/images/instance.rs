// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Instances: one drawable occurrence of a mesh with a material and a transform.
//!
//! An instance missing either its mesh or its material is inert; it is counted by
//! `frame()` but never drawn.

use crate::bindings::material::MaterialId;
use crate::bindings::uniform::{Uniform, UniformMap};
use crate::images::mesh::MeshId;
use crate::images::registry::{Handle, Kind};
use glam::Mat4;

pub type InstanceId = Handle<Instance>;

#[derive(Debug, Clone)]
pub struct Instance {
    mesh: Option<MeshId>,
    material: Option<MaterialId>,
    transform: Mat4,
    visible: bool,
    cull: bool,
    uniforms: UniformMap,
}

impl Kind for Instance {
    const KIND: &'static str = "instance";
}

impl Instance {
    pub(crate) fn new(material: Option<MaterialId>, mesh: Option<MeshId>) -> Self {
        Self {
            mesh,
            material,
            transform: Mat4::IDENTITY,
            visible: true,
            cull: true,
            uniforms: UniformMap::default(),
        }
    }

    pub fn mesh(&self) -> Option<MeshId> {
        self.mesh
    }

    pub(crate) fn set_mesh(&mut self, mesh: Option<MeshId>) {
        self.mesh = mesh;
    }

    pub fn material(&self) -> Option<MaterialId> {
        self.material
    }

    pub(crate) fn set_material(&mut self, material: Option<MaterialId>) {
        self.material = material;
    }

    /// Whether both a mesh and a material are set.
    pub fn is_drawable(&self) -> bool {
        self.mesh.is_some() && self.material.is_some()
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Whether frustum culling applies to this instance.
    pub fn culls(&self) -> bool {
        self.cull
    }

    pub fn set_cull(&mut self, cull: bool) {
        self.cull = cull;
    }

    /// Sets or (with `None`) removes an instance-scope uniform.  Instance values win over
    /// material and stage values of the same name for this instance's draws only.
    pub fn set_uniform(&mut self, name: &str, value: Option<Uniform>) {
        self.uniforms.set(name, value);
    }

    pub fn uniform(&self, name: &str) -> Option<&Uniform> {
        self.uniforms.get(name)
    }

    pub fn uniforms(&self) -> &UniformMap {
        &self.uniforms
    }

    pub(crate) fn uniforms_mut(&mut self) -> &mut UniformMap {
        &mut self.uniforms
    }
}
