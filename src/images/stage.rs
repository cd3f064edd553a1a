// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Stages: one rendering pass over the scene into a target.

A [`Stage`] owns a view and a projection, the stage-scope uniforms, and how its target is
cleared.  Uniforms set to a [`Semantic`] are filled in by the stage itself: the
view-dependent ones are recomputed whenever view or projection change, the per-draw ones
from each drawn instance's transform.

```
use stages_and_passes::images::stage::{Clear, Semantic};
use glam::Vec4;

let clear = Clear::color_and_depth(Vec4::new(0.0, 0.0, 0.0, 1.0), 1.0);
assert!(clear.is_enabled());
assert!(Semantic::ViewProjection.is_per_draw() == false);
```
*/

use crate::bindings::uniform::{Uniform, UniformMap, UniformType};
use crate::images::bounds::Frustum;
use crate::images::registry::{Handle, Kind};
use crate::images::target::TargetId;
use crate::imp::{Native, gl};
use glam::{Mat3, Mat4, Vec3, Vec4};

pub type StageId = Handle<Stage>;

/// Values a stage derives instead of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantic {
    View,
    Projection,
    /// `projection * view`.
    ViewProjection,
    /// Camera position in world space.
    ViewPosition,
    /// Camera forward direction in world space.
    ViewDirection,
    /// The drawn instance's transform.
    Model,
    ModelViewProjection,
    /// Inverse transpose of the upper 3×3 of `view * model`.
    Normal,
}

impl Semantic {
    pub const fn uniform_type(self) -> UniformType {
        match self {
            Semantic::ViewPosition | Semantic::ViewDirection => UniformType::Vec3,
            Semantic::Normal => UniformType::Mat3,
            _ => UniformType::Mat4,
        }
    }

    /// Whether the value depends on the drawn instance.
    pub const fn is_per_draw(self) -> bool {
        matches!(
            self,
            Semantic::Model | Semantic::ModelViewProjection | Semantic::Normal
        )
    }
}

/// What a stage clears before drawing; `None` fields are left untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clear {
    pub color: Option<Vec4>,
    pub depth: Option<f32>,
    pub stencil: Option<i32>,
}

impl Clear {
    pub const NONE: Clear = Clear {
        color: None,
        depth: None,
        stencil: None,
    };

    pub fn color_and_depth(color: Vec4, depth: f32) -> Self {
        Self {
            color: Some(color),
            depth: Some(depth),
            stencil: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.color.is_some() || self.depth.is_some() || self.stencil.is_some()
    }

    fn mask(&self) -> u32 {
        let mut mask = 0;
        if self.color.is_some() {
            mask |= gl::COLOR_BUFFER_BIT;
        }
        if self.depth.is_some() {
            mask |= gl::DEPTH_BUFFER_BIT;
        }
        if self.stencil.is_some() {
            mask |= gl::STENCIL_BUFFER_BIT;
        }
        mask
    }
}

impl Default for Clear {
    fn default() -> Self {
        Clear::color_and_depth(Vec4::new(0.0, 0.0, 0.0, 1.0), 1.0)
    }
}

/// Which channels a stage's clear and draws may write.  Every stage applies its own mask
/// when it starts; a pass that turns depth writes off keeps them off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteMask {
    pub color: [bool; 4],
    pub depth: bool,
    pub stencil: u32,
}

impl Default for WriteMask {
    fn default() -> Self {
        Self {
            color: [true; 4],
            depth: true,
            stencil: 0xFF,
        }
    }
}

impl WriteMask {
    pub(crate) fn apply<N: Native>(&self, native: &mut N, depth_write: bool) {
        let [r, g, b, a] = self.color;
        native.color_mask(r, g, b, a);
        native.depth_mask(self.depth && depth_write);
        native.stencil_mask(self.stencil);
    }
}

#[derive(Debug, Clone, Copy)]
struct Derived {
    view_projection: Mat4,
    view_position: Vec3,
    view_direction: Vec3,
    frustum: Frustum,
}

impl Derived {
    fn compute(view: &Mat4, projection: &Mat4) -> Self {
        let view_projection = *projection * *view;
        let camera = view.inverse();
        Self {
            view_projection,
            view_position: camera.w_axis.truncate(),
            view_direction: (-camera.z_axis.truncate()).normalize_or_zero(),
            frustum: Frustum::from_view_projection(&view_projection),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stage {
    name: String,
    target: TargetId,
    view: Mat4,
    projection: Mat4,
    uniforms: UniformMap,
    clear: Clear,
    write_mask: WriteMask,
    enabled: bool,
    derived: Derived,
    dirty: bool,
}

impl Kind for Stage {
    const KIND: &'static str = "stage";
}

impl Stage {
    pub(crate) fn new(name: &str, target: TargetId) -> Self {
        Self {
            name: name.to_string(),
            target,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            uniforms: UniformMap::default(),
            clear: Clear::default(),
            write_mask: WriteMask::default(),
            enabled: true,
            derived: Derived::compute(&Mat4::IDENTITY, &Mat4::IDENTITY),
            dirty: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    pub(crate) fn set_target(&mut self, target: TargetId) {
        self.target = target;
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn set_view(&mut self, view: Mat4) {
        self.view = view;
        self.dirty = true;
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
        self.dirty = true;
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// The culling frustum for the current view and projection.
    pub fn frustum(&self) -> Frustum {
        if self.dirty {
            Frustum::from_view_projection(&self.view_projection())
        } else {
            self.derived.frustum
        }
    }

    /// Sets or (with `None`) removes a stage-scope uniform.
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

    pub fn set_clear(&mut self, clear: Clear) {
        self.clear = clear;
    }

    pub fn clear(&self) -> Clear {
        self.clear
    }

    pub fn set_write_mask(&mut self, mask: WriteMask) {
        self.write_mask = mask;
    }

    pub fn write_mask(&self) -> WriteMask {
        self.write_mask
    }

    /// Disabled stages are skipped by `frame()`.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Recomputes derived values if view or projection changed.  Returns whether it did.
    pub(crate) fn refresh(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.derived = Derived::compute(&self.view, &self.projection);
        self.dirty = false;
        true
    }

    /// The value of `semantic`; per-draw semantics need the instance transform.
    pub fn semantic_value(&self, semantic: Semantic, model: Option<&Mat4>) -> Option<Uniform> {
        let derived = if self.dirty {
            Derived::compute(&self.view, &self.projection)
        } else {
            self.derived
        };
        Some(match semantic {
            Semantic::View => Uniform::Mat4(self.view),
            Semantic::Projection => Uniform::Mat4(self.projection),
            Semantic::ViewProjection => Uniform::Mat4(derived.view_projection),
            Semantic::ViewPosition => Uniform::Vec3(derived.view_position),
            Semantic::ViewDirection => Uniform::Vec3(derived.view_direction),
            Semantic::Model => Uniform::Mat4(*model?),
            Semantic::ModelViewProjection => Uniform::Mat4(derived.view_projection * *model?),
            Semantic::Normal => {
                let model_view = self.view * *model?;
                Uniform::Mat3(Mat3::from_mat4(model_view).inverse().transpose())
            }
        })
    }

    /// Applies the write mask, then clears the bound framebuffer as configured.
    pub(crate) fn begin<N: Native>(&self, native: &mut N) {
        self.write_mask.apply(native, true);
        if !self.clear.is_enabled() {
            return;
        }
        if let Some(color) = self.clear.color {
            native.clear_color(color.x, color.y, color.z, color.w);
        }
        if let Some(depth) = self.clear.depth {
            native.clear_depth(depth);
        }
        if let Some(stencil) = self.clear.stencil {
            native.clear_stencil(stencil);
        }
        native.clear(self.clear.mask());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::target::Target;
    use crate::images::registry::Registry;

    fn stage() -> Stage {
        let mut targets = Registry::default();
        let target = targets.insert(Target::drawing_buffer(4, 4));
        Stage::new("main", target)
    }

    #[test]
    fn view_semantics_follow_view() {
        let mut s = stage();
        s.set_view(Mat4::look_at_rh(Vec3::new(0.0, 2.0, 5.0), Vec3::new(0.0, 2.0, 0.0), Vec3::Y));
        assert!(s.refresh());
        assert!(!s.refresh());
        let Some(Uniform::Vec3(position)) = s.semantic_value(Semantic::ViewPosition, None) else {
            panic!("expected a vec3");
        };
        assert!((position - Vec3::new(0.0, 2.0, 5.0)).length() < 1e-5);
        let Some(Uniform::Vec3(direction)) = s.semantic_value(Semantic::ViewDirection, None) else {
            panic!("expected a vec3");
        };
        assert!((direction - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn per_draw_semantics_need_model() {
        let mut s = stage();
        s.set_projection(Mat4::from_scale(Vec3::splat(2.0)));
        assert!(s.semantic_value(Semantic::Model, None).is_none());
        let model = Mat4::from_translation(Vec3::X);
        assert_eq!(
            s.semantic_value(Semantic::ModelViewProjection, Some(&model)),
            Some(Uniform::Mat4(Mat4::from_scale(Vec3::splat(2.0)) * model))
        );
        assert_eq!(Semantic::Normal.uniform_type(), UniformType::Mat3);
    }

    #[test]
    fn clear_mask_bits() {
        assert_eq!(Clear::NONE.mask(), 0);
        let c = Clear {
            stencil: Some(0),
            ..Clear::default()
        };
        assert_eq!(
            c.mask(),
            gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT | gl::STENCIL_BUFFER_BIT
        );
    }
}
