// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Uniform values and the uniform type catalog.

A [`Uniform`] is anything a stage, material or instance can assign to a shader input.
[`UniformMap`] is the insertion-ordered name → value table each of those scopes owns.

```
use stages_and_passes::bindings::uniform::{Uniform, UniformMap};
use glam::Vec3;

let mut map = UniformMap::default();
map.set("uColor", Some(Uniform::Vec3(Vec3::ONE)));
map.set("uAlpha", Some(0.5f32.into()));
map.set("uColor", Some(Uniform::Vec3(Vec3::X)));
assert_eq!(map.names().collect::<Vec<_>>(), ["uColor", "uAlpha"]);
map.set("uColor", None);
assert!(map.get("uColor").is_none());
```
*/

use crate::images::depth::DepthId;
use crate::images::stage::Semantic;
use crate::images::texture::{MipRef, TextureId};
use crate::imp::gl;
use glam::{Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};

/// A value assignable to a uniform.
#[derive(Debug, Clone, PartialEq)]
pub enum Uniform {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Int(i32),
    Bool(bool),
    Mat2(Mat2),
    Mat3(Mat3),
    Mat4(Mat4),
    /// A float array for `float name[N]` declarations.
    FloatArray(Vec<f32>),
    /// Level 0 of face 0 of a texture.
    Texture(TextureId),
    Mip(MipRef),
    /// A readable depth.
    Depth(DepthId),
    /// A value the stage derives from its view, projection or the drawn instance.
    Semantic(Semantic),
}

impl Uniform {
    pub fn is_sampler(&self) -> bool {
        matches!(self, Uniform::Texture(_) | Uniform::Mip(_) | Uniform::Depth(_))
    }

    /// Whether a shader input of type `ty` can take this value.
    pub fn compatible_with(&self, ty: UniformType) -> bool {
        match self {
            Uniform::Float(_) | Uniform::FloatArray(_) => ty == UniformType::Float,
            Uniform::Vec2(_) => ty == UniformType::Vec2,
            Uniform::Vec3(_) => ty == UniformType::Vec3,
            Uniform::Vec4(_) => ty == UniformType::Vec4,
            Uniform::Int(_) => ty == UniformType::Int,
            Uniform::Bool(_) => matches!(ty, UniformType::Bool | UniformType::Int),
            Uniform::Mat2(_) => ty == UniformType::Mat2,
            Uniform::Mat3(_) => ty == UniformType::Mat3,
            Uniform::Mat4(_) => ty == UniformType::Mat4,
            Uniform::Texture(_) | Uniform::Mip(_) | Uniform::Depth(_) => ty.is_sampler(),
            Uniform::Semantic(s) => s.uniform_type() == ty,
        }
    }
}

impl From<f32> for Uniform {
    fn from(value: f32) -> Self {
        Uniform::Float(value)
    }
}
impl From<Vec2> for Uniform {
    fn from(value: Vec2) -> Self {
        Uniform::Vec2(value)
    }
}
impl From<Vec3> for Uniform {
    fn from(value: Vec3) -> Self {
        Uniform::Vec3(value)
    }
}
impl From<Vec4> for Uniform {
    fn from(value: Vec4) -> Self {
        Uniform::Vec4(value)
    }
}
impl From<i32> for Uniform {
    fn from(value: i32) -> Self {
        Uniform::Int(value)
    }
}
impl From<bool> for Uniform {
    fn from(value: bool) -> Self {
        Uniform::Bool(value)
    }
}
impl From<Mat3> for Uniform {
    fn from(value: Mat3) -> Self {
        Uniform::Mat3(value)
    }
}
impl From<Mat4> for Uniform {
    fn from(value: Mat4) -> Self {
        Uniform::Mat4(value)
    }
}
impl From<TextureId> for Uniform {
    fn from(value: TextureId) -> Self {
        Uniform::Texture(value)
    }
}
impl From<MipRef> for Uniform {
    fn from(value: MipRef) -> Self {
        Uniform::Mip(value)
    }
}
impl From<DepthId> for Uniform {
    fn from(value: DepthId) -> Self {
        Uniform::Depth(value)
    }
}
impl From<Semantic> for Uniform {
    fn from(value: Semantic) -> Self {
        Uniform::Semantic(value)
    }
}

/// Shader input types the core can upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    Bool,
    Mat2,
    Mat3,
    Mat4,
    Sampler2D,
    SamplerCube,
}

impl UniformType {
    pub fn from_native(ty: u32) -> Option<UniformType> {
        Some(match ty {
            gl::FLOAT => UniformType::Float,
            gl::FLOAT_VEC2 => UniformType::Vec2,
            gl::FLOAT_VEC3 => UniformType::Vec3,
            gl::FLOAT_VEC4 => UniformType::Vec4,
            gl::INT => UniformType::Int,
            gl::BOOL => UniformType::Bool,
            gl::FLOAT_MAT2 => UniformType::Mat2,
            gl::FLOAT_MAT3 => UniformType::Mat3,
            gl::FLOAT_MAT4 => UniformType::Mat4,
            gl::SAMPLER_2D => UniformType::Sampler2D,
            gl::SAMPLER_CUBE => UniformType::SamplerCube,
            _ => return None,
        })
    }

    pub const fn native_type(self) -> u32 {
        match self {
            UniformType::Float => gl::FLOAT,
            UniformType::Vec2 => gl::FLOAT_VEC2,
            UniformType::Vec3 => gl::FLOAT_VEC3,
            UniformType::Vec4 => gl::FLOAT_VEC4,
            UniformType::Int => gl::INT,
            UniformType::Bool => gl::BOOL,
            UniformType::Mat2 => gl::FLOAT_MAT2,
            UniformType::Mat3 => gl::FLOAT_MAT3,
            UniformType::Mat4 => gl::FLOAT_MAT4,
            UniformType::Sampler2D => gl::SAMPLER_2D,
            UniformType::SamplerCube => gl::SAMPLER_CUBE,
        }
    }

    /// Scalar elements per value.
    pub const fn element_count(self) -> u32 {
        match self {
            UniformType::Float
            | UniformType::Int
            | UniformType::Bool
            | UniformType::Sampler2D
            | UniformType::SamplerCube => 1,
            UniformType::Vec2 => 2,
            UniformType::Vec3 => 3,
            UniformType::Vec4 | UniformType::Mat2 => 4,
            UniformType::Mat3 => 9,
            UniformType::Mat4 => 16,
        }
    }

    pub const fn is_sampler(self) -> bool {
        matches!(self, UniformType::Sampler2D | UniformType::SamplerCube)
    }
}

/// Insertion-ordered uniform assignments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformMap {
    entries: Vec<(String, Uniform)>,
}

impl UniformMap {
    /// Sets `name`, or removes it with `None`.  Re-setting keeps the original position.
    pub fn set(&mut self, name: &str, value: Option<Uniform>) {
        let position = self.entries.iter().position(|(n, _)| n == name);
        match (position, value) {
            (Some(i), Some(v)) => self.entries[i].1 = v,
            (None, Some(v)) => self.entries.push((name.to_string(), v)),
            (Some(i), None) => {
                self.entries.remove(i);
            }
            (None, None) => {}
        }
    }

    /// The value of `name`; unset names are `None`, never an error.
    pub fn get(&self, name: &str) -> Option<&Uniform> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Uniform)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keeps only the assignments whose value passes `keep`.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&Uniform) -> bool) {
        self.entries.retain(|(_, v)| keep(v));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_types_round_trip() {
        for ty in [
            UniformType::Float,
            UniformType::Vec4,
            UniformType::Mat3,
            UniformType::SamplerCube,
        ] {
            assert_eq!(UniformType::from_native(ty.native_type()), Some(ty));
        }
        assert_eq!(UniformType::from_native(gl::INT_VEC2), None);
    }

    #[test]
    fn compatibility() {
        assert!(Uniform::Bool(true).compatible_with(UniformType::Int));
        assert!(!Uniform::Float(1.0).compatible_with(UniformType::Vec2));
        assert!(Uniform::Semantic(Semantic::ViewProjection).compatible_with(UniformType::Mat4));
        assert!(Uniform::Semantic(Semantic::Normal).compatible_with(UniformType::Mat3));
    }
}
