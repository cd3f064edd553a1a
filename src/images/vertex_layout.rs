// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Vertex attribute catalog.
//!
//! An [`Attribute`] describes one per-vertex input: how many components it has, how
//! they are stored, and how the native API should read them.  [`AttributeData`] is the
//! CPU-side array for one attribute of a mesh.
//!
//! ```
//! use stages_and_passes::images::vertex_layout::{Attribute, AttributeData};
//!
//! assert_eq!(Attribute::Vec3.byte_size(), 12);
//! assert!(Attribute::UByte4.normalized());
//! let positions = AttributeData::from(vec![0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0]);
//! assert_eq!(positions.vertex_count(Attribute::Vec3), Some(2));
//! ```

use crate::imp::gl;
use std::sync::Arc;

/// The layout of one vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Float,
    Vec2,
    Vec3,
    Vec4,
    /// Four unsigned bytes, normalized to `[0, 1]`.
    UByte4,
}

impl Attribute {
    pub const fn components(self) -> u32 {
        match self {
            Attribute::Float => 1,
            Attribute::Vec2 => 2,
            Attribute::Vec3 => 3,
            Attribute::Vec4 | Attribute::UByte4 => 4,
        }
    }

    pub const fn byte_size(self) -> u32 {
        match self {
            Attribute::UByte4 => 4,
            _ => self.components() * 4,
        }
    }

    pub const fn native_type(self) -> u32 {
        match self {
            Attribute::UByte4 => gl::UNSIGNED_BYTE,
            _ => gl::FLOAT,
        }
    }

    pub const fn normalized(self) -> bool {
        matches!(self, Attribute::UByte4)
    }

    /// The shader type an attribute of this layout feeds.
    pub const fn shader_type(self) -> u32 {
        match self {
            Attribute::Float => gl::FLOAT,
            Attribute::Vec2 => gl::FLOAT_VEC2,
            Attribute::Vec3 => gl::FLOAT_VEC3,
            Attribute::Vec4 | Attribute::UByte4 => gl::FLOAT_VEC4,
        }
    }
}

/// CPU-side values for one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    F32(Arc<[f32]>),
    U8(Arc<[u8]>),
}

impl AttributeData {
    /// Whether this storage can hold `attribute`.
    pub fn matches(&self, attribute: Attribute) -> bool {
        match self {
            AttributeData::F32(_) => attribute != Attribute::UByte4,
            AttributeData::U8(_) => attribute == Attribute::UByte4,
        }
    }

    pub fn element_len(&self) -> usize {
        match self {
            AttributeData::F32(v) => v.len(),
            AttributeData::U8(v) => v.len(),
        }
    }

    /// Number of whole vertices for `attribute`, or `None` if the data does not divide evenly.
    pub fn vertex_count(&self, attribute: Attribute) -> Option<usize> {
        let components = attribute.components() as usize;
        let len = self.element_len();
        (len % components == 0).then_some(len / components)
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        match self {
            AttributeData::F32(v) => v.iter().flat_map(|f| f.to_ne_bytes()).collect(),
            AttributeData::U8(v) => v.to_vec(),
        }
    }
}

impl From<Vec<f32>> for AttributeData {
    fn from(value: Vec<f32>) -> Self {
        AttributeData::F32(value.into())
    }
}

impl From<Vec<u8>> for AttributeData {
    fn from(value: Vec<u8>) -> Self {
        AttributeData::U8(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_must_match_layout() {
        let floats = AttributeData::from(vec![1.0f32; 8]);
        assert!(floats.matches(Attribute::Vec4));
        assert!(!floats.matches(Attribute::UByte4));
        assert_eq!(floats.vertex_count(Attribute::Vec3), None);
        assert_eq!(floats.to_bytes().len(), 32);
        let bytes = AttributeData::from(vec![255u8; 8]);
        assert!(bytes.matches(Attribute::UByte4));
        assert_eq!(bytes.vertex_count(Attribute::UByte4), Some(2));
    }
}
