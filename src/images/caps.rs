// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Device capability snapshot.

use crate::imp::{Native, gl};

/**
Hardware limits and feature flags, queried once when a [`super::Device`] is created.

Everything the core validates against lives here, so validation never needs to talk to
the native API.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct Caps {
    pub texture_max_size: u32,
    pub cube_max_size: u32,
    /// Largest depth surface (renderbuffer) edge.
    pub depth_max_size: u32,
    pub texture_unit_count: u32,
    /// Maximum simultaneous color attachments of a target.
    pub color_target_count: u32,
    /// 1.0 when anisotropic filtering is unsupported.
    pub sampler_max_anisotropy: f32,
    pub anisotropy: bool,
    /// Depth surfaces can be created as sampleable textures.
    pub readable_depth: bool,
    pub float_texture: bool,
    pub float_linear: bool,
    pub float_renderable: bool,
    pub half_texture: bool,
    pub half_linear: bool,
    pub half_renderable: bool,
    pub compressed_s3tc: bool,
    pub index32: bool,
    pub lose_context: bool,
}

impl Caps {
    /// What every WebGL 1 implementation guarantees.
    pub fn baseline() -> Self {
        Self {
            texture_max_size: 64,
            cube_max_size: 16,
            depth_max_size: 1,
            texture_unit_count: 8,
            color_target_count: 1,
            sampler_max_anisotropy: 1.0,
            anisotropy: false,
            readable_depth: false,
            float_texture: false,
            float_linear: false,
            float_renderable: false,
            half_texture: false,
            half_linear: false,
            half_renderable: false,
            compressed_s3tc: false,
            index32: false,
            lose_context: false,
        }
    }

    pub(crate) fn query<N: Native>(native: &mut N) -> Self {
        let limits = native.limits();
        let extensions = native.extensions();
        let has = |name: &str| extensions.iter().any(|e| e == name);
        let anisotropy = has(gl::EXT_ANISOTROPIC);
        Self {
            texture_max_size: limits.max_texture_size,
            cube_max_size: limits.max_cube_map_size,
            depth_max_size: limits.max_renderbuffer_size,
            texture_unit_count: limits.max_texture_units,
            color_target_count: if has(gl::EXT_DRAW_BUFFERS) {
                limits.max_draw_buffers.max(1)
            } else {
                1
            },
            sampler_max_anisotropy: if anisotropy {
                limits.max_anisotropy.max(1.0)
            } else {
                1.0
            },
            anisotropy,
            readable_depth: has(gl::EXT_DEPTH_TEXTURE),
            float_texture: has(gl::EXT_TEXTURE_FLOAT),
            float_linear: has(gl::EXT_TEXTURE_FLOAT_LINEAR),
            float_renderable: has(gl::EXT_COLOR_BUFFER_FLOAT),
            half_texture: has(gl::EXT_TEXTURE_HALF_FLOAT),
            half_linear: has(gl::EXT_TEXTURE_HALF_FLOAT_LINEAR),
            half_renderable: has(gl::EXT_COLOR_BUFFER_HALF_FLOAT),
            compressed_s3tc: has(gl::EXT_S3TC),
            index32: has(gl::EXT_ELEMENT_INDEX_UINT),
            lose_context: has(gl::EXT_LOSE_CONTEXT),
        }
    }
}
