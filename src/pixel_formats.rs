// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Texture and surface format catalog.
//!
//! [`Format`] is a pure lookup table: it maps each abstract format to its size, its data
//! class and the native enums used to allocate and upload it, and answers capability
//! questions (can it be sampled, filtered, rendered to) against a [`Caps`] snapshot.
//!
//! # Available Formats
//!
//! | Format            | Class        | Bytes per texel | Gate                              |
//! |-------------------|--------------|-----------------|-----------------------------------|
//! | [`Format::Alpha`], [`Format::Luminance`] | integer | 1 | always                   |
//! | [`Format::LuminanceAlpha`] | integer | 2               | always                            |
//! | [`Format::Rgb`], [`Format::Rgba`] | integer | 3, 4    | always                            |
//! | [`Format::Rgb16F`], [`Format::Rgba16F`] | half | 6, 8 | `OES_texture_half_float`          |
//! | [`Format::Rgb32F`], [`Format::Rgba32F`] | float | 12, 16 | `OES_texture_float`            |
//! | [`Format::Dxt1`]..[`Format::Dxt5`] | compressed | 8 or 16 per 4×4 block | `WEBGL_compressed_texture_s3tc` |
//! | [`Format::Depth`], [`Format::DepthStencil`] | depth | 2, 4 | renderbuffer always; texture with `WEBGL_depth_texture` |
//!
//! ```
//! use stages_and_passes::pixel_formats::{Format, FormatClass};
//!
//! assert_eq!(Format::Rgba.byte_len(4, 4), 64);
//! assert_eq!(Format::Dxt1.byte_len(8, 8), 32);
//! assert_eq!(Format::Rgba16F.class(), FormatClass::Half);
//! assert!(Format::DepthStencil.is_depth());
//! ```

pub(crate) mod png_support;

use crate::images::Caps;
use crate::imp::gl;
use std::fmt::Debug;

pub use half::f16;

/// An abstract texel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Format {
    Alpha,
    Luminance,
    LuminanceAlpha,
    Rgb,
    Rgba,
    Rgb16F,
    Rgba16F,
    Rgb32F,
    Rgba32F,
    Dxt1,
    Dxt3,
    Dxt5,
    /// 16-bit depth.
    Depth,
    /// 24-bit depth with 8-bit stencil.
    DepthStencil,
}

/// What kind of CPU data a format is uploaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatClass {
    /// Unsigned normalized bytes.
    Integer,
    /// IEEE half floats.
    Half,
    /// IEEE single floats.
    Float,
    /// Pre-compressed blocks.
    Compressed,
    /// Depth(-stencil) surfaces; never uploaded from the CPU.
    Depth,
}

impl Format {
    pub const ALL: [Format; 14] = [
        Format::Alpha,
        Format::Luminance,
        Format::LuminanceAlpha,
        Format::Rgb,
        Format::Rgba,
        Format::Rgb16F,
        Format::Rgba16F,
        Format::Rgb32F,
        Format::Rgba32F,
        Format::Dxt1,
        Format::Dxt3,
        Format::Dxt5,
        Format::Depth,
        Format::DepthStencil,
    ];

    pub const fn channels(self) -> u32 {
        match self {
            Format::Alpha | Format::Luminance | Format::Depth => 1,
            Format::LuminanceAlpha | Format::DepthStencil => 2,
            Format::Rgb | Format::Rgb16F | Format::Rgb32F => 3,
            Format::Rgba
            | Format::Rgba16F
            | Format::Rgba32F
            | Format::Dxt1
            | Format::Dxt3
            | Format::Dxt5 => 4,
        }
    }

    pub const fn class(self) -> FormatClass {
        match self {
            Format::Alpha
            | Format::Luminance
            | Format::LuminanceAlpha
            | Format::Rgb
            | Format::Rgba => FormatClass::Integer,
            Format::Rgb16F | Format::Rgba16F => FormatClass::Half,
            Format::Rgb32F | Format::Rgba32F => FormatClass::Float,
            Format::Dxt1 | Format::Dxt3 | Format::Dxt5 => FormatClass::Compressed,
            Format::Depth | Format::DepthStencil => FormatClass::Depth,
        }
    }

    pub const fn is_depth(self) -> bool {
        matches!(self.class(), FormatClass::Depth)
    }

    pub const fn is_compressed(self) -> bool {
        matches!(self.class(), FormatClass::Compressed)
    }

    pub const fn has_stencil(self) -> bool {
        matches!(self, Format::DepthStencil)
    }

    /// Bytes per texel, or `None` for block-compressed formats.
    pub const fn bytes_per_texel(self) -> Option<u32> {
        match self.class() {
            FormatClass::Integer => Some(self.channels()),
            FormatClass::Half => Some(self.channels() * 2),
            FormatClass::Float => Some(self.channels() * 4),
            FormatClass::Compressed => None,
            FormatClass::Depth => match self {
                Format::Depth => Some(2),
                _ => Some(4),
            },
        }
    }

    /// Bytes per 4×4 block for compressed formats.
    pub const fn block_bytes(self) -> Option<u32> {
        match self {
            Format::Dxt1 => Some(8),
            Format::Dxt3 | Format::Dxt5 => Some(16),
            _ => None,
        }
    }

    /// Size in bytes of one `width`×`height` image.
    pub fn byte_len(self, width: u32, height: u32) -> usize {
        match (self.bytes_per_texel(), self.block_bytes()) {
            (Some(bpp), _) => (width * height * bpp) as usize,
            (None, Some(block)) => (width.div_ceil(4) * height.div_ceil(4) * block) as usize,
            (None, None) => 0,
        }
    }

    /// Number of scalar elements (bytes, halves or floats) in one `width`×`height` image.
    pub fn element_len(self, width: u32, height: u32) -> usize {
        match self.class() {
            FormatClass::Integer | FormatClass::Half | FormatClass::Float => {
                (width * height * self.channels()) as usize
            }
            FormatClass::Compressed | FormatClass::Depth => self.byte_len(width, height),
        }
    }

    /// Native (internal) format, which WebGL 1 requires to equal the upload format.
    pub const fn native_format(self) -> u32 {
        match self {
            Format::Alpha => gl::ALPHA,
            Format::Luminance => gl::LUMINANCE,
            Format::LuminanceAlpha => gl::LUMINANCE_ALPHA,
            Format::Rgb | Format::Rgb16F | Format::Rgb32F => gl::RGB,
            Format::Rgba | Format::Rgba16F | Format::Rgba32F => gl::RGBA,
            Format::Dxt1 => gl::COMPRESSED_RGBA_S3TC_DXT1_EXT,
            Format::Dxt3 => gl::COMPRESSED_RGBA_S3TC_DXT3_EXT,
            Format::Dxt5 => gl::COMPRESSED_RGBA_S3TC_DXT5_EXT,
            Format::Depth => gl::DEPTH_COMPONENT,
            Format::DepthStencil => gl::DEPTH_STENCIL,
        }
    }

    /// Native component type for uploads.
    pub const fn native_type(self) -> u32 {
        match self {
            Format::Rgb16F | Format::Rgba16F => gl::HALF_FLOAT_OES,
            Format::Rgb32F | Format::Rgba32F => gl::FLOAT,
            Format::Depth => gl::UNSIGNED_SHORT,
            Format::DepthStencil => gl::UNSIGNED_INT_24_8_WEBGL,
            _ => gl::UNSIGNED_BYTE,
        }
    }

    /// Renderbuffer storage format for depth formats.
    pub const fn renderbuffer_format(self) -> Option<u32> {
        match self {
            Format::Depth => Some(gl::DEPTH_COMPONENT16),
            Format::DepthStencil => Some(gl::DEPTH_STENCIL),
            _ => None,
        }
    }

    /// Framebuffer attachment point for depth formats.
    pub const fn depth_attachment(self) -> Option<u32> {
        match self {
            Format::Depth => Some(gl::DEPTH_ATTACHMENT),
            Format::DepthStencil => Some(gl::DEPTH_STENCIL_ATTACHMENT),
            _ => None,
        }
    }

    /// Whether textures of this format can be created on this device.
    pub fn supported(self, caps: &Caps) -> bool {
        match self.class() {
            FormatClass::Integer => true,
            FormatClass::Half => caps.half_texture,
            FormatClass::Float => caps.float_texture,
            FormatClass::Compressed => caps.compressed_s3tc,
            FormatClass::Depth => caps.readable_depth,
        }
    }

    /// Whether the format can be sampled with linear filtering on this device.
    pub fn filterable(self, caps: &Caps) -> bool {
        match self.class() {
            FormatClass::Half => caps.half_linear,
            FormatClass::Float => caps.float_linear,
            FormatClass::Depth => false,
            _ => true,
        }
    }

    /// Whether the format can be a color attachment on this device.
    pub fn renderable(self, caps: &Caps) -> bool {
        match self {
            Format::Rgb | Format::Rgba => true,
            Format::Rgb16F | Format::Rgba16F => caps.half_texture && caps.half_renderable,
            Format::Rgb32F | Format::Rgba32F => caps.float_texture && caps.float_renderable,
            _ => false,
        }
    }
}

/// A decoded 8-bit RGBA image, usable as a mip source.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Image {
    /// Wraps tightly packed RGBA bytes.  Returns `None` if the length does not match.
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        (rgba.len() == (width * height * 4) as usize).then_some(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Repacks into the byte layout of an integer `format`.
    pub(crate) fn pixels_as(&self, format: Format) -> Option<Vec<u8>> {
        let pick: &[usize] = match format {
            Format::Rgba => return Some(self.rgba.clone()),
            Format::Rgb => &[0, 1, 2],
            Format::Alpha => &[3],
            Format::Luminance => &[0],
            Format::LuminanceAlpha => &[0, 3],
            _ => return None,
        };
        Some(
            self.rgba
                .chunks_exact(4)
                .flat_map(|texel| pick.iter().map(move |c| texel[*c]))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_consistent() {
        for format in Format::ALL {
            match format.bytes_per_texel() {
                Some(bpp) => assert_eq!(format.byte_len(2, 2), (bpp * 4) as usize),
                None => assert_eq!(format.byte_len(2, 2), format.block_bytes().unwrap() as usize),
            }
        }
    }

    #[test]
    fn renderable_depends_on_caps() {
        let mut caps = Caps::baseline();
        assert!(Format::Rgba.renderable(&caps));
        assert!(!Format::Rgba32F.renderable(&caps));
        assert!(!Format::Luminance.renderable(&caps));
        caps.float_texture = true;
        caps.float_renderable = true;
        assert!(Format::Rgba32F.renderable(&caps));
    }

    #[test]
    fn image_repacks_channels() {
        let image = Image::from_rgba(2, 1, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(image.pixels_as(Format::Rgb).unwrap(), vec![1, 2, 3, 5, 6, 7]);
        assert_eq!(image.pixels_as(Format::LuminanceAlpha).unwrap(), vec![1, 4, 5, 8]);
        assert!(image.pixels_as(Format::Rgba32F).is_none());
        assert!(Image::from_rgba(3, 3, vec![0; 4]).is_none());
    }
}
