// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Depth-stencil surfaces.
//!
//! A [`Depth`] is either write-only (a renderbuffer) or readable (a depth texture that a
//! sampler can bind).  It holds no CPU data, so restoring it after context loss only
//! recreates the native object.

use crate::error::{Result, ensure_config};
use crate::images::caps::Caps;
use crate::images::registry::{Handle, Kind};
use crate::imp::{Native, NativeObject, created, gl};
use crate::pixel_formats::Format;

pub type DepthId = Handle<Depth>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DepthNative {
    Renderbuffer(NativeObject),
    Texture(NativeObject),
}

#[derive(Debug)]
pub struct Depth {
    format: Format,
    width: u32,
    height: u32,
    readable: bool,
    native: Option<DepthNative>,
}

impl Kind for Depth {
    const KIND: &'static str = "depth";
}

impl Depth {
    pub(crate) fn validate(
        caps: &Caps,
        format: Format,
        width: u32,
        height: u32,
        readable: bool,
    ) -> Result<()> {
        ensure_config!(
            format.is_depth(),
            "{format:?} is not a depth format; use Depth or DepthStencil"
        );
        ensure_config!(width > 0, "depth width is missing");
        ensure_config!(height > 0, "depth height is missing");
        ensure_config!(
            width.is_power_of_two(),
            "depth width {width} is not a power of two"
        );
        ensure_config!(
            height.is_power_of_two(),
            "depth height {height} is not a power of two"
        );
        ensure_config!(
            width <= caps.depth_max_size && height <= caps.depth_max_size,
            "depth size {width}x{height} exceeds the maximum of {}",
            caps.depth_max_size
        );
        ensure_config!(
            !readable || caps.readable_depth,
            "readable depth is not supported on this device"
        );
        Ok(())
    }

    pub(crate) fn create<N: Native>(
        native: &mut N,
        caps: &Caps,
        format: Format,
        width: u32,
        height: u32,
        readable: bool,
    ) -> Result<Depth> {
        Self::validate(caps, format, width, height, readable)?;
        let mut depth = Depth {
            format,
            width,
            height,
            readable,
            native: None,
        };
        depth.allocate(native)?;
        Ok(depth)
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether samplers may bind this depth.
    pub fn readable(&self) -> bool {
        self.readable
    }

    /// Native texture of a readable depth.
    pub fn native_texture(&self) -> Option<NativeObject> {
        match self.native {
            Some(DepthNative::Texture(t)) => Some(t),
            _ => None,
        }
    }

    fn allocate<N: Native>(&mut self, native: &mut N) -> Result<()> {
        if self.readable {
            let texture = created(native.create_texture(), "create depth texture")?;
            native.bind_texture(gl::TEXTURE_2D, Some(texture));
            for parameter in [gl::TEXTURE_WRAP_S, gl::TEXTURE_WRAP_T] {
                native.tex_parameter_i32(gl::TEXTURE_2D, parameter, gl::CLAMP_TO_EDGE as i32);
            }
            for parameter in [gl::TEXTURE_MIN_FILTER, gl::TEXTURE_MAG_FILTER] {
                native.tex_parameter_i32(gl::TEXTURE_2D, parameter, gl::NEAREST as i32);
            }
            native.tex_image_2d(
                gl::TEXTURE_2D,
                0,
                self.format.native_format(),
                self.width,
                self.height,
                self.format.native_format(),
                self.format.native_type(),
                None,
            );
            self.native = Some(DepthNative::Texture(texture));
        } else {
            let renderbuffer = created(native.create_renderbuffer(), "create depth renderbuffer")?;
            native.bind_renderbuffer(Some(renderbuffer));
            if let Some(storage) = self.format.renderbuffer_format() {
                native.renderbuffer_storage(storage, self.width, self.height);
            }
            self.native = Some(DepthNative::Renderbuffer(renderbuffer));
        }
        Ok(())
    }

    /// Attaches to the bound framebuffer, or detaches with `attach == false`.
    pub(crate) fn attach<N: Native>(&self, native: &mut N, attach: bool) {
        let Some(point) = self.format.depth_attachment() else {
            return;
        };
        match self.native {
            Some(DepthNative::Texture(t)) => {
                native.framebuffer_texture_2d(point, gl::TEXTURE_2D, attach.then_some(t), 0)
            }
            Some(DepthNative::Renderbuffer(r)) => {
                native.framebuffer_renderbuffer(point, attach.then_some(r))
            }
            None => {}
        }
    }

    pub(crate) fn restore<N: Native>(&mut self, native: &mut N) -> Result<()> {
        self.native = None;
        self.allocate(native)
    }

    pub(crate) fn release<N: Native>(&mut self, native: &mut N) {
        match self.native.take() {
            Some(DepthNative::Texture(t)) => native.delete_texture(t),
            Some(DepthNative::Renderbuffer(r)) => native.delete_renderbuffer(r),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_names_the_constraint() {
        let mut caps = Caps::baseline();
        caps.depth_max_size = 1024;
        let e = Depth::validate(&caps, Format::Depth, 100, 64, false).unwrap_err();
        assert!(e.to_string().contains("power of two"));
        let e = Depth::validate(&caps, Format::Depth, 2048, 64, false).unwrap_err();
        assert!(e.to_string().contains("maximum"));
        let e = Depth::validate(&caps, Format::Rgba, 64, 64, false).unwrap_err();
        assert!(e.to_string().contains("not a depth format"));
        let e = Depth::validate(&caps, Format::Depth, 64, 64, true).unwrap_err();
        assert!(e.to_string().contains("readable"));
        let e = Depth::validate(&caps, Format::Depth, 0, 64, false).unwrap_err();
        assert!(e.to_string().contains("missing"));
        assert!(Depth::validate(&caps, Format::DepthStencil, 64, 1024, false).is_ok());
    }
}
