// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Render targets.

A [`Target`] is a framebuffer: an ordered list of color mips and an optional depth.
Attachments are validated and changed through [`crate::images::Device`], which can see the
textures and depths they name.  The device's default target is the drawing buffer and
cannot be re-attached.
*/

use crate::error::{Error, Result};
use crate::images::depth::{Depth, DepthId};
use crate::images::registry::{Handle, Kind};
use crate::images::texture::{MipRef, TextureId};
use crate::imp::{Native, NativeObject, created, gl};

pub type TargetId = Handle<Target>;

/// A color attachment resolved to its native texture image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NativeColor {
    pub(crate) texture: NativeObject,
    pub(crate) face_target: u32,
    pub(crate) level: u32,
}

#[derive(Debug)]
pub struct Target {
    colors: Vec<MipRef>,
    depth: Option<DepthId>,
    size: Option<(u32, u32)>,
    default: bool,
    native: Option<NativeObject>,
}

impl Kind for Target {
    const KIND: &'static str = "target";
}

impl Target {
    /// The drawing buffer.
    pub(crate) fn drawing_buffer(width: u32, height: u32) -> Target {
        Target {
            colors: Vec::new(),
            depth: None,
            size: Some((width, height)),
            default: true,
            native: None,
        }
    }

    pub(crate) fn create<N: Native>(native: &mut N) -> Result<Target> {
        Ok(Target {
            colors: Vec::new(),
            depth: None,
            size: None,
            default: false,
            native: Some(created(native.create_framebuffer(), "create framebuffer")?),
        })
    }

    pub fn colors(&self) -> &[MipRef] {
        &self.colors
    }

    pub fn depth(&self) -> Option<DepthId> {
        self.depth
    }

    /// Shared size of the attachments; `None` while nothing is attached.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    pub fn width(&self) -> Option<u32> {
        self.size.map(|s| s.0)
    }

    pub fn height(&self) -> Option<u32> {
        self.size.map(|s| s.1)
    }

    pub fn is_default(&self) -> bool {
        self.default
    }

    pub fn native(&self) -> Option<NativeObject> {
        self.native
    }

    pub(crate) fn set_default_size(&mut self, width: u32, height: u32) {
        if self.default {
            self.size = Some((width, height));
        }
    }

    fn recompute_size(&mut self, color_size: Option<(u32, u32)>, depth_size: Option<(u32, u32)>) {
        self.size = color_size.or(depth_size);
    }

    /// Replaces the color attachments; old attachments are detached before new ones attach.
    pub(crate) fn attach_colors<N: Native>(
        &mut self,
        native: &mut N,
        colors: Vec<MipRef>,
        resolved: &[NativeColor],
        size: Option<(u32, u32)>,
        depth_size: Option<(u32, u32)>,
    ) -> Result<()> {
        let old_count = self.colors.len();
        native.bind_framebuffer(self.native);
        for i in 0..old_count {
            native.framebuffer_texture_2d(gl::COLOR_ATTACHMENT0 + i as u32, gl::TEXTURE_2D, None, 0);
        }
        self.colors.clear();
        for (i, color) in resolved.iter().enumerate() {
            native.framebuffer_texture_2d(
                gl::COLOR_ATTACHMENT0 + i as u32,
                color.face_target,
                Some(color.texture),
                color.level,
            );
        }
        if resolved.len() > 1 || old_count > 1 {
            let buffers: Vec<u32> = (0..resolved.len() as u32)
                .map(|i| gl::COLOR_ATTACHMENT0 + i)
                .collect();
            native.draw_buffers(&buffers);
        }
        if let Err(e) = self.check_complete(native, !resolved.is_empty()) {
            for i in 0..resolved.len() {
                native.framebuffer_texture_2d(gl::COLOR_ATTACHMENT0 + i as u32, gl::TEXTURE_2D, None, 0);
            }
            self.recompute_size(None, depth_size);
            return Err(e);
        }
        self.colors = colors;
        self.recompute_size(size, depth_size);
        Ok(())
    }

    /// Replaces the depth attachment.
    pub(crate) fn attach_depth<N: Native>(
        &mut self,
        native: &mut N,
        old: Option<&Depth>,
        new: Option<(DepthId, &Depth)>,
        color_size: Option<(u32, u32)>,
    ) -> Result<()> {
        native.bind_framebuffer(self.native);
        if let Some(old) = old {
            old.attach(native, false);
        }
        self.depth = None;
        if let Some((_, depth)) = new {
            depth.attach(native, true);
        }
        let depth_size = new.map(|(_, d)| d.size());
        if let Err(e) = self.check_complete(native, !self.colors.is_empty()) {
            if let Some((_, depth)) = new {
                depth.attach(native, false);
            }
            self.recompute_size(color_size, None);
            return Err(e);
        }
        self.depth = new.map(|(id, _)| id);
        self.recompute_size(color_size, depth_size);
        Ok(())
    }

    /// Forgets attachments whose resources were freed.
    pub(crate) fn forget_colors(&mut self, texture: TextureId) -> bool {
        let before = self.colors.len();
        self.colors.retain(|m| m.texture != texture);
        let changed = before != self.colors.len();
        if changed && self.colors.is_empty() && self.depth.is_none() {
            self.size = None;
        }
        changed
    }

    pub(crate) fn forget_depth(&mut self, depth: DepthId) -> bool {
        let changed = self.depth == Some(depth);
        if changed {
            self.depth = None;
            if self.colors.is_empty() {
                self.size = None;
            }
        }
        changed
    }

    fn check_complete<N: Native>(&self, native: &mut N, has_color: bool) -> Result<()> {
        //a depth-only framebuffer is incomplete until colors arrive
        if !has_color {
            return Ok(());
        }
        let status = native.check_framebuffer_status();
        if status == gl::FRAMEBUFFER_COMPLETE {
            Ok(())
        } else {
            Err(Error::config(format!(
                "framebuffer is incomplete (status 0x{status:04X})"
            )))
        }
    }

    /// Recreates the framebuffer and re-attaches resolved attachments after a restore.
    pub(crate) fn restore<N: Native>(
        &mut self,
        native: &mut N,
        resolved: &[NativeColor],
        depth: Option<&Depth>,
    ) -> Result<()> {
        if self.default {
            return Ok(());
        }
        self.native = Some(created(native.create_framebuffer(), "restore framebuffer")?);
        native.bind_framebuffer(self.native);
        for (i, color) in resolved.iter().enumerate() {
            native.framebuffer_texture_2d(
                gl::COLOR_ATTACHMENT0 + i as u32,
                color.face_target,
                Some(color.texture),
                color.level,
            );
        }
        if resolved.len() > 1 {
            let buffers: Vec<u32> = (0..resolved.len() as u32)
                .map(|i| gl::COLOR_ATTACHMENT0 + i)
                .collect();
            native.draw_buffers(&buffers);
        }
        if let Some(depth) = depth {
            depth.attach(native, true);
        }
        Ok(())
    }

    pub(crate) fn release<N: Native>(&mut self, native: &mut N) {
        if let Some(fb) = self.native.take() {
            native.delete_framebuffer(fb);
        }
    }
}
