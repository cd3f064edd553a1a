// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Native graphics backends.

The core never talks to a graphics API directly; it issues WebGL-shaped commands through
[`Native`].  [`headless::HeadlessContext`] is a software implementation that is always
available; the `backend_glow` feature adds [`glow::GlowContext`] over a live GL context.
*/

pub mod gl;
pub mod headless;
#[cfg(feature = "backend_glow")]
pub mod glow;

use std::num::NonZeroU32;

/// An opaque native object name (texture, renderbuffer, framebuffer, buffer, shader or program).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeObject(pub NonZeroU32);

/// An opaque uniform location within a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// One active attribute or uniform, as reported by program reflection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveVariable {
    pub name: String,
    /// Native type code, e.g. [`gl::FLOAT_VEC3`].
    pub ty: u32,
    /// Array length; 1 for non-arrays.
    pub size: u32,
}

/// Implementation limits, queried once per context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeLimits {
    pub max_texture_size: u32,
    pub max_cube_map_size: u32,
    pub max_renderbuffer_size: u32,
    pub max_texture_units: u32,
    /// Only meaningful with `WEBGL_draw_buffers`.
    pub max_draw_buffers: u32,
    /// Only meaningful with `EXT_texture_filter_anisotropic`.
    pub max_anisotropy: f32,
}

/**
Settings requested when the native context is created (and re-created after loss).

```
use stages_and_passes::imp::ContextSettings;
let settings = ContextSettings::default().with_antialias(false).with_stencil(true);
assert!(!settings.antialias);
assert!(settings.stencil);
```
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextSettings {
    pub alpha: bool,
    pub depth: bool,
    pub stencil: bool,
    pub antialias: bool,
    pub premultiplied_alpha: bool,
    pub preserve_drawing_buffer: bool,
    pub prefer_low_power: bool,
    pub fail_if_major_performance_caveat: bool,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            alpha: true,
            depth: true,
            stencil: false,
            antialias: true,
            premultiplied_alpha: true,
            preserve_drawing_buffer: false,
            prefer_low_power: false,
            fail_if_major_performance_caveat: false,
        }
    }
}

impl ContextSettings {
    pub fn with_alpha(mut self, alpha: bool) -> Self {
        self.alpha = alpha;
        self
    }
    pub fn with_depth(mut self, depth: bool) -> Self {
        self.depth = depth;
        self
    }
    pub fn with_stencil(mut self, stencil: bool) -> Self {
        self.stencil = stencil;
        self
    }
    pub fn with_antialias(mut self, antialias: bool) -> Self {
        self.antialias = antialias;
        self
    }
    pub fn with_premultiplied_alpha(mut self, premultiplied_alpha: bool) -> Self {
        self.premultiplied_alpha = premultiplied_alpha;
        self
    }
    pub fn with_preserve_drawing_buffer(mut self, preserve: bool) -> Self {
        self.preserve_drawing_buffer = preserve;
        self
    }
    pub fn with_prefer_low_power(mut self, prefer_low_power: bool) -> Self {
        self.prefer_low_power = prefer_low_power;
        self
    }
    pub fn with_fail_if_major_performance_caveat(mut self, fail: bool) -> Self {
        self.fail_if_major_performance_caveat = fail;
        self
    }
}

/**
The immediate-mode command interface consumed by the core.

The shape follows WebGL 1 plus the extensions the core queries.  Calls never fail
synchronously except object creation; failures are reported through [`Native::get_error`],
which the core polls after each unit of work.

While the context is lost, implementations must accept and ignore every call.
*/
pub trait Native {
    // context
    fn limits(&mut self) -> NativeLimits;
    fn extensions(&mut self) -> Vec<String>;
    /// Size of the default drawing buffer.
    fn drawing_buffer_size(&mut self) -> (u32, u32);
    fn get_error(&mut self) -> u32;
    fn is_context_lost(&mut self) -> bool;
    /// Forces a loss, as `WEBGL_lose_context.loseContext()`.  Returns false if unsupported.
    fn lose_context(&mut self) -> bool;
    /// Re-creates a lost context with the given settings.  Every prior object is gone.
    fn restore_context(&mut self, settings: &ContextSettings) -> bool;

    // textures
    fn create_texture(&mut self) -> Result<NativeObject, String>;
    fn delete_texture(&mut self, texture: NativeObject);
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, target: u32, texture: Option<NativeObject>);
    #[allow(clippy::too_many_arguments)]
    fn tex_image_2d(
        &mut self,
        target: u32,
        level: u32,
        internal_format: u32,
        width: u32,
        height: u32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    );
    fn compressed_tex_image_2d(
        &mut self,
        target: u32,
        level: u32,
        internal_format: u32,
        width: u32,
        height: u32,
        data: &[u8],
    );
    fn tex_parameter_i32(&mut self, target: u32, parameter: u32, value: i32);
    fn tex_parameter_f32(&mut self, target: u32, parameter: u32, value: f32);
    fn generate_mipmap(&mut self, target: u32);

    // renderbuffers
    fn create_renderbuffer(&mut self) -> Result<NativeObject, String>;
    fn delete_renderbuffer(&mut self, renderbuffer: NativeObject);
    fn bind_renderbuffer(&mut self, renderbuffer: Option<NativeObject>);
    fn renderbuffer_storage(&mut self, internal_format: u32, width: u32, height: u32);

    // framebuffers
    fn create_framebuffer(&mut self) -> Result<NativeObject, String>;
    fn delete_framebuffer(&mut self, framebuffer: NativeObject);
    fn bind_framebuffer(&mut self, framebuffer: Option<NativeObject>);
    fn framebuffer_texture_2d(
        &mut self,
        attachment: u32,
        texture_target: u32,
        texture: Option<NativeObject>,
        level: u32,
    );
    fn framebuffer_renderbuffer(&mut self, attachment: u32, renderbuffer: Option<NativeObject>);
    fn check_framebuffer_status(&mut self) -> u32;
    fn draw_buffers(&mut self, buffers: &[u32]);

    // shaders and programs
    fn create_shader(&mut self, kind: u32) -> Result<NativeObject, String>;
    fn shader_source(&mut self, shader: NativeObject, source: &str);
    fn compile_shader(&mut self, shader: NativeObject);
    fn get_shader_compile_status(&mut self, shader: NativeObject) -> bool;
    fn get_shader_info_log(&mut self, shader: NativeObject) -> String;
    fn delete_shader(&mut self, shader: NativeObject);
    fn create_program(&mut self) -> Result<NativeObject, String>;
    fn attach_shader(&mut self, program: NativeObject, shader: NativeObject);
    fn link_program(&mut self, program: NativeObject);
    fn get_program_link_status(&mut self, program: NativeObject) -> bool;
    fn get_program_info_log(&mut self, program: NativeObject) -> String;
    fn delete_program(&mut self, program: NativeObject);
    fn use_program(&mut self, program: Option<NativeObject>);
    fn active_attributes(&mut self, program: NativeObject) -> Vec<ActiveVariable>;
    fn active_uniforms(&mut self, program: NativeObject) -> Vec<ActiveVariable>;
    fn get_attrib_location(&mut self, program: NativeObject, name: &str) -> Option<u32>;
    fn get_uniform_location(&mut self, program: NativeObject, name: &str)
    -> Option<UniformLocation>;

    // uniform upload, into the program in use
    fn uniform_1_i32(&mut self, location: UniformLocation, value: i32);
    fn uniform_i32_slice(&mut self, location: UniformLocation, components: u32, values: &[i32]);
    fn uniform_f32_slice(&mut self, location: UniformLocation, components: u32, values: &[f32]);
    fn uniform_matrix_f32_slice(&mut self, location: UniformLocation, order: u32, values: &[f32]);

    // buffers and attributes
    fn create_buffer(&mut self) -> Result<NativeObject, String>;
    fn delete_buffer(&mut self, buffer: NativeObject);
    fn bind_buffer(&mut self, target: u32, buffer: Option<NativeObject>);
    fn buffer_data(&mut self, target: u32, data: &[u8], usage: u32);
    fn enable_vertex_attrib_array(&mut self, index: u32);
    fn disable_vertex_attrib_array(&mut self, index: u32);
    #[allow(clippy::too_many_arguments)]
    fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: u32,
        ty: u32,
        normalized: bool,
        stride: u32,
        offset: u32,
    );

    // fixed function state
    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32);
    fn enable(&mut self, capability: u32);
    fn disable(&mut self, capability: u32);
    fn blend_func(&mut self, source: u32, destination: u32);
    fn cull_face(&mut self, face: u32);
    fn depth_func(&mut self, function: u32);
    fn depth_mask(&mut self, write: bool);
    fn color_mask(&mut self, r: bool, g: bool, b: bool, a: bool);
    fn stencil_mask(&mut self, mask: u32);
    fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32);
    fn clear_depth(&mut self, depth: f32);
    fn clear_stencil(&mut self, stencil: i32);
    fn clear(&mut self, mask: u32);

    // draws
    fn draw_arrays(&mut self, mode: u32, first: u32, count: u32);
    fn draw_elements(&mut self, mode: u32, count: u32, ty: u32, offset: u32);
}

/// Converts an object creation failure into a native error.
///
/// Creation only fails when the context is gone, so the error carries `CONTEXT_LOST_WEBGL`.
pub(crate) fn created(
    result: Result<NativeObject, String>,
    during: &'static str,
) -> crate::error::Result<NativeObject> {
    result.map_err(|message| {
        logwise::error_sync!(
            "native object creation failed during {during}: {message}",
            during = during,
            message = logwise::privacy::LogIt(&message)
        );
        crate::error::Error::Native {
            code: gl::CONTEXT_LOST_WEBGL,
            during,
        }
    })
}
