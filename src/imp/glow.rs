// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
[`Native`] over a live OpenGL or WebGL context, through [`glow`].

glow objects are mapped to [`NativeObject`] names so the core never sees backend types.
The host owns context creation: it reports the surface size with
[`GlowContext::resize`], forwards loss events with [`GlowContext::mark_lost`], and hands
over a freshly created context with [`GlowContext::replace_context`] before the device
restores.
*/

use super::gl;
use super::{ActiveVariable, ContextSettings, Native, NativeLimits, NativeObject, UniformLocation};
use glow::HasContext;
use std::collections::HashMap;
use std::num::NonZeroU32;

type GlTexture = <glow::Context as HasContext>::Texture;
type GlRenderbuffer = <glow::Context as HasContext>::Renderbuffer;
type GlFramebuffer = <glow::Context as HasContext>::Framebuffer;
type GlShader = <glow::Context as HasContext>::Shader;
type GlProgram = <glow::Context as HasContext>::Program;
type GlBuffer = <glow::Context as HasContext>::Buffer;
type GlUniformLocation = <glow::Context as HasContext>::UniformLocation;

#[derive(Debug)]
struct Table<T> {
    objects: HashMap<NativeObject, T>,
}

impl<T: Copy> Table<T> {
    fn get(&self, name: NativeObject) -> Option<T> {
        self.objects.get(&name).copied()
    }

    fn lookup(&self, name: Option<NativeObject>) -> Option<T> {
        name.and_then(|n| self.get(n))
    }
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            objects: HashMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Objects {
    textures: Table<GlTexture>,
    renderbuffers: Table<GlRenderbuffer>,
    framebuffers: Table<GlFramebuffer>,
    shaders: Table<GlShader>,
    programs: Table<GlProgram>,
    buffers: Table<GlBuffer>,
    locations: HashMap<u32, GlUniformLocation>,
}

pub struct GlowContext {
    gl: glow::Context,
    pending: Option<glow::Context>,
    width: u32,
    height: u32,
    lost: bool,
    next_name: u32,
    next_location: u32,
    objects: Objects,
}

impl std::fmt::Debug for GlowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlowContext")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("lost", &self.lost)
            .finish_non_exhaustive()
    }
}

impl GlowContext {
    /// Wraps `gl`, whose default framebuffer is `width`×`height`.
    ///
    /// # Safety
    ///
    /// `gl` must be current on this thread for as long as the returned value issues calls.
    pub unsafe fn new(gl: glow::Context, width: u32, height: u32) -> Self {
        Self {
            gl,
            pending: None,
            width,
            height,
            lost: false,
            next_name: 0,
            next_location: 0,
            objects: Objects::default(),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Records a loss reported by the host.
    pub fn mark_lost(&mut self) {
        self.lost = true;
    }

    /// Provides the context that replaces a lost one at the next restore.
    ///
    /// # Safety
    ///
    /// Same as [`GlowContext::new`].
    pub unsafe fn replace_context(&mut self, gl: glow::Context) {
        self.pending = Some(gl);
    }

    fn name(&mut self) -> NativeObject {
        self.next_name += 1;
        NativeObject(NonZeroU32::MIN.saturating_add(self.next_name - 1))
    }

    fn register<T>(&mut self, created: Result<T, String>, pick: fn(&mut Objects) -> &mut Table<T>) -> Result<NativeObject, String> {
        if self.lost {
            return Err("context is lost".to_string());
        }
        let object = created?;
        let name = self.name();
        pick(&mut self.objects).objects.insert(name, object);
        Ok(name)
    }
}

// SAFETY (for every block below): `new` and `replace_context` require the wrapped context to be
// current, and every object passed to glow was created by that same context.
impl Native for GlowContext {
    fn limits(&mut self) -> NativeLimits {
        let anisotropic = self.gl.supported_extensions().iter().any(|e| e.ends_with("texture_filter_anisotropic"));
        unsafe {
            NativeLimits {
                max_texture_size: self.gl.get_parameter_i32(gl::MAX_TEXTURE_SIZE).max(0) as u32,
                max_cube_map_size: self.gl.get_parameter_i32(gl::MAX_CUBE_MAP_TEXTURE_SIZE).max(0) as u32,
                max_renderbuffer_size: self.gl.get_parameter_i32(gl::MAX_RENDERBUFFER_SIZE).max(0) as u32,
                max_texture_units: self.gl.get_parameter_i32(gl::MAX_TEXTURE_IMAGE_UNITS).max(0) as u32,
                max_draw_buffers: self.gl.get_parameter_i32(gl::MAX_DRAW_BUFFERS).max(1) as u32,
                max_anisotropy: if anisotropic {
                    self.gl.get_parameter_f32(gl::MAX_TEXTURE_MAX_ANISOTROPY_EXT)
                } else {
                    1.0
                },
            }
        }
    }

    fn extensions(&mut self) -> Vec<String> {
        let mut extensions: Vec<String> = self.gl.supported_extensions().iter().cloned().collect();
        extensions.sort();
        extensions
    }

    fn drawing_buffer_size(&mut self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn get_error(&mut self) -> u32 {
        let code = unsafe { self.gl.get_error() };
        if code == gl::CONTEXT_LOST_WEBGL {
            self.lost = true;
        }
        code
    }

    fn is_context_lost(&mut self) -> bool {
        self.lost
    }

    fn lose_context(&mut self) -> bool {
        false
    }

    fn restore_context(&mut self, _settings: &ContextSettings) -> bool {
        let Some(gl) = self.pending.take() else {
            return false;
        };
        self.gl = gl;
        self.objects = Objects::default();
        self.lost = false;
        true
    }

    fn create_texture(&mut self) -> Result<NativeObject, String> {
        let created = unsafe { self.gl.create_texture() };
        self.register(created, |o| &mut o.textures)
    }

    fn delete_texture(&mut self, texture: NativeObject) {
        if let Some(t) = self.objects.textures.objects.remove(&texture) {
            unsafe { self.gl.delete_texture(t) }
        }
    }

    fn active_texture(&mut self, unit: u32) {
        unsafe { self.gl.active_texture(unit) }
    }

    fn bind_texture(&mut self, target: u32, texture: Option<NativeObject>) {
        let t = self.objects.textures.lookup(texture);
        unsafe { self.gl.bind_texture(target, t) }
    }

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
    ) {
        unsafe {
            self.gl.tex_image_2d(
                target,
                level as i32,
                internal_format as i32,
                width as i32,
                height as i32,
                0,
                format,
                ty,
                pixels,
            )
        }
    }

    fn compressed_tex_image_2d(
        &mut self,
        target: u32,
        level: u32,
        internal_format: u32,
        width: u32,
        height: u32,
        data: &[u8],
    ) {
        unsafe {
            self.gl.compressed_tex_image_2d(
                target,
                level as i32,
                internal_format as i32,
                width as i32,
                height as i32,
                0,
                data.len() as i32,
                data,
            )
        }
    }

    fn tex_parameter_i32(&mut self, target: u32, parameter: u32, value: i32) {
        unsafe { self.gl.tex_parameter_i32(target, parameter, value) }
    }

    fn tex_parameter_f32(&mut self, target: u32, parameter: u32, value: f32) {
        unsafe { self.gl.tex_parameter_f32(target, parameter, value) }
    }

    fn generate_mipmap(&mut self, target: u32) {
        unsafe { self.gl.generate_mipmap(target) }
    }

    fn create_renderbuffer(&mut self) -> Result<NativeObject, String> {
        let created = unsafe { self.gl.create_renderbuffer() };
        self.register(created, |o| &mut o.renderbuffers)
    }

    fn delete_renderbuffer(&mut self, renderbuffer: NativeObject) {
        if let Some(r) = self.objects.renderbuffers.objects.remove(&renderbuffer) {
            unsafe { self.gl.delete_renderbuffer(r) }
        }
    }

    fn bind_renderbuffer(&mut self, renderbuffer: Option<NativeObject>) {
        let r = self.objects.renderbuffers.lookup(renderbuffer);
        unsafe { self.gl.bind_renderbuffer(gl::RENDERBUFFER, r) }
    }

    fn renderbuffer_storage(&mut self, internal_format: u32, width: u32, height: u32) {
        unsafe {
            self.gl
                .renderbuffer_storage(gl::RENDERBUFFER, internal_format, width as i32, height as i32)
        }
    }

    fn create_framebuffer(&mut self) -> Result<NativeObject, String> {
        let created = unsafe { self.gl.create_framebuffer() };
        self.register(created, |o| &mut o.framebuffers)
    }

    fn delete_framebuffer(&mut self, framebuffer: NativeObject) {
        if let Some(f) = self.objects.framebuffers.objects.remove(&framebuffer) {
            unsafe { self.gl.delete_framebuffer(f) }
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<NativeObject>) {
        let f = self.objects.framebuffers.lookup(framebuffer);
        unsafe { self.gl.bind_framebuffer(gl::FRAMEBUFFER, f) }
    }

    fn framebuffer_texture_2d(
        &mut self,
        attachment: u32,
        texture_target: u32,
        texture: Option<NativeObject>,
        level: u32,
    ) {
        let t = self.objects.textures.lookup(texture);
        unsafe {
            self.gl
                .framebuffer_texture_2d(gl::FRAMEBUFFER, attachment, texture_target, t, level as i32)
        }
    }

    fn framebuffer_renderbuffer(&mut self, attachment: u32, renderbuffer: Option<NativeObject>) {
        let r = self.objects.renderbuffers.lookup(renderbuffer);
        unsafe {
            self.gl
                .framebuffer_renderbuffer(gl::FRAMEBUFFER, attachment, gl::RENDERBUFFER, r)
        }
    }

    fn check_framebuffer_status(&mut self) -> u32 {
        unsafe { self.gl.check_framebuffer_status(gl::FRAMEBUFFER) }
    }

    fn draw_buffers(&mut self, buffers: &[u32]) {
        unsafe { self.gl.draw_buffers(buffers) }
    }

    fn create_shader(&mut self, kind: u32) -> Result<NativeObject, String> {
        let created = unsafe { self.gl.create_shader(kind) };
        self.register(created, |o| &mut o.shaders)
    }

    fn shader_source(&mut self, shader: NativeObject, source: &str) {
        if let Some(s) = self.objects.shaders.get(shader) {
            unsafe { self.gl.shader_source(s, source) }
        }
    }

    fn compile_shader(&mut self, shader: NativeObject) {
        if let Some(s) = self.objects.shaders.get(shader) {
            unsafe { self.gl.compile_shader(s) }
        }
    }

    fn get_shader_compile_status(&mut self, shader: NativeObject) -> bool {
        self.objects
            .shaders
            .get(shader)
            .is_some_and(|s| unsafe { self.gl.get_shader_compile_status(s) })
    }

    fn get_shader_info_log(&mut self, shader: NativeObject) -> String {
        self.objects
            .shaders
            .get(shader)
            .map(|s| unsafe { self.gl.get_shader_info_log(s) })
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: NativeObject) {
        if let Some(s) = self.objects.shaders.objects.remove(&shader) {
            unsafe { self.gl.delete_shader(s) }
        }
    }

    fn create_program(&mut self) -> Result<NativeObject, String> {
        let created = unsafe { self.gl.create_program() };
        self.register(created, |o| &mut o.programs)
    }

    fn attach_shader(&mut self, program: NativeObject, shader: NativeObject) {
        if let (Some(p), Some(s)) = (self.objects.programs.get(program), self.objects.shaders.get(shader)) {
            unsafe { self.gl.attach_shader(p, s) }
        }
    }

    fn link_program(&mut self, program: NativeObject) {
        if let Some(p) = self.objects.programs.get(program) {
            unsafe { self.gl.link_program(p) }
        }
    }

    fn get_program_link_status(&mut self, program: NativeObject) -> bool {
        self.objects
            .programs
            .get(program)
            .is_some_and(|p| unsafe { self.gl.get_program_link_status(p) })
    }

    fn get_program_info_log(&mut self, program: NativeObject) -> String {
        self.objects
            .programs
            .get(program)
            .map(|p| unsafe { self.gl.get_program_info_log(p) })
            .unwrap_or_default()
    }

    fn delete_program(&mut self, program: NativeObject) {
        if let Some(p) = self.objects.programs.objects.remove(&program) {
            unsafe { self.gl.delete_program(p) }
        }
    }

    fn use_program(&mut self, program: Option<NativeObject>) {
        let p = self.objects.programs.lookup(program);
        unsafe { self.gl.use_program(p) }
    }

    fn active_attributes(&mut self, program: NativeObject) -> Vec<ActiveVariable> {
        let Some(p) = self.objects.programs.get(program) else {
            return Vec::new();
        };
        unsafe {
            (0..self.gl.get_active_attributes(p))
                .filter_map(|i| self.gl.get_active_attribute(p, i))
                .map(|a| ActiveVariable {
                    name: a.name,
                    ty: a.atype,
                    size: a.size.max(1) as u32,
                })
                .collect()
        }
    }

    fn active_uniforms(&mut self, program: NativeObject) -> Vec<ActiveVariable> {
        let Some(p) = self.objects.programs.get(program) else {
            return Vec::new();
        };
        unsafe {
            (0..self.gl.get_active_uniforms(p))
                .filter_map(|i| self.gl.get_active_uniform(p, i))
                .map(|u| ActiveVariable {
                    name: u.name,
                    ty: u.utype,
                    size: u.size.max(1) as u32,
                })
                .collect()
        }
    }

    fn get_attrib_location(&mut self, program: NativeObject, name: &str) -> Option<u32> {
        let p = self.objects.programs.get(program)?;
        unsafe { self.gl.get_attrib_location(p, name) }
    }

    fn get_uniform_location(
        &mut self,
        program: NativeObject,
        name: &str,
    ) -> Option<UniformLocation> {
        let p = self.objects.programs.get(program)?;
        let location = unsafe { self.gl.get_uniform_location(p, name) }?;
        self.next_location += 1;
        self.objects.locations.insert(self.next_location, location);
        Some(UniformLocation(self.next_location))
    }

    fn uniform_1_i32(&mut self, location: UniformLocation, value: i32) {
        let l = self.objects.locations.get(&location.0);
        unsafe { self.gl.uniform_1_i32(l, value) }
    }

    fn uniform_i32_slice(&mut self, location: UniformLocation, components: u32, values: &[i32]) {
        let l = self.objects.locations.get(&location.0);
        unsafe {
            match components {
                1 => self.gl.uniform_1_i32_slice(l, values),
                2 => self.gl.uniform_2_i32_slice(l, values),
                3 => self.gl.uniform_3_i32_slice(l, values),
                _ => self.gl.uniform_4_i32_slice(l, values),
            }
        }
    }

    fn uniform_f32_slice(&mut self, location: UniformLocation, components: u32, values: &[f32]) {
        let l = self.objects.locations.get(&location.0);
        unsafe {
            match components {
                1 => self.gl.uniform_1_f32_slice(l, values),
                2 => self.gl.uniform_2_f32_slice(l, values),
                3 => self.gl.uniform_3_f32_slice(l, values),
                _ => self.gl.uniform_4_f32_slice(l, values),
            }
        }
    }

    fn uniform_matrix_f32_slice(&mut self, location: UniformLocation, order: u32, values: &[f32]) {
        let l = self.objects.locations.get(&location.0);
        unsafe {
            match order {
                2 => self.gl.uniform_matrix_2_f32_slice(l, false, values),
                3 => self.gl.uniform_matrix_3_f32_slice(l, false, values),
                _ => self.gl.uniform_matrix_4_f32_slice(l, false, values),
            }
        }
    }

    fn create_buffer(&mut self) -> Result<NativeObject, String> {
        let created = unsafe { self.gl.create_buffer() };
        self.register(created, |o| &mut o.buffers)
    }

    fn delete_buffer(&mut self, buffer: NativeObject) {
        if let Some(b) = self.objects.buffers.objects.remove(&buffer) {
            unsafe { self.gl.delete_buffer(b) }
        }
    }

    fn bind_buffer(&mut self, target: u32, buffer: Option<NativeObject>) {
        let b = self.objects.buffers.lookup(buffer);
        unsafe { self.gl.bind_buffer(target, b) }
    }

    fn buffer_data(&mut self, target: u32, data: &[u8], usage: u32) {
        unsafe { self.gl.buffer_data_u8_slice(target, data, usage) }
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(index) }
    }

    fn disable_vertex_attrib_array(&mut self, index: u32) {
        unsafe { self.gl.disable_vertex_attrib_array(index) }
    }

    fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: u32,
        ty: u32,
        normalized: bool,
        stride: u32,
        offset: u32,
    ) {
        unsafe {
            self.gl.vertex_attrib_pointer_f32(
                index,
                size as i32,
                ty,
                normalized,
                stride as i32,
                offset as i32,
            )
        }
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        unsafe { self.gl.viewport(x, y, width as i32, height as i32) }
    }

    fn enable(&mut self, capability: u32) {
        unsafe { self.gl.enable(capability) }
    }

    fn disable(&mut self, capability: u32) {
        unsafe { self.gl.disable(capability) }
    }

    fn blend_func(&mut self, source: u32, destination: u32) {
        unsafe { self.gl.blend_func(source, destination) }
    }

    fn cull_face(&mut self, face: u32) {
        unsafe { self.gl.cull_face(face) }
    }

    fn depth_func(&mut self, function: u32) {
        unsafe { self.gl.depth_func(function) }
    }

    fn depth_mask(&mut self, write: bool) {
        unsafe { self.gl.depth_mask(write) }
    }

    fn color_mask(&mut self, r: bool, g: bool, b: bool, a: bool) {
        unsafe { self.gl.color_mask(r, g, b, a) }
    }

    fn stencil_mask(&mut self, mask: u32) {
        unsafe { self.gl.stencil_mask(mask) }
    }

    fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        unsafe { self.gl.clear_color(r, g, b, a) }
    }

    fn clear_depth(&mut self, depth: f32) {
        unsafe { self.gl.clear_depth_f32(depth) }
    }

    fn clear_stencil(&mut self, stencil: i32) {
        unsafe { self.gl.clear_stencil(stencil) }
    }

    fn clear(&mut self, mask: u32) {
        unsafe { self.gl.clear(mask) }
    }

    fn draw_arrays(&mut self, mode: u32, first: u32, count: u32) {
        unsafe { self.gl.draw_arrays(mode, first as i32, count as i32) }
    }

    fn draw_elements(&mut self, mode: u32, count: u32, ty: u32, offset: u32) {
        unsafe { self.gl.draw_elements(mode, count as i32, ty, offset as i32) }
    }
}
