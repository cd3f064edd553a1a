// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A software implementation of [`Native`].

`HeadlessContext` keeps enough state to behave like a conforming WebGL context from
the core's point of view: objects and their storage, framebuffer completeness,
GLSL declaration reflection, uniform values, error codes and context loss.  Nothing is
rasterized; draws are recorded as [`DrawCall`]s.

It exists so that the core can run without a GPU, which is what the test suite does.
*/

use super::gl;
use super::{ActiveVariable, ContextSettings, Native, NativeLimits, NativeObject, UniformLocation};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::num::NonZeroU32;

/// Surface size and hardware profile for a [`HeadlessContext`].
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    pub width: u32,
    pub height: u32,
    pub limits: NativeLimits,
    pub extensions: Vec<String>,
}

impl HeadlessConfig {
    /// A baseline WebGL 1 device with no extensions beyond `WEBGL_lose_context`.
    pub fn minimal(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            limits: NativeLimits {
                max_texture_size: 2048,
                max_cube_map_size: 1024,
                max_renderbuffer_size: 2048,
                max_texture_units: 8,
                max_draw_buffers: 1,
                max_anisotropy: 1.0,
            },
            extensions: vec![gl::EXT_LOSE_CONTEXT.to_string()],
        }
    }

    /// A capable device exposing every extension the core knows about.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            limits: NativeLimits {
                max_texture_size: 8192,
                max_cube_map_size: 4096,
                max_renderbuffer_size: 8192,
                max_texture_units: 16,
                max_draw_buffers: 4,
                max_anisotropy: 16.0,
            },
            extensions: [
                gl::EXT_DRAW_BUFFERS,
                gl::EXT_DEPTH_TEXTURE,
                gl::EXT_TEXTURE_FLOAT,
                gl::EXT_TEXTURE_FLOAT_LINEAR,
                gl::EXT_TEXTURE_HALF_FLOAT,
                gl::EXT_TEXTURE_HALF_FLOAT_LINEAR,
                gl::EXT_COLOR_BUFFER_FLOAT,
                gl::EXT_COLOR_BUFFER_HALF_FLOAT,
                gl::EXT_ANISOTROPIC,
                gl::EXT_S3TC,
                gl::EXT_ELEMENT_INDEX_UINT,
                gl::EXT_LOSE_CONTEXT,
            ]
            .iter()
            .map(|e| e.to_string())
            .collect(),
        }
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        if !self.extensions.iter().any(|e| e == extension) {
            self.extensions.push(extension.to_string());
        }
        self
    }

    pub fn without_extension(mut self, extension: &str) -> Self {
        self.extensions.retain(|e| e != extension);
        self
    }

    pub fn with_limits(mut self, limits: NativeLimits) -> Self {
        self.limits = limits;
        self
    }
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self::full(300, 200)
    }
}

/// Write masks in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Masks {
    pub color: [bool; 4],
    pub depth: bool,
    pub stencil: u32,
}

impl Default for Masks {
    fn default() -> Self {
        Self {
            color: [true; 4],
            depth: true,
            stencil: u32::MAX,
        }
    }
}

/// One recorded draw, with the state it ran under.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub framebuffer: Option<NativeObject>,
    pub program: NativeObject,
    pub mode: u32,
    pub count: u32,
    pub indexed: bool,
    pub masks: Masks,
    /// Uploaded uniform values by declared name; never-set uniforms are absent.
    pub uniforms: BTreeMap<String, Vec<f32>>,
}

impl DrawCall {
    pub fn uniform(&self, name: &str) -> Option<&[f32]> {
        self.uniforms.get(name).map(|v| v.as_slice())
    }
}

#[derive(Debug, Clone)]
struct Level {
    internal_format: u32,
    width: u32,
    height: u32,
    ty: u32,
    data: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct TextureObject {
    target: Option<u32>,
    levels: HashMap<(u32, u32), Level>,
    parameters: HashMap<u32, f32>,
}

#[derive(Debug, Default)]
struct RenderbufferObject {
    storage: Option<(u32, u32, u32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attachment {
    Texture {
        texture: NativeObject,
        face: u32,
        level: u32,
    },
    Renderbuffer(NativeObject),
}

#[derive(Debug, Default)]
struct FramebufferObject {
    attachments: HashMap<u32, Attachment>,
    draw_buffers: Vec<u32>,
}

#[derive(Debug)]
struct ShaderObject {
    kind: u32,
    source: String,
    compiled: bool,
    log: String,
    attributes: Vec<ActiveVariable>,
    uniforms: Vec<ActiveVariable>,
}

#[derive(Debug, Default)]
struct ProgramObject {
    shaders: Vec<NativeObject>,
    linked: bool,
    log: String,
    attributes: Vec<ActiveVariable>,
    uniforms: Vec<ActiveVariable>,
    values: HashMap<u32, Vec<f32>>,
}

#[derive(Debug, Default)]
struct BufferObject {
    target: Option<u32>,
    data: Vec<u8>,
}

/// Software [`Native`] implementation.  See the module documentation.
#[derive(Debug)]
pub struct HeadlessContext {
    config: HeadlessConfig,
    settings: ContextSettings,
    lost: bool,
    generation: u32,
    next_name: u32,
    errors: Vec<u32>,
    textures: HashMap<NativeObject, TextureObject>,
    renderbuffers: HashMap<NativeObject, RenderbufferObject>,
    framebuffers: HashMap<NativeObject, FramebufferObject>,
    shaders: HashMap<NativeObject, ShaderObject>,
    programs: HashMap<NativeObject, ProgramObject>,
    buffers: HashMap<NativeObject, BufferObject>,
    active_unit: u32,
    unit_bindings: HashMap<(u32, u32), NativeObject>,
    renderbuffer: Option<NativeObject>,
    framebuffer: Option<NativeObject>,
    array_buffer: Option<NativeObject>,
    element_buffer: Option<NativeObject>,
    program: Option<NativeObject>,
    enabled_arrays: HashSet<u32>,
    capabilities: HashSet<u32>,
    masks: Masks,
    draw_calls: Vec<DrawCall>,
    clears: u32,
}

impl HeadlessContext {
    pub fn new(config: HeadlessConfig) -> Self {
        Self::with_settings(config, ContextSettings::default())
    }

    pub fn with_settings(config: HeadlessConfig, settings: ContextSettings) -> Self {
        Self {
            config,
            settings,
            lost: false,
            generation: 0,
            next_name: 0,
            errors: Vec::new(),
            textures: HashMap::new(),
            renderbuffers: HashMap::new(),
            framebuffers: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            active_unit: 0,
            unit_bindings: HashMap::new(),
            renderbuffer: None,
            framebuffer: None,
            array_buffer: None,
            element_buffer: None,
            program: None,
            enabled_arrays: HashSet::new(),
            capabilities: HashSet::new(),
            masks: Masks::default(),
            draw_calls: Vec::new(),
            clears: 0,
        }
    }

    /// Settings the current context was created with.
    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    /// How many times the context has been restored.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Changes the drawing buffer size, as resizing a canvas would.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width;
        self.config.height = height;
    }

    /// Queues an error code for the next [`Native::get_error`], as a driver would on OOM.
    pub fn inject_error(&mut self, code: u32) {
        self.errors.push(code);
    }

    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draw_calls
    }

    pub fn take_draw_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.draw_calls)
    }

    pub fn clear_count(&self) -> u32 {
        self.clears
    }

    pub fn masks(&self) -> Masks {
        self.masks
    }

    /// Texture bound to `target` on texture unit `unit`.
    pub fn bound_texture(&self, unit: u32, target: u32) -> Option<NativeObject> {
        self.unit_bindings.get(&(unit, target)).copied()
    }

    pub fn is_texture(&self, texture: NativeObject) -> bool {
        self.textures.contains_key(&texture)
    }

    pub fn is_renderbuffer(&self, renderbuffer: NativeObject) -> bool {
        self.renderbuffers.contains_key(&renderbuffer)
    }

    pub fn is_framebuffer(&self, framebuffer: NativeObject) -> bool {
        self.framebuffers.contains_key(&framebuffer)
    }

    pub fn is_program(&self, program: NativeObject) -> bool {
        self.programs.contains_key(&program)
    }

    /// Texel bytes last uploaded to `(face_target, level)`; `None` if the level is
    /// undefined or was allocated without data.
    pub fn texture_data(&self, texture: NativeObject, face_target: u32, level: u32) -> Option<&[u8]> {
        self.textures
            .get(&texture)?
            .levels
            .get(&(face_target, level))?
            .data
            .as_deref()
    }

    /// Dimensions of a defined texture level.
    pub fn texture_level_size(&self, texture: NativeObject, face_target: u32, level: u32) -> Option<(u32, u32)> {
        let l = self.textures.get(&texture)?.levels.get(&(face_target, level))?;
        Some((l.width, l.height))
    }

    pub fn texture_parameter(&self, texture: NativeObject, parameter: u32) -> Option<f32> {
        self.textures.get(&texture)?.parameters.get(&parameter).copied()
    }

    /// Value last uploaded to the named uniform of `program`.
    pub fn uniform_value(&self, program: NativeObject, name: &str) -> Option<&[f32]> {
        let p = self.programs.get(&program)?;
        let index = uniform_index(&p.uniforms, name)?;
        p.values.get(&index).map(|v| v.as_slice())
    }

    pub fn buffer_len(&self, buffer: NativeObject) -> Option<usize> {
        self.buffers.get(&buffer).map(|b| b.data.len())
    }

    /// Number of live native objects of every kind.
    pub fn live_objects(&self) -> usize {
        self.textures.len()
            + self.renderbuffers.len()
            + self.framebuffers.len()
            + self.shaders.len()
            + self.programs.len()
            + self.buffers.len()
    }

    fn has_extension(&self, extension: &str) -> bool {
        self.config.extensions.iter().any(|e| e == extension)
    }

    fn error(&mut self, code: u32) {
        //like GL, keep only the first error of each kind until polled
        if !self.errors.contains(&code) {
            self.errors.push(code);
        }
    }

    fn allocate(&mut self) -> Result<NativeObject, String> {
        if self.lost {
            return Err("context lost".to_string());
        }
        self.next_name += 1;
        NonZeroU32::new(self.next_name)
            .map(NativeObject)
            .ok_or_else(|| "object names exhausted".to_string())
    }

    fn active_bound_texture(&self, target: u32) -> Option<NativeObject> {
        let bind_target = if is_cube_face(target) {
            gl::TEXTURE_CUBE_MAP
        } else {
            target
        };
        self.unit_bindings
            .get(&(self.active_unit, bind_target))
            .copied()
    }

    fn texture_format_supported(&self, format: u32, ty: u32) -> bool {
        match ty {
            gl::UNSIGNED_BYTE => matches!(
                format,
                gl::RGBA | gl::RGB | gl::ALPHA | gl::LUMINANCE | gl::LUMINANCE_ALPHA
            ),
            gl::FLOAT => self.has_extension(gl::EXT_TEXTURE_FLOAT),
            gl::HALF_FLOAT_OES => self.has_extension(gl::EXT_TEXTURE_HALF_FLOAT),
            gl::UNSIGNED_SHORT | gl::UNSIGNED_INT => {
                format == gl::DEPTH_COMPONENT && self.has_extension(gl::EXT_DEPTH_TEXTURE)
            }
            gl::UNSIGNED_INT_24_8_WEBGL => {
                format == gl::DEPTH_STENCIL && self.has_extension(gl::EXT_DEPTH_TEXTURE)
            }
            _ => false,
        }
    }

    fn color_renderable(&self, level: &Level) -> bool {
        match (level.internal_format, level.ty) {
            (gl::RGBA | gl::RGB, gl::UNSIGNED_BYTE) => true,
            (gl::RGBA | gl::RGB, gl::FLOAT) => self.has_extension(gl::EXT_COLOR_BUFFER_FLOAT),
            (gl::RGBA | gl::RGB, gl::HALF_FLOAT_OES) => {
                self.has_extension(gl::EXT_COLOR_BUFFER_HALF_FLOAT)
            }
            _ => false,
        }
    }

    /// Resolves an attachment to (size, internal format, is texture level color-renderable).
    fn attachment_info(&self, attachment: &Attachment) -> Option<((u32, u32), u32, bool)> {
        match attachment {
            Attachment::Texture {
                texture,
                face,
                level,
            } => {
                let l = self.textures.get(texture)?.levels.get(&(*face, *level))?;
                Some(((l.width, l.height), l.internal_format, self.color_renderable(l)))
            }
            Attachment::Renderbuffer(rb) => {
                let (format, w, h) = self.renderbuffers.get(rb)?.storage?;
                Some(((w, h), format, false))
            }
        }
    }
}

fn is_cube_face(target: u32) -> bool {
    (gl::TEXTURE_CUBE_MAP_POSITIVE_X..gl::TEXTURE_CUBE_MAP_POSITIVE_X + 6).contains(&target)
}

fn bytes_per_texel(format: u32, ty: u32) -> u32 {
    let channels = match format {
        gl::RGBA => 4,
        gl::RGB => 3,
        gl::LUMINANCE_ALPHA => 2,
        _ => 1,
    };
    match ty {
        gl::FLOAT | gl::UNSIGNED_INT | gl::UNSIGNED_INT_24_8_WEBGL => 4 * channels,
        gl::HALF_FLOAT_OES | gl::UNSIGNED_SHORT => 2 * channels,
        _ => channels,
    }
}

fn compressed_len(internal_format: u32, width: u32, height: u32) -> u32 {
    let block = match internal_format {
        gl::COMPRESSED_RGBA_S3TC_DXT1_EXT => 8,
        _ => 16,
    };
    width.div_ceil(4) * height.div_ceil(4) * block
}

fn glsl_type(name: &str) -> Option<u32> {
    Some(match name {
        "float" => gl::FLOAT,
        "vec2" => gl::FLOAT_VEC2,
        "vec3" => gl::FLOAT_VEC3,
        "vec4" => gl::FLOAT_VEC4,
        "int" => gl::INT,
        "ivec2" => gl::INT_VEC2,
        "ivec3" => gl::INT_VEC3,
        "ivec4" => gl::INT_VEC4,
        "bool" => gl::BOOL,
        "mat2" => gl::FLOAT_MAT2,
        "mat3" => gl::FLOAT_MAT3,
        "mat4" => gl::FLOAT_MAT4,
        "sampler2D" => gl::SAMPLER_2D,
        "samplerCube" => gl::SAMPLER_CUBE,
        _ => return None,
    })
}

/// Finds `attribute`/`in` (vertex only) and `uniform` declarations in GLSL source.
///
/// Returns `Err` with an info log for the few errors a compiler would catch that matter here.
fn reflect(kind: u32, source: &str) -> Result<(Vec<ActiveVariable>, Vec<ActiveVariable>), String> {
    let mut attributes = Vec::new();
    let mut uniforms = Vec::new();
    let without_comments: String = source
        .lines()
        .map(|l| l.split("//").next().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n");
    if !without_comments.contains("void main") {
        return Err("ERROR: 0:1: 'main' : function not defined".to_string());
    }
    for statement in without_comments.split([';', '{', '}']) {
        let mut tokens = statement
            .split_whitespace()
            .filter(|t| !matches!(*t, "highp" | "mediump" | "lowp" | "const"));
        let Some(storage) = tokens.next() else {
            continue;
        };
        let is_attribute = kind == gl::VERTEX_SHADER && (storage == "attribute" || storage == "in");
        let is_uniform = storage == "uniform";
        if !is_attribute && !is_uniform {
            continue;
        }
        let Some(type_name) = tokens.next() else {
            return Err(format!("ERROR: incomplete declaration '{}'", statement.trim()));
        };
        let Some(ty) = glsl_type(type_name) else {
            return Err(format!("ERROR: unknown type '{type_name}'"));
        };
        let rest: String = tokens.collect::<Vec<_>>().join("");
        for declarator in rest.split(',').filter(|d| !d.is_empty()) {
            let (name, size) = match declarator.split_once('[') {
                Some((name, len)) => {
                    let len = len.trim_end_matches(']');
                    let size = len
                        .parse::<u32>()
                        .map_err(|_| format!("ERROR: bad array length '{len}'"))?;
                    (format!("{name}[0]"), size)
                }
                None => (declarator.to_string(), 1),
            };
            let variable = ActiveVariable { name, ty, size };
            if is_attribute {
                attributes.push(variable);
            } else {
                uniforms.push(variable);
            }
        }
    }
    Ok((attributes, uniforms))
}

fn uniform_index(uniforms: &[ActiveVariable], name: &str) -> Option<u32> {
    uniforms
        .iter()
        .position(|u| u.name == name || u.name.strip_suffix("[0]") == Some(name))
        .map(|i| i as u32)
}

impl Native for HeadlessContext {
    fn limits(&mut self) -> NativeLimits {
        self.config.limits
    }

    fn extensions(&mut self) -> Vec<String> {
        if self.lost {
            return Vec::new();
        }
        self.config.extensions.clone()
    }

    fn drawing_buffer_size(&mut self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn get_error(&mut self) -> u32 {
        if self.errors.is_empty() {
            gl::NO_ERROR
        } else {
            self.errors.remove(0)
        }
    }

    fn is_context_lost(&mut self) -> bool {
        self.lost
    }

    fn lose_context(&mut self) -> bool {
        if !self.has_extension(gl::EXT_LOSE_CONTEXT) || self.lost {
            return false;
        }
        self.lost = true;
        self.textures.clear();
        self.renderbuffers.clear();
        self.framebuffers.clear();
        self.shaders.clear();
        self.programs.clear();
        self.buffers.clear();
        self.unit_bindings.clear();
        self.renderbuffer = None;
        self.framebuffer = None;
        self.array_buffer = None;
        self.element_buffer = None;
        self.program = None;
        self.enabled_arrays.clear();
        self.capabilities.clear();
        self.masks = Masks::default();
        self.errors.clear();
        self.errors.push(gl::CONTEXT_LOST_WEBGL);
        true
    }

    fn restore_context(&mut self, settings: &ContextSettings) -> bool {
        if !self.lost {
            return false;
        }
        self.lost = false;
        self.settings = *settings;
        self.generation += 1;
        self.active_unit = 0;
        self.errors.clear();
        true
    }

    fn create_texture(&mut self) -> Result<NativeObject, String> {
        let name = self.allocate()?;
        self.textures.insert(name, TextureObject::default());
        Ok(name)
    }

    fn delete_texture(&mut self, texture: NativeObject) {
        if self.lost {
            return;
        }
        self.textures.remove(&texture);
        self.unit_bindings.retain(|_, t| *t != texture);
        for fb in self.framebuffers.values_mut() {
            fb.attachments
                .retain(|_, a| !matches!(a, Attachment::Texture { texture: t, .. } if *t == texture));
        }
    }

    fn active_texture(&mut self, unit: u32) {
        if self.lost {
            return;
        }
        let index = unit.wrapping_sub(gl::TEXTURE0);
        if index >= self.config.limits.max_texture_units {
            self.error(gl::INVALID_ENUM);
            return;
        }
        self.active_unit = index;
    }

    fn bind_texture(&mut self, target: u32, texture: Option<NativeObject>) {
        if self.lost {
            return;
        }
        match texture {
            None => {
                self.unit_bindings.remove(&(self.active_unit, target));
            }
            Some(t) => {
                let Some(object) = self.textures.get_mut(&t) else {
                    self.error(gl::INVALID_OPERATION);
                    return;
                };
                match object.target {
                    Some(existing) if existing != target => {
                        self.error(gl::INVALID_OPERATION);
                        return;
                    }
                    _ => object.target = Some(target),
                }
                self.unit_bindings.insert((self.active_unit, target), t);
            }
        }
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
        if self.lost {
            return;
        }
        let Some(texture) = self.active_bound_texture(target) else {
            self.error(gl::INVALID_OPERATION);
            return;
        };
        if internal_format != format || !self.texture_format_supported(format, ty) {
            self.error(gl::INVALID_ENUM);
            return;
        }
        let max = if is_cube_face(target) {
            self.config.limits.max_cube_map_size
        } else {
            self.config.limits.max_texture_size
        };
        if width > max >> level || height > max >> level {
            self.error(gl::INVALID_VALUE);
            return;
        }
        let expected = (width * height * bytes_per_texel(format, ty)) as usize;
        if let Some(p) = pixels {
            if p.len() != expected {
                self.error(gl::INVALID_VALUE);
                return;
            }
        }
        if let Some(object) = self.textures.get_mut(&texture) {
            object.levels.insert(
                (target, level),
                Level {
                    internal_format,
                    width,
                    height,
                    ty,
                    data: pixels.map(|p| p.to_vec()),
                },
            );
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
        if self.lost {
            return;
        }
        let Some(texture) = self.active_bound_texture(target) else {
            self.error(gl::INVALID_OPERATION);
            return;
        };
        if !self.has_extension(gl::EXT_S3TC) {
            self.error(gl::INVALID_ENUM);
            return;
        }
        if data.len() != compressed_len(internal_format, width, height) as usize {
            self.error(gl::INVALID_VALUE);
            return;
        }
        if let Some(object) = self.textures.get_mut(&texture) {
            object.levels.insert(
                (target, level),
                Level {
                    internal_format,
                    width,
                    height,
                    ty: gl::UNSIGNED_BYTE,
                    data: Some(data.to_vec()),
                },
            );
        }
    }

    fn tex_parameter_i32(&mut self, target: u32, parameter: u32, value: i32) {
        self.tex_parameter_f32(target, parameter, value as f32);
    }

    fn tex_parameter_f32(&mut self, target: u32, parameter: u32, value: f32) {
        if self.lost {
            return;
        }
        if parameter == gl::TEXTURE_MAX_ANISOTROPY_EXT && !self.has_extension(gl::EXT_ANISOTROPIC) {
            self.error(gl::INVALID_ENUM);
            return;
        }
        let Some(texture) = self.active_bound_texture(target) else {
            self.error(gl::INVALID_OPERATION);
            return;
        };
        if let Some(object) = self.textures.get_mut(&texture) {
            object.parameters.insert(parameter, value);
        }
    }

    fn generate_mipmap(&mut self, target: u32) {
        if self.lost {
            return;
        }
        let Some(texture) = self.active_bound_texture(target) else {
            self.error(gl::INVALID_OPERATION);
            return;
        };
        let faces: Vec<u32> = if target == gl::TEXTURE_CUBE_MAP {
            (0..6).map(|f| gl::TEXTURE_CUBE_MAP_POSITIVE_X + f).collect()
        } else {
            vec![target]
        };
        let Some(object) = self.textures.get_mut(&texture) else {
            return;
        };
        for face in faces {
            let Some(base) = object.levels.get(&(face, 0)).cloned() else {
                self.errors.push(gl::INVALID_OPERATION);
                return;
            };
            if !base.width.is_power_of_two() || !base.height.is_power_of_two() {
                self.errors.push(gl::INVALID_OPERATION);
                return;
            }
            let mut level = 1;
            let (mut w, mut h) = (base.width, base.height);
            while w > 1 || h > 1 {
                w = (w / 2).max(1);
                h = (h / 2).max(1);
                object.levels.insert(
                    (face, level),
                    Level {
                        width: w,
                        height: h,
                        data: None,
                        ..base.clone()
                    },
                );
                level += 1;
            }
        }
    }

    fn create_renderbuffer(&mut self) -> Result<NativeObject, String> {
        let name = self.allocate()?;
        self.renderbuffers.insert(name, RenderbufferObject::default());
        Ok(name)
    }

    fn delete_renderbuffer(&mut self, renderbuffer: NativeObject) {
        if self.lost {
            return;
        }
        self.renderbuffers.remove(&renderbuffer);
        if self.renderbuffer == Some(renderbuffer) {
            self.renderbuffer = None;
        }
        for fb in self.framebuffers.values_mut() {
            fb.attachments
                .retain(|_, a| *a != Attachment::Renderbuffer(renderbuffer));
        }
    }

    fn bind_renderbuffer(&mut self, renderbuffer: Option<NativeObject>) {
        if self.lost {
            return;
        }
        if let Some(rb) = renderbuffer {
            if !self.renderbuffers.contains_key(&rb) {
                self.error(gl::INVALID_OPERATION);
                return;
            }
        }
        self.renderbuffer = renderbuffer;
    }

    fn renderbuffer_storage(&mut self, internal_format: u32, width: u32, height: u32) {
        if self.lost {
            return;
        }
        let Some(rb) = self.renderbuffer else {
            self.error(gl::INVALID_OPERATION);
            return;
        };
        let max = self.config.limits.max_renderbuffer_size;
        if width > max || height > max {
            self.error(gl::INVALID_VALUE);
            return;
        }
        if !matches!(internal_format, gl::DEPTH_COMPONENT16 | gl::DEPTH_STENCIL) {
            self.error(gl::INVALID_ENUM);
            return;
        }
        if let Some(object) = self.renderbuffers.get_mut(&rb) {
            object.storage = Some((internal_format, width, height));
        }
    }

    fn create_framebuffer(&mut self) -> Result<NativeObject, String> {
        let name = self.allocate()?;
        self.framebuffers.insert(name, FramebufferObject::default());
        Ok(name)
    }

    fn delete_framebuffer(&mut self, framebuffer: NativeObject) {
        if self.lost {
            return;
        }
        self.framebuffers.remove(&framebuffer);
        if self.framebuffer == Some(framebuffer) {
            self.framebuffer = None;
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<NativeObject>) {
        if self.lost {
            return;
        }
        if let Some(fb) = framebuffer {
            if !self.framebuffers.contains_key(&fb) {
                self.error(gl::INVALID_OPERATION);
                return;
            }
        }
        self.framebuffer = framebuffer;
    }

    fn framebuffer_texture_2d(
        &mut self,
        attachment: u32,
        texture_target: u32,
        texture: Option<NativeObject>,
        level: u32,
    ) {
        if self.lost {
            return;
        }
        let Some(fb) = self.framebuffer else {
            self.error(gl::INVALID_OPERATION);
            return;
        };
        if let Some(t) = texture {
            if !self.textures.contains_key(&t) {
                self.error(gl::INVALID_OPERATION);
                return;
            }
        }
        if let Some(object) = self.framebuffers.get_mut(&fb) {
            match texture {
                Some(texture) => {
                    object.attachments.insert(
                        attachment,
                        Attachment::Texture {
                            texture,
                            face: texture_target,
                            level,
                        },
                    );
                }
                None => {
                    object.attachments.remove(&attachment);
                }
            }
        }
    }

    fn framebuffer_renderbuffer(&mut self, attachment: u32, renderbuffer: Option<NativeObject>) {
        if self.lost {
            return;
        }
        let Some(fb) = self.framebuffer else {
            self.error(gl::INVALID_OPERATION);
            return;
        };
        if let Some(rb) = renderbuffer {
            if !self.renderbuffers.contains_key(&rb) {
                self.error(gl::INVALID_OPERATION);
                return;
            }
        }
        if let Some(object) = self.framebuffers.get_mut(&fb) {
            match renderbuffer {
                Some(rb) => {
                    object.attachments.insert(attachment, Attachment::Renderbuffer(rb));
                }
                None => {
                    object.attachments.remove(&attachment);
                }
            }
        }
    }

    fn check_framebuffer_status(&mut self) -> u32 {
        if self.lost {
            return gl::FRAMEBUFFER_UNSUPPORTED;
        }
        let Some(fb) = self.framebuffer else {
            return gl::FRAMEBUFFER_COMPLETE;
        };
        let Some(object) = self.framebuffers.get(&fb) else {
            return gl::FRAMEBUFFER_UNSUPPORTED;
        };
        if object.attachments.is_empty() {
            return gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT;
        }
        let mut size = None;
        for (point, attachment) in &object.attachments {
            let Some((dims, format, renderable)) = self.attachment_info(attachment) else {
                return gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
            };
            let valid = match *point {
                gl::DEPTH_ATTACHMENT => {
                    matches!(format, gl::DEPTH_COMPONENT16 | gl::DEPTH_COMPONENT)
                }
                gl::DEPTH_STENCIL_ATTACHMENT => format == gl::DEPTH_STENCIL,
                _ => renderable,
            };
            if !valid {
                return gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
            }
            match size {
                None => size = Some(dims),
                Some(s) if s != dims => return gl::FRAMEBUFFER_INCOMPLETE_DIMENSIONS,
                Some(_) => {}
            }
        }
        if !object.attachments.contains_key(&gl::COLOR_ATTACHMENT0) {
            return gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT;
        }
        gl::FRAMEBUFFER_COMPLETE
    }

    fn draw_buffers(&mut self, buffers: &[u32]) {
        if self.lost {
            return;
        }
        if buffers.len() > 1 && !self.has_extension(gl::EXT_DRAW_BUFFERS) {
            self.error(gl::INVALID_OPERATION);
            return;
        }
        if buffers.len() as u32 > self.config.limits.max_draw_buffers {
            self.error(gl::INVALID_VALUE);
            return;
        }
        let Some(fb) = self.framebuffer else {
            return;
        };
        if let Some(object) = self.framebuffers.get_mut(&fb) {
            object.draw_buffers = buffers.to_vec();
        }
    }

    fn create_shader(&mut self, kind: u32) -> Result<NativeObject, String> {
        if !matches!(kind, gl::VERTEX_SHADER | gl::FRAGMENT_SHADER) {
            return Err(format!("invalid shader kind 0x{kind:04X}"));
        }
        let name = self.allocate()?;
        self.shaders.insert(
            name,
            ShaderObject {
                kind,
                source: String::new(),
                compiled: false,
                log: String::new(),
                attributes: Vec::new(),
                uniforms: Vec::new(),
            },
        );
        Ok(name)
    }

    fn shader_source(&mut self, shader: NativeObject, source: &str) {
        match self.shaders.get_mut(&shader) {
            Some(object) => object.source = source.to_string(),
            None if !self.lost => self.error(gl::INVALID_VALUE),
            None => {}
        }
    }

    fn compile_shader(&mut self, shader: NativeObject) {
        let Some(object) = self.shaders.get_mut(&shader) else {
            if !self.lost {
                self.error(gl::INVALID_VALUE);
            }
            return;
        };
        match reflect(object.kind, &object.source) {
            Ok((attributes, uniforms)) => {
                object.compiled = true;
                object.log.clear();
                object.attributes = attributes;
                object.uniforms = uniforms;
            }
            Err(log) => {
                object.compiled = false;
                object.log = log;
            }
        }
    }

    fn get_shader_compile_status(&mut self, shader: NativeObject) -> bool {
        self.shaders.get(&shader).is_some_and(|s| s.compiled)
    }

    fn get_shader_info_log(&mut self, shader: NativeObject) -> String {
        self.shaders
            .get(&shader)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: NativeObject) {
        self.shaders.remove(&shader);
    }

    fn create_program(&mut self) -> Result<NativeObject, String> {
        let name = self.allocate()?;
        self.programs.insert(name, ProgramObject::default());
        Ok(name)
    }

    fn attach_shader(&mut self, program: NativeObject, shader: NativeObject) {
        if self.lost {
            return;
        }
        if !self.shaders.contains_key(&shader) {
            self.error(gl::INVALID_VALUE);
            return;
        }
        match self.programs.get_mut(&program) {
            Some(p) => p.shaders.push(shader),
            None => self.error(gl::INVALID_VALUE),
        }
    }

    fn link_program(&mut self, program: NativeObject) {
        if self.lost {
            return;
        }
        let Some(p) = self.programs.get(&program) else {
            self.error(gl::INVALID_VALUE);
            return;
        };
        let mut attributes = Vec::new();
        let mut uniforms: Vec<ActiveVariable> = Vec::new();
        let mut stages = HashSet::new();
        let mut log = String::new();
        for shader in &p.shaders {
            let Some(s) = self.shaders.get(shader) else {
                continue;
            };
            if !s.compiled {
                log = "ERROR: attached shader is not compiled".to_string();
                break;
            }
            stages.insert(s.kind);
            attributes.extend(s.attributes.iter().cloned());
            for u in &s.uniforms {
                match uniforms.iter().find(|existing| existing.name == u.name) {
                    Some(existing) if existing.ty != u.ty => {
                        log = format!("ERROR: uniform '{}' declared with mismatched types", u.name);
                    }
                    Some(_) => {}
                    None => uniforms.push(u.clone()),
                }
            }
        }
        if log.is_empty() && stages.len() != 2 {
            log = "ERROR: program needs a vertex and a fragment shader".to_string();
        }
        if let Some(p) = self.programs.get_mut(&program) {
            p.linked = log.is_empty();
            p.log = log;
            p.values.clear();
            if p.linked {
                p.attributes = attributes;
                p.uniforms = uniforms;
            }
        }
    }

    fn get_program_link_status(&mut self, program: NativeObject) -> bool {
        self.programs.get(&program).is_some_and(|p| p.linked)
    }

    fn get_program_info_log(&mut self, program: NativeObject) -> String {
        self.programs
            .get(&program)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&mut self, program: NativeObject) {
        self.programs.remove(&program);
        if self.program == Some(program) {
            self.program = None;
        }
    }

    fn use_program(&mut self, program: Option<NativeObject>) {
        if self.lost {
            return;
        }
        if let Some(p) = program {
            if !self.programs.get(&p).is_some_and(|p| p.linked) {
                self.error(gl::INVALID_OPERATION);
                return;
            }
        }
        self.program = program;
    }

    fn active_attributes(&mut self, program: NativeObject) -> Vec<ActiveVariable> {
        self.programs
            .get(&program)
            .map(|p| p.attributes.clone())
            .unwrap_or_default()
    }

    fn active_uniforms(&mut self, program: NativeObject) -> Vec<ActiveVariable> {
        self.programs
            .get(&program)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default()
    }

    fn get_attrib_location(&mut self, program: NativeObject, name: &str) -> Option<u32> {
        let p = self.programs.get(&program)?;
        p.attributes
            .iter()
            .position(|a| a.name == name)
            .map(|i| i as u32)
    }

    fn get_uniform_location(
        &mut self,
        program: NativeObject,
        name: &str,
    ) -> Option<UniformLocation> {
        let p = self.programs.get(&program)?;
        uniform_index(&p.uniforms, name).map(UniformLocation)
    }

    fn uniform_1_i32(&mut self, location: UniformLocation, value: i32) {
        self.uniform_i32_slice(location, 1, &[value]);
    }

    fn uniform_i32_slice(&mut self, location: UniformLocation, components: u32, values: &[i32]) {
        let floats: Vec<f32> = values.iter().map(|v| *v as f32).collect();
        self.uniform_f32_slice(location, components, &floats);
    }

    fn uniform_f32_slice(&mut self, location: UniformLocation, components: u32, values: &[f32]) {
        if self.lost {
            return;
        }
        if components == 0 || values.len() % components as usize != 0 {
            self.error(gl::INVALID_VALUE);
            return;
        }
        let Some(program) = self.program else {
            self.error(gl::INVALID_OPERATION);
            return;
        };
        let Some(p) = self.programs.get_mut(&program) else {
            return;
        };
        if location.0 as usize >= p.uniforms.len() {
            self.errors.push(gl::INVALID_OPERATION);
            return;
        }
        p.values.insert(location.0, values.to_vec());
    }

    fn uniform_matrix_f32_slice(&mut self, location: UniformLocation, order: u32, values: &[f32]) {
        self.uniform_f32_slice(location, order * order, values);
    }

    fn create_buffer(&mut self) -> Result<NativeObject, String> {
        let name = self.allocate()?;
        self.buffers.insert(name, BufferObject::default());
        Ok(name)
    }

    fn delete_buffer(&mut self, buffer: NativeObject) {
        if self.lost {
            return;
        }
        self.buffers.remove(&buffer);
        if self.array_buffer == Some(buffer) {
            self.array_buffer = None;
        }
        if self.element_buffer == Some(buffer) {
            self.element_buffer = None;
        }
    }

    fn bind_buffer(&mut self, target: u32, buffer: Option<NativeObject>) {
        if self.lost {
            return;
        }
        if let Some(b) = buffer {
            let Some(object) = self.buffers.get_mut(&b) else {
                self.error(gl::INVALID_OPERATION);
                return;
            };
            match object.target {
                Some(existing) if existing != target => {
                    self.error(gl::INVALID_OPERATION);
                    return;
                }
                _ => object.target = Some(target),
            }
        }
        match target {
            gl::ARRAY_BUFFER => self.array_buffer = buffer,
            gl::ELEMENT_ARRAY_BUFFER => self.element_buffer = buffer,
            _ => self.error(gl::INVALID_ENUM),
        }
    }

    fn buffer_data(&mut self, target: u32, data: &[u8], _usage: u32) {
        if self.lost {
            return;
        }
        let bound = match target {
            gl::ARRAY_BUFFER => self.array_buffer,
            gl::ELEMENT_ARRAY_BUFFER => self.element_buffer,
            _ => None,
        };
        let Some(buffer) = bound else {
            self.error(gl::INVALID_OPERATION);
            return;
        };
        if let Some(object) = self.buffers.get_mut(&buffer) {
            object.data = data.to_vec();
        }
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        if !self.lost {
            self.enabled_arrays.insert(index);
        }
    }

    fn disable_vertex_attrib_array(&mut self, index: u32) {
        if !self.lost {
            self.enabled_arrays.remove(&index);
        }
    }

    fn vertex_attrib_pointer(
        &mut self,
        _index: u32,
        size: u32,
        _ty: u32,
        _normalized: bool,
        _stride: u32,
        _offset: u32,
    ) {
        if self.lost {
            return;
        }
        if !(1..=4).contains(&size) {
            self.error(gl::INVALID_VALUE);
            return;
        }
        if self.array_buffer.is_none() {
            self.error(gl::INVALID_OPERATION);
        }
    }

    fn viewport(&mut self, _x: i32, _y: i32, _width: u32, _height: u32) {}

    fn enable(&mut self, capability: u32) {
        if !self.lost {
            self.capabilities.insert(capability);
        }
    }

    fn disable(&mut self, capability: u32) {
        if !self.lost {
            self.capabilities.remove(&capability);
        }
    }

    fn blend_func(&mut self, _source: u32, _destination: u32) {}

    fn cull_face(&mut self, _face: u32) {}

    fn depth_func(&mut self, _function: u32) {}

    fn depth_mask(&mut self, write: bool) {
        if !self.lost {
            self.masks.depth = write;
        }
    }

    fn color_mask(&mut self, r: bool, g: bool, b: bool, a: bool) {
        if !self.lost {
            self.masks.color = [r, g, b, a];
        }
    }

    fn stencil_mask(&mut self, mask: u32) {
        if !self.lost {
            self.masks.stencil = mask;
        }
    }

    fn clear_color(&mut self, _r: f32, _g: f32, _b: f32, _a: f32) {}

    fn clear_depth(&mut self, _depth: f32) {}

    fn clear_stencil(&mut self, _stencil: i32) {}

    fn clear(&mut self, _mask: u32) {
        if self.lost {
            return;
        }
        if self.check_framebuffer_status() != gl::FRAMEBUFFER_COMPLETE {
            self.error(gl::INVALID_FRAMEBUFFER_OPERATION);
            return;
        }
        self.clears += 1;
    }

    fn draw_arrays(&mut self, mode: u32, _first: u32, count: u32) {
        self.record_draw(mode, count, false);
    }

    fn draw_elements(&mut self, mode: u32, count: u32, ty: u32, _offset: u32) {
        if self.lost {
            return;
        }
        if self.element_buffer.is_none() {
            self.error(gl::INVALID_OPERATION);
            return;
        }
        if ty == gl::UNSIGNED_INT && !self.has_extension(gl::EXT_ELEMENT_INDEX_UINT) {
            self.error(gl::INVALID_ENUM);
            return;
        }
        self.record_draw(mode, count, true);
    }
}

impl HeadlessContext {
    fn record_draw(&mut self, mode: u32, count: u32, indexed: bool) {
        if self.lost {
            return;
        }
        if mode > gl::TRIANGLE_FAN {
            self.error(gl::INVALID_ENUM);
            return;
        }
        let Some(program) = self.program else {
            self.error(gl::INVALID_OPERATION);
            return;
        };
        if self.check_framebuffer_status() != gl::FRAMEBUFFER_COMPLETE {
            self.error(gl::INVALID_FRAMEBUFFER_OPERATION);
            return;
        }
        let uniforms = match self.programs.get(&program) {
            Some(p) => p
                .uniforms
                .iter()
                .enumerate()
                .filter_map(|(i, u)| {
                    let name = u.name.strip_suffix("[0]").unwrap_or(&u.name);
                    let value = p.values.get(&(i as u32))?;
                    Some((name.to_string(), value.clone()))
                })
                .collect(),
            None => BTreeMap::new(),
        };
        self.draw_calls.push(DrawCall {
            framebuffer: self.framebuffer,
            program,
            mode,
            count,
            indexed,
            masks: self.masks,
            uniforms,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = "attribute vec3 position;\nuniform mat4 uMVP;\nuniform float uWeights[4];\nvoid main() { gl_Position = uMVP * vec4(position, 1.0); }";
    const FS: &str = "precision mediump float;\nuniform sampler2D uTex; // color\nuniform vec4 uColor, uTint;\nvoid main() { gl_FragColor = uColor; }";

    fn program(ctx: &mut HeadlessContext) -> NativeObject {
        let vs = ctx.create_shader(gl::VERTEX_SHADER).unwrap();
        ctx.shader_source(vs, VS);
        ctx.compile_shader(vs);
        let fs = ctx.create_shader(gl::FRAGMENT_SHADER).unwrap();
        ctx.shader_source(fs, FS);
        ctx.compile_shader(fs);
        let p = ctx.create_program().unwrap();
        ctx.attach_shader(p, vs);
        ctx.attach_shader(p, fs);
        ctx.link_program(p);
        p
    }

    #[test]
    fn reflection_finds_declarations() {
        let mut ctx = HeadlessContext::new(HeadlessConfig::default());
        let p = program(&mut ctx);
        assert!(ctx.get_program_link_status(p));
        let attributes = ctx.active_attributes(p);
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes[0].ty, gl::FLOAT_VEC3);
        let names: Vec<_> = ctx.active_uniforms(p).into_iter().map(|u| u.name).collect();
        assert_eq!(names, ["uMVP", "uWeights[0]", "uTex", "uColor", "uTint"]);
        assert!(ctx.get_uniform_location(p, "uWeights").is_some());
        assert!(ctx.get_uniform_location(p, "missing").is_none());
    }

    #[test]
    fn compile_error_reports_log() {
        let mut ctx = HeadlessContext::new(HeadlessConfig::default());
        let s = ctx.create_shader(gl::FRAGMENT_SHADER).unwrap();
        ctx.shader_source(s, "uniform vec4 c;");
        ctx.compile_shader(s);
        assert!(!ctx.get_shader_compile_status(s));
        assert!(ctx.get_shader_info_log(s).contains("main"));
    }

    #[test]
    fn incomplete_framebuffer_dimensions() {
        let mut ctx = HeadlessContext::new(HeadlessConfig::default());
        let a = ctx.create_texture().unwrap();
        ctx.bind_texture(gl::TEXTURE_2D, Some(a));
        ctx.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGBA, 4, 4, gl::RGBA, gl::UNSIGNED_BYTE, None);
        let b = ctx.create_texture().unwrap();
        ctx.bind_texture(gl::TEXTURE_2D, Some(b));
        ctx.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGBA, 8, 8, gl::RGBA, gl::UNSIGNED_BYTE, None);
        let fb = ctx.create_framebuffer().unwrap();
        ctx.bind_framebuffer(Some(fb));
        ctx.framebuffer_texture_2d(gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D, Some(a), 0);
        assert_eq!(ctx.check_framebuffer_status(), gl::FRAMEBUFFER_COMPLETE);
        ctx.framebuffer_texture_2d(gl::COLOR_ATTACHMENT0 + 1, gl::TEXTURE_2D, Some(b), 0);
        assert_eq!(
            ctx.check_framebuffer_status(),
            gl::FRAMEBUFFER_INCOMPLETE_DIMENSIONS
        );
        assert_eq!(ctx.get_error(), gl::NO_ERROR);
    }

    #[test]
    fn loss_drops_objects_and_reports_once() {
        let mut ctx = HeadlessContext::new(HeadlessConfig::default());
        let t = ctx.create_texture().unwrap();
        assert!(ctx.lose_context());
        assert!(ctx.is_context_lost());
        assert!(!ctx.is_texture(t));
        assert!(ctx.create_texture().is_err());
        assert_eq!(ctx.get_error(), gl::CONTEXT_LOST_WEBGL);
        assert_eq!(ctx.get_error(), gl::NO_ERROR);
        assert!(ctx.restore_context(&ContextSettings::default()));
        assert_eq!(ctx.generation(), 1);
        let fresh = ctx.create_texture().unwrap();
        assert_ne!(fresh, t);
    }

    #[test]
    fn float_upload_needs_extension() {
        let mut ctx = HeadlessContext::new(HeadlessConfig::minimal(4, 4));
        let t = ctx.create_texture().unwrap();
        ctx.bind_texture(gl::TEXTURE_2D, Some(t));
        ctx.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGBA, 1, 1, gl::RGBA, gl::FLOAT, None);
        assert_eq!(ctx.get_error(), gl::INVALID_ENUM);
    }
}
