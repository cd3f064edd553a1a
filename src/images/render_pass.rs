// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Passes: a linked shader program, its fixed-function state and its samplers.

A [`Pass`] is built from a [`PassDescriptor`].  Linking reflects the program's active
attributes and uniforms once; after that the layout never changes, and only the samplers
and the [`RenderState`] may be reconfigured.

```
use stages_and_passes::images::render_pass::{Blend, Cull, DepthTest, PassDescriptor, RenderState};
use stages_and_passes::images::shader::{FragmentShader, VertexShader};

let descriptor = PassDescriptor::new(
    "unlit",
    VertexShader::new("attribute vec3 position; void main() { gl_Position = vec4(position, 1.0); }"),
    FragmentShader::new("void main() { gl_FragColor = vec4(1.0); }"),
)
.with_state(RenderState {
    blend: Blend::Alpha,
    cull: Cull::None,
    depth_test: DepthTest::LessEqual,
    depth_write: false,
});
assert_eq!(descriptor.name, "unlit");
```
*/

use crate::bindings::sampler::{SampledImage, Sampler, SamplerDimension};
use crate::bindings::uniform::{Uniform, UniformMap, UniformType};
use crate::error::{Error, Result, ensure_config};
use crate::images::caps::Caps;
use crate::images::depth::Depth;
use crate::images::mesh::Mesh;
use crate::images::registry::{Handle, Kind, Registry};
use crate::images::shader::{FragmentShader, VertexShader, compile};
use crate::images::stage::{Stage, WriteMask};
use crate::images::texture::Texture;
use crate::imp::{Native, NativeObject, UniformLocation, created, gl};
use glam::Mat4;
use std::borrow::Cow;

pub type PassId = Handle<Pass>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Blend {
    #[default]
    None,
    /// Straight alpha: `src * a + dst * (1 - a)`.
    Alpha,
    /// `src + dst * (1 - a)`.
    Premultiplied,
    Additive,
    /// `src * dst`.
    Multiply,
}

impl Blend {
    /// Native (source, destination) factors; `None` disables blending.
    pub const fn native(self) -> Option<(u32, u32)> {
        match self {
            Blend::None => None,
            Blend::Alpha => Some((gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA)),
            Blend::Premultiplied => Some((gl::ONE, gl::ONE_MINUS_SRC_ALPHA)),
            Blend::Additive => Some((gl::ONE, gl::ONE)),
            Blend::Multiply => Some((gl::DST_COLOR, gl::ZERO)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cull {
    None,
    #[default]
    Back,
    Front,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthTest {
    Always,
    Never,
    #[default]
    Less,
    LessEqual,
    Equal,
    Greater,
    GreaterEqual,
    NotEqual,
}

impl DepthTest {
    pub const fn native(self) -> u32 {
        match self {
            DepthTest::Always => gl::ALWAYS,
            DepthTest::Never => gl::NEVER,
            DepthTest::Less => gl::LESS,
            DepthTest::LessEqual => gl::LEQUAL,
            DepthTest::Equal => gl::EQUAL,
            DepthTest::Greater => gl::GREATER,
            DepthTest::GreaterEqual => gl::GEQUAL,
            DepthTest::NotEqual => gl::NOTEQUAL,
        }
    }
}

/// Fixed-function state applied before each draw with a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderState {
    pub blend: Blend,
    pub cull: Cull,
    pub depth_test: DepthTest,
    pub depth_write: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            blend: Blend::None,
            cull: Cull::Back,
            depth_test: DepthTest::Less,
            depth_write: true,
        }
    }
}

impl RenderState {
    pub(crate) fn apply<N: Native>(&self, native: &mut N, mask: &WriteMask) {
        match self.blend.native() {
            Some((source, destination)) => {
                native.enable(gl::BLEND);
                native.blend_func(source, destination);
            }
            None => native.disable(gl::BLEND),
        }
        match self.cull {
            Cull::None => native.disable(gl::CULL_FACE),
            Cull::Back => {
                native.enable(gl::CULL_FACE);
                native.cull_face(gl::BACK);
            }
            Cull::Front => {
                native.enable(gl::CULL_FACE);
                native.cull_face(gl::FRONT);
            }
        }
        native.enable(gl::DEPTH_TEST);
        native.depth_func(self.depth_test.native());
        mask.apply(native, self.depth_write);
    }
}

#[derive(Debug, Clone)]
pub struct PassDescriptor {
    pub name: String,
    pub vertex: VertexShader,
    pub fragment: FragmentShader,
    pub state: RenderState,
}

impl PassDescriptor {
    pub fn new(name: impl Into<String>, vertex: VertexShader, fragment: FragmentShader) -> Self {
        Self {
            name: name.into(),
            vertex,
            fragment,
            state: RenderState::default(),
        }
    }

    pub fn with_state(mut self, state: RenderState) -> Self {
        self.state = state;
        self
    }
}

/// An active vertex input of a linked pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSlot {
    pub name: String,
    /// Native type code.
    pub ty: u32,
    pub location: u32,
}

/// An active uniform of a linked pass.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformSlot {
    /// Declared name, without an array suffix.
    pub name: String,
    pub ty: UniformType,
    /// Array length; 1 for non-arrays.
    pub size: u32,
    location: UniformLocation,
    sampler: Option<usize>,
}

/// What a pass needs to turn uniform values into native uploads.
pub(crate) struct BindContext<'a> {
    pub(crate) caps: &'a Caps,
    pub(crate) textures: &'a Registry<Texture>,
    pub(crate) depths: &'a Registry<Depth>,
    pub(crate) stage: &'a Stage,
    pub(crate) model: &'a Mat4,
}

#[derive(Debug)]
pub struct Pass {
    descriptor: PassDescriptor,
    program: Option<NativeObject>,
    attributes: Vec<AttributeSlot>,
    uniforms: Vec<UniformSlot>,
    samplers: Vec<Sampler>,
}

impl Kind for Pass {
    const KIND: &'static str = "pass";
}

impl Pass {
    pub(crate) fn create<N: Native>(
        native: &mut N,
        caps: &Caps,
        descriptor: PassDescriptor,
    ) -> Result<Pass> {
        let program = link(native, &descriptor)?;
        let mut attributes = Vec::new();
        for variable in native.active_attributes(program) {
            let Some(location) = native.get_attrib_location(program, &variable.name) else {
                continue;
            };
            attributes.push(AttributeSlot {
                name: variable.name,
                ty: variable.ty,
                location,
            });
        }
        let mut uniforms = Vec::new();
        let mut samplers = Vec::new();
        for variable in native.active_uniforms(program) {
            let name = match variable.name.strip_suffix("[0]") {
                Some(base) => base.to_string(),
                None => variable.name.clone(),
            };
            let Some(ty) = UniformType::from_native(variable.ty) else {
                logwise::warn_sync!(
                    "pass {pass}: uniform {name} has a type that cannot be set",
                    pass = descriptor.name.as_str(),
                    name = name.as_str()
                );
                continue;
            };
            let Some(location) = native.get_uniform_location(program, &name) else {
                continue;
            };
            let sampler = if ty.is_sampler() {
                let unit = samplers.len() as u32;
                if unit >= caps.texture_unit_count {
                    native.delete_program(program);
                    return Err(Error::config(format!(
                        "pass {}: sampler {name} needs texture unit {unit} but the device has {}",
                        descriptor.name, caps.texture_unit_count
                    )));
                }
                let dimension = if ty == UniformType::SamplerCube {
                    SamplerDimension::Cube
                } else {
                    SamplerDimension::D2
                };
                samplers.push(Sampler::new(&name, dimension, unit, caps));
                Some(samplers.len() - 1)
            } else {
                None
            };
            uniforms.push(UniformSlot {
                name,
                ty,
                size: variable.size,
                location,
                sampler,
            });
        }
        logwise::info_sync!(
            "linked pass {pass} with {attributes} attributes, {uniforms} uniforms and {samplers} samplers",
            pass = descriptor.name.as_str(),
            attributes = attributes.len(),
            uniforms = uniforms.len(),
            samplers = samplers.len()
        );
        Ok(Pass {
            descriptor,
            program: Some(program),
            attributes,
            uniforms,
            samplers,
        })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &PassDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> RenderState {
        self.descriptor.state
    }

    pub fn set_state(&mut self, state: RenderState) {
        self.descriptor.state = state;
    }

    pub fn attributes(&self) -> &[AttributeSlot] {
        &self.attributes
    }

    pub fn uniforms(&self) -> &[UniformSlot] {
        &self.uniforms
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformSlot> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    /// Samplers in texture-unit order.
    pub fn samplers(&self) -> &[Sampler] {
        &self.samplers
    }

    pub fn sampler(&self, name: &str) -> Option<&Sampler> {
        self.samplers.iter().find(|s| s.name() == name)
    }

    pub fn sampler_mut(&mut self, name: &str) -> Option<&mut Sampler> {
        self.samplers.iter_mut().find(|s| s.name() == name)
    }

    pub fn native(&self) -> Option<NativeObject> {
        self.program
    }

    /// Makes this pass current and applies its render state under the stage's `mask`.
    pub(crate) fn use_program<N: Native>(&self, native: &mut N, mask: &WriteMask) {
        native.use_program(self.program);
        self.descriptor.state.apply(native, mask);
    }

    /// Binds one draw's uniforms from `scopes`, broadest first.  Every declared slot is
    /// written: the most specific scope holding a value wins, and a slot no scope sets goes
    /// back to zero (samplers are unbound), so nothing set for one draw reaches the next.
    pub(crate) fn bind_draw<N: Native>(
        &self,
        native: &mut N,
        scopes: &[&UniformMap],
        context: &BindContext<'_>,
    ) -> Result<()> {
        for slot in &self.uniforms {
            let mut chosen = None;
            for map in scopes {
                let Some(value) = map.get(&slot.name) else {
                    continue;
                };
                let value = match value {
                    Uniform::Semantic(semantic) => {
                        match context.stage.semantic_value(*semantic, Some(context.model)) {
                            Some(v) => Cow::Owned(v),
                            None => continue,
                        }
                    }
                    other => Cow::Borrowed(other),
                };
                ensure_config!(
                    value.compatible_with(slot.ty),
                    "pass {}: uniform {} is {:?} and cannot take {:?}",
                    self.name(),
                    slot.name,
                    slot.ty,
                    value
                );
                chosen = Some(value);
            }
            match (slot.sampler, chosen) {
                (Some(index), Some(value)) => {
                    self.bind_sampler(native, slot, &self.samplers[index], &value, context)?
                }
                (Some(index), None) => unbind_sampler(native, slot, &self.samplers[index]),
                (None, Some(value)) => upload(native, slot, &value),
                (None, None) => upload_zero(native, slot),
            }
        }
        Ok(())
    }

    fn bind_sampler<N: Native>(
        &self,
        native: &mut N,
        slot: &UniformSlot,
        sampler: &Sampler,
        value: &Uniform,
        context: &BindContext<'_>,
    ) -> Result<()> {
        let (image, object) = match value {
            Uniform::Texture(id) => {
                let texture = context.textures.get(*id)?;
                (sampled_texture(texture), texture.native())
            }
            Uniform::Mip(mip) => {
                let texture = context.textures.get(mip.texture)?;
                texture.checked_index(mip.face, mip.level)?;
                (sampled_texture(texture), texture.native())
            }
            Uniform::Depth(id) => {
                let depth = context.depths.get(*id)?;
                let image = SampledImage {
                    format: depth.format(),
                    power_of_two: true,
                    cube: false,
                    mipmapped: false,
                    depth_readable: Some(depth.readable()),
                };
                (image, depth.native_texture())
            }
            _ => return Ok(()),
        };
        sampler.check(&image, context.caps)?;
        let Some(object) = object else {
            return Err(Error::config(format!(
                "sampler {} is bound to a resource without a native texture",
                sampler.name()
            )));
        };
        native.active_texture(gl::TEXTURE0 + sampler.unit());
        native.bind_texture(sampler.dimension().native_target(), Some(object));
        sampler.apply(native, &image);
        native.uniform_1_i32(slot.location, sampler.unit() as i32);
        Ok(())
    }

    /// Binds the mesh's buffers to this pass's attribute locations.  Returns false when an
    /// attribute the pass declares has no data.
    pub(crate) fn bind_attributes<N: Native>(&self, native: &mut N, mesh: &Mesh) -> bool {
        let mut complete = true;
        for slot in &self.attributes {
            match mesh.attribute_buffer(&slot.name) {
                Some((layout, buffer)) => {
                    native.bind_buffer(gl::ARRAY_BUFFER, Some(buffer));
                    native.vertex_attrib_pointer(
                        slot.location,
                        layout.components(),
                        layout.native_type(),
                        layout.normalized(),
                        0,
                        0,
                    );
                    native.enable_vertex_attrib_array(slot.location);
                }
                None => {
                    logwise::warn_sync!(
                        "pass {pass}: mesh has no data for attribute {name}",
                        pass = self.name(),
                        name = slot.name.as_str()
                    );
                    native.disable_vertex_attrib_array(slot.location);
                    complete = false;
                }
            }
        }
        native.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, mesh.index_buffer());
        complete
    }

    /// Relinks after context loss.  The layout is unchanged; locations are looked up again.
    pub(crate) fn restore<N: Native>(&mut self, native: &mut N) -> Result<()> {
        let program = link(native, &self.descriptor)?;
        for slot in &mut self.attributes {
            if let Some(location) = native.get_attrib_location(program, &slot.name) {
                slot.location = location;
            }
        }
        for slot in &mut self.uniforms {
            if let Some(location) = native.get_uniform_location(program, &slot.name) {
                slot.location = location;
            }
        }
        self.program = Some(program);
        Ok(())
    }

    pub(crate) fn release<N: Native>(&mut self, native: &mut N) {
        if let Some(program) = self.program.take() {
            native.delete_program(program);
        }
    }
}

fn sampled_texture(texture: &Texture) -> SampledImage {
    SampledImage {
        format: texture.format(),
        power_of_two: texture.is_power_of_two(),
        cube: texture.is_cube(),
        mipmapped: texture.has_mipmaps(),
        depth_readable: None,
    }
}

/// Compiles both stages and links them.  Shaders are deleted once linked.
fn link<N: Native>(native: &mut N, descriptor: &PassDescriptor) -> Result<NativeObject> {
    let name = descriptor.name.as_str();
    let vertex = compile(native, gl::VERTEX_SHADER, descriptor.vertex.source(), name)?;
    let fragment = match compile(native, gl::FRAGMENT_SHADER, descriptor.fragment.source(), name) {
        Ok(f) => f,
        Err(e) => {
            native.delete_shader(vertex);
            return Err(e);
        }
    };
    let program = match created(native.create_program(), "create program") {
        Ok(p) => p,
        Err(e) => {
            native.delete_shader(vertex);
            native.delete_shader(fragment);
            return Err(e);
        }
    };
    native.attach_shader(program, vertex);
    native.attach_shader(program, fragment);
    native.link_program(program);
    native.delete_shader(vertex);
    native.delete_shader(fragment);
    if !native.get_program_link_status(program) {
        let log = native.get_program_info_log(program);
        native.delete_program(program);
        return Err(Error::config(format!("pass {name} failed to link: {log}")));
    }
    Ok(program)
}

fn unbind_sampler<N: Native>(native: &mut N, slot: &UniformSlot, sampler: &Sampler) {
    native.active_texture(gl::TEXTURE0 + sampler.unit());
    native.bind_texture(sampler.dimension().native_target(), None);
    native.uniform_1_i32(slot.location, sampler.unit() as i32);
}

fn upload_zero<N: Native>(native: &mut N, slot: &UniformSlot) {
    let location = slot.location;
    let size = slot.size as usize;
    match slot.ty {
        UniformType::Float => native.uniform_f32_slice(location, 1, &vec![0.0; size]),
        UniformType::Vec2 => native.uniform_f32_slice(location, 2, &vec![0.0; 2 * size]),
        UniformType::Vec3 => native.uniform_f32_slice(location, 3, &vec![0.0; 3 * size]),
        UniformType::Vec4 => native.uniform_f32_slice(location, 4, &vec![0.0; 4 * size]),
        UniformType::Int | UniformType::Bool => native.uniform_1_i32(location, 0),
        UniformType::Mat2 => native.uniform_matrix_f32_slice(location, 2, &[0.0; 4]),
        UniformType::Mat3 => native.uniform_matrix_f32_slice(location, 3, &[0.0; 9]),
        UniformType::Mat4 => native.uniform_matrix_f32_slice(location, 4, &[0.0; 16]),
        UniformType::Sampler2D | UniformType::SamplerCube => {}
    }
}

fn upload<N: Native>(native: &mut N, slot: &UniformSlot, value: &Uniform) {
    let location = slot.location;
    match value {
        Uniform::Float(v) => native.uniform_f32_slice(location, 1, &[*v]),
        Uniform::FloatArray(values) => {
            let len = values.len().min(slot.size as usize);
            native.uniform_f32_slice(location, 1, &values[..len]);
        }
        Uniform::Vec2(v) => native.uniform_f32_slice(location, 2, &v.to_array()),
        Uniform::Vec3(v) => native.uniform_f32_slice(location, 3, &v.to_array()),
        Uniform::Vec4(v) => native.uniform_f32_slice(location, 4, &v.to_array()),
        Uniform::Int(v) => native.uniform_1_i32(location, *v),
        Uniform::Bool(v) => native.uniform_1_i32(location, *v as i32),
        Uniform::Mat2(m) => native.uniform_matrix_f32_slice(location, 2, &m.to_cols_array()),
        Uniform::Mat3(m) => native.uniform_matrix_f32_slice(location, 3, &m.to_cols_array()),
        Uniform::Mat4(m) => native.uniform_matrix_f32_slice(location, 4, &m.to_cols_array()),
        Uniform::Texture(_) | Uniform::Mip(_) | Uniform::Depth(_) | Uniform::Semantic(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::headless::{HeadlessConfig, HeadlessContext};

    const VS: &str = "attribute vec3 position;\nattribute vec2 uv;\nuniform mat4 uMVP;\nvoid main() { gl_Position = uMVP * vec4(position, 1.0); }";
    const FS: &str = "precision mediump float;\nuniform sampler2D uBase;\nuniform samplerCube uSky;\nuniform vec4 uColor;\nuniform float uWeights[3];\nvoid main() { gl_FragColor = uColor; }";

    fn setup(config: HeadlessConfig) -> (HeadlessContext, Caps) {
        let mut ctx = HeadlessContext::new(config);
        let caps = Caps::query(&mut ctx);
        (ctx, caps)
    }

    fn descriptor() -> PassDescriptor {
        PassDescriptor::new("lit", VertexShader::new(VS), FragmentShader::new(FS))
    }

    #[test]
    fn reflection_and_sampler_units() {
        let (mut ctx, caps) = setup(HeadlessConfig::default());
        let pass = Pass::create(&mut ctx, &caps, descriptor()).unwrap();
        let names: Vec<_> = pass.attributes().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["position", "uv"]);
        assert_eq!(pass.uniform("uWeights").unwrap().size, 3);
        assert_eq!(pass.sampler("uBase").unwrap().unit(), 0);
        assert_eq!(pass.sampler("uSky").unwrap().unit(), 1);
        assert_eq!(
            pass.sampler("uSky").unwrap().dimension(),
            SamplerDimension::Cube
        );
        assert!(ctx.is_program(pass.native().unwrap()));
    }

    #[test]
    fn compile_failure_is_config_with_log() {
        let (mut ctx, caps) = setup(HeadlessConfig::default());
        let broken = PassDescriptor::new(
            "broken",
            VertexShader::new(VS),
            FragmentShader::new("uniform vec4 uColor;"),
        );
        let e = Pass::create(&mut ctx, &caps, broken).unwrap_err();
        assert!(e.is_config());
        assert!(e.to_string().contains("main"));
        assert_eq!(ctx.live_objects(), 0);
    }

    #[test]
    fn too_many_samplers() {
        let mut config = HeadlessConfig::default();
        let mut limits = config.limits;
        limits.max_texture_units = 1;
        config = config.with_limits(limits);
        let (mut ctx, caps) = setup(config);
        let e = Pass::create(&mut ctx, &caps, descriptor()).unwrap_err();
        assert!(e.to_string().contains("texture unit 1"));
    }

    #[test]
    fn state_maps_to_native() {
        assert_eq!(Blend::None.native(), None);
        assert_eq!(Blend::Additive.native(), Some((gl::ONE, gl::ONE)));
        assert_eq!(DepthTest::GreaterEqual.native(), gl::GEQUAL);
        assert_eq!(RenderState::default().cull, Cull::Back);
    }
}
