// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Sampler configuration and binding-time validation.

use stages_and_passes::bindings::sampler::{Address, Filter, SamplerAddress, SamplerDimension};
use stages_and_passes::images::Device;
use stages_and_passes::images::index_algorithms::Primitive;
use stages_and_passes::images::mesh::Mesh;
use stages_and_passes::images::render_pass::{PassDescriptor, PassId};
use stages_and_passes::images::shader::{FragmentShader, VertexShader};
use stages_and_passes::images::texture::{MipMode, TextureDescriptor};
use stages_and_passes::images::vertex_layout::Attribute;
use stages_and_passes::imp::headless::{HeadlessConfig, HeadlessContext};
use stages_and_passes::imp::{ContextSettings, gl};
use stages_and_passes::pixel_formats::Format;

const VERTEX: &str = "attribute vec3 position;\nvoid main() { gl_Position = vec4(position, 1.0); }";
const FRAGMENT: &str = "precision mediump float;\n\
    uniform sampler2D uAlbedo;\n\
    uniform samplerCube uEnvironment;\n\
    uniform sampler2D uShadow;\n\
    void main() { gl_FragColor = texture2D(uAlbedo, vec2(0.0)); }";

fn device(config: HeadlessConfig) -> Device<HeadlessContext> {
    Device::new(HeadlessContext::new(config), ContextSettings::default())
}

fn textured_pass(d: &mut Device<HeadlessContext>) -> PassId {
    d.make_pass(PassDescriptor::new(
        "textured",
        VertexShader::new(VERTEX),
        FragmentShader::new(FRAGMENT),
    ))
    .unwrap()
}

#[test]
fn samplers_follow_declaration_order() {
    let mut d = device(HeadlessConfig::default());
    let pass = textured_pass(&mut d);
    let p = d.pass(pass).unwrap();
    let samplers: Vec<(&str, u32, SamplerDimension)> = p
        .samplers()
        .iter()
        .map(|s| (s.name(), s.unit(), s.dimension()))
        .collect();
    assert_eq!(
        samplers,
        [
            ("uAlbedo", 0, SamplerDimension::D2),
            ("uEnvironment", 1, SamplerDimension::Cube),
            ("uShadow", 2, SamplerDimension::D2),
        ]
    );
}

#[test]
fn address_round_trips() {
    let mut d = device(HeadlessConfig::default());
    let pass = textured_pass(&mut d);
    let sampler = d.pass_mut(pass).unwrap().sampler_mut("uAlbedo").unwrap();
    assert_eq!(sampler.address(), SamplerAddress::default());
    for mode in [Address::Clamp, Address::Repeat, Address::Mirror] {
        sampler.set_address(mode);
        assert_eq!(sampler.address(), SamplerAddress { u: mode, v: mode });
    }
    sampler.set_address_uv(Address::Repeat, Address::Clamp);
    assert_eq!(
        sampler.address(),
        SamplerAddress {
            u: Address::Repeat,
            v: Address::Clamp
        }
    );
}

#[test]
fn anisotropy_clamps_to_the_device() {
    let mut d = device(HeadlessConfig::default());
    let max = d.caps().sampler_max_anisotropy;
    assert_eq!(max, 16.0);
    let pass = textured_pass(&mut d);
    let sampler = d.pass_mut(pass).unwrap().sampler_mut("uAlbedo").unwrap();
    assert_eq!(sampler.anisotropy(), 1.0);
    sampler.set_anisotropy(4.0);
    assert_eq!(sampler.anisotropy(), 4.0);
    sampler.set_anisotropy(64.0);
    assert_eq!(sampler.anisotropy(), max);
    sampler.set_anisotropy(0.25);
    assert_eq!(sampler.anisotropy(), 1.0);
}

#[test]
fn anisotropy_without_support_stays_at_one() {
    let mut d = device(HeadlessConfig::default().without_extension(gl::EXT_ANISOTROPIC));
    assert!(!d.caps().anisotropy);
    let pass = textured_pass(&mut d);
    let sampler = d.pass_mut(pass).unwrap().sampler_mut("uShadow").unwrap();
    sampler.set_anisotropy(8.0);
    assert_eq!(sampler.anisotropy(), 1.0);
}

/// A device with one stage drawing one triangle through the textured pass.
fn scene() -> (Device<HeadlessContext>, PassId, stages_and_passes::bindings::MaterialId) {
    let mut d = device(HeadlessConfig::default());
    let pass = textured_pass(&mut d);
    d.make_stage("main", d.default_target()).unwrap();
    let material = d.make_material("textured").unwrap();
    d.set_material_pass(material, &["main"], Some(pass)).unwrap();
    let mut mesh = Mesh::new(Primitive::Triangles);
    mesh.set_attribute(
        "position",
        Attribute::Vec3,
        vec![-1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 0.0, 1.0, 0.0].into(),
    )
    .unwrap();
    let mesh = d.make_mesh(mesh);
    d.make_instance(Some(material), Some(mesh)).unwrap();
    (d, pass, material)
}

#[test]
fn bound_textures_get_sampler_state() {
    let (mut d, pass, material) = scene();
    let albedo = d
        .make_texture(TextureDescriptor::new(Format::Rgba, 64, 64).with_mipmaps(MipMode::Generate))
        .unwrap();
    let sampler = d.pass_mut(pass).unwrap().sampler_mut("uAlbedo").unwrap();
    sampler.set_filter(Filter::Trilinear);
    sampler.set_address_uv(Address::Repeat, Address::Mirror);
    sampler.set_anisotropy(8.0);
    d.material_mut(material)
        .unwrap()
        .set_uniform("uAlbedo", Some(albedo.into()));

    let stats = d.frame().unwrap();
    assert_eq!(stats.totals.instance_drawn, 1);
    let object = d.texture(albedo).unwrap().native().unwrap();
    let ctx = d.native();
    let parameter = |p| ctx.texture_parameter(object, p);
    assert_eq!(parameter(gl::TEXTURE_MIN_FILTER), Some(gl::LINEAR_MIPMAP_LINEAR as f32));
    assert_eq!(parameter(gl::TEXTURE_MAG_FILTER), Some(gl::LINEAR as f32));
    assert_eq!(parameter(gl::TEXTURE_WRAP_S), Some(gl::REPEAT as f32));
    assert_eq!(parameter(gl::TEXTURE_WRAP_T), Some(gl::MIRRORED_REPEAT as f32));
    assert_eq!(parameter(gl::TEXTURE_MAX_ANISOTROPY_EXT), Some(8.0));
    let program = d.pass(pass).unwrap().native().unwrap();
    assert_eq!(ctx.uniform_value(program, "uAlbedo"), Some(&[0.0][..]));
}

#[test]
fn single_level_textures_never_get_mip_filters() {
    let (mut d, pass, material) = scene();
    let albedo = d.make_texture(TextureDescriptor::new(Format::Rgba, 64, 64)).unwrap();
    d.pass_mut(pass)
        .unwrap()
        .sampler_mut("uAlbedo")
        .unwrap()
        .set_filter(Filter::Trilinear);
    d.material_mut(material)
        .unwrap()
        .set_uniform("uAlbedo", Some(albedo.into()));
    d.frame().unwrap();
    let object = d.texture(albedo).unwrap().native().unwrap();
    assert_eq!(
        d.native().texture_parameter(object, gl::TEXTURE_MIN_FILTER),
        Some(gl::LINEAR as f32)
    );
}

#[test]
fn instance_textures_are_unbound_for_later_draws() {
    let (mut d, pass, material) = scene();
    let albedo = d.make_texture(TextureDescriptor::new(Format::Rgba, 4, 4)).unwrap();
    let mesh = d.make_mesh(Mesh::grid(1, 1).unwrap());
    let textured = d.make_instance(Some(material), Some(mesh)).unwrap();
    let i = d.instance_mut(textured).unwrap();
    i.set_cull(false);
    i.set_uniform("uAlbedo", Some(albedo.into()));
    assert_eq!(d.frame().unwrap().totals.instance_drawn, 2);
    let object = d.texture(albedo).unwrap().native();
    assert!(object.is_some());
    assert_eq!(d.native().bound_texture(0, gl::TEXTURE_2D), object);

    let plain = d.make_instance(Some(material), Some(mesh)).unwrap();
    d.instance_mut(plain).unwrap().set_cull(false);
    assert_eq!(d.frame().unwrap().totals.instance_drawn, 3);
    assert_eq!(d.native().bound_texture(0, gl::TEXTURE_2D), None);
    let program = d.pass(pass).unwrap().native().unwrap();
    assert_eq!(d.native().uniform_value(program, "uAlbedo"), Some(&[0.0][..]));
}

#[test]
fn unreadable_depth_cannot_be_sampled() {
    let (mut d, _, material) = scene();
    let depth = d.make_depth(Format::Depth, 64, 64, false).unwrap();
    d.material_mut(material)
        .unwrap()
        .set_uniform("uShadow", Some(depth.into()));
    let error = d.frame().unwrap_err();
    assert!(error.is_config());
    assert!(error.to_string().contains("readable"));

    let readable = d.make_depth(Format::Depth, 64, 64, true).unwrap();
    d.material_mut(material)
        .unwrap()
        .set_uniform("uShadow", Some(readable.into()));
    assert_eq!(d.frame().unwrap().totals.instance_drawn, 1);
}

#[test]
fn repeat_needs_power_of_two() {
    let (mut d, pass, material) = scene();
    let npot = d.make_texture(TextureDescriptor::new(Format::Rgba, 100, 60)).unwrap();
    d.material_mut(material)
        .unwrap()
        .set_uniform("uAlbedo", Some(npot.into()));
    d.frame().unwrap();
    d.pass_mut(pass)
        .unwrap()
        .sampler_mut("uAlbedo")
        .unwrap()
        .set_address(Address::Repeat);
    assert!(d.frame().unwrap_err().is_config());
}

#[test]
fn dimension_must_match() {
    let (mut d, _, material) = scene();
    let flat = d.make_texture(TextureDescriptor::new(Format::Rgba, 16, 16)).unwrap();
    d.material_mut(material)
        .unwrap()
        .set_uniform("uEnvironment", Some(flat.into()));
    let error = d.frame().unwrap_err();
    assert!(error.to_string().contains("cube"));
}

#[test]
fn float_filtering_needs_support() {
    let config = HeadlessConfig::default().without_extension(gl::EXT_TEXTURE_FLOAT_LINEAR);
    let mut d = device(config);
    let pass = textured_pass(&mut d);
    d.make_stage("main", d.default_target()).unwrap();
    let material = d.make_material("m").unwrap();
    d.set_material_pass(material, &["main"], Some(pass)).unwrap();
    let mesh = d.make_mesh(Mesh::grid(1, 1).unwrap());
    d.make_instance(Some(material), Some(mesh)).unwrap();
    let float = d.make_texture(TextureDescriptor::new(Format::Rgba32F, 4, 4)).unwrap();
    d.material_mut(material)
        .unwrap()
        .set_uniform("uAlbedo", Some(float.into()));
    assert!(d.frame().unwrap_err().is_config());
    d.pass_mut(pass)
        .unwrap()
        .sampler_mut("uAlbedo")
        .unwrap()
        .set_filter(Filter::None);
    d.frame().unwrap();
}
