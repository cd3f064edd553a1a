// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Losing and restoring the native context.

use stages_and_passes::images::Device;
use stages_and_passes::images::mesh::Mesh;
use stages_and_passes::images::render_pass::PassDescriptor;
use stages_and_passes::images::shader::{FragmentShader, VertexShader};
use stages_and_passes::images::texture::{MipMode, MipRef, MipSource, TextureDescriptor};
use stages_and_passes::imp::headless::{HeadlessConfig, HeadlessContext};
use stages_and_passes::imp::{ContextSettings, Native, gl};
use stages_and_passes::pixel_formats::Format;

fn device() -> Device<HeadlessContext> {
    Device::new(
        HeadlessContext::new(HeadlessConfig::default()),
        ContextSettings::default().with_antialias(false),
    )
}

fn checker(len: usize) -> Vec<u8> {
    (0..len).map(|i| if i % 8 < 4 { 0xFF } else { 0x00 }).collect()
}

#[test]
fn retained_sources_are_uploaded_again() {
    let mut d = device();
    let texture = d
        .make_texture(TextureDescriptor::new(Format::Rgba, 4, 4).with_mipmaps(MipMode::Explicit))
        .unwrap();
    let kept = MipRef::new(texture, 0, 0);
    let flushed = MipRef::new(texture, 0, 1);
    let source = MipSource::from(checker(64));
    d.set_mip_source(kept, source.clone()).unwrap();
    d.set_mip_source(flushed, vec![9u8; 16]).unwrap();
    d.flush_mip(flushed).unwrap();
    assert!(d.mip_source(flushed).unwrap().is_none());

    let before = d.texture(texture).unwrap().native().unwrap();
    assert!(d.lose_context());
    assert!(d.is_lost());
    d.notify_context_restored().unwrap();
    assert!(!d.is_lost());
    assert_eq!(d.native().generation(), 1);

    let after = d.texture(texture).unwrap().native().unwrap();
    assert_ne!(after, before);
    assert!(d.native().is_texture(after));
    assert!(d.mip_source(kept).unwrap().unwrap().ptr_eq(&source));
    assert_eq!(
        d.native().texture_data(after, gl::TEXTURE_2D, 0),
        Some(&checker(64)[..])
    );
    assert!(d.mip_source(flushed).unwrap().is_none());
    assert_eq!(
        d.native().texture_level_size(after, gl::TEXTURE_2D, 1),
        Some((2, 2))
    );
    assert!(!d.native().settings().antialias);
}

#[test]
fn frames_while_lost_draw_nothing() {
    let mut d = device();
    d.make_stage("main", d.default_target()).unwrap();
    let pass = d
        .make_pass(PassDescriptor::new(
            "flat",
            VertexShader::new("attribute vec3 position;\nvoid main() {}"),
            FragmentShader::new("void main() {}"),
        ))
        .unwrap();
    let material = d.make_material("flat").unwrap();
    d.set_material_pass(material, &["main"], Some(pass)).unwrap();
    let mesh = d.make_mesh(Mesh::grid(1, 1).unwrap());
    d.make_instance(Some(material), Some(mesh)).unwrap();
    assert_eq!(d.frame().unwrap().totals.instance_drawn, 1);

    d.lose_context();
    d.native_mut().take_draw_calls();
    for _ in 0..3 {
        let stats = d.frame().unwrap();
        assert!(stats.lost);
        assert!(stats.stages.is_empty());
    }
    assert!(d.native().draw_calls().is_empty());

    d.notify_context_restored().unwrap();
    let program = d.pass(pass).unwrap().native().unwrap();
    assert!(d.native().is_program(program));
    let stats = d.frame().unwrap();
    assert!(!stats.lost);
    assert_eq!(stats.totals.instance_drawn, 1);
    assert_eq!(d.native().draw_calls().len(), 1);
}

#[test]
fn targets_are_rebuilt_after_their_attachments() {
    let mut d = device();
    let target = d
        .make_target_with(&[Format::Rgba, Format::Rgba16F], 32, 32, Some(Format::DepthStencil))
        .unwrap();
    let readable = d.make_depth(Format::Depth, 32, 32, true).unwrap();
    let shadow = d.make_target_with(&[Format::Rgb], 32, 32, None).unwrap();
    d.set_target_depth(shadow, Some(readable)).unwrap();
    d.make_stage("offscreen", target).unwrap();
    d.make_stage("shadow", shadow).unwrap();
    let before = d.target(target).unwrap().native();

    d.lose_context();
    d.notify_context_restored().unwrap();

    let after = d.target(target).unwrap().native();
    assert_ne!(after, before);
    assert!(d.native().is_framebuffer(after.unwrap()));
    assert!(d.native().is_texture(d.depth(readable).unwrap().native_texture().unwrap()));
    let stats = d.frame().unwrap();
    assert_eq!(stats.stages.len(), 2);
}

#[test]
fn host_restores_are_noticed_by_the_next_frame() {
    let mut d = device();
    d.make_stage("main", d.default_target()).unwrap();
    let texture = d.make_texture(TextureDescriptor::new(Format::Rgba, 2, 2)).unwrap();
    d.set_mip_source(texture.into(), vec![1u8; 16]).unwrap();

    assert!(d.native_mut().lose_context());
    assert!(d.frame().unwrap().lost);
    assert!(d.is_lost());

    let settings = *d.settings();
    assert!(d.native_mut().restore_context(&settings));
    assert!(!d.frame().unwrap().lost);
    assert!(!d.is_lost());
    let object = d.texture(texture).unwrap().native().unwrap();
    assert_eq!(
        d.native().texture_data(object, gl::TEXTURE_2D, 0),
        Some(&[1u8; 16][..])
    );
}

#[test]
fn forced_loss_needs_the_extension() {
    let mut d = Device::new(
        HeadlessContext::new(HeadlessConfig::default().without_extension(gl::EXT_LOSE_CONTEXT)),
        ContextSettings::default(),
    );
    assert!(!d.caps().lose_context);
    assert!(!d.lose_context());
    assert!(!d.is_lost());
    d.notify_context_restored().unwrap();
}

#[test]
fn meshes_upload_again_after_restore() {
    let mut d = device();
    d.make_stage("main", d.default_target()).unwrap();
    let pass = d
        .make_pass(PassDescriptor::new(
            "flat",
            VertexShader::new("attribute vec3 position;\nattribute vec2 uv;\nvoid main() {}"),
            FragmentShader::new("void main() {}"),
        ))
        .unwrap();
    let material = d.make_material("flat").unwrap();
    d.set_material_pass(material, &["main"], Some(pass)).unwrap();
    let mesh = d.make_mesh(Mesh::grid(4, 4).unwrap());
    d.make_instance(Some(material), Some(mesh)).unwrap();
    d.frame().unwrap();
    let uploaded = d.native().live_objects();

    d.lose_context();
    assert_eq!(d.native().live_objects(), 0);
    d.notify_context_restored().unwrap();
    assert!(d.native().live_objects() < uploaded);
    d.frame().unwrap();
    assert_eq!(d.native().live_objects(), uploaded);
}
