// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//
// Measures the CPU cost of frame() over the headless backend: culling, binding and
// draw submission for a few hundred instances across two stages.

use stages_and_passes::glam::{Mat4, Vec3, Vec4};
use stages_and_passes::images::Device;
use stages_and_passes::images::mesh::Mesh;
use stages_and_passes::images::render_pass::PassDescriptor;
use stages_and_passes::images::shader::{FragmentShader, VertexShader};
use stages_and_passes::images::stage::Semantic;
use stages_and_passes::imp::ContextSettings;
use stages_and_passes::imp::headless::{HeadlessConfig, HeadlessContext};
use stages_and_passes::pixel_formats::Format;
use std::time::{Duration, Instant};

const INSTANCES: usize = 400;
const WARMUP: usize = 10;
const FRAMES: usize = 200;

const VERTEX: &str = "attribute vec3 position;\n\
    uniform mat4 uMVP;\n\
    void main() { gl_Position = uMVP * vec4(position, 1.0); }";
const FRAGMENT: &str = "precision mediump float;\n\
    uniform vec4 uColor;\n\
    void main() { gl_FragColor = uColor; }";

fn build() -> stages_and_passes::Result<Device<HeadlessContext>> {
    let mut device = Device::new(
        HeadlessContext::new(HeadlessConfig::full(1280, 720)),
        ContextSettings::default(),
    );
    let shadow_target = device.make_target_with(&[Format::Rgba], 512, 512, Some(Format::Depth))?;
    let main = device.make_stage("main", device.default_target())?;
    let shadow = device.make_stage("shadow", shadow_target)?;
    for stage in [main, shadow] {
        let s = device.stage_mut(stage)?;
        s.set_view(Mat4::look_at_rh(Vec3::new(0.0, 0.0, 20.0), Vec3::ZERO, Vec3::Y));
        s.set_projection(Mat4::perspective_rh_gl(1.0, 16.0 / 9.0, 0.1, 100.0));
        s.set_uniform("uMVP", Some(Semantic::ModelViewProjection.into()));
    }
    let pass = device.make_pass(PassDescriptor::new(
        "flat",
        VertexShader::new(VERTEX),
        FragmentShader::new(FRAGMENT),
    ))?;
    let material = device.make_material("flat")?;
    device.set_material_pass(material, &["main", "shadow"], Some(pass))?;
    device
        .material_mut(material)?
        .set_uniform("uColor", Some(Vec4::ONE.into()));
    let mesh = device.make_mesh(Mesh::grid(8, 8)?);
    for i in 0..INSTANCES {
        let instance = device.make_instance(Some(material), Some(mesh))?;
        let x = (i % 40) as f32 - 20.0;
        let y = (i / 40) as f32 - 5.0;
        device
            .instance_mut(instance)?
            .set_transform(Mat4::from_translation(Vec3::new(x, y, 0.0)));
    }
    Ok(device)
}

fn main() -> stages_and_passes::Result<()> {
    let mut device = build()?;
    for _ in 0..WARMUP {
        device.frame()?;
    }
    let mut total = Duration::ZERO;
    let mut slowest = Duration::ZERO;
    let mut drawn = 0;
    for _ in 0..FRAMES {
        device.native_mut().take_draw_calls();
        let start = Instant::now();
        let stats = device.frame()?;
        let elapsed = start.elapsed();
        total += elapsed;
        slowest = slowest.max(elapsed);
        drawn = stats.totals.instance_drawn;
    }
    let mean = total / FRAMES as u32;
    logwise::info_sync!(
        "frame_loop: {frames} frames, mean {mean}, slowest {slowest}, {drawn} instances drawn per frame",
        frames = FRAMES,
        mean = logwise::privacy::LogIt(&mean),
        slowest = logwise::privacy::LogIt(&slowest),
        drawn = drawn
    );
    println!("frame_loop: mean {mean:?}, slowest {slowest:?}, drawn {drawn}");
    Ok(())
}
