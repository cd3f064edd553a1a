// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! End-to-end frames over the headless backend.

use stages_and_passes::bindings::MaterialId;
use stages_and_passes::glam::{Mat4, Vec3, Vec4};
use stages_and_passes::images::Device;
use stages_and_passes::images::index_algorithms::{IndexData, Primitive};
use stages_and_passes::images::mesh::{Mesh, MeshId};
use stages_and_passes::images::render_pass::{PassDescriptor, PassId, RenderState};
use stages_and_passes::images::shader::{FragmentShader, VertexShader};
use stages_and_passes::images::stage::{Clear, Semantic, WriteMask};
use stages_and_passes::images::vertex_layout::Attribute;
use stages_and_passes::imp::headless::{HeadlessConfig, HeadlessContext};
use stages_and_passes::imp::{ContextSettings, gl};
use stages_and_passes::pixel_formats::Format;

const VERTEX: &str = "attribute vec3 position;\n\
    uniform mat4 uMVP;\n\
    void main() { gl_Position = uMVP * vec4(position, 1.0); }";
const FRAGMENT: &str = "precision mediump float;\n\
    uniform vec4 uColor;\n\
    void main() { gl_FragColor = uColor; }";

struct Scene {
    device: Device<HeadlessContext>,
    pass: PassId,
    material: MaterialId,
    triangle: MeshId,
}

fn triangle() -> Mesh {
    let mut mesh = Mesh::new(Primitive::Triangles);
    mesh.set_attribute(
        "position",
        Attribute::Vec3,
        vec![-0.5, -0.5, 0.0, 0.5, -0.5, 0.0, 0.0, 0.5, 0.0].into(),
    )
    .unwrap();
    mesh
}

/// A 300×200 device with a "main" stage on the default target and a material drawn there.
fn scene() -> Scene {
    let mut device = Device::new(
        HeadlessContext::new(HeadlessConfig::full(300, 200)),
        ContextSettings::default(),
    );
    device.make_stage("main", device.default_target()).unwrap();
    let pass = device
        .make_pass(PassDescriptor::new(
            "flat",
            VertexShader::new(VERTEX),
            FragmentShader::new(FRAGMENT),
        ))
        .unwrap();
    let material = device.make_material("flat").unwrap();
    device.set_material_pass(material, &["main"], Some(pass)).unwrap();
    let triangle = device.make_mesh(triangle());
    Scene {
        device,
        pass,
        material,
        triangle,
    }
}

#[test]
fn one_triangle() {
    let Scene {
        mut device,
        material,
        triangle,
        ..
    } = scene();
    device.make_instance(Some(material), Some(triangle)).unwrap();
    let stats = device.frame().unwrap();
    assert!(!stats.lost);
    let main = stats.stage("main").unwrap();
    assert!(main.instance_total >= 1);
    assert_eq!(main.instance_drawn, 1);
    assert_eq!(main.vertex_drawn, 3);
    assert_eq!(main.primitive_drawn, 1);
    assert_eq!(stats.totals, *main);

    let draws = device.native().draw_calls();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].framebuffer, None);
    assert_eq!(draws[0].mode, gl::TRIANGLES);
    assert_eq!(draws[0].count, 3);
    assert!(!draws[0].indexed);
    assert_eq!(device.native().clear_count(), 1);
}

#[test]
fn instances_without_a_pass_are_counted_not_drawn() {
    let Scene {
        mut device,
        pass,
        material,
        triangle,
    } = scene();
    device.make_stage("shadow", device.default_target()).unwrap();
    let caster = device.make_material("caster").unwrap();
    device
        .set_material_pass(caster, &["main", "shadow"], Some(pass))
        .unwrap();
    device.make_instance(Some(material), Some(triangle)).unwrap();
    device.make_instance(Some(caster), Some(triangle)).unwrap();

    let stats = device.frame().unwrap();
    let main = stats.stage("main").unwrap();
    assert_eq!((main.instance_total, main.instance_drawn), (2, 2));
    let shadow = stats.stage("shadow").unwrap();
    assert_eq!((shadow.instance_total, shadow.instance_drawn), (2, 1));
    assert_eq!(shadow.vertex_total, 6);
    assert_eq!(shadow.vertex_drawn, 3);
    assert_eq!(stats.totals.instance_drawn, 3);
}

#[test]
fn inert_hidden_and_culled_instances_are_skipped() {
    let Scene {
        mut device,
        material,
        triangle,
        ..
    } = scene();
    device.make_instance(Some(material), None).unwrap();
    device.make_instance(None, Some(triangle)).unwrap();
    let hidden = device.make_instance(Some(material), Some(triangle)).unwrap();
    device.instance_mut(hidden).unwrap().set_visible(false);
    let far = device.make_instance(Some(material), Some(triangle)).unwrap();
    device
        .instance_mut(far)
        .unwrap()
        .set_transform(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));

    let main = *device.frame().unwrap().stage("main").unwrap();
    assert_eq!(main.instance_total, 4);
    assert_eq!(main.instance_drawn, 0);

    device.instance_mut(far).unwrap().set_cull(false);
    let main = *device.frame().unwrap().stage("main").unwrap();
    assert_eq!(main.instance_drawn, 1);
    let bounds = device.instance_bounds(far).unwrap().unwrap();
    assert_eq!(bounds.min, Vec3::new(9.5, -0.5, 0.0));
}

#[test]
fn instance_uniforms_override_material_and_stage() {
    let Scene {
        mut device,
        pass,
        material,
        triangle,
    } = scene();
    let stage = device.stage_by_name("main").unwrap();
    device
        .stage_mut(stage)
        .unwrap()
        .set_uniform("uColor", Some(Vec4::new(1.0, 0.0, 0.0, 1.0).into()));
    let program = device.pass(pass).unwrap().native().unwrap();

    let instance = device.make_instance(Some(material), Some(triangle)).unwrap();
    device.frame().unwrap();
    assert_eq!(
        device.native().uniform_value(program, "uColor"),
        Some(&[1.0, 0.0, 0.0, 1.0][..])
    );

    device
        .material_mut(material)
        .unwrap()
        .set_uniform("uColor", Some(Vec4::new(0.0, 1.0, 0.0, 1.0).into()));
    device.frame().unwrap();
    assert_eq!(
        device.native().uniform_value(program, "uColor"),
        Some(&[0.0, 1.0, 0.0, 1.0][..])
    );

    device
        .instance_mut(instance)
        .unwrap()
        .set_uniform("uColor", Some(Vec4::new(0.0, 0.0, 1.0, 1.0).into()));
    device.frame().unwrap();
    assert_eq!(
        device.native().uniform_value(program, "uColor"),
        Some(&[0.0, 0.0, 1.0, 1.0][..])
    );
}

#[test]
fn instance_uniforms_stay_with_their_draw() {
    let Scene {
        mut device,
        material,
        triangle,
        ..
    } = scene();
    let blue = device.make_instance(Some(material), Some(triangle)).unwrap();
    device
        .instance_mut(blue)
        .unwrap()
        .set_uniform("uColor", Some(Vec4::new(0.0, 0.0, 1.0, 1.0).into()));
    device.make_instance(Some(material), Some(triangle)).unwrap();

    assert_eq!(device.frame().unwrap().totals.instance_drawn, 2);
    let draws = device.native_mut().take_draw_calls();
    assert_eq!(draws[0].uniform("uColor"), Some(&[0.0, 0.0, 1.0, 1.0][..]));
    assert_eq!(draws[1].uniform("uColor"), Some(&[0.0; 4][..]));
    assert_eq!(draws[1].uniform("uMVP"), Some(&[0.0; 16][..]));

    device
        .material_mut(material)
        .unwrap()
        .set_uniform("uColor", Some(Vec4::new(1.0, 0.0, 0.0, 1.0).into()));
    device.frame().unwrap();
    let draws = device.native_mut().take_draw_calls();
    assert_eq!(draws[0].uniform("uColor"), Some(&[0.0, 0.0, 1.0, 1.0][..]));
    assert_eq!(draws[1].uniform("uColor"), Some(&[1.0, 0.0, 0.0, 1.0][..]));
}

#[test]
fn semantic_uniforms_follow_view_and_transform() {
    let Scene {
        mut device,
        pass,
        material,
        triangle,
    } = scene();
    let stage = device.stage_by_name("main").unwrap();
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Vec3::Y);
    let projection = Mat4::perspective_rh_gl(1.0, 1.5, 0.1, 100.0);
    let s = device.stage_mut(stage).unwrap();
    s.set_view(view);
    s.set_projection(projection);
    s.set_uniform("uMVP", Some(Semantic::ModelViewProjection.into()));

    let model = Mat4::from_translation(Vec3::new(0.25, 0.0, 0.0));
    let instance = device.make_instance(Some(material), Some(triangle)).unwrap();
    device.instance_mut(instance).unwrap().set_transform(model);
    assert_eq!(device.frame().unwrap().totals.instance_drawn, 1);

    let program = device.pass(pass).unwrap().native().unwrap();
    let expected = (projection * view * model).to_cols_array();
    let uploaded = device.native().uniform_value(program, "uMVP").unwrap();
    for (a, b) in uploaded.iter().zip(expected) {
        assert!((a - b).abs() < 1e-5);
    }
}

#[test]
fn mismatched_uniform_types_fail_the_frame() {
    let Scene {
        mut device,
        material,
        triangle,
        ..
    } = scene();
    device.make_instance(Some(material), Some(triangle)).unwrap();
    let m = device.material_mut(material).unwrap();
    m.set_uniform("uColor", Some(1.0f32.into()));
    m.set_uniform("uUnused", Some(Vec3::ONE.into()));
    assert!(device.frame().unwrap_err().is_config());
    device
        .material_mut(material)
        .unwrap()
        .set_uniform("uColor", None);
    device.frame().unwrap();
}

#[test]
fn stages_run_in_creation_order_into_their_targets() {
    let Scene {
        mut device,
        pass,
        triangle,
        ..
    } = scene();
    let offscreen = device
        .make_target_with(&[Format::Rgba], 64, 64, Some(Format::Depth))
        .unwrap();
    let late = device.make_stage("late", offscreen).unwrap();
    let everywhere = device.make_material("everywhere").unwrap();
    device
        .set_material_pass(everywhere, &["main", "late"], Some(pass))
        .unwrap();
    device.make_instance(Some(everywhere), Some(triangle)).unwrap();

    let stats = device.frame().unwrap();
    let names: Vec<&str> = stats.stages.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["main", "late"]);
    let framebuffers: Vec<_> = device
        .native()
        .draw_calls()
        .iter()
        .map(|d| d.framebuffer)
        .collect();
    let offscreen_native = device.target(offscreen).unwrap().native();
    assert_eq!(framebuffers, [None, offscreen_native]);

    device.native_mut().take_draw_calls();
    device.stage_mut(late).unwrap().set_enabled(false);
    let stats = device.frame().unwrap();
    assert_eq!(stats.stages.len(), 1);
    assert_eq!(device.native().draw_calls().len(), 1);
}

#[test]
fn stages_without_clear_leave_the_target() {
    let Scene { mut device, .. } = scene();
    let stage = device.stage_by_name("main").unwrap();
    device.stage_mut(stage).unwrap().set_clear(Clear::NONE);
    device.frame().unwrap();
    assert_eq!(device.native().clear_count(), 0);
}

#[test]
fn write_masks_stay_with_their_stage() {
    let Scene {
        mut device,
        pass,
        material,
        triangle,
    } = scene();
    let main = device.stage_by_name("main").unwrap();
    device.stage_mut(main).unwrap().set_write_mask(WriteMask {
        color: [false; 4],
        ..WriteMask::default()
    });
    let late = device.make_stage("late", device.default_target()).unwrap();
    device.stage_mut(late).unwrap().set_clear(Clear::NONE);
    device
        .set_material_pass(material, &["main", "late"], Some(pass))
        .unwrap();
    device.make_instance(Some(material), Some(triangle)).unwrap();

    device.frame().unwrap();
    let draws = device.native_mut().take_draw_calls();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].masks.color, [false; 4]);
    assert!(draws[0].masks.depth);
    assert_eq!(draws[1].masks.color, [true; 4]);
    assert_eq!(device.native().masks().color, [true; 4]);

    device.pass_mut(pass).unwrap().set_state(RenderState {
        depth_write: false,
        ..RenderState::default()
    });
    device.frame().unwrap();
    let draws = device.native_mut().take_draw_calls();
    assert!(draws.iter().all(|d| !d.masks.depth));
    assert_eq!(draws[0].masks.color, [false; 4]);
}

#[test]
fn indexed_meshes_draw_elements() {
    let Scene {
        mut device,
        material,
        ..
    } = scene();
    let grid = device.make_mesh(Mesh::grid(2, 2).unwrap());
    device.make_instance(Some(material), Some(grid)).unwrap();
    let main = *device.frame().unwrap().stage("main").unwrap();
    assert_eq!(main.primitive_drawn, 8);
    let draw = &device.native().draw_calls()[0];
    assert!(draw.indexed);
    assert_eq!(draw.count, 24);
}

#[test]
fn wide_indices_need_support() {
    let mut device = Device::new(
        HeadlessContext::new(HeadlessConfig::minimal(300, 200)),
        ContextSettings::default(),
    );
    device.make_stage("main", device.default_target()).unwrap();
    let pass = device
        .make_pass(PassDescriptor::new(
            "flat",
            VertexShader::new(VERTEX),
            FragmentShader::new(FRAGMENT),
        ))
        .unwrap();
    let material = device.make_material("flat").unwrap();
    device.set_material_pass(material, &["main"], Some(pass)).unwrap();
    let mut mesh = triangle();
    mesh.set_indices(Some(IndexData::U32(vec![0u32, 1, 2].into())))
        .unwrap();
    let mesh = device.make_mesh(mesh);
    device.make_instance(Some(material), Some(mesh)).unwrap();
    assert!(device.frame().unwrap_err().is_config());

    device
        .mesh_mut(mesh)
        .unwrap()
        .set_indices(Some(IndexData::U16(vec![0u16, 1, 2].into())))
        .unwrap();
    assert_eq!(device.frame().unwrap().totals.instance_drawn, 1);
}

#[test]
fn incomplete_targets_fail_the_frame() {
    let Scene { mut device, .. } = scene();
    let empty = device.make_target().unwrap();
    device.make_stage("broken", empty).unwrap();
    let error = device.frame().unwrap_err();
    assert_eq!(
        error.native_code(),
        Some(gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT)
    );
}

#[test]
fn stale_errors_do_not_fail_the_next_frame() {
    let Scene {
        mut device,
        material,
        triangle,
        ..
    } = scene();
    device.make_instance(Some(material), Some(triangle)).unwrap();
    device.native_mut().inject_error(gl::OUT_OF_MEMORY);
    assert_eq!(device.frame().unwrap().totals.instance_drawn, 1);
}

#[test]
fn default_target_follows_the_surface() {
    let Scene { mut device, .. } = scene();
    device.native_mut().resize(640, 480);
    device.frame().unwrap();
    let target = device.default_target();
    assert_eq!(device.target(target).unwrap().size(), Some((640, 480)));
}

#[test]
fn freeing_a_mesh_makes_instances_inert() {
    let Scene {
        mut device,
        material,
        triangle,
        ..
    } = scene();
    let instance = device.make_instance(Some(material), Some(triangle)).unwrap();
    device.frame().unwrap();
    let before = device.native().live_objects();
    device.free_mesh(triangle).unwrap();
    assert!(device.native().live_objects() < before);
    assert_eq!(device.instance(instance).unwrap().mesh(), None);
    let main = *device.frame().unwrap().stage("main").unwrap();
    assert_eq!((main.instance_total, main.instance_drawn), (1, 0));
    device.free_instance(instance).unwrap();
    assert!(device.instance(instance).is_err());
}
