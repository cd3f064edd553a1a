// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Depth creation over the headless backend.

use stages_and_passes::images::Device;
use stages_and_passes::imp::ContextSettings;
use stages_and_passes::imp::gl;
use stages_and_passes::imp::headless::{HeadlessConfig, HeadlessContext};
use stages_and_passes::pixel_formats::Format;

fn device(config: HeadlessConfig) -> Device<HeadlessContext> {
    Device::new(HeadlessContext::new(config), ContextSettings::default())
}

#[test]
fn depth_echoes_its_inputs() {
    let mut d = device(HeadlessConfig::default());
    let max = d.caps().depth_max_size;
    for format in [Format::Depth, Format::DepthStencil] {
        let mut edge = 1;
        while edge <= max {
            for readable in [false, true] {
                let id = d.make_depth(format, edge, edge.max(2) / 2, readable).unwrap();
                let depth = d.depth(id).unwrap();
                assert_eq!(depth.format(), format);
                assert_eq!(depth.width(), edge);
                assert_eq!(depth.height(), edge.max(2) / 2);
                assert_eq!(depth.size(), (edge, edge.max(2) / 2));
                assert_eq!(depth.readable(), readable);
                assert_eq!(depth.native_texture().is_some(), readable);
                d.free_depth(id).unwrap();
            }
            edge *= 4;
        }
    }
    assert_eq!(d.native().live_objects(), 0);
}

#[test]
fn depth_rejects_bad_configuration() {
    let mut d = device(HeadlessConfig::default());
    let max = d.caps().depth_max_size;
    let cases = [
        (Format::Rgba, 64, 64, false, "not a depth format"),
        (Format::Depth, 0, 64, false, "width is missing"),
        (Format::Depth, 64, 0, false, "height is missing"),
        (Format::Depth, 48, 64, false, "not a power of two"),
        (Format::Depth, 64, 100, false, "not a power of two"),
        (Format::Depth, max * 2, 64, false, "exceeds the maximum"),
    ];
    for (format, width, height, readable, expected) in cases {
        let error = d.make_depth(format, width, height, readable).unwrap_err();
        assert!(error.is_config(), "{format:?} {width}x{height}");
        assert!(
            error.to_string().contains(expected),
            "{error} should mention {expected}"
        );
    }
    assert_eq!(d.native().live_objects(), 0);
}

#[test]
fn readable_depth_needs_hardware_support() {
    let mut d = device(HeadlessConfig::default().without_extension(gl::EXT_DEPTH_TEXTURE));
    assert!(!d.caps().readable_depth);
    let error = d.make_depth(Format::Depth, 64, 64, true).unwrap_err();
    assert!(error.is_config());
    assert!(error.to_string().contains("readable"));
    d.make_depth(Format::Depth, 64, 64, false).unwrap();
}

#[test]
fn freeing_a_depth_detaches_it() {
    let mut d = device(HeadlessConfig::default());
    let depth = d.make_depth(Format::DepthStencil, 32, 32, false).unwrap();
    let target = d.make_target().unwrap();
    d.set_target_depth(target, Some(depth)).unwrap();
    assert_eq!(d.target(target).unwrap().size(), Some((32, 32)));
    d.free_depth(depth).unwrap();
    assert_eq!(d.target(target).unwrap().depth(), None);
    assert!(d.depth(depth).is_err());
    assert!(d.free_depth(depth).is_err());
}
