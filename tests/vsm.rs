//! Variance shadow maps: blur passes, scratch reuse and capability fallback.

mod common;

use common::{cube, viewer, RecordingBackend};
use penumbra::glam::{Vec2, Vec3, Vec4};
use penumbra::renderer::shadow::ShadowConfig;
use penumbra::{
    AtlasTarget, BlurMode, DeviceCaps, FrameContext, Light, LightId, ShadowAlgorithm,
    ShadowRenderer, TargetHandle,
};

fn vsm_spot(id: u32, caps: &DeviceCaps) -> Light {
    let mut light = Light::spot(LightId(id), Vec3::new(0.0, 10.0, 0.0), Vec3::NEG_Y, 30.0, 20.0);
    light.shadow.set_algorithm(ShadowAlgorithm::Vsm16, caps);
    light.shadow.resolution = 256;
    light.shadow.vsm_blur_size = 5;
    light.shadow.blur_mode = BlurMode::Box;
    light
}

#[test]
fn test_blur_runs_two_passes_through_scratch() {
    let mut backend = RecordingBackend::default();
    let mut renderer = ShadowRenderer::new(ShadowConfig::default());
    let camera = viewer();
    let casters = vec![cube(0, Vec3::ZERO)];
    let mut lights = vec![vsm_spot(1, &DeviceCaps::FULL)];

    let frame = renderer.render(&mut lights, &casters, &FrameContext::new(&camera), &mut backend);
    assert_eq!(frame.stats.blur_passes, 2);

    let map = frame.light(LightId(1)).expect("output").target;
    let blurs = backend.blurs();
    assert_eq!(blurs.len(), 2);

    let scratch = blurs[0].destination;
    assert_eq!(blurs[0].source, map);
    assert_ne!(scratch, map);
    assert_eq!(blurs[1].source, scratch);
    assert_eq!(blurs[1].destination, map);
    assert!((blurs[0].offset - Vec2::new(1.0 / 256.0, 0.0)).length() < 1e-9);
    assert!((blurs[1].offset - Vec2::new(0.0, 1.0 / 256.0)).length() < 1e-9);
    assert!(blurs.iter().all(|b| b.taps == 5));

    // Scratch matches the map's size and format and went back to the pool.
    let scratch_desc = backend.live[&scratch];
    assert_eq!(scratch_desc.resolution, 256);
    assert_eq!(scratch_desc.color_format, Some(wgpu::TextureFormat::Rgba16Float));
    assert_eq!(renderer.pool().outstanding(), 0);
    assert_eq!(renderer.pool().pooled(), 1);
}

#[test]
fn test_scratch_targets_are_reused() {
    let mut backend = RecordingBackend::default();
    let mut renderer = ShadowRenderer::new(ShadowConfig::default());
    let camera = viewer();
    let casters = vec![cube(0, Vec3::ZERO)];
    let mut lights = vec![vsm_spot(1, &DeviceCaps::FULL), vsm_spot(2, &DeviceCaps::FULL)];
    let context = FrameContext::new(&camera);

    renderer.render(&mut lights, &casters, &context, &mut backend);
    // Two maps and one shared scratch target.
    assert_eq!(backend.created().len(), 3);

    backend.take_calls();
    let frame = renderer.render(&mut lights, &casters, &context, &mut backend);
    assert_eq!(frame.stats.blur_passes, 4);
    assert!(backend.created().is_empty());
    assert_eq!(renderer.pool().pooled(), 1);
}

#[test]
fn test_omni_vsm_blurs_every_layer() {
    let mut backend = RecordingBackend::default();
    let mut renderer = ShadowRenderer::new(ShadowConfig::default());
    let camera = viewer();
    let mut omni = Light::omni(LightId(3), Vec3::new(0.0, 2.0, 0.0), 10.0);
    omni.shadow.set_algorithm(ShadowAlgorithm::Vsm32, &DeviceCaps::FULL);
    omni.shadow.resolution = 128;
    let mut lights = vec![omni];

    let frame = renderer.render(&mut lights, &[], &FrameContext::new(&camera), &mut backend);
    assert_eq!(frame.stats.blur_passes, 12);

    let layers: Vec<u32> = backend
        .blurs()
        .iter()
        .skip(1)
        .step_by(2)
        .map(|b| b.destination_layer)
        .collect();
    assert_eq!(layers, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_atlas_lights_are_not_blurred() {
    let mut backend = RecordingBackend::default();
    let mut renderer = ShadowRenderer::new(ShadowConfig::default());
    let camera = viewer();
    let mut light = vsm_spot(1, &DeviceCaps::FULL);
    light.shadow.atlas_viewport = Some(Vec4::new(0.0, 0.0, 0.5, 0.5));
    let mut lights = vec![light];

    let atlas = AtlasTarget {
        target: TargetHandle(77),
        resolution: 2048,
        color_format: Some(wgpu::TextureFormat::Rgba16Float),
    };
    let frame = renderer.render(
        &mut lights,
        &[cube(0, Vec3::ZERO)],
        &FrameContext::new(&camera).with_atlas(atlas),
        &mut backend,
    );

    assert_eq!(frame.lights.len(), 1);
    assert_eq!(frame.stats.blur_passes, 0);
    assert!(backend.blurs().is_empty());
    assert!(backend.created().is_empty());
}

#[test]
fn test_moment_atlas_without_color_skips_light() {
    let mut backend = RecordingBackend::default();
    let mut renderer = ShadowRenderer::new(ShadowConfig::default());
    let camera = viewer();
    let mut light = vsm_spot(1, &DeviceCaps::FULL);
    light.shadow.atlas_viewport = Some(Vec4::new(0.0, 0.0, 0.5, 0.5));
    let mut lights = vec![light];

    let atlas = AtlasTarget {
        target: TargetHandle(77),
        resolution: 2048,
        color_format: None,
    };
    let frame = renderer.render(
        &mut lights,
        &[cube(0, Vec3::ZERO)],
        &FrameContext::new(&camera).with_atlas(atlas),
        &mut backend,
    );

    assert!(frame.lights.is_empty());
    assert_eq!(frame.stats.skipped_lights, 1);
    assert!(backend.calls.is_empty());
}

#[test]
fn test_minimal_hardware_falls_back() {
    let caps = DeviceCaps::MINIMAL;
    let mut backend = RecordingBackend::new(caps);
    let mut renderer = ShadowRenderer::new(ShadowConfig::default());
    let camera = viewer();

    let vsm = vsm_spot(1, &caps);
    assert_eq!(vsm.shadow.algorithm, ShadowAlgorithm::Vsm8);

    let mut pcf = Light::spot(LightId(2), Vec3::new(0.0, 10.0, 0.0), Vec3::NEG_Y, 30.0, 20.0);
    assert_eq!(
        pcf.shadow.set_algorithm(ShadowAlgorithm::Pcf5, &caps),
        ShadowAlgorithm::Pcf1
    );

    let mut lights = vec![vsm, pcf];
    let frame = renderer.render(
        &mut lights,
        &[cube(0, Vec3::ZERO)],
        &FrameContext::new(&camera),
        &mut backend,
    );
    assert_eq!(frame.lights.len(), 2);

    let vsm_map = frame.light(LightId(1)).expect("vsm").target;
    let pcf_map = frame.light(LightId(2)).expect("pcf").target;
    assert_eq!(
        backend.live[&vsm_map].color_format,
        Some(wgpu::TextureFormat::Rgba8Unorm)
    );
    // Without depth comparison PCF depth goes through a packed color target.
    assert_eq!(
        backend.live[&pcf_map].color_format,
        Some(wgpu::TextureFormat::Rgba8Unorm)
    );
}
