//! Full-frame shadow rendering against a recording backend.

mod common;

use common::{cube, viewer, Call, RecordingBackend};
use penumbra::glam::{Vec3, Vec4};
use penumbra::renderer::shadow::{ClearScope, PixelRect, ShadowConfig};
use penumbra::{
    AtlasTarget, Caster, FrameContext, Light, LightId, ShadowRenderer, TargetHandle, UpdateMode,
};

const SUN: LightId = LightId(1);
const SPOT: LightId = LightId(2);
const OMNI: LightId = LightId(3);

fn lights() -> Vec<Light> {
    let mut sun = Light::directional(SUN, Vec3::NEG_Y);
    sun.shadow.set_cascade_count(2);
    sun.shadow.shadow_distance = 40.0;

    let spot = Light::spot(SPOT, Vec3::new(0.0, 10.0, 0.0), Vec3::NEG_Y, 30.0, 20.0);
    let omni = Light::omni(OMNI, Vec3::new(20.0, 2.0, 0.0), 10.0);

    vec![sun, spot, omni]
}

fn scene() -> Vec<Caster> {
    let mut hidden = cube(8, Vec3::new(0.0, 0.0, -8.0));
    hidden.casts_shadows = false;
    let mut unculled = cube(9, Vec3::new(-300.0, 0.0, 0.0));
    unculled.cull = false;

    vec![
        cube(0, Vec3::ZERO),
        cube(1, Vec3::new(2.0, 0.0, -2.0)),
        cube(2, Vec3::new(0.0, 0.0, -8.0)),
        cube(3, Vec3::new(0.0, 0.0, -40.0)),
        cube(4, Vec3::new(200.0, 0.0, -8.0)),
        cube(5, Vec3::new(20.0, 2.0, -5.0)),
        cube(6, Vec3::new(25.0, 2.0, 0.0)),
        cube(7, Vec3::new(20.0, -3.0, 0.0)),
        hidden,
        unculled,
    ]
}

#[test]
fn test_three_light_scene() {
    let mut backend = RecordingBackend::default();
    let mut renderer = ShadowRenderer::new(ShadowConfig::default());
    let camera = viewer();
    let casters = scene();
    let mut lights = lights();

    let frame = renderer.render(&mut lights, &casters, &FrameContext::new(&camera), &mut backend);

    assert_eq!(frame.lights.len(), 3);
    assert_eq!(frame.stats.map_updates, 3);
    assert_eq!(frame.stats.skipped_lights, 0);
    assert_eq!(frame.stats.blur_passes, 0);

    let sun = frame.light(SUN).expect("sun output");
    assert_eq!(sun.face_count, 2);
    assert_eq!(sun.visible_counts, vec![4, 8]);
    assert_eq!(sun.shadow_matrices.len(), 32);
    assert_eq!(sun.cascade_distances.len(), 2);
    assert!((sun.cascade_distances[0] - 11.025).abs() < 1e-3);
    assert!((sun.cascade_distances[1] - 40.0).abs() < 1e-6);

    let spot = frame.light(SPOT).expect("spot output");
    assert_eq!(spot.visible_counts, vec![3]);
    assert!(spot.cascade_distances.is_empty());

    let omni = frame.light(OMNI).expect("omni output");
    assert_eq!(omni.face_count, 6);
    assert_eq!(omni.visible_counts, vec![2, 1, 1, 2, 1, 2]);

    assert_eq!(frame.stats.draw_calls, 24);
    assert_eq!(frame.stats.culled_casters, 24);
    assert_eq!(backend.count(|c| matches!(c, Call::Draw(_))), 24);

    // One map per light, each sized for its faces.
    let created = backend.created();
    assert_eq!(created.len(), 3);
    let desc = |light: LightId| {
        let target = frame.light(light).expect("output").target;
        backend.live[&target]
    };
    assert_eq!(desc(SUN).layers, 1);
    assert_eq!(desc(SUN).color_format, None);
    assert_eq!(desc(SPOT).color_format, None);
    assert_eq!(desc(OMNI).layers, 6);
    assert!(desc(OMNI).cube);
    assert_eq!(desc(OMNI).color_format, Some(wgpu::TextureFormat::R32Float));

    // One variant per caster, algorithm and light type.
    assert_eq!(backend.count(|c| matches!(c, Call::Compile(_))), 15);
}

#[test]
fn test_face_passes_follow_light_layout() {
    let mut backend = RecordingBackend::default();
    let mut renderer = ShadowRenderer::new(ShadowConfig::default());
    let camera = viewer();
    let mut lights = lights();

    let frame = renderer.render(&mut lights, &scene(), &FrameContext::new(&camera), &mut backend);
    let faces = backend.faces();
    assert_eq!(faces.len(), 9);

    let sun = frame.light(SUN).expect("sun output").target;
    let cascades: Vec<_> = faces.iter().filter(|f| f.target == sun).collect();
    assert_eq!(cascades[0].clear_scope, ClearScope::Target);
    assert_eq!(cascades[1].clear_scope, ClearScope::None);
    assert_eq!(
        cascades[1].viewport,
        PixelRect {
            x: 0,
            y: 512,
            width: 512,
            height: 512
        }
    );
    assert_eq!(cascades[0].scissor, cascades[0].viewport);

    let omni = frame.light(OMNI).expect("omni output").target;
    let layers: Vec<u32> = faces
        .iter()
        .filter(|f| f.target == omni)
        .map(|f| f.layer)
        .collect();
    assert_eq!(layers, vec![0, 1, 2, 3, 4, 5]);
    let first = faces.iter().find(|f| f.target == omni).expect("omni face");
    assert_eq!(first.light_position, Vec3::new(20.0, 2.0, 0.0));
    assert!((first.light_range - 10.0).abs() < 1e-6);
    assert_eq!(first.clear.color, Some([1.0; 4]));

    // Every face is closed before the next begins.
    let mut open = false;
    for call in &backend.calls {
        match call {
            Call::BeginFace(_) => {
                assert!(!open);
                open = true;
            }
            Call::Draw(_) => assert!(open),
            Call::EndFace => {
                assert!(open);
                open = false;
            }
            _ => {}
        }
    }
    assert!(!open);
}

#[test]
fn test_second_frame_reuses_maps_and_variants() {
    let mut backend = RecordingBackend::default();
    let mut renderer = ShadowRenderer::new(ShadowConfig::default());
    let camera = viewer();
    let casters = scene();
    let mut lights = lights();
    let context = FrameContext::new(&camera);

    renderer.render(&mut lights, &casters, &context, &mut backend);
    backend.take_calls();

    let frame = renderer.render(&mut lights, &casters, &context, &mut backend);
    assert_eq!(frame.stats.draw_calls, 24);
    assert!(backend.created().is_empty());
    assert_eq!(backend.count(|c| matches!(c, Call::Compile(_))), 0);

    // A resolution change re-creates only that light's map.
    lights[1].shadow.resolution = 512;
    backend.take_calls();
    renderer.render(&mut lights, &casters, &context, &mut backend);
    assert_eq!(backend.created().len(), 1);
    assert_eq!(backend.count(|c| matches!(c, Call::DestroyTarget(_))), 1);
    assert_eq!(backend.live.len(), 3);
}

#[test]
fn test_update_once_then_never() {
    let mut backend = RecordingBackend::default();
    let mut renderer = ShadowRenderer::new(ShadowConfig::default());
    let camera = viewer();
    let casters = scene();
    let mut lights = lights();
    lights[1].shadow.update_mode = UpdateMode::Once;
    let context = FrameContext::new(&camera);

    let first = renderer.render(&mut lights, &casters, &context, &mut backend);
    assert!(first.light(SPOT).is_some());
    assert_eq!(lights[1].shadow.update_mode, UpdateMode::Never);

    let second = renderer.render(&mut lights, &casters, &context, &mut backend);
    assert!(second.light(SPOT).is_none());
    assert_eq!(second.lights.len(), 2);
    assert_eq!(second.stats.map_updates, 2);

    // The map stays allocated for sampling.
    assert_eq!(renderer.store().len(), 3);
}

#[test]
fn test_disabled_and_non_casting_lights_are_ignored() {
    let mut backend = RecordingBackend::default();
    let mut renderer = ShadowRenderer::new(ShadowConfig::default());
    let camera = viewer();
    let mut lights = lights();
    lights[0].enabled = false;
    lights[2].casts_shadows = false;

    let frame = renderer.render(&mut lights, &scene(), &FrameContext::new(&camera), &mut backend);
    assert_eq!(frame.lights.len(), 1);
    assert_eq!(frame.stats.skipped_lights, 0);
    assert_eq!(backend.created().len(), 1);
}

#[test]
fn test_clustered_frame_uses_atlas_for_local_lights() {
    let mut backend = RecordingBackend::default();
    let mut renderer = ShadowRenderer::new(ShadowConfig::default());
    let camera = viewer();
    let mut lights = lights();
    lights[1].shadow.atlas_viewport = Some(Vec4::new(0.0, 0.0, 0.25, 0.25));
    lights[2].shadow.atlas_viewport = Some(Vec4::new(0.25, 0.0, 0.375, 0.375));

    let atlas = AtlasTarget {
        target: TargetHandle(900),
        resolution: 4096,
        color_format: None,
    };
    let context = FrameContext::new(&camera).with_atlas(atlas);
    let frame = renderer.render(&mut lights, &scene(), &context, &mut backend);

    // Only the directional light owns a map.
    assert_eq!(backend.created().len(), 1);
    assert_eq!(frame.light(SPOT).expect("spot").target, atlas.target);
    assert_eq!(frame.light(OMNI).expect("omni").target, atlas.target);

    let omni_faces: Vec<_> = backend
        .faces()
        .into_iter()
        .filter(|f| f.target == atlas.target && f.light_range == 10.0)
        .collect();
    assert_eq!(omni_faces.len(), 6);
    assert!(omni_faces.iter().all(|f| f.layer == 0));
    assert!(omni_faces
        .iter()
        .all(|f| f.clear_scope == ClearScope::Viewport));
    assert_eq!(
        omni_faces[4].viewport,
        PixelRect {
            x: 1536,
            y: 512,
            width: 512,
            height: 512
        }
    );
}

#[test]
fn test_remove_and_clear_release_targets() {
    let mut backend = RecordingBackend::default();
    let mut renderer = ShadowRenderer::new(ShadowConfig::default());
    let camera = viewer();
    let mut lights = lights();

    renderer.render(&mut lights, &scene(), &FrameContext::new(&camera), &mut backend);
    assert_eq!(backend.live.len(), 3);

    renderer.remove_light(OMNI, &mut backend);
    assert_eq!(backend.live.len(), 2);

    renderer.clear(&mut backend);
    assert!(backend.live.is_empty());
    assert!(renderer.culler().is_empty());
}
