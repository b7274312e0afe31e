//! Scene builders shared by the shadow benchmarks.

use glam::{Mat4, Vec3};
use penumbra::{Aabb, Camera, CameraId, Caster, CasterId, Light, LightId, MeshHandle};

/// Deterministic pseudo-random value in [0, 1) for index `i`.
fn hash01(i: u32, salt: u32) -> f32 {
    let mut x = i.wrapping_mul(0x9E37_79B9) ^ salt.wrapping_mul(0x85EB_CA6B);
    x ^= x >> 16;
    x = x.wrapping_mul(0x7FEB_352D);
    x ^= x >> 15;
    (x & 0x00FF_FFFF) as f32 / 16_777_216.0
}

/// `n` unit cubes scattered over a square of side `extent` around the origin.
pub fn scatter_casters(n: u32, extent: f32) -> Vec<Caster> {
    (0..n)
        .map(|i| {
            let position = Vec3::new(
                (hash01(i, 1) - 0.5) * extent,
                hash01(i, 2) * 4.0,
                (hash01(i, 3) - 0.5) * extent,
            );
            Caster::new(
                CasterId(i),
                MeshHandle(i),
                Mat4::from_translation(position),
                Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5)),
            )
        })
        .collect()
}

/// Viewer standing above the scene looking across it.
pub fn bench_viewer() -> Camera {
    Camera::new_perspective(
        CameraId(0),
        Vec3::new(0.0, 5.0, 20.0),
        Vec3::new(0.0, 0.0, -20.0),
        60.0,
        16.0 / 9.0,
        0.1,
        500.0,
    )
}

/// Directional sun with `cascades` cascades.
pub fn sun(cascades: u32) -> Light {
    let mut light = Light::directional(LightId(0), Vec3::new(0.3, -1.0, 0.2));
    light.shadow.set_cascade_count(cascades);
    light.shadow.shadow_distance = 150.0;
    light
}

/// Omni light in the middle of the scene.
pub fn lamp() -> Light {
    Light::omni(LightId(1), Vec3::new(0.0, 3.0, 0.0), 40.0)
}
