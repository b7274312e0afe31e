//! Cascade planning for directional lights
//!
//! Splits the shadow distance into cascades, fits a stable orthographic
//! camera around each slice of the viewer frustum, and tightens its depth
//! range to the casters that survive culling.

use super::camera::{directional_camera, LightBasis, ShadowCamera};
use crate::renderer::bounds::{Aabb, BoundingSphere};
use crate::renderer::viewer::Camera;
use glam::{Vec3, Vec4};

/// Far distance of each cascade.
///
/// Split `i` blends the linear split `N + (F - N) * i / C` with the
/// logarithmic split `N * (F / N)^(i / C)` by `distribution`. The last entry
/// is always `far`.
pub fn cascade_splits(near: f32, far: f32, count: u32, distribution: f32) -> Vec<f32> {
    let count = count.max(1);
    let mut splits = Vec::with_capacity(count as usize);

    for i in 1..count {
        let t = i as f32 / count as f32;
        let linear = near + (far - near) * t;
        let log = near * (far / near).powf(t);
        splits.push(linear + (log - linear) * distribution);
    }

    splits.push(far);
    splits
}

/// Normalized viewports (x, y, w, h) of cascades packed into one map.
pub fn cascade_viewports(count: u32) -> Vec<Vec4> {
    if count <= 1 {
        return vec![Vec4::new(0.0, 0.0, 1.0, 1.0)];
    }

    let tiles = [
        Vec4::new(0.0, 0.0, 0.5, 0.5),
        Vec4::new(0.0, 0.5, 0.5, 0.5),
        Vec4::new(0.5, 0.0, 0.5, 0.5),
        Vec4::new(0.5, 0.5, 0.5, 0.5),
    ];
    tiles[..count.min(4) as usize].to_vec()
}

/// World-space corners of the viewer frustum between two view distances.
///
/// Near corners come first, in the order (-x,-y), (+x,-y), (+x,+y), (-x,+y).
pub fn frustum_slice_corners(camera: &Camera, near: f32, far: f32) -> [Vec3; 8] {
    let world = camera.world_matrix();
    let mut corners = [Vec3::ZERO; 8];

    for (slice, distance) in [near, far].into_iter().enumerate() {
        let (w, h) = camera.projection.half_extents_at(distance);
        let local = [
            Vec3::new(-w, -h, -distance),
            Vec3::new(w, -h, -distance),
            Vec3::new(w, h, -distance),
            Vec3::new(-w, h, -distance),
        ];
        for (i, corner) in local.iter().enumerate() {
            corners[slice * 4 + i] = world.transform_point3(*corner);
        }
    }

    corners
}

/// Centroid (mean of the corners) and radius (farthest corner).
pub fn bounding_sphere(corners: &[Vec3]) -> (Vec3, f32) {
    let sphere = BoundingSphere::from_points(corners);
    (sphere.center, sphere.radius)
}

/// Snap a cascade center to the shadow-map texel grid.
///
/// The grid cell is `radius / (0.25 * resolution)` along the light's up and
/// right axes; the component along the light direction is kept.
pub fn snap_to_texel_grid(center: Vec3, basis: &LightBasis, radius: f32, resolution: u32) -> Vec3 {
    if radius <= 0.0 || resolution == 0 {
        return center;
    }

    let size_ratio = 0.25 * resolution as f32 / radius;
    let x = (center.dot(basis.up) * size_ratio).ceil() / size_ratio;
    let y = (center.dot(basis.right) * size_ratio).ceil() / size_ratio;

    basis.up * x + basis.right * y + basis.forward * center.dot(basis.forward)
}

/// A coarse cascade camera and the snapped center it was built around.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadePlan {
    pub camera: ShadowCamera,
    /// Snapped cascade center; depth is measured from here.
    pub center: Vec3,
    pub radius: f32,
}

/// Fit a coarse camera around the viewer frustum slice `[near, far]`.
pub fn plan_cascade(
    viewer: &Camera,
    basis: &LightBasis,
    near: f32,
    far: f32,
    resolution: u32,
    offset: f32,
) -> CascadePlan {
    let corners = frustum_slice_corners(viewer, near, far);
    let (centroid, radius) = bounding_sphere(&corners);
    let center = snap_to_texel_grid(centroid, basis, radius, resolution);

    CascadePlan {
        camera: directional_camera(basis, center, radius, offset),
        center,
        radius,
    }
}

/// Shrink the cascade depth range to the given caster bounds.
///
/// Depths are measured along the light direction relative to the cascade
/// center, which keeps precision independent of the coarse camera offset.
/// The camera is re-seated `margin` in front of the nearest corner with
/// near = 0 and far covering the farthest corner plus `margin`. Without
/// casters the coarse camera is returned unchanged.
pub fn tighten_depth_range<'a>(
    plan: &CascadePlan,
    casters: impl IntoIterator<Item = &'a Aabb>,
    margin: f32,
) -> ShadowCamera {
    let forward = plan.camera.forward();
    let mut min_depth = f32::MAX;
    let mut max_depth = f32::MIN;

    for aabb in casters {
        for corner in aabb.corners() {
            let depth = forward.dot(corner - plan.center);
            min_depth = min_depth.min(depth);
            max_depth = max_depth.max(depth);
        }
    }

    if min_depth > max_depth {
        return plan.camera;
    }

    let mut camera = plan.camera;
    camera.position = plan.center + forward * (min_depth - margin);
    camera.near = 0.0;
    camera.far = (max_depth - min_depth) + margin * 2.0;
    camera
}
