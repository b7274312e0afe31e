//! Shadow caster culling
//!
//! Positions the shadow camera for every face or cascade of a light,
//! filters the caster list against its frustum, and keeps the result in a
//! side table that persists across frames.

use super::ShadowConfig;
use super::backend::PixelRect;
use super::camera::{omni_face_camera, spot_camera, CubeFace, LightBasis, ShadowCamera};
use super::cascade::{cascade_splits, cascade_viewports, plan_cascade, tighten_depth_range};
use crate::renderer::caster::Caster;
use crate::renderer::culling::Frustum;
use crate::renderer::light::{Light, LightId, LightKind};
use crate::renderer::viewer::{Camera, CameraId};
use glam::{Mat4, Vec4};
use std::collections::HashMap;

/// Smallest split near distance as a fraction of the shadow distance.
const MIN_SPLIT_NEAR_RATIO: f32 = 1.0e-4;

/// Key of a render data entry.
///
/// Directional lights carry the viewer camera because their cascades follow
/// it; local lights are camera independent and leave it empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderDataKey {
    pub light: LightId,
    pub camera: Option<CameraId>,
    pub face: u32,
}

impl RenderDataKey {
    /// Key for a face of a local light.
    pub fn local(light: LightId, face: u32) -> Self {
        Self {
            light,
            camera: None,
            face,
        }
    }

    /// Key for a cascade of a directional light seen from `camera`.
    pub fn cascade(light: LightId, camera: CameraId, face: u32) -> Self {
        Self {
            light,
            camera: Some(camera),
            face,
        }
    }
}

/// Per-face shadow data: camera, placement and visible casters.
#[derive(Debug, Clone)]
pub struct LightRenderData {
    pub camera: ShadowCamera,
    /// Normalized viewport (x, y, w, h) inside the target.
    pub viewport: Vec4,
    pub pixel_viewport: PixelRect,
    pub scissor: PixelRect,
    pub view_projection: Mat4,
    /// World to shadow texture space: viewport transform times view-projection.
    pub shadow_matrix: Mat4,
    /// Indices into the caster slice, in submission order.
    pub visible: Vec<usize>,
}

impl LightRenderData {
    fn new(camera: ShadowCamera) -> Self {
        Self {
            camera,
            viewport: Vec4::new(0.0, 0.0, 1.0, 1.0),
            pixel_viewport: PixelRect::default(),
            scissor: PixelRect::default(),
            view_projection: Mat4::IDENTITY,
            shadow_matrix: Mat4::IDENTITY,
            visible: Vec::new(),
        }
    }

    fn place(&mut self, camera: ShadowCamera, viewport: Vec4, resolution: u32) {
        self.camera = camera;
        self.viewport = viewport;
        self.pixel_viewport = pixel_rect(viewport, resolution);
        self.scissor = self.pixel_viewport;
        self.view_projection = camera.view_projection();
        self.shadow_matrix = viewport_matrix(viewport) * self.view_projection;
    }
}

/// Matrix from clip space to the texture-space rect `viewport`, y flipped.
pub(crate) fn viewport_matrix(viewport: Vec4) -> Mat4 {
    let (x, y, w, h) = (viewport.x, viewport.y, viewport.z, viewport.w);
    Mat4::from_cols(
        Vec4::new(0.5 * w, 0.0, 0.0, 0.0),
        Vec4::new(0.0, -0.5 * h, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
        Vec4::new(x + 0.5 * w, y + 0.5 * h, 0.0, 1.0),
    )
}

/// Convert a normalized viewport into texels of a square target.
pub(crate) fn pixel_rect(viewport: Vec4, resolution: u32) -> PixelRect {
    let res = resolution as f32;
    PixelRect {
        x: (viewport.x * res).round() as u32,
        y: (viewport.y * res).round() as u32,
        width: (viewport.z * res).round() as u32,
        height: (viewport.w * res).round() as u32,
    }
}

/// Cell `face` of a 3x3 grid laid over `viewport`.
fn atlas_grid_cell(viewport: Vec4, face: u32) -> Vec4 {
    let w = viewport.z / 3.0;
    let h = viewport.w / 3.0;
    let col = (face % 3) as f32;
    let row = (face / 3) as f32;
    Vec4::new(viewport.x + col * w, viewport.y + row * h, w, h)
}

/// Fill `out` with the casters visible in `frustum`, sorted for submission.
///
/// The sort is stable: skinned casters first, then grouped by opacity
/// channel, keeping scene order inside each group.
fn collect_visible(frustum: &Frustum, casters: &[Caster], out: &mut Vec<usize>) {
    out.clear();
    out.extend(casters.iter().enumerate().filter_map(|(i, caster)| {
        let visible = caster.casts_shadows
            && caster.visible
            && (!caster.cull || frustum.contains_aabb(&caster.aabb));
        visible.then_some(i)
    }));
    out.sort_by_key(|&i| casters[i].sort_key());
}

/// Culls casters per light face and owns the render data side table.
#[derive(Debug, Default)]
pub struct ShadowCuller {
    config: ShadowConfig,
    render_data: HashMap<RenderDataKey, LightRenderData>,
}

impl ShadowCuller {
    /// Create a culler.
    pub fn new(config: ShadowConfig) -> Self {
        Self {
            config,
            render_data: HashMap::new(),
        }
    }

    /// Place the cameras of a spot or omni light and cull each face.
    ///
    /// With `atlas_viewport` set the faces are placed inside that rect of a
    /// shared atlas of `resolution` texels; otherwise each face fills its
    /// own layer of a map of that size.
    pub fn cull_local(
        &mut self,
        light: &Light,
        casters: &[Caster],
        resolution: u32,
        atlas_viewport: Option<Vec4>,
    ) {
        let near_ratio = self.config.omni_near_ratio;
        let full = Vec4::new(0.0, 0.0, 1.0, 1.0);

        let faces: Vec<(ShadowCamera, Vec4)> = match light.kind {
            LightKind::Spot {
                position,
                direction,
                outer_angle,
                range,
            } => vec![(
                spot_camera(position, direction, outer_angle, range, near_ratio),
                atlas_viewport.unwrap_or(full),
            )],
            LightKind::Omni { position, range } => {
                let inflation = atlas_viewport.map(|vp| {
                    let texel = 2.0 / (resolution as f32 * vp.z / 3.0);
                    light.shadow.algorithm.edge_filter_texels() * texel
                });
                CubeFace::ALL
                    .iter()
                    .enumerate()
                    .map(|(i, face)| {
                        let viewport = atlas_viewport
                            .map(|vp| atlas_grid_cell(vp, i as u32))
                            .unwrap_or(full);
                        (
                            omni_face_camera(position, range, *face, inflation, near_ratio),
                            viewport,
                        )
                    })
                    .collect()
            }
            LightKind::Directional { .. } => return,
        };

        for (face, (camera, viewport)) in faces.into_iter().enumerate() {
            let key = RenderDataKey::local(light.id, face as u32);
            let data = self
                .render_data
                .entry(key)
                .or_insert_with(|| LightRenderData::new(camera));

            data.place(camera, viewport, resolution);
            collect_visible(&camera.frustum(), casters, &mut data.visible);
            tracing::trace!(
                "Light {:?} face {}: {} visible casters",
                light.id,
                face,
                data.visible.len()
            );
        }
    }

    /// Plan, cull and tighten every cascade of a directional light.
    ///
    /// Returns the far distance of each cascade, or None when the viewer
    /// range in front of the shadow distance is empty.
    pub fn cull_directional(
        &mut self,
        light: &Light,
        viewer: &Camera,
        casters: &[Caster],
        resolution: u32,
    ) -> Option<Vec<f32>> {
        let LightKind::Directional { direction } = light.kind else {
            return None;
        };

        let near = viewer.near().max(0.0);
        let far = light.shadow.shadow_distance.min(viewer.far());
        if far.is_nan() || far <= near {
            tracing::warn!(
                "Light {:?} has an empty cascade range [{}, {}], skipped",
                light.id,
                near,
                far
            );
            return None;
        }

        let basis = LightBasis::from_direction(direction);
        let count = light.face_count();
        // Logarithmic splits need a positive near distance.
        let split_near = near.max(far * MIN_SPLIT_NEAR_RATIO);
        let splits = cascade_splits(split_near, far, count, light.shadow.cascade_distribution);
        let viewports = cascade_viewports(count);

        for cascade in 0..count as usize {
            let slice_near = if cascade == 0 { near } else { splits[cascade - 1] };
            let plan = plan_cascade(
                viewer,
                &basis,
                slice_near,
                splits[cascade],
                resolution,
                self.config.caster_offset,
            );

            let key = RenderDataKey::cascade(light.id, viewer.id, cascade as u32);
            let data = self
                .render_data
                .entry(key)
                .or_insert_with(|| LightRenderData::new(plan.camera));

            collect_visible(&plan.camera.frustum(), casters, &mut data.visible);
            let camera = tighten_depth_range(
                &plan,
                data.visible.iter().map(|&i| &casters[i].aabb),
                self.config.depth_margin,
            );
            data.place(camera, viewports[cascade], resolution);

            tracing::trace!(
                "Light {:?} cascade {} [{:.2}, {:.2}]: {} visible casters",
                light.id,
                cascade,
                slice_near,
                splits[cascade],
                data.visible.len()
            );
        }

        Some(splits)
    }

    /// Look up render data for a face.
    pub fn render_data(&self, key: &RenderDataKey) -> Option<&LightRenderData> {
        self.render_data.get(key)
    }

    /// Drop every entry belonging to a light.
    pub fn invalidate_light(&mut self, light: LightId) {
        self.render_data.retain(|key, _| key.light != light);
    }

    /// Drop the cascades kept for a viewer camera that went away.
    pub fn invalidate_camera(&mut self, camera: CameraId) {
        self.render_data.retain(|key, _| key.camera != Some(camera));
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.render_data.clear();
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.render_data.len()
    }

    /// Whether no entry is stored.
    pub fn is_empty(&self) -> bool {
        self.render_data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::bounds::Aabb;
    use crate::renderer::caster::{CasterId, CasterMaterial, MeshHandle, OpacityChannel};
    use crate::renderer::light::{LightId, ShadowAlgorithm};
    use crate::renderer::shadow::camera::ShadowProjection;
    use glam::Vec3;

    fn caster(id: u32, center: Vec3) -> Caster {
        Caster::new(
            CasterId(id),
            MeshHandle(0),
            Mat4::from_translation(center),
            Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5)),
        )
    }

    fn data<'a>(culler: &'a ShadowCuller, key: RenderDataKey) -> &'a LightRenderData {
        culler.render_data(&key).expect("render data")
    }

    #[test]
    fn test_spot_culling() {
        let light = Light::spot(LightId(1), Vec3::new(0.0, 10.0, 0.0), Vec3::NEG_Y, 30.0, 20.0);
        let casters = vec![
            caster(0, Vec3::ZERO),
            caster(1, Vec3::new(50.0, 0.0, 0.0)),
            caster(2, Vec3::new(0.0, 20.0, 0.0)),
        ];

        let mut culler = ShadowCuller::new(ShadowConfig::default());
        culler.cull_local(&light, &casters, 512, None);

        let face = data(&culler, RenderDataKey::local(light.id, 0));
        assert_eq!(face.visible, vec![0]);
        assert_eq!(face.pixel_viewport.width, 512);
    }

    #[test]
    fn test_unculled_and_non_casting_casters() {
        let light = Light::spot(LightId(1), Vec3::new(0.0, 10.0, 0.0), Vec3::NEG_Y, 30.0, 20.0);
        let mut far_away = caster(0, Vec3::new(100.0, 0.0, 0.0));
        far_away.cull = false;
        let mut hidden = caster(1, Vec3::ZERO);
        hidden.casts_shadows = false;
        let mut invisible = caster(2, Vec3::ZERO);
        invisible.visible = false;
        let casters = vec![far_away, hidden, invisible];

        let mut culler = ShadowCuller::new(ShadowConfig::default());
        culler.cull_local(&light, &casters, 256, None);

        assert_eq!(data(&culler, RenderDataKey::local(light.id, 0)).visible, vec![0]);
    }

    #[test]
    fn test_sort_groups_skinned_then_opacity() {
        let light = Light::omni(LightId(2), Vec3::ZERO, 50.0);
        let with_channel = |c: Caster, channel| {
            c.with_material(CasterMaterial {
                opacity_channel: channel,
                double_sided: false,
            })
        };
        // All on the +X face.
        let casters = vec![
            with_channel(caster(0, Vec3::new(10.0, 0.0, 0.0)), Some(OpacityChannel::A)),
            with_channel(caster(1, Vec3::new(11.0, 0.0, 0.0)), None),
            with_channel(caster(2, Vec3::new(12.0, 0.0, 0.0)), Some(OpacityChannel::R))
                .with_skinning(true),
            with_channel(caster(3, Vec3::new(13.0, 0.0, 0.0)), Some(OpacityChannel::G)),
            with_channel(caster(4, Vec3::new(14.0, 0.0, 0.0)), None),
        ];

        let mut culler = ShadowCuller::new(ShadowConfig::default());
        culler.cull_local(&light, &casters, 256, None);

        let face = data(&culler, RenderDataKey::local(light.id, CubeFace::PositiveX as u32));
        assert_eq!(face.visible, vec![2, 1, 4, 3, 0]);
    }

    #[test]
    fn test_omni_faces_and_atlas_grid() {
        let light = Light::omni(LightId(3), Vec3::ZERO, 10.0);
        let casters = vec![caster(0, Vec3::new(0.0, 0.0, -5.0))];

        let mut culler = ShadowCuller::new(ShadowConfig::default());
        culler.cull_local(&light, &casters, 256, None);
        assert_eq!(culler.len(), 6);

        let visible: Vec<usize> = (0..6)
            .map(|f| data(&culler, RenderDataKey::local(light.id, f)).visible.len())
            .collect();
        assert_eq!(visible, vec![0, 0, 0, 0, 0, 1]);

        let atlas = Vec4::new(0.5, 0.0, 0.375, 0.375);
        culler.cull_local(&light, &casters, 1024, Some(atlas));
        let last = data(&culler, RenderDataKey::local(light.id, 5));
        assert!((last.viewport - Vec4::new(0.75, 0.125, 0.125, 0.125)).length() < 1e-6);
        assert_eq!(
            last.pixel_viewport,
            PixelRect {
                x: 768,
                y: 128,
                width: 128,
                height: 128
            }
        );
        assert_eq!(last.scissor, last.pixel_viewport);
    }

    fn face_fov(data: &LightRenderData) -> f32 {
        match data.camera.projection {
            ShadowProjection::Perspective { fov, .. } => fov,
            ShadowProjection::Orthographic { .. } => panic!("omni faces are perspective"),
        }
    }

    #[test]
    fn test_atlas_omni_fov_covers_filter_border() {
        let mut light = Light::omni(LightId(3), Vec3::ZERO, 10.0);
        light.shadow.algorithm = ShadowAlgorithm::Pcf5;
        let atlas = Vec4::new(0.5, 0.0, 0.375, 0.375);

        let mut culler = ShadowCuller::new(ShadowConfig::default());
        culler.cull_local(&light, &[], 1024, Some(atlas));

        // Each grid cell is 1024 * 0.375 / 3 = 128 texels wide; a 5x5 kernel
        // reaches 3 texels past the edge, each 2 / 128 in clip units.
        let expected = (1.0f32 + 3.0 * 2.0 / 128.0).atan() * 2.0;
        for face in 0..6 {
            let fov = face_fov(data(&culler, RenderDataKey::local(light.id, face)));
            assert!((fov - expected).abs() < 1e-6, "face {}: {} vs {}", face, fov, expected);
        }

        // A narrower kernel widens the face less.
        light.shadow.algorithm = ShadowAlgorithm::Pcf1;
        culler.cull_local(&light, &[], 1024, Some(atlas));
        let narrow = face_fov(data(&culler, RenderDataKey::local(light.id, 0)));
        assert!((narrow - (1.0f32 + 2.0 / 128.0).atan() * 2.0).abs() < 1e-6);

        // Outside the atlas every face is exactly 90 degrees.
        culler.cull_local(&light, &[], 1024, None);
        let plain = face_fov(data(&culler, RenderDataKey::local(light.id, 0)));
        assert!((plain - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_shadow_matrix_maps_into_viewport() {
        let light = Light::spot(LightId(4), Vec3::new(0.0, 10.0, 0.0), Vec3::NEG_Y, 45.0, 30.0);
        let viewport = Vec4::new(0.25, 0.5, 0.25, 0.25);
        let mut culler = ShadowCuller::new(ShadowConfig::default());
        culler.cull_local(&light, &[], 2048, Some(viewport));

        let face = data(&culler, RenderDataKey::local(light.id, 0));
        // A point on the cone axis lands in the middle of the rect.
        let uv = face.shadow_matrix.project_point3(Vec3::new(0.0, 0.0, 0.0));
        assert!((uv.x - 0.375).abs() < 1e-4);
        assert!((uv.y - 0.625).abs() < 1e-4);
    }

    #[test]
    fn test_cascade_membership() {
        let mut light = Light::directional(LightId(5), Vec3::NEG_Y);
        light.shadow.set_cascade_count(2);
        light.shadow.shadow_distance = 40.0;

        let viewer = Camera::new_perspective(
            CameraId(7),
            Vec3::ZERO,
            Vec3::NEG_Z,
            60.0,
            1.0,
            0.1,
            100.0,
        );
        let casters = vec![
            caster(0, Vec3::new(0.0, 0.0, -8.0)),
            caster(1, Vec3::new(200.0, 0.0, -8.0)),
            caster(2, Vec3::new(0.0, 0.0, -40.0)),
        ];

        let mut culler = ShadowCuller::new(ShadowConfig::default());
        let splits = culler
            .cull_directional(&light, &viewer, &casters, 1024)
            .expect("splits");
        assert_eq!(splits.len(), 2);
        assert!((splits[1] - 40.0).abs() < 1e-6);

        let near = data(&culler, RenderDataKey::cascade(light.id, viewer.id, 0));
        let far = data(&culler, RenderDataKey::cascade(light.id, viewer.id, 1));
        assert_eq!(near.visible, vec![0]);
        assert_eq!(far.visible, vec![0, 2]);

        // Tightened: the nearest caster sits just past the near plane.
        assert!(far.camera.near.abs() < 1e-6);
        assert!((far.camera.far - 1.2).abs() < 1e-3);
    }

    #[test]
    fn test_orthographic_viewer_with_zero_near() {
        let mut light = Light::directional(LightId(6), Vec3::NEG_Y);
        light.shadow.set_cascade_count(2);
        light.shadow.shadow_distance = 40.0;

        let viewer = Camera::new_orthographic(
            CameraId(8),
            Vec3::ZERO,
            Vec3::NEG_Z,
            20.0,
            20.0,
            0.0,
            100.0,
        );
        let casters = vec![
            caster(0, Vec3::new(0.0, 0.0, -8.0)),
            caster(1, Vec3::new(500.0, 0.0, -8.0)),
        ];

        let mut culler = ShadowCuller::new(ShadowConfig::default());
        let splits = culler
            .cull_directional(&light, &viewer, &casters, 1024)
            .expect("splits");
        assert!(splits.iter().all(|s| s.is_finite()));
        assert!(splits[0] > 0.0 && splits[0] < splits[1]);
        assert!((splits[1] - 40.0).abs() < 1e-6);

        for cascade in 0..2 {
            let face = data(&culler, RenderDataKey::cascade(light.id, viewer.id, cascade));
            assert!(!face.visible.contains(&1), "cascade {}", cascade);
            assert!(face.shadow_matrix.is_finite());
        }
        assert_eq!(
            data(&culler, RenderDataKey::cascade(light.id, viewer.id, 0)).visible,
            vec![0]
        );
    }

    #[test]
    fn test_empty_cascade_range() {
        let light = Light::directional(LightId(6), Vec3::NEG_Y);
        let viewer = Camera::new_perspective(
            CameraId(8),
            Vec3::ZERO,
            Vec3::NEG_Z,
            60.0,
            1.0,
            light.shadow.shadow_distance + 1.0,
            500.0,
        );

        let mut culler = ShadowCuller::new(ShadowConfig::default());
        assert!(culler.cull_directional(&light, &viewer, &[], 1024).is_none());
        assert!(culler.is_empty());
    }

    #[test]
    fn test_invalidate_camera() {
        let light = Light::directional(LightId(1), Vec3::NEG_Y);
        let spot = Light::spot(LightId(2), Vec3::ZERO, Vec3::NEG_Y, 30.0, 10.0);
        let first = Camera::new_perspective(CameraId(1), Vec3::ZERO, Vec3::NEG_Z, 60.0, 1.0, 0.1, 100.0);
        let second = Camera::new_perspective(CameraId(2), Vec3::ZERO, Vec3::NEG_Z, 60.0, 1.0, 0.1, 100.0);

        let mut culler = ShadowCuller::new(ShadowConfig::default());
        culler.cull_directional(&light, &first, &[], 1024);
        culler.cull_directional(&light, &second, &[], 1024);
        culler.cull_local(&spot, &[], 512, None);
        assert_eq!(culler.len(), 3);

        culler.invalidate_camera(first.id);
        assert_eq!(culler.len(), 2);
        assert!(culler.render_data(&RenderDataKey::cascade(light.id, first.id, 0)).is_none());
        assert!(culler.render_data(&RenderDataKey::cascade(light.id, second.id, 0)).is_some());
        assert!(culler.render_data(&RenderDataKey::local(spot.id, 0)).is_some());
    }

    #[test]
    fn test_invalidate_light() {
        let a = Light::omni(LightId(1), Vec3::ZERO, 10.0);
        let b = Light::spot(LightId(2), Vec3::ZERO, Vec3::NEG_Y, 30.0, 10.0);

        let mut culler = ShadowCuller::new(ShadowConfig::default());
        culler.cull_local(&a, &[], 128, None);
        culler.cull_local(&b, &[], 128, None);
        assert_eq!(culler.len(), 7);

        culler.invalidate_light(a.id);
        assert_eq!(culler.len(), 1);
        assert!(culler.render_data(&RenderDataKey::local(b.id, 0)).is_some());
    }
}
