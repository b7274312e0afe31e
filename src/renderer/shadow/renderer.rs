//! Per-frame shadow rendering
//!
//! Runs every shadow-casting light through culling, render state, caster
//! submission and blur, and reports the matrices the lighting pass needs.

use super::backend::{ClearScope, FacePass, ShadowBackend, TargetHandle};
use super::blur::VsmBlur;
use super::camera::clear_state;
use super::culler::{RenderDataKey, ShadowCuller};
use super::state::{pass_output, render_state, restore_state};
use super::store::{ShadowMapStore, TempTargetPool};
use super::submit::CasterSubmitter;
use super::{ShadowConfig, ShadowError};
use crate::renderer::caster::Caster;
use crate::renderer::light::{Light, LightId, LightKind, UpdateMode};
use crate::renderer::viewer::{Camera, CameraId};
use glam::Vec4;
use std::time::{Duration, Instant};

/// Identifier of a render layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(pub u32);

/// Resolves layer names, used to find the debug overlay layer.
pub trait LayerLookup {
    fn layer_id(&self, name: &str) -> Option<LayerId>;
}

/// Shared shadow atlas used for local lights in clustered mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtlasTarget {
    pub target: TargetHandle,
    pub resolution: u32,
    pub color_format: Option<wgpu::TextureFormat>,
}

/// Everything about the current frame the shadow pass depends on.
#[derive(Clone, Copy)]
pub struct FrameContext<'a> {
    /// Local lights are placed in the atlas by an external allocator.
    pub clustered: bool,
    pub atlas: Option<AtlasTarget>,
    /// Viewer camera that directional cascades follow.
    pub camera: &'a Camera,
    /// Name of the layer debug information is collected for.
    pub debug_layer: Option<&'a str>,
    pub layers: Option<&'a dyn LayerLookup>,
}

impl<'a> FrameContext<'a> {
    /// Non-clustered frame seen from `camera`.
    pub fn new(camera: &'a Camera) -> Self {
        Self {
            clustered: false,
            atlas: None,
            camera,
            debug_layer: None,
            layers: None,
        }
    }

    /// Builder: clustered frame rendering local lights into `atlas`.
    pub fn with_atlas(mut self, atlas: AtlasTarget) -> Self {
        self.clustered = true;
        self.atlas = Some(atlas);
        self
    }

    /// Builder: collect debug information for the named layer.
    pub fn with_debug_layer(mut self, name: &'a str, layers: &'a dyn LayerLookup) -> Self {
        self.debug_layer = Some(name);
        self.layers = Some(layers);
        self
    }
}

/// Shadow data produced for one light.
#[derive(Debug, Clone, PartialEq)]
pub struct LightShadowOutput {
    pub light: LightId,
    /// Map or atlas holding the faces.
    pub target: TargetHandle,
    pub face_count: u32,
    /// Column-major 4x4 shadow matrices, 16 floats per face or cascade.
    pub shadow_matrices: Vec<f32>,
    /// Far distance of each cascade; empty for local lights.
    pub cascade_distances: Vec<f32>,
    /// Visible casters per face.
    pub visible_counts: Vec<usize>,
}

/// Diagnostics counters for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShadowStats {
    pub draw_calls: u32,
    pub map_updates: u32,
    pub blur_passes: u32,
    /// Casters that survived culling, summed over faces.
    pub culled_casters: usize,
    pub skipped_lights: u32,
    pub render_time: Duration,
}

/// One rendered face, for debug overlays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowDebugFace {
    pub light: LightId,
    pub face: u32,
    pub target: TargetHandle,
    pub viewport: Vec4,
    pub visible: usize,
}

/// Debug information gathered when a debug layer is active.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowDebugInfo {
    pub layer: LayerId,
    pub faces: Vec<ShadowDebugFace>,
}

/// Result of a shadow frame.
#[derive(Debug, Clone, Default)]
pub struct ShadowFrame {
    pub lights: Vec<LightShadowOutput>,
    pub stats: ShadowStats,
    pub debug: Option<ShadowDebugInfo>,
}

impl ShadowFrame {
    /// Output for a light, if it was rendered.
    pub fn light(&self, light: LightId) -> Option<&LightShadowOutput> {
        self.lights.iter().find(|output| output.light == light)
    }
}

/// Renders shadow maps for all lights each frame.
#[derive(Debug)]
pub struct ShadowRenderer {
    culler: ShadowCuller,
    submitter: CasterSubmitter,
    blur: VsmBlur,
    store: ShadowMapStore,
    pool: TempTargetPool,
}

impl ShadowRenderer {
    /// Create a shadow renderer.
    pub fn new(config: ShadowConfig) -> Self {
        Self {
            culler: ShadowCuller::new(config),
            submitter: CasterSubmitter::new(),
            blur: VsmBlur::new(config.max_blur_size),
            store: ShadowMapStore::new(config),
            pool: TempTargetPool::new(),
        }
    }

    /// Render shadows for every light due an update.
    ///
    /// Lights set to `Once` switch to `Never` after rendering. A light that
    /// cannot be rendered is skipped for this frame.
    pub fn render(
        &mut self,
        lights: &mut [Light],
        casters: &[Caster],
        frame: &FrameContext<'_>,
        backend: &mut dyn ShadowBackend,
    ) -> ShadowFrame {
        let start = Instant::now();
        let mut stats = ShadowStats::default();
        let mut outputs = Vec::new();

        let mut debug = frame
            .debug_layer
            .zip(frame.layers)
            .and_then(|(name, layers)| layers.layer_id(name))
            .map(|layer| ShadowDebugInfo {
                layer,
                faces: Vec::new(),
            });

        for light in lights.iter_mut() {
            if !light.wants_shadow_update() {
                continue;
            }

            match self.render_light(light, casters, frame, backend, &mut stats, debug.as_mut()) {
                Ok(Some(output)) => {
                    outputs.push(output);
                    if light.shadow.update_mode == UpdateMode::Once {
                        light.shadow.update_mode = UpdateMode::Never;
                    }
                }
                Ok(None) => stats.skipped_lights += 1,
                Err(e) => {
                    tracing::warn!("Skipping shadows of light {:?}: {}", light.id, e);
                    stats.skipped_lights += 1;
                }
            }
        }

        stats.render_time = start.elapsed();
        ShadowFrame {
            lights: outputs,
            stats,
            debug,
        }
    }

    fn render_light(
        &mut self,
        light: &Light,
        casters: &[Caster],
        frame: &FrameContext<'_>,
        backend: &mut dyn ShadowBackend,
        stats: &mut ShadowStats,
        mut debug: Option<&mut ShadowDebugInfo>,
    ) -> Result<Option<LightShadowOutput>, ShadowError> {
        let caps = backend.caps();
        let light_type = light.light_type();
        let algorithm = light.shadow.algorithm;
        let atlas_managed = light.kind.is_local() && frame.clustered;
        let output = pass_output(algorithm, light_type, atlas_managed, &caps);

        let (target, resolution, own_map, atlas_viewport) = if atlas_managed {
            let Some(atlas) = frame.atlas else {
                tracing::warn!(
                    "Clustered frame without a shadow atlas, light {:?} skipped",
                    light.id
                );
                return Ok(None);
            };
            let Some(viewport) = light.shadow.atlas_viewport else {
                tracing::trace!("Light {:?} has no atlas slot this frame", light.id);
                return Ok(None);
            };
            if output.writes_color() && atlas.color_format.is_none() {
                tracing::warn!(
                    "Light {:?} needs a color atlas for {:?}, skipped",
                    light.id,
                    algorithm
                );
                return Ok(None);
            }
            (atlas.target, atlas.resolution, None, Some(viewport))
        } else {
            let (map, created) = self.store.ensure(light, backend)?;
            if created {
                self.culler.invalidate_light(light.id);
            }
            (map.target, map.desc.resolution, Some(map.desc), None)
        };

        let cascade_distances = match light.kind {
            LightKind::Directional { .. } => {
                match self.culler.cull_directional(light, frame.camera, casters, resolution) {
                    Some(splits) => splits,
                    None => return Ok(None),
                }
            }
            LightKind::Omni { .. } | LightKind::Spot { .. } => {
                self.culler.cull_local(light, casters, resolution, atlas_viewport);
                Vec::new()
            }
        };

        let state = render_state(light, atlas_managed, &caps);
        backend.set_render_state(&state);

        let face_count = light.face_count();
        let clear = clear_state(output);
        let position = light.kind.position().unwrap_or_default();
        let range = light.kind.range().unwrap_or(1.0);
        let mut shadow_matrices = Vec::with_capacity(face_count as usize * 16);
        let mut visible_counts = Vec::with_capacity(face_count as usize);

        for face in 0..face_count {
            let key = match light.kind {
                LightKind::Directional { .. } => {
                    RenderDataKey::cascade(light.id, frame.camera.id, face)
                }
                _ => RenderDataKey::local(light.id, face),
            };
            let Some(data) = self.culler.render_data(&key) else {
                continue;
            };

            let (layer, clear_scope) = match light.kind {
                _ if atlas_managed => (0, ClearScope::Viewport),
                LightKind::Omni { .. } => (face, ClearScope::Target),
                LightKind::Directional { .. } if face > 0 => (0, ClearScope::None),
                _ => (0, ClearScope::Target),
            };

            backend.begin_face(&FacePass {
                target,
                layer,
                viewport: data.pixel_viewport,
                scissor: data.scissor,
                clear,
                clear_scope,
                view_projection: data.view_projection,
                light_position: position,
                light_range: range,
            });
            let submitted = self.submitter.submit(
                &data.visible,
                casters,
                algorithm,
                light_type,
                output,
                backend,
            );
            backend.end_face();

            stats.draw_calls += submitted.draw_calls;
            stats.culled_casters += data.visible.len();
            shadow_matrices.extend_from_slice(&data.shadow_matrix.to_cols_array());
            visible_counts.push(data.visible.len());

            if let Some(debug) = debug.as_deref_mut() {
                debug.faces.push(ShadowDebugFace {
                    light: light.id,
                    face,
                    target,
                    viewport: data.viewport,
                    visible: data.visible.len(),
                });
            }
        }

        if let Some(desc) = own_map {
            if VsmBlur::applies(light, atlas_managed) {
                match self.blur.apply(light, target, &desc, &self.pool, backend) {
                    Ok(passes) => stats.blur_passes += passes,
                    Err(e) => tracing::warn!("VSM blur of light {:?} failed: {}", light.id, e),
                }
            }
        }

        backend.set_render_state(&restore_state(&state));
        stats.map_updates += 1;

        Ok(Some(LightShadowOutput {
            light: light.id,
            target,
            face_count,
            shadow_matrices,
            cascade_distances,
            visible_counts,
        }))
    }

    /// Free everything held for a light that left the scene.
    pub fn remove_light(&mut self, light: LightId, backend: &mut dyn ShadowBackend) {
        if self.store.release(light, backend) {
            tracing::debug!("Released shadow map of light {:?}", light);
        }
        self.culler.invalidate_light(light);
    }

    /// Forget the cascades computed for a viewer camera that was removed.
    pub fn remove_camera(&mut self, camera: CameraId) {
        self.culler.invalidate_camera(camera);
    }

    /// Free every map and scratch target.
    pub fn clear(&mut self, backend: &mut dyn ShadowBackend) {
        self.store.clear(backend);
        self.pool.clear(backend);
        self.culler.clear();
        self.submitter.variants_mut().clear();
    }

    /// Render data side table.
    pub fn culler(&self) -> &ShadowCuller {
        &self.culler
    }

    /// Caster submitter, for shader variant invalidation.
    pub fn submitter_mut(&mut self) -> &mut CasterSubmitter {
        &mut self.submitter
    }

    /// Per-light shadow maps.
    pub fn store(&self) -> &ShadowMapStore {
        &self.store
    }

    /// Blur scratch pool.
    pub fn pool(&self) -> &TempTargetPool {
        &self.pool
    }
}
