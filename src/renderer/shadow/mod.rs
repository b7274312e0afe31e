//! Shadow mapping module
//!
//! Decides what to render into each light's shadow map and how the map is
//! produced and filtered: shadow cameras, cascades, caster culling, render
//! state, draw submission, VSM blur and render-target lifetimes.
//!
//! The GPU side is reached through [`ShadowBackend`]; [`WgpuBackend`] is the
//! wgpu implementation.

mod backend;
mod blur;
mod camera;
mod cascade;
mod culler;
mod gpu;
mod renderer;
mod state;
mod store;
mod submit;
#[cfg(test)]
mod testing;

pub use backend::{
    BlurPass, ClearScope, DrawCall, FacePass, PassOutput, PixelRect, ShadowBackend, TargetDesc,
    TargetHandle, VariantHandle, VariantKey,
};
pub use blur::{blur_weights, VsmBlur};
pub use camera::{
    clear_state, directional_camera, omni_face_camera, spot_camera, CubeFace, LightBasis,
    ShadowCamera, ShadowProjection,
};
pub use cascade::{
    bounding_sphere, cascade_splits, cascade_viewports, frustum_slice_corners, plan_cascade,
    snap_to_texel_grid, tighten_depth_range, CascadePlan,
};
pub use culler::{LightRenderData, RenderDataKey, ShadowCuller};
pub use gpu::WgpuBackend;
pub use renderer::{
    AtlasTarget, FrameContext, LayerId, LayerLookup, LightShadowOutput, ShadowDebugFace,
    ShadowDebugInfo, ShadowFrame, ShadowRenderer, ShadowStats,
};
pub use state::{pass_output, render_state, restore_state, ShadowRenderState};
pub use store::{
    color_format, ShadowMapStore, StoredMap, TargetLease, TempTargetPool, SHADOW_DEPTH_FORMAT,
};
pub use submit::{CasterSubmitter, ShaderVariantCache, SubmitStats};

/// Errors raised while allocating or preparing shadow resources.
///
/// None of these abort a frame; the affected light or caster is skipped.
#[derive(Debug, thiserror::Error)]
pub enum ShadowError {
    #[error("Failed to create shadow target: {0}")]
    TargetCreation(String),
    #[error("Failed to compile shadow shader variant: {0}")]
    VariantCompilation(String),
    #[error("Unknown shadow target {0:?}")]
    UnknownTarget(TargetHandle),
    #[error("Invalid shadow map resolution {0}")]
    InvalidResolution(u32),
}

/// Shadow renderer configuration.
#[derive(Debug, Clone, Copy)]
pub struct ShadowConfig {
    /// Largest VSM blur kernel, in texels.
    pub max_blur_size: u32,
    /// Distance a directional shadow camera is pulled back behind its cascade.
    pub caster_offset: f32,
    /// Slack added on both ends of a tightened cascade depth range.
    pub depth_margin: f32,
    /// Resolution used when a light asks for 0.
    pub default_resolution: u32,
    /// Largest shadow map edge accepted.
    pub max_resolution: u32,
    /// Local light near plane as a fraction of the light range.
    pub omni_near_ratio: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            max_blur_size: 25,
            caster_offset: 1.0e6,
            depth_margin: 0.1,
            default_resolution: 1024,
            max_resolution: 8192,
            omni_near_ratio: 0.001,
        }
    }
}
