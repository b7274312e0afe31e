//! GPU backend seam
//!
//! The shadow renderer drives the GPU through this trait: it allocates
//! targets, compiles caster variants, and issues face passes, draws and blur
//! passes. Handles are opaque so the renderer can be exercised without a
//! device.

use super::ShadowError;
use super::state::ShadowRenderState;
use crate::core::{ClearState, CullState};
use crate::renderer::caster::{CasterId, MeshHandle, OpacityChannel};
use crate::renderer::light::{LightType, ShadowAlgorithm};
use glam::{Mat4, Vec2, Vec3};

/// Opaque handle to a render target owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetHandle(pub u32);

/// Opaque handle to a compiled caster shader variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantHandle(pub u32);

/// Description of a square render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetDesc {
    /// Edge length in texels.
    pub resolution: u32,
    /// Array layers (6 for a cube).
    pub layers: u32,
    /// Sample the layers as a cube.
    pub cube: bool,
    /// Color attachment format, None for depth-only targets.
    pub color_format: Option<wgpu::TextureFormat>,
    /// Depth attachment format, None for color-only scratch targets.
    pub depth_format: Option<wgpu::TextureFormat>,
}

impl TargetDesc {
    /// Single-layer color target without depth, used as blur scratch space.
    pub fn scratch(resolution: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            resolution,
            layers: 1,
            cube: false,
            color_format: Some(format),
            depth_format: None,
        }
    }
}

/// What the fragment stage of a shadow pass writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassOutput {
    /// Native depth only, color writes disabled.
    DepthOnly,
    /// Post-projection depth encoded into color.
    Depth,
    /// Normalized distance to the light encoded into color.
    Distance,
    /// First and second depth moments.
    Moments,
}

impl PassOutput {
    /// Whether the pass needs a color attachment.
    pub fn writes_color(&self) -> bool {
        !matches!(self, PassOutput::DepthOnly)
    }
}

/// Key identifying a caster shader variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariantKey {
    pub caster: CasterId,
    pub algorithm: ShadowAlgorithm,
    pub light_type: LightType,
    pub output: PassOutput,
    pub skinned: bool,
    pub opacity_channel: Option<OpacityChannel>,
}

/// Pixel rectangle (x, y, width, height), origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// How much of the target a face pass clears before drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClearScope {
    /// Clear the whole layer.
    Target,
    /// Clear only the face viewport (shared atlas or packed cascades).
    Viewport,
    /// Keep existing contents.
    None,
}

/// One shadow face: a camera rendering into a region of a target layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FacePass {
    pub target: TargetHandle,
    pub layer: u32,
    pub viewport: PixelRect,
    pub scissor: PixelRect,
    pub clear: ClearState,
    pub clear_scope: ClearScope,
    pub view_projection: Mat4,
    /// Light position and range, used by distance-encoding passes.
    pub light_position: Vec3,
    pub light_range: f32,
}

/// One caster draw inside a face pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    pub variant: VariantHandle,
    pub mesh: MeshHandle,
    pub transform: Mat4,
    pub cull: CullState,
    pub skinned: bool,
}

/// One direction of a separable blur.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurPass<'a> {
    pub source: TargetHandle,
    pub source_layer: u32,
    pub destination: TargetHandle,
    pub destination_layer: u32,
    /// Offset between taps in texture coordinates.
    pub offset: Vec2,
    /// Normalized kernel weights.
    pub weights: &'a [f32],
}

/// GPU operations the shadow renderer needs.
pub trait ShadowBackend {
    /// Capabilities used to pick formats and render state.
    fn caps(&self) -> crate::context::DeviceCaps;

    /// Allocate a render target.
    fn create_target(&mut self, desc: &TargetDesc) -> Result<TargetHandle, ShadowError>;

    /// Free a render target. Unknown handles are ignored.
    fn destroy_target(&mut self, target: TargetHandle);

    /// Compile or fetch the shader variant for a caster.
    fn compile_variant(&mut self, key: &VariantKey) -> Result<VariantHandle, ShadowError>;

    /// Set the fixed-function state used by subsequent draws.
    fn set_render_state(&mut self, state: &ShadowRenderState);

    /// Start rendering a face.
    fn begin_face(&mut self, pass: &FacePass);

    /// Draw a caster into the current face.
    fn draw(&mut self, call: &DrawCall);

    /// Finish the current face.
    fn end_face(&mut self);

    /// Run one blur direction from source into destination.
    fn blur(&mut self, pass: &BlurPass<'_>);
}
