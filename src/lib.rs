//! Penumbra shadow renderer
//!
//! Shadow map production for directional, spot and omni lights on wgpu.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! 1. **context** - Core wgpu wrapper (Device, Queue) and capability detection
//! 2. **core** - GPU primitives (buffers, layered textures, pipelines, render states)
//! 3. **renderer** - Scene data (bounds, cameras, lights, casters) and the
//!    shadow subsystem: cascades, culling, submission, VSM blur and map storage
//!
//! Each frame the host calls [`ShadowRenderer::render`] with its lights,
//! casters and a [`FrameContext`]. GPU work goes through a
//! [`ShadowBackend`]; [`WgpuBackend`] records it for a command encoder.

pub mod context;
pub mod core;
pub mod renderer;

// Re-export commonly used types
pub use context::{DeviceCaps, WgpuContext};

pub use core::{
    BlendState, ClearState, CullState, DepthBias, DepthState, IndexBuffer, LayeredTexture,
    PipelineBuilder, VertexBuffer, VertexP,
};

pub use renderer::{
    Aabb, BlurMode, BoundingSphere, Camera, CameraId, Caster, CasterId, CasterMaterial, Frustum,
    Intersection, Light, LightId, LightKind, LightType, MeshHandle, OpacityChannel, Plane,
    Projection, ShadowAlgorithm, ShadowSettings, UpdateMode, Viewer,
};

pub use renderer::shadow::{
    AtlasTarget, FrameContext, LightShadowOutput, PassOutput, ShadowBackend, ShadowConfig,
    ShadowError, ShadowFrame, ShadowRenderer, ShadowStats, TargetDesc, TargetHandle, WgpuBackend,
};

// Re-export glam for convenience
pub use glam;
