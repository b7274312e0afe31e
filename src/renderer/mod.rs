//! Renderer-facing scene data and the shadow subsystem
//!
//! Bounds, frustums, cameras, lights and casters, plus the shadow
//! renderer that consumes them.

pub mod bounds;
pub mod caster;
pub mod culling;
pub mod light;
pub mod shadow;
pub mod viewer;

pub use bounds::{Aabb, BoundingSphere};
pub use caster::{Caster, CasterId, CasterMaterial, MeshHandle, OpacityChannel};
pub use culling::{Frustum, Intersection, Plane};
pub use light::{
    BlurMode, Light, LightId, LightKind, LightType, ShadowAlgorithm, ShadowSettings, UpdateMode,
};
pub use viewer::{Camera, CameraId, Projection, Viewer};
