//! Shadow casters
//!
//! A caster is a mesh instance the shadow pass may draw. The shadow
//! renderer only filters and sorts casters; it never owns them.

use super::bounds::Aabb;
use crate::core::CullState;
use glam::Mat4;

/// Identifier of a caster, used to key compiled shader variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CasterId(pub u32);

/// Handle to mesh geometry registered with a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u32);

/// Texture channel that holds a caster's opacity map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpacityChannel {
    R,
    G,
    B,
    A,
}

/// The material properties the shadow pass cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CasterMaterial {
    /// Channel of the opacity map used for alpha testing, if any.
    pub opacity_channel: Option<OpacityChannel>,
    /// Render both faces.
    pub double_sided: bool,
}

impl CasterMaterial {
    /// Face culling while drawing into a shadow map.
    pub fn cull_state(&self) -> CullState {
        if self.double_sided {
            CullState::None
        } else {
            CullState::Back
        }
    }

    /// Grouping rank: no opacity map first, then r, g, b, a.
    pub fn opacity_rank(&self) -> u8 {
        match self.opacity_channel {
            None => 0,
            Some(OpacityChannel::R) => 1,
            Some(OpacityChannel::G) => 2,
            Some(OpacityChannel::B) => 3,
            Some(OpacityChannel::A) => 4,
        }
    }
}

/// A mesh instance that may cast shadows.
#[derive(Debug, Clone)]
pub struct Caster {
    pub id: CasterId,
    /// World-space bounds.
    pub aabb: Aabb,
    /// Model-to-world transform.
    pub transform: Mat4,
    pub mesh: MeshHandle,
    pub skinned: bool,
    /// When false the caster is never frustum-culled.
    pub cull: bool,
    pub casts_shadows: bool,
    /// Scene visibility flag.
    pub visible: bool,
    pub material: CasterMaterial,
}

impl Caster {
    /// Create a visible, culled, shadow-casting instance.
    pub fn new(id: CasterId, mesh: MeshHandle, transform: Mat4, local_bounds: Aabb) -> Self {
        Self {
            id,
            aabb: local_bounds.transformed(transform),
            transform,
            mesh,
            skinned: false,
            cull: true,
            casts_shadows: true,
            visible: true,
            material: CasterMaterial::default(),
        }
    }

    /// Builder: set the material.
    pub fn with_material(mut self, material: CasterMaterial) -> Self {
        self.material = material;
        self
    }

    /// Builder: mark as skinned.
    pub fn with_skinning(mut self, skinned: bool) -> Self {
        self.skinned = skinned;
        self
    }

    /// Update the transform and recompute world bounds from local bounds.
    pub fn set_transform(&mut self, transform: Mat4, local_bounds: Aabb) {
        self.transform = transform;
        self.aabb = local_bounds.transformed(transform);
    }

    /// Sort key grouping casters by shader: skinned first, then opacity channel.
    pub fn sort_key(&self) -> (u8, u8) {
        (u8::from(!self.skinned), self.material.opacity_rank())
    }
}
