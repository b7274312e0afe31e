//! Light types
//!
//! Shadow-casting lights and the per-light shadow settings the shadow
//! renderer reads every frame.

use crate::context::DeviceCaps;
use glam::{Vec3, Vec4};

/// Identifier of a light, used to key shadow maps and render data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(pub u32);

/// Light type tag, without the per-type parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightType {
    Directional,
    Omni,
    Spot,
}

/// Light type and its geometric parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    /// Infinitely distant light shining along `direction`.
    Directional { direction: Vec3 },
    /// Point light radiating in every direction up to `range`.
    Omni { position: Vec3, range: f32 },
    /// Cone light; `outer_angle` is the half angle of the cone in radians.
    Spot {
        position: Vec3,
        direction: Vec3,
        outer_angle: f32,
        range: f32,
    },
}

impl LightKind {
    /// Get the light type tag.
    pub fn light_type(&self) -> LightType {
        match self {
            LightKind::Directional { .. } => LightType::Directional,
            LightKind::Omni { .. } => LightType::Omni,
            LightKind::Spot { .. } => LightType::Spot,
        }
    }

    /// Whether the light has a position (omni and spot).
    pub fn is_local(&self) -> bool {
        !matches!(self, LightKind::Directional { .. })
    }

    /// World position of a local light.
    pub fn position(&self) -> Option<Vec3> {
        match *self {
            LightKind::Directional { .. } => None,
            LightKind::Omni { position, .. } | LightKind::Spot { position, .. } => Some(position),
        }
    }

    /// Range of a local light.
    pub fn range(&self) -> Option<f32> {
        match *self {
            LightKind::Directional { .. } => None,
            LightKind::Omni { range, .. } | LightKind::Spot { range, .. } => Some(range),
        }
    }
}

/// Shadow filtering algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowAlgorithm {
    /// Single-tap depth comparison.
    Pcf1,
    /// 3x3 percentage-closer filtering.
    Pcf3,
    /// 5x5 percentage-closer filtering.
    Pcf5,
    /// Variance shadow map with 8-bit moments.
    Vsm8,
    /// Variance shadow map with 16-bit float moments.
    Vsm16,
    /// Variance shadow map with 32-bit float moments.
    Vsm32,
}

impl ShadowAlgorithm {
    /// Whether this is a variance shadow map algorithm.
    pub fn is_vsm(&self) -> bool {
        matches!(
            self,
            ShadowAlgorithm::Vsm8 | ShadowAlgorithm::Vsm16 | ShadowAlgorithm::Vsm32
        )
    }

    /// Whether this is a percentage-closer filtering algorithm.
    pub fn is_pcf(&self) -> bool {
        !self.is_vsm()
    }

    /// Width in texels that the lookup filter reaches past a face edge.
    pub fn edge_filter_texels(&self) -> f32 {
        match self {
            ShadowAlgorithm::Pcf1 => 1.0,
            ShadowAlgorithm::Pcf3 => 2.0,
            ShadowAlgorithm::Pcf5 => 3.0,
            ShadowAlgorithm::Vsm8 | ShadowAlgorithm::Vsm16 | ShadowAlgorithm::Vsm32 => 3.0,
        }
    }

    /// The next less demanding algorithm, if this one is unsupported.
    fn fallback(&self, caps: &DeviceCaps) -> Option<Self> {
        match self {
            ShadowAlgorithm::Pcf5 if !caps.depth_comparison => Some(ShadowAlgorithm::Pcf3),
            ShadowAlgorithm::Pcf3 if !caps.depth_textures => Some(ShadowAlgorithm::Pcf1),
            ShadowAlgorithm::Vsm32 if !(caps.float32_renderable && caps.float32_filterable) => {
                Some(ShadowAlgorithm::Vsm16)
            }
            ShadowAlgorithm::Vsm16 if !caps.float16_renderable => Some(ShadowAlgorithm::Vsm8),
            _ => None,
        }
    }

    /// Walk the fallback chain until an algorithm the device supports.
    pub fn resolve(self, caps: &DeviceCaps) -> Self {
        let mut algorithm = self;
        while let Some(next) = algorithm.fallback(caps) {
            algorithm = next;
        }
        algorithm
    }
}

/// VSM blur kernel shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlurMode {
    Box,
    Gaussian,
}

/// How often a light's shadow map is re-rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateMode {
    /// Shadows are not rendered.
    Never,
    /// Rendered on the next frame, then switched to `Never`.
    Once,
    /// Rendered every frame.
    EveryFrame,
}

/// Per-light shadow configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSettings {
    /// Filtering algorithm, already resolved against device capabilities.
    pub algorithm: ShadowAlgorithm,
    /// Shadow map edge length in texels.
    pub resolution: u32,
    /// Depth bias applied while rendering casters.
    pub bias: f32,
    /// Normal offset bias, consumed by the lighting shader.
    pub normal_bias: f32,
    /// Number of cascades (directional lights only, 1..=4).
    pub cascade_count: u32,
    /// Blend between linear (0) and logarithmic (1) cascade splits.
    pub cascade_distribution: f32,
    /// Distance from the viewer covered by directional shadows.
    pub shadow_distance: f32,
    /// VSM blur kernel size in texels.
    pub vsm_blur_size: u32,
    /// VSM blur kernel shape.
    pub blur_mode: BlurMode,
    /// Update policy.
    pub update_mode: UpdateMode,
    /// Normalized rect (x, y, w, h) assigned by the atlas allocator.
    pub atlas_viewport: Option<Vec4>,
}

impl ShadowSettings {
    /// Maximum number of cascades packed into one directional map.
    pub const MAX_CASCADES: u32 = 4;

    /// Select an algorithm, falling back along the capability chain.
    ///
    /// Returns the algorithm that was actually stored.
    pub fn set_algorithm(&mut self, requested: ShadowAlgorithm, caps: &DeviceCaps) -> ShadowAlgorithm {
        let resolved = requested.resolve(caps);
        if resolved != requested {
            tracing::debug!(
                "Shadow algorithm {:?} unsupported, falling back to {:?}",
                requested,
                resolved
            );
        }
        self.algorithm = resolved;
        resolved
    }

    /// Set the cascade count, clamped to 1..=4.
    pub fn set_cascade_count(&mut self, count: u32) {
        self.cascade_count = count.clamp(1, Self::MAX_CASCADES);
    }
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            algorithm: ShadowAlgorithm::Pcf3,
            resolution: 1024,
            bias: 0.05,
            normal_bias: 0.0,
            cascade_count: 1,
            cascade_distribution: 0.5,
            shadow_distance: 40.0,
            vsm_blur_size: 11,
            blur_mode: BlurMode::Gaussian,
            update_mode: UpdateMode::EveryFrame,
            atlas_viewport: None,
        }
    }
}

/// A shadow-casting light.
#[derive(Debug, Clone)]
pub struct Light {
    pub id: LightId,
    pub kind: LightKind,
    pub enabled: bool,
    pub casts_shadows: bool,
    pub shadow: ShadowSettings,
}

impl Light {
    /// Create an enabled shadow-casting light with default settings.
    pub fn new(id: LightId, kind: LightKind) -> Self {
        Self {
            id,
            kind,
            enabled: true,
            casts_shadows: true,
            shadow: ShadowSettings::default(),
        }
    }

    /// Create a directional light.
    pub fn directional(id: LightId, direction: Vec3) -> Self {
        Self::new(
            id,
            LightKind::Directional {
                direction: direction.normalize(),
            },
        )
    }

    /// Create an omni light.
    pub fn omni(id: LightId, position: Vec3, range: f32) -> Self {
        Self::new(id, LightKind::Omni { position, range })
    }

    /// Create a spot light with the cone half angle given in degrees.
    pub fn spot(id: LightId, position: Vec3, direction: Vec3, outer_angle_degrees: f32, range: f32) -> Self {
        Self::new(
            id,
            LightKind::Spot {
                position,
                direction: direction.normalize(),
                outer_angle: outer_angle_degrees.to_radians(),
                range,
            },
        )
    }

    /// Builder: set the shadow settings.
    pub fn with_shadow(mut self, shadow: ShadowSettings) -> Self {
        self.shadow = shadow;
        self
    }

    /// Get the light type tag.
    pub fn light_type(&self) -> LightType {
        self.kind.light_type()
    }

    /// Number of shadow faces: 1 spot, 6 omni, cascade count directional.
    pub fn face_count(&self) -> u32 {
        match self.kind {
            LightKind::Spot { .. } => 1,
            LightKind::Omni { .. } => 6,
            LightKind::Directional { .. } => self.shadow.cascade_count.clamp(1, ShadowSettings::MAX_CASCADES),
        }
    }

    /// Whether this light should enter the shadow pass this frame.
    pub fn wants_shadow_update(&self) -> bool {
        self.enabled && self.casts_shadows && self.shadow.update_mode != UpdateMode::Never
    }
}
