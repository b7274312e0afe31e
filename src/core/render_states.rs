//! Render state configurations
//!
//! Plain-value descriptions of the fixed-function state a shadow pass needs,
//! convertible to the wgpu equivalents when pipelines are built.

/// Clear state for a shadow face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearState {
    /// Color to clear to (RGBA), or None to not clear.
    pub color: Option<[f32; 4]>,
    /// Depth value to clear to (0.0-1.0), or None to not clear.
    pub depth: Option<f32>,
}

impl ClearState {
    /// Create a clear state that clears depth only.
    pub fn depth(depth: f32) -> Self {
        Self {
            color: None,
            depth: Some(depth),
        }
    }

    /// Create a clear state that clears both color and depth.
    pub fn color_and_depth(color: [f32; 4], depth: f32) -> Self {
        Self {
            color: Some(color),
            depth: Some(depth),
        }
    }

    /// Get the wgpu load operation for color.
    pub fn color_load_op(&self) -> wgpu::LoadOp<wgpu::Color> {
        match self.color {
            Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: a as f64,
            }),
            None => wgpu::LoadOp::Load,
        }
    }

    /// Get the wgpu load operation for depth.
    pub fn depth_load_op(&self) -> wgpu::LoadOp<f32> {
        match self.depth {
            Some(d) => wgpu::LoadOp::Clear(d),
            None => wgpu::LoadOp::Load,
        }
    }
}

impl Default for ClearState {
    fn default() -> Self {
        Self::depth(1.0)
    }
}

/// Blend and color-write configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendState {
    /// Blending disabled, all color channels written.
    #[default]
    NoBlend,
    /// Blending disabled and color writes masked off.
    NoWrite,
}

impl BlendState {
    /// Convert to wgpu blend state.
    pub fn to_wgpu(&self) -> Option<wgpu::BlendState> {
        None
    }

    /// Color write mask for this state.
    pub fn write_mask(&self) -> wgpu::ColorWrites {
        match self {
            BlendState::NoBlend => wgpu::ColorWrites::ALL,
            BlendState::NoWrite => wgpu::ColorWrites::empty(),
        }
    }

    /// Whether color channels are written at all.
    pub fn writes_color(&self) -> bool {
        matches!(self, BlendState::NoBlend)
    }
}

/// Depth test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthState {
    /// Whether to write to the depth buffer.
    pub write: bool,
    /// Comparison function for depth test.
    pub compare: wgpu::CompareFunction,
}

impl DepthState {
    /// Depth test and write with a less-or-equal comparator, as shadow casters need.
    pub fn shadow() -> Self {
        Self {
            write: true,
            compare: wgpu::CompareFunction::LessEqual,
        }
    }

    /// Unconditional depth write, used to clear a sub-rectangle with a quad.
    pub fn overwrite() -> Self {
        Self {
            write: true,
            compare: wgpu::CompareFunction::Always,
        }
    }

    /// Convert to wgpu depth stencil state.
    pub fn to_wgpu(&self, format: wgpu::TextureFormat, bias: DepthBias) -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format,
            depth_write_enabled: self.write,
            depth_compare: self.compare,
            stencil: wgpu::StencilState::default(),
            bias: bias.to_wgpu(),
        }
    }
}

impl Default for DepthState {
    fn default() -> Self {
        Self::shadow()
    }
}

/// Rasterizer depth bias.
///
/// Positive values push fragments away from the viewer, which for a shadow
/// camera means away from the light.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DepthBias {
    /// Constant offset in depth-buffer units.
    pub constant: f32,
    /// Offset scaled by the polygon's depth slope.
    pub slope_scale: f32,
}

impl DepthBias {
    /// No bias.
    pub const NONE: Self = Self {
        constant: 0.0,
        slope_scale: 0.0,
    };

    /// Create a bias with the same constant and slope factor.
    pub fn uniform(value: f32) -> Self {
        Self {
            constant: value,
            slope_scale: value,
        }
    }

    /// Whether this bias changes anything.
    pub fn is_none(&self) -> bool {
        self.constant == 0.0 && self.slope_scale == 0.0
    }

    /// Convert to wgpu depth bias state.
    pub fn to_wgpu(&self) -> wgpu::DepthBiasState {
        wgpu::DepthBiasState {
            constant: self.constant.round() as i32,
            slope_scale: self.slope_scale,
            clamp: 0.0,
        }
    }

    /// Bit-exact key for pipeline caching.
    pub fn key(&self) -> (u32, u32) {
        (self.constant.to_bits(), self.slope_scale.to_bits())
    }
}

/// Cull mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullState {
    /// No culling.
    None,
    /// Cull front faces.
    Front,
    /// Cull back faces.
    #[default]
    Back,
}

impl CullState {
    /// Convert to wgpu cull mode.
    pub fn to_wgpu(&self) -> Option<wgpu::Face> {
        match self {
            CullState::None => None,
            CullState::Front => Some(wgpu::Face::Front),
            CullState::Back => Some(wgpu::Face::Back),
        }
    }
}
