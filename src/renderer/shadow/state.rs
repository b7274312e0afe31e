//! Render state for shadow passes
//!
//! Which fixed-function state a light's faces are drawn with, and the state
//! restored once the light is done.

use super::backend::PassOutput;
use crate::context::DeviceCaps;
use crate::core::{BlendState, DepthBias, DepthState};
use crate::renderer::light::{Light, LightType, ShadowAlgorithm};

/// Fixed-function state for drawing casters into a shadow map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowRenderState {
    pub blend: BlendState,
    pub depth: DepthState,
    pub bias: DepthBias,
}

/// What the fragment stage writes for a light.
///
/// Native depth is used when the algorithm is PCF, the hardware can compare
/// depth while sampling, and the light is not an omni light outside the
/// atlas (those store linear distance in a color cube).
pub fn pass_output(
    algorithm: ShadowAlgorithm,
    light_type: LightType,
    atlas: bool,
    caps: &DeviceCaps,
) -> PassOutput {
    if algorithm.is_vsm() {
        PassOutput::Moments
    } else if light_type == LightType::Omni && !atlas {
        PassOutput::Distance
    } else if caps.depth_comparison {
        PassOutput::DepthOnly
    } else {
        PassOutput::Depth
    }
}

/// State applied before the first face of a light.
pub fn render_state(light: &Light, atlas: bool, caps: &DeviceCaps) -> ShadowRenderState {
    let output = pass_output(light.shadow.algorithm, light.light_type(), atlas, caps);
    let blend = if output.writes_color() {
        BlendState::NoBlend
    } else {
        BlendState::NoWrite
    };

    let bias = if light.light_type() == LightType::Omni && !atlas {
        DepthBias::NONE
    } else {
        DepthBias::uniform(light.shadow.bias * 1000.0)
    };

    ShadowRenderState {
        blend,
        depth: DepthState::shadow(),
        bias,
    }
}

/// State applied after the last face of a light: same state, no bias.
pub fn restore_state(state: &ShadowRenderState) -> ShadowRenderState {
    ShadowRenderState {
        bias: DepthBias::NONE,
        ..*state
    }
}
