//! VSM blur stage
//!
//! Separable blur of variance shadow maps: a horizontal pass into a pooled
//! scratch target and a vertical pass back into the map.

use super::ShadowError;
use super::backend::{BlurPass, ShadowBackend, TargetDesc, TargetHandle};
use super::store::TempTargetPool;
use crate::renderer::light::{BlurMode, Light};
use glam::Vec2;
use std::collections::HashMap;

/// Normalized blur weights for a kernel of `size` taps.
///
/// Gaussian kernels use `sigma = (size - 1) / 6` centered on
/// `(size - 1) / 2`; box kernels are uniform. A single tap is `[1.0]`.
pub fn blur_weights(mode: BlurMode, size: u32) -> Vec<f32> {
    let size = size.max(1);
    if size == 1 {
        return vec![1.0];
    }

    match mode {
        BlurMode::Box => vec![1.0 / size as f32; size as usize],
        BlurMode::Gaussian => {
            let sigma = (size - 1) as f32 / 6.0;
            let half_width = (size - 1) as f32 * 0.5;
            let mut weights: Vec<f32> = (0..size)
                .map(|i| {
                    let x = i as f32 - half_width;
                    (-(x * x) / (2.0 * sigma * sigma)).exp()
                })
                .collect();

            let sum: f32 = weights.iter().sum();
            for w in &mut weights {
                *w /= sum;
            }
            weights
        }
    }
}

/// Blurs variance shadow maps, caching weights per kernel.
#[derive(Debug)]
pub struct VsmBlur {
    max_size: u32,
    weights: HashMap<(BlurMode, u32), Vec<f32>>,
}

impl VsmBlur {
    /// Create a blur stage with kernels clamped to `max_size` taps.
    pub fn new(max_size: u32) -> Self {
        Self {
            max_size: max_size.max(1),
            weights: HashMap::new(),
        }
    }

    /// Whether a light's map gets blurred.
    ///
    /// Only VSM lights with a kernel larger than one tap, and never local
    /// lights placed in a shared atlas.
    pub fn applies(light: &Light, atlas_managed: bool) -> bool {
        light.shadow.algorithm.is_vsm()
            && light.shadow.vsm_blur_size > 1
            && (!atlas_managed || !light.kind.is_local())
    }

    /// Cached weights for a kernel, clamped to the maximum size.
    pub fn weights(&mut self, mode: BlurMode, size: u32) -> &[f32] {
        let size = size.clamp(1, self.max_size);
        self.weights
            .entry((mode, size))
            .or_insert_with(|| blur_weights(mode, size))
    }

    /// Blur every layer of `map` in place.
    ///
    /// Returns the number of blur passes issued. Maps without a color
    /// attachment and non-VSM lights are left alone.
    pub fn apply(
        &mut self,
        light: &Light,
        map: TargetHandle,
        desc: &TargetDesc,
        pool: &TempTargetPool,
        backend: &mut dyn ShadowBackend,
    ) -> Result<u32, ShadowError> {
        let Some(format) = desc.color_format else {
            return Ok(0);
        };
        if !light.shadow.algorithm.is_vsm() {
            return Ok(0);
        }

        let texel = 1.0 / desc.resolution as f32;
        let weights = self.weights(light.shadow.blur_mode, light.shadow.vsm_blur_size);
        let mut passes = 0;

        for layer in 0..desc.layers {
            let scratch = pool.acquire(desc.resolution, format, backend)?;

            backend.blur(&BlurPass {
                source: map,
                source_layer: layer,
                destination: scratch.target(),
                destination_layer: 0,
                offset: Vec2::new(texel, 0.0),
                weights,
            });
            backend.blur(&BlurPass {
                source: scratch.target(),
                source_layer: 0,
                destination: map,
                destination_layer: layer,
                offset: Vec2::new(0.0, texel),
                weights,
            });
            scratch.release();
            passes += 2;
        }

        Ok(passes)
    }
}
