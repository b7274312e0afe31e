//! Caster submission
//!
//! Draws the culled casters of one face with their shadow shader variant.

use super::backend::{DrawCall, PassOutput, ShadowBackend, VariantHandle, VariantKey};
use crate::renderer::caster::{Caster, CasterId};
use crate::renderer::light::{LightType, ShadowAlgorithm};
use std::collections::HashMap;

type CacheKey = (CasterId, ShadowAlgorithm, LightType, PassOutput);

/// Compiled shadow variants per caster, algorithm and light type.
///
/// Entries are only added while drawing; removal is explicit.
#[derive(Debug, Default)]
pub struct ShaderVariantCache {
    variants: HashMap<CacheKey, VariantHandle>,
}

impl ShaderVariantCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached variant.
    pub fn get(
        &self,
        caster: CasterId,
        algorithm: ShadowAlgorithm,
        light_type: LightType,
        output: PassOutput,
    ) -> Option<VariantHandle> {
        self.variants
            .get(&(caster, algorithm, light_type, output))
            .copied()
    }

    /// Forget every variant of a caster, e.g. after its material changed.
    pub fn invalidate_caster(&mut self, caster: CasterId) {
        self.variants.retain(|key, _| key.0 != caster);
    }

    /// Forget every variant built for an algorithm.
    pub fn invalidate_algorithm(&mut self, algorithm: ShadowAlgorithm) {
        self.variants.retain(|key, _| key.1 != algorithm);
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.variants.clear();
    }

    /// Number of cached variants.
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

/// Draw counts of one submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitStats {
    pub draw_calls: u32,
    pub skipped: u32,
}

/// Issues caster draws for shadow faces.
#[derive(Debug, Default)]
pub struct CasterSubmitter {
    variants: ShaderVariantCache,
}

impl CasterSubmitter {
    /// Create a submitter with an empty variant cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The variant cache.
    pub fn variants(&self) -> &ShaderVariantCache {
        &self.variants
    }

    /// Mutable access to the variant cache, for invalidation.
    pub fn variants_mut(&mut self) -> &mut ShaderVariantCache {
        &mut self.variants
    }

    /// Draw `visible` casters, in order, into the current face.
    ///
    /// A caster whose variant fails to compile is skipped with a warning.
    pub fn submit(
        &mut self,
        visible: &[usize],
        casters: &[Caster],
        algorithm: ShadowAlgorithm,
        light_type: LightType,
        output: PassOutput,
        backend: &mut dyn ShadowBackend,
    ) -> SubmitStats {
        let mut stats = SubmitStats::default();

        for &index in visible {
            let Some(caster) = casters.get(index) else {
                stats.skipped += 1;
                continue;
            };

            let variant = match self.variants.get(caster.id, algorithm, light_type, output) {
                Some(variant) => variant,
                None => {
                    let key = VariantKey {
                        caster: caster.id,
                        algorithm,
                        light_type,
                        output,
                        skinned: caster.skinned,
                        opacity_channel: caster.material.opacity_channel,
                    };
                    match backend.compile_variant(&key) {
                        Ok(variant) => {
                            tracing::debug!(
                                "Compiled shadow variant {:?} for caster {:?}",
                                variant,
                                caster.id
                            );
                            self.variants
                                .variants
                                .insert((caster.id, algorithm, light_type, output), variant);
                            variant
                        }
                        Err(e) => {
                            tracing::warn!("Skipping caster {:?}: {}", caster.id, e);
                            stats.skipped += 1;
                            continue;
                        }
                    }
                }
            };

            backend.draw(&DrawCall {
                variant,
                mesh: caster.mesh,
                transform: caster.transform,
                cull: caster.material.cull_state(),
                skinned: caster.skinned,
            });
            stats.draw_calls += 1;
        }

        stats
    }
}
