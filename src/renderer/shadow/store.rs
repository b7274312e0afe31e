//! Shadow map and scratch target lifetimes
//!
//! [`ShadowMapStore`] owns the per-light maps; [`TempTargetPool`] lends
//! scratch targets to the blur stage through [`TargetLease`] handles that
//! return themselves to the pool when dropped.

use super::backend::{PassOutput, ShadowBackend, TargetDesc, TargetHandle};
use super::state::pass_output;
use super::{ShadowConfig, ShadowError};
use crate::context::DeviceCaps;
use crate::renderer::light::{Light, LightId, LightType, ShadowAlgorithm};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// Depth attachment format of every shadow map.
pub const SHADOW_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Color format a pass writes into, None when only depth is written.
pub fn color_format(
    output: PassOutput,
    algorithm: ShadowAlgorithm,
    caps: &DeviceCaps,
) -> Option<wgpu::TextureFormat> {
    match output {
        PassOutput::DepthOnly => None,
        PassOutput::Depth | PassOutput::Distance => Some(if caps.float32_renderable {
            wgpu::TextureFormat::R32Float
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        }),
        PassOutput::Moments => Some(match algorithm {
            ShadowAlgorithm::Vsm32 => wgpu::TextureFormat::Rgba32Float,
            ShadowAlgorithm::Vsm16 => wgpu::TextureFormat::Rgba16Float,
            _ => wgpu::TextureFormat::Rgba8Unorm,
        }),
    }
}

/// A light's shadow map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredMap {
    pub desc: TargetDesc,
    pub target: TargetHandle,
}

/// Owns one shadow map per light outside the atlas.
#[derive(Debug, Default)]
pub struct ShadowMapStore {
    config: ShadowConfig,
    maps: HashMap<LightId, StoredMap>,
}

impl ShadowMapStore {
    /// Create an empty store.
    pub fn new(config: ShadowConfig) -> Self {
        Self {
            config,
            maps: HashMap::new(),
        }
    }

    /// Target description for a light's own map.
    pub fn desc_for(&self, light: &Light, caps: &DeviceCaps) -> Result<TargetDesc, ShadowError> {
        let resolution = match light.shadow.resolution {
            0 => self.config.default_resolution,
            r => r,
        };
        if resolution > self.config.max_resolution {
            return Err(ShadowError::InvalidResolution(resolution));
        }

        let light_type = light.light_type();
        let output = pass_output(light.shadow.algorithm, light_type, false, caps);
        let omni = light_type == LightType::Omni;

        Ok(TargetDesc {
            resolution,
            layers: if omni { 6 } else { 1 },
            cube: omni,
            color_format: color_format(output, light.shadow.algorithm, caps),
            depth_format: Some(SHADOW_DEPTH_FORMAT),
        })
    }

    /// Get the light's map, creating or re-creating it as needed.
    ///
    /// The flag is true when a new target was allocated this call.
    pub fn ensure(
        &mut self,
        light: &Light,
        backend: &mut dyn ShadowBackend,
    ) -> Result<(StoredMap, bool), ShadowError> {
        let desc = self.desc_for(light, &backend.caps())?;

        if let Some(existing) = self.maps.get(&light.id) {
            if existing.desc == desc {
                return Ok((*existing, false));
            }
            tracing::debug!(
                "Shadow map of light {:?} changed from {:?} to {:?}",
                light.id,
                existing.desc,
                desc
            );
            backend.destroy_target(existing.target);
            self.maps.remove(&light.id);
        }

        let target = backend.create_target(&desc)?;
        tracing::debug!(
            "Allocated {}x{} shadow map ({} layers) for light {:?}",
            desc.resolution,
            desc.resolution,
            desc.layers,
            light.id
        );

        let map = StoredMap { desc, target };
        self.maps.insert(light.id, map);
        Ok((map, true))
    }

    /// Look up a light's map.
    pub fn get(&self, light: LightId) -> Option<&StoredMap> {
        self.maps.get(&light)
    }

    /// Free a light's map. Returns whether one existed.
    pub fn release(&mut self, light: LightId, backend: &mut dyn ShadowBackend) -> bool {
        match self.maps.remove(&light) {
            Some(map) => {
                backend.destroy_target(map.target);
                true
            }
            None => false,
        }
    }

    /// Free every map.
    pub fn clear(&mut self, backend: &mut dyn ShadowBackend) {
        for (_, map) in self.maps.drain() {
            backend.destroy_target(map.target);
        }
    }

    /// Number of live maps.
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    /// Whether no map is live.
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

type PoolKey = (u32, wgpu::TextureFormat);

/// Scratch targets shared by blur passes, keyed by resolution and format.
#[derive(Debug, Default)]
pub struct TempTargetPool {
    free: RefCell<HashMap<PoolKey, Vec<TargetHandle>>>,
    outstanding: Cell<usize>,
}

impl TempTargetPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow a scratch target, allocating one if none is free.
    pub fn acquire(
        &self,
        resolution: u32,
        format: wgpu::TextureFormat,
        backend: &mut dyn ShadowBackend,
    ) -> Result<TargetLease<'_>, ShadowError> {
        let key = (resolution, format);
        let reused = self.free.borrow_mut().get_mut(&key).and_then(Vec::pop);

        let target = match reused {
            Some(target) => target,
            None => {
                let target = backend.create_target(&TargetDesc::scratch(resolution, format))?;
                tracing::debug!(
                    "Scratch pool grew: {}x{} {:?}",
                    resolution,
                    resolution,
                    format
                );
                target
            }
        };

        self.outstanding.set(self.outstanding.get() + 1);
        Ok(TargetLease {
            pool: self,
            key,
            target,
        })
    }

    /// Destroy every free target. Leased targets are unaffected.
    pub fn clear(&self, backend: &mut dyn ShadowBackend) {
        for (_, targets) in self.free.borrow_mut().drain() {
            for target in targets {
                backend.destroy_target(target);
            }
        }
    }

    /// Number of free targets.
    pub fn pooled(&self) -> usize {
        self.free.borrow().values().map(Vec::len).sum()
    }

    /// Number of targets currently leased.
    pub fn outstanding(&self) -> usize {
        self.outstanding.get()
    }
}

/// A leased scratch target; returns to its pool on drop.
#[derive(Debug)]
pub struct TargetLease<'a> {
    pool: &'a TempTargetPool,
    key: PoolKey,
    target: TargetHandle,
}

impl TargetLease<'_> {
    /// The leased target.
    pub fn target(&self) -> TargetHandle {
        self.target
    }

    /// Give the target back now.
    pub fn release(self) {}
}

impl Drop for TargetLease<'_> {
    fn drop(&mut self) {
        self.pool
            .free
            .borrow_mut()
            .entry(self.key)
            .or_default()
            .push(self.target);
        self.pool
            .outstanding
            .set(self.pool.outstanding.get().saturating_sub(1));
    }
}
