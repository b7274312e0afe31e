//! In-memory backend for unit tests.

use super::ShadowError;
use super::backend::{
    BlurPass, DrawCall, FacePass, ShadowBackend, TargetDesc, TargetHandle, VariantHandle,
    VariantKey,
};
use super::state::ShadowRenderState;
use crate::context::DeviceCaps;
use crate::renderer::caster::CasterId;
use glam::Vec2;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurRecord {
    pub source: TargetHandle,
    pub source_layer: u32,
    pub destination: TargetHandle,
    pub destination_layer: u32,
    pub offset: Vec2,
    pub taps: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    CreateTarget(TargetHandle, TargetDesc),
    DestroyTarget(TargetHandle),
    Compile(VariantKey),
    State(ShadowRenderState),
    BeginFace(FacePass),
    Draw(DrawCall),
    EndFace,
    Blur(BlurRecord),
}

#[derive(Debug)]
pub struct MockBackend {
    pub caps: DeviceCaps,
    pub events: Vec<Event>,
    pub failing_caster: Option<CasterId>,
    pub live: HashMap<TargetHandle, TargetDesc>,
    pub next_target: u32,
    pub next_variant: u32,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            caps: DeviceCaps::FULL,
            events: Vec::new(),
            failing_caster: None,
            live: HashMap::new(),
            next_target: 0,
            next_variant: 0,
        }
    }
}

impl MockBackend {
    pub fn is_live(&self, target: TargetHandle) -> bool {
        self.live.contains_key(&target)
    }

    pub fn live_targets(&self) -> usize {
        self.live.len()
    }

    pub fn created_targets(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::CreateTarget(..)))
            .count()
    }

    pub fn draws(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::Draw(_)))
            .count()
    }
}

impl ShadowBackend for MockBackend {
    fn caps(&self) -> DeviceCaps {
        self.caps
    }

    fn create_target(&mut self, desc: &TargetDesc) -> Result<TargetHandle, ShadowError> {
        let target = TargetHandle(self.next_target);
        self.next_target += 1;
        self.live.insert(target, *desc);
        self.events.push(Event::CreateTarget(target, *desc));
        Ok(target)
    }

    fn destroy_target(&mut self, target: TargetHandle) {
        self.live.remove(&target);
        self.events.push(Event::DestroyTarget(target));
    }

    fn compile_variant(&mut self, key: &VariantKey) -> Result<VariantHandle, ShadowError> {
        if self.failing_caster == Some(key.caster) {
            return Err(ShadowError::VariantCompilation(format!("{:?}", key.caster)));
        }
        self.events.push(Event::Compile(*key));
        let variant = VariantHandle(self.next_variant);
        self.next_variant += 1;
        Ok(variant)
    }

    fn set_render_state(&mut self, state: &ShadowRenderState) {
        self.events.push(Event::State(*state));
    }

    fn begin_face(&mut self, pass: &FacePass) {
        self.events.push(Event::BeginFace(*pass));
    }

    fn draw(&mut self, call: &DrawCall) {
        self.events.push(Event::Draw(*call));
    }

    fn end_face(&mut self) {
        self.events.push(Event::EndFace);
    }

    fn blur(&mut self, pass: &BlurPass<'_>) {
        self.events.push(Event::Blur(BlurRecord {
            source: pass.source,
            source_layer: pass.source_layer,
            destination: pass.destination,
            destination_layer: pass.destination_layer,
            offset: pass.offset,
            taps: pass.weights.len(),
        }));
    }
}
