//! Recording shadow backend shared by the integration tests.

#![allow(dead_code)]

use penumbra::glam::{Mat4, Vec2, Vec3};
use penumbra::renderer::shadow::{
    BlurPass, DrawCall, FacePass, ShadowBackend, ShadowError, ShadowRenderState, TargetDesc,
    TargetHandle, VariantHandle, VariantKey,
};
use penumbra::{Aabb, Camera, CameraId, Caster, CasterId, DeviceCaps, MeshHandle};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedBlur {
    pub source: TargetHandle,
    pub source_layer: u32,
    pub destination: TargetHandle,
    pub destination_layer: u32,
    pub offset: Vec2,
    pub taps: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateTarget(TargetHandle, TargetDesc),
    DestroyTarget(TargetHandle),
    Compile(VariantKey),
    State(ShadowRenderState),
    BeginFace(FacePass),
    Draw(DrawCall),
    EndFace,
    Blur(RecordedBlur),
}

/// Backend that allocates handles and records every call.
#[derive(Debug)]
pub struct RecordingBackend {
    pub caps: DeviceCaps,
    pub calls: Vec<Call>,
    pub live: HashMap<TargetHandle, TargetDesc>,
    next_target: u32,
    next_variant: u32,
}

impl RecordingBackend {
    pub fn new(caps: DeviceCaps) -> Self {
        Self {
            caps,
            calls: Vec::new(),
            live: HashMap::new(),
            next_target: 0,
            next_variant: 0,
        }
    }

    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| pred(call)).count()
    }

    pub fn created(&self) -> Vec<(TargetHandle, TargetDesc)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::CreateTarget(handle, desc) => Some((*handle, *desc)),
                _ => None,
            })
            .collect()
    }

    pub fn faces(&self) -> Vec<FacePass> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::BeginFace(pass) => Some(*pass),
                _ => None,
            })
            .collect()
    }

    pub fn blurs(&self) -> Vec<RecordedBlur> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Blur(blur) => Some(*blur),
                _ => None,
            })
            .collect()
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new(DeviceCaps::FULL)
    }
}

impl ShadowBackend for RecordingBackend {
    fn caps(&self) -> DeviceCaps {
        self.caps
    }

    fn create_target(&mut self, desc: &TargetDesc) -> Result<TargetHandle, ShadowError> {
        let handle = TargetHandle(self.next_target);
        self.next_target += 1;
        self.live.insert(handle, *desc);
        self.calls.push(Call::CreateTarget(handle, *desc));
        Ok(handle)
    }

    fn destroy_target(&mut self, target: TargetHandle) {
        self.live.remove(&target);
        self.calls.push(Call::DestroyTarget(target));
    }

    fn compile_variant(&mut self, key: &VariantKey) -> Result<VariantHandle, ShadowError> {
        self.calls.push(Call::Compile(*key));
        let handle = VariantHandle(self.next_variant);
        self.next_variant += 1;
        Ok(handle)
    }

    fn set_render_state(&mut self, state: &ShadowRenderState) {
        self.calls.push(Call::State(*state));
    }

    fn begin_face(&mut self, pass: &FacePass) {
        self.calls.push(Call::BeginFace(*pass));
    }

    fn draw(&mut self, call: &DrawCall) {
        self.calls.push(Call::Draw(*call));
    }

    fn end_face(&mut self) {
        self.calls.push(Call::EndFace);
    }

    fn blur(&mut self, pass: &BlurPass<'_>) {
        self.calls.push(Call::Blur(RecordedBlur {
            source: pass.source,
            source_layer: pass.source_layer,
            destination: pass.destination,
            destination_layer: pass.destination_layer,
            offset: pass.offset,
            taps: pass.weights.len(),
        }));
    }
}

/// Unit cube caster centered at `center`.
pub fn cube(id: u32, center: Vec3) -> Caster {
    Caster::new(
        CasterId(id),
        MeshHandle(id),
        Mat4::from_translation(center),
        Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5)),
    )
}

/// Viewer at the origin looking down -Z.
pub fn viewer() -> Camera {
    Camera::new_perspective(
        CameraId(1),
        Vec3::ZERO,
        Vec3::NEG_Z,
        60.0,
        1.0,
        0.1,
        100.0,
    )
}
