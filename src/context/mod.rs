//! WgpuContext - Device and Queue wrapper
//!
//! Also detects the device capabilities that gate shadow algorithm selection.

use std::sync::Arc;

/// Device capabilities relevant to shadow rendering.
///
/// Shadow algorithms are downgraded against these flags when a light is
/// configured, never while a frame is being drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCaps {
    /// Hardware depth-comparison sampling (filtered shadow lookups).
    pub depth_comparison: bool,
    /// Depth textures can be rendered to and sampled.
    pub depth_textures: bool,
    /// 32-bit float color targets can be rendered to.
    pub float32_renderable: bool,
    /// 32-bit float textures can be linearly filtered.
    pub float32_filterable: bool,
    /// 16-bit float color targets can be rendered to.
    pub float16_renderable: bool,
}

impl DeviceCaps {
    /// Every capability available.
    pub const FULL: Self = Self {
        depth_comparison: true,
        depth_textures: true,
        float32_renderable: true,
        float32_filterable: true,
        float16_renderable: true,
    };

    /// No optional capability available.
    pub const MINIMAL: Self = Self {
        depth_comparison: false,
        depth_textures: false,
        float32_renderable: false,
        float32_filterable: false,
        float16_renderable: false,
    };

    /// Query capabilities from a wgpu device.
    ///
    /// Comparison samplers, depth textures and renderable float formats are
    /// core wgpu; only 32-bit float filtering is an optional feature.
    pub fn from_device(device: &wgpu::Device) -> Self {
        Self {
            depth_comparison: true,
            depth_textures: true,
            float32_renderable: true,
            float32_filterable: device
                .features()
                .contains(wgpu::Features::FLOAT32_FILTERABLE),
            float16_renderable: true,
        }
    }
}

impl Default for DeviceCaps {
    fn default() -> Self {
        Self::FULL
    }
}

/// Core wgpu context containing device and queue.
#[derive(Clone)]
pub struct WgpuContext {
    /// The wgpu device for creating GPU resources.
    pub device: Arc<wgpu::Device>,
    /// The wgpu queue for submitting commands.
    pub queue: Arc<wgpu::Queue>,
    /// Capabilities detected when the context was created.
    pub caps: DeviceCaps,
}

impl WgpuContext {
    /// Create a new context from existing device and queue.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let caps = DeviceCaps::from_device(&device);
        Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            caps,
        }
    }

    /// Create a headless context asynchronously with default settings.
    pub async fn new_async() -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;

        // Filterable 32-bit moments are opt-in; take them when offered.
        let required_features = adapter.features() & wgpu::Features::FLOAT32_FILTERABLE;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("penumbra device"),
                required_features,
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await?;

        Ok(Self::new(device, queue))
    }

    /// Create a new context synchronously (blocks).
    pub fn new_blocking() -> anyhow::Result<Self> {
        pollster::block_on(Self::new_async())
    }

    /// Submit command buffers to the queue.
    pub fn submit<I: IntoIterator<Item = wgpu::CommandBuffer>>(&self, command_buffers: I) {
        self.queue.submit(command_buffers);
    }

    /// Create a command encoder.
    pub fn create_encoder(&self, label: Option<&str>) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label })
    }
}

impl std::fmt::Debug for WgpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuContext")
            .field("caps", &self.caps)
            .finish()
    }
}
