//! Texture abstractions
//!
//! Layered textures backing shadow maps: a single 2D layer for spot and
//! directional maps, six layers viewed as a cube for omni maps.

use crate::context::WgpuContext;

/// A texture with one render view per layer and a combined sampling view.
pub struct LayeredTexture {
    pub(crate) view: wgpu::TextureView,
    pub(crate) layer_views: Vec<wgpu::TextureView>,
}

impl LayeredTexture {
    /// Create a new square layered texture.
    ///
    /// With `cube` set, `layers` must be 6 and the sampling view is a cube view.
    pub fn new(
        ctx: &WgpuContext,
        size: u32,
        layers: u32,
        cube: bool,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        label: Option<&str>,
    ) -> Self {
        let extent = wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: layers,
        };

        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });

        let dimension = if cube {
            wgpu::TextureViewDimension::Cube
        } else if layers > 1 {
            wgpu::TextureViewDimension::D2Array
        } else {
            wgpu::TextureViewDimension::D2
        };

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label,
            dimension: Some(dimension),
            ..Default::default()
        });

        let layer_views: Vec<_> = (0..layers)
            .map(|i| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: i,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        Self { view, layer_views }
    }

    /// Create a render-and-sample texture of the given format.
    pub fn new_attachment(
        ctx: &WgpuContext,
        size: u32,
        layers: u32,
        cube: bool,
        format: wgpu::TextureFormat,
        label: Option<&str>,
    ) -> Self {
        Self::new(
            ctx,
            size,
            layers,
            cube,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            label,
        )
    }

    /// Get the sampling view (2D, array or cube).
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Get a specific layer's render view.
    pub fn layer_view(&self, layer: u32) -> &wgpu::TextureView {
        &self.layer_views[layer as usize]
    }
}

/// Create a comparison sampler for hardware-filtered shadow lookups.
pub fn create_comparison_sampler(ctx: &WgpuContext) -> wgpu::Sampler {
    ctx.device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("shadow comparison sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        compare: Some(wgpu::CompareFunction::LessEqual),
        ..Default::default()
    })
}
