//! Render pipeline builder
//!
//! Provides a builder pattern for creating the shadow and blur pipelines.

use crate::context::WgpuContext;
use crate::core::render_states::{BlendState, CullState, DepthBias, DepthState};

/// Builder for creating render pipelines.
///
/// A pipeline without a color format is depth-only; a pipeline without a
/// depth state skips depth testing entirely (fullscreen passes).
pub struct PipelineBuilder<'a> {
    ctx: &'a WgpuContext,
    label: Option<&'a str>,
    module: Option<&'a wgpu::ShaderModule>,
    vertex_entry: &'a str,
    fragment_entry: &'a str,
    vertex_layouts: Vec<wgpu::VertexBufferLayout<'a>>,
    bind_group_layouts: Vec<&'a wgpu::BindGroupLayout>,
    color_format: Option<wgpu::TextureFormat>,
    depth_format: wgpu::TextureFormat,
    depth_state: Option<DepthState>,
    depth_bias: DepthBias,
    blend_state: BlendState,
    cull_state: CullState,
}

impl<'a> PipelineBuilder<'a> {
    /// Create a new pipeline builder.
    pub fn new(ctx: &'a WgpuContext) -> Self {
        Self {
            ctx,
            label: None,
            module: None,
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
            vertex_layouts: Vec::new(),
            bind_group_layouts: Vec::new(),
            color_format: None,
            depth_format: wgpu::TextureFormat::Depth32Float,
            depth_state: None,
            depth_bias: DepthBias::NONE,
            blend_state: BlendState::NoBlend,
            cull_state: CullState::Back,
        }
    }

    /// Set the pipeline label.
    pub fn label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    /// Set the compiled shader module.
    pub fn module(mut self, module: &'a wgpu::ShaderModule) -> Self {
        self.module = Some(module);
        self
    }

    /// Set the vertex shader entry point.
    pub fn vertex_entry(mut self, entry: &'a str) -> Self {
        self.vertex_entry = entry;
        self
    }

    /// Set the fragment shader entry point.
    pub fn fragment_entry(mut self, entry: &'a str) -> Self {
        self.fragment_entry = entry;
        self
    }

    /// Add a vertex buffer layout.
    pub fn vertex_layout(mut self, layout: wgpu::VertexBufferLayout<'a>) -> Self {
        self.vertex_layouts.push(layout);
        self
    }

    /// Add a bind group layout.
    pub fn bind_group_layout(mut self, layout: &'a wgpu::BindGroupLayout) -> Self {
        self.bind_group_layouts.push(layout);
        self
    }

    /// Set the color target format, or None for a depth-only pipeline.
    pub fn color_format(mut self, format: Option<wgpu::TextureFormat>) -> Self {
        self.color_format = format;
        self
    }

    /// Enable depth testing against a buffer of the given format.
    pub fn depth(mut self, state: DepthState, format: wgpu::TextureFormat) -> Self {
        self.depth_state = Some(state);
        self.depth_format = format;
        self
    }

    /// Set the rasterizer depth bias.
    pub fn depth_bias(mut self, bias: DepthBias) -> Self {
        self.depth_bias = bias;
        self
    }

    /// Set the blend state.
    pub fn blend(mut self, state: BlendState) -> Self {
        self.blend_state = state;
        self
    }

    /// Set the cull state.
    pub fn cull(mut self, state: CullState) -> Self {
        self.cull_state = state;
        self
    }

    /// Build the render pipeline.
    pub fn build(self) -> anyhow::Result<wgpu::RenderPipeline> {
        let module = self
            .module
            .ok_or_else(|| anyhow::anyhow!("Shader module is required"))?;

        let pipeline_layout =
            self.ctx
                .device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: self.label,
                    bind_group_layouts: &self.bind_group_layouts,
                    immediate_size: 0,
                });

        let depth_stencil = self
            .depth_state
            .map(|state| state.to_wgpu(self.depth_format, self.depth_bias));

        let color_targets: Vec<Option<wgpu::ColorTargetState>> = match self.color_format {
            Some(format) => vec![Some(wgpu::ColorTargetState {
                format,
                blend: self.blend_state.to_wgpu(),
                write_mask: self.blend_state.write_mask(),
            })],
            None => Vec::new(),
        };

        let pipeline = self
            .ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: self.label,
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some(self.vertex_entry),
                    buffers: &self.vertex_layouts,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some(self.fragment_entry),
                    targets: &color_targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: self.cull_state.to_wgpu(),
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil,
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview_mask: None,
                cache: None,
            });

        Ok(pipeline)
    }
}

/// Compile a WGSL source into a shader module.
pub fn create_shader_module(
    ctx: &WgpuContext,
    label: &str,
    source: &str,
) -> wgpu::ShaderModule {
    ctx.device
        .create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
}
