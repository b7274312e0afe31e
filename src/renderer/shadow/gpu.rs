//! wgpu shadow backend
//!
//! Face passes, draws and blur passes are recorded as the shadow renderer
//! issues them and replayed into a command encoder by
//! [`WgpuBackend::encode`]. Per-draw uniforms share one buffer addressed
//! with dynamic offsets.

use super::ShadowError;
use super::backend::{
    BlurPass, ClearScope, DrawCall, FacePass, PassOutput, PixelRect, ShadowBackend, TargetDesc,
    TargetHandle, VariantHandle, VariantKey,
};
use super::state::ShadowRenderState;
use crate::context::{DeviceCaps, WgpuContext};
use crate::core::buffer::uniform_buffer;
use crate::core::pipeline::create_shader_module;
use crate::core::texture::create_comparison_sampler;
use crate::core::{
    BlendState, CullState, DepthBias, DepthState, IndexBuffer, LayeredTexture, PipelineBuilder,
    VertexBuffer, VertexP,
};
use crate::renderer::caster::MeshHandle;
use std::collections::HashMap;
use wgpu::util::DeviceExt;

/// Most blur taps the blur shader accepts.
const MAX_BLUR_TAPS: usize = 28;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct DrawUniform {
    view_proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    /// Light position and range.
    light: [f32; 4],
    /// x: pack the output into RGBA8.
    params: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ClearUniform {
    color: [f32; 4],
    depth: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct BlurUniform {
    weights: [[f32; 4]; 7],
    offset: [f32; 2],
    count: u32,
    pad: u32,
}

struct GpuTarget {
    desc: TargetDesc,
    color: Option<LayeredTexture>,
    depth: Option<LayeredTexture>,
}

struct GpuMesh {
    vertices: VertexBuffer,
    indices: IndexBuffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    output: PassOutput,
    blend: BlendState,
    depth: DepthState,
    bias: (u32, u32),
    cull: CullState,
    color_format: Option<wgpu::TextureFormat>,
    depth_format: Option<wgpu::TextureFormat>,
}

type ClearKey = (Option<wgpu::TextureFormat>, Option<wgpu::TextureFormat>);

struct RecordedDraw {
    pipeline: PipelineKey,
    mesh: MeshHandle,
    uniform_offset: u32,
}

struct RecordedFace {
    pass: FacePass,
    /// Pipeline and uniform slot of the viewport clear quad.
    clear_quad: Option<(ClearKey, u32)>,
    draws: Vec<RecordedDraw>,
}

struct RecordedBlur {
    destination: TargetHandle,
    destination_layer: u32,
    format: wgpu::TextureFormat,
    bind_group: wgpu::BindGroup,
}

enum Command {
    Face(RecordedFace),
    Blur(RecordedBlur),
}

/// [`ShadowBackend`] rendering with wgpu.
///
/// Meshes are registered up front with [`WgpuBackend::register_mesh`];
/// positions of skinned casters are expected to be skinned already.
///
/// Variants are shared per pass output, so a caster's opacity channel is
/// not sampled: alpha-tested casters cast solid shadows.
pub struct WgpuBackend {
    ctx: WgpuContext,
    depth_module: wgpu::ShaderModule,
    clear_module: wgpu::ShaderModule,
    blur_module: wgpu::ShaderModule,
    uniform_layout: wgpu::BindGroupLayout,
    blur_layout: wgpu::BindGroupLayout,
    comparison_sampler: wgpu::Sampler,
    uniform_stride: usize,

    targets: HashMap<TargetHandle, GpuTarget>,
    next_target: u32,
    meshes: HashMap<MeshHandle, GpuMesh>,
    next_mesh: u32,
    variants: Vec<PassOutput>,
    variant_lookup: HashMap<PassOutput, VariantHandle>,

    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    clear_pipelines: HashMap<ClearKey, wgpu::RenderPipeline>,
    blur_pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,

    state: Option<ShadowRenderState>,
    current: Option<RecordedFace>,
    commands: Vec<Command>,
    uniform_data: Vec<u8>,
}

impl WgpuBackend {
    /// Create a backend on a context.
    pub fn new(ctx: WgpuContext) -> anyhow::Result<Self> {
        let depth_module = create_shader_module(
            &ctx,
            "shadow depth shader",
            include_str!("../../shaders/shadow_depth.wgsl"),
        );
        let clear_module = create_shader_module(
            &ctx,
            "shadow clear shader",
            include_str!("../../shaders/shadow_clear.wgsl"),
        );
        let blur_module = create_shader_module(
            &ctx,
            "vsm blur shader",
            include_str!("../../shaders/vsm_blur.wgsl"),
        );

        let uniform_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("shadow uniform bind group layout"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: true,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                });

        let blur_layout = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("vsm blur bind group layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: false },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let alignment = ctx.device.limits().min_uniform_buffer_offset_alignment as usize;
        let uniform_stride = std::mem::size_of::<DrawUniform>().div_ceil(alignment) * alignment;
        let comparison_sampler = create_comparison_sampler(&ctx);

        tracing::debug!(
            "Shadow backend ready, uniform stride {} bytes, caps {:?}",
            uniform_stride,
            ctx.caps
        );

        Ok(Self {
            ctx,
            depth_module,
            clear_module,
            blur_module,
            uniform_layout,
            blur_layout,
            comparison_sampler,
            uniform_stride,
            targets: HashMap::new(),
            next_target: 0,
            meshes: HashMap::new(),
            next_mesh: 0,
            variants: Vec::new(),
            variant_lookup: HashMap::new(),
            pipelines: HashMap::new(),
            clear_pipelines: HashMap::new(),
            blur_pipelines: HashMap::new(),
            state: None,
            current: None,
            commands: Vec::new(),
            uniform_data: Vec::new(),
        })
    }

    /// Upload caster geometry and get the handle draws refer to.
    pub fn register_mesh(&mut self, vertices: &[VertexP], indices: &[u32]) -> MeshHandle {
        let handle = MeshHandle(self.next_mesh);
        self.next_mesh += 1;
        self.meshes.insert(
            handle,
            GpuMesh {
                vertices: VertexBuffer::new(&self.ctx, vertices, Some("shadow caster vertices")),
                indices: IndexBuffer::new_u32(&self.ctx, indices, Some("shadow caster indices")),
            },
        );
        handle
    }

    /// Drop a registered mesh.
    pub fn remove_mesh(&mut self, mesh: MeshHandle) {
        self.meshes.remove(&mesh);
    }

    /// Sampling view of a target: the color texture if it has one, else depth.
    pub fn target_view(&self, target: TargetHandle) -> Option<&wgpu::TextureView> {
        let gpu = self.targets.get(&target)?;
        gpu.color.as_ref().or(gpu.depth.as_ref()).map(|t| t.view())
    }

    /// Sampling view of a target's depth attachment.
    pub fn target_depth_view(&self, target: TargetHandle) -> Option<&wgpu::TextureView> {
        self.targets.get(&target)?.depth.as_ref().map(|t| t.view())
    }

    /// Description a target was created with.
    pub fn target_desc(&self, target: TargetHandle) -> Option<TargetDesc> {
        self.targets.get(&target).map(|t| t.desc)
    }

    /// Sampler for hardware depth comparison of native-depth maps.
    pub fn comparison_sampler(&self) -> &wgpu::Sampler {
        &self.comparison_sampler
    }

    /// Number of recorded commands waiting for [`WgpuBackend::encode`].
    pub fn pending(&self) -> usize {
        self.commands.len()
    }

    /// Replay everything recorded since the last call into `encoder`.
    pub fn encode(&mut self, encoder: &mut wgpu::CommandEncoder) {
        if let Some(face) = self.current.take() {
            tracing::warn!("Shadow face on {:?} was never ended", face.pass.target);
            self.commands.push(Command::Face(face));
        }

        let commands = std::mem::take(&mut self.commands);
        let uniform_data = std::mem::take(&mut self.uniform_data);
        if commands.is_empty() {
            return;
        }

        let uniform_bind_group = (!uniform_data.is_empty()).then(|| {
            let buffer = self
                .ctx
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("shadow draw uniforms"),
                    contents: &uniform_data,
                    usage: wgpu::BufferUsages::UNIFORM,
                });
            self.ctx
                .device
                .create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("shadow draw bind group"),
                    layout: &self.uniform_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: &buffer,
                            offset: 0,
                            size: wgpu::BufferSize::new(
                                std::mem::size_of::<DrawUniform>() as u64
                            ),
                        }),
                    }],
                })
        });

        for command in &commands {
            match command {
                Command::Face(face) => {
                    self.encode_face(encoder, face, uniform_bind_group.as_ref());
                }
                Command::Blur(blur) => self.encode_blur(encoder, blur),
            }
        }
    }

    fn encode_face(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        face: &RecordedFace,
        uniforms: Option<&wgpu::BindGroup>,
    ) {
        let pass = &face.pass;
        let Some(target) = self.targets.get(&pass.target) else {
            tracing::warn!("Shadow target {:?} destroyed before encoding", pass.target);
            return;
        };

        let clear_target = pass.clear_scope == ClearScope::Target;
        let color_attachment =
            target
                .color
                .as_ref()
                .map(|texture| wgpu::RenderPassColorAttachment {
                    view: texture.layer_view(pass.layer),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: if clear_target {
                            pass.clear.color_load_op()
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                });
        let depth_attachment =
            target
                .depth
                .as_ref()
                .map(|texture| wgpu::RenderPassDepthStencilAttachment {
                    view: texture.layer_view(pass.layer),
                    depth_ops: Some(wgpu::Operations {
                        load: if clear_target {
                            pass.clear.depth_load_op()
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                });

        let color_count = usize::from(color_attachment.is_some());
        let color_attachments = [color_attachment];
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("shadow face pass"),
            color_attachments: &color_attachments[..color_count],
            depth_stencil_attachment: depth_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let viewport = pass.viewport;
        render_pass.set_viewport(
            viewport.x as f32,
            viewport.y as f32,
            viewport.width as f32,
            viewport.height as f32,
            0.0,
            1.0,
        );
        let scissor = pass.scissor;
        render_pass.set_scissor_rect(scissor.x, scissor.y, scissor.width, scissor.height);

        let Some(uniforms) = uniforms else {
            return;
        };

        if let Some((key, offset)) = face.clear_quad {
            if let Some(pipeline) = self.clear_pipelines.get(&key) {
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, uniforms, &[offset]);
                render_pass.draw(0..3, 0..1);
            }
        }

        for draw in &face.draws {
            let (Some(pipeline), Some(mesh)) =
                (self.pipelines.get(&draw.pipeline), self.meshes.get(&draw.mesh))
            else {
                continue;
            };
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, uniforms, &[draw.uniform_offset]);
            render_pass.set_vertex_buffer(0, mesh.vertices.slice());
            render_pass.set_index_buffer(mesh.indices.slice(), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..mesh.indices.count(), 0, 0..1);
        }
    }

    fn encode_blur(&self, encoder: &mut wgpu::CommandEncoder, blur: &RecordedBlur) {
        let (Some(target), Some(pipeline)) = (
            self.targets.get(&blur.destination),
            self.blur_pipelines.get(&blur.format),
        ) else {
            tracing::warn!("Blur destination {:?} unavailable", blur.destination);
            return;
        };
        let Some(color) = target.color.as_ref() else {
            return;
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("vsm blur pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color.layer_view(blur.destination_layer),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &blur.bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }

    fn push_uniform<T: bytemuck::Pod>(&mut self, value: &T) -> u32 {
        let offset = self.uniform_data.len();
        self.uniform_data.resize(offset + self.uniform_stride, 0);
        let bytes = bytemuck::bytes_of(value);
        self.uniform_data[offset..offset + bytes.len()].copy_from_slice(bytes);
        offset as u32
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) -> anyhow::Result<()> {
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }

        let fragment_entry = match (key.output, key.color_format.is_some()) {
            (PassOutput::DepthOnly, false) => "fs_depth",
            (PassOutput::DepthOnly, true) | (PassOutput::Depth, _) => "fs_color_depth",
            (PassOutput::Distance, _) => "fs_distance",
            (PassOutput::Moments, _) => "fs_moments",
        };

        let mut builder = PipelineBuilder::new(&self.ctx)
            .label("shadow caster pipeline")
            .module(&self.depth_module)
            .vertex_entry("vs_main")
            .fragment_entry(fragment_entry)
            .vertex_layout(VertexP::layout())
            .bind_group_layout(&self.uniform_layout)
            .color_format(key.color_format)
            .blend(key.blend)
            .cull(key.cull)
            .depth_bias(DepthBias {
                constant: f32::from_bits(key.bias.0),
                slope_scale: f32::from_bits(key.bias.1),
            });
        if let Some(format) = key.depth_format {
            builder = builder.depth(key.depth, format);
        }

        let pipeline = builder.build()?;
        tracing::debug!("Built shadow pipeline {:?}", key);
        self.pipelines.insert(key, pipeline);
        Ok(())
    }

    fn ensure_clear_pipeline(&mut self, key: ClearKey) -> anyhow::Result<()> {
        if self.clear_pipelines.contains_key(&key) {
            return Ok(());
        }

        let (color_format, depth_format) = key;
        let mut builder = PipelineBuilder::new(&self.ctx)
            .label("shadow viewport clear pipeline")
            .module(&self.clear_module)
            .vertex_entry("vs_clear")
            .fragment_entry(if color_format.is_some() {
                "fs_clear"
            } else {
                "fs_clear_depth"
            })
            .bind_group_layout(&self.uniform_layout)
            .color_format(color_format)
            .cull(CullState::None);
        if let Some(format) = depth_format {
            builder = builder.depth(DepthState::overwrite(), format);
        }

        self.clear_pipelines.insert(key, builder.build()?);
        Ok(())
    }

    fn ensure_blur_pipeline(&mut self, format: wgpu::TextureFormat) -> anyhow::Result<()> {
        if self.blur_pipelines.contains_key(&format) {
            return Ok(());
        }

        let pipeline = PipelineBuilder::new(&self.ctx)
            .label("vsm blur pipeline")
            .module(&self.blur_module)
            .bind_group_layout(&self.blur_layout)
            .color_format(Some(format))
            .cull(CullState::None)
            .build()?;
        self.blur_pipelines.insert(format, pipeline);
        Ok(())
    }
}

fn clamp_rect(rect: PixelRect, size: u32) -> PixelRect {
    let x = rect.x.min(size);
    let y = rect.y.min(size);
    PixelRect {
        x,
        y,
        width: rect.width.min(size - x),
        height: rect.height.min(size - y),
    }
}

impl ShadowBackend for WgpuBackend {
    fn caps(&self) -> DeviceCaps {
        self.ctx.caps
    }

    fn create_target(&mut self, desc: &TargetDesc) -> Result<TargetHandle, ShadowError> {
        let limits = self.ctx.device.limits();
        if desc.resolution == 0 || desc.resolution > limits.max_texture_dimension_2d {
            return Err(ShadowError::InvalidResolution(desc.resolution));
        }
        if desc.layers == 0 || desc.layers > limits.max_texture_array_layers {
            return Err(ShadowError::TargetCreation(format!(
                "{} layers not supported",
                desc.layers
            )));
        }
        if desc.cube && desc.layers != 6 {
            return Err(ShadowError::TargetCreation(format!(
                "cube target needs 6 layers, got {}",
                desc.layers
            )));
        }
        if desc.color_format.is_none() && desc.depth_format.is_none() {
            return Err(ShadowError::TargetCreation(
                "target without attachments".to_string(),
            ));
        }

        let color = desc.color_format.map(|format| {
            LayeredTexture::new_attachment(
                &self.ctx,
                desc.resolution,
                desc.layers,
                desc.cube,
                format,
                Some("shadow color target"),
            )
        });
        let depth = desc.depth_format.map(|format| {
            LayeredTexture::new_attachment(
                &self.ctx,
                desc.resolution,
                desc.layers,
                desc.cube,
                format,
                Some("shadow depth target"),
            )
        });

        let handle = TargetHandle(self.next_target);
        self.next_target += 1;
        self.targets.insert(
            handle,
            GpuTarget {
                desc: *desc,
                color,
                depth,
            },
        );
        tracing::debug!("Created shadow target {:?}: {:?}", handle, desc);
        Ok(handle)
    }

    fn destroy_target(&mut self, target: TargetHandle) {
        if self.targets.remove(&target).is_some() {
            tracing::debug!("Destroyed shadow target {:?}", target);
        }
    }

    fn compile_variant(&mut self, key: &VariantKey) -> Result<VariantHandle, ShadowError> {
        if (key.output == PassOutput::Moments) != key.algorithm.is_vsm() {
            return Err(ShadowError::VariantCompilation(format!(
                "{:?} cannot write {:?}",
                key.algorithm, key.output
            )));
        }

        if let Some(&variant) = self.variant_lookup.get(&key.output) {
            return Ok(variant);
        }
        let variant = VariantHandle(self.variants.len() as u32);
        self.variants.push(key.output);
        self.variant_lookup.insert(key.output, variant);
        Ok(variant)
    }

    fn set_render_state(&mut self, state: &ShadowRenderState) {
        self.state = Some(*state);
    }

    fn begin_face(&mut self, pass: &FacePass) {
        if let Some(face) = self.current.take() {
            tracing::warn!("Shadow face on {:?} was never ended", face.pass.target);
            self.commands.push(Command::Face(face));
        }

        let Some(target) = self.targets.get(&pass.target) else {
            tracing::warn!("Shadow face on unknown target {:?}", pass.target);
            return;
        };
        let desc = target.desc;
        if pass.layer >= desc.layers {
            tracing::warn!(
                "Shadow face layer {} out of range for {:?}",
                pass.layer,
                pass.target
            );
            return;
        }

        let mut pass = *pass;
        pass.viewport = clamp_rect(pass.viewport, desc.resolution);
        pass.scissor = clamp_rect(pass.scissor, desc.resolution);
        if pass.viewport.width == 0 || pass.viewport.height == 0 {
            tracing::debug!("Skipping empty shadow face on {:?}", pass.target);
            return;
        }

        let clear_quad = if pass.clear_scope == ClearScope::Viewport {
            let key = (desc.color_format, desc.depth_format);
            match self.ensure_clear_pipeline(key) {
                Ok(()) => {
                    let offset = self.push_uniform(&ClearUniform {
                        color: pass.clear.color.unwrap_or([1.0; 4]),
                        depth: [pass.clear.depth.unwrap_or(1.0), 0.0, 0.0, 0.0],
                    });
                    Some((key, offset))
                }
                Err(e) => {
                    tracing::warn!("Failed to build viewport clear pipeline: {}", e);
                    None
                }
            }
        } else {
            None
        };

        self.current = Some(RecordedFace {
            pass,
            clear_quad,
            draws: Vec::new(),
        });
    }

    fn draw(&mut self, call: &DrawCall) {
        let Some(pass) = self.current.as_ref().map(|face| face.pass) else {
            return;
        };
        let Some(&output) = self.variants.get(call.variant.0 as usize) else {
            tracing::warn!("Unknown shadow variant {:?}", call.variant);
            return;
        };
        let Some(desc) = self.targets.get(&pass.target).map(|t| t.desc) else {
            return;
        };
        if output.writes_color() && desc.color_format.is_none() {
            tracing::warn!("{:?} pass needs a color target, {:?} has none", output, pass.target);
            return;
        }

        let state = self.state.unwrap_or(ShadowRenderState {
            blend: BlendState::NoBlend,
            depth: DepthState::shadow(),
            bias: DepthBias::NONE,
        });
        let key = PipelineKey {
            output,
            blend: state.blend,
            depth: state.depth,
            bias: state.bias.key(),
            cull: call.cull,
            color_format: desc.color_format,
            depth_format: desc.depth_format,
        };
        if let Err(e) = self.ensure_pipeline(key) {
            tracing::warn!("Failed to build shadow pipeline: {}", e);
            return;
        }

        let pack = desc.color_format == Some(wgpu::TextureFormat::Rgba8Unorm)
            && matches!(output, PassOutput::Depth | PassOutput::Distance);
        let uniform_offset = self.push_uniform(&DrawUniform {
            view_proj: pass.view_projection.to_cols_array_2d(),
            model: call.transform.to_cols_array_2d(),
            light: pass.light_position.extend(pass.light_range).to_array(),
            params: [if pack { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        });

        if let Some(face) = self.current.as_mut() {
            face.draws.push(RecordedDraw {
                pipeline: key,
                mesh: call.mesh,
                uniform_offset,
            });
        }
    }

    fn end_face(&mut self) {
        if let Some(face) = self.current.take() {
            self.commands.push(Command::Face(face));
        }
    }

    fn blur(&mut self, pass: &BlurPass<'_>) {
        let (Some(source), Some(destination)) = (
            self.targets.get(&pass.source),
            self.targets.get(&pass.destination),
        ) else {
            tracing::warn!(
                "Blur between unknown targets {:?} -> {:?}",
                pass.source,
                pass.destination
            );
            return;
        };
        let (Some(source_color), Some(format)) =
            (source.color.as_ref(), destination.desc.color_format)
        else {
            tracing::warn!("Blur needs color targets");
            return;
        };
        if pass.source_layer >= source.desc.layers
            || pass.destination_layer >= destination.desc.layers
        {
            tracing::warn!("Blur layer out of range");
            return;
        }

        let taps = pass.weights.len().min(MAX_BLUR_TAPS);
        if taps < pass.weights.len() {
            tracing::warn!(
                "Blur kernel of {} taps truncated to {}",
                pass.weights.len(),
                MAX_BLUR_TAPS
            );
        }
        let mut uniform = BlurUniform {
            weights: [[0.0; 4]; 7],
            offset: pass.offset.to_array(),
            count: taps as u32,
            pad: 0,
        };
        for (i, weight) in pass.weights.iter().take(taps).enumerate() {
            uniform.weights[i / 4][i % 4] = *weight;
        }

        let buffer = uniform_buffer(&self.ctx, &uniform, Some("vsm blur uniform"));
        let bind_group = self
            .ctx
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("vsm blur bind group"),
                layout: &self.blur_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(
                            source_color.layer_view(pass.source_layer),
                        ),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: buffer.as_entire_binding(),
                    },
                ],
            });

        if let Err(e) = self.ensure_blur_pipeline(format) {
            tracing::warn!("Failed to build blur pipeline: {}", e);
            return;
        }

        self.commands.push(Command::Blur(RecordedBlur {
            destination: pass.destination,
            destination_layer: pass.destination_layer,
            format,
            bind_group,
        }));
    }
}
