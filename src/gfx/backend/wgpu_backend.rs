//! wgpu implementation of [`RenderBackend`]
//!
//! Owns the surface, device and every GPU object the renderer asked for.
//! Submitting a frame runs in two steps: a prepare walk that builds missing
//! pipelines and bind groups and uploads per-draw uniforms, then an encode
//! walk that replays the recorded commands into render passes.

use std::{collections::HashMap, num::NonZeroU64, sync::Arc};

use image::RgbaImage;
use wgpu::util::DeviceExt;

use super::{
    gpu_texture::{create_albedo_sampler, GpuAttachmentSet, GpuTexture},
    pipelines::{PipelineCache, COMPOSITE_UNIFORMS_SIZE, GIZMO_UNIFORMS_SIZE},
    AdapterDetails, AttachmentSetHandle, BackendLimits, MeshHandle, RenderBackend, TextureHandle,
};
use crate::{
    error::RenderError,
    gfx::{
        aligned_buffer::{AlignedBuffer, Channel},
        frame::{DrawCommand, DrawUniforms, FrameCommands, PassTarget, RenderPassRecord, TextureRef},
        framebuffer::{Attachment, AttachmentSetDesc, AttachmentStatus},
        parameters::{GLOBALS_BINDING_SIZE, LOCALS_BLOCK_SIZE},
        resources::program::{Program, ProgramKind},
        scene::mesh::Mesh,
    },
};

/// Upper bound for each parameter channel buffer
const MAX_PARAMETER_BUFFER_SIZE: u32 = 64 * 1024;

/// Features listed in the adapter information window
const REPORTED_FEATURES: &[(&str, wgpu::Features)] = &[
    ("DEPTH_CLIP_CONTROL", wgpu::Features::DEPTH_CLIP_CONTROL),
    ("DEPTH32FLOAT_STENCIL8", wgpu::Features::DEPTH32FLOAT_STENCIL8),
    ("TEXTURE_COMPRESSION_BC", wgpu::Features::TEXTURE_COMPRESSION_BC),
    ("TIMESTAMP_QUERY", wgpu::Features::TIMESTAMP_QUERY),
    ("INDIRECT_FIRST_INSTANCE", wgpu::Features::INDIRECT_FIRST_INSTANCE),
    ("SHADER_F16", wgpu::Features::SHADER_F16),
    ("FLOAT32_FILTERABLE", wgpu::Features::FLOAT32_FILTERABLE),
    ("POLYGON_MODE_LINE", wgpu::Features::POLYGON_MODE_LINE),
];

struct GpuMesh {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
}

/// One parameter channel: a uniform buffer bound with dynamic offsets
struct UniformChannel {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl UniformChannel {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        label: &str,
        capacity: u64,
        binding_size: u64,
    ) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = uniform_bind_group(device, layout, &buffer, label, binding_size);
        Self { buffer, bind_group }
    }
}

fn uniform_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    label: &str,
    binding_size: u64,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: NonZeroU64::new(binding_size),
            }),
        }],
    })
}

/// Per-draw uniforms of the current frame, staged through an [`AlignedBuffer`]
struct DrawUniformBuffer {
    buffer: wgpu::Buffer,
    gizmo_group: wgpu::BindGroup,
    composite_group: wgpu::BindGroup,
    staging: AlignedBuffer,
}

impl DrawUniformBuffer {
    fn new(device: &wgpu::Device, pipelines: &PipelineCache, capacity: usize) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("draw uniforms"),
            size: capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let layouts = &pipelines.layouts;
        Self {
            gizmo_group: uniform_bind_group(
                device,
                &layouts.gizmo,
                &buffer,
                "gizmo uniforms",
                GIZMO_UNIFORMS_SIZE,
            ),
            composite_group: uniform_bind_group(
                device,
                &layouts.composite,
                &buffer,
                "composite uniforms",
                COMPOSITE_UNIFORMS_SIZE,
            ),
            buffer,
            staging: AlignedBuffer::new(capacity),
        }
    }
}

/// Bytes needed to stage `uniform_count` draw uniforms at `alignment`
///
/// Every push starts on an aligned offset, so each one occupies the largest
/// uniform struct rounded up to the alignment.
fn draw_uniform_capacity(uniform_count: usize, alignment: usize) -> usize {
    let stride = (GIZMO_UNIFORMS_SIZE as usize).div_ceil(alignment) * alignment;
    uniform_count.max(1) * stride
}

/// Textures bound for one draw, by program kind and unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TextureGroupKey {
    kind: ProgramKind,
    units: [Option<TextureRef>; 3],
}

/// Bind group slot that holds textures for a program kind
fn texture_group_slot(kind: ProgramKind) -> Option<u32> {
    match kind {
        ProgramKind::Geometry | ProgramKind::ForwardLit => Some(2),
        ProgramKind::Resolve | ProgramKind::Composite => Some(1),
        ProgramKind::Gizmo => None,
    }
}

pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: wgpu::SurfaceConfiguration,
    limits: BackendLimits,
    details: AdapterDetails,
    pipelines: PipelineCache,
    meshes: Vec<GpuMesh>,
    textures: Vec<GpuTexture>,
    /// `None` for sets that were incomplete at creation
    attachment_sets: Vec<Option<GpuAttachmentSet>>,
    globals: UniformChannel,
    locals: UniformChannel,
    draw_uniforms: DrawUniformBuffer,
    albedo_sampler: wgpu::Sampler,
    color_placeholder: GpuTexture,
    depth_placeholder: GpuTexture,
    texture_groups: HashMap<TextureGroupKey, wgpu::BindGroup>,
}

impl WgpuBackend {
    /// Creates the device and configures the surface for `window`
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("deferra device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;
        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let details = adapter_details(&adapter.get_info(), adapter.features());
        log::info!(
            "Using {} ({}, {})",
            details.name,
            details.backend,
            details.device_type
        );

        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .unwrap_or(capabilities.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: present_mode(&capabilities.present_modes, vsync),
            alpha_mode: capabilities.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let mut limits = BackendLimits::from_wgpu(&device.limits());
        limits.max_uniform_block_size = limits.max_uniform_block_size.min(MAX_PARAMETER_BUFFER_SIZE);

        let pipelines = PipelineCache::new(device.clone(), format);
        let capacity = limits.max_uniform_block_size as u64;
        let globals = UniformChannel::new(
            &device,
            &pipelines.layouts.globals,
            "globals",
            capacity,
            GLOBALS_BINDING_SIZE,
        );
        let locals = UniformChannel::new(
            &device,
            &pipelines.layouts.locals,
            "locals",
            capacity,
            LOCALS_BLOCK_SIZE,
        );
        let draw_uniforms =
            DrawUniformBuffer::new(&device, &pipelines, limits.uniform_offset_alignment as usize * 16);

        let color_placeholder = GpuTexture::from_image(
            &device,
            &queue,
            &RgbaImage::from_pixel(1, 1, image::Rgba([255, 0, 255, 255])),
            "placeholder color",
        );
        let depth_placeholder = GpuTexture::depth_placeholder(&device);

        Ok(Self {
            surface,
            albedo_sampler: create_albedo_sampler(&device),
            device,
            queue,
            config,
            limits,
            details,
            pipelines,
            meshes: Vec::new(),
            textures: Vec::new(),
            attachment_sets: Vec::new(),
            globals,
            locals,
            draw_uniforms,
            color_placeholder,
            depth_placeholder,
            texture_groups: HashMap::new(),
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn adapter_details(&self) -> &AdapterDetails {
        &self.details
    }

    /// Reconfigures the surface; attachment sets keep their size
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Draws `frame` to the surface, then lets `ui_callback` draw on top
    ///
    /// A lost or outdated surface is reconfigured and the frame skipped.
    pub fn render_frame<F>(
        &mut self,
        frame: &FrameCommands,
        ui_callback: Option<F>,
    ) -> Result<(), RenderError>
    where
        F: FnOnce(&wgpu::Device, &wgpu::Queue, &mut wgpu::CommandEncoder, &wgpu::TextureView),
    {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(err @ wgpu::SurfaceError::OutOfMemory) => return Err(err.into()),
            Err(err) => {
                log::warn!("Skipping frame: {}", err);
                return Ok(());
            }
        };

        let surface_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let draw_offsets = self.prepare(frame);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });

        let mut next_uniform = 0;
        for pass in &frame.passes {
            self.encode_pass(
                &mut encoder,
                pass,
                &surface_view,
                &draw_offsets,
                &mut next_uniform,
            );
        }

        if let Some(ui_callback) = ui_callback {
            ui_callback(&self.device, &self.queue, &mut encoder, &surface_view);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        Ok(())
    }

    /// Builds pipelines and texture bind groups used by `frame` and uploads
    /// its per-draw uniforms; returns the dynamic offset of each upload
    fn prepare(&mut self, frame: &FrameCommands) -> Vec<u32> {
        let alignment = self.limits.uniform_offset_alignment as usize;
        let uniform_count = frame
            .passes
            .iter()
            .flat_map(|pass| &pass.commands)
            .filter(|c| matches!(c, DrawCommand::SetDrawUniforms(_)))
            .count();

        let required = draw_uniform_capacity(uniform_count, alignment);
        if required > self.draw_uniforms.staging.capacity() {
            log::debug!("Growing draw uniform buffer to {} bytes", required);
            self.draw_uniforms =
                DrawUniformBuffer::new(&self.device, &self.pipelines, required.next_power_of_two());
        }

        let mut offsets = Vec::with_capacity(uniform_count);
        self.draw_uniforms.staging.acquire();

        for pass in &frame.passes {
            if !self.target_exists(pass.target) {
                continue;
            }

            let mut kind = None;
            let mut units = [None; 3];
            for command in &pass.commands {
                match command {
                    DrawCommand::UseProgram(id) => kind = self.pipelines.usable_kind(*id),
                    DrawCommand::BindVertices { binding, .. } if kind.is_some() => {
                        self.pipelines.prepare(binding, pass.depth_test)
                    }
                    DrawCommand::BindTexture { unit, texture } => {
                        if let Some(slot) = units.get_mut(*unit as usize) {
                            *slot = Some(*texture);
                        }
                    }
                    DrawCommand::SetDrawUniforms(uniforms) => {
                        let offset = self
                            .draw_uniforms
                            .staging
                            .push_aligned(uniforms.bytes(), alignment);
                        offsets.push(offset as u32);
                    }
                    DrawCommand::DrawIndexed { .. } => {
                        if let Some(kind) = kind {
                            self.prepare_texture_group(TextureGroupKey { kind, units });
                        }
                    }
                    _ => {}
                }
            }
        }

        let bytes = self.draw_uniforms.staging.release();
        if !bytes.is_empty() {
            self.queue.write_buffer(&self.draw_uniforms.buffer, 0, bytes);
        }
        offsets
    }

    fn target_exists(&self, target: PassTarget) -> bool {
        match target {
            PassTarget::Screen => true,
            PassTarget::Offscreen(handle) => self.attachment_set(handle).is_some(),
        }
    }

    fn attachment_set(&self, handle: AttachmentSetHandle) -> Option<&GpuAttachmentSet> {
        self.attachment_sets
            .get(handle.0 as usize)
            .and_then(Option::as_ref)
    }

    /// View of a color texture, or the placeholder when it does not exist
    fn color_view(&self, texture: Option<TextureRef>) -> &wgpu::TextureView {
        let view = match texture {
            Some(TextureRef::Image(handle)) => {
                self.textures.get(handle.0 as usize).map(|t| &t.view)
            }
            Some(TextureRef::Attachment { set, attachment }) => {
                self.attachment_set(set).and_then(|set| {
                    Attachment::COLOR_OUTPUTS
                        .iter()
                        .position(|a| *a == attachment)
                        .and_then(|slot| set.color.get(slot))
                        .map(|t| &t.view)
                })
            }
            None => None,
        };
        view.unwrap_or(&self.color_placeholder.view)
    }

    fn depth_view(&self, texture: Option<TextureRef>) -> &wgpu::TextureView {
        match texture {
            Some(TextureRef::Attachment {
                set,
                attachment: Attachment::Depth,
            }) => self
                .attachment_set(set)
                .map(|set| &set.depth.view)
                .unwrap_or(&self.depth_placeholder.view),
            _ => &self.depth_placeholder.view,
        }
    }

    fn prepare_texture_group(&mut self, key: TextureGroupKey) {
        if self.texture_groups.contains_key(&key) || texture_group_slot(key.kind).is_none() {
            return;
        }

        let [unit0, unit1, unit2] = key.units;
        let layouts = &self.pipelines.layouts;

        let bind_group = match key.kind {
            ProgramKind::Geometry | ProgramKind::ForwardLit => self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("albedo bind group"),
                layout: &layouts.albedo,
                entries: &[
                    view_entry(0, self.color_view(unit0)),
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.albedo_sampler),
                    },
                ],
            }),
            ProgramKind::Resolve => self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("gbuffer inputs bind group"),
                layout: &layouts.gbuffer_inputs,
                entries: &[
                    view_entry(0, self.color_view(unit0)),
                    view_entry(1, self.color_view(unit1)),
                    view_entry(2, self.color_view(unit2)),
                ],
            }),
            ProgramKind::Composite => {
                let is_depth = matches!(
                    unit0,
                    Some(TextureRef::Attachment {
                        attachment: Attachment::Depth,
                        ..
                    })
                );
                let color = if is_depth { None } else { unit0 };
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("composite source bind group"),
                    layout: &layouts.composite_source,
                    entries: &[view_entry(0, self.color_view(color)), view_entry(1, self.depth_view(unit0))],
                })
            }
            ProgramKind::Gizmo => return,
        };

        self.texture_groups.insert(key, bind_group);
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        record: &RenderPassRecord,
        surface_view: &wgpu::TextureView,
        draw_offsets: &[u32],
        next_uniform: &mut usize,
    ) {
        let [r, g, b, a] = record.clear_color.map(f64::from);
        let clear = wgpu::Color { r, g, b, a };

        let (color_attachments, depth_view) = match record.target {
            PassTarget::Screen => (
                vec![Some(wgpu::RenderPassColorAttachment {
                    view: surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                None,
            ),
            PassTarget::Offscreen(handle) => {
                // the prepare walk skipped this pass too, so no uniforms were staged for it
                let Some(set) = self.attachment_set(handle) else {
                    log::trace!("Skipping {:?} pass into incomplete set {:?}", record.kind, handle);
                    return;
                };
                let attachments = set
                    .color
                    .iter()
                    .enumerate()
                    .map(|(slot, texture)| {
                        Some(wgpu::RenderPassColorAttachment {
                            view: &texture.view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(if slot == 0 {
                                    clear
                                } else {
                                    wgpu::Color::TRANSPARENT
                                }),
                                store: wgpu::StoreOp::Store,
                            },
                        })
                    })
                    .collect();
                (attachments, Some(&set.depth.view))
            }
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&format!("{:?} pass", record.kind)),
            color_attachments: &color_attachments,
            depth_stencil_attachment: depth_view.map(|view| {
                wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        let mut kind = None;
        let mut units = [None; 3];
        let mut drawable = false;

        for command in &record.commands {
            match command {
                DrawCommand::UseProgram(id) => {
                    kind = self.pipelines.usable_kind(*id);
                    drawable = false;
                }
                DrawCommand::BindParameterBlock {
                    slot,
                    channel,
                    block,
                } => {
                    if kind.is_some() {
                        let group = match channel {
                            Channel::Globals => &self.globals.bind_group,
                            Channel::Locals => &self.locals.bind_group,
                        };
                        pass.set_bind_group(*slot, group, &[block.offset]);
                    }
                }
                DrawCommand::SetDrawUniforms(uniforms) => {
                    let offset = draw_offsets.get(*next_uniform).copied();
                    *next_uniform += 1;
                    if let (Some(_), Some(offset)) = (kind, offset) {
                        let group = match uniforms {
                            DrawUniforms::Gizmo(_) => &self.draw_uniforms.gizmo_group,
                            DrawUniforms::Composite(_) => &self.draw_uniforms.composite_group,
                        };
                        pass.set_bind_group(0, group, &[offset]);
                    }
                }
                DrawCommand::BindTexture { unit, texture } => {
                    if let Some(slot) = units.get_mut(*unit as usize) {
                        *slot = Some(*texture);
                    }
                }
                DrawCommand::BindVertices { mesh, binding } => {
                    let pipeline = kind.and_then(|_| self.pipelines.pipeline(binding.id));
                    let buffers = self.meshes.get(mesh.0 as usize);
                    drawable = false;
                    if let (Some(pipeline), Some(buffers)) = (pipeline, buffers) {
                        pass.set_pipeline(pipeline);
                        pass.set_vertex_buffer(0, buffers.vertices.slice(binding.base_offset..));
                        pass.set_index_buffer(buffers.indices.slice(..), wgpu::IndexFormat::Uint32);
                        drawable = true;
                    }
                }
                DrawCommand::DrawIndexed {
                    first_index,
                    index_count,
                } => {
                    let Some(kind) = kind.filter(|_| drawable) else {
                        continue;
                    };
                    if let Some(slot) = texture_group_slot(kind) {
                        let Some(group) = self.texture_groups.get(&TextureGroupKey { kind, units })
                        else {
                            continue;
                        };
                        pass.set_bind_group(slot, group, &[]);
                    }
                    pass.draw_indexed(*first_index..first_index + index_count, 0, 0..1);
                }
            }
        }
    }
}

fn view_entry(binding: u32, view: &wgpu::TextureView) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: wgpu::BindingResource::TextureView(view),
    }
}

fn present_mode(available: &[wgpu::PresentMode], vsync: bool) -> wgpu::PresentMode {
    if vsync {
        return wgpu::PresentMode::Fifo;
    }
    [wgpu::PresentMode::Immediate, wgpu::PresentMode::Mailbox]
        .into_iter()
        .find(|mode| available.contains(mode))
        .unwrap_or(wgpu::PresentMode::Fifo)
}

fn adapter_details(info: &wgpu::AdapterInfo, features: wgpu::Features) -> AdapterDetails {
    AdapterDetails {
        name: info.name.clone(),
        vendor: format!("{:#06x}", info.vendor),
        backend: format!("{:?}", info.backend),
        device_type: format!("{:?}", info.device_type),
        driver: info.driver.clone(),
        driver_info: info.driver_info.clone(),
        features: REPORTED_FEATURES
            .iter()
            .filter(|(_, flag)| features.contains(*flag))
            .map(|(name, _)| name.to_string())
            .collect(),
    }
}

impl RenderBackend for WgpuBackend {
    fn limits(&self) -> BackendLimits {
        self.limits
    }

    fn compile_program(&mut self, program: &Program, source: &str) -> Result<(), RenderError> {
        self.pipelines.compile(program, source)
    }

    fn upload_mesh(&mut self, mesh: &Mesh) -> MeshHandle {
        let vertices = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} vertices", mesh.label)),
                contents: &mesh.vertex_data,
                usage: wgpu::BufferUsages::VERTEX,
            });
        let indices = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} indices", mesh.label)),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        self.meshes.push(GpuMesh { vertices, indices });
        MeshHandle(self.meshes.len() as u32 - 1)
    }

    fn create_texture(&mut self, image: &RgbaImage, label: &str) -> TextureHandle {
        let texture = GpuTexture::from_image(&self.device, &self.queue, image, label);
        self.textures.push(texture);
        TextureHandle(self.textures.len() as u32 - 1)
    }

    fn create_attachment_set(
        &mut self,
        desc: &AttachmentSetDesc,
        status: &AttachmentStatus,
    ) -> AttachmentSetHandle {
        let set = match (status, desc.depth) {
            (AttachmentStatus::Complete, Some(depth_format)) => {
                let color = desc
                    .color
                    .iter()
                    .map(|(attachment, format)| {
                        GpuTexture::render_target(
                            &self.device,
                            desc.width,
                            desc.height,
                            *format,
                            &format!("{} {}", desc.label, attachment.label()),
                        )
                    })
                    .collect();
                let depth = GpuTexture::render_target(
                    &self.device,
                    desc.width,
                    desc.height,
                    depth_format,
                    &format!("{} depth", desc.label),
                );
                Some(GpuAttachmentSet {
                    label: desc.label.clone(),
                    color,
                    depth,
                })
            }
            _ => None,
        };

        self.attachment_sets.push(set);
        AttachmentSetHandle(self.attachment_sets.len() as u32 - 1)
    }

    fn upload_parameters(&mut self, channel: Channel, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let buffer = match channel {
            Channel::Globals => &self.globals.buffer,
            Channel::Locals => &self.locals.buffer,
        };
        self.queue.write_buffer(buffer, 0, bytes);
    }

    fn submit(&mut self, frame: &FrameCommands) -> Result<(), RenderError> {
        self.render_frame(
            frame,
            None::<fn(&wgpu::Device, &wgpu::Queue, &mut wgpu::CommandEncoder, &wgpu::TextureView)>,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::frame::{CompositeUniforms, GizmoUniforms};

    fn gizmo() -> DrawUniforms {
        DrawUniforms::Gizmo(GizmoUniforms {
            model: [[0.0; 4]; 4],
            view: [[0.0; 4]; 4],
            proj: [[0.0; 4]; 4],
            color: [1.0, 1.0, 1.0],
            _padding: 0.0,
        })
    }

    fn composite() -> DrawUniforms {
        DrawUniforms::Composite(CompositeUniforms {
            is_depth: 0,
            near: 0.1,
            far: 100.0,
            _padding: 0.0,
        })
    }

    #[test]
    fn test_capacity_rounds_each_uniform_up_to_alignment() {
        assert_eq!(draw_uniform_capacity(1, 256), 256);
        assert_eq!(draw_uniform_capacity(18, 64), 18 * 256);
        assert_eq!(draw_uniform_capacity(3, 16), 3 * 208);
        assert_eq!(draw_uniform_capacity(0, 256), 256);
    }

    #[test]
    fn test_seventeen_gizmos_and_a_composite_fit() {
        for alignment in [16, 64, 256] {
            let uniforms: Vec<DrawUniforms> = std::iter::repeat_with(gizmo)
                .take(17)
                .chain(std::iter::once(composite()))
                .collect();

            let mut staging = AlignedBuffer::new(draw_uniform_capacity(uniforms.len(), alignment));
            staging.acquire();
            for draw in &uniforms {
                let offset = staging.push_aligned(draw.bytes(), alignment);
                assert_eq!(offset % alignment, 0);
            }
            let written = staging.release().len();
            assert!(written <= staging.capacity());
        }
    }
}
