//! Shader modules, bind group layouts and per-binding pipelines
//!
//! Every program kind has a fixed pipeline layout. A render pipeline is built
//! lazily for each [`VertexBinding`] the first time it is drawn, since the
//! binding decides the vertex buffer layout.

use std::{collections::HashMap, num::NonZeroU64, sync::Arc};

use wgpu::*;

use crate::{
    error::RenderError,
    gfx::{
        binding::{BindingId, VertexBinding},
        frame::{CompositeUniforms, GizmoUniforms},
        framebuffer::{COLOR_FORMAT, DEPTH_FORMAT},
        parameters::{GLOBALS_BINDING_SIZE, LOCALS_BLOCK_SIZE},
        resources::program::{Program, ProgramId, ProgramKind},
    },
};

/// Render state of one program kind
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub label: String,
    pub color_targets: Vec<Option<ColorTargetState>>,
    pub depth_stencil: Option<DepthStencilState>,
    pub cull_mode: Option<Face>,
}

impl PipelineConfig {
    /// Three G-buffer outputs plus depth
    pub fn offscreen(label: &str, depth_test: bool) -> Self {
        let target = Some(ColorTargetState {
            format: COLOR_FORMAT,
            blend: Some(BlendState::REPLACE),
            write_mask: ColorWrites::ALL,
        });

        Self {
            label: label.to_string(),
            color_targets: vec![target.clone(), target.clone(), target],
            depth_stencil: Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: depth_test,
                depth_compare: if depth_test {
                    CompareFunction::Less
                } else {
                    CompareFunction::Always
                },
                stencil: StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            cull_mode: Some(Face::Back),
        }
    }

    /// One output in the surface format, no depth
    pub fn screen(label: &str, format: TextureFormat) -> Self {
        Self {
            label: label.to_string(),
            color_targets: vec![Some(ColorTargetState {
                format,
                blend: Some(BlendState::REPLACE),
                write_mask: ColorWrites::ALL,
            })],
            depth_stencil: None,
            cull_mode: None,
        }
    }

    pub fn with_cull_mode(mut self, face: Option<Face>) -> Self {
        self.cull_mode = face;
        self
    }
}

fn uniform_entry(binding: u32, size: u64) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::VERTEX_FRAGMENT,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: true,
            min_binding_size: NonZeroU64::new(size),
        },
        count: None,
    }
}

fn texture_entry(binding: u32, sample_type: TextureSampleType) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Texture {
            sample_type,
            view_dimension: TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

pub const GIZMO_UNIFORMS_SIZE: u64 = std::mem::size_of::<GizmoUniforms>() as u64;
pub const COMPOSITE_UNIFORMS_SIZE: u64 = std::mem::size_of::<CompositeUniforms>() as u64;

const UNFILTERABLE: TextureSampleType = TextureSampleType::Float { filterable: false };

/// Bind group layouts shared by all pipelines
pub struct BindGroupLayouts {
    pub globals: BindGroupLayout,
    pub locals: BindGroupLayout,
    pub gizmo: BindGroupLayout,
    pub composite: BindGroupLayout,
    pub albedo: BindGroupLayout,
    pub gbuffer_inputs: BindGroupLayout,
    pub composite_source: BindGroupLayout,
}

impl BindGroupLayouts {
    pub fn new(device: &Device) -> Self {
        let uniform = |label: &str, size: u64| {
            device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &[uniform_entry(0, size)],
            })
        };

        Self {
            globals: uniform("globals layout", GLOBALS_BINDING_SIZE),
            locals: uniform("locals layout", LOCALS_BLOCK_SIZE),
            gizmo: uniform("gizmo uniforms layout", GIZMO_UNIFORMS_SIZE),
            composite: uniform("composite uniforms layout", COMPOSITE_UNIFORMS_SIZE),
            albedo: device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("albedo layout"),
                entries: &[
                    texture_entry(0, TextureSampleType::Float { filterable: true }),
                    BindGroupLayoutEntry {
                        binding: 1,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Sampler(SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            }),
            gbuffer_inputs: device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("gbuffer inputs layout"),
                entries: &[
                    texture_entry(0, UNFILTERABLE),
                    texture_entry(1, UNFILTERABLE),
                    texture_entry(2, UNFILTERABLE),
                ],
            }),
            composite_source: device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("composite source layout"),
                entries: &[
                    texture_entry(0, UNFILTERABLE),
                    texture_entry(1, TextureSampleType::Depth),
                ],
            }),
        }
    }

    /// Layouts in group order for a program kind
    pub fn for_kind(&self, kind: ProgramKind) -> Vec<&BindGroupLayout> {
        match kind {
            ProgramKind::Geometry | ProgramKind::ForwardLit => vec![&self.globals, &self.locals, &self.albedo],
            ProgramKind::Gizmo => vec![&self.gizmo],
            ProgramKind::Resolve => vec![&self.globals, &self.gbuffer_inputs],
            ProgramKind::Composite => vec![&self.composite, &self.composite_source],
        }
    }
}

fn vertex_format(component_count: u32) -> Option<VertexFormat> {
    match component_count {
        1 => Some(VertexFormat::Float32),
        2 => Some(VertexFormat::Float32x2),
        3 => Some(VertexFormat::Float32x3),
        4 => Some(VertexFormat::Float32x4),
        _ => None,
    }
}

struct CompiledProgram {
    name: String,
    kind: ProgramKind,
    module: Option<ShaderModule>,
}

/// Compiles programs and builds pipelines on demand
pub struct PipelineCache {
    device: Arc<Device>,
    surface_format: TextureFormat,
    pub layouts: BindGroupLayouts,
    pipeline_layouts: HashMap<ProgramKind, PipelineLayout>,
    programs: HashMap<ProgramId, CompiledProgram>,
    /// `None` marks a binding whose pipeline failed validation
    pipelines: HashMap<BindingId, Option<RenderPipeline>>,
}

impl PipelineCache {
    pub fn new(device: Arc<Device>, surface_format: TextureFormat) -> Self {
        let layouts = BindGroupLayouts::new(&device);
        let pipeline_layouts = ProgramKind::ALL
            .into_iter()
            .map(|kind| {
                let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
                    label: Some(&format!("{} pipeline layout", kind.name())),
                    bind_group_layouts: &layouts.for_kind(kind),
                    push_constant_ranges: &[],
                });
                (kind, layout)
            })
            .collect();

        Self {
            device,
            surface_format,
            layouts,
            pipeline_layouts,
            programs: HashMap::new(),
            pipelines: HashMap::new(),
        }
    }

    /// Compiles `source`, capturing validation errors instead of panicking
    pub fn compile(&mut self, program: &Program, source: &str) -> Result<(), RenderError> {
        self.device.push_error_scope(ErrorFilter::Validation);
        let module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(&program.name),
            source: ShaderSource::Wgsl(source.into()),
        });
        let error = pollster::block_on(self.device.pop_error_scope());

        let (module, result) = match error {
            None => (Some(module), Ok(())),
            Some(error) => (
                None,
                Err(RenderError::ShaderCompilation {
                    program: program.name.clone(),
                    message: error.to_string(),
                }),
            ),
        };

        self.programs.insert(
            program.id,
            CompiledProgram {
                name: program.name.clone(),
                kind: program.kind,
                module,
            },
        );
        result
    }

    /// Kind of a compiled program, `None` if it failed or is unknown
    pub fn usable_kind(&self, id: ProgramId) -> Option<ProgramKind> {
        self.programs
            .get(&id)
            .filter(|program| program.module.is_some())
            .map(|program| program.kind)
    }

    pub fn pipeline(&self, id: BindingId) -> Option<&RenderPipeline> {
        self.pipelines.get(&id).and_then(Option::as_ref)
    }

    /// Builds the pipeline for `binding` unless it was attempted before
    pub fn prepare(&mut self, binding: &VertexBinding, depth_test: bool) {
        if self.pipelines.contains_key(&binding.id) {
            return;
        }
        let pipeline = self.create_pipeline(binding, depth_test);
        self.pipelines.insert(binding.id, pipeline);
    }

    fn create_pipeline(&self, binding: &VertexBinding, depth_test: bool) -> Option<RenderPipeline> {
        let program = self.programs.get(&binding.program)?;
        let module = program.module.as_ref()?;
        let layout = self.pipeline_layouts.get(&program.kind)?;

        let label = format!("{} pipeline {}", program.name, binding.id.0);
        let config = match program.kind {
            ProgramKind::Geometry | ProgramKind::ForwardLit | ProgramKind::Gizmo => {
                PipelineConfig::offscreen(&label, depth_test)
            }
            ProgramKind::Resolve => PipelineConfig::offscreen(&label, depth_test).with_cull_mode(None),
            ProgramKind::Composite => PipelineConfig::screen(&label, self.surface_format),
        };

        let mut attributes = Vec::with_capacity(binding.attributes.len());
        for attribute in &binding.attributes {
            let Some(format) = vertex_format(attribute.component_count) else {
                log::error!(
                    "Binding {:?}: unsupported component count {} at location {}",
                    binding.id,
                    attribute.component_count,
                    attribute.location
                );
                return None;
            };
            attributes.push(VertexAttribute {
                format,
                offset: binding.local_offset(attribute),
                shader_location: attribute.location,
            });
        }

        let vertex_layout = VertexBufferLayout {
            array_stride: binding.stride as BufferAddress,
            step_mode: VertexStepMode::Vertex,
            attributes: &attributes,
        };

        self.device.push_error_scope(ErrorFilter::Validation);
        let pipeline = self.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(&config.label),
            layout: Some(layout),
            vertex: VertexState {
                module,
                entry_point: Some("vs_main"),
                buffers: &[vertex_layout],
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module,
                entry_point: Some("fs_main"),
                targets: &config.color_targets,
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                cull_mode: config.cull_mode,
                polygon_mode: PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: config.depth_stencil.clone(),
            multisample: MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        match pollster::block_on(self.device.pop_error_scope()) {
            None => {
                log::debug!("Created {}", config.label);
                Some(pipeline)
            }
            Some(error) => {
                log::error!("Failed to create {}: {}", config.label, error);
                None
            }
        }
    }
}
