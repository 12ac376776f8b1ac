//! Device-side half of program linking.
//!
//! Pipelines are only created from a [`CompiledProgram`] that already passed
//! the binding contract. Module and pipeline creation run inside a validation
//! error scope so a driver-side rejection becomes a link error instead of an
//! uncaptured panic. Shader modules are dropped once their pipeline exists.

use std::borrow::Cow;

use crate::compile::{CompiledProgram, CompiledStage, ShaderStageKind};
use crate::contract::{
    self, CHANNEL_SAMPLER_BINDING, CHANNEL_TEXTURE_BINDING, FRAME_PARAMS_BINDING,
    SCREEN_IMAGE_BINDING, SCREEN_SAMPLER_BINDING, SCREEN_TEXTURE_BINDING,
};
use crate::dispatch::WorkgroupSize;
use crate::error::StartupError;
use crate::ledger::{LedgerEntry, ResourceKind, ResourceLedger};
use crate::mesh::VertexFormat;

use super::image::SCREEN_IMAGE_FORMAT;

/// Linked vertex+fragment program that samples the screen image.
pub(crate) struct DisplayProgram {
    pub pipeline: wgpu::RenderPipeline,
    pub texture_layout: wgpu::BindGroupLayout,
    _ledger: LedgerEntry,
}

/// Linked compute program that writes the screen image.
pub(crate) struct ComputeProgram {
    pub pipeline: wgpu::ComputePipeline,
    pub layout: wgpu::BindGroupLayout,
    pub workgroup: WorkgroupSize,
    _ledger: LedgerEntry,
}

pub(crate) fn link_display(
    device: &wgpu::Device,
    ledger: &ResourceLedger,
    program: &CompiledProgram,
    mesh_format: VertexFormat,
    surface_format: wgpu::TextureFormat,
) -> Result<DisplayProgram, StartupError> {
    contract::check_display_program(program)?;

    let vertex = program_stage(program, ShaderStageKind::Vertex)?;
    let fragment = program_stage(program, ShaderStageKind::Fragment)?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let vertex_module = create_module(device, program.label(), vertex);
    let fragment_module = create_module(device, program.label(), fragment);

    let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("screen texture layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: SCREEN_TEXTURE_BINDING,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    // Rgba32Float is not filterable without an optional feature.
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: SCREEN_SAMPLER_BINDING,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                count: None,
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("display pipeline layout"),
        bind_group_layouts: &[&texture_layout],
        push_constant_ranges: &[],
    });

    let attributes = mesh_format.attributes();
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(program.label()),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &vertex_module,
            entry_point: Some("main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: mesh_format.stride(),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    });

    finish_scope(device, program)?;
    tracing::debug!(program = program.label(), ?surface_format, "linked display program");

    Ok(DisplayProgram {
        pipeline,
        texture_layout,
        _ledger: ledger.acquire(ResourceKind::ShaderProgram, program.label()),
    })
}

pub(crate) fn link_compute(
    device: &wgpu::Device,
    ledger: &ResourceLedger,
    program: &CompiledProgram,
    workgroup: WorkgroupSize,
) -> Result<ComputeProgram, StartupError> {
    contract::check_compute_program(program, workgroup)?;

    let compute = program_stage(program, ShaderStageKind::Compute)?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let module = create_module(device, program.label(), compute);

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("compute layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: SCREEN_IMAGE_BINDING,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: SCREEN_IMAGE_FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: FRAME_PARAMS_BINDING,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: CHANNEL_TEXTURE_BINDING,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: CHANNEL_SAMPLER_BINDING,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("compute pipeline layout"),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(program.label()),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: Some("main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    });

    finish_scope(device, program)?;
    tracing::debug!(program = program.label(), %workgroup, "linked compute program");

    Ok(ComputeProgram {
        pipeline,
        layout,
        workgroup,
        _ledger: ledger.acquire(ResourceKind::ShaderProgram, program.label()),
    })
}

fn program_stage(
    program: &CompiledProgram,
    stage: ShaderStageKind,
) -> Result<&CompiledStage, StartupError> {
    program
        .stage(stage)
        .ok_or_else(|| program.link_error(format!("missing {stage} stage")))
}

fn create_module(device: &wgpu::Device, label: &str, compiled: &CompiledStage) -> wgpu::ShaderModule {
    let stage = compiled.stage();
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{label} {stage}")),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(compiled.source().text()),
            stage: stage.to_naga(),
            defines: &[],
        },
    })
}

fn finish_scope(device: &wgpu::Device, program: &CompiledProgram) -> Result<(), StartupError> {
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(program.link_error(error.to_string())),
        None => Ok(()),
    }
}
