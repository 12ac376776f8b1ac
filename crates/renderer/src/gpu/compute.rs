use crate::contract::{CHANNEL_SAMPLER_BINDING, CHANNEL_TEXTURE_BINDING, FRAME_PARAMS_BINDING};
use crate::dispatch::DispatchGrid;
use crate::ledger::{LedgerEntry, ResourceKind, ResourceLedger};

use super::channels::ChannelTexture;
use super::image::{PendingWrite, StorageTarget};
use super::program::ComputeProgram;
use super::uniforms::FrameUniforms;

/// Compute program plus the per-frame inputs it reads.
pub(crate) struct ComputeImagePipeline {
    program: ComputeProgram,
    uniform_buffer: wgpu::Buffer,
    channel: ChannelTexture,
    _uniform_ledger: LedgerEntry,
}

impl ComputeImagePipeline {
    pub(crate) fn new(
        device: &wgpu::Device,
        ledger: &ResourceLedger,
        program: ComputeProgram,
        channel: ChannelTexture,
    ) -> Self {
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame params"),
            size: FrameUniforms::size(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        tracing::debug!(
            workgroup = %program.workgroup,
            channel_width = channel.resolution.0,
            channel_height = channel.resolution.1,
            "compute pipeline ready"
        );
        Self {
            program,
            uniform_buffer,
            channel,
            _uniform_ledger: ledger.acquire(ResourceKind::UniformBuffer, "frame params"),
        }
    }

    /// Writes the frame uniforms and records one compute pass covering the
    /// whole target. The returned token must pass through `barrier` before
    /// the image can be sampled.
    pub(crate) fn dispatch<'a>(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: StorageTarget<'a>,
        time: f64,
        frame: u64,
    ) -> PendingWrite<'a> {
        let (width, height) = target.size();
        let grid = DispatchGrid::for_image(width, height, self.program.workgroup);

        let uniforms = FrameUniforms::new(time, frame, (width, height));
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("compute bind group"),
            layout: &self.program.layout,
            entries: &[
                target.entry(),
                wgpu::BindGroupEntry {
                    binding: FRAME_PARAMS_BINDING,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: CHANNEL_TEXTURE_BINDING,
                    resource: wgpu::BindingResource::TextureView(&self.channel.view),
                },
                wgpu::BindGroupEntry {
                    binding: CHANNEL_SAMPLER_BINDING,
                    resource: wgpu::BindingResource::Sampler(&self.channel.sampler),
                },
            ],
        });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("screen image compute pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.program.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(grid.x, grid.y, grid.z);
        }

        tracing::trace!(
            slot = target.slot(),
            grid_x = grid.x,
            grid_y = grid.y,
            frame,
            "dispatched compute pass"
        );
        target.into_pending()
    }
}
