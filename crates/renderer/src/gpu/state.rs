use tracing::{debug, warn};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::contract::{PreparedPrograms, SCREEN_IMAGE_BINDING, SCREEN_TEXTURE_BINDING};
use crate::error::StartupError;
use crate::ledger::ResourceLedger;
use crate::mesh::MeshData;
use crate::types::{ImageSizing, RendererConfig};

use super::channels::ChannelTexture;
use super::compute::ComputeImagePipeline;
use super::context::GpuContext;
use super::image::{check_extent, ScreenImage};
use super::mesh::{MeshBuffers, MeshMaterial};
use super::program::{self, DisplayProgram};

/// Every GPU resource the frame pipeline needs.
///
/// Fields drop in declaration order, so the device and surface in `context`
/// go last.
pub(crate) struct GpuState {
    compute: ComputeImagePipeline,
    display: DisplayProgram,
    mesh: MeshBuffers,
    image: ScreenImage,
    image_sizing: ImageSizing,
    ledger: ResourceLedger,
    context: GpuContext,
}

impl GpuState {
    /// Links already-compiled programs and allocates the mesh, channel and screen image.
    ///
    /// On any error the resources created so far are dropped before returning.
    pub(crate) fn new(
        window: &Window,
        config: &RendererConfig,
        programs: PreparedPrograms,
        ledger: ResourceLedger,
    ) -> Result<Self, StartupError> {
        let inner = window.inner_size();
        let initial_size = if inner.width == 0 || inner.height == 0 {
            PhysicalSize::new(config.surface_size.0, config.surface_size.1)
        } else {
            inner
        };
        let context = GpuContext::new(window, initial_size, config.gpu_power, config.vsync)?;
        let device = &context.device;
        let max_dimension = device.limits().max_texture_dimension_2d;

        let (width, height) = config.image_sizing.resolve(context.surface_extent());
        check_extent("screen image", (width, height), max_dimension)
            .map_err(StartupError::ResourceInit)?;

        let mesh = MeshBuffers::create(device, &ledger, MeshData::fullscreen_quad());
        let display = program::link_display(
            device,
            &ledger,
            &programs.display,
            mesh.format(),
            context.surface_format,
        )?;
        let compute_program =
            program::link_compute(device, &ledger, &programs.compute, config.workgroup)?;
        let channel = ChannelTexture::for_source(
            device,
            &context.queue,
            &ledger,
            config.channel.as_deref(),
            max_dimension,
        )?;
        let compute = ComputeImagePipeline::new(device, &ledger, compute_program, channel);

        let image = ScreenImage::create(device, &ledger, width, height);

        debug!(
            surface_width = context.config.width,
            surface_height = context.config.height,
            image_width = width,
            image_height = height,
            index_count = mesh.index_count(),
            "GPU state ready"
        );

        Ok(Self {
            compute,
            display,
            mesh,
            image,
            image_sizing: config.image_sizing,
            ledger,
            context,
        })
    }

    /// Records and submits one frame: compute dispatch, hand-off, quad draw, present.
    pub(crate) fn render_frame(&mut self, time: f64, frame: u64) -> Result<(), wgpu::SurfaceError> {
        let surface_texture = self.context.surface.get_current_texture()?;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let device = &self.context.device;
        let queue = &self.context.queue;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame encoder"),
        });

        let target = self.image.bind_as_storage_target(SCREEN_IMAGE_BINDING);
        let pending = self
            .compute
            .dispatch(device, queue, &mut encoder, target, time, frame);
        let sampled = pending.barrier(&mut encoder);
        let screen_texture =
            sampled.bind_as_sample_source(device, &self.display, SCREEN_TEXTURE_BINDING);

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("display pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            let material = MeshMaterial {
                texture: &screen_texture,
                program: &self.display,
            };
            self.mesh.bind_and_draw(&mut pass, &material);
        }

        queue.submit(Some(encoder.finish()));
        surface_texture.present();
        Ok(())
    }

    /// Reconfigures the surface and, when the image tracks the window, replaces it.
    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if !self.context.resize(new_size) {
            return;
        }
        if !self.image_sizing.follows_surface() {
            return;
        }
        let (width, height) = self.image_sizing.resolve(self.context.surface_extent());
        if (width, height) == self.image.size() {
            return;
        }
        let max_dimension = self.context.device.limits().max_texture_dimension_2d;
        if let Err(reason) = check_extent("screen image", (width, height), max_dimension) {
            warn!(%reason, "keeping the previous screen image");
            return;
        }
        let replacement = ScreenImage::create(&self.context.device, &self.ledger, width, height);
        std::mem::replace(&mut self.image, replacement).destroy();
        debug!(width, height, "recreated screen image after resize");
    }

    pub(crate) fn reconfigure_surface(&self) {
        self.context.reconfigure();
    }

    /// Releases every resource, waits for the device to go idle and returns
    /// the ledger for a symmetry check.
    pub(crate) fn teardown(self) -> ResourceLedger {
        let GpuState {
            compute,
            display,
            mesh,
            image,
            ledger,
            context,
            ..
        } = self;

        drop(compute);
        drop(display);
        mesh.destroy();
        image.destroy();

        if let Err(err) = context.device.poll(wgpu::PollType::Wait) {
            warn!(error = %err, "device did not become idle during teardown");
        }
        drop(context);
        ledger
    }
}
