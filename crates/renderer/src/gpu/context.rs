use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::error::StartupError;
use crate::types::{GpuPowerPreference, VsyncMode};

use super::image::check_extent;

/// Instance, device and configured surface for one window.
pub(crate) struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub surface_format: wgpu::TextureFormat,
    _instance: wgpu::Instance,
}

impl GpuContext {
    /// Creates the surface for `target` and a device able to drive it.
    ///
    /// The surface is created from raw handles, so callers must keep `target`
    /// alive for as long as the context exists.
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        gpu_power: GpuPowerPreference,
        vsync_mode: VsyncMode,
    ) -> Result<Self, StartupError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let init_error = |what: &str, err: &dyn std::fmt::Display| {
            StartupError::ResourceInit(format!("{what}: {err}"))
        };

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let window_handle = target
            .window_handle()
            .map_err(|err| init_error("failed to acquire window handle", &err))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| init_error("failed to acquire display handle", &err))?;

        // SAFETY: the window behind these handles is owned by the render loop
        // and dropped only after this context.
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .map_err(|err| init_error("failed to create rendering surface", &err))?;

        let power_preference = match gpu_power {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        };
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|err| init_error("failed to find a suitable GPU adapter", &err))?;

        let adapter_info = adapter.get_info();
        let limits = adapter.limits();
        tracing::debug!(
            name = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            "selected GPU adapter"
        );

        let rgba32f = adapter.get_texture_format_features(wgpu::TextureFormat::Rgba32Float);
        if !rgba32f
            .allowed_usages
            .contains(wgpu::TextureUsages::STORAGE_BINDING)
        {
            return Err(StartupError::ResourceInit(
                "adapter cannot use Rgba32Float as a storage image".to_string(),
            ));
        }

        let width = initial_size.width.max(1);
        let height = initial_size.height.max(1);
        check_extent("surface", (width, height), limits.max_texture_dimension_2d)
            .map_err(StartupError::ResourceInit)?;

        let surface_caps = surface.get_capabilities(&adapter);
        let Some(&first_format) = surface_caps.formats.first() else {
            return Err(StartupError::ResourceInit(
                "surface reports no supported formats for this adapter".to_string(),
            ));
        };
        // The compute program writes display-ready values; avoid a second encode.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .unwrap_or_else(|| {
                tracing::warn!(
                    fallback = ?first_format,
                    "no linear (non-sRGB) surface format available"
                );
                first_format
            });

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("computequad device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))
        .map_err(|err| init_error("failed to create GPU device", &err))?;

        let present_mode = select_present_mode(&surface_caps.present_modes, vsync_mode);
        tracing::debug!(?present_mode, ?vsync_mode, "using present mode");

        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            surface_format,
            _instance: instance,
        })
    }

    /// Reconfigures the swapchain. Zero-sized requests (minimised windows) are ignored.
    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) -> bool {
        if new_size.width == 0 || new_size.height == 0 {
            return false;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        true
    }

    /// Re-applies the current configuration after the surface was lost or outdated.
    pub(crate) fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }

    pub(crate) fn surface_extent(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }
}

fn select_present_mode(modes: &[wgpu::PresentMode], vsync_mode: VsyncMode) -> wgpu::PresentMode {
    let supports = |mode: wgpu::PresentMode| modes.contains(&mode);
    match vsync_mode {
        VsyncMode::On => wgpu::PresentMode::Fifo,
        VsyncMode::Off => [wgpu::PresentMode::Immediate, wgpu::PresentMode::Mailbox]
            .into_iter()
            .find(|mode| supports(*mode))
            .unwrap_or(wgpu::PresentMode::Fifo),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vsync_off_prefers_immediate_then_mailbox() {
        use wgpu::PresentMode::*;
        assert_eq!(select_present_mode(&[Fifo, Mailbox, Immediate], VsyncMode::Off), Immediate);
        assert_eq!(select_present_mode(&[Fifo, Mailbox], VsyncMode::Off), Mailbox);
        assert_eq!(select_present_mode(&[Fifo], VsyncMode::Off), Fifo);
        assert_eq!(select_present_mode(&[Fifo, Immediate], VsyncMode::On), Fifo);
    }
}
