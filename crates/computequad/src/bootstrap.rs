use std::path::PathBuf;

use anyhow::{Context, Result};
use quadconfig::{ImageSize, PowerSetting, QuadConfig};
use renderer::{GpuPowerPreference, ImageSizing, RendererConfig, VsyncMode, WorkgroupSize};
use tracing::debug;

use crate::cli::Args;
use crate::paths::AppPaths;

/// Picks the configuration file: `--config` wins, then the user config file
/// when it exists. `None` means built-in defaults.
pub fn locate_config(args: &Args, paths: Option<&AppPaths>) -> Option<PathBuf> {
    if let Some(path) = &args.config {
        return Some(path.clone());
    }
    let candidate = paths?.config_file();
    if candidate.is_file() {
        Some(candidate)
    } else {
        debug!(path = %candidate.display(), "no user config file; using defaults");
        None
    }
}

pub fn load_config(path: &std::path::Path) -> Result<QuadConfig> {
    QuadConfig::load(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

/// Layers built-in defaults, the config file and CLI flags, in that order.
pub fn build_renderer_config(file: Option<&QuadConfig>, args: &Args) -> Result<RendererConfig> {
    let mut config = RendererConfig::default();
    if let Some(file) = file {
        apply_file(&mut config, file)?;
    }
    apply_args(&mut config, args);
    Ok(config)
}

fn apply_file(config: &mut RendererConfig, file: &QuadConfig) -> Result<()> {
    if let Some(title) = &file.window.title {
        config.title = title.clone();
    }
    if let Some(size) = file.window.size {
        config.surface_size = size;
    }
    if let Some(vsync) = file.window.vsync {
        config.vsync = if vsync { VsyncMode::On } else { VsyncMode::Off };
    }
    if let Some(power) = file.window.power {
        config.gpu_power = map_power(power);
    }
    if let Some(size) = file.image.size {
        config.image_sizing = map_image_size(size);
    }
    if let Some((x, y)) = file.image.workgroup {
        config.workgroup =
            WorkgroupSize::new(x, y).context("invalid image.workgroup in configuration")?;
    }
    if let Some(path) = &file.shaders.vertex {
        config.shaders.vertex = path.clone();
    }
    if let Some(path) = &file.shaders.fragment {
        config.shaders.fragment = path.clone();
    }
    if let Some(path) = &file.shaders.compute {
        config.shaders.compute = path.clone();
    }
    if let Some(path) = &file.shaders.channel {
        config.channel = Some(path.clone());
    }
    if let Some(frames) = file.run.frames {
        config.limits.frames = Some(frames);
    }
    if let Some(duration) = file.run.duration {
        config.limits.duration = Some(duration);
    }
    if let Some(step) = file.run.fixed_step {
        config.fixed_step = Some(step);
    }
    Ok(())
}

fn apply_args(config: &mut RendererConfig, args: &Args) {
    if let Some(title) = &args.title {
        config.title = title.clone();
    }
    if let Some(size) = args.size {
        config.surface_size = size;
    }
    if let Some(size) = args.image_size {
        config.image_sizing = map_image_size(size);
    }
    if let Some(workgroup) = args.workgroup {
        config.workgroup = workgroup;
    }
    if let Some(path) = &args.vertex {
        config.shaders.vertex = path.clone();
    }
    if let Some(path) = &args.fragment {
        config.shaders.fragment = path.clone();
    }
    if let Some(path) = &args.compute {
        config.shaders.compute = path.clone();
    }
    if let Some(path) = &args.channel {
        config.channel = Some(path.clone());
    }
    if let Some(frames) = args.frames {
        config.limits.frames = Some(frames);
    }
    if let Some(duration) = args.duration {
        config.limits.duration = Some(duration);
    }
    if let Some(step) = args.fixed_step {
        config.fixed_step = Some(step);
    }
    if args.no_vsync {
        config.vsync = VsyncMode::Off;
    }
    if let Some(power) = args.power {
        config.gpu_power = map_power(power);
    }
}

fn map_power(power: PowerSetting) -> GpuPowerPreference {
    match power {
        PowerSetting::Low => GpuPowerPreference::Low,
        PowerSetting::High => GpuPowerPreference::High,
    }
}

fn map_image_size(size: ImageSize) -> ImageSizing {
    match size {
        ImageSize::Follow => ImageSizing::FollowSurface,
        ImageSize::Fixed(width, height) => ImageSizing::Fixed { width, height },
    }
}
