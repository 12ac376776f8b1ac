use std::path::PathBuf;
use std::time::Duration;

use crate::dispatch::WorkgroupSize;

/// How large the compute-written screen image should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSizing {
    /// Match the window surface and follow it across resizes.
    #[default]
    FollowSurface,
    /// Fixed resolution stretched across the quad regardless of window size.
    Fixed { width: u32, height: u32 },
}

impl ImageSizing {
    /// Resolves the image dimensions for a given surface size.
    pub fn resolve(self, surface: (u32, u32)) -> (u32, u32) {
        match self {
            ImageSizing::FollowSurface => (surface.0.max(1), surface.1.max(1)),
            ImageSizing::Fixed { width, height } => (width.max(1), height.max(1)),
        }
    }

    pub fn follows_surface(self) -> bool {
        matches!(self, ImageSizing::FollowSurface)
    }
}

/// Presentation pacing for the swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VsyncMode {
    /// Present on vertical blank (`Fifo`).
    #[default]
    On,
    /// Prefer `Immediate`, then `Mailbox`, falling back to `Fifo`.
    Off,
}

/// Adapter selection hint forwarded to `wgpu`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    Low,
    #[default]
    High,
}

/// Source files for the three shader stages the harness needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPaths {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
    pub compute: PathBuf,
}

impl Default for ShaderPaths {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from("shaders/quad.vert"),
            fragment: PathBuf::from("shaders/quad.frag"),
            compute: PathBuf::from("shaders/plasma.comp"),
        }
    }
}

/// Optional limits that close the loop without user interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunLimits {
    /// Stop after this many presented frames.
    pub frames: Option<u64>,
    /// Stop after this much wall-clock time.
    pub duration: Option<Duration>,
}

/// Immutable configuration passed to the renderer at start-up.
///
/// `RendererConfig` mirrors the merged CLI flags and config file: which shader
/// files to compile, how large the window and screen image are, and how long
/// the loop should run.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Window title.
    pub title: String,
    /// Initial window size in physical pixels.
    pub surface_size: (u32, u32),
    /// Screen image resolution policy.
    pub image_sizing: ImageSizing,
    /// Compute workgroup dimensions; must match the compute shader's `local_size`.
    pub workgroup: WorkgroupSize,
    /// Vertex, fragment and compute shader sources.
    pub shaders: ShaderPaths,
    /// Optional image decoded into the compute program's input channel.
    pub channel: Option<PathBuf>,
    pub vsync: VsyncMode,
    pub gpu_power: GpuPowerPreference,
    /// Advance shader time by a fixed step per frame instead of wall-clock time.
    pub fixed_step: Option<Duration>,
    pub limits: RunLimits,
}

impl Default for RendererConfig {
    /// Provides a 1280x720 window following the surface size with the bundled shaders.
    fn default() -> Self {
        Self {
            title: "computequad".to_string(),
            surface_size: (1280, 720),
            image_sizing: ImageSizing::default(),
            workgroup: WorkgroupSize::default(),
            shaders: ShaderPaths::default(),
            channel: None,
            vsync: VsyncMode::default(),
            gpu_power: GpuPowerPreference::default(),
            fixed_step: None,
            limits: RunLimits::default(),
        }
    }
}
