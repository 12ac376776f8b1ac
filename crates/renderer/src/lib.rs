//! Compute-shader frame pipeline for computequad.
//!
//! A compute program writes every pixel of a storage image, then a draw pass
//! samples that image onto a screen-filling quad. The overall flow is:
//!
//! ```text
//!   CLI / computequad
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ prepare_programs (CPU: load, compile, contract)
//!          │
//!          ▼
//!   RenderLoop ──▶ winit event loop ──▶ per frame:
//!       FrameClock::tick ─▶ compute dispatch ─▶ barrier ─▶ quad draw ─▶ present
//! ```
//!
//! Everything that can fail without a GPU (reading shader files, GLSL
//! compilation, binding checks) runs before the window opens, so start-up
//! errors surface before any device exists. `GpuState` owns every GPU
//! resource and is torn down before the window closes.

pub mod clock;
pub mod compile;
pub mod contract;
pub mod dispatch;
mod error;
mod gpu;
pub mod ledger;
pub mod lifecycle;
pub mod mesh;
pub mod runtime;
mod types;
mod window;

use anyhow::{Context, Result};
use tracing::info;

pub use clock::{FrameClock, FrameTick};
pub use compile::{ShaderProgramBuilder, ShaderSource, ShaderStageKind};
pub use contract::{prepare_programs, PreparedPrograms};
pub use dispatch::{DispatchGrid, WorkgroupError, WorkgroupSize};
pub use error::StartupError;
pub use ledger::{ResourceKind, ResourceLedger};
pub use lifecycle::CloseReason;
pub use mesh::{MeshData, MeshError, VertexFormat};
pub use types::{
    GpuPowerPreference, ImageSizing, RendererConfig, RunLimits, ShaderPaths, VsyncMode,
};
pub use window::RunSummary;

/// High-level entry point that owns the chosen configuration.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Compiles the shaders, opens the window and runs until it closes.
    ///
    /// Start-up failures are returned as a [`StartupError`] inside the
    /// `anyhow::Error`, so callers can `downcast_ref` to report the phase.
    pub fn run(&mut self) -> Result<RunSummary> {
        let programs = prepare_programs(&self.config.shaders, self.config.workgroup)?;
        info!(
            vertex = %self.config.shaders.vertex.display(),
            fragment = %self.config.shaders.fragment.display(),
            compute = %self.config.shaders.compute.display(),
            "shaders compiled"
        );

        window::run_window(&self.config, programs, ResourceLedger::new())
            .context("render loop failed")
    }
}

/// Loads and compiles every configured shader without touching the GPU.
pub fn check_shaders(config: &RendererConfig) -> Result<PreparedPrograms, StartupError> {
    prepare_programs(&config.shaders, config.workgroup)
}
