//! GPU side of the frame pipeline.
//!
//! - `context` owns the wgpu instance, device and surface and rebuilds the
//!   swapchain when the window resizes.
//! - `program` turns CPU-compiled programs into render and compute pipelines.
//! - `mesh` uploads static vertex/index data and issues the indexed draw.
//! - `image` holds the storage image plus the tokens that order its write
//!   before its read.
//! - `compute` writes the frame uniforms and records the dispatch.
//! - `channels` decodes the optional input image for the compute program.
//! - `state` glues everything together behind `GpuState`, used by `window`.

mod channels;
mod compute;
mod context;
mod image;
mod mesh;
mod program;
mod state;
mod uniforms;

pub(crate) use state::GpuState;
