use bytemuck::{Pod, Zeroable};

/// CPU mirror of the compute program's `FrameParams` block (std140).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct FrameUniforms {
    pub time: f32,
    pub frame: u32,
    pub resolution: [u32; 2],
}

impl FrameUniforms {
    pub(crate) fn new(time: f64, frame: u64, resolution: (u32, u32)) -> Self {
        Self {
            time: time as f32,
            // Shaders see a wrapping 32-bit counter.
            frame: frame as u32,
            resolution: [resolution.0, resolution.1],
        }
    }

    pub(crate) fn size() -> wgpu::BufferAddress {
        std::mem::size_of::<Self>() as wgpu::BufferAddress
    }
}
