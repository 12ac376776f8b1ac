//! The compute-written screen image and its hazard tokens.
//!
//! Within one frame the image moves through three states, each represented
//! by a borrow of the image:
//!
//! ```text
//!   &mut ScreenImage ──bind_as_storage_target──▶ StorageTarget
//!        StorageTarget ──ComputeImagePipeline::dispatch──▶ PendingWrite
//!        PendingWrite ──barrier──▶ SampledImage ──bind_as_sample_source──▶ BindGroup
//! ```
//!
//! `SampledImage` has no public constructor, so the display pass cannot bind
//! the image for reading until the compute pass that wrote it has ended.

use crate::ledger::{LedgerEntry, ResourceKind, ResourceLedger};

use super::program::DisplayProgram;

pub(crate) const SCREEN_IMAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Rejects a 2D extent larger than the device's `max_texture_dimension_2d`.
pub(crate) fn check_extent(
    what: &str,
    (width, height): (u32, u32),
    max_dimension: u32,
) -> Result<(), String> {
    if width > max_dimension || height > max_dimension {
        return Err(format!(
            "{what} is {width}x{height} but the GPU max texture dimension is {max_dimension}"
        ));
    }
    Ok(())
}

pub(crate) struct ScreenImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    width: u32,
    height: u32,
    _ledger: LedgerEntry,
}

impl ScreenImage {
    /// Allocates a single-level `Rgba32Float` image usable as both storage and sampled texture.
    pub(crate) fn create(
        device: &wgpu::Device,
        ledger: &ResourceLedger,
        width: u32,
        height: u32,
    ) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("screen image"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SCREEN_IMAGE_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("screen image sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        tracing::debug!(width, height, format = ?SCREEN_IMAGE_FORMAT, "created screen image");

        Self {
            texture,
            view,
            sampler,
            width,
            height,
            _ledger: ledger.acquire(ResourceKind::ScreenImage, "screen image"),
        }
    }

    pub(crate) fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Exclusive write intent for the compute pass.
    pub(crate) fn bind_as_storage_target(&mut self, slot: u32) -> StorageTarget<'_> {
        StorageTarget { image: self, slot }
    }

    pub(crate) fn destroy(self) {
        self.texture.destroy();
    }
}

/// Write-only binding of the screen image at a compute slot.
pub(crate) struct StorageTarget<'a> {
    image: &'a mut ScreenImage,
    slot: u32,
}

impl<'a> StorageTarget<'a> {
    pub(crate) fn slot(&self) -> u32 {
        self.slot
    }

    pub(crate) fn size(&self) -> (u32, u32) {
        self.image.size()
    }

    pub(crate) fn entry(&self) -> wgpu::BindGroupEntry<'_> {
        wgpu::BindGroupEntry {
            binding: self.slot,
            resource: wgpu::BindingResource::TextureView(&self.image.view),
        }
    }

    /// Marks the compute pass as recorded. Only the dispatch path calls this.
    pub(super) fn into_pending(self) -> PendingWrite<'a> {
        PendingWrite { image: self.image }
    }
}

/// The image has been written by a recorded compute pass that has ended.
#[must_use = "the image cannot be sampled until the write passes through `barrier`"]
pub(crate) struct PendingWrite<'a> {
    image: &'a ScreenImage,
}

impl<'a> PendingWrite<'a> {
    /// Orders the compute write before any later sampling of the image.
    ///
    /// Commands in one encoder execute in recording order and `wgpu` inserts
    /// the storage-to-sampled transition when the next pass binds the view,
    /// so the remaining work is marking the hand-off in the command stream.
    pub(crate) fn barrier(self, encoder: &mut wgpu::CommandEncoder) -> SampledImage<'a> {
        encoder.insert_debug_marker("screen image: compute write -> sampled read");
        SampledImage { image: self.image }
    }
}

/// Read-only view of the image, obtainable only after [`PendingWrite::barrier`].
pub(crate) struct SampledImage<'a> {
    image: &'a ScreenImage,
}

impl SampledImage<'_> {
    /// Builds the display bind group exposing the image at `unit` and its sampler at `unit + 1`.
    pub(crate) fn bind_as_sample_source(
        &self,
        device: &wgpu::Device,
        program: &DisplayProgram,
        unit: u32,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("screen image sample bind group"),
            layout: &program.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: unit,
                    resource: wgpu::BindingResource::TextureView(&self.image.view),
                },
                wgpu::BindGroupEntry {
                    binding: unit + 1,
                    resource: wgpu::BindingResource::Sampler(&self.image.sampler),
                },
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_within_limit_is_accepted() {
        assert_eq!(check_extent("screen image", (8192, 8192), 8192), Ok(()));
        assert_eq!(check_extent("screen image", (1, 1), 8192), Ok(()));
    }

    #[test]
    fn oversized_extent_names_size_and_limit() {
        let err = check_extent("screen image", (20000, 20000), 8192).expect_err("too large");
        assert!(err.contains("20000x20000"), "{err}");
        assert!(err.contains("8192"), "{err}");
        assert!(check_extent("channel image", (16, 9000), 8192).is_err());
    }
}
