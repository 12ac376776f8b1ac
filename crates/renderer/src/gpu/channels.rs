use std::path::Path;

use image::imageops::flip_vertical_in_place;
use image::RgbaImage;
use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::error::StartupError;
use crate::ledger::{LedgerEntry, ResourceKind, ResourceLedger};

use super::image::check_extent;

/// Optional input texture sampled by the compute program (`channel0`).
pub(crate) struct ChannelTexture {
    _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub resolution: (u32, u32),
    _ledger: LedgerEntry,
}

impl ChannelTexture {
    /// Uses the decoded image at `path`, or a 1x1 white texel when no image is configured.
    pub(crate) fn for_source(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        ledger: &ResourceLedger,
        path: Option<&Path>,
        max_dimension: u32,
    ) -> Result<Self, StartupError> {
        match path {
            Some(path) => {
                let rgba = decode_channel_image(path, max_dimension)?;
                tracing::debug!(
                    path = %path.display(),
                    width = rgba.width(),
                    height = rgba.height(),
                    "loaded channel texture"
                );
                Ok(Self::upload(device, queue, ledger, "channel0 texture", &rgba))
            }
            None => {
                let placeholder = RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
                Ok(Self::upload(
                    device,
                    queue,
                    ledger,
                    "placeholder channel0 texture",
                    &placeholder,
                ))
            }
        }
    }

    fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        ledger: &ResourceLedger,
        label: &str,
        rgba: &RgbaImage,
    ) -> Self {
        let (width, height) = rgba.dimensions();
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            rgba.as_raw(),
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("channel0 sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            _texture: texture,
            view,
            sampler,
            resolution: (width, height),
            _ledger: ledger.acquire(ResourceKind::Texture, label),
        }
    }
}

/// Decodes an image file into bottom-up RGBA8 rows no larger than `max_dimension` per axis.
pub(crate) fn decode_channel_image(
    path: &Path,
    max_dimension: u32,
) -> Result<RgbaImage, StartupError> {
    let decode_error = |reason: String| StartupError::ImageDecode {
        path: path.to_path_buf(),
        reason,
    };
    let decoded = image::open(path).map_err(|err| decode_error(err.to_string()))?;
    check_extent(
        "channel image",
        (decoded.width(), decoded.height()),
        max_dimension,
    )
    .map_err(decode_error)?;
    let mut rgba = decoded.to_rgba8();
    flip_vertical_in_place(&mut rgba);
    Ok(rgba)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_DIMENSION: u32 = 8192;

    #[test]
    fn decoded_rows_are_flipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gradient.png");
        let mut source = RgbaImage::new(1, 2);
        source.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        source.put_pixel(0, 1, image::Rgba([0, 0, 255, 255]));
        source.save(&path).expect("save png");

        let decoded = decode_channel_image(&path, MAX_DIMENSION).expect("decode");
        assert_eq!(decoded.dimensions(), (1, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(decoded.get_pixel(0, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn undecodable_file_reports_image_decode() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("noise.png");
        std::fs::write(&path, b"definitely not a png").expect("write");

        let err = decode_channel_image(&path, MAX_DIMENSION).expect_err("decode failure");
        match err {
            StartupError::ImageDecode { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_reports_image_decode() {
        let err = decode_channel_image(Path::new("/nonexistent/channel.png"), MAX_DIMENSION)
            .expect_err("missing");
        assert_eq!(err.phase(), "material setup");
    }

    #[test]
    fn oversized_image_is_rejected_before_upload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("wide.png");
        RgbaImage::new(4, 1).save(&path).expect("save png");

        let err = decode_channel_image(&path, 2).expect_err("too wide");
        match err {
            StartupError::ImageDecode {
                path: reported,
                reason,
            } => {
                assert_eq!(reported, path);
                assert!(reason.contains("4x1"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
