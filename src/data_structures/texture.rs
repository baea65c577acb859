//! Environment images and GPU textures.
//!
//! [`EnvironmentTexture`] is the decoded equirectangular HDR image the scene is lit
//! with. [`Texture`] wraps the wgpu objects created from it, from material color
//! maps, and for the offscreen render targets of the postprocessing chain.

use std::borrow::Cow;

use anyhow::*;
use image::{ImageBuffer, Pixel, imageops::FilterType};

use crate::data_structures::model::ColorMap;

/// How an environment texture is projected onto the sphere around the scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvironmentMapping {
    EquirectangularReflection,
    EquirectangularRefraction,
}

/// An equirectangular HDR image in linear RGB.
#[derive(Clone, Debug)]
pub struct EnvironmentTexture {
    pub name: String,
    pub mapping: EnvironmentMapping,
    pub image: image::Rgb32FImage,
}

impl EnvironmentTexture {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// RGBA half floats, row-major, ready for an `Rgba16Float` upload.
    pub fn to_rgba_f16(&self) -> Vec<half::f16> {
        rgba_f16(&self.image)
    }
}

fn rgba_f16(image: &image::Rgb32FImage) -> Vec<half::f16> {
    image
        .pixels()
        .flat_map(|px| {
            [
                half::f16::from_f32(px[0]),
                half::f16::from_f32(px[1]),
                half::f16::from_f32(px[2]),
                half::f16::ONE,
            ]
        })
        .collect()
}

/// Largest size with the same aspect ratio whose sides are at most `max_dimension`.
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension {
        return (width, height);
    }
    let scale = |side: u32| (side as u64 * max_dimension as u64 / longest as u64).max(1) as u32;
    (scale(width), scale(height))
}

/// Returns `image` as is when both sides fit `max_dimension`, a downscaled copy otherwise.
pub fn fit_to_limit<'a, P>(
    image: &'a ImageBuffer<P, Vec<P::Subpixel>>,
    max_dimension: u32,
    label: &str,
) -> Cow<'a, ImageBuffer<P, Vec<P::Subpixel>>>
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
{
    let (width, height) = image.dimensions();
    let (fit_width, fit_height) = fit_within(width, height, max_dimension);
    if (fit_width, fit_height) == (width, height) {
        return Cow::Borrowed(image);
    }
    log::warn!(
        "{label} is {width}x{height}, above the texture limit of {max_dimension}, \
         downscaling to {fit_width}x{fit_height}"
    );
    Cow::Owned(image::imageops::resize(
        image,
        fit_width,
        fit_height,
        FilterType::Triangle,
    ))
}

/// A GPU texture with a view and optional sampler.
#[derive(Clone, Debug)]
pub struct Texture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

impl Texture {
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
    /// Linear HDR format the scene is rendered into before tone mapping.
    pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
    /// Single channel mask of selected objects.
    pub const MASK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

    /// Depth texture for the scene pass. `sample_count` must match the color targets.
    pub fn create_depth_texture(
        device: &wgpu::Device,
        size: [u32; 2],
        sample_count: u32,
        label: &str,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            sampler: None,
        }
    }

    /**
     * Offscreen color target. Single-sampled targets can be sampled by later passes;
     * multisampled ones only serve as resolve sources.
     */
    pub fn create_render_target(
        device: &wgpu::Device,
        size: [u32; 2],
        format: wgpu::TextureFormat,
        sample_count: u32,
        label: &str,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let usage = if sample_count > 1 {
            wgpu::TextureUsages::RENDER_ATTACHMENT
        } else {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = (sample_count == 1).then(|| create_clamped_sampler(device, 1));

        Self {
            texture,
            view,
            sampler,
        }
    }

    /**
     * Uploads the environment as `Rgba16Float`; u wraps around the sphere, v is clamped at the
     * poles. Images larger than the device's 2D texture limit are downscaled first.
     */
    pub fn from_environment(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        environment: &EnvironmentTexture,
    ) -> Self {
        let max_dimension = device.limits().max_texture_dimension_2d;
        let image = fit_to_limit(&environment.image, max_dimension, &environment.name);
        let data = rgba_f16(&image);
        Self::from_hdr_pixels(
            device,
            queue,
            &data,
            [image.width(), image.height()],
            &environment.name,
        )
    }

    /// 1x1 black environment used until the real one has been loaded.
    pub fn placeholder_environment(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let data = [half::f16::ZERO, half::f16::ZERO, half::f16::ZERO, half::f16::ONE];
        Self::from_hdr_pixels(device, queue, &data, [1, 1], "placeholder environment")
    }

    fn from_hdr_pixels(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &[half::f16],
        dimensions: [u32; 2],
        label: &str,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: dimensions[0],
            height: dimensions[1],
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::HDR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let bytes: Vec<u8> = data.iter().flat_map(|h| h.to_le_bytes()).collect();
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            &bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                // four channels of two bytes each
                bytes_per_row: Some(8 * dimensions[0]),
                rows_per_image: Some(dimensions[1]),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("environment sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        }));

        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Uploads a material color map in sRGB with its anisotropy level. Oversized maps are
    /// downscaled to the device's 2D texture limit.
    pub fn from_color_map(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        map: &ColorMap,
        label: &str,
    ) -> Result<Self> {
        if map.image.width() == 0 || map.image.height() == 0 {
            bail!("color map {label} is empty");
        }
        let image = fit_to_limit(
            &*map.image,
            device.limits().max_texture_dimension_2d,
            label,
        );
        let (width, height) = image.dimensions();
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_repeat_sampler(device, map.anisotropy));

        Ok(Self {
            texture,
            view,
            sampler,
        })
    }

    /// 1x1 white texture bound for materials without a color map.
    pub fn white(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let map = ColorMap {
            image: std::sync::Arc::new(image::RgbaImage::from_pixel(
                1,
                1,
                image::Rgba([255, 255, 255, 255]),
            )),
            anisotropy: 1,
        };
        let size = wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("white"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            map.image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_repeat_sampler(device, map.anisotropy));
        Self {
            texture,
            view,
            sampler,
        }
    }
}

/// Linear sampler for full-screen passes. Anisotropy above 1 requires linear filtering everywhere.
pub fn create_clamped_sampler(device: &wgpu::Device, anisotropy: u16) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        anisotropy_clamp: anisotropy.max(1),
        ..Default::default()
    })
}

pub fn create_repeat_sampler(device: &wgpu::Device, anisotropy: u16) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        anisotropy_clamp: anisotropy.max(1),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_within_the_limit_are_kept() {
        assert_eq!(fit_within(2048, 1024, 2048), (2048, 1024));
        assert_eq!(fit_within(1, 1, 2048), (1, 1));
    }

    #[test]
    fn oversized_images_keep_their_aspect_ratio() {
        assert_eq!(fit_within(4096, 2048, 2048), (2048, 1024));
        assert_eq!(fit_within(1000, 3000, 1500), (500, 1500));
        assert_eq!(fit_within(10_000, 2, 2048), (2048, 1));
    }

    #[test]
    fn oversized_environment_is_downscaled_to_the_limit() {
        let image = image::Rgb32FImage::from_pixel(1024, 512, image::Rgb([2.0, 1.0, 0.5]));
        let fitted = fit_to_limit(&image, 512, "sky.hdr");
        assert!(matches!(fitted, Cow::Owned(_)));
        assert_eq!(fitted.dimensions(), (512, 256));
        let px = fitted.get_pixel(256, 128);
        assert!((px[0] - 2.0).abs() < 1e-3);
        assert!((px[2] - 0.5).abs() < 1e-3);
        assert_eq!(rgba_f16(&fitted).len(), 512 * 256 * 4);
    }

    #[test]
    fn color_maps_that_fit_are_not_copied() {
        let image = image::RgbaImage::new(64, 32);
        assert!(matches!(fit_to_limit(&image, 2048, "fabric"), Cow::Borrowed(_)));
    }
}
