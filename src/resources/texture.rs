use anyhow::Context;

use crate::data_structures::texture::{EnvironmentMapping, EnvironmentTexture};

/// Material uniform, base color map and its sampler.
pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("material_bind_group_layout"),
    })
}

/// Equirectangular environment texture and sampler, used for lighting and the background.
pub fn environment_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("environment_bind_group_layout"),
    })
}

#[cfg(target_arch = "wasm32")]
fn format_url(root: &str, file_name: &str) -> anyhow::Result<reqwest::Url> {
    let base = if root.is_empty() {
        let window = web_sys::window().context("no window")?;
        let origin = window
            .location()
            .origin()
            .map_err(|_| anyhow::anyhow!("page has no origin"))?;
        format!("{origin}/assets/")
    } else {
        format!("{}/", root.trim_end_matches('/'))
    };
    let base = reqwest::Url::parse(&base)?;
    Ok(base.join(file_name)?)
}

/// Reads `file_name` below `root`: from disk natively, over HTTP on the web.
pub async fn load_binary(root: &str, file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(root, file_name)?;
        let response = reqwest::get(url.clone()).await?.error_for_status()?;
        response
            .bytes()
            .await
            .with_context(|| format!("reading {url}"))?
            .to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = std::path::Path::new(root).join(file_name);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?
    };

    Ok(data)
}

/// Decodes a Radiance `.hdr` image into a linear RGB environment.
pub fn decode_environment(
    bytes: &[u8],
    name: &str,
    mapping: EnvironmentMapping,
) -> anyhow::Result<EnvironmentTexture> {
    let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Hdr)
        .with_context(|| format!("decoding {name}"))?
        .into_rgb32f();
    Ok(EnvironmentTexture {
        name: name.to_string(),
        mapping,
        image,
    })
}
