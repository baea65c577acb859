use crate::{data_structures::texture::Texture, pipelines::basic};

/**
 * Full-screen equirectangular background. Drawn first inside the scene pass; it
 * neither tests nor writes depth so the meshes always end up in front of it.
 */
pub fn mk_background_pipeline(
    device: &wgpu::Device,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
    environment_bind_group_layout: &wgpu::BindGroupLayout,
    sample_count: u32,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Background Pipeline Layout"),
        bind_group_layouts: &[camera_bind_group_layout, environment_bind_group_layout],
        push_constant_ranges: &[],
    });

    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Background Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("background.wgsl").into()),
    };

    basic::mk_render_pipeline(
        device,
        "Background Pipeline",
        &layout,
        &basic::scene_targets(),
        Some(wgpu::DepthStencilState {
            format: Texture::DEPTH_FORMAT,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        None,
        sample_count,
        &[],
        shader,
        ("vs_main", "fs_main"),
    )
}
