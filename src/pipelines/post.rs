//! Full-screen passes of the effect chain.
//!
//! Every pass reads up to two textures (the image so far and an auxiliary input such as
//! the selection mask or the blurred bloom) and writes one target. They all share one
//! bind group layout: a small uniform, the two textures and a sampler.

use wgpu::util::DeviceExt;

use crate::{data_structures::texture::{Texture, create_clamped_sampler}, pipelines::basic};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Program {
    /// Bright, selected pixels of the input.
    Bright,
    /// Separable gaussian, direction from the uniform.
    Blur,
    BloomComposite,
    Outline,
    ChromaticAberration,
    /// Exposure, tone mapping and output encoding into the surface.
    ToneMap,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PostUniform {
    /// Meaning depends on the program.
    pub params: [f32; 4],
    pub color: [f32; 4],
    /// Size of one texel in uv, then the blur direction.
    pub texel: [f32; 4],
}

impl PostUniform {
    pub fn new(size: [u32; 2]) -> Self {
        Self {
            texel: [
                1.0 / size[0].max(1) as f32,
                1.0 / size[1].max(1) as f32,
                0.0,
                0.0,
            ],
            ..Default::default()
        }
    }
}

pub struct PostPipelines {
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    bright: wgpu::RenderPipeline,
    blur: wgpu::RenderPipeline,
    bloom_composite: wgpu::RenderPipeline,
    outline: wgpu::RenderPipeline,
    chromatic: wgpu::RenderPipeline,
    tone_map: wgpu::RenderPipeline,
    // one uniform buffer per pass recorded in a frame
    uniforms: Vec<wgpu::Buffer>,
}

impl std::fmt::Debug for PostPipelines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostPipelines")
            .field("uniforms", &self.uniforms.len())
            .finish()
    }
}

fn post_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    };
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
            texture(1),
            texture(2),
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("post_bind_group_layout"),
    })
}

impl PostPipelines {
    pub fn new(device: &wgpu::Device, output_format: wgpu::TextureFormat) -> Self {
        let layout = post_layout(device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Post Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let make = |fs_entry: &str, format: wgpu::TextureFormat| {
            let shader = wgpu::ShaderModuleDescriptor {
                label: Some("Post Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("post.wgsl").into()),
            };
            basic::mk_render_pipeline(
                device,
                fs_entry,
                &pipeline_layout,
                &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                None,
                None,
                1,
                &[],
                shader,
                ("vs_fullscreen", fs_entry),
            )
        };

        Self {
            bright: make("fs_bright", Texture::HDR_FORMAT),
            blur: make("fs_blur", Texture::HDR_FORMAT),
            bloom_composite: make("fs_bloom_composite", Texture::HDR_FORMAT),
            outline: make("fs_outline", Texture::HDR_FORMAT),
            chromatic: make("fs_chromatic", Texture::HDR_FORMAT),
            tone_map: make("fs_tonemap", output_format),
            sampler: create_clamped_sampler(device, 1),
            layout,
            uniforms: Vec::new(),
        }
    }

    fn pipeline(&self, program: Program) -> &wgpu::RenderPipeline {
        match program {
            Program::Bright => &self.bright,
            Program::Blur => &self.blur,
            Program::BloomComposite => &self.bloom_composite,
            Program::Outline => &self.outline,
            Program::ChromaticAberration => &self.chromatic,
            Program::ToneMap => &self.tone_map,
        }
    }

    fn uniform_buffer(&mut self, device: &wgpu::Device, slot: usize) -> &wgpu::Buffer {
        while self.uniforms.len() <= slot {
            self.uniforms
                .push(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Post Uniform Buffer"),
                    contents: bytemuck::cast_slice(&[PostUniform::default()]),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                }));
        }
        &self.uniforms[slot]
    }

    /**
     * Records one full-screen pass. `slot` must be unique among the passes of a frame
     * since all uniform writes land before the frame's command buffer runs.
     */
    #[allow(clippy::too_many_arguments)]
    pub fn pass(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        slot: usize,
        program: Program,
        uniform: PostUniform,
        input: &wgpu::TextureView,
        aux: &wgpu::TextureView,
        output: &wgpu::TextureView,
        load: wgpu::LoadOp<wgpu::Color>,
    ) {
        let buffer = self.uniform_buffer(device, slot);
        queue.write_buffer(buffer, 0, bytemuck::cast_slice(&[uniform]));
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniforms[slot].as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(input),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(aux),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
            label: Some("post_bind_group"),
        });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Post Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_pipeline(self.pipeline(program));
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}
