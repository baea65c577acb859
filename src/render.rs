//! Frame rendering.
//!
//! [`SceneRenderer`] turns a [`Showcase`] into pixels:
//!
//! 1. scene pass: background, then every visible mesh, into an HDR color target and a
//!    selection mask (multisampled when configured, resolved afterwards)
//! 2. the configured effects, ping-ponging between two HDR targets
//! 3. exposure and tone mapping into the surface
//!
//! GPU copies of geometry, materials and textures are created the first time they are
//! drawn and cached by identity.

use std::{
    collections::{HashMap, HashSet},
    iter,
    sync::Arc,
};

use crate::{
    camera::CameraResources,
    config::ToneMapping,
    context::Context,
    data_structures::{
        instance::InstanceRaw,
        model::{GeometryId, GpuGeometry, Material},
        texture::{EnvironmentTexture, Texture},
    },
    pipelines::{
        basic::mk_mesh_pipeline,
        environment::mk_background_pipeline,
        post::{PostPipelines, PostUniform, Program},
    },
    postprocessing::Effect,
    resources::texture::{environment_layout, material_layout},
    showcase::Showcase,
};

struct Targets {
    size: [u32; 2],
    depth: Texture,
    // multisampled attachments, resolved into `hdr[0]` and `mask`
    msaa: Option<(Texture, Texture)>,
    hdr: [Texture; 2],
    mask: Texture,
    bloom: [Texture; 2],
}

impl Targets {
    fn new(device: &wgpu::Device, size: [u32; 2], sample_count: u32) -> Self {
        let msaa = (sample_count > 1).then(|| {
            (
                Texture::create_render_target(
                    device,
                    size,
                    Texture::HDR_FORMAT,
                    sample_count,
                    "msaa color",
                ),
                Texture::create_render_target(
                    device,
                    size,
                    Texture::MASK_FORMAT,
                    sample_count,
                    "msaa mask",
                ),
            )
        });
        let hdr =
            |label| Texture::create_render_target(device, size, Texture::HDR_FORMAT, 1, label);
        Self {
            size,
            depth: Texture::create_depth_texture(device, size, sample_count, "depth_texture"),
            msaa,
            hdr: [hdr("hdr a"), hdr("hdr b")],
            mask: Texture::create_render_target(device, size, Texture::MASK_FORMAT, 1, "mask"),
            bloom: [hdr("bloom a"), hdr("bloom b")],
        }
    }
}

struct MaterialGpu {
    // keeps the cache key's pointer alive
    _material: Arc<Material>,
    _buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct EnvironmentGpu {
    source: Option<Arc<EnvironmentTexture>>,
    bind_group: wgpu::BindGroup,
}

struct Draw {
    geometry: GeometryId,
    material: (usize, bool),
}

pub struct SceneRenderer {
    sample_count: u32,
    camera: CameraResources,
    material_layout: wgpu::BindGroupLayout,
    environment_layout: wgpu::BindGroupLayout,
    mesh_pipeline: wgpu::RenderPipeline,
    background_pipeline: wgpu::RenderPipeline,
    post: PostPipelines,
    targets: Targets,
    white: Texture,
    environment: EnvironmentGpu,
    geometries: HashMap<GeometryId, GpuGeometry>,
    color_maps: HashMap<(usize, u16), (Arc<image::RgbaImage>, Texture)>,
    materials: HashMap<(usize, bool), MaterialGpu>,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
}

impl std::fmt::Debug for SceneRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneRenderer")
            .field("sample_count", &self.sample_count)
            .field("geometries", &self.geometries.len())
            .field("materials", &self.materials.len())
            .finish()
    }
}

const INSTANCE_SIZE: u64 = std::mem::size_of::<InstanceRaw>() as u64;

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Instance Buffer"),
        size: INSTANCE_SIZE * capacity.max(1) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn environment_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture: &Texture,
    fallback_sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(
                    texture.sampler.as_ref().unwrap_or(fallback_sampler),
                ),
            },
        ],
        label: Some("environment_bind_group"),
    })
}

impl SceneRenderer {
    pub fn new(ctx: &Context, showcase: &Showcase) -> Self {
        let device = &ctx.device;
        let sample_count = showcase.composer().sample_count();
        let camera = CameraResources::new(device);
        let material_layout = material_layout(device);
        let environment_layout = environment_layout(device);
        let mesh_pipeline = mk_mesh_pipeline(
            device,
            &camera.bind_group_layout,
            &material_layout,
            &environment_layout,
            sample_count,
        );
        let background_pipeline = mk_background_pipeline(
            device,
            &camera.bind_group_layout,
            &environment_layout,
            sample_count,
        );
        let post = PostPipelines::new(device, ctx.config.format);
        let targets = Targets::new(device, ctx.size(), sample_count);
        let white = Texture::white(device, &ctx.queue);

        let placeholder = Texture::placeholder_environment(device, &ctx.queue);
        let fallback = crate::data_structures::texture::create_clamped_sampler(device, 1);
        let environment = EnvironmentGpu {
            source: None,
            bind_group: environment_bind_group(
                device,
                &environment_layout,
                &placeholder,
                &fallback,
            ),
        };

        Self {
            sample_count,
            camera,
            material_layout,
            environment_layout,
            mesh_pipeline,
            background_pipeline,
            post,
            targets,
            white,
            environment,
            geometries: HashMap::new(),
            color_maps: HashMap::new(),
            materials: HashMap::new(),
            instance_buffer: create_instance_buffer(device, 16),
            instance_capacity: 16,
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width == 0 || height == 0 || self.targets.size == [width, height] {
            return;
        }
        self.targets = Targets::new(device, [width, height], self.sample_count);
    }

    fn update_environment(&mut self, ctx: &Context, environment: Option<&Arc<EnvironmentTexture>>) {
        let unchanged = match (environment, &self.environment.source) {
            (Some(new), Some(old)) => Arc::ptr_eq(new, old),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }
        let Some(environment) = environment else {
            return;
        };
        let texture = Texture::from_environment(&ctx.device, &ctx.queue, environment);
        let fallback = self.white.sampler.as_ref();
        let bind_group = match fallback {
            Some(sampler) => {
                environment_bind_group(&ctx.device, &self.environment_layout, &texture, sampler)
            }
            None => return,
        };
        log::info!("environment {} uploaded", environment.name);
        self.environment = EnvironmentGpu {
            source: Some(environment.clone()),
            bind_group,
        };
    }

    fn color_map_texture(&mut self, ctx: &Context, material: &Material) -> Option<(usize, u16)> {
        let map = material.map.as_ref()?;
        let key = (Arc::as_ptr(&map.image) as usize, map.anisotropy);
        if !self.color_maps.contains_key(&key) {
            match Texture::from_color_map(&ctx.device, &ctx.queue, map, &material.name) {
                Ok(texture) => {
                    self.color_maps.insert(key, (map.image.clone(), texture));
                }
                Err(e) => {
                    log::warn!("{e:#}");
                    return None;
                }
            }
        }
        Some(key)
    }

    fn prepare_material(
        &mut self,
        ctx: &Context,
        material: &Arc<Material>,
        selected: bool,
    ) -> (usize, bool) {
        let key = (Arc::as_ptr(material) as usize, selected);
        if self.materials.contains_key(&key) {
            return key;
        }
        let map_key = self.color_map_texture(ctx, material);
        let texture = map_key
            .and_then(|k| self.color_maps.get(&k))
            .map(|(_, texture)| texture)
            .unwrap_or(&self.white);
        let sampler = texture.sampler.as_ref().or(self.white.sampler.as_ref());

        let buffer = wgpu::util::DeviceExt::create_buffer_init(
            &ctx.device,
            &wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Material Buffer", material.name)),
                contents: bytemuck::cast_slice(&[material.to_uniform(selected)]),
                usage: wgpu::BufferUsages::UNIFORM,
            },
        );
        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
        ];
        if let Some(sampler) = sampler {
            entries.push(wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.material_layout,
            entries: &entries,
            label: Some(&material.name),
        });
        self.materials.insert(
            key,
            MaterialGpu {
                _material: material.clone(),
                _buffer: buffer,
                bind_group,
            },
        );
        key
    }

    /// Collects the visible meshes, uploads what is new and writes the instance data.
    fn prepare(&mut self, ctx: &Context, showcase: &Showcase) -> Vec<Draw> {
        let mut visible = Vec::new();
        showcase.scene.visit_meshes(&mut |node, mesh, world| {
            visible.push((node.name.as_str(), node.selected, mesh, *world));
        });

        let mut draws = Vec::with_capacity(visible.len());
        let mut instances = Vec::with_capacity(visible.len());
        let mut seen = HashSet::new();
        for (name, selected, mesh, world) in visible {
            let geometry = mesh.geometry.id();
            seen.insert(geometry);
            self.geometries
                .entry(geometry)
                .or_insert_with(|| mesh.geometry.upload(&ctx.device, name));
            let material = self.prepare_material(ctx, &mesh.material, selected);
            draws.push(Draw { geometry, material });
            instances.push(InstanceRaw::from_world(&world));
        }
        self.geometries.retain(|id, _| seen.contains(id));

        if instances.len() > self.instance_capacity {
            self.instance_capacity = instances.len().next_power_of_two();
            self.instance_buffer = create_instance_buffer(&ctx.device, self.instance_capacity);
        }
        if !instances.is_empty() {
            ctx.queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }
        draws
    }

    fn scene_pass(&self, encoder: &mut wgpu::CommandEncoder, showcase: &Showcase, draws: &[Draw]) {
        let (color_view, color_resolve, mask_view, mask_resolve) = match &self.targets.msaa {
            Some((color, mask)) => (
                &color.view,
                Some(&self.targets.hdr[0].view),
                &mask.view,
                Some(&self.targets.mask.view),
            ),
            None => (&self.targets.hdr[0].view, None, &self.targets.mask.view, None),
        };
        let clear = showcase.config.clear_colour;
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[
                Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: color_resolve,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                }),
                Some(wgpu::RenderPassColorAttachment {
                    view: mask_view,
                    resolve_target: mask_resolve,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                }),
            ],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.targets.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        render_pass.set_bind_group(0, &self.camera.bind_group, &[]);
        if showcase.scene.background.is_some() && self.environment.source.is_some() {
            render_pass.set_pipeline(&self.background_pipeline);
            render_pass.set_bind_group(1, &self.environment.bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        render_pass.set_pipeline(&self.mesh_pipeline);
        render_pass.set_bind_group(2, &self.environment.bind_group, &[]);
        for (idx, draw) in draws.iter().enumerate() {
            let (Some(geometry), Some(material)) = (
                self.geometries.get(&draw.geometry),
                self.materials.get(&draw.material),
            ) else {
                continue;
            };
            if geometry.num_elements == 0 {
                continue;
            }
            let offset = idx as u64 * INSTANCE_SIZE;
            render_pass.set_bind_group(1, &material.bind_group, &[]);
            render_pass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
            render_pass.set_vertex_buffer(
                1,
                self.instance_buffer.slice(offset..offset + INSTANCE_SIZE),
            );
            render_pass
                .set_index_buffer(geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..geometry.num_elements, 0, 0..1);
        }
    }

    /// Runs the effect chain and returns the index of the HDR target holding the result.
    fn effect_passes(
        &mut self,
        ctx: &Context,
        encoder: &mut wgpu::CommandEncoder,
        showcase: &Showcase,
    ) -> usize {
        let plan = showcase.composer().plan(&showcase.selection());
        let size = self.targets.size;
        let mut current = 0;
        let mut slot = 0;
        for pass in plan {
            if !pass.active {
                log::trace!("{:?} has nothing selected, skipped", pass.effect.kind());
                continue;
            }
            let next = 1 - current;
            let [hdr_a, hdr_b] = &self.targets.hdr;
            let (input, output) = if current == 0 {
                (&hdr_a.view, &hdr_b.view)
            } else {
                (&hdr_b.view, &hdr_a.view)
            };
            let mask = &self.targets.mask.view;
            let clear = wgpu::LoadOp::Clear(wgpu::Color::BLACK);
            match pass.effect {
                Effect::SelectiveBloom {
                    intensity,
                    luminance_threshold,
                    luminance_smoothing,
                } => {
                    let [bloom_a, bloom_b] = &self.targets.bloom;
                    let mut bright = PostUniform::new(size);
                    bright.params = [luminance_threshold, luminance_smoothing, 0.0, 0.0];
                    let mut horizontal = PostUniform::new(size);
                    horizontal.texel[2] = 1.0;
                    let mut vertical = PostUniform::new(size);
                    vertical.texel[3] = 1.0;
                    let mut composite = PostUniform::new(size);
                    composite.params[0] = intensity;

                    let post = &mut self.post;
                    post.pass(
                        &ctx.device,
                        &ctx.queue,
                        encoder,
                        slot,
                        Program::Bright,
                        bright,
                        input,
                        mask,
                        &bloom_a.view,
                        clear,
                    );
                    post.pass(
                        &ctx.device,
                        &ctx.queue,
                        encoder,
                        slot + 1,
                        Program::Blur,
                        horizontal,
                        &bloom_a.view,
                        mask,
                        &bloom_b.view,
                        clear,
                    );
                    post.pass(
                        &ctx.device,
                        &ctx.queue,
                        encoder,
                        slot + 2,
                        Program::Blur,
                        vertical,
                        &bloom_b.view,
                        mask,
                        &bloom_a.view,
                        clear,
                    );
                    post.pass(
                        &ctx.device,
                        &ctx.queue,
                        encoder,
                        slot + 3,
                        Program::BloomComposite,
                        composite,
                        input,
                        &bloom_a.view,
                        output,
                        clear,
                    );
                    slot += 4;
                }
                Effect::Outline {
                    edge_strength,
                    visible_edge_color: [r, g, b],
                    blur,
                } => {
                    let mut uniform = PostUniform::new(size);
                    uniform.params = [edge_strength, if blur { 1.0 } else { 0.0 }, 0.0, 0.0];
                    uniform.color = [r, g, b, 1.0];
                    self.post.pass(
                        &ctx.device,
                        &ctx.queue,
                        encoder,
                        slot,
                        Program::Outline,
                        uniform,
                        input,
                        mask,
                        output,
                        clear,
                    );
                    slot += 1;
                }
                Effect::ChromaticAberration { offset: [x, y] } => {
                    let mut uniform = PostUniform::new(size);
                    uniform.params = [x, y, 0.0, 0.0];
                    self.post.pass(
                        &ctx.device,
                        &ctx.queue,
                        encoder,
                        slot,
                        Program::ChromaticAberration,
                        uniform,
                        input,
                        mask,
                        output,
                        clear,
                    );
                    slot += 1;
                }
            }
            current = next;
        }
        current
    }

    pub fn render(&mut self, ctx: &Context, showcase: &Showcase) -> Result<(), wgpu::SurfaceError> {
        self.camera.write(&ctx.queue, &showcase.camera, &showcase.projection);
        self.update_environment(ctx, showcase.scene.environment.as_ref());
        let draws = self.prepare(ctx, showcase);

        let output = ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        self.scene_pass(&mut encoder, showcase, &draws);
        let result = self.effect_passes(ctx, &mut encoder, showcase);

        let settings = showcase.settings();
        let mut tone_map = PostUniform::new(self.targets.size);
        tone_map.params = [
            settings.exposure,
            if settings.tone_mapping == ToneMapping::AcesFilmic { 1.0 } else { 0.0 },
            if settings.output_srgb && !ctx.srgb_surface { 1.0 } else { 0.0 },
            0.0,
        ];
        let load = if showcase.composer().auto_clear {
            wgpu::LoadOp::Clear(wgpu::Color::BLACK)
        } else {
            wgpu::LoadOp::Load
        };
        // slots below 64 belong to the effect passes
        self.post.pass(
            &ctx.device,
            &ctx.queue,
            &mut encoder,
            64,
            Program::ToneMap,
            tone_map,
            &self.targets.hdr[result].view,
            &self.targets.mask.view,
            &view,
            load,
        );

        ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
