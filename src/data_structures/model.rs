//! Geometry, materials and meshes.
//!
//! Geometry is kept on the CPU so the raycaster can walk it every frame; the
//! renderer uploads each [`Geometry`] once and caches the buffers by [`GeometryId`].
//! Materials are plain shading parameters shared by `Arc` between meshes.

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use cgmath::{InnerSpace, Point3, Vector3};
use wgpu::util::DeviceExt;

use crate::raycast::Aabb;

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

static NEXT_GEOMETRY_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GeometryId(u32);

/// Triangle soup with indices, kept on the CPU.
#[derive(Debug)]
pub struct Geometry {
    id: GeometryId,
    vertices: Vec<ModelVertex>,
    indices: Vec<u32>,
    bounds: Aabb,
}

impl Geometry {
    /// Builds a geometry from vertices and triangle indices.
    ///
    /// Trailing indices that don't form a full triangle and indices that point past the
    /// vertex list are dropped.
    pub fn new(vertices: Vec<ModelVertex>, indices: Vec<u32>) -> Self {
        let len = vertices.len() as u32;
        let indices: Vec<u32> = indices
            .chunks_exact(3)
            .filter(|tri| tri.iter().all(|&i| i < len))
            .flatten()
            .copied()
            .collect();
        let bounds = Aabb::from_points(vertices.iter().map(|v| Point3::from(v.position)));
        Self {
            id: GeometryId(NEXT_GEOMETRY_ID.fetch_add(1, Ordering::Relaxed)),
            vertices,
            indices,
            bounds,
        }
    }

    /// Builds a geometry from bare positions and computes area-weighted vertex normals.
    pub fn from_positions(positions: Vec<[f32; 3]>, indices: Option<Vec<u32>>) -> Self {
        let vertices = positions
            .into_iter()
            .map(|position| ModelVertex {
                position,
                ..Default::default()
            })
            .collect();
        Self::with_computed_normals(vertices, indices)
    }

    /// Replaces the normals of `vertices` with area-weighted ones. Other attributes are kept.
    /// Without indices every three vertices form a triangle.
    pub fn with_computed_normals(
        mut vertices: Vec<ModelVertex>,
        indices: Option<Vec<u32>>,
    ) -> Self {
        let indices = indices.unwrap_or_else(|| (0..vertices.len() as u32).collect());
        compute_vertex_normals(&mut vertices, &indices);
        Self::new(vertices, indices)
    }

    /// UV sphere: `width_segments` around Y, `height_segments` from pole to pole.
    pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        let width_segments = width_segments.max(3);
        let height_segments = height_segments.max(2);
        let mut vertices = Vec::new();
        let mut grid = Vec::new();
        for iy in 0..=height_segments {
            let v = iy as f32 / height_segments as f32;
            let mut row = Vec::new();
            for ix in 0..=width_segments {
                let u = ix as f32 / width_segments as f32;
                let phi = u * std::f32::consts::TAU;
                let theta = v * std::f32::consts::PI;
                let position = Vector3::new(
                    -radius * phi.cos() * theta.sin(),
                    radius * theta.cos(),
                    radius * phi.sin() * theta.sin(),
                );
                let normal = if position.magnitude2() > 0.0 {
                    position.normalize()
                } else {
                    Vector3::unit_y()
                };
                row.push(vertices.len() as u32);
                vertices.push(ModelVertex {
                    position: position.into(),
                    normal: normal.into(),
                    tex_coords: [u, v],
                });
            }
            grid.push(row);
        }

        let mut indices = Vec::new();
        for iy in 0..height_segments as usize {
            for ix in 0..width_segments as usize {
                let a = grid[iy][ix + 1];
                let b = grid[iy][ix];
                let c = grid[iy + 1][ix];
                let d = grid[iy + 1][ix + 1];
                if iy != 0 {
                    indices.extend_from_slice(&[a, b, d]);
                }
                if iy != height_segments as usize - 1 {
                    indices.extend_from_slice(&[b, c, d]);
                }
            }
        }
        Self::new(vertices, indices)
    }

    pub fn id(&self) -> GeometryId {
        self.id
    }

    pub fn vertices(&self) -> &[ModelVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Bounding box in the geometry's local space.
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Point3<f32>; 3]> + '_ {
        self.indices.chunks_exact(3).map(|tri| {
            [
                Point3::from(self.vertices[tri[0] as usize].position),
                Point3::from(self.vertices[tri[1] as usize].position),
                Point3::from(self.vertices[tri[2] as usize].position),
            ]
        })
    }

    pub fn upload(&self, device: &wgpu::Device, label: &str) -> GpuGeometry {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Vertex Buffer")),
            contents: bytemuck::cast_slice(&self.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Index Buffer")),
            contents: bytemuck::cast_slice(&self.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        GpuGeometry {
            vertex_buffer,
            index_buffer,
            num_elements: self.indices.len() as u32,
        }
    }
}

fn compute_vertex_normals(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut sums = vec![Vector3::new(0.0f32, 0.0, 0.0); vertices.len()];
    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
            continue;
        }
        let pa = Vector3::from(vertices[a].position);
        let pb = Vector3::from(vertices[b].position);
        let pc = Vector3::from(vertices[c].position);
        // unnormalized cross product weights each face by its area
        let face = (pb - pa).cross(pc - pa);
        sums[a] += face;
        sums[b] += face;
        sums[c] += face;
    }
    for (vertex, sum) in vertices.iter_mut().zip(sums) {
        if sum.magnitude2() > 0.0 {
            vertex.normal = sum.normalize().into();
        }
    }
}

/// GPU buffers of an uploaded [`Geometry`].
#[derive(Debug)]
pub struct GpuGeometry {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
}

/// Base color texture of a material, decoded on the CPU. The pixels are shared.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorMap {
    pub image: Arc<image::RgbaImage>,
    /// Anisotropic filtering level used when sampling this map (1 = off).
    pub anisotropy: u16,
}

/// Shading parameters, roughly those of a physically based "physical" material.
///
/// Colors are linear RGB.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub color: [f32; 3],
    pub roughness: f32,
    pub metalness: f32,
    pub transmission: f32,
    pub ior: f32,
    pub specular_intensity: f32,
    pub emissive: [f32; 3],
    pub emissive_intensity: f32,
    pub map: Option<ColorMap>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::from("default"),
            color: [1.0, 1.0, 1.0],
            roughness: 1.0,
            metalness: 0.0,
            transmission: 0.0,
            ior: 1.5,
            specular_intensity: 1.0,
            emissive: [0.0, 0.0, 0.0],
            emissive_intensity: 1.0,
            map: None,
        }
    }
}

impl Material {
    pub fn standard(name: &str, color: [f32; 3], roughness: f32, metalness: f32) -> Self {
        Self {
            name: name.to_string(),
            color,
            roughness,
            metalness,
            ..Default::default()
        }
    }

    pub fn with_transmission(mut self, transmission: f32, ior: f32) -> Self {
        self.transmission = transmission.clamp(0.0, 1.0);
        self.ior = ior;
        self
    }

    pub fn with_specular_intensity(mut self, specular_intensity: f32) -> Self {
        self.specular_intensity = specular_intensity;
        self
    }

    pub fn with_emissive_intensity(mut self, emissive_intensity: f32) -> Self {
        self.emissive_intensity = emissive_intensity;
        self
    }

    pub fn to_uniform(&self, selected: bool) -> MaterialUniform {
        MaterialUniform {
            color_roughness: [self.color[0], self.color[1], self.color[2], self.roughness],
            emissive_metalness: [
                self.emissive[0],
                self.emissive[1],
                self.emissive[2],
                self.metalness,
            ],
            params: [
                self.transmission,
                self.ior,
                self.specular_intensity,
                self.emissive_intensity,
            ],
            flags: [
                if self.map.is_some() { 1.0 } else { 0.0 },
                if selected { 1.0 } else { 0.0 },
                0.0,
                0.0,
            ],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    color_roughness: [f32; 4],
    emissive_metalness: [f32; 4],
    // transmission, ior, specular intensity, emissive intensity
    params: [f32; 4],
    // has map, selected
    flags: [f32; 4],
}

/// Converts an sRGB channel in `0..=255` to linear light.
pub fn srgb_channel(c: u8) -> f32 {
    let c = c as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

pub fn srgb(r: u8, g: u8, b: u8) -> [f32; 3] {
    [srgb_channel(r), srgb_channel(g), srgb_channel(b)]
}

/// A renderable: geometry plus the material it's shaded with.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub geometry: Arc<Geometry>,
    pub material: Arc<Material>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Mesh {
    pub fn new(geometry: Arc<Geometry>, material: Arc<Material>) -> Self {
        Self {
            geometry,
            material,
            cast_shadow: false,
            receive_shadow: false,
        }
    }
}
