//! Conversion of glTF documents into scene nodes.

use std::sync::Arc;

use anyhow::{Context, bail};
use cgmath::{Quaternion, Vector3};

use crate::data_structures::{
    instance::Instance,
    model::{ColorMap, Geometry, Material, Mesh, ModelVertex},
    scene_graph::SceneNode,
};

/// Where a buffer's bytes come from.
pub enum BufferSource<'a> {
    /// The binary chunk of a `.glb`.
    Bin,
    /// A file next to the model.
    Uri(&'a str),
}

pub fn buffer_sources(document: &gltf::Document) -> Vec<BufferSource<'_>> {
    document
        .buffers()
        .map(|buffer| match buffer.source() {
            gltf::buffer::Source::Bin => BufferSource::Bin,
            gltf::buffer::Source::Uri(uri) => BufferSource::Uri(uri),
        })
        .collect()
}

/// Files referenced by the images, by image index. `None` for embedded images.
pub fn image_uris(document: &gltf::Document) -> Vec<Option<&str>> {
    document
        .images()
        .map(|image| match image.source() {
            gltf::image::Source::Uri { uri, .. } => Some(uri),
            gltf::image::Source::View { .. } => None,
        })
        .collect()
}

/// Path of `uri` relative to the directory of `base`.
pub fn sibling_path(base: &str, uri: &str) -> String {
    match base.rfind('/') {
        Some(idx) => format!("{}/{}", &base[..idx], uri),
        None => uri.to_string(),
    }
}

/**
 * Decodes the images of the document. Embedded images are read from the buffers;
 * `external` holds the bytes of URI images by image index. Images that fail to decode
 * are logged and left out, the materials using them render untextured.
 */
pub fn decode_images(
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    external: &[Option<Vec<u8>>],
) -> Vec<Option<ColorMap>> {
    document
        .images()
        .map(|image| {
            let bytes = match image.source() {
                gltf::image::Source::View { view, .. } => {
                    let buffer = buffers.get(view.buffer().index())?;
                    buffer.get(view.offset()..view.offset() + view.length())
                }
                gltf::image::Source::Uri { .. } => {
                    external.get(image.index()).and_then(|b| b.as_deref())
                }
            }?;
            match image::load_from_memory(bytes) {
                Ok(decoded) => Some(ColorMap {
                    image: Arc::new(decoded.into_rgba8()),
                    anisotropy: 1,
                }),
                Err(e) => {
                    log::warn!("image {} could not be decoded: {}", image.index(), e);
                    None
                }
            }
        })
        .collect()
}

fn convert_material(material: &gltf::Material, maps: &[Option<ColorMap>]) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, _] = pbr.base_color_factor();
    let map = pbr
        .base_color_texture()
        .and_then(|info| maps.get(info.texture().source().index()).cloned().flatten());
    Material {
        name: material
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("material {}", material.index().unwrap_or(0))),
        color: [r, g, b],
        roughness: pbr.roughness_factor(),
        metalness: pbr.metallic_factor(),
        emissive: material.emissive_factor(),
        map,
        ..Default::default()
    }
}

fn convert_primitive(
    primitive: &gltf::Primitive,
    buffers: &[Vec<u8>],
) -> anyhow::Result<Option<Geometry>> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::debug!("skipping primitive with mode {:?}", primitive.mode());
        return Ok(None);
    }
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let positions: Vec<[f32; 3]> = match reader.read_positions() {
        Some(positions) => positions.collect(),
        None => bail!("primitive {} has no positions", primitive.index()),
    };
    let indices: Option<Vec<u32>> = reader.read_indices().map(|i| i.into_u32().collect());
    let tex_coords: Vec<[f32; 2]> = reader
        .read_tex_coords(0)
        .map(|t| t.into_f32().collect())
        .unwrap_or_default();
    let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(Iterator::collect);

    let vertices = positions
        .iter()
        .enumerate()
        .map(|(i, position)| ModelVertex {
            position: *position,
            normal: normals
                .as_ref()
                .and_then(|normals| normals.get(i).copied())
                .unwrap_or([0.0, 1.0, 0.0]),
            tex_coords: tex_coords.get(i).copied().unwrap_or_default(),
        })
        .collect();
    let geometry = match normals {
        Some(_) => {
            let indices = indices.unwrap_or_else(|| (0..positions.len() as u32).collect());
            Geometry::new(vertices, indices)
        }
        None => Geometry::with_computed_normals(vertices, indices),
    };
    Ok(Some(geometry))
}

fn local_transform(node: &gltf::Node) -> Instance {
    let (translation, [x, y, z, w], scale) = node.transform().decomposed();
    Instance {
        position: Vector3::from(translation),
        rotation: Quaternion::new(w, x, y, z),
        scale: Vector3::from(scale),
    }
}

fn convert_node(
    node: &gltf::Node,
    buffers: &[Vec<u8>],
    materials: &[Arc<Material>],
    default_material: &Arc<Material>,
) -> anyhow::Result<SceneNode> {
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node {}", node.index()));

    let mut meshes = Vec::new();
    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            let Some(geometry) = convert_primitive(&primitive, buffers)? else {
                continue;
            };
            let material = primitive
                .material()
                .index()
                .and_then(|idx| materials.get(idx))
                .unwrap_or(default_material);
            meshes.push(Mesh::new(Arc::new(geometry), material.clone()));
        }
    }

    let mut scene_node = if meshes.len() == 1 {
        SceneNode::mesh(&name, meshes.remove(0))
    } else {
        let mut group = SceneNode::group(&name);
        for (idx, mesh) in meshes.into_iter().enumerate() {
            group.add_child(SceneNode::mesh(&format!("{name}.{idx}"), mesh));
        }
        group
    };
    scene_node.local = local_transform(node);

    for child in node.children() {
        scene_node.add_child(convert_node(&child, buffers, materials, default_material)?);
    }
    Ok(scene_node)
}

/**
 * Builds the node tree of the default scene (or the first one). The scene's root
 * nodes are wrapped in an identity group, so placing the returned node keeps the
 * transforms stored in the file.
 */
pub fn scene_from_gltf(
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    maps: &[Option<ColorMap>],
    name: &str,
) -> anyhow::Result<SceneNode> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .with_context(|| format!("{name} contains no scene"))?;

    let materials: Vec<Arc<Material>> = document
        .materials()
        .map(|material| Arc::new(convert_material(&material, maps)))
        .collect();
    // glTF's default material
    let default_material = Arc::new(Material {
        metalness: 1.0,
        ..Default::default()
    });

    let mut group = SceneNode::group(scene.name().unwrap_or(name));
    for node in scene.nodes() {
        group.add_child(convert_node(&node, buffers, &materials, &default_material)?);
    }
    Ok(group)
}
