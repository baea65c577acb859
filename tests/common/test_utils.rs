#![allow(dead_code)]

use std::{path::PathBuf, sync::Arc};

use mannequin_ngin::data_structures::{
    model::{Geometry, Material, Mesh},
    scene_graph::SceneNode,
};

/// Two triangles spanning `[-half, half]` in x and y at depth `z`, facing +Z.
pub fn square_positions(half: f32, z: f32) -> Vec<[f32; 3]> {
    vec![
        [-half, -half, z],
        [half, -half, z],
        [half, half, z],
        [-half, half, z],
    ]
}

pub const SQUARE_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

pub fn square_node(name: &str, half: f32, z: f32) -> SceneNode {
    let indices = SQUARE_INDICES.iter().map(|&i| i as u32).collect();
    let geometry = Geometry::from_positions(square_positions(half, z), Some(indices));
    SceneNode::mesh(
        name,
        Mesh::new(Arc::new(geometry), Arc::new(Material::default())),
    )
}

/// A one node, one mesh glTF asset with a single red material.
pub struct GltfFixture {
    pub node_name: String,
    pub positions: Vec<[f32; 3]>,
    pub tex_coords: Option<Vec<[f32; 2]>>,
    pub indices: Vec<u16>,
    pub translation: [f32; 3],
    pub scale: [f32; 3],
}

impl GltfFixture {
    pub fn square(node_name: &str, half: f32, z: f32) -> Self {
        Self {
            node_name: node_name.to_string(),
            positions: square_positions(half, z),
            tex_coords: None,
            indices: SQUARE_INDICES.to_vec(),
            translation: [0.0; 3],
            scale: [1.0; 3],
        }
    }

    pub fn with_square_tex_coords(mut self) -> Self {
        self.tex_coords = Some(vec![[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]);
        self
    }

    pub fn with_transform(mut self, translation: [f32; 3], scale: [f32; 3]) -> Self {
        self.translation = translation;
        self.scale = scale;
        self
    }

    fn positions_len(&self) -> usize {
        self.positions.len() * 12
    }

    fn tex_coords_len(&self) -> usize {
        self.tex_coords.as_ref().map_or(0, |t| t.len() * 8)
    }

    /// Positions, then texture coordinates, then u16 indices.
    pub fn bin(&self) -> Vec<u8> {
        let mut bin = Vec::new();
        for c in self.positions.iter().flatten() {
            bin.extend_from_slice(&c.to_le_bytes());
        }
        for c in self.tex_coords.iter().flatten().flatten() {
            bin.extend_from_slice(&c.to_le_bytes());
        }
        for i in &self.indices {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        bin
    }

    /// The JSON document. `buffer_uri` is `None` for the binary chunk of a GLB.
    pub fn json(&self, buffer_uri: Option<&str>) -> String {
        let positions_len = self.positions_len();
        let tex_coords_len = self.tex_coords_len();
        let indices_len = self.indices.len() * 2;
        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        for p in &self.positions {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        let uri = buffer_uri
            .map(|uri| format!(r#""uri": "{uri}", "#))
            .unwrap_or_default();
        let (tex_attribute, tex_accessor, tex_view) = match &self.tex_coords {
            Some(tex_coords) => (
                r#", "TEXCOORD_0": 2"#.to_string(),
                format!(
                    r#",
    {{ "bufferView": 2, "componentType": 5126, "count": {}, "type": "VEC2" }}"#,
                    tex_coords.len()
                ),
                format!(
                    r#",
    {{ "buffer": 0, "byteOffset": {positions_len}, "byteLength": {tex_coords_len}, "target": 34962 }}"#
                ),
            ),
            None => Default::default(),
        };
        let [tx, ty, tz] = self.translation;
        let [sx, sy, sz] = self.scale;
        format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [{{ "name": "{node_name}", "mesh": 0, "translation": [{tx}, {ty}, {tz}], "scale": [{sx}, {sy}, {sz}] }}],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0{tex_attribute} }}, "indices": 1, "material": 0 }}] }}],
  "materials": [{{
    "name": "skin",
    "pbrMetallicRoughness": {{ "baseColorFactor": [1.0, 0.0, 0.0, 1.0], "metallicFactor": 0.0, "roughnessFactor": 0.5 }}
  }}],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": {count}, "type": "VEC3",
       "min": [{min0}, {min1}, {min2}], "max": [{max0}, {max1}, {max2}] }},
    {{ "bufferView": 1, "componentType": 5123, "count": {index_count}, "type": "SCALAR" }}{tex_accessor}
  ],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": {positions_len}, "target": 34962 }},
    {{ "buffer": 0, "byteOffset": {indices_offset}, "byteLength": {indices_len}, "target": 34963 }}{tex_view}
  ],
  "buffers": [{{ {uri}"byteLength": {total} }}]
}}"#,
            node_name = self.node_name,
            count = self.positions.len(),
            index_count = self.indices.len(),
            min0 = min[0],
            min1 = min[1],
            min2 = min[2],
            max0 = max[0],
            max1 = max[1],
            max2 = max[2],
            indices_offset = positions_len + tex_coords_len,
            total = positions_len + tex_coords_len + indices_len,
        )
    }

    /// Binary glTF with the mesh data in the BIN chunk.
    pub fn glb(&self) -> Vec<u8> {
        let mut json = self.json(None).into_bytes();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut bin = self.bin();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json);
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
        out
    }
}

/// Fresh, empty directory for one test.
pub fn asset_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mannequin-{test}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("failed to create the asset directory");
    dir
}

/// A small gradient as Radiance HDR bytes.
pub fn hdr_bytes(width: u32, height: u32) -> Vec<u8> {
    let pixels: Vec<image::Rgb<f32>> = (0..width * height)
        .map(|i| image::Rgb([i as f32 * 0.5, 1.0, 2.0]))
        .collect();
    let mut bytes = Vec::new();
    image::codecs::hdr::HdrEncoder::new(&mut bytes)
        .encode(&pixels, width as usize, height as usize)
        .expect("failed to encode the hdr fixture");
    bytes
}

pub fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}
