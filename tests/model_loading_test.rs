use std::sync::Arc;

use cgmath::{InnerSpace, Matrix4, Point3, SquareMatrix, Transform, Vector3};
use image::RgbaImage;
use mannequin_ngin::{
    SceneConfig, Showcase,
    data_structures::{
        model::{ColorMap, Geometry, Material, Mesh},
        scene_graph::{NodeKind, SceneNode},
    },
    resources::{AssetLoader, ModelSetup, load_or_warn},
};

use crate::common::test_utils::{GltfFixture, approx, asset_dir, square_positions};

mod common;

#[tokio::test]
async fn glb_loads_with_its_material() {
    let dir = asset_dir("glb");
    std::fs::write(dir.join("square.glb"), GltfFixture::square("body", 0.5, 0.0).glb()).unwrap();

    let loader = AssetLoader::new(dir.to_string_lossy());
    let model = loader.load_model("square.glb").await.unwrap();

    assert!(matches!(model.kind, NodeKind::Group));
    assert_eq!(model.children().len(), 1);
    let body = &model.children()[0];
    assert_eq!(body.name, "body");
    let mesh = body.as_mesh().expect("a single primitive becomes a mesh node");
    assert_eq!(mesh.material.name, "skin");
    assert_eq!(mesh.material.color, [1.0, 0.0, 0.0]);
    assert!(approx(mesh.material.roughness, 0.5));
    assert_eq!(mesh.geometry.indices().len(), 6);
}

#[tokio::test]
async fn missing_normals_are_computed() {
    let dir = asset_dir("normals");
    std::fs::write(dir.join("square.glb"), GltfFixture::square("body", 0.5, 0.0).glb()).unwrap();

    let model = AssetLoader::new(dir.to_string_lossy())
        .load_model("square.glb")
        .await
        .unwrap();
    let geometry = &model.children()[0].as_mesh().unwrap().geometry;
    for vertex in geometry.vertices() {
        assert!(approx(vertex.normal[0], 0.0));
        assert!(approx(vertex.normal[1], 0.0));
        assert!(approx(vertex.normal[2], 1.0));
    }
}

#[tokio::test]
async fn computed_normals_keep_the_texture_coordinates() {
    let dir = asset_dir("uvs");
    let fixture = GltfFixture::square("body", 0.5, 0.0).with_square_tex_coords();
    std::fs::write(dir.join("square.glb"), fixture.glb()).unwrap();

    let model = AssetLoader::new(dir.to_string_lossy())
        .load_model("square.glb")
        .await
        .unwrap();
    let geometry = &model.children()[0].as_mesh().unwrap().geometry;
    let expected = fixture.tex_coords.unwrap();
    assert_eq!(geometry.vertices().len(), expected.len());
    for (vertex, uv) in geometry.vertices().iter().zip(&expected) {
        assert_eq!(vertex.tex_coords, *uv);
        assert!(approx(vertex.normal[2], 1.0));
    }
}

#[tokio::test]
async fn external_buffer_is_read_next_to_the_model() {
    let dir = asset_dir("external");
    std::fs::create_dir_all(dir.join("models")).unwrap();
    let fixture = GltfFixture::square("body", 1.0, -0.5);
    std::fs::write(dir.join("models/square.gltf"), fixture.json(Some("square.bin"))).unwrap();
    std::fs::write(dir.join("models/square.bin"), fixture.bin()).unwrap();

    let model = AssetLoader::new(dir.to_string_lossy())
        .load_model("models/square.gltf")
        .await
        .unwrap();
    let bounds = model.children()[0].as_mesh().unwrap().geometry.bounds();
    assert!(approx(bounds.min.x, -1.0));
    assert!(approx(bounds.max.y, 1.0));
    assert!(approx(bounds.min.z, -0.5));
}

#[tokio::test]
async fn loaded_model_adds_exactly_one_root() {
    let dir = asset_dir("placement");
    std::fs::write(dir.join("square.glb"), GltfFixture::square("body", 0.5, 0.0).glb()).unwrap();
    let model = AssetLoader::new(dir.to_string_lossy())
        .load_model("square.glb")
        .await
        .unwrap();

    let mut showcase = Showcase::new(SceneConfig::glass(), 800, 600);
    let before = showcase.scene.len();
    let handle = showcase.on_model_loaded(model);
    assert_eq!(showcase.scene.len(), before + 1);
    assert_eq!(showcase.model(), Some(handle));

    let pivot = showcase.scene.get(handle).unwrap();
    assert_eq!(pivot.name, Showcase::PIVOT);
    let placed = &pivot.children()[0];
    assert_eq!(placed.local.scale, Vector3::new(0.001, 0.001, 0.001));
    assert_eq!(placed.local.position, Vector3::new(15.3, 1.3, 1.6));

    let glass = showcase.config.model.material.clone().unwrap();
    let NodeKind::Mesh(mesh) = &placed.children()[0].kind else {
        panic!("expected the model's mesh");
    };
    assert!(mesh.cast_shadow);
    assert!(mesh.receive_shadow);
    assert!(Arc::ptr_eq(&mesh.material, &glass));
}

#[tokio::test]
async fn missing_model_leaves_the_scene_unchanged() {
    let dir = asset_dir("missing");
    let loader = AssetLoader::new(dir.to_string_lossy());
    let mut showcase = Showcase::new(SceneConfig::glass(), 800, 600);
    let before = showcase.scene.len();

    let model = load_or_warn("missing.glb", loader.load_model("missing.glb")).await;
    assert!(model.is_none());
    if let Some(model) = model {
        showcase.on_model_loaded(model);
    }
    assert_eq!(showcase.scene.len(), before);
    assert!(showcase.model().is_none());
}

#[tokio::test]
async fn garbage_is_an_error() {
    let dir = asset_dir("garbage");
    std::fs::write(dir.join("broken.glb"), b"definitely not gltf").unwrap();
    let result = AssetLoader::new(dir.to_string_lossy())
        .load_model("broken.glb")
        .await;
    assert!(result.is_err());
}

#[test]
fn setup_without_material_keeps_the_loaded_one() {
    let mut node = crate::common::test_utils::square_node("body", 0.5, 0.0);
    let before = node.as_mesh().unwrap().material.clone();
    ModelSetup::default().apply(&mut node);
    let after = &node.as_mesh().unwrap().material;
    assert!(Arc::ptr_eq(&before, after));
    assert_eq!(node.local.scale, Vector3::new(1.0, 1.0, 1.0));
}

/// World matrix of the first node named `name` under the scene's roots.
fn world_of(showcase: &Showcase, name: &str) -> Option<Matrix4<f32>> {
    let mut found = None;
    for root in showcase.scene.roots() {
        root.traverse_world(&Matrix4::identity(), &mut |node, world| {
            if found.is_none() && node.name == name {
                found = Some(*world);
            }
        });
    }
    found
}

#[tokio::test]
async fn placement_keeps_the_transform_stored_in_the_file() {
    let dir = asset_dir("file-transform");
    let fixture =
        GltfFixture::square("body", 0.5, 0.0).with_transform([100.0, 0.0, 0.0], [10.0; 3]);
    std::fs::write(dir.join("square.glb"), fixture.glb()).unwrap();
    let model = AssetLoader::new(dir.to_string_lossy())
        .load_model("square.glb")
        .await
        .unwrap();
    assert_eq!(model.local.position, Vector3::new(0.0, 0.0, 0.0));
    assert_eq!(model.children()[0].local.position, Vector3::new(100.0, 0.0, 0.0));

    let mut config = SceneConfig::glass();
    config.interaction.spin_per_frame = 0.0;
    let mut showcase = Showcase::new(config, 800, 600);
    showcase.on_model_loaded(model);

    let world = world_of(&showcase, "body").expect("the mesh is in the scene");
    let origin = world.transform_point(Point3::new(0.0, 0.0, 0.0));
    assert!(approx(origin.x, 15.4));
    assert!(approx(origin.y, 1.3));
    assert!(approx(origin.z, 1.6));
    assert!(approx(world.x.truncate().magnitude(), 0.01));
    assert!(approx(world.y.truncate().magnitude(), 0.01));
    assert!(approx(world.z.truncate().magnitude(), 0.01));
}

/// A mesh whose material has a 1x1 color map sampled without anisotropy.
fn textured_node() -> SceneNode {
    let material = Material {
        name: String::from("fabric"),
        map: Some(ColorMap {
            image: Arc::new(RgbaImage::new(1, 1)),
            anisotropy: 1,
        }),
        ..Default::default()
    };
    let geometry = Geometry::from_positions(square_positions(0.5, 0.0), None);
    let mut group = SceneNode::group("model");
    group.add_child(SceneNode::mesh(
        "body",
        Mesh::new(Arc::new(geometry), Arc::new(material)),
    ));
    group
}

#[test]
fn setup_raises_the_anisotropy_of_loaded_maps() {
    let mut node = textured_node();
    let setup = ModelSetup {
        material: None,
        ..SceneConfig::glass().model
    };
    setup.apply(&mut node);

    let material = &node.children()[0].as_mesh().unwrap().material;
    assert_eq!(material.name, "fabric");
    let map = material.map.as_ref().expect("the loaded map is kept");
    assert_eq!(map.anisotropy, 16);
}

#[test]
fn material_override_drops_the_loaded_map() {
    let mut node = textured_node();
    let setup = SceneConfig::glass().model;
    let glass = setup.material.clone().unwrap();
    setup.apply(&mut node);

    let material = &node.children()[0].as_mesh().unwrap().material;
    assert!(Arc::ptr_eq(material, &glass));
    assert!(material.map.is_none());
}
