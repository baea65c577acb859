use std::time::Duration;

use cgmath::{Deg, EuclideanSpace, InnerSpace, Quaternion, Rotation, Rotation3, Vector3};
use mannequin_ngin::{
    SceneConfig, Showcase,
    data_structures::{
        instance::Instance,
        texture::{EnvironmentMapping, EnvironmentTexture},
    },
    interaction::RaySource,
    resources::ModelSetup,
};

use crate::common::test_utils::{approx, square_node};

mod common;

const FRAME: Duration = Duration::from_millis(16);

/// Glass scene without the spin and the model placement, so hits are easy to predict.
fn still_glass() -> Showcase {
    let mut config = SceneConfig::glass();
    config.interaction.spin_per_frame = 0.0;
    config.model = ModelSetup::default();
    Showcase::new(config, 800, 600)
}

fn environment() -> EnvironmentTexture {
    EnvironmentTexture {
        name: String::from("sky.hdr"),
        mapping: EnvironmentMapping::EquirectangularReflection,
        image: image::Rgb32FImage::new(4, 2),
    }
}

#[test]
fn marker_moves_to_the_hit_under_the_pointer() {
    let mut showcase = still_glass();
    showcase.on_model_loaded(square_node("body", 0.1, 0.0));
    showcase.pointer_moved(400.0, 300.0);

    let hit = showcase.frame(FRAME).expect("the pointer is over the model");
    assert_eq!(hit.node, "body");
    assert!(hit.point.to_vec().magnitude() < 1e-3);
    // camera at (0, 0.3, 1)
    assert!((hit.distance - 1.09f32.sqrt()).abs() < 1e-3);

    let marker = showcase.marker_transform().unwrap();
    assert!(marker.position.magnitude() < 1e-3);
}

#[test]
fn marker_stays_put_without_a_hit() {
    let mut showcase = still_glass();
    showcase.on_model_loaded(square_node("body", 0.1, 0.0));
    showcase.place_marker(Vector3::new(5.0, 5.0, 5.0));

    showcase.pointer_moved(0.0, 0.0);
    assert!(showcase.frame(FRAME).is_none());
    assert_eq!(
        showcase.marker_transform().unwrap().position,
        Vector3::new(5.0, 5.0, 5.0)
    );
}

#[test]
fn frames_before_the_model_arrives_do_nothing() {
    let mut showcase = still_glass();
    showcase.pointer_moved(400.0, 300.0);
    assert!(showcase.frame(FRAME).is_none());
    assert_eq!(showcase.marker_transform().unwrap(), Instance::default());
}

#[test]
fn marker_can_follow_the_surface_normal() {
    let mut showcase = {
        let mut config = SceneConfig::glass();
        config.interaction.spin_per_frame = 0.0;
        config.interaction.orient_to_normal = true;
        config.model = ModelSetup::default();
        Showcase::new(config, 800, 600)
    };
    let tilted = square_node("body", 0.2, 0.0).with_transform(Instance {
        rotation: Quaternion::from_angle_y(Deg(30.0)),
        ..Default::default()
    });
    showcase.on_model_loaded(tilted);
    showcase.pointer_moved(400.0, 300.0);

    let hit = showcase.frame(FRAME).unwrap();
    assert!(approx(hit.normal.y, 0.0));
    assert!(approx(hit.normal.x.abs(), 0.5));

    let marker = showcase.marker_transform().unwrap();
    let z = marker.rotation.rotate_vector(Vector3::unit_z());
    assert!((z - hit.normal).magnitude() < 1e-4);
}

#[test]
fn camera_forward_rays_ignore_the_pointer() {
    let mut showcase = {
        let mut config = SceneConfig::glass();
        config.interaction.spin_per_frame = 0.0;
        config.interaction.ray_source = RaySource::CameraForward;
        config.model = ModelSetup::default();
        Showcase::new(config, 800, 600)
    };
    showcase.on_model_loaded(square_node("body", 0.1, 0.0));
    // the top left corner is far off the model
    showcase.pointer_moved(0.0, 0.0);

    let hit = showcase.frame(FRAME).expect("the camera looks at the model");
    assert_eq!(hit.node, "body");
    assert!(hit.point.to_vec().magnitude() < 1e-3);
    assert!(showcase.marker_transform().unwrap().position.magnitude() < 1e-3);
}

#[test]
fn glass_model_spins_every_frame() {
    let mut showcase = Showcase::new(SceneConfig::glass(), 800, 600);
    let handle = showcase.on_model_loaded(square_node("body", 0.1, 0.0));
    for _ in 0..10 {
        showcase.frame(FRAME);
    }
    let rotation = showcase.scene.get(handle).unwrap().local.rotation;
    let angle = 2.0 * rotation.s.clamp(-1.0, 1.0).acos();
    assert!((angle - 0.05).abs() < 1e-4);
    assert!(rotation.v.y > 0.0);
}

#[test]
fn studio_has_no_marker_and_does_not_spin() {
    let mut showcase = Showcase::new(SceneConfig::studio(), 800, 600);
    assert!(showcase.scene.is_empty());
    assert!(showcase.marker().is_none());

    let handle = showcase.on_model_loaded(square_node("body", 0.1, 0.0));
    assert_eq!(showcase.scene.len(), 1);
    showcase.pointer_moved(400.0, 300.0);
    assert!(showcase.frame(FRAME).is_none());
    assert_eq!(
        showcase.scene.get(handle).unwrap().local.rotation,
        Instance::default().rotation
    );
}

#[test]
fn studio_environment_is_also_the_background() {
    let mut showcase = Showcase::new(SceneConfig::studio(), 800, 600);
    showcase.on_environment_loaded(environment());
    let env = showcase.scene.environment.as_ref().unwrap();
    assert_eq!(env.mapping, EnvironmentMapping::EquirectangularReflection);
    assert!(showcase.scene.background.is_some());
}

#[test]
fn glass_environment_refracts_behind_a_plain_background() {
    let mut showcase = Showcase::new(SceneConfig::glass(), 800, 600);
    showcase.on_environment_loaded(environment());
    let env = showcase.scene.environment.as_ref().unwrap();
    assert_eq!(env.mapping, EnvironmentMapping::EquirectangularRefraction);
    assert!(showcase.scene.background.is_none());
}

#[test]
fn resize_updates_aspect_and_ignores_zero() {
    let mut showcase = Showcase::new(SceneConfig::glass(), 800, 600);
    showcase.resize(1024, 512);
    assert!(approx(showcase.projection.aspect(), 2.0));
    assert_eq!(showcase.viewport().width, 1024);
    assert_eq!(showcase.viewport().height, 512);

    showcase.resize(0, 0);
    assert!(approx(showcase.projection.aspect(), 2.0));
    assert_eq!(showcase.viewport().width, 1024);
}

#[test]
fn pixel_ratio_follows_the_window_unless_configured() {
    let mut showcase = Showcase::new(SceneConfig::glass(), 800, 600);
    showcase.set_pixel_ratio(2.0);
    assert_eq!(showcase.viewport().pixel_ratio, 2.0);

    let mut config = SceneConfig::glass();
    config.render.pixel_ratio = Some(1.0);
    let mut fixed = Showcase::new(config, 800, 600);
    fixed.set_pixel_ratio(2.0);
    assert_eq!(fixed.viewport().pixel_ratio, 1.0);
}

#[test]
fn presets_match_the_two_scenes() {
    let glass = SceneConfig::glass();
    let material = glass.model.material.as_ref().unwrap();
    assert_eq!(material.transmission, 1.0);
    assert_eq!(material.ior, 1.5);
    assert_eq!(material.specular_intensity, 1.5);
    assert_eq!(glass.model.scale, 0.001);
    let marker = glass.marker.as_ref().unwrap();
    assert_eq!(marker.radius, 0.03);
    assert_eq!((marker.width_segments, marker.height_segments), (50, 50));
    assert_eq!(marker.material.emissive_intensity, 0.5);
    assert_eq!(glass.effects.multisampling, 8);
    assert!(!glass.effects.auto_clear);

    let studio = SceneConfig::studio();
    assert!(studio.marker.is_none());
    assert!(studio.effects.effects().is_empty());
    assert!(studio.environment_as_background);
    assert_eq!(studio.camera.position, cgmath::Point3::new(0.0, 0.3, 1.0));
}
