//! Scene configuration.
//!
//! Everything that differs between the two showcase scenes is collected in a
//! [`SceneConfig`]. [`SceneConfig::studio`] is the dark, reflective mannequin in front
//! of its environment; [`SceneConfig::glass`] is the spinning glass mannequin with a
//! marker following the pointer and the effect chain enabled.

use std::sync::Arc;

use cgmath::{Deg, Point3, Vector3};

use crate::{
    data_structures::{
        model::{Material, srgb},
        texture::EnvironmentMapping,
    },
    interaction::{InteractionConfig, RaySource},
    postprocessing::{Effect, EffectComposer},
    resources::ModelSetup,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToneMapping {
    None,
    AcesFilmic,
}

/// Output settings of the final pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderSettings {
    pub tone_mapping: ToneMapping,
    pub exposure: f32,
    /// Encode the output as sRGB. Done by the surface format when it is an sRGB one.
    pub output_srgb: bool,
    /// Physical pixels per logical pixel. `None` follows the window's scale factor.
    pub pixel_ratio: Option<f64>,
    pub shadows: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            tone_mapping: ToneMapping::AcesFilmic,
            exposure: 1.0,
            output_srgb: true,
            pixel_ratio: None,
            shadows: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraConfig {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub fovy: Deg<f32>,
    pub znear: f32,
    pub zfar: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Point3::new(0.0, 0.3, 1.0),
            target: Point3::new(0.0, 0.0, 0.0),
            fovy: Deg(45.0),
            znear: 0.1,
            zfar: 1000.0,
        }
    }
}

/// The small sphere that follows the pointer over the model.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerConfig {
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
    pub material: Arc<Material>,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            radius: 0.03,
            width_segments: 50,
            height_segments: 50,
            material: Arc::new(
                Material::standard("marker", srgb(255, 0, 0), 0.0, 0.0).with_emissive_intensity(0.5),
            ),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SceneConfig {
    pub model_file: String,
    pub environment_file: String,
    pub model: ModelSetup,
    pub environment_mapping: EnvironmentMapping,
    /// Also show the environment behind the scene.
    pub environment_as_background: bool,
    pub camera: CameraConfig,
    pub interaction: InteractionConfig,
    pub marker: Option<MarkerConfig>,
    pub render: RenderSettings,
    pub effects: EffectComposer,
    /// Shown until (or instead of) the background.
    pub clear_colour: wgpu::Color,
}

impl SceneConfig {
    pub const MODEL_FILE: &'static str = "wig_mannequin/scene.gltf";
    pub const ENVIRONMENT_FILE: &'static str = "hdr.hdr";

    fn mannequin(material: Material) -> ModelSetup {
        ModelSetup {
            scale: 0.001,
            position: Vector3::new(15.3, 1.3, 1.6),
            material: Some(Arc::new(material)),
            cast_shadow: true,
            receive_shadow: true,
            anisotropy: 16,
        }
    }

    /// Dark standard material, environment as background, no effects.
    pub fn studio() -> Self {
        Self {
            model_file: Self::MODEL_FILE.to_string(),
            environment_file: Self::ENVIRONMENT_FILE.to_string(),
            model: Self::mannequin(Material::standard("studio", srgb(2, 2, 5), 0.0, 0.0)),
            environment_mapping: EnvironmentMapping::EquirectangularReflection,
            environment_as_background: true,
            camera: CameraConfig::default(),
            interaction: InteractionConfig::default(),
            marker: None,
            render: RenderSettings::default(),
            effects: EffectComposer::default(),
            clear_colour: wgpu::Color::BLACK,
        }
    }

    /// Spinning glass mannequin, pointer marker, selective bloom and outline.
    pub fn glass() -> Self {
        let glass = Material::standard("glass", srgb(255, 255, 255), 0.0, 0.0)
            .with_transmission(1.0, 1.5)
            .with_specular_intensity(1.5)
            .with_emissive_intensity(0.5);
        Self {
            model_file: Self::MODEL_FILE.to_string(),
            environment_file: Self::ENVIRONMENT_FILE.to_string(),
            model: Self::mannequin(glass),
            environment_mapping: EnvironmentMapping::EquirectangularRefraction,
            environment_as_background: false,
            camera: CameraConfig::default(),
            interaction: InteractionConfig {
                spin_per_frame: 0.005,
                ray_source: RaySource::Pointer,
                orient_to_normal: false,
            },
            marker: Some(MarkerConfig::default()),
            render: RenderSettings::default(),
            effects: EffectComposer::new(8, false)
                .with(Effect::SelectiveBloom {
                    intensity: 1.3,
                    luminance_threshold: 0.15,
                    luminance_smoothing: 0.025,
                })
                .with(Effect::Outline {
                    edge_strength: 100.0,
                    visible_edge_color: [1.0, 0.0, 0.0],
                    blur: true,
                }),
            clear_colour: wgpu::Color::BLACK,
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects = self.effects.with(effect);
        self
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self::glass()
    }
}
