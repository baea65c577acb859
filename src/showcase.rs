//! CPU side state of the showcase scene.
//!
//! [`Showcase`] owns the scene graph, the camera with its orbit controls, the
//! pointer and the interaction layer. It knows nothing about the GPU; the renderer
//! reads it once per frame.

use std::{sync::Arc, time::Duration};

use cgmath::Vector3;

use crate::{
    camera::{Camera, OrbitControls, Projection},
    config::{RenderSettings, SceneConfig},
    data_structures::{
        instance::Instance,
        model::{Geometry, Mesh},
        scene_graph::{NodeHandle, Scene, SceneNode},
        texture::EnvironmentTexture,
    },
    interaction::{FrameContext, Interaction, Pointer},
    postprocessing::{EffectComposer, Selection},
    raycast::Intersection,
};

/// Size of the drawing surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Physical pixels.
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
}

#[derive(Debug)]
pub struct Showcase {
    pub config: SceneConfig,
    pub scene: Scene,
    pub camera: Camera,
    pub projection: Projection,
    pub controls: OrbitControls,
    pub pointer: Pointer,
    viewport: Viewport,
    interaction: Option<Interaction>,
    model: Option<NodeHandle>,
    marker: Option<NodeHandle>,
}

impl Showcase {
    /// Name of the group the loaded model is placed in; the spin rotates this group.
    pub const PIVOT: &'static str = "mannequin pivot";
    pub const MARKER: &'static str = "marker";

    /// Sets up camera, controls, marker and effects for a viewport of `width` x `height` physical pixels.
    pub fn new(config: SceneConfig, width: u32, height: u32) -> Self {
        let camera = Camera::new(config.camera.position, config.camera.target);
        let projection = Projection::new(
            width,
            height,
            config.camera.fovy,
            config.camera.znear,
            config.camera.zfar,
        );
        let controls = OrbitControls::from_camera(&camera);

        let mut scene = Scene::new();
        let marker = config.marker.as_ref().map(|marker| {
            let geometry = Geometry::sphere(
                marker.radius,
                marker.width_segments,
                marker.height_segments,
            );
            let mesh = Mesh::new(Arc::new(geometry), marker.material.clone());
            scene.add(SceneNode::mesh(Self::MARKER, mesh))
        });
        let interaction = marker.map(|marker| Interaction::new(config.interaction, marker));

        let viewport = Viewport {
            width: width.max(1),
            height: height.max(1),
            pixel_ratio: config.render.pixel_ratio.unwrap_or(1.0),
        };
        log::info!(
            "showcase set up with {} effects at {}x{}",
            config.effects.effects().len(),
            viewport.width,
            viewport.height
        );

        Self {
            config,
            scene,
            camera,
            projection,
            controls,
            pointer: Pointer::default(),
            viewport,
            interaction,
            model: None,
            marker,
        }
    }

    /**
     * Places a loaded model: applies the configured transform and materials and adds
     * it to the scene inside a pivot group. Adds exactly one root node.
     */
    pub fn on_model_loaded(&mut self, mut model: SceneNode) -> NodeHandle {
        self.config.model.apply(&mut model);
        let mut pivot = SceneNode::group(Self::PIVOT);
        pivot.add_child(model);
        let handle = self.scene.add(pivot);
        self.model = Some(handle);
        if let Some(interaction) = self.interaction.as_mut() {
            interaction.set_target(handle);
        }
        handle
    }

    pub fn on_environment_loaded(&mut self, mut environment: EnvironmentTexture) {
        environment.mapping = self.config.environment_mapping;
        let environment = Arc::new(environment);
        if self.config.environment_as_background {
            self.scene.background = Some(environment.clone());
        }
        self.scene.environment = Some(environment);
    }

    /// Ignores zero sizes so a minimized window keeps its last aspect ratio.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.projection.resize(width, height);
        self.viewport.width = width;
        self.viewport.height = height;
    }

    pub fn set_pixel_ratio(&mut self, pixel_ratio: f64) {
        self.viewport.pixel_ratio = self.config.render.pixel_ratio.unwrap_or(pixel_ratio);
    }

    /// Pointer position in physical pixels.
    pub fn pointer_moved(&mut self, x: f64, y: f64) {
        self.pointer = Pointer::from_physical(x, y, self.viewport.width, self.viewport.height);
    }

    /// Advances one frame: controls first, then the interaction step.
    pub fn frame(&mut self, dt: Duration) -> Option<Intersection> {
        self.controls.update(&mut self.camera, &self.projection);
        let interaction = self.interaction.as_mut()?;
        let frame = FrameContext {
            camera: &self.camera,
            projection: &self.projection,
            pointer: self.pointer,
            dt,
        };
        interaction.step(&mut self.scene, &frame)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn model(&self) -> Option<NodeHandle> {
        self.model
    }

    pub fn marker(&self) -> Option<NodeHandle> {
        self.marker
    }

    pub fn marker_transform(&self) -> Option<Instance> {
        self.scene.get(self.marker?).map(|node| node.local)
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.config.render
    }

    pub fn composer(&self) -> &EffectComposer {
        &self.config.effects
    }

    pub fn selection(&self) -> Selection {
        Selection::from_scene(&self.scene)
    }

    /// Moves the marker directly, e.g. to reset it.
    pub fn place_marker(&mut self, position: Vector3<f32>) {
        if let Some(node) = self.marker.and_then(|marker| self.scene.get_mut(marker)) {
            node.local.position = position;
        }
    }
}
