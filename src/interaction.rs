//! Per-frame pointer interaction.
//!
//! Each frame the model may be spun around +Y, a ray is cast from the pointer (or the
//! camera's forward axis) into the model and the marker node is moved to the nearest hit.
//! Nothing is carried over between frames except the node transforms themselves.

use std::time::Duration;

use cgmath::{
    InnerSpace, Matrix4, Quaternion, Rad, Rotation, Rotation3, SquareMatrix, Vector2, Vector3,
};

use crate::{
    camera::{Camera, Projection},
    data_structures::scene_graph::{NodeHandle, Scene},
    raycast::{Intersection, Raycaster},
};

/// Pointer position in normalized device coordinates: x right, y up, both in -1..1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pointer {
    pub ndc: Vector2<f32>,
}

impl Default for Pointer {
    fn default() -> Self {
        Self {
            ndc: Vector2::new(0.0, 0.0),
        }
    }
}

impl Pointer {
    /// Converts a position in physical pixels (origin top left) into device coordinates.
    pub fn from_physical(x: f64, y: f64, width: u32, height: u32) -> Self {
        let w = width.max(1) as f64;
        let h = height.max(1) as f64;
        Self {
            ndc: Vector2::new((x / w * 2.0 - 1.0) as f32, -(y / h * 2.0 - 1.0) as f32),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaySource {
    Pointer,
    CameraForward,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InteractionConfig {
    /// Rotation of the target around +Y per frame, in radians.
    pub spin_per_frame: f32,
    pub ray_source: RaySource,
    /// Turn the marker so its +Z axis points along the surface normal.
    pub orient_to_normal: bool,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            spin_per_frame: 0.0,
            ray_source: RaySource::Pointer,
            orient_to_normal: false,
        }
    }
}

/// Everything a frame step reads but doesn't own.
#[derive(Clone, Copy, Debug)]
pub struct FrameContext<'a> {
    pub camera: &'a Camera,
    pub projection: &'a Projection,
    pub pointer: Pointer,
    /// Time since the previous frame. The spin is a fixed step per frame, so this is only logged.
    pub dt: Duration,
}

#[derive(Debug)]
pub struct Interaction {
    pub config: InteractionConfig,
    target: Option<NodeHandle>,
    marker: NodeHandle,
    raycaster: Raycaster,
}

impl Interaction {
    pub fn new(config: InteractionConfig, marker: NodeHandle) -> Self {
        Self {
            config,
            target: None,
            marker,
            raycaster: Raycaster::default(),
        }
    }

    /// The subtree rays are cast against. Until one is set every step misses.
    pub fn set_target(&mut self, target: NodeHandle) {
        self.target = Some(target);
    }

    pub fn target(&self) -> Option<NodeHandle> {
        self.target
    }

    pub fn marker(&self) -> NodeHandle {
        self.marker
    }

    /**
     * Runs one frame: spin, cast and move the marker to the nearest hit.
     * Without a hit the marker keeps the transform it already has.
     */
    pub fn step(&mut self, scene: &mut Scene, frame: &FrameContext) -> Option<Intersection> {
        let target = self.target?;

        if self.config.spin_per_frame != 0.0 {
            if let Some(node) = scene.get_mut(target) {
                let spin = Quaternion::from_angle_y(Rad(self.config.spin_per_frame));
                node.local.rotation = (spin * node.local.rotation).normalize();
            }
        }

        match self.config.ray_source {
            RaySource::Pointer => {
                self.raycaster
                    .set_from_camera(frame.pointer.ndc, frame.camera, frame.projection)
            }
            RaySource::CameraForward => self.raycaster.set_from_camera_forward(frame.camera),
        }

        let node = scene.get(target)?;
        let hit = self
            .raycaster
            .intersect_node(node, &Matrix4::identity(), true)
            .into_iter()
            .next()?;
        log::trace!(
            "pointer over {} at {:?}, {:?} after the last frame",
            hit.node,
            hit.point,
            frame.dt
        );

        let marker = scene.get_mut(self.marker)?;
        marker.local.position = Vector3::new(hit.point.x, hit.point.y, hit.point.z);
        if self.config.orient_to_normal {
            marker.local.rotation = orient_z_to(hit.normal);
        }
        Some(hit)
    }
}

/// Shortest rotation taking +Z onto `normal`.
pub fn orient_z_to(normal: Vector3<f32>) -> Quaternion<f32> {
    let normal = normal.normalize();
    // between_vectors is undefined for opposite vectors
    if normal.dot(Vector3::unit_z()) < -0.999_999 {
        return Quaternion::from_angle_y(Rad(std::f32::consts::PI));
    }
    Quaternion::between_vectors(Vector3::unit_z(), normal)
}
