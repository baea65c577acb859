//! Ray casting against the scene graph.
//!
//! Rays are tested in each mesh's local space: the world ray is moved through the
//! inverse world matrix, rejected early against the geometry's bounding box and
//! then tested triangle by triangle. Hits are reported in world space, nearest first.

use cgmath::{
    EuclideanSpace, InnerSpace, Matrix4, Point3, SquareMatrix, Transform, Vector2, Vector3,
    Vector4,
};

use crate::{
    camera::{Camera, Projection},
    data_structures::{instance::normal_matrix, scene_graph::SceneNode},
};

const EPSILON: f32 = 1e-7;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    /// Always normalized.
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }

    /// Moves the ray by `m`. The direction is not renormalized so that distances
    /// along the transformed ray stay comparable to the original one.
    fn transform(&self, m: &Matrix4<f32>) -> (Point3<f32>, Vector3<f32>) {
        (m.transform_point(self.origin), m.transform_vector(self.direction))
    }
}

/// Axis aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    /// An inverted box that contains nothing; growing it by any point yields that point.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Point3<f32>>) -> Self {
        points.into_iter().fold(Self::empty(), |mut aabb, p| {
            aabb.grow(p);
            aabb
        })
    }

    pub fn grow(&mut self, p: Point3<f32>) {
        self.min = Point3::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z));
        self.max = Point3::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z));
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn center(&self) -> Point3<f32> {
        self.min.midpoint(self.max)
    }

    /// Slab test. Returns the entry distance (0 when the origin is inside the box).
    pub fn intersect(&self, origin: Point3<f32>, direction: Vector3<f32>) -> Option<f32> {
        if self.is_empty() {
            return None;
        }
        let mut t_min = 0.0f32;
        let mut t_max = f32::INFINITY;
        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);
            if d.abs() < EPSILON {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t0 = (lo - o) * inv;
            let mut t1 = (hi - o) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

/// Result of a triangle test in the triangle's own space.
#[derive(Clone, Copy, Debug)]
pub struct TriangleHit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
    /// Unnormalized counter-clockwise face normal.
    pub normal: Vector3<f32>,
}

/// Möller–Trumbore, double sided: back faces are hit as well.
pub fn intersect_triangle(
    origin: Point3<f32>,
    direction: Vector3<f32>,
    [v0, v1, v2]: [Point3<f32>; 3],
) -> Option<TriangleHit> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = direction.cross(edge2);
    let a = edge1.dot(h);
    // parallel to the triangle plane
    if a.abs() < EPSILON {
        return None;
    }
    let f = 1.0 / a;
    let s = origin - v0;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = f * direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = f * edge2.dot(q);
    if t < EPSILON {
        return None;
    }
    Some(TriangleHit {
        t,
        u,
        v,
        normal: edge1.cross(edge2),
    })
}

/// A ray hit in world space.
#[derive(Clone, Debug, PartialEq)]
pub struct Intersection {
    pub point: Point3<f32>,
    /// Unit face normal in world space.
    pub normal: Vector3<f32>,
    pub distance: f32,
    /// Name of the mesh node that was hit.
    pub node: String,
}

#[derive(Clone, Copy, Debug)]
pub struct Raycaster {
    pub ray: Ray,
    pub near: f32,
    pub far: f32,
}

impl Default for Raycaster {
    fn default() -> Self {
        Self {
            ray: Ray::new(Point3::origin(), -Vector3::unit_z()),
            near: 0.0,
            far: f32::INFINITY,
        }
    }
}

impl Raycaster {
    pub fn new(ray: Ray) -> Self {
        Self {
            ray,
            ..Default::default()
        }
    }

    /**
     * Points the ray from the camera through `ndc` (x right, y up, both in -1..1).
     * The far point is found by unprojecting the ndc position at mid depth.
     */
    pub fn set_from_camera(&mut self, ndc: Vector2<f32>, camera: &Camera, projection: &Projection) {
        let view_proj = projection.calc_matrix() * camera.calc_matrix();
        let origin = camera.position;
        let direction = match view_proj.invert() {
            Some(inverse) => {
                let clip = inverse * Vector4::new(ndc.x, ndc.y, 0.5, 1.0);
                if clip.w.abs() < EPSILON {
                    camera.forward()
                } else {
                    Point3::from_homogeneous(clip) - origin
                }
            }
            None => camera.forward(),
        };
        self.ray = Ray::new(origin, direction);
    }

    /// Points the ray along the camera's viewing axis.
    pub fn set_from_camera_forward(&mut self, camera: &Camera) {
        self.ray = Ray::new(camera.position, camera.forward());
    }

    /**
     * Tests `node` (and its descendants when `recursive`) against the ray.
     * `parent_world` is the world matrix of `node`'s parent. Invisible subtrees are
     * skipped. The result is sorted by distance, nearest first.
     */
    pub fn intersect_node(
        &self,
        node: &SceneNode,
        parent_world: &Matrix4<f32>,
        recursive: bool,
    ) -> Vec<Intersection> {
        let mut hits = Vec::new();
        if recursive {
            node.traverse_world(parent_world, &mut |node, world| {
                self.intersect_mesh(node, world, &mut hits);
            });
        } else if node.visible {
            let world = parent_world * node.local.to_matrix();
            self.intersect_mesh(node, &world, &mut hits);
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    fn intersect_mesh(&self, node: &SceneNode, world: &Matrix4<f32>, hits: &mut Vec<Intersection>) {
        let Some(mesh) = node.as_mesh() else {
            return;
        };
        let Some(inverse) = world.invert() else {
            log::trace!("skipping {} with a singular world matrix", node.name);
            return;
        };
        let (origin, direction) = self.ray.transform(&inverse);
        let geometry = &mesh.geometry;
        if geometry.bounds().intersect(origin, direction).is_none() {
            return;
        }
        let normals = normal_matrix(world);

        let mut nearest: Option<Intersection> = None;
        for triangle in geometry.triangles() {
            let Some(hit) = intersect_triangle(origin, direction, triangle) else {
                continue;
            };
            let point = world.transform_point(origin + direction * hit.t);
            let distance = (point - self.ray.origin).magnitude();
            if distance < self.near || distance > self.far {
                continue;
            }
            if nearest.as_ref().is_some_and(|n| n.distance <= distance) {
                continue;
            }
            let normal = normals * hit.normal;
            let normal = if normal.magnitude2() > 0.0 {
                normal.normalize()
            } else {
                Vector3::unit_z()
            };
            nearest = Some(Intersection {
                point,
                normal,
                distance,
                node: node.name.clone(),
            });
        }
        hits.extend(nearest);
    }
}
