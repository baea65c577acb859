//! Perspective camera, its GPU uniform and orbit controls.
//!
//! The camera is a plain look-at camera (`position`, `target`, `up`). [`OrbitControls`]
//! moves it on a sphere around the target: left drag rotates, right drag pans and the
//! wheel dollies in and out.

use std::f32::consts::{FRAC_PI_2, PI};

use cgmath::*;
use wgpu::util::DeviceExt;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>>(position: P, target: P) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
            up: Vector3::unit_y(),
        }
    }

    /// View matrix.
    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    /// Unit vector from the eye towards the target.
    pub fn forward(&self) -> Vector3<f32> {
        let dir = self.target - self.position;
        if dir.magnitude2() > 0.0 {
            dir.normalize()
        } else {
            -Vector3::unit_z()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    aspect: f32,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    /// Zero sized windows (minimized) keep the previous aspect ratio.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_position: [f32; 4],
    pub view_proj: [[f32; 4]; 4],
    /// Used by the background pass to turn screen positions back into view rays.
    pub inv_view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
            inv_view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        let view_proj = projection.calc_matrix() * camera.calc_matrix();
        self.view_proj = view_proj.into();
        self.inv_view_proj = view_proj.invert().unwrap_or(Matrix4::identity()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct CameraResources {
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform = CameraUniform::new();
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn write(&mut self, queue: &wgpu::Queue, camera: &Camera, projection: &Projection) {
        self.uniform.update_view_proj(camera, projection);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Drag {
    None,
    Rotate,
    Pan,
}

/// Orbit controls: the eye sits at `radius` from `target`, `theta` around +Y and
/// `phi` down from +Y.
#[derive(Clone, Debug)]
pub struct OrbitControls {
    pub target: Point3<f32>,
    radius: f32,
    theta: f32,
    phi: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    drag: Drag,
    pending_rotate: Vector2<f32>,
    pending_pan: Vector2<f32>,
    pending_zoom: f32,
}

impl OrbitControls {
    const MIN_PHI: f32 = 1e-4;

    /// Takes the spherical coordinates from the camera's current placement.
    pub fn from_camera(camera: &Camera) -> Self {
        let offset = camera.position - camera.target;
        let radius = offset.magnitude();
        let (theta, phi) = if radius > 0.0 {
            (
                offset.x.atan2(offset.z),
                (offset.y / radius).clamp(-1.0, 1.0).acos(),
            )
        } else {
            (0.0, FRAC_PI_2)
        };
        Self {
            target: camera.target,
            radius,
            theta,
            phi,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            drag: Drag::None,
            pending_rotate: Vector2::zero(),
            pending_pan: Vector2::zero(),
            pending_zoom: 1.0,
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn is_dragging(&self) -> bool {
        self.drag != Drag::None
    }

    /// Mouse buttons start and stop drags, the wheel zooms. Returns whether the event was used.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                self.drag = match (button, state) {
                    (MouseButton::Left, ElementState::Pressed) => Drag::Rotate,
                    (MouseButton::Right, ElementState::Pressed) => Drag::Pan,
                    (_, ElementState::Released) => Drag::None,
                    _ => self.drag,
                };
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 50.0,
                };
                self.zoom(scroll);
                true
            }
            _ => false,
        }
    }

    /// Pointer movement in physical pixels. Only does something while dragging.
    pub fn handle_mouse_motion(&mut self, dx: f64, dy: f64, viewport_height: u32) {
        let height = viewport_height.max(1) as f32;
        let delta = Vector2::new(dx as f32, dy as f32);
        match self.drag {
            // a drag over the full height is a full turn
            Drag::Rotate => self.pending_rotate += delta * (2.0 * PI / height) * self.rotate_speed,
            Drag::Pan => self.pending_pan += delta / height * self.pan_speed,
            Drag::None => (),
        }
    }

    /// Positive values zoom in.
    pub fn zoom(&mut self, scroll: f32) {
        self.pending_zoom *= 0.95f32.powf(scroll * self.zoom_speed);
    }

    /// Applies the accumulated input and moves the camera.
    pub fn update(&mut self, camera: &mut Camera, projection: &Projection) {
        self.theta -= self.pending_rotate.x;
        self.phi = (self.phi - self.pending_rotate.y).clamp(Self::MIN_PHI, PI - Self::MIN_PHI);
        self.radius = (self.radius * self.pending_zoom).clamp(self.min_distance, self.max_distance);

        if self.pending_pan != Vector2::zero() {
            let forward = camera.forward();
            let right = forward.cross(camera.up).normalize();
            let up = right.cross(forward);
            // the visible height at the target distance
            let visible = 2.0 * self.radius * (projection.fovy.0 / 2.0).tan();
            let offset = (-right * self.pending_pan.x + up * self.pending_pan.y) * visible;
            self.target += offset;
        }

        self.pending_rotate = Vector2::zero();
        self.pending_pan = Vector2::zero();
        self.pending_zoom = 1.0;

        let sin_phi = self.phi.sin();
        let offset = Vector3::new(
            self.radius * sin_phi * self.theta.sin(),
            self.radius * self.phi.cos(),
            self.radius * sin_phi * self.theta.cos(),
        );
        camera.target = self.target;
        camera.position = self.target + offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn projection_keeps_aspect_on_zero_size() {
        let mut projection = Projection::new(800, 600, Deg(45.0), 0.1, 1000.0);
        projection.resize(0, 300);
        assert!(approx(projection.aspect(), 800.0 / 600.0));
        projection.resize(300, 300);
        assert!(approx(projection.aspect(), 1.0));
    }

    #[test]
    fn controls_keep_an_untouched_camera_in_place() {
        let mut camera = Camera::new((0.0, 0.3, 1.0), (0.0, 0.0, 0.0));
        let projection = Projection::new(800, 600, Deg(45.0), 0.1, 1000.0);
        let mut controls = OrbitControls::from_camera(&camera);
        controls.update(&mut camera, &projection);
        assert!(approx(camera.position.x, 0.0));
        assert!(approx(camera.position.y, 0.3));
        assert!(approx(camera.position.z, 1.0));
    }

    fn orbit() -> (Camera, Projection, OrbitControls) {
        let camera = Camera::new((0.0, 0.3, 1.0), (0.0, 0.0, 0.0));
        let projection = Projection::new(800, 600, Deg(45.0), 0.1, 1000.0);
        let controls = OrbitControls::from_camera(&camera);
        (camera, projection, controls)
    }

    #[test]
    fn rotate_drag_turns_around_the_target() {
        let (mut camera, projection, mut controls) = orbit();
        controls.drag = Drag::Rotate;
        // a quarter of the viewport height is a quarter turn
        controls.handle_mouse_motion(150.0, 0.0, 600);
        controls.update(&mut camera, &projection);

        assert!(approx(camera.position.x, -1.0));
        assert!(approx(camera.position.y, 0.3));
        assert!(approx(camera.position.z, 0.0));
        assert!(approx(controls.radius(), 1.09f32.sqrt()));
    }

    #[test]
    fn motion_without_a_drag_is_ignored() {
        let (mut camera, projection, mut controls) = orbit();
        controls.handle_mouse_motion(150.0, 80.0, 600);
        controls.update(&mut camera, &projection);
        assert!(approx(camera.position.x, 0.0));
        assert!(approx(camera.position.y, 0.3));
        assert!(approx(camera.position.z, 1.0));
    }

    #[test]
    fn pan_drag_moves_target_and_camera_together() {
        let (mut camera, projection, mut controls) = orbit();
        let offset = camera.position - camera.target;
        controls.drag = Drag::Pan;
        controls.handle_mouse_motion(60.0, 0.0, 600);
        controls.update(&mut camera, &projection);

        let visible = 2.0 * 1.09f32.sqrt() * (22.5f32).to_radians().tan();
        assert!(approx(controls.target.x, -0.1 * visible));
        assert!(approx(controls.target.y, 0.0));
        assert!(approx(controls.target.z, 0.0));
        assert_eq!(camera.target, controls.target);
        let moved = camera.position - camera.target;
        assert!(approx(moved.x, offset.x));
        assert!(approx(moved.y, offset.y));
        assert!(approx(moved.z, offset.z));
    }

    #[test]
    fn wheel_up_zooms_in() {
        let (mut camera, projection, mut controls) = orbit();
        let start = controls.radius();
        let event = WindowEvent::MouseWheel {
            device_id: unsafe { winit::event::DeviceId::dummy() },
            delta: MouseScrollDelta::LineDelta(0.0, 1.0),
            phase: winit::event::TouchPhase::Moved,
        };
        assert!(controls.handle_window_event(&event));
        controls.update(&mut camera, &projection);
        assert!(approx(controls.radius(), start * 0.95));

        controls.zoom(-2.0);
        controls.update(&mut camera, &projection);
        assert!(controls.radius() > start);
    }

    #[test]
    fn pitch_stops_short_of_the_poles() {
        let (mut camera, projection, mut controls) = orbit();
        let radius = controls.radius();
        controls.drag = Drag::Rotate;

        controls.handle_mouse_motion(0.0, 10_000.0, 600);
        controls.update(&mut camera, &projection);
        assert!(approx(controls.phi, OrbitControls::MIN_PHI));
        assert!((camera.position.y - radius).abs() < 1e-3);
        assert!(camera.position.x.is_finite() && camera.position.z.is_finite());

        controls.handle_mouse_motion(0.0, -20_000.0, 600);
        controls.update(&mut camera, &projection);
        assert!(approx(controls.phi, PI - OrbitControls::MIN_PHI));
        assert!((camera.position.y + radius).abs() < 1e-3);
    }

    #[test]
    fn zoom_respects_the_distance_limits() {
        let (mut camera, projection, mut controls) = orbit();
        controls.min_distance = 0.5;
        controls.max_distance = 2.0;

        controls.zoom(-100.0);
        controls.update(&mut camera, &projection);
        assert!(approx(controls.radius(), 2.0));
        assert!(approx((camera.position - camera.target).magnitude(), 2.0));

        controls.zoom(100.0);
        controls.update(&mut camera, &projection);
        assert!(approx(controls.radius(), 0.5));
    }
}
