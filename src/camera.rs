// src/camera.rs
use glam::{Mat4, Vec3};

/// Perspective camera with position and Euler rotation (yaw, pitch).
pub struct Camera {
    pub position: Vec3,
    /// yaw: rotation around Y axis (radians). pitch: rotation around X axis (radians).
    pub yaw: f32,
    pub pitch: f32,

    pub fovy: f32,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Camera {
    pub fn new(position: Vec3, yaw: f32, pitch: f32, aspect: f32) -> Self {
        Self {
            position,
            yaw,
            pitch,
            fovy: 45f32.to_radians(),
            aspect,
            znear: 50.0,
            zfar: 3000.0,
        }
    }

    fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw).normalize_or_zero()
    }

    /// View matrix from position + yaw/pitch (right-handed, Y up).
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    /// Perspective projection, 0..1 depth as wgpu expects.
    pub fn proj_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fovy, self.aspect, self.znear, self.zfar)
    }

    /// Update aspect ratio (call on resize).
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }
}

/// Input-agnostic fly controller: the window layer feeds it axis values and
/// mouse deltas, `update_camera` applies them.
pub struct CameraController {
    pub speed: f32,
    pub sensitivity: f32,

    // movement state, each -1.0..1.0
    pub forward: f32,
    pub right: f32,
    pub up: f32,

    // accumulated mouse deltas
    pub yaw_delta: f32,
    pub pitch_delta: f32,
}

impl CameraController {
    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self {
            speed,
            sensitivity,
            forward: 0.0,
            right: 0.0,
            up: 0.0,
            yaw_delta: 0.0,
            pitch_delta: 0.0,
        }
    }

    pub fn process_keyboard(&mut self, fwd: f32, right: f32, up: f32) {
        self.forward = fwd;
        self.right = right;
        self.up = up;
    }

    pub fn process_mouse(&mut self, dx: f32, dy: f32) {
        self.yaw_delta += dx * self.sensitivity;
        self.pitch_delta += dy * self.sensitivity;
    }

    /// Apply accumulated input to `camera`. `dt` is seconds since last update.
    pub fn update_camera(&mut self, camera: &mut Camera, dt: f32) {
        camera.yaw += self.yaw_delta;
        camera.pitch += self.pitch_delta;

        // clamp pitch to avoid gimbal flip
        let max_pitch = std::f32::consts::FRAC_PI_2 - 0.01;
        camera.pitch = camera.pitch.clamp(-max_pitch, max_pitch);

        self.yaw_delta = 0.0;
        self.pitch_delta = 0.0;

        let forward = camera.forward();
        let right_vec = forward.cross(Vec3::Y).normalize_or_zero();

        let mut displacement = Vec3::ZERO;
        displacement += forward * (self.forward * self.speed * dt);
        displacement += right_vec * (self.right * self.speed * dt);
        displacement += Vec3::Y * (self.up * self.speed * dt);

        camera.position += displacement;
    }
}

/// Everything a frame needs from the outside world, snapshotted by the window
/// layer before `run_frame`. Stages never reach into windowing or input state.
pub struct FrameContext {
    pub view: Mat4,
    pub proj: Mat4,
    pub camera_position: Vec3,
    /// Seconds since startup.
    pub time: f32,
    /// Seconds since the previous frame.
    pub dt: f32,
    /// Fragment debug view selector (0 = shaded).
    pub debug_mode: u32,
}

impl FrameContext {
    pub fn from_camera(camera: &Camera, time: f32, dt: f32, debug_mode: u32) -> Self {
        Self {
            view: camera.view_matrix(),
            proj: camera.proj_matrix(),
            camera_position: camera.position,
            time,
            dt,
            debug_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_moves_along_view_direction() {
        let mut camera = Camera::new(Vec3::ZERO, 0.0, 0.0, 16.0 / 9.0);
        let mut controller = CameraController::new(10.0, 0.002);
        controller.process_keyboard(1.0, 0.0, 0.0);
        controller.update_camera(&mut camera, 1.0);
        // yaw 0, pitch 0 looks along +Z in this parameterization
        assert!((camera.position.z - 10.0).abs() < 1e-4);
        assert!(camera.position.x.abs() < 1e-4);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::new(Vec3::ZERO, 0.0, 0.0, 1.0);
        let mut controller = CameraController::new(10.0, 1.0);
        controller.process_mouse(0.0, 100.0);
        controller.update_camera(&mut camera, 0.016);
        assert!(camera.pitch < std::f32::consts::FRAC_PI_2);
    }
}
