// src/lib.rs
//! Tiled forward-plus renderer.
//!
//! The screen is split into 16x16-pixel tiles; a compute stage culls the
//! light set down to a short per-tile index list each frame, and the forward
//! pass shades each fragment against only its own tile's list. See
//! `renderer` for the per-frame stage sequence and `frame_graph` for the
//! ordering contract between stages.

use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

pub mod bindings;
pub mod buffers;
pub mod camera;
pub mod context;
pub mod depth_prepass;
pub mod error;
pub mod fps_counter;
pub mod frame_graph;
pub mod frustum;
pub mod light_culling;
pub mod lights;
pub mod renderer;
pub mod scene;
pub mod sim;
pub mod texture;
pub mod uniforms;

pub use error::{Error, Result};

/// Tile edge in pixels.
pub const TILE_SIZE: u32 = 16;
/// Tiles per compute workgroup edge (16x16 tiles per group).
pub const TILES_PER_GROUP: u32 = 16;
/// Compile-time light buffer capacity.
pub const MAX_LIGHTS: u32 = 1024;
/// Lights actually spawned by the demo.
pub const NUM_LIGHTS: u32 = 1000;
/// Per-tile index list capacity; crowded tiles truncate to this.
pub const MAX_LIGHTS_PER_TILE: u32 = 64;

#[derive(Default)]
struct KeyState {
    forward: bool,
    back: bool,
    left: bool,
    right: bool,
    up: bool,
    down: bool,
}

impl KeyState {
    fn axes(&self) -> (f32, f32, f32) {
        let axis = |pos, neg| (pos as i32 - neg as i32) as f32;
        (
            axis(self.forward, self.back),
            axis(self.right, self.left),
            axis(self.up, self.down),
        )
    }
}

struct App {
    window: Option<Arc<Window>>,
    renderer: Option<renderer::Renderer>,

    camera: camera::Camera,
    controller: camera::CameraController,
    keys: KeyState,
    mouse_look: bool,
    debug_mode: u32,

    fps: fps_counter::FpsCounter,
    start: Instant,
}

impl App {
    fn new() -> Self {
        Self {
            window: None,
            renderer: None,
            camera: camera::Camera::new(
                glam::Vec3::new(0.0, 150.0, -600.0),
                0.0,
                -0.1,
                16.0 / 9.0,
            ),
            controller: camera::CameraController::new(400.0, 0.002),
            keys: KeyState::default(),
            mouse_look: false,
            debug_mode: 0,
            fps: fps_counter::FpsCounter::new(),
            start: Instant::now(),
        }
    }

    fn redraw(&mut self) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        let dt = self.fps.tick();
        let (fwd, right, up) = self.keys.axes();
        self.controller.process_keyboard(fwd, right, up);
        self.controller.update_camera(&mut self.camera, dt);

        let time = self.start.elapsed().as_secs_f32();
        let ctx = camera::FrameContext::from_camera(&self.camera, time, dt, self.debug_mode);
        match renderer.run_frame(&ctx) {
            Ok(()) => self.fps.log_every(240),
            // Frame errors are fatal to the frame only; the next redraw
            // starts clean.
            Err(e) => log::warn!("dropped frame: {e}"),
        }

        if let Some(window) = &self.window {
            let stats = renderer.stats();
            if stats.frames % 30 == 0 {
                let (fps, ms) = self.fps.averaged();
                window.set_title(&format!(
                    "forward-plus | {} lights | {ms:.2} ms | {fps:.0} fps",
                    stats.light_count
                ));
            }
            window.request_redraw();
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        let pressed = event.state == ElementState::Pressed;
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        match code {
            KeyCode::KeyW => self.keys.forward = pressed,
            KeyCode::KeyS => self.keys.back = pressed,
            KeyCode::KeyA => self.keys.left = pressed,
            KeyCode::KeyD => self.keys.right = pressed,
            KeyCode::KeyE => self.keys.up = pressed,
            KeyCode::KeyQ => self.keys.down = pressed,
            KeyCode::Digit0 if pressed => self.debug_mode = 0,
            KeyCode::Digit1 if pressed => self.debug_mode = 1,
            KeyCode::Digit2 if pressed => self.debug_mode = 2,
            KeyCode::Escape => event_loop.exit(),
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title("forward-plus")
            .with_inner_size(winit::dpi::PhysicalSize::new(1280u32, 720u32));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("window creation failed: {e}");
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        let size = window.inner_size();
        self.camera
            .set_aspect(size.width.max(1) as f32 / size.height.max(1) as f32);

        match pollster::block_on(renderer::Renderer::new(window.clone())) {
            Ok(mut renderer) => {
                // The frustum grid must exist before the first culling
                // dispatch; generation blocks until the GPU finishes.
                if let Err(e) = renderer.bootstrap_frustums(&self.camera.proj_matrix()) {
                    log::error!("frustum bootstrap failed: {e}");
                    event_loop.exit();
                    return;
                }
                log::debug!("frame stages: {}", renderer.stage_names().join(" -> "));
                self.renderer = Some(renderer);
            }
            Err(e) => {
                log::error!("renderer setup failed: {e}");
                event_loop.exit();
                return;
            }
        }
        window.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(new_size) if new_size.width > 0 && new_size.height > 0 => {
                self.camera
                    .set_aspect(new_size.width as f32 / new_size.height as f32);
                if let Some(renderer) = self.renderer.as_mut() {
                    let proj = self.camera.proj_matrix();
                    if let Err(e) = renderer.resize(new_size.width, new_size.height, &proj) {
                        log::error!("resize failed: {e}");
                        event_loop.exit();
                    }
                }
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, &event),
            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state,
                ..
            } => {
                self.mouse_look = state == ElementState::Pressed;
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if self.mouse_look {
                self.controller.process_mouse(dx as f32, -dy as f32);
            }
        }
    }
}

pub fn run_native() -> Result<()> {
    let event_loop = EventLoop::new()
        .map_err(|e| Error::setup("event loop", e))?;
    let mut app = App::new();
    event_loop
        .run_app(&mut app)
        .map_err(|e| Error::custom(format!("event loop exited abnormally: {e}")))
}
