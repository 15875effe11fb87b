#![cfg(target_arch = "wasm32")]

use std::sync::Arc;

use log::{info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use winit::dpi::LogicalSize;
use winit::event::{DeviceEvent, ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::platform::web::{EventLoopExtWebSys, WindowAttributesExtWebSys};
use winit::window::Window;

use crate::app::{log_level_summary, map_keycode, map_mouse_button, sync_cursor, GameHost};
use crate::{GameConfig, Level, PointerCapture, Renderer, ShooterGame, StatusSink};

#[wasm_bindgen(start)]
pub fn init_logging() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::new(log::Level::Info));
}

/// Starts the game on the canvas with id `canvas_id`. `status` receives every
/// status line change. `level_xml` replaces the built-in level when given.
#[wasm_bindgen]
pub async fn run(
    canvas_id: String,
    status: js_sys::Function,
    level_xml: Option<String>,
) -> Result<(), JsValue> {
    let level = match level_xml {
        Some(xml) => Level::from_xml(&xml),
        None => Level::builtin(),
    }
    .map_err(|err| JsValue::from_str(&format!("failed to parse level: {err}")))?;
    let config = GameConfig::default();
    config
        .fits_cell(level.map.cell_size())
        .map_err(|err| JsValue::from_str(&format!("level does not fit the player: {err}")))?;

    let status = StatusSink::new(Box::new(move |line: &str| {
        if let Err(err) = status.call1(&JsValue::NULL, &JsValue::from_str(line)) {
            web_sys::console::error_1(&err);
        }
    }));
    let capture = PointerCapture::new();
    let max_delta = config.max_frame_delta;
    let (width, height) = (config.window_width, config.window_height);
    let game = ShooterGame::new(level, config, capture.handle(), status);
    let mut host = GameHost::new(Box::new(game), capture, width, height, max_delta);

    let canvas = match find_canvas(&canvas_id) {
        Ok(canvas) => canvas,
        Err(reason) => {
            host.environment_failed(&reason);
            return Err(JsValue::from_str(&reason));
        }
    };

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            let reason = format!("failed to create event loop: {err}");
            host.environment_failed(&reason);
            return Err(JsValue::from_str(&reason));
        }
    };
    #[allow(deprecated)]
    let window = event_loop.create_window(
        Window::default_attributes()
            .with_canvas(Some(canvas))
            .with_title("Arena3D")
            .with_inner_size(LogicalSize::new(width as f64, height as f64)),
    );
    let window = match window {
        Ok(window) => Arc::new(window),
        Err(err) => {
            let reason = format!("window error: {err}");
            host.environment_failed(&reason);
            return Err(JsValue::from_str(&reason));
        }
    };

    let renderer = match Renderer::new(Arc::clone(&window)).await {
        Ok(renderer) => renderer,
        Err(err) => {
            // The game stays in its unsupported state; the page keeps the status line.
            host.environment_failed(&err.to_string());
            host.shutdown();
            return Ok(());
        }
    };
    let size = window.inner_size();
    host.resize(size.width, size.height);
    log_level_summary(host.game());

    let mut app = WebAppState {
        renderer,
        host,
        cursor_grabbed: false,
    };

    #[allow(deprecated)]
    event_loop.spawn(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        if let Err(err) = app.process_event(&event, elwt) {
            web_sys::console::error_1(&JsValue::from_str(&format!("Error: {err}")));
            elwt.exit();
        }
    });

    Ok(())
}

fn find_canvas(canvas_id: &str) -> Result<web_sys::HtmlCanvasElement, String> {
    let window = web_sys::window().ok_or("missing window")?;
    let document = window.document().ok_or("missing document")?;
    let element = document
        .get_element_by_id(canvas_id)
        .ok_or("canvas element not found")?;
    element
        .dyn_into()
        .map_err(|_| "element is not a canvas".to_string())
}

fn now_seconds() -> f64 {
    web_sys::window()
        .and_then(|window| window.performance())
        .map(|performance| performance.now() / 1000.0)
        .unwrap_or(0.0)
}

struct WebAppState {
    renderer: Renderer,
    host: GameHost<ShooterGame>,
    cursor_grabbed: bool,
}

impl WebAppState {
    fn process_event(&mut self, event: &Event<()>, elwt: &ActiveEventLoop) -> Result<(), String> {
        match event {
            Event::WindowEvent { event, window_id } if *window_id == self.renderer.window_id() => {
                match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::Resized(size) => {
                        self.renderer.resize(*size);
                        self.host.resize(size.width, size.height);
                    }
                    WindowEvent::ScaleFactorChanged { .. } => {
                        let size = self.renderer.window().inner_size();
                        self.renderer.resize(size);
                        self.host.resize(size.width, size.height);
                    }
                    WindowEvent::Focused(false) => self.host.focus_lost(),
                    WindowEvent::KeyboardInput { event, .. } => self.handle_keyboard(event),
                    WindowEvent::MouseInput { state, button, .. } => {
                        let button = map_mouse_button(*button);
                        match state {
                            ElementState::Pressed => self.host.mouse_down(button),
                            ElementState::Released => self.host.mouse_up(button),
                        }
                    }
                    WindowEvent::RedrawRequested => self.redraw()?,
                    _ => {}
                }
            }
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion { delta },
                ..
            } => {
                self.host.mouse_moved(delta.0 as f32, delta.1 as f32);
            }
            Event::AboutToWait => {
                self.renderer.window().request_redraw();
            }
            Event::LoopExiting => {
                self.host.shutdown();
                info!("game loop stopped after {} frame(s)", self.host.frames());
            }
            _ => {}
        }
        self.sync_cursor();
        Ok(())
    }

    fn redraw(&mut self) -> Result<(), String> {
        let frame = self.host.tick(now_seconds());
        if let Err(err) = self.renderer.render(frame) {
            match err {
                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                    let size = self.renderer.window().inner_size();
                    self.renderer.resize(size);
                }
                wgpu::SurfaceError::OutOfMemory => {
                    return Err("GPU is out of memory".to_string());
                }
                wgpu::SurfaceError::Timeout => {
                    warn!("Surface timeout; retrying next frame");
                }
                wgpu::SurfaceError::Other => {
                    warn!("Surface reported an unknown error; retrying next frame");
                }
            }
        }
        Ok(())
    }

    fn handle_keyboard(&mut self, event: &KeyEvent) {
        let Some(keycode) = map_keycode(&event.physical_key) else {
            return;
        };
        if event.repeat {
            return;
        }
        match event.state {
            ElementState::Pressed => self.host.key_down(keycode),
            ElementState::Released => self.host.key_up(keycode),
        }
    }

    fn sync_cursor(&mut self) {
        let captured = self.host.capture().is_captured();
        if captured == self.cursor_grabbed {
            return;
        }
        self.cursor_grabbed = sync_cursor(self.renderer.window(), captured);
        if captured && !self.cursor_grabbed {
            self.host.capture().mark_unavailable();
        }
    }
}
