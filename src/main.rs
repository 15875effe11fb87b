use std::any::Any;
use std::env;
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use pollster::block_on;
use winit::dpi::LogicalSize;
use winit::event::{DeviceEvent, ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::Window;

use arena3d::app::{
    final_state_report, log_level_summary, map_keycode, map_mouse_button, sync_cursor, GameHost,
};
use arena3d::{GameConfig, Level, PointerCapture, Renderer, ShooterGame, StatusSink};

const HEADLESS_STEP: f32 = 1.0 / 60.0;
const DEFAULT_HEADLESS_FRAMES: u64 = 120;

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let level = match &options.level {
        Some(path) => {
            let xml = fs::read_to_string(path)
                .with_context(|| format!("failed to read level {path}"))?;
            Level::from_xml(&xml).with_context(|| format!("failed to parse level {path}"))?
        }
        None => Level::builtin().context("built-in level is invalid")?,
    };
    let config = match &options.config {
        Some(path) => {
            let xml = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {path}"))?;
            GameConfig::from_xml(&xml).with_context(|| format!("failed to parse config {path}"))?
        }
        None => GameConfig::default(),
    };
    config
        .fits_cell(level.map.cell_size())
        .with_context(|| format!("config does not fit level '{}'", level.name))?;

    println!(
        "Loaded level '{}' ({}x{} cells, {} enemies, {} pickups, {} lights)",
        level.name,
        level.map.width(),
        level.map.height(),
        level.enemies.len(),
        level.pickups.len(),
        level.lights.len()
    );

    if options.headless {
        return run_headless(level, config, options.frames);
    }

    let fallback = (level.clone(), config.clone());
    match run_interactive(level, config) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!("{err}. The game cannot run without a 3D drawing context.");
                let (level, config) = fallback;
                report_environment_failure(level, config, &err.to_string());
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

fn headless_host(level: Level, config: GameConfig) -> GameHost<ShooterGame> {
    let capture = PointerCapture::new();
    let status = StatusSink::new(Box::new(|line: &str| debug!("status: {line}")));
    let (width, height, max_delta) = (
        config.window_width,
        config.window_height,
        config.max_frame_delta,
    );
    let game = ShooterGame::new(level, config, capture.handle(), status);
    GameHost::new(Box::new(game), capture, width, height, max_delta)
}

fn run_headless(level: Level, config: GameConfig, frames: u64) -> Result<()> {
    let mut host = headless_host(level, config);
    log_level_summary(host.game());
    for _ in 0..frames {
        host.step(HEADLESS_STEP);
    }
    println!("Simulated {} frame(s)", host.frames());
    host.shutdown();
    println!("{}", final_state_report(host.game()));
    Ok(())
}

fn report_environment_failure(level: Level, config: GameConfig, reason: &str) {
    let mut host = headless_host(level, config);
    host.environment_failed(reason);
    host.shutdown();
    println!("{}", final_state_report(host.game()));
}

fn run_interactive(level: Level, config: GameConfig) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;

    #[allow(deprecated)]
    let window = Arc::new(
        event_loop
            .create_window(
                Window::default_attributes()
                    .with_title(format!("Arena3D - {}", level.name))
                    .with_inner_size(LogicalSize::new(
                        config.window_width as f64,
                        config.window_height as f64,
                    )),
            )
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );
    let renderer = block_on(Renderer::new(Arc::clone(&window)))
        .map_err(|err| WindowInitError::from_error("renderer", err))?;

    let capture = PointerCapture::new();
    let title_window = Arc::clone(&window);
    let level_name = level.name.clone();
    let status = StatusSink::new(Box::new(move |line: &str| {
        title_window.set_title(&format!("Arena3D - {level_name} - {line}"));
    }));
    let size = window.inner_size();
    let max_delta = config.max_frame_delta;
    let game = ShooterGame::new(level, config, capture.handle(), status);
    let host = GameHost::new(Box::new(game), capture, size.width, size.height, max_delta);
    log_level_summary(host.game());

    let mut app = AppState {
        renderer,
        host,
        started: Instant::now(),
        cursor_grabbed: false,
        last_error: None,
    };

    #[allow(deprecated)]
    let result = event_loop.run(|event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        if let Err(err) = app.process_event(&event, elwt) {
            app.last_error = Some(err);
            elwt.exit();
        }
    });
    result.context("event loop terminated abnormally")?;

    println!("{}", final_state_report(app.host.game()));
    if let Some(err) = app.last_error {
        return Err(err);
    }
    Ok(())
}

struct AppState {
    renderer: Renderer,
    host: GameHost<ShooterGame>,
    started: Instant,
    cursor_grabbed: bool,
    last_error: Option<anyhow::Error>,
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

impl AppState {
    fn process_event(&mut self, event: &Event<()>, elwt: &ActiveEventLoop) -> Result<()> {
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
            }
            _ => {}
        }
        self.sync_cursor();
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let now = self.started.elapsed().as_secs_f64();
        let frame = self.host.tick(now);
        if let Err(err) = self.renderer.render(frame) {
            match err {
                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                    let size = self.renderer.window().inner_size();
                    self.renderer.resize(size);
                }
                wgpu::SurfaceError::OutOfMemory => {
                    return Err(anyhow!("GPU is out of memory"));
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

struct CliOptions {
    level: Option<String>,
    config: Option<String>,
    headless: bool,
    frames: u64,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut options = Self {
            level: None,
            config: None,
            headless: false,
            frames: DEFAULT_HEADLESS_FRAMES,
        };
        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--level" => options.level = Some(Self::value(&mut args, "--level")?),
                "--config" => options.config = Some(Self::value(&mut args, "--config")?),
                "--headless" => options.headless = true,
                "--frames" => {
                    let value = Self::value(&mut args, "--frames")?;
                    options.frames = value
                        .parse()
                        .with_context(|| format!("invalid frame count: {value}"))?;
                }
                other => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Usage: arena3d [--level <file.xml>] [--config <file.xml>] [--headless] [--frames N]"
                    ));
                }
            }
        }
        Ok(options)
    }

    fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
        args.next()
            .ok_or_else(|| anyhow!("{flag} expects a value"))
    }
}
