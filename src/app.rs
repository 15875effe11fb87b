//! Game-loop host shared by the native and wasm front ends.
//!
//! The host owns the held-input set, the CPU-side [`Frame`] and the pointer
//! capture resource. Platform code feeds it window events and timestamps and
//! presents whatever frame it returns.

use log::{debug, info, warn};
use winit::event::MouseButton as WinitMouseButton;
use winit::keyboard::{KeyCode as WinitKey, PhysicalKey};
use winit::window::{CursorGrabMode, Window};

use crate::game::Game;
use crate::input::{InputState, KeyCode, MouseButton, NamedKey, PointerCapture};
use crate::render::Frame;
use crate::shooter::{RunState, ShooterGame};

/// Turns absolute timestamps into clamped frame deltas.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Option<f64>,
    max_delta: f32,
}

impl FrameClock {
    pub fn new(max_delta: f32) -> Self {
        Self {
            last: None,
            max_delta: max_delta.max(0.0),
        }
    }

    /// Returns the seconds elapsed since the previous tick, clamped to the
    /// configured maximum. The first tick yields zero.
    pub fn tick(&mut self, now: f64) -> f32 {
        let dt = match self.last {
            Some(last) => (now - last).max(0.0) as f32,
            None => 0.0,
        };
        self.last = Some(now);
        dt.min(self.max_delta)
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

pub struct GameHost<G: Game + ?Sized = dyn Game> {
    game: Box<G>,
    input: InputState,
    frame: Frame,
    capture: PointerCapture,
    clock: FrameClock,
    frames: u64,
}

impl<G: Game + ?Sized> GameHost<G> {
    pub fn new(
        game: Box<G>,
        capture: PointerCapture,
        width: u32,
        height: u32,
        max_delta: f32,
    ) -> Self {
        Self {
            game,
            input: InputState::new(),
            frame: Frame::new(width, height),
            capture,
            clock: FrameClock::new(max_delta),
            frames: 0,
        }
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut G {
        &mut self.game
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn capture(&self) -> &PointerCapture {
        &self.capture
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.frame.width = width.max(1);
        self.frame.height = height.max(1);
    }

    pub fn key_down(&mut self, key: KeyCode) {
        self.input.set_key_down(key);
        if let Some(handler) = self.game.key_handler() {
            handler.on_key_down(key);
        }
    }

    pub fn key_up(&mut self, key: KeyCode) {
        self.input.set_key_up(key);
        if let Some(handler) = self.game.key_handler() {
            handler.on_key_up(key);
        }
    }

    pub fn mouse_down(&mut self, button: MouseButton) {
        self.input.set_mouse_button_down(button);
        if let Some(handler) = self.game.pointer_handler() {
            handler.on_mouse_down(button);
        }
    }

    pub fn mouse_up(&mut self, button: MouseButton) {
        self.input.set_mouse_button_up(button);
        if let Some(handler) = self.game.pointer_handler() {
            handler.on_mouse_up(button);
        }
    }

    /// Relative pointer motion in pixels.
    pub fn mouse_moved(&mut self, dx: f32, dy: f32) {
        if let Some(handler) = self.game.pointer_handler() {
            handler.on_mouse_move(dx, dy);
        }
    }

    /// Held inputs are forgotten and pointer capture is dropped.
    pub fn focus_lost(&mut self) {
        self.input.clear();
        self.capture.release_all();
    }

    pub fn environment_failed(&mut self, reason: &str) {
        self.capture.release_all();
        self.game.environment_failed(reason);
    }

    /// Advances using a wall-clock timestamp in seconds.
    pub fn tick(&mut self, now: f64) -> &Frame {
        let dt = self.clock.tick(now);
        self.step(dt)
    }

    /// Runs one update and draw with an explicit delta.
    pub fn step(&mut self, dt: f32) -> &Frame {
        let dt = if dt.is_finite() {
            dt.clamp(0.0, self.clock.max_delta)
        } else {
            0.0
        };
        self.game.update(dt, &self.input);
        self.frame.begin(self.frame.width, self.frame.height);
        self.game.draw(&mut self.frame);
        if self.game.game_over() && self.game.auto_restart() {
            debug!("auto-restarting after frame {}", self.frames);
            self.game.reset();
        }
        self.frames += 1;
        &self.frame
    }

    /// Tears the current game down before `make` builds its successor. The
    /// frame starts empty so the old game's static geometry is not kept.
    pub fn switch_game(&mut self, make: impl FnOnce(&PointerCapture) -> Box<G>) {
        self.game.cleanup();
        self.capture.release_all();
        self.input.clear();
        self.clock.reset();
        self.frame = Frame::new(self.frame.width, self.frame.height);
        self.game = make(&self.capture);
        self.frames = 0;
    }

    pub fn shutdown(&mut self) {
        self.game.cleanup();
        self.capture.release_all();
    }
}

/// Mirrors the capture state onto the OS cursor. Returns the state that was
/// actually applied.
pub fn sync_cursor(window: &Window, captured: bool) -> bool {
    if captured {
        let grabbed = window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
        if let Err(err) = grabbed {
            warn!("cursor grab unavailable: {err}");
            return false;
        }
        window.set_cursor_visible(false);
        true
    } else {
        if let Err(err) = window.set_cursor_grab(CursorGrabMode::None) {
            warn!("failed to release cursor grab: {err}");
        }
        window.set_cursor_visible(true);
        false
    }
}

pub fn map_mouse_button(button: WinitMouseButton) -> MouseButton {
    let index = match button {
        WinitMouseButton::Left => 0,
        WinitMouseButton::Right => 1,
        WinitMouseButton::Middle => 2,
        WinitMouseButton::Back => 3,
        WinitMouseButton::Forward => 4,
        WinitMouseButton::Other(value) => u8::try_from(value).unwrap_or(u8::MAX),
    };
    MouseButton::new(index)
}

pub fn map_keycode(key: &PhysicalKey) -> Option<KeyCode> {
    let PhysicalKey::Code(code) = key else {
        return None;
    };
    Some(match code {
        WinitKey::Space => KeyCode::Named(NamedKey::Space),
        WinitKey::Enter | WinitKey::NumpadEnter => KeyCode::Named(NamedKey::Enter),
        WinitKey::ArrowLeft => KeyCode::Named(NamedKey::Left),
        WinitKey::ArrowRight => KeyCode::Named(NamedKey::Right),
        WinitKey::ArrowUp => KeyCode::Named(NamedKey::Up),
        WinitKey::ArrowDown => KeyCode::Named(NamedKey::Down),
        WinitKey::Escape => KeyCode::Named(NamedKey::Escape),
        WinitKey::ShiftLeft => KeyCode::Named(NamedKey::LeftShift),
        WinitKey::ShiftRight => KeyCode::Named(NamedKey::RightShift),
        WinitKey::Digit0 => KeyCode::Digit(0),
        WinitKey::Digit1 => KeyCode::Digit(1),
        WinitKey::Digit2 => KeyCode::Digit(2),
        WinitKey::Digit3 => KeyCode::Digit(3),
        WinitKey::Digit4 => KeyCode::Digit(4),
        WinitKey::Digit5 => KeyCode::Digit(5),
        WinitKey::Digit6 => KeyCode::Digit(6),
        WinitKey::Digit7 => KeyCode::Digit(7),
        WinitKey::Digit8 => KeyCode::Digit(8),
        WinitKey::Digit9 => KeyCode::Digit(9),
        WinitKey::KeyA => KeyCode::Character('A'),
        WinitKey::KeyB => KeyCode::Character('B'),
        WinitKey::KeyC => KeyCode::Character('C'),
        WinitKey::KeyD => KeyCode::Character('D'),
        WinitKey::KeyE => KeyCode::Character('E'),
        WinitKey::KeyF => KeyCode::Character('F'),
        WinitKey::KeyG => KeyCode::Character('G'),
        WinitKey::KeyH => KeyCode::Character('H'),
        WinitKey::KeyI => KeyCode::Character('I'),
        WinitKey::KeyJ => KeyCode::Character('J'),
        WinitKey::KeyK => KeyCode::Character('K'),
        WinitKey::KeyL => KeyCode::Character('L'),
        WinitKey::KeyM => KeyCode::Character('M'),
        WinitKey::KeyN => KeyCode::Character('N'),
        WinitKey::KeyO => KeyCode::Character('O'),
        WinitKey::KeyP => KeyCode::Character('P'),
        WinitKey::KeyQ => KeyCode::Character('Q'),
        WinitKey::KeyR => KeyCode::Character('R'),
        WinitKey::KeyS => KeyCode::Character('S'),
        WinitKey::KeyT => KeyCode::Character('T'),
        WinitKey::KeyU => KeyCode::Character('U'),
        WinitKey::KeyV => KeyCode::Character('V'),
        WinitKey::KeyW => KeyCode::Character('W'),
        WinitKey::KeyX => KeyCode::Character('X'),
        WinitKey::KeyY => KeyCode::Character('Y'),
        WinitKey::KeyZ => KeyCode::Character('Z'),
        _ => return None,
    })
}

/// Multi-line summary printed when a run ends.
pub fn final_state_report(game: &ShooterGame) -> String {
    let world = game.world();
    let player = &world.player;
    let camera = game.camera();
    let state = match game.state() {
        RunState::Playing => "playing",
        RunState::Dead => "dead",
        RunState::LevelComplete => "level complete",
        RunState::Unsupported => "unsupported",
    };
    let owned: Vec<&str> = player.owned.iter().map(|weapon| weapon.spec().name).collect();
    format!(
        "Final state:\n - state: {state}\n - time: {:.2}s\n - position=({:.2}, {:.2}, {:.2}) yaw={:.1}\n - health {:.0}/{:.0} armor {:.0}/{:.0} ammo {}/{}\n - weapon {} (owned: {})\n - kills {}/{}\nStatus: {}",
        game.time(),
        camera.position.x,
        camera.position.y,
        camera.position.z,
        camera.yaw.to_degrees(),
        player.health.max(0.0).ceil(),
        player.max_health,
        player.armor.max(0.0).ceil(),
        player.max_armor,
        player.ammo,
        player.max_ammo,
        player.active.spec().name,
        owned.join(", "),
        world.kills,
        world.total_enemies,
        game.status()
    )
}

pub fn log_level_summary(game: &ShooterGame) {
    let level = game.level();
    info!(
        "running '{}' ({} enemies, {} pickups)",
        level.name,
        level.enemies.len(),
        level.pickups.len()
    );
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::{Vec2, Vec3};

    use super::*;
    use crate::game::{KeyHandler, PointerHandler};
    use crate::input::CaptureHandle;
    use crate::render::VertexBatch;

    #[derive(Default)]
    struct Calls {
        updates: Vec<f32>,
        draws: usize,
        resets: usize,
        keys: Vec<KeyCode>,
        moves: Vec<(f32, f32)>,
        cleanups: usize,
    }

    struct Recorder {
        calls: Rc<RefCell<Calls>>,
        over: bool,
        restart: bool,
        handles_input: bool,
        static_rects: usize,
        capture: CaptureHandle,
    }

    impl Recorder {
        fn new(capture: &PointerCapture, calls: &Rc<RefCell<Calls>>) -> Self {
            Self {
                calls: Rc::clone(calls),
                over: false,
                restart: false,
                handles_input: true,
                static_rects: 0,
                capture: capture.handle(),
            }
        }
    }

    impl Game for Recorder {
        fn reset(&mut self) {
            self.calls.borrow_mut().resets += 1;
            self.over = false;
        }

        fn update(&mut self, dt: f32, _input: &InputState) {
            self.calls.borrow_mut().updates.push(dt);
        }

        fn draw(&self, frame: &mut Frame) {
            self.calls.borrow_mut().draws += 1;
            if self.static_rects > 0 {
                let mut geometry = VertexBatch::new();
                for index in 0..self.static_rects {
                    geometry.push_rect(Vec2::splat(index as f32), Vec2::ONE, Vec3::ONE);
                }
                frame.set_static(1, &geometry);
            }
        }

        fn environment_failed(&mut self, _reason: &str) {
            self.over = true;
        }

        fn game_over(&self) -> bool {
            self.over
        }

        fn auto_restart(&self) -> bool {
            self.restart
        }

        fn key_handler(&mut self) -> Option<&mut dyn KeyHandler> {
            if self.handles_input {
                Some(self)
            } else {
                None
            }
        }

        fn pointer_handler(&mut self) -> Option<&mut dyn PointerHandler> {
            if self.handles_input {
                Some(self)
            } else {
                None
            }
        }

        fn cleanup(&mut self) {
            self.calls.borrow_mut().cleanups += 1;
            self.capture.release();
        }
    }

    impl KeyHandler for Recorder {
        fn on_key_down(&mut self, key: KeyCode) {
            self.calls.borrow_mut().keys.push(key);
        }
    }

    impl PointerHandler for Recorder {
        fn on_mouse_move(&mut self, dx: f32, dy: f32) {
            self.calls.borrow_mut().moves.push((dx, dy));
        }

        fn on_mouse_down(&mut self, _button: MouseButton) {
            self.capture.request();
        }
    }

    fn host(recorder: Recorder, capture: PointerCapture) -> GameHost<Recorder> {
        GameHost::new(Box::new(recorder), capture, 640, 480, 0.033)
    }

    #[test]
    fn frame_clock_clamps_large_gaps() {
        let mut clock = FrameClock::new(0.033);
        assert_eq!(clock.tick(10.0), 0.0);
        assert!((clock.tick(10.016) - 0.016).abs() < 1e-6);
        assert_eq!(clock.tick(15.0), 0.033);
        assert_eq!(clock.tick(14.0), 0.0);
    }

    #[test]
    fn step_updates_then_draws_with_clamped_delta() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let capture = PointerCapture::new();
        let mut host = host(Recorder::new(&capture, &calls), capture);
        host.step(0.5);
        host.step(f32::NAN);
        assert_eq!(calls.borrow().updates, vec![0.033, 0.0]);
        assert_eq!(calls.borrow().draws, 2);
        assert_eq!(host.frames(), 2);
    }

    #[test]
    fn auto_restart_requires_both_flags() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let capture = PointerCapture::new();
        let mut host = host(Recorder::new(&capture, &calls), capture);
        host.game_mut().over = true;
        host.step(0.016);
        assert_eq!(calls.borrow().resets, 0);
        host.game_mut().restart = true;
        host.step(0.016);
        assert_eq!(calls.borrow().resets, 1);
        assert!(!host.game().game_over());
    }

    #[test]
    fn edges_reach_only_games_with_handlers() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let capture = PointerCapture::new();
        let mut recorder = Recorder::new(&capture, &calls);
        recorder.handles_input = false;
        let mut host = host(recorder, capture);
        host.key_down(KeyCode::Character('W'));
        host.mouse_moved(3.0, 4.0);
        assert!(calls.borrow().keys.is_empty());
        assert!(calls.borrow().moves.is_empty());
        assert!(host.input().is_key_down(KeyCode::Character('W')));

        host.game_mut().handles_input = true;
        host.key_down(KeyCode::Digit(2));
        host.mouse_moved(3.0, 4.0);
        assert_eq!(calls.borrow().keys, vec![KeyCode::Digit(2)]);
        assert_eq!(calls.borrow().moves, vec![(3.0, 4.0)]);
    }

    #[test]
    fn focus_loss_releases_capture_and_held_input() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let capture = PointerCapture::new();
        let mut host = host(Recorder::new(&capture, &calls), capture);
        host.key_down(KeyCode::Character('W'));
        host.mouse_down(MouseButton::LEFT);
        assert!(host.capture().is_captured());
        host.focus_lost();
        assert!(!host.capture().is_captured());
        assert!(!host.input().is_key_down(KeyCode::Character('W')));
        assert!(!host.input().is_mouse_button_down(MouseButton::LEFT));
    }

    #[test]
    fn switching_games_cleans_up_first() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let capture = PointerCapture::new();
        let mut host = host(Recorder::new(&capture, &calls), capture);
        host.mouse_down(MouseButton::LEFT);
        host.step(0.016);
        let next_calls = Rc::new(RefCell::new(Calls::default()));
        host.switch_game(|capture| {
            assert!(!capture.is_captured());
            Box::new(Recorder::new(capture, &next_calls))
        });
        assert_eq!(calls.borrow().cleanups, 1);
        assert_eq!(host.frames(), 0);
        host.shutdown();
        assert_eq!(next_calls.borrow().cleanups, 1);
    }

    #[test]
    fn switching_games_drops_previous_static_geometry() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let capture = PointerCapture::new();
        let mut first = Recorder::new(&capture, &calls);
        first.static_rects = 4;
        let mut host = host(first, capture);
        host.step(0.016);
        assert_eq!(host.frame().static_geometry().len(), 4 * 6);

        host.switch_game(|capture| {
            let mut next = Recorder::new(capture, &calls);
            next.static_rects = 1;
            Box::new(next)
        });
        assert_eq!(host.frame().static_revision(), 0);
        assert!(host.frame().static_geometry().is_empty());
        assert_eq!((host.frame().width, host.frame().height), (640, 480));
        host.step(0.016);
        assert_eq!(host.frame().static_geometry().len(), 6);
    }

    #[test]
    fn maps_physical_keys() {
        assert_eq!(
            map_keycode(&PhysicalKey::Code(WinitKey::KeyW)),
            Some(KeyCode::Character('W'))
        );
        assert_eq!(
            map_keycode(&PhysicalKey::Code(WinitKey::Digit3)),
            Some(KeyCode::Digit(3))
        );
        assert_eq!(
            map_keycode(&PhysicalKey::Code(WinitKey::Escape)),
            Some(KeyCode::Named(NamedKey::Escape))
        );
        assert_eq!(map_keycode(&PhysicalKey::Code(WinitKey::F5)), None);
        assert_eq!(map_mouse_button(WinitMouseButton::Right), MouseButton::RIGHT);
        assert_eq!(map_mouse_button(WinitMouseButton::Other(900)).index(), u8::MAX);
    }
}
