//! Contract between a game and the loop host that drives it.
//!
//! A game must implement [`Game`]. Discrete input edges are optional
//! capabilities: the host asks for a [`KeyHandler`] or [`PointerHandler`] and
//! skips the notification when the game does not provide one.

use crate::input::{InputState, KeyCode, MouseButton};
use crate::render::Frame;

pub trait KeyHandler {
    fn on_key_down(&mut self, key: KeyCode);
    fn on_key_up(&mut self, _key: KeyCode) {}
}

pub trait PointerHandler {
    /// Relative pointer motion in screen pixels.
    fn on_mouse_move(&mut self, dx: f32, dy: f32);
    fn on_mouse_down(&mut self, button: MouseButton);
    fn on_mouse_up(&mut self, _button: MouseButton) {}
}

pub trait Game {
    /// Re-initializes to a fresh playable state. Safe to call at any time.
    fn reset(&mut self);

    /// Advances the simulation by `dt` seconds. Never renders.
    fn update(&mut self, dt: f32, input: &InputState);

    /// Writes the current state into `frame`. Never mutates gameplay state.
    fn draw(&self, frame: &mut Frame);

    /// The drawing environment is unusable; the game must stop simulating.
    fn environment_failed(&mut self, reason: &str);

    fn game_over(&self) -> bool;

    fn auto_restart(&self) -> bool {
        false
    }

    fn key_handler(&mut self) -> Option<&mut dyn KeyHandler> {
        None
    }

    fn pointer_handler(&mut self) -> Option<&mut dyn PointerHandler> {
        None
    }

    /// Releases externally visible resources before the game is discarded.
    fn cleanup(&mut self) {}
}

pub type StatusCallback = Box<dyn FnMut(&str)>;

/// Pushes the one-line status text to the host, skipping repeats.
pub struct StatusSink {
    callback: Option<StatusCallback>,
    last: String,
}

impl StatusSink {
    pub fn new(callback: StatusCallback) -> Self {
        Self {
            callback: Some(callback),
            last: String::new(),
        }
    }

    pub fn silent() -> Self {
        Self {
            callback: None,
            last: String::new(),
        }
    }

    /// Returns `true` if the text changed and was forwarded.
    pub fn push(&mut self, text: &str) -> bool {
        if self.last == text {
            return false;
        }
        self.last.clear();
        self.last.push_str(text);
        if let Some(callback) = self.callback.as_mut() {
            callback(text);
        }
        true
    }

    pub fn last(&self) -> &str {
        &self.last
    }
}

impl std::fmt::Debug for StatusSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusSink")
            .field("attached", &self.callback.is_some())
            .field("last", &self.last)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn status_sink_skips_repeats() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink_seen = Rc::clone(&seen);
        let mut sink = StatusSink::new(Box::new(move |text: &str| {
            sink_seen.borrow_mut().push(text.to_string())
        }));
        assert!(sink.push("HP 100"));
        assert!(!sink.push("HP 100"));
        assert!(sink.push("HP 90"));
        assert_eq!(*seen.borrow(), vec!["HP 100", "HP 90"]);
        assert_eq!(sink.last(), "HP 90");
    }

    #[test]
    fn silent_sink_tracks_text() {
        let mut sink = StatusSink::silent();
        sink.push("ready");
        assert_eq!(sink.last(), "ready");
    }
}
