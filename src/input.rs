use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::camera::MoveIntent;

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
    Digit(u8),
}

impl KeyCode {
    /// Zero-based weapon slot selected by this key (`1` selects slot 0).
    pub fn weapon_slot(self) -> Option<usize> {
        match self {
            Self::Digit(digit @ 1..=9) => Some(digit as usize - 1),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Space,
    Enter,
    Left,
    Right,
    Up,
    Down,
    Escape,
    LeftShift,
    RightShift,
}

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);
    pub const RIGHT: Self = Self(1);

    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

/// Set of currently held inputs, rebuilt from discrete edge events by the
/// host and read once per frame by the game.
#[derive(Debug, Default, Clone)]
pub struct InputState {
    keys: HashSet<KeyCode>,
    mouse_buttons: HashSet<MouseButton>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key_down(&mut self, key: KeyCode) {
        self.keys.insert(key);
    }

    pub fn set_key_up(&mut self, key: KeyCode) {
        self.keys.remove(&key);
    }

    pub fn set_mouse_button_down(&mut self, button: MouseButton) {
        self.mouse_buttons.insert(button);
    }

    pub fn set_mouse_button_up(&mut self, button: MouseButton) {
        self.mouse_buttons.remove(&button);
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    pub fn is_mouse_button_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons.contains(&button)
    }

    /// Forgets every held input, used when the window loses focus so keys
    /// released elsewhere do not stay stuck.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.mouse_buttons.clear();
    }

    /// WASD and arrow keys mapped to a movement intent.
    pub fn move_intent(&self) -> MoveIntent {
        let held = |letter: char, arrow: NamedKey| {
            self.is_key_down(KeyCode::Character(letter)) || self.is_key_down(KeyCode::Named(arrow))
        };
        MoveIntent {
            forward: held('W', NamedKey::Up),
            backward: held('S', NamedKey::Down),
            left: held('A', NamedKey::Left),
            right: held('D', NamedKey::Right),
        }
    }
}

pub type HolderId = u64;

#[derive(Debug, Default)]
struct CaptureSlot {
    holder: Option<HolderId>,
    next_id: HolderId,
    /// Set once the platform refuses to grab the cursor.
    unavailable: bool,
}

/// Exclusive pointer-capture resource. At most one [`CaptureHandle`] holds it
/// at a time; the host mirrors the current state onto the OS cursor.
#[derive(Debug, Clone, Default)]
pub struct PointerCapture {
    slot: Arc<Mutex<CaptureSlot>>,
}

impl PointerCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handle with a fresh holder identity.
    pub fn handle(&self) -> CaptureHandle {
        let mut slot = self.slot.lock();
        slot.next_id += 1;
        CaptureHandle {
            id: slot.next_id,
            slot: Arc::clone(&self.slot),
        }
    }

    pub fn holder(&self) -> Option<HolderId> {
        self.slot.lock().holder
    }

    pub fn is_captured(&self) -> bool {
        self.holder().is_some()
    }

    /// Drops capture regardless of holder (focus loss, window teardown).
    /// Returns the previous holder.
    pub fn release_all(&self) -> Option<HolderId> {
        let previous = self.slot.lock().holder.take();
        if let Some(holder) = previous {
            debug!("pointer capture released from holder {holder}");
        }
        previous
    }

    /// Records that the platform cannot grab the cursor and drops any holder.
    /// Later requests fail and games read the pointer uncaptured.
    pub fn mark_unavailable(&self) {
        let mut slot = self.slot.lock();
        slot.holder = None;
        if !slot.unavailable {
            slot.unavailable = true;
            warn!("pointer capture unavailable; reading the pointer uncaptured");
        }
    }

    pub fn is_available(&self) -> bool {
        !self.slot.lock().unavailable
    }
}

/// Scoped claim on the [`PointerCapture`]; dropping it releases the capture if
/// this handle holds it.
#[derive(Debug)]
pub struct CaptureHandle {
    id: HolderId,
    slot: Arc<Mutex<CaptureSlot>>,
}

impl CaptureHandle {
    pub fn id(&self) -> HolderId {
        self.id
    }

    /// Acquires the capture. Fails if another holder owns it.
    pub fn request(&self) -> bool {
        let mut slot = self.slot.lock();
        match slot.holder {
            Some(holder) if holder == self.id => true,
            Some(holder) => {
                warn!("pointer capture requested by {} but held by {holder}", self.id);
                false
            }
            None if slot.unavailable => false,
            None => {
                slot.holder = Some(self.id);
                debug!("pointer capture acquired by holder {}", self.id);
                true
            }
        }
    }

    /// Releases the capture if held by this handle.
    pub fn release(&self) -> bool {
        let mut slot = self.slot.lock();
        if slot.holder == Some(self.id) {
            slot.holder = None;
            debug!("pointer capture released by holder {}", self.id);
            true
        } else {
            false
        }
    }

    pub fn is_held(&self) -> bool {
        self.slot.lock().holder == Some(self.id)
    }

    /// Whether pointer motion and clicks should drive the game: the capture
    /// is held, or it can never be obtained.
    pub fn is_engaged(&self) -> bool {
        let slot = self.slot.lock();
        slot.unavailable || slot.holder == Some(self.id)
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_map_to_zero_based_weapon_slots() {
        assert_eq!(KeyCode::Digit(9).weapon_slot(), Some(8));
        assert_eq!(KeyCode::Character('W').weapon_slot(), None);
        assert_eq!(KeyCode::Digit(1).weapon_slot(), Some(0));
        assert_eq!(KeyCode::Digit(0).weapon_slot(), None);
    }

    #[test]
    fn movement_keys_map_to_intent() {
        let mut state = InputState::new();
        state.set_key_down(KeyCode::Character('W'));
        state.set_key_down(KeyCode::Named(NamedKey::Right));
        let intent = state.move_intent();
        assert!(intent.forward && intent.right);
        assert!(!intent.backward && !intent.left);
        state.clear();
        assert!(state.move_intent().is_idle());
    }

    #[test]
    fn capture_has_single_holder() {
        let capture = PointerCapture::new();
        let first = capture.handle();
        let second = capture.handle();
        assert!(first.request());
        assert!(!second.request());
        assert_eq!(capture.holder(), Some(first.id()));
        assert!(!second.release());
        assert!(first.release());
        assert!(second.request());
        assert!(second.is_held());
    }

    #[test]
    fn dropping_handle_releases_capture() {
        let capture = PointerCapture::new();
        {
            let handle = capture.handle();
            assert!(handle.request());
            assert!(capture.is_captured());
        }
        assert!(!capture.is_captured());
    }

    #[test]
    fn release_all_clears_any_holder() {
        let capture = PointerCapture::new();
        let handle = capture.handle();
        handle.request();
        assert_eq!(capture.release_all(), Some(handle.id()));
        assert!(!handle.is_held());
    }

    #[test]
    fn unavailable_capture_engages_without_a_holder() {
        let capture = PointerCapture::new();
        let handle = capture.handle();
        assert!(handle.request());
        capture.mark_unavailable();
        capture.mark_unavailable();
        assert!(!capture.is_available());
        assert!(!capture.is_captured());
        assert!(!handle.request());
        assert!(!handle.is_held());
        assert!(handle.is_engaged());
    }
}
