//! Tile-grid first-person arena shooter.
//!
//! Gameplay (map, camera, combat, enemies) is plain CPU-side code that can be
//! driven and inspected without a window. The `render` module turns game
//! state into vertex batches and presents them through wgpu; `app` hosts a
//! game behind the [`Game`] contract for the native and wasm front ends.

pub mod app;
pub mod camera;
pub mod combat;
pub mod config;
pub mod game;
pub mod input;
pub mod level;
pub mod render;
pub mod shooter;
pub mod tilemap;
#[cfg(target_arch = "wasm32")]
pub mod web;
pub mod world;

pub use app::{FrameClock, GameHost};
pub use camera::{Camera, MoveIntent};
pub use combat::{WeaponKind, WeaponSpec};
pub use config::{ConfigError, GameConfig};
pub use game::{Game, KeyHandler, PointerHandler, StatusSink};
pub use input::{CaptureHandle, InputState, KeyCode, MouseButton, NamedKey, PointerCapture};
pub use level::{Level, LevelError};
pub use render::{Frame, RenderInitError, Renderer};
pub use shooter::{RunState, ShooterGame};
pub use tilemap::{Cell, TileMap};
pub use world::{EnemyKind, PickupKind, World};
