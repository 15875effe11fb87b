//! First-person arena shooter: ties the camera, entity world and renderer
//! builders to the [`Game`] contract.

use glam::{Vec2, Vec3};
use log::{debug, info, warn};

use crate::camera::Camera;
use crate::combat::{ShotOutcome, WeaponKind};
use crate::config::GameConfig;
use crate::game::{Game, KeyHandler, PointerHandler, StatusSink};
use crate::input::{CaptureHandle, InputState, KeyCode, MouseButton, NamedKey};
use crate::level::Level;
use crate::render::hud::{self, Banner, HudState};
use crate::render::scene::{self, SceneUniforms};
use crate::render::{Frame, VertexBatch};
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Playing,
    Dead,
    LevelComplete,
    /// The drawing environment failed; nothing is simulated any more.
    Unsupported,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        self != RunState::Playing
    }
}

pub struct ShooterGame {
    level: Level,
    config: GameConfig,
    camera: Camera,
    world: World,
    state: RunState,
    time: f32,
    muzzle_flash: f32,
    damage_flash: f32,
    trigger_held: bool,
    pending_look: Vec2,
    capture: CaptureHandle,
    status: StatusSink,
    static_scene: VertexBatch,
    scene_revision: u64,
    unsupported_reason: Option<String>,
}

impl ShooterGame {
    pub fn new(
        level: Level,
        config: GameConfig,
        capture: CaptureHandle,
        status: StatusSink,
    ) -> Self {
        let mut static_scene = VertexBatch::new();
        scene::build_static_scene(&level, &mut static_scene);
        info!(
            "level '{}' built: {}x{} cells, {} enemies, {} pickups, {} lights",
            level.name,
            level.map.width(),
            level.map.height(),
            level.enemies.len(),
            level.pickups.len(),
            level.lights.len()
        );

        let camera = spawn_camera(&level, &config);
        let world = World::new(&level, &config);
        let mut game = Self {
            level,
            config,
            camera,
            world,
            state: RunState::Playing,
            time: 0.0,
            muzzle_flash: 0.0,
            damage_flash: 0.0,
            trigger_held: false,
            pending_look: Vec2::ZERO,
            capture,
            status,
            static_scene,
            scene_revision: 1,
            unsupported_reason: None,
        };
        game.push_status();
        game
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn level_complete(&self) -> bool {
        self.state == RunState::LevelComplete
    }

    pub fn is_captured(&self) -> bool {
        self.capture.is_held()
    }

    /// Last status line pushed to the host.
    pub fn status(&self) -> &str {
        self.status.last()
    }

    pub fn status_line(&self) -> String {
        let player = &self.world.player;
        let kills = self.world.kills;
        let total = self.world.total_enemies;
        match self.state {
            RunState::Playing => format!(
                "HP {} | Armor {} | Ammo {} | {} | Kills {}/{}",
                player.health.max(0.0).ceil() as u32,
                player.armor.max(0.0).ceil() as u32,
                player.ammo,
                player.active.spec().name,
                kills,
                total
            ),
            RunState::Dead => format!(
                "You died with {kills}/{total} kills. Press Space or click to restart."
            ),
            RunState::LevelComplete => format!(
                "Level complete! {kills}/{total} kills in {:.1}s. Press Space or click to restart.",
                self.time
            ),
            RunState::Unsupported => format!(
                "Unsupported environment: {}",
                self.unsupported_reason.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    fn push_status(&mut self) {
        let line = self.status_line();
        self.status.push(&line);
    }

    /// Pulls the trigger once. Cooldown and empty magazines are silent.
    fn try_fire(&mut self) {
        let origin = self.camera.position;
        let direction = self.camera.forward();
        match self
            .world
            .fire(origin, direction, &self.level.map, &self.config)
        {
            Ok(outcome) => {
                self.muzzle_flash = self.config.muzzle_flash_duration;
                if let ShotOutcome::Hit { killed: true, .. } = outcome {
                    self.check_terminal();
                }
            }
            Err(blocked) => debug!("trigger pulled but blocked: {blocked:?}"),
        }
    }

    fn check_terminal(&mut self) {
        if self.state != RunState::Playing {
            return;
        }
        if self.world.player.is_dead() {
            self.state = RunState::Dead;
            info!(
                "player died after {:.1}s with {}/{} kills",
                self.time, self.world.kills, self.world.total_enemies
            );
        } else if self.world.level_complete() {
            self.state = RunState::LevelComplete;
            info!("level '{}' complete in {:.1}s", self.level.name, self.time);
        } else {
            return;
        }
        self.trigger_held = false;
        self.capture.release();
        self.push_status();
    }

    fn select_weapon(&mut self, weapon: WeaponKind) {
        if self.world.player.select(weapon) {
            debug!("switched to {}", weapon.spec().name);
            self.push_status();
        }
    }

    fn banner(&self) -> Option<Banner> {
        let restart = "PRESS SPACE OR CLICK TO RESTART".to_string();
        match self.state {
            RunState::Playing => None,
            RunState::Dead => Some(Banner {
                title: "YOU DIED".into(),
                subtitle: restart,
                color: Vec3::new(0.9, 0.15, 0.1),
            }),
            RunState::LevelComplete => Some(Banner {
                title: "LEVEL COMPLETE".into(),
                subtitle: restart,
                color: Vec3::new(0.3, 0.9, 0.35),
            }),
            RunState::Unsupported => Some(Banner {
                title: "UNSUPPORTED".into(),
                subtitle: "NO 3D RENDERING CONTEXT".into(),
                color: Vec3::new(0.9, 0.75, 0.2),
            }),
        }
    }
}

fn spawn_camera(level: &Level, config: &GameConfig) -> Camera {
    let mut camera = Camera::new(level.spawn_position(), level.spawn.yaw, config.max_pitch());
    camera.settle(&level.map, config.eye_height);
    camera
}

impl Game for ShooterGame {
    fn reset(&mut self) {
        self.camera = spawn_camera(&self.level, &self.config);
        self.world = World::new(&self.level, &self.config);
        self.time = 0.0;
        self.muzzle_flash = 0.0;
        self.damage_flash = 0.0;
        self.trigger_held = false;
        self.pending_look = Vec2::ZERO;
        if self.state != RunState::Unsupported {
            self.state = RunState::Playing;
            info!("level '{}' reset", self.level.name);
        }
        self.push_status();
    }

    fn update(&mut self, dt: f32, input: &InputState) {
        if self.state == RunState::Unsupported {
            return;
        }
        let dt = if dt.is_finite() {
            dt.clamp(0.0, self.config.max_frame_delta)
        } else {
            0.0
        };
        self.time += dt;
        self.muzzle_flash = (self.muzzle_flash - dt).max(0.0);
        self.damage_flash = (self.damage_flash - dt).max(0.0);
        if self.state.is_terminal() {
            return;
        }

        let look = std::mem::take(&mut self.pending_look);
        if self.capture.is_engaged() {
            self.camera
                .apply_look(look.x, look.y, self.config.mouse_sensitivity);
        }

        self.world.tick_weapon(dt);
        let map = &self.level.map;
        self.camera.walk(
            input.move_intent(),
            self.config.move_speed,
            dt,
            self.config.player_radius,
            map,
        );
        let (x, z) = map.clamp_to_interior(self.camera.position.x, self.camera.position.z);
        self.camera.position.x = x;
        self.camera.position.z = z;
        self.camera.settle(map, self.config.eye_height);

        if !input.is_mouse_button_down(MouseButton::LEFT) {
            self.trigger_held = false;
        }
        if self.trigger_held && self.capture.is_engaged() && self.world.player.active.spec().automatic
        {
            self.try_fire();
        }

        let report = self
            .world
            .step(dt, self.camera.position, &self.level.map, &self.config);
        if report.damage + report.absorbed > 0.0 {
            self.damage_flash = self.config.damage_flash_duration;
        }
        self.check_terminal();
        self.push_status();
    }

    fn draw(&self, frame: &mut Frame) {
        frame.set_static(self.scene_revision, &self.static_scene);
        frame.clear_color = self.config.fog_color;

        let damage = self.damage_flash / self.config.damage_flash_duration.max(f32::EPSILON);
        let flash = self.muzzle_flash / self.config.muzzle_flash_duration.max(f32::EPSILON);
        frame.world_uniforms = SceneUniforms::world(
            &self.camera,
            frame.aspect(),
            &self.config,
            &self.level.lights,
            self.time,
            damage,
            flash,
        );
        scene::build_entities(&self.world, &self.camera, self.time, &mut frame.dynamic);

        let (width, height) = (frame.width as f32, frame.height as f32);
        frame.hud_uniforms = SceneUniforms::hud(width, height);
        let player = &self.world.player;
        let hud_state = HudState {
            health: player.health,
            max_health: player.max_health,
            armor: player.armor,
            max_armor: player.max_armor,
            ammo: player.ammo,
            max_ammo: player.max_ammo,
            weapon: player.active,
            owned: &player.owned,
            kills: self.world.kills,
            total_enemies: self.world.total_enemies,
            muzzle_flash: flash,
            banner: self.banner(),
        };
        hud::build_hud(&hud_state, width, height, &mut frame.hud);
    }

    fn environment_failed(&mut self, reason: &str) {
        warn!("rendering unavailable: {reason}");
        self.state = RunState::Unsupported;
        self.unsupported_reason = Some(reason.to_string());
        self.trigger_held = false;
        self.capture.release();
        self.push_status();
    }

    fn game_over(&self) -> bool {
        matches!(self.state, RunState::Dead | RunState::Unsupported)
    }

    fn key_handler(&mut self) -> Option<&mut dyn KeyHandler> {
        Some(self)
    }

    fn pointer_handler(&mut self) -> Option<&mut dyn PointerHandler> {
        Some(self)
    }

    fn cleanup(&mut self) {
        self.trigger_held = false;
        self.capture.release();
    }
}

impl KeyHandler for ShooterGame {
    fn on_key_down(&mut self, key: KeyCode) {
        match key {
            KeyCode::Named(NamedKey::Escape) => {
                self.trigger_held = false;
                self.capture.release();
            }
            KeyCode::Named(NamedKey::Space | NamedKey::Enter)
                if matches!(self.state, RunState::Dead | RunState::LevelComplete) =>
            {
                self.reset();
            }
            _ if self.state == RunState::Playing => {
                if let Some(weapon) = key.weapon_slot().and_then(WeaponKind::from_slot) {
                    self.select_weapon(weapon);
                }
            }
            _ => {}
        }
    }
}

impl PointerHandler for ShooterGame {
    fn on_mouse_move(&mut self, dx: f32, dy: f32) {
        if self.state == RunState::Playing && self.capture.is_engaged() {
            self.pending_look += Vec2::new(dx, dy);
        }
    }

    fn on_mouse_down(&mut self, button: MouseButton) {
        if button != MouseButton::LEFT {
            return;
        }
        match self.state {
            RunState::Dead | RunState::LevelComplete => self.reset(),
            RunState::Unsupported => {}
            RunState::Playing => {
                if !self.capture.is_engaged() {
                    self.capture.request();
                    return;
                }
                self.trigger_held = true;
                self.try_fire();
            }
        }
    }

    fn on_mouse_up(&mut self, button: MouseButton) {
        if button == MouseButton::LEFT {
            self.trigger_held = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::input::PointerCapture;

    const ARENA: &str = r#"
    <level name="Test" seed="11">
        <map>
            <row>#######</row>
            <row>#P....#</row>
            <row>#.....#</row>
            <row>#.....#</row>
            <row>#######</row>
        </map>
        <spawn yaw="90"/>
        <enemy kind="zombie" col="5" row="1"/>
        <pickup kind="shotgun" col="1" row="3"/>
    </level>
    "#;

    fn game_with(capture: &PointerCapture) -> ShooterGame {
        let level = Level::from_xml(ARENA).unwrap();
        ShooterGame::new(level, GameConfig::default(), capture.handle(), StatusSink::silent())
    }

    fn capture_and_aim(game: &mut ShooterGame) {
        game.on_mouse_down(MouseButton::LEFT);
        assert!(game.is_captured());
    }

    #[test]
    fn spawns_at_eye_height_facing_yaw() {
        let capture = PointerCapture::new();
        let game = ShooterGame::new(
            Level::from_xml(ARENA).unwrap(),
            GameConfig::default(),
            capture.handle(),
            StatusSink::silent(),
        );
        assert_eq!(game.camera().position, Vec3::new(3.0, 1.2, 3.0));
        assert!((game.camera().yaw - 90f32.to_radians()).abs() < 1e-6);
        assert_eq!(game.state(), RunState::Playing);
        assert!(game.status().starts_with("HP 100 | Armor 0 | Ammo 50"));
    }

    #[test]
    fn reset_is_idempotent() {
        let capture = PointerCapture::new();
        let mut game = game_with(&capture);
        let mut input = InputState::new();
        input.set_key_down(KeyCode::Character('S'));
        for _ in 0..30 {
            game.update(0.033, &input);
        }
        game.reset();
        let (camera, world) = (game.camera().clone(), game.world().clone());
        game.reset();
        assert_eq!(game.camera(), &camera);
        assert_eq!(game.world(), &world);
        assert_eq!(game.time(), 0.0);
    }

    #[test]
    fn first_click_captures_then_fires() {
        let capture = PointerCapture::new();
        let mut game = game_with(&capture);
        capture_and_aim(&mut game);
        assert_eq!(game.world().player.ammo, 50);
        game.on_mouse_down(MouseButton::LEFT);
        assert_eq!(game.world().player.ammo, 49);
        // The zombie sits straight down the yaw-90 aim line.
        assert!(game.world().enemies[0].health < game.world().enemies[0].max_health);
    }

    #[test]
    fn look_ignored_until_captured() {
        let capture = PointerCapture::new();
        let mut game = game_with(&capture);
        let yaw = game.camera().yaw;
        game.on_mouse_move(100.0, 0.0);
        game.update(0.016, &InputState::new());
        assert_eq!(game.camera().yaw, yaw);

        capture_and_aim(&mut game);
        game.on_mouse_move(100.0, 0.0);
        game.update(0.016, &InputState::new());
        assert!(game.camera().yaw > yaw);

        game.on_key_down(KeyCode::Named(NamedKey::Escape));
        assert!(!game.is_captured());
    }

    #[test]
    fn clicks_fire_when_cursor_cannot_be_grabbed() {
        let capture = PointerCapture::new();
        let mut game = game_with(&capture);
        capture_and_aim(&mut game);
        capture.mark_unavailable();
        assert!(!game.is_captured());

        game.on_mouse_down(MouseButton::LEFT);
        assert_eq!(game.world().player.ammo, 49);
        let yaw = game.camera().yaw;
        game.on_mouse_move(100.0, 0.0);
        game.update(0.016, &InputState::new());
        assert!(game.camera().yaw > yaw);
    }

    #[test]
    fn weapon_keys_only_select_owned_weapons() {
        let capture = PointerCapture::new();
        let mut game = game_with(&capture);
        game.on_key_down(KeyCode::Digit(2));
        assert_eq!(game.world().player.active, WeaponKind::Pistol);
        game.world.player.apply_pickup(crate::world::PickupKind::Weapon(WeaponKind::Shotgun), 0.0);
        game.on_key_down(KeyCode::Digit(1));
        assert_eq!(game.world().player.active, WeaponKind::Pistol);
        game.on_key_down(KeyCode::Digit(2));
        assert_eq!(game.world().player.active, WeaponKind::Shotgun);
    }

    #[test]
    fn killing_every_enemy_completes_level() {
        let capture = PointerCapture::new();
        let mut game = game_with(&capture);
        capture_and_aim(&mut game);
        let input = InputState::new();
        for _ in 0..200 {
            game.on_mouse_down(MouseButton::LEFT);
            game.on_mouse_up(MouseButton::LEFT);
            game.update(0.033, &input);
            if game.level_complete() {
                break;
            }
        }
        assert!(game.level_complete());
        assert!(!game.game_over());
        assert!(!game.is_captured());
        assert!(game.status().starts_with("Level complete!"));

        game.on_key_down(KeyCode::Named(NamedKey::Space));
        assert_eq!(game.state(), RunState::Playing);
        assert_eq!(game.world().kills, 0);
    }

    #[test]
    fn death_is_game_over_and_click_restarts() {
        let capture = PointerCapture::new();
        let mut game = game_with(&capture);
        game.world.player.health = 0.5;
        // Stand next to the zombie.
        game.camera.position = Vec3::new(10.5, 1.2, 3.0);
        game.update(0.033, &InputState::new());
        assert_eq!(game.state(), RunState::Dead);
        assert!(game.game_over());
        assert!(!game.auto_restart());
        game.on_mouse_down(MouseButton::LEFT);
        assert_eq!(game.state(), RunState::Playing);
        assert_eq!(game.world().player.health, 100.0);
    }

    #[test]
    fn environment_failure_is_terminal() {
        let capture = PointerCapture::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink_seen = Rc::clone(&seen);
        let mut game = ShooterGame::new(
            Level::from_xml(ARENA).unwrap(),
            GameConfig::default(),
            capture.handle(),
            StatusSink::new(Box::new(move |line: &str| {
                sink_seen.borrow_mut().push(line.to_string())
            })),
        );
        game.environment_failed("no adapter");
        assert!(game.game_over());
        let before = game.camera().clone();
        let mut input = InputState::new();
        input.set_key_down(KeyCode::Character('D'));
        game.update(0.033, &input);
        game.reset();
        assert_eq!(game.state(), RunState::Unsupported);
        assert_eq!(game.camera(), &before);
        assert_eq!(
            seen.borrow().last().map(String::as_str),
            Some("Unsupported environment: no adapter")
        );
    }

    #[test]
    fn draw_fills_frame_without_touching_state() {
        let capture = PointerCapture::new();
        let game = game_with(&capture);
        let mut frame = Frame::new(1280, 720);
        frame.begin(1280, 720);
        game.draw(&mut frame);
        assert_eq!(frame.static_revision(), 1);
        assert!(!frame.static_geometry().is_empty());
        assert!(!frame.dynamic.is_empty());
        assert!(!frame.hud.is_empty());
        assert_eq!(frame.world_uniforms.params[1], 1.0);
        assert_eq!(frame.hud_uniforms.params[1], 0.0);
    }
}
