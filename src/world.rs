use glam::{Vec2, Vec3};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::combat::{self, DamageSplit, Projectile, ShotOutcome, WeaponKind};
use crate::config::GameConfig;
use crate::level::Level;
use crate::tilemap::TileMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyKind {
    Imp,
    Zombie,
    Demon,
}

/// Per-kind tuning for enemies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyStats {
    pub name: &'static str,
    pub health: f32,
    pub speed: f32,
    /// Contact damage per second, and projectile damage for ranged kinds.
    pub damage: f32,
    pub ranged: bool,
    pub attack_range: f32,
    pub attack_interval: f32,
    /// Enemies stop closing in once they are this close.
    pub approach_distance: f32,
    pub projectile_speed: f32,
    pub color: Vec3,
    pub height: f32,
    pub width: f32,
}

impl EnemyKind {
    pub fn stats(self) -> EnemyStats {
        match self {
            EnemyKind::Imp => EnemyStats {
                name: "Imp",
                health: 60.0,
                speed: 1.4,
                damage: 8.0,
                ranged: true,
                attack_range: 9.0,
                attack_interval: 2.2,
                approach_distance: 4.0,
                projectile_speed: 7.0,
                color: Vec3::new(0.9, 0.25, 0.2),
                height: 1.1,
                width: 0.6,
            },
            EnemyKind::Zombie => EnemyStats {
                name: "Zombie",
                health: 90.0,
                speed: 1.0,
                damage: 12.0,
                ranged: false,
                attack_range: 0.0,
                attack_interval: 0.0,
                approach_distance: 0.0,
                projectile_speed: 0.0,
                color: Vec3::new(0.2, 0.6, 0.3),
                height: 1.3,
                width: 0.6,
            },
            EnemyKind::Demon => EnemyStats {
                name: "Demon",
                health: 130.0,
                speed: 1.8,
                damage: 15.0,
                ranged: false,
                attack_range: 0.0,
                attack_interval: 0.0,
                approach_distance: 0.0,
                projectile_speed: 0.0,
                color: Vec3::new(0.5, 0.2, 0.6),
                height: 1.0,
                width: 0.8,
            },
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "imp" => Some(EnemyKind::Imp),
            "zombie" => Some(EnemyKind::Zombie),
            "demon" => Some(EnemyKind::Demon),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enemy {
    pub kind: EnemyKind,
    /// Feet position; `y` follows the floor.
    pub position: Vec3,
    pub health: f32,
    pub max_health: f32,
    pub alive: bool,
    pub attack_cooldown: f32,
    pub flinch: f32,
}

impl Enemy {
    pub fn spawn(kind: EnemyKind, position: Vec3, attack_cooldown: f32) -> Self {
        let health = kind.stats().health;
        Self {
            kind,
            position,
            health,
            max_health: health,
            alive: true,
            attack_cooldown,
            flinch: 0.0,
        }
    }

    /// Aim point used by hitscan and as the projectile muzzle.
    pub fn center(&self) -> Vec3 {
        self.position + Vec3::Y * (self.kind.stats().height * 0.6)
    }

    /// Returns `true` if this hit killed the enemy.
    pub fn take_damage(&mut self, amount: f32, flinch_duration: f32) -> bool {
        if !self.alive {
            return false;
        }
        self.health -= amount;
        self.flinch = flinch_duration;
        if self.health <= 0.0 {
            self.health = 0.0;
            self.alive = false;
            return true;
        }
        false
    }

    /// Runs one AI tick and returns the contact damage dealt to the player.
    ///
    /// Contact damage ignores flinching. A flinching enemy neither moves nor
    /// advances its ranged attack timer.
    fn think(
        &mut self,
        dt: f32,
        player: Vec3,
        map: &TileMap,
        config: &GameConfig,
        projectiles: &mut Vec<Projectile>,
    ) -> f32 {
        if !self.alive {
            return 0.0;
        }
        self.flinch = (self.flinch - dt).max(0.0);

        let stats = self.kind.stats();
        let offset = Vec2::new(player.x - self.position.x, player.z - self.position.z);
        let distance = offset.length();

        if distance < config.melee_distance {
            return stats.damage * dt * config.contact_damage_scale;
        }
        if self.flinch > 0.0 {
            return 0.0;
        }

        if distance > stats.approach_distance && distance > f32::EPSILON {
            let step = offset / distance * stats.speed * dt;
            let next_x = self.position.x + step.x;
            if map.can_occupy(next_x, self.position.z, config.enemy_radius) {
                self.position.x = next_x;
            }
            let next_z = self.position.z + step.y;
            if map.can_occupy(self.position.x, next_z, config.enemy_radius) {
                self.position.z = next_z;
            }
            self.position.y = map.floor_height_at(self.position.x, self.position.z);
        }

        if stats.ranged && distance <= stats.attack_range {
            self.attack_cooldown -= dt;
            if self.attack_cooldown <= 0.0 {
                projectiles.push(Projectile::aimed(
                    self.center(),
                    player,
                    stats.projectile_speed,
                    stats.damage,
                    config.projectile_lifetime,
                ));
                self.attack_cooldown = stats.attack_interval;
            }
        }
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickupKind {
    Health,
    Armor,
    Ammo,
    Weapon(WeaponKind),
}

impl PickupKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "health" => Some(PickupKind::Health),
            "armor" => Some(PickupKind::Armor),
            "ammo" => Some(PickupKind::Ammo),
            other => WeaponKind::from_name(other).map(PickupKind::Weapon),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pickup {
    pub kind: PickupKind,
    pub value: f32,
    pub position: Vec3,
    pub collected: bool,
}

/// Health, armor, ammo and weapons carried by the player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerResources {
    pub health: f32,
    pub max_health: f32,
    pub armor: f32,
    pub max_armor: f32,
    pub ammo: u32,
    pub max_ammo: u32,
    pub owned: Vec<WeaponKind>,
    pub active: WeaponKind,
    pub weapon_cooldown: f32,
}

impl PlayerResources {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            health: config.max_health,
            max_health: config.max_health,
            armor: 0.0,
            max_armor: config.max_armor,
            ammo: config.starting_ammo.min(config.max_ammo),
            max_ammo: config.max_ammo,
            owned: vec![WeaponKind::Pistol],
            active: WeaponKind::Pistol,
            weapon_cooldown: 0.0,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }

    pub fn owns(&self, weapon: WeaponKind) -> bool {
        self.owned.contains(&weapon)
    }

    /// Switches to an owned weapon. Returns `false` for weapons not carried.
    pub fn select(&mut self, weapon: WeaponKind) -> bool {
        if !self.owns(weapon) {
            return false;
        }
        self.active = weapon;
        true
    }

    pub fn apply_pickup(&mut self, kind: PickupKind, value: f32) {
        match kind {
            PickupKind::Health => {
                self.health = (self.health + value).clamp(0.0, self.max_health);
            }
            PickupKind::Armor => {
                self.armor = (self.armor + value).clamp(0.0, self.max_armor);
            }
            PickupKind::Ammo => {
                let gained = value.max(0.0) as u32;
                self.ammo = self.ammo.saturating_add(gained).min(self.max_ammo);
            }
            PickupKind::Weapon(weapon) => {
                if !self.owns(weapon) {
                    self.owned.push(weapon);
                }
                self.active = weapon;
            }
        }
    }
}

/// Why a trigger pull did not produce a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireBlocked {
    Cooldown,
    NoAmmo,
}

/// What happened to the player during a simulation step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepReport {
    pub damage: f32,
    pub absorbed: f32,
    pub pickups: usize,
}

/// Every entity of a running level.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    pub enemies: Vec<Enemy>,
    pub pickups: Vec<Pickup>,
    pub projectiles: Vec<Projectile>,
    pub player: PlayerResources,
    pub kills: usize,
    pub total_enemies: usize,
}

impl World {
    /// Populates the level's fixed roster. The level seed drives the
    /// staggered initial attack timers, so the build is deterministic.
    pub fn new(level: &Level, config: &GameConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(level.seed);
        let map = &level.map;
        let enemies: Vec<Enemy> = level
            .enemies
            .iter()
            .map(|placement| {
                let (x, z) = map.cell_center(placement.col, placement.row);
                let floor = map.floor_height(placement.col, placement.row);
                let interval = placement.kind.stats().attack_interval;
                let cooldown = interval * (0.5 + rng.gen::<f32>());
                Enemy::spawn(placement.kind, Vec3::new(x, floor, z), cooldown)
            })
            .collect();
        let pickups = level
            .pickups
            .iter()
            .map(|placement| {
                let (x, z) = map.cell_center(placement.col, placement.row);
                Pickup {
                    kind: placement.kind,
                    value: placement.value,
                    position: Vec3::new(x, map.floor_height(placement.col, placement.row), z),
                    collected: false,
                }
            })
            .collect();
        let total_enemies = enemies.len();
        Self {
            enemies,
            pickups,
            projectiles: Vec::new(),
            player: PlayerResources::new(config),
            kills: 0,
            total_enemies,
        }
    }

    pub fn level_complete(&self) -> bool {
        debug_assert!(self.kills <= self.total_enemies);
        self.kills == self.total_enemies
    }

    pub fn tick_weapon(&mut self, dt: f32) {
        if self.player.weapon_cooldown > 0.0 {
            self.player.weapon_cooldown -= dt;
        }
    }

    /// Fires the active weapon along `direction` from `origin`.
    pub fn fire(
        &mut self,
        origin: Vec3,
        direction: Vec3,
        map: &TileMap,
        config: &GameConfig,
    ) -> Result<ShotOutcome, FireBlocked> {
        if self.player.weapon_cooldown > 0.0 {
            return Err(FireBlocked::Cooldown);
        }
        let weapon = self.player.active.spec();
        if self.player.ammo < weapon.ammo_per_shot {
            return Err(FireBlocked::NoAmmo);
        }
        self.player.ammo -= weapon.ammo_per_shot;
        self.player.weapon_cooldown = weapon.cooldown;

        let hit = combat::hitscan(
            origin,
            direction,
            weapon.range,
            config.hitscan_radius,
            &self.enemies,
            map,
        );
        let outcome =
            combat::apply_shot(&mut self.enemies, hit, weapon.damage, config.flinch_duration);
        if let ShotOutcome::Hit {
            index,
            killed: true,
        } = outcome
        {
            self.kills += 1;
            debug!(
                "{} #{index} killed ({}/{})",
                self.enemies[index].kind.stats().name,
                self.kills,
                self.total_enemies
            );
        }
        Ok(outcome)
    }

    /// Marks every overlapping pickup as collected and applies its effect.
    pub fn collect_pickups(&mut self, player: Vec3, radius: f32) -> usize {
        let mut collected = 0;
        for pickup in self.pickups.iter_mut().filter(|pickup| !pickup.collected) {
            let dx = pickup.position.x - player.x;
            let dz = pickup.position.z - player.z;
            if dx * dx + dz * dz >= radius * radius {
                continue;
            }
            pickup.collected = true;
            self.player.apply_pickup(pickup.kind, pickup.value);
            collected += 1;
            debug!("collected {:?} ({})", pickup.kind, pickup.value);
        }
        collected
    }

    /// Applies damage to the player through armor.
    pub fn hurt_player(&mut self, raw: f32, config: &GameConfig) -> DamageSplit {
        combat::absorb_damage(
            &mut self.player.health,
            &mut self.player.armor,
            raw,
            config.armor_absorption,
        )
    }

    /// Advances pickups, enemies and projectiles by `dt` around the player
    /// positioned at `player` (eye position).
    pub fn step(
        &mut self,
        dt: f32,
        player: Vec3,
        map: &TileMap,
        config: &GameConfig,
    ) -> StepReport {
        let mut report = StepReport {
            pickups: self.collect_pickups(player, config.pickup_radius),
            ..StepReport::default()
        };

        let mut raw = 0.0;
        for enemy in &mut self.enemies {
            raw += enemy.think(dt, player, map, config, &mut self.projectiles);
        }
        raw += combat::advance_projectiles(
            &mut self.projectiles,
            dt,
            map,
            player,
            config.projectile_hit_radius,
        );

        if raw > 0.0 {
            let split = self.hurt_player(raw, config);
            report.damage = split.health_lost;
            report.absorbed = split.absorbed;
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;

    const ARENA: &str = r#"
    <level name="Test" cell-size="2" wall-height="3" seed="7">
        <map>
            <row>#######</row>
            <row>#P....#</row>
            <row>#.....#</row>
            <row>#.....#</row>
            <row>#######</row>
        </map>
        <enemy kind="zombie" col="5" row="3"/>
        <enemy kind="imp" col="5" row="1"/>
        <pickup kind="health" value="25" col="2" row="1"/>
        <pickup kind="shotgun" col="3" row="2"/>
    </level>
    "#;

    fn setup() -> (Level, GameConfig, World) {
        let level = Level::from_xml(ARENA).unwrap();
        let config = GameConfig::default();
        let world = World::new(&level, &config);
        (level, config, world)
    }

    #[test]
    fn build_is_deterministic() {
        let (level, config, world) = setup();
        assert_eq!(world, World::new(&level, &config));
        assert_eq!(world.total_enemies, 2);
        let imp = &world.enemies[1];
        let interval = EnemyKind::Imp.stats().attack_interval;
        assert!(imp.attack_cooldown >= interval * 0.5 && imp.attack_cooldown < interval * 1.5);
    }

    #[test]
    fn pickups_apply_once_and_clamp() {
        let (_, _, mut world) = setup();
        world.player.health = 90.0;
        let at = world.pickups[0].position;
        assert_eq!(world.collect_pickups(at, 0.9), 1);
        assert_eq!(world.player.health, 100.0);
        world.player.health = 50.0;
        assert_eq!(world.collect_pickups(at, 0.9), 0);
        assert_eq!(world.player.health, 50.0);
    }

    #[test]
    fn weapon_pickup_adds_and_switches() {
        let (_, _, mut world) = setup();
        let at = world.pickups[1].position;
        world.collect_pickups(at, 0.9);
        assert!(world.player.owns(WeaponKind::Shotgun));
        assert_eq!(world.player.active, WeaponKind::Shotgun);
        assert!(world.player.select(WeaponKind::Pistol));
        assert!(!world.player.select(WeaponKind::Chaingun));
    }

    #[test]
    fn ammo_pickup_respects_pool_size() {
        let config = GameConfig::default();
        let mut player = PlayerResources::new(&config);
        player.apply_pickup(PickupKind::Ammo, 1_000.0);
        assert_eq!(player.ammo, config.max_ammo);
        player.apply_pickup(PickupKind::Armor, 250.0);
        assert_eq!(player.armor, config.max_armor);
    }

    #[test]
    fn negative_pickup_values_bottom_out_at_zero() {
        let config = GameConfig::default();
        let mut player = PlayerResources::new(&config);
        player.armor = 20.0;
        player.apply_pickup(PickupKind::Health, -500.0);
        player.apply_pickup(PickupKind::Armor, -500.0);
        player.apply_pickup(PickupKind::Ammo, -500.0);
        assert_eq!(player.health, 0.0);
        assert_eq!(player.armor, 0.0);
        assert_eq!(player.ammo, config.starting_ammo);
    }

    #[test]
    fn level_complete_once_every_enemy_is_killed() {
        let (level, config, mut world) = setup();
        let origin = Vec3::new(3.0, config.eye_height, 3.0);
        assert!(!world.level_complete());
        world.kills = world.total_enemies - 1;
        assert!(!world.level_complete());
        world.kills = world.total_enemies;
        assert!(world.level_complete());

        let mut empty = World::new(&level, &config);
        empty.enemies.clear();
        empty.total_enemies = 0;
        assert!(empty.level_complete());
        assert!(empty.fire(origin, Vec3::X, &level.map, &config).is_ok());
        assert!(empty.level_complete());
    }

    #[test]
    fn melee_contact_drains_health_over_time() {
        let (level, config, mut world) = setup();
        world.enemies.truncate(1);
        let zombie = world.enemies[0].position;
        let player = Vec3::new(zombie.x + 0.5, config.eye_height, zombie.z);
        let report = world.step(0.1, player, &level.map, &config);
        let expected = EnemyKind::Zombie.stats().damage * 0.1 * config.contact_damage_scale;
        assert!((report.damage - expected).abs() < 1e-4);
        // Enemies in contact do not move.
        assert_eq!(world.enemies[0].position, zombie);
    }

    #[test]
    fn enemies_close_distance() {
        let (level, config, mut world) = setup();
        let player = Vec3::new(3.0, config.eye_height, 3.0);
        let before = world.enemies[0].position.distance(player);
        world.step(0.5, player, &level.map, &config);
        assert!(world.enemies[0].position.distance(player) < before);
    }

    #[test]
    fn flinching_enemy_holds_position() {
        let (level, config, mut world) = setup();
        world.enemies[0].flinch = 1.0;
        let start = world.enemies[0].position;
        world.step(0.1, Vec3::new(3.0, 1.2, 3.0), &level.map, &config);
        assert_eq!(world.enemies[0].position, start);
    }

    #[test]
    fn flinching_ranged_enemy_holds_fire() {
        let (level, config, mut world) = setup();
        world.enemies[0].alive = false;
        world.enemies[1].attack_cooldown = 0.01;
        world.enemies[1].flinch = 1.0;
        let player = Vec3::new(3.0, config.eye_height, 3.0);
        world.step(0.05, player, &level.map, &config);
        assert!(world.projectiles.is_empty());
        assert_eq!(world.enemies[1].attack_cooldown, 0.01);
    }

    #[test]
    fn ranged_enemy_fires_when_ready() {
        let (level, config, mut world) = setup();
        world.enemies.truncate(2);
        world.enemies[0].alive = false;
        world.enemies[1].attack_cooldown = 0.01;
        let player = Vec3::new(3.0, config.eye_height, 3.0);
        world.step(0.05, player, &level.map, &config);
        assert_eq!(world.projectiles.len(), 1);
        assert_eq!(
            world.enemies[1].attack_cooldown,
            EnemyKind::Imp.stats().attack_interval
        );
    }

    #[test]
    fn firing_consumes_ammo_and_respects_cooldown() {
        let (level, config, mut world) = setup();
        let ammo = world.player.ammo;
        let origin = Vec3::new(3.0, config.eye_height, 3.0);
        assert!(world.fire(origin, Vec3::X, &level.map, &config).is_ok());
        assert_eq!(world.player.ammo, ammo - 1);
        assert_eq!(
            world.fire(origin, Vec3::X, &level.map, &config),
            Err(FireBlocked::Cooldown)
        );
        world.tick_weapon(1.0);
        world.player.ammo = 0;
        assert_eq!(
            world.fire(origin, Vec3::X, &level.map, &config),
            Err(FireBlocked::NoAmmo)
        );
    }
}
