//! Shot resolution, damage application and enemy projectiles.
//!
//! Everything here is plain state transformation over the entity lists owned
//! by [`crate::world::World`]; nothing in this module keeps state of its own.

use glam::Vec3;
use log::trace;
use serde::{Deserialize, Serialize};

use crate::tilemap::TileMap;
use crate::world::Enemy;

/// Hitscan targets closer than this along the ray are ignored.
const MIN_HIT_DISTANCE: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponKind {
    Pistol,
    Shotgun,
    Chaingun,
}

/// Static parameters of a weapon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponSpec {
    pub name: &'static str,
    pub damage: f32,
    /// Seconds between shots.
    pub cooldown: f32,
    pub range: f32,
    pub ammo_per_shot: u32,
    /// Keeps firing while the trigger is held.
    pub automatic: bool,
}

impl WeaponKind {
    pub const ALL: [WeaponKind; 3] = [
        WeaponKind::Pistol,
        WeaponKind::Shotgun,
        WeaponKind::Chaingun,
    ];

    pub fn spec(self) -> WeaponSpec {
        match self {
            WeaponKind::Pistol => WeaponSpec {
                name: "Pistol",
                damage: 28.0,
                cooldown: 0.35,
                range: 30.0,
                ammo_per_shot: 1,
                automatic: false,
            },
            WeaponKind::Shotgun => WeaponSpec {
                name: "Shotgun",
                damage: 65.0,
                cooldown: 0.9,
                range: 12.0,
                ammo_per_shot: 2,
                automatic: false,
            },
            WeaponKind::Chaingun => WeaponSpec {
                name: "Chaingun",
                damage: 18.0,
                cooldown: 0.12,
                range: 25.0,
                ammo_per_shot: 1,
                automatic: true,
            },
        }
    }

    /// Zero-based selection slot (key `1` selects slot 0).
    pub fn slot(self) -> usize {
        match self {
            WeaponKind::Pistol => 0,
            WeaponKind::Shotgun => 1,
            WeaponKind::Chaingun => 2,
        }
    }

    pub fn from_slot(slot: usize) -> Option<Self> {
        Self::ALL.get(slot).copied()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "pistol" => Some(WeaponKind::Pistol),
            "shotgun" => Some(WeaponKind::Shotgun),
            "chaingun" => Some(WeaponKind::Chaingun),
            _ => None,
        }
    }
}

/// Closest enemy along a hitscan ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitscanHit {
    pub index: usize,
    pub distance: f32,
}

/// Result of a shot that actually left the barrel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShotOutcome {
    Miss,
    Hit { index: usize, killed: bool },
}

/// Finds the closest live enemy whose center lies within `radius` of the ray.
///
/// `direction` must be normalized. The search range is cut short by the
/// first wall along the ray.
pub fn hitscan(
    origin: Vec3,
    direction: Vec3,
    range: f32,
    radius: f32,
    enemies: &[Enemy],
    map: &TileMap,
) -> Option<HitscanHit> {
    let horizontal = (direction.x * direction.x + direction.z * direction.z).sqrt();
    let mut max_distance = range;
    if horizontal > f32::EPSILON {
        let wall = map.cast_ray(origin.x, origin.z, direction.x, direction.z, range * horizontal);
        if let Some(wall) = wall {
            max_distance = max_distance.min(wall / horizontal);
        }
    }

    let mut best: Option<HitscanHit> = None;
    for (index, enemy) in enemies.iter().enumerate() {
        if !enemy.alive {
            continue;
        }
        let to_enemy = enemy.center() - origin;
        let along = to_enemy.dot(direction);
        if !(MIN_HIT_DISTANCE..=max_distance).contains(&along) {
            continue;
        }
        let closest = origin + direction * along;
        if closest.distance(enemy.center()) >= radius {
            continue;
        }
        if best.map_or(true, |hit| along < hit.distance) {
            best = Some(HitscanHit {
                index,
                distance: along,
            });
        }
    }
    trace!("hitscan from {origin:?} dir {direction:?}: {best:?}");
    best
}

/// Damages the enemy picked by [`hitscan`], if any.
pub fn apply_shot(
    enemies: &mut [Enemy],
    hit: Option<HitscanHit>,
    damage: f32,
    flinch_duration: f32,
) -> ShotOutcome {
    let Some(hit) = hit else {
        return ShotOutcome::Miss;
    };
    let Some(enemy) = enemies.get_mut(hit.index) else {
        return ShotOutcome::Miss;
    };
    let killed = enemy.take_damage(damage, flinch_duration);
    ShotOutcome::Hit {
        index: hit.index,
        killed,
    }
}

/// How an incoming hit was split between armor and health.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageSplit {
    pub absorbed: f32,
    pub health_lost: f32,
}

/// Applies raw damage: armor soaks `ratio` of it while it lasts, the rest
/// reaches health. Both pools are clamped at zero.
pub fn absorb_damage(health: &mut f32, armor: &mut f32, raw: f32, ratio: f32) -> DamageSplit {
    let raw = raw.max(0.0);
    let absorbed = armor.max(0.0).min(raw * ratio);
    *armor = (*armor - absorbed).max(0.0);
    let remainder = raw - absorbed;
    let health_lost = remainder.min(health.max(0.0));
    *health = (*health - remainder).max(0.0);
    DamageSplit {
        absorbed,
        health_lost,
    }
}

/// Enemy fireball travelling in a straight line.
#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub position: Vec3,
    pub velocity: Vec3,
    pub damage: f32,
    pub remaining: f32,
}

impl Projectile {
    /// Spawns a projectile at `from` heading for `target` at `speed`.
    pub fn aimed(from: Vec3, target: Vec3, speed: f32, damage: f32, lifetime: f32) -> Self {
        let direction = (target - from).normalize_or_zero();
        Self {
            position: from,
            velocity: direction * speed,
            damage,
            remaining: lifetime,
        }
    }
}

/// Integrates every projectile and removes those that expired, entered a
/// wall or reached the player. Returns the total damage dealt to the player.
pub fn advance_projectiles(
    projectiles: &mut Vec<Projectile>,
    dt: f32,
    map: &TileMap,
    player: Vec3,
    hit_radius: f32,
) -> f32 {
    let mut damage = 0.0;
    projectiles.retain_mut(|projectile| {
        projectile.position += projectile.velocity * dt;
        projectile.remaining -= dt;
        if projectile.remaining <= 0.0 {
            return false;
        }
        if map.is_wall_at(projectile.position.x, projectile.position.z) {
            return false;
        }
        if projectile.position.distance_squared(player) < hit_radius * hit_radius {
            damage += projectile.damage;
            return false;
        }
        true
    });
    damage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tilemap::Cell;
    use crate::world::EnemyKind;

    fn corridor() -> TileMap {
        // 12 x 3, single open row.
        let mut cells = vec![Cell::Wall; 36];
        for col in 1..11 {
            cells[12 + col] = Cell::Floor;
        }
        TileMap::new(12, 3, 2.0, cells, vec![0.0; 36])
    }

    fn enemy_at(x: f32, z: f32) -> Enemy {
        Enemy::spawn(EnemyKind::Zombie, Vec3::new(x, 0.0, z), 0.0)
    }

    #[test]
    fn absorption_matches_reference_cases() {
        let (mut health, mut armor) = (100.0, 30.0);
        absorb_damage(&mut health, &mut armor, 50.0, 0.6);
        assert_eq!(armor, 0.0);
        assert_eq!(health, 80.0);

        let (mut health, mut armor) = (100.0, 100.0);
        let split = absorb_damage(&mut health, &mut armor, 40.0, 0.6);
        assert!((armor - 76.0).abs() < 1e-4);
        assert!((health - 84.0).abs() < 1e-4);
        assert!((split.absorbed - 24.0).abs() < 1e-4);
    }

    #[test]
    fn absorption_without_armor_hits_health_and_clamps() {
        let (mut health, mut armor) = (10.0, 0.0);
        let split = absorb_damage(&mut health, &mut armor, 25.0, 0.6);
        assert_eq!(health, 0.0);
        assert_eq!(armor, 0.0);
        assert_eq!(split.health_lost, 10.0);
    }

    #[test]
    fn hitscan_picks_closest_enemy_on_ray() {
        let map = corridor();
        let enemies = vec![enemy_at(15.0, 3.0), enemy_at(9.0, 3.0), enemy_at(9.0, 1.0)];
        let origin = Vec3::new(3.0, enemies[0].center().y, 3.0);
        let hit = hitscan(origin, Vec3::X, 30.0, 0.6, &enemies, &map).unwrap();
        assert_eq!(hit.index, 1);
        assert!((hit.distance - 6.0).abs() < 1e-4);
    }

    #[test]
    fn hitscan_respects_range_and_dead_targets() {
        let map = corridor();
        let mut enemies = vec![enemy_at(15.0, 3.0)];
        let origin = Vec3::new(3.0, enemies[0].center().y, 3.0);
        assert!(hitscan(origin, Vec3::X, 10.0, 0.6, &enemies, &map).is_none());
        enemies[0].alive = false;
        assert!(hitscan(origin, Vec3::X, 30.0, 0.6, &enemies, &map).is_none());
    }

    #[test]
    fn hitscan_stops_at_walls() {
        let map = corridor();
        // Enemy placed beyond the east wall (x >= 22).
        let enemies = vec![enemy_at(23.0, 3.0)];
        let origin = Vec3::new(3.0, enemies[0].center().y, 3.0);
        assert!(hitscan(origin, Vec3::X, 50.0, 0.6, &enemies, &map).is_none());
    }

    #[test]
    fn apply_shot_kills_and_flinches() {
        let mut enemies = vec![enemy_at(9.0, 3.0)];
        let hit = Some(HitscanHit {
            index: 0,
            distance: 6.0,
        });
        let outcome = apply_shot(&mut enemies, hit, 10.0, 0.2);
        assert_eq!(
            outcome,
            ShotOutcome::Hit {
                index: 0,
                killed: false
            }
        );
        assert!(enemies[0].flinch > 0.0);
        let outcome = apply_shot(&mut enemies, hit, 500.0, 0.2);
        assert_eq!(
            outcome,
            ShotOutcome::Hit {
                index: 0,
                killed: true
            }
        );
        assert!(!enemies[0].alive);
        assert_eq!(apply_shot(&mut enemies, None, 10.0, 0.2), ShotOutcome::Miss);
    }

    #[test]
    fn projectiles_hit_walls_player_and_expire() {
        let map = corridor();
        let player = Vec3::new(3.0, 1.2, 3.0);
        let mut projectiles = vec![
            // Straight at the player.
            Projectile::aimed(Vec3::new(5.0, 1.2, 3.0), player, 10.0, 8.0, 4.0),
            // Into the north wall.
            Projectile::aimed(Vec3::new(9.0, 1.0, 3.0), Vec3::new(9.0, 1.0, -5.0), 10.0, 8.0, 4.0),
            // Short-lived, heading away.
            Projectile::aimed(Vec3::new(15.0, 1.0, 3.0), Vec3::new(20.0, 1.0, 3.0), 1.0, 8.0, 0.05),
        ];
        let mut total = 0.0;
        for _ in 0..20 {
            total += advance_projectiles(&mut projectiles, 0.05, &map, player, 0.6);
        }
        assert_eq!(total, 8.0);
        assert!(projectiles.is_empty());
    }

    #[test]
    fn weapon_slots_round_trip() {
        for kind in WeaponKind::ALL {
            assert_eq!(WeaponKind::from_slot(kind.slot()), Some(kind));
        }
        assert_eq!(WeaponKind::from_slot(7), None);
        assert_eq!(WeaponKind::from_name("Shotgun"), Some(WeaponKind::Shotgun));
    }
}
