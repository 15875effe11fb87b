use glam::Vec3;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure while reading a tuning override document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("<{tag}> is not a number: {value}")]
    Number { tag: String, value: String },
    #[error("<{tag}> needs three components, got `{value}`")]
    Vector { tag: String, value: String },
    #[error("<{tag}> must be a positive finite number, got {value}")]
    NotPositive { tag: &'static str, value: f32 },
    #[error("<{tag}> of {radius} does not fit in a {cell_size} cell; it must be under half a cell")]
    TooWide {
        tag: &'static str,
        radius: f32,
        cell_size: f32,
    },
}

/// Tuning constants for the arena shooter.
///
/// Every field has a default; an XML document may override any subset:
///
/// ```xml
/// <config>
///     <move-speed>5.0</move-speed>
///     <fog-color>0.05 0.05 0.08</fog-color>
/// </config>
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub move_speed: f32,
    pub mouse_sensitivity: f32,
    /// Pitch clamp in degrees, applied symmetrically.
    pub max_pitch_degrees: f32,
    pub eye_height: f32,
    pub player_radius: f32,
    pub enemy_radius: f32,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Upper bound on a single simulation step, in seconds.
    pub max_frame_delta: f32,
    pub armor_absorption: f32,
    pub pickup_radius: f32,
    pub melee_distance: f32,
    pub contact_damage_scale: f32,
    pub hitscan_radius: f32,
    pub flinch_duration: f32,
    pub muzzle_flash_duration: f32,
    pub damage_flash_duration: f32,
    pub projectile_lifetime: f32,
    pub projectile_hit_radius: f32,
    pub max_health: f32,
    pub max_armor: f32,
    pub max_ammo: u32,
    pub starting_ammo: u32,
    pub fog_color: Vec3,
    pub fog_density: f32,
    pub ambient: f32,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            move_speed: 4.5,
            mouse_sensitivity: 0.0022,
            max_pitch_degrees: 80.0,
            eye_height: 1.2,
            player_radius: 0.3,
            enemy_radius: 0.35,
            fov_degrees: 70.0,
            near: 0.05,
            far: 100.0,
            max_frame_delta: 0.033,
            armor_absorption: 0.6,
            pickup_radius: 0.9,
            melee_distance: 0.9,
            contact_damage_scale: 2.0,
            hitscan_radius: 0.6,
            flinch_duration: 0.2,
            muzzle_flash_duration: 0.07,
            damage_flash_duration: 0.35,
            projectile_lifetime: 4.0,
            projectile_hit_radius: 0.6,
            max_health: 100.0,
            max_armor: 100.0,
            max_ammo: 200,
            starting_ammo: 50,
            fog_color: Vec3::new(0.04, 0.035, 0.05),
            fog_density: 0.06,
            ambient: 0.18,
            window_width: 1280,
            window_height: 720,
        }
    }
}

impl GameConfig {
    /// Applies the overrides found in `xml` on top of the defaults.
    pub fn from_xml(xml: &str) -> Result<Self, ConfigError> {
        let document = Document::parse(xml)?;
        let root = document.root_element();
        let mut config = Self::default();

        config.move_speed = parse_f32(&root, "move-speed", config.move_speed)?;
        config.mouse_sensitivity =
            parse_f32(&root, "mouse-sensitivity", config.mouse_sensitivity)?;
        config.max_pitch_degrees = parse_f32(&root, "max-pitch", config.max_pitch_degrees)?;
        config.eye_height = parse_f32(&root, "eye-height", config.eye_height)?;
        config.player_radius = parse_f32(&root, "player-radius", config.player_radius)?;
        config.enemy_radius = parse_f32(&root, "enemy-radius", config.enemy_radius)?;
        config.fov_degrees = parse_f32(&root, "fov", config.fov_degrees)?;
        config.near = parse_f32(&root, "near", config.near)?;
        config.far = parse_f32(&root, "far", config.far)?;
        config.max_frame_delta = parse_f32(&root, "max-frame-delta", config.max_frame_delta)?;
        config.armor_absorption =
            parse_f32(&root, "armor-absorption", config.armor_absorption)?;
        config.pickup_radius = parse_f32(&root, "pickup-radius", config.pickup_radius)?;
        config.melee_distance = parse_f32(&root, "melee-distance", config.melee_distance)?;
        config.contact_damage_scale =
            parse_f32(&root, "contact-damage-scale", config.contact_damage_scale)?;
        config.hitscan_radius = parse_f32(&root, "hitscan-radius", config.hitscan_radius)?;
        config.flinch_duration = parse_f32(&root, "flinch-duration", config.flinch_duration)?;
        config.projectile_lifetime =
            parse_f32(&root, "projectile-lifetime", config.projectile_lifetime)?;
        config.max_health = parse_f32(&root, "max-health", config.max_health)?;
        config.max_armor = parse_f32(&root, "max-armor", config.max_armor)?;
        config.max_ammo = parse_f32(&root, "max-ammo", config.max_ammo as f32)?.max(0.0) as u32;
        config.starting_ammo =
            parse_f32(&root, "starting-ammo", config.starting_ammo as f32)?.max(0.0) as u32;
        config.fog_color = parse_vec3(&root, "fog-color", config.fog_color)?;
        config.fog_density = parse_f32(&root, "fog-density", config.fog_density)?;
        config.ambient = parse_f32(&root, "ambient", config.ambient)?;
        config.window_width =
            parse_f32(&root, "window-width", config.window_width as f32)?.max(1.0) as u32;
        config.window_height =
            parse_f32(&root, "window-height", config.window_height as f32)?.max(1.0) as u32;

        config.starting_ammo = config.starting_ammo.min(config.max_ammo);
        for (tag, value) in config.radii() {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NotPositive { tag, value });
            }
        }
        Ok(config)
    }

    /// Checks that the player and enemies can move between the walls of a
    /// map built from `cell_size` cells.
    pub fn fits_cell(&self, cell_size: f32) -> Result<(), ConfigError> {
        for (tag, radius) in self.radii() {
            if radius >= cell_size * 0.5 {
                return Err(ConfigError::TooWide {
                    tag,
                    radius,
                    cell_size,
                });
            }
        }
        Ok(())
    }

    fn radii(&self) -> [(&'static str, f32); 2] {
        [
            ("player-radius", self.player_radius),
            ("enemy-radius", self.enemy_radius),
        ]
    }

    pub fn max_pitch(&self) -> f32 {
        self.max_pitch_degrees.to_radians()
    }
}

pub(crate) fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_f32(node: &Node<'_, '_>, tag: &str, default: f32) -> Result<f32, ConfigError> {
    match optional_text(node, tag) {
        Some(value) => value.parse::<f32>().map_err(|_| ConfigError::Number {
            tag: tag.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

fn parse_vec3(node: &Node<'_, '_>, tag: &str, default: Vec3) -> Result<Vec3, ConfigError> {
    let Some(value) = optional_text(node, tag) else {
        return Ok(default);
    };
    let numbers: Vec<f32> = value
        .split_whitespace()
        .filter_map(|component| component.parse::<f32>().ok())
        .collect();
    match numbers.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(ConfigError::Vector {
            tag: tag.to_string(),
            value,
        }),
    }
}
