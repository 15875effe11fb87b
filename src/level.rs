use glam::Vec3;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tilemap::{Cell, TileMap};
use crate::world::{EnemyKind, PickupKind};

/// Number of point lights the shader evaluates.
pub const MAX_LIGHTS: usize = 8;

/// Height added per raised-floor digit in the map rows.
pub const FLOOR_STEP: f32 = 0.25;

const BUILTIN_LEVEL: &str = include_str!("../assets/levels/hangar.xml");

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("invalid level XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("<{element}> is missing the `{attribute}` attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    #[error("<{element}> attribute `{attribute}` has invalid value `{value}`")]
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },
    #[error("level has no <map> rows")]
    EmptyMap,
    #[error("map row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("unknown map character `{ch}` at column {col}, row {row}")]
    UnknownCell { ch: char, col: usize, row: usize },
    #[error("map border must be solid wall")]
    OpenBorder,
    #[error("map must contain exactly one `P` spawn, found {0}")]
    Spawn(usize),
    #[error("unknown {element} kind `{kind}`")]
    UnknownKind { element: &'static str, kind: String },
    #[error("{element} at ({col}, {row}) is not on a floor cell")]
    NotOnFloor {
        element: &'static str,
        col: i32,
        row: i32,
    },
    #[error("level defines {0} lights, at most {MAX_LIGHTS} are supported")]
    TooManyLights(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerSpawn {
    pub col: i32,
    pub row: i32,
    /// Initial yaw in radians.
    pub yaw: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnemyPlacement {
    pub kind: EnemyKind,
    pub col: i32,
    pub row: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PickupPlacement {
    pub kind: PickupKind,
    pub value: f32,
    pub col: i32,
    pub row: i32,
}

/// Static point light. Only its brightness animates, as a pure function of
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub position: Vec3,
    pub color: Vec3,
    pub radius: f32,
    pub intensity: f32,
    pub flicker: f32,
    pub phase: f32,
}

impl Light {
    pub fn intensity_at(&self, time: f32) -> f32 {
        if self.flicker <= 0.0 {
            return self.intensity;
        }
        let wave = (time * 13.0 + self.phase).sin() * (time * 5.3 + self.phase * 1.7).sin();
        self.intensity * (1.0 - self.flicker * (0.5 + 0.5 * wave))
    }
}

/// Fully validated description of a playable level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub name: String,
    pub seed: u64,
    pub wall_height: f32,
    pub map: TileMap,
    pub spawn: PlayerSpawn,
    pub enemies: Vec<EnemyPlacement>,
    pub pickups: Vec<PickupPlacement>,
    pub lights: Vec<Light>,
}

impl Level {
    /// The level shipped with the binary.
    pub fn builtin() -> Result<Self, LevelError> {
        Self::from_xml(BUILTIN_LEVEL)
    }

    /// Parses and validates a level document.
    pub fn from_xml(xml: &str) -> Result<Self, LevelError> {
        let document = Document::parse(xml)?;
        let root = document.root_element();

        let name = root.attribute("name").unwrap_or("Untitled").to_string();
        let cell_size = positive_attr(&root, "level", "cell-size", 2.0)?;
        let wall_height = positive_attr(&root, "level", "wall-height", 3.0)?;
        let seed = parse_attr(&root, "level", "seed", 0u64)?;

        let rows: Vec<String> = root
            .children()
            .find(|child| child.has_tag_name("map"))
            .map(|map| {
                map.children()
                    .filter(|child| child.has_tag_name("row"))
                    .filter_map(|row| row.text())
                    .map(|text| text.trim().to_string())
                    .filter(|text| !text.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let (map, spawn_cell) = parse_map(&rows, cell_size)?;

        let yaw = root
            .children()
            .find(|child| child.has_tag_name("spawn"))
            .map(|spawn| parse_attr(&spawn, "spawn", "yaw", 0.0f32))
            .transpose()?
            .unwrap_or(0.0)
            .to_radians();
        let spawn = PlayerSpawn {
            col: spawn_cell.0,
            row: spawn_cell.1,
            yaw,
        };

        let mut enemies = Vec::new();
        for node in root.children().filter(|n| n.has_tag_name("enemy")) {
            let kind_name = required_attr(&node, "enemy", "kind")?;
            let kind = EnemyKind::from_name(kind_name).ok_or_else(|| LevelError::UnknownKind {
                element: "enemy",
                kind: kind_name.to_string(),
            })?;
            let (col, row) = parse_cell(&node, "enemy", &map)?;
            enemies.push(EnemyPlacement { kind, col, row });
        }

        let mut pickups = Vec::new();
        for node in root.children().filter(|n| n.has_tag_name("pickup")) {
            let kind_name = required_attr(&node, "pickup", "kind")?;
            let kind = PickupKind::from_name(kind_name).ok_or_else(|| LevelError::UnknownKind {
                element: "pickup",
                kind: kind_name.to_string(),
            })?;
            let value = parse_attr(&node, "pickup", "value", default_pickup_value(kind))?;
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid("pickup", "value", value.to_string()));
            }
            let (col, row) = parse_cell(&node, "pickup", &map)?;
            pickups.push(PickupPlacement {
                kind,
                value,
                col,
                row,
            });
        }

        let mut lights = Vec::new();
        for (index, node) in root
            .children()
            .filter(|n| n.has_tag_name("light"))
            .enumerate()
        {
            let col = parse_required::<i32>(&node, "light", "col")?;
            let row = parse_required::<i32>(&node, "light", "row")?;
            let (x, z) = map.cell_center(col, row);
            let height = parse_attr(&node, "light", "height", wall_height - 0.3)?;
            lights.push(Light {
                position: Vec3::new(x, height, z),
                color: parse_color(&node, "light", Vec3::ONE)?,
                radius: parse_attr(&node, "light", "radius", 6.0f32)?.max(0.1),
                intensity: parse_attr(&node, "light", "intensity", 1.0f32)?.max(0.0),
                flicker: parse_attr(&node, "light", "flicker", 0.0f32)?.clamp(0.0, 1.0),
                phase: index as f32 * 2.399,
            });
        }
        if lights.len() > MAX_LIGHTS {
            return Err(LevelError::TooManyLights(lights.len()));
        }

        Ok(Self {
            name,
            seed,
            wall_height,
            map,
            spawn,
            enemies,
            pickups,
            lights,
        })
    }

    /// World-space player spawn position at floor level.
    pub fn spawn_position(&self) -> Vec3 {
        let (x, z) = self.map.cell_center(self.spawn.col, self.spawn.row);
        Vec3::new(x, self.map.floor_height(self.spawn.col, self.spawn.row), z)
    }
}

fn default_pickup_value(kind: PickupKind) -> f32 {
    match kind {
        PickupKind::Health => 25.0,
        PickupKind::Armor => 50.0,
        PickupKind::Ammo => 20.0,
        PickupKind::Weapon(_) => 0.0,
    }
}

fn parse_map(rows: &[String], cell_size: f32) -> Result<(TileMap, (i32, i32)), LevelError> {
    let expected = rows.first().ok_or(LevelError::EmptyMap)?.chars().count();
    let mut cells = Vec::with_capacity(expected * rows.len());
    let mut heights = Vec::with_capacity(expected * rows.len());
    let mut spawns = Vec::new();

    for (row, text) in rows.iter().enumerate() {
        let found = text.chars().count();
        if found != expected {
            return Err(LevelError::RaggedRow {
                row,
                found,
                expected,
            });
        }
        for (col, ch) in text.chars().enumerate() {
            let (cell, height) = match ch {
                '#' => (Cell::Wall, 0.0),
                '.' => (Cell::Floor, 0.0),
                'P' => {
                    spawns.push((col as i32, row as i32));
                    (Cell::Floor, 0.0)
                }
                '1'..='4' => (Cell::Floor, (ch as u8 - b'0') as f32 * FLOOR_STEP),
                _ => return Err(LevelError::UnknownCell { ch, col, row }),
            };
            cells.push(cell);
            heights.push(height);
        }
    }

    let map = TileMap::new(expected, rows.len(), cell_size, cells, heights);
    if !map.has_solid_border() {
        return Err(LevelError::OpenBorder);
    }
    match spawns.as_slice() {
        [spawn] => Ok((map, *spawn)),
        _ => Err(LevelError::Spawn(spawns.len())),
    }
}

fn invalid(element: &'static str, attribute: &'static str, value: String) -> LevelError {
    LevelError::InvalidAttribute {
        element,
        attribute,
        value,
    }
}

fn required_attr<'a>(
    node: &Node<'a, '_>,
    element: &'static str,
    attribute: &'static str,
) -> Result<&'a str, LevelError> {
    node.attribute(attribute)
        .map(str::trim)
        .ok_or(LevelError::MissingAttribute { element, attribute })
}

fn parse_required<T: std::str::FromStr>(
    node: &Node<'_, '_>,
    element: &'static str,
    attribute: &'static str,
) -> Result<T, LevelError> {
    let value = required_attr(node, element, attribute)?;
    value
        .parse::<T>()
        .map_err(|_| invalid(element, attribute, value.to_string()))
}

fn parse_attr<T: std::str::FromStr>(
    node: &Node<'_, '_>,
    element: &'static str,
    attribute: &'static str,
    default: T,
) -> Result<T, LevelError> {
    match node.attribute(attribute).map(str::trim) {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| invalid(element, attribute, value.to_string())),
        None => Ok(default),
    }
}

/// Parses a finite, strictly positive length.
fn positive_attr(
    node: &Node<'_, '_>,
    element: &'static str,
    attribute: &'static str,
    default: f32,
) -> Result<f32, LevelError> {
    let value = parse_attr(node, element, attribute, default)?;
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(element, attribute, value.to_string()));
    }
    Ok(value)
}

fn parse_cell(
    node: &Node<'_, '_>,
    element: &'static str,
    map: &TileMap,
) -> Result<(i32, i32), LevelError> {
    let col = parse_required::<i32>(node, element, "col")?;
    let row = parse_required::<i32>(node, element, "row")?;
    if map.is_wall(col, row) {
        return Err(LevelError::NotOnFloor { element, col, row });
    }
    Ok((col, row))
}

/// Colors are written as `r g b` in the 0-255 range.
fn parse_color(
    node: &Node<'_, '_>,
    element: &'static str,
    default: Vec3,
) -> Result<Vec3, LevelError> {
    let Some(value) = node.attribute("color") else {
        return Ok(default);
    };
    let numbers: Vec<f32> = value
        .split_whitespace()
        .filter_map(|component| component.parse::<f32>().ok())
        .collect();
    match numbers.as_slice() {
        [r, g, b] => Ok(Vec3::new(*r, *g, *b) / 255.0),
        _ => Err(invalid(element, "color", value.to_string())),
    }
}
