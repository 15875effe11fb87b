//! Screen-space overlay drawn after the 3D pass with depth testing off.
//!
//! Everything is built from flat rectangles in pixel coordinates: resource
//! bars, the crosshair, a per-weapon silhouette and a 3x5 bitmap font for
//! numbers and banners.

use glam::{Vec2, Vec3};

use crate::combat::WeaponKind;
use crate::render::vertex::VertexBatch;

const GLYPH_WIDTH: f32 = 3.0;
const GLYPH_ROWS: usize = 5;
const GLYPH_ADVANCE: f32 = 4.0;

const HEALTH_COLOR: Vec3 = Vec3::new(0.85, 0.12, 0.1);
const ARMOR_COLOR: Vec3 = Vec3::new(0.2, 0.45, 0.95);
const AMMO_COLOR: Vec3 = Vec3::new(0.9, 0.75, 0.2);
const BAR_BACKING: Vec3 = Vec3::new(0.08, 0.08, 0.1);
const TEXT_COLOR: Vec3 = Vec3::new(0.92, 0.92, 0.88);
const DIM_TEXT: Vec3 = Vec3::new(0.35, 0.35, 0.38);

/// Terminal-state message shown across the middle of the screen.
#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub title: String,
    pub subtitle: String,
    pub color: Vec3,
}

/// Snapshot of everything the overlay shows.
#[derive(Debug, Clone, PartialEq)]
pub struct HudState<'a> {
    pub health: f32,
    pub max_health: f32,
    pub armor: f32,
    pub max_armor: f32,
    pub ammo: u32,
    pub max_ammo: u32,
    pub weapon: WeaponKind,
    pub owned: &'a [WeaponKind],
    pub kills: usize,
    pub total_enemies: usize,
    /// Remaining muzzle flash in `[0, 1]`.
    pub muzzle_flash: f32,
    pub banner: Option<Banner>,
}

pub fn build_hud(state: &HudState<'_>, width: f32, height: f32, batch: &mut VertexBatch) {
    let scale = (height / 720.0).max(0.5);
    let margin = 20.0 * scale;

    push_weapon(batch, state.weapon, state.muzzle_flash, width, height, scale);
    push_crosshair(batch, Vec2::new(width * 0.5, height * 0.5), scale);

    let bar_size = Vec2::new(220.0 * scale, 14.0 * scale);
    let text_scale = 3.0 * scale;
    let health_origin = Vec2::new(margin, height - margin - bar_size.y * 2.0 - 8.0 * scale);
    let armor_origin = Vec2::new(margin, height - margin - bar_size.y);
    push_bar(batch, health_origin, bar_size, state.health / state.max_health, HEALTH_COLOR);
    push_bar(batch, armor_origin, bar_size, state.armor / state.max_armor, ARMOR_COLOR);
    let label_x = margin + bar_size.x + 10.0 * scale;
    push_text(
        batch,
        &format!("HP {}", state.health.max(0.0).ceil() as u32),
        Vec2::new(label_x, health_origin.y - 0.5 * scale),
        text_scale,
        TEXT_COLOR,
    );
    push_text(
        batch,
        &format!("AR {}", state.armor.max(0.0).ceil() as u32),
        Vec2::new(label_x, armor_origin.y - 0.5 * scale),
        text_scale,
        TEXT_COLOR,
    );

    let ammo_text = format!("AMMO {}", state.ammo);
    let ammo_width = text_width(&ammo_text, text_scale);
    let ammo_bar_origin = Vec2::new(width - margin - bar_size.x, armor_origin.y);
    push_bar(
        batch,
        ammo_bar_origin,
        bar_size,
        state.ammo as f32 / state.max_ammo.max(1) as f32,
        AMMO_COLOR,
    );
    push_text(
        batch,
        &ammo_text,
        Vec2::new(width - margin - ammo_width, health_origin.y - 0.5 * scale),
        text_scale,
        TEXT_COLOR,
    );

    push_text(
        batch,
        &format!("KILLS {}/{}", state.kills, state.total_enemies),
        Vec2::new(margin, margin),
        text_scale,
        TEXT_COLOR,
    );
    push_text(
        batch,
        state.weapon.spec().name,
        Vec2::new(margin, margin + 8.0 * text_scale),
        text_scale,
        AMMO_COLOR,
    );
    push_weapon_slots(batch, state, width, margin, text_scale);

    if let Some(banner) = &state.banner {
        push_banner(batch, banner, width, height, scale);
    }
}

fn push_bar(batch: &mut VertexBatch, origin: Vec2, size: Vec2, fraction: f32, color: Vec3) {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let border = 2.0;
    batch.push_rect(
        origin - Vec2::splat(border),
        size + Vec2::splat(border * 2.0),
        BAR_BACKING,
    );
    if fraction > 0.0 {
        batch.push_rect(origin, Vec2::new(size.x * fraction, size.y), color);
    }
}

fn push_crosshair(batch: &mut VertexBatch, center: Vec2, scale: f32) {
    let gap = 4.0 * scale;
    let length = 8.0 * scale;
    let thickness = (2.0 * scale).max(1.0);
    let half = thickness * 0.5;
    let color = Vec3::new(0.9, 0.95, 0.9);
    batch.push_rect(
        Vec2::new(center.x - gap - length, center.y - half),
        Vec2::new(length, thickness),
        color,
    );
    batch.push_rect(
        Vec2::new(center.x + gap, center.y - half),
        Vec2::new(length, thickness),
        color,
    );
    batch.push_rect(
        Vec2::new(center.x - half, center.y - gap - length),
        Vec2::new(thickness, length),
        color,
    );
    batch.push_rect(
        Vec2::new(center.x - half, center.y + gap),
        Vec2::new(thickness, length),
        color,
    );
}

fn push_weapon_slots(
    batch: &mut VertexBatch,
    state: &HudState<'_>,
    width: f32,
    margin: f32,
    text_scale: f32,
) {
    let slots = WeaponKind::ALL.len() as f32;
    let mut x = width - margin - (slots * 2.0 - 1.0) * GLYPH_ADVANCE * text_scale;
    for weapon in WeaponKind::ALL {
        let color = if weapon == state.weapon {
            AMMO_COLOR
        } else if state.owned.contains(&weapon) {
            TEXT_COLOR
        } else {
            DIM_TEXT
        };
        push_text(
            batch,
            &(weapon.slot() + 1).to_string(),
            Vec2::new(x, margin),
            text_scale,
            color,
        );
        x += 2.0 * GLYPH_ADVANCE * text_scale;
    }
}

/// Rectangle of a weapon silhouette in 1/720-screen units. `x` is measured
/// from the screen center, `y` upward from the bottom edge.
#[derive(Debug, Clone, Copy)]
struct Part {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    shade: f32,
}

const fn part(x: f32, y: f32, w: f32, h: f32, shade: f32) -> Part {
    Part { x, y, w, h, shade }
}

const PISTOL_PARTS: &[Part] = &[
    part(-20.0, 0.0, 40.0, 90.0, 0.22),
    part(-28.0, 90.0, 56.0, 50.0, 0.38),
    part(-10.0, 140.0, 20.0, 40.0, 0.3),
];

const SHOTGUN_PARTS: &[Part] = &[
    part(-45.0, 0.0, 90.0, 70.0, 0.28),
    part(-35.0, 70.0, 70.0, 60.0, 0.34),
    part(-30.0, 130.0, 26.0, 110.0, 0.45),
    part(4.0, 130.0, 26.0, 110.0, 0.45),
];

const CHAINGUN_PARTS: &[Part] = &[
    part(-60.0, 0.0, 120.0, 80.0, 0.3),
    part(-36.0, 80.0, 18.0, 130.0, 0.5),
    part(-9.0, 80.0, 18.0, 130.0, 0.55),
    part(18.0, 80.0, 18.0, 130.0, 0.5),
    part(-45.0, 150.0, 90.0, 16.0, 0.25),
];

fn weapon_parts(weapon: WeaponKind) -> (&'static [Part], f32) {
    match weapon {
        WeaponKind::Pistol => (PISTOL_PARTS, 180.0),
        WeaponKind::Shotgun => (SHOTGUN_PARTS, 240.0),
        WeaponKind::Chaingun => (CHAINGUN_PARTS, 210.0),
    }
}

fn push_weapon(
    batch: &mut VertexBatch,
    weapon: WeaponKind,
    muzzle_flash: f32,
    width: f32,
    height: f32,
    scale: f32,
) {
    let (parts, muzzle) = weapon_parts(weapon);
    let flash = muzzle_flash.clamp(0.0, 1.0);
    let recoil = flash * 14.0;
    let center = width * 0.5;
    let tint = Vec3::new(1.0, 0.97, 0.92);

    if flash > 0.0 {
        let glow = Vec3::new(1.0, 0.85, 0.35);
        for (size, strength) in [(70.0, 0.55), (40.0, 0.85), (18.0, 1.0)] {
            let size = size * (0.6 + 0.4 * flash) * scale;
            let tip_y = height - (muzzle - recoil) * scale;
            batch.push_rect(
                Vec2::new(center - size * 0.5, tip_y - size * 0.75),
                Vec2::splat(size),
                glow * strength,
            );
        }
    }

    for part in parts {
        let top = height - (part.y + part.h - recoil) * scale;
        batch.push_rect(
            Vec2::new(center + part.x * scale, top),
            Vec2::new(part.w * scale, part.h * scale),
            tint * part.shade,
        );
    }
}

fn push_banner(batch: &mut VertexBatch, banner: &Banner, width: f32, height: f32, scale: f32) {
    let title_scale = 9.0 * scale;
    let subtitle_scale = 3.0 * scale;
    let backdrop_height = 150.0 * scale;
    batch.push_rect(
        Vec2::new(0.0, height * 0.5 - backdrop_height * 0.5),
        Vec2::new(width, backdrop_height),
        Vec3::splat(0.03),
    );
    let title_width = text_width(&banner.title, title_scale);
    push_text(
        batch,
        &banner.title,
        Vec2::new((width - title_width) * 0.5, height * 0.5 - 40.0 * scale),
        title_scale,
        banner.color,
    );
    let subtitle_width = text_width(&banner.subtitle, subtitle_scale);
    push_text(
        batch,
        &banner.subtitle,
        Vec2::new((width - subtitle_width) * 0.5, height * 0.5 + 22.0 * scale),
        subtitle_scale,
        TEXT_COLOR,
    );
}

/// Width in pixels of `text` rendered at `scale` pixels per font cell.
pub fn text_width(text: &str, scale: f32) -> f32 {
    let count = text.chars().count() as f32;
    if count == 0.0 {
        return 0.0;
    }
    (count * GLYPH_ADVANCE - (GLYPH_ADVANCE - GLYPH_WIDTH)) * scale
}

/// Draws `text` with its top-left corner at `origin`. Characters without a
/// glyph are skipped but still advance the cursor.
pub fn push_text(batch: &mut VertexBatch, text: &str, origin: Vec2, scale: f32, color: Vec3) {
    let mut cursor = origin.x;
    for ch in text.chars() {
        if let Some(rows) = glyph(ch) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH as u8 {
                    if bits & (0b100 >> col) != 0 {
                        batch.push_rect(
                            Vec2::new(cursor + col as f32 * scale, origin.y + row as f32 * scale),
                            Vec2::splat(scale),
                            color,
                        );
                    }
                }
            }
        }
        cursor += GLYPH_ADVANCE * scale;
    }
}

fn glyph(ch: char) -> Option<[u8; GLYPH_ROWS]> {
    let rows = match ch.to_ascii_uppercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '%' => [0b101, 0b001, 0b010, 0b100, 0b101],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ' ' => [0; 5],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(banner: Option<Banner>) -> HudState<'static> {
        HudState {
            health: 100.0,
            max_health: 100.0,
            armor: 0.0,
            max_armor: 100.0,
            ammo: 50,
            max_ammo: 200,
            weapon: WeaponKind::Pistol,
            owned: &[WeaponKind::Pistol],
            kills: 0,
            total_enemies: 7,
            muzzle_flash: 0.0,
            banner,
        }
    }

    #[test]
    fn text_emits_one_rect_per_lit_cell() {
        let mut batch = VertexBatch::new();
        push_text(&mut batch, "1", Vec2::ZERO, 2.0, Vec3::ONE);
        // '1' has 8 lit cells, each a two-triangle quad.
        assert_eq!(batch.len(), 8 * 6);
        batch.clear();
        push_text(&mut batch, "  \u{263a}", Vec2::ZERO, 2.0, Vec3::ONE);
        assert!(batch.is_empty());
    }

    fn text_height(scale: f32) -> f32 {
        GLYPH_ROWS as f32 * scale
    }

    #[test]
    fn text_height_covers_every_glyph_row() {
        let mut batch = VertexBatch::new();
        push_text(&mut batch, "8", Vec2::ZERO, 2.0, Vec3::ONE);
        let bottom = batch
            .vertices()
            .iter()
            .map(|vertex| vertex.position[1])
            .fold(f32::MIN, f32::max);
        assert_eq!(bottom, text_height(2.0));
    }

    #[test]
    fn text_width_matches_advance() {
        assert_eq!(text_width("", 2.0), 0.0);
        assert_eq!(text_width("A", 2.0), 6.0);
        assert_eq!(text_width("AB", 2.0), 14.0);
    }

    #[test]
    fn banner_text_has_glyphs() {
        for message in [
            "YOU DIED",
            "LEVEL COMPLETE",
            "UNSUPPORTED",
            "PRESS SPACE OR CLICK TO RESTART",
            "KILLS 7/7",
        ] {
            assert!(message.chars().all(|ch| glyph(ch).is_some()), "{message}");
        }
    }

    #[test]
    fn banner_and_flash_add_geometry() {
        let mut plain = VertexBatch::new();
        build_hud(&state(None), 1280.0, 720.0, &mut plain);
        assert!(!plain.is_empty());

        let mut with_banner = VertexBatch::new();
        let banner = Banner {
            title: "YOU DIED".into(),
            subtitle: "PRESS SPACE".into(),
            color: HEALTH_COLOR,
        };
        build_hud(&state(Some(banner)), 1280.0, 720.0, &mut with_banner);
        assert!(with_banner.len() > plain.len());

        let mut flashing = VertexBatch::new();
        let mut firing = state(None);
        firing.muzzle_flash = 1.0;
        build_hud(&firing, 1280.0, 720.0, &mut flashing);
        assert_eq!(flashing.len(), plain.len() + 3 * 6);
    }

    #[test]
    fn every_weapon_has_a_silhouette() {
        for weapon in WeaponKind::ALL {
            let (parts, muzzle) = weapon_parts(weapon);
            assert!(!parts.is_empty());
            let tallest = parts.iter().map(|p| p.y + p.h).fold(0.0, f32::max);
            assert!(muzzle >= tallest - 1e-3);
        }
    }
}
