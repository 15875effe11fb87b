use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

use crate::camera::{self, Camera};
use crate::config::GameConfig;
use crate::level::{Level, Light, MAX_LIGHTS};
use crate::render::vertex::{Material, VertexBatch};
use crate::world::{Enemy, Pickup, PickupKind, World};

const WALL_COLOR: Vec3 = Vec3::new(0.55, 0.42, 0.36);
const FLOOR_COLOR: Vec3 = Vec3::new(0.42, 0.33, 0.24);
const RAISED_FLOOR_COLOR: Vec3 = Vec3::new(0.5, 0.4, 0.3);
const RISER_COLOR: Vec3 = Vec3::new(0.35, 0.3, 0.28);
const CEILING_COLOR: Vec3 = Vec3::new(0.22, 0.22, 0.25);
const FIXTURE_COLOR: Vec3 = Vec3::new(0.15, 0.15, 0.17);
const PROJECTILE_COLOR: Vec3 = Vec3::new(1.0, 0.55, 0.15);
const CORPSE_DARKEN: f32 = 0.35;

/// Uniform block shared by the 3D and HUD passes.
///
/// Matches `Uniforms` in the WGSL source; every member is 16-byte aligned.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneUniforms {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    /// Camera position, `w` holds the elapsed time.
    pub camera_position: [f32; 4],
    /// Fog color, `w` holds the density.
    pub fog: [f32; 4],
    /// Additive damage tint, `w` holds its strength.
    pub damage: [f32; 4],
    /// Additive muzzle-flash tint, `w` holds its strength.
    pub flash: [f32; 4],
    /// `x` light count, `y` lit (1) or flat (0), `z` ambient term.
    pub params: [f32; 4],
    /// Light position, `w` holds the radius.
    pub lights_position: [[f32; 4]; MAX_LIGHTS],
    /// Light color premultiplied by the animated intensity.
    pub lights_color: [[f32; 4]; MAX_LIGHTS],
}

impl Default for SceneUniforms {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl SceneUniforms {
    /// Uniforms for the 3D pass at `time` seconds.
    #[allow(clippy::too_many_arguments)]
    pub fn world(
        camera: &Camera,
        aspect: f32,
        config: &GameConfig,
        lights: &[Light],
        time: f32,
        damage_flash: f32,
        muzzle_flash: f32,
    ) -> Self {
        let projection =
            camera::projection_matrix(config.fov_degrees, aspect, config.near, config.far);
        let mut uniforms = Self {
            projection: projection.to_cols_array_2d(),
            view: camera.view_matrix().to_cols_array_2d(),
            camera_position: camera.position.extend(time).into(),
            fog: config.fog_color.extend(config.fog_density).into(),
            damage: [0.8, 0.05, 0.02, damage_flash.clamp(0.0, 1.0) * 0.45],
            flash: [1.0, 0.8, 0.45, muzzle_flash.clamp(0.0, 1.0) * 0.18],
            params: [0.0, 1.0, config.ambient, 0.0],
            ..Self::zeroed()
        };
        let count = lights.len().min(MAX_LIGHTS);
        for (slot, light) in lights.iter().take(count).enumerate() {
            uniforms.lights_position[slot] = light.position.extend(light.radius).into();
            uniforms.lights_color[slot] =
                (light.color * light.intensity_at(time)).extend(1.0).into();
        }
        uniforms.params[0] = count as f32;
        uniforms
    }

    /// Uniforms for the HUD pass: pixel-space projection, no lighting.
    pub fn hud(width: f32, height: f32) -> Self {
        Self {
            projection: camera::hud_projection(width, height).to_cols_array_2d(),
            view: Mat4::IDENTITY.to_cols_array_2d(),
            params: [0.0, 0.0, 1.0, 0.0],
            ..Self::zeroed()
        }
    }
}

/// Static level geometry: floors, ceilings, walls, stair risers and light
/// fixtures. Built once per level.
pub fn build_static_scene(level: &Level, batch: &mut VertexBatch) {
    batch.clear();
    let map = &level.map;
    let size = map.cell_size();
    let ceiling = level.wall_height;

    for (col, row) in map.floor_cells() {
        let x0 = col as f32 * size;
        let z0 = row as f32 * size;
        let (x1, z1) = (x0 + size, z0 + size);
        let floor = map.floor_height(col, row);
        let floor_color = if floor > 0.0 {
            RAISED_FLOOR_COLOR
        } else {
            FLOOR_COLOR
        };

        batch.push_quad(
            [
                Vec3::new(x0, floor, z1),
                Vec3::new(x1, floor, z1),
                Vec3::new(x1, floor, z0),
                Vec3::new(x0, floor, z0),
            ],
            Vec3::Y,
            floor_color,
            Material::Plank,
        );
        batch.push_quad(
            [
                Vec3::new(x0, ceiling, z0),
                Vec3::new(x1, ceiling, z0),
                Vec3::new(x1, ceiling, z1),
                Vec3::new(x0, ceiling, z1),
            ],
            Vec3::NEG_Y,
            CEILING_COLOR,
            Material::Flat,
        );

        // Each side faces a neighbour: walls get a full-height face, lower
        // floors get a riser from their height up to ours.
        let sides = [
            ((0, -1), [Vec2::new(x1, z0), Vec2::new(x0, z0)], Vec3::Z),
            ((0, 1), [Vec2::new(x0, z1), Vec2::new(x1, z1)], Vec3::NEG_Z),
            ((-1, 0), [Vec2::new(x0, z0), Vec2::new(x0, z1)], Vec3::X),
            ((1, 0), [Vec2::new(x1, z1), Vec2::new(x1, z0)], Vec3::NEG_X),
        ];
        for ((dc, dr), [a, b], inward) in sides {
            let (n_col, n_row) = (col + dc, row + dr);
            if map.is_wall(n_col, n_row) {
                push_vertical(batch, a, b, 0.0, ceiling, inward, WALL_COLOR, Material::Brick);
                continue;
            }
            let neighbour = map.floor_height(n_col, n_row);
            if neighbour < floor {
                // The riser belongs to the lower cell, so it faces outward.
                push_vertical(batch, b, a, neighbour, floor, -inward, RISER_COLOR, Material::Flat);
            }
        }
    }

    for light in &level.lights {
        let drop = (ceiling - light.position.y).max(0.0);
        if drop > 0.0 {
            batch.push_box(
                light.position,
                Vec3::new(0.05, drop, 0.05),
                FIXTURE_COLOR,
                Material::Flat,
            );
        }
        batch.push_box(
            light.position - Vec3::Y * 0.12,
            Vec3::new(0.3, 0.12, 0.3),
            light.color,
            Material::Emissive,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn push_vertical(
    batch: &mut VertexBatch,
    a: Vec2,
    b: Vec2,
    bottom: f32,
    top: f32,
    normal: Vec3,
    color: Vec3,
    material: Material,
) {
    batch.push_quad(
        [
            Vec3::new(a.x, bottom, a.y),
            Vec3::new(b.x, bottom, b.y),
            Vec3::new(b.x, top, b.y),
            Vec3::new(a.x, top, a.y),
        ],
        normal,
        color,
        material,
    );
}

/// Per-frame entity geometry: enemies, corpses, pickups and projectiles.
pub fn build_entities(world: &World, camera: &Camera, time: f32, batch: &mut VertexBatch) {
    for enemy in &world.enemies {
        if enemy.alive {
            push_enemy(batch, enemy, camera);
        } else {
            push_corpse(batch, enemy);
        }
    }
    for (index, pickup) in world.pickups.iter().enumerate() {
        if !pickup.collected {
            push_pickup(batch, pickup, time + index as f32 * 0.9);
        }
    }
    for projectile in &world.projectiles {
        batch.push_box(
            projectile.position - Vec3::Y * 0.12,
            Vec3::splat(0.24),
            PROJECTILE_COLOR,
            Material::Emissive,
        );
    }
}

fn push_enemy(batch: &mut VertexBatch, enemy: &Enemy, camera: &Camera) {
    let stats = enemy.kind.stats();
    let to_player = Vec2::new(
        camera.position.x - enemy.position.x,
        camera.position.z - enemy.position.z,
    );
    // Yaw that turns the box's +z face toward the player.
    let facing = to_player.x.atan2(to_player.y);
    let color = if enemy.flinch > 0.0 {
        stats.color.lerp(Vec3::ONE, 0.6)
    } else {
        stats.color
    };

    let body_height = stats.height * 0.7;
    let head_size = stats.width * 0.7;
    batch.push_oriented_box(
        enemy.position,
        Vec3::new(stats.width, body_height, stats.width * 0.6),
        facing,
        color,
        Material::Flat,
    );
    let head_base = enemy.position + Vec3::Y * body_height;
    batch.push_oriented_box(
        head_base,
        Vec3::new(head_size, stats.height - body_height, head_size),
        facing,
        color * 0.85,
        Material::Flat,
    );

    let (sin, cos) = facing.sin_cos();
    let forward = Vec3::new(sin, 0.0, cos);
    let side = Vec3::new(cos, 0.0, -sin);
    let eye_base = head_base
        + Vec3::Y * ((stats.height - body_height) * 0.45)
        + forward * (head_size * 0.5 + 0.01);
    for offset in [-1.0, 1.0] {
        batch.push_oriented_box(
            eye_base + side * (offset * head_size * 0.22),
            Vec3::new(0.08, 0.06, 0.02),
            facing,
            Vec3::new(1.0, 0.9, 0.3),
            Material::Emissive,
        );
    }

    if enemy.health < enemy.max_health {
        push_health_bar(batch, enemy, camera);
    }
}

/// Camera-facing bar floating above a wounded enemy.
fn push_health_bar(batch: &mut VertexBatch, enemy: &Enemy, camera: &Camera) {
    let stats = enemy.kind.stats();
    let center = enemy.position + Vec3::Y * (stats.height + 0.2);
    let right = camera.right();
    let width = stats.width;
    let height = 0.07;
    let fraction = (enemy.health / enemy.max_health).clamp(0.0, 1.0);
    let left = center - right * (width * 0.5);
    let normal = -camera.forward();

    let bar = |from: f32, to: f32| {
        let a = left + right * (width * from);
        let b = left + right * (width * to);
        [a, b, b + Vec3::Y * height, a + Vec3::Y * height]
    };
    batch.push_quad(bar(0.0, 1.0), normal, Vec3::new(0.25, 0.05, 0.05), Material::Emissive);
    // Lifted toward the camera so it never z-fights the backing quad.
    let lift = normal * 0.01;
    batch.push_quad(
        bar(0.0, fraction).map(|corner| corner + lift),
        normal,
        Vec3::new(0.2, 0.9, 0.25),
        Material::Emissive,
    );
}

fn push_corpse(batch: &mut VertexBatch, enemy: &Enemy) {
    let stats = enemy.kind.stats();
    batch.push_box(
        enemy.position,
        Vec3::new(stats.width * 1.3, 0.15, stats.width * 1.1),
        stats.color * CORPSE_DARKEN,
        Material::Flat,
    );
}

pub fn pickup_color(kind: PickupKind) -> Vec3 {
    match kind {
        PickupKind::Health => Vec3::new(0.9, 0.15, 0.15),
        PickupKind::Armor => Vec3::new(0.2, 0.45, 0.95),
        PickupKind::Ammo => Vec3::new(0.85, 0.75, 0.2),
        PickupKind::Weapon(_) => Vec3::new(0.6, 0.6, 0.65),
    }
}

fn push_pickup(batch: &mut VertexBatch, pickup: &Pickup, phase: f32) {
    let bob = 0.25 + 0.08 * (phase * 2.5).sin();
    let spin = phase * 1.8;
    let base = pickup.position + Vec3::Y * bob;
    let size = match pickup.kind {
        PickupKind::Weapon(_) => Vec3::new(0.6, 0.14, 0.22),
        _ => Vec3::splat(0.3),
    };
    batch.push_oriented_box(base, size, spin, pickup_color(pickup.kind), Material::Flat);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;

    const ROOM: &str = r#"
    <level seed="5" wall-height="3">
        <map>
            <row>#####</row>
            <row>#P.1#</row>
            <row>#####</row>
        </map>
        <enemy kind="zombie" col="2" row="1"/>
        <pickup kind="health" col="3" row="1"/>
        <light col="2" row="1" height="2.5"/>
    </level>
    "#;

    #[test]
    fn uniform_block_layout() {
        assert_eq!(std::mem::size_of::<SceneUniforms>(), 464);
    }

    #[test]
    fn static_scene_counts_faces() {
        let level = Level::from_xml(ROOM).unwrap();
        let mut batch = VertexBatch::new();
        build_static_scene(&level, &mut batch);
        // 3 floor cells: floor + ceiling each, 8 wall faces, 1 riser, then
        // one rod and one lamp box for the light.
        let quads = 3 * 2 + 8 + 1;
        assert_eq!(batch.len(), quads * 6 + 2 * 36);
        // Rebuilding clears first.
        build_static_scene(&level, &mut batch);
        assert_eq!(batch.len(), quads * 6 + 2 * 36);
    }

    #[test]
    fn corpses_and_collected_pickups() {
        let level = Level::from_xml(ROOM).unwrap();
        let config = GameConfig::default();
        let mut world = World::new(&level, &config);
        let camera = Camera::new(Vec3::new(3.0, 1.2, 3.0), 0.0, 1.0);

        let mut batch = VertexBatch::new();
        build_entities(&world, &camera, 0.0, &mut batch);
        // Body, head and two eyes, plus a pickup box.
        assert_eq!(batch.len(), 5 * 36);

        world.enemies[0].take_damage(1000.0, 0.2);
        world.pickups[0].collected = true;
        batch.clear();
        build_entities(&world, &camera, 0.0, &mut batch);
        assert_eq!(batch.len(), 36);
        let top = batch
            .vertices()
            .iter()
            .map(|v| v.position[1])
            .fold(f32::MIN, f32::max);
        assert!(top <= 0.15 + 1e-5);
    }

    #[test]
    fn uniforms_pack_lights_and_flags() {
        let level = Level::from_xml(ROOM).unwrap();
        let config = GameConfig::default();
        let camera = Camera::new(Vec3::new(3.0, 1.2, 3.0), 0.0, 1.0);
        let uniforms = SceneUniforms::world(&camera, 1.5, &config, &level.lights, 2.0, 1.0, 0.0);
        assert_eq!(uniforms.params[0], 1.0);
        assert_eq!(uniforms.params[1], 1.0);
        assert_eq!(uniforms.camera_position[3], 2.0);
        assert_eq!(uniforms.lights_position[0][3], level.lights[0].radius);
        assert!(uniforms.damage[3] > 0.0);
        assert_eq!(uniforms.flash[3], 0.0);

        let hud = SceneUniforms::hud(800.0, 600.0);
        assert_eq!(hud.params[1], 0.0);
    }
}
