use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::tilemap::TileMap;

/// Directional movement requested for the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveIntent {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

impl MoveIntent {
    pub fn is_idle(&self) -> bool {
        self.forward == self.backward && self.left == self.right
    }
}

/// First-person camera driven by yaw/pitch.
///
/// Yaw zero looks down `-z`; positive yaw turns towards `+x`. Positive pitch
/// looks up. The height is never integrated: it is re-derived from the floor
/// under the camera after every move.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    max_pitch: f32,
}

impl Camera {
    pub fn new(position: Vec3, yaw: f32, max_pitch: f32) -> Self {
        Self {
            position,
            yaw,
            pitch: 0.0,
            max_pitch: max_pitch.abs(),
        }
    }

    pub fn max_pitch(&self) -> f32 {
        self.max_pitch
    }

    /// Applies a mouse delta in screen pixels.
    pub fn apply_look(&mut self, dx: f32, dy: f32, sensitivity: f32) {
        self.yaw += dx * sensitivity;
        self.pitch = (self.pitch - dy * sensitivity).clamp(-self.max_pitch, self.max_pitch);
    }

    pub fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(sin_yaw * cos_pitch, sin_pitch, -cos_yaw * cos_pitch)
    }

    pub fn right(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        Vec3::new(cos_yaw, 0.0, sin_yaw)
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.forward())
    }

    /// Forward direction flattened onto the xz plane.
    pub fn flat_forward(&self) -> Vec2 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        Vec2::new(sin_yaw, -cos_yaw)
    }

    /// Moves along the floor with per-axis collision so the camera slides
    /// along walls. Returns `true` if the position changed.
    pub fn walk(
        &mut self,
        intent: MoveIntent,
        speed: f32,
        dt: f32,
        radius: f32,
        map: &TileMap,
    ) -> bool {
        let forward = self.flat_forward();
        let right = Vec2::new(-forward.y, forward.x);
        let mut direction = Vec2::ZERO;
        if intent.forward {
            direction += forward;
        }
        if intent.backward {
            direction -= forward;
        }
        if intent.right {
            direction += right;
        }
        if intent.left {
            direction -= right;
        }
        if direction.length_squared() < 1e-10 {
            return false;
        }

        let step = direction.normalize() * speed * dt;
        let before = self.position;
        let next_x = self.position.x + step.x;
        if map.can_occupy(next_x, self.position.z, radius) {
            self.position.x = next_x;
        }
        let next_z = self.position.z + step.y;
        if map.can_occupy(self.position.x, next_z, radius) {
            self.position.z = next_z;
        }
        before != self.position
    }

    /// Re-derives the eye height from the floor under the camera.
    pub fn settle(&mut self, map: &TileMap, eye_height: f32) {
        self.position.y = map.floor_height_at(self.position.x, self.position.z) + eye_height;
    }

    /// View matrix assembled directly from the orthonormal basis.
    pub fn view_matrix(&self) -> Mat4 {
        let f = self.forward();
        let r = self.right();
        let u = r.cross(f);
        let p = self.position;
        Mat4::from_cols(
            Vec4::new(r.x, u.x, -f.x, 0.0),
            Vec4::new(r.y, u.y, -f.y, 0.0),
            Vec4::new(r.z, u.z, -f.z, 0.0),
            Vec4::new(-r.dot(p), -u.dot(p), f.dot(p), 1.0),
        )
    }
}

/// Perspective projection with a `[0, 1]` depth range.
pub fn projection_matrix(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    Mat4::perspective_rh(fov_degrees.to_radians(), aspect.max(0.01), near, far)
}

/// Pixel-space orthographic projection with the origin at the top-left.
pub fn hud_projection(width: f32, height: f32) -> Mat4 {
    Mat4::orthographic_rh(0.0, width.max(1.0), height.max(1.0), 0.0, -1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tilemap::{Cell, TileMap};

    fn open_room() -> TileMap {
        let mut cells = vec![Cell::Floor; 25];
        for i in 0..5 {
            cells[i] = Cell::Wall;
            cells[20 + i] = Cell::Wall;
            cells[i * 5] = Cell::Wall;
            cells[i * 5 + 4] = Cell::Wall;
        }
        TileMap::new(5, 5, 2.0, cells, vec![0.0; 25])
    }

    fn assert_mat_close(a: Mat4, b: Mat4) {
        for (x, y) in a.to_cols_array().iter().zip(b.to_cols_array().iter()) {
            assert!((x - y).abs() < 1e-4, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::new(Vec3::ZERO, 0.0, 80f32.to_radians());
        camera.apply_look(0.0, -100_000.0, 0.01);
        assert!((camera.pitch - 80f32.to_radians()).abs() < 1e-6);
        camera.apply_look(0.0, 100_000.0, 0.01);
        assert!((camera.pitch + 80f32.to_radians()).abs() < 1e-6);
    }

    #[test]
    fn view_matches_look_at() {
        let mut camera = Camera::new(Vec3::new(3.0, 1.2, 5.0), 0.7, 1.4);
        camera.pitch = -0.3;
        let expected = Mat4::look_at_rh(
            camera.position,
            camera.position + camera.forward(),
            Vec3::Y,
        );
        assert_mat_close(camera.view_matrix(), expected);
    }

    #[test]
    fn basis_is_orthonormal() {
        let mut camera = Camera::new(Vec3::ZERO, 2.1, 1.4);
        camera.pitch = 0.5;
        let (f, r, u) = (camera.forward(), camera.right(), camera.up());
        assert!((f.length() - 1.0).abs() < 1e-5);
        assert!((u.length() - 1.0).abs() < 1e-5);
        assert!(f.dot(r).abs() < 1e-5);
        assert!(f.dot(u).abs() < 1e-5);
    }

    #[test]
    fn diagonal_walk_is_normalized() {
        let map = open_room();
        let mut camera = Camera::new(Vec3::new(5.0, 0.0, 5.0), 0.0, 1.4);
        let intent = MoveIntent {
            forward: true,
            right: true,
            ..MoveIntent::default()
        };
        assert!(camera.walk(intent, 1.0, 1.0, 0.3, &map));
        let moved = Vec2::new(camera.position.x - 5.0, camera.position.z - 5.0);
        assert!((moved.length() - 1.0).abs() < 1e-5);
        assert!(moved.x > 0.0 && moved.y < 0.0);
    }

    #[test]
    fn blocked_axis_still_slides() {
        let map = open_room();
        // Near the top wall (z = 2), heading up-right.
        let mut camera = Camera::new(Vec3::new(5.0, 0.0, 2.35), 45f32.to_radians(), 1.4);
        let intent = MoveIntent {
            forward: true,
            ..MoveIntent::default()
        };
        camera.walk(intent, 1.0, 0.5, 0.3, &map);
        assert!(camera.position.x > 5.0);
        assert!((camera.position.z - 2.35).abs() < 1e-6);
    }

    #[test]
    fn opposing_keys_cancel() {
        let map = open_room();
        let mut camera = Camera::new(Vec3::new(5.0, 0.0, 5.0), 0.0, 1.4);
        let intent = MoveIntent {
            forward: true,
            backward: true,
            ..MoveIntent::default()
        };
        assert!(intent.is_idle());
        assert!(!camera.walk(intent, 4.0, 0.1, 0.3, &map));
    }
}
