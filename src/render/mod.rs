pub mod gpu;
pub mod hud;
pub mod scene;
pub mod vertex;

use glam::Vec3;

pub use gpu::{RenderInitError, Renderer};
pub use hud::{Banner, HudState};
pub use scene::SceneUniforms;
pub use vertex::{Material, Vertex, VertexBatch};

/// CPU-side description of one rendered frame.
///
/// The host owns a single `Frame` and hands it to the game every tick; the
/// per-frame batches are cleared and refilled in place. Static geometry is
/// only copied when the game reports a new scene revision.
#[derive(Debug, Default)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub clear_color: Vec3,
    pub world_uniforms: SceneUniforms,
    pub hud_uniforms: SceneUniforms,
    pub dynamic: VertexBatch,
    pub hud: VertexBatch,
    static_geometry: VertexBatch,
    static_revision: u64,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            ..Self::default()
        }
    }

    /// Starts a new frame at the given surface size.
    pub fn begin(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.dynamic.clear();
        self.hud.clear();
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Replaces the static geometry if `revision` differs from the one already
    /// held. Returns `true` when a copy happened.
    pub fn set_static(&mut self, revision: u64, geometry: &VertexBatch) -> bool {
        if revision == self.static_revision {
            return false;
        }
        self.static_geometry.clear();
        self.static_geometry.extend_from(geometry);
        self.static_revision = revision;
        true
    }

    pub fn static_geometry(&self) -> &VertexBatch {
        &self.static_geometry
    }

    /// Zero until a game has supplied static geometry.
    pub fn static_revision(&self) -> u64 {
        self.static_revision
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;

    #[test]
    fn static_geometry_copied_once_per_revision() {
        let mut geometry = VertexBatch::new();
        geometry.push_rect(Vec2::ZERO, Vec2::ONE, Vec3::ONE);
        let mut frame = Frame::new(640, 480);
        assert!(frame.set_static(1, &geometry));
        assert!(!frame.set_static(1, &geometry));
        assert_eq!(frame.static_geometry().len(), 6);
        assert!(frame.set_static(2, &VertexBatch::new()));
        assert!(frame.static_geometry().is_empty());
    }

    #[test]
    fn begin_clears_per_frame_batches() {
        let mut frame = Frame::new(0, 0);
        assert_eq!((frame.width, frame.height), (1, 1));
        frame.dynamic.push_rect(Vec2::ZERO, Vec2::ONE, Vec3::ONE);
        frame.hud.push_rect(Vec2::ZERO, Vec2::ONE, Vec3::ONE);
        frame.begin(800, 400);
        assert!(frame.dynamic.is_empty() && frame.hud.is_empty());
        assert_eq!(frame.aspect(), 2.0);
    }
}
