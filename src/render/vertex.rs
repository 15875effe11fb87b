use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec2, Vec3};

/// Surface pattern evaluated by the fragment shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Material {
    Flat,
    Brick,
    Plank,
    /// Unlit; used for lamps, projectiles and the HUD.
    Emissive,
}

impl Material {
    pub fn id(self) -> f32 {
        match self {
            Material::Flat => 0.0,
            Material::Brick => 1.0,
            Material::Plank => 2.0,
            Material::Emissive => 3.0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
    pub material: f32,
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x3,
        3 => Float32,
    ];

    pub fn new(position: Vec3, normal: Vec3, color: Vec3, material: Material) -> Self {
        Self {
            position: position.into(),
            normal: normal.into(),
            color: color.into(),
            material: material.id(),
        }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Unit cube faces as (outward normal, counter-clockwise corners).
const BOX_FACES: [([f32; 3], [[f32; 3]; 4]); 6] = [
    ([0.0, 0.0, 1.0], [[-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0]]),
    ([0.0, 0.0, -1.0], [[1.0, -1.0, -1.0], [-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [1.0, 1.0, -1.0]]),
    ([1.0, 0.0, 0.0], [[1.0, -1.0, 1.0], [1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0]]),
    ([-1.0, 0.0, 0.0], [[-1.0, -1.0, -1.0], [-1.0, -1.0, 1.0], [-1.0, 1.0, 1.0], [-1.0, 1.0, -1.0]]),
    ([0.0, 1.0, 0.0], [[-1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, -1.0], [-1.0, 1.0, -1.0]]),
    ([0.0, -1.0, 0.0], [[-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [-1.0, -1.0, 1.0]]),
];

/// Growable triangle list reused across frames.
///
/// `clear` keeps the allocation so a batch rebuilt every frame stops
/// allocating once it has reached its steady-state size.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct VertexBatch {
    vertices: Vec<Vertex>,
}

impl VertexBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.vertices.capacity()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn extend_from(&mut self, other: &VertexBatch) {
        self.vertices.extend_from_slice(&other.vertices);
    }

    pub fn push_triangle(
        &mut self,
        corners: [Vec3; 3],
        normal: Vec3,
        color: Vec3,
        material: Material,
    ) {
        for corner in corners {
            self.vertices
                .push(Vertex::new(corner, normal, color, material));
        }
    }

    /// Pushes a quad given in counter-clockwise order as two triangles.
    pub fn push_quad(
        &mut self,
        corners: [Vec3; 4],
        normal: Vec3,
        color: Vec3,
        material: Material,
    ) {
        let [a, b, c, d] = corners;
        self.push_triangle([a, b, c], normal, color, material);
        self.push_triangle([a, c, d], normal, color, material);
    }

    /// Axis-aligned box resting on `base` (the center of its bottom face).
    pub fn push_box(&mut self, base: Vec3, size: Vec3, color: Vec3, material: Material) {
        self.push_oriented_box(base, size, 0.0, color, material);
    }

    /// Box resting on `base`, rotated by `yaw` radians about the vertical axis.
    pub fn push_oriented_box(
        &mut self,
        base: Vec3,
        size: Vec3,
        yaw: f32,
        color: Vec3,
        material: Material,
    ) {
        let rotation = Quat::from_rotation_y(yaw);
        let half = size * 0.5;
        for (normal, corners) in BOX_FACES {
            let normal = rotation * Vec3::from(normal);
            let corners = corners.map(|corner| {
                let local = Vec3::from(corner) * half + Vec3::new(0.0, half.y, 0.0);
                base + rotation * local
            });
            self.push_quad(corners, normal, color, material);
        }
    }

    /// Flat screen-space rectangle in pixel coordinates (HUD pass).
    pub fn push_rect(&mut self, origin: Vec2, size: Vec2, color: Vec3) {
        let (x0, y0) = (origin.x, origin.y);
        let (x1, y1) = (origin.x + size.x, origin.y + size.y);
        self.push_quad(
            [
                Vec3::new(x0, y0, 0.0),
                Vec3::new(x0, y1, 0.0),
                Vec3::new(x1, y1, 0.0),
                Vec3::new(x1, y0, 0.0),
            ],
            Vec3::Z,
            color,
            Material::Emissive,
        );
    }
}
