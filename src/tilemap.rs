use serde::{Deserialize, Serialize};

/// Contents of a single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    Wall,
    Floor,
}

/// Immutable wall/floor grid with a fixed world-space cell size.
///
/// Grid coordinates are `(col, row)`; world `x` maps to columns and world
/// `z` maps to rows. Floor cells carry a height so raised platforms can be
/// expressed without a second map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMap {
    width: usize,
    height: usize,
    cell_size: f32,
    cells: Vec<Cell>,
    floor_heights: Vec<f32>,
}

impl TileMap {
    /// Builds a map from row-major cells. Callers are expected to have
    /// validated that the border is solid (see [`TileMap::has_solid_border`]).
    pub fn new(
        width: usize,
        height: usize,
        cell_size: f32,
        cells: Vec<Cell>,
        floor_heights: Vec<f32>,
    ) -> Self {
        debug_assert_eq!(cells.len(), width * height);
        debug_assert_eq!(floor_heights.len(), width * height);
        Self {
            width,
            height,
            cell_size,
            cells,
            floor_heights,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// World-space extent of the map along x and z.
    pub fn world_size(&self) -> (f32, f32) {
        (
            self.width as f32 * self.cell_size,
            self.height as f32 * self.cell_size,
        )
    }

    fn index(&self, col: i32, row: i32) -> Option<usize> {
        if col < 0 || row < 0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(row * self.width + col)
    }

    pub fn cell(&self, col: i32, row: i32) -> Option<Cell> {
        self.index(col, row).map(|index| self.cells[index])
    }

    /// Out-of-bounds cells count as walls.
    pub fn is_wall(&self, col: i32, row: i32) -> bool {
        !matches!(self.cell(col, row), Some(Cell::Floor))
    }

    /// Converts a world position to the grid cell containing it.
    pub fn world_to_cell(&self, x: f32, z: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (z / self.cell_size).floor() as i32,
        )
    }

    /// World-space center of a grid cell on the xz plane.
    pub fn cell_center(&self, col: i32, row: i32) -> (f32, f32) {
        (
            (col as f32 + 0.5) * self.cell_size,
            (row as f32 + 0.5) * self.cell_size,
        )
    }

    pub fn is_wall_at(&self, x: f32, z: f32) -> bool {
        let (col, row) = self.world_to_cell(x, z);
        self.is_wall(col, row)
    }

    /// Tests the four corners of a square footprint centered on `(x, z)`.
    pub fn can_occupy(&self, x: f32, z: f32, radius: f32) -> bool {
        [
            (x - radius, z - radius),
            (x + radius, z - radius),
            (x - radius, z + radius),
            (x + radius, z + radius),
        ]
        .iter()
        .all(|&(cx, cz)| !self.is_wall_at(cx, cz))
    }

    /// Height of the floor at a world position. Walls and out-of-bounds
    /// positions report zero.
    pub fn floor_height_at(&self, x: f32, z: f32) -> f32 {
        let (col, row) = self.world_to_cell(x, z);
        self.floor_height(col, row)
    }

    pub fn floor_height(&self, col: i32, row: i32) -> f32 {
        match self.index(col, row) {
            Some(index) if self.cells[index] == Cell::Floor => self.floor_heights[index],
            _ => 0.0,
        }
    }

    pub fn has_solid_border(&self) -> bool {
        let (w, h) = (self.width as i32, self.height as i32);
        let top_bottom = (0..w).all(|col| self.is_wall(col, 0) && self.is_wall(col, h - 1));
        let sides = (0..h).all(|row| self.is_wall(0, row) && self.is_wall(w - 1, row));
        top_bottom && sides
    }

    /// Iterates over every floor cell as `(col, row)`.
    pub fn floor_cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        (0..self.height).flat_map(move |row| {
            (0..self.width).filter_map(move |col| {
                (self.cells[row * self.width + col] == Cell::Floor)
                    .then_some((col as i32, row as i32))
            })
        })
    }

    /// Clamps a world position into the interior of the map so a corrupted
    /// position cannot leave the grid.
    pub fn clamp_to_interior(&self, x: f32, z: f32) -> (f32, f32) {
        let (max_x, max_z) = self.world_size();
        let margin = self.cell_size;
        (
            x.clamp(margin, (max_x - margin).max(margin)),
            z.clamp(margin, (max_z - margin).max(margin)),
        )
    }

    /// Walks the grid along a horizontal ray (DDA) and returns the distance to
    /// the first wall boundary crossed, or `None` if it lies beyond
    /// `max_distance`. The direction does not need to be normalized.
    pub fn cast_ray(
        &self,
        origin_x: f32,
        origin_z: f32,
        dir_x: f32,
        dir_z: f32,
        max_distance: f32,
    ) -> Option<f32> {
        let length = (dir_x * dir_x + dir_z * dir_z).sqrt();
        if length < f32::EPSILON {
            return None;
        }
        let (dx, dz) = (dir_x / length, dir_z / length);
        let (mut col, mut row) = self.world_to_cell(origin_x, origin_z);
        if self.is_wall(col, row) {
            return Some(0.0);
        }

        let size = self.cell_size;
        let step_col = if dx < 0.0 { -1 } else { 1 };
        let step_row = if dz < 0.0 { -1 } else { 1 };
        let delta_x = if dx.abs() < f32::EPSILON {
            f32::INFINITY
        } else {
            size / dx.abs()
        };
        let delta_z = if dz.abs() < f32::EPSILON {
            f32::INFINITY
        } else {
            size / dz.abs()
        };
        let mut side_x = if dx.abs() < f32::EPSILON {
            f32::INFINITY
        } else if dx < 0.0 {
            (origin_x - col as f32 * size) / dx.abs()
        } else {
            ((col + 1) as f32 * size - origin_x) / dx.abs()
        };
        let mut side_z = if dz.abs() < f32::EPSILON {
            f32::INFINITY
        } else if dz < 0.0 {
            (origin_z - row as f32 * size) / dz.abs()
        } else {
            ((row + 1) as f32 * size - origin_z) / dz.abs()
        };

        loop {
            let distance = if side_x < side_z {
                col += step_col;
                let distance = side_x;
                side_x += delta_x;
                distance
            } else {
                row += step_row;
                let distance = side_z;
                side_z += delta_z;
                distance
            };
            if distance > max_distance {
                return None;
            }
            if self.is_wall(col, row) {
                return Some(distance);
            }
        }
    }
}
