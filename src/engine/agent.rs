//! Pixel-level movement shared by the player and the ghosts.
//!
//! Pixel position (top-left of a tile-sized box) is the source of truth; the
//! tile coordinate is recomputed from it after every move. Motion is cut into
//! segments that stop at each tile origin so turn requests are always checked
//! at alignment, whatever the per-tick speed.

use crate::constants::{TILE_EPSILON_PX, TILE_PX, TURN_TOLERANCE_PX};
use crate::grid::{Grid, Passage};
use crate::types::{Direction, PixelPos, TilePos};

pub fn tile_origin(tile: TilePos) -> PixelPos {
    PixelPos {
        x: tile.x as f32 * TILE_PX,
        y: tile.y as f32 * TILE_PX,
    }
}

fn tile_index(px: f32) -> i32 {
    ((px + TILE_EPSILON_PX) / TILE_PX).floor() as i32
}

pub fn tile_of(pixel: PixelPos) -> TilePos {
    TilePos::new(tile_index(pixel.x), tile_index(pixel.y))
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Advance {
    pub travelled: f32,
    pub blocked: bool,
    pub wrapped: bool,
    pub tile_changed: bool,
    pub at_origin: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

#[derive(Clone, Debug)]
pub struct Agent {
    pub tile: TilePos,
    pub pixel: PixelPos,
    pub dir: Direction,
    pub next_dir: Direction,
    /// Distance covered since the agent last sat on a tile origin.
    pub tile_progress: f32,
}

impl Agent {
    pub fn new(tile: TilePos, dir: Direction) -> Self {
        Self {
            tile,
            pixel: tile_origin(tile),
            dir,
            next_dir: Direction::None,
            tile_progress: 0.0,
        }
    }

    pub fn is_aligned(&self) -> bool {
        let origin = tile_origin(self.tile);
        (self.pixel.x - origin.x).abs() < TILE_EPSILON_PX
            && (self.pixel.y - origin.y).abs() < TILE_EPSILON_PX
    }

    pub fn snap(&mut self) {
        self.pixel = tile_origin(self.tile);
        self.tile_progress = 0.0;
    }

    fn sync_tile(&mut self) -> bool {
        let tile = tile_of(self.pixel);
        if tile == self.tile {
            return false;
        }
        self.tile = tile;
        true
    }

    fn commit(&mut self, dir: Direction) {
        self.dir = dir;
        self.next_dir = Direction::None;
    }

    /// Applies the queued direction if the turn rules allow it this instant.
    /// `allow_reverse` only governs reversing between tile origins.
    pub fn try_turn(&mut self, grid: &Grid, passage: Passage, allow_reverse: bool) -> bool {
        let want = self.next_dir;
        if want == Direction::None {
            return false;
        }
        let stopped = self.dir == Direction::None;

        if stopped || self.is_aligned() {
            if want == self.dir {
                self.next_dir = Direction::None;
                return false;
            }
            if grid.can_enter(self.tile.step(want), passage) {
                self.snap();
                self.commit(want);
                return true;
            }
            if stopped {
                self.next_dir = Direction::None;
            }
            return false;
        }

        if want.is_perpendicular(self.dir) {
            let junction = self.nearest_origin(grid);
            let origin = tile_origin(junction);
            let off_center = if self.dir.is_horizontal() {
                (self.pixel.x - origin.x).abs()
            } else {
                (self.pixel.y - origin.y).abs()
            };
            if off_center < TURN_TOLERANCE_PX && grid.can_enter(junction.step(want), passage) {
                self.tile = junction;
                self.snap();
                self.commit(want);
                return true;
            }
            return false;
        }

        if want == self.dir.opposite() {
            let (behind, _) = self.next_origin(want);
            if allow_reverse && grid.can_enter(behind, passage) {
                self.commit(want);
                return true;
            }
            return false;
        }

        self.next_dir = Direction::None;
        false
    }

    /// Tile whose origin is closest on the travel axis. The recomputed tile
    /// leans toward +x/+y, so an agent heading Left or Up has already
    /// switched tiles while still within reach of the origin it just left.
    fn nearest_origin(&self, grid: &Grid) -> TilePos {
        if self.dir.is_horizontal() {
            let x = (self.pixel.x / TILE_PX).round() as i32;
            TilePos::new(x.rem_euclid(grid.width().max(1)), self.tile.y)
        } else {
            TilePos::new(self.tile.x, (self.pixel.y / TILE_PX).round() as i32)
        }
    }

    /// Tile (and its pixel coordinate on the travel axis) of the next origin along `dir`.
    fn next_origin(&self, dir: Direction) -> (TilePos, f32) {
        let (dx, dy) = dir.vector();
        let (pos, cell, sign) = if dx != 0 {
            (self.pixel.x, self.tile.x, dx)
        } else {
            (self.pixel.y, self.tile.y, dy)
        };
        let aligned = (pos - cell as f32 * TILE_PX).abs() < TILE_EPSILON_PX;
        let target = if aligned {
            cell + sign
        } else if sign > 0 {
            (pos / TILE_PX).floor() as i32 + 1
        } else {
            (pos / TILE_PX).floor() as i32
        };
        let tile = if dx != 0 {
            TilePos::new(target, self.tile.y)
        } else {
            TilePos::new(self.tile.x, target)
        };
        (tile, target as f32 * TILE_PX)
    }

    /// Moves along the current direction by at most `budget` pixels, never
    /// past the next tile origin. A wall ahead of an aligned agent stops it
    /// flush with the wall.
    pub fn advance(&mut self, grid: &Grid, budget: f32, passage: Passage) -> Advance {
        let mut out = Advance::default();
        if self.dir == Direction::None || budget <= 0.0 {
            return out;
        }
        let (dx, dy) = self.dir.vector();
        self.clip_axis(Axis::Horizontal, dx, budget, grid, passage, &mut out);
        self.clip_axis(Axis::Vertical, dy, budget, grid, passage, &mut out);
        out.tile_changed = self.sync_tile();
        if out.at_origin || out.blocked {
            self.tile_progress = 0.0;
        } else {
            self.tile_progress += out.travelled;
        }
        out
    }

    fn clip_axis(
        &mut self,
        axis: Axis,
        sign: i32,
        budget: f32,
        grid: &Grid,
        passage: Passage,
        out: &mut Advance,
    ) {
        if sign == 0 {
            return;
        }
        let dir = self.dir;
        let (cell, pos) = match axis {
            Axis::Horizontal => (self.tile.x, self.pixel.x),
            Axis::Vertical => (self.tile.y, self.pixel.y),
        };
        let cell_px = cell as f32 * TILE_PX;
        let aligned = (pos - cell_px).abs() < TILE_EPSILON_PX;
        if aligned && !grid.can_enter(self.tile.step(dir), passage) {
            self.set_axis(axis, cell_px);
            self.dir = Direction::None;
            out.blocked = true;
            return;
        }

        let (_, target_px) = self.next_origin(dir);
        let distance = (target_px - pos).abs();
        let next = if budget >= distance {
            out.at_origin = true;
            out.travelled += distance;
            target_px
        } else {
            out.travelled += budget;
            pos + sign as f32 * budget
        };
        self.set_axis(axis, next);

        if axis == Axis::Horizontal {
            let span = grid.width() as f32 * TILE_PX;
            if self.pixel.x < 0.0 {
                self.pixel.x += span;
                out.wrapped = true;
            } else if self.pixel.x >= span {
                self.pixel.x -= span;
                out.wrapped = true;
            }
        }
    }

    fn set_axis(&mut self, axis: Axis, value: f32) {
        match axis {
            Axis::Horizontal => self.pixel.x = value,
            Axis::Vertical => self.pixel.y = value,
        }
    }
}
