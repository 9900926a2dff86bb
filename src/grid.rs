use std::collections::{BTreeSet, VecDeque};

use crate::constants::{PELLET_SCORE, POWER_PELLET_SCORE};
use crate::types::{Direction, Tile, TilePos};

/// Classic 28x31 layout. `-` marks the ghost-house door.
pub const REFERENCE_MAZE: [&str; 31] = [
    "############################",
    "#............##............#",
    "#.####.#####.##.#####.####.#",
    "#o####.#####.##.#####.####o#",
    "#.####.#####.##.#####.####.#",
    "#..........................#",
    "#.####.##.########.##.####.#",
    "#.####.##.########.##.####.#",
    "#......##....##....##......#",
    "######.##### ## #####.######",
    "######.##### ## #####.######",
    "######.##          ##.######",
    "######.## ###--### ##.######",
    "######.## #      # ##.######",
    "      .   #      #   .      ",
    "######.## #      # ##.######",
    "######.## ######## ##.######",
    "######.##          ##.######",
    "######.## ######## ##.######",
    "######.## ######## ##.######",
    "#............##............#",
    "#.####.#####.##.#####.####.#",
    "#.####.#####.##.#####.####.#",
    "#o..##.......  .......##..o#",
    "###.##.##.########.##.##.###",
    "###.##.##.########.##.##.###",
    "#......##....##....##......#",
    "#.##########.##.##########.#",
    "#.##########.##.##########.#",
    "#..........................#",
    "############################",
];

#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("maze layout has no rows")]
    Empty,
    #[error("row {row} has width {found}, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("unknown tile glyph {glyph:?} at ({x},{y})")]
    UnknownGlyph { glyph: char, x: usize, y: usize },
    #[error("maze layout has no ghost-house door")]
    MissingDoor,
}

/// How an agent may treat the ghost-house door.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Passage {
    Normal,
    ThroughDoor,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Consumption {
    pub score: u32,
    pub power: bool,
}

#[derive(Clone, Debug)]
pub struct Grid {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
    doors: Vec<TilePos>,
    house: BTreeSet<TilePos>,
    pellets_left: u32,
    power_left: u32,
}

impl Grid {
    pub fn reference() -> Result<Self, GridError> {
        Self::parse(&REFERENCE_MAZE)
    }

    pub fn parse<S: AsRef<str>>(rows: &[S]) -> Result<Self, GridError> {
        let Some(first) = rows.first() else {
            return Err(GridError::Empty);
        };
        let width = first.as_ref().chars().count();
        if width == 0 {
            return Err(GridError::Empty);
        }

        let mut tiles = Vec::with_capacity(width * rows.len());
        let mut doors = Vec::new();
        for (y, row) in rows.iter().enumerate() {
            let found = row.as_ref().chars().count();
            if found != width {
                return Err(GridError::RaggedRow {
                    row: y,
                    expected: width,
                    found,
                });
            }
            for (x, glyph) in row.as_ref().chars().enumerate() {
                let tile = match glyph {
                    '#' => Tile::Wall,
                    ' ' => Tile::Open,
                    '.' => Tile::Pellet,
                    'o' => Tile::PowerPellet,
                    '=' => Tile::Tunnel,
                    '-' => {
                        doors.push(TilePos::new(x as i32, y as i32));
                        Tile::Wall
                    }
                    _ => return Err(GridError::UnknownGlyph { glyph, x, y }),
                };
                tiles.push(tile);
            }
        }
        if doors.is_empty() {
            return Err(GridError::MissingDoor);
        }

        let mut grid = Self {
            width: width as i32,
            height: rows.len() as i32,
            tiles,
            doors,
            house: BTreeSet::new(),
            pellets_left: 0,
            power_left: 0,
        };
        grid.mark_tunnels();
        grid.house = grid.flood_house();
        grid.pellets_left = grid.count(Tile::Pellet);
        grid.power_left = grid.count(Tile::PowerPellet);
        Ok(grid)
    }

    // An open edge column followed by two more open or pellet columns wraps.
    fn mark_tunnels(&mut self) {
        if self.width < 3 {
            return;
        }
        let passable = |tile: Option<Tile>| matches!(tile, Some(Tile::Open | Tile::Pellet));
        let last = self.width - 1;
        for y in 0..self.height {
            if self.tile(TilePos::new(0, y)) == Some(Tile::Open)
                && passable(self.tile(TilePos::new(1, y)))
                && passable(self.tile(TilePos::new(2, y)))
            {
                self.set(TilePos::new(0, y), Tile::Tunnel);
            }
            if self.tile(TilePos::new(last, y)) == Some(Tile::Open)
                && passable(self.tile(TilePos::new(last - 1, y)))
                && passable(self.tile(TilePos::new(last - 2, y)))
            {
                self.set(TilePos::new(last, y), Tile::Tunnel);
            }
        }
    }

    // Walls and the door enclose the house, so a walk from home stays inside.
    fn flood_house(&self) -> BTreeSet<TilePos> {
        let mut seen = BTreeSet::new();
        let home = self.house_home();
        if !self.is_walkable(home) {
            return seen;
        }
        let mut queue = VecDeque::from([home]);
        seen.insert(home);
        while let Some(pos) = queue.pop_front() {
            for dir in Direction::PRIORITY {
                let next = pos.step(dir);
                if self.index(next).is_some() && self.is_walkable(next) && seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    fn count(&self, kind: Tile) -> u32 {
        self.tiles.iter().filter(|tile| **tile == kind).count() as u32
    }

    fn index(&self, pos: TilePos) -> Option<usize> {
        if pos.x < 0 || pos.y < 0 || pos.x >= self.width || pos.y >= self.height {
            return None;
        }
        Some((pos.y * self.width + pos.x) as usize)
    }

    fn set(&mut self, pos: TilePos, tile: Tile) {
        if let Some(idx) = self.index(pos) {
            self.tiles[idx] = tile;
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn tile(&self, pos: TilePos) -> Option<Tile> {
        self.index(pos).map(|idx| self.tiles[idx])
    }

    pub fn is_walkable(&self, pos: TilePos) -> bool {
        !matches!(self.tile(pos), None | Some(Tile::Wall))
    }

    pub fn is_door(&self, pos: TilePos) -> bool {
        self.doors.contains(&pos)
    }

    pub fn is_tunnel_row(&self, y: i32) -> bool {
        self.tile(TilePos::new(0, y)) == Some(Tile::Tunnel)
            || self.tile(TilePos::new(self.width - 1, y)) == Some(Tile::Tunnel)
    }

    /// True on the outermost column of a wrapping row, or past it.
    pub fn in_tunnel(&self, pos: TilePos) -> bool {
        self.is_tunnel_row(pos.y) && (pos.x <= 0 || pos.x >= self.width - 1)
    }

    /// Maps a column that ran off a wrapping row back onto the grid.
    pub fn wrap(&self, pos: TilePos) -> Option<TilePos> {
        if pos.y < 0 || pos.y >= self.height {
            return None;
        }
        if pos.x >= 0 && pos.x < self.width {
            return Some(pos);
        }
        if !self.is_tunnel_row(pos.y) {
            return None;
        }
        Some(TilePos::new(pos.x.rem_euclid(self.width), pos.y))
    }

    pub fn can_enter(&self, pos: TilePos, passage: Passage) -> bool {
        let Some(pos) = self.wrap(pos) else {
            return false;
        };
        if self.is_door(pos) {
            return passage == Passage::ThroughDoor;
        }
        self.is_walkable(pos)
    }

    pub fn consume_pellet(&mut self, pos: TilePos) -> Consumption {
        let Some(idx) = self.index(pos) else {
            return Consumption::default();
        };
        match self.tiles[idx] {
            Tile::Pellet => {
                self.tiles[idx] = Tile::Open;
                self.pellets_left = self.pellets_left.saturating_sub(1);
                Consumption {
                    score: PELLET_SCORE,
                    power: false,
                }
            }
            Tile::PowerPellet => {
                self.tiles[idx] = Tile::Open;
                self.power_left = self.power_left.saturating_sub(1);
                Consumption {
                    score: POWER_PELLET_SCORE,
                    power: true,
                }
            }
            _ => Consumption::default(),
        }
    }

    pub fn pellets_remaining(&self) -> u32 {
        self.pellets_left + self.power_left
    }

    /// Tiles directly above the door; reaching one ends a house exit.
    pub fn house_exits(&self) -> Vec<TilePos> {
        self.doors.iter().map(|door| door.step(Direction::Up)).collect()
    }

    /// Resting tile inside the house that eaten ghosts head for.
    pub fn house_home(&self) -> TilePos {
        let door = self.doors[0];
        TilePos::new(door.x, door.y + 2)
    }

    pub fn in_house(&self, pos: TilePos) -> bool {
        self.house.contains(&pos)
    }

    pub fn rows(&self) -> Vec<String> {
        (0..self.height)
            .map(|y| {
                (0..self.width)
                    .map(|x| {
                        let pos = TilePos::new(x, y);
                        if self.is_door(pos) {
                            return '-';
                        }
                        self.tile(pos).map(Tile::glyph).unwrap_or('#')
                    })
                    .collect()
            })
            .collect()
    }
}
