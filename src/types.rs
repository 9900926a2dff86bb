use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    None,
}

impl Direction {
    /// Arbitration order for ghosts; earlier entries win distance ties.
    pub const PRIORITY: [Direction; 4] = [
        Direction::Up,
        Direction::Left,
        Direction::Down,
        Direction::Right,
    ];

    pub fn parse_move(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::None => Self::None,
        }
    }

    pub fn vector(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
            Self::None => (0, 0),
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Self::Up | Self::Down)
    }

    pub fn is_perpendicular(self, other: Direction) -> bool {
        (self.is_horizontal() && other.is_vertical())
            || (self.is_vertical() && other.is_horizontal())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tile {
    Wall,
    Open,
    Pellet,
    PowerPellet,
    Tunnel,
}

impl Tile {
    pub fn glyph(self) -> char {
        match self {
            Self::Wall => '#',
            Self::Open => ' ',
            Self::Pellet => '.',
            Self::PowerPellet => 'o',
            Self::Tunnel => '=',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn step(self, dir: Direction) -> Self {
        self.offset(dir, 1)
    }

    pub fn offset(self, dir: Direction, tiles: i32) -> Self {
        let (dx, dy) = dir.vector();
        Self {
            x: self.x + dx * tiles,
            y: self.y + dy * tiles,
        }
    }

    pub fn distance_sq(self, other: TilePos) -> i32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PixelPos {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GhostId {
    Leader,
    Speedy,
    Bashful,
    Pokey,
}

impl GhostId {
    pub const ALL: [GhostId; 4] = [
        GhostId::Leader,
        GhostId::Speedy,
        GhostId::Bashful,
        GhostId::Pokey,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GhostState {
    InHouse,
    LeavingHouse,
    Scatter,
    Chase,
    Frightened,
    Eaten,
}

/// Scheduled behavior outside of the frightened override.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GhostMode {
    Scatter,
    Chase,
}

impl From<GhostMode> for GhostState {
    fn from(mode: GhostMode) -> Self {
        match mode {
            GhostMode::Scatter => Self::Scatter,
            GhostMode::Chase => Self::Chase,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrightenedVisual {
    Blue,
    White,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputCommand {
    Move(Direction),
    TogglePause,
    ToggleDebug,
    NextBoard,
}

impl InputCommand {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pause" => Some(Self::TogglePause),
            "debug" => Some(Self::ToggleDebug),
            "next_board" => Some(Self::NextBoard),
            other => Direction::parse_move(other).map(Self::Move),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub x: i32,
    pub y: i32,
    pub px: f32,
    pub py: f32,
    pub dir: Direction,
    pub facing: Direction,
    pub paused_ticks: u32,
    pub frame: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct GhostView {
    pub id: GhostId,
    pub x: i32,
    pub y: i32,
    pub px: f32,
    pub py: f32,
    pub dir: Direction,
    pub state: GhostState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual: Option<FrightenedVisual>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<TilePos>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    PelletEaten {
        x: i32,
        y: i32,
        score: u32,
    },
    PowerPelletEaten {
        x: i32,
        y: i32,
    },
    FrightenedStarted {
        duration_ms: u64,
    },
    FrightenedEnded,
    ModeChanged {
        mode: GhostMode,
    },
    GhostReleased {
        ghost: GhostId,
    },
    GhostEaten {
        ghost: GhostId,
        score: u32,
    },
    GhostHome {
        ghost: GhostId,
    },
    PlayerCaught {
        ghost: GhostId,
        lives_left: u32,
    },
    LevelCleared {
        level: u32,
    },
    BoardReloaded {
        board: usize,
    },
    GameOver {
        score: u32,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub level: u32,
    pub level_ms: u64,
    pub score: u32,
    pub high_score: u32,
    pub lives: u32,
    pub pellets_remaining: u32,
    pub mode: GhostMode,
    pub frightened_ms: u64,
    pub paused: bool,
    pub debug: bool,
    pub player: PlayerView,
    pub ghosts: Vec<GhostView>,
    pub events: Vec<GameEvent>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameSummary {
    pub level: u32,
    pub score: u32,
    pub high_score: u32,
    pub lives: u32,
    pub pellets_eaten: u32,
    pub ghosts_eaten: u32,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perpendicular_relation_excludes_same_axis() {
        assert!(Direction::Up.is_perpendicular(Direction::Left));
        assert!(Direction::Right.is_perpendicular(Direction::Down));
        assert!(!Direction::Up.is_perpendicular(Direction::Down));
        assert!(!Direction::Left.is_perpendicular(Direction::None));
    }

    #[test]
    fn unknown_input_is_ignored() {
        assert_eq!(InputCommand::parse("jump"), None);
        assert_eq!(
            InputCommand::parse("left"),
            Some(InputCommand::Move(Direction::Left))
        );
        assert_eq!(InputCommand::parse("pause"), Some(InputCommand::TogglePause));
    }

    #[test]
    fn events_serialize_with_snake_case_tag() {
        let value = serde_json::to_value(GameEvent::GhostEaten {
            ghost: GhostId::Bashful,
            score: 400,
        })
        .expect("event should serialize");
        assert_eq!(value["type"], "ghost_eaten");
        assert_eq!(value["ghost"], "bashful");
    }
}
