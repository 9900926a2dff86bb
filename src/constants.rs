use crate::types::GhostMode;

pub const TICK_RATE: u32 = 60;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;

pub const GRID_WIDTH: i32 = 28;
pub const GRID_HEIGHT: i32 = 31;

pub const ZOOM: f32 = 4.0;
pub const TILE_SIZE: f32 = 8.0;
pub const TILE_PX: f32 = TILE_SIZE * ZOOM;

/// Forward fudge added before flooring pixel coordinates into tiles.
pub const TILE_EPSILON_PX: f32 = 0.15;
/// Off-center distance still accepted for a perpendicular turn.
pub const TURN_TOLERANCE_PX: f32 = 2.0;
/// Upper bound on movement segments processed in one tick.
pub const MAX_SEGMENTS_PER_TICK: usize = 6;

pub const PELLET_SCORE: u32 = 10;
pub const POWER_PELLET_SCORE: u32 = 50;
pub const GHOST_BASE_SCORE: u32 = 200;
pub const MAX_GHOST_COMBO: u32 = 3;

pub const FRIGHTENED_MS: u64 = 6_000;
pub const FLICKER_WINDOW_MS: u64 = 2_000;

pub const DOT_EAT_PAUSE_TICKS: u32 = 1;
pub const POWER_PELLET_PAUSE_TICKS: u32 = 3;
pub const EAT_SLOWDOWN_MS: u64 = 150;
pub const EAT_SLOWDOWN_FACTOR: f32 = 0.9;

pub const TUNNEL_SPEED_FACTOR: f32 = 0.5;
pub const TUNNEL_PENALTY_MS: u64 = 250;
pub const BOUNCE_SPEED_FACTOR: f32 = 0.5;
pub const EATEN_SPEED_MULTIPLIER: f32 = 2.0;

pub const STARTING_LIVES: u32 = 3;

/// Scatter/Chase phases from level start; Chase holds after the last one.
pub const MODE_SCHEDULE: [(GhostMode, u64); 7] = [
    (GhostMode::Scatter, 7_000),
    (GhostMode::Chase, 20_000),
    (GhostMode::Scatter, 7_000),
    (GhostMode::Chase, 20_000),
    (GhostMode::Scatter, 7_000),
    (GhostMode::Chase, 20_000),
    (GhostMode::Scatter, 5_000),
];

// Unzoomed pixels per second, indexed by level (last entry holds).
const PLAYER_SPEEDS: [f32; 5] = [88.0, 96.8, 96.8, 96.8, 105.6];
const PLAYER_FRIGHT_SPEEDS: [f32; 5] = [105.6, 105.6, 105.6, 105.6, 88.0];
const GHOST_SPEEDS: [f32; 5] = [84.48, 92.928, 92.928, 92.928, 101.376];
const GHOST_FRIGHT_SPEEDS: [f32; 5] = [44.0, 48.4, 48.4, 48.4, 52.8];
const ELROY_SPEEDS: [[f32; 2]; 5] = [
    [88.0, 96.8],
    [105.6, 114.4],
    [105.6, 114.4],
    [105.6, 114.4],
    [114.4, 123.2],
];

fn by_level<T: Copy>(table: &[T], level: u32) -> T {
    let idx = (level.max(1) as usize - 1).min(table.len() - 1);
    table[idx]
}

pub fn get_player_speed(level: u32) -> f32 {
    by_level(&PLAYER_SPEEDS, level) * ZOOM
}

pub fn get_player_fright_speed(level: u32) -> f32 {
    by_level(&PLAYER_FRIGHT_SPEEDS, level) * ZOOM
}

pub fn get_ghost_speed(level: u32) -> f32 {
    by_level(&GHOST_SPEEDS, level) * ZOOM
}

pub fn get_ghost_fright_speed(level: u32) -> f32 {
    by_level(&GHOST_FRIGHT_SPEEDS, level) * ZOOM
}

pub fn get_elroy_speed(level: u32, stage: u8) -> f32 {
    let stage = usize::from(stage.clamp(1, 2)) - 1;
    by_level(&ELROY_SPEEDS, level)[stage] * ZOOM
}

/// Score for the `combo`-th ghost eaten during one frightened period.
pub fn get_ghost_score(combo: u32) -> u32 {
    GHOST_BASE_SCORE << combo.min(MAX_GHOST_COMBO)
}
