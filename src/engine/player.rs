use crate::constants::{
    get_player_fright_speed, get_player_speed, DOT_EAT_PAUSE_TICKS, EAT_SLOWDOWN_FACTOR,
    EAT_SLOWDOWN_MS, MAX_SEGMENTS_PER_TICK, POWER_PELLET_PAUSE_TICKS, TUNNEL_PENALTY_MS,
    TUNNEL_SPEED_FACTOR,
};
use crate::grid::{Consumption, Grid, Passage};
use crate::types::{Direction, TilePos};

use super::agent::Agent;
use super::utils::travel_px;

const FRAME_TICKS: u64 = 4;
const FRAME_COUNT: u64 = 3;

#[derive(Clone, Debug)]
pub(super) struct Player {
    pub agent: Agent,
    /// Last non-stopped direction; what chase targeting reads.
    pub facing: Direction,
    pub pause_ticks: u32,
    slowdown_ms: u64,
    tunnel_penalty_ms: u64,
    consumed_this_tile: bool,
    animation_ticks: u64,
}

impl Player {
    pub fn new(tile: TilePos, dir: Direction) -> Self {
        Self {
            agent: Agent::new(tile, dir),
            facing: dir,
            pause_ticks: 0,
            slowdown_ms: 0,
            tunnel_penalty_ms: 0,
            consumed_this_tile: false,
            animation_ticks: 0,
        }
    }

    pub fn queue(&mut self, dir: Direction) {
        self.agent.next_dir = dir;
    }

    pub fn frame(&self) -> u32 {
        ((self.animation_ticks / FRAME_TICKS) % FRAME_COUNT) as u32
    }

    fn speed(&self, grid: &Grid, level: u32, frightened: bool) -> f32 {
        let mut speed = if frightened {
            get_player_fright_speed(level)
        } else {
            get_player_speed(level)
        };
        if self.slowdown_ms > 0 {
            speed *= EAT_SLOWDOWN_FACTOR;
        }
        if self.tunnel_penalty_ms > 0 || grid.in_tunnel(self.agent.tile) {
            speed *= TUNNEL_SPEED_FACTOR;
        }
        speed
    }

    /// Advances one tick and returns the pellet eaten on entering a tile, if any.
    /// Eating arms a short freeze, so at most one pellet is taken per tick.
    pub fn update(
        &mut self,
        grid: &mut Grid,
        level: u32,
        frightened: bool,
        dt_ms: u64,
    ) -> Option<(TilePos, Consumption)> {
        self.animation_ticks = self.animation_ticks.wrapping_add(1);
        self.slowdown_ms = self.slowdown_ms.saturating_sub(dt_ms);
        self.tunnel_penalty_ms = self.tunnel_penalty_ms.saturating_sub(dt_ms);
        if self.pause_ticks > 0 {
            self.pause_ticks -= 1;
            return None;
        }

        let mut budget = travel_px(self.speed(grid, level, frightened), dt_ms);
        let mut segments = 0;
        while budget > 0.0 && segments < MAX_SEGMENTS_PER_TICK {
            segments += 1;
            self.agent.try_turn(grid, Passage::Normal, true);
            if self.agent.dir != Direction::None {
                self.facing = self.agent.dir;
            }
            let step = self.agent.advance(grid, budget, Passage::Normal);
            if step.wrapped {
                self.tunnel_penalty_ms = TUNNEL_PENALTY_MS;
            }
            if step.tile_changed {
                self.consumed_this_tile = false;
            }
            budget -= step.travelled;

            if !self.consumed_this_tile {
                self.consumed_this_tile = true;
                let tile = self.agent.tile;
                let eaten = grid.consume_pellet(tile);
                if eaten.score > 0 {
                    self.pause_ticks = if eaten.power {
                        POWER_PELLET_PAUSE_TICKS
                    } else {
                        DOT_EAT_PAUSE_TICKS
                    };
                    self.slowdown_ms = EAT_SLOWDOWN_MS;
                    return Some((tile, eaten));
                }
            }
            if step.travelled <= 0.0 {
                break;
            }
        }
        None
    }
}
