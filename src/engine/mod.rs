use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::constants::{get_ghost_score, MAX_GHOST_COMBO};
use crate::grid::{Consumption, Grid, GridError};
use crate::rng::Rng;
use crate::types::{
    Direction, GameEvent, GameSummary, GhostId, GhostMode, GhostState, GhostView, InputCommand,
    PlayerView, Snapshot, TilePos,
};

mod agent;
mod ghost;
mod player;
pub mod schedule;
pub mod strategy;
mod utils;

pub use self::agent::{tile_of, tile_origin};

use self::ghost::{Ghost, GhostRules};
use self::player::Player;
use self::schedule::ModeScheduler;
use self::utils::met;

const PLAYER_START: TilePos = TilePos::new(13, 23);
const PLAYER_START_DIR: Direction = Direction::Left;

/// Read-only view of the world that ghosts decide against. Positions are
/// taken before anyone moves, so update order never leaks into targeting.
#[derive(Clone, Copy, Debug)]
pub struct TickContext {
    pub player_tile: TilePos,
    pub player_facing: Direction,
    pub leader_tile: TilePos,
    pub mode: GhostMode,
    pub frightened: bool,
    /// Debug mode holds scatter/chase ghosts in their current state.
    pub schedule_frozen: bool,
    pub level: u32,
    pub level_ms: u64,
    pub dots_eaten: u32,
    pub dt_ms: u64,
}

#[derive(Clone, Debug)]
pub struct GameEngine {
    config: EngineConfig,
    boards: Vec<Grid>,
    board_index: usize,
    grid: Grid,

    rng: Rng,
    player: Player,
    ghosts: Vec<Ghost>,
    scheduler: ModeScheduler,
    events: Vec<GameEvent>,
    pending_move: Option<Direction>,

    level: u32,
    score: u32,
    high_score: u32,
    lives: u32,
    dots_eaten: u32,
    pellets_eaten: u32,
    ghosts_eaten: u32,
    ghost_combo: u32,

    elapsed_ms: u64,
    tick_counter: u64,
    paused: bool,
    debug: bool,
    ended: bool,
}

/// Where the player spawns: the arcade start tile, or the first open
/// corridor tile on layouts that wall it off.
fn player_start(grid: &Grid) -> TilePos {
    if grid.is_walkable(PLAYER_START) && !grid.in_house(PLAYER_START) {
        return PLAYER_START;
    }
    (0..grid.height())
        .flat_map(|y| (0..grid.width()).map(move |x| TilePos::new(x, y)))
        .find(|pos| grid.is_walkable(*pos) && !grid.in_house(*pos))
        .unwrap_or(PLAYER_START)
}

fn spawn_ghosts(grid: &Grid) -> Vec<Ghost> {
    GhostId::ALL
        .into_iter()
        .map(|id| Ghost::new(grid, id))
        .collect()
}

impl GameEngine {
    pub fn new(config: EngineConfig) -> Result<Self, GridError> {
        let boards = if config.boards.is_empty() {
            vec![Grid::reference()?]
        } else {
            config
                .boards
                .iter()
                .map(|rows| Grid::parse(rows))
                .collect::<Result<Vec<_>, _>>()?
        };
        let Some(grid) = boards.first().cloned() else {
            return Err(GridError::Empty);
        };

        info!(
            seed = config.seed,
            boards = boards.len(),
            level = config.starting_level,
            "engine created"
        );
        Ok(Self {
            rng: Rng::new(config.seed),
            player: Player::new(player_start(&grid), PLAYER_START_DIR),
            ghosts: spawn_ghosts(&grid),
            scheduler: ModeScheduler::new(config.pause_schedule_during_fright),
            events: Vec::new(),
            pending_move: None,
            level: config.starting_level.max(1),
            score: 0,
            high_score: 0,
            lives: config.starting_lives,
            dots_eaten: 0,
            pellets_eaten: 0,
            ghosts_eaten: 0,
            ghost_combo: 0,
            elapsed_ms: 0,
            tick_counter: 0,
            paused: false,
            debug: false,
            ended: false,
            board_index: 0,
            boards,
            grid,
            config,
        })
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn player_tile(&self) -> TilePos {
        self.player.agent.tile
    }

    /// Seeds the high score from an earlier game in the same session.
    pub fn carry_high_score(&mut self, previous: u32) {
        self.high_score = self.high_score.max(previous);
    }

    pub fn handle_input(&mut self, command: InputCommand) {
        match command {
            InputCommand::Move(dir) => {
                self.pending_move = Some(dir);
            }
            InputCommand::TogglePause => {
                self.paused = !self.paused;
                info!(paused = self.paused, "pause toggled");
            }
            InputCommand::ToggleDebug => {
                self.debug = !self.debug;
                info!(debug = self.debug, "debug toggled");
            }
            InputCommand::NextBoard => self.next_board(),
        }
    }

    /// Parses and applies a raw command string; unknown commands are dropped.
    pub fn handle_raw_input(&mut self, raw: &str) -> bool {
        match InputCommand::parse(raw) {
            Some(command) => {
                self.handle_input(command);
                true
            }
            None => {
                debug!(input = raw, "ignored unknown input");
                false
            }
        }
    }

    pub fn step(&mut self, dt_ms: u64) {
        if self.ended || self.paused {
            return;
        }
        self.tick_counter += 1;
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt_ms);

        if let Some(dir) = self.pending_move.take() {
            self.player.queue(dir);
        }

        let player_before = self.player.agent.tile;
        let facing_before = self.player.facing;
        let ghosts_before: Vec<TilePos> = self.ghosts.iter().map(|g| g.agent.tile).collect();
        let leader_before = self
            .ghosts
            .iter()
            .find(|g| g.id == GhostId::Leader)
            .map(|g| g.agent.tile)
            .unwrap_or(player_before);

        if !self.debug {
            self.update_schedule(dt_ms);
        }

        let frightened = self.scheduler.frightened();
        if let Some((tile, eaten)) = self
            .player
            .update(&mut self.grid, self.level, frightened, dt_ms)
        {
            self.apply_consumption(tile, eaten);
        }

        let ctx = TickContext {
            player_tile: player_before,
            player_facing: facing_before,
            leader_tile: leader_before,
            mode: self.scheduler.mode(),
            frightened: self.scheduler.frightened(),
            schedule_frozen: self.debug,
            level: self.level,
            level_ms: self.scheduler.level_ms(),
            dots_eaten: self.dots_eaten,
            dt_ms,
        };
        self.update_ghosts(&ctx);

        self.resolve_collisions(player_before, &ghosts_before);
        if self.ended {
            return;
        }
        if self.grid.pellets_remaining() == 0 {
            self.advance_level();
        }
        self.high_score = self.high_score.max(self.score);
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        let visual = self.scheduler.visual();
        Snapshot {
            tick: self.tick_counter,
            level: self.level,
            level_ms: self.scheduler.level_ms(),
            score: self.score,
            high_score: self.high_score,
            lives: self.lives,
            pellets_remaining: self.grid.pellets_remaining(),
            mode: self.scheduler.mode(),
            frightened_ms: self.scheduler.fright_remaining_ms(),
            paused: self.paused,
            debug: self.debug,
            player: PlayerView {
                x: self.player.agent.tile.x,
                y: self.player.agent.tile.y,
                px: self.player.agent.pixel.x,
                py: self.player.agent.pixel.y,
                dir: self.player.agent.dir,
                facing: self.player.facing,
                paused_ticks: self.player.pause_ticks,
                frame: self.player.frame(),
            },
            ghosts: self
                .ghosts
                .iter()
                .map(|ghost| GhostView {
                    id: ghost.id,
                    x: ghost.agent.tile.x,
                    y: ghost.agent.tile.y,
                    px: ghost.agent.pixel.x,
                    py: ghost.agent.pixel.y,
                    dir: ghost.agent.dir,
                    state: ghost.state,
                    visual: if ghost.state == GhostState::Frightened {
                        visual
                    } else {
                        None
                    },
                    target: self.debug.then_some(ghost.target),
                })
                .collect(),
            events: if include_events {
                std::mem::take(&mut self.events)
            } else {
                Vec::new()
            },
        }
    }

    pub fn build_summary(&self) -> GameSummary {
        GameSummary {
            level: self.level,
            score: self.score,
            high_score: self.high_score.max(self.score),
            lives: self.lives,
            pellets_eaten: self.pellets_eaten,
            ghosts_eaten: self.ghosts_eaten,
            duration_ms: self.elapsed_ms,
        }
    }

    fn update_schedule(&mut self, dt_ms: u64) {
        let tick = self.scheduler.tick(dt_ms);
        if tick.fright_expired {
            debug!(tick = self.tick_counter, "frightened ended");
            self.events.push(GameEvent::FrightenedEnded);
        }
        if tick.mode_changed {
            let mode = self.scheduler.mode();
            debug!(?mode, level_ms = self.scheduler.level_ms(), "mode changed");
            self.events.push(GameEvent::ModeChanged { mode });
        }
    }

    fn apply_consumption(&mut self, tile: TilePos, eaten: Consumption) {
        self.score = self.score.saturating_add(eaten.score);
        self.pellets_eaten += 1;
        if !eaten.power {
            // Only regular dots count toward house release.
            self.dots_eaten += 1;
            self.events.push(GameEvent::PelletEaten {
                x: tile.x,
                y: tile.y,
                score: eaten.score,
            });
            return;
        }

        self.events.push(GameEvent::PowerPelletEaten {
            x: tile.x,
            y: tile.y,
        });
        self.scheduler.arm(self.config.frightened_ms);
        self.ghost_combo = 0;
        for ghost in &mut self.ghosts {
            ghost.frighten();
        }
        info!(
            duration_ms = self.config.frightened_ms,
            "power pellet eaten; ghosts frightened"
        );
        self.events.push(GameEvent::FrightenedStarted {
            duration_ms: self.config.frightened_ms,
        });
    }

    fn elroy_stage(&self) -> u8 {
        let remaining = self.grid.pellets_remaining();
        if remaining <= self.config.elroy.stage_two {
            2
        } else if remaining <= self.config.elroy.stage_one {
            1
        } else {
            0
        }
    }

    fn update_ghosts(&mut self, ctx: &TickContext) {
        let elroy_stage = self.elroy_stage();
        for idx in 0..self.ghosts.len() {
            let id = self.ghosts[idx].id;
            let rules = GhostRules {
                unlock: self.config.unlock.for_ghost(id),
                elroy_stage,
            };
            let out = self.ghosts[idx].update(&self.grid, ctx, &rules, &mut self.rng);
            if out.released {
                debug!(ghost = ?id, level_ms = ctx.level_ms, "ghost released");
                self.events.push(GameEvent::GhostReleased { ghost: id });
            }
            if out.left_house {
                debug!(ghost = ?id, "ghost left the house");
            }
            if out.stalled {
                warn!(
                    ghost = ?id,
                    tile = ?self.ghosts[idx].agent.tile,
                    tick = self.tick_counter,
                    "ghost has no legal move; holding"
                );
            }
            if out.reached_home {
                self.events.push(GameEvent::GhostHome { ghost: id });
            }
        }
    }

    fn resolve_collisions(&mut self, player_before: TilePos, ghosts_before: &[TilePos]) {
        let player_after = self.player.agent.tile;
        for idx in 0..self.ghosts.len() {
            let Some(ghost_before) = ghosts_before.get(idx).copied() else {
                continue;
            };
            let ghost_after = self.ghosts[idx].agent.tile;
            if !met(player_before, player_after, ghost_before, ghost_after) {
                continue;
            }

            let id = self.ghosts[idx].id;
            if self.ghosts[idx].state == GhostState::Frightened {
                let score = get_ghost_score(self.ghost_combo);
                self.score = self.score.saturating_add(score);
                self.ghost_combo = (self.ghost_combo + 1).min(MAX_GHOST_COMBO);
                self.ghosts_eaten += 1;
                self.ghosts[idx].mark_eaten();
                info!(ghost = ?id, score, "ghost eaten");
                self.events.push(GameEvent::GhostEaten { ghost: id, score });
            } else if self.ghosts[idx].is_dangerous() {
                self.lose_life(id);
                return;
            }
        }
    }

    fn lose_life(&mut self, ghost: GhostId) {
        self.lives = self.lives.saturating_sub(1);
        info!(?ghost, lives_left = self.lives, "player caught");
        self.events.push(GameEvent::PlayerCaught {
            ghost,
            lives_left: self.lives,
        });
        if self.lives == 0 {
            self.ended = true;
            self.high_score = self.high_score.max(self.score);
            info!(score = self.score, level = self.level, "game over");
            self.events.push(GameEvent::GameOver { score: self.score });
            return;
        }
        self.reset_actors();
    }

    fn reset_actors(&mut self) {
        self.player = Player::new(player_start(&self.grid), PLAYER_START_DIR);
        self.ghosts = spawn_ghosts(&self.grid);
        self.scheduler.restart_level();
        self.pending_move = None;
        self.ghost_combo = 0;
    }

    fn advance_level(&mut self) {
        info!(level = self.level, score = self.score, "level cleared");
        self.events.push(GameEvent::LevelCleared { level: self.level });
        self.level += 1;
        self.load_board(self.board_index);
    }

    fn next_board(&mut self) {
        let next = (self.board_index + 1) % self.boards.len().max(1);
        self.load_board(next);
        info!(board = next, "board reloaded");
        self.events.push(GameEvent::BoardReloaded { board: next });
    }

    fn load_board(&mut self, index: usize) {
        if let Some(board) = self.boards.get(index) {
            self.board_index = index;
            self.grid = board.clone();
        }
        self.dots_eaten = 0;
        self.reset_actors();
    }
}
