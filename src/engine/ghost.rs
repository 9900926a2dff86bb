use tracing::debug;

use crate::config::HouseUnlock;
use crate::constants::{
    get_elroy_speed, get_ghost_fright_speed, get_ghost_speed, BOUNCE_SPEED_FACTOR,
    EATEN_SPEED_MULTIPLIER, MAX_SEGMENTS_PER_TICK, TILE_EPSILON_PX, TILE_PX, TUNNEL_PENALTY_MS,
    TUNNEL_SPEED_FACTOR,
};
use crate::grid::{Grid, Passage};
use crate::rng::Rng;
use crate::types::{Direction, GhostId, GhostState, TilePos};

use super::agent::Agent;
use super::strategy::{chase_target, profile};
use super::utils::travel_px;
use super::TickContext;

/// Per-ghost rules the engine resolves before each update.
#[derive(Clone, Copy, Debug)]
pub(super) struct GhostRules {
    pub unlock: HouseUnlock,
    pub elroy_stage: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(super) struct GhostTick {
    pub released: bool,
    pub left_house: bool,
    pub reached_home: bool,
    pub stalled: bool,
}

#[derive(Clone, Debug)]
pub(super) struct Ghost {
    pub id: GhostId,
    pub agent: Agent,
    pub state: GhostState,
    pub target: TilePos,
    moved_since_decision: f32,
    tunnel_penalty_ms: u64,
}

/// Directions a ghost may take from `tile`, in tie-break order, never
/// including the reverse of `heading`.
pub(super) fn legal_moves(
    grid: &Grid,
    tile: TilePos,
    heading: Direction,
    passage: Passage,
) -> Vec<Direction> {
    let reverse = heading.opposite();
    Direction::PRIORITY
        .into_iter()
        .filter(|dir| *dir != reverse)
        .filter(|dir| grid.can_enter(tile.step(*dir), passage))
        .collect()
}

/// First of `legal` whose next tile is strictly closest to `target`.
pub(super) fn nearest_move(tile: TilePos, legal: &[Direction], target: TilePos) -> Direction {
    let mut best = Direction::None;
    let mut best_distance = i32::MAX;
    for dir in legal {
        let distance = tile.step(*dir).distance_sq(target);
        if distance < best_distance {
            best_distance = distance;
            best = *dir;
        }
    }
    best
}

impl Ghost {
    pub fn new(grid: &Grid, id: GhostId) -> Self {
        let profile = profile(id);
        let state = if grid.in_house(profile.start_tile) {
            GhostState::InHouse
        } else {
            GhostState::Scatter
        };
        Self {
            id,
            agent: Agent::new(profile.start_tile, profile.start_dir),
            state,
            target: profile.scatter_corner,
            moved_since_decision: TILE_PX,
            tunnel_penalty_ms: 0,
        }
    }

    fn passage(&self) -> Passage {
        match self.state {
            GhostState::LeavingHouse | GhostState::Eaten => Passage::ThroughDoor,
            _ => Passage::Normal,
        }
    }

    fn set_state(&mut self, state: GhostState) {
        if self.state == state {
            return;
        }
        debug!(ghost = ?self.id, from = ?self.state, to = ?state, "ghost state changed");
        self.state = state;
    }

    /// Scatter/Chase ghosts turn frightened; other states ignore the pellet.
    pub fn frighten(&mut self) {
        if matches!(self.state, GhostState::Scatter | GhostState::Chase) {
            self.set_state(GhostState::Frightened);
        }
    }

    pub fn mark_eaten(&mut self) {
        self.set_state(GhostState::Eaten);
        self.moved_since_decision = TILE_PX;
    }

    pub fn is_dangerous(&self) -> bool {
        matches!(
            self.state,
            GhostState::Scatter | GhostState::Chase | GhostState::LeavingHouse
        )
    }

    fn speed(&self, grid: &Grid, ctx: &TickContext, rules: &GhostRules) -> f32 {
        let base = get_ghost_speed(ctx.level);
        let speed = match self.state {
            GhostState::Frightened => get_ghost_fright_speed(ctx.level),
            GhostState::Eaten => return base * EATEN_SPEED_MULTIPLIER,
            GhostState::InHouse | GhostState::LeavingHouse => base * BOUNCE_SPEED_FACTOR,
            GhostState::Scatter | GhostState::Chase => {
                if self.id == GhostId::Leader && rules.elroy_stage > 0 {
                    get_elroy_speed(ctx.level, rules.elroy_stage)
                } else {
                    base
                }
            }
        };
        if self.tunnel_penalty_ms > 0 || grid.in_tunnel(self.agent.tile) {
            return speed * TUNNEL_SPEED_FACTOR;
        }
        speed
    }

    fn update_state(&mut self, ctx: &TickContext, rules: &GhostRules, out: &mut GhostTick) {
        match self.state {
            GhostState::InHouse => {
                if rules.unlock.is_met(ctx.level_ms, ctx.dots_eaten) {
                    self.set_state(GhostState::LeavingHouse);
                    self.moved_since_decision = TILE_PX;
                    out.released = true;
                }
            }
            GhostState::Scatter | GhostState::Chase => {
                if !ctx.schedule_frozen {
                    self.set_state(ctx.mode.into());
                }
            }
            GhostState::Frightened => {
                if !ctx.frightened {
                    self.set_state(ctx.mode.into());
                }
            }
            GhostState::LeavingHouse | GhostState::Eaten => {}
        }
    }

    fn resolve_target(&self, grid: &Grid, ctx: &TickContext) -> TilePos {
        match self.state {
            GhostState::Scatter => profile(self.id).scatter_corner,
            GhostState::Chase => chase_target(self.id, ctx, self.agent.tile),
            GhostState::LeavingHouse => grid
                .house_exits()
                .into_iter()
                .min_by_key(|exit| exit.distance_sq(self.agent.tile))
                .unwrap_or(self.agent.tile),
            GhostState::Eaten => grid.house_home(),
            GhostState::InHouse | GhostState::Frightened => self.agent.tile,
        }
    }

    fn choose_direction(&self, grid: &Grid, rng: &mut Rng) -> Direction {
        let tile = self.agent.tile;
        let passage = self.passage();
        let legal = legal_moves(grid, tile, self.agent.dir, passage);
        if legal.is_empty() {
            let reverse = self.agent.dir.opposite();
            if reverse != Direction::None && grid.can_enter(tile.step(reverse), passage) {
                return reverse;
            }
            return Direction::None;
        }
        if self.state == GhostState::Frightened {
            return rng.pick(&legal).unwrap_or(Direction::None);
        }
        nearest_move(tile, &legal, self.target)
    }

    // Arrival checks run whenever the ghost sits on a tile origin.
    fn check_arrival(&mut self, grid: &Grid, out: &mut GhostTick) {
        match self.state {
            GhostState::LeavingHouse if grid.house_exits().contains(&self.agent.tile) => {
                self.set_state(GhostState::Scatter);
                out.left_house = true;
            }
            GhostState::Eaten if self.agent.tile == grid.house_home() => {
                self.set_state(GhostState::InHouse);
                self.agent.snap();
                self.agent.dir = Direction::Up;
                out.reached_home = true;
            }
            _ => {}
        }
    }

    fn bounce(&mut self, grid: &Grid, budget: f32) -> f32 {
        if !self.agent.dir.is_vertical() {
            self.agent.dir = Direction::Up;
        }
        let heading = self.agent.dir;
        let step = self.agent.advance(grid, budget, Passage::Normal);
        if step.blocked {
            self.agent.dir = heading.opposite();
        }
        step.travelled
    }

    pub fn update(
        &mut self,
        grid: &Grid,
        ctx: &TickContext,
        rules: &GhostRules,
        rng: &mut Rng,
    ) -> GhostTick {
        let mut out = GhostTick::default();
        self.tunnel_penalty_ms = self.tunnel_penalty_ms.saturating_sub(ctx.dt_ms);
        self.update_state(ctx, rules, &mut out);
        self.target = self.resolve_target(grid, ctx);

        let mut budget = travel_px(self.speed(grid, ctx, rules), ctx.dt_ms);
        let mut segments = 0;
        while budget > 0.0 && segments < MAX_SEGMENTS_PER_TICK {
            segments += 1;
            if self.state == GhostState::InHouse {
                budget -= self.bounce(grid, budget);
                continue;
            }

            if self.agent.is_aligned() {
                let before = self.state;
                self.check_arrival(grid, &mut out);
                if self.state != before {
                    if self.state == GhostState::InHouse {
                        break;
                    }
                    self.target = self.resolve_target(grid, ctx);
                }
                if self.moved_since_decision >= TILE_PX - TILE_EPSILON_PX {
                    let dir = self.choose_direction(grid, rng);
                    self.agent.snap();
                    self.agent.dir = dir;
                    self.moved_since_decision = 0.0;
                    if dir == Direction::None {
                        self.moved_since_decision = TILE_PX;
                        out.stalled = true;
                        break;
                    }
                }
            }

            let step = self.agent.advance(grid, budget, self.passage());
            if step.wrapped {
                self.tunnel_penalty_ms = TUNNEL_PENALTY_MS;
            }
            self.moved_since_decision += step.travelled;
            budget -= step.travelled;
            if step.travelled <= 0.0 {
                break;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::context;
    use crate::types::GhostMode;

    fn grid() -> Grid {
        Grid::reference().expect("reference maze parses")
    }

    fn rules(unlock: HouseUnlock) -> GhostRules {
        GhostRules {
            unlock,
            elroy_stage: 0,
        }
    }

    fn pocket() -> Grid {
        Grid::parse(&["#######", "#     #", "###-###"]).expect("pocket parses")
    }

    #[test]
    fn ties_resolve_up_before_down() {
        let grid = grid();
        let legal = legal_moves(&grid, TilePos::new(6, 5), Direction::Right, Passage::Normal);
        assert_eq!(legal, vec![Direction::Up, Direction::Down, Direction::Right]);
        let chosen = nearest_move(TilePos::new(6, 5), &legal, TilePos::new(-4, 5));
        assert_eq!(chosen, Direction::Up);
    }

    #[test]
    fn ties_resolve_left_before_right() {
        let legal = [Direction::Left, Direction::Right];
        assert_eq!(
            nearest_move(TilePos::new(5, 5), &legal, TilePos::new(5, 0)),
            Direction::Left
        );
    }

    #[test]
    fn reverse_is_excluded_even_when_closer() {
        let grid = pocket();
        let legal = legal_moves(&grid, TilePos::new(3, 1), Direction::Left, Passage::Normal);
        assert_eq!(legal, vec![Direction::Left]);
        assert_eq!(
            nearest_move(TilePos::new(3, 1), &legal, TilePos::new(6, 1)),
            Direction::Left
        );
    }

    #[test]
    fn dead_end_falls_back_to_reverse() {
        let grid = pocket();
        let mut ghost = Ghost::new(&grid, GhostId::Leader);
        ghost.state = GhostState::Scatter;
        ghost.agent = Agent::new(TilePos::new(1, 1), Direction::Left);
        let mut rng = Rng::new(1);
        assert!(legal_moves(&grid, TilePos::new(1, 1), Direction::Left, Passage::Normal).is_empty());
        assert_eq!(ghost.choose_direction(&grid, &mut rng), Direction::Right);
    }

    #[test]
    fn boxed_in_ghost_holds_position() {
        let grid = Grid::parse(&["###", "# #", "#-#"]).expect("box parses");
        let mut ghost = Ghost::new(&grid, GhostId::Leader);
        ghost.state = GhostState::Scatter;
        ghost.agent = Agent::new(TilePos::new(1, 1), Direction::Left);
        let ctx = context(TilePos::new(1, 1), Direction::Left, TilePos::new(1, 1));
        let mut rng = Rng::new(1);
        let out = ghost.update(&grid, &ctx, &rules(HouseUnlock::Immediate), &mut rng);
        assert!(out.stalled);
        assert_eq!(ghost.agent.tile, TilePos::new(1, 1));
        assert_eq!(ghost.agent.dir, Direction::None);
    }

    #[test]
    fn scatter_ghost_never_reverses_while_roaming() {
        let grid = grid();
        let mut ghost = Ghost::new(&grid, GhostId::Leader);
        let mut rng = Rng::new(9);
        let mut ctx = context(TilePos::new(13, 23), Direction::Left, TilePos::new(13, 11));
        let unlock = rules(HouseUnlock::Immediate);
        for tick in 0..3_000u64 {
            ctx.mode = if (tick / 400) % 2 == 0 {
                GhostMode::Scatter
            } else {
                GhostMode::Chase
            };
            let before = ghost.agent.dir;
            ghost.update(&grid, &ctx, &unlock, &mut rng);
            assert!(
                before == Direction::None || ghost.agent.dir != before.opposite(),
                "reversed at tick {tick} on {:?}",
                ghost.agent.tile
            );
        }
    }

    #[test]
    fn frightened_moves_are_random_but_never_reverse() {
        let grid = grid();
        let mut ghost = Ghost::new(&grid, GhostId::Leader);
        ghost.state = GhostState::Frightened;
        ghost.agent = Agent::new(TilePos::new(6, 5), Direction::Right);
        let mut seen = Vec::new();
        for seed in 1..=64u32 {
            let mut rng = Rng::new(seed);
            let dir = ghost.choose_direction(&grid, &mut rng);
            assert_ne!(dir, Direction::Left);
            if !seen.contains(&dir) {
                seen.push(dir);
            }
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn released_ghost_walks_out_through_the_door() {
        let grid = grid();
        let mut ghost = Ghost::new(&grid, GhostId::Speedy);
        assert_eq!(ghost.state, GhostState::InHouse);
        let ctx = context(TilePos::new(13, 23), Direction::Left, TilePos::new(13, 11));
        let mut rng = Rng::new(3);

        let first = ghost.update(&grid, &ctx, &rules(HouseUnlock::Immediate), &mut rng);
        assert!(first.released);
        assert_eq!(ghost.state, GhostState::LeavingHouse);

        let mut left = false;
        for _ in 0..200 {
            let out = ghost.update(&grid, &ctx, &rules(HouseUnlock::Immediate), &mut rng);
            if out.left_house {
                left = true;
                break;
            }
        }
        assert!(left);
        assert_eq!(ghost.state, GhostState::Scatter);
        assert_eq!(ghost.agent.tile, TilePos::new(14, 11));
    }

    #[test]
    fn locked_ghost_bounces_inside_the_house() {
        let grid = grid();
        let mut ghost = Ghost::new(&grid, GhostId::Bashful);
        let ctx = context(TilePos::new(13, 23), Direction::Left, TilePos::new(13, 11));
        let locked = rules(HouseUnlock::LevelTime { after_ms: u64::MAX });
        let mut rng = Rng::new(3);
        let mut rows = Vec::new();
        for _ in 0..300 {
            ghost.update(&grid, &ctx, &locked, &mut rng);
            assert!(grid.in_house(ghost.agent.tile));
            assert_eq!(ghost.agent.tile.x, 12);
            if !rows.contains(&ghost.agent.tile.y) {
                rows.push(ghost.agent.tile.y);
            }
        }
        assert_eq!(ghost.state, GhostState::InHouse);
        rows.sort();
        assert_eq!(rows, vec![13, 14, 15]);
    }

    #[test]
    fn eaten_ghost_returns_home_and_reenters_house() {
        let grid = grid();
        let mut ghost = Ghost::new(&grid, GhostId::Leader);
        ghost.state = GhostState::Frightened;
        ghost.mark_eaten();
        assert_eq!(ghost.state, GhostState::Eaten);
        let ctx = context(TilePos::new(13, 23), Direction::Left, TilePos::new(13, 11));
        let locked = rules(HouseUnlock::LevelTime { after_ms: u64::MAX });
        let mut rng = Rng::new(3);
        let mut home = false;
        for _ in 0..120 {
            if ghost.update(&grid, &ctx, &locked, &mut rng).reached_home {
                home = true;
                break;
            }
        }
        assert!(home);
        assert_eq!(ghost.state, GhostState::InHouse);
        assert_eq!(ghost.agent.tile, TilePos::new(13, 14));
    }

    #[test]
    fn frightened_reverts_to_scheduled_mode_on_expiry() {
        let grid = grid();
        let mut ghost = Ghost::new(&grid, GhostId::Leader);
        ghost.frighten();
        assert_eq!(ghost.state, GhostState::Frightened);
        let mut ctx = context(TilePos::new(13, 23), Direction::Left, TilePos::new(13, 11));
        ctx.frightened = true;
        let mut rng = Rng::new(3);
        ghost.update(&grid, &ctx, &rules(HouseUnlock::Immediate), &mut rng);
        assert_eq!(ghost.state, GhostState::Frightened);

        ctx.frightened = false;
        ctx.mode = GhostMode::Chase;
        ghost.update(&grid, &ctx, &rules(HouseUnlock::Immediate), &mut rng);
        assert_eq!(ghost.state, GhostState::Chase);
    }

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() <= 1e-3
    }

    fn roaming(grid: &Grid, id: GhostId, tile: TilePos, dir: Direction) -> Ghost {
        let mut ghost = Ghost::new(grid, id);
        ghost.state = GhostState::Scatter;
        ghost.agent = Agent::new(tile, dir);
        ghost
    }

    #[test]
    fn speed_follows_state() {
        let grid = grid();
        let ctx = context(TilePos::new(13, 23), Direction::Left, TilePos::new(13, 11));
        let plain = rules(HouseUnlock::Immediate);
        let base = get_ghost_speed(1);
        let mut ghost = roaming(&grid, GhostId::Speedy, TilePos::new(6, 5), Direction::Right);

        assert!(approx_eq(ghost.speed(&grid, &ctx, &plain), base));
        ghost.state = GhostState::Chase;
        assert!(approx_eq(ghost.speed(&grid, &ctx, &plain), base));
        ghost.state = GhostState::Frightened;
        assert!(approx_eq(
            ghost.speed(&grid, &ctx, &plain),
            get_ghost_fright_speed(1)
        ));
        ghost.state = GhostState::Eaten;
        assert!(approx_eq(ghost.speed(&grid, &ctx, &plain), base * 2.0));
        ghost.state = GhostState::InHouse;
        assert!(approx_eq(ghost.speed(&grid, &ctx, &plain), base * 0.5));
        ghost.state = GhostState::LeavingHouse;
        assert!(approx_eq(ghost.speed(&grid, &ctx, &plain), base * 0.5));
    }

    #[test]
    fn elroy_stages_only_speed_up_the_leader() {
        let grid = grid();
        let ctx = context(TilePos::new(13, 23), Direction::Left, TilePos::new(13, 11));
        let base = get_ghost_speed(1);
        let leader = roaming(&grid, GhostId::Leader, TilePos::new(6, 5), Direction::Right);
        let speedy = roaming(&grid, GhostId::Speedy, TilePos::new(6, 5), Direction::Right);

        for stage in 1..=2u8 {
            let stage_rules = GhostRules {
                unlock: HouseUnlock::Immediate,
                elroy_stage: stage,
            };
            assert!(approx_eq(
                leader.speed(&grid, &ctx, &stage_rules),
                get_elroy_speed(1, stage)
            ));
            assert!(approx_eq(speedy.speed(&grid, &ctx, &stage_rules), base));
        }
        assert!(get_elroy_speed(1, 2) > get_elroy_speed(1, 1));
        assert!(get_elroy_speed(1, 1) > base);

        let mut frightened = leader.clone();
        frightened.state = GhostState::Frightened;
        let stage_two = GhostRules {
            unlock: HouseUnlock::Immediate,
            elroy_stage: 2,
        };
        assert!(approx_eq(
            frightened.speed(&grid, &ctx, &stage_two),
            get_ghost_fright_speed(1)
        ));
    }

    #[test]
    fn tunnel_halves_speed_except_when_eaten() {
        let grid = grid();
        let ctx = context(TilePos::new(13, 23), Direction::Left, TilePos::new(13, 11));
        let plain = rules(HouseUnlock::Immediate);
        let base = get_ghost_speed(1);
        let mut ghost = roaming(&grid, GhostId::Leader, TilePos::new(0, 14), Direction::Left);
        assert!(grid.in_tunnel(ghost.agent.tile));
        assert!(approx_eq(ghost.speed(&grid, &ctx, &plain), base * 0.5));

        ghost.state = GhostState::Eaten;
        assert!(approx_eq(ghost.speed(&grid, &ctx, &plain), base * 2.0));

        let mut past_tunnel = roaming(&grid, GhostId::Leader, TilePos::new(2, 14), Direction::Left);
        assert!(approx_eq(past_tunnel.speed(&grid, &ctx, &plain), base));
        past_tunnel.tunnel_penalty_ms = 100;
        assert!(approx_eq(past_tunnel.speed(&grid, &ctx, &plain), base * 0.5));
    }

    #[test]
    fn wrapping_arms_the_tunnel_penalty() {
        let grid = grid();
        let ctx = context(TilePos::new(13, 23), Direction::Left, TilePos::new(13, 11));
        let plain = rules(HouseUnlock::Immediate);
        let mut ghost = roaming(&grid, GhostId::Leader, TilePos::new(0, 14), Direction::Left);
        let mut rng = Rng::new(5);

        ghost.update(&grid, &ctx, &plain, &mut rng);
        assert_eq!(ghost.agent.tile, TilePos::new(27, 14));
        assert_eq!(ghost.agent.dir, Direction::Left);
        assert_eq!(ghost.tunnel_penalty_ms, TUNNEL_PENALTY_MS);

        ghost.update(&grid, &ctx, &plain, &mut rng);
        assert_eq!(ghost.tunnel_penalty_ms, TUNNEL_PENALTY_MS - ctx.dt_ms);
    }

    #[test]
    fn heading_is_kept_until_a_full_tile_is_covered() {
        let grid = grid();
        let ctx = context(TilePos::new(13, 23), Direction::Left, TilePos::new(13, 11));
        let plain = rules(HouseUnlock::Immediate);
        let mut rng = Rng::new(5);

        // Pokey's corner lies down-left, so a fresh decision at (6,5) turns Down.
        let mut fresh = roaming(&grid, GhostId::Pokey, TilePos::new(6, 5), Direction::Right);
        fresh.update(&grid, &ctx, &plain, &mut rng);
        assert_eq!(fresh.agent.dir, Direction::Down);

        let mut committed = roaming(&grid, GhostId::Pokey, TilePos::new(6, 5), Direction::Right);
        committed.moved_since_decision = 10.0;
        committed.update(&grid, &ctx, &plain, &mut rng);
        assert_eq!(committed.agent.dir, Direction::Right);
        assert_eq!(committed.agent.tile, TilePos::new(6, 5));
        assert!(committed.agent.pixel.x > 6.0 * TILE_PX);
    }

    #[test]
    fn frighten_ignores_house_and_eaten_states() {
        let grid = grid();
        let mut ghost = Ghost::new(&grid, GhostId::Pokey);
        ghost.frighten();
        assert_eq!(ghost.state, GhostState::InHouse);
        ghost.state = GhostState::Eaten;
        ghost.frighten();
        assert_eq!(ghost.state, GhostState::Eaten);
    }
}
