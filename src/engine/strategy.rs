//! Per-identity targeting. Each ghost is a row in a constant table plus a
//! pure chase function; nothing here touches engine state.

use crate::types::{Direction, GhostId, TilePos};

use super::TickContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GhostProfile {
    pub id: GhostId,
    pub scatter_corner: TilePos,
    pub start_tile: TilePos,
    pub start_dir: Direction,
}

const PROFILES: [GhostProfile; 4] = [
    GhostProfile {
        id: GhostId::Leader,
        scatter_corner: TilePos::new(25, -3),
        start_tile: TilePos::new(13, 11),
        start_dir: Direction::Left,
    },
    GhostProfile {
        id: GhostId::Speedy,
        scatter_corner: TilePos::new(2, -3),
        start_tile: TilePos::new(14, 14),
        start_dir: Direction::Up,
    },
    GhostProfile {
        id: GhostId::Bashful,
        scatter_corner: TilePos::new(27, 31),
        start_tile: TilePos::new(12, 14),
        start_dir: Direction::Down,
    },
    GhostProfile {
        id: GhostId::Pokey,
        scatter_corner: TilePos::new(0, 31),
        start_tile: TilePos::new(16, 14),
        start_dir: Direction::Down,
    },
];

pub fn profile(id: GhostId) -> &'static GhostProfile {
    match id {
        GhostId::Leader => &PROFILES[0],
        GhostId::Speedy => &PROFILES[1],
        GhostId::Bashful => &PROFILES[2],
        GhostId::Pokey => &PROFILES[3],
    }
}

/// Tiles ahead of the player along its facing. Facing up also shifts left by
/// the same amount, as the arcade's offset overflow did.
fn ahead_of_player(ctx: &TickContext, tiles: i32) -> TilePos {
    let ahead = ctx.player_tile.offset(ctx.player_facing, tiles);
    if ctx.player_facing == Direction::Up {
        return TilePos::new(ahead.x - tiles, ahead.y);
    }
    ahead
}

fn chase_leader(ctx: &TickContext, _own: TilePos) -> TilePos {
    ctx.player_tile
}

fn chase_speedy(ctx: &TickContext, _own: TilePos) -> TilePos {
    ahead_of_player(ctx, 4)
}

fn chase_bashful(ctx: &TickContext, _own: TilePos) -> TilePos {
    let pivot = ahead_of_player(ctx, 2);
    TilePos::new(
        2 * pivot.x - ctx.leader_tile.x,
        2 * pivot.y - ctx.leader_tile.y,
    )
}

fn chase_pokey(ctx: &TickContext, own: TilePos) -> TilePos {
    if own.distance_sq(ctx.player_tile) > 8 * 8 {
        ctx.player_tile
    } else {
        profile(GhostId::Pokey).scatter_corner
    }
}

type ChaseFn = fn(&TickContext, TilePos) -> TilePos;

pub fn chase_target(id: GhostId, ctx: &TickContext, own: TilePos) -> TilePos {
    let chase: ChaseFn = match id {
        GhostId::Leader => chase_leader,
        GhostId::Speedy => chase_speedy,
        GhostId::Bashful => chase_bashful,
        GhostId::Pokey => chase_pokey,
    };
    chase(ctx, own)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::engine::tests::context;

    #[test]
    fn leader_targets_player_tile() {
        let ctx = context(TilePos::new(13, 14), Direction::Left, TilePos::new(13, 11));
        assert_eq!(
            chase_target(GhostId::Leader, &ctx, TilePos::new(13, 11)),
            TilePos::new(13, 14)
        );
    }

    #[test]
    fn speedy_leads_the_player_with_upward_quirk() {
        let own = TilePos::new(1, 1);
        let right = context(TilePos::new(10, 20), Direction::Right, TilePos::new(0, 0));
        assert_eq!(chase_target(GhostId::Speedy, &right, own), TilePos::new(14, 20));
        let down = context(TilePos::new(10, 20), Direction::Down, TilePos::new(0, 0));
        assert_eq!(chase_target(GhostId::Speedy, &down, own), TilePos::new(10, 24));
        let up = context(TilePos::new(10, 20), Direction::Up, TilePos::new(0, 0));
        assert_eq!(chase_target(GhostId::Speedy, &up, own), TilePos::new(6, 16));
    }

    #[test]
    fn bashful_doubles_the_vector_from_leader_through_pivot() {
        let ctx = context(TilePos::new(10, 20), Direction::Left, TilePos::new(12, 16));
        // pivot (8,20); leader->pivot (-4,4); doubled from leader gives (4,24)
        assert_eq!(
            chase_target(GhostId::Bashful, &ctx, TilePos::new(1, 1)),
            TilePos::new(4, 24)
        );
        let up = context(TilePos::new(10, 20), Direction::Up, TilePos::new(10, 20));
        // pivot (8,18) under the upward quirk
        assert_eq!(
            chase_target(GhostId::Bashful, &up, TilePos::new(1, 1)),
            TilePos::new(6, 16)
        );
    }

    #[test]
    fn pokey_retreats_inside_eight_tiles() {
        let ctx = context(TilePos::new(10, 20), Direction::Left, TilePos::new(0, 0));
        assert_eq!(
            chase_target(GhostId::Pokey, &ctx, TilePos::new(10, 2)),
            TilePos::new(10, 20)
        );
        assert_eq!(
            chase_target(GhostId::Pokey, &ctx, TilePos::new(10, 12)),
            TilePos::new(0, 31)
        );
        assert_eq!(
            chase_target(GhostId::Pokey, &ctx, TilePos::new(10, 11)),
            TilePos::new(10, 20)
        );
    }

    #[test]
    fn profiles_have_distinct_corners_and_starts() {
        let corners: BTreeSet<TilePos> = GhostId::ALL
            .iter()
            .map(|id| profile(*id).scatter_corner)
            .collect();
        let starts: BTreeSet<TilePos> = GhostId::ALL
            .iter()
            .map(|id| profile(*id).start_tile)
            .collect();
        assert_eq!(corners.len(), 4);
        assert_eq!(starts.len(), 4);
        for id in GhostId::ALL {
            assert_eq!(profile(id).id, id);
        }
    }
}
