use crate::types::TilePos;

/// Pixels covered in `dt_ms` at `speed` pixels per second.
pub(super) fn travel_px(speed: f32, dt_ms: u64) -> f32 {
    speed * dt_ms as f32 / 1000.0
}

/// Two agents met this tick if they share a tile or walked through each other.
pub(super) fn met(
    a_before: TilePos,
    a_after: TilePos,
    b_before: TilePos,
    b_after: TilePos,
) -> bool {
    let overlap = a_after == b_after;
    let swapped = a_before == b_after && b_before == a_after;
    overlap || swapped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn travel_scales_with_tick_length() {
        assert_eq!(travel_px(352.0, 1000), 352.0);
        assert!((travel_px(352.0, 16) - 5.632).abs() < 1e-4);
        assert_eq!(travel_px(352.0, 0), 0.0);
    }

    #[test]
    fn meeting_covers_overlap_and_swap() {
        let a = TilePos::new(10, 10);
        let b = TilePos::new(11, 10);
        assert!(met(a, b, b, b));
        assert!(met(a, b, b, a));
        assert!(!met(a, a, b, b));
        assert!(!met(a, b, TilePos::new(12, 10), TilePos::new(13, 10)));
    }
}
