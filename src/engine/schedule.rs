use crate::constants::{FLICKER_WINDOW_MS, MODE_SCHEDULE};
use crate::types::{FrightenedVisual, GhostMode};

/// Scatter/Chase mode for an absolute level time.
pub fn mode_at(level_ms: u64) -> GhostMode {
    let mut boundary = 0u64;
    for (mode, duration_ms) in MODE_SCHEDULE {
        boundary += duration_ms;
        if level_ms < boundary {
            return mode;
        }
    }
    GhostMode::Chase
}

/// Blue for most of the countdown, alternating blue/white every 250 ms near expiry.
pub fn fright_visual(remaining_ms: u64) -> FrightenedVisual {
    if remaining_ms > FLICKER_WINDOW_MS {
        return FrightenedVisual::Blue;
    }
    let phase = ((remaining_ms + 2) / 5) % 100;
    if phase > 49 {
        FrightenedVisual::Blue
    } else {
        FrightenedVisual::White
    }
}

#[derive(Clone, Debug)]
pub struct ModeScheduler {
    level_ms: u64,
    fright_remaining_ms: u64,
    pause_during_fright: bool,
}

/// What changed during one scheduler tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScheduleTick {
    pub mode_changed: bool,
    pub fright_expired: bool,
}

impl ModeScheduler {
    pub fn new(pause_during_fright: bool) -> Self {
        Self {
            level_ms: 0,
            fright_remaining_ms: 0,
            pause_during_fright,
        }
    }

    pub fn level_ms(&self) -> u64 {
        self.level_ms
    }

    pub fn mode(&self) -> GhostMode {
        mode_at(self.level_ms)
    }

    pub fn frightened(&self) -> bool {
        self.fright_remaining_ms > 0
    }

    pub fn fright_remaining_ms(&self) -> u64 {
        self.fright_remaining_ms
    }

    pub fn visual(&self) -> Option<FrightenedVisual> {
        self.frightened()
            .then(|| fright_visual(self.fright_remaining_ms))
    }

    /// Starts (or restarts) the frightened countdown.
    pub fn arm(&mut self, duration_ms: u64) {
        self.fright_remaining_ms = duration_ms;
    }

    pub fn tick(&mut self, dt_ms: u64) -> ScheduleTick {
        let mut out = ScheduleTick::default();
        let was_frightened = self.frightened();
        if was_frightened {
            self.fright_remaining_ms = self.fright_remaining_ms.saturating_sub(dt_ms);
            out.fright_expired = !self.frightened();
        }
        if was_frightened && self.pause_during_fright {
            return out;
        }
        let before = self.mode();
        self.level_ms = self.level_ms.saturating_add(dt_ms);
        out.mode_changed = before != self.mode();
        out
    }

    /// Back to the first scatter phase, as after a lost life or a new level.
    pub fn restart_level(&mut self) {
        self.level_ms = 0;
        self.fright_remaining_ms = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_boundaries_follow_phase_table() {
        assert_eq!(mode_at(0), GhostMode::Scatter);
        assert_eq!(mode_at(6_900), GhostMode::Scatter);
        assert_eq!(mode_at(7_000), GhostMode::Chase);
        assert_eq!(mode_at(7_100), GhostMode::Chase);
        assert_eq!(mode_at(26_999), GhostMode::Chase);
        assert_eq!(mode_at(27_000), GhostMode::Scatter);
        assert_eq!(mode_at(33_900), GhostMode::Scatter);
        assert_eq!(mode_at(34_100), GhostMode::Chase);
        assert_eq!(mode_at(54_000), GhostMode::Scatter);
        assert_eq!(mode_at(61_000), GhostMode::Chase);
        assert_eq!(mode_at(80_999), GhostMode::Chase);
        assert_eq!(mode_at(81_000), GhostMode::Scatter);
        assert_eq!(mode_at(85_999), GhostMode::Scatter);
        assert_eq!(mode_at(86_000), GhostMode::Chase);
        assert_eq!(mode_at(10_000_000), GhostMode::Chase);
    }

    #[test]
    fn visual_is_solid_blue_until_the_last_two_seconds() {
        for remaining in (2_001..=6_000).step_by(7) {
            assert_eq!(fright_visual(remaining), FrightenedVisual::Blue);
        }
        assert_eq!(fright_visual(2_000), FrightenedVisual::White);
        assert_eq!(fright_visual(1_900), FrightenedVisual::Blue);
        assert_eq!(fright_visual(1_700), FrightenedVisual::White);
        assert_eq!(fright_visual(1_400), FrightenedVisual::Blue);
    }

    #[test]
    fn flicker_alternates_on_a_fixed_period() {
        let mut flips = 0;
        let mut previous = fright_visual(2_000);
        for remaining in (0..2_000).rev() {
            let current = fright_visual(remaining);
            if current != previous {
                flips += 1;
            }
            previous = current;
        }
        assert_eq!(flips, 8);
    }

    #[test]
    fn fright_countdown_expires_once() {
        let mut scheduler = ModeScheduler::new(false);
        scheduler.arm(6_000);
        let mut expirations = 0;
        for _ in 0..400 {
            if scheduler.tick(16).fright_expired {
                expirations += 1;
            }
        }
        assert_eq!(expirations, 1);
        assert!(!scheduler.frightened());
        assert_eq!(scheduler.level_ms(), 6_400);
    }

    #[test]
    fn level_clock_keeps_running_through_fright_by_default() {
        let mut scheduler = ModeScheduler::new(false);
        for _ in 0..6 {
            scheduler.tick(1_000);
        }
        scheduler.arm(6_000);
        let changed = scheduler.tick(1_000);
        assert!(changed.mode_changed);
        assert_eq!(scheduler.mode(), GhostMode::Chase);
    }

    #[test]
    fn paused_clock_resumes_from_its_absolute_position() {
        let mut scheduler = ModeScheduler::new(true);
        scheduler.tick(6_500);
        scheduler.arm(2_000);
        scheduler.tick(1_000);
        scheduler.tick(1_000);
        assert_eq!(scheduler.level_ms(), 6_500);
        assert_eq!(scheduler.mode(), GhostMode::Scatter);
        assert!(scheduler.tick(600).mode_changed);
        assert_eq!(scheduler.level_ms(), 7_100);
    }
}
