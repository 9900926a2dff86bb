//! Engine tuning loaded from JSON, with environment overrides for quick runs.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{FRIGHTENED_MS, STARTING_LIVES};
use crate::types::GhostId;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to parse config JSON: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

/// Condition that releases a ghost from the house.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HouseUnlock {
    Immediate,
    LevelTime { after_ms: u64 },
    DotsOrTime { dots: u32, after_ms: u64 },
}

impl HouseUnlock {
    pub fn is_met(self, level_ms: u64, dots_eaten: u32) -> bool {
        match self {
            Self::Immediate => true,
            Self::LevelTime { after_ms } => level_ms >= after_ms,
            Self::DotsOrTime { dots, after_ms } => dots_eaten >= dots || level_ms >= after_ms,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HouseUnlocks {
    pub leader: HouseUnlock,
    pub speedy: HouseUnlock,
    pub bashful: HouseUnlock,
    pub pokey: HouseUnlock,
}

impl HouseUnlocks {
    pub fn for_ghost(&self, id: GhostId) -> HouseUnlock {
        match id {
            GhostId::Leader => self.leader,
            GhostId::Speedy => self.speedy,
            GhostId::Bashful => self.bashful,
            GhostId::Pokey => self.pokey,
        }
    }
}

impl Default for HouseUnlocks {
    fn default() -> Self {
        Self {
            leader: HouseUnlock::Immediate,
            speedy: HouseUnlock::LevelTime { after_ms: 1_000 },
            bashful: HouseUnlock::DotsOrTime {
                dots: 30,
                after_ms: 6_000,
            },
            pokey: HouseUnlock::DotsOrTime {
                dots: 60,
                after_ms: 10_000,
            },
        }
    }
}

/// Pellets-remaining thresholds that speed up the leader ghost.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElroyThresholds {
    pub stage_one: u32,
    pub stage_two: u32,
}

impl Default for ElroyThresholds {
    fn default() -> Self {
        Self {
            stage_one: 20,
            stage_two: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub seed: u32,
    pub starting_level: u32,
    pub starting_lives: u32,
    pub frightened_ms: u64,
    /// Stop the scatter/chase clock while ghosts are frightened.
    pub pause_schedule_during_fright: bool,
    pub elroy: ElroyThresholds,
    pub unlock: HouseUnlocks,
    /// Alternate layouts cycled by the next-board command; empty uses the reference maze.
    pub boards: Vec<Vec<String>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            starting_level: 1,
            starting_lives: STARTING_LIVES,
            frightened_ms: FRIGHTENED_MS,
            pause_schedule_during_fright: false,
            elroy: ElroyThresholds::default(),
            unlock: HouseUnlocks::default(),
            boards: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(json)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// `PACKER_SEED` and `PACKER_LEVEL` win over file values when they parse.
    pub fn apply_env_overrides(&mut self) {
        if let Some(seed) = read_env("PACKER_SEED") {
            self.seed = seed;
        }
        if let Some(level) = read_env("PACKER_LEVEL") {
            self.starting_level = level;
        }
    }
}

fn read_env(key: &str) -> Option<u32> {
    std::env::var(key).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = EngineConfig::parse("{}").expect("empty config parses");
        assert_eq!(config.starting_lives, STARTING_LIVES);
        assert_eq!(config.frightened_ms, 6_000);
        assert_eq!(config.unlock, HouseUnlocks::default());
        assert!(config.boards.is_empty());
    }

    #[test]
    fn unlock_rules_parse_from_tagged_json() {
        let config = EngineConfig::parse(
            r#"{
                "frightened_ms": 4000,
                "unlock": {
                    "speedy": { "kind": "immediate" },
                    "pokey": { "kind": "dots_or_time", "dots": 5, "after_ms": 900 }
                }
            }"#,
        )
        .expect("config parses");
        assert_eq!(config.frightened_ms, 4_000);
        assert_eq!(config.unlock.speedy, HouseUnlock::Immediate);
        assert_eq!(
            config.unlock.for_ghost(GhostId::Pokey),
            HouseUnlock::DotsOrTime {
                dots: 5,
                after_ms: 900
            }
        );
        assert_eq!(config.unlock.bashful, HouseUnlocks::default().bashful);
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(
            EngineConfig::parse("{ seed: "),
            Err(ConfigError::Json { .. })
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let path = std::env::temp_dir()
            .join("packer-engine-missing-dir")
            .join("config.json");
        assert!(matches!(
            EngineConfig::from_file(&path),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn unlock_conditions_combine_dots_and_time() {
        let rule = HouseUnlock::DotsOrTime {
            dots: 30,
            after_ms: 6_000,
        };
        assert!(!rule.is_met(5_999, 29));
        assert!(rule.is_met(6_000, 0));
        assert!(rule.is_met(0, 30));
        assert!(!HouseUnlock::LevelTime { after_ms: 1_000 }.is_met(999, 500));
        assert!(HouseUnlock::Immediate.is_met(0, 0));
    }
}
