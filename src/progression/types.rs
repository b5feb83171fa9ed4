use serde::{Deserialize, Serialize};

use crate::core::constants::{BASE_XP_TO_NEXT, DEFAULT_CURVE_FACTOR, STARTING_LEVEL};

use super::curve::{evolution_stage, EvolutionStage};

fn default_xp_bonus() -> f64 {
    1.0
}

/// Long-lived XP state of one player.
///
/// IMPORTANT: new fields need `#[serde(default)]` so records written by older
/// builds still deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionRecord {
    /// Lifetime XP, never below 0
    pub xp_total: u64,
    /// Progress inside the current level, always < `xp_to_next`
    pub xp_current: u64,
    pub xp_to_next: u64,
    pub level: u32,
    /// Per-player curve growth, > 1.0
    pub curve_factor: f64,
    /// Per-player multiplier applied on top of the evolution stage multiplier
    #[serde(default = "default_xp_bonus")]
    pub xp_bonus: f64,
}

impl Default for ProgressionRecord {
    fn default() -> Self {
        Self::new(DEFAULT_CURVE_FACTOR)
    }
}

impl ProgressionRecord {
    pub fn new(curve_factor: f64) -> Self {
        Self::with_base(BASE_XP_TO_NEXT, curve_factor)
    }

    pub fn with_base(base_xp_to_next: u64, curve_factor: f64) -> Self {
        Self {
            xp_total: 0,
            xp_current: 0,
            xp_to_next: base_xp_to_next,
            level: STARTING_LEVEL,
            curve_factor,
            xp_bonus: default_xp_bonus(),
        }
    }

    pub fn evolution_stage(&self) -> EvolutionStage {
        evolution_stage(self.level)
    }
}

/// Result of applying an XP delta to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XpChange {
    pub record: ProgressionRecord,
    pub leveled_up: bool,
    pub leveled_down: bool,
    /// Signed number of levels gained (negative when levels were lost)
    pub levels_changed: i32,
}

impl XpChange {
    /// True if the change moved the player into a different evolution stage.
    pub fn evolved_from(&self, before: &ProgressionRecord) -> bool {
        self.record.evolution_stage().name != before.evolution_stage().name
    }
}
