//! Engine configuration.
//!
//! Every field has a default from `core::constants`; JSON files may override
//! any subset of them.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::*;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Combat formula tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    /// Attack power bonus per stored charge stack
    pub charge_bonus_per_stack: f64,
    pub max_charge_stacks: u8,
    pub crit_multiplier: f64,
    /// Extra crit chance on the attack right after a successful dodge
    pub crit_window_bonus: f64,
    /// Fraction of damage that gets through a normal block
    pub block_damage_factor: f64,
    /// Fraction of would-be damage reflected by a perfect block
    pub perfect_block_reflect: f64,
    /// Extra damage taken after a failed dodge
    pub failed_dodge_penalty: f64,
    pub dodge_counter_damage: u32,
    /// Attack fraction used when the sweep acts for an idle participant
    pub timeout_attack_factor: f64,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            charge_bonus_per_stack: CHARGE_BONUS_PER_STACK,
            max_charge_stacks: MAX_CHARGE_STACKS,
            crit_multiplier: CRIT_MULTIPLIER,
            crit_window_bonus: CRIT_WINDOW_BONUS,
            block_damage_factor: BLOCK_DAMAGE_FACTOR,
            perfect_block_reflect: PERFECT_BLOCK_REFLECT,
            failed_dodge_penalty: FAILED_DODGE_PENALTY,
            dodge_counter_damage: DODGE_COUNTER_DAMAGE,
            timeout_attack_factor: TIMEOUT_ATTACK_FACTOR,
        }
    }
}

/// Configuration for an engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub base_xp_to_next: u64,
    /// Growth factor of the level curve, must be > 1.0
    pub curve_factor: f64,
    /// Rounds after which a session ends in a draw
    pub max_turns: u32,
    pub event_log_capacity: usize,
    pub elo_k_factor: f64,
    pub steal_percent: f64,
    pub steal_floor: u64,
    pub loss_transfer_percent: f64,
    pub shield_duration_seconds: i64,
    pub sync_turn_window_seconds: i64,
    pub sweep_interval_seconds: u64,
    pub combat: CombatTuning,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_xp_to_next: BASE_XP_TO_NEXT,
            curve_factor: DEFAULT_CURVE_FACTOR,
            max_turns: MAX_TURNS,
            event_log_capacity: EVENT_LOG_CAPACITY,
            elo_k_factor: ELO_K_FACTOR,
            steal_percent: STEAL_PERCENT,
            steal_floor: STEAL_FLOOR,
            loss_transfer_percent: LOSS_TRANSFER_PERCENT,
            shield_duration_seconds: SHIELD_DURATION_SECONDS,
            sync_turn_window_seconds: SYNC_TURN_WINDOW_SECONDS,
            sweep_interval_seconds: SWEEP_INTERVAL_SECONDS,
            combat: CombatTuning::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Quick config for tests that need short sessions
    pub fn short_sessions(max_turns: u32) -> Self {
        Self {
            max_turns,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.curve_factor <= 1.0 || !self.curve_factor.is_finite() {
            return Err(invalid("curve_factor", "must be a finite value > 1.0"));
        }
        if self.base_xp_to_next == 0 {
            return Err(invalid("base_xp_to_next", "must be > 0"));
        }
        if self.max_turns == 0 {
            return Err(invalid("max_turns", "must be > 0"));
        }
        if !(MIN_EVENT_LOG_CAPACITY..=MAX_EVENT_LOG_CAPACITY).contains(&self.event_log_capacity) {
            return Err(invalid(
                "event_log_capacity",
                format!(
                    "must be within {}..={}",
                    MIN_EVENT_LOG_CAPACITY, MAX_EVENT_LOG_CAPACITY
                ),
            ));
        }
        if self.sweep_interval_seconds == 0 {
            return Err(invalid("sweep_interval_seconds", "must be > 0"));
        }
        if self.sync_turn_window_seconds <= 0 {
            return Err(invalid("sync_turn_window_seconds", "must be > 0"));
        }
        if self.shield_duration_seconds < 0 {
            return Err(invalid("shield_duration_seconds", "must be >= 0"));
        }

        let fractions = [
            ("steal_percent", self.steal_percent),
            ("loss_transfer_percent", self.loss_transfer_percent),
            ("combat.block_damage_factor", self.combat.block_damage_factor),
            ("combat.perfect_block_reflect", self.combat.perfect_block_reflect),
            ("combat.crit_window_bonus", self.combat.crit_window_bonus),
            ("combat.timeout_attack_factor", self.combat.timeout_attack_factor),
        ];
        for (field, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, "must be within 0.0..=1.0"));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.base_xp_to_next, 200);
        assert_eq!(config.combat.max_charge_stacks, 3);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{"max_turns": 60, "combat": {"crit_multiplier": 2.0}}"#)
                .unwrap();
        assert_eq!(config.max_turns, 60);
        assert_eq!(config.combat.crit_multiplier, 2.0);
        assert_eq!(config.combat.block_damage_factor, BLOCK_DAMAGE_FACTOR);
        assert_eq!(config.curve_factor, DEFAULT_CURVE_FACTOR);
    }

    #[test]
    fn test_rejects_flat_curve() {
        let err = EngineConfig::from_json_str(r#"{"curve_factor": 1.0}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "curve_factor",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_log_capacity_out_of_range() {
        let config = EngineConfig {
            event_log_capacity: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            EngineConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"steal_floor": 50}"#).unwrap();
        let config = EngineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.steal_floor, 50);
    }
}
