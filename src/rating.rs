//! Elo ratings, PvP XP transfer and post-loss shields.

use serde::{Deserialize, Serialize};

use crate::core::config::EngineConfig;
use crate::core::constants::{ELO_SCALE, RATING_TIERS, STARTING_ELO};

/// PvP standing of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub elo: i64,
    pub wins: u32,
    pub losses: u32,
    /// Unix seconds; the holder cannot be targeted while `now < shield_until`
    pub shield_until: i64,
}

impl Default for RatingRecord {
    fn default() -> Self {
        Self {
            elo: STARTING_ELO,
            wins: 0,
            losses: 0,
            shield_until: 0,
        }
    }
}

impl RatingRecord {
    pub fn is_shielded(&self, now: i64) -> bool {
        now < self.shield_until
    }

    pub fn tier(&self) -> &'static str {
        rating_tier(self.elo)
    }
}

/// Display bucket for an Elo value.
pub fn rating_tier(elo: i64) -> &'static str {
    RATING_TIERS
        .iter()
        .rev()
        .find(|(min, _)| *min <= elo)
        .map(|(_, name)| *name)
        .unwrap_or(RATING_TIERS[0].1)
}

/// Probability that a player rated `rating` beats one rated `opponent`.
pub fn expected_score(rating: i64, opponent: i64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) as f64 / ELO_SCALE))
}

/// Rounded Elo swing for a decisive result, applied +Δ to the winner and -Δ to the loser.
pub fn elo_delta(winner_elo: i64, loser_elo: i64, k: f64) -> i64 {
    (k * (1.0 - expected_score(winner_elo, loser_elo))).round() as i64
}

/// Amount of XP moved between attacker and defender after a PvP result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum XpTransfer {
    /// Attacker won and takes XP from the defender
    Stolen(u64),
    /// Attacker lost and pays XP to the defender
    Forfeited(u64),
}

impl XpTransfer {
    pub fn amount(&self) -> u64 {
        match self {
            XpTransfer::Stolen(xp) | XpTransfer::Forfeited(xp) => *xp,
        }
    }
}

/// Parameters of the PvP settlement, usually taken from `EngineConfig`.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingEngine {
    pub k_factor: f64,
    pub steal_percent: f64,
    pub steal_floor: u64,
    pub loss_transfer_percent: f64,
    pub shield_duration_seconds: i64,
}

impl Default for RatingEngine {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Rating changes for one decisive PvP session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSettlement {
    pub winner: RatingRecord,
    pub loser: RatingRecord,
    pub elo_delta: i64,
}

impl RatingEngine {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            k_factor: config.elo_k_factor,
            steal_percent: config.steal_percent,
            steal_floor: config.steal_floor,
            loss_transfer_percent: config.loss_transfer_percent,
            shield_duration_seconds: config.shield_duration_seconds,
        }
    }

    /// Applies the Elo swing, win/loss counters and the loser's shield.
    pub fn settle(&self, winner: &RatingRecord, loser: &RatingRecord, now: i64) -> RatingSettlement {
        let delta = elo_delta(winner.elo, loser.elo, self.k_factor);

        let mut winner = winner.clone();
        winner.elo += delta;
        winner.wins += 1;

        let mut loser = loser.clone();
        loser.elo -= delta;
        loser.losses += 1;
        loser.shield_until = loser.shield_until.max(now + self.shield_duration_seconds);

        RatingSettlement {
            winner,
            loser,
            elo_delta: delta,
        }
    }

    /// XP moved from loser to winner. Never exceeds what the payer owns, so
    /// the total XP of both players is conserved.
    pub fn xp_transfer(&self, attacker_won: bool, attacker_xp: u64, defender_xp: u64) -> XpTransfer {
        if attacker_won {
            let steal = ((defender_xp as f64 * self.steal_percent).round() as u64).max(self.steal_floor);
            XpTransfer::Stolen(steal.min(defender_xp))
        } else {
            let paid = (attacker_xp as f64 * self.loss_transfer_percent).round() as u64;
            XpTransfer::Forfeited(paid.min(attacker_xp))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rated(elo: i64) -> RatingRecord {
        RatingRecord {
            elo,
            ..Default::default()
        }
    }

    #[test]
    fn test_equal_ratings_swing_sixteen() {
        assert_eq!(elo_delta(1000, 1000, 32.0), 16);
        let engine = RatingEngine::default();
        let result = engine.settle(&rated(1000), &rated(1000), 0);
        assert_eq!(result.winner.elo, 1016);
        assert_eq!(result.loser.elo, 984);
        assert_eq!(result.winner.wins, 1);
        assert_eq!(result.loser.losses, 1);
    }

    #[test]
    fn test_settlement_is_zero_sum() {
        let engine = RatingEngine::default();
        for (w, l) in [(1000, 1400), (1500, 900), (1200, 1210), (700, 2000)] {
            let result = engine.settle(&rated(w), &rated(l), 0);
            assert_eq!(result.winner.elo - w, -(result.loser.elo - l));
        }
    }

    #[test]
    fn test_upset_pays_more_than_expected_win() {
        assert!(elo_delta(1000, 1400, 32.0) > elo_delta(1400, 1000, 32.0));
        assert_eq!(elo_delta(1000, 1400, 32.0), 29);
        assert_eq!(elo_delta(1400, 1000, 32.0), 3);
    }

    #[test]
    fn test_loser_gets_shield() {
        let engine = RatingEngine::default();
        let result = engine.settle(&rated(1000), &rated(1000), 5_000);
        assert_eq!(result.loser.shield_until, 5_000 + 3 * 60 * 60);
        assert!(result.loser.is_shielded(5_001));
        assert!(!result.loser.is_shielded(5_000 + 3 * 60 * 60));
        assert_eq!(result.winner.shield_until, 0);
    }

    #[test]
    fn test_steal_uses_percent_or_floor() {
        let engine = RatingEngine::default();
        assert_eq!(engine.xp_transfer(true, 0, 10_000), XpTransfer::Stolen(700));
        assert_eq!(engine.xp_transfer(true, 0, 100), XpTransfer::Stolen(20));
        // Cannot take more than the defender owns
        assert_eq!(engine.xp_transfer(true, 0, 12), XpTransfer::Stolen(12));
    }

    #[test]
    fn test_failed_raid_forfeits_smaller_share() {
        let engine = RatingEngine::default();
        assert_eq!(engine.xp_transfer(false, 10_000, 0), XpTransfer::Forfeited(500));
        assert_eq!(engine.xp_transfer(false, 0, 0), XpTransfer::Forfeited(0));
    }

    #[test]
    fn test_rating_tiers() {
        assert_eq!(rating_tier(500), "Bronze");
        assert_eq!(rating_tier(1000), "Silver");
        assert_eq!(rating_tier(1100), "Gold");
        assert_eq!(rating_tier(1750), "Master");
        assert_eq!(RatingRecord::default().tier(), "Silver");
    }
}
