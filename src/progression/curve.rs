//! Level curve, evolution stages and XP application.
//!
//! These are pure functions over `ProgressionRecord`; nothing here touches
//! storage or time.

use serde::Serialize;

use crate::core::constants::{BASE_XP_TO_NEXT, DEFAULT_CURVE_FACTOR, EVOLUTION_STAGES};

use super::types::{ProgressionRecord, XpChange};

// Absorbs representation error in products like 200 * 1.15 before flooring.
const FLOOR_EPSILON: f64 = 1e-9;

fn floor_scaled(value: u64, factor: f64) -> u64 {
    (value as f64 * factor + FLOOR_EPSILON).floor() as u64
}

// Records come from the provider unvalidated; a factor that cannot grow the
// curve is replaced by the default.
fn growth_factor(curve_factor: f64) -> f64 {
    if curve_factor.is_finite() && curve_factor > 1.0 {
        curve_factor
    } else {
        DEFAULT_CURVE_FACTOR
    }
}

/// Threshold of the next level; always strictly larger than `xp`.
fn next_threshold(xp: u64, factor: f64) -> u64 {
    floor_scaled(xp, factor).max(xp.saturating_add(1))
}

/// A level-gated tier that scales XP gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvolutionStage {
    pub min_level: u32,
    pub name: &'static str,
    pub xp_multiplier: f64,
}

/// Returns the highest evolution stage whose threshold is <= `level`.
pub fn evolution_stage(level: u32) -> EvolutionStage {
    let (min_level, name, xp_multiplier) = EVOLUTION_STAGES
        .iter()
        .rev()
        .find(|(min, _, _)| *min <= level)
        .copied()
        .unwrap_or(EVOLUTION_STAGES[0]);
    EvolutionStage {
        min_level,
        name,
        xp_multiplier,
    }
}

/// Scales a base XP reward by the stage multiplier and the player's bonus.
pub fn effective_xp(base_delta: u64, level: u32, player_bonus: f64) -> u64 {
    let stage = evolution_stage(level);
    (base_delta as f64 * stage.xp_multiplier * player_bonus)
        .round()
        .max(0.0) as u64
}

/// The XP curve shared by all players; the growth factor is per record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressionCurve {
    pub base_xp: u64,
}

impl Default for ProgressionCurve {
    fn default() -> Self {
        Self {
            base_xp: BASE_XP_TO_NEXT,
        }
    }
}

impl ProgressionCurve {
    pub fn new(base_xp: u64) -> Self {
        Self { base_xp }
    }

    /// XP needed to advance from `level` to `level + 1`.
    ///
    /// Built step by step so that `xp_to_next(l + 1) == floor(xp_to_next(l) * factor)`
    /// holds exactly for every level. Factors at or below 1.0 use the default
    /// factor, and each level costs at least one XP more than the last.
    pub fn xp_to_next(&self, level: u32, curve_factor: f64) -> u64 {
        let factor = growth_factor(curve_factor);
        let mut xp = self.base_xp.max(1);
        for _ in 1..level.max(1) {
            xp = next_threshold(xp, factor);
        }
        xp
    }

    /// Applies a signed XP delta, levelling up or down as many times as needed.
    pub fn apply_xp_delta(&self, record: &ProgressionRecord, delta: i64) -> XpChange {
        let mut next = record.clone();
        let start_level = record.level.max(1);
        let factor = growth_factor(record.curve_factor);

        next.xp_total = (record.xp_total as i128 + delta as i128).max(0) as u64;
        next.level = start_level;
        if next.xp_to_next == 0 {
            next.xp_to_next = self.xp_to_next(next.level, next.curve_factor);
        }

        let mut cur = record.xp_current as i128 + delta as i128;

        while cur >= next.xp_to_next as i128 {
            cur -= next.xp_to_next as i128;
            next.level += 1;
            next.xp_to_next = next_threshold(next.xp_to_next, factor);
        }

        while cur < 0 && next.level > 1 {
            next.level -= 1;
            next.xp_to_next = self.xp_to_next(next.level, next.curve_factor);
            cur += next.xp_to_next as i128;
        }

        next.xp_current = cur.clamp(0, next.xp_to_next as i128 - 1) as u64;

        let levels_changed = next.level as i64 - start_level as i64;
        XpChange {
            record: next,
            leveled_up: levels_changed > 0,
            leveled_down: levels_changed < 0,
            levels_changed: levels_changed as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_at(level: u32, xp_current: u64, curve: &ProgressionCurve) -> ProgressionRecord {
        ProgressionRecord {
            xp_total: 10_000,
            xp_current,
            xp_to_next: curve.xp_to_next(level, 1.15),
            level,
            curve_factor: 1.15,
            xp_bonus: 1.0,
        }
    }

    #[test]
    fn test_xp_to_next_recurrence() {
        let curve = ProgressionCurve::default();
        for factor in [1.05, 1.15, 1.3, 2.0] {
            for level in 1..60 {
                let here = curve.xp_to_next(level, factor);
                let next = curve.xp_to_next(level + 1, factor);
                assert_eq!(next, floor_scaled(here, factor), "level {level} factor {factor}");
            }
        }
    }

    #[test]
    fn test_xp_to_next_base() {
        let curve = ProgressionCurve::default();
        assert_eq!(curve.xp_to_next(1, 1.15), 200);
        assert_eq!(curve.xp_to_next(2, 1.15), 230);
        assert_eq!(curve.xp_to_next(3, 1.15), 264);
    }

    #[test]
    fn test_level_up_example() {
        let curve = ProgressionCurve::default();
        let record = ProgressionRecord::new(1.15);
        let change = curve.apply_xp_delta(&record, 250);
        assert_eq!(change.record.level, 2);
        assert_eq!(change.record.xp_current, 50);
        assert_eq!(change.record.xp_to_next, 230);
        assert_eq!(change.record.xp_total, 250);
        assert!(change.leveled_up);
        assert_eq!(change.levels_changed, 1);
    }

    #[test]
    fn test_large_delta_crosses_multiple_levels() {
        let curve = ProgressionCurve::default();
        let record = ProgressionRecord::new(1.15);
        // 200 + 230 + 264 = 694
        let change = curve.apply_xp_delta(&record, 700);
        assert_eq!(change.record.level, 4);
        assert_eq!(change.record.xp_current, 6);
        assert_eq!(change.levels_changed, 3);
    }

    #[test]
    fn test_negative_delta_levels_down() {
        let curve = ProgressionCurve::default();
        let record = record_at(3, 10, &curve);
        let change = curve.apply_xp_delta(&record, -50);
        // 10 - 50 = -40, back to level 2 with 230 - 40
        assert_eq!(change.record.level, 2);
        assert_eq!(change.record.xp_current, 190);
        assert_eq!(change.record.xp_to_next, 230);
        assert!(change.leveled_down);
        assert_eq!(change.levels_changed, -1);
    }

    #[test]
    fn test_level_floors_at_one() {
        let curve = ProgressionCurve::default();
        let record = record_at(2, 5, &curve);
        let change = curve.apply_xp_delta(&record, -100_000);
        assert_eq!(change.record.level, 1);
        assert_eq!(change.record.xp_current, 0);
        assert_eq!(change.record.xp_to_next, 200);
        assert_eq!(change.record.xp_total, 0);
    }

    #[test]
    fn test_xp_current_always_in_range() {
        let curve = ProgressionCurve::default();
        let mut record = ProgressionRecord::new(1.15);
        for delta in [500, -30, 1_000, -2_000, 17, 99_999, -5, -400_000, 3] {
            record = curve.apply_xp_delta(&record, delta).record;
            assert!(record.xp_current < record.xp_to_next);
            assert!(record.level >= 1);
        }
    }

    #[test]
    fn test_non_growing_factor_uses_default_curve() {
        let curve = ProgressionCurve::default();
        for factor in [1.0, 0.5, -3.0, f64::NAN] {
            assert_eq!(curve.xp_to_next(2, factor), 230, "factor {factor}");
            let change = curve.apply_xp_delta(&ProgressionRecord::new(factor), 250);
            assert_eq!(change.record.level, 2);
            assert_eq!(change.record.xp_current, 50);
            assert_eq!(change.record.xp_to_next, 230);
        }
    }

    #[test]
    fn test_barely_growing_factor_still_levels() {
        let curve = ProgressionCurve::default();
        let factor = 1.000_000_1;
        let change = curve.apply_xp_delta(&ProgressionRecord::new(factor), 1_000_000);
        let record = change.record;
        assert!(record.level > 1_000);
        // Each level costs exactly one more XP than the previous one here
        assert_eq!(record.xp_to_next, 200 + (record.level as u64 - 1));
        assert_eq!(record.xp_to_next, curve.xp_to_next(record.level, factor));
        assert!(record.xp_current < record.xp_to_next);

        let back = curve.apply_xp_delta(&record, -1_000_000);
        assert_eq!(back.record.level, 1);
        assert_eq!(back.record.xp_current, 0);
    }

    #[test]
    fn test_evolution_stage_lookup() {
        assert_eq!(evolution_stage(1).name, "Hatchling");
        assert_eq!(evolution_stage(9).name, "Hatchling");
        assert_eq!(evolution_stage(10).name, "Fledgling");
        assert_eq!(evolution_stage(44).name, "Adept");
        assert_eq!(evolution_stage(500).name, "Mythic");
        assert_eq!(evolution_stage(0).name, "Hatchling");
    }

    #[test]
    fn test_effective_xp_composes_multipliers() {
        assert_eq!(effective_xp(100, 1, 1.0), 100);
        assert_eq!(effective_xp(100, 10, 1.0), 110);
        // 100 * 1.25 * 1.5 = 187.5
        assert_eq!(effective_xp(100, 25, 1.5), 188);
    }
}
