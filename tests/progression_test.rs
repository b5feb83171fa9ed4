//! Integration test: XP curve and evolution stages
//!
//! Applies long random sequences of XP gains and losses and checks the record
//! invariants after every step.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use skirmish::progression::{effective_xp, evolution_stage, ProgressionCurve, ProgressionRecord};

#[test]
fn test_threshold_recurrence_holds_for_all_levels() {
    let curve = ProgressionCurve::default();
    for factor in [1.05, 1.1, 1.15, 1.2, 1.5] {
        for level in 1..80 {
            let this = curve.xp_to_next(level, factor);
            let next = curve.xp_to_next(level + 1, factor);
            assert_eq!(
                next,
                ((this as f64 * factor) + 1e-9).floor() as u64,
                "factor {factor} level {level}"
            );
        }
    }
}

#[test]
fn test_documented_level_up_example() {
    let curve = ProgressionCurve::default();
    let change = curve.apply_xp_delta(&ProgressionRecord::default(), 250);
    assert_eq!(change.record.level, 2);
    assert_eq!(change.record.xp_current, 50);
    assert_eq!(change.record.xp_to_next, 230);
    assert!(change.leveled_up);
    assert_eq!(change.levels_changed, 1);
}

#[test]
fn test_random_deltas_keep_record_consistent() {
    let curve = ProgressionCurve::default();
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let mut record = ProgressionRecord::new(1.15);

    for step in 0..5_000 {
        let delta: i64 = if rng.gen_bool(0.7) {
            rng.gen_range(0..1_500)
        } else {
            -rng.gen_range(0..2_000)
        };
        let before = record.clone();
        let change = curve.apply_xp_delta(&record, delta);
        record = change.record;

        assert!(record.level >= 1, "step {step}");
        assert!(record.xp_current < record.xp_to_next, "step {step}");
        assert_eq!(
            record.xp_to_next,
            curve.xp_to_next(record.level, record.curve_factor),
            "step {step}"
        );
        let expected_total = (before.xp_total as i64 + delta).max(0) as u64;
        assert_eq!(record.xp_total, expected_total, "step {step}");
        assert_eq!(
            change.levels_changed,
            record.level as i32 - before.level as i32
        );
    }
}

#[test]
fn test_single_event_can_cross_many_levels() {
    let curve = ProgressionCurve::default();
    let change = curve.apply_xp_delta(&ProgressionRecord::default(), 100_000);
    assert!(change.levels_changed > 10);

    let back = curve.apply_xp_delta(&change.record, -1_000_000);
    assert_eq!(back.record.level, 1);
    assert_eq!(back.record.xp_current, 0);
    assert_eq!(back.record.xp_total, 0);
    assert!(back.leveled_down);
}

#[test]
fn test_stage_multiplier_scales_rewards() {
    assert_eq!(evolution_stage(1).name, "Hatchling");
    assert_eq!(evolution_stage(44).name, "Adept");
    assert_eq!(evolution_stage(45).name, "Veteran");
    assert_eq!(evolution_stage(500).name, "Mythic");

    assert_eq!(effective_xp(100, 1, 1.0), 100);
    assert_eq!(effective_xp(100, 45, 1.0), 140);
    assert_eq!(effective_xp(100, 45, 2.0), 280);
    assert!(effective_xp(75, 70, 1.0) > effective_xp(75, 69, 1.0));
}
