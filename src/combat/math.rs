//! Pure combat formulas shared by the resolver and the sweep.

use rand::Rng;

// Absorbs float noise such as 10 * 1.8 - 2 landing just under an integer.
const DAMAGE_EPSILON: f64 = 1e-9;

/// Attack power before crit and defense: `attack * (1 + bonus * stacks)`.
pub fn attack_power(attack: u32, charge_stacks: u8, bonus_per_stack: f64) -> f64 {
    attack as f64 * (1.0 + bonus_per_stack * charge_stacks as f64)
}

/// Crit probability, raised while the guaranteed-crit window is armed.
pub fn effective_crit_chance(base: f64, window_armed: bool, window_bonus: f64) -> f64 {
    let chance = if window_armed { base + window_bonus } else { base };
    chance.clamp(0.0, 1.0)
}

/// Rolls a probability in `[0, 1]`. 1.0 always succeeds, 0.0 never does.
pub fn roll_chance<R: Rng + ?Sized>(chance: f64, rng: &mut R) -> bool {
    if chance <= 0.0 {
        return false;
    }
    rng.gen::<f64>() < chance
}

/// Damage after defense, never below 1.
pub fn mitigate(power: f64, defense: u32) -> u32 {
    (power - defense as f64 + DAMAGE_EPSILON).floor().max(1.0) as u32
}

/// Scales a damage value and floors it.
pub fn scale(damage: u32, factor: f64) -> u32 {
    (damage as f64 * factor + DAMAGE_EPSILON).floor().max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_charged_attack_example() {
        let power = attack_power(10, 2, 0.5);
        assert_eq!(power, 20.0);
        assert_eq!(mitigate(power, 2), 18);
    }

    #[test]
    fn test_mitigate_has_floor_of_one() {
        assert_eq!(mitigate(5.0, 10), 1);
        assert_eq!(mitigate(0.0, 0), 1);
    }

    #[test]
    fn test_crit_window_caps_at_one() {
        assert_eq!(effective_crit_chance(0.1, false, 0.25), 0.1);
        assert!((effective_crit_chance(0.1, true, 0.25) - 0.35).abs() < 1e-12);
        assert_eq!(effective_crit_chance(0.9, true, 0.25), 1.0);
    }

    #[test]
    fn test_roll_chance_extremes() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(roll_chance(1.0, &mut rng));
            assert!(!roll_chance(0.0, &mut rng));
        }
    }

    #[test]
    fn test_scale_floors() {
        assert_eq!(scale(18, 0.35), 6);
        assert_eq!(scale(20, 1.2), 24);
        assert_eq!(scale(18, 0.15), 2);
    }
}
