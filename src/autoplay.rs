//! Action selection for auto mode and for AI-controlled defenders.
//!
//! The policy picks one of `Attack`, `Block`, `Dodge`, `Charge` from a
//! weight table chosen by the hit-point situation:
//!
//! - **Press**: own HP high and the opponent nearly down, so attack
//! - **Defensive**: own HP low, so block and dodge gain weight
//! - **Neutral**: everything else, attack dominant
//!
//! Selection is pure with respect to the combatants and the injected RNG.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::combat::types::{Action, Combatant};
use crate::core::constants::*;

const CHOICES: [Action; 4] = [Action::Attack, Action::Block, Action::Dodge, Action::Charge];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posture {
    Press,
    Defensive,
    Neutral,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoPlayPolicy {
    pub press_weights: [u32; 4],
    pub defensive_weights: [u32; 4],
    pub neutral_weights: [u32; 4],
    pub high_hp_fraction: f64,
    pub low_hp_fraction: f64,
    pub finisher_fraction: f64,
}

impl Default for AutoPlayPolicy {
    fn default() -> Self {
        Self {
            press_weights: AUTOPLAY_PRESS_WEIGHTS,
            defensive_weights: AUTOPLAY_DEFENSIVE_WEIGHTS,
            neutral_weights: AUTOPLAY_NEUTRAL_WEIGHTS,
            high_hp_fraction: AUTOPLAY_HIGH_HP_FRACTION,
            low_hp_fraction: AUTOPLAY_LOW_HP_FRACTION,
            finisher_fraction: AUTOPLAY_FINISHER_FRACTION,
        }
    }
}

impl AutoPlayPolicy {
    pub fn posture(&self, me: &Combatant, opponent: &Combatant) -> Posture {
        let own = me.hp_fraction();
        if own < self.low_hp_fraction {
            Posture::Defensive
        } else if own >= self.high_hp_fraction && opponent.hp_fraction() <= self.finisher_fraction
        {
            Posture::Press
        } else {
            Posture::Neutral
        }
    }

    /// Weights in `[attack, block, dodge, charge]` order.
    ///
    /// Charge weight moves to attack once stacks are full.
    pub fn weights(&self, me: &Combatant, opponent: &Combatant, max_charge: u8) -> [u32; 4] {
        let mut weights = match self.posture(me, opponent) {
            Posture::Press => self.press_weights,
            Posture::Defensive => self.defensive_weights,
            Posture::Neutral => self.neutral_weights,
        };
        if me.charge_stacks >= max_charge {
            weights[0] += weights[3];
            weights[3] = 0;
        }
        weights
    }

    pub fn choose<R: Rng + ?Sized>(
        &self,
        me: &Combatant,
        opponent: &Combatant,
        max_charge: u8,
        rng: &mut R,
    ) -> Action {
        let weights = self.weights(me, opponent, max_charge);
        let action = match WeightedIndex::new(weights) {
            Ok(dist) => CHOICES[dist.sample(rng)],
            Err(_) => Action::Attack,
        };
        tracing::debug!(
            "auto-play for {}: {:?} (weights {:?})",
            me.name,
            action,
            weights
        );
        action
    }
}
