use rand::Rng;

use crate::autoplay::AutoPlayPolicy;
use crate::core::config::CombatTuning;
use crate::core::error::{EngineError, Result};

use super::math::{attack_power, effective_crit_chance, mitigate, roll_chance, scale};
use super::types::{
    Action, CombatEvent, EndReason, Guard, Mode, ParticipantId, Session, Side,
};

/// Turn evaluator for every session mode.
///
/// Mutates the session in place and returns the events produced by the call.
/// In PvE and raid mode one call resolves the player's action plus the AI
/// reply; in synchronous mode one call resolves exactly one side's action.
#[derive(Debug, Clone)]
pub struct CombatResolver<'a> {
    tuning: &'a CombatTuning,
    policy: &'a AutoPlayPolicy,
    max_turns: u32,
}

impl<'a> CombatResolver<'a> {
    pub fn new(tuning: &'a CombatTuning, policy: &'a AutoPlayPolicy, max_turns: u32) -> Self {
        Self {
            tuning,
            policy,
            max_turns,
        }
    }

    pub fn resolve<R: Rng + ?Sized>(
        &self,
        session: &mut Session,
        actor: &ParticipantId,
        action: Action,
        rng: &mut R,
    ) -> Result<Vec<CombatEvent>> {
        if session.ended {
            return Err(EngineError::invalid_action("session has already ended"));
        }
        let side = session
            .side_of(actor)
            .ok_or_else(|| EngineError::invalid_action(format!("{} is not in this session", actor)))?;
        if session.is_ai_controlled(side) {
            return Err(EngineError::invalid_action(format!(
                "{} is controlled by the defender AI",
                actor
            )));
        }
        if session.mode == Mode::PvPSync && session.turn_owner != Some(side) {
            return Err(EngineError::invalid_action("it is not your turn"));
        }

        let turn = session.turn;
        let mut events = Vec::new();
        self.apply_action(session, side, action, rng, &mut events);

        match session.mode {
            Mode::PvPSync => self.hand_over(session, side, &mut events),
            Mode::PvE | Mode::PvPAsync => {
                if !session.ended {
                    let reply = self.policy.choose(
                        session.combatant(Side::B),
                        session.combatant(Side::A),
                        self.tuning.max_charge_stacks,
                        rng,
                    );
                    self.apply_action(session, Side::B, reply, rng, &mut events);
                }
                self.finish_round(session, &mut events);
            }
        }

        self.record(session, turn, &events);
        tracing::debug!(
            "session {} turn {}: {} {:?} -> {} events",
            session.id,
            turn,
            actor,
            action,
            events.len()
        );
        Ok(events)
    }

    /// Weaker fixed strike for an idle synchronous participant, then hand over.
    pub fn resolve_timeout(&self, session: &mut Session) -> Vec<CombatEvent> {
        let mut events = Vec::new();
        let Some(side) = session.turn_owner else {
            return events;
        };
        if session.ended || session.mode != Mode::PvPSync {
            return events;
        }

        let turn = session.turn;
        let attacker = session.combatant(side);
        let defender = session.combatant(side.opponent());
        let power = scale(attacker.attack, self.tuning.timeout_attack_factor);
        let damage = mitigate(power as f64, defender.defense);

        session.combatant_mut(side).crit_window = false;
        events.push(CombatEvent::TimeoutStrike {
            actor: side,
            damage,
        });
        self.deal_damage(session, side.opponent(), damage, &mut events);
        session.combatant_mut(side.opponent()).clear_guard();

        self.hand_over(session, side, &mut events);
        self.record(session, turn, &events);
        events
    }

    fn apply_action<R: Rng + ?Sized>(
        &self,
        session: &mut Session,
        side: Side,
        action: Action,
        rng: &mut R,
        events: &mut Vec<CombatEvent>,
    ) {
        if session.ended {
            return;
        }

        match action {
            Action::Attack => self.attack(session, side, rng, events),
            Action::Block => {
                let me = session.combatant_mut(side);
                me.is_dodging = false;
                me.is_blocking = true;
                me.perfect_block = me.charge_stacks >= 1;
                let guard = if me.perfect_block {
                    Guard::PerfectBlock
                } else {
                    Guard::Block
                };
                events.push(CombatEvent::GuardRaised { actor: side, guard });
            }
            Action::Dodge => {
                let me = session.combatant_mut(side);
                me.is_blocking = false;
                me.perfect_block = false;
                me.is_dodging = true;
                events.push(CombatEvent::GuardRaised {
                    actor: side,
                    guard: Guard::Dodge,
                });
            }
            Action::Charge => {
                let max = self.tuning.max_charge_stacks;
                let me = session.combatant_mut(side);
                me.charge_stacks = me.charge_stacks.saturating_add(1).min(max);
                events.push(CombatEvent::Charged {
                    actor: side,
                    stacks: me.charge_stacks,
                });
            }
            Action::Surrender => {
                events.push(CombatEvent::Surrendered { actor: side });
                session.finish(Some(side.opponent()), EndReason::Surrender);
                return;
            }
        }

        // The crit window only covers the action right after the dodge, and the
        // opponent's guard lapses once this side has had its turn.
        session.combatant_mut(side).crit_window = false;
        session.combatant_mut(side.opponent()).clear_guard();
    }

    fn attack<R: Rng + ?Sized>(
        &self,
        session: &mut Session,
        side: Side,
        rng: &mut R,
        events: &mut Vec<CombatEvent>,
    ) {
        let tuning = self.tuning;
        let target = side.opponent();

        let attacker = session.combatant_mut(side);
        let charge_consumed = attacker.charge_stacks;
        attacker.charge_stacks = 0;
        let mut power = attack_power(attacker.attack, charge_consumed, tuning.charge_bonus_per_stack);
        let crit_chance = effective_crit_chance(
            attacker.crit_chance,
            attacker.crit_window,
            tuning.crit_window_bonus,
        );
        let crit = roll_chance(crit_chance, rng);
        if crit {
            power *= tuning.crit_multiplier;
        }

        let defender = session.combatant(target);
        let mut damage = mitigate(power, defender.defense);
        let mut counter = 0;
        let mut reflected = 0;

        if defender.is_dodging {
            if roll_chance(defender.dodge_chance, rng) {
                damage = 0;
                counter = tuning.dodge_counter_damage;
                session.combatant_mut(target).crit_window = true;
                events.push(CombatEvent::Dodged { actor: target });
            } else {
                let penalized = scale(damage, 1.0 + tuning.failed_dodge_penalty).max(1);
                events.push(CombatEvent::DodgeFailed {
                    actor: target,
                    extra_damage: penalized - damage,
                });
                damage = penalized;
            }
        }

        let defender = session.combatant(target);
        if damage > 0 && defender.is_blocking {
            if defender.perfect_block {
                reflected = scale(damage, tuning.perfect_block_reflect);
                damage = 0;
                events.push(CombatEvent::PerfectBlock {
                    actor: target,
                    reflected,
                });
            } else {
                let through = scale(damage, tuning.block_damage_factor).max(1);
                events.push(CombatEvent::Blocked {
                    actor: target,
                    absorbed: damage - through,
                });
                damage = through;
            }
        }

        events.push(CombatEvent::Hit {
            actor: side,
            damage,
            crit,
            charge_consumed,
        });

        if damage > 0 {
            self.deal_damage(session, target, damage, events);
        }
        if counter > 0 && !session.ended {
            events.push(CombatEvent::CounterHit {
                actor: target,
                damage: counter,
            });
            self.deal_damage(session, side, counter, events);
        }
        if reflected > 0 && !session.ended {
            self.deal_damage(session, side, reflected, events);
        }
    }

    /// Applies damage and ends the session if the target drops to 0 hp.
    fn deal_damage(
        &self,
        session: &mut Session,
        target: Side,
        amount: u32,
        events: &mut Vec<CombatEvent>,
    ) {
        session.combatant_mut(target).take_damage(amount);
        if !session.combatant(target).is_alive() && !session.ended {
            events.push(CombatEvent::Knockout { loser: target });
            session.finish(Some(target.opponent()), EndReason::Knockout);
        }
    }

    fn hand_over(&self, session: &mut Session, acted: Side, events: &mut Vec<CombatEvent>) {
        if session.ended {
            return;
        }
        session.turn_owner = Some(acted.opponent());
        session.turn_deadline = None;
        if acted == Side::B {
            self.finish_round(session, events);
        }
    }

    fn finish_round(&self, session: &mut Session, events: &mut Vec<CombatEvent>) {
        if session.ended {
            return;
        }
        session.turn += 1;
        if session.turn > self.max_turns {
            events.push(CombatEvent::TurnLimitReached {
                turns: self.max_turns,
            });
            session.finish(None, EndReason::TurnLimit);
        }
    }

    fn record(&self, session: &mut Session, turn: u32, events: &[CombatEvent]) {
        for event in events {
            session.event_log.push(turn, event.clone());
        }
    }
}
