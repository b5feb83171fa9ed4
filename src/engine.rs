//! Boundary operations used by the chat/UI layer.
//!
//! `Engine` owns the session store and talks to the player-record provider
//! and clock it was built with. Every call is synchronous and short; the only
//! background work is the turn sweeper started by [`Engine::spawn_sweeper`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::autoplay::AutoPlayPolicy;
use crate::combat::logic::CombatResolver;
use crate::combat::templates::{mob_for_level, mob_template, player_combatant, MobTemplate};
use crate::combat::types::{Action, CombatEvent, Mode, ParticipantId, Session, SessionId, Side};
use crate::core::clock::Clock;
use crate::core::config::EngineConfig;
use crate::core::error::{EngineError, Result, TargetUnavailableReason};
use crate::progression::{effective_xp, ProgressionCurve};
use crate::rating::{rating_tier, RatingEngine, XpTransfer};
use crate::records::PlayerRecords;
pub use crate::reward::{ProgressionDelta, RatingDelta, RewardOutcome};
use crate::reward::{RewardLedger, RewardStep};
use crate::session::locks::KeyedLocks;
use crate::session::persistence::{SnapshotError, SnapshotFile};
use crate::session::store::{lock, SessionStore};
use crate::session::sweeper::{spawn_sweeper, SweeperHandle};

const REPORT_CHANNEL_CAPACITY: usize = 256;

/// Outcome of driving a session in auto mode.
#[derive(Debug, Clone)]
pub struct AutoRun {
    pub rounds: u32,
    pub events: Vec<CombatEvent>,
    pub session: Session,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub participant: ParticipantId,
    pub elo: i64,
    pub tier: &'static str,
    pub wins: u32,
    pub losses: u32,
}

/// Things that happened without a caller asking, published to subscribers.
#[derive(Debug, Clone)]
pub enum EngineReport {
    TurnTimedOut {
        session_id: SessionId,
        idle: ParticipantId,
        events: Vec<CombatEvent>,
    },
    SessionEnded {
        session: Box<Session>,
        reward: Option<RewardOutcome>,
    },
    /// A timed-out session could not be rewarded; it stays in the store and
    /// the next sweep retries the missing writes.
    RewardFailed {
        session_id: SessionId,
        error: String,
    },
}

pub struct Engine {
    config: EngineConfig,
    curve: ProgressionCurve,
    ratings: RatingEngine,
    policy: AutoPlayPolicy,
    store: SessionStore,
    records: Arc<dyn PlayerRecords>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    record_locks: KeyedLocks,
    reports: broadcast::Sender<EngineReport>,
}

impl Engine {
    pub fn new(config: EngineConfig, records: Arc<dyn PlayerRecords>, clock: Arc<dyn Clock>) -> Self {
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        Self {
            curve: ProgressionCurve::new(config.base_xp_to_next),
            ratings: RatingEngine::from_config(&config),
            policy: AutoPlayPolicy::default(),
            store: SessionStore::new(),
            records,
            clock,
            rng: Mutex::new(StdRng::from_entropy()),
            record_locks: KeyedLocks::new(),
            reports,
            config,
        }
    }

    /// Makes every random roll reproducible.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    pub fn with_policy(self, policy: AutoPlayPolicy) -> Self {
        Self { policy, ..self }
    }

    /// Replaces the session store, e.g. with one restored from a snapshot.
    pub fn with_store(self, store: SessionStore) -> Self {
        Self { store, ..self }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineReport> {
        self.reports.subscribe()
    }

    fn resolver(&self) -> CombatResolver<'_> {
        CombatResolver::new(&self.config.combat, &self.policy, self.config.max_turns)
    }

    // Independent stream per call so the shared generator is locked only briefly.
    fn child_rng(&self) -> StdRng {
        let seed = lock(&self.rng).gen::<u64>();
        StdRng::seed_from_u64(seed)
    }

    /// Opens a session for `a` against `b`.
    ///
    /// For PvE, `b` names a mob template (with or without the `mob:` prefix);
    /// without it a template is picked for `a`'s level. PvP requires a target
    /// that is not `a` and not shielded.
    pub fn create_session(
        &self,
        mode: Mode,
        a: &ParticipantId,
        b: Option<&ParticipantId>,
    ) -> Result<Session> {
        let now = self.clock.now();
        let a_progression = self.records.get_progression(a)?;
        let a_fighter = player_combatant(a.as_str(), &a_progression);

        let (b_id, b_fighter) = match mode {
            Mode::PvE => {
                let template = match b {
                    Some(id) => {
                        let name = id.mob_template_name().unwrap_or(id.as_str());
                        mob_template(name).ok_or_else(|| {
                            EngineError::invalid_action(format!("unknown opponent '{}'", name))
                        })?
                    }
                    None => mob_for_level(a_progression.level),
                };
                (
                    ParticipantId::mob(template.name),
                    template.combatant(a_progression.level),
                )
            }
            Mode::PvPAsync | Mode::PvPSync => {
                let target = b.ok_or_else(|| EngineError::invalid_action("PvP needs a target"))?;
                if target == a {
                    return Err(EngineError::TargetUnavailable {
                        target: target.clone(),
                        reason: TargetUnavailableReason::SelfTarget,
                    });
                }
                if target.is_mob() {
                    return Err(EngineError::invalid_action("PvP targets must be players"));
                }
                let progression = self.records.get_progression(target)?;
                (target.clone(), player_combatant(target.as_str(), &progression))
            }
        };

        let mut session = Session::new(
            mode,
            [a.clone(), b_id],
            [a_fighter, b_fighter],
            self.config.event_log_capacity,
        );
        if mode == Mode::PvPSync {
            session.turn_deadline = Some(now + self.config.sync_turn_window_seconds);
        }

        match mode {
            Mode::PvE => self.store.create(session.clone())?,
            // Shield check and insert both happen under the target's record lock.
            Mode::PvPAsync | Mode::PvPSync => {
                let target = session.participant(Side::B);
                self.record_locks.with_locked(&[target], || -> Result<SessionId> {
                    let rating = self.records.get_rating(target)?;
                    if rating.is_shielded(now) {
                        return Err(EngineError::TargetUnavailable {
                            target: target.clone(),
                            reason: TargetUnavailableReason::Shielded {
                                until: rating.shield_until,
                            },
                        });
                    }
                    self.store.create(session.clone())
                })?
            }
        };
        info!(
            "session {} created: {:?} {} vs {}",
            session.id, mode, session.participants[0], session.participants[1]
        );
        Ok(session)
    }

    pub fn session(&self, id: &SessionId) -> Result<Session> {
        self.store.get(id)
    }

    pub fn session_for(&self, participant: &ParticipantId) -> Result<Session> {
        self.store.load(participant)
    }

    /// Resolves one action and returns the produced events plus the new state.
    pub fn resolve_action(
        &self,
        id: &SessionId,
        actor: &ParticipantId,
        action: Action,
    ) -> Result<(Vec<CombatEvent>, Session)> {
        let resolver = self.resolver();
        let mut rng = self.child_rng();
        let now = self.clock.now();
        let window = self.config.sync_turn_window_seconds;

        let (events, session) = self.store.with_session(id, |session| {
            let events = resolver.resolve(session, actor, action, &mut rng)?;
            if session.mode == Mode::PvPSync && !session.ended {
                session.turn_deadline = Some(now + window);
            }
            Ok((events, session.clone()))
        })?;

        if session.ended {
            info!(
                "session {} ended after {} turns, winner {:?}",
                session.id, session.turn, session.winner
            );
        }
        Ok((events, session))
    }

    /// Removes the session. Calling it again is a no-op.
    pub fn end_session(&self, id: &SessionId) -> Option<Session> {
        let ended = self.store.end(id);
        if let Some(session) = &ended {
            info!("session {} removed", session.id);
        }
        ended
    }

    pub fn set_auto_mode(
        &self,
        id: &SessionId,
        actor: &ParticipantId,
        enabled: bool,
    ) -> Result<Session> {
        self.store.with_session(id, |session| {
            let side = human_side(session, actor)?;
            debug!("session {}: auto mode {} for {:?}", session.id, enabled, side);
            session.auto_mode = enabled;
            Ok(session.clone())
        })
    }

    /// Lets the policy pick and resolve one action for `actor`.
    pub fn resolve_auto(
        &self,
        id: &SessionId,
        actor: &ParticipantId,
    ) -> Result<(Vec<CombatEvent>, Session)> {
        let run = self.drive_auto(id, actor, 1)?;
        Ok((run.events, run.session))
    }

    /// Repeats auto actions until the session ends, the actor loses the
    /// turn, or `max_rounds` is reached.
    pub fn run_auto(&self, id: &SessionId, actor: &ParticipantId, max_rounds: u32) -> Result<AutoRun> {
        self.drive_auto(id, actor, max_rounds)
    }

    fn drive_auto(&self, id: &SessionId, actor: &ParticipantId, max_rounds: u32) -> Result<AutoRun> {
        let resolver = self.resolver();
        let mut rng = self.child_rng();
        let now = self.clock.now();
        let window = self.config.sync_turn_window_seconds;
        let max_charge = self.config.combat.max_charge_stacks;

        let run = self.store.with_session(id, |session| {
            if !session.auto_mode {
                return Err(EngineError::invalid_action("auto mode is off"));
            }
            let side = human_side(session, actor)?;

            let mut rounds = 0;
            let mut events = Vec::new();
            while rounds < max_rounds && !session.ended {
                if session.mode == Mode::PvPSync && session.turn_owner != Some(side) {
                    break;
                }
                let action = self.policy.choose(
                    session.combatant(side),
                    session.combatant(side.opponent()),
                    max_charge,
                    &mut rng,
                );
                events.extend(resolver.resolve(session, actor, action, &mut rng)?);
                rounds += 1;
            }
            if session.mode == Mode::PvPSync && !session.ended && rounds > 0 {
                session.turn_deadline = Some(now + window);
            }
            Ok(AutoRun {
                rounds,
                events,
                session: session.clone(),
            })
        })?;

        debug!(
            "session {}: {} auto rounds for {}",
            run.session.id, run.rounds, actor
        );
        Ok(run)
    }

    /// Applies XP and rating changes for a terminal session, exactly once.
    ///
    /// The stored copy of the session is authoritative; the argument only
    /// identifies it. The reward is planned on the first call and kept on the
    /// session. If a provider write fails the error is returned and a later
    /// call resumes with the first write that did not land. Once every write
    /// is in, further calls fail with `RewardAlreadyApplied`.
    pub fn apply_reward(&self, snapshot: &Session) -> Result<RewardOutcome> {
        let id = snapshot.id;
        self.store.begin_reward(&id)?;
        let result = self.settle_reward(&id);
        self.store.finish_reward(&id);

        match &result {
            Ok(outcome) => info!(
                "rewards applied for session {}: {} progression changes, elo {:?}",
                id,
                outcome.progression.len(),
                outcome.rating.as_ref().map(|r| r.elo_delta)
            ),
            Err(EngineError::RewardAlreadyApplied(_)) => {}
            Err(err) => error!("session {}: reward settlement interrupted: {}", id, err),
        }
        result
    }

    fn settle_reward(&self, id: &SessionId) -> Result<RewardOutcome> {
        let session = self.store.get(id)?;
        if !session.ended {
            return Err(EngineError::invalid_action("session is still running"));
        }
        if session.reward.as_ref().is_some_and(RewardLedger::is_complete) {
            return Err(EngineError::RewardAlreadyApplied(*id));
        }

        let players: Vec<&ParticipantId> =
            session.participants.iter().filter(|p| !p.is_mob()).collect();

        self.record_locks.with_locked(&players, || -> Result<RewardOutcome> {
            let mut ledger = match session.reward.clone() {
                Some(ledger) => {
                    info!(
                        "session {}: resuming reward after {}/{} writes",
                        id,
                        ledger.writes_done(),
                        ledger.steps.len()
                    );
                    ledger
                }
                None => {
                    let ledger = self.plan_reward(&session)?;
                    self.store_ledger(id, &ledger)?;
                    ledger
                }
            };

            while let Some(step) = ledger.next_step().cloned() {
                let result = step.apply(self.records.as_ref(), &self.curve)?;
                ledger.results.push(result);
                self.store_ledger(id, &ledger)?;
            }
            Ok(ledger.outcome(*id))
        })
    }

    fn store_ledger(&self, id: &SessionId, ledger: &RewardLedger) -> Result<()> {
        self.store.with_session(id, |session| {
            session.reward = Some(ledger.clone());
            Ok(())
        })
    }

    /// Works out every provider write a terminal session is owed.
    ///
    /// PvP writes the loser's rating and shield first, then the winner's
    /// rating, then both XP changes.
    fn plan_reward(&self, session: &Session) -> Result<RewardLedger> {
        let Some(winner) = session.winner.as_ref() else {
            return Ok(RewardLedger::default());
        };
        if winner.is_mob() {
            return Ok(RewardLedger::default());
        }

        if session.mode == Mode::PvE {
            let mob = session.participant(Side::B);
            let template: Option<MobTemplate> = mob.mob_template_name().and_then(mob_template);
            let before = self.records.get_progression(winner)?;
            let base = template
                .unwrap_or_else(|| mob_for_level(before.level))
                .xp_reward;
            let xp = effective_xp(base, before.level, before.xp_bonus) as i64;
            let step = RewardStep::Xp {
                participant: winner.clone(),
                delta: xp,
            };
            return Ok(RewardLedger::new(vec![step], None));
        }

        let attacker = session.participant(Side::A);
        let defender = session.participant(Side::B);
        let attacker_won = winner == attacker;
        let loser = if attacker_won { defender } else { attacker };

        let settlement = self.ratings.settle(
            &self.records.get_rating(winner)?,
            &self.records.get_rating(loser)?,
            self.clock.now(),
        );
        let transfer = self.ratings.xp_transfer(
            attacker_won,
            self.records.get_progression(attacker)?.xp_total,
            self.records.get_progression(defender)?.xp_total,
        );
        let moved = transfer.amount() as i64;
        let (attacker_xp, defender_xp) = match transfer {
            XpTransfer::Stolen(_) => (moved, -moved),
            XpTransfer::Forfeited(_) => (-moved, moved),
        };

        let steps = vec![
            RewardStep::Loss {
                participant: loser.clone(),
                elo_delta: settlement.elo_delta,
                shield_until: settlement.loser.shield_until,
            },
            RewardStep::Win {
                participant: winner.clone(),
                elo_delta: settlement.elo_delta,
            },
            RewardStep::Xp {
                participant: attacker.clone(),
                delta: attacker_xp,
            },
            RewardStep::Xp {
                participant: defender.clone(),
                delta: defender_xp,
            },
        ];
        Ok(RewardLedger::new(steps, Some(transfer)))
    }

    /// Top `limit` players by Elo, then wins. Reads a provider snapshot
    /// without taking per-player locks.
    pub fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let mut ratings = self.records.all_ratings()?;
        ratings.sort_by(|(a_id, a), (b_id, b)| {
            b.elo
                .cmp(&a.elo)
                .then(b.wins.cmp(&a.wins))
                .then(a_id.cmp(b_id))
        });
        Ok(ratings
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, (participant, rating))| LeaderboardEntry {
                rank: i + 1,
                participant,
                tier: rating_tier(rating.elo),
                elo: rating.elo,
                wins: rating.wins,
                losses: rating.losses,
            })
            .collect())
    }

    /// Resolves every expired synchronous turn once.
    ///
    /// Sessions finished by a timeout strike have no caller waiting on them,
    /// so the sweep rewards and removes them itself. A session whose reward
    /// fails stays in the store and is retried on every later sweep. Returns
    /// the number of turns resolved.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let resolutions =
            self.store
                .tick(now, &self.resolver(), self.config.sync_turn_window_seconds);

        for resolution in &resolutions {
            let session = &resolution.session;
            let _ = self.reports.send(EngineReport::TurnTimedOut {
                session_id: session.id,
                idle: session.participant(resolution.timed_out).clone(),
                events: resolution.events.clone(),
            });
        }

        for id in self.store.timed_out_endings() {
            self.finish_timed_out(&id);
        }
        resolutions.len()
    }

    fn finish_timed_out(&self, id: &SessionId) {
        let Ok(session) = self.store.get(id) else {
            return;
        };
        let reward = match self.apply_reward(&session) {
            Ok(outcome) => Some(outcome),
            Err(EngineError::RewardAlreadyApplied(_)) => {
                self.store.get(id).ok().and_then(|s| s.reward).map(|l| l.outcome(*id))
            }
            Err(EngineError::InvalidAction(reason)) => {
                debug!("session {}: reward not settled by sweep: {}", id, reason);
                return;
            }
            Err(err) => {
                warn!("session {}: reward after timeout failed, will retry: {}", id, err);
                let _ = self.reports.send(EngineReport::RewardFailed {
                    session_id: *id,
                    error: err.to_string(),
                });
                return;
            }
        };

        let final_state = self.store.end(id).unwrap_or(session);
        let _ = self.reports.send(EngineReport::SessionEnded {
            session: Box::new(final_state),
            reward,
        });
    }

    /// Starts the background sweep at the configured interval.
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweeperHandle {
        spawn_sweeper(
            Arc::clone(self),
            Duration::from_secs(self.config.sweep_interval_seconds),
        )
    }

    pub fn snapshot_sessions(&self) -> HashMap<ParticipantId, Session> {
        self.store.snapshot()
    }

    /// Writes all live sessions to `file`, returning the number of entries.
    pub fn save_sessions(&self, file: &SnapshotFile) -> std::result::Result<usize, SnapshotError> {
        let snapshot = self.store.snapshot();
        file.save(&snapshot)?;
        Ok(snapshot.len())
    }

    /// Replaces the live sessions with the contents of `file`.
    pub fn load_sessions(self, file: &SnapshotFile) -> std::result::Result<Self, SnapshotError> {
        let snapshot = file.load()?;
        info!("restored {} session entries from {}", snapshot.len(), file.path().display());
        Ok(self.with_store(SessionStore::restore(snapshot)))
    }
}

fn human_side(session: &Session, actor: &ParticipantId) -> Result<Side> {
    let side = session
        .side_of(actor)
        .ok_or_else(|| EngineError::invalid_action(format!("{} is not in this session", actor)))?;
    if session.is_ai_controlled(side) {
        return Err(EngineError::invalid_action(format!(
            "{} is controlled by the defender AI",
            actor
        )));
    }
    Ok(side)
}
