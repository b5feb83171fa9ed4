//! Integration test: player-record failures during reward application
//!
//! Uses a record provider that fails writes on demand. Failures must reach
//! the caller, and a retry must finish exactly the writes that did not land.

use std::sync::{Arc, Mutex};

use skirmish::combat::types::{Action, Mode, ParticipantId, Session};
use skirmish::core::clock::ManualClock;
use skirmish::core::config::EngineConfig;
use skirmish::core::error::EngineError;
use skirmish::engine::{Engine, EngineReport};
use skirmish::progression::{ProgressionCurve, ProgressionRecord};
use skirmish::rating::RatingRecord;
use skirmish::records::{InMemoryPlayerRecords, PlayerRecords, RecordError};
use skirmish::session::SessionStore;

/// Wraps the in-memory provider and fails every write after a budget.
#[derive(Default)]
struct FlakyRecords {
    inner: InMemoryPlayerRecords,
    /// `None` never fails; `Some(n)` lets `n` more writes through
    write_budget: Mutex<Option<usize>>,
}

impl FlakyRecords {
    fn fail_after(&self, writes: usize) {
        *self.write_budget.lock().unwrap() = Some(writes);
    }

    fn heal(&self) {
        *self.write_budget.lock().unwrap() = None;
    }

    fn spend_write(&self) -> Result<(), RecordError> {
        let mut budget = self.write_budget.lock().unwrap();
        match budget.as_mut() {
            None => Ok(()),
            Some(0) => Err(RecordError::Backend("injected write failure".into())),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
        }
    }
}

impl PlayerRecords for FlakyRecords {
    fn get_progression(&self, id: &ParticipantId) -> Result<ProgressionRecord, RecordError> {
        self.inner.get_progression(id)
    }

    fn save_progression(
        &self,
        id: &ParticipantId,
        record: &ProgressionRecord,
    ) -> Result<(), RecordError> {
        self.spend_write()?;
        self.inner.save_progression(id, record)
    }

    fn get_rating(&self, id: &ParticipantId) -> Result<RatingRecord, RecordError> {
        self.inner.get_rating(id)
    }

    fn save_rating(&self, id: &ParticipantId, record: &RatingRecord) -> Result<(), RecordError> {
        self.spend_write()?;
        self.inner.save_rating(id, record)
    }

    fn all_ratings(&self) -> Result<Vec<(ParticipantId, RatingRecord)>, RecordError> {
        self.inner.all_ratings()
    }
}

fn pid(id: &str) -> ParticipantId {
    ParticipantId::new(id)
}

fn finished_raid(engine: &Engine) -> Session {
    let session = engine
        .create_session(Mode::PvPAsync, &pid("alice"), Some(&pid("bob")))
        .unwrap();
    let (_, finished) = engine
        .resolve_action(&session.id, &pid("alice"), Action::Surrender)
        .unwrap();
    assert!(finished.ended);
    assert_eq!(finished.winner, Some(pid("bob")));
    finished
}

fn new_engine(records: Arc<FlakyRecords>, clock: Arc<ManualClock>) -> Engine {
    Engine::new(EngineConfig::default(), records, clock).with_seed(5)
}

fn setup() -> (Engine, Arc<FlakyRecords>) {
    let records = Arc::new(FlakyRecords::default());
    let engine = new_engine(records.clone(), Arc::new(ManualClock::new(0)));
    (engine, records)
}

/// Gives alice 1000 XP so the raid forfeit moves 50 XP to bob.
fn seed_alice_xp(records: &FlakyRecords) {
    let record = ProgressionCurve::default()
        .apply_xp_delta(&ProgressionRecord::default(), 1_000)
        .record;
    records.save_progression(&pid("alice"), &record).unwrap();
}

#[test]
fn test_failure_before_any_write_can_be_retried() {
    let (engine, records) = setup();
    let finished = finished_raid(&engine);

    records.fail_after(0);
    let err = engine.apply_reward(&finished).unwrap_err();
    assert!(matches!(err, EngineError::Records(RecordError::Backend(_))));
    assert!(!err.is_recoverable());
    let stored = engine.session(&finished.id).unwrap();
    assert_eq!(stored.reward.as_ref().unwrap().writes_done(), 0);
    assert!(!stored.reward_settled());

    records.heal();
    let outcome = engine.apply_reward(&finished).unwrap();
    assert_eq!(outcome.rating.unwrap().elo_delta, 16);
    assert_eq!(records.get_rating(&pid("bob")).unwrap().elo, 1016);
    assert_eq!(records.get_rating(&pid("alice")).unwrap().elo, 984);
}

#[test]
fn test_partial_write_is_finished_by_retry() {
    let (engine, records) = setup();
    seed_alice_xp(&records);
    let finished = finished_raid(&engine);

    // Only the loser's rating and shield land
    records.fail_after(1);
    assert!(matches!(
        engine.apply_reward(&finished),
        Err(EngineError::Records(_))
    ));
    let alice = records.get_rating(&pid("alice")).unwrap();
    assert_eq!((alice.elo, alice.losses), (984, 1));
    assert!(alice.is_shielded(0));
    assert_eq!(records.get_rating(&pid("bob")).unwrap().elo, 1000);

    // The retry picks up at the winner's rating, then stops again
    records.fail_after(2);
    assert!(engine.apply_reward(&finished).is_err());
    assert_eq!(records.get_rating(&pid("bob")).unwrap().elo, 1016);
    assert_eq!(records.get_progression(&pid("alice")).unwrap().xp_total, 950);
    assert_eq!(records.get_progression(&pid("bob")).unwrap().xp_total, 0);

    records.heal();
    let outcome = engine.apply_reward(&finished).unwrap();
    let rating = outcome.rating.unwrap();
    assert_eq!(rating.winner_rating.elo, 1016);
    assert_eq!(rating.loser_rating.elo, 984);
    assert_eq!(outcome.progression.len(), 2);

    // Every write landed exactly once
    assert_eq!(records.get_rating(&pid("alice")).unwrap().losses, 1);
    assert_eq!(records.get_rating(&pid("bob")).unwrap().wins, 1);
    assert_eq!(records.get_progression(&pid("alice")).unwrap().xp_total, 950);
    assert_eq!(records.get_progression(&pid("bob")).unwrap().xp_total, 50);
    assert!(matches!(
        engine.apply_reward(&finished),
        Err(EngineError::RewardAlreadyApplied(_))
    ));
}

#[test]
fn test_interrupted_reward_resumes_after_restart() {
    let records = Arc::new(FlakyRecords::default());
    let clock = Arc::new(ManualClock::new(0));
    let engine = new_engine(records.clone(), clock.clone());
    seed_alice_xp(&records);
    let finished = finished_raid(&engine);

    records.fail_after(3);
    assert!(engine.apply_reward(&finished).is_err());
    let snapshot = engine.snapshot_sessions();
    drop(engine);

    records.heal();
    let restored =
        new_engine(records.clone(), clock).with_store(SessionStore::restore(snapshot));
    restored.apply_reward(&finished).unwrap();
    assert_eq!(records.get_rating(&pid("bob")).unwrap().elo, 1016);
    assert_eq!(records.get_rating(&pid("alice")).unwrap().elo, 984);
    assert_eq!(records.get_progression(&pid("alice")).unwrap().xp_total, 950);
    assert_eq!(records.get_progression(&pid("bob")).unwrap().xp_total, 50);
}

#[test]
fn test_sweep_keeps_session_when_reward_fails() {
    let records = Arc::new(FlakyRecords::default());
    let clock = Arc::new(ManualClock::new(0));
    let engine = new_engine(records.clone(), clock.clone());
    let mut reports = engine.subscribe();
    let (alice, bob) = (pid("alice"), pid("bob"));

    let session = engine
        .create_session(Mode::PvPSync, &alice, Some(&bob))
        .unwrap();
    engine
        .store()
        .with_session(&session.id, |s| {
            s.combatants[1].hp = 1;
            Ok(())
        })
        .unwrap();

    records.fail_after(0);
    clock.advance(30);
    assert_eq!(engine.sweep(), 1);
    assert!(matches!(
        reports.try_recv().unwrap(),
        EngineReport::TurnTimedOut { .. }
    ));
    match reports.try_recv().unwrap() {
        EngineReport::RewardFailed { session_id, error } => {
            assert_eq!(session_id, session.id);
            assert!(error.contains("injected write failure"));
        }
        other => panic!("unexpected report {other:?}"),
    }
    let held = engine.session(&session.id).unwrap();
    assert!(held.ended && held.ended_by_timeout);
    assert_eq!(records.get_rating(&alice).unwrap().elo, 1000);

    // Still failing: the next sweep retries and reports again
    assert_eq!(engine.sweep(), 0);
    assert!(matches!(
        reports.try_recv().unwrap(),
        EngineReport::RewardFailed { .. }
    ));

    records.heal();
    assert_eq!(engine.sweep(), 0);
    match reports.try_recv().unwrap() {
        EngineReport::SessionEnded { session: ended, reward } => {
            assert_eq!(ended.winner.as_ref(), Some(&alice));
            assert_eq!(reward.unwrap().rating.unwrap().elo_delta, 16);
        }
        other => panic!("unexpected report {other:?}"),
    }
    assert_eq!(records.get_rating(&alice).unwrap().elo, 1016);
    assert_eq!(records.get_rating(&bob).unwrap().losses, 1);
    assert!(matches!(
        engine.session(&session.id),
        Err(EngineError::SessionNotFound(_))
    ));
}

#[test]
fn test_leaderboard_reads_through_wrapping_provider() {
    let (engine, records) = setup();
    let finished = finished_raid(&engine);
    engine.apply_reward(&finished).unwrap();
    assert_eq!(records.inner.all_ratings().unwrap().len(), 2);

    let board = engine.leaderboard(5).unwrap();
    let order: Vec<&str> = board.iter().map(|e| e.participant.as_str()).collect();
    assert_eq!(order, vec!["bob", "alice"]);
    assert_eq!(board[0].elo, 1016);
}
