//! Authoritative registry of live sessions.
//!
//! Lock order is always store map first, then an individual session. The map
//! lock is only held long enough to find or insert a slot; all combat
//! mutation happens under the per-session mutex. Callers holding per-player
//! record locks may enter the store, never the other way round.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::combat::logic::CombatResolver;
use crate::combat::types::{CombatEvent, Mode, ParticipantId, Session, SessionId, Side};
use crate::core::error::{EngineError, Result};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type SessionSlot = Arc<Mutex<Session>>;

#[derive(Debug, Default)]
struct StoreInner {
    sessions: HashMap<SessionId, SessionSlot>,
    by_participant: HashMap<ParticipantId, SessionId>,
    /// Sessions with a reward settlement in progress
    rewarding: HashSet<SessionId>,
}

/// A synchronous turn the sweep resolved on behalf of an idle participant.
#[derive(Debug, Clone)]
pub struct TimeoutResolution {
    pub timed_out: Side,
    pub events: Vec<CombatEvent>,
    pub session: Session,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    inner: Mutex<StoreInner>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session.
    ///
    /// Fails with `DuplicateSession` if a human participant already owns a
    /// session that has not ended. An ended session displaced this way loses
    /// all its index entries; its slot is dropped too unless it still owes a
    /// reward, which stays reachable by id until it is settled and ended.
    pub fn create(&self, session: Session) -> Result<SessionId> {
        let mut inner = lock(&self.inner);

        let mut displaced = Vec::new();
        for participant in session.human_participants() {
            let Some(existing) = inner.by_participant.get(participant) else {
                continue;
            };
            let Some(slot) = inner.sessions.get(existing) else {
                continue;
            };
            let stale = lock(slot);
            if !stale.ended {
                return Err(EngineError::DuplicateSession {
                    participant: participant.clone(),
                    existing: *existing,
                });
            }
            displaced.push((*existing, stale.reward_settled()));
        }

        for (stale_id, settled) in displaced {
            inner.by_participant.retain(|_, session_id| *session_id != stale_id);
            if settled {
                inner.sessions.remove(&stale_id);
                inner.rewarding.remove(&stale_id);
            }
            tracing::debug!(
                "session {} displaced by a new session (slot kept: {})",
                stale_id,
                !settled
            );
        }

        let id = session.id;
        for participant in session.human_participants() {
            inner.by_participant.insert(participant.clone(), id);
        }
        inner.sessions.insert(id, Arc::new(Mutex::new(session)));
        Ok(id)
    }

    fn slot(&self, id: &SessionId) -> Result<SessionSlot> {
        lock(&self.inner)
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::SessionNotFound(id.to_string()))
    }

    pub fn get(&self, id: &SessionId) -> Result<Session> {
        let slot = self.slot(id)?;
        let session = lock(&slot).clone();
        Ok(session)
    }

    /// Current session of a participant, including one that has just ended
    /// but has not been removed yet.
    pub fn load(&self, participant: &ParticipantId) -> Result<Session> {
        let id = lock(&self.inner)
            .by_participant
            .get(participant)
            .copied()
            .ok_or_else(|| EngineError::SessionNotFound(participant.to_string()))?;
        self.get(&id)
    }

    /// Replaces the stored copy of an existing session.
    pub fn save(&self, session: Session) -> Result<()> {
        let slot = self.slot(&session.id)?;
        *lock(&slot) = session;
        Ok(())
    }

    /// Load-mutate-save under the session's own lock.
    pub fn with_session<T>(
        &self,
        id: &SessionId,
        f: impl FnOnce(&mut Session) -> Result<T>,
    ) -> Result<T> {
        let slot = self.slot(id)?;
        let mut session = lock(&slot);
        f(&mut session)
    }

    /// Removes a session. Returns the final state the first time, `None` after.
    pub fn end(&self, id: &SessionId) -> Option<Session> {
        let mut inner = lock(&self.inner);
        let slot = inner.sessions.remove(id)?;
        inner.by_participant.retain(|_, session_id| session_id != id);
        inner.rewarding.remove(id);
        drop(inner);

        let session = lock(&slot).clone();
        Some(session)
    }

    /// Removes whatever session the participant is in. Idempotent.
    pub fn end_participant(&self, participant: &ParticipantId) -> Option<Session> {
        let id = lock(&self.inner).by_participant.get(participant).copied()?;
        self.end(&id)
    }

    /// Marks a reward settlement as running so concurrent calls back off.
    ///
    /// Completion is tracked on the session itself; this only guards against
    /// two settlements of the same session interleaving.
    pub fn begin_reward(&self, id: &SessionId) -> Result<()> {
        let mut inner = lock(&self.inner);
        if !inner.sessions.contains_key(id) {
            return Err(EngineError::SessionNotFound(id.to_string()));
        }
        if !inner.rewarding.insert(*id) {
            return Err(EngineError::invalid_action(
                "rewards for this session are already being applied",
            ));
        }
        Ok(())
    }

    pub fn finish_reward(&self, id: &SessionId) {
        lock(&self.inner).rewarding.remove(id);
    }

    /// Ended sessions the sweep finished by a timeout strike and still holds.
    pub fn timed_out_endings(&self) -> Vec<SessionId> {
        let slots: Vec<SessionSlot> = lock(&self.inner).sessions.values().cloned().collect();
        slots
            .iter()
            .filter_map(|slot| {
                let session = lock(slot);
                (session.ended && session.ended_by_timeout).then_some(session.id)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves every synchronous turn whose deadline has passed.
    ///
    /// The idle side gets a fixed weak strike and the turn passes on with a
    /// fresh deadline. Sessions are visited one at a time without holding the
    /// map lock.
    pub fn tick(
        &self,
        now: i64,
        resolver: &CombatResolver<'_>,
        turn_window_seconds: i64,
    ) -> Vec<TimeoutResolution> {
        let slots: Vec<SessionSlot> = lock(&self.inner).sessions.values().cloned().collect();

        let mut resolved = Vec::new();
        for slot in slots {
            let mut session = lock(&slot);
            if session.mode != Mode::PvPSync || session.ended {
                continue;
            }
            let (Some(owner), Some(deadline)) = (session.turn_owner, session.turn_deadline) else {
                continue;
            };
            if now < deadline {
                continue;
            }

            tracing::warn!(
                "session {}: {} missed the turn deadline, auto-attacking",
                session.id,
                session.participant(owner)
            );
            let events = resolver.resolve_timeout(&mut session);
            if session.ended {
                session.ended_by_timeout = true;
            } else {
                session.turn_deadline = Some(now + turn_window_seconds);
            }
            resolved.push(TimeoutResolution {
                timed_out: owner,
                events,
                session: session.clone(),
            });
        }
        resolved
    }

    /// Persistable view: every human participant mapped to its session.
    pub fn snapshot(&self) -> HashMap<ParticipantId, Session> {
        let entries: Vec<(ParticipantId, SessionSlot)> = {
            let inner = lock(&self.inner);
            inner
                .by_participant
                .iter()
                .filter_map(|(p, id)| inner.sessions.get(id).map(|s| (p.clone(), Arc::clone(s))))
                .collect()
        };
        entries
            .into_iter()
            .map(|(participant, slot)| {
                let session = lock(&slot).clone();
                (participant, session)
            })
            .collect()
    }

    /// Rebuilds a store from a snapshot. Sessions shared by two participants
    /// are restored once. Reward progress travels inside each session, so a
    /// settled reward stays settled across the restart.
    pub fn restore(snapshot: HashMap<ParticipantId, Session>) -> Self {
        let mut inner = StoreInner::default();
        for (participant, session) in snapshot {
            let id = session.id;
            inner
                .sessions
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(session)));
            inner.by_participant.insert(participant, id);
        }
        Self {
            inner: Mutex::new(inner),
        }
    }
}
