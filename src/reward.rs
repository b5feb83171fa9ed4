//! Reward settlement for terminal sessions.
//!
//! A reward is planned once, stored on the session as a [`RewardLedger`], and
//! then written to the player-record provider one step at a time. Each step
//! is a single provider write that reads the current record, applies its
//! delta and saves it. The ledger keeps the result of every step that landed,
//! so a failed settlement resumes at the first missing write and never
//! repeats one that already went through.

use serde::{Deserialize, Serialize};

use crate::combat::types::{ParticipantId, SessionId};
use crate::progression::{ProgressionCurve, ProgressionRecord, XpChange};
use crate::rating::{RatingRecord, XpTransfer};
use crate::records::{PlayerRecords, RecordError};

/// One provider write of a reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardStep {
    /// Elo drop, loss count and protection shield of the loser
    Loss {
        participant: ParticipantId,
        elo_delta: i64,
        shield_until: i64,
    },
    Win {
        participant: ParticipantId,
        elo_delta: i64,
    },
    Xp {
        participant: ParticipantId,
        delta: i64,
    },
}

/// Record saved by a completed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepResult {
    Rating(RatingRecord),
    Xp {
        before: ProgressionRecord,
        change: XpChange,
    },
}

impl RewardStep {
    pub fn participant(&self) -> &ParticipantId {
        match self {
            RewardStep::Loss { participant, .. }
            | RewardStep::Win { participant, .. }
            | RewardStep::Xp { participant, .. } => participant,
        }
    }

    /// Applies the step to the participant's current record and saves it.
    pub fn apply(
        &self,
        records: &dyn PlayerRecords,
        curve: &ProgressionCurve,
    ) -> Result<StepResult, RecordError> {
        match self {
            RewardStep::Loss {
                participant,
                elo_delta,
                shield_until,
            } => {
                let mut rating = records.get_rating(participant)?;
                rating.elo -= elo_delta;
                rating.losses += 1;
                rating.shield_until = rating.shield_until.max(*shield_until);
                records.save_rating(participant, &rating)?;
                Ok(StepResult::Rating(rating))
            }
            RewardStep::Win {
                participant,
                elo_delta,
            } => {
                let mut rating = records.get_rating(participant)?;
                rating.elo += elo_delta;
                rating.wins += 1;
                records.save_rating(participant, &rating)?;
                Ok(StepResult::Rating(rating))
            }
            RewardStep::Xp { participant, delta } => {
                let before = records.get_progression(participant)?;
                let change = curve.apply_xp_delta(&before, *delta);
                records.save_progression(participant, &change.record)?;
                Ok(StepResult::Xp { before, change })
            }
        }
    }
}

/// XP applied to one participant by a reward.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressionDelta {
    pub participant: ParticipantId,
    pub xp_delta: i64,
    pub change: XpChange,
    /// Stage name before and after, when the change crossed a stage boundary
    pub evolved: Option<(&'static str, &'static str)>,
}

/// Rating outcome of a decisive PvP session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingDelta {
    pub winner: ParticipantId,
    pub loser: ParticipantId,
    pub elo_delta: i64,
    pub transfer: XpTransfer,
    pub winner_rating: RatingRecord,
    pub loser_rating: RatingRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardOutcome {
    pub session_id: SessionId,
    pub progression: Vec<ProgressionDelta>,
    pub rating: Option<RatingDelta>,
}

impl RewardOutcome {
    pub fn empty(session_id: SessionId) -> Self {
        Self {
            session_id,
            progression: Vec::new(),
            rating: None,
        }
    }
}

/// Planned reward writes of one session and the results of those that landed.
///
/// IMPORTANT: persisted inside session snapshots; new fields need
/// `#[serde(default)]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardLedger {
    pub steps: Vec<RewardStep>,
    pub results: Vec<StepResult>,
    #[serde(default)]
    pub transfer: Option<XpTransfer>,
}

impl RewardLedger {
    pub fn new(steps: Vec<RewardStep>, transfer: Option<XpTransfer>) -> Self {
        Self {
            steps,
            results: Vec::new(),
            transfer,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.results.len() >= self.steps.len()
    }

    pub fn next_step(&self) -> Option<&RewardStep> {
        self.steps.get(self.results.len())
    }

    pub fn writes_done(&self) -> usize {
        self.results.len().min(self.steps.len())
    }

    /// Summary of the writes that have landed so far.
    pub fn outcome(&self, session_id: SessionId) -> RewardOutcome {
        let mut outcome = RewardOutcome::empty(session_id);
        let mut won = None;
        let mut lost = None;

        for (step, result) in self.steps.iter().zip(&self.results) {
            match (step, result) {
                (RewardStep::Xp { participant, delta }, StepResult::Xp { before, change }) => {
                    let evolved = change.evolved_from(before).then(|| {
                        (
                            before.evolution_stage().name,
                            change.record.evolution_stage().name,
                        )
                    });
                    outcome.progression.push(ProgressionDelta {
                        participant: participant.clone(),
                        xp_delta: *delta,
                        change: change.clone(),
                        evolved,
                    });
                }
                (
                    RewardStep::Win {
                        participant,
                        elo_delta,
                    },
                    StepResult::Rating(rating),
                ) => won = Some((participant, *elo_delta, rating)),
                (RewardStep::Loss { participant, .. }, StepResult::Rating(rating)) => {
                    lost = Some((participant, rating))
                }
                _ => {}
            }
        }

        if let (Some((winner, elo_delta, winner_rating)), Some((loser, loser_rating)), Some(transfer)) =
            (won, lost, self.transfer)
        {
            outcome.rating = Some(RatingDelta {
                winner: winner.clone(),
                loser: loser.clone(),
                elo_delta,
                transfer,
                winner_rating: winner_rating.clone(),
                loser_rating: loser_rating.clone(),
            });
        }
        outcome
    }
}
