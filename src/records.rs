//! Contract for the external player-record store, plus an in-memory version
//! for tests and local runs.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use crate::combat::types::ParticipantId;
use crate::progression::ProgressionRecord;
use crate::rating::RatingRecord;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("player record lock was poisoned")]
    LockPoisoned,

    #[error("player record backend error: {0}")]
    Backend(String),
}

/// Source of truth for long-lived player progression and rating.
///
/// Unknown players get fresh default records.
pub trait PlayerRecords: Send + Sync {
    fn get_progression(&self, id: &ParticipantId) -> Result<ProgressionRecord, RecordError>;

    fn save_progression(
        &self,
        id: &ParticipantId,
        record: &ProgressionRecord,
    ) -> Result<(), RecordError>;

    fn get_rating(&self, id: &ParticipantId) -> Result<RatingRecord, RecordError>;

    fn save_rating(&self, id: &ParticipantId, record: &RatingRecord) -> Result<(), RecordError>;

    /// Snapshot of every stored rating, used for leaderboards. Providers that
    /// cannot list ratings should return `RecordError::Backend`.
    fn all_ratings(&self) -> Result<Vec<(ParticipantId, RatingRecord)>, RecordError>;
}

#[derive(Debug, Default)]
pub struct InMemoryPlayerRecords {
    progression: RwLock<HashMap<ParticipantId, ProgressionRecord>>,
    ratings: RwLock<HashMap<ParticipantId, RatingRecord>>,
    curve_factor: Option<f64>,
}

impl InMemoryPlayerRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// New players start with this curve factor instead of the default.
    pub fn with_curve_factor(curve_factor: f64) -> Self {
        Self {
            curve_factor: Some(curve_factor),
            ..Default::default()
        }
    }

    fn fresh_progression(&self) -> ProgressionRecord {
        match self.curve_factor {
            Some(factor) => ProgressionRecord::new(factor),
            None => ProgressionRecord::default(),
        }
    }
}

impl PlayerRecords for InMemoryPlayerRecords {
    fn get_progression(&self, id: &ParticipantId) -> Result<ProgressionRecord, RecordError> {
        let records = self
            .progression
            .read()
            .map_err(|_| RecordError::LockPoisoned)?;
        Ok(records
            .get(id)
            .cloned()
            .unwrap_or_else(|| self.fresh_progression()))
    }

    fn save_progression(
        &self,
        id: &ParticipantId,
        record: &ProgressionRecord,
    ) -> Result<(), RecordError> {
        let mut records = self
            .progression
            .write()
            .map_err(|_| RecordError::LockPoisoned)?;
        records.insert(id.clone(), record.clone());
        Ok(())
    }

    fn get_rating(&self, id: &ParticipantId) -> Result<RatingRecord, RecordError> {
        let ratings = self.ratings.read().map_err(|_| RecordError::LockPoisoned)?;
        Ok(ratings.get(id).cloned().unwrap_or_default())
    }

    fn save_rating(&self, id: &ParticipantId, record: &RatingRecord) -> Result<(), RecordError> {
        let mut ratings = self.ratings.write().map_err(|_| RecordError::LockPoisoned)?;
        ratings.insert(id.clone(), record.clone());
        Ok(())
    }

    fn all_ratings(&self) -> Result<Vec<(ParticipantId, RatingRecord)>, RecordError> {
        let ratings = self.ratings.read().map_err(|_| RecordError::LockPoisoned)?;
        Ok(ratings
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_player_gets_defaults() {
        let records = InMemoryPlayerRecords::new();
        let id = ParticipantId::new("newbie");
        assert_eq!(records.get_progression(&id).unwrap().level, 1);
        assert_eq!(records.get_rating(&id).unwrap().elo, 1000);
        assert!(records.all_ratings().unwrap().is_empty());
    }

    #[test]
    fn test_saved_records_round_trip() {
        let records = InMemoryPlayerRecords::with_curve_factor(1.3);
        let id = ParticipantId::new("alice");

        let mut progression = records.get_progression(&id).unwrap();
        assert_eq!(progression.curve_factor, 1.3);
        progression.xp_total = 77;
        records.save_progression(&id, &progression).unwrap();
        assert_eq!(records.get_progression(&id).unwrap().xp_total, 77);

        let rating = RatingRecord {
            elo: 1234,
            ..Default::default()
        };
        records.save_rating(&id, &rating).unwrap();
        assert_eq!(records.all_ratings().unwrap(), vec![(id, rating)]);
    }
}
