/// Activity-level round advancement.
///
/// `ActivityStore` is the read side the engine depends on: who is taking part
/// and which evaluations have been recorded. `ActivityRounds` keeps one
/// `RoundEngine` per activity, creating it on the first advance.
use std::collections::HashMap;

use async_trait::async_trait;
use tracing::info;

use crate::engine::RoundEngine;
use crate::error::{EngineError, StoreError};
use crate::types::{EvaluationOutcome, ParticipantKey, RoundOutcome};

/// Where participants and evaluation outcomes live.
///
/// Both reads return `Ok(None)` when the activity does not exist.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn participants(&self, activity_id: &str) -> Result<Option<Vec<ParticipantKey>>, StoreError>;

    async fn evaluations(&self, activity_id: &str) -> Result<Option<Vec<EvaluationOutcome>>, StoreError>;
}

/// In-process store, for simulations and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    activities: HashMap<String, MemoryActivity>,
}

#[derive(Debug, Clone, Default)]
struct MemoryActivity {
    participants: Vec<ParticipantKey>,
    evaluations: Vec<EvaluationOutcome>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) an activity with the given participants.
    pub fn create_activity(&mut self, activity_id: &str, participants: Vec<ParticipantKey>) {
        self.activities.insert(
            activity_id.to_string(),
            MemoryActivity {
                participants,
                evaluations: Vec::new(),
            },
        );
    }

    pub fn add_participant(&mut self, activity_id: &str, participant: ParticipantKey) -> bool {
        match self.activities.get_mut(activity_id) {
            Some(activity) => {
                activity.participants.push(participant);
                true
            }
            None => false,
        }
    }

    pub fn record(&mut self, activity_id: &str, outcome: EvaluationOutcome) -> bool {
        match self.activities.get_mut(activity_id) {
            Some(activity) => {
                activity.evaluations.push(outcome);
                true
            }
            None => false,
        }
    }

    pub fn remove_activity(&mut self, activity_id: &str) -> bool {
        self.activities.remove(activity_id).is_some()
    }

    pub fn recorded(&self, activity_id: &str) -> &[EvaluationOutcome] {
        self.activities
            .get(activity_id)
            .map(|a| a.evaluations.as_slice())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn participants(&self, activity_id: &str) -> Result<Option<Vec<ParticipantKey>>, StoreError> {
        Ok(self.activities.get(activity_id).map(|a| a.participants.clone()))
    }

    async fn evaluations(&self, activity_id: &str) -> Result<Option<Vec<EvaluationOutcome>>, StoreError> {
        Ok(self.activities.get(activity_id).map(|a| a.evaluations.clone()))
    }
}

/// One `RoundEngine` per activity.
///
/// `advance_round` takes `&mut self`, so rounds for activities held by the
/// same registry never run concurrently. Share it across tasks behind a mutex.
#[derive(Default)]
pub struct ActivityRounds {
    engines: HashMap<String, RoundEngine>,
    seed: Option<u64>,
}

impl ActivityRounds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every engine this registry creates uses `seed` for tie-breaking.
    pub fn with_seed(seed: u64) -> Self {
        ActivityRounds {
            engines: HashMap::new(),
            seed: Some(seed),
        }
    }

    fn new_engine(&self) -> RoundEngine {
        match self.seed {
            Some(seed) => RoundEngine::with_seed(seed),
            None => RoundEngine::new(),
        }
    }

    /// Read the activity from `store` and produce its next round.
    ///
    /// The store reads are the only await points; the round itself is
    /// computed synchronously once the data is in hand.
    pub async fn advance_round<S: ActivityStore + ?Sized>(
        &mut self,
        store: &S,
        activity_id: &str,
    ) -> Result<RoundOutcome, EngineError> {
        let participants = store
            .participants(activity_id)
            .await?
            .ok_or_else(|| EngineError::ActivityNotFound(activity_id.to_string()))?;
        let evaluations = store
            .evaluations(activity_id)
            .await?
            .ok_or_else(|| EngineError::ActivityNotFound(activity_id.to_string()))?;

        if !self.engines.contains_key(activity_id) {
            info!(activity = activity_id, "starting round engine");
            let engine = self.new_engine();
            self.engines.insert(activity_id.to_string(), engine);
        }
        let engine = self
            .engines
            .get_mut(activity_id)
            .ok_or_else(|| EngineError::ActivityNotFound(activity_id.to_string()))?;

        engine.advance_round(&participants, &evaluations)
    }

    /// Drop everything remembered about an activity.
    pub fn reset(&mut self, activity_id: &str) -> bool {
        let existed = self.engines.remove(activity_id).is_some();
        if existed {
            info!(activity = activity_id, "round engine reset");
        }
        existed
    }

    pub fn engine(&self, activity_id: &str) -> Option<&RoundEngine> {
        self.engines.get(activity_id)
    }

    /// Resume an activity from a previously saved engine.
    pub fn insert(&mut self, activity_id: &str, engine: RoundEngine) {
        self.engines.insert(activity_id.to_string(), engine);
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
