/// Round engine: per-activity state and round advancement.
///
/// Pure computation, no IO. The caller reads participants and evaluation
/// history from wherever it keeps them, passes them in, and persists the
/// returned assignment itself.
///
/// Participants are identified by caller-provided string keys; internally the
/// engine works on roster indices.
use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::assignment::{assign_evaluators_indexed, SeenPapers};
use crate::clustering::form_clusters_indexed;
use crate::constants::MIN_PARTICIPANTS;
use crate::error::{EngineError, RoundWarning};
use crate::pairing::{derive_pairs_indexed, PairingHistory};
use crate::scoring::recompute_scores_indexed;
use crate::types::{
    Assignment, EvaluationOutcome, IdMap, ParticipantKey, RoundOutcome, UnorderedPair,
};

/// Serializable snapshot of everything a `RoundEngine` remembers about an activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineState {
    /// Participants fixed at the first round, in roster order.
    pub roster: Vec<ParticipantKey>,
    pub scores: BTreeMap<ParticipantKey, u32>,
    /// Every pairing emitted or evaluated so far, oldest first.
    pub pairings: Vec<UnorderedPair<ParticipantKey>>,
    /// Evaluator → participants whose submissions they have judged.
    pub seen_papers: BTreeMap<ParticipantKey, BTreeSet<ParticipantKey>>,
    pub rounds_completed: usize,
}

pub struct RoundEngine {
    /// Empty until the first round fixes the roster.
    id_map: IdMap,
    /// Wins per roster index, recomputed from history every round.
    scores: Vec<u32>,
    pairings: PairingHistory,
    seen: SeenPapers,
    rounds_completed: usize,
    rng: StdRng,
}

impl Default for RoundEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundEngine {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Engine whose tie-breaking is reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        RoundEngine {
            id_map: IdMap::default(),
            scores: Vec::new(),
            pairings: PairingHistory::default(),
            seen: SeenPapers::default(),
            rounds_completed: 0,
            rng,
        }
    }

    /// Rebuild an engine from a snapshot taken with [`RoundEngine::state`].
    ///
    /// Pairings and seen papers that name keys outside the roster are dropped.
    pub fn restore(state: EngineState) -> Self {
        Self::restore_with_rng(state, StdRng::from_os_rng())
    }

    pub fn restore_with_seed(state: EngineState, seed: u64) -> Self {
        Self::restore_with_rng(state, StdRng::seed_from_u64(seed))
    }

    fn restore_with_rng(state: EngineState, rng: StdRng) -> Self {
        let mut engine = Self::with_rng(rng);
        if state.roster.is_empty() {
            return engine;
        }
        engine.initialize(IdMap::from_keys(&state.roster));

        for (key, score) in &state.scores {
            if let Some(idx) = engine.id_map.to_idx(key) {
                engine.scores[idx] = *score;
            }
        }
        for pair in &state.pairings {
            match engine.id_map.to_idx_pair(pair) {
                Some(indexed) => {
                    engine.pairings.insert(indexed);
                }
                None => warn!(?pair, "stored pairing names an unknown participant; dropped"),
            }
        }
        for (evaluator, subjects) in &state.seen_papers {
            let Some(e) = engine.id_map.to_idx(evaluator) else {
                warn!(%evaluator, "stored seen papers for an unknown evaluator; dropped");
                continue;
            };
            let known: Vec<usize> = subjects.iter().filter_map(|s| engine.id_map.to_idx(s)).collect();
            for s in known {
                engine.seen.mark(e, s);
            }
        }
        engine.rounds_completed = state.rounds_completed;
        engine
    }

    fn initialize(&mut self, id_map: IdMap) {
        let num = id_map.len();
        self.id_map = id_map;
        self.scores = vec![0; num];
        self.pairings.clear();
        self.seen = SeenPapers::new(num);
        self.rounds_completed = 0;
    }

    /// Forget the activity entirely. The next round re-reads the roster.
    pub fn reset(&mut self) {
        self.id_map = IdMap::default();
        self.scores.clear();
        self.pairings.clear();
        self.seen.clear();
        self.rounds_completed = 0;
    }

    pub fn is_initialized(&self) -> bool {
        !self.id_map.is_empty()
    }

    pub fn roster(&self) -> &[ParticipantKey] {
        self.id_map.keys()
    }

    pub fn rounds_completed(&self) -> usize {
        self.rounds_completed
    }

    pub fn score(&self, participant: &str) -> Option<u32> {
        self.id_map.to_idx(participant).map(|idx| self.scores[idx])
    }

    /// Current scores in roster order.
    pub fn scores(&self) -> Vec<(ParticipantKey, u32)> {
        self.id_map.keys().iter().cloned().zip(self.scores.iter().copied()).collect()
    }

    pub fn has_been_paired(&self, a: &str, b: &str) -> bool {
        match (self.id_map.to_idx(a), self.id_map.to_idx(b)) {
            (Some(a), Some(b)) => self.pairings.contains(a, b),
            _ => false,
        }
    }

    pub fn has_seen(&self, evaluator: &str, subject: &str) -> bool {
        match (self.id_map.to_idx(evaluator), self.id_map.to_idx(subject)) {
            (Some(e), Some(s)) => self.seen.has_seen(e, s),
            _ => false,
        }
    }

    pub fn pairing_count(&self) -> usize {
        self.pairings.len()
    }

    pub fn state(&self) -> EngineState {
        let seen_papers: BTreeMap<_, _> = (0..self.id_map.len())
            .map(|e| {
                let subjects: BTreeSet<_> = self.seen.seen_by(e).map(|s| self.id_map.to_key(s).clone()).collect();
                (self.id_map.to_key(e).clone(), subjects)
            })
            .collect();

        EngineState {
            roster: self.id_map.keys().to_vec(),
            scores: self.scores().into_iter().collect(),
            pairings: self.pairings.iter().map(|p| self.id_map.to_key_pair(p)).collect(),
            seen_papers,
            rounds_completed: self.rounds_completed,
        }
    }

    /// Recompute every score from the full evaluation history.
    pub fn update_scores(&mut self, outcomes: &[EvaluationOutcome]) {
        self.scores = recompute_scores_indexed(&self.id_map, outcomes);
    }

    /// Produce the next round: clusters, pairs and an evaluator for each participant.
    ///
    /// `participants` is the store's current participant list; the first call
    /// fixes it as the roster. `outcomes` is every evaluation recorded so far.
    /// Retry exhaustion never fails the call; it shows up in
    /// `RoundOutcome::warnings`.
    pub fn advance_round(
        &mut self,
        participants: &[ParticipantKey],
        outcomes: &[EvaluationOutcome],
    ) -> Result<RoundOutcome, EngineError> {
        if self.is_initialized() {
            self.warn_about_newcomers(participants);
        } else {
            let id_map = IdMap::from_keys(participants);
            if id_map.len() < MIN_PARTICIPANTS {
                return Err(EngineError::InsufficientParticipants {
                    found: id_map.len(),
                    required: MIN_PARTICIPANTS,
                });
            }
            self.initialize(id_map);
        }

        let round = self.rounds_completed + 1;
        let num = self.id_map.len();
        info!(round, participants = num, evaluations = outcomes.len(), "advancing round");

        self.update_scores(outcomes);
        self.absorb_history(outcomes);

        let mut warnings = Vec::new();

        let clustering = form_clusters_indexed(&self.scores, &self.pairings, &mut self.rng);
        if clustering.clusters.is_empty() {
            warn!(round, unclustered = clustering.unclustered.len(), "no cluster could be formed");
            warnings.push(RoundWarning::DegenerateClustering {
                unclustered: clustering.unclustered.len(),
            });
        }

        let derived = derive_pairs_indexed(&clustering.clusters, &mut self.pairings, &mut self.rng);
        warnings.extend(derived.warnings);

        let search = assign_evaluators_indexed(&self.scores, &derived.pairs, &self.seen, &mut self.rng);
        if search.complete {
            for (evaluator, slot) in search.by_evaluator.iter().enumerate() {
                if let Some(p) = slot {
                    self.seen.record(evaluator, &derived.pairs[*p]);
                }
            }
        } else {
            let assigned = search.assigned_count();
            warn!(
                round,
                assigned,
                participants = num,
                attempts = search.attempts,
                "could not give every participant a pair to evaluate"
            );
            warnings.push(RoundWarning::AssignmentIncomplete {
                assigned,
                participants: num,
                attempts: search.attempts,
            });
        }

        let assignment: Assignment = search
            .by_evaluator
            .iter()
            .enumerate()
            .filter_map(|(evaluator, slot)| {
                slot.map(|p| {
                    (
                        self.id_map.to_key(evaluator).clone(),
                        self.id_map.to_key_pair(&derived.pairs[p]),
                    )
                })
            })
            .collect();

        let clusters = clustering
            .clusters
            .iter()
            .map(|cluster| cluster.iter().map(|&p| self.id_map.to_key(p).clone()).collect())
            .collect();
        let pairs = derived.pairs.iter().map(|p| self.id_map.to_key_pair(p)).collect::<Vec<_>>();

        self.rounds_completed = round;
        info!(round, pairs = pairs.len(), assigned = assignment.len(), warnings = warnings.len(), "round ready");

        Ok(RoundOutcome {
            round,
            clusters,
            pairs,
            assignment,
            warnings,
        })
    }

    /// Fold recorded evaluations into the pairing and seen-papers histories, so
    /// evaluations of partial assignments are remembered too.
    fn absorb_history(&mut self, outcomes: &[EvaluationOutcome]) {
        for outcome in outcomes {
            let Some(pair) = self.id_map.to_idx_pair(&outcome.pair()) else {
                debug!(left = %outcome.left, right = %outcome.right, "evaluation names an unknown participant");
                continue;
            };
            self.pairings.insert(pair);
            if let Some(evaluator) = self.id_map.to_idx(&outcome.evaluator) {
                self.seen.record(evaluator, &pair);
            }
        }
    }

    fn warn_about_newcomers(&self, participants: &[ParticipantKey]) {
        for key in participants {
            if self.id_map.to_idx(key).is_none() {
                warn!(participant = %key, "joined after the roster was fixed; left out of this activity's rounds");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("p{i}@example.test")).collect()
    }

    #[test]
    fn test_engine_basic_workflow() {
        let participants = keys(6);
        let mut engine = RoundEngine::with_seed(42);

        let outcome = engine.advance_round(&participants, &[]).unwrap();
        assert_eq!(outcome.round, 1);
        assert_eq!(outcome.clusters.len(), 2);
        assert_eq!(outcome.pairs.len(), 6);
        assert_eq!(outcome.assignment.len(), 6);
        assert!(outcome.is_clean());

        for (evaluator, pair) in &outcome.assignment {
            assert!(!pair.contains(evaluator));
            assert!(participants.contains(pair.first()));
            assert!(participants.contains(pair.second()));
        }
        assert_eq!(engine.rounds_completed(), 1);
        assert_eq!(engine.pairing_count(), 6);
    }

    #[test]
    fn test_engine_requires_two_participants() {
        let mut engine = RoundEngine::with_seed(1);
        let err = engine.advance_round(&keys(1), &[]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientParticipants { found: 1, required: 2 }
        ));
        assert!(!engine.is_initialized());
    }

    #[test]
    fn test_two_participants_degrade_instead_of_failing() {
        let mut engine = RoundEngine::with_seed(1);
        let outcome = engine.advance_round(&keys(2), &[]).unwrap();

        assert!(outcome.pairs.is_empty());
        assert!(outcome.assignment.is_empty());
        assert!(outcome.warnings.contains(&RoundWarning::DegenerateClustering { unclustered: 2 }));
        assert!(outcome
            .warnings
            .iter()
            .any(|w| matches!(w, RoundWarning::AssignmentIncomplete { assigned: 0, .. })));
    }

    #[test]
    fn test_duplicate_participants_collapse() {
        let mut participants = keys(6);
        participants.push(participants[0].clone());
        let mut engine = RoundEngine::with_seed(3);
        let outcome = engine.advance_round(&participants, &[]).unwrap();
        assert_eq!(engine.roster().len(), 6);
        assert_eq!(outcome.assignment.len(), 6);
    }

    #[test]
    fn test_scores_follow_history() {
        let participants = keys(3);
        let mut engine = RoundEngine::with_seed(5);
        engine.advance_round(&participants, &[]).unwrap();

        let outcomes = vec![EvaluationOutcome::new(
            participants[2].as_str(),
            participants[0].as_str(),
            participants[1].as_str(),
            participants[1].as_str(),
        )
        .in_round(1)];
        engine.update_scores(&outcomes);
        let once = engine.scores();
        engine.update_scores(&outcomes);
        assert_eq!(engine.scores(), once);
        assert_eq!(engine.score(&participants[1]), Some(1));
        assert_eq!(engine.score("nobody"), None);
    }

    #[test]
    fn test_reset_forgets_roster_and_history() {
        let mut engine = RoundEngine::with_seed(9);
        engine.advance_round(&keys(6), &[]).unwrap();
        engine.reset();

        assert!(!engine.is_initialized());
        assert_eq!(engine.pairing_count(), 0);
        assert_eq!(engine.rounds_completed(), 0);

        let outcome = engine.advance_round(&keys(9), &[]).unwrap();
        assert_eq!(outcome.round, 1);
        assert_eq!(engine.roster().len(), 9);
    }

    #[test]
    fn test_state_round_trips_through_restore() {
        let participants = keys(6);
        let mut engine = RoundEngine::with_seed(17);
        let outcome = engine.advance_round(&participants, &[]).unwrap();

        let state = engine.state();
        assert_eq!(state.rounds_completed, 1);
        assert_eq!(state.pairings.len(), 6);

        let restored = RoundEngine::restore_with_seed(state.clone(), 17);
        assert_eq!(restored.state(), state);
        for (evaluator, pair) in &outcome.assignment {
            assert!(restored.has_seen(evaluator, pair.first()));
            assert!(restored.has_seen(evaluator, pair.second()));
            assert!(restored.has_been_paired(pair.first(), pair.second()));
        }
    }

    #[test]
    fn test_newcomers_after_first_round_are_ignored() {
        let mut engine = RoundEngine::with_seed(23);
        engine.advance_round(&keys(6), &[]).unwrap();
        let outcome = engine.advance_round(&keys(7), &[]).unwrap();
        assert_eq!(engine.roster().len(), 6);
        assert!(!outcome.assignment.contains_key("p7@example.test"));
    }

    /// Seven participants where the last has already judged everyone else, so
    /// round 1 can only ever be partially assigned.
    fn engine_with_exhausted_judge(seed: u64) -> (RoundEngine, Vec<String>) {
        let participants = keys(7);
        let mut seen_papers = BTreeMap::new();
        seen_papers.insert(participants[6].clone(), participants[..6].iter().cloned().collect());
        let state = EngineState {
            roster: participants.clone(),
            seen_papers,
            ..EngineState::default()
        };
        (RoundEngine::restore_with_seed(state, seed), participants)
    }

    #[test]
    fn test_incomplete_assignment_is_not_committed() {
        for seed in 0..10 {
            let (mut engine, participants) = engine_with_exhausted_judge(seed);
            let before = engine.state().seen_papers;
            let outcome = engine.advance_round(&participants, &[]).unwrap();

            assert!(!outcome.assignment.is_empty());
            assert!(!outcome.assignment.contains_key(&participants[6]));
            assert!(outcome
                .warnings
                .iter()
                .any(|w| matches!(w, RoundWarning::AssignmentIncomplete { participants: 7, .. })));

            for (evaluator, pair) in &outcome.assignment {
                assert!(!engine.has_seen(evaluator, pair.first()), "seed {seed}");
                assert!(!engine.has_seen(evaluator, pair.second()), "seed {seed}");
            }
            assert_eq!(engine.state().seen_papers, before);
        }
    }

    #[test]
    fn test_recorded_outcomes_of_partial_round_feed_histories() {
        for seed in 0..10 {
            let (mut engine, participants) = engine_with_exhausted_judge(seed);
            let first = engine.advance_round(&participants, &[]).unwrap();

            let outcomes: Vec<EvaluationOutcome> = first
                .assignment
                .iter()
                .map(|(evaluator, pair)| {
                    EvaluationOutcome::new(evaluator.as_str(), pair.first().as_str(), pair.second().as_str(), pair.first().as_str())
                        .in_round(1)
                })
                .collect();
            let second = engine.advance_round(&participants, &outcomes).unwrap();

            for (evaluator, pair) in &first.assignment {
                assert!(engine.has_seen(evaluator, pair.first()), "seed {seed}");
                assert!(engine.has_seen(evaluator, pair.second()), "seed {seed}");
                assert!(engine.has_been_paired(pair.first(), pair.second()));

                if let Some(next) = second.assignment.get(evaluator) {
                    assert!(!next.contains(pair.first()), "seed {seed}: {evaluator} judged {} again", pair.first());
                    assert!(!next.contains(pair.second()), "seed {seed}: {evaluator} judged {} again", pair.second());
                }
            }
        }
    }
}
