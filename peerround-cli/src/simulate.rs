/// Simulate command: runs a whole activity in memory with scripted verdicts.
///
/// Participant i always beats participant j when i < j, so after a few rounds
/// the standings should come out in index order. Every round is checked for
/// coverage (evaluations, distinct evaluators, distinct pairs) the same way
/// an operator would eyeball a live activity.
use std::collections::{HashMap, HashSet};

use peerround_core::{
    standings, ActivityRounds, EngineError, EvaluationOutcome, MemoryStore, RoundWarning, Standing,
};
use serde::Serialize;
use tracing::{debug, info};

const ACTIVITY_ID: &str = "simulation";

#[derive(Debug, Serialize)]
pub struct SimulationRound {
    pub round: usize,
    pub evaluations: usize,
    pub unique_evaluators: usize,
    pub unique_pairs: usize,
    pub warnings: Vec<RoundWarning>,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub participants: usize,
    pub rounds: Vec<SimulationRound>,
    pub standings: Vec<Standing>,
}

pub fn participant_key(i: usize) -> String {
    format!("participant{i}@example.test")
}

pub async fn run_simulation(
    participants: usize,
    rounds: usize,
    seed: Option<u64>,
) -> Result<SimulationReport, EngineError> {
    let keys: Vec<String> = (1..=participants).map(participant_key).collect();
    let strength: HashMap<&str, usize> = keys.iter().enumerate().map(|(i, k)| (k.as_str(), i)).collect();

    let mut store = MemoryStore::new();
    store.create_activity(ACTIVITY_ID, keys.clone());
    let mut registry = match seed {
        Some(seed) => ActivityRounds::with_seed(seed),
        None => ActivityRounds::new(),
    };

    let mut report_rounds = Vec::with_capacity(rounds);
    for _ in 0..rounds {
        let outcome = registry.advance_round(&store, ACTIVITY_ID).await?;

        let mut evaluators = HashSet::new();
        let mut pairs = HashSet::new();
        for (evaluator, pair) in &outcome.assignment {
            let winner = if strength[pair.first().as_str()] < strength[pair.second().as_str()] {
                pair.first()
            } else {
                pair.second()
            };
            debug!(round = outcome.round, %evaluator, %winner, "scripted verdict");
            let verdict = EvaluationOutcome::new(
                evaluator.as_str(),
                pair.first().as_str(),
                pair.second().as_str(),
                winner.as_str(),
            );
            store.record(ACTIVITY_ID, verdict.in_round(outcome.round));
            evaluators.insert(evaluator);
            pairs.insert(pair);
        }

        info!(
            round = outcome.round,
            evaluations = outcome.assignment.len(),
            warnings = outcome.warnings.len(),
            "simulated round"
        );
        report_rounds.push(SimulationRound {
            round: outcome.round,
            evaluations: outcome.assignment.len(),
            unique_evaluators: evaluators.len(),
            unique_pairs: pairs.len(),
            warnings: outcome.warnings.clone(),
        });
    }

    Ok(SimulationReport {
        participants,
        rounds: report_rounds,
        standings: standings(&keys, store.recorded(ACTIVITY_ID)),
    })
}
