/// Win-count scoring and standings.
///
/// Scores are a derived view: recomputed from the full evaluation history on
/// every call, never adjusted incrementally. Pure functions, no state.
use std::collections::HashMap;

use tracing::warn;

use crate::types::{EvaluationOutcome, IdMap, ParticipantKey, Standing};

/// Count wins per roster index. Winners outside the roster are skipped.
pub(crate) fn recompute_scores_indexed(id_map: &IdMap, outcomes: &[EvaluationOutcome]) -> Vec<u32> {
    let mut scores = vec![0u32; id_map.len()];
    for outcome in outcomes {
        match id_map.to_idx(&outcome.winner) {
            Some(idx) => scores[idx] += 1,
            None => warn!(winner = %outcome.winner, "evaluation winner is not on the roster; not scored"),
        }
    }
    scores
}

/// Win counts for every participant in `roster`, in roster order.
pub fn compute_scores(roster: &[ParticipantKey], outcomes: &[EvaluationOutcome]) -> Vec<(ParticipantKey, u32)> {
    let id_map = IdMap::from_keys(roster);
    let scores = recompute_scores_indexed(&id_map, outcomes);
    id_map.keys().iter().cloned().zip(scores).collect()
}

/// Aggregate every evaluation into ranked standings.
///
/// Sorted by wins descending, then by key so the listing is stable. Tied
/// participants share a rank ("1, 2, 2, 4").
pub fn standings(roster: &[ParticipantKey], outcomes: &[EvaluationOutcome]) -> Vec<Standing> {
    let id_map = IdMap::from_keys(roster);
    let num = id_map.len();

    let wins = recompute_scores_indexed(&id_map, outcomes);
    let mut losses = vec![0u32; num];
    let mut given = vec![0u32; num];

    for outcome in outcomes {
        if let Some(idx) = id_map.to_idx(&outcome.evaluator) {
            given[idx] += 1;
        }
        let loser = if outcome.winner == outcome.left { &outcome.right } else { &outcome.left };
        if let Some(idx) = id_map.to_idx(loser) {
            losses[idx] += 1;
        }
    }

    let mut order: Vec<usize> = (0..num).collect();
    order.sort_by(|&a, &b| wins[b].cmp(&wins[a]).then_with(|| id_map.to_key(a).cmp(id_map.to_key(b))));

    let mut result = Vec::with_capacity(num);
    let mut rank = 0;
    for (position, &idx) in order.iter().enumerate() {
        if position == 0 || wins[idx] != wins[order[position - 1]] {
            rank = position + 1;
        }
        result.push(Standing {
            rank,
            participant: id_map.to_key(idx).clone(),
            wins: wins[idx],
            losses: losses[idx],
            evaluations_given: given[idx],
        });
    }
    result
}

/// Wins keyed by participant, for callers that want lookups over listings.
pub fn score_map(roster: &[ParticipantKey], outcomes: &[EvaluationOutcome]) -> HashMap<ParticipantKey, u32> {
    compute_scores(roster, outcomes).into_iter().collect()
}
