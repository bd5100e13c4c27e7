/// Evaluator assignment: one pair per participant to judge.
///
/// Bounded randomized greedy search. Each attempt walks the participants from
/// lowest to highest score (ties shuffled) and hands each the first free pair
/// they may judge. An attempt only counts if everyone got a pair.
use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::constants::MAX_ASSIGNMENT_ATTEMPTS;
use crate::types::IndexedPair;

/// Per-evaluator record of whose submissions they have already judged.
#[derive(Debug, Clone, Default)]
pub(crate) struct SeenPapers {
    by_evaluator: Vec<HashSet<usize>>,
}

impl SeenPapers {
    pub fn new(num_participants: usize) -> Self {
        SeenPapers {
            by_evaluator: vec![HashSet::new(); num_participants],
        }
    }

    pub fn has_seen(&self, evaluator: usize, subject: usize) -> bool {
        self.by_evaluator
            .get(evaluator)
            .is_some_and(|seen| seen.contains(&subject))
    }

    pub fn mark(&mut self, evaluator: usize, subject: usize) {
        if let Some(seen) = self.by_evaluator.get_mut(evaluator) {
            seen.insert(subject);
        }
    }

    pub fn record(&mut self, evaluator: usize, pair: &IndexedPair) {
        self.mark(evaluator, *pair.first());
        self.mark(evaluator, *pair.second());
    }

    /// Whether `evaluator` may judge `pair` at all.
    pub fn can_judge(&self, evaluator: usize, pair: &IndexedPair) -> bool {
        !pair.contains(&evaluator)
            && !self.has_seen(evaluator, *pair.first())
            && !self.has_seen(evaluator, *pair.second())
    }

    pub fn seen_by(&self, evaluator: usize) -> impl Iterator<Item = usize> + '_ {
        self.by_evaluator
            .get(evaluator)
            .into_iter()
            .flat_map(|seen| seen.iter().copied())
    }

    pub fn clear(&mut self) {
        for seen in &mut self.by_evaluator {
            seen.clear();
        }
    }
}

/// Outcome of the assignment search.
#[derive(Debug)]
pub(crate) struct AssignmentSearch {
    /// `by_evaluator[e]` is the index into the round's pairs that `e` judges.
    pub by_evaluator: Vec<Option<usize>>,
    pub complete: bool,
    pub attempts: usize,
}

impl AssignmentSearch {
    pub fn assigned_count(&self) -> usize {
        self.by_evaluator.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Search for an assignment covering every participant.
///
/// Never commits anything to `seen`; the caller records seen papers only for
/// a complete result. When every attempt falls short, the last attempt's
/// partial assignment is returned.
pub(crate) fn assign_evaluators_indexed(
    scores: &[u32],
    pairs: &[IndexedPair],
    seen: &SeenPapers,
    rng: &mut impl Rng,
) -> AssignmentSearch {
    let num = scores.len();
    let mut last = vec![None; num];

    for attempt in 1..=MAX_ASSIGNMENT_ATTEMPTS {
        let mut evaluators: Vec<usize> = (0..num).collect();
        evaluators.shuffle(rng);
        evaluators.sort_by_key(|&e| scores[e]);

        last = greedy_pass(&evaluators, pairs, seen, num);

        if last.iter().all(Option::is_some) {
            debug!(attempt, "every participant assigned a pair");
            return AssignmentSearch {
                by_evaluator: last,
                complete: true,
                attempts: attempt,
            };
        }
    }

    AssignmentSearch {
        by_evaluator: last,
        complete: false,
        attempts: MAX_ASSIGNMENT_ATTEMPTS,
    }
}

fn greedy_pass(
    evaluators: &[usize],
    pairs: &[IndexedPair],
    seen: &SeenPapers,
    num: usize,
) -> Vec<Option<usize>> {
    let mut taken = vec![false; pairs.len()];
    let mut by_evaluator = vec![None; num];

    for &evaluator in evaluators {
        let choice = pairs
            .iter()
            .enumerate()
            .find(|&(p, pair)| !taken[p] && seen.can_judge(evaluator, pair))
            .map(|(p, _)| p);

        if let Some(p) = choice {
            taken[p] = true;
            by_evaluator[evaluator] = Some(p);
        }
    }

    by_evaluator
}
