/// Comparison pairs derived from clusters, and the activity-wide record of
/// every pair compared so far.
///
/// Works on roster indices; `engine` maps them back to participant keys.
use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::constants::{CLUSTER_SIZE, MAX_PAIRING_ATTEMPTS};
use crate::error::RoundWarning;
use crate::types::{IndexedPair, UnorderedPair};

/// Every pair that has been compared in any round of the activity.
///
/// Insertion order is kept alongside the set so snapshots list pairings in
/// the order they happened.
#[derive(Debug, Clone, Default)]
pub(crate) struct PairingHistory {
    seen: HashSet<IndexedPair>,
    ordered: Vec<IndexedPair>,
}

impl PairingHistory {
    pub fn contains(&self, a: usize, b: usize) -> bool {
        self.seen.contains(&UnorderedPair::new(a, b))
    }

    pub fn contains_pair(&self, pair: &IndexedPair) -> bool {
        self.seen.contains(pair)
    }

    /// Returns false when the pair was already recorded.
    pub fn insert(&mut self, pair: IndexedPair) -> bool {
        if self.seen.insert(pair) {
            self.ordered.push(pair);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexedPair> {
        self.ordered.iter()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.ordered.clear();
    }
}

/// Pairs produced for one round, plus any warnings raised on the way.
#[derive(Debug, Default)]
pub(crate) struct RoundPairs {
    pub pairs: Vec<IndexedPair>,
    pub warnings: Vec<RoundWarning>,
}

/// Turn this round's clusters into comparison pairs and append them to `history`.
///
/// A triad yields all three of its pairs. A larger cluster is paired in a
/// cycle (member i against member i+1, wrapping), reshuffled until the cycle
/// avoids `history` or `MAX_PAIRING_ATTEMPTS` runs out, in which case the last
/// cycle tried is used regardless.
pub(crate) fn derive_pairs_indexed(
    clusters: &[Vec<usize>],
    history: &mut PairingHistory,
    rng: &mut impl Rng,
) -> RoundPairs {
    let mut round = RoundPairs::default();

    for cluster in clusters {
        match cluster.len() {
            CLUSTER_SIZE => {
                let (a, b, c) = (cluster[0], cluster[1], cluster[2]);
                round.pairs.push(UnorderedPair::new(a, b));
                round.pairs.push(UnorderedPair::new(a, c));
                round.pairs.push(UnorderedPair::new(b, c));
            }
            n if n > CLUSTER_SIZE => {
                let (pairs, clean) = cyclic_pairing_avoiding(cluster, history, rng);
                if !clean {
                    warn!(
                        cluster_size = n,
                        attempts = MAX_PAIRING_ATTEMPTS,
                        "no history-clean cyclic pairing found; emitting a repeat"
                    );
                    round.warnings.push(RoundWarning::PairingConflictUnresolved {
                        cluster_size: n,
                        attempts: MAX_PAIRING_ATTEMPTS,
                    });
                }
                round.pairs.extend(pairs);
            }
            n => debug!(cluster_size = n, "cluster too small to pair; skipped"),
        }
    }

    for pair in &round.pairs {
        history.insert(*pair);
    }

    round
}

/// Returns the pairing and whether it avoids every historical pair.
fn cyclic_pairing_avoiding(
    cluster: &[usize],
    history: &PairingHistory,
    rng: &mut impl Rng,
) -> (Vec<IndexedPair>, bool) {
    let mut members = cluster.to_vec();
    let mut tentative = Vec::with_capacity(members.len());

    for attempt in 1..=MAX_PAIRING_ATTEMPTS {
        members.shuffle(rng);
        tentative = cyclic_pairs(&members);
        if tentative.iter().all(|pair| !history.contains_pair(pair)) {
            debug!(attempt, cluster_size = members.len(), "cyclic pairing accepted");
            return (tentative, true);
        }
    }

    (tentative, false)
}

fn cyclic_pairs(members: &[usize]) -> Vec<IndexedPair> {
    let n = members.len();
    (0..n)
        .map(|i| UnorderedPair::new(members[i], members[(i + 1) % n]))
        .collect()
}
