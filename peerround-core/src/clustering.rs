/// Grouping participants into triads of similar score.
use rand::seq::SliceRandom;
use rand::Rng;

use crate::constants::CLUSTER_SIZE;
use crate::pairing::PairingHistory;

/// Result of clustering one round.
#[derive(Debug, Default)]
pub(crate) struct Clustering {
    pub clusters: Vec<Vec<usize>>,
    /// Participants left out because no cluster formed at all. Empty whenever
    /// `clusters` is non-empty, since stragglers join the last cluster.
    pub unclustered: Vec<usize>,
}

/// Order participants for clustering: random shuffle, then a stable sort by
/// score descending so equal scores stay in shuffled order.
pub(crate) fn score_order_descending(scores: &[u32], rng: &mut impl Rng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.shuffle(rng);
    order.sort_by(|&a, &b| scores[b].cmp(&scores[a]));
    order
}

/// Greedily form triads whose three members have never been paired with each other.
///
/// Scans participants from highest to lowest score. For each one not yet
/// grouped, looks further down the order for a second and third ungrouped
/// participant such that none of the three pairings is in `history`. Anyone
/// left over at the end joins the last triad formed, producing one oversized
/// cluster instead of leaving them out.
pub(crate) fn form_clusters_indexed(
    scores: &[u32],
    history: &PairingHistory,
    rng: &mut impl Rng,
) -> Clustering {
    let order = score_order_descending(scores, rng);
    let n = order.len();
    let mut grouped = vec![false; scores.len()];
    let mut clusters: Vec<Vec<usize>> = Vec::with_capacity(n / CLUSTER_SIZE);

    for (i, &a) in order.iter().enumerate() {
        if grouped[a] {
            continue;
        }
        if let Some((b, c)) = find_partners(a, &order[i + 1..], &grouped, history) {
            for member in [a, b, c] {
                grouped[member] = true;
            }
            clusters.push(vec![a, b, c]);
        }
    }

    let stragglers: Vec<usize> = order.into_iter().filter(|&p| !grouped[p]).collect();

    match clusters.last_mut() {
        Some(last) => {
            last.extend(stragglers);
            Clustering { clusters, unclustered: Vec::new() }
        }
        None => Clustering { clusters, unclustered: stragglers },
    }
}

fn find_partners(
    a: usize,
    candidates: &[usize],
    grouped: &[bool],
    history: &PairingHistory,
) -> Option<(usize, usize)> {
    for (j, &b) in candidates.iter().enumerate() {
        if grouped[b] || history.contains(a, b) {
            continue;
        }
        for &c in &candidates[j + 1..] {
            if !grouped[c] && !history.contains(a, c) && !history.contains(b, c) {
                return Some((b, c));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UnorderedPair;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn covered(clustering: &Clustering, n: usize) -> Vec<usize> {
        let mut counts = vec![0; n];
        for cluster in &clustering.clusters {
            for &p in cluster {
                counts[p] += 1;
            }
        }
        counts
    }

    #[test]
    fn test_multiple_of_three_forms_exact_triads() {
        let mut rng = StdRng::seed_from_u64(11);
        let scores = vec![0; 9];
        let clustering = form_clusters_indexed(&scores, &PairingHistory::default(), &mut rng);

        assert_eq!(clustering.clusters.len(), 3);
        assert!(clustering.clusters.iter().all(|c| c.len() == 3));
        assert_eq!(covered(&clustering, 9), vec![1; 9]);
        assert!(clustering.unclustered.is_empty());
    }

    #[test]
    fn test_stragglers_fold_into_last_cluster() {
        let mut rng = StdRng::seed_from_u64(5);
        let scores = vec![0; 8];
        let clustering = form_clusters_indexed(&scores, &PairingHistory::default(), &mut rng);

        assert_eq!(clustering.clusters.len(), 2);
        assert_eq!(clustering.clusters[0].len(), 3);
        assert_eq!(clustering.clusters[1].len(), 5);
        assert_eq!(covered(&clustering, 8), vec![1; 8]);
    }

    #[test]
    fn test_similar_scores_cluster_together() {
        let mut rng = StdRng::seed_from_u64(2);
        let scores = vec![0, 9, 1, 8, 2, 7];
        let clustering = form_clusters_indexed(&scores, &PairingHistory::default(), &mut rng);

        let mut top = clustering.clusters[0].clone();
        top.sort();
        assert_eq!(top, vec![1, 3, 5]);
    }

    #[test]
    fn test_history_blocks_triads() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut history = PairingHistory::default();
        for (a, b) in [(0, 1), (0, 2), (1, 2)] {
            history.insert(UnorderedPair::new(a, b));
        }
        let clustering = form_clusters_indexed(&[0, 0, 0], &history, &mut rng);

        assert!(clustering.clusters.is_empty());
        let mut left = clustering.unclustered.clone();
        left.sort();
        assert_eq!(left, vec![0, 1, 2]);
    }

    #[test]
    fn test_score_order_is_descending() {
        let mut rng = StdRng::seed_from_u64(4);
        let scores = vec![1, 3, 2, 3, 0];
        let order = score_order_descending(&scores, &mut rng);
        let ordered: Vec<u32> = order.iter().map(|&i| scores[i]).collect();
        assert_eq!(ordered, vec![3, 3, 2, 1, 0]);
    }
}
