use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::warn;

/// Caller-provided participant key (typically the submitter's email).
pub type ParticipantKey = String;

/// Two participants whose submissions are compared against each other.
///
/// Members are stored in sorted order, so `UnorderedPair::new(a, b)` and
/// `UnorderedPair::new(b, a)` are equal and hash identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(
        into = "[T; 2]",
        from = "[T; 2]",
        bound(
            serialize = "T: serde::Serialize + Clone",
            deserialize = "T: serde::Deserialize<'de> + Ord"
        )
    )
)]
pub struct UnorderedPair<T> {
    low: T,
    high: T,
}

impl<T: Ord> UnorderedPair<T> {
    pub fn new(a: T, b: T) -> Self {
        if a <= b {
            UnorderedPair { low: a, high: b }
        } else {
            UnorderedPair { low: b, high: a }
        }
    }
}

impl<T> UnorderedPair<T> {
    pub fn first(&self) -> &T {
        &self.low
    }

    pub fn second(&self) -> &T {
        &self.high
    }

    pub fn members(&self) -> [&T; 2] {
        [&self.low, &self.high]
    }
}

impl<T: PartialEq> UnorderedPair<T> {
    pub fn contains(&self, member: &T) -> bool {
        self.low == *member || self.high == *member
    }
}

impl<T: Ord> From<[T; 2]> for UnorderedPair<T> {
    fn from([a, b]: [T; 2]) -> Self {
        UnorderedPair::new(a, b)
    }
}

impl<T> From<UnorderedPair<T>> for [T; 2] {
    fn from(pair: UnorderedPair<T>) -> Self {
        [pair.low, pair.high]
    }
}

/// One recorded evaluation: `evaluator` compared `left` against `right`,
/// picked `winner`, and optionally wrote feedback on each submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EvaluationOutcome {
    pub evaluator: ParticipantKey,
    pub left: ParticipantKey,
    pub right: ParticipantKey,
    /// Must be either `left` or `right`.
    pub winner: ParticipantKey,
    /// Round the evaluation was submitted in, when the store tracks it.
    #[cfg_attr(feature = "serde", serde(default))]
    pub round: Option<usize>,
    /// Feedback written for `left`'s author.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub left_comments: Option<String>,
    /// Feedback written for `right`'s author.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub right_comments: Option<String>,
    /// Authors who marked this feedback as helpful.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "BTreeSet::is_empty"))]
    pub stars: BTreeSet<ParticipantKey>,
}

impl EvaluationOutcome {
    pub fn new(
        evaluator: impl Into<ParticipantKey>,
        left: impl Into<ParticipantKey>,
        right: impl Into<ParticipantKey>,
        winner: impl Into<ParticipantKey>,
    ) -> Self {
        EvaluationOutcome {
            evaluator: evaluator.into(),
            left: left.into(),
            right: right.into(),
            winner: winner.into(),
            ..Default::default()
        }
    }

    pub fn in_round(mut self, round: usize) -> Self {
        self.round = Some(round);
        self
    }

    pub fn pair(&self) -> UnorderedPair<ParticipantKey> {
        UnorderedPair::new(self.left.clone(), self.right.clone())
    }

    /// The feedback addressed to `participant`, if they were in this pair
    /// and the evaluator wrote any.
    pub fn comments_for(&self, participant: &str) -> Option<&str> {
        let comments = if self.left == participant {
            &self.left_comments
        } else if self.right == participant {
            &self.right_comments
        } else {
            return None;
        };
        comments.as_deref().filter(|c| !c.trim().is_empty())
    }

    /// Toggle `author`'s star on this evaluation. Returns whether it is now starred.
    pub fn toggle_star(&mut self, author: &str) -> bool {
        if self.stars.remove(author) {
            false
        } else {
            self.stars.insert(author.to_string());
            true
        }
    }
}

/// Evaluator key → the pair that evaluator judges this round.
pub type Assignment = BTreeMap<ParticipantKey, UnorderedPair<ParticipantKey>>;

/// Everything one call to `advance_round` produced.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoundOutcome {
    /// 1-based number of the round just produced.
    pub round: usize,
    pub clusters: Vec<Vec<ParticipantKey>>,
    pub pairs: Vec<UnorderedPair<ParticipantKey>>,
    pub assignment: Assignment,
    /// Degraded-but-usable conditions hit while building the round.
    pub warnings: Vec<crate::error::RoundWarning>,
}

impl RoundOutcome {
    /// True when no warning was raised: every participant judges one pair and
    /// no pairing repeats an earlier round.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// A participant's aggregated record across every evaluation so far.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Standing {
    /// Competition rank: tied participants share a rank and the next rank skips.
    pub rank: usize,
    pub participant: ParticipantKey,
    pub wins: u32,
    pub losses: u32,
    /// Evaluations this participant submitted as a judge.
    pub evaluations_given: u32,
}

impl Standing {
    pub fn comparisons(&self) -> u32 {
        self.wins + self.losses
    }
}

/// Internal pair of roster indices.
pub(crate) type IndexedPair = UnorderedPair<usize>;

/// Maps between caller participant keys and internal 0..N indices.
#[derive(Debug, Clone, Default)]
pub(crate) struct IdMap {
    keys: Vec<ParticipantKey>,
    key_to_idx: HashMap<ParticipantKey, usize>,
}

impl IdMap {
    /// Build a map from caller keys. Repeated keys collapse onto their first
    /// occurrence.
    pub fn from_keys(keys: &[ParticipantKey]) -> Self {
        let mut map = IdMap {
            keys: Vec::with_capacity(keys.len()),
            key_to_idx: HashMap::with_capacity(keys.len()),
        };
        for key in keys {
            if map.key_to_idx.contains_key(key) {
                warn!(participant = %key, "duplicate participant key ignored");
                continue;
            }
            map.key_to_idx.insert(key.clone(), map.keys.len());
            map.keys.push(key.clone());
        }
        map
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[ParticipantKey] {
        &self.keys
    }

    pub fn to_idx(&self, key: &str) -> Option<usize> {
        self.key_to_idx.get(key).copied()
    }

    pub fn to_key(&self, idx: usize) -> &ParticipantKey {
        &self.keys[idx]
    }

    pub fn to_key_pair(&self, pair: &IndexedPair) -> UnorderedPair<ParticipantKey> {
        UnorderedPair::new(
            self.to_key(*pair.first()).clone(),
            self.to_key(*pair.second()).clone(),
        )
    }

    pub fn to_idx_pair(&self, pair: &UnorderedPair<ParticipantKey>) -> Option<IndexedPair> {
        Some(UnorderedPair::new(
            self.to_idx(pair.first())?,
            self.to_idx(pair.second())?,
        ))
    }
}
