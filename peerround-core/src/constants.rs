/// Fewest participants an activity needs before a round can be advanced.
///
/// Two is accepted but cannot form a triad, so such a round comes back empty
/// with `RoundWarning::DegenerateClustering`.
pub const MIN_PARTICIPANTS: usize = 2;

/// Members of a regular cluster. Every member of a triad is compared against
/// the other two exactly once in the round.
pub const CLUSTER_SIZE: usize = 3;

/// Reshuffles tried for an oversized cluster before the cyclic pairing is
/// emitted even though it repeats an earlier pairing.
pub const MAX_PAIRING_ATTEMPTS: usize = 1000;

/// Randomized greedy passes tried when matching evaluators to pairs.
pub const MAX_ASSIGNMENT_ATTEMPTS: usize = 1000;
