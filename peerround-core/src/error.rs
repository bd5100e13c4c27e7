//! Error and warning types for round advancement.

use thiserror::Error;

/// Hard failures: the round cannot be advanced at all.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("need at least {required} participants to advance a round, found {found}")]
    InsufficientParticipants { found: usize, required: usize },

    #[error("activity not found: {0}")]
    ActivityNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures reading from (or writing to) the store that backs an activity.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed activity data: {0}")]
    Malformed(String),
}

/// Degraded outcomes. The round is still produced; these say what was given up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum RoundWarning {
    /// No triad could be formed, so these participants are in no pair.
    #[error("no cluster could be formed; {unclustered} participants left without a pairing")]
    DegenerateClustering { unclustered: usize },

    /// An oversized cluster kept colliding with earlier pairings; its cyclic
    /// pairing was emitted anyway and repeats at least one of them.
    #[error("cluster of {cluster_size} repeats an earlier pairing after {attempts} attempts")]
    PairingConflictUnresolved { cluster_size: usize, attempts: usize },

    /// Not every participant could be given a pair to judge.
    #[error("only {assigned} of {participants} participants received an evaluation pair after {attempts} attempts")]
    AssignmentIncomplete {
        assigned: usize,
        participants: usize,
        attempts: usize,
    },
}
