//! peerround-core: round pairing and evaluator assignment for multi-round peer review.
//!
//! Participants submit work, get grouped into triads of similar score, have
//! their submissions compared head-to-head, and judge exactly one other pair
//! per round. Across the whole activity no two submissions are compared twice
//! and no evaluator judges the same submission twice (best effort: the search
//! is a bounded-retry heuristic, and falls back to a degraded round with a
//! `RoundWarning` rather than failing).
//!
//! Participants are identified by caller-provided string keys (emails work
//! well). The crate maps them to internal indices itself.
//!
//! # Quick start
//!
//! ```rust
//! use peerround_core::RoundEngine;
//!
//! let participants: Vec<String> = (1..=6).map(|i| format!("student{i}@example.test")).collect();
//!
//! let mut engine = RoundEngine::with_seed(7);
//! let round = engine.advance_round(&participants, &[]).unwrap();
//!
//! for (evaluator, pair) in &round.assignment {
//!     println!("{evaluator} judges {} vs {}", pair.first(), pair.second());
//! }
//! assert_eq!(round.assignment.len(), 6);
//! ```

pub mod activity;
pub mod constants;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod scoring;
pub mod types;

mod assignment;
mod clustering;
mod pairing;

// Re-export primary public API at crate root.
pub use activity::{ActivityRounds, ActivityStore, MemoryStore};
pub use engine::{EngineState, RoundEngine};
pub use error::{EngineError, RoundWarning, StoreError};
pub use feedback::{feedback_for, ReceivedFeedback};
pub use scoring::{compute_scores, score_map, standings};
pub use types::{
    Assignment, EvaluationOutcome, ParticipantKey, RoundOutcome, Standing, UnorderedPair,
};
