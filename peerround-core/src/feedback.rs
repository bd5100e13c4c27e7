/// Written feedback as seen by the author it was addressed to.
use std::collections::HashSet;

use crate::types::{EvaluationOutcome, ParticipantKey};

/// One evaluator's feedback on `participant`'s submission.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReceivedFeedback {
    pub round: Option<usize>,
    pub evaluator: ParticipantKey,
    /// Whether `participant` won that comparison.
    pub won: bool,
    pub comments: Option<String>,
    /// `participant` starred this feedback as helpful.
    pub starred: bool,
}

/// Every evaluation of `participant`'s submission, oldest round first.
///
/// An evaluator counts once per round, even if the history holds the same
/// submission twice.
pub fn feedback_for(participant: &str, outcomes: &[EvaluationOutcome]) -> Vec<ReceivedFeedback> {
    let mut seen = HashSet::new();
    let mut received: Vec<ReceivedFeedback> = outcomes
        .iter()
        .filter(|o| o.left == participant || o.right == participant)
        .filter(|o| seen.insert((o.evaluator.as_str(), o.round)))
        .map(|o| ReceivedFeedback {
            round: o.round,
            evaluator: o.evaluator.clone(),
            won: o.winner == participant,
            comments: o.comments_for(participant).map(str::to_string),
            starred: o.stars.contains(participant),
        })
        .collect();
    received.sort_by_key(|f| f.round);
    received
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_lists_only_own_comments() {
        let mut first = EvaluationOutcome::new("c", "a", "b", "a").in_round(2);
        first.left_comments = Some("strong opening".to_string());
        first.right_comments = Some("needs sources".to_string());
        first.toggle_star("a");
        let mut second = EvaluationOutcome::new("d", "b", "a", "b").in_round(1);
        second.right_comments = Some("too long".to_string());
        let unrelated = EvaluationOutcome::new("a", "b", "c", "c").in_round(1);

        let received = feedback_for("a", &[first, second, unrelated]);
        assert_eq!(received.len(), 2);

        assert_eq!(received[0].round, Some(1));
        assert_eq!(received[0].evaluator, "d");
        assert!(!received[0].won);
        assert_eq!(received[0].comments.as_deref(), Some("too long"));
        assert!(!received[0].starred);

        assert_eq!(received[1].round, Some(2));
        assert!(received[1].won);
        assert_eq!(received[1].comments.as_deref(), Some("strong opening"));
        assert!(received[1].starred);
    }

    #[test]
    fn test_duplicate_evaluations_count_once() {
        let outcome = EvaluationOutcome::new("c", "a", "b", "a").in_round(1);
        let received = feedback_for("a", &[outcome.clone(), outcome]);
        assert_eq!(received.len(), 1);
    }
}
