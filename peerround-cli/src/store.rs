/// JSON activity files.
///
/// One file holds one activity: its participants, the current round's
/// assignment, every evaluation recorded so far, and the round engine's saved
/// state so the next `advance` picks up where the last one stopped.
use std::path::{Path, PathBuf};

use peerround_core::{
    ActivityStore, Assignment, EngineState, EvaluationOutcome, ParticipantKey, StoreError,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityFile {
    pub id: String,
    pub participants: Vec<ParticipantKey>,
    /// 0 until the first round is advanced.
    #[serde(default)]
    pub current_round: usize,
    /// Who judges which pair in `current_round`.
    #[serde(default)]
    pub assignment: Assignment,
    #[serde(default)]
    pub evaluations: Vec<EvaluationOutcome>,
    #[serde(default)]
    pub engine: Option<EngineState>,
}

/// Reasons an evaluation submission is refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("{0} has no pair to evaluate this round")]
    NoAssignment(String),

    #[error("{winner} is not in the pair assigned to {evaluator}")]
    WinnerNotInPair { evaluator: String, winner: String },

    #[error("{evaluator} already submitted an evaluation for round {round}")]
    AlreadySubmitted { evaluator: String, round: usize },

    #[error("{subject} is not in the pair assigned to {evaluator}; cannot leave them feedback")]
    CommentNotInPair { evaluator: String, subject: String },

    #[error("{evaluator} left no evaluation of {author} in round {round}")]
    NoSuchFeedback {
        author: String,
        evaluator: String,
        round: usize,
    },
}

impl ActivityFile {
    pub fn new(id: impl Into<String>, participants: Vec<ParticipantKey>) -> Self {
        ActivityFile {
            id: id.into(),
            participants,
            current_round: 0,
            assignment: Assignment::new(),
            evaluations: Vec::new(),
            engine: None,
        }
    }

    fn has_submitted(&self, evaluator: &str) -> bool {
        self.evaluations
            .iter()
            .any(|e| e.evaluator == evaluator && e.round == Some(self.current_round))
    }

    /// Evaluators of the current round who have not submitted yet.
    pub fn pending_evaluators(&self) -> Vec<&ParticipantKey> {
        self.assignment
            .keys()
            .filter(|evaluator| !self.has_submitted(evaluator))
            .collect()
    }

    /// Record `evaluator`'s verdict on the pair they were assigned this round,
    /// with optional feedback keyed by the participant it is written for.
    pub fn record(
        &mut self,
        evaluator: &str,
        winner: &str,
        comments: &[(ParticipantKey, String)],
    ) -> Result<&EvaluationOutcome, RecordError> {
        let pair = self
            .assignment
            .get(evaluator)
            .ok_or_else(|| RecordError::NoAssignment(evaluator.to_string()))?;

        if !pair.contains(&winner.to_string()) {
            return Err(RecordError::WinnerNotInPair {
                evaluator: evaluator.to_string(),
                winner: winner.to_string(),
            });
        }
        if let Some((subject, _)) = comments.iter().find(|(subject, _)| !pair.contains(subject)) {
            return Err(RecordError::CommentNotInPair {
                evaluator: evaluator.to_string(),
                subject: subject.clone(),
            });
        }
        if self.has_submitted(evaluator) {
            return Err(RecordError::AlreadySubmitted {
                evaluator: evaluator.to_string(),
                round: self.current_round,
            });
        }

        let mut outcome = EvaluationOutcome::new(evaluator, pair.first().as_str(), pair.second().as_str(), winner)
            .in_round(self.current_round);
        for (subject, text) in comments {
            if *subject == outcome.left {
                outcome.left_comments = Some(text.clone());
            } else {
                outcome.right_comments = Some(text.clone());
            }
        }
        self.evaluations.push(outcome);
        Ok(&self.evaluations[self.evaluations.len() - 1])
    }

    /// Toggle `author`'s star on the feedback `evaluator` gave them in `round`.
    /// Returns whether the feedback is now starred.
    pub fn toggle_star(&mut self, author: &str, evaluator: &str, round: usize) -> Result<bool, RecordError> {
        let outcome = self
            .evaluations
            .iter_mut()
            .find(|o| {
                o.evaluator == evaluator
                    && o.round == Some(round)
                    && (o.left == author || o.right == author)
            })
            .ok_or_else(|| RecordError::NoSuchFeedback {
                author: author.to_string(),
                evaluator: evaluator.to_string(),
                round,
            })?;
        Ok(outcome.toggle_star(author))
    }

    /// Back to a fresh activity: same participants, no rounds, no evaluations.
    pub fn reset(&mut self) {
        self.current_round = 0;
        self.assignment.clear();
        self.evaluations.clear();
        self.engine = None;
    }
}

/// An `ActivityStore` backed by a single activity file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<ActivityFile, StoreError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        serde_json::from_str(&content)
            .map_err(|e| StoreError::Malformed(format!("{}: {e}", self.path.display())))
    }

    /// Write the activity, replacing the file atomically.
    pub async fn save(&self, activity: &ActivityFile) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(activity)
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), round = activity.current_round, "activity saved");
        Ok(())
    }

    /// Write a new activity file. Fails if one already exists.
    pub async fn create(&self, activity: &ActivityFile) -> Result<(), StoreError> {
        if tokio::fs::try_exists(&self.path).await? {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} already exists", self.path.display()),
            )));
        }
        self.save(activity).await
    }

    /// The activity if the file exists and holds `activity_id`.
    async fn load_matching(&self, activity_id: &str) -> Result<Option<ActivityFile>, StoreError> {
        match self.load().await {
            Ok(activity) if activity.id == activity_id => Ok(Some(activity)),
            Ok(_) => Ok(None),
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ActivityStore for FileStore {
    async fn participants(&self, activity_id: &str) -> Result<Option<Vec<ParticipantKey>>, StoreError> {
        Ok(self.load_matching(activity_id).await?.map(|a| a.participants))
    }

    async fn evaluations(&self, activity_id: &str) -> Result<Option<Vec<EvaluationOutcome>>, StoreError> {
        Ok(self.load_matching(activity_id).await?.map(|a| a.evaluations))
    }
}
