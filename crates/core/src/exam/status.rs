//! Exam lifecycle as seen by the caller that owns it.
//!
//! ```text
//! idle ──► generating ──► ready ──► in_progress
//!              │   ▲
//!              ▼   │ retry
//!            error ┘
//! ```
//!
//! A new generation may also be started from `ready` or `in_progress`, which
//! replaces the previous exam.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExamStatus {
    #[default]
    Idle,
    Generating,
    Ready,
    /// Generation failed. Carries a message suitable for the learner.
    Error { message: String },
    InProgress,
}

impl fmt::Display for ExamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExamStatus::Idle => write!(f, "idle"),
            ExamStatus::Generating => write!(f, "generating"),
            ExamStatus::Ready => write!(f, "ready"),
            ExamStatus::Error { .. } => write!(f, "error"),
            ExamStatus::InProgress => write!(f, "in_progress"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot {action} while the exam is {from}")]
pub struct ExamStatusError {
    pub from: String,
    pub action: &'static str,
}

impl ExamStatus {
    fn reject(&self, action: &'static str) -> ExamStatusError {
        ExamStatusError {
            from: self.to_string(),
            action,
        }
    }

    /// Moves to `generating`. Not allowed while a generation is running.
    pub fn begin_generation(&self) -> Result<Self, ExamStatusError> {
        match self {
            ExamStatus::Generating => Err(self.reject("start generating")),
            _ => Ok(ExamStatus::Generating),
        }
    }

    /// Records the outcome of a generation: `ready` on success, `error`
    /// carrying the failure's message otherwise.
    pub fn finish<T, E: fmt::Display>(
        &self,
        outcome: &Result<T, E>,
    ) -> Result<Self, ExamStatusError> {
        match self {
            ExamStatus::Generating => Ok(match outcome {
                Ok(_) => ExamStatus::Ready,
                Err(e) => ExamStatus::Error {
                    message: e.to_string(),
                },
            }),
            _ => Err(self.reject("finish generating")),
        }
    }

    /// Moves a ready exam to `in_progress` when the learner begins answering.
    pub fn start(&self) -> Result<Self, ExamStatusError> {
        match self {
            ExamStatus::Ready => Ok(ExamStatus::InProgress),
            _ => Err(self.reject("start the exam")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let status = ExamStatus::default();
        assert_eq!(status, ExamStatus::Idle);

        let status = status.begin_generation().unwrap();
        assert_eq!(status, ExamStatus::Generating);

        let status = status.finish(&Ok::<(), String>(())).unwrap();
        assert_eq!(status, ExamStatus::Ready);

        let status = status.start().unwrap();
        assert_eq!(status, ExamStatus::InProgress);
    }

    #[test]
    fn test_error_is_retryable() {
        let status = ExamStatus::Generating
            .finish(&Err::<(), _>("need more material"))
            .unwrap();
        assert_eq!(
            status,
            ExamStatus::Error {
                message: "need more material".to_string()
            }
        );
        assert_eq!(status.begin_generation().unwrap(), ExamStatus::Generating);
    }

    #[test]
    fn test_illegal_transitions() {
        let err = ExamStatus::Generating.begin_generation().unwrap_err();
        assert_eq!(err.to_string(), "Cannot start generating while the exam is generating");

        assert!(ExamStatus::Idle.start().is_err());
        assert!(ExamStatus::InProgress.start().is_err());
        assert!(ExamStatus::Idle.finish(&Ok::<(), String>(())).is_err());
        assert!(
            ExamStatus::Error {
                message: "x".to_string()
            }
            .start()
            .is_err()
        );
    }

    #[test]
    fn test_regeneration_replaces_previous_exam() {
        assert!(ExamStatus::Ready.begin_generation().is_ok());
        assert!(ExamStatus::InProgress.begin_generation().is_ok());
    }

    #[test]
    fn test_serialization_shape() {
        let json = serde_json::to_string(&ExamStatus::Error {
            message: "oops".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"state":"error","message":"oops"}"#);
        assert_eq!(
            serde_json::to_string(&ExamStatus::InProgress).unwrap(),
            r#"{"state":"in_progress"}"#
        );
    }
}
