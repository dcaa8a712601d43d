//! API Models
//!
//! Request and response bodies for the REST API. Engine types from
//! `tutor-core` are embedded as-is and documented as opaque objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tutor_core::{
    exam::{ExamSession, ExamStatus},
    tutor::TurnGuidance,
    understanding::UnderstandingState,
};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::sessions::{Conversation, ExamRecord};

#[derive(Deserialize, ToSchema)]
pub struct CreateConversationPayload {
    #[schema(example = "Newtonian Mechanics")]
    pub topic: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PostMessagePayload {
    #[schema(example = "I think heavier objects fall faster.")]
    pub content: String,
}

#[derive(Deserialize, ToSchema)]
pub struct TutorReplyPayload {
    #[schema(example = "Actually, in a vacuum all objects fall at the same rate.")]
    pub content: String,
}

/// The current state of a conversation.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ConversationSnapshot {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub topic: String,
    #[schema(value_type = Object)]
    pub understanding: UnderstandingState,
    /// Number of messages (both sides) recorded so far.
    pub turns: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&Conversation> for ConversationSnapshot {
    fn from(conversation: &Conversation) -> Self {
        Self {
            id: conversation.id,
            topic: conversation.session.topic.clone(),
            understanding: conversation.session.understanding.clone(),
            turns: conversation.session.history.len(),
            created_at: conversation.created_at,
        }
    }
}

/// Guidance for the tutor's next reply, plus the updated understanding.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct TurnResponse {
    #[schema(value_type = Object)]
    pub guidance: TurnGuidance,
    #[schema(value_type = Object)]
    pub understanding: UnderstandingState,
}

/// A user's exam and where it is in its lifecycle.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ExamStateResponse {
    #[schema(value_type = Object)]
    pub status: ExamStatus,
    #[schema(value_type = Object)]
    pub exam: Option<ExamSession>,
}

impl From<ExamRecord> for ExamStateResponse {
    fn from(record: ExamRecord) -> Self {
        Self {
            status: record.status,
            exam: record.exam,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::tutor::TutorSession;

    #[test]
    fn test_create_conversation_payload_deserialization() {
        let json = r#"{"topic": "Machine Learning Basics"}"#;
        let payload: CreateConversationPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.topic, "Machine Learning Basics");
    }

    #[test]
    fn test_post_message_payload_missing_field() {
        let result: Result<PostMessagePayload, _> = serde_json::from_str("{}");
        assert!(result.is_err());
    }

    #[test]
    fn test_snapshot_from_conversation() {
        let mut session = TutorSession::new("Optics");
        session.record_tutor_reply("Welcome!");
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            created_at: Utc::now(),
            session,
        };

        let snapshot = ConversationSnapshot::from(&conversation);
        assert_eq!(snapshot.id, conversation.id);
        assert_eq!(snapshot.topic, "Optics");
        assert_eq!(snapshot.turns, 1);
        assert_eq!(snapshot.understanding.message_count, 0);
    }

    #[test]
    fn test_snapshot_serializes_understanding() {
        let snapshot = ConversationSnapshot {
            id: Uuid::new_v4(),
            topic: "Optics".to_string(),
            understanding: UnderstandingState::new(),
            turns: 0,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["understanding"]["level"], "medium");
        assert_eq!(json["understanding"]["message_count"], 0);
        assert!(json["understanding"]["gaps"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_exam_state_from_idle_record() {
        let response = ExamStateResponse::from(ExamRecord::default());
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"status":{"state":"idle"},"exam":null}"#);
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "Conversation not found".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"message":"Conversation not found"}"#);
    }
}
