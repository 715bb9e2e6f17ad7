//! Project chat message schema
//!
//! Append-only message ledger, one collection keyed by project id. System
//! messages are synthesized by lifecycle transitions.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for project messages
pub const MESSAGE_COLLECTION: &str = "messages";

/// Message kind
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    System,
    File,
}

/// Message document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MessageDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub project_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_role: String,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
}

impl MessageDoc {
    /// Create a user-authored message
    pub fn new(
        project_id: String,
        sender_id: String,
        sender_name: String,
        sender_role: String,
        content: String,
        message_type: MessageType,
    ) -> Self {
        Self {
            id: None,
            project_id,
            sender_id,
            sender_name,
            sender_role,
            content,
            message_type,
            created_at: Utc::now(),
        }
    }

    /// Create a platform-authored message recording a lifecycle transition
    pub fn system(project_id: &str, sender_role: &str, content: String) -> Self {
        Self {
            id: None,
            project_id: project_id.to_string(),
            sender_id: "system".to_string(),
            sender_name: "System".to_string(),
            sender_role: sender_role.to_string(),
            content,
            message_type: MessageType::System,
            created_at: Utc::now(),
        }
    }
}

impl IntoIndexes for MessageDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "projectId": 1, "createdAt": 1 },
            Some(
                IndexOptions::builder()
                    .name("project_created".to_string())
                    .build(),
            ),
        )]
    }
}
