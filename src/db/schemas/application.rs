//! Job application schema

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for job applications
pub const APPLICATION_COLLECTION: &str = "applications";

/// Application review status
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

/// Application document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub job_id: String,
    pub freelancer_id: String,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_letter: Option<String>,

    pub status: ApplicationStatus,

    pub applied_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
}

impl ApplicationDoc {
    pub fn new(
        job_id: String,
        freelancer_id: String,
        client_id: String,
        cover_letter: Option<String>,
    ) -> Self {
        Self {
            id: None,
            job_id,
            freelancer_id,
            client_id,
            cover_letter,
            status: ApplicationStatus::Pending,
            applied_at: Utc::now(),
            approved_at: None,
            rejected_at: None,
        }
    }
}

impl IntoIndexes for ApplicationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "jobId": 1, "status": 1 },
                Some(IndexOptions::builder().name("job_status".to_string()).build()),
            ),
            (
                doc! { "freelancerId": 1, "appliedAt": -1 },
                Some(IndexOptions::builder().name("freelancer_applied".to_string()).build()),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_application_pending() {
        let app = ApplicationDoc::new("j1".into(), "f1".into(), "c1".into(), None);
        assert_eq!(app.status, ApplicationStatus::Pending);
        assert!(app.approved_at.is_none());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ApplicationStatus::Approved).unwrap();
        assert_eq!(json, "\"approved\"");
    }
}
