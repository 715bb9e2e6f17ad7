//! Job posting schema

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for job postings
pub const JOB_COLLECTION: &str = "jobs";

/// Job posting document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct JobDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub client_id: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,

    /// "open" until the client hires or closes it
    #[serde(default = "default_job_status")]
    pub status: String,
    /// Count of applications received, bumped on each submission
    #[serde(default)]
    pub proposals: i64,

    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_job_status() -> String {
    "open".to_string()
}

impl JobDoc {
    pub fn new(
        client_id: String,
        title: String,
        description: String,
        job_category: Option<String>,
        budget: Option<f64>,
    ) -> Self {
        Self {
            id: None,
            client_id,
            title,
            description,
            job_category,
            budget,
            status: default_job_status(),
            proposals: 0,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

impl IntoIndexes for JobDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "clientId": 1, "createdAt": -1 },
                Some(IndexOptions::builder().name("client_created".to_string()).build()),
            ),
            (
                doc! { "status": 1, "jobCategory": 1, "createdAt": -1 },
                Some(IndexOptions::builder().name("open_by_category".to_string()).build()),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_defaults() {
        let job = JobDoc::new("c1".into(), "Build a site".into(), "desc".into(), None, None);
        assert_eq!(job.status, "open");
        assert_eq!(job.proposals, 0);
    }

    #[test]
    fn test_status_defaults_on_deserialize() {
        let job: JobDoc = serde_json::from_value(serde_json::json!({
            "clientId": "c1",
            "title": "t",
            "description": "d",
            "createdAt": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(job.status, "open");
    }
}
