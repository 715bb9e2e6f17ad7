//! Project document schema
//!
//! The authoritative state of an escrow project: agreement flags, payment
//! fields, the ordered stage list, and the optional rating. Mutated only
//! through the lifecycle service transitions.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for projects
pub const PROJECT_COLLECTION: &str = "projects";

/// Project workflow status
///
/// Advances only in the direction pending-agreement → pending-payment →
/// payment-secured → completed; cancellation/dispute branch off from
/// non-terminal states.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    PendingAgreement,
    PendingPayment,
    PaymentSecured,
    Completed,
    Cancelled,
    Disputed,
}

impl ProjectStatus {
    /// Whether no further transitions are allowed from this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Cancelled)
    }
}

/// Escrow payment status
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Escrow,
    Released,
}

/// Delivery stage status
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StageStatus {
    Pending,
    InProgress,
    Completed,
}

/// One ordered unit of project delivery
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub name: String,
    pub description: String,
    pub status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Stage {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            status: StageStatus::Pending,
            completed_at: None,
        }
    }
}

/// Client rating attached after delivery
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub stars: i32,
    pub feedback: String,
    pub rated_at: DateTime<Utc>,
}

/// Default 3-stage delivery template used when a project supplies none
pub fn default_stages() -> Vec<Stage> {
    vec![
        Stage::new(
            "Planning & Setup",
            "Initial project setup, requirements gathering, and planning phase",
        ),
        Stage::new(
            "Development",
            "Main development work, implementing core features and functionality",
        ),
        Stage::new(
            "Testing & Delivery",
            "Final testing, bug fixes, documentation, and project handover",
        ),
    ]
}

/// Project document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub client_id: String,
    pub freelancer_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms: Option<String>,

    pub status: ProjectStatus,
    pub client_agreed: bool,
    pub freelancer_agreed: bool,

    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub escrow_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,

    pub stages: Vec<Stage>,
    /// Index into `stages`, 0-based; always within `[0, stages.len())`
    pub current_stage: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_at: Option<DateTime<Utc>>,
}

impl ProjectDoc {
    /// Create a new project in its initial state
    pub fn new(
        client_id: String,
        freelancer_id: String,
        title: Option<String>,
        terms: Option<String>,
        stages: Option<Vec<Stage>>,
    ) -> Self {
        Self {
            id: None,
            client_id,
            freelancer_id,
            title,
            terms,
            status: ProjectStatus::PendingAgreement,
            client_agreed: false,
            freelancer_agreed: false,
            payment_status: PaymentStatus::Pending,
            escrow_amount: 0.0,
            payment_method: None,
            payment_id: None,
            order_id: None,
            stages: stages.filter(|s| !s.is_empty()).unwrap_or_else(default_stages),
            current_stage: 0,
            rating: None,
            created_at: Some(Utc::now()),
            agreed_at: None,
            paid_at: None,
            completed_at: None,
            released_at: None,
        }
    }

    /// Whether every stage has completed
    pub fn all_stages_completed(&self) -> bool {
        self.stages
            .iter()
            .all(|s| s.status == StageStatus::Completed)
    }
}

impl IntoIndexes for ProjectDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "clientId": 1, "createdAt": -1 },
                Some(IndexOptions::builder().name("client_created".to_string()).build()),
            ),
            (
                doc! { "freelancerId": 1, "createdAt": -1 },
                Some(IndexOptions::builder().name("freelancer_created".to_string()).build()),
            ),
            (
                doc! { "status": 1 },
                Some(IndexOptions::builder().name("status_index".to_string()).build()),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_project_defaults() {
        let project = ProjectDoc::new("c1".into(), "f1".into(), None, None, None);

        assert_eq!(project.status, ProjectStatus::PendingAgreement);
        assert!(!project.client_agreed);
        assert!(!project.freelancer_agreed);
        assert_eq!(project.payment_status, PaymentStatus::Pending);
        assert_eq!(project.current_stage, 0);
        assert_eq!(project.stages.len(), 3);
        assert_eq!(project.stages[0].name, "Planning & Setup");
        assert!(project.stages.iter().all(|s| s.status == StageStatus::Pending));
    }

    #[test]
    fn test_supplied_stages_kept() {
        let stages = vec![Stage::new("Design", "Mockups"), Stage::new("Build", "Code")];
        let project = ProjectDoc::new("c1".into(), "f1".into(), None, None, Some(stages));
        assert_eq!(project.stages.len(), 2);
    }

    #[test]
    fn test_empty_stage_list_falls_back_to_template() {
        let project = ProjectDoc::new("c1".into(), "f1".into(), None, None, Some(vec![]));
        assert_eq!(project.stages.len(), 3);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ProjectStatus::PendingAgreement).unwrap();
        assert_eq!(json, "\"pending-agreement\"");
        let json = serde_json::to_string(&StageStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        let json = serde_json::to_string(&PaymentStatus::Escrow).unwrap();
        assert_eq!(json, "\"escrow\"");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ProjectStatus::Completed.is_terminal());
        assert!(ProjectStatus::Cancelled.is_terminal());
        assert!(!ProjectStatus::Disputed.is_terminal());
        assert!(!ProjectStatus::PendingAgreement.is_terminal());
    }
}
