//! Project lifecycle service
//!
//! Owns the authoritative project document and mutates it through a fixed
//! set of transitions: create, sign, secure payment, stage updates, release,
//! rating. Each transition is computed in memory by [`transitions`] and then
//! persisted as a targeted merge, appending system chat messages and ledger
//! entries as side effects.

pub mod transitions;

use bson::{doc, oid::ObjectId, Bson, Document};
use serde::Serialize;
use tracing::{info, warn};

use crate::db::mongo::now_rfc3339;
use crate::db::schemas::{
    MessageDoc, MessageType, ProjectDoc, ProjectStatus, Stage, StageStatus,
};
use crate::db::{MongoCollection, Stores};
use crate::types::{GatewayError, Result};
use crate::wallet::WalletService;

pub use transitions::PartyRole;

fn to_bson<T: Serialize>(value: &T) -> Result<Bson> {
    bson::to_bson(value).map_err(|e| GatewayError::Database(format!("Serialization failed: {}", e)))
}

/// Caller-validated patch for the mutable descriptive fields
///
/// Status may only branch to cancelled or disputed through this path; the
/// forward transitions have their own operations.
#[derive(serde::Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectPatch {
    pub title: Option<String>,
    pub terms: Option<String>,
    pub deadline: Option<String>,
    pub status: Option<ProjectStatus>,
}

/// Policy knobs for transition enforcement
#[derive(Clone, Copy, Debug, Default)]
pub struct LifecyclePolicy {
    /// Reject completing a stage while an earlier stage is unfinished
    pub strict_stage_order: bool,
    /// Require a verified payment-gateway order before securing escrow
    pub require_verified_payment: bool,
}

#[derive(Clone, Debug)]
pub struct LifecycleService {
    projects: MongoCollection<ProjectDoc>,
    messages: MongoCollection<MessageDoc>,
    payments: MongoCollection<crate::db::schemas::PaymentOrderDoc>,
    wallet: WalletService,
    policy: LifecyclePolicy,
}

impl LifecycleService {
    pub fn new(stores: &Stores, wallet: WalletService, policy: LifecyclePolicy) -> Self {
        Self {
            projects: stores.projects.clone(),
            messages: stores.messages.clone(),
            payments: stores.payments.clone(),
            wallet,
            policy,
        }
    }

    /// Create a project in its initial state, returning its id
    pub async fn create_project(
        &self,
        client_id: String,
        freelancer_id: String,
        title: Option<String>,
        terms: Option<String>,
        stages: Option<Vec<Stage>>,
    ) -> Result<String> {
        let project = ProjectDoc::new(client_id, freelancer_id, title, terms, stages);
        let id = self.projects.insert_one(&project).await?;
        info!(project_id = %id, "project created");
        Ok(id)
    }

    pub async fn get_project(&self, project_id: &str) -> Result<ProjectDoc> {
        self.projects
            .find_by_id(project_id)
            .await?
            .ok_or(GatewayError::NotFound("project"))
    }

    /// List projects filtered by party and status, newest first
    pub async fn list_projects(
        &self,
        client_id: Option<&str>,
        freelancer_id: Option<&str>,
        status: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ProjectDoc>> {
        let mut filter = doc! {};
        if let Some(cid) = client_id {
            filter.insert("clientId", cid);
        }
        if let Some(fid) = freelancer_id {
            filter.insert("freelancerId", fid);
        }
        if let Some(s) = status {
            filter.insert("status", s);
        }

        self.projects
            .find_many(filter, Some(doc! { "createdAt": -1 }), Some(limit))
            .await
    }

    /// Merge a validated patch into the project document
    pub async fn update_project(&self, project_id: &str, patch: ProjectPatch) -> Result<()> {
        let project = self.get_project(project_id).await?;

        let mut set = doc! {};
        if let Some(title) = patch.title {
            set.insert("title", title);
        }
        if let Some(terms) = patch.terms {
            set.insert("terms", terms);
        }
        if let Some(deadline) = patch.deadline {
            set.insert("deadline", deadline);
        }
        if let Some(status) = patch.status {
            if !matches!(status, ProjectStatus::Cancelled | ProjectStatus::Disputed) {
                return Err(GatewayError::InvalidArgument(
                    "status can only be set to cancelled or disputed".into(),
                ));
            }
            let next = transitions::advance_status(project.status, status);
            if next == project.status {
                return Err(GatewayError::InvalidArgument("project is closed".into()));
            }
            set.insert("status", to_bson(&next)?);
        }

        if set.is_empty() {
            return Err(GatewayError::InvalidArgument("empty update".into()));
        }

        self.merge(project_id, set).await
    }

    /// Record one party's signature; returns whether both have now agreed
    pub async fn sign_agreement(
        &self,
        project_id: &str,
        role: PartyRole,
        signer_name: &str,
    ) -> Result<bool> {
        let mut project = self.get_project(project_id).await?;
        let outcome = transitions::apply_signature(&mut project, role, signer_name)?;

        let mut set = doc! {};
        match role {
            PartyRole::Client => set.insert("clientAgreed", true),
            PartyRole::Freelancer => set.insert("freelancerAgreed", true),
        };
        if outcome.both_agreed {
            set.insert("status", to_bson(&project.status)?);
            set.insert("agreedAt", to_bson(&project.agreed_at)?);
        }
        self.merge(project_id, set).await?;

        self.append_system_message(project_id, role.as_str(), outcome.system_message)
            .await?;

        info!(project_id, role = role.as_str(), both_agreed = outcome.both_agreed, "agreement signed");
        Ok(outcome.both_agreed)
    }

    /// Move the project into escrow after the client's payment
    pub async fn secure_payment(
        &self,
        project_id: &str,
        amount: f64,
        method: Option<String>,
        payment_id: Option<String>,
        order_id: Option<String>,
    ) -> Result<()> {
        if self.policy.require_verified_payment {
            self.check_order_verified(order_id.as_deref()).await?;
        }

        let mut project = self.get_project(project_id).await?;
        let message =
            transitions::apply_secure_payment(&mut project, amount, method, payment_id, order_id)?;

        let mut set = doc! {
            "status": to_bson(&project.status)?,
            "paymentStatus": to_bson(&project.payment_status)?,
            "escrowAmount": project.escrow_amount,
            "paidAt": to_bson(&project.paid_at)?,
            "stages.0.status": to_bson(&StageStatus::InProgress)?,
        };
        if let Some(m) = &project.payment_method {
            set.insert("paymentMethod", m);
        }
        if let Some(p) = &project.payment_id {
            set.insert("paymentId", p);
        }
        if let Some(o) = &project.order_id {
            set.insert("orderId", o);
        }
        self.merge(project_id, set).await?;

        self.append_system_message(project_id, "client", message).await?;

        info!(project_id, amount, "payment secured in escrow");
        Ok(())
    }

    async fn check_order_verified(&self, order_id: Option<&str>) -> Result<()> {
        let Some(order_id) = order_id else {
            return Err(GatewayError::InvalidArgument(
                "orderId is required to secure payment".into(),
            ));
        };
        let order = self
            .payments
            .find_one(doc! { "_id": order_id })
            .await?
            .ok_or(GatewayError::NotFound("payment order"))?;
        if !order.verified {
            return Err(GatewayError::Payment(format!(
                "order {} has not been verified",
                order_id
            )));
        }
        Ok(())
    }

    /// Set a stage's status; returns the stage list and whether the project completed
    pub async fn update_stage(
        &self,
        project_id: &str,
        stage_index: usize,
        new_status: StageStatus,
    ) -> Result<(Vec<Stage>, bool)> {
        let mut project = self.get_project(project_id).await?;
        let outcome = transitions::apply_stage_update(
            &mut project,
            stage_index,
            new_status,
            self.policy.strict_stage_order,
        )?;

        let mut set = doc! {
            "stages": to_bson(&project.stages)?,
            "currentStage": project.current_stage as i64,
        };
        if outcome.project_completed {
            set.insert("status", to_bson(&project.status)?);
            set.insert("completedAt", to_bson(&project.completed_at)?);
        }
        self.merge(project_id, set).await?;

        if outcome.project_completed {
            info!(project_id, "all stages completed, project closed");
        }
        Ok((project.stages, outcome.project_completed))
    }

    /// Release escrowed funds to the freelancer; returns the amount released
    ///
    /// The status flip is a guarded single-document update filtered on
    /// `paymentStatus == escrow`, so two racing releases cannot both credit
    /// the freelancer.
    pub async fn release_payment(&self, project_id: &str) -> Result<f64> {
        let mut project = self.get_project(project_id).await?;
        let outcome = transitions::apply_release(&mut project)?;

        let Ok(oid) = ObjectId::parse_str(project_id) else {
            return Err(GatewayError::NotFound("project"));
        };
        let result = self
            .projects
            .update_one(
                doc! { "_id": oid, "paymentStatus": "escrow" },
                doc! { "$set": {
                    "paymentStatus": "released",
                    "releasedAt": to_bson(&project.released_at)?,
                }},
            )
            .await?;
        if result.matched_count == 0 {
            warn!(project_id, "release lost the escrow guard, funds already released");
            return Err(GatewayError::InvalidArgument(
                "payment is not in escrow".into(),
            ));
        }

        self.wallet
            .credit(&project.freelancer_id, outcome.amount)
            .await?;

        let title = project.title.as_deref().unwrap_or("project");
        self.wallet
            .record_transaction(&crate::db::schemas::TransactionDoc::escrow_release(
                project_id,
                &project.freelancer_id,
                &project.client_id,
                outcome.amount,
                title,
            ))
            .await?;

        self.append_system_message(project_id, "client", outcome.system_message)
            .await?;

        info!(project_id, amount = outcome.amount, "escrow released");
        Ok(outcome.amount)
    }

    /// Attach a client rating to the project
    pub async fn submit_rating(&self, project_id: &str, stars: i32, feedback: String) -> Result<()> {
        // ensure the project exists before writing
        self.get_project(project_id).await?;

        let rating = transitions::build_rating(stars, feedback)?;
        self.merge(project_id, doc! { "rating": to_bson(&rating)? })
            .await
    }

    /// Append a chat message, returning its id
    pub async fn append_message(
        &self,
        project_id: &str,
        sender_id: String,
        sender_name: String,
        sender_role: String,
        content: String,
        message_type: MessageType,
    ) -> Result<(String, MessageDoc)> {
        let message = MessageDoc::new(
            project_id.to_string(),
            sender_id,
            sender_name,
            sender_role,
            content,
            message_type,
        );
        let id = self.messages.insert_one(&message).await?;
        Ok((id, message))
    }

    /// Read the message ledger in send order
    pub async fn list_messages(&self, project_id: &str, limit: i64) -> Result<Vec<MessageDoc>> {
        self.messages
            .find_many(
                doc! { "projectId": project_id },
                Some(doc! { "createdAt": 1 }),
                Some(limit),
            )
            .await
    }

    async fn append_system_message(
        &self,
        project_id: &str,
        sender_role: &str,
        content: String,
    ) -> Result<()> {
        self.messages
            .insert_one(&MessageDoc::system(project_id, sender_role, content))
            .await?;
        Ok(())
    }

    async fn merge(&self, project_id: &str, set: Document) -> Result<()> {
        let mut update = doc! { "$set": set };
        update
            .get_document_mut("$set")
            .map(|d| d.insert("updatedAt", now_rfc3339()))
            .ok();

        let matched = self.projects.update_by_id(project_id, update).await?;
        if !matched {
            return Err(GatewayError::NotFound("project"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_rejects_unknown_fields() {
        let err = serde_json::from_value::<ProjectPatch>(serde_json::json!({
            "title": "New title",
            "escrowAmount": 99999.0
        }));
        assert!(err.is_err());
    }

    #[test]
    fn test_patch_accepts_known_fields() {
        let patch: ProjectPatch = serde_json::from_value(serde_json::json!({
            "title": "New title",
            "status": "cancelled"
        }))
        .unwrap();
        assert_eq!(patch.title.as_deref(), Some("New title"));
        assert_eq!(patch.status, Some(ProjectStatus::Cancelled));
    }
}
