//! Pure project state transitions
//!
//! Every lifecycle mutation is computed here against an in-memory
//! `ProjectDoc` before anything is persisted. The status field only ever
//! moves forward along pending-agreement, pending-payment, payment-secured,
//! completed; cancellation and dispute branch off from non-terminal states.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::schemas::{PaymentStatus, ProjectDoc, ProjectStatus, Rating, StageStatus};
use crate::types::{GatewayError, Result};

/// Which side of the agreement is acting
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    Client,
    Freelancer,
}

impl PartyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyRole::Client => "client",
            PartyRole::Freelancer => "freelancer",
        }
    }
}

fn status_rank(status: ProjectStatus) -> u8 {
    match status {
        ProjectStatus::PendingAgreement => 0,
        ProjectStatus::PendingPayment => 1,
        ProjectStatus::PaymentSecured => 2,
        // disputes open from any live state, including payment-secured
        ProjectStatus::Disputed => 3,
        ProjectStatus::Completed | ProjectStatus::Cancelled => 4,
    }
}

/// Advance `current` to `next` only if that is a forward move
pub(crate) fn advance_status(current: ProjectStatus, next: ProjectStatus) -> ProjectStatus {
    if current.is_terminal() || status_rank(next) <= status_rank(current) {
        current
    } else {
        next
    }
}

/// Outcome of a signature application
#[derive(Debug)]
pub struct SignOutcome {
    pub both_agreed: bool,
    pub system_message: String,
}

/// Record one party's signature on the agreement
///
/// Signing twice for the same role leaves the flag true; each call still
/// produces a system message. Status advances to pending-payment exactly
/// when both flags are set, and never moves backwards.
pub fn apply_signature(
    project: &mut ProjectDoc,
    role: PartyRole,
    signer_name: &str,
) -> Result<SignOutcome> {
    if project.status.is_terminal() {
        return Err(GatewayError::InvalidArgument("project is closed".into()));
    }

    match role {
        PartyRole::Client => project.client_agreed = true,
        PartyRole::Freelancer => project.freelancer_agreed = true,
    }

    let both_agreed = project.client_agreed && project.freelancer_agreed;

    if both_agreed {
        project.status = advance_status(project.status, ProjectStatus::PendingPayment);
        if project.agreed_at.is_none() {
            project.agreed_at = Some(Utc::now());
        }
    }

    let system_message = if both_agreed {
        format!(
            "{} has signed the agreement. Waiting for client to secure payment in escrow.",
            signer_name
        )
    } else {
        format!("{} has signed the agreement.", signer_name)
    };

    Ok(SignOutcome {
        both_agreed,
        system_message,
    })
}

/// Move the project into escrow after the client's payment
///
/// Stamps the payment fields, starts the first stage, and returns the
/// system message announcing the secured amount.
pub fn apply_secure_payment(
    project: &mut ProjectDoc,
    amount: f64,
    method: Option<String>,
    payment_id: Option<String>,
    order_id: Option<String>,
) -> Result<String> {
    if project.status.is_terminal() {
        return Err(GatewayError::InvalidArgument("project is closed".into()));
    }
    if amount < 0.0 {
        return Err(GatewayError::InvalidArgument(
            "escrow amount must be non-negative".into(),
        ));
    }

    project.status = advance_status(project.status, ProjectStatus::PaymentSecured);
    project.payment_status = PaymentStatus::Escrow;
    project.escrow_amount = amount;
    project.payment_method = method;
    project.payment_id = payment_id;
    project.order_id = order_id;
    project.paid_at = Some(Utc::now());

    if let Some(first) = project.stages.first_mut() {
        first.status = StageStatus::InProgress;
    }

    Ok(format!(
        "Payment of ${} secured in escrow. Project can now begin!",
        amount
    ))
}

/// Outcome of a stage update
#[derive(Debug)]
pub struct StageOutcome {
    pub project_completed: bool,
}

/// Set one stage's status
///
/// With `strict_order`, a stage can only complete after every earlier
/// stage has; without it, out-of-order completion is accepted. When the
/// last pending stage completes the project itself completes.
pub fn apply_stage_update(
    project: &mut ProjectDoc,
    index: usize,
    new_status: StageStatus,
    strict_order: bool,
) -> Result<StageOutcome> {
    if project.status.is_terminal() {
        return Err(GatewayError::InvalidArgument("project is closed".into()));
    }
    if index >= project.stages.len() {
        return Err(GatewayError::InvalidArgument("invalid stage index".into()));
    }

    if strict_order && new_status == StageStatus::Completed {
        let blocked = project.stages[..index]
            .iter()
            .any(|s| s.status != StageStatus::Completed);
        if blocked {
            return Err(GatewayError::InvalidArgument(
                "earlier stages must complete first".into(),
            ));
        }
    }

    project.stages[index].status = new_status;
    if new_status == StageStatus::Completed {
        project.stages[index].completed_at = Some(Utc::now());
    }
    project.current_stage = index as u32;

    let project_completed = project.all_stages_completed();
    if project_completed {
        project.status = advance_status(project.status, ProjectStatus::Completed);
        project.completed_at = Some(Utc::now());
    }

    Ok(StageOutcome { project_completed })
}

/// Outcome of a payment release
#[derive(Debug)]
pub struct ReleaseOutcome {
    pub amount: f64,
    pub system_message: String,
}

/// Release escrowed funds to the freelancer
///
/// Only valid while funds are actually in escrow; a second release is
/// rejected rather than double-crediting the freelancer.
pub fn apply_release(project: &mut ProjectDoc) -> Result<ReleaseOutcome> {
    if project.payment_status != PaymentStatus::Escrow {
        return Err(GatewayError::InvalidArgument(
            "payment is not in escrow".into(),
        ));
    }

    project.payment_status = PaymentStatus::Released;
    project.released_at = Some(Utc::now());

    let amount = project.escrow_amount;
    Ok(ReleaseOutcome {
        amount,
        system_message: format!(
            "Payment of ${} has been released to the freelancer.",
            amount
        ),
    })
}

/// Build a rating, validating the star count
pub fn build_rating(stars: i32, feedback: String) -> Result<Rating> {
    if !(1..=5).contains(&stars) {
        return Err(GatewayError::InvalidArgument(
            "stars must be between 1 and 5".into(),
        ));
    }
    Ok(Rating {
        stars,
        feedback,
        rated_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> ProjectDoc {
        ProjectDoc::new("c1".into(), "f1".into(), Some("Site".into()), None, None)
    }

    #[test]
    fn test_single_signature_does_not_advance() {
        let mut p = project();
        let out = apply_signature(&mut p, PartyRole::Freelancer, "Fiona").unwrap();

        assert!(!out.both_agreed);
        assert!(p.freelancer_agreed);
        assert!(!p.client_agreed);
        assert_eq!(p.status, ProjectStatus::PendingAgreement);
        assert_eq!(out.system_message, "Fiona has signed the agreement.");
    }

    #[test]
    fn test_both_signatures_advance_to_pending_payment() {
        let mut p = project();
        apply_signature(&mut p, PartyRole::Freelancer, "Fiona").unwrap();
        let out = apply_signature(&mut p, PartyRole::Client, "Carl").unwrap();

        assert!(out.both_agreed);
        assert_eq!(p.status, ProjectStatus::PendingPayment);
        assert!(p.agreed_at.is_some());
        assert_eq!(
            out.system_message,
            "Carl has signed the agreement. Waiting for client to secure payment in escrow."
        );
    }

    #[test]
    fn test_repeat_signature_is_idempotent_on_flags() {
        let mut p = project();
        apply_signature(&mut p, PartyRole::Client, "Carl").unwrap();
        let out = apply_signature(&mut p, PartyRole::Client, "Carl").unwrap();

        assert!(p.client_agreed);
        assert!(!out.both_agreed);
        assert_eq!(p.status, ProjectStatus::PendingAgreement);
    }

    #[test]
    fn test_status_never_regresses_on_late_signature() {
        let mut p = project();
        apply_signature(&mut p, PartyRole::Client, "Carl").unwrap();
        apply_signature(&mut p, PartyRole::Freelancer, "Fiona").unwrap();
        apply_secure_payment(&mut p, 500.0, None, None, None).unwrap();

        apply_signature(&mut p, PartyRole::Client, "Carl").unwrap();
        assert_eq!(p.status, ProjectStatus::PaymentSecured);
    }

    #[test]
    fn test_secure_payment_starts_first_stage() {
        let mut p = project();
        let msg = apply_secure_payment(
            &mut p,
            500.0,
            Some("card".into()),
            Some("pay_1".into()),
            Some("order_1".into()),
        )
        .unwrap();

        assert_eq!(p.status, ProjectStatus::PaymentSecured);
        assert_eq!(p.payment_status, PaymentStatus::Escrow);
        assert_eq!(p.escrow_amount, 500.0);
        assert_eq!(p.stages[0].status, StageStatus::InProgress);
        assert!(p.paid_at.is_some());
        assert_eq!(msg, "Payment of $500 secured in escrow. Project can now begin!");
    }

    #[test]
    fn test_stage_index_out_of_range() {
        let mut p = project();
        let before = p.clone();
        let err = apply_stage_update(&mut p, 5, StageStatus::Completed, false).unwrap_err();

        assert!(matches!(err, GatewayError::InvalidArgument(_)));
        assert_eq!(p.current_stage, before.current_stage);
        assert_eq!(p.status, before.status);
    }

    #[test]
    fn test_completing_all_stages_completes_project() {
        let mut p = project();
        apply_secure_payment(&mut p, 100.0, None, None, None).unwrap();

        for i in 0..3 {
            let out = apply_stage_update(&mut p, i, StageStatus::Completed, false).unwrap();
            assert_eq!(out.project_completed, i == 2);
        }

        assert_eq!(p.status, ProjectStatus::Completed);
        assert!(p.completed_at.is_some());
        assert!(p.stages.iter().all(|s| s.completed_at.is_some()));
    }

    #[test]
    fn test_out_of_order_completion_allowed_by_default() {
        let mut p = project();
        let out = apply_stage_update(&mut p, 2, StageStatus::Completed, false).unwrap();

        assert!(!out.project_completed);
        assert_eq!(p.stages[2].status, StageStatus::Completed);
        assert_eq!(p.current_stage, 2);
        assert_eq!(p.status, ProjectStatus::PendingAgreement);
    }

    #[test]
    fn test_strict_order_rejects_skipping_ahead() {
        let mut p = project();
        let err = apply_stage_update(&mut p, 2, StageStatus::Completed, true).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidArgument(_)));
        assert_eq!(p.stages[2].status, StageStatus::Pending);

        apply_stage_update(&mut p, 0, StageStatus::Completed, true).unwrap();
        apply_stage_update(&mut p, 1, StageStatus::Completed, true).unwrap();
        let out = apply_stage_update(&mut p, 2, StageStatus::Completed, true).unwrap();
        assert!(out.project_completed);
    }

    #[test]
    fn test_release_requires_escrow() {
        let mut p = project();
        let err = apply_release(&mut p).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidArgument(_)));

        apply_secure_payment(&mut p, 250.0, None, None, None).unwrap();
        let out = apply_release(&mut p).unwrap();
        assert_eq!(out.amount, 250.0);
        assert_eq!(p.payment_status, PaymentStatus::Released);
        assert_eq!(
            out.system_message,
            "Payment of $250 has been released to the freelancer."
        );

        // second release is rejected, not double-credited
        assert!(apply_release(&mut p).is_err());
    }

    #[test]
    fn test_terminal_project_rejects_transitions() {
        let mut p = project();
        p.status = ProjectStatus::Cancelled;

        assert!(apply_signature(&mut p, PartyRole::Client, "Carl").is_err());
        assert!(apply_secure_payment(&mut p, 1.0, None, None, None).is_err());
        assert!(apply_stage_update(&mut p, 0, StageStatus::Completed, false).is_err());
    }

    #[test]
    fn test_rating_bounds() {
        assert!(build_rating(0, "bad".into()).is_err());
        assert!(build_rating(6, "great".into()).is_err());
        let rating = build_rating(5, "great".into()).unwrap();
        assert_eq!(rating.stars, 5);
    }

    #[test]
    fn test_advance_status_forward_only() {
        use ProjectStatus::*;
        assert_eq!(advance_status(PendingAgreement, PendingPayment), PendingPayment);
        assert_eq!(advance_status(PaymentSecured, PendingPayment), PaymentSecured);
        assert_eq!(advance_status(Completed, Disputed), Completed);
        assert_eq!(advance_status(PaymentSecured, Cancelled), Cancelled);
        assert_eq!(advance_status(Disputed, Completed), Completed);
    }

    #[test]
    fn test_dispute_opens_from_any_live_state() {
        use ProjectStatus::*;
        assert_eq!(advance_status(PaymentSecured, Disputed), Disputed);
        assert_eq!(advance_status(PendingPayment, Disputed), Disputed);
        assert_eq!(advance_status(PendingAgreement, Disputed), Disputed);
        // a dispute can still close out either way
        assert_eq!(advance_status(Disputed, Cancelled), Cancelled);
        assert_eq!(advance_status(Disputed, Completed), Completed);
    }
}
