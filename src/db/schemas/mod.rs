//! Database schemas for the TrustHire gateway
//!
//! One document type per collection, with camelCase wire fields matching
//! what the marketplace frontend reads and writes.

mod application;
mod job;
mod message;
mod payment;
mod project;
mod transaction;
mod user;
mod withdrawal;

pub use application::{ApplicationDoc, ApplicationStatus, APPLICATION_COLLECTION};
pub use job::{JobDoc, JOB_COLLECTION};
pub use message::{MessageDoc, MessageType, MESSAGE_COLLECTION};
pub use payment::{PaymentOrderDoc, PaymentOrderStatus, PAYMENT_COLLECTION};
pub use project::{
    default_stages, PaymentStatus, ProjectDoc, ProjectStatus, Rating, Stage, StageStatus,
    PROJECT_COLLECTION,
};
pub use transaction::{TransactionDoc, TRANSACTION_COLLECTION};
pub use user::{UserDoc, USER_COLLECTION};
pub use withdrawal::{WithdrawalDoc, WITHDRAWAL_COLLECTION};
