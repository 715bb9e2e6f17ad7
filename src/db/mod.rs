//! MongoDB access layer

pub mod mongo;
pub mod schemas;

pub use mongo::{IntoIndexes, MongoClient, MongoCollection};

use schemas::{
    ApplicationDoc, JobDoc, MessageDoc, PaymentOrderDoc, ProjectDoc, TransactionDoc, UserDoc,
    WithdrawalDoc, APPLICATION_COLLECTION, JOB_COLLECTION, MESSAGE_COLLECTION, PAYMENT_COLLECTION,
    PROJECT_COLLECTION, TRANSACTION_COLLECTION, USER_COLLECTION, WITHDRAWAL_COLLECTION,
};

use crate::types::Result;

/// All typed collections, opened once at startup with indexes applied
#[derive(Clone, Debug)]
pub struct Stores {
    pub projects: MongoCollection<ProjectDoc>,
    pub messages: MongoCollection<MessageDoc>,
    pub users: MongoCollection<UserDoc>,
    pub jobs: MongoCollection<JobDoc>,
    pub applications: MongoCollection<ApplicationDoc>,
    pub transactions: MongoCollection<TransactionDoc>,
    pub withdrawals: MongoCollection<WithdrawalDoc>,
    pub payments: MongoCollection<PaymentOrderDoc>,
}

impl Stores {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            projects: mongo.collection(PROJECT_COLLECTION).await?,
            messages: mongo.collection(MESSAGE_COLLECTION).await?,
            users: mongo.collection(USER_COLLECTION).await?,
            jobs: mongo.collection(JOB_COLLECTION).await?,
            applications: mongo.collection(APPLICATION_COLLECTION).await?,
            transactions: mongo.collection(TRANSACTION_COLLECTION).await?,
            withdrawals: mongo.collection(WITHDRAWAL_COLLECTION).await?,
            payments: mongo.collection(PAYMENT_COLLECTION).await?,
        })
    }
}
