//! Mock cloud proving service for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::collaborators::{
    CollaboratorError, JobResult, ProvingService, SignedTransaction, UnsignedTransaction,
};

/// Mock implementation of the ProvingService trait.
///
/// Jobs are named `job-1`, `job-2`, ... and complete with `cloud:<tx>` after
/// `pending_polls` result calls, unless a failure reason is set.
#[derive(Debug, Default)]
pub struct MockProver {
    submitted: RwLock<Vec<UnsignedTransaction>>,
    result_calls: RwLock<HashMap<String, u32>>,
    pending_polls: RwLock<u32>,
    failure: RwLock<Option<String>>,
    no_job_id: RwLock<bool>,
    next_error: RwLock<Option<CollaboratorError>>,
}

impl MockProver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_pending_polls(&self, polls: u32) {
        *self.pending_polls.write().await = polls;
    }

    /// Every job finishes with this failure.
    pub async fn set_job_failure(&self, reason: impl Into<String>) {
        *self.failure.write().await = Some(reason.into());
    }

    /// Accept submissions without returning a job id.
    pub async fn set_returns_no_job_id(&self, no_job_id: bool) {
        *self.no_job_id.write().await = no_job_id;
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: CollaboratorError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn submitted(&self) -> Vec<UnsignedTransaction> {
        self.submitted.read().await.clone()
    }

    pub async fn result_calls(&self, job_id: &str) -> u32 {
        self.result_calls.read().await.get(job_id).copied().unwrap_or(0)
    }

    async fn take_error(&self) -> Option<CollaboratorError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl ProvingService for MockProver {
    async fn submit(&self, tx: &UnsignedTransaction) -> Result<Option<String>, CollaboratorError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }
        if *self.no_job_id.read().await {
            return Ok(None);
        }
        let mut submitted = self.submitted.write().await;
        submitted.push(tx.clone());
        Ok(Some(format!("job-{}", submitted.len())))
    }

    async fn result(&self, job_id: &str) -> Result<Option<JobResult>, CollaboratorError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }

        let polls = {
            let mut calls = self.result_calls.write().await;
            let count = calls.entry(job_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        if polls <= *self.pending_polls.read().await {
            return Ok(None);
        }
        if let Some(reason) = self.failure.read().await.clone() {
            return Ok(Some(JobResult::Failed(reason)));
        }

        let index = job_id
            .strip_prefix("job-")
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1));
        let submitted = self.submitted.read().await;
        match index.and_then(|i| submitted.get(i)) {
            Some(tx) => Ok(Some(JobResult::Completed(SignedTransaction(format!(
                "cloud:{}",
                tx.0
            ))))),
            None => Err(CollaboratorError::Api(format!("unknown job {}", job_id))),
        }
    }
}
