//! Remediation job hand-off boundary.
//!
//! Containment enqueues job descriptors; an external job processor owns
//! execution. This core never runs remediation itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::JobError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    High,
    Medium,
    Low,
}

/// Descriptor inserted into the external job queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationJob {
    pub job_id: String,
    pub job_type: String,
    pub tenant_id: String,
    pub incident_id: String,
    pub priority: JobPriority,
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
}

/// Queue owned by the external job-processing collaborator.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: RemediationJob) -> Result<(), JobError>;
}
