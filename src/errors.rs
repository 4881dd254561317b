//! Error taxonomy for the orchestration core.
//!
//! Four categories of failure flow through this crate, and only one of them
//! surfaces as a hard error to callers:
//! - refused workflow transitions are reported as `false`/empty results
//! - transient connector/query/notification failures are absorbed by the
//!   periodic loops and reflected in status fields
//! - incident-activation failures roll back and propagate as
//!   [`ContainmentError`]
//! - unknown identifiers are no-ops or empty results

use thiserror::Error;

/// Raised when a workflow definition fails graph validation at registration.
///
/// Unlike transition refusals, a broken definition is a configuration bug and
/// is rejected loudly before the engine will serve it.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("workflow '{workflow}': step '{step}' references unknown next step '{next}'")]
    DanglingNextStep {
        workflow: String,
        step: String,
        next: String,
    },
    #[error("workflow '{workflow}': initial step '{initial}' does not exist")]
    MissingInitialStep { workflow: String, initial: String },
    #[error("workflow '{workflow}': duplicate step id '{step}'")]
    DuplicateStep { workflow: String, step: String },
    #[error("workflow '{workflow}' has no terminal step")]
    NoTerminalStep { workflow: String },
    #[error("workflow '{workflow}' is already registered")]
    DuplicateWorkflow { workflow: String },
}

/// Persistence boundary failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transaction failed: {reason}")]
    TransactionFailed { reason: String },
    #[error("evidence snapshot '{snapshot_id}' already exists and is immutable")]
    EvidenceImmutable { snapshot_id: String },
    #[error("evidence snapshot '{snapshot_id}' failed integrity verification")]
    EvidenceIntegrity { snapshot_id: String },
    #[error("incident '{incident_id}' already recorded")]
    DuplicateIncident { incident_id: String },
    #[error("serialization error")]
    Serialization(#[from] serde_json::Error),
    #[error("storage backend error: {reason}")]
    Backend { reason: String },
}

/// Failures probing or querying an external monitored system.
///
/// These are transient by policy: the monitoring loops log them, mark the
/// connector `Error`, and try again on the next tick.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("connector '{connector_id}' is not registered")]
    UnknownConnector { connector_id: String },
    #[error("health probe for connector '{connector_id}' failed: {reason}")]
    ProbeFailed { connector_id: String, reason: String },
    #[error("query against connector '{connector_id}' failed: {reason}")]
    QueryFailed { connector_id: String, reason: String },
}

/// Notification dispatch failures.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("dispatch via {channel} failed: {reason}")]
    DispatchFailed { channel: String, reason: String },
    #[error("dispatch via {channel} timed out after {timeout_secs}s")]
    DispatchTimeout { channel: String, timeout_secs: u64 },
}

/// Remediation job hand-off failures.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to enqueue remediation job '{job_type}': {reason}")]
    EnqueueFailed { job_type: String, reason: String },
}

/// Fatal failure of a single incident activation.
///
/// The variant names the activation step that failed; in every case the
/// containment transaction has been rolled back and no partial state is
/// observable. Callers must retry or escalate manually.
#[derive(Debug, Error)]
pub enum ContainmentError {
    #[error("containment action dispatch failed")]
    Containment(#[source] StoreError),
    #[error("evidence snapshot capture failed")]
    Evidence(#[source] StoreError),
    #[error("immediate notification dispatch failed")]
    Notification(#[from] NotifyError),
    #[error("incident record write failed")]
    IncidentRecord(#[source] StoreError),
    #[error("remediation job enqueue failed")]
    Remediation(#[from] JobError),
    #[error("containment transaction error")]
    Transaction(#[source] StoreError),
}
