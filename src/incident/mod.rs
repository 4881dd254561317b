//! Incident containment (red-flag response).
//!
//! `activate_incident_mode` is the safety-critical path of the core. It runs
//! the containment sequence inside one store transaction: containment
//! actions, write-once evidence snapshot, notification fan-out, incident
//! record, remediation enqueue. Any step failure rolls the whole activation
//! back and propagates; a half-applied freeze is worse than a clean failure
//! that can be retried.

pub mod evidence;
pub mod flag;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::ContainmentConfig;
use crate::errors::{ContainmentError, NotifyError, StoreError};
use crate::jobs::{JobPriority, JobQueue, RemediationJob};
use crate::notify::{AlertMessage, Channel, Notifier};
use crate::storage::{GovernanceStore, StoreTransaction};
use evidence::{EvidenceBundle, EvidenceSnapshot};
pub use flag::{ContainmentCommand, FlagType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Active,
    Resolved,
    Escalated,
}

/// Detection event handed to containment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentContext {
    pub tenant_id: String,
    pub flag_type: FlagType,
    pub severity: Severity,
    pub entity_id: String,
    pub entity_type: String,
    pub detected_at: DateTime<Utc>,
    /// Free-form detection evidence supplied by the detector.
    pub evidence: Value,
    /// Acting user, where the detection identified one.
    pub actor_id: Option<String>,
}

/// Persisted incident record. The evidence payload itself is write-once;
/// only status/closure fields may change after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub incident_id: String,
    pub tenant_id: String,
    pub flag_type: FlagType,
    pub severity: Severity,
    pub entity_id: String,
    pub entity_type: String,
    pub detected_at: DateTime<Utc>,
    pub evidence_snapshot_id: String,
    pub status: IncidentStatus,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a successful activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentResponse {
    pub incident_id: String,
    pub containment_actions: Vec<String>,
    pub notifications_sent: Vec<String>,
    pub evidence_snapshot_id: String,
    pub next_steps: Vec<String>,
}

/// Containment engine. Collaborators are injected; the engine owns no state
/// of its own beyond configuration.
pub struct IncidentContainment {
    store: Arc<dyn GovernanceStore>,
    notifier: Arc<dyn Notifier>,
    jobs: Arc<dyn JobQueue>,
    config: ContainmentConfig,
}

impl IncidentContainment {
    pub fn new(
        store: Arc<dyn GovernanceStore>,
        notifier: Arc<dyn Notifier>,
        jobs: Arc<dyn JobQueue>,
        config: ContainmentConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            jobs,
            config,
        }
    }

    /// Execute the containment sequence for a detected incident.
    ///
    /// Steps run strictly in order: containment actions, evidence snapshot,
    /// notification fan-out, incident record, remediation enqueue. They
    /// commit together or not at all.
    pub async fn activate_incident_mode(
        &self,
        ctx: IncidentContext,
    ) -> Result<IncidentResponse, ContainmentError> {
        let incident_id = format!(
            "INC-{}-{}",
            Utc::now().timestamp_millis(),
            ctx.flag_type.code()
        );
        info!(
            incident_id = %incident_id,
            tenant_id = %ctx.tenant_id,
            flag_type = %ctx.flag_type,
            severity = ?ctx.severity,
            entity_id = %ctx.entity_id,
            "incident mode activation started"
        );

        let mut tx = self
            .store
            .begin()
            .await
            .map_err(ContainmentError::Transaction)?;

        match self.run_activation(tx.as_mut(), &ctx, &incident_id).await {
            Ok((snapshot_id, notifications_sent)) => {
                tx.commit().await.map_err(ContainmentError::Transaction)?;
                info!(
                    incident_id = %incident_id,
                    evidence_snapshot_id = %snapshot_id,
                    "incident mode activation committed"
                );
                Ok(IncidentResponse {
                    incident_id,
                    containment_actions: to_strings(ctx.flag_type.containment_actions()),
                    notifications_sent,
                    evidence_snapshot_id: snapshot_id,
                    next_steps: to_strings(ctx.flag_type.next_steps()),
                })
            }
            Err(e) => {
                // The one failure class that must never be absorbed
                // silently: a failed containment leaves real exposure.
                error!(
                    incident_id = %incident_id,
                    tenant_id = %ctx.tenant_id,
                    flag_type = %ctx.flag_type,
                    error = %e,
                    "incident mode activation failed, rolling back"
                );
                if let Err(rollback_err) = tx.rollback().await {
                    error!(
                        incident_id = %incident_id,
                        error = %rollback_err,
                        "rollback after failed activation also failed"
                    );
                }
                Err(e)
            }
        }
    }

    async fn run_activation(
        &self,
        tx: &mut dyn StoreTransaction,
        ctx: &IncidentContext,
        incident_id: &str,
    ) -> Result<(String, Vec<String>), ContainmentError> {
        // 1. Containment action dispatch.
        for command in ctx.flag_type.containment_commands(ctx) {
            tx.apply_containment(&ctx.tenant_id, &command)
                .await
                .map_err(ContainmentError::Containment)?;
        }

        // 2. Evidence snapshot capture, bounded lookback and row counts.
        let since = Utc::now() - Duration::hours(self.config.evidence_lookback_hours);
        let bundle = EvidenceBundle {
            entity_records: tx
                .entity_records(&ctx.flag_type.evidence_query(ctx))
                .await
                .map_err(ContainmentError::Evidence)?,
            system_logs: tx
                .recent_system_logs(&ctx.tenant_id, &ctx.entity_id, since, self.config.max_log_rows)
                .await
                .map_err(ContainmentError::Evidence)?,
            user_actions: tx
                .recent_user_actions(
                    &ctx.tenant_id,
                    &ctx.entity_id,
                    since,
                    self.config.max_action_rows,
                )
                .await
                .map_err(ContainmentError::Evidence)?,
        };
        let snapshot = EvidenceSnapshot::capture(ctx, bundle, Utc::now())
            .map_err(ContainmentError::Evidence)?;
        tx.insert_evidence_snapshot(&snapshot)
            .await
            .map_err(ContainmentError::Evidence)?;

        // 3. Immediate notification fan-out: email always, the high-urgency
        // channels only at the top severity tier.
        let notifications_sent = self.fan_out_notifications(ctx, incident_id).await?;

        // 4. Incident record with initial status `active`.
        let record = IncidentRecord {
            incident_id: incident_id.to_string(),
            tenant_id: ctx.tenant_id.clone(),
            flag_type: ctx.flag_type.clone(),
            severity: ctx.severity,
            entity_id: ctx.entity_id.clone(),
            entity_type: ctx.entity_type.clone(),
            detected_at: ctx.detected_at,
            evidence_snapshot_id: snapshot.snapshot_id.clone(),
            status: IncidentStatus::Active,
            created_at: Utc::now(),
        };
        tx.insert_incident(&record)
            .await
            .map_err(ContainmentError::IncidentRecord)?;

        // 5. Remediation job enqueue, where the flag class maps to one.
        if let Some(job_type) = ctx.flag_type.remediation_job() {
            let payload = serde_json::to_value(ctx)
                .map_err(|e| ContainmentError::Evidence(StoreError::Serialization(e)))?;
            let priority = if ctx.severity == Severity::Critical {
                JobPriority::High
            } else {
                JobPriority::Medium
            };
            self.jobs
                .enqueue(RemediationJob {
                    job_id: format!("JOB-{}", Uuid::new_v4()),
                    job_type: job_type.to_string(),
                    tenant_id: ctx.tenant_id.clone(),
                    incident_id: incident_id.to_string(),
                    priority,
                    payload,
                    enqueued_at: Utc::now(),
                })
                .await?;
        }

        Ok((snapshot.snapshot_id, notifications_sent))
    }

    async fn fan_out_notifications(
        &self,
        ctx: &IncidentContext,
        incident_id: &str,
    ) -> Result<Vec<String>, ContainmentError> {
        let recipients = self
            .notifier
            .resolve_recipients(&ctx.tenant_id, &ctx.flag_type, ctx.severity)
            .await?;

        let mut channels = vec![Channel::Email];
        if ctx.severity == Severity::Critical {
            channels.push(Channel::Chat);
            channels.push(Channel::Sms);
        }

        let mut sent = Vec::with_capacity(channels.len());
        for channel in channels {
            let message = AlertMessage {
                incident_id: incident_id.to_string(),
                tenant_id: ctx.tenant_id.clone(),
                flag_type: ctx.flag_type.clone(),
                severity: ctx.severity,
                summary: format!(
                    "{} incident detected for {} {}",
                    ctx.flag_type, ctx.entity_type, ctx.entity_id
                ),
                recipients: recipients.for_channel(channel).to_vec(),
            };
            match timeout(
                self.config.dispatch_timeout(),
                self.notifier.send(channel, &message),
            )
            .await
            {
                Ok(Ok(())) => sent.push(channel.to_string()),
                Ok(Err(e)) => return Err(ContainmentError::Notification(e)),
                Err(_) => {
                    return Err(ContainmentError::Notification(NotifyError::DispatchTimeout {
                        channel: channel.to_string(),
                        timeout_secs: self.config.dispatch_timeout_secs,
                    }))
                }
            }
        }
        Ok(sent)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
