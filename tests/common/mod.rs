//! Shared test doubles for the integration suites: a scriptable connector
//! client, recording implementations of the alert/notification/job
//! boundaries, and context factories.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

use grc_control_core::ccm::connector::{
    AuthMethod, ConnectionDetails, ConnectorClient, ConnectorDescriptor, ConnectorKind, QuerySpec,
};
use grc_control_core::ccm::{AlertSink, CcmAlert};
use grc_control_core::errors::{ConnectorError, JobError, NotifyError};
use grc_control_core::incident::{FlagType, IncidentContext, Severity};
use grc_control_core::jobs::{JobQueue, RemediationJob};
use grc_control_core::notify::{AlertMessage, Channel, Notifier, RecipientSet};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Connector client with scriptable health and query results.
pub struct ScriptedConnector {
    healthy: AtomicBool,
    rows: Mutex<Vec<Value>>,
    query_calls: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(healthy: bool) -> Self {
        Self {
            healthy: AtomicBool::new(healthy),
            rows: Mutex::new(Vec::new()),
            query_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub async fn set_rows(&self, rows: Vec<Value>) {
        *self.rows.lock().await = rows;
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectorClient for ScriptedConnector {
    async fn health(&self) -> Result<bool, ConnectorError> {
        Ok(self.healthy.load(Ordering::SeqCst))
    }

    async fn query(&self, _spec: &QuerySpec) -> Result<Vec<Value>, ConnectorError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.lock().await.clone())
    }
}

/// Alert sink that records everything delivered to it.
#[derive(Default)]
pub struct RecordingSink {
    alerts: Mutex<Vec<CcmAlert>>,
}

impl RecordingSink {
    pub async fn alerts(&self) -> Vec<CcmAlert> {
        self.alerts.lock().await.clone()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn deliver(&self, alert: &CcmAlert) -> Result<(), NotifyError> {
        self.alerts.lock().await.push(alert.clone());
        Ok(())
    }
}

/// Notifier that records sends and can be told to fail a channel.
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Channel, AlertMessage)>>,
    fail_channel: Option<Channel>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_channel: None,
        }
    }

    pub fn failing_on(channel: Channel) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_channel: Some(channel),
        }
    }

    pub async fn sent(&self) -> Vec<(Channel, AlertMessage)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn resolve_recipients(
        &self,
        _tenant_id: &str,
        _flag_type: &FlagType,
        _severity: Severity,
    ) -> Result<RecipientSet, NotifyError> {
        Ok(RecipientSet {
            email: vec!["grc-team@example.com".to_string()],
            chat: vec!["#grc-incidents".to_string()],
            sms: vec!["+10000000000".to_string()],
        })
    }

    async fn send(&self, channel: Channel, message: &AlertMessage) -> Result<(), NotifyError> {
        if self.fail_channel == Some(channel) {
            return Err(NotifyError::DispatchFailed {
                channel: channel.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        self.sent.lock().await.push((channel, message.clone()));
        Ok(())
    }
}

/// Job queue that records enqueued descriptors.
#[derive(Default)]
pub struct RecordingJobQueue {
    jobs: Mutex<Vec<RemediationJob>>,
}

impl RecordingJobQueue {
    pub async fn jobs(&self) -> Vec<RemediationJob> {
        self.jobs.lock().await.clone()
    }
}

#[async_trait]
impl JobQueue for RecordingJobQueue {
    async fn enqueue(&self, job: RemediationJob) -> Result<(), JobError> {
        self.jobs.lock().await.push(job);
        Ok(())
    }
}

pub fn connector_descriptor(id: &str, interval_secs: u64) -> ConnectorDescriptor {
    ConnectorDescriptor {
        id: id.to_string(),
        name: format!("{id} connector"),
        kind: ConnectorKind::Siem,
        connection: ConnectionDetails {
            endpoint: "https://siem.example.com/api".to_string(),
            auth: AuthMethod::ApiKey,
            credential_ref: "vault://connectors/siem".to_string(),
        },
        health_check_interval_secs: interval_secs,
    }
}

pub fn incident_context(
    flag_type: FlagType,
    severity: Severity,
    entity_id: &str,
    entity_type: &str,
) -> IncidentContext {
    IncidentContext {
        tenant_id: "tenant-1".to_string(),
        flag_type,
        severity,
        entity_id: entity_id.to_string(),
        entity_type: entity_type.to_string(),
        detected_at: Utc::now(),
        evidence: json!({ "detector": "integration-test" }),
        actor_id: Some("user-7".to_string()),
    }
}
