//! End-to-end containment behavior: the happy path, the atomicity guarantee,
//! notification policy, and evidence immutability.

mod common;

use std::sync::Arc;

use common::{incident_context, init_tracing, RecordingJobQueue, RecordingNotifier};
use grc_control_core::config::ContainmentConfig;
use grc_control_core::errors::{ContainmentError, StoreError};
use grc_control_core::incident::IncidentStatus;
use grc_control_core::jobs::JobPriority;
use grc_control_core::notify::Channel;
use grc_control_core::storage::{CounterpartyRow, GovernanceStore, PaymentRow};
use grc_control_core::{FlagType, IncidentContainment, MemoryStore, Severity};

fn containment(
    store: &MemoryStore,
    notifier: Arc<RecordingNotifier>,
    jobs: Arc<RecordingJobQueue>,
) -> IncidentContainment {
    IncidentContainment::new(
        Arc::new(store.clone()),
        notifier,
        jobs,
        ContainmentConfig::default(),
    )
}

#[tokio::test]
async fn sanctioned_entity_critical_end_to_end() {
    init_tracing();
    let store = MemoryStore::new();
    store
        .seed_counterparty(
            "counterparty-42",
            CounterpartyRow {
                tenant_id: "tenant-1".to_string(),
                status: "active".to_string(),
                freeze_reason: None,
            },
        )
        .await;
    let notifier = Arc::new(RecordingNotifier::new());
    let jobs = Arc::new(RecordingJobQueue::default());
    let engine = containment(&store, Arc::clone(&notifier), Arc::clone(&jobs));

    let response = engine
        .activate_incident_mode(incident_context(
            FlagType::SanctionedEntity,
            Severity::Critical,
            "counterparty-42",
            "counterparty",
        ))
        .await
        .unwrap();

    // Containment narrative and the actual mutation agree.
    assert!(response
        .containment_actions
        .contains(&"Entity relationship frozen immediately".to_string()));
    let counterparty = store.counterparty("counterparty-42").await.unwrap();
    assert_eq!(counterparty.status, "frozen");
    assert_eq!(
        counterparty.freeze_reason.as_deref(),
        Some("Sanctions screening hit")
    );

    // Critical severity fans out to all three channels.
    assert_eq!(response.notifications_sent, vec!["email", "chat", "sms"]);
    let sent = notifier.sent().await;
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].0, Channel::Email);

    // Remediation job mapped and prioritized by severity.
    let queued = jobs.jobs().await;
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].job_type, "compliance-case-open");
    assert_eq!(queued[0].priority, JobPriority::High);
    assert_eq!(queued[0].incident_id, response.incident_id);

    // Incident record is active and references the snapshot.
    let record = store.incident(&response.incident_id).await.unwrap();
    assert_eq!(record.status, IncidentStatus::Active);
    assert_eq!(record.evidence_snapshot_id, response.evidence_snapshot_id);

    // Responder guidance includes enhanced due diligence.
    assert!(response
        .next_steps
        .contains(&"Complete enhanced due diligence".to_string()));
}

#[tokio::test]
async fn notification_failure_rolls_back_the_whole_activation() {
    let store = MemoryStore::new();
    store
        .seed_counterparty(
            "counterparty-42",
            CounterpartyRow {
                tenant_id: "tenant-1".to_string(),
                status: "active".to_string(),
                freeze_reason: None,
            },
        )
        .await;
    let notifier = Arc::new(RecordingNotifier::failing_on(Channel::Chat));
    let jobs = Arc::new(RecordingJobQueue::default());
    let engine = containment(&store, notifier, Arc::clone(&jobs));

    let result = engine
        .activate_incident_mode(incident_context(
            FlagType::SanctionedEntity,
            Severity::Critical,
            "counterparty-42",
            "counterparty",
        ))
        .await;
    assert!(matches!(result, Err(ContainmentError::Notification(_))));

    // Nothing from the failed activation is observable: no incident row, no
    // evidence snapshot, and the containment mutation is rolled back.
    assert_eq!(store.incident_count().await, 0);
    assert_eq!(store.evidence_count().await, 0);
    assert_eq!(
        store.counterparty("counterparty-42").await.unwrap().status,
        "active"
    );
    assert!(jobs.jobs().await.is_empty());
}

#[tokio::test]
async fn lower_severity_keeps_to_email_and_medium_priority() {
    let store = MemoryStore::new();
    store
        .seed_payment(
            "pay-9",
            PaymentRow {
                tenant_id: "tenant-1".to_string(),
                reference: "ref-123".to_string(),
                status: "settled".to_string(),
                status_reason: None,
            },
        )
        .await;
    store
        .seed_payment(
            "pay-10",
            PaymentRow {
                tenant_id: "tenant-1".to_string(),
                reference: "ref-123".to_string(),
                status: "settled".to_string(),
                status_reason: None,
            },
        )
        .await;
    let notifier = Arc::new(RecordingNotifier::new());
    let jobs = Arc::new(RecordingJobQueue::default());
    let engine = containment(&store, Arc::clone(&notifier), Arc::clone(&jobs));

    let response = engine
        .activate_incident_mode(incident_context(
            FlagType::DuplicateTransaction,
            Severity::High,
            "pay-9",
            "payment",
        ))
        .await
        .unwrap();

    assert_eq!(response.notifications_sent, vec!["email"]);
    assert_eq!(notifier.sent().await.len(), 1);
    assert_eq!(store.payment("pay-9").await.unwrap().status, "duplicate_suspect");

    let queued = jobs.jobs().await;
    assert_eq!(queued[0].job_type, "dedup-review");
    assert_eq!(queued[0].priority, JobPriority::Medium);

    // Sibling payments sharing the reference were captured as evidence.
    let snapshot = store
        .evidence_snapshot(&response.evidence_snapshot_id)
        .await
        .unwrap();
    let records = snapshot.payload["entity_records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn unknown_flag_type_still_creates_audit_trail() {
    let store = MemoryStore::new();
    let notifier = Arc::new(RecordingNotifier::new());
    let jobs = Arc::new(RecordingJobQueue::default());
    let engine = containment(&store, Arc::clone(&notifier), Arc::clone(&jobs));

    let response = engine
        .activate_incident_mode(incident_context(
            FlagType::Other("novel-scheme".to_string()),
            Severity::Medium,
            "entity-1",
            "account",
        ))
        .await
        .unwrap();

    assert_eq!(
        response.containment_actions,
        vec!["Standard containment procedures applied".to_string()]
    );
    assert_eq!(response.notifications_sent, vec!["email"]);
    assert!(jobs.jobs().await.is_empty());
    assert!(store.incident(&response.incident_id).await.is_some());
    assert!(store
        .evidence_snapshot(&response.evidence_snapshot_id)
        .await
        .is_some());
}

#[tokio::test]
async fn evidence_snapshot_is_write_once_and_rehashable() {
    let store = MemoryStore::new();
    let notifier = Arc::new(RecordingNotifier::new());
    let jobs = Arc::new(RecordingJobQueue::default());
    let engine = containment(&store, notifier, jobs);

    let response = engine
        .activate_incident_mode(incident_context(
            FlagType::RapidSuccession,
            Severity::High,
            "acct-3",
            "account",
        ))
        .await
        .unwrap();

    // Re-hashing the persisted payload reproduces the stored hash.
    let snapshot = store
        .evidence_snapshot(&response.evidence_snapshot_id)
        .await
        .unwrap();
    snapshot.verify().unwrap();

    // A second write under the same id is refused.
    let mut tx = store.begin().await.unwrap();
    let refused = tx.insert_evidence_snapshot(&snapshot).await;
    assert!(matches!(
        refused,
        Err(StoreError::EvidenceImmutable { .. })
    ));
    tx.rollback().await.unwrap();
}
