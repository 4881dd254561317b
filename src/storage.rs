//! Persistence boundary and the in-process store implementation.
//!
//! The core needs a transactional interface with typed, parameterized
//! operations: begin a transaction, apply containment mutations, read
//! bounded evidence data, insert write-once snapshots and incident records,
//! then commit or roll back. No schema or SQL dialect is assumed beyond the
//! entities the core reads and writes.
//!
//! `MemoryStore` is the bundled single-process implementation: transactions
//! stage against a clone of the state and publish atomically on commit. It
//! serializes transactions against each other, which is acceptable for an
//! in-process deployment; a database-backed implementation provides real
//! cross-incident concurrency.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::errors::StoreError;
use crate::incident::evidence::EvidenceSnapshot;
use crate::incident::{ContainmentCommand, IncidentRecord};

/// What entity state to capture as evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityQuery {
    /// Ledger entries of the affected journal.
    LedgerEntries { tenant_id: String, journal_id: String },
    /// The payment plus any payments sharing its reference.
    PaymentWithSiblings { tenant_id: String, payment_id: String },
    /// Flag classes without a dedicated capture shape.
    Generic {
        tenant_id: String,
        entity_type: String,
        entity_id: String,
    },
}

/// Transactional store the core runs against.
#[async_trait]
pub trait GovernanceStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

/// One open transaction. Dropping without commit discards staged writes.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn apply_containment(
        &mut self,
        tenant_id: &str,
        command: &ContainmentCommand,
    ) -> Result<(), StoreError>;

    async fn entity_records(&mut self, query: &EntityQuery) -> Result<Vec<Value>, StoreError>;

    async fn recent_system_logs(
        &mut self,
        tenant_id: &str,
        entity_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Value>, StoreError>;

    async fn recent_user_actions(
        &mut self,
        tenant_id: &str,
        entity_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Value>, StoreError>;

    /// Write-once: inserting an id that already exists is refused.
    async fn insert_evidence_snapshot(
        &mut self,
        snapshot: &EvidenceSnapshot,
    ) -> Result<(), StoreError>;

    async fn insert_incident(&mut self, record: &IncidentRecord) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Tenant-level operational switches touched by containment.
#[derive(Debug, Clone)]
pub struct TenantControls {
    pub posting_enabled: bool,
    pub freeze_reason: Option<String>,
}

impl Default for TenantControls {
    fn default() -> Self {
        Self {
            posting_enabled: true,
            freeze_reason: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentRow {
    pub tenant_id: String,
    pub reference: String,
    pub status: String,
    pub status_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CounterpartyRow {
    pub tenant_id: String,
    pub status: String,
    pub freeze_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AccountRow {
    pub tenant_id: String,
    pub manual_review_required: bool,
    pub review_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PermissionRow {
    pub write_access: bool,
    pub suspended_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GlEntryRow {
    pub tenant_id: String,
    pub journal_id: String,
    pub data: Value,
}

#[derive(Debug, Clone)]
pub struct ActivityRow {
    pub tenant_id: String,
    pub entity_id: String,
    pub recorded_at: DateTime<Utc>,
    pub data: Value,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tenant_controls: HashMap<String, TenantControls>,
    payments: HashMap<String, PaymentRow>,
    counterparties: HashMap<String, CounterpartyRow>,
    accounts: HashMap<String, AccountRow>,
    /// Keyed by (tenant id, user id).
    permissions: HashMap<(String, String), PermissionRow>,
    gl_entries: Vec<GlEntryRow>,
    audit_logs: Vec<ActivityRow>,
    user_actions: Vec<ActivityRow>,
    evidence: HashMap<String, EvidenceSnapshot>,
    incidents: HashMap<String, IncidentRecord>,
}

/// In-process store with staged transactions.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_payment(&self, payment_id: &str, row: PaymentRow) {
        self.state
            .lock()
            .await
            .payments
            .insert(payment_id.to_string(), row);
    }

    pub async fn seed_counterparty(&self, counterparty_id: &str, row: CounterpartyRow) {
        self.state
            .lock()
            .await
            .counterparties
            .insert(counterparty_id.to_string(), row);
    }

    pub async fn seed_account(&self, account_id: &str, row: AccountRow) {
        self.state
            .lock()
            .await
            .accounts
            .insert(account_id.to_string(), row);
    }

    pub async fn seed_gl_entry(&self, row: GlEntryRow) {
        self.state.lock().await.gl_entries.push(row);
    }

    pub async fn seed_audit_log(&self, row: ActivityRow) {
        self.state.lock().await.audit_logs.push(row);
    }

    pub async fn seed_user_action(&self, row: ActivityRow) {
        self.state.lock().await.user_actions.push(row);
    }

    pub async fn incident(&self, incident_id: &str) -> Option<IncidentRecord> {
        self.state.lock().await.incidents.get(incident_id).cloned()
    }

    pub async fn incident_count(&self) -> usize {
        self.state.lock().await.incidents.len()
    }

    pub async fn evidence_snapshot(&self, snapshot_id: &str) -> Option<EvidenceSnapshot> {
        self.state.lock().await.evidence.get(snapshot_id).cloned()
    }

    pub async fn evidence_count(&self) -> usize {
        self.state.lock().await.evidence.len()
    }

    pub async fn tenant_controls(&self, tenant_id: &str) -> Option<TenantControls> {
        self.state
            .lock()
            .await
            .tenant_controls
            .get(tenant_id)
            .cloned()
    }

    pub async fn payment(&self, payment_id: &str) -> Option<PaymentRow> {
        self.state.lock().await.payments.get(payment_id).cloned()
    }

    pub async fn counterparty(&self, counterparty_id: &str) -> Option<CounterpartyRow> {
        self.state
            .lock()
            .await
            .counterparties
            .get(counterparty_id)
            .cloned()
    }

    pub async fn account(&self, account_id: &str) -> Option<AccountRow> {
        self.state.lock().await.accounts.get(account_id).cloned()
    }

    pub async fn permission(&self, tenant_id: &str, user_id: &str) -> Option<PermissionRow> {
        self.state
            .lock()
            .await
            .permissions
            .get(&(tenant_id.to_string(), user_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl GovernanceStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, staged }))
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn apply_containment(
        &mut self,
        tenant_id: &str,
        command: &ContainmentCommand,
    ) -> Result<(), StoreError> {
        match command {
            ContainmentCommand::DisablePosting { reason } => {
                let controls = self
                    .staged
                    .tenant_controls
                    .entry(tenant_id.to_string())
                    .or_default();
                controls.posting_enabled = false;
                controls.freeze_reason = Some(reason.clone());
            }
            ContainmentCommand::FlagDuplicateSuspect { payment_id, reason } => {
                if let Some(payment) = self.staged.payments.get_mut(payment_id) {
                    if payment.tenant_id == tenant_id {
                        payment.status = "duplicate_suspect".to_string();
                        payment.status_reason = Some(reason.clone());
                    }
                }
            }
            ContainmentCommand::FreezeCounterparty {
                counterparty_id,
                reason,
            } => {
                if let Some(counterparty) = self.staged.counterparties.get_mut(counterparty_id) {
                    if counterparty.tenant_id == tenant_id {
                        counterparty.status = "frozen".to_string();
                        counterparty.freeze_reason = Some(reason.clone());
                    }
                }
            }
            ContainmentCommand::RevokeWriteAccess { user_id, reason } => {
                let permission = self
                    .staged
                    .permissions
                    .entry((tenant_id.to_string(), user_id.clone()))
                    .or_insert(PermissionRow {
                        write_access: true,
                        suspended_reason: None,
                    });
                permission.write_access = false;
                permission.suspended_reason = Some(reason.clone());
            }
            ContainmentCommand::HoldTransaction { payment_id, reason } => {
                if let Some(payment) = self.staged.payments.get_mut(payment_id) {
                    if payment.tenant_id == tenant_id {
                        payment.status = "on_hold".to_string();
                        payment.status_reason = Some(reason.clone());
                    }
                }
            }
            ContainmentCommand::RequireManualReview { account_id, reason } => {
                if let Some(account) = self.staged.accounts.get_mut(account_id) {
                    if account.tenant_id == tenant_id {
                        account.manual_review_required = true;
                        account.review_reason = Some(reason.clone());
                    }
                }
            }
        }
        Ok(())
    }

    async fn entity_records(&mut self, query: &EntityQuery) -> Result<Vec<Value>, StoreError> {
        let records = match query {
            EntityQuery::LedgerEntries {
                tenant_id,
                journal_id,
            } => self
                .staged
                .gl_entries
                .iter()
                .filter(|e| &e.tenant_id == tenant_id && &e.journal_id == journal_id)
                .map(|e| e.data.clone())
                .collect(),
            EntityQuery::PaymentWithSiblings {
                tenant_id,
                payment_id,
            } => {
                let reference = self
                    .staged
                    .payments
                    .get(payment_id)
                    .filter(|p| &p.tenant_id == tenant_id)
                    .map(|p| p.reference.clone());
                self.staged
                    .payments
                    .iter()
                    .filter(|(id, p)| {
                        &p.tenant_id == tenant_id
                            && (*id == payment_id || Some(&p.reference) == reference.as_ref())
                    })
                    .map(|(id, p)| {
                        json!({
                            "id": id,
                            "reference": p.reference,
                            "status": p.status,
                        })
                    })
                    .collect()
            }
            EntityQuery::Generic {
                tenant_id,
                entity_type,
                entity_id,
            } => vec![json!({
                "tenant_id": tenant_id,
                "entity_type": entity_type,
                "entity_id": entity_id,
            })],
        };
        Ok(records)
    }

    async fn recent_system_logs(
        &mut self,
        tenant_id: &str,
        entity_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Value>, StoreError> {
        Ok(recent_activity(
            &self.staged.audit_logs,
            tenant_id,
            entity_id,
            since,
            limit,
        ))
    }

    async fn recent_user_actions(
        &mut self,
        tenant_id: &str,
        entity_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Value>, StoreError> {
        Ok(recent_activity(
            &self.staged.user_actions,
            tenant_id,
            entity_id,
            since,
            limit,
        ))
    }

    async fn insert_evidence_snapshot(
        &mut self,
        snapshot: &EvidenceSnapshot,
    ) -> Result<(), StoreError> {
        if self.staged.evidence.contains_key(&snapshot.snapshot_id) {
            return Err(StoreError::EvidenceImmutable {
                snapshot_id: snapshot.snapshot_id.clone(),
            });
        }
        self.staged
            .evidence
            .insert(snapshot.snapshot_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn insert_incident(&mut self, record: &IncidentRecord) -> Result<(), StoreError> {
        if self.staged.incidents.contains_key(&record.incident_id) {
            return Err(StoreError::DuplicateIncident {
                incident_id: record.incident_id.clone(),
            });
        }
        self.staged
            .incidents
            .insert(record.incident_id.clone(), record.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // Staged state is simply dropped.
        Ok(())
    }
}

fn recent_activity(
    rows: &[ActivityRow],
    tenant_id: &str,
    entity_id: &str,
    since: DateTime<Utc>,
    limit: usize,
) -> Vec<Value> {
    let mut matching: Vec<&ActivityRow> = rows
        .iter()
        .filter(|r| r.tenant_id == tenant_id && r.entity_id == entity_id && r.recorded_at >= since)
        .collect();
    matching.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
    matching
        .into_iter()
        .take(limit)
        .map(|r| r.data.clone())
        .collect()
}
