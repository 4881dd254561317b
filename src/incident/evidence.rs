//! Write-once evidence snapshots with content hashing.
//!
//! A snapshot is assembled in memory, hashed, and persisted exactly once.
//! The id is minted before persistence so the incident record can reference
//! it even if a downstream step fails and forces a retry. Integrity is
//! re-checkable at any later time by re-hashing the stored payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::IncidentContext;
use crate::errors::StoreError;

/// Immutable record of everything relevant at detection time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSnapshot {
    pub snapshot_id: String,
    pub tenant_id: String,
    pub entity_id: String,
    pub flag_code: String,
    pub captured_at: DateTime<Utc>,
    /// Serialized bundle: detection context, entity records, system logs,
    /// recent user actions.
    pub payload: Value,
    /// SHA-256 over the serialized payload, hex encoded.
    pub content_hash: String,
}

/// The bounded data gathered for a snapshot.
#[derive(Debug, Clone, Default)]
pub struct EvidenceBundle {
    pub entity_records: Vec<Value>,
    pub system_logs: Vec<Value>,
    pub user_actions: Vec<Value>,
}

impl EvidenceSnapshot {
    /// Assemble and hash a snapshot. The payload layout is stable so the
    /// hash is reproducible from the stored bytes alone.
    pub fn capture(
        ctx: &IncidentContext,
        bundle: EvidenceBundle,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        let payload = json!({
            "context": serde_json::to_value(ctx)?,
            "entity_records": bundle.entity_records,
            "system_logs": bundle.system_logs,
            "user_actions": bundle.user_actions,
            "captured_at": captured_at,
        });
        let content_hash = hash_payload(&payload)?;

        Ok(Self {
            snapshot_id: format!("SNAP-{}", Uuid::new_v4()),
            tenant_id: ctx.tenant_id.clone(),
            entity_id: ctx.entity_id.clone(),
            flag_code: ctx.flag_type.code().to_string(),
            captured_at,
            payload,
            content_hash,
        })
    }

    /// Re-hash the stored payload and compare with the recorded hash.
    pub fn verify(&self) -> Result<(), StoreError> {
        let recomputed = hash_payload(&self.payload)?;
        if recomputed != self.content_hash {
            return Err(StoreError::EvidenceIntegrity {
                snapshot_id: self.snapshot_id.clone(),
            });
        }
        Ok(())
    }
}

fn hash_payload(payload: &Value) -> Result<String, StoreError> {
    let bytes = serde_json::to_vec(payload)?;
    let digest = Sha256::digest(&bytes);
    Ok(hex::encode(digest))
}
