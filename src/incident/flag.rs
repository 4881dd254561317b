//! Red-flag classification and its dispatch tables.
//!
//! `FlagType` is a closed sum type: containment commands, action narratives,
//! responder next steps, and remediation mappings all match exhaustively, so
//! adding a flag class is a compile-time obligation across every table.
//! Detections the catalog does not know arrive as `Other` and pass through
//! containment untouched, since evidence capture and notification must never
//! be blocked by an unknown classification.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::IncidentContext;
use crate::storage::EntityQuery;

/// Violation class of a detected incident.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FlagType {
    UnbalancedLedger,
    DuplicateTransaction,
    SanctionedEntity,
    TamperedAuditTrail,
    UnexplainedLargeTransaction,
    RapidSuccession,
    Other(String),
}

impl FlagType {
    pub fn code(&self) -> &str {
        match self {
            FlagType::UnbalancedLedger => "unbalanced-ledger",
            FlagType::DuplicateTransaction => "duplicate-transaction",
            FlagType::SanctionedEntity => "sanctioned-entity",
            FlagType::TamperedAuditTrail => "tampered-audit-trail",
            FlagType::UnexplainedLargeTransaction => "unexplained-large-transaction",
            FlagType::RapidSuccession => "rapid-succession",
            FlagType::Other(code) => code,
        }
    }

    /// Containment mutations for this violation class, addressed to the
    /// affected entity in `ctx`.
    pub fn containment_commands(&self, ctx: &IncidentContext) -> Vec<ContainmentCommand> {
        match self {
            FlagType::UnbalancedLedger => vec![ContainmentCommand::DisablePosting {
                reason: "Unbalanced GL detected".to_string(),
            }],
            FlagType::DuplicateTransaction => vec![ContainmentCommand::FlagDuplicateSuspect {
                payment_id: ctx.entity_id.clone(),
                reason: "Duplicate transaction detected".to_string(),
            }],
            FlagType::SanctionedEntity => vec![ContainmentCommand::FreezeCounterparty {
                counterparty_id: ctx.entity_id.clone(),
                reason: "Sanctions screening hit".to_string(),
            }],
            FlagType::TamperedAuditTrail => match &ctx.actor_id {
                Some(actor_id) => vec![ContainmentCommand::RevokeWriteAccess {
                    user_id: actor_id.clone(),
                    reason: "Audit trail tampering detected".to_string(),
                }],
                // Without an identified actor there is no permission to
                // revoke; evidence capture still proceeds.
                None => Vec::new(),
            },
            FlagType::UnexplainedLargeTransaction => vec![ContainmentCommand::HoldTransaction {
                payment_id: ctx.entity_id.clone(),
                reason: "Large transaction requires documentation".to_string(),
            }],
            FlagType::RapidSuccession => vec![ContainmentCommand::RequireManualReview {
                account_id: ctx.entity_id.clone(),
                reason: "Rapid transaction succession detected".to_string(),
            }],
            FlagType::Other(_) => Vec::new(),
        }
    }

    /// Human-readable record of the containment actions taken, kept
    /// logically consistent with [`Self::containment_commands`].
    pub fn containment_actions(&self) -> &'static [&'static str] {
        match self {
            FlagType::UnbalancedLedger => &[
                "GL posting disabled for affected batch",
                "Imbalances moved to Suspense account",
                "Finance team notified for manual review",
            ],
            FlagType::DuplicateTransaction => &[
                "Duplicate transactions flagged as suspect",
                "Settlement/payment processing halted",
                "Deduplication agent activated",
            ],
            FlagType::SanctionedEntity => &[
                "Entity relationship frozen immediately",
                "All payments/transfers blocked",
                "Compliance case opened automatically",
            ],
            FlagType::TamperedAuditTrail => &[
                "Write permissions revoked for affected accounts",
                "Forensic snapshot captured",
                "Security team alerted",
            ],
            FlagType::UnexplainedLargeTransaction => &[
                "Transaction placed on hold",
                "Supporting documentation requested",
                "4-eyes approval required",
            ],
            FlagType::RapidSuccession => &[
                "Account flagged for manual review",
                "Velocity limits temporarily reduced",
                "AML alert generated",
            ],
            FlagType::Other(_) => &["Standard containment procedures applied"],
        }
    }

    /// Recommended next steps for a human responder.
    pub fn next_steps(&self) -> &'static [&'static str] {
        match self {
            FlagType::UnbalancedLedger => &[
                "Review and correct unbalanced entries",
                "Investigate root cause of imbalance",
                "Update GL posting controls",
            ],
            FlagType::DuplicateTransaction => &[
                "Manual review of flagged transactions",
                "Reverse confirmed duplicates",
                "Strengthen deduplication controls",
            ],
            FlagType::SanctionedEntity => &[
                "Complete enhanced due diligence",
                "File SAR/UAR if required",
                "Review historical transactions",
            ],
            FlagType::TamperedAuditTrail => &[
                "Forensic investigation of audit trail",
                "Review user access and permissions",
                "Strengthen audit controls",
            ],
            FlagType::UnexplainedLargeTransaction => &[
                "Collect supporting documentation",
                "Business justification review",
                "Approve or reverse transaction",
            ],
            FlagType::RapidSuccession => &[
                "Investigate transaction patterns",
                "Customer interview if needed",
                "Adjust velocity controls",
            ],
            FlagType::Other(_) => &["Follow standard incident response procedures"],
        }
    }

    /// Remediation job type to enqueue, where one is mapped. Remediation is
    /// advisory: unmapped classes enqueue nothing.
    pub fn remediation_job(&self) -> Option<&'static str> {
        match self {
            FlagType::UnbalancedLedger => Some("repair-unbalanced"),
            FlagType::DuplicateTransaction => Some("dedup-review"),
            FlagType::SanctionedEntity => Some("compliance-case-open"),
            FlagType::TamperedAuditTrail => Some("forensic-snapshot"),
            FlagType::UnexplainedLargeTransaction => Some("supporting-docs-request"),
            FlagType::RapidSuccession => Some("aml-alert-triage"),
            FlagType::Other(_) => None,
        }
    }

    /// What entity state to capture as evidence for this violation class.
    pub fn evidence_query(&self, ctx: &IncidentContext) -> EntityQuery {
        match self {
            FlagType::UnbalancedLedger => EntityQuery::LedgerEntries {
                tenant_id: ctx.tenant_id.clone(),
                journal_id: ctx.entity_id.clone(),
            },
            FlagType::DuplicateTransaction => EntityQuery::PaymentWithSiblings {
                tenant_id: ctx.tenant_id.clone(),
                payment_id: ctx.entity_id.clone(),
            },
            FlagType::SanctionedEntity
            | FlagType::TamperedAuditTrail
            | FlagType::UnexplainedLargeTransaction
            | FlagType::RapidSuccession
            | FlagType::Other(_) => EntityQuery::Generic {
                tenant_id: ctx.tenant_id.clone(),
                entity_type: ctx.entity_type.clone(),
                entity_id: ctx.entity_id.clone(),
            },
        }
    }
}

impl fmt::Display for FlagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl From<String> for FlagType {
    fn from(code: String) -> Self {
        match code.as_str() {
            "unbalanced-ledger" => FlagType::UnbalancedLedger,
            "duplicate-transaction" => FlagType::DuplicateTransaction,
            "sanctioned-entity" => FlagType::SanctionedEntity,
            "tampered-audit-trail" => FlagType::TamperedAuditTrail,
            "unexplained-large-transaction" => FlagType::UnexplainedLargeTransaction,
            "rapid-succession" => FlagType::RapidSuccession,
            _ => FlagType::Other(code),
        }
    }
}

impl From<FlagType> for String {
    fn from(flag: FlagType) -> Self {
        flag.code().to_string()
    }
}

/// Typed containment mutation executed through the store transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainmentCommand {
    /// Disable ledger posting and freeze the tenant's posting pipeline.
    DisablePosting { reason: String },
    /// Mark a transaction as a duplicate suspect.
    FlagDuplicateSuspect { payment_id: String, reason: String },
    /// Freeze the counterparty relationship and its balances.
    FreezeCounterparty {
        counterparty_id: String,
        reason: String,
    },
    /// Revoke write access for the acting user.
    RevokeWriteAccess { user_id: String, reason: String },
    /// Place a transaction on hold pending documentation.
    HoldTransaction { payment_id: String, reason: String },
    /// Flag an account for manual review.
    RequireManualReview { account_id: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::Severity;
    use chrono::Utc;
    use serde_json::json;

    fn context(flag_type: FlagType) -> IncidentContext {
        IncidentContext {
            tenant_id: "tenant-1".to_string(),
            flag_type,
            severity: Severity::High,
            entity_id: "entity-1".to_string(),
            entity_type: "payment".to_string(),
            detected_at: Utc::now(),
            evidence: json!({}),
            actor_id: Some("user-9".to_string()),
        }
    }

    #[test]
    fn flag_codes_round_trip() {
        for code in [
            "unbalanced-ledger",
            "duplicate-transaction",
            "sanctioned-entity",
            "tampered-audit-trail",
            "unexplained-large-transaction",
            "rapid-succession",
        ] {
            let flag = FlagType::from(code.to_string());
            assert!(!matches!(flag, FlagType::Other(_)), "{code}");
            assert_eq!(flag.code(), code);
        }
        let unknown = FlagType::from("novel-scheme".to_string());
        assert_eq!(unknown, FlagType::Other("novel-scheme".to_string()));
    }

    #[test]
    fn unknown_flags_take_no_containment_but_keep_narratives() {
        let flag = FlagType::Other("novel-scheme".to_string());
        assert!(flag.containment_commands(&context(flag.clone())).is_empty());
        assert_eq!(
            flag.containment_actions(),
            &["Standard containment procedures applied"]
        );
        assert_eq!(flag.remediation_job(), None);
    }

    #[test]
    fn tampering_without_actor_revokes_nothing() {
        let flag = FlagType::TamperedAuditTrail;
        let mut ctx = context(flag.clone());
        ctx.actor_id = None;
        assert!(flag.containment_commands(&ctx).is_empty());

        ctx.actor_id = Some("user-9".to_string());
        let commands = flag.containment_commands(&ctx);
        assert!(matches!(
            commands.as_slice(),
            [ContainmentCommand::RevokeWriteAccess { user_id, .. }] if user_id == "user-9"
        ));
    }

    #[test]
    fn every_known_flag_maps_to_a_remediation_job() {
        let known = [
            (FlagType::UnbalancedLedger, "repair-unbalanced"),
            (FlagType::DuplicateTransaction, "dedup-review"),
            (FlagType::SanctionedEntity, "compliance-case-open"),
            (FlagType::TamperedAuditTrail, "forensic-snapshot"),
            (
                FlagType::UnexplainedLargeTransaction,
                "supporting-docs-request",
            ),
            (FlagType::RapidSuccession, "aml-alert-triage"),
        ];
        for (flag, job_type) in known {
            assert_eq!(flag.remediation_job(), Some(job_type));
        }
    }
}
