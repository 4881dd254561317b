//! Governance control entity and its active workflow instance.
//!
//! The control's lifecycle status only moves through workflow transitions;
//! the engine validates the edge and the instance record holds the
//! current-step pointer. Holding that pointer here, not in the engine, is
//! what keeps the engine stateless. A retired control refuses further
//! mutation and stays readable for audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scheduler::Frequency;
use crate::workflow::WorkflowEngine;

/// Lifecycle status of a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlStatus {
    Draft,
    DesignReview,
    Ready,
    Operating,
    Changed,
    Retired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    Low,
    Medium,
    High,
    Critical,
}

/// A governance control being operated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Control {
    pub id: String,
    pub title: String,
    pub status: ControlStatus,
    pub criticality: Criticality,
    pub testing_frequency: Frequency,
    pub owner_id: String,
}

impl Control {
    pub fn new(
        id: &str,
        title: &str,
        criticality: Criticality,
        testing_frequency: Frequency,
        owner_id: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            status: ControlStatus::Draft,
            criticality,
            testing_frequency,
            owner_id: owner_id.to_string(),
        }
    }

    pub fn is_retired(&self) -> bool {
        self.status == ControlStatus::Retired
    }

    /// Move the lifecycle status. Refused (returning `false`) once retired.
    pub fn set_status(&mut self, status: ControlStatus) -> bool {
        if self.is_retired() {
            return false;
        }
        self.status = status;
        true
    }
}

/// The current-step pointer for one control moving through one workflow.
///
/// The engine does not enforce "one active instance per control"; the owner
/// of this record does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: String,
    pub workflow_id: String,
    pub control_id: String,
    pub current_step: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowInstance {
    /// Start an instance at the workflow's initial step. `None` when the
    /// workflow id is unknown.
    pub fn start(engine: &WorkflowEngine, workflow_id: &str, control_id: &str) -> Option<Self> {
        let definition = engine.get_workflow(workflow_id)?;
        let now = Utc::now();
        Some(Self {
            id: format!("wfi-{}-{}", control_id, uuid::Uuid::new_v4()),
            workflow_id: workflow_id.to_string(),
            control_id: control_id.to_string(),
            current_step: definition.initial_step.clone(),
            started_at: now,
            updated_at: now,
        })
    }

    /// Attempt a transition. The engine decides legality; an illegal or
    /// unknown edge leaves the pointer untouched and returns `false`.
    pub fn advance(&mut self, engine: &WorkflowEngine, to_step: &str) -> bool {
        if !engine.validate_transition(&self.workflow_id, &self.current_step, to_step) {
            return false;
        }
        self.current_step = to_step.to_string();
        self.updated_at = Utc::now();
        true
    }

    pub fn is_complete(&self, engine: &WorkflowEngine) -> bool {
        engine
            .get_workflow(&self.workflow_id)
            .and_then(|d| d.step(&self.current_step))
            .map(|s| s.next_steps.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retired_control_refuses_mutation() {
        let mut control = Control::new(
            "ctl-1",
            "Quarterly access review",
            Criticality::High,
            Frequency::Quarterly,
            "owner-1",
        );
        assert!(control.set_status(ControlStatus::Operating));
        assert!(control.set_status(ControlStatus::Retired));
        assert!(!control.set_status(ControlStatus::Operating));
        assert_eq!(control.status, ControlStatus::Retired);
    }

    #[test]
    fn instance_walks_the_happy_path() {
        let engine = WorkflowEngine::with_builtin().unwrap();
        let mut instance = WorkflowInstance::start(&engine, "new-control", "ctl-1").unwrap();
        assert_eq!(instance.current_step, "draft");

        for step in [
            "submit_review",
            "design_review",
            "approve_design",
            "implementation_plan",
            "ready",
            "operating",
        ] {
            assert!(instance.advance(&engine, step), "failed to reach {step}");
        }
        assert!(instance.is_complete(&engine));
    }

    #[test]
    fn illegal_transition_leaves_pointer_untouched() {
        let engine = WorkflowEngine::with_builtin().unwrap();
        let mut instance = WorkflowInstance::start(&engine, "new-control", "ctl-1").unwrap();
        assert!(!instance.advance(&engine, "operating"));
        assert_eq!(instance.current_step, "draft");
    }

    #[test]
    fn unknown_workflow_yields_no_instance() {
        let engine = WorkflowEngine::with_builtin().unwrap();
        assert!(WorkflowInstance::start(&engine, "nope", "ctl-1").is_none());
    }
}
