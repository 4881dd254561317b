//! Built-in GRC workflow catalog.
//!
//! Five process-wide definitions covering the control lifecycle: creation,
//! evidence collection, testing, exception management, and change control.
//! Loaded once at engine construction and never mutated at runtime.

use super::{WorkflowDefinition, WorkflowStep};

fn step(
    id: &str,
    name: &str,
    description: &str,
    actor: &str,
    required_fields: &[&str],
    next_steps: &[&str],
) -> WorkflowStep {
    WorkflowStep {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        actor: actor.to_string(),
        required_fields: required_fields.iter().map(|f| f.to_string()).collect(),
        next_steps: next_steps.iter().map(|s| s.to_string()).collect(),
    }
}

/// All built-in definitions, in catalog order.
pub fn builtin() -> Vec<WorkflowDefinition> {
    vec![
        new_control(),
        evidence_attestation(),
        control_testing(),
        exception_management(),
        change_control(),
    ]
}

/// WF-C1: creation and approval of a new control.
pub fn new_control() -> WorkflowDefinition {
    WorkflowDefinition {
        id: "new-control".to_string(),
        name: "New Control Creation".to_string(),
        description: "Complete workflow for creating and approving new controls".to_string(),
        initial_step: "draft".to_string(),
        steps: vec![
            step(
                "draft",
                "Draft Control",
                "Create initial control definition",
                "control_owner",
                &[
                    "code",
                    "title",
                    "objective",
                    "domain",
                    "control_type",
                    "control_nature",
                    "frequency",
                ],
                &["submit_review"],
            ),
            step(
                "submit_review",
                "Submit for Review",
                "Submit control for design review",
                "control_owner",
                &["evidence_requirements", "test_strategy"],
                &["design_review"],
            ),
            step(
                "design_review",
                "Design Review",
                "Compliance officer reviews control design",
                "compliance_officer",
                &["review_comments"],
                &["approve_design", "reject_design"],
            ),
            step(
                "approve_design",
                "Approve Design",
                "Control design approved",
                "compliance_officer",
                &[],
                &["implementation_plan"],
            ),
            step(
                "reject_design",
                "Reject Design",
                "Control design rejected, return to draft",
                "compliance_officer",
                &["rejection_reason"],
                &["draft"],
            ),
            step(
                "implementation_plan",
                "Create Implementation Plan",
                "Define implementation tasks and schedule",
                "control_owner",
                &["implementation_tasks", "schedule"],
                &["ready"],
            ),
            step(
                "ready",
                "Ready for Operation",
                "Control is ready to operate",
                "system",
                &[],
                &["operating"],
            ),
            step(
                "operating",
                "Operating",
                "Control is live and producing evidence",
                "system",
                &[],
                &[],
            ),
        ],
    }
}

/// WF-C2: scheduled evidence collection and attestation.
pub fn evidence_attestation() -> WorkflowDefinition {
    WorkflowDefinition {
        id: "evidence-attestation".to_string(),
        name: "Evidence Collection & Attestation".to_string(),
        description: "Workflow for collecting and validating control evidence".to_string(),
        initial_step: "schedule_event".to_string(),
        steps: vec![
            step(
                "schedule_event",
                "Schedule Evidence Collection",
                "System schedules evidence collection based on control frequency",
                "system",
                &["due_date"],
                &["notify_owner"],
            ),
            step(
                "notify_owner",
                "Notify Control Owner",
                "Send notification to control owner",
                "system",
                &[],
                &["collect_evidence"],
            ),
            step(
                "collect_evidence",
                "Collect Evidence",
                "Control owner uploads evidence",
                "control_owner",
                &["evidence_files"],
                &["auto_validation"],
            ),
            step(
                "auto_validation",
                "Auto Validation",
                "System performs automatic validation checks",
                "system",
                &[],
                &["attest", "validation_failed"],
            ),
            step(
                "validation_failed",
                "Validation Failed",
                "Evidence failed validation, return to collection",
                "system",
                &["validation_errors"],
                &["collect_evidence"],
            ),
            step(
                "attest",
                "Owner Attestation",
                "Control owner attests to evidence completeness",
                "control_owner",
                &["attestation", "comments"],
                &["reviewer_accept"],
            ),
            step(
                "reviewer_accept",
                "Reviewer Acceptance",
                "Reviewer accepts evidence",
                "reviewer",
                &["acceptance_decision"],
                &["complete", "request_additional"],
            ),
            step(
                "request_additional",
                "Request Additional Evidence",
                "Reviewer requests additional evidence",
                "reviewer",
                &["additional_requirements"],
                &["collect_evidence"],
            ),
            step(
                "complete",
                "Evidence Complete",
                "Evidence collection completed successfully",
                "system",
                &[],
                &[],
            ),
        ],
    }
}

/// WF-C3: control test planning and execution with independent review.
pub fn control_testing() -> WorkflowDefinition {
    WorkflowDefinition {
        id: "control-testing".to_string(),
        name: "Control Testing".to_string(),
        description: "Workflow for planning and executing control tests".to_string(),
        initial_step: "plan_test".to_string(),
        steps: vec![
            step(
                "plan_test",
                "Plan Test",
                "Create test plan with objectives and procedures",
                "tester",
                &["test_objective", "test_procedure", "population_description"],
                &["sample_selection"],
            ),
            step(
                "sample_selection",
                "Sample Selection",
                "Select sample for testing",
                "tester",
                &["sample_plan", "sample_size"],
                &["perform_test"],
            ),
            step(
                "perform_test",
                "Perform Test",
                "Execute test procedures on selected samples",
                "tester",
                &["test_results", "sample_results"],
                &["record_results"],
            ),
            step(
                "record_results",
                "Record Results",
                "Document test results and findings",
                "tester",
                &["overall_result", "findings"],
                &["review_results"],
            ),
            // Review must be performed by an actor other than the tester
            // (segregation of duties).
            step(
                "review_results",
                "Review Results",
                "Independent review of test results",
                "reviewer",
                &["review_decision"],
                &["approve_results", "reject_results"],
            ),
            step(
                "approve_results",
                "Approve Results",
                "Test results approved",
                "reviewer",
                &[],
                &["complete_test"],
            ),
            step(
                "reject_results",
                "Reject Results",
                "Test results rejected, return to testing",
                "reviewer",
                &["rejection_reason"],
                &["perform_test"],
            ),
            step(
                "complete_test",
                "Complete Test",
                "Test completed successfully",
                "system",
                &[],
                &[],
            ),
        ],
    }
}

/// WF-C4: exception lifecycle with compensating controls and periodic review.
pub fn exception_management() -> WorkflowDefinition {
    WorkflowDefinition {
        id: "exception-management".to_string(),
        name: "Exception Management".to_string(),
        description: "Workflow for managing control exceptions and compensating controls"
            .to_string(),
        initial_step: "create_exception".to_string(),
        steps: vec![
            step(
                "create_exception",
                "Create Exception",
                "Request control exception with business justification",
                "control_owner",
                &["exception_type", "reason", "business_justification", "start_date"],
                &["risk_assessment"],
            ),
            step(
                "risk_assessment",
                "Risk Assessment",
                "Assess risk impact of exception",
                "risk_manager",
                &["risk_assessment", "impact_analysis"],
                &["define_compensating"],
            ),
            step(
                "define_compensating",
                "Define Compensating Controls",
                "Define compensating controls to mitigate risk",
                "control_owner",
                &["compensating_controls"],
                &["approval_gate"],
            ),
            step(
                "approval_gate",
                "Exception Approval",
                "Risk manager or compliance officer approves exception",
                "risk_manager",
                &["approval_decision"],
                &["approve_exception", "reject_exception"],
            ),
            step(
                "approve_exception",
                "Approve Exception",
                "Exception approved and activated",
                "risk_manager",
                &["review_frequency"],
                &["active_exception"],
            ),
            step(
                "reject_exception",
                "Reject Exception",
                "Exception rejected",
                "risk_manager",
                &["rejection_reason"],
                &["create_exception"],
            ),
            step(
                "active_exception",
                "Active Exception",
                "Exception is active and being monitored",
                "system",
                &[],
                &["review_exception", "expire_exception"],
            ),
            step(
                "review_exception",
                "Review Exception",
                "Periodic review of active exception",
                "risk_manager",
                &["review_outcome"],
                &["renew_exception", "close_exception"],
            ),
            step(
                "renew_exception",
                "Renew Exception",
                "Exception renewed for another period",
                "risk_manager",
                &["new_end_date"],
                &["active_exception"],
            ),
            step(
                "expire_exception",
                "Exception Expired",
                "Exception has expired automatically",
                "system",
                &[],
                &["close_exception"],
            ),
            step(
                "close_exception",
                "Close Exception",
                "Exception closed and archived",
                "system",
                &["closure_reason"],
                &[],
            ),
        ],
    }
}

/// WF-C5: change management for existing controls.
pub fn change_control() -> WorkflowDefinition {
    WorkflowDefinition {
        id: "change-control".to_string(),
        name: "Control Change Management".to_string(),
        description: "Workflow for managing changes to existing controls".to_string(),
        initial_step: "create_change_request".to_string(),
        steps: vec![
            step(
                "create_change_request",
                "Create Change Request",
                "Submit request to change existing control",
                "control_owner",
                &["change_description", "change_justification", "proposed_changes"],
                &["impact_analysis"],
            ),
            step(
                "impact_analysis",
                "Impact Analysis",
                "Analyze impact on frameworks, assessments, and reports",
                "compliance_officer",
                &["impact_matrix", "affected_frameworks"],
                &["approval_chain"],
            ),
            step(
                "approval_chain",
                "Approval Chain",
                "Multi-level approval based on change impact",
                "approver",
                &["approval_decision"],
                &["approve_change", "reject_change"],
            ),
            step(
                "approve_change",
                "Approve Change",
                "Change request approved",
                "approver",
                &[],
                &["implement_change"],
            ),
            step(
                "reject_change",
                "Reject Change",
                "Change request rejected",
                "approver",
                &["rejection_reason"],
                &["create_change_request"],
            ),
            step(
                "implement_change",
                "Implement Change",
                "Apply changes to control",
                "control_owner",
                &["implementation_notes"],
                &["version_bump"],
            ),
            step(
                "version_bump",
                "Version Control",
                "Update control version and maintain history",
                "system",
                &[],
                &["notify_stakeholders"],
            ),
            step(
                "notify_stakeholders",
                "Notify Stakeholders",
                "Notify affected stakeholders of changes",
                "system",
                &[],
                &["complete_change"],
            ),
            step(
                "complete_change",
                "Complete Change",
                "Change implementation completed",
                "system",
                &[],
                &[],
            ),
        ],
    }
}
