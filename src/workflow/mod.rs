//! Workflow catalog and transition engine.
//!
//! Definitions are immutable once registered and the engine is deliberately
//! stateless: it answers graph questions (legal next steps, required fields,
//! responsible actor) and never tracks which step an entity is on. The
//! current-step pointer lives with the entity that owns it.

pub mod definitions;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::errors::DefinitionError;

/// One step in a workflow graph.
///
/// A step with an empty `next_steps` list is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Role responsible for completing this step.
    pub actor: String,
    /// Fields that must be populated on the entity before leaving this step.
    pub required_fields: Vec<String>,
    /// Legal transitions out of this step, by step id.
    pub next_steps: Vec<String>,
}

/// An immutable, process-wide workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub initial_step: String,
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowDefinition {
    pub fn step(&self, step_id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// Graph validation performed at registration time: every `next_steps`
    /// id must resolve within this definition, the initial step must exist,
    /// step ids must be unique, and at least one step must be terminal.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(DefinitionError::DuplicateStep {
                    workflow: self.id.clone(),
                    step: step.id.clone(),
                });
            }
        }

        if self.step(&self.initial_step).is_none() {
            return Err(DefinitionError::MissingInitialStep {
                workflow: self.id.clone(),
                initial: self.initial_step.clone(),
            });
        }

        for step in &self.steps {
            for next in &step.next_steps {
                if !seen.contains(next.as_str()) {
                    return Err(DefinitionError::DanglingNextStep {
                        workflow: self.id.clone(),
                        step: step.id.clone(),
                        next: next.clone(),
                    });
                }
            }
        }

        if !self.steps.iter().any(|s| s.next_steps.is_empty()) {
            return Err(DefinitionError::NoTerminalStep {
                workflow: self.id.clone(),
            });
        }

        Ok(())
    }
}

/// Read-only transition engine over a set of registered definitions.
///
/// Illegal transitions are refused with `false`, never raised as errors:
/// transition attempts are expected user input. Unknown workflow or step ids
/// answer the same way as "no such transition" so callers cannot probe the
/// registry's shape.
#[derive(Debug, Default)]
pub struct WorkflowEngine {
    definitions: HashMap<String, WorkflowDefinition>,
}

impl WorkflowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine preloaded with the five built-in GRC workflow definitions.
    pub fn with_builtin() -> Result<Self, DefinitionError> {
        let mut engine = Self::new();
        for definition in definitions::builtin() {
            engine.register(definition)?;
        }
        Ok(engine)
    }

    pub fn register(&mut self, definition: WorkflowDefinition) -> Result<(), DefinitionError> {
        definition.validate()?;
        if self.definitions.contains_key(&definition.id) {
            return Err(DefinitionError::DuplicateWorkflow {
                workflow: definition.id,
            });
        }
        self.definitions.insert(definition.id.clone(), definition);
        Ok(())
    }

    pub fn get_workflow(&self, workflow_id: &str) -> Option<&WorkflowDefinition> {
        self.definitions.get(workflow_id)
    }

    pub fn all_workflows(&self) -> Vec<&WorkflowDefinition> {
        self.definitions.values().collect()
    }

    /// Steps reachable from `step_id`; empty when the step is terminal or
    /// either id is unknown.
    pub fn next_steps(&self, workflow_id: &str, step_id: &str) -> Vec<&WorkflowStep> {
        let Some(definition) = self.definitions.get(workflow_id) else {
            return Vec::new();
        };
        let Some(step) = definition.step(step_id) else {
            return Vec::new();
        };
        definition
            .steps
            .iter()
            .filter(|s| step.next_steps.contains(&s.id))
            .collect()
    }

    /// True only when `to_step` appears in `from_step`'s legal transitions.
    pub fn validate_transition(&self, workflow_id: &str, from_step: &str, to_step: &str) -> bool {
        self.definitions
            .get(workflow_id)
            .and_then(|d| d.step(from_step))
            .map(|s| s.next_steps.iter().any(|n| n == to_step))
            .unwrap_or(false)
    }

    /// Fields that must be populated before the step is complete; empty for
    /// unknown ids.
    pub fn required_fields(&self, workflow_id: &str, step_id: &str) -> &[String] {
        self.definitions
            .get(workflow_id)
            .and_then(|d| d.step(step_id))
            .map(|s| s.required_fields.as_slice())
            .unwrap_or(&[])
    }

    pub fn step_actor(&self, workflow_id: &str, step_id: &str) -> Option<&str> {
        self.definitions
            .get(workflow_id)
            .and_then(|d| d.step(step_id))
            .map(|s| s.actor.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, next: &[&str]) -> WorkflowStep {
        WorkflowStep {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            actor: "system".to_string(),
            required_fields: Vec::new(),
            next_steps: next.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn definition(id: &str, initial: &str, steps: Vec<WorkflowStep>) -> WorkflowDefinition {
        WorkflowDefinition {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            initial_step: initial.to_string(),
            steps,
        }
    }

    #[test]
    fn rejects_dangling_next_step() {
        let def = definition("wf", "a", vec![step("a", &["missing"]), step("b", &[])]);
        assert!(matches!(
            def.validate(),
            Err(DefinitionError::DanglingNextStep { .. })
        ));
    }

    #[test]
    fn rejects_missing_initial_step() {
        let def = definition("wf", "nope", vec![step("a", &[])]);
        assert!(matches!(
            def.validate(),
            Err(DefinitionError::MissingInitialStep { .. })
        ));
    }

    #[test]
    fn rejects_graph_without_terminal_step() {
        let def = definition("wf", "a", vec![step("a", &["b"]), step("b", &["a"])]);
        assert!(matches!(
            def.validate(),
            Err(DefinitionError::NoTerminalStep { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_step_ids() {
        let def = definition("wf", "a", vec![step("a", &[]), step("a", &[])]);
        assert!(matches!(
            def.validate(),
            Err(DefinitionError::DuplicateStep { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_workflow_registration() {
        let mut engine = WorkflowEngine::new();
        engine
            .register(definition("wf", "a", vec![step("a", &[])]))
            .unwrap();
        assert!(matches!(
            engine.register(definition("wf", "a", vec![step("a", &[])])),
            Err(DefinitionError::DuplicateWorkflow { .. })
        ));
    }

    #[test]
    fn unknown_ids_refuse_rather_than_error() {
        let engine = WorkflowEngine::with_builtin().unwrap();
        assert!(engine.next_steps("no-such-workflow", "draft").is_empty());
        assert!(engine.next_steps("new-control", "no-such-step").is_empty());
        assert!(!engine.validate_transition("new-control", "draft", "no-such-step"));
        assert!(!engine.validate_transition("no-such-workflow", "a", "b"));
        assert!(engine.required_fields("new-control", "no-such-step").is_empty());
        assert_eq!(engine.step_actor("new-control", "no-such-step"), None);
    }

    #[test]
    fn transition_is_exact_membership_test() {
        let engine = WorkflowEngine::with_builtin().unwrap();
        assert!(engine.validate_transition("new-control", "design_review", "approve_design"));
        assert!(engine.validate_transition("new-control", "design_review", "reject_design"));
        // Legal edge the other way around does not exist.
        assert!(!engine.validate_transition("new-control", "approve_design", "design_review"));
    }
}
