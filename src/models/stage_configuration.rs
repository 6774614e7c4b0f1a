use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::state_machine::PriorityLevel;

/// One ordered step in a document type's approval sequence.
///
/// Immutable at workflow-engine runtime; loaded once per initiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfiguration {
    pub document_type: String,
    pub stage_number: i32,
    pub name: String,
    pub required_role: String,
    pub allowed_roles: Vec<String>,
    pub standard_sla_hours: i64,
    pub escalation_threshold_hours: i64,
    pub required: bool,
    pub can_skip: bool,
    /// Workflows with a priority strictly below this ceiling pass the stage
    /// as `auto_approved` without an assigned reviewer.
    pub auto_approve_below: Option<PriorityLevel>,
    pub parallel_approval: bool,
}

impl StageConfiguration {
    pub fn new(
        document_type: impl Into<String>,
        stage_number: i32,
        name: impl Into<String>,
        required_role: impl Into<String>,
        standard_sla_hours: i64,
    ) -> Self {
        let required_role = required_role.into();
        Self {
            document_type: document_type.into(),
            stage_number,
            name: name.into(),
            allowed_roles: vec![required_role.clone()],
            required_role,
            standard_sla_hours,
            escalation_threshold_hours: standard_sla_hours,
            required: true,
            can_skip: false,
            auto_approve_below: None,
            parallel_approval: false,
        }
    }

    pub fn skippable(mut self) -> Self {
        self.required = false;
        self.can_skip = true;
        self
    }

    pub fn with_escalation_threshold(mut self, hours: i64) -> Self {
        self.escalation_threshold_hours = hours;
        self
    }

    pub fn with_allowed_roles(mut self, roles: &[&str]) -> Self {
        self.allowed_roles = roles.iter().map(|r| (*r).to_string()).collect();
        self
    }

    pub fn auto_approve_below(mut self, ceiling: PriorityLevel) -> Self {
        self.auto_approve_below = Some(ceiling);
        self
    }

    /// Check whether a workflow at the given priority passes this stage
    /// without review.
    pub fn auto_approves(&self, priority: PriorityLevel) -> bool {
        self.auto_approve_below
            .map(|ceiling| priority < ceiling)
            .unwrap_or(false)
    }
}

/// Errors raised while loading a stage configuration set
#[derive(Debug, Clone, Error)]
pub enum StageConfigError {
    #[error("document type '{document_type}' has no stages")]
    Empty { document_type: String },

    #[error("document type '{document_type}' stages must be contiguous from 1, found {found} at position {position}")]
    NonContiguous {
        document_type: String,
        found: i32,
        position: usize,
    },

    #[error("document type '{document_type}' stage {stage}: {message}")]
    InvalidStage {
        document_type: String,
        stage: i32,
        message: String,
    },
}

/// Read-only store of per-document-type stage sequences.
///
/// Validated on insert: stage numbers contiguous from 1, positive SLA hours,
/// and no parallel approval (the single-pending-queue-item invariant makes
/// concurrent per-stage approvers unrepresentable).
#[derive(Debug, Clone, Default)]
pub struct StageConfigStore {
    stages: HashMap<String, Vec<StageConfiguration>>,
}

impl StageConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The deployment's default four-stage sequences.
    pub fn with_defaults() -> Self {
        let mut store = Self::new();
        for document_type in ["contract", "insurance_certificate", "compliance_report"] {
            let stages = default_stage_sequence(document_type);
            store
                .insert_document_type(document_type, stages)
                .expect("default stage set is valid");
        }
        store
    }

    pub fn insert_document_type(
        &mut self,
        document_type: impl Into<String>,
        mut stages: Vec<StageConfiguration>,
    ) -> Result<(), StageConfigError> {
        let document_type = document_type.into();
        if stages.is_empty() {
            return Err(StageConfigError::Empty { document_type });
        }

        stages.sort_by_key(|s| s.stage_number);
        for (position, stage) in stages.iter().enumerate() {
            let expected = position as i32 + 1;
            if stage.stage_number != expected {
                return Err(StageConfigError::NonContiguous {
                    document_type,
                    found: stage.stage_number,
                    position,
                });
            }
            if stage.standard_sla_hours <= 0 {
                return Err(StageConfigError::InvalidStage {
                    document_type,
                    stage: stage.stage_number,
                    message: "standard SLA hours must be positive".to_string(),
                });
            }
            if stage.escalation_threshold_hours <= 0 {
                return Err(StageConfigError::InvalidStage {
                    document_type,
                    stage: stage.stage_number,
                    message: "escalation threshold hours must be positive".to_string(),
                });
            }
            if stage.parallel_approval {
                return Err(StageConfigError::InvalidStage {
                    document_type,
                    stage: stage.stage_number,
                    message: "parallel approval is not supported".to_string(),
                });
            }
        }

        self.stages.insert(document_type, stages);
        Ok(())
    }

    pub fn stages_for(&self, document_type: &str) -> Option<&[StageConfiguration]> {
        self.stages.get(document_type).map(Vec::as_slice)
    }

    pub fn stage(&self, document_type: &str, stage_number: i32) -> Option<&StageConfiguration> {
        self.stages_for(document_type)?
            .iter()
            .find(|s| s.stage_number == stage_number)
    }

    pub fn stage_count(&self, document_type: &str) -> Option<i32> {
        self.stages_for(document_type).map(|s| s.len() as i32)
    }

    pub fn document_types(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(String::as_str)
    }
}

fn default_stage_sequence(document_type: &str) -> Vec<StageConfiguration> {
    vec![
        StageConfiguration::new(document_type, 1, "Intake Review", "project_coordinator", 24)
            .with_allowed_roles(&["project_coordinator", "project_manager"])
            .with_escalation_threshold(12),
        StageConfiguration::new(
            document_type,
            2,
            "Compliance Review",
            "compliance_officer",
            48,
        )
        .with_escalation_threshold(24),
        StageConfiguration::new(document_type, 3, "Finance Review", "finance_manager", 24)
            .with_allowed_roles(&["finance_manager", "finance_director"])
            .with_escalation_threshold(12)
            .skippable()
            .auto_approve_below(PriorityLevel::Normal),
        StageConfiguration::new(document_type, 4, "Final Approval", "operations_director", 72)
            .with_escalation_threshold(24),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_store_has_four_contiguous_stages() {
        let store = StageConfigStore::with_defaults();
        let stages = store.stages_for("contract").unwrap();
        assert_eq!(stages.len(), 4);
        for (i, stage) in stages.iter().enumerate() {
            assert_eq!(stage.stage_number, i as i32 + 1);
        }
        assert_eq!(store.stage_count("contract"), Some(4));
        assert!(store.stages_for("unknown_type").is_none());
    }

    #[test]
    fn test_non_contiguous_stage_numbers_rejected() {
        let mut store = StageConfigStore::new();
        let stages = vec![
            StageConfiguration::new("permit", 1, "Review", "reviewer", 24),
            StageConfiguration::new("permit", 3, "Sign-off", "director", 24),
        ];
        let err = store.insert_document_type("permit", stages).unwrap_err();
        assert!(matches!(err, StageConfigError::NonContiguous { found: 3, .. }));
    }

    #[test]
    fn test_parallel_approval_rejected_at_load() {
        let mut store = StageConfigStore::new();
        let mut stage = StageConfiguration::new("permit", 1, "Review", "reviewer", 24);
        stage.parallel_approval = true;
        let err = store.insert_document_type("permit", vec![stage]).unwrap_err();
        assert!(matches!(err, StageConfigError::InvalidStage { .. }));
    }

    #[test]
    fn test_auto_approval_ceiling() {
        let stage = StageConfiguration::new("contract", 3, "Finance Review", "finance_manager", 24)
            .auto_approve_below(PriorityLevel::Normal);
        assert!(stage.auto_approves(PriorityLevel::Low));
        assert!(!stage.auto_approves(PriorityLevel::Normal));
        assert!(!stage.auto_approves(PriorityLevel::Critical));

        let plain = StageConfiguration::new("contract", 1, "Intake", "coordinator", 24);
        assert!(!plain.auto_approves(PriorityLevel::Low));
    }
}
