//! Plan execution
//!
//! A plan is an ordered list of steps that reference stored descriptors by
//! element id. Steps run strictly one after another; a failed step is
//! reported and the plan carries on.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::{Action, Result, TargetingError};
use crate::executor::fallback::{ActionOutcome, FallbackExecutor};
use crate::store::DescriptorLookup;

/// One step of an action plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    pub step_number: u32,
    pub action: Action,
    /// Not needed for `wait`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Tried when the primary element cannot be acted on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_element_id: Option<String>,
    /// Pause after the step, in ms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_after: Option<u64>,
}

/// Status of an executed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
}

/// Result row for one executed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step: u32,
    pub action: Action,
    pub status: StepStatus,
    /// Element id that was acted on, or the requested one on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ActionOutcome>,
}

impl StepResult {
    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}

/// Read a plan from a JSON file
pub async fn load_plan(path: impl AsRef<Path>) -> Result<Vec<PlanStep>> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| {
            TargetingError::with_context(format!("Failed to read {}", path.display()), e)
        })?;
    Ok(serde_json::from_str(&content)?)
}

/// Runs plans through a fallback executor
pub struct PlanRunner<'a> {
    executor: &'a FallbackExecutor,
    lookup: &'a dyn DescriptorLookup,
}

impl<'a> PlanRunner<'a> {
    pub fn new(executor: &'a FallbackExecutor, lookup: &'a dyn DescriptorLookup) -> Self {
        Self { executor, lookup }
    }

    /// Run every step in order and report one row per step
    pub async fn run(&self, steps: &[PlanStep]) -> Vec<StepResult> {
        let mut results = Vec::with_capacity(steps.len());
        for step in steps {
            let result = self.run_step(step).await;
            if result.is_success() {
                info!(step = step.step_number, action = %step.action, "Step succeeded");
            } else {
                warn!(
                    step = step.step_number,
                    action = %step.action,
                    error = result.error.as_deref().unwrap_or_default(),
                    "Step failed"
                );
            }
            results.push(result);

            if let Some(ms) = step.wait_after.filter(|ms| *ms > 0) {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
        }
        results
    }

    async fn run_step(&self, step: &PlanStep) -> StepResult {
        if !step.action.needs_element() {
            let outcome = self
                .executor
                .perform_unbound(step.action, step.value.as_deref())
                .await;
            return self.row(step, step.element_id.clone(), outcome);
        }

        let Some(primary) = step.element_id.as_deref() else {
            return self.failed(step, None, "Step has no elementId");
        };

        let first = self.attempt(step, primary).await;
        let Some(fallback) = step.fallback_element_id.as_deref() else {
            return first;
        };
        if first.is_success() || fallback == primary {
            return first;
        }

        info!(step = step.step_number, primary, fallback, "Trying fallback element");
        let second = self.attempt(step, fallback).await;
        if second.is_success() {
            second
        } else {
            let error = format!(
                "{}; fallback {}: {}",
                first.error.unwrap_or_default(),
                fallback,
                second.error.unwrap_or_default()
            );
            StepResult {
                error: Some(error),
                ..second
            }
        }
    }

    async fn attempt(&self, step: &PlanStep, element_id: &str) -> StepResult {
        let Some(descriptor) = self.lookup.lookup(element_id) else {
            return self.failed(
                step,
                Some(element_id.to_string()),
                format!("Element {} not found in stored descriptors", element_id),
            );
        };
        let outcome = self
            .executor
            .perform(descriptor, step.action, step.value.as_deref())
            .await;
        self.row(step, Some(element_id.to_string()), outcome)
    }

    fn row(&self, step: &PlanStep, element: Option<String>, outcome: ActionOutcome) -> StepResult {
        StepResult {
            step: step.step_number,
            action: step.action,
            status: if outcome.success {
                StepStatus::Success
            } else {
                StepStatus::Failed
            },
            element,
            error: outcome.error.clone(),
            outcome: Some(outcome),
        }
    }

    fn failed(
        &self,
        step: &PlanStep,
        element: Option<String>,
        error: impl Into<String>,
    ) -> StepResult {
        StepResult {
            step: step.step_number,
            action: step.action,
            status: StepStatus::Failed,
            element,
            error: Some(error.into()),
            outcome: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_step_wire_format() {
        let steps: Vec<PlanStep> = serde_json::from_str(
            r#"[
                {"stepNumber": 1, "action": "fill", "elementId": "el-2", "value": "a@b.c"},
                {"stepNumber": 2, "action": "wait", "value": "500"},
                {"stepNumber": 3, "action": "click", "elementId": "el-4", "fallbackElementId": "el-9", "waitAfter": 100}
            ]"#,
        )
        .unwrap();

        assert_eq!(steps[0].action, Action::Type);
        assert_eq!(steps[1].element_id, None);
        assert_eq!(steps[2].fallback_element_id.as_deref(), Some("el-9"));
        assert_eq!(steps[2].wait_after, Some(100));
    }

    #[test]
    fn test_step_result_wire_format() {
        let row = StepResult {
            step: 3,
            action: Action::Click,
            status: StepStatus::Failed,
            element: Some("el-4".into()),
            error: Some("All strategies failed".into()),
            outcome: None,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["step"], 3);
        assert_eq!(json["action"], "click");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["element"], "el-4");
        assert_eq!(json["error"], "All strategies failed");
    }
}
