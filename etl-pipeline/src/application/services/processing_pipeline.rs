// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Processing pipeline: applies a declared, ordered list of named
//! transformations to a payload.
//!
//! The step registry is open (I5) - new step names can be registered at
//! construction time without modifying any existing step.

use etl_domain::{EtlError, ProcessingStepConfig, TabularPayload};
use std::collections::HashMap;
use std::sync::Arc;

/// A single named transformation. Implementations must not mutate the
/// input in place - each returns the new payload.
pub trait ProcessingStep: Send + Sync {
    fn apply(&self, payload: &TabularPayload, params: &serde_json::Value) -> Result<TabularPayload, EtlError>;
}

impl<F> ProcessingStep for F
where
    F: Fn(&TabularPayload, &serde_json::Value) -> Result<TabularPayload, EtlError> + Send + Sync,
{
    fn apply(&self, payload: &TabularPayload, params: &serde_json::Value) -> Result<TabularPayload, EtlError> {
        self(payload, params)
    }
}

/// Open registry of step name -> implementation.
#[derive(Clone, Default)]
pub struct StepRegistry {
    steps: HashMap<String, Arc<dyn ProcessingStep>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, step: Arc<dyn ProcessingStep>) {
        self.steps.insert(name.into(), step);
    }

    fn get(&self, name: &str) -> Result<Arc<dyn ProcessingStep>, EtlError> {
        self.steps
            .get(name)
            .cloned()
            .ok_or_else(|| EtlError::UnknownStep(name.to_string()))
    }

    /// Whether `name` is registered, used by config validation to reject an
    /// unknown step name before any platform runs.
    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }
}

/// Built by a `StepRegistry`, validating every step name against it at
/// construction time, then applied in order at `process` time.
pub struct Pipeline {
    steps: Vec<(String, Arc<dyn ProcessingStep>, serde_json::Value)>,
}

impl Pipeline {
    /// Resolves every configured step against `registry`, failing at
    /// construction with `EtlError::UnknownStep` if any name is
    /// unregistered - configuration errors surface before any data moves.
    pub fn build(registry: &StepRegistry, config: &[ProcessingStepConfig]) -> Result<Self, EtlError> {
        let mut steps = Vec::with_capacity(config.len());
        for entry in config {
            let step = registry.get(&entry.step_name)?;
            steps.push((entry.step_name.clone(), step, entry.params.clone()));
        }
        Ok(Self { steps })
    }

    /// Applies each step in order. On failure, reports which step failed;
    /// the caller decides whether that aborts the table or the platform.
    pub fn process(&self, payload: TabularPayload) -> Result<TabularPayload, EtlError> {
        let mut current = payload;
        for (name, step, params) in &self.steps {
            current = step.apply(&current, params).map_err(|cause| EtlError::StepFailed {
                step: name.clone(),
                cause: cause.to_string(),
            })?;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_domain::Column;

    fn passthrough() -> Arc<dyn ProcessingStep> {
        Arc::new(|payload: &TabularPayload, _: &serde_json::Value| Ok(payload.clone()))
    }

    fn always_fails() -> Arc<dyn ProcessingStep> {
        Arc::new(|_: &TabularPayload, _: &serde_json::Value| Err(EtlError::Data("boom".into())))
    }

    #[test]
    fn unknown_step_fails_at_construction() {
        let registry = StepRegistry::new();
        let config = vec![ProcessingStepConfig {
            step_name: "does_not_exist".into(),
            params: serde_json::Value::Null,
        }];
        assert!(matches!(
            Pipeline::build(&registry, &config),
            Err(EtlError::UnknownStep(_))
        ));
    }

    #[test]
    fn failed_step_is_named_in_the_error() {
        let mut registry = StepRegistry::new();
        registry.register("boom", always_fails());
        let config = vec![ProcessingStepConfig {
            step_name: "boom".into(),
            params: serde_json::Value::Null,
        }];
        let pipeline = Pipeline::build(&registry, &config).unwrap();
        let payload = TabularPayload::new(vec![Column::new("id", vec![])]).unwrap();
        match pipeline.process(payload) {
            Err(EtlError::StepFailed { step, .. }) => assert_eq!(step, "boom"),
            other => panic!("expected StepFailed, got {other:?}"),
        }
    }

    #[test]
    fn steps_apply_in_declared_order() {
        let mut registry = StepRegistry::new();
        registry.register("a", passthrough());
        registry.register("b", passthrough());
        let config = vec![
            ProcessingStepConfig {
                step_name: "a".into(),
                params: serde_json::Value::Null,
            },
            ProcessingStepConfig {
                step_name: "b".into(),
                params: serde_json::Value::Null,
            },
        ];
        let pipeline = Pipeline::build(&registry, &config).unwrap();
        let payload = TabularPayload::new(vec![Column::new("id", vec![])]).unwrap();
        assert!(pipeline.process(payload).is_ok());
    }
}
