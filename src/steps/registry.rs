//! Step Registry
//!
//! Maps step-type names to implementations. Each engine owns its own
//! registry; it is filled before the engine starts and only read afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use super::{DelayStep, EmailStep, HttpRequestStep, IfStep, Step, TriggerStep};
use crate::config::EngineConfig;
use crate::error::StepError;
use crate::graph::StepKind;

#[derive(Clone, Default)]
pub struct StepRegistry {
    steps: HashMap<String, Arc<dyn Step>>,
}

impl StepRegistry {
    /// Registry with nothing registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in steps: `trigger`/`webhook`, `http_request`,
    /// `email`, `delay` and `if`. Fails when the HTTP client cannot be built.
    pub fn with_builtins(config: &EngineConfig) -> Result<Self, StepError> {
        let mut registry = Self::empty();
        let passthrough: Arc<dyn Step> = Arc::new(TriggerStep);

        registry.register_shared(StepKind::Trigger.as_str(), passthrough.clone());
        registry.register_shared(StepKind::Webhook.as_str(), passthrough);
        registry.register(
            StepKind::HttpRequest.as_str(),
            HttpRequestStep::new(config.http_timeout())?,
        );
        registry.register(StepKind::Email.as_str(), EmailStep::smtp(config.smtp.clone()));
        registry.register(StepKind::Delay.as_str(), DelayStep);
        registry.register(StepKind::If.as_str(), IfStep);
        Ok(registry)
    }

    /// Inserts a step, replacing any previous one with the same type.
    pub fn register<S: Step + 'static>(&mut self, step_type: impl Into<String>, step: S) {
        self.register_shared(step_type, Arc::new(step));
    }

    pub fn register_shared(&mut self, step_type: impl Into<String>, step: Arc<dyn Step>) {
        let step_type = step_type.into();
        debug!("Registered step type '{}'", step_type);
        self.steps.insert(step_type, step);
    }

    pub fn resolve(&self, step_type: &str) -> Option<Arc<dyn Step>> {
        self.steps.get(step_type).cloned()
    }

    pub fn contains(&self, step_type: &str) -> bool {
        self.steps.contains_key(step_type)
    }

    /// Registered type names, sorted.
    pub fn step_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.steps.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("steps", &self.step_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;
    use crate::graph::Node;
    use crate::steps::{StepContext, WorkingContext};
    use async_trait::async_trait;
    use serde_json::json;

    struct ConstantStep(&'static str);

    #[async_trait]
    impl Step for ConstantStep {
        async fn execute(
            &self,
            _ctx: &StepContext,
            _node: &Node,
            _input: &WorkingContext,
        ) -> Result<WorkingContext, StepError> {
            let mut out = WorkingContext::new();
            out.insert("value".to_string(), json!(self.0));
            Ok(out)
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = StepRegistry::with_builtins(&EngineConfig::default()).unwrap();
        assert_eq!(
            registry.step_types(),
            vec!["delay", "email", "http_request", "if", "trigger", "webhook"]
        );
    }

    #[test]
    fn test_empty_registry() {
        let registry = StepRegistry::empty();
        assert!(registry.is_empty());
        assert!(registry.resolve("delay").is_none());
    }

    #[tokio::test]
    async fn test_register_overwrites() {
        let mut registry = StepRegistry::empty();
        registry.register("custom", ConstantStep("first"));
        registry.register("custom", ConstantStep("second"));
        assert_eq!(registry.len(), 1);

        let step = registry.resolve("custom").unwrap();
        let out = step
            .execute(&StepContext::detached(), &Node::action("n", "custom"), &WorkingContext::new())
            .await
            .unwrap();
        assert_eq!(out["value"], json!("second"));
    }

    #[test]
    fn test_custom_type_alongside_builtins() {
        let mut registry = StepRegistry::with_builtins(&EngineConfig::default()).unwrap();
        registry.register("slack", ConstantStep("posted"));
        assert!(registry.contains("slack"));
        assert!(registry.contains("webhook"));
        assert!(!registry.contains("sms"));
    }
}
