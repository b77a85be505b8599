use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiddenTrigger {
    pub key: String,
    pub endpoint: String,
}

#[derive(Debug, Default)]
pub struct CompileContext {
    hidden_triggers: BTreeMap<String, HiddenTrigger>,
    trigger_keys: BTreeSet<String>,
    action_keys: BTreeSet<String>,
    warnings: Vec<String>,
}

impl CompileContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_hidden_trigger(&mut self, trigger: HiddenTrigger) {
        self.hidden_triggers.insert(trigger.key.clone(), trigger);
    }

    pub fn hidden_trigger(&self, key: &str) -> Option<&HiddenTrigger> {
        self.hidden_triggers.get(key)
    }

    pub fn has_hidden_trigger(&self, key: &str) -> bool {
        self.hidden_triggers.contains_key(key)
    }

    pub fn claim_trigger(&mut self, key: &str) -> bool {
        self.trigger_keys.insert(key.to_string())
    }

    pub fn claim_action(&mut self, key: &str) -> bool {
        self.action_keys.insert(key.to_string())
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.warnings.push(message);
    }

    pub fn extend_warnings(&mut self, warnings: impl IntoIterator<Item = String>) {
        self.warnings.extend(warnings);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<String> {
        self.warnings
    }
}
