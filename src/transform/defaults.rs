use std::collections::BTreeMap;

use serde_json::Value;

use crate::context::CompileContext;
use crate::error::GenerateError;
use crate::field::find_field_mut;

use super::{OperationDraft, Transform};

#[derive(Debug)]
pub struct Defaults {
    operation: String,
    defaults: BTreeMap<String, Value>,
}

impl Defaults {
    pub fn new(operation: &str, defaults: &BTreeMap<String, Value>) -> Self {
        Self {
            operation: operation.to_string(),
            defaults: defaults.clone(),
        }
    }
}

impl Transform for Defaults {
    fn name(&self) -> &'static str {
        "defaults"
    }

    fn apply(&self, draft: &mut OperationDraft, _ctx: &CompileContext) -> Result<(), GenerateError> {
        let mut skipped = Vec::new();

        for (key, value) in &self.defaults {
            let field = find_field_mut(&mut draft.fields, key).ok_or_else(|| {
                GenerateError::UnknownDefaultField {
                    operation: self.operation.clone(),
                    field: key.clone(),
                }
            })?;

            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => {
                    skipped.push(format!("default for `{key}` is not a scalar value; skipped"));
                    continue;
                }
            };
            if !field.set_default(text) {
                skipped.push(format!("default for `{key}` skipped: only string fields take defaults"));
            }
        }

        for message in skipped {
            draft.warn(message);
        }
        Ok(())
    }
}
