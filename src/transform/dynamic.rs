use crate::config::DynamicFieldConfig;
use crate::context::CompileContext;
use crate::error::GenerateError;
use crate::field::{DynamicBinding, find_field_mut};

use super::{OperationDraft, Transform};

const DEFAULT_VALUE_PROPERTY: &str = "id";

#[derive(Debug)]
pub struct DynamicFields {
    bindings: Vec<(String, DynamicFieldConfig)>,
}

impl DynamicFields {
    pub fn new(bindings: Vec<(String, DynamicFieldConfig)>) -> Self {
        Self { bindings }
    }
}

impl Transform for DynamicFields {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    fn apply(&self, draft: &mut OperationDraft, ctx: &CompileContext) -> Result<(), GenerateError> {
        for (key, cfg) in &self.bindings {
            if !ctx.has_hidden_trigger(&cfg.trigger) {
                draft.warn(format!(
                    "dynamic field `{key}` uses trigger `{}` which is not a registered hidden trigger; binding dropped",
                    cfg.trigger
                ));
                continue;
            }

            let Some(field) = find_field_mut(&mut draft.fields, key) else {
                draft.warn(format!("dynamic field `{key}` does not exist"));
                continue;
            };
            field.dynamic = Some(DynamicBinding {
                trigger: cfg.trigger.clone(),
                value_property: cfg
                    .value_property
                    .clone()
                    .unwrap_or_else(|| DEFAULT_VALUE_PROPERTY.to_string()),
                label_property: cfg.label_property.clone(),
            });
        }
        Ok(())
    }
}
