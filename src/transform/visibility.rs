use std::collections::BTreeSet;

use crate::context::CompileContext;
use crate::error::GenerateError;
use crate::field::remove_fields;

use super::{OperationDraft, Transform};

#[derive(Debug)]
pub struct Visibility {
    query: BTreeSet<String>,
    body: BTreeSet<String>,
}

impl Visibility {
    pub fn new(query: BTreeSet<String>, body: BTreeSet<String>) -> Self {
        Self { query, body }
    }
}

impl Transform for Visibility {
    fn name(&self) -> &'static str {
        "visibility"
    }

    fn apply(&self, draft: &mut OperationDraft, _ctx: &CompileContext) -> Result<(), GenerateError> {
        draft.request.query.retain(|param| !self.query.contains(&param.name));
        for properties in draft.request.body.properties_mut() {
            properties.retain(|prop| !self.body.contains(&prop.property));
        }

        // A field shared by a parameter and a body property survives while
        // either side still reads it.
        let mut in_use = draft.parameter_keys();
        for properties in draft.request.body.properties_mut() {
            in_use.extend(properties.iter().map(|prop| prop.field.clone()));
        }
        remove_fields(&mut draft.fields, &|key| {
            (self.query.contains(key) || self.body.contains(key)) && !in_use.contains(key)
        });
        if let Some(schema) = draft.body_schema.as_mut() {
            schema.remove_properties(&self.body);
        }
        Ok(())
    }
}
