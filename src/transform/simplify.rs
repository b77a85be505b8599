use std::collections::BTreeSet;

use crate::config::SimplifyConfig;
use crate::context::CompileContext;
use crate::error::GenerateError;
use crate::field::{FieldDescriptor, object_fields, schema_to_field};
use crate::naming::slugify;
use crate::request::{BodyPlan, BodyProperty};
use crate::schema::SchemaNode;

use super::{OperationDraft, Transform, is_json};

#[derive(Debug)]
pub struct Simplify {
    operation: String,
    array_field: String,
    item_schema: Option<SchemaNode>,
    public_name: Option<String>,
    additional: Vec<String>,
    hidden: BTreeSet<String>,
}

impl Simplify {
    /// `item_schema` is the already resolved `simplify.itemSchema`; without it
    /// the array's own item schema is used.
    pub fn new(
        operation: &str,
        config: &SimplifyConfig,
        item_schema: Option<SchemaNode>,
        hidden: BTreeSet<String>,
    ) -> Self {
        Self {
            operation: operation.to_string(),
            array_field: config.array_field.clone(),
            item_schema,
            public_name: config
                .public_name
                .as_ref()
                .filter(|name| !name.trim().is_empty())
                .cloned(),
            additional: config.additional_properties.clone(),
            hidden,
        }
    }

    fn unknown_array_field(&self) -> GenerateError {
        GenerateError::UnknownArrayField {
            operation: self.operation.clone(),
            field: self.array_field.clone(),
        }
    }
}

impl Transform for Simplify {
    fn name(&self) -> &'static str {
        "simplify"
    }

    fn apply(&self, draft: &mut OperationDraft, _ctx: &CompileContext) -> Result<(), GenerateError> {
        let body = draft
            .body_schema
            .clone()
            .ok_or_else(|| self.unknown_array_field())?;
        let array = body
            .property(&self.array_field)
            .filter(|p| p.is_array())
            .ok_or_else(|| self.unknown_array_field())?;

        let mut item = match &self.item_schema {
            Some(item) => item.clone(),
            None => array.items.as_deref().cloned().unwrap_or_default(),
        };
        item.remove_properties(&self.hidden);

        let mut extras = Vec::with_capacity(self.additional.len());
        for name in &self.additional {
            let prop = body.property(name).ok_or_else(|| {
                GenerateError::UnknownAdditionalProperty {
                    operation: draft.operation_id.clone(),
                    property: name.clone(),
                }
            })?;
            extras.push((name.clone(), prop));
        }

        let params = draft.parameter_keys();
        draft.fields.retain(|f| params.contains(&f.key) || !body.properties.contains_key(&f.key));

        let item_fields = object_fields(&item);
        let item_props: Vec<BodyProperty> = item
            .properties
            .iter()
            .map(|(name, prop)| BodyProperty::new(name.clone(), is_json(prop)))
            .collect();

        let group = match &self.public_name {
            Some(public_name) => {
                let key = slugify(public_name);
                match FieldDescriptor::group(key.clone(), public_name.clone(), item_fields) {
                    Some(mut parent) => {
                        parent.required = body.is_required(&self.array_field);
                        draft.fields.push(parent);
                        Some(key)
                    }
                    None => {
                        draft.warn(format!(
                            "item schema of `{}` has no properties to group",
                            self.array_field
                        ));
                        None
                    }
                }
            }
            None => {
                for field in item_fields {
                    if draft.has_field(&field.key) {
                        draft.warn(format!(
                            "item property `{}` shares its input with an existing field",
                            field.key
                        ));
                    } else {
                        draft.fields.push(field);
                    }
                }
                None
            }
        };

        for (name, prop) in &extras {
            if !draft.has_field(name) {
                draft
                    .fields
                    .push(schema_to_field(Some(*prop), name, body.is_required(name), None));
            }
        }

        draft.request.body = BodyPlan::Flatten {
            array_field: self.array_field.clone(),
            group,
            item: item_props,
            extra: extras
                .iter()
                .map(|(name, prop)| BodyProperty::new(name.clone(), is_json(prop)))
                .collect(),
        };
        draft.item_schema = Some(item);
        Ok(())
    }
}
