use std::collections::BTreeMap;

use crate::config::HelperFieldConfig;
use crate::context::CompileContext;
use crate::error::GenerateError;
use crate::field::{FieldDescriptor, schema_to_field};
use crate::request::{BodyPlan, HelperMerge, MergeMode};
use crate::schema::SchemaNode;

use super::{OperationDraft, Transform};

/// Synthesizes optional helper inputs whose values are merged into a body property.
#[derive(Debug)]
pub struct Helpers {
    helpers: Vec<(String, HelperFieldConfig)>,
}

impl Helpers {
    pub fn new(helpers: &BTreeMap<String, HelperFieldConfig>) -> Self {
        Self {
            helpers: helpers
                .iter()
                .map(|(key, cfg)| (key.clone(), cfg.clone()))
                .collect(),
        }
    }
}

fn locate_target<'d>(draft: &'d OperationDraft, target: &str) -> Option<(&'d SchemaNode, bool)> {
    if matches!(draft.request.body, BodyPlan::Flatten { .. }) {
        if let Some(node) = draft.item_schema.as_ref().and_then(|s| s.property(target)) {
            return Some((node, true));
        }
    }
    draft
        .body_schema
        .as_ref()
        .and_then(|s| s.property(target))
        .map(|node| (node, false))
}

fn helper_field(key: &str, cfg: &HelperFieldConfig, target: Option<&SchemaNode>) -> FieldDescriptor {
    let mut field = match cfg.field_type {
        Some(field_type) => {
            let mut field = FieldDescriptor::scalar(key, field_type);
            field.help_text = cfg.help_text.clone();
            field
        }
        None => {
            // An array target takes one element per helper.
            let element = target.map(|t| t.items.as_deref().unwrap_or(t));
            schema_to_field(element, key, false, cfg.help_text.as_deref())
        }
    };
    if let Some(label) = &cfg.label {
        field.label = label.clone();
    }
    field.required = false;
    field
}

impl Transform for Helpers {
    fn name(&self) -> &'static str {
        "helpers"
    }

    fn apply(&self, draft: &mut OperationDraft, _ctx: &CompileContext) -> Result<(), GenerateError> {
        for (key, cfg) in &self.helpers {
            if draft.has_field(key) {
                draft.warn(format!("helper field `{key}` clashes with an existing field"));
                continue;
            }

            let located = locate_target(draft, &cfg.map_to).map(|(node, in_item)| (node.clone(), in_item));
            let (mode, in_item) = match &located {
                Some((node, in_item)) if node.is_array() => (MergeMode::Array, *in_item),
                Some((_, in_item)) => (MergeMode::Scalar, *in_item),
                None => {
                    draft.warn(format!(
                        "helper field `{key}` maps to `{}` which is not a request body property",
                        cfg.map_to
                    ));
                    (MergeMode::Scalar, false)
                }
            };

            let field = helper_field(key, cfg, located.as_ref().map(|(node, _)| node));
            draft.fields.push(field);

            let merges = &mut draft.request.merges;
            match merges
                .iter_mut()
                .find(|m| m.target == cfg.map_to && m.in_item == in_item)
            {
                Some(merge) => merge.sources.push(key.clone()),
                None => merges.push(HelperMerge {
                    target: cfg.map_to.clone(),
                    sources: vec![key.clone()],
                    mode,
                    in_item,
                }),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldType;
    use crate::transform::test_support::{BASE_URL, endpoints};
    use serde_json::{Map, Value, json};

    fn draft() -> OperationDraft {
        let ep = endpoints(json!({
            "paths": {
                "/tickets": {
                    "post": {
                        "operationId": "createTicket",
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "properties": {
                                            "title": { "type": "string" },
                                            "assignee_id": { "type": "integer" },
                                            "tag_ids": { "type": "array", "items": { "type": "integer" } }
                                        }
                                    }
                                }
                            }
                        },
                        "responses": {}
                    }
                }
            }
        }))
        .remove(0);
        OperationDraft::from_endpoint(&ep, BASE_URL)
    }

    fn helpers(value: Value) -> Helpers {
        let map: BTreeMap<String, HelperFieldConfig> = serde_json::from_value(value).unwrap();
        Helpers::new(&map)
    }

    #[test]
    fn helpers_sharing_an_array_target_merge() {
        let mut draft = draft();
        helpers(json!({
            "primary_tag": { "mapTo": "tag_ids", "label": "Primary Tag" },
            "secondary_tag": { "mapTo": "tag_ids" }
        }))
        .apply(&mut draft, &CompileContext::new())
        .unwrap();

        let primary = draft.fields.iter().find(|f| f.key == "primary_tag").unwrap();
        assert_eq!(primary.label, "Primary Tag");
        assert_eq!(primary.field_type(), Some(FieldType::Integer));
        assert!(!primary.required);

        assert_eq!(draft.request.merges.len(), 1);
        let merge = &draft.request.merges[0];
        assert_eq!(merge.mode, MergeMode::Array);
        assert_eq!(merge.sources, ["primary_tag", "secondary_tag"]);

        let inputs: Map<String, Value> = json!({
            "title": "t",
            "tag_ids": "[5, 7]",
            "primary_tag": 3,
            "secondary_tag": "5"
        })
        .as_object()
        .cloned()
        .unwrap();
        let request = draft.request.build(&inputs, None).unwrap();
        assert_eq!(request.body, Some(json!({ "title": "t", "tag_ids": [5, 7, 3] })));
    }

    #[test]
    fn scalar_target_and_explicit_type() {
        let mut draft = draft();
        helpers(json!({
            "assignee_email": { "mapTo": "assignee_id", "type": "string", "helpText": "Email of the assignee." }
        }))
        .apply(&mut draft, &CompileContext::new())
        .unwrap();

        let field = draft.fields.iter().find(|f| f.key == "assignee_email").unwrap();
        assert_eq!(field.field_type(), Some(FieldType::String));
        assert_eq!(field.help_text.as_deref(), Some("Email of the assignee."));
        assert_eq!(draft.request.merges[0].mode, MergeMode::Scalar);
    }

    #[test]
    fn unknown_target_warns_but_keeps_field() {
        let mut draft = draft();
        helpers(json!({ "extra": { "mapTo": "nowhere" } }))
            .apply(&mut draft, &CompileContext::new())
            .unwrap();
        assert!(draft.has_field("extra"));
        assert_eq!(draft.warnings.len(), 1);
    }
}
