//! The per-action transform pipeline.
//!
//! Each configuration block of an action becomes one [`Transform`]; the
//! pipeline applies them in a fixed order over an [`OperationDraft`]:
//! visibility, simplify, helpers, dynamic fields, defaults.

mod defaults;
mod dynamic;
mod helpers;
mod simplify;
mod visibility;

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::{ActionConfig, DynamicFieldConfig};
use crate::context::CompileContext;
use crate::endpoint::EndpointDescriptor;
use crate::error::GenerateError;
use crate::field::{FieldDescriptor, param_to_field, schema_to_field};
use crate::request::{BodyPlan, BodyProperty, QueryParam, QueryValue, RequestPlan};
use crate::schema::{SchemaKind, SchemaNode, SchemaResolver};

pub use defaults::Defaults;
pub use dynamic::DynamicFields;
pub use helpers::Helpers;
pub use simplify::Simplify;
pub use visibility::Visibility;

#[derive(Debug, Clone)]
pub struct OperationDraft {
    pub operation_id: String,
    pub fields: Vec<FieldDescriptor>,
    pub request: RequestPlan,
    pub body_schema: Option<SchemaNode>,
    pub item_schema: Option<SchemaNode>,
    pub sample: Map<String, Value>,
    pub warnings: Vec<String>,
}

impl OperationDraft {
    /// Fields and request plan straight from the endpoint: path parameters,
    /// query parameters, then top-level body properties.
    pub fn from_endpoint(endpoint: &EndpointDescriptor, base_url: &str) -> Self {
        let mut request = RequestPlan::new(endpoint.method, base_url, &endpoint.path);
        let mut fields = Vec::new();

        for param in endpoint.path_params() {
            request.path_params.push(param.name.clone());
            fields.push(param_to_field(param));
        }
        for param in endpoint.query_params() {
            request.query.push(QueryParam {
                name: param.name.clone(),
                value: QueryValue::Field {
                    field: param.name.clone(),
                },
            });
            fields.push(param_to_field(param));
        }

        let body_schema = endpoint.request_body.as_ref().map(|b| b.schema.clone());
        match &body_schema {
            Some(schema) if schema.is_object() => {
                let mut properties = Vec::new();
                for (name, prop) in &schema.properties {
                    if fields.iter().any(|f| &f.key == name) {
                        debug!(
                            operation = endpoint.operation_id.as_str(),
                            property = name.as_str(),
                            "body property shares its key with a parameter"
                        );
                    } else {
                        fields.push(schema_to_field(
                            Some(prop),
                            name,
                            schema.is_required(name),
                            None,
                        ));
                    }
                    properties.push(BodyProperty::new(name.clone(), is_json(prop)));
                }
                request.body = BodyPlan::Object { properties };
            }
            Some(schema) => {
                debug!(
                    operation = endpoint.operation_id.as_str(),
                    kind = ?schema.kind,
                    "non-object request body has no input fields"
                );
            }
            None => {}
        }

        Self {
            operation_id: endpoint.operation_id.clone(),
            fields,
            request,
            body_schema,
            item_schema: None,
            sample: Map::new(),
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(operation = self.operation_id.as_str(), "{message}");
        self.warnings.push(message);
    }

    pub fn parameter_keys(&self) -> BTreeSet<String> {
        let query = self.request.query.iter().filter_map(|param| match &param.value {
            QueryValue::Field { field } => Some(field.clone()),
            QueryValue::Fixed { .. } => None,
        });
        self.request.path_params.iter().cloned().chain(query).collect()
    }

    pub fn has_field(&self, key: &str) -> bool {
        fn walk(fields: &[FieldDescriptor], key: &str) -> bool {
            fields
                .iter()
                .any(|f| f.key == key || walk(f.children(), key))
        }
        walk(&self.fields, key)
    }
}

/// Body properties holding arrays or objects are entered as JSON text.
pub(crate) fn is_json(node: &SchemaNode) -> bool {
    matches!(node.kind, SchemaKind::Array | SchemaKind::Object)
}

pub trait Transform: std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn apply(&self, draft: &mut OperationDraft, ctx: &CompileContext) -> Result<(), GenerateError>;
}

#[derive(Debug, Default)]
pub struct TransformPipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl TransformPipeline {
    pub fn new(transforms: Vec<Box<dyn Transform>>) -> Self {
        Self { transforms }
    }

    /// Component schemas named by the config are resolved here.
    pub fn from_config(
        operation_id: &str,
        config: &ActionConfig,
        resolver: &mut SchemaResolver<'_>,
    ) -> Result<Self, GenerateError> {
        let mut transforms: Vec<Box<dyn Transform>> = Vec::new();

        let hidden_query: BTreeSet<String> = config.hide_query_params.iter().cloned().collect();
        let hidden_body: BTreeSet<String> =
            config.hide_request_body_properties.iter().cloned().collect();
        if !hidden_query.is_empty() || !hidden_body.is_empty() {
            transforms.push(Box::new(Visibility::new(hidden_query, hidden_body.clone())));
        }

        if let Some(simplify) = config.simplify.as_ref().filter(|s| s.flatten_array) {
            let item_schema = match &simplify.item_schema {
                Some(name) => Some(resolver.resolve_component(name).ok_or_else(|| {
                    GenerateError::UnknownItemSchema {
                        operation: operation_id.to_string(),
                        schema: name.clone(),
                    }
                })?),
                None => None,
            };
            transforms.push(Box::new(Simplify::new(
                operation_id,
                simplify,
                item_schema,
                hidden_body,
            )));
        }

        if !config.helper_fields.is_empty() {
            transforms.push(Box::new(Helpers::new(&config.helper_fields)));
        }

        let mut bindings: Vec<(String, DynamicFieldConfig)> = config
            .dynamic_fields
            .iter()
            .map(|(key, cfg)| (key.clone(), cfg.clone()))
            .collect();
        bindings.extend(
            config
                .helper_fields
                .iter()
                .filter_map(|(key, helper)| Some((key.clone(), helper.dynamic.clone()?))),
        );
        if !bindings.is_empty() {
            transforms.push(Box::new(DynamicFields::new(bindings)));
        }

        if !config.field_defaults.is_empty() {
            transforms.push(Box::new(Defaults::new(operation_id, &config.field_defaults)));
        }

        Ok(Self { transforms })
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn run(&self, draft: &mut OperationDraft, ctx: &CompileContext) -> Result<(), GenerateError> {
        for transform in &self.transforms {
            debug!(
                operation = draft.operation_id.as_str(),
                transform = transform.name(),
                "applying transform"
            );
            transform.apply(draft, ctx)?;
        }
        Ok(())
    }
}
