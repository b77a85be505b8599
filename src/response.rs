use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::endpoint::{EndpointDescriptor, ResponseDescriptor};
use crate::naming::{pluralize, to_snake};
use crate::schema::{SchemaKind, SchemaNode};

const GENERIC_WRAP_KEY: &str = "data";
const SENSITIVE_MARKERS: [&str; 7] = [
    "password",
    "secret",
    "token",
    "api_key",
    "apikey",
    "private_key",
    "access_key",
];
const PREFERRED_ARRAY_PROPERTIES: [&str; 5] = ["data", "items", "results", "records", "entries"];
const MAX_SAMPLE_DEPTH: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResponsePlan {
    /// 204: a fixed success object, the body is never read.
    NoContent,
    Passthrough,
    ExtractArray { property: String },
    ExtractSingle { property: String },
    WrapArray { key: String },
    ArrayAsIs,
    WrapObject,
    /// No schema information; decided from the runtime value.
    BestEffort { key: String, trigger: bool },
}

pub fn no_content() -> Value {
    json!({ "success": true, "status": 204 })
}

impl ResponsePlan {
    pub fn is_array_bearing(&self) -> bool {
        matches!(
            self,
            ResponsePlan::ExtractArray { .. } | ResponsePlan::ArrayAsIs
        )
    }

    /// Apply the plan. Trigger plans always yield an array, action plans an object.
    pub fn apply(&self, body: Option<Value>) -> Value {
        let body = body.unwrap_or(Value::Null);
        match self {
            ResponsePlan::NoContent => no_content(),
            ResponsePlan::Passthrough => match body {
                Value::Null => Value::Object(Map::new()),
                other => other,
            },
            ResponsePlan::ExtractArray { property } => match body {
                Value::Object(mut map) => match map.remove(property) {
                    Some(Value::Array(items)) => Value::Array(items),
                    _ => Value::Array(Vec::new()),
                },
                Value::Array(items) => Value::Array(items),
                _ => Value::Array(Vec::new()),
            },
            ResponsePlan::ExtractSingle { property } => {
                let first = match body {
                    Value::Object(mut map) => match map.remove(property) {
                        Some(Value::Array(items)) => items.into_iter().next(),
                        _ => None,
                    },
                    _ => None,
                };
                first.unwrap_or_else(|| Value::Object(Map::new()))
            }
            ResponsePlan::WrapArray { key } => match body {
                Value::Array(items) => json!({ key.as_str(): items }),
                Value::Null => Value::Object(Map::new()),
                other => other,
            },
            ResponsePlan::ArrayAsIs | ResponsePlan::WrapObject => match body {
                Value::Array(items) => Value::Array(items),
                Value::Null => Value::Array(Vec::new()),
                other => Value::Array(vec![other]),
            },
            ResponsePlan::BestEffort { key, trigger } => best_effort(body, key, *trigger),
        }
    }
}

fn best_effort(body: Value, key: &str, trigger: bool) -> Value {
    match (body, trigger) {
        (Value::Array(items), true) => Value::Array(items),
        (Value::Array(items), false) => json!({ key: items }),
        (Value::Object(map), true) => {
            let array = map.values().find(|v| v.is_array()).cloned();
            array.unwrap_or_else(|| Value::Array(vec![Value::Object(map)]))
        }
        (Value::Null, true) => Value::Array(Vec::new()),
        (Value::Null, false) => Value::Object(Map::new()),
        (other, true) => Value::Array(vec![other]),
        (other, false) => json!({ key: other }),
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SuccessResponse<'e> {
    NoContent,
    Body(&'e ResponseDescriptor),
    Undeclared,
}

/// 200, then 201, then any other 2xx; a 204 with neither 200 nor 201 means no body.
pub fn success_response(endpoint: &EndpointDescriptor) -> SuccessResponse<'_> {
    let responses = &endpoint.responses;
    for status in ["200", "201"] {
        if let Some(response) = responses.get(status) {
            return SuccessResponse::Body(response);
        }
    }
    if responses.contains_key("204") {
        return SuccessResponse::NoContent;
    }
    responses
        .iter()
        .find(|(status, _)| status.starts_with('2'))
        .map(|(_, response)| SuccessResponse::Body(response))
        .unwrap_or(SuccessResponse::Undeclared)
}

#[derive(Debug, Clone)]
pub struct Shaped {
    pub plan: ResponsePlan,
    pub item_schema: Option<SchemaNode>,
    pub body_schema: Option<SchemaNode>,
    pub sample: Map<String, Value>,
}

fn response_parts(endpoint: &EndpointDescriptor) -> Option<(Option<&SchemaNode>, Option<&Value>)> {
    match success_response(endpoint) {
        SuccessResponse::NoContent => None,
        SuccessResponse::Body(response) => Some((response.schema.as_ref(), response.example.as_ref())),
        SuccessResponse::Undeclared => Some((None, None)),
    }
}

/// Pick the array property of an object response: the only one, or a
/// conventional name when there are several.
pub fn detect_array_property(schema: &SchemaNode, noun: &str) -> Option<String> {
    let arrays = schema.array_properties();
    match arrays.as_slice() {
        [] => None,
        [only] => Some((*only).to_string()),
        many => {
            let plural = to_snake(&pluralize(noun));
            PREFERRED_ARRAY_PROPERTIES
                .iter()
                .copied()
                .chain(std::iter::once(plural.as_str()))
                .find(|name| many.contains(name))
                .map(str::to_string)
        }
    }
}

pub fn shape_action(
    endpoint: &EndpointDescriptor,
    noun: &str,
    extract_single: bool,
    property: Option<&str>,
) -> Shaped {
    let Some((schema, example)) = response_parts(endpoint) else {
        return no_content_shape();
    };
    let wrap_key = to_snake(&pluralize(noun));

    let (plan, item_schema) = match schema {
        None => (
            ResponsePlan::BestEffort {
                key: GENERIC_WRAP_KEY.to_string(),
                trigger: false,
            },
            None,
        ),
        Some(node) if node.is_array() => (
            ResponsePlan::WrapArray { key: wrap_key },
            Some(node.clone()),
        ),
        Some(node) => {
            let array_property = property
                .map(str::to_string)
                .or_else(|| detect_array_property(node, noun));
            match array_property {
                Some(property) if extract_single => {
                    let items = node
                        .property(&property)
                        .and_then(|p| p.items.as_deref())
                        .cloned();
                    (ResponsePlan::ExtractSingle { property }, items)
                }
                _ => (ResponsePlan::Passthrough, Some(node.clone())),
            }
        }
    };

    let mut sample = sample_from(&plan, schema, example, false);
    strip_sensitive(&mut sample);
    if sample.is_empty() {
        sample.insert("id".to_string(), json!(0));
    }

    Shaped {
        plan,
        item_schema,
        body_schema: schema.cloned(),
        sample,
    }
}

pub fn shape_trigger(
    endpoint: &EndpointDescriptor,
    noun: &str,
    array_property: Option<&str>,
) -> Shaped {
    let Some((schema, example)) = response_parts(endpoint) else {
        return no_content_shape();
    };

    let (plan, item_schema) = match (schema, array_property) {
        (Some(node), Some(property)) => (
            ResponsePlan::ExtractArray {
                property: property.to_string(),
            },
            node.property(property)
                .and_then(|p| p.items.as_deref())
                .cloned(),
        ),
        (None, Some(property)) => (
            ResponsePlan::ExtractArray {
                property: property.to_string(),
            },
            None,
        ),
        (None, None) => (
            ResponsePlan::BestEffort {
                key: GENERIC_WRAP_KEY.to_string(),
                trigger: true,
            },
            None,
        ),
        (Some(node), None) if node.is_array() => {
            (ResponsePlan::ArrayAsIs, node.items.as_deref().cloned())
        }
        (Some(node), None) => match detect_array_property(node, noun) {
            Some(property) => {
                let items = node
                    .property(&property)
                    .and_then(|p| p.items.as_deref())
                    .cloned();
                (ResponsePlan::ExtractArray { property }, items)
            }
            None => (ResponsePlan::WrapObject, Some(node.clone())),
        },
    };

    let mut sample = sample_from(&plan, schema, example, true);
    strip_sensitive(&mut sample);

    Shaped {
        plan,
        item_schema,
        body_schema: schema.cloned(),
        sample,
    }
}

fn no_content_shape() -> Shaped {
    let sample = match no_content() {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Shaped {
        plan: ResponsePlan::NoContent,
        item_schema: None,
        body_schema: None,
        sample,
    }
}

fn sample_from(
    plan: &ResponsePlan,
    schema: Option<&SchemaNode>,
    example: Option<&Value>,
    trigger: bool,
) -> Map<String, Value> {
    let candidates = [
        example.cloned(),
        schema.and_then(|s| s.example.clone()),
        schema.map(|s| synthesize(s, 0)),
    ];

    for raw in candidates.into_iter().flatten() {
        let shaped = plan.apply(Some(raw));
        let object = if trigger {
            match shaped {
                Value::Array(items) => items.into_iter().next(),
                other => Some(other),
            }
        } else {
            Some(shaped)
        };
        if let Some(Value::Object(map)) = object {
            if !map.is_empty() {
                return map;
            }
        }
    }
    Map::new()
}

pub fn synthesize(node: &SchemaNode, depth: usize) -> Value {
    if let Some(example) = &node.example {
        return example.clone();
    }
    if let Some(default) = &node.default {
        return default.clone();
    }
    if let Some(first) = node.enum_values.iter().find(|v| !v.is_null()) {
        return first.clone();
    }
    if node.recursive || depth > MAX_SAMPLE_DEPTH {
        return Value::Object(Map::new());
    }

    match node.kind {
        SchemaKind::String => match node.format.as_deref() {
            Some("date") => json!("2024-01-01"),
            Some("date-time") => json!("2024-01-01T00:00:00Z"),
            Some("email") => json!("user@example.com"),
            Some("uuid") => json!("00000000-0000-0000-0000-000000000000"),
            Some("uri" | "url") => json!("https://example.com"),
            _ => json!("string"),
        },
        SchemaKind::Integer => json!(1),
        SchemaKind::Number => json!(1.5),
        SchemaKind::Boolean => json!(true),
        SchemaKind::Array => match node.items.as_deref() {
            Some(items) => Value::Array(vec![synthesize(items, depth + 1)]),
            None => Value::Array(Vec::new()),
        },
        SchemaKind::Object => Value::Object(
            node.properties
                .iter()
                .map(|(name, prop)| (name.clone(), synthesize(prop, depth + 1)))
                .collect(),
        ),
        SchemaKind::Unknown => Value::Null,
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| key.contains(marker))
}

pub fn strip_sensitive(map: &mut Map<String, Value>) {
    map.retain(|key, _| !is_sensitive_key(key));
    for value in map.values_mut() {
        strip_value(value);
    }
}

fn strip_value(value: &mut Value) {
    match value {
        Value::Object(map) => strip_sensitive(map),
        Value::Array(items) => items.iter_mut().for_each(strip_value),
        _ => {}
    }
}

/// Identifier property of trigger items: `id`, `uuid`, `key`, `<noun>_id`, then
/// the first `*_id`/`*Id` property. Defaults to `id`.
pub fn detect_id_property(
    item_schema: Option<&SchemaNode>,
    sample: &Map<String, Value>,
    noun: &str,
) -> String {
    let names: Vec<&str> = match item_schema {
        Some(schema) if !schema.properties.is_empty() => {
            schema.properties.keys().map(String::as_str).collect()
        }
        _ => sample.keys().map(String::as_str).collect(),
    };

    let noun_id = format!("{}_id", to_snake(noun));
    for candidate in ["id", "uuid", "key", noun_id.as_str()] {
        if names.contains(&candidate) {
            return candidate.to_string();
        }
    }
    names
        .iter()
        .find(|name| name.ends_with("_id") || name.ends_with("Id"))
        .map(|name| (*name).to_string())
        .unwrap_or_else(|| "id".to_string())
}

pub fn ensure_identifier(sample: &mut Map<String, Value>, id_property: &str) {
    if sample.contains_key("id") {
        return;
    }
    let id = sample
        .get(id_property)
        .filter(|v| !v.is_null())
        .cloned()
        .unwrap_or_else(|| json!(1));
    sample.insert("id".to_string(), id);
}
