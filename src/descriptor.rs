use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::field::FieldDescriptor;
use crate::pagination::PaginationPlan;
use crate::request::{AuthPlan, RequestPlan};
use crate::response::ResponsePlan;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub key: String,
    pub noun: String,
    pub label: String,
    pub description: String,
    pub endpoint: String,
    pub fields: Vec<FieldDescriptor>,
    /// Never empty.
    pub sample: Map<String, Value>,
    pub request: RequestPlan,
    pub response: ResponsePlan,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionDescriptor {
    #[serde(flatten)]
    pub operation: Operation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDescriptor {
    #[serde(flatten)]
    pub operation: Operation,
    pub hidden: bool,
    pub id_property: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_plan: Option<LabelPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterPlan>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OperationDescriptor {
    Action(ActionDescriptor),
    Trigger(TriggerDescriptor),
}

impl OperationDescriptor {
    pub fn operation(&self) -> &Operation {
        match self {
            OperationDescriptor::Action(action) => &action.operation,
            OperationDescriptor::Trigger(trigger) => &trigger.operation,
        }
    }

    pub fn key(&self) -> &str {
        &self.operation().key
    }

    pub fn as_trigger(&self) -> Option<&TriggerDescriptor> {
        match self {
            OperationDescriptor::Trigger(trigger) => Some(trigger),
            OperationDescriptor::Action(_) => None,
        }
    }

    pub fn as_action(&self) -> Option<&ActionDescriptor> {
        match self {
            OperationDescriptor::Action(action) => Some(action),
            OperationDescriptor::Trigger(_) => None,
        }
    }
}

impl TriggerDescriptor {
    /// Items of one response body: shaped by the response plan, given an
    /// `id` copied from the identifier property, then filtered.
    pub fn items(&self, body: Option<Value>) -> Vec<Value> {
        let items = match self.operation.response.apply(body) {
            Value::Array(items) => items,
            other => vec![other],
        };
        let items = items
            .into_iter()
            .map(|item| identify(item, &self.id_property))
            .collect();
        match &self.filter {
            Some(filter) => filter.retain(items),
            None => items,
        }
    }
}

fn identify(mut item: Value, id_property: &str) -> Value {
    if let Value::Object(map) = &mut item {
        if !map.contains_key("id") {
            if let Some(id) = map.get(id_property).cloned() {
                map.insert("id".to_string(), id);
            }
        }
    }
    item
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LabelPlan {
    Property { property: String },
    /// `"{first_name} {last_name}"` style template.
    Template {
        template: String,
        placeholders: Vec<String>,
    },
}

impl LabelPlan {
    pub fn parse(template: &str) -> Self {
        let mut placeholders = Vec::new();
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            let Some(len) = rest[start + 1..].find('}') else {
                break;
            };
            let name = rest[start + 1..start + 1 + len].trim();
            if !name.is_empty() {
                placeholders.push(name.to_string());
            }
            rest = &rest[start + 1 + len + 1..];
        }

        if placeholders.is_empty() {
            LabelPlan::Property {
                property: template.trim().to_string(),
            }
        } else {
            LabelPlan::Template {
                template: template.to_string(),
                placeholders,
            }
        }
    }

    pub fn apply(&self, item: &Value) -> Option<String> {
        match self {
            LabelPlan::Property { property } => item.get(property).map(display_value),
            LabelPlan::Template {
                template,
                placeholders,
            } => {
                let mut out = template.clone();
                let mut found = false;
                for name in placeholders {
                    let value = item.get(name).map(display_value).unwrap_or_default();
                    found |= !value.is_empty();
                    out = out.replace(&format!("{{{name}}}"), &value);
                }
                found.then(|| out.trim().to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterPlan {
    /// Property → expected value; all must match.
    pub equals: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl FilterPlan {
    pub fn matches(&self, item: &Value) -> bool {
        self.equals.iter().all(|(property, expected)| {
            item.get(property)
                .is_some_and(|actual| display_value(actual) == display_value(expected))
        })
    }

    pub fn retain(&self, items: Vec<Value>) -> Vec<Value> {
        items.into_iter().filter(|item| self.matches(item)).collect()
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthDescriptor {
    pub field_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_label: Option<String>,
    pub plan: AuthPlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<RequestPlan>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub version: String,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthDescriptor>,
    pub operations: Vec<OperationDescriptor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Generation {
    pub fn triggers(&self) -> impl Iterator<Item = &TriggerDescriptor> {
        self.operations.iter().filter_map(OperationDescriptor::as_trigger)
    }

    pub fn actions(&self) -> impl Iterator<Item = &ActionDescriptor> {
        self.operations.iter().filter_map(OperationDescriptor::as_action)
    }

    pub fn get(&self, key: &str) -> Option<&OperationDescriptor> {
        self.operations.iter().find(|op| op.key() == key)
    }
}
