use serde::Serialize;
use serde_json::{Map, Value};

use crate::endpoint::HttpMethod;
use crate::error::RequestError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum QueryValue {
    Field { field: String },
    Fixed { value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryParam {
    pub name: String,
    #[serde(flatten)]
    pub value: QueryValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyProperty {
    pub field: String,
    pub property: String,
    /// The field holds JSON text (array/object properties).
    pub json: bool,
}

impl BodyProperty {
    pub fn new(property: impl Into<String>, json: bool) -> Self {
        let property = property.into();
        Self {
            field: property.clone(),
            property,
            json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BodyPlan {
    None,
    Object {
        properties: Vec<BodyProperty>,
    },
    /// Inputs describe a single item; the body wraps it in `{array_field: [item]}`.
    #[serde(rename_all = "camelCase")]
    Flatten {
        array_field: String,
        /// Key of the parent input field holding the item values, if grouped.
        group: Option<String>,
        item: Vec<BodyProperty>,
        extra: Vec<BodyProperty>,
    },
}

impl BodyPlan {
    pub fn properties_mut(&mut self) -> Vec<&mut Vec<BodyProperty>> {
        match self {
            BodyPlan::None => Vec::new(),
            BodyPlan::Object { properties } => vec![properties],
            BodyPlan::Flatten { item, extra, .. } => vec![item, extra],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    Array,
    Scalar,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelperMerge {
    pub target: String,
    pub sources: Vec<String>,
    pub mode: MergeMode,
    /// The target lives in the flattened array item rather than the top level.
    pub in_item: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPlan {
    pub header: String,
    pub scheme: String,
    pub field_key: String,
}

impl AuthPlan {
    fn header_value(&self, credential: &str) -> String {
        if self.scheme.is_empty() {
            credential.to_string()
        } else {
            format!("{} {credential}", self.scheme)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPlan {
    pub method: HttpMethod,
    /// Base URL joined with the path template, placeholders intact.
    pub url: String,
    pub path_params: Vec<String>,
    pub query: Vec<QueryParam>,
    pub body: BodyPlan,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub merges: Vec<HelperMerge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthPlan>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn set_query(&mut self, name: &str, value: impl Into<String>) {
        self.query.retain(|(k, _)| k != name);
        self.query.push((name.to_string(), value.into()));
    }
}

impl RequestPlan {
    pub fn new(method: HttpMethod, base_url: &str, path: &str) -> Self {
        Self {
            method,
            url: format!("{}{}", base_url.trim_end_matches('/'), path),
            path_params: Vec::new(),
            query: Vec::new(),
            body: BodyPlan::None,
            merges: Vec::new(),
            auth: None,
        }
    }

    pub fn build(
        &self,
        inputs: &Map<String, Value>,
        credential: Option<&str>,
    ) -> Result<HttpRequest, RequestError> {
        let mut url = self.url.clone();
        for name in &self.path_params {
            let value = inputs
                .get(name)
                .filter(|v| !is_empty(v))
                .ok_or_else(|| RequestError::MissingPathParam { name: name.clone() })?;
            let encoded = urlencoding::encode(&value_to_string(value)).into_owned();
            url = url.replace(&format!("{{{name}}}"), &encoded);
        }

        let mut query = Vec::new();
        for param in &self.query {
            match &param.value {
                QueryValue::Fixed { value } => query.push((param.name.clone(), value.clone())),
                QueryValue::Field { field } => match inputs.get(field) {
                    Some(Value::Array(values)) => {
                        for value in values.iter().filter(|v| !is_empty(v)) {
                            query.push((param.name.clone(), value_to_string(value)));
                        }
                    }
                    Some(value) if !is_empty(value) => {
                        query.push((param.name.clone(), value_to_string(value)));
                    }
                    _ => {}
                },
            }
        }

        let mut headers = Vec::new();
        if let (Some(auth), Some(credential)) = (&self.auth, credential) {
            headers.push((auth.header.clone(), auth.header_value(credential)));
        }

        Ok(HttpRequest {
            method: self.method,
            url,
            query,
            headers,
            body: self.build_body(inputs)?,
        })
    }

    fn build_body(&self, inputs: &Map<String, Value>) -> Result<Option<Value>, RequestError> {
        let mut body = Map::new();

        match &self.body {
            BodyPlan::None => {
                if self.merges.is_empty() {
                    return Ok(None);
                }
            }
            BodyPlan::Object { properties } => copy_properties(properties, inputs, &mut body),
            BodyPlan::Flatten {
                array_field,
                group,
                item,
                extra,
            } => {
                let no_inputs = Map::new();
                let item_inputs = match group {
                    Some(group) => match inputs.get(group) {
                        Some(Value::Object(values)) => values,
                        Some(Value::Null) | None => &no_inputs,
                        Some(_) => {
                            return Err(RequestError::GroupNotObject {
                                field: group.clone(),
                            });
                        }
                    },
                    None => inputs,
                };

                let mut item_body = Map::new();
                copy_properties(item, item_inputs, &mut item_body);
                for merge in self.merges.iter().filter(|m| m.in_item) {
                    apply_merge(merge, inputs, &mut item_body);
                }
                if !item_body.is_empty() {
                    body.insert(
                        array_field.clone(),
                        Value::Array(vec![Value::Object(item_body)]),
                    );
                }
                copy_properties(extra, inputs, &mut body);
            }
        }

        for merge in self.merges.iter().filter(|m| !m.in_item) {
            apply_merge(merge, inputs, &mut body);
        }

        Ok(Some(Value::Object(body)))
    }
}

fn copy_properties(properties: &[BodyProperty], inputs: &Map<String, Value>, out: &mut Map<String, Value>) {
    for prop in properties {
        let Some(value) = inputs.get(&prop.field).filter(|v| !is_empty(v)) else {
            continue;
        };
        let value = match value {
            Value::String(text) if prop.json => {
                serde_json::from_str(text).unwrap_or_else(|_| value.clone())
            }
            other => other.clone(),
        };
        out.insert(prop.property.clone(), value);
    }
}

fn apply_merge(merge: &HelperMerge, inputs: &Map<String, Value>, out: &mut Map<String, Value>) {
    let values: Vec<&Value> = merge
        .sources
        .iter()
        .filter_map(|source| inputs.get(source))
        .collect();

    match merge.mode {
        MergeMode::Array => match merge_helper_values(out.get(&merge.target), &values) {
            Some(merged) => {
                out.insert(merge.target.clone(), merged);
            }
            None => {
                out.remove(&merge.target);
            }
        },
        MergeMode::Scalar => {
            if out.get(&merge.target).is_some_and(|v| !is_empty(v)) {
                return;
            }
            if let Some(first) = values.into_iter().find(|v| !is_empty(v)) {
                out.insert(merge.target.clone(), first.clone());
            }
        }
    }
}

/// Existing values come first, then new ones in order. Numeric strings are
/// coerced to numbers; null, empty and non-positive values are dropped;
/// duplicates are removed. An empty result is `None`.
pub fn merge_helper_values(existing: Option<&Value>, values: &[&Value]) -> Option<Value> {
    let mut out: Vec<Value> = Vec::new();
    let mut push = |value: &Value| {
        if let Some(value) = coerce_merge_value(value) {
            if !out.contains(&value) {
                out.push(value);
            }
        }
    };

    match existing {
        Some(Value::Array(items)) => items.iter().for_each(&mut push),
        Some(value) => push(value),
        None => {}
    }
    for value in values.iter().copied() {
        match value {
            Value::Array(items) => items.iter().for_each(&mut push),
            other => push(other),
        }
    }

    if out.is_empty() {
        None
    } else {
        Some(Value::Array(out))
    }
}

fn coerce_merge_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Number(n) => n.as_f64().filter(|f| *f > 0.0).map(|_| value.clone()),
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            if let Ok(n) = text.parse::<u64>() {
                return (n > 0).then(|| Value::from(n));
            }
            if let Ok(n) = text.parse::<i64>() {
                return (n > 0).then(|| Value::from(n));
            }
            if let Ok(n) = text.parse::<f64>() {
                return (n > 0.0).then(|| Value::from(n));
            }
            Some(Value::String(text.to_string()))
        }
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.clone()),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inputs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn substitutes_encoded_path_params_and_query() {
        let mut plan = RequestPlan::new(HttpMethod::Get, "https://api.example.com/", "/users/{user_id}/posts");
        plan.path_params.push("user_id".to_string());
        plan.query.push(QueryParam {
            name: "tag".to_string(),
            value: QueryValue::Field { field: "tag".to_string() },
        });
        plan.query.push(QueryParam {
            name: "state".to_string(),
            value: QueryValue::Fixed { value: "open".to_string() },
        });
        plan.query.push(QueryParam {
            name: "q".to_string(),
            value: QueryValue::Field { field: "q".to_string() },
        });

        let req = plan
            .build(&inputs(json!({ "user_id": "a b", "tag": ["x", "y"], "q": "" })), None)
            .unwrap();
        assert_eq!(req.url, "https://api.example.com/users/a%20b/posts");
        assert_eq!(
            req.query,
            vec![
                ("tag".to_string(), "x".to_string()),
                ("tag".to_string(), "y".to_string()),
                ("state".to_string(), "open".to_string()),
            ]
        );
        assert!(req.body.is_none());
    }

    #[test]
    fn missing_path_param_is_an_error() {
        let mut plan = RequestPlan::new(HttpMethod::Delete, "", "/pets/{id}");
        plan.path_params.push("id".to_string());
        let err = plan.build(&Map::new(), None).unwrap_err();
        assert!(matches!(err, RequestError::MissingPathParam { name } if name == "id"));
    }

    #[test]
    fn bearer_header_from_credential() {
        let mut plan = RequestPlan::new(HttpMethod::Get, "", "/me");
        plan.auth = Some(AuthPlan {
            header: "Authorization".to_string(),
            scheme: "Bearer".to_string(),
            field_key: "api_key".to_string(),
        });
        let req = plan.build(&Map::new(), Some("s3cr3t")).unwrap();
        assert_eq!(
            req.headers,
            vec![("Authorization".to_string(), "Bearer s3cr3t".to_string())]
        );
    }

    #[test]
    fn object_body_parses_json_fields() {
        let mut plan = RequestPlan::new(HttpMethod::Post, "", "/pets");
        plan.body = BodyPlan::Object {
            properties: vec![BodyProperty::new("name", false), BodyProperty::new("tags", true)],
        };
        let req = plan
            .build(&inputs(json!({ "name": "Rex", "tags": "[\"a\"]", "ignored": 1 })), None)
            .unwrap();
        assert_eq!(req.body, Some(json!({ "name": "Rex", "tags": ["a"] })));
    }

    #[test]
    fn flatten_wraps_item_in_array() {
        let mut plan = RequestPlan::new(HttpMethod::Post, "", "/orders");
        plan.body = BodyPlan::Flatten {
            array_field: "items".to_string(),
            group: None,
            item: vec![BodyProperty::new("a", false), BodyProperty::new("b", false)],
            extra: Vec::new(),
        };
        let req = plan.build(&inputs(json!({ "a": "x", "b": 1 })), None).unwrap();
        assert_eq!(req.body, Some(json!({ "items": [{ "a": "x", "b": 1 }] })));
    }

    #[test]
    fn flatten_with_group_reads_parent_field() {
        let mut plan = RequestPlan::new(HttpMethod::Post, "", "/orders");
        plan.body = BodyPlan::Flatten {
            array_field: "items".to_string(),
            group: Some("group".to_string()),
            item: vec![BodyProperty::new("a", false), BodyProperty::new("b", false)],
            extra: vec![BodyProperty::new("note", false)],
        };
        let req = plan
            .build(&inputs(json!({ "group": { "a": "x", "b": 1 }, "note": "hi" })), None)
            .unwrap();
        assert_eq!(req.body, Some(json!({ "items": [{ "a": "x", "b": 1 }], "note": "hi" })));

        let err = plan.build(&inputs(json!({ "group": "nope" })), None).unwrap_err();
        assert!(matches!(err, RequestError::GroupNotObject { .. }));
    }

    #[test]
    fn helper_merge_unions_and_dedups() {
        let merged = merge_helper_values(
            Some(&json!([5, 7])),
            &[&json!(3), &json!(5), &json!(5), &json!(0), &Value::Null],
        );
        assert_eq!(merged, Some(json!([5, 7, 3])));

        let again = merge_helper_values(
            merged.as_ref(),
            &[&json!(3), &json!(5), &json!(5), &json!(0), &Value::Null],
        );
        assert_eq!(again, merged);
    }

    #[test]
    fn helper_merge_coerces_and_drops_empty() {
        let merged = merge_helper_values(None, &[&json!("4"), &json!(""), &json!("-2"), &json!([4, 9])]);
        assert_eq!(merged, Some(json!([4, 9])));
        assert_eq!(merge_helper_values(None, &[&json!(0), &Value::Null, &json!("")]), None);
    }

    #[test]
    fn array_merge_omits_target_when_empty() {
        let mut plan = RequestPlan::new(HttpMethod::Post, "", "/tickets");
        plan.body = BodyPlan::Object {
            properties: vec![BodyProperty::new("tag_ids", true), BodyProperty::new("title", false)],
        };
        plan.merges.push(HelperMerge {
            target: "tag_ids".to_string(),
            sources: vec!["primary_tag".to_string(), "secondary_tag".to_string()],
            mode: MergeMode::Array,
            in_item: false,
        });

        let req = plan
            .build(&inputs(json!({ "title": "t", "primary_tag": 0, "secondary_tag": null })), None)
            .unwrap();
        assert_eq!(req.body, Some(json!({ "title": "t" })));

        let req = plan
            .build(
                &inputs(json!({ "tag_ids": "[5, 7]", "primary_tag": "3", "secondary_tag": 5 })),
                None,
            )
            .unwrap();
        assert_eq!(req.body, Some(json!({ "tag_ids": [5, 7, 3] })));
    }

    #[test]
    fn scalar_merge_takes_first_non_empty_when_unset() {
        let mut plan = RequestPlan::new(HttpMethod::Post, "", "/tickets");
        plan.body = BodyPlan::Object {
            properties: vec![BodyProperty::new("assignee", false)],
        };
        plan.merges.push(HelperMerge {
            target: "assignee".to_string(),
            sources: vec!["by_email".to_string(), "by_id".to_string()],
            mode: MergeMode::Scalar,
            in_item: false,
        });

        let req = plan
            .build(&inputs(json!({ "by_email": "", "by_id": 42 })), None)
            .unwrap();
        assert_eq!(req.body, Some(json!({ "assignee": 42 })));

        let req = plan
            .build(&inputs(json!({ "assignee": 1, "by_id": 42 })), None)
            .unwrap();
        assert_eq!(req.body, Some(json!({ "assignee": 1 })));
    }

    #[test]
    fn set_query_replaces_existing() {
        let plan = RequestPlan::new(HttpMethod::Get, "", "/items");
        let mut req = plan.build(&Map::new(), None).unwrap();
        req.set_query("offset", "0");
        req.set_query("offset", "2");
        assert_eq!(req.query, vec![("offset".to_string(), "2".to_string())]);
    }
}
