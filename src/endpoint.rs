use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::naming::to_snake;
use crate::schema::{SchemaNode, SchemaResolver};

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    fn key(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.key().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub location: ParamLocation,
    pub required: bool,
    pub description: Option<String>,
    /// `None` when the parameter schema was an unresolvable reference.
    pub schema: Option<SchemaNode>,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseDescriptor {
    /// `None` when the response has no JSON body.
    pub schema: Option<SchemaNode>,
    /// Media-level `example` or first `examples.*.value`.
    pub example: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct RequestBody {
    pub required: bool,
    pub schema: SchemaNode,
}

#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    pub path: String,
    pub method: HttpMethod,
    pub operation_id: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub params: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    pub responses: BTreeMap<String, ResponseDescriptor>,
}

impl EndpointDescriptor {
    pub fn path_params(&self) -> impl Iterator<Item = &Parameter> {
        self.params
            .iter()
            .filter(|p| p.location == ParamLocation::Path)
    }

    pub fn query_params(&self) -> impl Iterator<Item = &Parameter> {
        self.params
            .iter()
            .filter(|p| p.location == ParamLocation::Query)
    }

    pub fn query_param(&self, name: &str) -> Option<&Parameter> {
        self.query_params().find(|p| p.name == name)
    }

    pub fn reference(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Whether `reference` names this endpoint: an operationId, `"METHOD /path"`,
    /// or a bare path (which implies GET).
    pub fn matches(&self, reference: &str) -> bool {
        let reference = reference.trim();
        if reference == self.operation_id {
            return true;
        }
        match reference.split_once(' ') {
            Some((method, path)) => {
                HttpMethod::parse(method) == Some(self.method) && path.trim() == self.path
            }
            None => self.method == HttpMethod::Get && reference == self.path,
        }
    }
}

pub fn extract_endpoints(resolver: &mut SchemaResolver<'_>) -> Vec<EndpointDescriptor> {
    let doc = resolver.document();
    let mut endpoints = Vec::new();

    let Some(paths) = doc.paths() else {
        return endpoints;
    };

    for (path, item) in paths {
        let path_params = item
            .get("parameters")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for method in HttpMethod::ALL {
            let Some(op) = item.get(method.key()).and_then(Value::as_object) else {
                continue;
            };

            let operation_id = op
                .get("operationId")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| derive_operation_id(method, path));

            let op_params = op
                .get("parameters")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            let params = merge_params(resolver, path, &path_params, &op_params);
            let request_body = parse_request_body(resolver, op.get("requestBody"));
            let responses = parse_responses(resolver, op.get("responses"));

            let tags = op
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| {
                    tags.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            debug!(%method, path = path.as_str(), operation_id, "extracted endpoint");

            endpoints.push(EndpointDescriptor {
                path: path.clone(),
                method,
                operation_id,
                summary: string_field(op.get("summary")),
                description: string_field(op.get("description")),
                tags,
                params,
                request_body,
                responses,
            });
        }
    }

    endpoints
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn derive_operation_id(method: HttpMethod, path: &str) -> String {
    let path = path.replace(['{', '}'], "");
    to_snake(&format!("{} {}", method.key(), path))
}

/// Merge path-level and operation-level parameters. Operation-level wins on
/// (name, location). Header and cookie parameters are dropped.
fn merge_params(
    resolver: &mut SchemaResolver<'_>,
    path: &str,
    path_params: &[Value],
    op_params: &[Value],
) -> Vec<Parameter> {
    let mut map: BTreeMap<(String, &'static str), Parameter> = BTreeMap::new();

    for param in path_params.iter().chain(op_params) {
        if let Some(def) = parse_param(resolver, param) {
            let location = match def.location {
                ParamLocation::Path => "path",
                ParamLocation::Query => "query",
            };
            map.insert((def.name.clone(), location), def);
        }
    }

    let (mut path_list, query_list): (Vec<_>, Vec<_>) = map
        .into_values()
        .partition(|p| p.location == ParamLocation::Path);

    path_list.sort_by_cached_key(|p| {
        path.find(&format!("{{{}}}", p.name))
            .unwrap_or(usize::MAX)
    });

    path_list.into_iter().chain(query_list).collect()
}

fn parse_param(resolver: &mut SchemaResolver<'_>, param: &Value) -> Option<Parameter> {
    let doc = resolver.document();
    let param = match param.get("$ref").and_then(Value::as_str) {
        Some(reference) => doc.lookup(reference)?,
        None => param,
    };

    let name = param.get("name").and_then(Value::as_str)?.to_string();
    if name.is_empty() {
        return None;
    }

    let location = match param.get("in").and_then(Value::as_str) {
        Some("path") => ParamLocation::Path,
        Some("query") => ParamLocation::Query,
        _ => return None,
    };

    let required = location == ParamLocation::Path
        || param
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);

    let schema = match param.get("schema") {
        Some(schema) => resolver.resolve(schema),
        None => Some(SchemaNode::of_kind(crate::schema::SchemaKind::String)),
    };

    Some(Parameter {
        name,
        location,
        required,
        description: string_field(param.get("description")),
        schema,
    })
}

fn json_media<'v>(container: &'v Value) -> Option<&'v Value> {
    container
        .get("content")
        .and_then(Value::as_object)
        .and_then(|content| content.get(JSON_CONTENT_TYPE))
}

fn parse_request_body(
    resolver: &mut SchemaResolver<'_>,
    request_body: Option<&Value>,
) -> Option<RequestBody> {
    let doc = resolver.document();
    let body = request_body?;
    let body = match body.get("$ref").and_then(Value::as_str) {
        Some(reference) => doc.lookup(reference)?,
        None => body,
    };

    let required = body
        .get("required")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let schema = json_media(body)?.get("schema")?;
    let schema = resolver.resolve(schema).unwrap_or_default();

    Some(RequestBody { required, schema })
}

fn parse_responses(
    resolver: &mut SchemaResolver<'_>,
    responses: Option<&Value>,
) -> BTreeMap<String, ResponseDescriptor> {
    let doc = resolver.document();
    let mut out = BTreeMap::new();

    let Some(responses) = responses.and_then(Value::as_object) else {
        return out;
    };

    for (status, response) in responses {
        let response = match response.get("$ref").and_then(Value::as_str) {
            Some(reference) => match doc.lookup(reference) {
                Some(target) => target,
                None => {
                    out.insert(status.clone(), ResponseDescriptor::default());
                    continue;
                }
            },
            None => response,
        };

        let descriptor = match json_media(response) {
            Some(media) => ResponseDescriptor {
                schema: media.get("schema").and_then(|s| resolver.resolve(s)),
                example: media_example(media),
            },
            None => ResponseDescriptor::default(),
        };
        out.insert(status.clone(), descriptor);
    }

    out
}

fn media_example(media: &Value) -> Option<Value> {
    if let Some(example) = media.get("example") {
        return Some(example.clone());
    }
    media
        .get("examples")
        .and_then(Value::as_object)
        .and_then(|examples| examples.values().find_map(|e| e.get("value")))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ApiDocument;
    use crate::schema::SchemaKind;
    use serde_json::json;

    fn extract(doc: Value) -> Vec<EndpointDescriptor> {
        let doc = ApiDocument::from_value(doc).unwrap();
        let mut resolver = SchemaResolver::new(&doc);
        extract_endpoints(&mut resolver)
    }

    #[test]
    fn splits_params_and_ignores_headers() {
        let endpoints = extract(json!({
            "paths": {
                "/orgs/{orgId}/users/{userId}": {
                    "parameters": [
                        { "name": "userId", "in": "path", "schema": { "type": "string" } },
                        { "name": "orgId", "in": "path", "required": true, "schema": { "type": "string" } }
                    ],
                    "get": {
                        "operationId": "getUser",
                        "tags": ["Users"],
                        "parameters": [
                            { "name": "expand", "in": "query", "schema": { "type": "boolean" } },
                            { "name": "X-Trace", "in": "header", "schema": { "type": "string" } }
                        ],
                        "responses": {}
                    }
                }
            }
        }));

        assert_eq!(endpoints.len(), 1);
        let ep = &endpoints[0];
        assert_eq!(ep.operation_id, "getUser");
        assert_eq!(ep.tags, vec!["Users".to_string()]);
        let names: Vec<_> = ep.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["orgId", "userId", "expand"]);
        assert!(ep.path_params().all(|p| p.required));
        assert_eq!(ep.query_params().count(), 1);
    }

    #[test]
    fn operation_params_override_path_level() {
        let endpoints = extract(json!({
            "paths": {
                "/items": {
                    "parameters": [
                        { "name": "limit", "in": "query", "description": "path level", "schema": { "type": "string" } }
                    ],
                    "get": {
                        "operationId": "listItems",
                        "parameters": [
                            { "name": "limit", "in": "query", "description": "op level", "schema": { "type": "integer" } }
                        ]
                    }
                }
            }
        }));

        let limit = endpoints[0].query_param("limit").unwrap();
        assert_eq!(limit.description.as_deref(), Some("op level"));
        assert_eq!(limit.schema.as_ref().unwrap().kind, SchemaKind::Integer);
    }

    #[test]
    fn resolves_parameter_and_body_refs() {
        let endpoints = extract(json!({
            "paths": {
                "/pets": {
                    "post": {
                        "operationId": "createPet",
                        "parameters": [{ "$ref": "#/components/parameters/DryRun" }],
                        "requestBody": { "$ref": "#/components/requestBodies/PetBody" },
                        "responses": {
                            "201": { "$ref": "#/components/responses/PetCreated" }
                        }
                    }
                }
            },
            "components": {
                "parameters": {
                    "DryRun": { "name": "dry_run", "in": "query", "schema": { "type": "boolean" } }
                },
                "requestBodies": {
                    "PetBody": {
                        "required": true,
                        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Pet" } } }
                    }
                },
                "responses": {
                    "PetCreated": {
                        "description": "created",
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/Pet" },
                                "examples": { "one": { "value": { "name": "Rex" } } }
                            }
                        }
                    }
                },
                "schemas": {
                    "Pet": { "type": "object", "properties": { "name": { "type": "string" } } }
                }
            }
        }));

        let ep = &endpoints[0];
        assert_eq!(ep.params[0].name, "dry_run");
        let body = ep.request_body.as_ref().unwrap();
        assert!(body.required);
        assert!(body.schema.property("name").is_some());
        let created = &ep.responses["201"];
        assert_eq!(created.schema.as_ref().unwrap().name.as_deref(), Some("Pet"));
        assert_eq!(created.example, Some(json!({ "name": "Rex" })));
    }

    #[test]
    fn non_json_body_and_empty_response_have_no_schema() {
        let endpoints = extract(json!({
            "paths": {
                "/upload": {
                    "put": {
                        "requestBody": {
                            "content": { "multipart/form-data": { "schema": { "type": "object" } } }
                        },
                        "responses": {
                            "204": { "description": "no content" },
                            "200": { "description": "text", "content": { "text/plain": {} } }
                        }
                    }
                }
            }
        }));

        let ep = &endpoints[0];
        assert_eq!(ep.operation_id, "put_upload");
        assert!(ep.request_body.is_none());
        assert!(ep.responses["204"].schema.is_none());
        assert!(ep.responses["200"].schema.is_none());
    }

    #[test]
    fn endpoint_references_match() {
        let endpoints = extract(json!({
            "paths": {
                "/pets": {
                    "get": { "operationId": "listPets" },
                    "post": { "operationId": "createPet" }
                }
            }
        }));

        let list = &endpoints[0];
        let create = &endpoints[1];
        assert_eq!(list.method, HttpMethod::Get);
        assert!(list.matches("listPets"));
        assert!(list.matches("GET /pets"));
        assert!(list.matches("/pets"));
        assert!(!create.matches("/pets"));
        assert!(create.matches("post /pets"));
        assert_eq!(create.reference(), "POST /pets");
    }
}
