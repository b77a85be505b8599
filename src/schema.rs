use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::document::ApiDocument;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    #[default]
    Unknown,
}

impl SchemaKind {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }
}

/// A fully resolved type description. Never holds a `$ref`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    pub format: Option<String>,
    pub description: Option<String>,
    pub enum_values: Vec<Value>,
    pub default: Option<Value>,
    pub example: Option<Value>,
    pub nullable: bool,
    pub items: Option<Box<SchemaNode>>,
    pub properties: BTreeMap<String, SchemaNode>,
    pub required: BTreeSet<String>,
    pub name: Option<String>,
    /// Set on the placeholder that stands in for a reference cycle.
    pub recursive: bool,
}

impl SchemaNode {
    pub fn of_kind(kind: SchemaKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    fn placeholder(name: Option<String>) -> Self {
        Self {
            kind: SchemaKind::Object,
            name,
            recursive: true,
            ..Self::default()
        }
    }

    pub fn is_array(&self) -> bool {
        self.kind == SchemaKind::Array
    }

    pub fn is_object(&self) -> bool {
        self.kind == SchemaKind::Object
    }

    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties.get(name)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.contains(name)
    }

    pub fn array_properties(&self) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|(_, node)| node.is_array())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn remove_properties(&mut self, names: &BTreeSet<String>) {
        self.properties.retain(|name, _| !names.contains(name));
        self.required.retain(|name| !names.contains(name));
        for node in self.properties.values_mut() {
            if let Some(items) = node.items.as_deref_mut() {
                items.remove_properties(names);
            }
        }
        if let Some(items) = self.items.as_deref_mut() {
            items.remove_properties(names);
        }
    }
}

/// A reference met again while on `stack` becomes a placeholder. Memo entries
/// record every reference reached while expanding them and are only reused
/// when none of those are on the current stack.
#[derive(Debug)]
pub struct SchemaResolver<'a> {
    doc: &'a ApiDocument,
    resolved: HashMap<String, Memo>,
    stack: Vec<String>,
    reached: BTreeSet<String>,
    unresolved: BTreeSet<String>,
}

#[derive(Debug)]
struct Memo {
    node: SchemaNode,
    reached: BTreeSet<String>,
}

impl Memo {
    fn usable_under(&self, stack: &[String]) -> bool {
        !stack.iter().any(|r| self.reached.contains(r))
    }
}

impl<'a> SchemaResolver<'a> {
    pub fn new(doc: &'a ApiDocument) -> Self {
        Self {
            doc,
            resolved: HashMap::new(),
            stack: Vec::new(),
            reached: BTreeSet::new(),
            unresolved: BTreeSet::new(),
        }
    }

    pub fn document(&self) -> &'a ApiDocument {
        self.doc
    }

    pub fn unresolved(&self) -> &BTreeSet<String> {
        &self.unresolved
    }

    /// Resolve a schema value. `None` means the schema is an unresolvable
    /// reference; callers fall back to an untyped field.
    pub fn resolve(&mut self, schema: &Value) -> Option<SchemaNode> {
        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            return self.resolve_ref(reference);
        }
        Some(self.resolve_inline(schema))
    }

    pub fn resolve_component(&mut self, name: &str) -> Option<SchemaNode> {
        self.resolve_ref(&format!("#/components/schemas/{name}"))
    }

    pub fn resolve_ref(&mut self, reference: &str) -> Option<SchemaNode> {
        if let Some(memo) = self.resolved.get(reference) {
            if memo.usable_under(&self.stack) {
                self.reached.extend(memo.reached.iter().cloned());
                return Some(memo.node.clone());
            }
        }

        let name = reference.rsplit('/').next().map(str::to_string);
        if self.stack.iter().any(|r| r == reference) {
            debug!(reference, "reference cycle, using placeholder");
            self.reached.insert(reference.to_string());
            return Some(SchemaNode::placeholder(name));
        }

        let doc = self.doc;
        let Some(target) = doc.lookup(reference) else {
            if self.unresolved.insert(reference.to_string()) {
                warn!(reference, "unresolvable $ref, falling back to an untyped field");
            }
            return None;
        };

        let outer = std::mem::take(&mut self.reached);
        self.stack.push(reference.to_string());
        let resolved = self.resolve(target);
        self.stack.pop();
        let mut reached = std::mem::replace(&mut self.reached, outer);
        reached.insert(reference.to_string());
        self.reached.extend(reached.iter().cloned());

        let mut node = resolved?;
        if node.name.is_none() {
            node.name = name;
        }
        let memo = Memo {
            node: node.clone(),
            reached,
        };
        if memo.usable_under(&self.stack) {
            self.resolved.insert(reference.to_string(), memo);
        }
        Some(node)
    }

    fn resolve_nested(&mut self, schema: &Value) -> SchemaNode {
        self.resolve(schema).unwrap_or_default()
    }

    fn resolve_inline(&mut self, schema: &Value) -> SchemaNode {
        let Some(obj) = schema.as_object() else {
            return SchemaNode::default();
        };

        let mut node = if let Some(members) = obj.get("allOf").and_then(Value::as_array) {
            self.merge_all_of(members, obj)
        } else if let Some(members) = obj
            .get("oneOf")
            .or_else(|| obj.get("anyOf"))
            .and_then(Value::as_array)
        {
            self.first_member(members)
        } else {
            self.resolve_plain(obj)
        };

        overlay_keywords(&mut node, obj);
        node
    }

    /// `allOf`: properties of later members overwrite earlier ones, `required`
    /// lists are unioned. Properties declared beside `allOf` count as a last member.
    fn merge_all_of(
        &mut self,
        members: &[Value],
        outer: &serde_json::Map<String, Value>,
    ) -> SchemaNode {
        let mut resolved: Vec<SchemaNode> = members
            .iter()
            .filter_map(|member| self.resolve(member))
            .collect();

        if outer.contains_key("properties") {
            let mut own = outer.clone();
            own.remove("allOf");
            resolved.push(self.resolve_plain(&own));
        }

        if resolved.len() == 1 {
            return resolved.remove(0);
        }

        let mut merged = SchemaNode::of_kind(SchemaKind::Object);
        for member in resolved {
            merged.properties.extend(member.properties);
            merged.required.extend(member.required);
            if merged.description.is_none() {
                merged.description = member.description;
            }
            if merged.example.is_none() {
                merged.example = member.example;
            }
        }
        merged
    }

    fn first_member(&mut self, members: &[Value]) -> SchemaNode {
        let mut nullable = false;
        for member in members {
            if member.get("type").and_then(Value::as_str) == Some("null") {
                nullable = true;
                continue;
            }
            if let Some(mut node) = self.resolve(member) {
                node.nullable |= nullable;
                return node;
            }
        }
        SchemaNode {
            nullable,
            ..SchemaNode::default()
        }
    }

    fn resolve_plain(&mut self, obj: &serde_json::Map<String, Value>) -> SchemaNode {
        let mut node = SchemaNode::default();

        match obj.get("type") {
            Some(Value::String(kind)) => {
                node.kind = SchemaKind::parse(kind).unwrap_or_default();
            }
            Some(Value::Array(kinds)) => {
                let kinds: Vec<&str> = kinds.iter().filter_map(Value::as_str).collect();
                node.nullable = kinds.contains(&"null");
                node.kind = kinds
                    .iter()
                    .find(|k| **k != "null")
                    .and_then(|k| SchemaKind::parse(k))
                    .unwrap_or_default();
            }
            _ => {}
        }

        if let Some(properties) = obj.get("properties").and_then(Value::as_object) {
            for (name, prop) in properties {
                let resolved = self.resolve_nested(prop);
                node.properties.insert(name.clone(), resolved);
            }
        }

        if let Some(items) = obj.get("items") {
            node.items = Some(Box::new(self.resolve_nested(items)));
        }

        node.required = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        node.enum_values = obj
            .get("enum")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        node.format = obj
            .get("format")
            .and_then(Value::as_str)
            .map(str::to_string);

        if node.kind == SchemaKind::Unknown {
            node.kind = infer_kind(&node);
        }

        node
    }
}

fn infer_kind(node: &SchemaNode) -> SchemaKind {
    if !node.properties.is_empty() {
        SchemaKind::Object
    } else if node.items.is_some() {
        SchemaKind::Array
    } else if !node.enum_values.is_empty() && node.enum_values.iter().all(Value::is_string) {
        SchemaKind::String
    } else {
        SchemaKind::Unknown
    }
}

/// Keywords written on the composing schema itself take precedence.
fn overlay_keywords(node: &mut SchemaNode, obj: &serde_json::Map<String, Value>) {
    if let Some(description) = obj.get("description").and_then(Value::as_str) {
        node.description = Some(description.to_string());
    }
    if let Some(example) = obj.get("example") {
        node.example = Some(example.clone());
    }
    if let Some(default) = obj.get("default") {
        node.default = Some(default.clone());
    }
    if obj.get("nullable").and_then(Value::as_bool) == Some(true) {
        node.nullable = true;
    }
}
