use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::endpoint::Parameter;
use crate::naming::to_label;
use crate::schema::{SchemaKind, SchemaNode};

const DATE_PLACEHOLDER: &str = "YYYY-MM-DD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Datetime,
}

/// A field is either a scalar of one type or a group of child fields, never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldShape {
    Scalar {
        #[serde(rename = "type")]
        field_type: FieldType,
    },
    Group { children: Vec<FieldDescriptor> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicBinding {
    pub trigger: String,
    pub value_property: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_property: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub key: String,
    pub label: String,
    #[serde(flatten)]
    pub shape: FieldShape,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<DynamicBinding>,
}

impl FieldDescriptor {
    pub fn scalar(key: impl Into<String>, field_type: FieldType) -> Self {
        let key = key.into();
        Self {
            label: to_label(&key),
            key,
            shape: FieldShape::Scalar { field_type },
            help_text: None,
            required: false,
            choices: Vec::new(),
            default: None,
            placeholder: None,
            dynamic: None,
        }
    }

    /// A parent field. Returns `None` for an empty child list, which would
    /// leave the field with neither a type nor children.
    pub fn group(
        key: impl Into<String>,
        label: impl Into<String>,
        children: Vec<FieldDescriptor>,
    ) -> Option<Self> {
        if children.is_empty() {
            return None;
        }
        let mut field = Self::scalar(key, FieldType::String);
        field.label = label.into();
        field.shape = FieldShape::Group { children };
        Some(field)
    }

    pub fn field_type(&self) -> Option<FieldType> {
        match self.shape {
            FieldShape::Scalar { field_type } => Some(field_type),
            FieldShape::Group { .. } => None,
        }
    }

    pub fn children(&self) -> &[FieldDescriptor] {
        match &self.shape {
            FieldShape::Scalar { .. } => &[],
            FieldShape::Group { children } => children,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<FieldDescriptor>> {
        match &mut self.shape {
            FieldShape::Scalar { .. } => None,
            FieldShape::Group { children } => Some(children),
        }
    }

    pub fn is_string(&self) -> bool {
        self.field_type() == Some(FieldType::String)
    }

    pub fn default(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Set the default. Only string scalars carry one; returns whether it was set.
    pub fn set_default(&mut self, value: impl Into<String>) -> bool {
        if !self.is_string() {
            return false;
        }
        self.default = Some(value.into());
        true
    }

    fn append_help(&mut self, note: &str) {
        self.help_text = Some(match self.help_text.take() {
            Some(text) if !text.is_empty() => format!("{text} {note}"),
            _ => note.to_string(),
        });
    }
}

pub fn find_field_mut<'f>(
    fields: &'f mut [FieldDescriptor],
    key: &str,
) -> Option<&'f mut FieldDescriptor> {
    for field in fields.iter_mut() {
        if field.key == key {
            return Some(field);
        }
        if let Some(children) = field.children_mut() {
            if let Some(found) = find_field_mut(children, key) {
                return Some(found);
            }
        }
    }
    None
}

/// Remove every field whose key is in `keys`, at any depth. Groups left
/// without children are removed as well.
pub fn remove_fields(fields: &mut Vec<FieldDescriptor>, keys: &dyn Fn(&str) -> bool) {
    fields.retain_mut(|field| {
        if keys(&field.key) {
            return false;
        }
        match field.children_mut() {
            Some(children) => {
                remove_fields(children, keys);
                !children.is_empty()
            }
            None => true,
        }
    });
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn schema_to_field(
    node: Option<&SchemaNode>,
    key: &str,
    required: bool,
    description: Option<&str>,
) -> FieldDescriptor {
    let Some(node) = node else {
        let mut field = FieldDescriptor::scalar(key, FieldType::String);
        field.required = required;
        field.help_text = description.map(str::to_string);
        return field;
    };

    let format = node.format.as_deref();
    let mut field = match node.kind {
        SchemaKind::String if format == Some("date") => {
            let mut field = FieldDescriptor::scalar(key, FieldType::String);
            field.placeholder = Some(DATE_PLACEHOLDER.to_string());
            field
        }
        SchemaKind::String if format == Some("date-time") => {
            FieldDescriptor::scalar(key, FieldType::Datetime)
        }
        SchemaKind::String | SchemaKind::Unknown => FieldDescriptor::scalar(key, FieldType::String),
        SchemaKind::Integer => FieldDescriptor::scalar(key, FieldType::Integer),
        SchemaKind::Number => FieldDescriptor::scalar(key, FieldType::Number),
        SchemaKind::Boolean => FieldDescriptor::scalar(key, FieldType::Boolean),
        SchemaKind::Array | SchemaKind::Object => FieldDescriptor::scalar(key, FieldType::String),
    };

    field.required = required;
    field.help_text = description
        .map(str::to_string)
        .or_else(|| node.description.clone());

    match node.kind {
        SchemaKind::String if format == Some("date") => field.append_help("(Format: YYYY-MM-DD)"),
        SchemaKind::Array => field.append_help("Provide a JSON array."),
        SchemaKind::Object => field.append_help("Provide a JSON object."),
        _ => {}
    }

    let enumerable = matches!(
        node.kind,
        SchemaKind::String | SchemaKind::Integer | SchemaKind::Number
    );
    if enumerable && format != Some("date-time") && !node.enum_values.is_empty() {
        field.choices = node
            .enum_values
            .iter()
            .filter(|v| !v.is_null())
            .map(stringify)
            .collect();
    }

    if let Some(Value::String(default)) = &node.default {
        field.set_default(default.clone());
    }

    field
}

pub fn param_to_field(param: &Parameter) -> FieldDescriptor {
    schema_to_field(
        param.schema.as_ref(),
        &param.name,
        param.required,
        param.description.as_deref(),
    )
}

pub fn object_fields(node: &SchemaNode) -> Vec<FieldDescriptor> {
    node.properties
        .iter()
        .map(|(name, prop)| schema_to_field(Some(prop), name, node.is_required(name), None))
        .collect()
}
