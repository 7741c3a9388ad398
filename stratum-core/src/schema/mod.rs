mod validator;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::loader::FileFormat;
use crate::path::KeyPath;
use crate::value::{Value, ValueKind};

pub use validator::{ValidationError, ValidationErrorKind, ValidationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    String,
    Int,
    Bool,
    Float,
    Object,
    Array,
}

impl SchemaKind {
    /// Floats also accept integers; every other kind is exact.
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value.kind()),
            (Self::String, ValueKind::String)
                | (Self::Int, ValueKind::Int)
                | (Self::Float, ValueKind::Float | ValueKind::Int)
                | (Self::Bool, ValueKind::Bool)
                | (Self::Object, ValueKind::Map)
                | (Self::Array, ValueKind::Array)
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Float => "float",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One node of the expected configuration shape.
///
/// Builder methods consume the node and return the updated copy, so a
/// finished schema is never mutated in place. Share it with `Arc`.
#[derive(Debug, Clone)]
pub struct Schema {
    kind: SchemaKind,
    required: bool,
    default: Option<Value>,
    description: Option<String>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<Regex>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    min_items: Option<usize>,
    max_items: Option<usize>,
    items: Option<Box<Schema>>,
    fields: BTreeMap<String, Schema>,
}

impl Schema {
    fn of(kind: SchemaKind) -> Self {
        Self {
            kind,
            required: false,
            default: None,
            description: None,
            min_length: None,
            max_length: None,
            pattern: None,
            minimum: None,
            maximum: None,
            min_items: None,
            max_items: None,
            items: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn string() -> Self {
        Self::of(SchemaKind::String)
    }

    pub fn int() -> Self {
        Self::of(SchemaKind::Int)
    }

    pub fn float() -> Self {
        Self::of(SchemaKind::Float)
    }

    pub fn bool() -> Self {
        Self::of(SchemaKind::Bool)
    }

    pub fn array(items: Schema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::of(SchemaKind::Array)
        }
    }

    pub fn object() -> ObjectSchemaBuilder {
        ObjectSchemaBuilder {
            schema: Self::of(SchemaKind::Object),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn min_length(mut self, chars: usize) -> Self {
        self.min_length = Some(chars);
        self
    }

    pub fn max_length(mut self, chars: usize) -> Self {
        self.max_length = Some(chars);
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Result<Self> {
        let compiled = Regex::new(pattern)
            .map_err(|err| Error::InvalidFormat(format!("invalid pattern '{pattern}': {err}")))?;
        self.pattern = Some(compiled);
        Ok(self)
    }

    pub fn min(mut self, value: f64) -> Self {
        self.minimum = Some(value);
        self
    }

    pub fn max(mut self, value: f64) -> Self {
        self.maximum = Some(value);
        self
    }

    pub fn min_items(mut self, count: usize) -> Self {
        self.min_items = Some(count);
        self
    }

    pub fn max_items(mut self, count: usize) -> Self {
        self.max_items = Some(count);
        self
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn fields(&self) -> &BTreeMap<String, Schema> {
        &self.fields
    }

    pub fn items(&self) -> Option<&Schema> {
        self.items.as_deref()
    }

    /// Declared defaults of every object field below this node.
    pub fn defaults(&self) -> Vec<(KeyPath, Value)> {
        let mut out = Vec::new();
        collect_defaults(self, None, &mut out);
        out
    }

    /// Whether a stored key falls inside the declared shape. Anything below
    /// a scalar or array field counts as declared.
    pub fn declares(&self, segments: &[String]) -> bool {
        match segments.split_first() {
            None => true,
            Some((first, rest)) if self.kind == SchemaKind::Object => self
                .fields
                .get(first)
                .is_some_and(|field| field.declares(rest)),
            Some(_) => true,
        }
    }

    pub fn from_json(document: &serde_json::Value) -> Result<Self> {
        let document: SchemaDocument = serde_json::from_value(document.clone())
            .map_err(|err| Error::Parse(format!("invalid schema document: {err}")))?;
        document.into_root()
    }

    pub fn parse(content: &str, format: FileFormat) -> Result<Self> {
        let document: SchemaDocument = match format {
            FileFormat::Toml => toml::from_str(content)
                .map_err(|err| Error::Parse(format!("invalid schema document: {err}")))?,
            FileFormat::Json | FileFormat::Auto => serde_json::from_str(content)
                .map_err(|err| Error::Parse(format!("invalid schema document: {err}")))?,
        };
        document.into_root()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        Self::parse(&content, FileFormat::Auto.resolve(path))
    }
}

fn collect_defaults(node: &Schema, prefix: Option<&KeyPath>, out: &mut Vec<(KeyPath, Value)>) {
    for (name, field) in &node.fields {
        let Ok(segment) = KeyPath::parse(name) else {
            continue;
        };
        let path = match prefix {
            Some(prefix) => prefix.join(&segment),
            None => segment,
        };
        if let Some(value) = &field.default {
            out.push((path.clone(), value.clone()));
        }
        if field.kind == SchemaKind::Object {
            collect_defaults(field, Some(&path), out);
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObjectSchemaBuilder {
    schema: Schema,
}

impl ObjectSchemaBuilder {
    pub fn field(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.schema.fields.insert(name.into(), schema);
        self
    }

    pub fn required(mut self) -> Self {
        self.schema.required = true;
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.schema.description = Some(text.into());
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaDocument {
    #[serde(rename = "type")]
    kind: SchemaKind,
    #[serde(default)]
    required: bool,
    default: Option<Value>,
    description: Option<String>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<String>,
    min: Option<f64>,
    max: Option<f64>,
    min_items: Option<usize>,
    max_items: Option<usize>,
    items: Option<Box<SchemaDocument>>,
    #[serde(default)]
    fields: BTreeMap<String, SchemaDocument>,
}

impl SchemaDocument {
    fn into_root(self) -> Result<Schema> {
        if self.kind != SchemaKind::Object {
            return Err(Error::Parse(format!(
                "schema root must be an object, found {}",
                self.kind
            )));
        }
        self.into_schema()
    }

    fn into_schema(self) -> Result<Schema> {
        if self.items.is_some() && self.kind != SchemaKind::Array {
            return Err(Error::Parse(format!(
                "'items' is only valid on array schemas, found {}",
                self.kind
            )));
        }
        if !self.fields.is_empty() && self.kind != SchemaKind::Object {
            return Err(Error::Parse(format!(
                "'fields' is only valid on object schemas, found {}",
                self.kind
            )));
        }

        let mut schema = Schema::of(self.kind);
        schema.required = self.required;
        schema.default = self.default;
        schema.description = self.description;
        schema.min_length = self.min_length;
        schema.max_length = self.max_length;
        schema.minimum = self.min;
        schema.maximum = self.max;
        schema.min_items = self.min_items;
        schema.max_items = self.max_items;
        if let Some(pattern) = self.pattern {
            schema = schema.pattern(&pattern)?;
        }
        if let Some(items) = self.items {
            schema.items = Some(Box::new(items.into_schema()?));
        }
        for (name, field) in self.fields {
            schema.fields.insert(name, field.into_schema()?);
        }
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_returns_updated_copies() {
        let base = Schema::int().min(1.0);
        let strict = base.clone().required().max(10.0);

        assert!(!base.is_required());
        assert!(strict.is_required());
        assert_eq!(strict.kind(), SchemaKind::Int);
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let error = Schema::string().pattern("([a-z").expect_err("bad regex");
        assert!(matches!(error, Error::InvalidFormat(_)));
    }

    #[test]
    fn float_kind_accepts_ints() {
        assert!(SchemaKind::Float.accepts(&Value::Int(3)));
        assert!(!SchemaKind::Int.accepts(&Value::Float(3.0)));
        assert!(SchemaKind::Object.accepts(&Value::Map(BTreeMap::new())));
    }

    #[test]
    fn defaults_follow_nested_objects() {
        let schema = Schema::object()
            .field("name", Schema::string().with_default("svc"))
            .field(
                "database",
                Schema::object()
                    .field("port", Schema::int().with_default(5432))
                    .build(),
            )
            .build();

        let defaults: Vec<String> = schema
            .defaults()
            .into_iter()
            .map(|(path, value)| format!("{path}={value}"))
            .collect();
        assert_eq!(defaults, vec!["database.port=5432", "name=svc"]);
    }

    #[test]
    fn declares_covers_everything_below_leaf_fields() {
        let schema = Schema::object()
            .field("tags", Schema::array(Schema::string()))
            .field("database", Schema::object().field("host", Schema::string()).build())
            .build();

        let declares = |key: &str| {
            let path = KeyPath::parse(key).expect("valid key");
            schema.declares(path.segments())
        };
        assert!(declares("tags.0"));
        assert!(declares("database.host"));
        assert!(!declares("database.port"));
        assert!(!declares("debug"));
    }

    #[test]
    fn documents_build_schema_trees() {
        let schema = Schema::from_json(&json!({
            "type": "object",
            "fields": {
                "database": {
                    "type": "object",
                    "required": true,
                    "fields": {
                        "host": {"type": "string", "required": true, "min_length": 1},
                        "port": {"type": "int", "min": 1, "max": 65535, "default": 5432}
                    }
                },
                "servers": {"type": "array", "max_items": 4, "items": {"type": "string"}}
            }
        }))
        .expect("valid document");

        let database = &schema.fields()["database"];
        assert!(database.is_required());
        assert_eq!(database.fields()["port"].default_value(), Some(&Value::Int(5432)));
        assert_eq!(
            schema.fields()["servers"].items().map(Schema::kind),
            Some(SchemaKind::String)
        );
    }

    #[test]
    fn documents_reject_misplaced_constraints() {
        let error = Schema::from_json(&json!({
            "type": "object",
            "fields": {"port": {"type": "int", "items": {"type": "int"}}}
        }))
        .expect_err("items on int");
        assert!(matches!(error, Error::Parse(_)));

        let error = Schema::from_json(&json!({"type": "string"})).expect_err("scalar root");
        assert!(matches!(error, Error::Parse(_)));
    }

    #[test]
    fn toml_documents_parse() {
        let schema = Schema::parse(
            "type = \"object\"\n[fields.log]\ntype = \"string\"\npattern = \"^(debug|info)$\"\n",
            FileFormat::Toml,
        )
        .expect("valid toml schema");
        assert_eq!(schema.fields()["log"].kind(), SchemaKind::String);
    }
}
