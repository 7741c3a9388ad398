use std::fmt;

use crate::error::{Error, Result};
use crate::schema::{Schema, SchemaKind};
use crate::store::Config;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    MissingRequiredField,
    TypeMismatch,
    ValueOutOfRange,
    PatternMismatch,
    ValidationFailed,
}

impl ValidationErrorKind {
    fn label(self) -> &'static str {
        match self {
            Self::MissingRequiredField => "missing required field",
            Self::TypeMismatch => "type mismatch",
            Self::ValueOutOfRange => "value out of range",
            Self::PatternMismatch => "pattern mismatch",
            Self::ValidationFailed => "validation failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, path: &str, expected: &str, actual: &str) -> Self {
        let shown = if path.is_empty() { "<root>" } else { path };
        Self {
            path: path.to_owned(),
            message: format!(
                "{shown}: {}: expected {expected}, got {actual}",
                kind.label()
            ),
            kind,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Folds every error into one `ValidationFailed`.
    pub fn into_result(self) -> Result<()> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let summary = self
            .errors
            .iter()
            .map(|error| error.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        Err(Error::ValidationFailed(format!(
            "{} error(s): {summary}",
            self.errors.len()
        )))
    }

    fn push(&mut self, kind: ValidationErrorKind, path: &str, expected: &str, actual: &str) {
        self.errors
            .push(ValidationError::new(kind, path, expected, actual));
    }
}

impl Schema {
    /// Checks every declared field against `config`. Never stops at the
    /// first problem.
    pub fn validate(&self, config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();
        if self.kind != SchemaKind::Object {
            result.push(
                ValidationErrorKind::ValidationFailed,
                "",
                "object schema at root",
                self.kind.name(),
            );
            return result;
        }

        check_fields(self, "", config, &mut result);

        for path in config.data.keys() {
            if !self.declares(path.segments()) {
                result
                    .warnings
                    .push(format!("key '{path}' is not declared in the schema"));
            }
        }

        tracing::debug!(
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "validated configuration"
        );
        result
    }
}

fn check_fields(node: &Schema, prefix: &str, config: &Config, result: &mut ValidationResult) {
    for (name, field) in &node.fields {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };

        match config.resolve(&path) {
            Ok(value) => check_value(field, &path, value, config, result),
            Err(err) => result.push(
                ValidationErrorKind::ValidationFailed,
                &path,
                "a resolvable key",
                &err.to_string(),
            ),
        }
    }
}

fn check_value(
    field: &Schema,
    path: &str,
    value: Option<Value>,
    config: &Config,
    result: &mut ValidationResult,
) {
    let Some(value) = value.filter(|value| !value.is_null()) else {
        if field.required && field.default.is_none() {
            result.push(
                ValidationErrorKind::MissingRequiredField,
                path,
                &format!("a {} value", field.kind),
                "nothing",
            );
        }
        return;
    };

    if !field.kind.accepts(&value) {
        result.push(
            ValidationErrorKind::TypeMismatch,
            path,
            field.kind.name(),
            value.kind().name(),
        );
        return;
    }

    match &value {
        Value::String(text) => check_string(field, path, text, result),
        Value::Int(number) => check_number(field, path, *number as f64, result),
        Value::Float(number) => check_number(field, path, *number, result),
        Value::Array(items) => check_array(field, path, items, config, result),
        Value::Map(_) => check_fields(field, path, config, result),
        Value::Bool(_) | Value::Null => {}
    }
}

fn check_string(field: &Schema, path: &str, text: &str, result: &mut ValidationResult) {
    let length = text.chars().count();
    if let Some(min) = field.min_length {
        if length < min {
            result.push(
                ValidationErrorKind::ValueOutOfRange,
                path,
                &format!("at least {min} characters"),
                &length.to_string(),
            );
        }
    }
    if let Some(max) = field.max_length {
        if length > max {
            result.push(
                ValidationErrorKind::ValueOutOfRange,
                path,
                &format!("at most {max} characters"),
                &length.to_string(),
            );
        }
    }
    if let Some(pattern) = &field.pattern {
        if !pattern.is_match(text) {
            result.push(
                ValidationErrorKind::PatternMismatch,
                path,
                &format!("a match for /{}/", pattern.as_str()),
                &format!("'{text}'"),
            );
        }
    }
}

fn check_number(field: &Schema, path: &str, number: f64, result: &mut ValidationResult) {
    if let Some(min) = field.minimum {
        if number < min {
            result.push(
                ValidationErrorKind::ValueOutOfRange,
                path,
                &format!(">= {min}"),
                &number.to_string(),
            );
        }
    }
    if let Some(max) = field.maximum {
        if number > max {
            result.push(
                ValidationErrorKind::ValueOutOfRange,
                path,
                &format!("<= {max}"),
                &number.to_string(),
            );
        }
    }
}

fn check_array(
    field: &Schema,
    path: &str,
    items: &[Value],
    config: &Config,
    result: &mut ValidationResult,
) {
    if let Some(min) = field.min_items {
        if items.len() < min {
            result.push(
                ValidationErrorKind::ValueOutOfRange,
                path,
                &format!("at least {min} items"),
                &items.len().to_string(),
            );
        }
    }
    if let Some(max) = field.max_items {
        if items.len() > max {
            result.push(
                ValidationErrorKind::ValueOutOfRange,
                path,
                &format!("at most {max} items"),
                &items.len().to_string(),
            );
        }
    }

    let Some(item_schema) = field.items.as_deref() else {
        return;
    };
    for (index, item) in items.iter().enumerate() {
        let item_path = format!("{path}.{index}");
        check_value(item_schema, &item_path, Some(item.clone()), config, result);
    }
}
