use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::loader::Entries;
use crate::path::KeyPath;
use crate::value::Value;

/// Where environment variables come from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EnvVars {
    /// Snapshot of the process environment, taken on every load.
    #[default]
    Process,
    Fixed(BTreeMap<String, String>),
}

impl EnvVars {
    fn snapshot(&self) -> BTreeMap<String, String> {
        match self {
            Self::Process => std::env::vars_os()
                .filter_map(|(name, value)| {
                    Some((name.into_string().ok()?, value.into_string().ok()?))
                })
                .collect(),
            Self::Fixed(vars) => vars.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvSource {
    pub prefix: String,
    pub separator: String,
    #[serde(skip)]
    pub vars: EnvVars,
}

impl Default for EnvSource {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            separator: "_".to_owned(),
            vars: EnvVars::Process,
        }
    }
}

impl EnvSource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.vars = EnvVars::Fixed(
            vars.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        );
        self
    }
}

pub fn load_env(source: &EnvSource) -> Result<Entries> {
    if source.separator.is_empty() {
        return Err(Error::InvalidFormat(
            "environment separator cannot be empty".to_owned(),
        ));
    }

    let head = format!("{}{}", source.prefix, source.separator);
    let separator = source.separator.to_lowercase();
    let mut entries = Vec::new();

    for (name, raw) in source.vars.snapshot() {
        let matches = name
            .get(..head.len())
            .is_some_and(|start| start.eq_ignore_ascii_case(&head));
        if !matches {
            continue;
        }

        let remainder = name[head.len()..].to_lowercase();
        let path = match KeyPath::from_segments(remainder.split(separator.as_str())) {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(
                    %err,
                    variable = %name,
                    "skipping environment variable with unusable key"
                );
                continue;
            }
        };
        entries.push((path, Value::parse_scalar(&raw)));
    }

    tracing::debug!(prefix = %source.prefix, keys = entries.len(), "loaded environment");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(source: EnvSource) -> BTreeMap<String, Value> {
        load_env(&source)
            .expect("env load")
            .into_iter()
            .map(|(path, value)| (path.to_string(), value))
            .collect()
    }

    #[test]
    fn strips_prefix_and_splits_on_separator() {
        let values = load(
            EnvSource::new("APP")
                .with_separator("__")
                .with_vars([
                    ("APP__DATABASE__HOST", "prod.example.com"),
                    ("APP__DATABASE__MAX_CONN", "12"),
                    ("APP__DEBUG", "TRUE"),
                    ("APP__RATIO", "0.75"),
                    ("OTHER__DATABASE__HOST", "ignored"),
                    ("APPLE", "ignored"),
                ]),
        );

        assert_eq!(values.len(), 4);
        assert_eq!(values["database.host"], Value::from("prod.example.com"));
        assert_eq!(values["database.max_conn"], Value::Int(12));
        assert_eq!(values["debug"], Value::Bool(true));
        assert_eq!(values["ratio"], Value::Float(0.75));
    }

    #[test]
    fn prefix_match_ignores_case() {
        let values = load(EnvSource::new("app").with_vars([("APP_PORT", "8080")]));
        assert_eq!(values["port"], Value::Int(8080));
    }

    #[test]
    fn default_separator_splits_every_underscore() {
        let values = load(EnvSource::new("APP").with_vars([("APP_LOG_LEVEL", "debug")]));
        assert_eq!(values["log.level"], Value::from("debug"));
    }

    #[test]
    fn unusable_keys_are_skipped() {
        let values = load(
            EnvSource::new("APP")
                .with_separator("__")
                .with_vars([("APP__", "x"), ("APP____A", "y"), ("APP__OK", "z")]),
        );
        assert_eq!(values.len(), 1);
        assert!(values.contains_key("ok"));
    }

    #[test]
    fn empty_separator_is_rejected() {
        let error = load_env(&EnvSource::new("APP").with_separator("")).expect_err("separator");
        assert!(matches!(error, Error::InvalidFormat(_)));
    }
}
