use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::loader::Entries;
use crate::path::KeyPath;
use crate::value::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Json,
    Toml,
    #[default]
    Auto,
}

impl FileFormat {
    /// Resolves `Auto` by extension. Unknown extensions read as JSON.
    pub fn resolve(self, path: &Path) -> Self {
        match self {
            Self::Auto => {
                let ext = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .unwrap_or("")
                    .to_ascii_lowercase();
                if ext == "toml" {
                    Self::Toml
                } else {
                    Self::Json
                }
            }
            other => other,
        }
    }
}

impl FromStr for FileFormat {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            "auto" => Ok(Self::Auto),
            other => Err(Error::InvalidFormat(format!(
                "unknown file format '{other}' (expected json, toml or auto)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSource {
    pub path: PathBuf,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub format: FileFormat,
}

impl FileSource {
    pub fn required(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: true,
            format: FileFormat::Auto,
        }
    }

    pub fn optional(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: false,
            format: FileFormat::Auto,
        }
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = format;
        self
    }
}

/// Reads one file source. `Ok(None)` means an optional file was skipped.
pub fn load_file(source: &FileSource) -> Result<Option<Entries>> {
    let content = match std::fs::read_to_string(&source.path) {
        Ok(content) => content,
        Err(err) if !source.required => {
            tracing::debug!(
                %err,
                path = %source.path.display(),
                "skipping optional config file"
            );
            return Ok(None);
        }
        Err(err) => return Err(Error::io(&source.path, err)),
    };

    let format = source.format.resolve(&source.path);
    match parse_document(&content, format) {
        Ok(entries) => {
            tracing::debug!(
                path = %source.path.display(),
                ?format,
                keys = entries.len(),
                "loaded config file"
            );
            Ok(Some(entries))
        }
        Err(err) if !source.required => {
            tracing::warn!(
                %err,
                path = %source.path.display(),
                "ignoring unreadable optional config file"
            );
            Ok(None)
        }
        Err(err) => Err(Error::Parse(format!(
            "failed to parse config '{}': {err}",
            source.path.display()
        ))),
    }
}

pub fn parse_document(content: &str, format: FileFormat) -> Result<Entries> {
    let root = match format {
        FileFormat::Toml => {
            let table: toml::Table =
                toml::from_str(content).map_err(|err| Error::Parse(err.to_string()))?;
            Value::from(toml::Value::Table(table))
        }
        FileFormat::Json | FileFormat::Auto => {
            let parsed: serde_json::Value =
                serde_json::from_str(content).map_err(|err| Error::Parse(err.to_string()))?;
            if !parsed.is_object() {
                return Err(Error::Parse(
                    "config document must contain an object at root".to_owned(),
                ));
            }
            Value::from(parsed)
        }
    };

    let Value::Map(entries) = root else {
        return Err(Error::Parse("config document root is not a table".to_owned()));
    };

    let mut out = Vec::new();
    flatten_into(None, entries, &mut out);
    Ok(out)
}

/// Walks nested maps down to their leaves. Arrays are kept whole.
fn flatten_into(prefix: Option<&KeyPath>, entries: BTreeMap<String, Value>, out: &mut Entries) {
    for (key, value) in entries {
        if key.is_empty() {
            tracing::warn!(
                parent = %prefix.map(ToString::to_string).unwrap_or_default(),
                "skipping empty key in config document"
            );
            continue;
        }
        let path = match prefix {
            Some(prefix) => prefix.child(key),
            None => KeyPath::verbatim(key),
        };

        match value {
            Value::Map(children) if !children.is_empty() => {
                flatten_into(Some(&path), children, out)
            }
            other => out.push((path, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lookup<'a>(entries: &'a Entries, key: &str) -> Option<&'a Value> {
        let path = KeyPath::parse(key).expect("valid key");
        entries
            .iter()
            .find(|(candidate, _)| *candidate == path)
            .map(|(_, value)| value)
    }

    #[test]
    fn json_objects_flatten_into_key_paths() {
        let entries = parse_document(
            r#"{
                "database": {"host": "db", "pool": {"size": 4}},
                "tags": ["a", {"b": 1}],
                "empty": {}
            }"#,
            FileFormat::Json,
        )
        .expect("valid json");

        assert_eq!(lookup(&entries, "database.host"), Some(&Value::from("db")));
        assert_eq!(lookup(&entries, "database.pool.size"), Some(&Value::Int(4)));
        assert_eq!(lookup(&entries, "empty"), Some(&Value::Map(BTreeMap::new())));

        let tags = lookup(&entries, "tags").and_then(Value::as_array).expect("array");
        assert_eq!(tags.len(), 2);
        assert!(tags[1].as_map().is_some());
    }

    #[test]
    fn toml_sections_and_table_arrays() {
        let entries = parse_document(
            r#"
            name = "svc"
            [database]
            host = "localhost"
            port = 5432

            [[servers]]
            host = "a"

            [[servers]]
            host = "b"
            "#,
            FileFormat::Toml,
        )
        .expect("valid toml");

        assert_eq!(lookup(&entries, "name"), Some(&Value::from("svc")));
        assert_eq!(lookup(&entries, "database.port"), Some(&Value::Int(5432)));
        let servers = lookup(&entries, "servers").and_then(Value::as_array).expect("array");
        assert_eq!(servers.len(), 2);
        assert_eq!(
            servers[1].as_map().and_then(|map| map.get("host")),
            Some(&Value::from("b"))
        );
    }

    #[test]
    fn document_keys_are_taken_verbatim() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("service.json");
        std::fs::write(
            &path,
            r#"{
                "port": 80,
                "display name": "svc",
                "labels": {"app.kubernetes.io/name": "web"}
            }"#,
        )
        .expect("write");

        let entries = load_file(&FileSource::required(&path))
            .expect("valid document")
            .expect("required file");
        let find = |path: &KeyPath| {
            entries
                .iter()
                .find(|(candidate, _)| candidate == path)
                .map(|(_, value)| value.clone())
        };

        assert_eq!(lookup(&entries, "port"), Some(&Value::Int(80)));
        assert_eq!(find(&KeyPath::verbatim("display name")), Some(Value::from("svc")));
        assert_eq!(
            find(&KeyPath::verbatim("labels").child("app.kubernetes.io/name")),
            Some(Value::from("web"))
        );
    }

    #[test]
    fn non_object_json_root_is_a_parse_error() {
        let error = parse_document("[1, 2]", FileFormat::Json).expect_err("array root");
        assert!(matches!(error, Error::Parse(_)));
    }

    #[test]
    fn auto_format_uses_extension() {
        assert_eq!(FileFormat::Auto.resolve(Path::new("a.TOML")), FileFormat::Toml);
        assert_eq!(FileFormat::Auto.resolve(Path::new("a.yaml")), FileFormat::Json);
        assert_eq!(FileFormat::Json.resolve(Path::new("a.toml")), FileFormat::Json);
        assert!(matches!(
            "yaml".parse::<FileFormat>(),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn missing_files_fail_only_when_required() {
        let tmp = TempDir::new().expect("tmp");
        let missing = tmp.path().join("absent.json");

        assert!(load_file(&FileSource::optional(&missing))
            .expect("optional file")
            .is_none());
        let error = load_file(&FileSource::required(&missing)).expect_err("required file");
        assert!(matches!(error, Error::Io { .. }));
    }

    #[test]
    fn malformed_optional_file_is_skipped() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("broken.json");
        std::fs::write(&path, "{not json").expect("write");

        assert!(load_file(&FileSource::optional(&path))
            .expect("optional file")
            .is_none());
        let error = load_file(&FileSource::required(&path)).expect_err("required file");
        assert!(matches!(error, Error::Parse(_)));
    }
}
