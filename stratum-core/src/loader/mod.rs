pub mod cli;
pub mod env;
pub mod file;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::path::KeyPath;
use crate::value::Value;

pub use cli::parse_args;
pub use env::{load_env, EnvSource, EnvVars};
pub use file::{load_file, parse_document, FileFormat, FileSource};

/// Ordered key/value pairs produced by one loader. Later entries win.
pub type Entries = Vec<(KeyPath, Value)>;

/// Everything one load pass reads, in precedence order: files, then the
/// environment, then command line arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sources {
    pub files: Vec<FileSource>,
    pub env: Option<EnvSource>,
    pub args: Option<Vec<String>>,
}

impl Sources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, source: FileSource) -> Self {
        self.files.push(source);
        self
    }

    pub fn env(mut self, source: EnvSource) -> Self {
        self.env = Some(source);
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Reads a source manifest (TOML by extension, JSON otherwise).
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        match FileFormat::Auto.resolve(path) {
            FileFormat::Toml => toml::from_str(&content).map_err(|err| {
                Error::Parse(format!(
                    "failed to parse source manifest '{}': {err}",
                    path.display()
                ))
            }),
            _ => serde_json::from_str(&content).map_err(|err| {
                Error::Parse(format!(
                    "failed to parse source manifest '{}': {err}",
                    path.display()
                ))
            }),
        }
    }

    /// Runs every loader and returns their combined output. Nothing is
    /// applied anywhere, so a failure leaves callers untouched.
    pub fn collect(&self) -> Result<Entries> {
        let mut entries = Vec::new();
        for source in &self.files {
            if let Some(loaded) = load_file(source)? {
                entries.extend(loaded);
            }
        }
        if let Some(env) = &self.env {
            entries.extend(load_env(env)?);
        }
        if let Some(args) = &self.args {
            entries.extend(parse_args(args)?);
        }
        Ok(entries)
    }
}
