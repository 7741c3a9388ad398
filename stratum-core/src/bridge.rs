use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::Result;
use crate::loader::Sources;
use crate::schema::Schema;
use crate::store::Config;

/// Input handed over by a command line framework: its parsed flags, its
/// positional arguments, and the file/env sources to load underneath.
#[derive(Debug, Clone, Default)]
pub struct BridgeRequest {
    pub flags: BTreeMap<String, String>,
    pub positional: Vec<String>,
    pub sources: Sources,
    pub schema: Option<Arc<Schema>>,
}

/// What a handler sees: the loaded configuration (through `Deref`) and the
/// positional arguments.
#[derive(Debug)]
pub struct BridgeContext<'a> {
    config: &'a Config,
    positional: &'a [String],
}

impl<'a> BridgeContext<'a> {
    pub fn config(&self) -> &'a Config {
        self.config
    }

    pub fn positional(&self) -> &'a [String] {
        self.positional
    }
}

impl Deref for BridgeContext<'_> {
    type Target = Config;

    fn deref(&self) -> &Config {
        self.config
    }
}

/// Renders flags in the grammar the command line loader reads. An empty
/// value becomes a bare boolean flag; values are always attached with `=`
/// so dash-prefixed values are never read as options.
pub fn flags_to_args(flags: &BTreeMap<String, String>) -> Vec<String> {
    let mut args = Vec::with_capacity(flags.len());
    for (name, value) in flags {
        let dashes = if name.chars().count() == 1 { "-" } else { "--" };
        if value.is_empty() {
            args.push(format!("{dashes}{name}"));
        } else {
            args.push(format!("{dashes}{name}={value}"));
        }
    }
    args
}

/// Loads, validates and then runs `handler`. Validation errors are folded
/// into a single `ValidationFailed` before the handler is reached.
pub fn run<T, F>(request: BridgeRequest, handler: F) -> Result<T>
where
    F: FnOnce(&BridgeContext<'_>) -> Result<T>,
{
    let config = load(&request)?;
    let context = BridgeContext {
        config: &config,
        positional: &request.positional,
    };
    handler(&context)
}

/// The load and validate half of `run`, for callers that keep the config.
pub fn load(request: &BridgeRequest) -> Result<Config> {
    let mut sources = request.sources.clone();
    if !request.flags.is_empty() {
        let mut args = sources.args.take().unwrap_or_default();
        args.extend(flags_to_args(&request.flags));
        sources.args = Some(args);
    }

    let mut config = Config::from_sources(&sources)?;
    if let Some(schema) = &request.schema {
        config.set_schema(Arc::clone(schema));
        let result = config.validate();
        for warning in &result.warnings {
            tracing::warn!(%warning, "configuration warning");
        }
        result.into_result()?;
    }
    Ok(config)
}
