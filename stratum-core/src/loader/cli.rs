use crate::error::{Error, Result};
use crate::loader::Entries;
use crate::path::KeyPath;
use crate::value::Value;

/// Parses `--key=value`, `--key value`, `--flag`, `-k value` and `-k`.
///
/// Dashes inside a key separate path segments, so `--database-port 5432`
/// sets `database.port`. Everything after a bare `--` is positional and
/// ignored, as are positional tokens between options.
pub fn parse_args<I, S>(args: I) -> Result<Entries>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let args: Vec<String> = args
        .into_iter()
        .map(|arg| arg.as_ref().to_owned())
        .collect();
    let mut entries = Vec::new();
    let mut index = 0;

    while index < args.len() {
        let arg = &args[index];
        index += 1;

        if arg == "--" {
            break;
        }

        let body = if let Some(long) = arg.strip_prefix("--") {
            long
        } else if let Some(short) = arg.strip_prefix('-') {
            short
        } else {
            tracing::debug!(argument = %arg, "ignoring positional argument");
            continue;
        };

        let (raw_key, value) = match body.split_once('=') {
            Some((key, raw)) => (key, parse_value(raw)),
            None => match args.get(index) {
                Some(next) if !next.starts_with('-') => {
                    index += 1;
                    (body, parse_value(next))
                }
                _ => (body, Value::Bool(true)),
            },
        };

        let path = KeyPath::parse(&raw_key.replace('-', ".")).map_err(|_| {
            Error::InvalidPath(format!("invalid command line option '{arg}'"))
        })?;
        entries.push((path, value));
    }

    tracing::debug!(keys = entries.len(), "parsed command line arguments");
    Ok(entries)
}

fn parse_value(raw: &str) -> Value {
    let structured = (raw.starts_with('[') && raw.ends_with(']'))
        || (raw.starts_with('{') && raw.ends_with('}'));
    if structured {
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(raw) {
            return Value::from(parsed);
        }
    }
    Value::parse_scalar(raw)
}
