mod cli;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use stratum_core::bridge::{self, BridgeContext, BridgeRequest};
use stratum_core::{Config, EnvSource, FileFormat, FileSource, Schema, Sources, Value};

fn main() {
    if let Err(error) = run() {
        eprintln!("stratum failed: {error}");
        std::process::exit(1);
    }
}

fn run() -> stratum_core::Result<()> {
    let args = cli::Cli::parse_args();
    stratum_core::logging::init_tracing(&args.log_level);

    let request = build_request(&args)?;
    match args.command {
        cli::Command::Get {
            key,
            as_type,
            default,
        } => bridge::run(request, |context| print_value(context, &key, as_type, default)),
        cli::Command::Dump { flat } => bridge::run(request, |context| {
            if flat {
                for (key, value) in context.entries() {
                    println!("{key} = {value}");
                }
            } else {
                print_json(context)?;
            }
            Ok(())
        }),
        cli::Command::Validate => validate(request),
        cli::Command::Watch {
            interval_ms,
            max_polls,
        } => watch(request, Duration::from_millis(interval_ms), max_polls),
    }
}

fn build_request(args: &cli::Cli) -> stratum_core::Result<BridgeRequest> {
    let mut sources = match &args.manifest {
        Some(path) => Sources::from_file(path)?,
        None => Sources::new(),
    };

    let format = args
        .format
        .as_deref()
        .map(str::parse::<FileFormat>)
        .transpose()?
        .unwrap_or_default();
    for path in &args.files {
        sources = sources.file(FileSource::required(path).with_format(format));
    }
    for path in &args.optional_files {
        sources = sources.file(FileSource::optional(path).with_format(format));
    }
    if let Some(prefix) = &args.env_prefix {
        sources = sources.env(EnvSource::new(prefix).with_separator(&args.env_separator));
    }

    let schema = args
        .schema
        .as_deref()
        .map(Schema::from_file)
        .transpose()?
        .map(Arc::new);

    Ok(BridgeRequest {
        flags: parse_overrides(&args.overrides),
        positional: Vec::new(),
        sources,
        schema,
    })
}

fn parse_overrides(overrides: &[String]) -> BTreeMap<String, String> {
    overrides
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => (key.trim().to_owned(), value.to_owned()),
            None => (entry.trim().to_owned(), String::new()),
        })
        .collect()
}

fn print_value(
    context: &BridgeContext<'_>,
    key: &str,
    as_type: cli::ValueType,
    default: Option<String>,
) -> stratum_core::Result<()> {
    if let Some(default) = default {
        if context.get(key).is_none() {
            println!("{default}");
            return Ok(());
        }
    }

    let rendered = match as_type {
        cli::ValueType::Auto => context
            .resolve(key)?
            .ok_or_else(|| stratum_core::Error::MissingKey(key.to_owned()))?
            .to_string(),
        cli::ValueType::String => context.get_string(key)?,
        cli::ValueType::Int => context.get_int(key)?.to_string(),
        cli::ValueType::Float => context.get_float(key)?.to_string(),
        cli::ValueType::Bool => context.get_bool(key)?.to_string(),
        cli::ValueType::Array => Value::Array(context.get_array(key)?).to_string(),
        cli::ValueType::Map => Value::Map(context.get_map(key)?).to_string(),
    };
    println!("{rendered}");
    Ok(())
}

fn print_json(config: &Config) -> stratum_core::Result<()> {
    let rendered = serde_json::to_string_pretty(&config.to_json())
        .map_err(|err| stratum_core::Error::Parse(format!("failed to render config: {err}")))?;
    println!("{rendered}");
    Ok(())
}

fn validate(request: BridgeRequest) -> stratum_core::Result<()> {
    let schema = request.schema.clone();
    let mut config = bridge::load(&BridgeRequest {
        schema: None,
        ..request
    })?;

    let Some(schema) = schema else {
        println!("No schema given; nothing to validate.");
        return Ok(());
    };
    config.set_schema(schema);

    let result = config.validate();
    for warning in &result.warnings {
        println!("warning: {warning}");
    }
    for error in &result.errors {
        println!("error: {error}");
    }
    if result.is_valid() {
        println!("Config is valid.");
    }
    result.into_result()
}

fn watch(
    request: BridgeRequest,
    interval: Duration,
    max_polls: Option<u64>,
) -> stratum_core::Result<()> {
    let mut config = bridge::load(&request)?;
    print_json(&config)?;

    config.enable_hot_reload(Some(Box::new(|config: &Config| {
        println!("-- reloaded --");
        if let Err(error) = print_json(config) {
            eprintln!("{error}");
        }
    })));

    let mut polls = 0;
    while max_polls.map_or(true, |limit| polls < limit) {
        std::thread::sleep(interval);
        polls += 1;
        if let Err(error) = config.check_and_reload() {
            eprintln!("reload failed, keeping previous configuration: {error}");
        }
    }
    Ok(())
}
