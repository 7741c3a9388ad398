use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "stratum", about = "Resolve, inspect and validate layered configuration")]
pub struct Cli {
    /// Config file that must exist (repeatable, loaded in order)
    #[arg(long = "file", short = 'f')]
    pub files: Vec<PathBuf>,

    /// Config file that is skipped when missing or unreadable
    #[arg(long = "optional-file")]
    pub optional_files: Vec<PathBuf>,

    /// Force a format for every file instead of guessing from the extension
    #[arg(long)]
    pub format: Option<String>,

    /// TOML or JSON manifest describing files, environment and arguments
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Read environment variables starting with this prefix
    #[arg(long)]
    pub env_prefix: Option<String>,

    #[arg(long, default_value = "_")]
    pub env_separator: String,

    /// Schema document (TOML or JSON) to validate against
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Override a key, as KEY=VALUE or a bare KEY for `true` (repeatable)
    #[arg(long = "set", short = 's')]
    pub overrides: Vec<String>,

    #[arg(long, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print one resolved value
    Get {
        key: String,

        #[arg(long = "as", value_enum, default_value_t = ValueType::Auto)]
        as_type: ValueType,

        /// Printed when the key is absent
        #[arg(long)]
        default: Option<String>,
    },
    /// Print the effective configuration as JSON
    Dump {
        /// One dotted key per line instead of nested JSON
        #[arg(long)]
        flat: bool,
    },
    /// Report schema errors and warnings
    Validate,
    /// Poll watched files and print the configuration after every reload
    Watch {
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Stop after this many polls
        #[arg(long)]
        max_polls: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValueType {
    Auto,
    String,
    Int,
    Float,
    Bool,
    Array,
    Map,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
