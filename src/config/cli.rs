use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the querykey binary.
#[derive(Debug, Parser)]
#[command(
    name = "querykey",
    version,
    about = "Inspect query keys and cache invalidation plans"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "QUERYKEY_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the canonical query key for an entity kind, scope and filters.
    Derive(DeriveArgs),
    /// Print the invalidation prefixes for mutated entity kinds.
    Resolve(ResolveArgs),
    /// Print the configured cross-entity dependency table.
    Table,
}

#[derive(Debug, Args, Clone)]
pub struct DeriveArgs {
    /// Entity kind, e.g. `clients`.
    pub kind: String,

    /// Scope: `list`, `detail:<id>`, or a named view.
    #[arg(long, value_name = "SCOPE")]
    pub scope: Option<String>,

    /// Filters as a JSON object, e.g. '{"status":"active"}'.
    #[arg(long, value_name = "JSON")]
    pub filters: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ResolveArgs {
    /// Mutated entity kinds.
    #[arg(required = true, num_args = 1..)]
    pub kinds: Vec<String>,

    /// Narrow the invalidation to a single record; only valid with one kind.
    #[arg(long, value_name = "ID")]
    pub id: Option<String>,
}
