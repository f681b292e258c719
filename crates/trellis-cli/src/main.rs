//! Trellis CLI - Compile entity filters and inspect schemas

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::{check, compile, completions, describe, query};
use config::Config;
use output::OutputFormat;
use trellis_core::Schema;
use trellis_filter::FilterSchema;

#[derive(Parser)]
#[command(name = "trellis")]
#[command(author, version, about = "Filter compiler for typed entity graphs")]
pub struct Cli {
    /// Config file [default: <config dir>/trellis/trellis.toml]
    #[arg(short, long, env = "TRELLIS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Schema file, when the kinds are not declared in the config file
    #[arg(short, long, global = true)]
    pub schema: Option<PathBuf>,

    /// Output format: text, json
    #[arg(short, long, default_value = "text", global = true)]
    pub format: String,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from(self.format.as_str())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the schema and show how relationships mirror each other
    Check,
    /// List the filter fields of one or every kind
    Describe(describe::DescribeArgs),
    /// Compile a JSON filter into a condition
    Compile(compile::CompileArgs),
    /// Run a JSON filter against a dataset file
    Query(query::QueryArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Application context with the validated schema
pub struct AppContext {
    pub config: Config,
    pub schema: Arc<Schema>,
    pub filters: FilterSchema,
}

impl AppContext {
    pub fn new(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = Config::load(cli.config.as_deref())?;
        if let Some(path) = &cli.schema {
            config = config.with_schema_file(path)?;
        }

        let schema = Arc::new(config.schema()?);
        let filters = FilterSchema::build(&schema)?;
        tracing::debug!("Schema has {} kinds", schema.kinds().count());

        Ok(Self {
            config,
            schema,
            filters,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    tracing::debug!("Starting trellis CLI");

    if let Commands::Completions(args) = &cli.command {
        return completions::run(args);
    }

    let ctx = AppContext::new(&cli)?;

    match &cli.command {
        Commands::Check => check::run(&cli, &ctx)?,
        Commands::Describe(args) => describe::run(args, &cli, &ctx)?,
        Commands::Compile(args) => compile::run(args, &cli, &ctx)?,
        Commands::Query(args) => query::run(args, &cli, &ctx).await?,
        Commands::Completions(_) => {}
    }

    Ok(())
}
