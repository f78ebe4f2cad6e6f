//! kgsql entry point

use clap::{Args, Parser, Subcommand, ValueEnum};
use kgsql_cli::{CliConfig, Command, OutputFormat, run};
use kgsql_query::PlaceholderStyle;
use std::io::Read;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// kgsql - translate graph pattern queries into parameterized SQL
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Print the compiled SQL and its bind parameters
    Translate(QueryArgs),
    /// Print the logical plan
    Explain(QueryArgs),
}

#[derive(Args)]
struct QueryArgs {
    /// Query text; read from stdin when omitted
    query: Option<String>,

    /// Schema catalog (JSON)
    #[arg(long)]
    catalog: PathBuf,

    /// Query parameters (JSON)
    #[arg(long)]
    params: Option<PathBuf>,

    /// Translator configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Placeholder style, overriding the configuration file
    #[arg(long, value_enum)]
    placeholder: Option<Placeholder>,

    /// Maximum number of UNION ALL branches
    #[arg(long)]
    max_union_branches: Option<usize>,

    /// Leave parameters missing from the parameter file to the executor
    #[arg(long)]
    defer: bool,

    /// Print SQL with commented bind values instead of JSON
    #[arg(long)]
    sql: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Placeholder {
    Dollar,
    Question,
}

impl From<Placeholder> for PlaceholderStyle {
    fn from(placeholder: Placeholder) -> Self {
        match placeholder {
            Placeholder::Dollar => PlaceholderStyle::Dollar,
            Placeholder::Question => PlaceholderStyle::Question,
        }
    }
}

impl From<&QueryArgs> for CliConfig {
    fn from(args: &QueryArgs) -> Self {
        CliConfig {
            catalog_path: args.catalog.clone(),
            params_path: args.params.clone(),
            config_path: args.config.clone(),
            placeholder: args.placeholder.map(Into::into),
            max_union_branches: args.max_union_branches,
            defer_missing: args.defer,
            format: if args.sql {
                OutputFormat::Sql
            } else {
                OutputFormat::Json
            },
        }
    }
}

fn main() {
    // Logs go to stderr so stdout carries only the result
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (command, args) = match &cli.command {
        CliCommand::Translate(args) => (Command::Translate, args),
        CliCommand::Explain(args) => (Command::Explain, args),
    };

    let query = match &args.query {
        Some(query) => query.clone(),
        None => {
            let mut buffer = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut buffer) {
                error!("Failed to read query from stdin: {}", e);
                std::process::exit(1);
            }
            buffer
        }
    };

    match run(command, &CliConfig::from(args), &query) {
        Ok(output) => println!("{output}"),
        Err(e) => {
            error!(code = e.code(), offset = ?e.offset(), "{}", e);
            std::process::exit(1);
        }
    }
}
