use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use evidence_monitor::{
    Config, ConfigOverrides, EvidenceSources, ResultRecord, Source, Summarizer,
    SummarizerBackendKind, TrialsStrategy,
};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "evidence-monitor")]
#[command(about = "Search biomedical evidence sources and summarize abstracts")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Request timeout in seconds for every upstream call
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Summarization backend
    #[arg(long, global = true, value_enum)]
    backend: Option<SummarizerBackendKind>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Search one evidence source
    Search {
        #[arg(value_enum)]
        source: Source,

        /// Free-text query
        query: String,

        /// Maximum number of records
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// ClinicalTrials.gov integration strategy
        #[arg(long, value_enum)]
        strategy: Option<TrialsStrategy>,

        /// Summarize each record's abstract
        #[arg(long)]
        summarize: bool,
    },

    /// Summarize text given as argument, or read from stdin with "-"
    Summarize { text: String },

    /// Print the effective configuration with secrets redacted
    Config,

    /// Print the JSON schema of a result record
    Schema,
}

#[derive(Serialize)]
struct SummarizedRecord {
    #[serde(flatten)]
    record: ResultRecord,
    summary: String,
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(cli: &Cli, strategy: Option<TrialsStrategy>) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.apply_overrides(&ConfigOverrides {
        timeout_secs: cli.timeout,
        trials_strategy: strategy,
        summarizer_backend: cli.backend,
    });
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    match &cli.command {
        Commands::Search {
            source,
            query,
            limit,
            strategy,
            summarize,
        } => {
            let config = load_config(&cli, *strategy)?;
            let sources = EvidenceSources::from_config(&config)?;
            let adapter = sources.get(*source);
            info!("Searching {} ({}) for: {}", adapter.name(), adapter.description(), query);

            let records = adapter.search(query, *limit).await;
            if !*summarize {
                return print_json(&records);
            }

            let summarizer = Summarizer::from_config(&config.summarizer, &config.http)?;
            let mut summarized = Vec::with_capacity(records.len());
            for record in records {
                let summary = if record.is_sentinel() {
                    String::new()
                } else {
                    summarizer.summarize(&record.abstract_text).await
                };
                summarized.push(SummarizedRecord { record, summary });
            }
            print_json(&summarized)
        }
        Commands::Summarize { text } => {
            let config = load_config(&cli, None)?;
            let text = if text == "-" {
                let mut buffer = String::new();
                std::io::stdin()
                    .read_to_string(&mut buffer)
                    .context("Failed to read stdin")?;
                buffer
            } else {
                text.clone()
            };
            debug!("Summarizing {} chars", text.len());

            let summarizer = Summarizer::from_config(&config.summarizer, &config.http)?;
            println!("{}", summarizer.summarize(&text).await);
            Ok(())
        }
        Commands::Config => {
            let config = load_config(&cli, None)?;
            print!("{}", config.to_redacted_toml()?);
            Ok(())
        }
        Commands::Schema => print_json(&schemars::schema_for!(ResultRecord)),
    }
}
