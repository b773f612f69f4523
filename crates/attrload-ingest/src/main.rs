//! attrload - attribute set loader

use anyhow::{Context, Result};
use attrload_common::logging::{init_logging, LogConfig, LogLevel};
use attrload_ingest::config::{ConnectorConfig, DEFAULT_BATCH_SIZE, DEFAULT_HTTP_TIMEOUT_SECS};
use attrload_ingest::connector::Connector;
use attrload_ingest::schema;
use attrload_ingest::sink::{HttpSink, MemorySink, Sink};
use attrload_ingest::source::{write_outcome, InputFormat, QueueSource};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "attrload")]
#[command(author, version, about = "Load attribute sets into a column store")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load an input file into the target table
    Run {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Input file format
        #[arg(long, value_enum, default_value_t = FormatArg::Jsonl)]
        input_format: FormatArg,

        /// File receiving items written successfully (JSON lines, appended)
        #[arg(long)]
        success_out: PathBuf,

        /// File receiving failed items with their cause (JSON lines, appended)
        #[arg(long)]
        failure_out: PathBuf,

        /// Write to an in-memory table instead of the server
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        connector: ConnectorArgs,
    },

    /// Parse a schema and print the resolved columns
    Schema {
        /// Schema text, e.g. "id|Long|$primary_key,name|String"
        #[arg(short, long)]
        text: String,
    },
}

#[derive(Args, Debug)]
struct ConnectorArgs {
    /// Sink server URL
    #[arg(long, env = "ATTRLOAD_SERVER_URL", default_value = "http://localhost:9191")]
    server_url: String,

    /// Target table
    #[arg(long, env = "ATTRLOAD_TABLE")]
    table: String,

    /// Collection for a newly created table
    #[arg(long, env = "ATTRLOAD_COLLECTION")]
    collection: Option<String>,

    /// Schema used when the table does not exist yet
    #[arg(long, env = "ATTRLOAD_SCHEMA")]
    schema: Option<String>,

    /// Records per batch write
    #[arg(long, env = "ATTRLOAD_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    #[arg(long, env = "ATTRLOAD_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "ATTRLOAD_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Replace rows whose primary key already exists
    #[arg(long, env = "ATTRLOAD_UPDATE_ON_EXISTING_PK")]
    update_on_existing_pk: bool,

    /// Replicate a newly created table
    #[arg(long, env = "ATTRLOAD_REPLICATE_TABLE")]
    replicate_table: bool,

    /// Date format for timestamp columns (strftime or yyyy-MM-dd style)
    #[arg(long, env = "ATTRLOAD_DATE_FORMAT")]
    date_format: Option<String>,

    /// Time zone for timestamp columns, e.g. "America/New_York" or "EST"
    #[arg(long, env = "ATTRLOAD_TIME_ZONE")]
    time_zone: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long, env = "ATTRLOAD_HTTP_TIMEOUT_SECS", default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    http_timeout_secs: u64,
}

impl From<ConnectorArgs> for ConnectorConfig {
    fn from(args: ConnectorArgs) -> Self {
        Self {
            server_url: args.server_url,
            collection_name: args.collection,
            table_name: args.table,
            schema: args.schema,
            batch_size: args.batch_size,
            username: args.username,
            password: args.password,
            update_on_existing_pk: args.update_on_existing_pk,
            replicate_table: args.replicate_table,
            date_format: args.date_format,
            time_zone: args.time_zone,
            http_timeout_secs: args.http_timeout_secs,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Jsonl,
    Csv,
}

impl From<FormatArg> for InputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Jsonl => InputFormat::Jsonl,
            FormatArg::Csv => InputFormat::Csv,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("attrload")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    let _guard = init_logging(&log_config)?;

    match cli.command {
        Command::Run {
            input,
            input_format,
            success_out,
            failure_out,
            dry_run,
            connector,
        } => {
            let config = ConnectorConfig::from(connector);
            let mut source = QueueSource::load(&input, input_format.into())
                .with_context(|| format!("failed to load {}", input.display()))?;

            if dry_run {
                info!("Dry run, writing to an in-memory table");
                run(MemorySink::new(), &config, &mut source, &success_out, &failure_out).await?;
            } else {
                let mut sink = HttpSink::new(&config.server_url, config.http_timeout())?;
                if let Some((username, password)) = config.credentials() {
                    sink = sink.with_credentials(username, password);
                }
                run(sink, &config, &mut source, &success_out, &failure_out).await?;
            }
        },
        Command::Schema { text } => {
            let schema = schema::parse(&text)?;
            info!(
                columns = %serde_json::to_string(schema.columns())?,
                "Parsed schema"
            );
        },
    }

    Ok(())
}

async fn run<S: Sink>(
    sink: S,
    config: &ConnectorConfig,
    source: &mut QueueSource,
    success_out: &Path,
    failure_out: &Path,
) -> Result<()> {
    let connector = Connector::setup(sink, config).await?;

    let (mut succeeded, mut failed) = (0usize, 0usize);
    while !source.is_empty() {
        let result = connector.run_cycle(source).await;
        write_outcome(success_out, failure_out, &result.outcome)?;
        succeeded += result.report.succeeded;
        failed += result.report.failed;
    }

    info!(succeeded, failed, "Load complete");
    Ok(())
}
