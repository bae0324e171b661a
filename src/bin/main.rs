//! Table Export CLI

use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::process::ExitCode;
use std::time::Duration;
use table_export::checkpoint::CheckpointStore;
use table_export::export::ProgressCallback;
use table_export::{ExportConfig, ExportRunner, RunReport, TableStatus, run_export};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "table-export")]
#[command(
    author,
    version,
    about = "Incrementally export PostgreSQL tables to CSV in object storage"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: String,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true, env = "LOG_FORMAT")]
    log_format: LogFormat,

    /// JSON output
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Only these tables (comma separated), in configured order
    #[arg(long, global = true, value_delimiter = ',')]
    tables: Vec<String>,

    /// Exit 0 even if some tables failed
    #[arg(long, global = true)]
    allow_partial: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the export (default)
    Run,
    /// Test database and storage connectivity
    Test,
    /// Show checkpoints and pending rows per table
    Status,
    /// Delete checkpoints so tables are exported from the beginning
    Reset {
        /// Table to reset (repeatable)
        #[arg(short, long)]
        table: Vec<String>,
        /// Reset every configured table
        #[arg(long, conflicts_with = "table")]
        all: bool,
    },
    /// Generate sample config
    Init {
        #[arg(short, long, default_value = "table-export.toml")]
        output: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // A missing .env file is normal in production.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format, cli.quiet, cli.json);
    let quiet = cli.quiet;

    match run(cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            if quiet {
                eprintln!("Error: {}", e);
            } else {
                error!("Error: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    // Handle init command first - it doesn't need config
    if let Some(Commands::Init { output }) = &cli.command {
        return run_init(output);
    }

    let config = load_config(cli.config.as_deref(), &cli.tables)?;

    match &cli.command {
        None | Some(Commands::Run) => run_export_cmd(config, &cli).await,
        Some(Commands::Test) => run_test(config, cli.json).await,
        Some(Commands::Status) => run_status(config, cli.json).await,
        Some(Commands::Reset { table, all }) => run_reset(config, table, *all, cli.json),
        Some(Commands::Init { .. }) => unreachable!(), // Handled above
    }
}

fn load_config(
    path: Option<&str>,
    tables: &[String],
) -> Result<ExportConfig, Box<dyn std::error::Error>> {
    let mut config = if let Some(p) = path {
        info!("Loading config from: {}", p);
        ExportConfig::from_file(p)?
    } else if let Some(default) = ["table-export.toml", ".table-export.toml"]
        .into_iter()
        .find(|p| std::path::Path::new(p).exists())
    {
        info!("Loading config from: {}", default);
        ExportConfig::from_file(default)?
    } else {
        info!("Loading config from environment");
        ExportConfig::from_env()?
    };

    if !tables.is_empty() {
        config.restrict_to(tables)?;
    }
    Ok(config)
}

async fn run_export_cmd(config: ExportConfig, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let interactive = !cli.quiet && !cli.json;

    if interactive {
        println!("Table Export v{}", table_export::VERSION);
        println!(
            "Destination: {}://{}\n",
            config.storage.provider.scheme(),
            config.storage.bucket
        );
    }

    let spinner = interactive.then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    });

    let progress: Option<ProgressCallback> = spinner.clone().map(|pb| {
        Box::new(move |p: table_export::ExportProgress| {
            pb.set_message(format!("{}: {}", p.table, p.phase));
        }) as ProgressCallback
    });

    let result = run_export(config, progress).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let report = result?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !cli.quiet {
        print_report(&report);
    }

    match report.error {
        Some(summary) if !cli.allow_partial => Err(summary.into()),
        _ => Ok(()),
    }
}

fn print_report(report: &RunReport) {
    if report.success {
        println!("{} Export completed successfully", style("✓").green());
    } else {
        println!("{} Export completed with errors", style("✗").red());
    }
    println!("\nDuration: {}ms", report.duration_ms);
    println!(
        "Tables: {} ({} exported, {} skipped, {} failed)",
        report.metrics.tables_total(),
        report.metrics.tables_exported,
        report.metrics.tables_skipped,
        report.metrics.tables_failed
    );
    println!(
        "Total rows: {} ({:.0} rows/s)\n",
        report.total_rows(),
        report.metrics.rows_per_second(report.duration_ms)
    );

    for tr in &report.tables {
        match tr.status {
            TableStatus::Exported => println!(
                "  {} {}: {} rows → {} ({}ms)",
                style("✓").green(),
                tr.table,
                tr.rows,
                tr.location.as_deref().unwrap_or("?"),
                tr.duration_ms
            ),
            TableStatus::Skipped => println!(
                "  {} {}: no new rows",
                style("–").dim(),
                tr.table
            ),
            TableStatus::Disabled => println!("  {} {}: disabled", style("–").dim(), tr.table),
            TableStatus::Failed => {
                println!("  {} {}", style("✗").red(), tr.table);
                if let Some(ref e) = tr.error {
                    println!("      Error: {}", e);
                }
            }
        }
    }
}

async fn run_test(config: ExportConfig, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !json {
        println!("Testing connectivity...\n");
    }

    let runner = ExportRunner::connect(&config).await?;
    let result = runner.test_connectivity().await;
    runner.close().await;
    result?;

    if json {
        println!(r#"{{"database":"ok","storage":"ok"}}"#);
    } else {
        println!("\n{} All connectivity tests passed!", style("✓").green());
    }
    Ok(())
}

async fn run_status(config: ExportConfig, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let runner = ExportRunner::connect(&config).await?;
    let pending = runner.pending().await;
    runner.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
    } else {
        println!("Pending Rows\n");
        for p in &pending {
            let checkpoint = p.checkpoint.as_deref().unwrap_or("never exported");
            match (&p.pending_rows, &p.error) {
                (Some(count), _) => {
                    println!("  {}: {} rows (checkpoint {})", p.table, count, checkpoint)
                }
                (None, Some(e)) => println!("  {}: {} {}", p.table, style("error").red(), e),
                (None, None) => println!("  {}: unknown", p.table),
            }
        }
        let total: i64 = pending.iter().filter_map(|p| p.pending_rows).sum();
        println!("\nTotal: {} pending", total);
    }
    Ok(())
}

fn run_reset(
    mut config: ExportConfig,
    tables: &[String],
    all: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !all {
        if tables.is_empty() {
            return Err("Name a table with --table or pass --all".into());
        }
        config.restrict_to(tables)?;
    }
    let names: Vec<String> = config.tables.iter().map(|t| t.name.clone()).collect();

    let store = CheckpointStore::open(&config.export.checkpoint_dir)?;
    let _lock = if config.export.run_lock {
        Some(store.lock()?)
    } else {
        None
    };

    let mut results = std::collections::BTreeMap::new();
    for name in &names {
        let removed = store.reset(name)?;
        results.insert(name.clone(), removed);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for (name, removed) in &results {
            if *removed {
                println!("  {} {}: checkpoint removed", style("✓").green(), name);
            } else {
                println!("  {} {}: no checkpoint", style("–").dim(), name);
            }
        }
    }
    Ok(())
}

fn run_init(output: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = r#"# Table Export Configuration

[database]
host = "localhost"
port = 5432
user = "exporter"
password = ""
database = "shop"
ssl_mode = "prefer"

[storage]
provider = "gcs"
bucket = "shop-exports"
# prefix = "nightly"
# service_account_path = "/etc/table-export/service-account.json"

[export]
timestamp_column = "updated_at"
checkpoint_dir = "timestamps"
export_dir = "exports"
run_lock = true
# artifact_retention = "7d"

[[tables]]
name = "users"

[[tables]]
name = "orders"

[[tables]]
name = "order_details"
enabled = true
"#;

    std::fs::write(output, config)?;
    println!("{} Created: {}", style("✓").green(), output);
    println!("\nEdit the file or use environment variables:");
    println!("  DB_HOST, DB_USER, DB_PASSWORD, DB_NAME, GCS_BUCKET_NAME");
    Ok(())
}

fn init_logging(level: &str, format: LogFormat, quiet: bool, json_output: bool) {
    // Quiet keeps warnings and per-table errors on stderr.
    if quiet {
        fmt()
            .with_env_filter(EnvFilter::new("warn"))
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // When JSON output is enabled, send logs to stderr to avoid mixing with JSON on stdout
    match (format, json_output) {
        (LogFormat::Json, true) => fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        (LogFormat::Json, false) => fmt().json().with_env_filter(filter).init(),
        (LogFormat::Text, true) => fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
        (LogFormat::Text, false) => fmt().with_env_filter(filter).with_target(false).init(),
    }
}
