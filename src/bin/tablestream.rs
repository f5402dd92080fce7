//! CLI binary for tablestream.
//!
//! `serve` runs the WebSocket server; `extract` pushes a local PDF through
//! the same session pipeline and prints the tables, which is handy for
//! checking what a client would receive.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tablestream::{
    server, AppState, Operation, PdfiumExtractor, ServerConfig, ServerMessage, Session,
    StreamConfig, UploadRequest,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the WebSocket endpoint on the default port
  tablestream serve

  # Serve on a custom address with a bundled pdfium
  tablestream serve --addr 127.0.0.1:9000 --pdfium-lib ./libpdfium.so

  # Extract tables from a local file, headers lowercased
  tablestream extract report.pdf --operation clean_headers

  # Print the raw protocol events as JSON lines
  tablestream extract report.pdf --json

OPERATIONS:
  basic          tables as extracted (after cleanup)
  merge_rows     drop duplicate rows
  clean_headers  trim and lowercase column names
  fill_empty     forward-fill blank cells down each column
  remove_empty   drop empty columns, then empty rows
  transpose      swap rows and columns; first column becomes the header

ENVIRONMENT VARIABLES:
  RUST_LOG                  Override log filter (e.g. tablestream=debug)
  TABLESTREAM_ADDR          Bind address for `serve`
  TABLESTREAM_PDFIUM_LIB    Path to libpdfium
"#;

/// Stream tables extracted from PDFs to WebSocket clients.
#[derive(Parser, Debug)]
#[command(
    name = "tablestream",
    version,
    about = "Stream tables extracted from PDFs to WebSocket clients",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to a libpdfium shared library (default: system library).
    #[arg(long, global = true, env = "TABLESTREAM_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Minimum lines (header included) for a block to count as a table.
    #[arg(long, global = true, env = "TABLESTREAM_MIN_ROWS", default_value_t = 2)]
    min_rows: usize,

    /// Minimum cells per line for a table row.
    #[arg(long, global = true, env = "TABLESTREAM_MIN_COLS", default_value_t = 2)]
    min_cols: usize,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "TABLESTREAM_VERBOSE")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the WebSocket server.
    Serve {
        /// Address to bind.
        #[arg(long, env = "TABLESTREAM_ADDR", default_value = "0.0.0.0:8000")]
        addr: String,

        /// WebSocket route.
        #[arg(long, env = "TABLESTREAM_WS_PATH", default_value = "/ws/pdf/")]
        ws_path: String,

        /// Pause after each table event, in milliseconds.
        #[arg(long, env = "TABLESTREAM_TABLE_PAUSE_MS", default_value_t = 100)]
        table_pause_ms: u64,

        /// Omit diagnostic tracebacks from error events.
        #[arg(long, env = "TABLESTREAM_NO_TRACEBACK")]
        no_traceback: bool,
    },

    /// Extract tables from a local PDF and print them.
    Extract {
        /// PDF file to process.
        input: PathBuf,

        /// Table operation to apply.
        #[arg(short, long, default_value = "basic")]
        operation: String,

        /// Print protocol events as JSON lines instead of CSV.
        #[arg(long)]
        json: bool,

        /// Disable progress bar.
        #[arg(long)]
        no_progress: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Serve {
            addr,
            ws_path,
            table_pause_ms,
            no_traceback,
        } => {
            let config = base_config(&cli)
                .table_pause_ms(*table_pause_ms)
                .include_traceback(!no_traceback)
                .build()
                .context("Invalid configuration")?;
            let extractor = Arc::new(PdfiumExtractor::new(&config));
            let server_config = ServerConfig {
                bind_addr: addr.clone(),
                ws_path: ws_path.clone(),
            };
            server::serve(&server_config, AppState::new(config, extractor))
                .await
                .context("Server failed")?;
        }
        Command::Extract {
            input,
            operation,
            json,
            no_progress,
        } => {
            // Fail fast on a typo instead of after reading the file.
            operation
                .parse::<Operation>()
                .context("Invalid --operation")?;
            let config = base_config(&cli)
                .table_pause_ms(0)
                .build()
                .context("Invalid configuration")?;
            extract_file(config, input, operation, *json, !*no_progress && !*json).await?;
        }
    }

    Ok(())
}

fn base_config(cli: &Cli) -> tablestream::StreamConfigBuilder {
    let mut builder = StreamConfig::builder()
        .min_table_rows(cli.min_rows)
        .min_table_cols(cli.min_cols);
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(path);
    }
    builder
}

/// Run one upload through a local session and print what a client would see.
async fn extract_file(
    config: StreamConfig,
    input: &Path,
    operation: &str,
    json: bool,
    show_progress: bool,
) -> Result<()> {
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());

    let request = UploadRequest {
        filename,
        content: format!("data:application/pdf;base64,{}", STANDARD.encode(&bytes)),
        operation: operation.to_string(),
    };
    let mut frame = serde_json::to_value(&request).context("Failed to encode request")?;
    frame["type"] = serde_json::Value::from("upload");

    let (tx, rx) = mpsc::channel(config.outbound_buffer);
    let extractor = Arc::new(PdfiumExtractor::new(&config));
    let mut session = Session::new(0, Arc::new(config), extractor, tx);

    let bar = show_progress.then(progress_bar);
    let driver = async move {
        session.connect().await;
        session.handle_message(&frame.to_string()).await;
        session.join().await;
        session.disconnect();
    };
    let (_, failure) = tokio::join!(driver, print_events(rx, json, bar));

    match failure {
        Some(message) => anyhow::bail!(message),
        None => Ok(()),
    }
}

/// Print events until the session closes. Returns the error message, if any.
async fn print_events(
    mut rx: mpsc::Receiver<ServerMessage>,
    json: bool,
    bar: Option<ProgressBar>,
) -> Option<String> {
    let stdout = io::stdout();
    let mut failure = None;

    while let Some(msg) = rx.recv().await {
        if json {
            match msg.to_json() {
                Ok(line) => {
                    let _ = writeln!(stdout.lock(), "{line}");
                }
                Err(e) => eprintln!("Failed to encode event: {e}"),
            }
        }

        match msg {
            ServerMessage::Progress(p) => {
                if let Some(ref bar) = bar {
                    bar.set_position(u64::from(p.percentage));
                    bar.set_message(p.message);
                }
            }
            ServerMessage::Table(t) => {
                if !json {
                    let header = format!(
                        "# Table {}/{} ({} rows{})",
                        t.table_number,
                        t.total_tables,
                        t.row_count,
                        t.page_number
                            .map(|p| format!(", page {p}"))
                            .unwrap_or_default()
                    );
                    match &bar {
                        Some(bar) => bar.suspend(|| print_table(&header, &t.content)),
                        None => print_table(&header, &t.content),
                    }
                }
            }
            ServerMessage::Error(e) => {
                if let Some(ref tb) = e.traceback {
                    tracing::debug!("traceback: {}", tb);
                }
                failure = Some(e.message);
            }
        }
    }

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    failure
}

fn print_table(header: &str, csv: &str) {
    let mut out = io::stdout().lock();
    let _ = writeln!(out, "{header}");
    let _ = write!(out, "{csv}");
    let _ = writeln!(out);
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}
