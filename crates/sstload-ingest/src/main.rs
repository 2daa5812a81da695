//! csv2sstable - bulk conversion of delimited text into table rows

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use sstload_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use sstload_ingest::cli::EXIT_ROWS_FAILED;
use sstload_ingest::trace::{TraceSink, WriteTrace};
use sstload_ingest::{Cli, IngestReport};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .output(LogOutput::Console)
        .log_file_prefix("csv2sstable")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The guard must outlive the load so buffered file logs are flushed
    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {e:#}");
            None
        },
    };

    match run(&cli) {
        Ok(report) if report.is_clean() => ExitCode::SUCCESS,
        Ok(report) => {
            warn!(failed = report.rows_failed, "Some lines could not be converted");
            for failure in &report.failures {
                warn!(line = failure.line, error = %failure.error, "Failed line");
            }
            ExitCode::from(EXIT_ROWS_FAILED)
        },
        Err(e) => {
            error!(error = %e, "Load failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

fn run(cli: &Cli) -> anyhow::Result<IngestReport> {
    let config = cli.ingest_config()?;
    let job = cli.job();

    let trace: Option<Box<dyn TraceSink>> = if cli.debug {
        Some(Box::new(WriteTrace::new(std::io::stdout())))
    } else {
        None
    };
    let progress = (!cli.debug).then(|| spinner("Loading rows"));

    let report = job.run(&config, trace, progress)?;

    info!(
        lines = report.lines_read,
        written = report.rows_written,
        files = ?report.writer.files,
        "Ingestion complete"
    );
    if report.rows_rejected > 0 {
        info!(rejected = report.rows_rejected, "Rows rejected by the writer");
    }
    Ok(report)
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} lines") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
