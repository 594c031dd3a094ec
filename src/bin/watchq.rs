//! watchq CLI: run the folder-watching service or generate sample input.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use watchq::config::Config;
use watchq::engine::Service;
use watchq::generator::{DEFAULT_MAX_CHARS, DEFAULT_MIN_CHARS, SampleGenerator};
use watchq::telemetry::{TelemetryConfig, init_telemetry};

#[derive(Parser)]
#[command(name = "watchq", about = "Folder-watching text file processor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the input directory and write character counts to the output directory
    Serve {
        /// Input directory (must exist)
        input: Option<PathBuf>,
        /// Output directory (created on start)
        output: Option<PathBuf>,
        /// Maximum concurrent workers
        #[arg(long)]
        max_workers: Option<usize>,
        /// TOML config file; environment variables are used when absent
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Drop sample text files into a directory
    Generate {
        /// Target directory (created if missing)
        #[arg(default_value = "input")]
        dir: PathBuf,
        #[arg(long, default_value_t = DEFAULT_MIN_CHARS)]
        min_chars: usize,
        #[arg(long, default_value_t = DEFAULT_MAX_CHARS)]
        max_chars: usize,
        /// Pause between files
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
        /// Stop after this many files
        #[arg(long)]
        count: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            input,
            output,
            max_workers,
            config,
        } => {
            let mut config = match config {
                Some(path) => Config::from_file(&path)?,
                None => Config::from_env()?,
            };
            if let Some(input) = input {
                config.input_dir = input;
            }
            if let Some(output) = output {
                config.output_dir = output;
            }
            if let Some(n) = max_workers {
                config.max_workers = n;
            }
            cmd_serve(config).await
        }
        Command::Generate {
            dir,
            min_chars,
            max_chars,
            interval_ms,
            count,
        } => cmd_generate(dir, min_chars, max_chars, interval_ms, count).await,
    }
}

async fn cmd_serve(config: Config) -> anyhow::Result<()> {
    let _guard = init_telemetry(TelemetryConfig::from_config(&config))?;

    let mut service = Service::new(&config)?;
    println!("File Processor Service");
    println!(
        "will process files in {}",
        absolute(&config.input_dir).display()
    );
    println!(
        "and write results in {}",
        absolute(&config.output_dir).display()
    );

    service.start().await?;
    println!("STATUS: STARTED (Ctrl-C to stop)");

    tokio::signal::ctrl_c().await?;

    println!("STATUS: TERMINATING...");
    service.stop().await;
    println!("STATUS: STOPPED");
    Ok(())
}

async fn cmd_generate(
    dir: PathBuf,
    min_chars: usize,
    max_chars: usize,
    interval_ms: u64,
    count: Option<u64>,
) -> anyhow::Result<()> {
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: None,
        service_name: "watchq-generate".to_string(),
        default_filter: "info".to_string(),
    })?;

    let mut generator = SampleGenerator::new(dir)
        .chars(min_chars, max_chars)?
        .interval(Duration::from_millis(interval_ms));
    println!(
        "will generate text files ({min_chars} - {max_chars} chars) in {}",
        absolute(generator.dir()).display()
    );

    let shutdown = Arc::new(Notify::new());
    let stop = Arc::clone(&shutdown);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        stop.notify_one();
    });

    let written = generator.run(shutdown, count).await?;
    println!("Stopped after {written} file(s)");
    Ok(())
}

fn absolute(path: &std::path::Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
