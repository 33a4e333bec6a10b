//! Vigil - Web Security Scanner CLI

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing_subscriber::EnvFilter;
use url::Url;

use vigil::config::{self, CliOverrides};
use vigil::engine::ScanEngine;
use vigil::error::Result;
use vigil::models::{ScanConfig, ScanResult, Severity};

/// Vigil - Modular Web Security Scanner
#[derive(Parser)]
#[command(name = "vigil", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scan against a target
    Scan {
        /// Target URL to scan
        #[arg(short, long)]
        target: String,

        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file for the JSON scan result (default: vigil_{host}.json)
        #[arg(short, long)]
        output: Option<String>,

        /// Maximum crawl depth
        #[arg(long)]
        depth: Option<u32>,

        /// Maximum pages to crawl
        #[arg(long)]
        max_pages: Option<usize>,

        /// Concurrent request limit
        #[arg(long)]
        concurrency: Option<usize>,

        /// Delay before each fetch, in milliseconds
        #[arg(long)]
        delay: Option<u64>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Crawl beyond the target host
        #[arg(long)]
        follow_external: bool,

        /// Run test modules concurrently
        #[arg(long)]
        parallel: bool,

        /// HTTP/HTTPS proxy URL
        #[arg(long)]
        proxy: Option<String>,

        /// Custom headers (format: "Key: Value")
        #[arg(short = 'H', long)]
        header: Option<Vec<String>>,

        /// Disable a module by name (repeatable)
        #[arg(long = "disable")]
        disable: Option<Vec<String>>,

        /// Disable the response cache entirely
        #[arg(long)]
        no_cache: bool,

        /// Shared cache endpoint (redis://...)
        #[arg(long)]
        redis_url: Option<String>,

        /// Directory for the disk cache tier
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List available test modules
    Modules,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {e}", "error:".red().bold());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Modules => {
            let engine = ScanEngine::with_builtins();
            let mut builder = Builder::default();
            builder.push_record(["Module", "Description"]);
            for (name, description) in engine.registry().list() {
                builder.push_record([name, description]);
            }
            let mut table = builder.build();
            table.with(Style::rounded());
            println!("{table}");
            Ok(())
        }
        Commands::Scan {
            target,
            config: config_path,
            output,
            depth,
            max_pages,
            concurrency,
            delay,
            timeout,
            follow_external,
            parallel,
            proxy,
            header,
            disable,
            no_cache,
            redis_url,
            cache_dir,
            verbose,
        } => {
            init_tracing(verbose);

            let mut config = match config_path {
                Some(path) => config::load_config(&path)?,
                None => ScanConfig::default(),
            };
            config::merge_cli_args(
                &mut config,
                CliOverrides {
                    target: Some(target),
                    timeout,
                    max_depth: depth,
                    max_pages,
                    concurrency,
                    crawl_delay_ms: delay,
                    follow_external,
                    parallel_modules: parallel,
                    proxy,
                    headers: header,
                    disable_modules: disable,
                    no_cache,
                    redis_url,
                    cache_dir,
                },
            );

            let engine = ScanEngine::with_builtins();

            // Ctrl-C stops spawning new work; running fetches finish
            let cancel = engine.cancel_flag();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("\n{}", "Cancelling scan...".yellow());
                    cancel.store(true, Ordering::Relaxed);
                }
            });

            println!(
                "{} scanning {}",
                "vigil".cyan().bold(),
                config.target.bold()
            );
            let result = engine.run(&config).await?;
            print_summary(&result);

            let path = output
                .unwrap_or_else(|| output_name_from_target(&result.target));
            std::fs::write(&path, serde_json::to_vec_pretty(&result)?)?;
            println!("Results written to {}", path.bold());
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "vigil=debug" } else { "vigil=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn output_name_from_target(target: &str) -> String {
    if let Ok(url) = Url::parse(target) {
        let host = url.host_str().unwrap_or("unknown");
        let sanitized: String = host
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect();
        format!("vigil_{sanitized}.json")
    } else {
        "vigil_scan.json".to_string()
    }
}

fn print_summary(result: &ScanResult) {
    println!("\n{}", "  Scan Summary".bold());

    let mut builder = Builder::default();
    builder.push_record(["Severity", "Count"]);
    for severity in &Severity::ALL {
        builder.push_record([
            severity.to_string(),
            result.count_by_severity(severity).to_string(),
        ]);
    }
    builder.push_record([
        "Total".to_string(),
        result.summary.total_findings.to_string(),
    ]);

    let mut table = builder.build();
    table.with(Style::rounded());
    println!("{table}");

    println!(
        "  {} pages, {} API endpoints, {} requests in {}ms",
        result.summary.urls_crawled,
        result.summary.api_endpoints,
        result.summary.total_requests,
        result.summary.duration_ms
    );

    for module in &result.module_results {
        let status = module.status.to_string();
        let status = match module.status {
            vigil::models::TestStatus::Error => status.red().to_string(),
            vigil::models::TestStatus::Failed => status.yellow().to_string(),
            _ => status.green().to_string(),
        };
        println!(
            "  {:<12} {} ({} findings)",
            module.module,
            status,
            module.summary.total()
        );
    }
}
