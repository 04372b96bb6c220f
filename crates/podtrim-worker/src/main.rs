//! Podcast pipeline command-line runner.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use podtrim_worker::{Catalog, FeedConfig, FeedDownloader, PipelineJob, PipelineRunner, WorkerConfig};

#[derive(Debug, Parser)]
#[command(name = "podtrim-worker", version, about = "Remove advertisements from downloaded podcast episodes")]
struct Cli {
    /// Library root holding `<show>/<episode>.mp3`
    #[arg(long, env = "PODTRIM_LIBRARY_DIR")]
    library_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Transcribe an episode
    Transcribe { filename: String },
    /// Classify advertisements in an episode's transcript
    Classify { filename: String },
    /// Transcribe, then classify
    Analyze { filename: String },
    /// Cut classified advertisements out of an episode
    Splice { filename: String },
    /// Re-encode an audio artifact to fit the size budget
    Compress { filename: String },
    /// Run every stage
    Run { filename: String },
    /// Download the newest episodes of an RSS feed
    Download {
        rss_url: String,
        /// Number of newest episodes; all when omitted
        #[arg(short = 'n', long)]
        num_episodes: Option<usize>,
    },
    /// List artifacts in the library
    List,
    /// Show which artifacts exist for an episode
    Status { filename: String },
}

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive(
        "podtrim=info"
            .parse()
            .expect("static log directive is valid"),
    );

    // Logs go to stderr so stdout carries only results
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = WorkerConfig::from_env().context("invalid worker configuration")?;
    if let Some(dir) = cli.library_dir {
        config.library_dir = dir;
    }
    let catalog = Catalog::new(&config.library_dir);

    let job = match cli.command {
        Command::List => {
            for name in catalog.list().await? {
                println!("{name}");
            }
            return Ok(());
        }
        Command::Status { filename } => {
            let status = catalog.status(&filename, false).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            return Ok(());
        }
        Command::Download { rss_url, num_episodes } => {
            let downloader = FeedDownloader::new(&config.library_dir, FeedConfig::from_env())?;
            let report = downloader.download(&rss_url, num_episodes).await?;
            for path in &report.downloaded {
                println!("downloaded {}", catalog.relative_name(path));
            }
            for path in &report.skipped {
                println!("exists     {}", catalog.relative_name(path));
            }
            for (title, reason) in &report.failed {
                println!("failed     {title}: {reason}");
            }
            return Ok(());
        }
        Command::Transcribe { filename } => PipelineJob::Transcribe {
            source: catalog.resolve_source(&filename)?,
        },
        Command::Classify { filename } => PipelineJob::Classify {
            source: catalog.resolve_source(&filename)?,
        },
        Command::Analyze { filename } => PipelineJob::Analyze {
            source: catalog.resolve_source(&filename)?,
        },
        Command::Splice { filename } => PipelineJob::Splice {
            source: catalog.resolve_source(&filename)?,
        },
        Command::Run { filename } => PipelineJob::Full {
            source: catalog.resolve_source(&filename)?,
        },
        Command::Compress { filename } => PipelineJob::Compress {
            source: catalog.resolve_source(&filename)?,
            audio: catalog.resolve_audio(&filename).await?,
        },
    };

    info!(job = job.name(), library = %config.library_dir.display(), "Starting run");
    let runner = PipelineRunner::from_config(&config)?;
    let report = runner.run(job).await?;
    for outcome in &report.outcomes {
        println!("{outcome}");
    }
    Ok(())
}
