use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facecheck_core::{prepare_image, MatchOrchestrator, ReferenceSet, RunOutcome, Upload};
use facecheck_rekognition::RekognitionClient;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod output;

use config::{credentials_from, Config};

#[derive(Parser)]
#[command(name = "facecheck", about = "Check a face image against a folder of known faces")]
struct Cli {
    /// Configuration file (default: ./facecheck.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare an image against every face in the reference folder
    Check {
        /// PNG or JPEG image to identify
        image: PathBuf,
        /// Reference folder of known faces
        #[arg(long)]
        faces: Option<PathBuf>,
        /// Similarity (0-100) a face must exceed to count as a match
        #[arg(long)]
        threshold: Option<f32>,
        /// Directory the upload is staged in
        #[arg(long)]
        work_dir: Option<PathBuf>,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Normalize and size-limit an image without comparing it
    Prepare {
        image: PathBuf,
    },
    /// List the reference images a check would compare against
    List {
        /// Reference folder of known faces
        #[arg(long)]
        faces: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Check {
            image,
            faces,
            threshold,
            work_dir,
            json,
        } => {
            if let Some(faces) = faces {
                config.faces_dir = faces;
            }
            if let Some(threshold) = threshold {
                config.similarity_threshold = threshold;
            }
            if let Some(work_dir) = work_dir {
                config.work_dir = work_dir;
            }
            config.validate()?;
            check(&config, image, json).await
        }
        Commands::Prepare { image } => {
            let asset = tokio::task::spawn_blocking({
                let limits = config.size_limits();
                move || prepare_image(&image, &limits)
            })
            .await
            .context("preparation worker panicked")??;
            println!(
                "{} ({:?}, {}x{})",
                asset.path.display(),
                asset.format,
                asset.width,
                asset.height
            );
            Ok(())
        }
        Commands::List { faces } => {
            let dir = faces.unwrap_or(config.faces_dir);
            if unavailable_reference_set(&dir).is_some() {
                println!("{}", output::directory_missing(&dir));
                return Ok(());
            }
            for entry in ReferenceSet::open(&dir)?.entries()? {
                println!("{}", entry.name);
            }
            Ok(())
        }
    }
}

async fn check(config: &Config, image: PathBuf, json: bool) -> Result<()> {
    let upload = Upload::from_path(&image)?;
    upload.validate()?;
    if !json {
        println!("{}", output::upload_details(&upload));
    }

    std::fs::create_dir_all(&config.work_dir)
        .with_context(|| format!("creating work dir {}", config.work_dir.display()))?;
    let staged = upload.stage(&config.work_dir)?;

    // Reference set first; credentials are only needed once there is something to compare.
    if let Some(outcome) = unavailable_reference_set(&config.faces_dir) {
        return print_outcome(&upload, &outcome, json);
    }

    let credentials = credentials_from(|key| std::env::var(key).ok())?;
    let client = RekognitionClient::new(config.rekognition_config(), credentials)?;
    let orchestrator = MatchOrchestrator::new(client, config.match_config());

    let outcome = orchestrator
        .run(&staged, |event| {
            if json {
                return;
            }
            if let Some(line) = output::event_line(event) {
                println!("{line}");
            }
        })
        .await?;

    print_outcome(&upload, &outcome, json)
}

/// `DirectoryMissing` when the reference set at `dir` cannot be listed.
fn unavailable_reference_set(dir: &Path) -> Option<RunOutcome> {
    let e = ReferenceSet::open(dir).and_then(|set| set.entries()).err()?;
    tracing::warn!(dir = %dir.display(), error = %e, "reference set unavailable");
    Some(RunOutcome::DirectoryMissing {
        dir: dir.to_path_buf(),
        reason: e.to_string(),
    })
}

fn print_outcome(upload: &Upload, outcome: &RunOutcome, json: bool) -> Result<()> {
    if json {
        let report = output::JsonReport {
            upload,
            result: outcome,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Some(line) = output::outcome_line(outcome) {
        println!("{line}");
    }

    Ok(())
}
