//! radpipe CLI
//!
//! Usage:
//!   radpipe convert <folder>                      Convert DICOM files to PNG
//!   radpipe analyze <folder>                      Analyze every PNG in a folder
//!   radpipe analyze-manifest <manifest> <folder>  Analyze the images named by a manifest
//!   radpipe describe <image>                      Print the report for one image

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use radpipe::analyze::runner::{
    DEFAULT_FOLDER_WORKERS, DEFAULT_ID_COLUMN, DEFAULT_MANIFEST_OUTPUT, DEFAULT_MANIFEST_WORKERS,
};
use radpipe::analyze::{AnalysisJobRunner, ImageAnalyzer, VisionClient};
use radpipe::config::VisionConfig;
use radpipe::convert::batch::DEFAULT_CONVERT_WORKERS;
use radpipe::convert::{convert_folder, BatchReport};

#[derive(Parser)]
#[command(name = "radpipe", version, about = "Batch DICOM conversion and X-ray analysis")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert all DICOM files in a folder to 8-bit grayscale PNG
    Convert {
        /// Folder containing DICOM files
        folder: PathBuf,
        /// Maximum number of concurrent conversions
        #[arg(long, default_value_t = DEFAULT_CONVERT_WORKERS)]
        workers: usize,
    },
    /// Analyze every PNG image in a folder
    Analyze {
        /// Folder containing PNG images
        folder: PathBuf,
        /// Output CSV path (default: timestamped name in the working directory)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Maximum number of concurrent analysis requests
        #[arg(long, default_value_t = DEFAULT_FOLDER_WORKERS)]
        workers: usize,
    },
    /// Analyze the images listed in a manifest CSV, resumably
    AnalyzeManifest {
        /// Manifest CSV with one row per case
        manifest: PathBuf,
        /// Folder containing the PNG images
        folder: PathBuf,
        /// Output CSV path, rewritten after every completed task
        #[arg(long, default_value = DEFAULT_MANIFEST_OUTPUT)]
        output: PathBuf,
        /// Manifest column holding the image identifier
        #[arg(long, default_value = DEFAULT_ID_COLUMN)]
        id_column: String,
        /// Maximum number of concurrent analysis requests
        #[arg(long, default_value_t = DEFAULT_MANIFEST_WORKERS)]
        workers: usize,
    },
    /// Analyze a single image and print the report
    Describe {
        /// Path to a PNG image
        image: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; credentials may come from the environment directly
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,radpipe=info")),
        )
        .init();

    match Cli::parse().command {
        Command::Convert { folder, workers } => {
            let report = convert_folder(&folder, workers).await?;
            print_conversion_report(&report);
        }
        Command::Analyze {
            folder,
            output,
            workers,
        } => {
            let runner = AnalysisJobRunner::new(vision_analyzer()?, workers);
            let (output, _, summary) = runner.process_folder(&folder, output).await?;
            println!("\nProcessing complete!");
            println!("  successfully analyzed: {}", summary.analyzed);
            println!("  failed to analyze:     {}", summary.failed);
            println!("\nResults saved to {}", output.display());
        }
        Command::AnalyzeManifest {
            manifest,
            folder,
            output,
            id_column,
            workers,
        } => {
            let runner = AnalysisJobRunner::new(vision_analyzer()?, workers);
            let (table, summary) = runner
                .process_from_manifest(&manifest, &folder, &output, &id_column)
                .await?;
            println!("\nProcessing complete!");
            println!("  total rows in manifest:    {}", table.len());
            println!("  successfully analyzed:     {}", summary.analyzed);
            println!("  failed during analysis:    {}", summary.failed);
            println!("  skipped (already done):    {}", summary.skipped);
            println!("  images not found in folder: {}", summary.not_found);
            println!("\nResults saved to {}", output.display());
        }
        Command::Describe { image } => {
            let analyzer = vision_analyzer()?;
            let bytes = std::fs::read(&image)
                .with_context(|| format!("failed to read {}", image.display()))?;
            let report = analyzer.analyze(&bytes).await?;
            println!("{report}");
        }
    }

    Ok(())
}

fn vision_analyzer() -> Result<Arc<dyn ImageAnalyzer>> {
    let config = VisionConfig::from_env().context("vision API is not configured")?;
    let client = VisionClient::new(config).context("failed to build vision client")?;
    Ok(Arc::new(client))
}

fn print_conversion_report(report: &BatchReport) {
    let succeeded: Vec<_> = report.succeeded().collect();
    let failed: Vec<_> = report.failed().collect();

    println!("\nConversion summary:");
    println!("  total files:            {}", report.total());
    println!("  successful conversions: {}", succeeded.len());
    println!("  failed conversions:     {}", failed.len());

    if !succeeded.is_empty() {
        println!("\nConverted files:");
        for outcome in &succeeded {
            println!("  {}", outcome.identifier);
        }
    }

    if !failed.is_empty() {
        println!("\nFailed conversions:");
        for outcome in &failed {
            println!(
                "  {}: {}",
                outcome.identifier,
                outcome.detail().unwrap_or("unknown error")
            );
        }
    }

    if !succeeded.is_empty() {
        println!("\nConverted files saved to {}", report.output_dir.display());
        println!("PNG files in output directory: {}", report.files_on_disk());
    }
}
