//! Folder-level conversion orchestration
//!
//! Validation runs sequentially (I/O-light, and ordered progress feedback
//! matters more than throughput there); conversion fans out over the
//! bounded pool. External decode/encode mixes CPU and I/O, so the pool size
//! caps concurrent work instead of spawning per-file without bound.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

use super::source::is_valid_source;
use super::worker::{self, convert_file, ConversionOutcome};
use crate::pool;

/// Default size of the conversion worker pool.
pub const DEFAULT_CONVERT_WORKERS: usize = 5;

/// Name of the output subdirectory created under the input folder.
pub const OUTPUT_SUBDIR: &str = "png";

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("{0} is not a valid directory")]
    NotADirectory(PathBuf),
    #[error("failed to read folder {path}: {detail}")]
    ReadFolder { path: PathBuf, detail: String },
    #[error("failed to create output directory {path}: {detail}")]
    CreateOutputDir { path: PathBuf, detail: String },
}

/// Aggregated result of one folder conversion run.
#[derive(Debug)]
pub struct BatchReport {
    pub output_dir: PathBuf,
    /// One outcome per *validated* file; invalid candidates are absent
    /// entirely rather than reported as errors.
    pub outcomes: Vec<ConversionOutcome>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &ConversionOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ConversionOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Number of PNG files actually present in the output directory.
    pub fn files_on_disk(&self) -> usize {
        std::fs::read_dir(&self.output_dir)
            .map(|entries| {
                entries
                    .flatten()
                    .filter(|e| e.path().extension().map(|x| x == "png").unwrap_or(false))
                    .count()
            })
            .unwrap_or(0)
    }
}

/// Convert every valid DICOM file in `folder` to `folder/png/<stem>.png`.
///
/// Completion order across workers is not deterministic and the report does
/// not depend on it.
pub async fn convert_folder(folder: &Path, max_workers: usize) -> Result<BatchReport, BatchError> {
    if !folder.is_dir() {
        return Err(BatchError::NotADirectory(folder.to_path_buf()));
    }

    let output_dir = folder.join(OUTPUT_SUBDIR);
    std::fs::create_dir_all(&output_dir).map_err(|e| BatchError::CreateOutputDir {
        path: output_dir.clone(),
        detail: e.to_string(),
    })?;

    let candidates = list_files(folder)?;

    tracing::info!("checking {} candidate files", candidates.len());
    let pb = phase_bar(candidates.len() as u64, "validating");
    let mut sources = Vec::new();
    for path in candidates {
        if is_valid_source(&path) {
            sources.push(path);
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if sources.is_empty() {
        tracing::warn!("no valid DICOM files found in {}", folder.display());
        return Ok(BatchReport {
            output_dir,
            outcomes: Vec::new(),
        });
    }

    tracing::info!(
        "found {} valid DICOM files in {}",
        sources.len(),
        folder.display()
    );

    let pb = phase_bar(sources.len() as u64, "converting");
    let results = pool::map_bounded_with(
        sources,
        max_workers.max(1),
        |_, path: PathBuf| {
            let output_dir = output_dir.clone();
            async move {
                let identifier = worker::identifier_for(&path);
                match tokio::task::spawn_blocking(move || convert_file(&path, &output_dir)).await {
                    Ok(outcome) => outcome,
                    Err(e) => ConversionOutcome::error(
                        identifier,
                        format!("conversion task panicked: {e}"),
                    ),
                }
            }
        },
        |_, _| pb.inc(1),
    )
    .await;
    pb.finish_and_clear();

    Ok(BatchReport {
        output_dir,
        outcomes: results.into_iter().map(|(_, outcome)| outcome).collect(),
    })
}

/// Non-recursive listing of the plain files in `folder`.
fn list_files(folder: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let entries = std::fs::read_dir(folder).map_err(|e| BatchError::ReadFolder {
        path: folder.to_path_buf(),
        detail: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    files.sort();
    Ok(files)
}

fn phase_bar(len: u64, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("{msg:>12} [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("valid progress template")
            .progress_chars("=> "),
    );
    pb.set_message(message);
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn missing_folder_is_rejected() {
        let err = convert_folder(Path::new("/no/such/folder"), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn file_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();
        let err = convert_folder(&file, 2).await.unwrap_err();
        assert!(matches!(err, BatchError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn folder_without_valid_sources_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.dcm"), b"junk").unwrap();
        fs::write(dir.path().join("b.dcm"), b"more junk").unwrap();

        let report = convert_folder(dir.path(), 2).await.unwrap();
        // invalid candidates are filtered out, not reported as errors
        assert_eq!(report.total(), 0);
        assert!(report.output_dir.is_dir());
        assert_eq!(report.files_on_disk(), 0);
    }

    #[tokio::test]
    async fn empty_folder_produces_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = convert_folder(dir.path(), 2).await.unwrap();
        assert_eq!(report.total(), 0);
        assert_eq!(report.succeeded().count(), 0);
        assert_eq!(report.failed().count(), 0);
    }

    #[tokio::test]
    async fn output_directory_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(OUTPUT_SUBDIR)).unwrap();
        let report = convert_folder(dir.path(), 2).await.unwrap();
        assert_eq!(report.output_dir, dir.path().join(OUTPUT_SUBDIR));
    }
}
