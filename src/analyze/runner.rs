//! Analysis job orchestration
//!
//! Two modes share the bounded pool and the injected [`ImageAnalyzer`]:
//!
//! - folder mode: analyze every PNG in a folder, write the results table
//!   once at the end;
//! - manifest mode: analyze the manifest rows whose image is present in the
//!   folder, rewriting the table after *every* completed task so an
//!   interrupted run keeps all committed results and can be resumed.
//!
//! Tasks return their outcome; only the collecting loop touches the table,
//! so the output file has exactly one writer.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

use super::client::ImageAnalyzer;
use super::table::{ResultTable, TableError};
use crate::pool;

/// Default pool size for folder mode.
pub const DEFAULT_FOLDER_WORKERS: usize = 5;
/// Default pool size for manifest mode.
pub const DEFAULT_MANIFEST_WORKERS: usize = 10;
/// Default output path for manifest mode.
pub const DEFAULT_MANIFEST_OUTPUT: &str = "analysis_results.csv";
/// Default manifest column holding the image identifier.
pub const DEFAULT_ID_COLUMN: &str = "case_id";

/// Marker distinguishing "attempted and failed" from "never attempted".
const ERROR_PREFIX: &str = "Error: ";

#[derive(Debug, Error)]
pub enum AnalyzeRunError {
    #[error("no PNG images found in {0}")]
    NoImages(PathBuf),
    #[error("failed to read folder {path}: {detail}")]
    ReadFolder { path: PathBuf, detail: String },
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Disjoint per-run buckets; they sum to the number of rows considered.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisSummary {
    /// Tasks that returned a report.
    pub analyzed: usize,
    /// Tasks that were attempted and failed; the error text is in the table.
    pub failed: usize,
    /// Rows already carrying a completed analysis, not re-attempted.
    pub skipped: usize,
    /// Manifest rows with no matching image; never submitted.
    pub not_found: usize,
}

impl AnalysisSummary {
    pub fn total(&self) -> usize {
        self.analyzed + self.failed + self.skipped + self.not_found
    }
}

/// Drives analysis tasks against an injected analyzer capability.
pub struct AnalysisJobRunner {
    analyzer: Arc<dyn ImageAnalyzer>,
    workers: usize,
}

impl AnalysisJobRunner {
    pub fn new(analyzer: Arc<dyn ImageAnalyzer>, workers: usize) -> Self {
        Self {
            analyzer,
            workers: workers.max(1),
        }
    }

    /// Analyze every PNG in `folder`, writing the full table once at
    /// completion. Returns the output path alongside the table and summary.
    pub async fn process_folder(
        &self,
        folder: &Path,
        output_csv: Option<PathBuf>,
    ) -> Result<(PathBuf, ResultTable, AnalysisSummary), AnalyzeRunError> {
        let images = list_png_files(folder)?;
        if images.is_empty() {
            return Err(AnalyzeRunError::NoImages(folder.to_path_buf()));
        }
        let output = output_csv.unwrap_or_else(default_folder_output);

        tracing::info!("found {} images to process", images.len());
        let pb = phase_bar(images.len() as u64);

        let analyzer = Arc::clone(&self.analyzer);
        let results = pool::map_bounded_with(
            images,
            self.workers,
            |_, path: PathBuf| {
                let analyzer = Arc::clone(&analyzer);
                async move {
                    let filename = file_name_of(&path);
                    let result = analyze_image(analyzer.as_ref(), &path).await;
                    (filename, result)
                }
            },
            |_, _| pb.inc(1),
        )
        .await;
        pb.finish_and_clear();

        let mut table = ResultTable::for_folder_results();
        let mut summary = AnalysisSummary::default();
        for (_, (filename, result)) in results {
            match result {
                Ok(text) => {
                    summary.analyzed += 1;
                    table.push_result(filename, "success", text);
                }
                Err(detail) => {
                    summary.failed += 1;
                    table.push_result(filename, "error", detail);
                }
            }
        }

        table.save(&output)?;
        tracing::info!("results saved to {}", output.display());
        Ok((output, table, summary))
    }

    /// Analyze the manifest rows whose image exists in `folder`.
    ///
    /// The whole table is rewritten to `output_csv` after every completed
    /// task, so the file on disk is always a valid snapshot of the work
    /// done so far. Rows already carrying a completed analysis are skipped;
    /// error-valued and empty cells are (re)attempted.
    pub async fn process_from_manifest(
        &self,
        manifest: &Path,
        folder: &Path,
        output_csv: &Path,
        id_column: &str,
    ) -> Result<(ResultTable, AnalysisSummary), AnalyzeRunError> {
        let mut table = ResultTable::from_csv(manifest)?;
        let id_col = table
            .column_index(id_column)
            .ok_or_else(|| TableError::MissingColumn(id_column.to_string()))?;

        let present = png_name_set(folder)?;
        tracing::info!("found {} images in {}", present.len(), folder.display());

        let mut summary = AnalysisSummary::default();
        let mut pending: Vec<(usize, String, PathBuf)> = Vec::new();
        for row in 0..table.len() {
            let case_id = table.value(row, id_col).trim().to_string();
            if is_completed(table.analysis(row)) {
                summary.skipped += 1;
                tracing::info!("already analyzed, skipping: {case_id}");
                continue;
            }
            match resolve_image(&present, folder, &case_id) {
                Some(path) => pending.push((row, case_id, path)),
                None => {
                    summary.not_found += 1;
                    tracing::warn!("✗ image not found: {case_id}");
                }
            }
        }
        tracing::info!(
            "{} of {} manifest rows have a matching image",
            pending.len(),
            table.len()
        );

        let pb = phase_bar(pending.len() as u64);
        let analyzer = Arc::clone(&self.analyzer);
        pool::map_bounded_with(
            pending,
            self.workers,
            |_, (row, case_id, path): (usize, String, PathBuf)| {
                let analyzer = Arc::clone(&analyzer);
                async move {
                    let result = analyze_image(analyzer.as_ref(), &path).await;
                    (row, case_id, result)
                }
            },
            |_, (row, case_id, result)| {
                match result {
                    Ok(text) => {
                        tracing::info!("✓ analyzed: {case_id}");
                        table.set_analysis(*row, text.clone());
                        summary.analyzed += 1;
                    }
                    Err(detail) => {
                        tracing::warn!("✗ analysis failed for {case_id}: {detail}");
                        table.set_analysis(*row, format!("{ERROR_PREFIX}{detail}"));
                        summary.failed += 1;
                    }
                }
                // commit everything done so far; a crash from here on loses
                // none of the completed rows
                if let Err(e) = table.save(output_csv) {
                    tracing::error!("failed to persist results table: {e}");
                }
                pb.inc(1);
            },
        )
        .await;
        pb.finish_and_clear();

        table.save(output_csv)?;
        Ok((table, summary))
    }
}

async fn analyze_image(analyzer: &dyn ImageAnalyzer, path: &Path) -> Result<String, String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    analyzer.analyze(&bytes).await.map_err(|e| e.to_string())
}

/// Resume policy: a non-empty, non-error analysis cell is complete.
fn is_completed(analysis: &str) -> bool {
    !analysis.is_empty() && !analysis.starts_with(ERROR_PREFIX)
}

/// Match a manifest identifier to a file in the folder. The identifier may
/// be stored with or without the `.png` extension.
fn resolve_image(present: &HashSet<String>, folder: &Path, case_id: &str) -> Option<PathBuf> {
    if present.contains(case_id) {
        return Some(folder.join(case_id));
    }
    let with_ext = format!("{case_id}.png");
    if present.contains(&with_ext) {
        return Some(folder.join(with_ext));
    }
    None
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("png"))
        .unwrap_or(false)
}

fn list_png_files(folder: &Path) -> Result<Vec<PathBuf>, AnalyzeRunError> {
    let entries = std::fs::read_dir(folder).map_err(|e| AnalyzeRunError::ReadFolder {
        path: folder.to_path_buf(),
        detail: e.to_string(),
    })?;
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_png(p))
        .collect();
    files.sort();
    Ok(files)
}

fn png_name_set(folder: &Path) -> Result<HashSet<String>, AnalyzeRunError> {
    Ok(list_png_files(folder)?
        .into_iter()
        .map(|p| file_name_of(&p))
        .collect())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn default_folder_output() -> PathBuf {
    PathBuf::from(format!(
        "analysis_results_{}.csv",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ))
}

fn phase_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("{msg:>12} [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("valid progress template")
            .progress_chars("=> "),
    );
    pb.set_message("analyzing");
    pb
}
