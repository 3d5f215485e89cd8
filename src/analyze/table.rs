//! Results table persistence
//!
//! A small in-memory model of a delimited table: the manifest's columns are
//! preserved untouched, an `analysis` column is added (or reused) in place,
//! and `save` rewrites the whole file. Rewrite-per-completion is acceptable
//! at the batch sizes this tool targets; the runner funnels every write
//! through a single loop so there is never more than one writer.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Name of the column that receives the model's report text.
pub const ANALYSIS_COLUMN: &str = "analysis";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to read table {path}: {detail}")]
    Read { path: PathBuf, detail: String },
    #[error("failed to write table {path}: {detail}")]
    Write { path: PathBuf, detail: String },
    #[error("table {0} has no rows")]
    Empty(PathBuf),
    #[error("table has no '{0}' column")]
    MissingColumn(String),
}

/// An in-memory CSV table with a dedicated analysis column.
#[derive(Debug, Clone)]
pub struct ResultTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    analysis_col: usize,
}

impl ResultTable {
    /// Load an existing table, adding the analysis column if absent.
    ///
    /// All pre-existing columns and cell values are preserved as-is. Short
    /// rows are padded so every row spans the full header width. An empty
    /// table (no data rows) is a whole-batch precondition failure.
    pub fn from_csv(path: &Path) -> Result<Self, TableError> {
        let read_err = |e: csv::Error| TableError::Read {
            path: path.to_path_buf(),
            detail: e.to_string(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(read_err)?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(read_err)?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(read_err)?;
            let mut row: Vec<String> = record.iter().map(|c| c.to_string()).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(TableError::Empty(path.to_path_buf()));
        }

        Ok(Self::with_analysis_column(headers, rows))
    }

    /// Fresh table for folder-mode results: filename, status, analysis.
    pub fn for_folder_results() -> Self {
        Self {
            headers: vec![
                "filename".to_string(),
                "status".to_string(),
                ANALYSIS_COLUMN.to_string(),
            ],
            rows: Vec::new(),
            analysis_col: 2,
        }
    }

    fn with_analysis_column(mut headers: Vec<String>, mut rows: Vec<Vec<String>>) -> Self {
        let analysis_col = match headers.iter().position(|h| h == ANALYSIS_COLUMN) {
            Some(col) => col,
            None => {
                headers.push(ANALYSIS_COLUMN.to_string());
                for row in &mut rows {
                    row.push(String::new());
                }
                headers.len() - 1
            }
        };
        Self {
            headers,
            rows,
            analysis_col,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn value(&self, row: usize, col: usize) -> &str {
        &self.rows[row][col]
    }

    pub fn analysis(&self, row: usize) -> &str {
        &self.rows[row][self.analysis_col]
    }

    pub fn set_analysis(&mut self, row: usize, text: String) {
        self.rows[row][self.analysis_col] = text;
    }

    /// Append a folder-mode result row.
    pub fn push_result(&mut self, filename: String, status: &str, analysis: String) {
        self.rows.push(vec![filename, status.to_string(), analysis]);
    }

    /// Rewrite the whole table to `path`.
    pub fn save(&self, path: &Path) -> Result<(), TableError> {
        let write_err = |detail: String| TableError::Write {
            path: path.to_path_buf(),
            detail,
        };

        let mut writer = csv::WriterBuilder::new()
            .from_path(path)
            .map_err(|e| write_err(e.to_string()))?;
        writer
            .write_record(&self.headers)
            .map_err(|e| write_err(e.to_string()))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .map_err(|e| write_err(e.to_string()))?;
        }
        writer.flush().map_err(|e| write_err(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_manifest(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("manifest.csv");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn adds_analysis_column_and_preserves_existing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            "case_id,ground_truth\na.png,normal\nb.png,effusion\n",
        );

        let mut table = ResultTable::from_csv(&path).unwrap();
        assert_eq!(table.headers(), &["case_id", "ground_truth", "analysis"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.analysis(0), "");

        table.set_analysis(1, "report text".to_string());
        let out = dir.path().join("out.csv");
        table.save(&out).unwrap();

        let reloaded = ResultTable::from_csv(&out).unwrap();
        assert_eq!(reloaded.headers(), &["case_id", "ground_truth", "analysis"]);
        assert_eq!(reloaded.value(1, 0), "b.png");
        assert_eq!(reloaded.value(1, 1), "effusion");
        assert_eq!(reloaded.analysis(1), "report text");
    }

    #[test]
    fn reuses_existing_analysis_column_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            "case_id,analysis,extra\na.png,old report,keep\n",
        );

        let mut table = ResultTable::from_csv(&path).unwrap();
        assert_eq!(table.headers().len(), 3);
        assert_eq!(table.analysis(0), "old report");

        table.set_analysis(0, "new report".to_string());
        assert_eq!(table.analysis(0), "new report");
        assert_eq!(table.value(0, 2), "keep");
    }

    #[test]
    fn short_rows_are_padded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(dir.path(), "case_id,ground_truth\na.png\n");
        let table = ResultTable::from_csv(&path).unwrap();
        assert_eq!(table.value(0, 1), "");
    }

    #[test]
    fn empty_table_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(dir.path(), "case_id,ground_truth\n");
        assert!(matches!(
            ResultTable::from_csv(&path),
            Err(TableError::Empty(_))
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        assert!(matches!(
            ResultTable::from_csv(Path::new("/no/such/manifest.csv")),
            Err(TableError::Read { .. })
        ));
    }

    #[test]
    fn folder_results_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = ResultTable::for_folder_results();
        table.push_result("a.png".to_string(), "success", "report".to_string());
        table.push_result("b.png".to_string(), "error", "boom".to_string());

        let out = dir.path().join("results.csv");
        table.save(&out).unwrap();

        let reloaded = ResultTable::from_csv(&out).unwrap();
        assert_eq!(reloaded.headers(), &["filename", "status", "analysis"]);
        assert_eq!(reloaded.value(1, 1), "error");
    }
}
