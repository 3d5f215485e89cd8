//! Per-file conversion worker
//!
//! decode → normalize → encode → persist, with every failure captured into
//! the returned outcome. Exactly one output file per invocation; existing
//! files are overwritten, nothing is deleted.

use std::path::{Path, PathBuf};

use image::GrayImage;
use serde::Serialize;

use super::normalize::normalize_pixels;
use super::source::DicomSource;
use super::ConvertError;

/// Immutable per-file result record.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutcome {
    /// Source filename stem; also the output filename stem.
    pub identifier: String,
    #[serde(flatten)]
    pub status: ConversionStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ConversionStatus {
    Success { output_path: PathBuf },
    Error { detail: String },
}

impl ConversionOutcome {
    pub fn error(identifier: String, detail: String) -> Self {
        Self {
            identifier,
            status: ConversionStatus::Error { detail },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, ConversionStatus::Success { .. })
    }

    /// Error detail, if this outcome is an error.
    pub fn detail(&self) -> Option<&str> {
        match &self.status {
            ConversionStatus::Error { detail } => Some(detail),
            ConversionStatus::Success { .. } => None,
        }
    }
}

/// Identifier for a source file: its filename stem.
pub fn identifier_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Convert one DICOM file to `output_dir/<stem>.png`.
///
/// Never panics and never returns early through an error path: any failure
/// is mapped into an error outcome. A partially written file from a failed
/// encode may remain on disk; it is not cleaned up.
pub fn convert_file(source_path: &Path, output_dir: &Path) -> ConversionOutcome {
    let identifier = identifier_for(source_path);
    match try_convert(source_path, output_dir, &identifier) {
        Ok(output_path) => ConversionOutcome {
            identifier,
            status: ConversionStatus::Success { output_path },
        },
        Err(e) => ConversionOutcome::error(identifier, e.to_string()),
    }
}

fn try_convert(
    source_path: &Path,
    output_dir: &Path,
    identifier: &str,
) -> Result<PathBuf, ConvertError> {
    let source = DicomSource::open(source_path)?;
    let window = source.window();
    let plane = source.pixel_plane()?;

    let raster = normalize_pixels(&plane.samples, window);

    let output_path = output_dir.join(format!("{identifier}.png"));
    let img = GrayImage::from_raw(plane.columns, plane.rows, raster).ok_or_else(|| {
        ConvertError::Encode("pixel buffer does not match image dimensions".to_string())
    })?;
    img.save(&output_path)
        .map_err(|e| ConvertError::Encode(e.to_string()))?;

    // guards against an encoder that reports success without writing
    if !output_path.exists() {
        return Err(ConvertError::OutputMissing);
    }

    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn identifier_is_the_filename_stem() {
        assert_eq!(identifier_for(Path::new("/scans/chest_001.dcm")), "chest_001");
        assert_eq!(identifier_for(Path::new("noext")), "noext");
    }

    #[test]
    fn undecodable_source_yields_error_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("broken.dcm");
        fs::write(&source, b"not a dicom").unwrap();

        let outcome = convert_file(&source, dir.path());
        assert_eq!(outcome.identifier, "broken");
        assert!(!outcome.is_success());
        assert!(!outcome.detail().unwrap().is_empty());
    }

    #[test]
    fn missing_output_check_has_fixed_message() {
        // the post-write guard reports this exact string
        assert_eq!(
            ConvertError::OutputMissing.to_string(),
            "Failed to save output file"
        );
    }

    #[test]
    fn failed_conversion_writes_nothing_for_undecodable_input() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("broken.dcm");
        fs::write(&source, b"still not a dicom").unwrap();

        let out_dir = dir.path().join("png");
        fs::create_dir(&out_dir).unwrap();
        let outcome = convert_file(&source, &out_dir);
        assert!(!outcome.is_success());
        assert!(!out_dir.join("broken.png").exists());
    }
}
