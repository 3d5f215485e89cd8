//! DICOM to PNG conversion pipeline
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  1. VALIDATE: sequential decode probe over the folder      │
//! │  2. CONVERT:  decode → normalize → encode PNG (pool of N)  │
//! │  3. REPORT:   per-file outcomes aggregated into a summary  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Per-file failures never cross a task boundary: every conversion attempt
//! resolves to a [`worker::ConversionOutcome`], success or error.

pub mod batch;
pub mod normalize;
pub mod source;
pub mod worker;

pub use batch::{convert_folder, BatchError, BatchReport};
pub use normalize::{normalize_pixels, Window};
pub use source::{is_valid_source, DicomSource, PixelPlane};
pub use worker::{convert_file, ConversionOutcome, ConversionStatus};

use thiserror::Error;

/// Error raised while converting a single DICOM file.
///
/// Rendered with `Display` into the outcome's error detail; callers match on
/// variants only in tests.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("failed to read DICOM file: {0}")]
    Read(String),
    #[error("no usable pixel data: {0}")]
    Pixels(String),
    #[error("failed to encode PNG: {0}")]
    Encode(String),
    /// The encoder reported success but the file is not on disk.
    #[error("Failed to save output file")]
    OutputMissing,
}
