//! radpipe: batch DICOM to PNG conversion and AI-assisted chest X-ray
//! reporting.
//!
//! Two pipelines share one bounded worker-pool primitive:
//!
//! - [`convert`]: validate a folder of DICOM files, normalize each pixel
//!   plane to 8 bits and write PNGs, collecting per-file outcomes.
//! - [`analyze`]: submit PNGs to an external vision model and collect one
//!   report per image into a durable CSV table, rewritten after every
//!   completed task in manifest mode so interrupted runs lose nothing.

pub mod analyze;
pub mod config;
pub mod convert;
pub mod pool;

pub use analyze::{AnalysisJobRunner, AnalysisSummary, ImageAnalyzer, ResultTable, VisionClient};
pub use config::VisionConfig;
pub use convert::{convert_file, convert_folder, BatchReport, ConversionOutcome};
