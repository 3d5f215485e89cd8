//! Image analysis pipeline
//!
//! Submits converted PNG images to an external multimodal inference service
//! and collects one free-text radiology report per image into a CSV table.
//! Two entry points: analyze everything in a folder, or analyze the subset
//! of a folder named by a manifest table, persisting the table after every
//! completed task so an interrupted run keeps its committed results.

pub mod client;
pub mod prompt;
pub mod runner;
pub mod table;

pub use client::{AnalysisError, ImageAnalyzer, VisionClient};
pub use runner::{AnalysisJobRunner, AnalysisSummary, AnalyzeRunError};
pub use table::{ResultTable, TableError};
