//! Error taxonomy for the analysis pipeline

use plotters::drawing::DrawingAreaErrorKind;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Input that cannot produce a result, e.g. a file with no usable rows
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Rejected before any computation starts
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Required column '{0}' not found in input")]
    MissingColumn(String),

    #[error("Could not parse {field} value '{value}' on row {row}")]
    Parse {
        row: usize,
        field: &'static str,
        value: String,
    },

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Chart rendering failed: {0}")]
    Chart(String),
}

impl<E> From<DrawingAreaErrorKind<E>> for AnalysisError
where
    E: std::error::Error + Send + Sync,
{
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        AnalysisError::Chart(err.to_string())
    }
}
