//! RetailForge: customer segmentation and market-basket analysis for retail transactions
//!
//! This library scores customers on Recency, Frequency and Monetary value,
//! assigns them to named segments, and mines association rules between
//! products bought in the same order.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod rules;
pub mod segmentation;
pub mod viz;

// Re-export public items for easier access
pub use cli::{Args, Stage};
pub use config::{RuleMinerConfig, SegmentationConfig};
pub use data::{load_transactions, CleaningReport, LoadOptions, Transaction};
pub use error::AnalysisError;
pub use rules::{mine_rules, AssociationRule, FrequentItemset, RuleMiningOutput};
pub use segmentation::{segment_customers, CustomerScore, Segment, SegmentationOutput};

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, AnalysisError>;
