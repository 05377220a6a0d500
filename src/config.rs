//! Tunable parameters for the segmentation engine and the rule miner

use chrono::NaiveDateTime;

use crate::error::AnalysisError;

/// Default number of score buckets (quintiles)
pub const DEFAULT_BUCKETS: u8 = 5;
/// Default minimum support as a fraction of all orders
pub const DEFAULT_MIN_SUPPORT: f64 = 0.02;
/// Default minimum confidence for an emitted rule
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.2;

/// Configuration for RFM scoring and segmentation.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationConfig {
    /// Reference point for recency. `None` means max(timestamp) + 1 day.
    pub snapshot: Option<NaiveDateTime>,

    /// Number of ranked buckets per metric. Scores range over `1..=buckets`.
    pub buckets: u8,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            snapshot: None,
            buckets: DEFAULT_BUCKETS,
        }
    }
}

impl SegmentationConfig {
    /// Reject bucket counts that cannot produce a one-digit-per-score label.
    pub fn validate(&self) -> crate::Result<()> {
        if !(1..=9).contains(&self.buckets) {
            return Err(AnalysisError::Configuration(format!(
                "bucket count must be between 1 and 9, got {}",
                self.buckets
            )));
        }
        Ok(())
    }
}

/// Configuration for frequent itemset search and rule generation.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMinerConfig {
    /// Minimum fraction of orders that must contain an itemset
    pub min_support: f64,

    /// Minimum confidence for a rule to be emitted
    pub min_confidence: f64,

    /// Optional lift floor applied after the confidence filter
    pub min_lift: Option<f64>,

    /// Largest itemset size explored; `None` searches until no level survives
    pub max_itemset_len: Option<usize>,
}

impl Default for RuleMinerConfig {
    fn default() -> Self {
        Self {
            min_support: DEFAULT_MIN_SUPPORT,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            min_lift: None,
            max_itemset_len: None,
        }
    }
}

impl RuleMinerConfig {
    pub fn validate(&self) -> crate::Result<()> {
        check_fraction("min_support", self.min_support)?;
        check_fraction("min_confidence", self.min_confidence)?;

        if let Some(lift) = self.min_lift {
            if !lift.is_finite() || lift < 0.0 {
                return Err(AnalysisError::Configuration(format!(
                    "min_lift must be a non-negative number, got {lift}"
                )));
            }
        }

        if let Some(len) = self.max_itemset_len {
            if len < 2 {
                return Err(AnalysisError::Configuration(format!(
                    "max_itemset_len must be at least 2 to produce rules, got {len}"
                )));
            }
        }

        Ok(())
    }
}

fn check_fraction(name: &str, value: f64) -> crate::Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(AnalysisError::Configuration(format!(
            "{name} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}
