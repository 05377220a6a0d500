//! Command-line interface definitions and argument parsing

use chrono::NaiveDateTime;
use clap::{Parser, ValueEnum};

use crate::config::{
    RuleMinerConfig, SegmentationConfig, DEFAULT_BUCKETS, DEFAULT_MIN_CONFIDENCE,
    DEFAULT_MIN_SUPPORT,
};
use crate::data::{parse_timestamp, LoadOptions, DEFAULT_ITEM_COLUMN};
use crate::error::AnalysisError;

/// Which analysis to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    /// RFM scoring and customer segmentation only
    Segments,
    /// Market-basket association rules only
    Rules,
}

/// Customer segmentation and market-basket analysis for retail transactions
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the cleaned transaction CSV
    #[arg(short, long, default_value = "data/processed/clean_retail_data.csv")]
    pub input: String,

    /// Directory for the segment and rule tables (and charts)
    #[arg(short, long, default_value = "outputs")]
    pub output_dir: String,

    /// Apply the raw-data cleaning filters while loading
    #[arg(long)]
    pub clean: bool,

    /// Column holding the product used to build baskets
    #[arg(long, default_value = DEFAULT_ITEM_COLUMN)]
    pub item_column: String,

    /// Run only one of the two analyses
    #[arg(long, value_enum)]
    pub only: Option<Stage>,

    /// Recency reference date (default: latest transaction + 1 day)
    /// Example: --snapshot 2011-12-10 or --snapshot "2011-12-10 12:00:00"
    #[arg(long)]
    pub snapshot: Option<String>,

    /// Number of score buckets per RFM metric
    #[arg(short, long, default_value_t = DEFAULT_BUCKETS)]
    pub buckets: u8,

    /// Minimum fraction of orders containing an itemset
    #[arg(long, default_value_t = DEFAULT_MIN_SUPPORT)]
    pub min_support: f64,

    /// Minimum rule confidence
    #[arg(long, default_value_t = DEFAULT_MIN_CONFIDENCE)]
    pub min_confidence: f64,

    /// Discard rules below this lift
    #[arg(long)]
    pub min_lift: Option<f64>,

    /// Largest itemset size to search
    #[arg(long)]
    pub max_itemset_len: Option<usize>,

    /// Render SVG charts next to the tables
    #[arg(long)]
    pub charts: bool,

    /// How many rules to print and chart
    #[arg(long, default_value = "10")]
    pub top: usize,

    /// Classification mode: provide R,F,M scores as comma-separated string
    /// Example: --classify "4,5,3"
    #[arg(short, long)]
    pub classify: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse the score triple from the classify string
    /// Expected format: "r,f,m" with each score between 1 and 9
    pub fn parse_score_triple(&self) -> crate::Result<Option<(u8, u8, u8)>> {
        let Some(ref classify) = self.classify else {
            return Ok(None);
        };

        let parts: Vec<&str> = classify.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(AnalysisError::InvalidInput(
                "classify values must be in format 'r,f,m'".to_string(),
            ));
        }

        let mut scores = [0u8; 3];
        for (slot, part) in scores.iter_mut().zip(&parts) {
            *slot = part
                .parse::<u8>()
                .ok()
                .filter(|s| (1..=9).contains(s))
                .ok_or_else(|| AnalysisError::InvalidInput(format!("invalid score: {part}")))?;
        }

        Ok(Some((scores[0], scores[1], scores[2])))
    }

    pub fn parse_snapshot(&self) -> crate::Result<Option<NaiveDateTime>> {
        self.snapshot
            .as_deref()
            .map(|s| {
                parse_timestamp(s).ok_or_else(|| {
                    AnalysisError::Configuration(format!("invalid snapshot date: {s}"))
                })
            })
            .transpose()
    }

    pub fn segmentation_config(&self) -> crate::Result<SegmentationConfig> {
        let config = SegmentationConfig {
            snapshot: self.parse_snapshot()?,
            buckets: self.buckets,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn rule_config(&self) -> crate::Result<RuleMinerConfig> {
        let config = RuleMinerConfig {
            min_support: self.min_support,
            min_confidence: self.min_confidence,
            min_lift: self.min_lift,
            max_itemset_len: self.max_itemset_len,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            item_column: self.item_column.clone(),
            clean: self.clean,
        }
    }

    pub fn runs(&self, stage: Stage) -> bool {
        self.only.map_or(true, |only| only == stage)
    }
}
