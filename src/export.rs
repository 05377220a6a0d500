//! Flat CSV tables for the downstream storage layer, written with Polars

use std::fs::{self, File};
use std::path::Path;

use log::info;
use polars::prelude::*;
use rust_decimal::prelude::ToPrimitive;

use crate::rules::AssociationRule;
use crate::segmentation::CustomerScore;

pub const SEGMENTS_FILE: &str = "customer_rfm_segments.csv";
pub const RULES_FILE: &str = "market_basket_rules.csv";

/// Separator between item names inside a single rule cell
const ITEM_SEPARATOR: &str = ", ";

/// Build the per-customer score table
pub fn segments_frame(scores: &[CustomerScore]) -> crate::Result<DataFrame> {
    let customer_id: Vec<&str> = scores.iter().map(|s| s.customer_id.as_str()).collect();
    let recency: Vec<i64> = scores.iter().map(|s| s.recency).collect();
    let frequency: Vec<i64> = scores.iter().map(|s| s.frequency as i64).collect();
    let monetary: Vec<f64> = scores
        .iter()
        .map(|s| s.monetary.to_f64().unwrap_or(f64::NAN))
        .collect();
    let r_score: Vec<i32> = scores.iter().map(|s| s.r_score as i32).collect();
    let f_score: Vec<i32> = scores.iter().map(|s| s.f_score as i32).collect();
    let m_score: Vec<i32> = scores.iter().map(|s| s.m_score as i32).collect();
    let label: Vec<&str> = scores.iter().map(|s| s.label.as_str()).collect();
    let segment: Vec<&str> = scores.iter().map(|s| s.segment.name()).collect();

    let df = DataFrame::new(vec![
        Series::new("customer_id", customer_id),
        Series::new("recency", recency),
        Series::new("frequency", frequency),
        Series::new("monetary", monetary),
        Series::new("r_score", r_score),
        Series::new("f_score", f_score),
        Series::new("m_score", m_score),
        Series::new("rfm_score", label),
        Series::new("segment", segment),
    ])?;
    Ok(df)
}

/// Build the rule table; item sets are joined into one text cell each
pub fn rules_frame(rules: &[AssociationRule]) -> crate::Result<DataFrame> {
    let antecedents: Vec<String> = rules.iter().map(|r| r.antecedent.join(ITEM_SEPARATOR)).collect();
    let consequents: Vec<String> = rules.iter().map(|r| r.consequent.join(ITEM_SEPARATOR)).collect();
    let column = |f: fn(&AssociationRule) -> f64| rules.iter().map(f).collect::<Vec<f64>>();

    let df = DataFrame::new(vec![
        Series::new("antecedents", antecedents),
        Series::new("consequents", consequents),
        Series::new("antecedent_support", column(|r| r.antecedent_support)),
        Series::new("consequent_support", column(|r| r.consequent_support)),
        Series::new("support", column(|r| r.support)),
        Series::new("confidence", column(|r| r.confidence)),
        Series::new("lift", column(|r| r.lift)),
        Series::new("leverage", column(|r| r.leverage)),
        Series::new("conviction", column(|r| r.conviction)),
    ])?;
    Ok(df)
}

pub fn write_segments_csv(path: impl AsRef<Path>, scores: &[CustomerScore]) -> crate::Result<()> {
    let mut df = segments_frame(scores)?;
    write_frame(path.as_ref(), &mut df)
}

pub fn write_rules_csv(path: impl AsRef<Path>, rules: &[AssociationRule]) -> crate::Result<()> {
    let mut df = rules_frame(rules)?;
    write_frame(path.as_ref(), &mut df)
}

fn write_frame(path: &Path, df: &mut DataFrame) -> crate::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;

    info!("wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::Segment;
    use rust_decimal::Decimal;
    use tempfile::tempdir;

    fn sample_score() -> CustomerScore {
        CustomerScore {
            customer_id: "17850".to_string(),
            recency: 3,
            frequency: 12,
            monetary: Decimal::new(523455, 2),
            r_score: 5,
            f_score: 4,
            m_score: 5,
            label: "545".to_string(),
            segment: Segment::Champions,
        }
    }

    fn sample_rule() -> AssociationRule {
        AssociationRule {
            antecedent: vec!["JUMBO BAG RED".to_string(), "LUNCH BAG".to_string()],
            consequent: vec!["JUMBO BAG PINK".to_string()],
            antecedent_support: 0.05,
            consequent_support: 0.04,
            support: 0.03,
            confidence: 0.6,
            lift: 15.0,
            leverage: 0.028,
            conviction: 2.4,
        }
    }

    #[test]
    fn test_segments_frame_columns() {
        let df = segments_frame(&[sample_score()]).unwrap();
        assert_eq!(df.shape(), (1, 9));
        assert_eq!(
            df.get_column_names(),
            &[
                "customer_id",
                "recency",
                "frequency",
                "monetary",
                "r_score",
                "f_score",
                "m_score",
                "rfm_score",
                "segment"
            ]
        );
    }

    #[test]
    fn test_write_segments_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(SEGMENTS_FILE);

        write_segments_csv(&path, &[sample_score()]).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next(),
            Some("customer_id,recency,frequency,monetary,r_score,f_score,m_score,rfm_score,segment")
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("17850,3,12,5234.55"));
        assert!(row.ends_with(",5,4,5,545,Champions"));
    }

    #[test]
    fn test_write_rules_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(RULES_FILE);

        write_rules_csv(&path, &[sample_rule()]).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("antecedents,consequents,antecedent_support"));
        assert!(contents.contains("\"JUMBO BAG RED, LUNCH BAG\""));
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_empty_tables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(RULES_FILE);

        write_rules_csv(&path, &[]).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }
}
