//! Integration tests for RetailForge

use std::io::Write;

use retailforge::export::{write_rules_csv, write_segments_csv};
use retailforge::{
    load_transactions, mine_rules, segment_customers, AnalysisError, LoadOptions,
    RuleMinerConfig, Segment, SegmentationConfig,
};
use tempfile::{tempdir, NamedTempFile};

/// Create a test CSV file with sample data
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country"
    )
    .unwrap();

    // Customer 17850 - several orders, lantern and t-light holder bought together
    writeln!(file, "536365,85123A,WHITE HANGING HEART T-LIGHT HOLDER,6,2011-11-01 08:26:00,2.55,17850,United Kingdom").unwrap();
    writeln!(file, "536365,71053,WHITE METAL LANTERN,6,2011-11-01 08:26:00,3.39,17850,United Kingdom").unwrap();
    writeln!(file, "536366,85123A,WHITE HANGING HEART T-LIGHT HOLDER,2,2011-11-20 10:00:00,2.55,17850,United Kingdom").unwrap();
    writeln!(file, "536366,71053,WHITE METAL LANTERN,2,2011-11-20 10:00:00,3.39,17850,United Kingdom").unwrap();
    writeln!(file, "536370,22633,HAND WARMER UNION JACK,6,2011-12-01 08:28:00,1.85,17850,United Kingdom").unwrap();

    // Customer 13047 - single order
    writeln!(file, "536367,84406B,CREAM CUPID HEARTS COAT HANGER,8,2010-12-01 08:34:00,2.75,13047,United Kingdom").unwrap();

    // Customer 12345 - recent high value
    writeln!(file, "536368,85123A,WHITE HANGING HEART T-LIGHT HOLDER,40,2011-12-08 10:15:00,2.55,12345,United Kingdom").unwrap();
    writeln!(file, "536368,71053,WHITE METAL LANTERN,40,2011-12-08 10:15:00,3.39,12345,United Kingdom").unwrap();

    // Customer 98765 - old low value
    writeln!(file, "536369,22457,NATURAL SLATE HEART CHALKBOARD,4,2010-01-15 09:00:00,3.25,98765,United Kingdom").unwrap();

    // Customer 14911 - mid recency
    writeln!(file, "536371,22457,NATURAL SLATE HEART CHALKBOARD,3,2011-06-15 09:00:00,3.25,14911,France").unwrap();
    writeln!(file, "536371,85123A,WHITE HANGING HEART T-LIGHT HOLDER,3,2011-06-15 09:00:00,2.55,14911,France").unwrap();

    // Rows the cleaning filters remove
    writeln!(file, "C536379,D,Discount,-1,2011-12-01 09:41:00,27.50,14527,United Kingdom").unwrap();
    writeln!(file, "536380,22139,RETROSPOT TEA SET CERAMIC,2,2011-12-09 09:41:00,4.95,,United Kingdom").unwrap();

    file
}

fn clean_options() -> LoadOptions {
    LoadOptions {
        clean: true,
        ..Default::default()
    }
}

#[test]
fn test_end_to_end_pipeline() {
    let test_file = create_test_csv();
    let loaded = load_transactions(test_file.path(), &clean_options()).unwrap();

    assert_eq!(loaded.report.rows_read, 13);
    assert_eq!(loaded.report.cancelled, 1);
    assert_eq!(loaded.report.missing_customer, 1);
    assert_eq!(loaded.transactions.len(), 11);

    let segments = segment_customers(&loaded.transactions, &SegmentationConfig::default()).unwrap();
    assert_eq!(segments.scores.len(), 5);
    assert_eq!(segments.skipped_rows, 0);

    // Latest cleaned purchase is 2011-12-08 10:15, so the snapshot is one day later
    let snapshot = segments.snapshot.unwrap();
    assert_eq!(snapshot.to_string(), "2011-12-09 10:15:00");

    let recent = segments
        .scores
        .iter()
        .find(|s| s.customer_id == "12345")
        .unwrap();
    assert_eq!(recent.recency, 1);
    assert_eq!(recent.r_score, 5);
    assert_eq!(recent.m_score, 5);

    let frequent = segments
        .scores
        .iter()
        .find(|s| s.customer_id == "17850")
        .unwrap();
    assert_eq!(frequent.frequency, 3);
    assert_eq!(frequent.f_score, 5);

    for score in &segments.scores {
        assert!(Segment::ALL.contains(&score.segment));
        assert_eq!(
            score.label,
            format!("{}{}{}", score.r_score, score.f_score, score.m_score)
        );
    }

    let config = RuleMinerConfig {
        min_support: 0.3,
        min_confidence: 0.5,
        ..Default::default()
    };
    let mined = mine_rules(&loaded.transactions, &config).unwrap();
    assert_eq!(mined.order_count, 7);

    let rule = mined
        .rules
        .iter()
        .find(|r| r.antecedent == ["WHITE METAL LANTERN"] && r.consequent == ["WHITE HANGING HEART T-LIGHT HOLDER"])
        .unwrap();
    assert!((rule.support - 3.0 / 7.0).abs() < 1e-12);
    assert_eq!(rule.confidence, 1.0);
    assert!((rule.lift - 7.0 / 4.0).abs() < 1e-12);

    for rule in &mined.rules {
        assert!(rule.support >= config.min_support);
        assert!(rule.confidence >= config.min_confidence);
    }
}

#[test]
fn test_results_independent_of_row_order() {
    let test_file = create_test_csv();
    let loaded = load_transactions(test_file.path(), &clean_options()).unwrap();

    let mut reversed = loaded.transactions.clone();
    reversed.reverse();

    let seg_config = SegmentationConfig::default();
    let forward = segment_customers(&loaded.transactions, &seg_config).unwrap();
    let backward = segment_customers(&reversed, &seg_config).unwrap();
    assert_eq!(forward.scores, backward.scores);

    let rule_config = RuleMinerConfig {
        min_support: 0.1,
        min_confidence: 0.1,
        ..Default::default()
    };
    let forward = mine_rules(&loaded.transactions, &rule_config).unwrap();
    let backward = mine_rules(&reversed, &rule_config).unwrap();
    assert_eq!(forward.rules, backward.rules);
}

#[test]
fn test_export_tables() {
    let test_file = create_test_csv();
    let loaded = load_transactions(test_file.path(), &clean_options()).unwrap();
    let segments = segment_customers(&loaded.transactions, &SegmentationConfig::default()).unwrap();
    let mined = mine_rules(&loaded.transactions, &RuleMinerConfig::default()).unwrap();

    let dir = tempdir().unwrap();
    let seg_path = dir.path().join("customer_rfm_segments.csv");
    let rules_path = dir.path().join("market_basket_rules.csv");

    write_segments_csv(&seg_path, &segments.scores).unwrap();
    write_rules_csv(&rules_path, &mined.rules).unwrap();

    let seg_csv = std::fs::read_to_string(&seg_path).unwrap();
    assert_eq!(seg_csv.lines().count(), segments.scores.len() + 1);

    let rules_csv = std::fs::read_to_string(&rules_path).unwrap();
    assert_eq!(rules_csv.lines().count(), mined.rules.len() + 1);
}

#[test]
fn test_empty_inputs() {
    let segments = segment_customers(&[], &SegmentationConfig::default()).unwrap();
    assert!(segments.is_empty());

    let mined = mine_rules(&[], &RuleMinerConfig::default()).unwrap();
    assert!(mined.rules.is_empty());
}

#[test]
fn test_error_handling_invalid_config() {
    let test_file = create_test_csv();
    let loaded = load_transactions(test_file.path(), &clean_options()).unwrap();

    let config = SegmentationConfig {
        buckets: 0,
        ..Default::default()
    };
    let result = segment_customers(&loaded.transactions, &config);
    assert!(matches!(result, Err(AnalysisError::Configuration(_))));

    let config = RuleMinerConfig {
        min_support: 2.0,
        ..Default::default()
    };
    let result = mine_rules(&loaded.transactions, &config);
    assert!(matches!(result, Err(AnalysisError::Configuration(_))));
}
