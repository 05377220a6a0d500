//! Charts and console summaries for segmentation and rule mining results

use std::path::{Path, PathBuf};

use log::info;
use plotters::prelude::*;

use crate::rules::AssociationRule;
use crate::segmentation::SegmentationOutput;

pub const SEGMENT_CHART_FILE: &str = "segment_sizes.svg";
pub const RULE_CHART_FILE: &str = "top_rules_lift.svg";

/// Colors follow `Segment::ALL` order
const SEGMENT_COLORS: [RGBColor; 5] = [GREEN, BLUE, CYAN, YELLOW, RED];

/// Longest rule description drawn on the lift chart axis
const MAX_RULE_LABEL: usize = 48;

/// Bar chart of customers per segment
///
/// # Arguments
/// * `output` - Segmentation result
/// * `output_path` - Where to write the SVG
pub fn create_segment_size_chart(
    output: &SegmentationOutput,
    output_path: &Path,
) -> crate::Result<()> {
    let summary = output.segment_summary();
    let max_size = summary.iter().map(|s| s.customers).max().unwrap_or(0).max(1) as f64;
    let names: Vec<&str> = summary.iter().map(|s| s.segment.name()).collect();

    let root = SVGBackend::new(output_path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Customers per Segment", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(names.len() as f64 - 0.5), 0f64..(max_size * 1.1))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(names.len())
        .x_label_formatter(&|x| axis_name(&names, *x))
        .x_desc("Segment")
        .y_desc("Number of Customers")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(summary.iter().enumerate().map(|(i, s)| {
        let color = SEGMENT_COLORS[i % SEGMENT_COLORS.len()];
        Rectangle::new(
            [(i as f64 - 0.4, 0.0), (i as f64 + 0.4, s.customers as f64)],
            color.filled(),
        )
    }))?;

    root.present()?;
    info!("segment size chart saved to {}", output_path.display());

    Ok(())
}

/// Horizontal bars for the `top_n` rules by lift, strongest at the top
pub fn create_rule_lift_chart(
    rules: &[AssociationRule],
    top_n: usize,
    output_path: &Path,
) -> crate::Result<()> {
    let top: Vec<&AssociationRule> = rules.iter().take(top_n).collect();
    let labels: Vec<String> = top.iter().rev().map(|r| rule_label(r)).collect();
    let max_lift = top.iter().map(|r| r.lift).fold(1.0, f64::max);
    let rows = top.len().max(1) as f64;

    let root = SVGBackend::new(output_path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Top Association Rules by Lift", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(320)
        .build_cartesian_2d(0f64..(max_lift * 1.1), -0.5f64..(rows - 0.5))?;

    let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(label_refs.len().max(1))
        .y_label_formatter(&|y| axis_name(&label_refs, *y))
        .x_desc("Lift")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(top.iter().rev().enumerate().map(|(i, rule)| {
        Rectangle::new(
            [(0.0, i as f64 - 0.4), (rule.lift, i as f64 + 0.4)],
            BLUE.mix(0.7).filled(),
        )
    }))?;

    root.present()?;
    info!("rule lift chart saved to {}", output_path.display());

    Ok(())
}

/// Draw every chart that has data into `output_dir`
///
/// # Returns
/// * Paths of the charts written
pub fn generate_report(
    segments: Option<&SegmentationOutput>,
    rules: Option<&[AssociationRule]>,
    top_rules: usize,
    output_dir: &Path,
) -> crate::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();

    if let Some(output) = segments.filter(|s| !s.is_empty()) {
        let path = output_dir.join(SEGMENT_CHART_FILE);
        create_segment_size_chart(output, &path)?;
        written.push(path);
    }

    if let Some(rules) = rules.filter(|r| !r.is_empty()) {
        let path = output_dir.join(RULE_CHART_FILE);
        create_rule_lift_chart(rules, top_rules, &path)?;
        written.push(path);
    }

    Ok(written)
}

/// Print the segment rollup to the console
pub fn print_segment_statistics(output: &SegmentationOutput) {
    println!("\n=== Segment Statistics ===");
    println!("Total customers: {}", output.scores.len());
    if let Some(snapshot) = output.snapshot {
        println!("Snapshot date: {snapshot}");
    }

    println!("\n  Segment             | Customers |  Share | Monetary");
    println!("  --------------------|-----------|--------|-------------");
    for s in output.segment_summary() {
        println!(
            "  {:19} | {:9} | {:5.1}% | {:>12}",
            s.segment.name(),
            s.customers,
            s.share * 100.0,
            s.monetary.round_dp(2)
        );
    }
}

/// Print the strongest rules to the console
pub fn print_top_rules(rules: &[AssociationRule], top_n: usize) {
    println!("\n=== Top {} Rules by Lift ===", top_n.min(rules.len()));
    for rule in rules.iter().take(top_n) {
        println!(
            "  {} (support {:.3}, confidence {:.3}, lift {:.2})",
            rule_label(rule),
            rule.support,
            rule.confidence,
            rule.lift
        );
    }
}

/// Label for the bar nearest `value`, blank between bars
fn axis_name(names: &[&str], value: f64) -> String {
    let idx = value.round();
    if (value - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    names.get(idx as usize).map(|s| s.to_string()).unwrap_or_default()
}

fn rule_label(rule: &AssociationRule) -> String {
    let label = format!(
        "{} → {}",
        rule.antecedent.join(", "),
        rule.consequent.join(", ")
    );
    if label.chars().count() <= MAX_RULE_LABEL {
        return label;
    }
    let mut short: String = label.chars().take(MAX_RULE_LABEL - 1).collect();
    short.push('…');
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SegmentationConfig;
    use crate::data::Transaction;
    use crate::segmentation::segment_customers;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use tempfile::tempdir;

    fn create_test_data() -> (SegmentationOutput, Vec<AssociationRule>) {
        let ts = NaiveDate::from_ymd_opt(2011, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let transactions: Vec<Transaction> = (0..8)
            .map(|i| {
                Transaction::new(
                    format!("o{i}"),
                    Some(format!("c{i}")),
                    "MUG",
                    i + 1,
                    Decimal::new(250, 2),
                    ts,
                )
            })
            .collect();
        let segments = segment_customers(&transactions, &SegmentationConfig::default()).unwrap();

        let rule = AssociationRule {
            antecedent: vec!["GREEN REGENCY TEACUP AND SAUCER".to_string()],
            consequent: vec!["ROSES REGENCY TEACUP AND SAUCER".to_string()],
            antecedent_support: 0.04,
            consequent_support: 0.05,
            support: 0.03,
            confidence: 0.75,
            lift: 15.0,
            leverage: 0.028,
            conviction: 3.8,
        };

        (segments, vec![rule])
    }

    #[test]
    fn test_create_segment_size_chart() {
        let (segments, _) = create_test_data();
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("sizes.svg");

        create_segment_size_chart(&segments, &path).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_create_rule_lift_chart() {
        let (_, rules) = create_test_data();
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("rules.svg");

        create_rule_lift_chart(&rules, 10, &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_generate_report_skips_empty_inputs() {
        let (segments, rules) = create_test_data();
        let temp_dir = tempdir().unwrap();

        let written =
            generate_report(Some(&segments), Some(rules.as_slice()), 10, temp_dir.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|p| p.exists()));

        let empty = SegmentationOutput::default();
        let no_rules: Vec<AssociationRule> = Vec::new();
        let written =
            generate_report(Some(&empty), Some(no_rules.as_slice()), 10, temp_dir.path()).unwrap();
        assert!(written.is_empty());
    }

    #[test]
    fn test_rule_label_truncates() {
        let (_, mut rules) = create_test_data();
        rules[0].antecedent.push("PINK REGENCY TEACUP AND SAUCER".to_string());

        let label = rule_label(&rules[0]);
        assert_eq!(label.chars().count(), MAX_RULE_LABEL);
        assert!(label.ends_with('…'));
    }

    #[test]
    fn test_axis_name() {
        let names = ["Champions", "At Risk"];
        assert_eq!(axis_name(&names, 1.0), "At Risk");
        assert_eq!(axis_name(&names, 0.5), "");
        assert_eq!(axis_name(&names, 4.0), "");
        assert_eq!(axis_name(&names, -1.0), "");
    }
}
