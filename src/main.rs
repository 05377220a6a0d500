//! RetailForge: RFM segmentation and association rules from the command line
//!
//! This is the main entrypoint that orchestrates data loading, both analyses,
//! table export and optional charts.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::debug;
use retailforge::{
    export, load_transactions, mine_rules, segment_customers, viz, Args, CleaningReport, Segment,
    Stage,
};

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.verbose {
        println!("RetailForge - Customer Segmentation & Market Basket Analysis");
        println!("============================================================\n");
    }

    // Classification mode needs no data
    if let Some((r, f, m)) = args.parse_score_triple()? {
        run_classify_mode(r, f, m);
        return Ok(());
    }

    run_full_pipeline(&args)
}

/// `RUST_LOG` wins; otherwise `--verbose` selects debug output
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

/// Print the label and segment for a single score triple
fn run_classify_mode(r: u8, f: u8, m: u8) {
    println!("=== Classification Mode ===");
    println!("Input scores: R={r}, F={f}, M={m}");
    println!("\n✓ RFM score: {r}{f}{m}");
    println!("  Segment: {}", Segment::classify(r, f, m));
}

/// Run load, segmentation, rule mining and export
fn run_full_pipeline(args: &Args) -> Result<()> {
    println!("=== Full Analysis Pipeline ===\n");

    // Reject bad settings before touching the data
    let segmentation_config = args.segmentation_config()?;
    let rule_config = args.rule_config()?;
    let output_dir = Path::new(&args.output_dir);

    let start_time = Instant::now();

    // Step 1: Load transactions
    if args.verbose {
        println!("Step 1: Loading transactions");
        println!("  Input file: {}", args.input);
        println!("  Cleaning filters: {}", if args.clean { "on" } else { "off" });
    }

    let data_start = Instant::now();
    let loaded = load_transactions(&args.input, &args.load_options())
        .with_context(|| format!("failed to load transactions from {}", args.input))?;
    let data_time = data_start.elapsed();

    println!("✓ Data loaded: {} transactions", loaded.transactions.len());
    if args.verbose {
        print_cleaning_report(&loaded.report);
        println!("  Processing time: {:.2}s", data_time.as_secs_f64());
    }

    // Step 2: RFM segmentation
    let mut segments = None;
    if args.runs(Stage::Segments) {
        if args.verbose {
            println!("\nStep 2: Scoring customers");
            println!("  Buckets: {}", segmentation_config.buckets);
        }

        let seg_start = Instant::now();
        let output = segment_customers(&loaded.transactions, &segmentation_config)?;
        debug!("segmentation took {:?}", seg_start.elapsed());

        println!("✓ Customers segmented: {}", output.scores.len());
        if output.skipped_rows > 0 {
            println!("  Skipped rows without customer: {}", output.skipped_rows);
        }

        let path = output_dir.join(export::SEGMENTS_FILE);
        export::write_segments_csv(&path, &output.scores)?;
        println!("  Segments saved to: {}", path.display());

        viz::print_segment_statistics(&output);
        segments = Some(output);
    }

    // Step 3: Association rules
    let mut rules = None;
    if args.runs(Stage::Rules) {
        if args.verbose {
            println!("\nStep 3: Mining association rules");
            println!("  Minimum support: {}", rule_config.min_support);
            println!("  Minimum confidence: {}", rule_config.min_confidence);
        }

        let rules_start = Instant::now();
        let output = mine_rules(&loaded.transactions, &rule_config)?;
        debug!("rule mining took {:?}", rules_start.elapsed());

        println!(
            "\n✓ Rules mined: {} from {} frequent itemsets over {} orders",
            output.rules.len(),
            output.frequent_itemsets.len(),
            output.order_count
        );

        let path = output_dir.join(export::RULES_FILE);
        export::write_rules_csv(&path, &output.rules)?;
        println!("  Rules saved to: {}", path.display());

        viz::print_top_rules(&output.rules, args.top);
        rules = Some(output.rules);
    }

    // Step 4: Charts
    if args.charts {
        let written = viz::generate_report(
            segments.as_ref(),
            rules.as_deref(),
            args.top,
            output_dir,
        )?;
        println!("\n✓ Charts generated: {}", written.len());
        for path in written {
            println!("  {}", path.display());
        }
    }

    let total_time = start_time.elapsed();
    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", total_time.as_secs_f64());

    Ok(())
}

fn print_cleaning_report(report: &CleaningReport) {
    println!("  Rows read: {}", report.rows_read);
    println!("  Missing customer: {}", report.missing_customer);
    println!("  Cancelled invoices: {}", report.cancelled);
    println!("  Non-positive quantity: {}", report.non_positive_quantity);
    println!("  Non-positive price: {}", report.non_positive_price);
    println!("  Malformed: {}", report.malformed);
    println!(
        "  Rows kept: {} ({}% removed)",
        report.rows_kept,
        report.removed_pct()
    );
}
