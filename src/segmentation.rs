//! RFM metrics, quantile scoring and rule-based customer segmentation

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{NaiveDateTime, TimeDelta};
use log::{debug, info, warn};
use rust_decimal::Decimal;

use crate::config::SegmentationConfig;
use crate::data::Transaction;

const SECONDS_PER_DAY: i64 = 86_400;

/// Named customer segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Champions,
    LoyalCustomers,
    PotentialLoyalists,
    AtRisk,
    ChurnRisk,
}

/// Ordered classification rules; the first predicate that holds wins.
/// Anything that matches none of them is `ChurnRisk`.
const SEGMENT_RULES: [(fn(u8, u8, u8) -> bool, Segment); 4] = [
    (is_champion, Segment::Champions),
    (is_loyal, Segment::LoyalCustomers),
    (is_potential_loyalist, Segment::PotentialLoyalists),
    (is_at_risk, Segment::AtRisk),
];

fn is_champion(r: u8, f: u8, m: u8) -> bool {
    r >= 4 && f >= 4 && m >= 4
}

fn is_loyal(r: u8, f: u8, m: u8) -> bool {
    r >= 3 && f >= 3 && m >= 3
}

fn is_potential_loyalist(r: u8, f: u8, _m: u8) -> bool {
    r >= 4 && f < 3
}

fn is_at_risk(r: u8, f: u8, _m: u8) -> bool {
    r <= 2 && f >= 3
}

impl Segment {
    /// Every segment, in rule priority order
    pub const ALL: [Segment; 5] = [
        Segment::Champions,
        Segment::LoyalCustomers,
        Segment::PotentialLoyalists,
        Segment::AtRisk,
        Segment::ChurnRisk,
    ];

    /// Classify a score triple
    pub fn classify(r_score: u8, f_score: u8, m_score: u8) -> Segment {
        SEGMENT_RULES
            .iter()
            .find(|(matches, _)| matches(r_score, f_score, m_score))
            .map(|&(_, segment)| segment)
            .unwrap_or(Segment::ChurnRisk)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Segment::Champions => "Champions",
            Segment::LoyalCustomers => "Loyal Customers",
            Segment::PotentialLoyalists => "Potential Loyalists",
            Segment::AtRisk => "At Risk",
            Segment::ChurnRisk => "Churn Risk",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw recency/frequency/monetary values for one customer
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerMetrics {
    pub customer_id: String,
    /// Whole days between the snapshot and the latest purchase (floored)
    pub recency: i64,
    /// Distinct orders
    pub frequency: usize,
    pub monetary: Decimal,
    pub last_purchase: NaiveDateTime,
}

/// Scored and segmented customer
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerScore {
    pub customer_id: String,
    pub recency: i64,
    pub frequency: usize,
    pub monetary: Decimal,
    pub r_score: u8,
    pub f_score: u8,
    pub m_score: u8,
    /// Score digits concatenated in R, F, M order, e.g. "453"
    pub label: String,
    pub segment: Segment,
}

/// Per-segment rollup
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSummary {
    pub segment: Segment,
    pub customers: usize,
    /// Fraction of all scored customers
    pub share: f64,
    pub monetary: Decimal,
}

/// Result of a segmentation run
#[derive(Debug, Clone, Default)]
pub struct SegmentationOutput {
    /// Reference date used for recency; `None` when there was nothing to score
    pub snapshot: Option<NaiveDateTime>,
    /// One record per customer, ordered by customer id
    pub scores: Vec<CustomerScore>,
    /// Rows ignored because they carried no customer id
    pub skipped_rows: usize,
}

impl SegmentationOutput {
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Customer count, share and total spend for every segment in rule order
    pub fn segment_summary(&self) -> Vec<SegmentSummary> {
        let total = self.scores.len();

        Segment::ALL
            .iter()
            .map(|&segment| {
                let members = self.scores.iter().filter(|s| s.segment == segment);
                let (customers, monetary) = members.fold((0, Decimal::ZERO), |(n, sum), s| {
                    (n + 1, sum + s.monetary)
                });
                let share = if total == 0 {
                    0.0
                } else {
                    customers as f64 / total as f64
                };

                SegmentSummary {
                    segment,
                    customers,
                    share,
                    monetary,
                }
            })
            .collect()
    }
}

#[derive(Default)]
struct Accumulator<'a> {
    orders: HashSet<&'a str>,
    monetary: Decimal,
    last_purchase: Option<NaiveDateTime>,
}

/// Aggregate transactions into per-customer RFM metrics.
///
/// # Returns
/// * Metrics ordered by customer id, the snapshot used, and the number of rows
///   skipped for lacking a customer id. The snapshot is `None` only when no
///   row could be attributed to a customer.
pub fn compute_metrics(
    transactions: &[Transaction],
    snapshot_override: Option<NaiveDateTime>,
) -> (Vec<CustomerMetrics>, Option<NaiveDateTime>, usize) {
    let mut groups: BTreeMap<&str, Accumulator<'_>> = BTreeMap::new();
    let mut skipped = 0;
    let mut latest: Option<NaiveDateTime> = None;

    for txn in transactions {
        let Some(customer_id) = txn.entity_id.as_deref() else {
            skipped += 1;
            continue;
        };

        let acc = groups.entry(customer_id).or_default();
        acc.orders.insert(txn.order_id.as_str());
        acc.monetary += txn.line_amount();
        acc.last_purchase = acc.last_purchase.max(Some(txn.timestamp));
        latest = latest.max(Some(txn.timestamp));
    }

    let Some(latest) = latest else {
        return (Vec::new(), None, skipped);
    };
    let snapshot = snapshot_override.unwrap_or(latest + TimeDelta::days(1));

    let metrics = groups
        .into_iter()
        .filter_map(|(customer_id, acc)| {
            let last_purchase = acc.last_purchase?;
            let recency = (snapshot - last_purchase)
                .num_seconds()
                .div_euclid(SECONDS_PER_DAY);

            Some(CustomerMetrics {
                customer_id: customer_id.to_string(),
                recency,
                frequency: acc.orders.len(),
                monetary: acc.monetary,
                last_purchase,
            })
        })
        .collect();

    (metrics, Some(snapshot), skipped)
}

/// Assign 1-based bucket scores for one metric.
///
/// Customers are ranked by `key`, ties broken by customer id, and the customer
/// at rank `i` of `n` falls into bucket `i * buckets / n`. Bucket sizes differ
/// by at most one. With `higher_is_better` the top bucket scores `buckets`;
/// otherwise the order is reversed so the smallest values score highest.
pub fn quantile_scores<K, F>(
    metrics: &[CustomerMetrics],
    buckets: u8,
    key: F,
    higher_is_better: bool,
) -> Vec<u8>
where
    K: Ord,
    F: Fn(&CustomerMetrics) -> K,
{
    let n = metrics.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        key(&metrics[a])
            .cmp(&key(&metrics[b]))
            .then_with(|| metrics[a].customer_id.cmp(&metrics[b].customer_id))
    });

    let mut scores = vec![0u8; n];
    for (rank, idx) in order.into_iter().enumerate() {
        // rank < n, so the bucket is always below `buckets`
        let bucket = (rank * buckets as usize / n) as u8;
        scores[idx] = if higher_is_better {
            bucket + 1
        } else {
            buckets - bucket
        };
    }
    scores
}

/// Score and segment every customer in the transaction set.
///
/// Empty input, or input where no row carries a customer id, yields an empty
/// output rather than an error.
pub fn segment_customers(
    transactions: &[Transaction],
    config: &SegmentationConfig,
) -> crate::Result<SegmentationOutput> {
    config.validate()?;

    let (metrics, snapshot, skipped_rows) = compute_metrics(transactions, config.snapshot);

    if skipped_rows > 0 {
        warn!("skipped {skipped_rows} transactions without a customer id");
    }
    if metrics.is_empty() {
        info!("no customers to segment");
        return Ok(SegmentationOutput {
            snapshot,
            scores: Vec::new(),
            skipped_rows,
        });
    }
    if metrics.iter().any(|m| m.recency < 0) {
        warn!("snapshot precedes some purchases; negative recency values present");
    }

    debug!(
        "scoring {} customers into {} buckets against snapshot {:?}",
        metrics.len(),
        config.buckets,
        snapshot
    );

    let r_scores = quantile_scores(&metrics, config.buckets, |m| m.recency, false);
    let f_scores = quantile_scores(&metrics, config.buckets, |m| m.frequency, true);
    let m_scores = quantile_scores(&metrics, config.buckets, |m| m.monetary, true);

    let scores: Vec<CustomerScore> = metrics
        .into_iter()
        .enumerate()
        .map(|(i, m)| {
            let (r, f, mo) = (r_scores[i], f_scores[i], m_scores[i]);
            CustomerScore {
                customer_id: m.customer_id,
                recency: m.recency,
                frequency: m.frequency,
                monetary: m.monetary,
                r_score: r,
                f_score: f,
                m_score: mo,
                label: format!("{r}{f}{mo}"),
                segment: Segment::classify(r, f, mo),
            }
        })
        .collect();

    info!("segmented {} customers", scores.len());

    Ok(SegmentationOutput {
        snapshot,
        scores,
        skipped_rows,
    })
}
