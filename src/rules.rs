//! Market-basket analysis: level-wise frequent itemsets and association rules

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use log::{debug, info, warn};

use crate::config::RuleMinerConfig;
use crate::data::Transaction;

/// Items are interned to their rank in the sorted item list, so comparing id
/// vectors orders itemsets the same way as comparing item names.
type ItemId = u32;
type Itemset = Vec<ItemId>;

/// Presence-based baskets, one per order
#[derive(Debug, Clone, Default)]
pub struct Baskets {
    /// Distinct item names, sorted; an `ItemId` indexes into this list
    items: Vec<String>,
    /// Sorted, de-duplicated item ids per order
    orders: Vec<Itemset>,
    /// Rows ignored for an empty order or item id
    pub skipped_rows: usize,
}

impl Baskets {
    /// Group item ids by order id. Repeated items within an order count once.
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut grouped: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut skipped_rows = 0;

        for txn in transactions {
            let (order, item) = (txn.order_id.trim(), txn.item_id.trim());
            if order.is_empty() || item.is_empty() {
                skipped_rows += 1;
                continue;
            }
            grouped.entry(order).or_default().insert(item);
        }

        let names: BTreeSet<&str> = grouped.values().flatten().copied().collect();
        let index: HashMap<&str, ItemId> = names
            .iter()
            .enumerate()
            .map(|(i, &name)| (name, i as ItemId))
            .collect();

        // BTreeSet iteration is sorted and the interning is order-preserving,
        // so every basket comes out sorted.
        let orders = grouped
            .into_values()
            .map(|basket| basket.into_iter().map(|item| index[item]).collect())
            .collect();

        Self {
            items: names.into_iter().map(str::to_string).collect(),
            orders,
            skipped_rows,
        }
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    fn names(&self, itemset: &[ItemId]) -> Vec<String> {
        itemset
            .iter()
            .map(|&id| self.items[id as usize].clone())
            .collect()
    }
}

/// An itemset that met the minimum support
#[derive(Debug, Clone, PartialEq)]
pub struct FrequentItemset {
    pub items: Vec<String>,
    pub count: usize,
    pub support: f64,
}

/// A mined association rule `antecedent → consequent`
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationRule {
    pub antecedent: Vec<String>,
    pub consequent: Vec<String>,
    pub antecedent_support: f64,
    pub consequent_support: f64,
    /// Support of antecedent ∪ consequent
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
    /// support − supp(A)·supp(C)
    pub leverage: f64,
    /// (1 − supp(C)) / (1 − confidence); infinite when confidence is 1
    pub conviction: f64,
}

/// Frequent itemsets grouped by size; `levels[k]` holds itemsets of size k+1,
/// each level sorted lexically.
#[derive(Debug, Default)]
struct ItemsetLattice {
    levels: Vec<Vec<Itemset>>,
    counts: HashMap<Itemset, usize>,
}

impl ItemsetLattice {
    fn count(&self, itemset: &[ItemId]) -> usize {
        self.counts.get(itemset).copied().unwrap_or(0)
    }
}

/// Output of a mining run
#[derive(Debug, Clone, Default)]
pub struct RuleMiningOutput {
    pub order_count: usize,
    pub frequent_itemsets: Vec<FrequentItemset>,
    /// Sorted by lift, then confidence (both descending), then item names
    pub rules: Vec<AssociationRule>,
    pub skipped_rows: usize,
}

/// Mine association rules from the transaction set.
///
/// Empty input, or input where nothing reaches the minimum support, yields an
/// empty output rather than an error.
pub fn mine_rules(
    transactions: &[Transaction],
    config: &RuleMinerConfig,
) -> crate::Result<RuleMiningOutput> {
    config.validate()?;

    let baskets = Baskets::from_transactions(transactions);
    if baskets.skipped_rows > 0 {
        warn!(
            "skipped {} transactions without an order or item id",
            baskets.skipped_rows
        );
    }
    debug!(
        "built {} baskets over {} distinct items",
        baskets.order_count(),
        baskets.item_count()
    );

    let lattice = frequent_itemsets(&baskets, config);
    let total = baskets.order_count() as f64;

    let frequent_itemsets = lattice
        .levels
        .iter()
        .flatten()
        .map(|itemset| {
            let count = lattice.count(itemset);
            FrequentItemset {
                items: baskets.names(itemset),
                count,
                support: count as f64 / total,
            }
        })
        .collect::<Vec<_>>();

    let rules = generate_rules(&baskets, &lattice, config);

    info!(
        "found {} frequent itemsets and {} rules across {} orders",
        frequent_itemsets.len(),
        rules.len(),
        baskets.order_count()
    );

    Ok(RuleMiningOutput {
        order_count: baskets.order_count(),
        frequent_itemsets,
        rules,
        skipped_rows: baskets.skipped_rows,
    })
}

fn is_frequent(count: usize, total: usize, min_support: f64) -> bool {
    // Unobserved itemsets are never frequent, even with a zero threshold
    count > 0 && count as f64 / total as f64 >= min_support
}

/// Apriori search: count singletons, then repeatedly join the surviving level
/// into candidates one item larger, drop any candidate with an infrequent
/// subset, and count the rest against every basket.
fn frequent_itemsets(baskets: &Baskets, config: &RuleMinerConfig) -> ItemsetLattice {
    let total = baskets.order_count();
    let mut lattice = ItemsetLattice::default();
    if total == 0 {
        return lattice;
    }

    let mut singles = vec![0usize; baskets.item_count()];
    for basket in &baskets.orders {
        for &item in basket {
            singles[item as usize] += 1;
        }
    }

    let mut level: Vec<Itemset> = Vec::new();
    for (item, &count) in singles.iter().enumerate() {
        if is_frequent(count, total, config.min_support) {
            let itemset = vec![item as ItemId];
            lattice.counts.insert(itemset.clone(), count);
            level.push(itemset);
        }
    }

    let max_len = config.max_itemset_len.unwrap_or(usize::MAX);
    while !level.is_empty() {
        let size = level[0].len();
        debug!("level {size}: {} frequent itemsets", level.len());

        let candidates = if size < max_len {
            candidate_itemsets(&level)
        } else {
            Vec::new()
        };
        lattice.levels.push(level);

        if candidates.is_empty() {
            break;
        }

        let mut counts = vec![0usize; candidates.len()];
        for basket in baskets.orders.iter().filter(|b| b.len() > size) {
            for (idx, candidate) in candidates.iter().enumerate() {
                if is_subset(candidate, basket) {
                    counts[idx] += 1;
                }
            }
        }

        level = Vec::new();
        for (candidate, count) in candidates.into_iter().zip(counts) {
            if is_frequent(count, total, config.min_support) {
                lattice.counts.insert(candidate.clone(), count);
                level.push(candidate);
            }
        }
    }

    lattice
}

/// Join itemsets that share all but their last item, keeping only candidates
/// whose every one-smaller subset is in `level`. `level` must be sorted, and
/// so is the result.
fn candidate_itemsets(level: &[Itemset]) -> Vec<Itemset> {
    let known: HashSet<&[ItemId]> = level.iter().map(Vec::as_slice).collect();
    let mut candidates = Vec::new();

    for (i, left) in level.iter().enumerate() {
        let prefix = &left[..left.len() - 1];
        for right in &level[i + 1..] {
            if &right[..right.len() - 1] != prefix {
                // Sorted input: no later itemset shares this prefix
                break;
            }

            let mut candidate = left.clone();
            candidate.push(right[right.len() - 1]);

            let all_subsets_frequent = (0..candidate.len()).all(|skip| {
                let subset: Itemset = candidate
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != skip)
                    .map(|(_, &item)| item)
                    .collect();
                known.contains(subset.as_slice())
            });

            if all_subsets_frequent {
                candidates.push(candidate);
            }
        }
    }

    candidates
}

/// Both slices sorted ascending
fn is_subset(needle: &[ItemId], haystack: &[ItemId]) -> bool {
    let mut rest = haystack.iter();
    needle
        .iter()
        .all(|item| rest.by_ref().any(|other| other == item))
}

/// Split every frequent itemset of size ≥ 2 into each antecedent/consequent
/// pair and keep the rules that clear the confidence (and optional lift) floor.
fn generate_rules(
    baskets: &Baskets,
    lattice: &ItemsetLattice,
    config: &RuleMinerConfig,
) -> Vec<AssociationRule> {
    let total = baskets.order_count() as f64;
    let mut rules = Vec::new();

    for itemset in lattice.levels.iter().skip(1).flatten() {
        let joint = lattice.count(itemset) as f64;

        // Every mask except the empty and full set picks a non-empty proper antecedent
        for mask in 1..(1u64 << itemset.len()) - 1 {
            let mut antecedent = Itemset::new();
            let mut consequent = Itemset::new();
            for (i, &item) in itemset.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    antecedent.push(item);
                } else {
                    consequent.push(item);
                }
            }

            // Subsets of a frequent itemset are frequent, so both counts are
            // present and non-zero.
            let antecedent_count = lattice.count(&antecedent) as f64;
            let consequent_count = lattice.count(&consequent) as f64;

            let confidence = joint / antecedent_count;
            if confidence < config.min_confidence {
                continue;
            }

            let support = joint / total;
            let antecedent_support = antecedent_count / total;
            let consequent_support = consequent_count / total;
            let lift = confidence / consequent_support;
            if config.min_lift.is_some_and(|min| lift < min) {
                continue;
            }

            let conviction = if confidence >= 1.0 {
                f64::INFINITY
            } else {
                (1.0 - consequent_support) / (1.0 - confidence)
            };

            rules.push(AssociationRule {
                antecedent: baskets.names(&antecedent),
                consequent: baskets.names(&consequent),
                antecedent_support,
                consequent_support,
                support,
                confidence,
                lift,
                leverage: support - antecedent_support * consequent_support,
                conviction,
            });
        }
    }

    rules.sort_by(compare_rules);
    rules
}

/// Rules sorted the way `mine_rules` returns them
pub fn compare_rules(a: &AssociationRule, b: &AssociationRule) -> Ordering {
    b.lift
        .total_cmp(&a.lift)
        .then_with(|| b.confidence.total_cmp(&a.confidence))
        .then_with(|| a.antecedent.cmp(&b.antecedent))
        .then_with(|| a.consequent.cmp(&b.consequent))
}
