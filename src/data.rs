//! Transaction loading and cleaning using Polars

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use polars::prelude::*;
use rust_decimal::Decimal;

use crate::error::AnalysisError;

pub const ORDER_COLUMN: &str = "InvoiceNo";
pub const CUSTOMER_COLUMN: &str = "CustomerID";
pub const QUANTITY_COLUMN: &str = "Quantity";
pub const PRICE_COLUMN: &str = "UnitPrice";
pub const DATE_COLUMN: &str = "InvoiceDate";
pub const DEFAULT_ITEM_COLUMN: &str = "Description";

/// Timestamp layouts accepted in the date column, tried in order after RFC 3339
const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

/// A single cleaned order line
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub order_id: String,
    /// Customer; `None` rows are ignored by the segmentation engine
    pub entity_id: Option<String>,
    pub item_id: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub timestamp: NaiveDateTime,
}

impl Transaction {
    pub fn new(
        order_id: impl Into<String>,
        entity_id: Option<String>,
        item_id: impl Into<String>,
        quantity: i64,
        unit_price: Decimal,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            entity_id,
            item_id: item_id.into(),
            quantity,
            unit_price,
            timestamp,
        }
    }

    /// quantity × unit_price
    pub fn line_amount(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }
}

/// Options controlling how the CSV is interpreted
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Column holding the product identifier used for baskets
    pub item_column: String,
    /// Apply the raw-data cleaning filters (missing customer, cancellations,
    /// non-positive quantity or price)
    pub clean: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            item_column: DEFAULT_ITEM_COLUMN.to_string(),
            clean: false,
        }
    }
}

/// Per-rule row counts from a load. Filters apply in order, so each row is
/// counted against the first rule that rejected it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleaningReport {
    pub rows_read: usize,
    pub missing_customer: usize,
    pub cancelled: usize,
    pub non_positive_quantity: usize,
    pub non_positive_price: usize,
    /// Rows with a missing or unparseable required field
    pub malformed: usize,
    pub rows_kept: usize,
}

impl CleaningReport {
    pub fn rows_removed(&self) -> usize {
        self.rows_read - self.rows_kept
    }

    /// Percentage of input rows dropped, rounded to two decimals
    pub fn removed_pct(&self) -> f64 {
        if self.rows_read == 0 {
            return 0.0;
        }
        let pct = 100.0 * self.rows_removed() as f64 / self.rows_read as f64;
        (pct * 100.0).round() / 100.0
    }
}

#[derive(Debug)]
pub struct LoadedTransactions {
    pub transactions: Vec<Transaction>,
    pub report: CleaningReport,
}

enum Rejection {
    MissingCustomer,
    Cancelled,
    NonPositiveQuantity,
    NonPositivePrice,
    Malformed(AnalysisError),
}

struct RawRow<'a> {
    order_id: Option<&'a str>,
    entity_id: Option<&'a str>,
    item_id: Option<&'a str>,
    quantity: Option<&'a str>,
    unit_price: Option<&'a str>,
    timestamp: Option<&'a str>,
}

/// Load a transaction CSV into memory.
///
/// Every column is read as text and parsed explicitly so that ids such as
/// `InvoiceNo` keep their exact spelling (`C536379` and `536365` in one column).
///
/// # Arguments
/// * `path` - Path to the CSV file (header row required)
/// * `options` - Item column and cleaning switch
///
/// # Returns
/// * The parsed transactions together with a `CleaningReport`
pub fn load_transactions(
    path: impl AsRef<Path>,
    options: &LoadOptions,
) -> crate::Result<LoadedTransactions> {
    let path = path.as_ref();
    debug!("reading transactions from {}", path.display());

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let orders = string_column(&df, ORDER_COLUMN)?;
    let customers = string_column(&df, CUSTOMER_COLUMN)?;
    let items = string_column(&df, &options.item_column)?;
    let quantities = string_column(&df, QUANTITY_COLUMN)?;
    let prices = string_column(&df, PRICE_COLUMN)?;
    let dates = string_column(&df, DATE_COLUMN)?;

    let (orders, customers, items) = (orders.str()?, customers.str()?, items.str()?);
    let (quantities, prices, dates) = (quantities.str()?, prices.str()?, dates.str()?);

    let mut report = CleaningReport {
        rows_read: df.height(),
        ..Default::default()
    };
    let mut transactions = Vec::with_capacity(df.height());

    for idx in 0..df.height() {
        let raw = RawRow {
            order_id: orders.get(idx),
            entity_id: customers.get(idx),
            item_id: items.get(idx),
            quantity: quantities.get(idx),
            unit_price: prices.get(idx),
            timestamp: dates.get(idx),
        };

        // Row numbers are 1-based and count the header line
        match parse_row(idx + 2, &raw, options.clean) {
            Ok(txn) => transactions.push(txn),
            Err(Rejection::MissingCustomer) => report.missing_customer += 1,
            Err(Rejection::Cancelled) => report.cancelled += 1,
            Err(Rejection::NonPositiveQuantity) => report.non_positive_quantity += 1,
            Err(Rejection::NonPositivePrice) => report.non_positive_price += 1,
            Err(Rejection::Malformed(err)) => {
                if report.malformed == 0 {
                    debug!("first malformed row: {err}");
                }
                report.malformed += 1;
            }
        }
    }
    report.rows_kept = transactions.len();

    if report.malformed > 0 {
        warn!(
            "skipped {} malformed rows in {}",
            report.malformed,
            path.display()
        );
    }

    if transactions.is_empty() {
        return Err(AnalysisError::InvalidInput(format!(
            "no valid transactions found in {} after filtering",
            path.display()
        )));
    }

    info!(
        "loaded {} of {} rows ({}% removed)",
        report.rows_kept,
        report.rows_read,
        report.removed_pct()
    );

    Ok(LoadedTransactions {
        transactions,
        report,
    })
}

/// Fetch a column as text, mapping absence to `MissingColumn`
fn string_column(df: &DataFrame, name: &str) -> crate::Result<Series> {
    let series = df
        .column(name)
        .map_err(|_| AnalysisError::MissingColumn(name.to_string()))?;
    Ok(series.cast(&DataType::String)?)
}

fn parse_row(row: usize, raw: &RawRow<'_>, clean: bool) -> Result<Transaction, Rejection> {
    let order_id = required(row, ORDER_COLUMN, raw.order_id)?;
    let entity_id = non_empty(raw.entity_id).map(normalize_entity_id);

    if clean && entity_id.is_none() {
        return Err(Rejection::MissingCustomer);
    }
    if clean && order_id.starts_with('C') {
        return Err(Rejection::Cancelled);
    }

    let quantity_text = required(row, QUANTITY_COLUMN, raw.quantity)?;
    let quantity =
        parse_quantity(quantity_text).ok_or_else(|| malformed(row, QUANTITY_COLUMN, quantity_text))?;
    if clean && quantity <= 0 {
        return Err(Rejection::NonPositiveQuantity);
    }

    let price_text = required(row, PRICE_COLUMN, raw.unit_price)?;
    let unit_price = Decimal::from_str(price_text)
        .or_else(|_| Decimal::from_scientific(price_text))
        .map_err(|_| malformed(row, PRICE_COLUMN, price_text))?;
    if clean && unit_price <= Decimal::ZERO {
        return Err(Rejection::NonPositivePrice);
    }

    let item_id = required(row, "item", raw.item_id)?;

    let date_text = required(row, DATE_COLUMN, raw.timestamp)?;
    let timestamp = parse_timestamp(date_text).ok_or_else(|| malformed(row, DATE_COLUMN, date_text))?;

    Ok(Transaction {
        order_id: order_id.to_string(),
        entity_id,
        item_id: item_id.to_string(),
        quantity,
        unit_price,
        timestamp,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(
    row: usize,
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, Rejection> {
    non_empty(value).ok_or_else(|| malformed(row, field, ""))
}

fn malformed(row: usize, field: &'static str, value: &str) -> Rejection {
    Rejection::Malformed(AnalysisError::Parse {
        row,
        field,
        value: value.to_string(),
    })
}

/// Integral quantities, also accepting a float rendering such as `6.0`
fn parse_quantity(value: &str) -> Option<i64> {
    if let Ok(q) = value.parse::<i64>() {
        return Some(q);
    }
    let q = value.parse::<f64>().ok()?;
    (q.is_finite() && q.fract() == 0.0).then_some(q as i64)
}

/// Customer ids exported through a float column come back as `17850.0`
fn normalize_entity_id(value: &str) -> String {
    match value.strip_suffix(".0") {
        Some(id) if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) => id.to_string(),
        _ => value.to_string(),
    }
}

/// Parse a timestamp in any of the accepted layouts.
///
/// RFC 3339 values are converted to UTC before the offset is dropped.
/// A bare `YYYY-MM-DD` date resolves to midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
