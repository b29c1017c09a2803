use crate::core::normalizer::parse_amount;
use crate::domain::model::{DateRange, RawProcessorRecord};
use crate::domain::ports::{ProcessorSource, Storage};
use crate::utils::error::Result;
use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Date,
    Name,
    Type,
    Status,
    Currency,
    Gross,
    Fee,
    Net,
    TransactionId,
    ItemTitle,
}

/// Header names seen across PayPal regions and account types, most specific first.
const COLUMN_ALIASES: [(Column, &[&str]); 10] = [
    (Column::Date, &["Date", "Transaction Date"]),
    (Column::Name, &["Name", "To", "From", "Counterparty Name"]),
    (Column::Type, &["Type", "Transaction Type"]),
    (Column::Status, &["Status", "Transaction Status"]),
    (Column::Currency, &["Currency", "Original Currency"]),
    (Column::Gross, &["Gross", "Amount", "Gross Amount"]),
    (Column::Fee, &["Fee", "Fees", "Transaction Fee"]),
    (Column::Net, &["Net", "Total", "Net Amount"]),
    (Column::TransactionId, &["Transaction ID", "Reference Txn ID"]),
    (Column::ItemTitle, &["Item Title", "Subject", "Note"]),
];

#[derive(Debug, Default)]
struct ColumnMap {
    indices: Vec<(Column, usize)>,
}

impl ColumnMap {
    fn detect(headers: &StringRecord) -> Self {
        let cleaned: Vec<String> = headers
            .iter()
            .map(|h| h.trim().trim_matches('"').trim_matches('\'').trim().to_string())
            .collect();

        let mut indices = Vec::new();
        for (column, aliases) in COLUMN_ALIASES {
            let found = aliases.iter().find_map(|alias| {
                cleaned
                    .iter()
                    .position(|header| header.eq_ignore_ascii_case(alias))
            });
            if let Some(index) = found {
                indices.push((column, index));
            }
        }
        Self { indices }
    }

    fn get<'r>(&self, record: &'r StringRecord, column: Column) -> Option<&'r str> {
        self.indices
            .iter()
            .find(|(c, _)| *c == column)
            .and_then(|(_, index)| record.get(*index))
            .map(str::trim)
    }

    fn has(&self, column: Column) -> bool {
        self.indices.iter().any(|(c, _)| *c == column)
    }
}

fn owned(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Incoming payments and currency conversions carry non-negative gross and net.
fn is_incoming(gross: &str, net: Option<&str>) -> bool {
    let non_negative = |text: &str| parse_amount("amount", text).is_ok_and(|a| !a.is_negative());
    non_negative(gross) && net.filter(|n| !n.is_empty()).map_or(true, non_negative)
}

/// Parses a PayPal activity export into raw processor records.
///
/// Rows without a transaction id get `row-N` (N = 1-based data row) so they
/// remain distinct in the matcher's consumed set.
pub fn parse_paypal_csv(data: &[u8]) -> Result<Vec<RawProcessorRecord>> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    let sample = &data[..data.len().min(1024)];
    let delimiter = if sample.contains(&b'\t') { b'\t' } else { b',' };

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(data);

    let columns = ColumnMap::detect(reader.headers()?);
    if !columns.has(Column::Gross) {
        tracing::warn!("PayPal CSV has no Gross/Amount column; every row will fail to parse");
    }

    let mut records = Vec::new();
    let mut total_rows = 0usize;
    let mut skipped_rows = 0usize;

    for (row, result) in reader.records().enumerate() {
        let record = result?;
        total_rows += 1;

        let gross = columns.get(&record, Column::Gross).unwrap_or("");
        let net = columns.get(&record, Column::Net);
        if is_incoming(gross, net) {
            skipped_rows += 1;
            continue;
        }

        let id = columns
            .get(&record, Column::TransactionId)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("row-{}", row + 1));

        records.push(RawProcessorRecord {
            id,
            date: columns.get(&record, Column::Date).unwrap_or("").to_string(),
            amount: gross.to_string(),
            currency: owned(columns.get(&record, Column::Currency)),
            merchant: owned(columns.get(&record, Column::Name)),
            item: owned(columns.get(&record, Column::ItemTitle)),
            fee: owned(columns.get(&record, Column::Fee)),
            status: owned(columns.get(&record, Column::Status)),
            kind: owned(columns.get(&record, Column::Type)),
        });
    }

    if skipped_rows > 0 {
        tracing::info!(
            "Skipped {} rows out of {} (incoming payments or currency conversions)",
            skipped_rows,
            total_rows
        );
    }
    tracing::info!("Read {} outgoing rows from PayPal CSV", records.len());
    Ok(records)
}

/// Processor source backed by an exported CSV file.
pub struct PayPalCsvSource<S: Storage> {
    storage: S,
    path: String,
}

impl<S: Storage> PayPalCsvSource<S> {
    pub fn new(storage: S, path: impl Into<String>) -> Self {
        Self {
            storage,
            path: path.into(),
        }
    }
}

#[async_trait]
impl<S: Storage> ProcessorSource for PayPalCsvSource<S> {
    /// The export covers whatever the user downloaded; the caller trims it to `range`.
    async fn fetch_processor(&self, _range: &DateRange) -> Result<Vec<RawProcessorRecord>> {
        tracing::info!("Parsing PayPal CSV: {}", self.path);
        let data = self.storage.read_file(&self.path).await?;
        parse_paypal_csv(&data)
    }
}
