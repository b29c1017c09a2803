use crate::domain::model::{
    Amount, LedgerTransaction, ProcessorTransaction, RawLedgerRecord, RawProcessorRecord,
};
use crate::utils::error::{MatcherError, Result};
use chrono::NaiveDate;

/// Tried in order when no explicit format is configured, or it fails.
/// Day-first comes before month-first, so `03/04/2025` is 3 April.
pub const FALLBACK_DATE_FORMATS: [&str; 5] =
    ["%d/%m/%Y", "%m/%d/%Y", "%Y-%m-%d", "%d-%m-%Y", "%m-%d-%Y"];

const LEDGER_DATE_FORMAT: &str = "%Y-%m-%d";

/// A record that could not be normalized. The batch carries on without it.
#[derive(Debug)]
pub struct ParseFailure {
    pub record_id: String,
    pub error: MatcherError,
}

#[derive(Debug)]
pub struct NormalizedBatch<T> {
    pub records: Vec<T>,
    pub failures: Vec<ParseFailure>,
    /// Parsed fine but dropped by the candidate filter.
    pub filtered: usize,
}

impl<T> Default for NormalizedBatch<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            failures: Vec::new(),
            filtered: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    home_currency: String,
    keywords: Vec<String>,
    date_format: Option<String>,
}

impl Normalizer {
    pub fn new(home_currency: &str, keywords: &[String]) -> Self {
        Self {
            home_currency: home_currency.trim().to_ascii_uppercase(),
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            date_format: None,
        }
    }

    /// Preferred processor date format; `auto` (or none) means only the fallbacks.
    pub fn with_date_format(mut self, format: Option<&str>) -> Self {
        self.date_format = format
            .map(str::trim)
            .filter(|f| !f.is_empty() && !f.eq_ignore_ascii_case("auto"))
            .map(str::to_string);
        self
    }

    pub fn home_currency(&self) -> &str {
        &self.home_currency
    }

    pub fn normalize_ledger(&self, raw: &RawLedgerRecord) -> Result<LedgerTransaction> {
        let id = require_id(&raw.id)?;
        let date = NaiveDate::parse_from_str(raw.date.trim(), LEDGER_DATE_FORMAT)
            .map_err(|e| MatcherError::parse("date", &raw.date, e.to_string()))?;

        Ok(LedgerTransaction {
            id,
            date,
            amount: Amount::from_milliunits(raw.amount),
            payee_name: raw.payee_name.as_deref().unwrap_or("").trim().to_string(),
            memo: non_empty(raw.memo.as_deref()),
        })
    }

    /// Outgoing, and payee or memo contains one of the keywords (case-insensitive).
    pub fn is_ledger_candidate(&self, txn: &LedgerTransaction) -> bool {
        if !txn.amount.is_negative() {
            return false;
        }
        let payee = txn.payee_name.to_lowercase();
        let memo = txn.memo.as_deref().unwrap_or("").to_lowercase();
        self.keywords
            .iter()
            .any(|k| payee.contains(k.as_str()) || memo.contains(k.as_str()))
    }

    pub fn normalize_processor(&self, raw: &RawProcessorRecord) -> Result<ProcessorTransaction> {
        let id = require_id(&raw.id)?;
        let date = parse_date("date", &raw.date, self.date_format.as_deref())?;
        let amount = parse_amount("amount", &raw.amount)?;
        let fee = match non_empty(raw.fee.as_deref()) {
            Some(fee) => Some(parse_amount("fee", &fee)?),
            None => None,
        };
        let currency = non_empty(raw.currency.as_deref())
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or_else(|| self.home_currency.clone());

        Ok(ProcessorTransaction {
            id,
            date,
            amount,
            currency,
            merchant_name: raw.merchant.as_deref().unwrap_or("").trim().to_string(),
            item_title: non_empty(raw.item.as_deref()),
            fee,
            status: non_empty(raw.status.as_deref()),
            kind: non_empty(raw.kind.as_deref()),
        })
    }

    pub fn normalize_ledger_batch(
        &self,
        raws: &[RawLedgerRecord],
    ) -> NormalizedBatch<LedgerTransaction> {
        let mut batch = NormalizedBatch::default();
        for raw in raws {
            if raw.deleted {
                batch.filtered += 1;
                continue;
            }
            match self.normalize_ledger(raw) {
                Ok(txn) if self.is_ledger_candidate(&txn) => batch.records.push(txn),
                Ok(_) => batch.filtered += 1,
                Err(error) => {
                    tracing::warn!("Skipping ledger record '{}': {}", raw.id, error);
                    batch.failures.push(ParseFailure {
                        record_id: raw.id.clone(),
                        error,
                    });
                }
            }
        }
        tracing::debug!(
            "Normalized {} ledger candidates ({} filtered, {} failed)",
            batch.records.len(),
            batch.filtered,
            batch.failures.len()
        );
        batch
    }

    pub fn normalize_processor_batch(
        &self,
        raws: &[RawProcessorRecord],
    ) -> NormalizedBatch<ProcessorTransaction> {
        let mut batch = NormalizedBatch::default();
        for raw in raws {
            match self.normalize_processor(raw) {
                Ok(txn) => batch.records.push(txn),
                Err(error) => {
                    tracing::warn!("Skipping processor record '{}': {}", raw.id, error);
                    batch.failures.push(ParseFailure {
                        record_id: raw.id.clone(),
                        error,
                    });
                }
            }
        }
        tracing::debug!(
            "Normalized {} processor transactions ({} failed)",
            batch.records.len(),
            batch.failures.len()
        );
        batch
    }
}

fn require_id(id: &str) -> Result<String> {
    let id = id.trim();
    if id.is_empty() {
        return Err(MatcherError::parse("id", id, "record has no id"));
    }
    Ok(id.to_string())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parses a processor amount such as `-1,234.50` or `£42.99`.
pub fn parse_amount(field: &str, text: &str) -> Result<Amount> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, ',' | '£' | '$' | '€') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Err(MatcherError::parse(field, text, "value is empty"));
    }
    match cleaned.parse::<f64>() {
        Ok(value) if !value.is_finite() => {
            Err(MatcherError::parse(field, text, "value is not finite"))
        }
        // must fit in i64 milliunits
        Ok(value) if (value * 1000.0).abs() >= i64::MAX as f64 => {
            Err(MatcherError::parse(field, text, "value out of range"))
        }
        Ok(value) => Ok(Amount::from_units(value)),
        Err(e) => Err(MatcherError::parse(field, text, e.to_string())),
    }
}

/// Parses a processor date, trying `preferred` first and then the fallbacks.
pub fn parse_date(field: &str, text: &str, preferred: Option<&str>) -> Result<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return Err(MatcherError::parse(field, text, "value is empty"));
    }

    if let Some(format) = preferred {
        match NaiveDate::parse_from_str(text, format) {
            Ok(date) => return Ok(date),
            Err(_) => tracing::debug!(
                "Date '{}' does not match '{}', falling back to auto-detection",
                text,
                format
            ),
        }
    }

    for format in FALLBACK_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Ok(date);
        }
    }

    // ISO-8601 timestamps from the REST API: keep the calendar date.
    if text.len() > 10 && text.as_bytes()[10] == b'T' {
        if let Some(Ok(date)) = text
            .get(..10)
            .map(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d"))
        {
            return Ok(date);
        }
    }

    Err(MatcherError::parse(field, text, "unrecognised date format"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords() -> Vec<String> {
        vec!["PayPal".to_string(), "Pp *".to_string()]
    }

    fn ledger(id: &str, date: &str, amount: i64, payee: &str) -> RawLedgerRecord {
        RawLedgerRecord {
            id: id.to_string(),
            date: date.to_string(),
            amount,
            payee_name: Some(payee.to_string()),
            memo: None,
            deleted: false,
        }
    }

    fn processor(id: &str, date: &str, amount: &str, currency: Option<&str>) -> RawProcessorRecord {
        RawProcessorRecord {
            id: id.to_string(),
            date: date.to_string(),
            amount: amount.to_string(),
            currency: currency.map(str::to_string),
            merchant: Some("  Steam Games ".to_string()),
            item: Some(String::new()),
            ..Default::default()
        }
    }

    #[test]
    fn test_ledger_keyword_filter_is_case_insensitive() {
        let normalizer = Normalizer::new("GBP", &keywords());
        let mut memo_only = ledger("c", "2025-11-08", -3_000, "Barclays");
        memo_only.memo = Some("PP *EBAY".to_string());

        let batch = normalizer.normalize_ledger_batch(&[
            ledger("a", "2025-11-08", -42_990, "PAYPAL *STEAM"),
            ledger("b", "2025-11-08", -10_000, "Tesco"),
            memo_only,
        ]);

        let ids: Vec<_> = batch.records.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(batch.filtered, 1);
        assert!(batch.failures.is_empty());
    }

    #[test]
    fn test_ledger_inflows_and_deleted_are_filtered() {
        let normalizer = Normalizer::new("GBP", &keywords());
        let mut deleted = ledger("d", "2025-11-08", -5_000, "PayPal");
        deleted.deleted = true;

        let batch = normalizer.normalize_ledger_batch(&[
            ledger("refund", "2025-11-08", 5_000, "PayPal"),
            deleted,
        ]);
        assert!(batch.records.is_empty());
        assert_eq!(batch.filtered, 2);
    }

    #[test]
    fn test_bad_ledger_date_is_skipped_not_fatal() {
        let normalizer = Normalizer::new("GBP", &keywords());
        let batch = normalizer.normalize_ledger_batch(&[
            ledger("bad", "08/11/2025", -5_000, "PayPal"),
            ledger("good", "2025-11-08", -5_000, "PayPal"),
        ]);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].record_id, "bad");
        assert_eq!(batch.failures[0].error.field(), Some("date"));
    }

    #[test]
    fn test_processor_currency_defaults_to_home() {
        let normalizer = Normalizer::new("gbp", &keywords());
        let txn = normalizer
            .normalize_processor(&processor("9", "05/11/2025", "-42.99", None))
            .unwrap();
        assert_eq!(txn.currency, "GBP");
        assert_eq!(txn.amount, Amount::from_milliunits(-42_990));
        assert_eq!(txn.date, NaiveDate::from_ymd_opt(2025, 11, 5).unwrap());
        assert_eq!(txn.merchant_name, "Steam Games");
        assert_eq!(txn.item_title, None);

        let eur = normalizer
            .normalize_processor(&processor("10", "2025-11-05", "-10.00", Some(" eur ")))
            .unwrap();
        assert_eq!(eur.currency, "EUR");
    }

    #[test]
    fn test_processor_parse_errors_name_the_field() {
        let normalizer = Normalizer::new("GBP", &keywords());

        let err = normalizer
            .normalize_processor(&processor("1", "yesterday", "-1.00", None))
            .unwrap_err();
        assert_eq!(err.field(), Some("date"));

        let err = normalizer
            .normalize_processor(&processor("2", "2025-11-05", "abc", None))
            .unwrap_err();
        assert_eq!(err.field(), Some("amount"));

        let mut bad_fee = processor("3", "2025-11-05", "-1.00", None);
        bad_fee.fee = Some("n/a".to_string());
        let err = normalizer.normalize_processor(&bad_fee).unwrap_err();
        assert_eq!(err.field(), Some("fee"));

        let err = normalizer
            .normalize_processor(&processor(" ", "2025-11-05", "-1.00", None))
            .unwrap_err();
        assert_eq!(err.field(), Some("id"));
    }

    #[test]
    fn test_processor_batch_keeps_every_parsed_record() {
        let normalizer = Normalizer::new("GBP", &keywords());
        let batch = normalizer.normalize_processor_batch(&[
            processor("1", "2025-11-05", "-1.00", None),
            processor("2", "2025-11-05", "12.00", None),
            processor("3", "", "-1.00", None),
        ]);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.filtered, 0);
    }

    #[test]
    fn test_parse_amount_strips_symbols_and_separators() {
        assert_eq!(parse_amount("amount", "-1,234.50").unwrap().milliunits(), -1_234_500);
        assert_eq!(parse_amount("amount", "£42.99").unwrap().milliunits(), 42_990);
        assert_eq!(parse_amount("amount", " $ 7 ").unwrap().milliunits(), 7_000);
        assert!(parse_amount("amount", "").is_err());
        assert!(parse_amount("amount", "€").is_err());
    }

    #[test]
    fn test_parse_amount_rejects_values_beyond_milliunit_range() {
        let err = parse_amount("amount", "-1e300").unwrap_err();
        assert_eq!(err.field(), Some("amount"));
        assert!(err.to_string().contains("out of range"));
        assert!(parse_amount("amount", "1e16").is_err());
        assert_eq!(
            parse_amount("amount", "-1e12").unwrap().milliunits(),
            -1_000_000_000_000_000
        );
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 11, 5).unwrap();
        assert_eq!(parse_date("date", "05/11/2025", None).unwrap(), expected);
        assert_eq!(parse_date("date", "2025-11-05", None).unwrap(), expected);
        assert_eq!(parse_date("date", "05-11-2025", None).unwrap(), expected);
        assert_eq!(
            parse_date("date", "2025-11-05T10:15:00+0000", None).unwrap(),
            expected
        );
        // US export with an explicit format
        assert_eq!(
            parse_date("date", "11/05/2025", Some("%m/%d/%Y")).unwrap(),
            expected
        );
        // month 13 only parses month-first
        assert_eq!(
            parse_date("date", "12/13/2025", None).unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 13).unwrap()
        );
        assert!(parse_date("date", "32/13/2025", None).is_err());
    }

    #[test]
    fn test_auto_date_format_means_none() {
        let normalizer = Normalizer::new("GBP", &keywords()).with_date_format(Some("AUTO"));
        assert!(normalizer.date_format.is_none());
    }
}
