use crate::domain::model::{Amount, Confidence, MatchResult, MatchStats};
use crate::utils::error::{MatcherError, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

const RULE_WIDTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Txt,
    Csv,
    Json,
}

impl ReportFormat {
    pub fn file_name(self) -> &'static str {
        match self {
            ReportFormat::Txt => "matches.txt",
            ReportFormat::Csv => "matches.csv",
            ReportFormat::Json => "matches.json",
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = MatcherError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(ReportFormat::Txt),
            "csv" => Ok(ReportFormat::Csv),
            "json" => Ok(ReportFormat::Json),
            other => Err(MatcherError::InvalidConfigValueError {
                field: "output.formats".to_string(),
                value: other.to_string(),
                reason: "Unsupported format. Valid formats: txt, csv, json".to_string(),
            }),
        }
    }
}

pub fn format_money(amount: Amount, currency: &str) -> String {
    let magnitude = amount.abs();
    match currency.to_ascii_uppercase().as_str() {
        "GBP" => format!("£{}", magnitude),
        "USD" => format!("${}", magnitude),
        "EUR" => format!("€{}", magnitude),
        other => format!("{} {}", other, magnitude),
    }
}

/// Human-readable report grouped by confidence tier.
pub fn format_match_report(
    results: &[MatchResult],
    show_unmatched: bool,
    home_currency: &str,
) -> String {
    let stats = MatchStats::from_results(results);
    let mut lines = vec![
        "=".repeat(RULE_WIDTH),
        "YNAB-PayPal Transaction Matches".to_string(),
        "=".repeat(RULE_WIDTH),
        String::new(),
        format!("Total YNAB PayPal transactions: {}", stats.total),
        format!("Matched: {} ({:.1}%)", stats.matched, stats.match_rate()),
        format!("Unmatched: {}", stats.unmatched),
        String::new(),
        "=".repeat(RULE_WIDTH),
        String::new(),
    ];

    let sections: [(&str, &[Confidence]); 3] = [
        ("HIGH CONFIDENCE MATCHES", &[Confidence::High]),
        ("MEDIUM CONFIDENCE MATCHES", &[Confidence::Medium]),
        ("LOW CONFIDENCE MATCHES", &[Confidence::Low, Confidence::None]),
    ];

    for (title, tiers) in sections {
        let section: Vec<&MatchResult> = results
            .iter()
            .filter(|r| r.is_matched() && tiers.contains(&r.confidence()))
            .collect();
        if section.is_empty() {
            continue;
        }
        lines.push(format!("{} ({}):", title, section.len()));
        lines.push("-".repeat(RULE_WIDTH));
        for result in section {
            lines.extend(format_single_match(result, home_currency));
            lines.push(String::new());
        }
    }

    if show_unmatched {
        let unmatched: Vec<&MatchResult> = results.iter().filter(|r| !r.is_matched()).collect();
        if !unmatched.is_empty() {
            lines.push(format!("UNMATCHED YNAB TRANSACTIONS ({}):", unmatched.len()));
            lines.push("-".repeat(RULE_WIDTH));
            for result in unmatched {
                if let MatchResult::Unmatched { ledger, reason } = result {
                    lines.push(format!(
                        "YNAB: {} | {} | {}",
                        ledger.date,
                        format_money(ledger.amount, home_currency),
                        ledger.payee_name
                    ));
                    if let Some(memo) = &ledger.memo {
                        lines.push(format!("      Memo: {}", memo));
                    }
                    lines.push(format!("      Reason: {}", reason));
                    lines.push(String::new());
                }
            }
        }
    }

    lines.join("\n")
}

fn format_single_match(result: &MatchResult, home_currency: &str) -> Vec<String> {
    let MatchResult::Matched {
        ledger,
        processor,
        score,
        confidence,
        day_diff,
        ..
    } = result
    else {
        return Vec::new();
    };

    let mut lines = vec![format!(
        "YNAB:   {} | {} | {}",
        ledger.date,
        format_money(ledger.amount, home_currency),
        ledger.payee_name
    )];
    if let Some(memo) = &ledger.memo {
        lines.push(format!("        Memo: {}", memo));
    }
    lines.push(format!(
        "PayPal: {} | {} | {}",
        processor.date,
        format_money(processor.amount, &processor.currency),
        processor.merchant_name
    ));
    if let Some(item) = &processor.item_title {
        lines.push(format!("        Item: {}", item));
    }
    lines.push(format!(
        "Match:  Score: {:.2} | Confidence: {} | Days diff: {}",
        score,
        confidence.label().to_uppercase(),
        day_diff
    ));
    lines
}

#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    ledger_id: &'a str,
    ledger_date: String,
    ledger_amount: String,
    payee_name: &'a str,
    processor_id: &'a str,
    processor_date: String,
    processor_amount: String,
    currency: &'a str,
    merchant_name: &'a str,
    item_title: &'a str,
    score: String,
    confidence: &'static str,
    day_diff: String,
    reason: &'a str,
}

impl<'a> From<&'a MatchResult> for ResultRow<'a> {
    fn from(result: &'a MatchResult) -> Self {
        let ledger = result.ledger();
        let mut row = ResultRow {
            ledger_id: &ledger.id,
            ledger_date: ledger.date.to_string(),
            ledger_amount: ledger.amount.to_string(),
            payee_name: &ledger.payee_name,
            processor_id: "",
            processor_date: String::new(),
            processor_amount: String::new(),
            currency: "",
            merchant_name: "",
            item_title: "",
            score: String::new(),
            confidence: result.confidence().label(),
            day_diff: String::new(),
            reason: "",
        };
        match result {
            MatchResult::Matched {
                processor,
                score,
                day_diff,
                ..
            } => {
                row.processor_id = &processor.id;
                row.processor_date = processor.date.to_string();
                row.processor_amount = processor.amount.to_string();
                row.currency = &processor.currency;
                row.merchant_name = &processor.merchant_name;
                row.item_title = processor.item_title.as_deref().unwrap_or("");
                row.score = format!("{:.4}", score);
                row.day_diff = day_diff.to_string();
            }
            MatchResult::Unmatched { reason, .. } => {
                row.reason = reason.description();
            }
        }
        row
    }
}

pub fn results_to_csv(results: &[MatchResult]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for result in results {
        writer.serialize(ResultRow::from(result))?;
    }
    writer
        .into_inner()
        .map_err(|e| MatcherError::IoError(e.into_error()))
}

pub fn results_to_json(results: &[MatchResult]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(results)?)
}

/// Renders each requested format to `(file name, bytes)`.
pub fn render_outputs(
    results: &[MatchResult],
    formats: &[ReportFormat],
    show_unmatched: bool,
    home_currency: &str,
) -> Result<Vec<(String, Vec<u8>)>> {
    let mut files = Vec::with_capacity(formats.len());
    for format in formats {
        let data = match format {
            ReportFormat::Txt => {
                format_match_report(results, show_unmatched, home_currency).into_bytes()
            }
            ReportFormat::Csv => results_to_csv(results)?,
            ReportFormat::Json => results_to_json(results)?,
        };
        files.push((format.file_name().to_string(), data));
    }
    Ok(files)
}

pub fn bundle_outputs(files: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    tracing::debug!("Creating ZIP file with {} files", files.len());

    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in files {
        zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
        zip.write_all(data)?;
    }
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}
