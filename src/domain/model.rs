use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Money in milliunits (1/1000 of a currency unit), the ledger's native unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_milliunits(milliunits: i64) -> Self {
        Amount(milliunits)
    }

    /// Rounds to the nearest milliunit, so `42.99` becomes `42990`.
    pub fn from_units(units: f64) -> Self {
        Amount((units * 1000.0).round() as i64)
    }

    pub fn milliunits(self) -> i64 {
        self.0
    }

    pub fn units(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// Saturates at `i64::MAX` instead of overflowing on `i64::MIN`.
    pub fn abs(self) -> Self {
        Amount(self.0.saturating_abs())
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.units())
    }
}

/// A ledger record as delivered by the YNAB API (`data.transactions[]`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLedgerRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub date: String,
    /// Signed milliunits; negative is an outflow.
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub payee_name: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

/// A processor record with every field still in its source text form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProcessorRecord {
    pub id: String,
    pub date: String,
    pub amount: String,
    pub currency: Option<String>,
    pub merchant: Option<String>,
    pub item: Option<String>,
    pub fee: Option<String>,
    pub status: Option<String>,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: String,
    pub date: NaiveDate,
    pub amount: Amount,
    pub payee_name: String,
    pub memo: Option<String>,
}

impl LedgerTransaction {
    /// Free text the keyword filter runs against.
    pub fn descriptor(&self) -> String {
        match self.memo.as_deref().filter(|m| !m.is_empty()) {
            Some(memo) => format!("{} {}", self.payee_name, memo),
            None => self.payee_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorTransaction {
    pub id: String,
    pub date: NaiveDate,
    pub amount: Amount,
    pub currency: String,
    pub merchant_name: String,
    pub item_title: Option<String>,
    pub fee: Option<Amount>,
    pub status: Option<String>,
    pub kind: Option<String>,
}

impl ProcessorTransaction {
    pub fn is_outgoing(&self) -> bool {
        self.amount.is_negative()
    }

    pub fn is_in_currency(&self, currency: &str) -> bool {
        self.currency.eq_ignore_ascii_case(currency)
    }
}

/// Scoring detail for one eligible (ledger, processor) pairing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidatePair {
    pub ledger_id: String,
    pub processor_id: String,
    pub score: f64,
    pub day_diff: i64,
    pub amount_diff_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Confidence {
    #[cfg_attr(feature = "cli", value(skip))]
    None,
    Low,
    Medium,
    High,
}

impl Confidence {
    pub const HIGH_THRESHOLD: f64 = 0.9;
    pub const MEDIUM_THRESHOLD: f64 = 0.7;
    pub const LOW_THRESHOLD: f64 = 0.5;

    pub fn from_score(score: f64) -> Self {
        if score >= Self::HIGH_THRESHOLD {
            Confidence::High
        } else if score >= Self::MEDIUM_THRESHOLD {
            Confidence::Medium
        } else if score >= Self::LOW_THRESHOLD {
            Confidence::Low
        } else {
            Confidence::None
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
            Confidence::None => "none",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Confidence {
    type Err = crate::utils::error::MatcherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Confidence::High),
            "medium" => Ok(Confidence::Medium),
            "low" => Ok(Confidence::Low),
            "none" => Ok(Confidence::None),
            other => Err(crate::utils::error::MatcherError::InvalidConfigValueError {
                field: "confidence".to_string(),
                value: other.to_string(),
                reason: "expected one of high, medium, low".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedReason {
    /// No remaining processor transaction passed either test.
    NoCandidateInWindow,
    /// Some amounts were close enough but every one fell outside the date window.
    NoDateMatch,
    /// Some dates were in the window but no amount was within tolerance.
    NoAmountMatch,
}

impl UnmatchedReason {
    pub fn description(self) -> &'static str {
        match self {
            UnmatchedReason::NoCandidateInWindow => "no processor transaction within tolerance",
            UnmatchedReason::NoDateMatch => "amount matched but outside the date window",
            UnmatchedReason::NoAmountMatch => "date in window but amount outside tolerance",
        }
    }
}

impl fmt::Display for UnmatchedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchResult {
    Matched {
        ledger: LedgerTransaction,
        processor: ProcessorTransaction,
        score: f64,
        confidence: Confidence,
        day_diff: i64,
        amount_diff_pct: f64,
    },
    Unmatched {
        ledger: LedgerTransaction,
        reason: UnmatchedReason,
    },
}

impl MatchResult {
    pub fn ledger(&self) -> &LedgerTransaction {
        match self {
            MatchResult::Matched { ledger, .. } | MatchResult::Unmatched { ledger, .. } => ledger,
        }
    }

    pub fn processor(&self) -> Option<&ProcessorTransaction> {
        match self {
            MatchResult::Matched { processor, .. } => Some(processor),
            MatchResult::Unmatched { .. } => None,
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            MatchResult::Matched { score, .. } => *score,
            MatchResult::Unmatched { .. } => 0.0,
        }
    }

    pub fn confidence(&self) -> Confidence {
        match self {
            MatchResult::Matched { confidence, .. } => *confidence,
            MatchResult::Unmatched { .. } => Confidence::None,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchStats {
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub very_low: usize,
}

impl MatchStats {
    pub fn from_results(results: &[MatchResult]) -> Self {
        let mut stats = MatchStats {
            total: results.len(),
            ..Default::default()
        };
        for result in results {
            match result {
                MatchResult::Matched { confidence, .. } => {
                    stats.matched += 1;
                    match confidence {
                        Confidence::High => stats.high += 1,
                        Confidence::Medium => stats.medium += 1,
                        Confidence::Low => stats.low += 1,
                        Confidence::None => stats.very_low += 1,
                    }
                }
                MatchResult::Unmatched { .. } => stats.unmatched += 1,
            }
        }
        stats
    }

    pub fn match_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.matched as f64 / self.total as f64 * 100.0
        }
    }
}

/// A memo rewrite destined for the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoUpdate {
    pub ledger_id: String,
    pub new_memo: String,
    pub merchant_name: String,
    pub confidence: Confidence,
}

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The `days` days up to and including `end`.
    pub fn last_days(end: NaiveDate, days: u32) -> Self {
        Self {
            start: end - Duration::days(i64::from(days)),
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn extend_back(&self, days: i64) -> Self {
        Self {
            start: self.start - Duration::days(days),
            end: self.end,
        }
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}
