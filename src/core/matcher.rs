//! Greedy ledger ↔ processor matching.
//!
//! Ledger transactions are visited oldest first (date, then id). Each one takes
//! the best-scoring processor transaction that no earlier ledger transaction
//! has claimed. The result is deterministic but order-dependent: when two
//! ledger transactions both fit the same processor transaction, the one
//! visited first wins it, even if a joint assignment would score higher
//! overall. A maximum-weight bipartite solver could replace `match_transactions`
//! without changing its signature.
//!
//! Currencies are never converted. A cross-currency pair is compared by raw
//! magnitude and must fall inside the same percentage tolerance; the band is
//! what absorbs exchange-rate drift.

use crate::domain::model::{
    CandidatePair, Confidence, LedgerTransaction, MatchResult, ProcessorTransaction,
    UnmatchedReason,
};
use crate::utils::error::Result;
use crate::utils::validation::{validate_currency_code, validate_non_negative, Validate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Weight of date proximity in the score.
pub const W_DATE: f64 = 0.20;
/// Weight of amount proximity in the score.
pub const W_AMOUNT: f64 = 0.75;
/// Added when the processor charged in the home currency.
pub const CURRENCY_BONUS: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSettings {
    /// How many days a processor transaction may precede its ledger entry.
    pub date_tolerance_days: i64,
    /// Maximum relative amount difference, in percent of the ledger amount.
    pub amount_tolerance_pct: f64,
    pub home_currency: String,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            date_tolerance_days: 7,
            amount_tolerance_pct: 3.0,
            home_currency: "GBP".to_string(),
        }
    }
}

impl Validate for MatchSettings {
    fn validate(&self) -> Result<()> {
        if self.date_tolerance_days < 0 {
            return Err(crate::utils::error::MatcherError::InvalidConfigValueError {
                field: "matching.date_tolerance_days".to_string(),
                value: self.date_tolerance_days.to_string(),
                reason: "Value must be >= 0".to_string(),
            });
        }
        validate_non_negative("matching.amount_tolerance_percent", self.amount_tolerance_pct)?;
        validate_currency_code("matching.home_currency", &self.home_currency)
    }
}

/// Distances between one ledger and one processor transaction.
#[derive(Debug, Clone, Copy)]
struct Distance {
    day_diff: i64,
    /// `None` when the ledger amount is zero and no percentage exists.
    amount_diff_pct: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TransactionMatcher {
    settings: MatchSettings,
}

impl TransactionMatcher {
    /// Rejects negative or non-finite tolerances before any matching happens.
    pub fn new(settings: MatchSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    pub fn match_transactions(
        &self,
        ledger: &[LedgerTransaction],
        processor: &[ProcessorTransaction],
    ) -> Vec<MatchResult> {
        let mut order: Vec<&LedgerTransaction> = ledger.iter().collect();
        order.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));

        let mut consumed: HashSet<&str> = HashSet::new();
        let mut results = Vec::with_capacity(order.len());

        for txn in order {
            let best = self
                .scored_candidates(txn, processor, &consumed)
                .into_iter()
                .min_by(|a, b| rank(&a.1, &b.1));

            match best {
                Some((idx, pair)) => {
                    let matched = &processor[idx];
                    consumed.insert(matched.id.as_str());
                    tracing::debug!(
                        "Ledger {} -> processor {} (score {:.3}, {} days)",
                        txn.id,
                        matched.id,
                        pair.score,
                        pair.day_diff
                    );
                    results.push(MatchResult::Matched {
                        ledger: txn.clone(),
                        processor: matched.clone(),
                        score: pair.score,
                        confidence: Confidence::from_score(pair.score),
                        day_diff: pair.day_diff,
                        amount_diff_pct: pair.amount_diff_pct,
                    });
                }
                None => {
                    let reason = self.classify_unmatched(txn, processor, &consumed);
                    tracing::debug!("Ledger {} unmatched: {}", txn.id, reason);
                    results.push(MatchResult::Unmatched {
                        ledger: txn.clone(),
                        reason,
                    });
                }
            }
        }

        tracing::info!(
            "Matched {}/{} ledger transactions against {} processor transactions",
            consumed.len(),
            results.len(),
            processor.len()
        );
        results
    }

    /// Every unclaimed processor transaction inside both tolerances, scored.
    pub fn candidates(
        &self,
        ledger: &LedgerTransaction,
        processor: &[ProcessorTransaction],
        consumed: &HashSet<&str>,
    ) -> Vec<CandidatePair> {
        self.scored_candidates(ledger, processor, consumed)
            .into_iter()
            .map(|(_, pair)| pair)
            .collect()
    }

    fn scored_candidates(
        &self,
        ledger: &LedgerTransaction,
        processor: &[ProcessorTransaction],
        consumed: &HashSet<&str>,
    ) -> Vec<(usize, CandidatePair)> {
        processor
            .iter()
            .enumerate()
            .filter(|(_, p)| !consumed.contains(p.id.as_str()))
            .filter_map(|(idx, p)| {
                let distance = distance(ledger, p);
                let pct = distance.amount_diff_pct?;
                if !self.date_ok(distance.day_diff) || !self.amount_ok(pct) {
                    return None;
                }
                Some((
                    idx,
                    CandidatePair {
                        ledger_id: ledger.id.clone(),
                        processor_id: p.id.clone(),
                        score: self.score(distance.day_diff, pct, p),
                        day_diff: distance.day_diff,
                        amount_diff_pct: pct,
                    },
                ))
            })
            .collect()
    }

    fn date_ok(&self, day_diff: i64) -> bool {
        (0..=self.settings.date_tolerance_days).contains(&day_diff)
    }

    fn amount_ok(&self, amount_diff_pct: f64) -> bool {
        amount_diff_pct <= self.settings.amount_tolerance_pct
    }

    fn score(&self, day_diff: i64, amount_diff_pct: f64, processor: &ProcessorTransaction) -> f64 {
        let date_component = if self.settings.date_tolerance_days == 0 {
            1.0
        } else {
            1.0 - day_diff as f64 / self.settings.date_tolerance_days as f64
        };
        let amount_component = if self.settings.amount_tolerance_pct == 0.0 {
            1.0
        } else {
            1.0 - amount_diff_pct / self.settings.amount_tolerance_pct
        };
        let bonus = if processor.is_in_currency(&self.settings.home_currency) {
            CURRENCY_BONUS
        } else {
            0.0
        };

        (W_DATE * date_component + W_AMOUNT * amount_component + bonus).clamp(0.0, 1.0)
    }

    /// An amount that fits but a date that does not is reported first, as it
    /// usually means the clearing delay was longer than the tolerance.
    fn classify_unmatched(
        &self,
        ledger: &LedgerTransaction,
        processor: &[ProcessorTransaction],
        consumed: &HashSet<&str>,
    ) -> UnmatchedReason {
        let mut amount_hit = false;
        let mut date_hit = false;

        for p in processor.iter().filter(|p| !consumed.contains(p.id.as_str())) {
            let distance = distance(ledger, p);
            amount_hit |= distance.amount_diff_pct.is_some_and(|pct| self.amount_ok(pct));
            date_hit |= self.date_ok(distance.day_diff);
        }

        if amount_hit {
            UnmatchedReason::NoDateMatch
        } else if date_hit {
            UnmatchedReason::NoAmountMatch
        } else {
            UnmatchedReason::NoCandidateInWindow
        }
    }
}

fn distance(ledger: &LedgerTransaction, processor: &ProcessorTransaction) -> Distance {
    let ledger_abs = ledger.amount.milliunits().unsigned_abs();
    let processor_abs = processor.amount.milliunits().unsigned_abs();
    let amount_diff_pct = (!ledger.amount.is_zero())
        .then(|| ledger_abs.abs_diff(processor_abs) as f64 * 100.0 / ledger_abs as f64);

    Distance {
        day_diff: (ledger.date - processor.date).num_days(),
        amount_diff_pct,
    }
}

/// Best first: score, then fewer days, then smaller amount gap, then id.
fn rank(a: &CandidatePair, b: &CandidatePair) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.day_diff.cmp(&b.day_diff))
        .then_with(|| a.amount_diff_pct.total_cmp(&b.amount_diff_pct))
        .then_with(|| a.processor_id.cmp(&b.processor_id))
}
