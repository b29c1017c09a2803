use crate::domain::model::{Confidence, MatchResult, MemoUpdate, ProcessorTransaction};
use crate::utils::error::{MatcherError, Result};

/// Memo text naming the real merchant, e.g. `Steam (Game) [EUR 12.00]`.
pub fn build_memo(processor: &ProcessorTransaction, home_currency: &str) -> String {
    let mut parts = vec![processor.merchant_name.clone()];
    if let Some(item) = processor.item_title.as_deref().filter(|i| !i.is_empty()) {
        parts.push(format!("({})", item));
    }
    if !processor.is_in_currency(home_currency) {
        parts.push(format!("[{} {}]", processor.currency, processor.amount.abs()));
    }
    parts.join(" ")
}

/// Memo updates for every match at or above `min_confidence`.
///
/// The `None` tier is never written back, so it is rejected as a minimum.
pub fn plan_memo_updates(
    results: &[MatchResult],
    min_confidence: Confidence,
    home_currency: &str,
) -> Result<Vec<MemoUpdate>> {
    if min_confidence == Confidence::None {
        return Err(MatcherError::InvalidConfigValueError {
            field: "confidence".to_string(),
            value: min_confidence.label().to_string(),
            reason: "minimum confidence must be high, medium or low".to_string(),
        });
    }

    let updates: Vec<MemoUpdate> = results
        .iter()
        .filter_map(|result| match result {
            MatchResult::Matched {
                ledger,
                processor,
                confidence,
                ..
            } if *confidence >= min_confidence => Some(MemoUpdate {
                ledger_id: ledger.id.clone(),
                new_memo: build_memo(processor, home_currency),
                merchant_name: processor.merchant_name.clone(),
                confidence: *confidence,
            }),
            _ => None,
        })
        .collect();

    tracing::debug!(
        "Planned {} memo updates at {} confidence or better",
        updates.len(),
        min_confidence
    );
    Ok(updates)
}
