use crate::core::matcher::{MatchSettings, TransactionMatcher};
use crate::core::normalizer::{Normalizer, ParseFailure};
use crate::domain::model::{DateRange, MatchResult, MatchStats, MemoUpdate};
use crate::domain::ports::{ConfigProvider, LedgerSource, LedgerUpdater, ProcessorSource};
use crate::utils::error::{MatcherError, Result};

/// Everything one reconciliation run produced.
#[derive(Debug)]
pub struct ReconcileOutcome {
    pub results: Vec<MatchResult>,
    pub stats: MatchStats,
    pub ledger_failures: Vec<ParseFailure>,
    pub processor_failures: Vec<ParseFailure>,
    /// Ledger records outside the range, deleted, incoming or not matching a keyword.
    pub ledger_filtered: usize,
    /// Processor transactions that were eligible for matching.
    pub processor_count: usize,
}

#[derive(Debug, Default)]
pub struct UpdateOutcome {
    pub applied: usize,
    pub failures: Vec<(String, MatcherError)>,
}

/// Fetch, normalize and match: the extract and transform half of a run.
pub struct Reconciler<L: LedgerSource, P: ProcessorSource> {
    ledger_source: L,
    processor_source: P,
    normalizer: Normalizer,
    settings: MatchSettings,
    outgoing_only: bool,
}

impl<L: LedgerSource, P: ProcessorSource> Reconciler<L, P> {
    pub fn new(ledger_source: L, processor_source: P, config: &impl ConfigProvider) -> Self {
        let settings = config.match_settings();
        let normalizer = Normalizer::new(&settings.home_currency, config.ledger_keywords())
            .with_date_format(config.processor_date_format());
        Self {
            ledger_source,
            processor_source,
            normalizer,
            settings,
            outgoing_only: config.outgoing_only(),
        }
    }

    pub fn ledger_source(&self) -> &L {
        &self.ledger_source
    }

    /// Matches ledger transactions dated inside `range`.
    ///
    /// Processor transactions are fetched from `date_tolerance_days` before
    /// `range.start`, since a payment may settle in the ledger days later.
    pub async fn run(&self, range: DateRange) -> Result<ReconcileOutcome> {
        // Bad tolerances fail here, before any network traffic.
        let matcher = TransactionMatcher::new(self.settings.clone())?;

        tracing::info!("Fetching ledger transactions since {}", range.start);
        let raw_ledger = self.ledger_source.fetch_ledger(range.start).await?;
        let ledger = self.normalizer.normalize_ledger_batch(&raw_ledger);

        let processor_window = range.extend_back(self.settings.date_tolerance_days);
        tracing::info!(
            "Fetching processor transactions from {} to {}",
            processor_window.start,
            processor_window.end
        );
        let raw_processor = self.processor_source.fetch_processor(&processor_window).await?;
        let processor = self.normalizer.normalize_processor_batch(&raw_processor);

        let ledger_total = ledger.records.len();
        let ledger_txns: Vec<_> = ledger
            .records
            .into_iter()
            .filter(|txn| range.contains(txn.date))
            .collect();
        let ledger_filtered = ledger.filtered + (ledger_total - ledger_txns.len());

        let processor_txns: Vec<_> = processor
            .records
            .into_iter()
            .filter(|txn| processor_window.contains(txn.date))
            .filter(|txn| !self.outgoing_only || txn.is_outgoing())
            .collect();

        tracing::info!(
            "Matching {} ledger transactions against {} processor transactions",
            ledger_txns.len(),
            processor_txns.len()
        );

        let results = matcher.match_transactions(&ledger_txns, &processor_txns);
        let stats = MatchStats::from_results(&results);

        Ok(ReconcileOutcome {
            results,
            stats,
            ledger_failures: ledger.failures,
            processor_failures: processor.failures,
            ledger_filtered,
            processor_count: processor_txns.len(),
        })
    }
}

/// Writes each memo in turn. A failed update is recorded and the rest still run.
pub async fn apply_updates<U: LedgerUpdater + ?Sized>(
    updater: &U,
    updates: &[MemoUpdate],
) -> UpdateOutcome {
    let mut outcome = UpdateOutcome::default();
    for update in updates {
        match updater.update_memo(&update.ledger_id, &update.new_memo).await {
            Ok(()) => {
                tracing::info!("Updated {}: {}", update.ledger_id, update.new_memo);
                outcome.applied += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to update {}: {}", update.ledger_id, e);
                outcome.failures.push((update.ledger_id.clone(), e));
            }
        }
    }
    outcome
}
