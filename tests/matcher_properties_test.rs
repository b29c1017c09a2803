use chrono::{Duration, NaiveDate};
use std::collections::HashSet;
use ynab_paypal_matcher::{
    Amount, Confidence, LedgerTransaction, MatchResult, MatchSettings, ProcessorTransaction,
    TransactionMatcher,
};

/// Small deterministic generator so every run sees the same data sets.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 1).unwrap()
}

fn generate(
    seed: u64,
    ledger_count: usize,
    processor_count: usize,
) -> (Vec<LedgerTransaction>, Vec<ProcessorTransaction>) {
    let mut rng = Lcg(seed);

    let ledger = (0..ledger_count)
        .map(|i| LedgerTransaction {
            id: format!("y{:03}", i),
            date: base_date() + Duration::days(rng.below(30) as i64),
            // few distinct amounts so transactions compete for the same candidates
            amount: Amount::from_milliunits(-(1_000 + rng.below(8) as i64 * 2_500)),
            payee_name: "PayPal".to_string(),
            memo: None,
        })
        .collect();

    let processor = (0..processor_count)
        .map(|i| {
            let base = 1_000 + rng.below(8) as i64 * 2_500;
            let jitter = rng.below(101) as i64 - 50;
            ProcessorTransaction {
                id: format!("p{:03}", i),
                date: base_date() + Duration::days(rng.below(30) as i64),
                amount: Amount::from_milliunits(-(base + jitter)),
                currency: if rng.below(4) == 0 { "EUR" } else { "GBP" }.to_string(),
                merchant_name: format!("Merchant {}", i),
                item_title: None,
                fee: None,
                status: None,
                kind: None,
            }
        })
        .collect();

    (ledger, processor)
}

fn matcher(days: i64, pct: f64) -> TransactionMatcher {
    TransactionMatcher::new(MatchSettings {
        date_tolerance_days: days,
        amount_tolerance_pct: pct,
        home_currency: "GBP".to_string(),
    })
    .unwrap()
}

const SEEDS: [u64; 6] = [1, 7, 42, 1234, 99_991, 31_337];

#[test]
fn no_processor_transaction_is_matched_twice() {
    for seed in SEEDS {
        let (ledger, processor) = generate(seed, 40, 30);
        let results = matcher(7, 3.0).match_transactions(&ledger, &processor);

        let mut seen = HashSet::new();
        for result in &results {
            if let Some(p) = result.processor() {
                assert!(seen.insert(p.id.clone()), "seed {seed}: {} used twice", p.id);
            }
        }
    }
}

#[test]
fn every_ledger_transaction_gets_exactly_one_result() {
    for seed in SEEDS {
        let (ledger, processor) = generate(seed, 35, 50);
        let results = matcher(7, 3.0).match_transactions(&ledger, &processor);

        assert_eq!(results.len(), ledger.len());
        let ids: HashSet<&str> = results.iter().map(|r| r.ledger().id.as_str()).collect();
        assert_eq!(ids.len(), ledger.len());
    }
}

#[test]
fn results_are_in_date_then_id_order() {
    let (ledger, processor) = generate(5, 30, 30);
    let results = matcher(7, 3.0).match_transactions(&ledger, &processor);

    let keys: Vec<(NaiveDate, String)> = results
        .iter()
        .map(|r| (r.ledger().date, r.ledger().id.clone()))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn scores_are_bounded_and_matched_tiers_agree() {
    for seed in SEEDS {
        let (ledger, processor) = generate(seed, 20, 40);
        let m = matcher(10, 5.0);

        for txn in &ledger {
            for pair in m.candidates(txn, &processor, &HashSet::new()) {
                assert!((0.0..=1.0).contains(&pair.score), "score {}", pair.score);
            }
        }

        for result in m.match_transactions(&ledger, &processor) {
            if let MatchResult::Matched {
                score, confidence, ..
            } = result
            {
                assert!((0.0..=1.0).contains(&score));
                assert_eq!(confidence, Confidence::from_score(score));
            }
        }
    }
}

#[test]
fn widening_tolerances_never_shrinks_candidate_sets() {
    let steps = [(0, 0.0), (1, 0.5), (3, 1.0), (7, 3.0), (14, 6.0), (30, 25.0)];

    for seed in SEEDS {
        let (ledger, processor) = generate(seed, 15, 40);
        for txn in &ledger {
            let mut previous = 0;
            for (days, pct) in steps {
                let count = matcher(days, pct)
                    .candidates(txn, &processor, &HashSet::new())
                    .len();
                assert!(
                    count >= previous,
                    "seed {seed}, {}: {count} < {previous} at ({days}, {pct})",
                    txn.id
                );
                previous = count;
            }
        }
    }
}

#[test]
fn widening_days_alone_is_monotonic() {
    let (ledger, processor) = generate(77, 10, 40);
    for txn in &ledger {
        let counts: Vec<usize> = (0..=20)
            .map(|days| {
                matcher(days, 3.0)
                    .candidates(txn, &processor, &HashSet::new())
                    .len()
            })
            .collect();
        assert!(counts.windows(2).all(|w| w[0] <= w[1]), "{:?}", counts);
    }
}

#[test]
fn repeated_runs_serialize_identically() -> anyhow::Result<()> {
    for seed in SEEDS {
        let (ledger, processor) = generate(seed, 30, 30);
        let m = matcher(7, 3.0);

        let first = serde_json::to_string(&m.match_transactions(&ledger, &processor))?;
        let second = serde_json::to_string(&m.match_transactions(&ledger, &processor))?;
        assert_eq!(first, second);

        // input order must not matter either
        let mut shuffled = ledger.clone();
        shuffled.reverse();
        let third = serde_json::to_string(&m.match_transactions(&shuffled, &processor))?;
        assert_eq!(first, third);
    }
    Ok(())
}
