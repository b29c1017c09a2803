use chrono::NaiveDate;
use httpmock::prelude::*;
use httpmock::Method::PATCH;
use std::io::Read;
use tempfile::TempDir;
use ynab_paypal_matcher::core::report::{bundle_outputs, render_outputs, ReportFormat};
use ynab_paypal_matcher::core::updates::plan_memo_updates;
use ynab_paypal_matcher::domain::ports::Storage;
use ynab_paypal_matcher::{
    apply_updates, Confidence, DateRange, LocalStorage, MatchResult, MatcherConfig,
    PayPalCsvSource, Reconciler, UnmatchedReason, YnabClient,
};

const PAYPAL_EXPORT: &str = "\"Date\",\"Time\",\"Name\",\"Type\",\"Status\",\"Currency\",\"Gross\",\"Fee\",\"Net\",\"Transaction ID\",\"Item Title\"
\"05/11/2025\",\"10:15:00\",\"Steam\",\"Express Checkout Payment\",\"Completed\",\"GBP\",\"-42.99\",\"0.00\",\"-42.99\",\"P1\",\"Half-Life\"
\"09/11/2025\",\"18:02:11\",\"Bandcamp\",\"Express Checkout Payment\",\"Completed\",\"EUR\",\"-12.40\",\"0.00\",\"-12.40\",\"P2\",\"Album\"
\"10/11/2025\",\"08:00:00\",\"Jane Doe\",\"Payment Received\",\"Completed\",\"GBP\",\"20.00\",\"-0.60\",\"19.40\",\"P3\",\"\"
\"12/11/2025\",\"08:00:00\",\"Broken Row\",\"Express Checkout Payment\",\"Completed\",\"GBP\",\"-5.00\",\"0.00\",\"-5.00\",\"P4\",\"\"
";

fn ynab_transactions() -> serde_json::Value {
    serde_json::json!({
        "data": {
            "transactions": [
                {"id": "t1", "date": "2025-11-08", "amount": -42990, "payee_name": "PayPal", "memo": null, "deleted": false},
                {"id": "t2", "date": "2025-11-10", "amount": -12400, "payee_name": "PAYPAL *BANDCAMP", "memo": null, "deleted": false},
                {"id": "t3", "date": "2025-11-20", "amount": -5000, "payee_name": "PayPal", "memo": "gift", "deleted": false},
                {"id": "t4", "date": "2025-11-21", "amount": -3000, "payee_name": "Tesco", "memo": null, "deleted": false},
                {"id": "t5", "date": "2025-11-22", "amount": -7000, "payee_name": "PayPal", "memo": null, "deleted": true}
            ],
            "server_knowledge": 42
        }
    })
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

async fn write_export(dir: &TempDir, contents: &str) -> LocalStorage {
    let storage = LocalStorage::new(dir.path());
    tokio_test::assert_ok!(storage.write_file("paypal.csv", contents.as_bytes()).await);
    storage
}

#[tokio::test]
async fn test_end_to_end_match_and_update() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let storage = write_export(&temp_dir, PAYPAL_EXPORT).await;

    let server = MockServer::start();
    let list_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/budgets/budget-1/transactions")
            .query_param("since_date", "2025-11-01");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(ynab_transactions());
    });
    let steam_update = server.mock(|when, then| {
        when.method(PATCH)
            .path("/budgets/budget-1/transactions/t1")
            .json_body(serde_json::json!({"transaction": {"memo": "Steam (Half-Life)"}}));
        then.status(200).json_body(serde_json::json!({"data": {}}));
    });
    let bandcamp_update = server.mock(|when, then| {
        when.method(PATCH)
            .path("/budgets/budget-1/transactions/t2")
            .json_body(serde_json::json!({"transaction": {"memo": "Bandcamp (Album) [EUR 12.40]"}}));
        then.status(200).json_body(serde_json::json!({"data": {}}));
    });

    let config = MatcherConfig::default();
    let ynab = YnabClient::new(&server.base_url(), "token", "budget-1");
    let source = PayPalCsvSource::new(storage, "paypal.csv");
    let reconciler = Reconciler::new(ynab, source, &config);

    let range = DateRange::new(date("2025-11-01"), date("2025-11-30"));
    let outcome = tokio_test::assert_ok!(reconciler.run(range).await);
    list_mock.assert();

    assert_eq!(outcome.results.len(), 3);
    // t4 has no keyword, t5 is deleted
    assert_eq!(outcome.ledger_filtered, 2);
    // P3 is incoming and never leaves the reader
    assert_eq!(outcome.processor_count, 3);
    assert_eq!(outcome.stats.matched, 2);

    let ids: Vec<(&str, Option<&str>)> = outcome
        .results
        .iter()
        .map(|r| (r.ledger().id.as_str(), r.processor().map(|p| p.id.as_str())))
        .collect();
    assert_eq!(
        ids,
        vec![("t1", Some("P1")), ("t2", Some("P2")), ("t3", None)]
    );
    assert!(outcome.results[..2]
        .iter()
        .all(|r| r.confidence() == Confidence::High));
    // P4 (12 Nov) is 8 days before t3 (20 Nov)
    assert!(matches!(
        outcome.results[2],
        MatchResult::Unmatched {
            reason: UnmatchedReason::NoDateMatch,
            ..
        }
    ));

    let updates = plan_memo_updates(&outcome.results, Confidence::High, "GBP")?;
    assert_eq!(updates.len(), 2);
    let applied = apply_updates(reconciler.ledger_source(), &updates).await;
    assert_eq!(applied.applied, 2);
    assert!(applied.failures.is_empty());
    steam_update.assert();
    bandcamp_update.assert();

    Ok(())
}

#[tokio::test]
async fn test_exports_are_written_and_bundled() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let storage = write_export(&temp_dir, PAYPAL_EXPORT).await;

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/budgets/budget-1/transactions");
        then.status(200).json_body(ynab_transactions());
    });

    let config = MatcherConfig::default();
    let reconciler = Reconciler::new(
        YnabClient::new(&server.base_url(), "token", "budget-1"),
        PayPalCsvSource::new(storage.clone(), "paypal.csv"),
        &config,
    );
    let range = DateRange::new(date("2025-11-01"), date("2025-11-30"));
    let outcome = reconciler.run(range).await?;

    let formats = [ReportFormat::Txt, ReportFormat::Csv, ReportFormat::Json];
    let files = render_outputs(&outcome.results, &formats, true, "GBP")?;
    let archive = bundle_outputs(&files)?;
    storage.write_file("out/matches.zip", &archive).await?;

    let zip_data = std::fs::read(temp_dir.path().join("out/matches.zip"))?;
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(zip_data))?;
    assert_eq!(zip.len(), 3);

    let mut report = String::new();
    zip.by_name("matches.txt")?.read_to_string(&mut report)?;
    assert!(report.contains("HIGH CONFIDENCE MATCHES (2):"));
    assert!(report.contains("UNMATCHED YNAB TRANSACTIONS (1):"));
    assert!(report.contains("Half-Life"));

    let mut csv_content = String::new();
    zip.by_name("matches.csv")?.read_to_string(&mut csv_content)?;
    assert!(csv_content.starts_with("ledger_id,"));
    assert!(csv_content.contains("t2,2025-11-10"));
    assert!(csv_content.contains("Bandcamp"));

    let mut json_content = String::new();
    zip.by_name("matches.json")?.read_to_string(&mut json_content)?;
    let parsed: serde_json::Value = serde_json::from_str(&json_content)?;
    assert_eq!(parsed.as_array().map(Vec::len), Some(3));
    assert_eq!(parsed[2]["status"], "unmatched");

    Ok(())
}

#[tokio::test]
async fn test_missing_export_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/budgets/budget-1/transactions");
        then.status(200).json_body(ynab_transactions());
    });

    let config = MatcherConfig::default();
    let reconciler = Reconciler::new(
        YnabClient::new(&server.base_url(), "token", "budget-1"),
        PayPalCsvSource::new(LocalStorage::new(temp_dir.path()), "missing.csv"),
        &config,
    );
    let range = DateRange::new(date("2025-11-01"), date("2025-11-30"));

    let err = reconciler.run(range).await.unwrap_err();
    assert!(matches!(err, ynab_paypal_matcher::MatcherError::IoError(_)));
}

#[tokio::test]
async fn test_ynab_server_error_propagates() {
    let temp_dir = TempDir::new().unwrap();
    let storage = write_export(&temp_dir, PAYPAL_EXPORT).await;
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/budgets/budget-1/transactions");
        then.status(503).body("maintenance");
    });

    let config = MatcherConfig::default();
    let reconciler = Reconciler::new(
        YnabClient::new(&server.base_url(), "token", "budget-1"),
        PayPalCsvSource::new(storage, "paypal.csv"),
        &config,
    );
    let range = DateRange::new(date("2025-11-01"), date("2025-11-30"));

    let err = reconciler.run(range).await.unwrap_err();
    assert_eq!(
        err.category(),
        ynab_paypal_matcher::utils::error::ErrorCategory::Network
    );
}
