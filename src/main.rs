use chrono::Local;
use clap::Parser;
use std::io::{self, BufRead, Write};
use ynab_paypal_matcher::core::report::{bundle_outputs, format_match_report, render_outputs};
use ynab_paypal_matcher::core::updates::plan_memo_updates;
use ynab_paypal_matcher::domain::ports::{ConfigProvider, LedgerUpdater, ProcessorSource, Storage};
use ynab_paypal_matcher::utils::error::ErrorSeverity;
use ynab_paypal_matcher::utils::{logger, validation::Validate};
use ynab_paypal_matcher::{
    apply_updates, CliConfig, DateRange, LocalStorage, MatcherConfig, PayPalApiClient,
    PayPalCsvSource, ProcessorSourceKind, ReconcileOutcome, Reconciler, Result, YnabClient,
};

const PREVIEW_LIMIT: usize = 5;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI config: {:?}", cli);

    if let Err(e) = run(&cli).await {
        tracing::error!(
            "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(cli: &CliConfig) -> Result<()> {
    let mut config = MatcherConfig::load(&cli.config)?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let (token, budget_id) = config.ynab_credentials()?;
    let ynab = YnabClient::new(&config.ynab.base_url, token, budget_id);

    if cli.test {
        return test_connections(&ynab, &config).await;
    }

    let range = DateRange::last_days(Local::now().date_naive(), cli.days);
    tracing::info!("Matching transactions from {} to {}", range.start, range.end);

    match config.paypal.source {
        ProcessorSourceKind::Csv => {
            let source = PayPalCsvSource::new(LocalStorage::new("."), config.paypal.csv_path.clone());
            reconcile(ynab, source, &config, cli, range).await
        }
        ProcessorSourceKind::Api => {
            let (client_id, client_secret) = config.paypal_credentials()?;
            let source = PayPalApiClient::new(&config.paypal_base_url(), client_id, client_secret);
            reconcile(ynab, source, &config, cli, range).await
        }
    }
}

async fn test_connections(ynab: &YnabClient, config: &MatcherConfig) -> Result<()> {
    println!("Testing YNAB connection...");
    ynab.test_connection().await?;
    println!("✅ YNAB connection OK");

    if config.has_paypal_api_credentials() {
        let (client_id, client_secret) = config.paypal_credentials()?;
        println!("Testing PayPal API connection...");
        PayPalApiClient::new(&config.paypal_base_url(), client_id, client_secret)
            .test_connection()
            .await?;
        println!("✅ PayPal API connection OK");
    }
    if config.paypal.source == ProcessorSourceKind::Csv {
        println!("PayPal source is CSV: {}", config.paypal.csv_path);
    }
    Ok(())
}

async fn reconcile<P: ProcessorSource>(
    ynab: YnabClient,
    source: P,
    config: &MatcherConfig,
    cli: &CliConfig,
    range: DateRange,
) -> Result<()> {
    let home_currency = config.match_settings().home_currency;
    let reconciler = Reconciler::new(ynab, source, config);
    let outcome = reconciler.run(range).await?;
    log_outcome(&outcome);

    let report = format_match_report(
        &outcome.results,
        config.output.show_unmatched,
        &home_currency,
    );
    match &cli.output {
        Some(path) => {
            LocalStorage::new(".")
                .write_file(path, report.as_bytes())
                .await?;
            println!("📁 Report saved to: {}", path);
        }
        None => println!("{}", report),
    }

    write_exports(&outcome, config, &home_currency).await?;

    if cli.update {
        update_memos(reconciler.ledger_source(), &outcome, cli, &home_currency).await?;
    }
    Ok(())
}

fn log_outcome(outcome: &ReconcileOutcome) {
    let stats = &outcome.stats;
    tracing::info!(
        "Matched {}/{} ({:.1}%): {} high, {} medium, {} low, {} very low",
        stats.matched,
        stats.total,
        stats.match_rate(),
        stats.high,
        stats.medium,
        stats.low,
        stats.very_low
    );
    tracing::info!(
        "{} ledger records filtered, {} processor transactions considered",
        outcome.ledger_filtered,
        outcome.processor_count
    );
    if !outcome.ledger_failures.is_empty() || !outcome.processor_failures.is_empty() {
        tracing::warn!(
            "Skipped {} ledger and {} processor records that could not be parsed",
            outcome.ledger_failures.len(),
            outcome.processor_failures.len()
        );
    }
}

async fn write_exports(
    outcome: &ReconcileOutcome,
    config: &MatcherConfig,
    home_currency: &str,
) -> Result<()> {
    let files = render_outputs(
        &outcome.results,
        &config.output.formats,
        config.output.show_unmatched,
        home_currency,
    )?;
    if files.is_empty() {
        return Ok(());
    }

    let storage = LocalStorage::new(&config.output.path);
    if config.output.archive {
        let archive = bundle_outputs(&files)?;
        storage.write_file("matches.zip", &archive).await?;
        tracing::info!("📁 Exports saved to: {}", storage.resolve("matches.zip").display());
    } else {
        for (name, data) in &files {
            storage.write_file(name, data).await?;
            tracing::info!("📁 Export saved to: {}", storage.resolve(name).display());
        }
    }
    Ok(())
}

async fn update_memos<U: LedgerUpdater>(
    updater: &U,
    outcome: &ReconcileOutcome,
    cli: &CliConfig,
    home_currency: &str,
) -> Result<()> {
    let updates = plan_memo_updates(&outcome.results, cli.confidence, home_currency)?;
    if updates.is_empty() {
        println!("No matches at {} confidence or better to update", cli.confidence);
        return Ok(());
    }

    println!("\n{} transactions will be updated:", updates.len());
    for update in updates.iter().take(PREVIEW_LIMIT) {
        println!("  {} → {}", update.ledger_id, update.new_memo);
    }
    if updates.len() > PREVIEW_LIMIT {
        println!("  ... and {} more", updates.len() - PREVIEW_LIMIT);
    }

    if !cli.yes && !confirm("Proceed with updates? [y/N] ")? {
        println!("Update cancelled");
        return Ok(());
    }

    let applied = apply_updates(updater, &updates).await;
    println!(
        "✅ Updated {}/{} transactions",
        applied.applied,
        updates.len()
    );
    for (ledger_id, error) in &applied.failures {
        eprintln!("❌ {}: {}", ledger_id, error.user_friendly_message());
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
