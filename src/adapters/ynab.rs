use crate::adapters::ensure_success;
use crate::domain::model::RawLedgerRecord;
use crate::domain::ports::{LedgerSource, LedgerUpdater};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct TransactionsData {
    #[serde(default)]
    transactions: Vec<RawLedgerRecord>,
}

#[derive(Debug, Serialize)]
struct MemoPatch<'a> {
    transaction: MemoBody<'a>,
}

#[derive(Debug, Serialize)]
struct MemoBody<'a> {
    memo: &'a str,
}

/// Minimal YNAB REST client: list transactions, patch memos, check the token.
pub struct YnabClient {
    client: Client,
    base_url: String,
    token: String,
    budget_id: String,
}

impl YnabClient {
    pub fn new(base_url: &str, token: &str, budget_id: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            budget_id: budget_id.to_string(),
        }
    }

    fn transactions_url(&self) -> String {
        format!("{}/budgets/{}/transactions", self.base_url, self.budget_id)
    }

    pub async fn get_transactions(&self, since: NaiveDate) -> Result<Vec<RawLedgerRecord>> {
        let url = self.transactions_url();
        tracing::debug!("GET {} since {}", url, since);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("since_date", since.format("%Y-%m-%d").to_string())])
            .send()
            .await?;
        let envelope: Envelope<TransactionsData> = ensure_success(response).await?.json().await?;

        tracing::info!(
            "Fetched {} YNAB transactions",
            envelope.data.transactions.len()
        );
        Ok(envelope.data.transactions)
    }

    pub async fn update_transaction_memo(&self, transaction_id: &str, memo: &str) -> Result<()> {
        let url = format!("{}/{}", self.transactions_url(), transaction_id);
        let payload = MemoPatch {
            transaction: MemoBody { memo },
        };

        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    pub async fn test_connection(&self) -> Result<()> {
        let url = format!("{}/user", self.base_url);
        let response = self.client.get(&url).bearer_auth(&self.token).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerSource for YnabClient {
    async fn fetch_ledger(&self, since: NaiveDate) -> Result<Vec<RawLedgerRecord>> {
        self.get_transactions(since).await
    }
}

#[async_trait]
impl LedgerUpdater for YnabClient {
    async fn update_memo(&self, ledger_id: &str, memo: &str) -> Result<()> {
        self.update_transaction_memo(ledger_id, memo).await
    }
}
