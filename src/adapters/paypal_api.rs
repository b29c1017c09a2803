use crate::adapters::ensure_success;
use crate::domain::model::{DateRange, RawProcessorRecord};
use crate::domain::ports::ProcessorSource;
use crate::utils::error::{MatcherError, Result};
use async_trait::async_trait;
use chrono::Duration;
use reqwest::Client;
use serde::Deserialize;
use std::time::Instant;
use tokio::sync::Mutex;

const REPORTING_SCOPE: &str = "https://uri.paypal.com/services/reporting/search/read";
/// The transaction search endpoint refuses ranges longer than this.
pub const MAX_RANGE_DAYS: i64 = 31;
const PAGE_SIZE: u32 = 500;
/// Tokens are refreshed this long before PayPal says they expire.
const TOKEN_EXPIRY_BUFFER_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    transaction_details: Vec<TransactionDetail>,
    #[serde(default = "default_total_pages")]
    total_pages: u32,
}

fn default_total_pages() -> u32 {
    1
}

#[derive(Debug, Default, Deserialize)]
struct TransactionDetail {
    #[serde(default)]
    transaction_info: TransactionInfo,
    #[serde(default)]
    payer_info: PayerInfo,
    #[serde(default)]
    cart_info: CartInfo,
}

#[derive(Debug, Default, Deserialize)]
struct TransactionInfo {
    transaction_id: Option<String>,
    transaction_event_code: Option<String>,
    transaction_initiation_date: Option<String>,
    transaction_amount: Option<Money>,
    fee_amount: Option<Money>,
    transaction_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Money {
    currency_code: Option<String>,
    value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PayerInfo {
    email_address: Option<String>,
    payer_name: Option<PayerName>,
}

#[derive(Debug, Default, Deserialize)]
struct PayerName {
    given_name: Option<String>,
    surname: Option<String>,
    alternate_full_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CartInfo {
    #[serde(default)]
    item_details: Vec<ItemDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct ItemDetail {
    item_name: Option<String>,
}

impl TransactionDetail {
    fn merchant_name(&self) -> String {
        let name = self.payer_info.payer_name.as_ref();
        let full = name
            .map(|n| {
                format!(
                    "{} {}",
                    n.given_name.as_deref().unwrap_or(""),
                    n.surname.as_deref().unwrap_or("")
                )
                .trim()
                .to_string()
            })
            .filter(|n| !n.is_empty());

        full.or_else(|| {
            name.and_then(|n| n.alternate_full_name.clone())
                .filter(|n| !n.trim().is_empty())
        })
        .or_else(|| {
            self.payer_info
                .email_address
                .clone()
                .filter(|e| !e.trim().is_empty())
        })
        .unwrap_or_else(|| "Unknown".to_string())
    }

    fn into_raw(self) -> RawProcessorRecord {
        let merchant = self.merchant_name();
        let info = self.transaction_info;
        let amount = info.transaction_amount.unwrap_or_default();
        RawProcessorRecord {
            id: info.transaction_id.unwrap_or_default(),
            date: info.transaction_initiation_date.unwrap_or_default(),
            amount: amount.value.unwrap_or_default(),
            currency: amount.currency_code,
            merchant: Some(merchant),
            item: self
                .cart_info
                .item_details
                .into_iter()
                .find_map(|item| item.item_name),
            fee: info.fee_amount.and_then(|fee| fee.value),
            status: info.transaction_status,
            kind: info.transaction_event_code,
        }
    }
}

/// Splits `range` into inclusive chunks no longer than `MAX_RANGE_DAYS`.
pub fn chunk_range(range: &DateRange) -> Vec<DateRange> {
    let mut chunks = Vec::new();
    let mut start = range.start;
    while start <= range.end {
        let end = (start + Duration::days(MAX_RANGE_DAYS)).min(range.end);
        chunks.push(DateRange::new(start, end));
        start = end + Duration::days(1);
    }
    chunks
}

/// PayPal transaction search client (Business accounts only).
pub struct PayPalApiClient {
    client: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl PayPalApiClient {
    pub fn new(base_url: &str, client_id: &str, client_secret: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!("Requesting PayPal access token");
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .append_pair("scope", REPORTING_SCOPE)
            .finish();

        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header("Accept", "application/json")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;
        let token: TokenResponse = ensure_success(response).await?.json().await?;

        let lifetime = token.expires_in.saturating_sub(TOKEN_EXPIRY_BUFFER_SECS);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + std::time::Duration::from_secs(lifetime),
        });
        Ok(token.access_token)
    }

    pub async fn test_connection(&self) -> Result<()> {
        self.access_token().await.map(|_| ())
    }

    /// Every page of completed transactions for one range of at most `MAX_RANGE_DAYS`.
    async fn fetch_chunk(&self, chunk: &DateRange) -> Result<Vec<TransactionDetail>> {
        if chunk.num_days() > MAX_RANGE_DAYS {
            return Err(MatcherError::InvalidConfigValueError {
                field: "paypal.range".to_string(),
                value: format!("{} days", chunk.num_days()),
                reason: format!("PayPal searches at most {} days at once", MAX_RANGE_DAYS),
            });
        }

        let token = self.access_token().await?;
        let url = format!("{}/v1/reporting/transactions", self.base_url);
        let start_date = format!("{}T00:00:00Z", chunk.start.format("%Y-%m-%d"));
        let end_date = format!("{}T23:59:59Z", chunk.end.format("%Y-%m-%d"));

        let page_size = PAGE_SIZE.to_string();

        let mut details = Vec::new();
        let mut page = 1u32;
        loop {
            let page_param = page.to_string();
            let response = self
                .client
                .get(&url)
                .bearer_auth(&token)
                .query(&[
                    ("start_date", start_date.as_str()),
                    ("end_date", end_date.as_str()),
                    ("transaction_status", "S"),
                    ("fields", "all"),
                    ("page_size", page_size.as_str()),
                    ("page", page_param.as_str()),
                ])
                .send()
                .await?;
            let body: SearchResponse = ensure_success(response).await?.json().await?;

            if body.transaction_details.is_empty() {
                break;
            }
            details.extend(body.transaction_details);
            if page >= body.total_pages {
                break;
            }
            page += 1;
        }

        tracing::debug!(
            "Fetched {} PayPal transactions for {} to {}",
            details.len(),
            chunk.start,
            chunk.end
        );
        Ok(details)
    }

    pub async fn get_transactions(&self, range: &DateRange) -> Result<Vec<RawProcessorRecord>> {
        let mut records = Vec::new();
        for chunk in chunk_range(range) {
            let details = self.fetch_chunk(&chunk).await?;
            records.extend(details.into_iter().map(TransactionDetail::into_raw));
        }
        tracing::info!("Fetched {} transactions from PayPal API", records.len());
        Ok(records)
    }
}

#[async_trait]
impl ProcessorSource for PayPalApiClient {
    async fn fetch_processor(&self, range: &DateRange) -> Result<Vec<RawProcessorRecord>> {
        self.get_transactions(range).await
    }
}
