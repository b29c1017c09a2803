use crate::core::matcher::MatchSettings;
use crate::domain::model::{DateRange, RawLedgerRecord, RawProcessorRecord};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn match_settings(&self) -> MatchSettings;
    fn ledger_keywords(&self) -> &[String];
    fn processor_date_format(&self) -> Option<&str>;
    fn outgoing_only(&self) -> bool;
}

/// Where ledger (bank side) records come from.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    async fn fetch_ledger(&self, since: NaiveDate) -> Result<Vec<RawLedgerRecord>>;
}

/// Where processor (PayPal side) records come from.
#[async_trait]
pub trait ProcessorSource: Send + Sync {
    async fn fetch_processor(&self, range: &DateRange) -> Result<Vec<RawProcessorRecord>>;
}

#[async_trait]
pub trait LedgerUpdater: Send + Sync {
    async fn update_memo(&self, ledger_id: &str, memo: &str) -> Result<()>;
}
