pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{PayPalApiClient, PayPalCsvSource, YnabClient};
pub use config::cli::LocalStorage;
#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{MatcherConfig, ProcessorSourceKind};

pub use core::matcher::{MatchSettings, TransactionMatcher};
pub use core::normalizer::Normalizer;
pub use core::reconcile::{apply_updates, ReconcileOutcome, Reconciler};
pub use domain::model::{
    Amount, Confidence, DateRange, LedgerTransaction, MatchResult, MatchStats, MemoUpdate,
    ProcessorTransaction, UnmatchedReason,
};
pub use utils::error::{MatcherError, Result};
