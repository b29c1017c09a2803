pub mod matcher;
pub mod normalizer;
pub mod reconcile;
pub mod report;
pub mod updates;

pub use crate::domain::ports::{
    ConfigProvider, LedgerSource, LedgerUpdater, ProcessorSource, Storage,
};
pub use crate::utils::error::Result;
pub use matcher::{MatchSettings, TransactionMatcher};
pub use normalizer::Normalizer;
pub use reconcile::{ReconcileOutcome, Reconciler, UpdateOutcome};
