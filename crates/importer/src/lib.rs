pub mod error;
pub mod legacy;
pub mod rate;
pub mod replication;
pub mod run;

pub use error::{ImporterError, Result};
pub use rate::{BatchSizeController, RateAdjustment};
pub use replication::ReplicationMonitor;
pub use run::{ImportSummary, LegacyScoreImporter};
