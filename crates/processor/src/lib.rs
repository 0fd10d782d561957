pub mod batch;
pub mod dispatcher;
pub mod error;
pub mod maintenance;
pub mod notify;
pub mod performance;
pub mod processors;
pub mod rulesets;
pub mod store;

pub use dispatcher::{Outcome, ScoreMessage, ScoreStatisticsDispatcher};
pub use error::{ProcessorError, Result};
pub use notify::{LoggingNotifier, Notifier};
pub use processors::PIPELINE_VERSION;
