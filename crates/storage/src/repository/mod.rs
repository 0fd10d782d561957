pub mod beatmaps;
pub mod builds;
pub mod counters;
pub mod process_history;
pub mod scores;
pub mod user_stats;

pub use counters::CounterRepository;
