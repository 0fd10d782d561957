pub mod beatmap;
pub mod build;
pub mod difficulty;
pub mod process_history;
pub mod ruleset;
pub mod score;
pub mod user_stats;

pub use beatmap::{Beatmap, BeatmapStatus};
pub use build::Build;
pub use difficulty::{DifficultyAttributeKey, DifficultyAttributes};
pub use process_history::ProcessHistory;
pub use ruleset::RulesetId;
pub use score::{HitResult, Mod, RankedScore, ScoreEvent, ScoreRank};
pub use user_stats::UserStats;
