use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Judgement outcome for a single hit object. Each ruleset produces a subset
/// of these; the taxonomy is owned by the ruleset implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitResult {
    Miss,
    Meh,
    Ok,
    Good,
    Great,
    Perfect,
    LargeTickHit,
    LargeTickMiss,
    SmallTickHit,
    SmallTickMiss,
    SliderTailHit,
    LargeBonus,
    SmallBonus,
    IgnoreHit,
    IgnoreMiss,
}

impl HitResult {
    /// Whether this result contributes to the basic judgement counters kept
    /// on the user aggregate row. Tick and bonus results do not.
    pub fn is_basic(self) -> bool {
        matches!(
            self,
            HitResult::Miss
                | HitResult::Meh
                | HitResult::Ok
                | HitResult::Good
                | HitResult::Great
                | HitResult::Perfect
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreRank {
    XH,
    X,
    SH,
    S,
    A,
    B,
    C,
    D,
}

impl ScoreRank {
    pub fn as_str(self) -> &'static str {
        match self {
            ScoreRank::XH => "XH",
            ScoreRank::X => "X",
            ScoreRank::SH => "SH",
            ScoreRank::S => "S",
            ScoreRank::A => "A",
            ScoreRank::B => "B",
            ScoreRank::C => "C",
            ScoreRank::D => "D",
        }
    }

    pub fn from_str_or_d(value: &str) -> ScoreRank {
        match value {
            "XH" => ScoreRank::XH,
            "X" => ScoreRank::X,
            "SH" => ScoreRank::SH,
            "S" => ScoreRank::S,
            "A" => ScoreRank::A,
            "B" => ScoreRank::B,
            "C" => ScoreRank::C,
            _ => ScoreRank::D,
        }
    }
}

/// A single applied gameplay modifier, identified by acronym.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mod {
    pub acronym: String,
}

impl Mod {
    pub fn new(acronym: &str) -> Self {
        Self {
            acronym: acronym.to_owned(),
        }
    }
}

/// A submitted score as carried on the processing queue. Immutable through
/// the pipeline except for the `rating` stamp written by the performance
/// processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreEvent {
    pub id: i64,
    pub user_id: i64,
    pub beatmap_id: i64,
    pub ruleset_id: i16,
    pub passed: bool,
    pub total_score: i64,
    /// Normalised to [0, 1].
    pub accuracy: f64,
    pub max_combo: i32,
    pub rank: ScoreRank,
    pub statistics: HashMap<HitResult, i32>,
    pub maximum_statistics: HashMap<HitResult, i32>,
    pub mods: Vec<Mod>,
    /// Set for scores converted from the legacy high-score tables.
    pub legacy: bool,
    pub build_id: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
    #[serde(default)]
    pub rating: Option<f64>,
}

impl ScoreEvent {
    pub fn statistic(&self, result: HitResult) -> i32 {
        self.statistics.get(&result).copied().unwrap_or(0)
    }
}

/// Projection of one stored score joined with its rating and the status of
/// the beatmap it was set on, as consumed by the performance aggregator.
#[derive(Debug, Clone, FromRow)]
pub struct RankedScore {
    pub score_id: i64,
    pub beatmap_id: i64,
    pub accuracy: f64,
    pub rating: Option<f64>,
    pub legacy: bool,
    pub build_id: Option<i32>,
    pub beatmap_status: i16,
}
