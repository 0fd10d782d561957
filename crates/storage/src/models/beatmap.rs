use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeatmapStatus {
    Graveyard,
    Wip,
    Pending,
    Ranked,
    Approved,
    Qualified,
    Loved,
}

impl BeatmapStatus {
    pub fn from_i16(value: i16) -> BeatmapStatus {
        match value {
            1 => BeatmapStatus::Ranked,
            2 => BeatmapStatus::Approved,
            3 => BeatmapStatus::Qualified,
            4 => BeatmapStatus::Loved,
            0 => BeatmapStatus::Pending,
            -1 => BeatmapStatus::Wip,
            _ => BeatmapStatus::Graveyard,
        }
    }

    /// Only ranked and approved beatmaps contribute to performance rating.
    pub fn allows_rating(self) -> bool {
        matches!(self, BeatmapStatus::Ranked | BeatmapStatus::Approved)
    }
}

/// Minimal beatmap metadata needed to validate eligibility and feed the
/// ruleset rating function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Beatmap {
    pub beatmap_id: i64,
    pub approved: i16,
    pub hit_objects: i32,
    pub difficulty_rating: f64,
    pub playcount: i64,
}

impl Beatmap {
    pub fn status(&self) -> BeatmapStatus {
        BeatmapStatus::from_i16(self.approved)
    }

    pub fn is_ranked(&self) -> bool {
        self.status().allows_rating()
    }
}
