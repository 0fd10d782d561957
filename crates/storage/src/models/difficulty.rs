use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Cache key for one computed attribute set. The mod bitmask only covers
/// difficulty-affecting mods, so the keyspace stays bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DifficultyAttributeKey {
    pub beatmap_id: i64,
    pub ruleset_id: i16,
    pub mods: i32,
}

impl DifficultyAttributeKey {
    pub fn new(beatmap_id: i64, ruleset_id: i16, mods: i32) -> Self {
        Self {
            beatmap_id,
            ruleset_id,
            mods,
        }
    }
}

/// Named difficulty attributes for one key. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DifficultyAttributes {
    values: HashMap<String, f64>,
}

impl DifficultyAttributes {
    pub fn from_rows(rows: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            values: rows.into_iter().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn star_rating(&self) -> Option<f64> {
        self.get("star_rating")
    }

    pub fn max_combo(&self) -> Option<f64> {
        self.get("max_combo")
    }
}
