use std::collections::HashMap;
use std::sync::RwLock;

use sqlx::{Postgres, Transaction};

use crate::error::Result;
use crate::models::{Beatmap, DifficultyAttributeKey, DifficultyAttributes};
use crate::repository::beatmaps;

/// Process-lifetime caches for beatmap metadata and difficulty attributes.
///
/// Both are unbounded: the keyspace is limited by beatmap x ruleset x
/// relevant-mod combinations, and entries are immutable once loaded. Misses
/// are cached too so an absent beatmap is only looked up once. Cache hits
/// never touch the store; misses read through the caller's transaction.
#[derive(Default)]
pub struct StoreCaches {
    beatmaps: RwLock<HashMap<i64, Option<Beatmap>>>,
    attributes: RwLock<HashMap<DifficultyAttributeKey, Option<DifficultyAttributes>>>,
}

impl StoreCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn beatmap(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        beatmap_id: i64,
    ) -> Result<Option<Beatmap>> {
        let cached = {
            let map = self.beatmaps.read().expect("beatmap cache lock poisoned");
            map.get(&beatmap_id).cloned()
        };
        if let Some(entry) = cached {
            return Ok(entry);
        }

        let fetched = beatmaps::get(tx, beatmap_id).await?;
        self.beatmaps
            .write()
            .expect("beatmap cache lock poisoned")
            .insert(beatmap_id, fetched.clone());

        Ok(fetched)
    }

    pub async fn difficulty_attributes(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: &DifficultyAttributeKey,
    ) -> Result<Option<DifficultyAttributes>> {
        let cached = {
            let map = self.attributes.read().expect("attribute cache lock poisoned");
            map.get(key).cloned()
        };
        if let Some(entry) = cached {
            return Ok(entry);
        }

        let fetched = beatmaps::difficulty_attributes(tx, key).await?;
        self.attributes
            .write()
            .expect("attribute cache lock poisoned")
            .insert(*key, fetched.clone());

        Ok(fetched)
    }
}
