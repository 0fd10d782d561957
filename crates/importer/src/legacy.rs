//! Conversion of denormalised legacy high-score rows into the current score
//! representation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use processor::rulesets::ruleset_for;
use sqlx::{FromRow, PgPool};
use storage::models::{HitResult, RulesetId, ScoreEvent, ScoreRank};

use crate::error::{ImporterError, Result};

#[derive(Debug, Clone, FromRow)]
pub struct LegacyScoreRow {
    pub legacy_id: i64,
    pub ruleset_id: i16,
    pub user_id: i64,
    pub beatmap_id: i64,
    pub score: i64,
    pub max_combo: i32,
    pub count_300: i32,
    pub count_100: i32,
    pub count_50: i32,
    pub count_miss: i32,
    pub enabled_mods: i32,
    pub pass: bool,
    pub date: DateTime<Utc>,
}

/// The next slice of source rows past the watermark, in legacy-id order.
pub async fn fetch_batch(
    pool: &PgPool,
    ruleset_id: i16,
    after_legacy_id: i64,
    limit: i64,
) -> Result<Vec<LegacyScoreRow>> {
    let rows = sqlx::query_as::<_, LegacyScoreRow>(
        r#"
        SELECT legacy_id, ruleset_id, user_id, beatmap_id, score, max_combo,
               count_300, count_100, count_50, count_miss, enabled_mods, pass, date
        FROM legacy_scores
        WHERE ruleset_id = $1 AND legacy_id > $2
        ORDER BY legacy_id
        LIMIT $3
        "#,
    )
    .bind(ruleset_id)
    .bind(after_legacy_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Converts one legacy row into the current score shape. Mods are converted
/// through the owning ruleset; judgement counts map onto the shared taxonomy.
pub fn convert(row: &LegacyScoreRow) -> Result<ScoreEvent> {
    let ruleset_id = RulesetId::try_from(row.ruleset_id)
        .map_err(ImporterError::UnsupportedRuleset)?;
    let ruleset = ruleset_for(ruleset_id);

    let mods = ruleset.convert_legacy_mods(row.enabled_mods);
    let hidden = mods.iter().any(|m| matches!(m.acronym.as_str(), "HD" | "FL"));

    let total_hits = row.count_300 + row.count_100 + row.count_50 + row.count_miss;
    let accuracy = legacy_accuracy(row.count_300, row.count_100, row.count_50, total_hits);
    let rank = legacy_rank(row.count_300, row.count_50, row.count_miss, total_hits, hidden);

    let statistics = HashMap::from([
        (HitResult::Great, row.count_300),
        (HitResult::Ok, row.count_100),
        (HitResult::Meh, row.count_50),
        (HitResult::Miss, row.count_miss),
    ]);

    Ok(ScoreEvent {
        // Assigned by the store on insert.
        id: 0,
        user_id: row.user_id,
        beatmap_id: row.beatmap_id,
        ruleset_id: row.ruleset_id,
        passed: row.pass,
        total_score: row.score,
        accuracy,
        max_combo: row.max_combo,
        rank,
        statistics,
        maximum_statistics: HashMap::from([(HitResult::Great, total_hits)]),
        mods,
        legacy: true,
        build_id: None,
        started_at: None,
        ended_at: row.date,
        rating: None,
    })
}

fn legacy_accuracy(count_300: i32, count_100: i32, count_50: i32, total_hits: i32) -> f64 {
    if total_hits <= 0 {
        return 0.0;
    }
    let earned = 300 * i64::from(count_300) + 100 * i64::from(count_100) + 50 * i64::from(count_50);
    earned as f64 / (300.0 * f64::from(total_hits))
}

/// Legacy tiering over hit ratios. Hidden-class mods upgrade X/S to their
/// silver variants.
fn legacy_rank(
    count_300: i32,
    count_50: i32,
    count_miss: i32,
    total_hits: i32,
    hidden: bool,
) -> ScoreRank {
    if total_hits <= 0 {
        return ScoreRank::D;
    }

    let ratio_300 = f64::from(count_300) / f64::from(total_hits);
    let ratio_50 = f64::from(count_50) / f64::from(total_hits);

    if ratio_300 >= 1.0 {
        return if hidden { ScoreRank::XH } else { ScoreRank::X };
    }
    if ratio_300 > 0.9 && ratio_50 <= 0.01 && count_miss == 0 {
        return if hidden { ScoreRank::SH } else { ScoreRank::S };
    }
    if ratio_300 > 0.8 && (count_miss == 0 || ratio_300 > 0.9) {
        return ScoreRank::A;
    }
    if ratio_300 > 0.7 && (count_miss == 0 || ratio_300 > 0.8) {
        return ScoreRank::B;
    }
    if ratio_300 > 0.6 {
        return ScoreRank::C;
    }
    ScoreRank::D
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> LegacyScoreRow {
        LegacyScoreRow {
            legacy_id: 9_000_001,
            ruleset_id: 0,
            user_id: 55,
            beatmap_id: 777,
            score: 1_234_567,
            max_combo: 410,
            count_300: 95,
            count_100: 4,
            count_50: 0,
            count_miss: 1,
            enabled_mods: 0,
            pass: true,
            date: Utc::now(),
        }
    }

    #[test]
    fn accuracy_follows_the_legacy_weighting() {
        let event = convert(&row()).unwrap();
        let expected = (300.0 * 95.0 + 100.0 * 4.0) / (300.0 * 100.0);
        assert!((event.accuracy - expected).abs() < 1e-12);
    }

    #[test]
    fn perfect_play_ranks_x_and_xh_under_hidden() {
        assert_eq!(legacy_rank(100, 0, 0, 100, false), ScoreRank::X);
        assert_eq!(legacy_rank(100, 0, 0, 100, true), ScoreRank::XH);
    }

    #[test]
    fn miss_denies_the_s_tier() {
        assert_eq!(legacy_rank(95, 0, 0, 100, false), ScoreRank::S);
        assert_eq!(legacy_rank(95, 0, 5, 100, false), ScoreRank::A);
    }

    #[test]
    fn converted_event_is_marked_legacy_without_build() {
        let event = convert(&row()).unwrap();
        assert!(event.legacy);
        assert_eq!(event.build_id, None);
        assert_eq!(event.statistic(HitResult::Great), 95);
        assert_eq!(event.statistic(HitResult::Miss), 1);
    }

    #[test]
    fn unsupported_ruleset_is_rejected() {
        let mut bad = row();
        bad.ruleset_id = 9;
        assert!(matches!(
            convert(&bad),
            Err(ImporterError::UnsupportedRuleset(9))
        ));
    }

    #[test]
    fn nightcore_bitmask_converts_through_the_ruleset() {
        let mut modded = row();
        modded.enabled_mods = 1 << 9 | 1 << 6; // NC implies DT
        let event = convert(&modded).unwrap();
        let acronyms: Vec<&str> = event.mods.iter().map(|m| m.acronym.as_str()).collect();
        assert_eq!(acronyms.iter().filter(|a| **a == "NC" || **a == "DT").count(), 1);
    }
}
