//! Diminishing-return aggregation of a user's score ratings into one total.
//!
//! The input is the user's complete passing-score set for a single ruleset,
//! each score already tagged with a computed rating where one exists. The
//! computation is pure so it can be exercised with literal score lists.

use std::cmp::Ordering;
use std::collections::HashMap;

use storage::models::{BeatmapStatus, RankedScore};

/// Geometric weight decay applied per rank position.
pub const WEIGHT_DECAY: f64 = 0.95;

/// Base of the fixed bonus term preserving the legacy bonus-score decay
/// curve: (417 - 1/3) * (1 - 0.9994^n).
pub const BONUS_BASE: f64 = 417.0 - 1.0 / 3.0;
pub const BONUS_DECAY: f64 = 0.9994;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    pub total: f64,
    /// Normalised accuracy in [0, 100].
    pub accuracy: f64,
}

/// Computes the user's total rating and normalised accuracy.
///
/// Eligibility: a score must carry a rating, sit on a beatmap whose status
/// allows rating contribution, and (for non-legacy scores) come from a build
/// with performance allowed. Of the eligible scores, only the highest-rated
/// per beatmap is retained, ties broken by the lower score id so the outcome
/// is deterministic.
pub fn aggregate_performance(scores: &[RankedScore], builds: &HashMap<i32, bool>) -> Aggregate {
    let mut best: HashMap<i64, &RankedScore> = HashMap::new();

    for score in scores.iter().filter(|s| is_eligible(s, builds)) {
        best.entry(score.beatmap_id)
            .and_modify(|current| {
                if ranks_above(score, current) {
                    *current = score;
                }
            })
            .or_insert(score);
    }

    let mut retained: Vec<&RankedScore> = best.into_values().collect();
    retained.sort_by(|a, b| {
        rating_of(b)
            .partial_cmp(&rating_of(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.score_id.cmp(&b.score_id))
    });

    let mut total = 0.0;
    let mut accuracy_sum = 0.0;
    let mut weight = 1.0;
    for score in &retained {
        total += rating_of(score) * weight;
        accuracy_sum += score.accuracy * weight;
        weight *= WEIGHT_DECAY;
    }

    let count = retained.len() as i32;
    total += BONUS_BASE * (1.0 - BONUS_DECAY.powi(count));

    let accuracy = if count > 0 {
        accuracy_sum * 100.0 / (20.0 * (1.0 - WEIGHT_DECAY.powi(count)))
    } else {
        0.0
    };

    Aggregate { total, accuracy }
}

fn is_eligible(score: &RankedScore, builds: &HashMap<i32, bool>) -> bool {
    if score.rating.is_none() {
        return false;
    }
    if !BeatmapStatus::from_i16(score.beatmap_status).allows_rating() {
        return false;
    }
    if score.legacy {
        return true;
    }
    match score.build_id {
        Some(build_id) => builds.get(&build_id).copied().unwrap_or(false),
        None => false,
    }
}

fn rating_of(score: &RankedScore) -> f64 {
    score.rating.unwrap_or(0.0)
}

fn ranks_above(candidate: &RankedScore, current: &RankedScore) -> bool {
    match rating_of(candidate).partial_cmp(&rating_of(current)) {
        Some(Ordering::Greater) => true,
        Some(Ordering::Equal) => candidate.score_id < current.score_id,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANKED: i16 = 1;
    const PENDING: i16 = 0;

    fn score(id: i64, beatmap: i64, rating: Option<f64>, accuracy: f64) -> RankedScore {
        RankedScore {
            score_id: id,
            beatmap_id: beatmap,
            accuracy,
            rating,
            legacy: true,
            build_id: None,
            beatmap_status: RANKED,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn weighted_sum_matches_documented_formula() {
        let scores = vec![
            score(1, 10, Some(10.0), 1.0),
            score(2, 20, Some(8.0), 1.0),
            score(3, 30, Some(6.0), 1.0),
        ];
        let result = aggregate_performance(&scores, &HashMap::new());

        let weighted = 10.0 + 8.0 * 0.95 + 6.0 * 0.95 * 0.95;
        let bonus = BONUS_BASE * (1.0 - BONUS_DECAY.powi(3));
        assert_close(result.total, weighted + bonus);
        assert_close(weighted, 23.015);
    }

    #[test]
    fn perfect_accuracy_normalises_to_one_hundred() {
        let scores = vec![
            score(1, 10, Some(10.0), 1.0),
            score(2, 20, Some(8.0), 1.0),
            score(3, 30, Some(6.0), 1.0),
        ];
        let result = aggregate_performance(&scores, &HashMap::new());
        assert_close(result.accuracy, 100.0);
    }

    #[test]
    fn empty_input_yields_zero() {
        let result = aggregate_performance(&[], &HashMap::new());
        assert_close(result.total, 0.0);
        assert_close(result.accuracy, 0.0);
    }

    #[test]
    fn only_best_score_per_beatmap_is_retained() {
        let scores = vec![
            score(1, 10, Some(10.0), 0.9),
            score(2, 10, Some(12.0), 0.95),
        ];
        let result = aggregate_performance(&scores, &HashMap::new());
        let bonus = BONUS_BASE * (1.0 - BONUS_DECAY.powi(1));
        assert_close(result.total, 12.0 + bonus);
    }

    #[test]
    fn equal_ratings_tie_break_on_lower_score_id() {
        let scores = vec![
            score(7, 10, Some(10.0), 0.5),
            score(3, 10, Some(10.0), 0.9),
        ];
        let result = aggregate_performance(&scores, &HashMap::new());
        // Score 3 wins the tie, so its accuracy feeds the normalisation.
        let expected = 0.9 * 100.0 / (20.0 * (1.0 - 0.95));
        assert_close(result.accuracy, expected);
    }

    #[test]
    fn unrated_scores_are_excluded_even_when_highest() {
        let scores = vec![score(1, 10, None, 1.0), score(2, 20, Some(5.0), 1.0)];
        let result = aggregate_performance(&scores, &HashMap::new());
        let bonus = BONUS_BASE * (1.0 - BONUS_DECAY.powi(1));
        assert_close(result.total, 5.0 + bonus);
    }

    #[test]
    fn unranked_beatmaps_are_excluded() {
        let mut pending = score(1, 10, Some(50.0), 1.0);
        pending.beatmap_status = PENDING;
        let scores = vec![pending, score(2, 20, Some(5.0), 1.0)];
        let result = aggregate_performance(&scores, &HashMap::new());
        let bonus = BONUS_BASE * (1.0 - BONUS_DECAY.powi(1));
        assert_close(result.total, 5.0 + bonus);
    }

    #[test]
    fn disallowed_build_excludes_non_legacy_score() {
        let mut blocked = score(1, 10, Some(50.0), 1.0);
        blocked.legacy = false;
        blocked.build_id = Some(7);

        let mut allowed = score(2, 20, Some(5.0), 1.0);
        allowed.legacy = false;
        allowed.build_id = Some(8);

        let builds = HashMap::from([(7, false), (8, true)]);
        let result = aggregate_performance(&[blocked, allowed], &builds);
        let bonus = BONUS_BASE * (1.0 - BONUS_DECAY.powi(1));
        assert_close(result.total, 5.0 + bonus);
    }

    #[test]
    fn non_legacy_score_without_build_is_excluded() {
        let mut unbuilt = score(1, 10, Some(50.0), 1.0);
        unbuilt.legacy = false;
        unbuilt.build_id = None;

        let result = aggregate_performance(&[unbuilt], &HashMap::new());
        assert_close(result.total, 0.0);
    }
}
