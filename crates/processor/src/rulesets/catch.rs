use storage::models::{DifficultyAttributes, HitResult, Mod, RulesetId, ScoreEvent};

use super::{Ruleset, combo_factor, convert_common_mods};

/// The fruit-catching ruleset. Keeping combo is most of the game, so the
/// combo term is not dampened the way the standard ruleset dampens it.
pub struct CatchRuleset;

const TAXONOMY: &[HitResult] = &[
    HitResult::Great,
    HitResult::Miss,
    HitResult::LargeTickHit,
    HitResult::LargeTickMiss,
    HitResult::SmallTickHit,
    HitResult::SmallTickMiss,
];

impl Ruleset for CatchRuleset {
    fn id(&self) -> RulesetId {
        RulesetId::Catch
    }

    fn hit_result_taxonomy(&self) -> &'static [HitResult] {
        TAXONOMY
    }

    fn compute_rating(
        &self,
        score: &ScoreEvent,
        attributes: &DifficultyAttributes,
    ) -> Option<f64> {
        let stars = attributes.star_rating()?;
        let combo = combo_factor(score, attributes).powf(1.25);
        Some(stars.powf(2.1) * score.accuracy.powi(2) * combo * 40.0)
    }

    fn convert_legacy_mods(&self, bitmask: i32) -> Vec<Mod> {
        convert_common_mods(bitmask)
    }
}
