use storage::models::{DifficultyAttributes, HitResult, Mod, RulesetId, ScoreEvent};

use super::{Ruleset, convert_common_mods};

/// The rhythm-tapping ruleset. Accuracy dominates the rating; combo carries
/// no extra weight beyond what accuracy already reflects.
pub struct PrecisionRuleset;

const TAXONOMY: &[HitResult] = &[HitResult::Great, HitResult::Ok, HitResult::Miss];

impl Ruleset for PrecisionRuleset {
    fn id(&self) -> RulesetId {
        RulesetId::Precision
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
        Some(stars.powf(2.0) * score.accuracy.powi(6) * 50.0)
    }

    fn convert_legacy_mods(&self, bitmask: i32) -> Vec<Mod> {
        convert_common_mods(bitmask)
    }
}
