use storage::models::{DifficultyAttributes, HitResult, Mod, RulesetId, ScoreEvent};

use super::{Ruleset, combo_factor, convert_common_mods, legacy_mods};

/// The circle-aiming ruleset. Rating weighs aim difficulty, accuracy and how
/// much of the map's combo was kept.
pub struct StandardRuleset;

const TAXONOMY: &[HitResult] = &[
    HitResult::Great,
    HitResult::Ok,
    HitResult::Meh,
    HitResult::Miss,
    HitResult::LargeTickHit,
    HitResult::LargeTickMiss,
    HitResult::SmallTickHit,
    HitResult::SmallTickMiss,
    HitResult::SliderTailHit,
    HitResult::LargeBonus,
    HitResult::SmallBonus,
];

impl Ruleset for StandardRuleset {
    fn id(&self) -> RulesetId {
        RulesetId::Standard
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
        Some(stars.powf(2.2) * score.accuracy.powi(4) * combo_factor(score, attributes) * 45.0)
    }

    fn convert_legacy_mods(&self, bitmask: i32) -> Vec<Mod> {
        let mut mods = convert_common_mods(bitmask);
        if bitmask & legacy_mods::TOUCH_DEVICE != 0 {
            mods.push(Mod::new("TD"));
        }
        if bitmask & legacy_mods::SPUN_OUT != 0 {
            mods.push(Mod::new("SO"));
        }
        mods
    }
}
