use storage::models::{DifficultyAttributes, HitResult, Mod, RulesetId, ScoreEvent};

use super::{Ruleset, convert_common_mods, legacy_mods};

/// The column-scrolling ruleset. Key-count mods change the playfield, so the
/// legacy conversion has to carry them through for attribute lookups.
pub struct ColumnarRuleset;

const TAXONOMY: &[HitResult] = &[
    HitResult::Perfect,
    HitResult::Great,
    HitResult::Good,
    HitResult::Ok,
    HitResult::Meh,
    HitResult::Miss,
];

impl Ruleset for ColumnarRuleset {
    fn id(&self) -> RulesetId {
        RulesetId::Columnar
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
        Some(stars.powf(2.3) * score.accuracy.powi(5) * 42.0)
    }

    fn convert_legacy_mods(&self, bitmask: i32) -> Vec<Mod> {
        let mut mods = convert_common_mods(bitmask);
        let keys = [
            (legacy_mods::KEY4, "4K"),
            (legacy_mods::KEY5, "5K"),
            (legacy_mods::KEY6, "6K"),
            (legacy_mods::KEY7, "7K"),
            (legacy_mods::KEY8, "8K"),
            (legacy_mods::KEY9, "9K"),
        ];
        for (flag, acronym) in keys {
            if bitmask & flag != 0 {
                mods.push(Mod::new(acronym));
            }
        }
        if bitmask & legacy_mods::FADE_IN != 0 {
            mods.push(Mod::new("FI"));
        }
        mods
    }
}
