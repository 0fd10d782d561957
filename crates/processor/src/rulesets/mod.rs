//! Closed set of ruleset capabilities. Each ruleset supplies its hit-result
//! taxonomy, an opaque rating function over (score, difficulty attributes),
//! and conversion of legacy modifier bitmasks into the current mod shape.
//!
//! Ordinary interface dispatch over four statically-known variants: rulesets
//! are data plug-ins in the upstream service, but nothing here needs dynamic
//! loading.

mod catch;
mod columnar;
mod precision;
mod standard;

use storage::models::{DifficultyAttributes, HitResult, Mod, RulesetId, ScoreEvent};

pub use catch::CatchRuleset;
pub use columnar::ColumnarRuleset;
pub use precision::PrecisionRuleset;
pub use standard::StandardRuleset;

pub trait Ruleset: Send + Sync {
    fn id(&self) -> RulesetId;

    /// The subset of hit results this ruleset can produce.
    fn hit_result_taxonomy(&self) -> &'static [HitResult];

    /// Computes the performance rating for one score. `None` means the score
    /// cannot be rated (missing inputs), which is not an error.
    fn compute_rating(
        &self,
        score: &ScoreEvent,
        attributes: &DifficultyAttributes,
    ) -> Option<f64>;

    /// Converts a legacy modifier bitmask into the current mod set.
    fn convert_legacy_mods(&self, bitmask: i32) -> Vec<Mod>;
}

static STANDARD: StandardRuleset = StandardRuleset;
static PRECISION: PrecisionRuleset = PrecisionRuleset;
static CATCH: CatchRuleset = CatchRuleset;
static COLUMNAR: ColumnarRuleset = ColumnarRuleset;

pub fn ruleset_for(id: RulesetId) -> &'static dyn Ruleset {
    match id {
        RulesetId::Standard => &STANDARD,
        RulesetId::Precision => &PRECISION,
        RulesetId::Catch => &CATCH,
        RulesetId::Columnar => &COLUMNAR,
    }
}

/// Legacy modifier bitmask flags, shared across rulesets.
pub mod legacy_mods {
    pub const NO_FAIL: i32 = 1;
    pub const EASY: i32 = 1 << 1;
    pub const TOUCH_DEVICE: i32 = 1 << 2;
    pub const HIDDEN: i32 = 1 << 3;
    pub const HARD_ROCK: i32 = 1 << 4;
    pub const SUDDEN_DEATH: i32 = 1 << 5;
    pub const DOUBLE_TIME: i32 = 1 << 6;
    pub const HALF_TIME: i32 = 1 << 8;
    pub const NIGHTCORE: i32 = 1 << 9;
    pub const FLASHLIGHT: i32 = 1 << 10;
    pub const SPUN_OUT: i32 = 1 << 12;
    pub const PERFECT: i32 = 1 << 14;
    pub const KEY4: i32 = 1 << 15;
    pub const KEY5: i32 = 1 << 16;
    pub const KEY6: i32 = 1 << 17;
    pub const KEY7: i32 = 1 << 18;
    pub const KEY8: i32 = 1 << 19;
    pub const FADE_IN: i32 = 1 << 20;
    pub const KEY9: i32 = 1 << 24;
}

/// Bitmask over the difficulty-affecting subset of a score's mods. This is
/// the third component of the attribute cache key, so it must stay stable
/// across processes.
pub fn difficulty_mod_bitmask(mods: &[Mod]) -> i32 {
    let mut mask = 0;
    for m in mods {
        mask |= match m.acronym.as_str() {
            "EZ" => legacy_mods::EASY,
            "HR" => legacy_mods::HARD_ROCK,
            "DT" | "NC" => legacy_mods::DOUBLE_TIME,
            "HT" => legacy_mods::HALF_TIME,
            "FL" => legacy_mods::FLASHLIGHT,
            "TD" => legacy_mods::TOUCH_DEVICE,
            "4K" => legacy_mods::KEY4,
            "5K" => legacy_mods::KEY5,
            "6K" => legacy_mods::KEY6,
            "7K" => legacy_mods::KEY7,
            "8K" => legacy_mods::KEY8,
            "9K" => legacy_mods::KEY9,
            _ => 0,
        };
    }
    mask
}

/// Conversion for the flags every ruleset shares. Ruleset implementations
/// append their own extras on top.
pub(crate) fn convert_common_mods(bitmask: i32) -> Vec<Mod> {
    let mut mods = Vec::new();
    let mut push = |flag: i32, acronym: &str| {
        if bitmask & flag != 0 {
            mods.push(Mod::new(acronym));
        }
    };

    push(legacy_mods::EASY, "EZ");
    push(legacy_mods::NO_FAIL, "NF");
    push(legacy_mods::HALF_TIME, "HT");
    push(legacy_mods::HARD_ROCK, "HR");
    push(legacy_mods::SUDDEN_DEATH, "SD");
    push(legacy_mods::PERFECT, "PF");
    push(legacy_mods::HIDDEN, "HD");
    push(legacy_mods::FLASHLIGHT, "FL");

    // Nightcore implies double time in the legacy encoding.
    if bitmask & legacy_mods::NIGHTCORE != 0 {
        mods.push(Mod::new("NC"));
    } else if bitmask & legacy_mods::DOUBLE_TIME != 0 {
        mods.push(Mod::new("DT"));
    }

    mods
}

/// Combo scaling shared by the combo-sensitive rating stand-ins.
pub(crate) fn combo_factor(score: &ScoreEvent, attributes: &DifficultyAttributes) -> f64 {
    match attributes.max_combo() {
        Some(max) if max > 0.0 => (f64::from(score.max_combo) / max).clamp(0.0, 1.0).powf(0.8),
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_bitmask_ignores_irrelevant_mods() {
        let mods = vec![Mod::new("HD"), Mod::new("HR"), Mod::new("NF")];
        assert_eq!(difficulty_mod_bitmask(&mods), legacy_mods::HARD_ROCK);
    }

    #[test]
    fn nightcore_and_double_time_share_a_bit() {
        assert_eq!(
            difficulty_mod_bitmask(&[Mod::new("NC")]),
            difficulty_mod_bitmask(&[Mod::new("DT")])
        );
    }

    #[test]
    fn legacy_nightcore_converts_to_single_mod() {
        let converted = convert_common_mods(
            legacy_mods::NIGHTCORE | legacy_mods::DOUBLE_TIME | legacy_mods::HIDDEN,
        );
        let acronyms: Vec<&str> = converted.iter().map(|m| m.acronym.as_str()).collect();
        assert!(acronyms.contains(&"NC"));
        assert!(!acronyms.contains(&"DT"));
        assert!(acronyms.contains(&"HD"));
    }

    #[test]
    fn every_ruleset_id_resolves() {
        for id in RulesetId::ALL {
            assert_eq!(ruleset_for(id).id(), id);
        }
    }
}
