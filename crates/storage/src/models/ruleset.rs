use serde::{Deserialize, Serialize};

/// Closed set of supported rulesets. An id outside this set is not an error
/// condition; events carrying one are skipped without touching any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum RulesetId {
    Standard = 0,
    Precision = 1,
    Catch = 2,
    Columnar = 3,
}

impl RulesetId {
    pub const ALL: [RulesetId; 4] = [
        RulesetId::Standard,
        RulesetId::Precision,
        RulesetId::Catch,
        RulesetId::Columnar,
    ];

    pub fn as_i16(self) -> i16 {
        self as i16
    }
}

impl TryFrom<i16> for RulesetId {
    type Error = i16;

    fn try_from(value: i16) -> std::result::Result<Self, i16> {
        match value {
            0 => Ok(RulesetId::Standard),
            1 => Ok(RulesetId::Precision),
            2 => Ok(RulesetId::Catch),
            3 => Ok(RulesetId::Columnar),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for RulesetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RulesetId::Standard => "standard",
            RulesetId::Precision => "precision",
            RulesetId::Catch => "catch",
            RulesetId::Columnar => "columnar",
        };
        f.write_str(name)
    }
}
