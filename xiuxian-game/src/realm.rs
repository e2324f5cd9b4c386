//! Cultivation realms: the ordered power tiers a character climbs through.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{MAX_REALM_LEVEL, REALM_REWARD_STEP};
use crate::numbers::i64_to_f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Realm {
    #[default]
    QiRefining,
    FoundationEstablishment,
    CoreFormation,
    NascentSoul,
    SpiritSevering,
    VoidRefining,
    BodyIntegration,
    Mahayana,
    TribulationTranscendence,
}

impl Realm {
    pub const ALL: [Self; 9] = [
        Self::QiRefining,
        Self::FoundationEstablishment,
        Self::CoreFormation,
        Self::NascentSoul,
        Self::SpiritSevering,
        Self::VoidRefining,
        Self::BodyIntegration,
        Self::Mahayana,
        Self::TribulationTranscendence,
    ];

    pub const MAX_INDEX: usize = Self::ALL.len() - 1;

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Realm at `index`, saturating at the highest tier.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        if index > Self::MAX_INDEX {
            Self::ALL[Self::MAX_INDEX]
        } else {
            Self::ALL[index]
        }
    }

    /// Shift by a signed number of tiers, clamped to the valid range.
    #[must_use]
    pub fn offset(self, delta: i64) -> Self {
        let shifted = i64::try_from(self.index()).unwrap_or(0).saturating_add(delta);
        let max = i64::try_from(Self::MAX_INDEX).unwrap_or(0);
        Self::from_index(usize::try_from(shifted.clamp(0, max)).unwrap_or(0))
    }

    /// Multiplier applied to realm-scaled rewards (default outcomes, compensation).
    #[must_use]
    pub fn reward_multiplier(self) -> f64 {
        let index = i64::try_from(self.index()).unwrap_or(0);
        1.0 + i64_to_f64(index) * REALM_REWARD_STEP
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::QiRefining => "Qi Refining",
            Self::FoundationEstablishment => "Foundation Establishment",
            Self::CoreFormation => "Core Formation",
            Self::NascentSoul => "Nascent Soul",
            Self::SpiritSevering => "Spirit Severing",
            Self::VoidRefining => "Void Refining",
            Self::BodyIntegration => "Body Integration",
            Self::Mahayana => "Mahayana",
            Self::TribulationTranscendence => "Tribulation Transcendence",
        }
    }

    #[must_use]
    pub const fn max_level() -> u8 {
        MAX_REALM_LEVEL
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
