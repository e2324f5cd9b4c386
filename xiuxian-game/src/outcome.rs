//! Structured adventure outcomes as produced by templates and generators.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::companion::{CompanionGrant, PetOpportunity};
use crate::constants::DEFAULT_OUTCOME_EXP;
use crate::items::LootEntry;
use crate::lenient;
use crate::numbers::{i64_to_f64, round_f64_to_i64};
use crate::realm::Realm;
use crate::state::{Attribute, LogColor};

/// A resolved narrative event, before it touches the player.
///
/// Field names follow the generator contract (camelCase) and every field is
/// optional on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct AdventureOutcome {
    pub story: String,
    #[serde(deserialize_with = "lenient::i64_or_zero")]
    pub hp_change: i64,
    #[serde(deserialize_with = "lenient::i64_or_zero")]
    pub exp_change: i64,
    #[serde(deserialize_with = "lenient::i64_or_zero")]
    pub spirit_stones_change: i64,
    #[serde(deserialize_with = "color_or_normal")]
    pub event_color: LogColor,
    #[serde(deserialize_with = "lenient::opt_value")]
    pub item_obtained: Option<LootEntry>,
    #[serde(deserialize_with = "lenient::vec_skip_invalid")]
    pub items_obtained: Vec<LootEntry>,
    #[serde(deserialize_with = "lenient::opt_value")]
    pub pet_obtained: Option<CompanionGrant>,
    #[serde(deserialize_with = "lenient::opt_value")]
    pub pet_opportunity: Option<PetOpportunity>,
    #[serde(deserialize_with = "lenient::opt_value")]
    pub attribute_reduction: Option<AttributeReduction>,
    #[serde(deserialize_with = "lenient::i64_or_zero")]
    pub lottery_tickets_change: i64,
    #[serde(deserialize_with = "lenient::i64_or_zero")]
    pub inheritance_level_change: i64,
    #[serde(deserialize_with = "lenient::bool_or_false")]
    pub trigger_secret_realm: bool,
}

fn color_or_normal<'de, D>(deserializer: D) -> Result<LogColor, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().map(LogColor::from_label).unwrap_or_default())
}

impl AdventureOutcome {
    /// Zero-impact outcome used when nothing better is available.
    #[must_use]
    pub fn neutral(story: impl Into<String>) -> Self {
        Self {
            story: story.into(),
            ..Self::default()
        }
    }

    /// Minimal outcome when no template exists: a little realm-scaled experience.
    #[must_use]
    pub fn default_for(realm: Realm) -> Self {
        Self {
            story: String::from(
                "You wander the wilds for a while. \
                 Nothing remarkable happens, yet your qi settles a little.",
            ),
            exp_change: round_f64_to_i64(DEFAULT_OUTCOME_EXP * realm.reward_multiplier()),
            ..Self::default()
        }
    }

    /// All loot carried by the outcome, single entry first.
    pub fn loot(&self) -> impl Iterator<Item = &LootEntry> {
        self.item_obtained
            .iter()
            .chain(self.items_obtained.iter())
            .filter(|entry| !entry.name.trim().is_empty())
    }

    #[must_use]
    pub fn has_loot(&self) -> bool {
        self.loot().next().is_some()
    }

    /// Scale the numeric rewards of a template by a realm multiplier.
    #[must_use]
    pub fn scaled(mut self, multiplier: f64) -> Self {
        let scale = |value: i64| round_f64_to_i64(i64_to_f64(value) * multiplier);
        self.hp_change = scale(self.hp_change);
        self.exp_change = scale(self.exp_change);
        self.spirit_stones_change = scale(self.spirit_stones_change);
        self
    }
}

/// Requested losses across the six reducible attributes.
///
/// Magnitudes are read as absolute values: generators are inconsistent about
/// whether a loss is written as `5` or `-5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct AttributeReduction {
    #[serde(deserialize_with = "lenient::i64_or_zero")]
    pub attack: i64,
    #[serde(deserialize_with = "lenient::i64_or_zero")]
    pub defense: i64,
    #[serde(alias = "spirit", deserialize_with = "lenient::i64_or_zero")]
    pub spirit_power: i64,
    #[serde(deserialize_with = "lenient::i64_or_zero")]
    pub physique: i64,
    #[serde(deserialize_with = "lenient::i64_or_zero")]
    pub speed: i64,
    #[serde(alias = "hp", deserialize_with = "lenient::i64_or_zero")]
    pub max_hp: i64,
}

impl AttributeReduction {
    #[must_use]
    pub const fn requested(&self, attribute: Attribute) -> i64 {
        let raw = match attribute {
            Attribute::Attack => self.attack,
            Attribute::Defense => self.defense,
            Attribute::SpiritPower => self.spirit_power,
            Attribute::Physique => self.physique,
            Attribute::Speed => self.speed,
            Attribute::MaxHp => self.max_hp,
        };
        raw.saturating_abs()
    }

    #[must_use]
    pub fn requested_total(&self) -> i64 {
        Attribute::ALL
            .iter()
            .map(|attribute| self.requested(*attribute))
            .fold(0_i64, i64::saturating_add)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requested_total() == 0
    }
}
