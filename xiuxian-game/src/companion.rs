//! Companions ("pets") and their progression rules.
use serde::{Deserialize, Serialize};

use crate::constants::{COMPANION_EXP_CURVE, COMPANION_MAX_EVOLUTION, COMPANION_MAX_LEVEL_GAIN};
use crate::items::Rarity;
use crate::lenient;
use crate::numbers::{i64_to_f64, round_f64_to_i64};

pub type CompanionId = String;

const EVOLUTION_FACTORS: StatFactors = StatFactors {
    attack: 1.5,
    defense: 1.5,
    hp: 1.5,
    speed: 1.2,
};
const LEVEL_FACTORS: StatFactors = StatFactors {
    attack: 1.1,
    defense: 1.1,
    hp: 1.1,
    speed: 1.05,
};
const STARTING_MAX_EXP: i64 = 100;

struct StatFactors {
    attack: f64,
    defense: f64,
    hp: f64,
    speed: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Companion {
    pub id: CompanionId,
    pub name: String,
    pub species: String,
    pub rarity: Rarity,
    pub level: u32,
    pub exp: i64,
    pub max_exp: i64,
    pub evolution: u8,
    pub attack: i64,
    pub defense: i64,
    pub hp: i64,
    pub speed: i64,
}

impl Companion {
    #[must_use]
    pub fn from_grant(id: CompanionId, grant: &CompanionGrant) -> Self {
        let species = if grant.species.trim().is_empty() {
            grant.name.trim().to_string()
        } else {
            grant.species.trim().to_string()
        };
        Self {
            id,
            name: grant.name.trim().to_string(),
            species,
            rarity: grant
                .rarity
                .as_deref()
                .and_then(Rarity::from_label)
                .unwrap_or_default(),
            level: 1,
            exp: 0,
            max_exp: STARTING_MAX_EXP,
            evolution: 0,
            attack: grant.attack.max(1),
            defense: grant.defense.max(1),
            hp: grant.hp.max(1),
            speed: grant.speed.max(1),
        }
    }

    #[must_use]
    pub fn same_species(&self, species: &str) -> bool {
        self.species.trim().eq_ignore_ascii_case(species.trim())
    }

    /// Evolve one stage. Returns `false` when already fully evolved.
    pub fn evolve(&mut self) -> bool {
        if self.evolution >= COMPANION_MAX_EVOLUTION {
            return false;
        }
        self.evolution += 1;
        self.scale(&EVOLUTION_FACTORS);
        true
    }

    /// Gain up to five levels at once. Returns the number actually gained.
    pub fn gain_levels(&mut self, requested: u32) -> u32 {
        let levels = requested.min(COMPANION_MAX_LEVEL_GAIN);
        for _ in 0..levels {
            self.level_up();
        }
        levels
    }

    /// Add experience, cascading as many level-ups as it pays for.
    pub fn gain_exp(&mut self, amount: i64) -> u32 {
        self.exp = self.exp.saturating_add(amount.max(0));
        let mut gained = 0;
        while self.exp >= self.max_exp && self.max_exp > 0 {
            self.exp -= self.max_exp;
            self.level_up();
            gained += 1;
        }
        gained
    }

    pub fn boost(&mut self, boost: &CompanionBoost) {
        self.attack = self.attack.saturating_add(boost.attack).max(0);
        self.defense = self.defense.saturating_add(boost.defense).max(0);
        self.hp = self.hp.saturating_add(boost.hp).max(1);
        self.speed = self.speed.saturating_add(boost.speed).max(0);
    }

    fn level_up(&mut self) {
        self.level += 1;
        self.max_exp = round_f64_to_i64(i64_to_f64(self.max_exp) * COMPANION_EXP_CURVE).max(1);
        self.scale(&LEVEL_FACTORS);
    }

    fn scale(&mut self, factors: &StatFactors) {
        self.attack = round_f64_to_i64(i64_to_f64(self.attack) * factors.attack);
        self.defense = round_f64_to_i64(i64_to_f64(self.defense) * factors.defense);
        self.hp = round_f64_to_i64(i64_to_f64(self.hp) * factors.hp);
        self.speed = round_f64_to_i64(i64_to_f64(self.speed) * factors.speed);
    }
}

/// A companion offered by an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CompanionGrant {
    pub name: String,
    pub species: String,
    pub rarity: Option<String>,
    #[serde(deserialize_with = "lenient::i64_or_zero")]
    pub attack: i64,
    #[serde(deserialize_with = "lenient::i64_or_zero")]
    pub defense: i64,
    #[serde(deserialize_with = "lenient::i64_or_zero")]
    pub hp: i64,
    #[serde(deserialize_with = "lenient::i64_or_zero")]
    pub speed: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CompanionBoost {
    #[serde(deserialize_with = "lenient::i64_or_zero")]
    pub attack: i64,
    #[serde(deserialize_with = "lenient::i64_or_zero")]
    pub defense: i64,
    #[serde(deserialize_with = "lenient::i64_or_zero")]
    pub hp: i64,
    #[serde(deserialize_with = "lenient::i64_or_zero")]
    pub speed: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PetOpportunityKind {
    #[default]
    #[serde(alias = "evolve")]
    Evolution,
    #[serde(alias = "levelGain", alias = "level")]
    LevelUp,
    #[serde(alias = "boost", alias = "stats")]
    StatBoost,
    #[serde(alias = "exp")]
    ExpGain,
}

/// Progress offered to an existing companion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct PetOpportunity {
    #[serde(alias = "type")]
    pub kind: PetOpportunityKind,
    #[serde(alias = "petId")]
    pub companion_id: Option<CompanionId>,
    #[serde(deserialize_with = "lenient::i64_or_zero")]
    pub levels: i64,
    #[serde(deserialize_with = "lenient::i64_or_zero")]
    pub exp: i64,
    pub boost: CompanionBoost,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fox() -> Companion {
        Companion::from_grant(
            "c-1".into(),
            &CompanionGrant {
                name: "Ember".into(),
                species: "Fire Fox".into(),
                rarity: Some("rare".into()),
                attack: 100,
                defense: 100,
                hp: 100,
                speed: 100,
            },
        )
    }

    #[test]
    fn evolution_caps_at_stage_two() {
        let mut pet = fox();
        assert!(pet.evolve());
        assert_eq!((pet.attack, pet.hp, pet.speed), (150, 150, 120));
        assert!(pet.evolve());
        assert!(!pet.evolve());
        assert_eq!(pet.evolution, 2);
        assert_eq!(pet.attack, 225);
    }

    #[test]
    fn level_gain_is_capped_at_five() {
        let mut pet = fox();
        assert_eq!(pet.gain_levels(9), 5);
        assert_eq!(pet.level, 6);
        assert!(pet.attack > 150 && pet.attack < 170);
    }

    #[test]
    fn exp_cascades_across_growing_curve() {
        let mut pet = fox();
        // 100 for level 2, then 150 for level 3, with 10 left over.
        assert_eq!(pet.gain_exp(260), 2);
        assert_eq!(pet.level, 3);
        assert_eq!(pet.exp, 10);
        assert_eq!(pet.max_exp, 225);
    }

    #[test]
    fn opportunity_kind_accepts_aliases() {
        let parsed: PetOpportunity =
            serde_json::from_str(r#"{"type": "levelGain", "levels": "+3"}"#).unwrap();
        assert_eq!(parsed.kind, PetOpportunityKind::LevelUp);
        assert_eq!(parsed.levels, 3);
    }
}
