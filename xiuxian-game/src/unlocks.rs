//! Cultivation arts and talents, and the rarity-gated odds of unlocking them.
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::constants::{
    ART_UNLOCK_CHANCE, ART_UNLOCK_CHANCE_ZONE, TALENT_UNLOCK_CHANCE,
    TALENT_UNLOCK_CHANCE_FORTUNATE, TALENT_UNLOCK_CHANCE_ZONE,
};
use crate::encounters::EncounterKind;
use crate::realm::Realm;
use crate::state::PlayerState;

const DEFAULT_ART_DATA: &str = include_str!("../assets/data/arts.json");
const DEFAULT_TALENT_DATA: &str = include_str!("../assets/data/talents.json");

pub type ArtId = String;
pub type TalentId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtDef {
    pub id: ArtId,
    pub name: String,
    #[serde(default)]
    pub realm_requirement: Realm,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TalentTier {
    #[default]
    Ordinary,
    Common,
    Rare,
    Legendary,
    Immortal,
}

impl TalentTier {
    /// Ordinary and immortal talents never come from adventures.
    #[must_use]
    pub const fn is_adventure_eligible(self) -> bool {
        !matches!(self, Self::Ordinary | Self::Immortal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalentDef {
    pub id: TalentId,
    pub name: String,
    #[serde(default)]
    pub tier: TalentTier,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ArtCatalog {
    #[serde(default)]
    pub arts: Vec<ArtDef>,
}

impl ArtCatalog {
    #[must_use]
    pub fn load_from_static() -> Self {
        serde_json::from_str(DEFAULT_ART_DATA).unwrap_or_default()
    }

    #[must_use]
    pub fn default_catalog() -> &'static Self {
        static CATALOG: OnceLock<ArtCatalog> = OnceLock::new();
        CATALOG.get_or_init(Self::load_from_static)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ArtDef> {
        self.arts.iter().find(|art| art.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TalentCatalog {
    #[serde(default)]
    pub talents: Vec<TalentDef>,
}

impl TalentCatalog {
    #[must_use]
    pub fn load_from_static() -> Self {
        serde_json::from_str(DEFAULT_TALENT_DATA).unwrap_or_default()
    }

    #[must_use]
    pub fn default_catalog() -> &'static Self {
        static CATALOG: OnceLock<TalentCatalog> = OnceLock::new();
        CATALOG.get_or_init(Self::load_from_static)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&TalentDef> {
        self.talents.iter().find(|talent| talent.id == id)
    }
}

#[must_use]
pub fn art_unlock_chance(kind: EncounterKind, zone_sourced: bool) -> f64 {
    match (kind, zone_sourced) {
        (EncounterKind::Fortunate, _) => 0.0,
        (_, true) => ART_UNLOCK_CHANCE_ZONE,
        (_, false) => ART_UNLOCK_CHANCE,
    }
}

#[must_use]
pub fn talent_unlock_chance(kind: EncounterKind, zone_sourced: bool) -> f64 {
    match (kind, zone_sourced) {
        (EncounterKind::Fortunate, _) => TALENT_UNLOCK_CHANCE_FORTUNATE,
        (_, true) => TALENT_UNLOCK_CHANCE_ZONE,
        (_, false) => TALENT_UNLOCK_CHANCE,
    }
}

/// Roll for an art the player can use and does not own yet.
pub fn roll_art_unlock<'a, R>(
    state: &PlayerState,
    catalog: &'a ArtCatalog,
    kind: EncounterKind,
    zone_sourced: bool,
    rng: &mut R,
) -> Option<&'a ArtDef>
where
    R: Rng + ?Sized,
{
    let chance = art_unlock_chance(kind, zone_sourced);
    if chance <= 0.0 || rng.r#gen::<f64>() >= chance {
        return None;
    }
    let eligible: Vec<&ArtDef> = catalog
        .arts
        .iter()
        .filter(|art| art.realm_requirement <= state.realm)
        .filter(|art| !state.learned_arts.contains(&art.id))
        .collect();
    eligible.choose(rng).copied()
}

/// Roll for a first talent. Players who already have one never roll.
pub fn roll_talent_unlock<'a, R>(
    state: &PlayerState,
    catalog: &'a TalentCatalog,
    kind: EncounterKind,
    zone_sourced: bool,
    rng: &mut R,
) -> Option<&'a TalentDef>
where
    R: Rng + ?Sized,
{
    if state.talent.is_some() {
        return None;
    }
    if rng.r#gen::<f64>() >= talent_unlock_chance(kind, zone_sourced) {
        return None;
    }
    let eligible: Vec<&TalentDef> = catalog
        .talents
        .iter()
        .filter(|talent| talent.tier.is_adventure_eligible())
        .collect();
    eligible.choose(rng).copied()
}
