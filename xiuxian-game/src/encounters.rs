//! Encounter kinds, trigger odds and the event template library.
#[cfg(debug_assertions)]
use crate::constants::DEBUG_ENV_VAR;
use crate::constants::{
    BATTLE_CHANCE_FORTUNATE, BATTLE_CHANCE_LUCK_WEIGHT, BATTLE_CHANCE_MAX, BATTLE_CHANCE_MIN,
    BATTLE_CHANCE_NORMAL, BATTLE_CHANCE_REALM_WEIGHT, BATTLE_CHANCE_SECRET_REALM,
    BATTLE_CHANCE_SPEED_WEIGHT, FORTUNE_BASE_CHANCE, FORTUNE_LEVEL_WEIGHT, FORTUNE_LUCK_WEIGHT,
    FORTUNE_MAX_CHANCE, FORTUNE_REALM_WEIGHT, TEMPLATE_REPEAT_WINDOW,
};
use crate::collaborators::TemplateLibrary;
use crate::numbers::i64_to_f64;
use crate::outcome::AdventureOutcome;
use crate::realm::Realm;
use crate::state::PlayerState;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

const DEFAULT_TEMPLATE_DATA: &str = include_str!("../assets/data/templates.json");

#[cfg(debug_assertions)]
fn debug_log_enabled() -> bool {
    matches!(std::env::var(DEBUG_ENV_VAR), Ok(val) if val != "0")
}

#[cfg(not(debug_assertions))]
const fn debug_log_enabled() -> bool {
    false
}

/// Classification of an excursion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EncounterKind {
    #[default]
    Normal,
    Fortunate,
    /// A dangerous zone.
    SecretRealm,
    /// A sect hunting the player.
    Pursuit,
    /// A climactic tier-gate challenge.
    BossGate,
}

impl EncounterKind {
    /// Realm tiers between the player and a generated enemy.
    #[must_use]
    pub const fn realm_offset(self) -> i64 {
        match self {
            Self::SecretRealm => 1,
            Self::Fortunate => -1,
            Self::Normal | Self::Pursuit | Self::BossGate => 0,
        }
    }

    #[must_use]
    pub const fn base_battle_chance(self) -> f64 {
        match self {
            Self::Fortunate => BATTLE_CHANCE_FORTUNATE,
            Self::SecretRealm => BATTLE_CHANCE_SECRET_REALM,
            Self::Normal | Self::Pursuit | Self::BossGate => BATTLE_CHANCE_NORMAL,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Fortunate => "fortunate",
            Self::SecretRealm => "secret_realm",
            Self::Pursuit => "pursuit",
            Self::BossGate => "boss_gate",
        }
    }
}

impl fmt::Display for EncounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Danger rating of a secret realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl RiskLevel {
    #[must_use]
    pub const fn difficulty_factor(self) -> f64 {
        match self {
            Self::Low => 0.9,
            Self::Medium => 1.0,
            Self::High => 1.15,
            Self::Extreme => 1.3,
        }
    }
}

/// `min(0.75, max(0.05, base + realm·0.015 + speed·0.0004 − luck·0.0002))`.
#[must_use]
pub fn battle_chance(kind: EncounterKind, player: &PlayerState) -> f64 {
    let realm_index = i64::try_from(player.realm.index()).unwrap_or(0);
    let chance = kind.base_battle_chance()
        + i64_to_f64(realm_index) * BATTLE_CHANCE_REALM_WEIGHT
        + i64_to_f64(player.speed) * BATTLE_CHANCE_SPEED_WEIGHT
        - i64_to_f64(player.luck) * BATTLE_CHANCE_LUCK_WEIGHT;
    chance.clamp(BATTLE_CHANCE_MIN, BATTLE_CHANCE_MAX)
}

/// Odds that a plain excursion counts as fortunate.
#[must_use]
pub fn fortune_chance(player: &PlayerState) -> f64 {
    let realm_index = i64::try_from(player.realm.index()).unwrap_or(0);
    let level = i64::from(player.realm_level).saturating_sub(1);
    let chance = FORTUNE_BASE_CHANCE
        + i64_to_f64(realm_index) * FORTUNE_REALM_WEIGHT
        + i64_to_f64(level) * FORTUNE_LEVEL_WEIGHT
        + i64_to_f64(player.luck) * FORTUNE_LUCK_WEIGHT;
    chance.min(FORTUNE_MAX_CHANCE)
}

/// A narrative event blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTemplate {
    pub id: String,
    #[serde(default)]
    pub kinds: Vec<EncounterKind>,
    /// Empty means any risk level.
    #[serde(default)]
    pub risks: Vec<RiskLevel>,
    #[serde(default)]
    pub min_realm: Realm,
    #[serde(default)]
    pub max_realm: Option<Realm>,
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Id of a boss profile; such templates become a confirmation gate.
    #[serde(default)]
    pub boss: Option<String>,
    #[serde(default)]
    pub outcome: AdventureOutcome,
}

const fn default_weight() -> u32 {
    5
}

impl EventTemplate {
    #[must_use]
    pub fn matches(&self, kind: EncounterKind, risk: Option<RiskLevel>, realm: Realm) -> bool {
        let kind_ok = self.kinds.contains(&kind);
        let risk_ok = match risk {
            Some(risk) => self.risks.is_empty() || self.risks.contains(&risk),
            None => true,
        };
        let realm_ok = realm >= self.min_realm && self.max_realm.is_none_or(|max| realm <= max);
        kind_ok && risk_ok && realm_ok
    }

    /// The template's outcome with rewards scaled to the player's realm.
    #[must_use]
    pub fn instantiate(&self, realm: Realm) -> AdventureOutcome {
        self.outcome.clone().scaled(realm.reward_multiplier())
    }
}

/// Container for all event templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TemplateCatalog {
    #[serde(default)]
    pub templates: Vec<EventTemplate>,
}

impl TemplateCatalog {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            templates: Vec::new(),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into templates.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn load_from_static() -> Self {
        serde_json::from_str(DEFAULT_TEMPLATE_DATA).unwrap_or_default()
    }

    #[must_use]
    pub fn default_catalog() -> &'static Self {
        static CATALOG: OnceLock<TemplateCatalog> = OnceLock::new();
        CATALOG.get_or_init(Self::load_from_static)
    }

    pub fn candidates(
        &self,
        kind: EncounterKind,
        risk: Option<RiskLevel>,
        realm: Realm,
    ) -> impl Iterator<Item = &EventTemplate> {
        self.templates
            .iter()
            .filter(move |template| template.matches(kind, risk, realm))
    }
}

fn choose_weighted<R: Rng + ?Sized>(weights: &[(usize, u32)], rng: &mut R) -> Option<usize> {
    let total_weight: u32 = weights.iter().map(|(_, weight)| *weight).sum();
    if total_weight == 0 {
        return None;
    }

    let roll = rng.gen_range(0..total_weight);
    let mut current = 0;
    for (idx, weight) in weights {
        current += *weight;
        if roll < current {
            return Some(*idx);
        }
    }

    weights.first().map(|(idx, _)| *idx)
}

/// Template library backed by the embedded catalog.
///
/// Recently served templates sit out while other candidates remain, so the
/// same event does not fire twice in a row.
#[derive(Debug)]
pub struct StaticTemplateLibrary {
    catalog: Arc<TemplateCatalog>,
    recent: Mutex<VecDeque<String>>,
}

impl StaticTemplateLibrary {
    #[must_use]
    pub fn new(catalog: Arc<TemplateCatalog>) -> Self {
        Self {
            catalog,
            recent: Mutex::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }
}

impl Default for StaticTemplateLibrary {
    fn default() -> Self {
        Self::new(Arc::new(TemplateCatalog::default_catalog().clone()))
    }
}

impl TemplateLibrary for StaticTemplateLibrary {
    fn random_template(
        &self,
        kind: EncounterKind,
        risk: Option<RiskLevel>,
        realm: Realm,
        _realm_level: u8,
        rng: &mut dyn RngCore,
    ) -> Option<EventTemplate> {
        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        let candidates: Vec<(usize, &EventTemplate)> = self
            .catalog
            .templates
            .iter()
            .enumerate()
            .filter(|(_, template)| template.matches(kind, risk, realm))
            .collect();
        let fresh: Vec<(usize, u32)> = candidates
            .iter()
            .filter(|(_, template)| !recent.contains(&template.id))
            .map(|(idx, template)| (*idx, template.weight))
            .collect();
        let weights = if fresh.is_empty() {
            let last = recent.back();
            let mut rested: Vec<(usize, u32)> = candidates
                .iter()
                .filter(|(_, template)| Some(&template.id) != last)
                .map(|(idx, template)| (*idx, template.weight))
                .collect();
            if rested.is_empty() {
                rested = candidates
                    .iter()
                    .map(|(idx, template)| (*idx, template.weight))
                    .collect();
            }
            rested
        } else {
            fresh
        };

        if debug_log_enabled() {
            log::debug!(
                "Template selection | kind:{kind} realm:{realm} candidates:{}",
                weights.len()
            );
        }

        let picked = self.catalog.templates.get(choose_weighted(&weights, rng)?)?;
        recent.push_back(picked.id.clone());
        while recent.len() > TEMPLATE_REPEAT_WINDOW {
            recent.pop_front();
        }
        Some(picked.clone())
    }
}
