//! Embedded content catalogs and the bundle the engine loads them into.
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::boss::BossConfig;
use crate::encounters::TemplateCatalog;
use crate::error::ContentError;
use crate::items::{ItemType, LootEntry, Rarity, StatBundle};
use crate::realm::Realm;
use crate::unlocks::{ArtCatalog, TalentCatalog};

const DEFAULT_KNOWN_ITEM_DATA: &str = include_str!("../assets/data/known_items.json");
const DEFAULT_BATTLE_LOOT_DATA: &str = include_str!("../assets/data/battle_loot.json");
const DEFAULT_MERCHANT_DATA: &str = include_str!("../assets/data/merchant.json");
const DEFAULT_ENEMY_NAME_DATA: &str = include_str!("../assets/data/enemy_names.json");

/// A canonical item whose effects override whatever a generator declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownItem {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub item_type: ItemType,
    #[serde(default)]
    pub rarity: Rarity,
    #[serde(default)]
    pub effect: Option<StatBundle>,
    #[serde(default)]
    pub permanent_effect: Option<StatBundle>,
}

impl KnownItem {
    fn answers_to(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownItemCatalog {
    #[serde(default)]
    pub items: Vec<KnownItem>,
}

impl Default for KnownItemCatalog {
    fn default() -> Self {
        Self::default_catalog().clone()
    }
}

impl KnownItemCatalog {
    #[must_use]
    pub fn load_from_static() -> Self {
        serde_json::from_str(DEFAULT_KNOWN_ITEM_DATA).unwrap_or(Self { items: Vec::new() })
    }

    #[must_use]
    pub fn default_catalog() -> &'static Self {
        static CATALOG: OnceLock<KnownItemCatalog> = OnceLock::new();
        CATALOG.get_or_init(Self::load_from_static)
    }

    /// Case-insensitive lookup by name or alias.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&KnownItem> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        self.items.iter().find(|item| item.answers_to(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleLootEntry {
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub min_realm: Realm,
    pub loot: LootEntry,
}

const fn default_weight() -> u32 {
    1
}

/// Victory drops, gated by realm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BattleLootTable {
    #[serde(default)]
    pub entries: Vec<BattleLootEntry>,
}

impl BattleLootTable {
    #[must_use]
    pub fn load_from_static() -> Self {
        serde_json::from_str(DEFAULT_BATTLE_LOOT_DATA).unwrap_or_default()
    }

    /// Weighted pick among entries the realm has unlocked.
    pub fn roll<R>(&self, realm: Realm, rng: &mut R) -> Option<&LootEntry>
    where
        R: Rng + ?Sized,
    {
        let eligible: Vec<&BattleLootEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.min_realm <= realm)
            .collect();
        eligible
            .choose_weighted(rng, |entry| entry.weight)
            .ok()
            .copied()
            .map(|entry| &entry.loot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantOffer {
    pub id: String,
    pub base_price: i64,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub min_realm: Realm,
    pub loot: LootEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MerchantCatalog {
    #[serde(default)]
    pub offers: Vec<MerchantOffer>,
}

impl MerchantCatalog {
    #[must_use]
    pub fn load_from_static() -> Self {
        serde_json::from_str(DEFAULT_MERCHANT_DATA).unwrap_or_default()
    }
}

/// Static name and title pools for generated enemies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyNamePools {
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub titles: Vec<String>,
}

impl Default for EnemyNamePools {
    fn default() -> Self {
        serde_json::from_str(DEFAULT_ENEMY_NAME_DATA).unwrap_or_else(|_| Self {
            names: vec![String::from("Wandering Demon Beast")],
            titles: vec![String::from("the Nameless")],
        })
    }
}

impl EnemyNamePools {
    /// Draw a name and title; empty pools fall back to fixed strings.
    pub fn draw<R>(&self, rng: &mut R) -> (String, String)
    where
        R: Rng + ?Sized,
    {
        let name = self
            .names
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| String::from("Wandering Demon Beast"));
        let title = self.titles.choose(rng).cloned().unwrap_or_default();
        (name, title)
    }
}

/// Every content table the adventure core reads.
#[derive(Debug, Clone, PartialEq)]
pub struct GameContent {
    pub known_items: KnownItemCatalog,
    pub templates: TemplateCatalog,
    pub arts: ArtCatalog,
    pub talents: TalentCatalog,
    pub battle_loot: BattleLootTable,
    pub merchant: MerchantCatalog,
    pub bosses: BossConfig,
    pub enemy_names: EnemyNamePools,
}

impl Default for GameContent {
    fn default() -> Self {
        Self::default_content().clone()
    }
}

impl GameContent {
    /// Load the embedded defaults, falling back per table when an asset is malformed.
    #[must_use]
    pub fn load_from_static() -> Self {
        Self {
            known_items: KnownItemCatalog::load_from_static(),
            templates: TemplateCatalog::load_from_static(),
            arts: ArtCatalog::load_from_static(),
            talents: TalentCatalog::load_from_static(),
            battle_loot: BattleLootTable::load_from_static(),
            merchant: MerchantCatalog::load_from_static(),
            bosses: BossConfig::load_from_static(),
            enemy_names: EnemyNamePools::default(),
        }
    }

    #[must_use]
    pub fn default_content() -> &'static Self {
        static CONTENT: OnceLock<GameContent> = OnceLock::new();
        CONTENT.get_or_init(Self::load_from_static)
    }

    /// Cross-table checks the individual parsers cannot make.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::UnknownBoss`] for a template gating on a boss
    /// that has no profile.
    pub fn validate(&self) -> Result<(), ContentError> {
        self.templates
            .templates
            .iter()
            .filter_map(|template| template.boss.as_deref())
            .find(|boss| self.bosses.get(boss).is_none())
            .map_or(Ok(()), |boss| Err(ContentError::UnknownBoss(boss.to_string())))
    }
}
