//! Item taxonomy, stat bundles and the loot ingestion pipeline.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::KnownItemCatalog;
use crate::lenient;

mod classifier;
mod normalizer;

pub use classifier::{Classification, infer_item_type_and_slot};
pub use normalizer::{NormalizedEffect, normalize_item_effect};

pub type ItemId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Weapon,
    Armor,
    Accessory,
    Ring,
    Artifact,
    Pill,
    Herb,
    Material,
    Recipe,
    Consumable,
}

impl ItemType {
    /// Tolerant label parsing for upstream payloads (English or Chinese).
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        let parsed = match normalized.as_str() {
            "weapon" | "武器" => Self::Weapon,
            "armor" | "armour" | "护甲" | "防具" => Self::Armor,
            "accessory" | "jewelry" | "饰品" => Self::Accessory,
            "ring" | "戒指" => Self::Ring,
            "artifact" | "treasure" | "法宝" => Self::Artifact,
            "pill" | "elixir" | "丹药" => Self::Pill,
            "herb" | "灵草" | "草药" => Self::Herb,
            "material" | "材料" => Self::Material,
            "recipe" | "formula" | "丹方" => Self::Recipe,
            "consumable" | "消耗品" => Self::Consumable,
            _ => return None,
        };
        Some(parsed)
    }

    /// Types that occupy an equipment slot.
    #[must_use]
    pub const fn is_equipment(self) -> bool {
        matches!(
            self,
            Self::Weapon | Self::Armor | Self::Accessory | Self::Ring | Self::Artifact
        )
    }

    /// Slot used when nothing more specific is known.
    #[must_use]
    pub const fn default_slot(self) -> Option<EquipmentSlot> {
        match self {
            Self::Weapon => Some(EquipmentSlot::Weapon),
            Self::Armor => Some(EquipmentSlot::Chest),
            Self::Accessory => Some(EquipmentSlot::Accessory),
            Self::Ring => Some(EquipmentSlot::Ring),
            Self::Artifact => Some(EquipmentSlot::Artifact),
            Self::Pill | Self::Herb | Self::Material | Self::Recipe | Self::Consumable => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weapon => "weapon",
            Self::Armor => "armor",
            Self::Accessory => "accessory",
            Self::Ring => "ring",
            Self::Artifact => "artifact",
            Self::Pill => "pill",
            Self::Herb => "herb",
            Self::Material => "material",
            Self::Recipe => "recipe",
            Self::Consumable => "consumable",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentSlot {
    Weapon,
    Head,
    Shoulder,
    Chest,
    Gloves,
    Legs,
    Boots,
    Ring,
    Accessory,
    Artifact,
}

impl EquipmentSlot {
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let parsed = match label.trim().to_ascii_lowercase().as_str() {
            "weapon" => Self::Weapon,
            "head" | "helmet" => Self::Head,
            "shoulder" | "shoulders" => Self::Shoulder,
            "chest" | "body" => Self::Chest,
            "gloves" | "hands" => Self::Gloves,
            "legs" | "pants" => Self::Legs,
            "boots" | "feet" => Self::Boots,
            "ring" | "ring1" | "ring2" => Self::Ring,
            "accessory" | "accessory1" | "accessory2" => Self::Accessory,
            "artifact" => Self::Artifact,
            _ => return None,
        };
        Some(parsed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    #[default]
    Common,
    Rare,
    Legendary,
    Immortal,
}

impl Rarity {
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let parsed = match label.trim().to_ascii_lowercase().as_str() {
            "common" | "普通" => Self::Common,
            "rare" | "稀有" => Self::Rare,
            "legendary" | "传说" => Self::Legendary,
            "immortal" | "mythic" | "仙品" => Self::Immortal,
            _ => return None,
        };
        Some(parsed)
    }

    /// Base magnitude of a synthesized artifact attribute.
    #[must_use]
    pub const fn synthesis_base(self) -> f64 {
        match self {
            Self::Common => 10.0,
            Self::Rare => 30.0,
            Self::Legendary => 80.0,
            Self::Immortal => 200.0,
        }
    }

    #[must_use]
    pub const fn multiplier(self) -> f64 {
        match self {
            Self::Common => 1.0,
            Self::Rare => 1.2,
            Self::Legendary => 1.5,
            Self::Immortal => 2.0,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Common => "Common",
            Self::Rare => "Rare",
            Self::Legendary => "Legendary",
            Self::Immortal => "Immortal",
        }
    }
}

/// Stat deltas carried by an item, outcome or companion boost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StatBundle {
    #[serde(deserialize_with = "lenient::i64_or_zero", skip_serializing_if = "is_zero")]
    pub hp: i64,
    #[serde(
        alias = "maxHp",
        deserialize_with = "lenient::i64_or_zero",
        skip_serializing_if = "is_zero"
    )]
    pub max_hp: i64,
    #[serde(deserialize_with = "lenient::i64_or_zero", skip_serializing_if = "is_zero")]
    pub attack: i64,
    #[serde(deserialize_with = "lenient::i64_or_zero", skip_serializing_if = "is_zero")]
    pub defense: i64,
    #[serde(
        alias = "spiritPower",
        alias = "spirit",
        deserialize_with = "lenient::i64_or_zero",
        skip_serializing_if = "is_zero"
    )]
    pub spirit_power: i64,
    #[serde(deserialize_with = "lenient::i64_or_zero", skip_serializing_if = "is_zero")]
    pub physique: i64,
    #[serde(deserialize_with = "lenient::i64_or_zero", skip_serializing_if = "is_zero")]
    pub speed: i64,
    #[serde(deserialize_with = "lenient::i64_or_zero", skip_serializing_if = "is_zero")]
    pub exp: i64,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(value: &i64) -> bool {
    *value == 0
}

impl StatBundle {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.hp == 0
            && self.max_hp == 0
            && self.attack == 0
            && self.defense == 0
            && self.spirit_power == 0
            && self.physique == 0
            && self.speed == 0
            && self.exp == 0
    }

    /// True when any combat attribute (everything except `exp`) is set.
    #[must_use]
    pub const fn has_attributes(&self) -> bool {
        self.hp != 0
            || self.max_hp != 0
            || self.attack != 0
            || self.defense != 0
            || self.spirit_power != 0
            || self.physique != 0
            || self.speed != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub item_type: ItemType,
    #[serde(default)]
    pub description: String,
    pub rarity: Rarity,
    pub quantity: u32,
    #[serde(default)]
    pub is_equippable: bool,
    #[serde(default)]
    pub equipment_slot: Option<EquipmentSlot>,
    #[serde(default)]
    pub effect: Option<StatBundle>,
    #[serde(default)]
    pub permanent_effect: Option<StatBundle>,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub revive_chances: Option<u32>,
}

impl Item {
    /// Enforce the structural item invariants in place.
    pub fn sanitize(&mut self) {
        if self.is_equippable && self.item_type.is_equipment() {
            self.quantity = 1;
            self.permanent_effect = None;
            if self.equipment_slot.is_none() {
                self.equipment_slot = self.item_type.default_slot();
            }
        } else {
            self.is_equippable = false;
            self.equipment_slot = None;
            self.quantity = self.quantity.max(1);
        }
        if self.effect.is_some_and(|effect| effect.is_empty()) {
            self.effect = None;
        }
        if self.permanent_effect.is_some_and(|effect| effect.is_empty()) {
            self.permanent_effect = None;
        }
    }

    /// Whether `other` merges into this entry instead of becoming a new one.
    #[must_use]
    pub fn stacks_with(&self, other: &Self) -> bool {
        self.is_stackable()
            && other.is_stackable()
            && self.name == other.name
            && self.item_type == other.item_type
            && self.rarity == other.rarity
            && self.effect == other.effect
            && self.permanent_effect == other.permanent_effect
    }

    #[must_use]
    pub fn is_stackable(&self) -> bool {
        !self.is_equippable && self.item_type != ItemType::Recipe
    }
}

/// Raw loot as delivered by a loot table, template or narrative generator.
///
/// Nothing here is trusted: type, slot and effects are re-derived by
/// [`materialize_loot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LootEntry {
    pub name: String,
    #[serde(alias = "type", alias = "itemType")]
    pub item_type: Option<String>,
    pub description: String,
    pub rarity: Option<String>,
    #[serde(deserialize_with = "lenient::opt_i64")]
    pub quantity: Option<i64>,
    #[serde(alias = "isEquippable", deserialize_with = "lenient::opt_bool")]
    pub is_equippable: Option<bool>,
    #[serde(alias = "equipmentSlot")]
    pub equipment_slot: Option<String>,
    pub effect: Option<StatBundle>,
    #[serde(alias = "permanentEffect")]
    pub permanent_effect: Option<StatBundle>,
    #[serde(alias = "reviveChances", deserialize_with = "lenient::opt_i64")]
    pub revive_chances: Option<i64>,
}

impl LootEntry {
    #[must_use]
    pub fn named(name: &str, item_type: ItemType, rarity: Rarity) -> Self {
        Self {
            name: name.to_string(),
            item_type: Some(item_type.as_str().to_string()),
            rarity: Some(rarity.name().to_string()),
            ..Self::default()
        }
    }
}

/// Generate an opaque item id from the supplied randomness.
pub fn next_item_id<R>(rng: &mut R) -> ItemId
where
    R: Rng + ?Sized,
{
    format!("itm-{:016x}", rng.next_u64())
}

/// Turn untrusted loot into an [`Item`]: classify, normalize, then sanitize.
pub fn materialize_loot<R>(entry: &LootEntry, catalog: &KnownItemCatalog, rng: &mut R) -> Item
where
    R: Rng + ?Sized,
{
    // Canonical entries win over whatever the payload declared.
    let known = catalog.lookup(&entry.name);
    let declared_type = known
        .map(|known| known.item_type)
        .or_else(|| entry.item_type.as_deref().and_then(ItemType::from_label))
        .unwrap_or(ItemType::Material);
    let rarity = known
        .map(|known| known.rarity)
        .or_else(|| entry.rarity.as_deref().and_then(Rarity::from_label))
        .unwrap_or_default();

    let classification = infer_item_type_and_slot(
        &entry.name,
        declared_type,
        &entry.description,
        entry.is_equippable.unwrap_or(false),
    );
    let declared_slot = entry
        .equipment_slot
        .as_deref()
        .and_then(EquipmentSlot::from_label);
    // A declared body slot only survives when keywords did not pin one down.
    let equipment_slot = match declared_slot {
        Some(declared)
            if !classification.inferred
                && classification.item_type == ItemType::Armor
                && is_body_slot(declared) =>
        {
            Some(declared)
        }
        _ => classification.equipment_slot,
    };

    let normalized = normalize_item_effect(
        &entry.name,
        classification.item_type,
        rarity,
        classification.is_equippable,
        entry.effect,
        entry.permanent_effect,
        catalog,
        rng,
    );

    let quantity = entry
        .quantity
        .and_then(|q| u32::try_from(q).ok())
        .unwrap_or(1)
        .max(1);
    let mut item = Item {
        id: next_item_id(rng),
        name: known.map_or(entry.name.trim(), |known| known.name.as_str()).to_string(),
        item_type: classification.item_type,
        description: entry.description.clone(),
        rarity,
        quantity,
        is_equippable: classification.is_equippable,
        equipment_slot,
        effect: normalized.effect,
        permanent_effect: normalized.permanent_effect,
        level: 0,
        revive_chances: entry.revive_chances.and_then(|n| u32::try_from(n).ok()),
    };
    item.sanitize();
    item
}

const fn is_body_slot(slot: EquipmentSlot) -> bool {
    matches!(
        slot,
        EquipmentSlot::Head
            | EquipmentSlot::Shoulder
            | EquipmentSlot::Chest
            | EquipmentSlot::Gloves
            | EquipmentSlot::Legs
            | EquipmentSlot::Boots
    )
}
