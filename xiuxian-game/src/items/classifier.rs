//! Keyword classification of item names into types and equipment slots.
//!
//! Upstream content (loot tables, templates, generated loot) frequently
//! declares the wrong type. The rule table below is consulted in order and
//! its inference overrides the declaration whenever a rule matches.
use super::{EquipmentSlot, ItemType};

/// Result of classifying one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub item_type: ItemType,
    pub is_equippable: bool,
    pub equipment_slot: Option<EquipmentSlot>,
    /// True when a keyword rule decided the result (false means declared type kept).
    pub inferred: bool,
}

impl Classification {
    const fn inferred(item_type: ItemType, slot: EquipmentSlot) -> Self {
        Self {
            item_type,
            is_equippable: true,
            equipment_slot: Some(slot),
            inferred: true,
        }
    }

    const fn declared(item_type: ItemType) -> Self {
        let equipment = item_type.is_equipment();
        Self {
            item_type,
            is_equippable: equipment,
            equipment_slot: item_type.default_slot(),
            inferred: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Weapon,
    BodySlot,
    Ring,
    Accessory,
    Artifact,
}

struct Rule {
    family: Family,
    keywords: &'static [&'static str],
}

const CONSUMABLE_KEYWORDS: &[&str] = &[
    "pill", "pills", "elixir", "pellet", "herb", "grass", "ore", "essence", "recipe", "丹", "草",
    "药", "矿", "丹方",
];

const WEAPON_KEYWORDS: &[&str] = &[
    "sword", "blade", "saber", "sabre", "spear", "lance", "halberd", "glaive", "whip", "bow",
    "crossbow", "staff", "axe", "hammer", "dagger", "剑", "刀", "枪", "戟", "鞭", "弓", "棍", "锤",
    "斧", "矛",
];

const HEAD_KEYWORDS: &[&str] = &[
    "helmet", "helm", "crown", "hat", "hood", "circlet", "盔", "冠", "帽",
];
const SHOULDER_KEYWORDS: &[&str] = &["pauldron", "shoulder", "shoulderguard", "mantle", "肩"];
const CHEST_KEYWORDS: &[&str] = &[
    "robe", "armor", "armour", "chestplate", "breastplate", "cuirass", "vest", "袍", "甲", "衣",
];
const GLOVE_KEYWORDS: &[&str] = &["glove", "gauntlet", "bracer", "手套", "护腕", "拳套"];
const LEG_KEYWORDS: &[&str] = &["legging", "greave", "pants", "trousers", "kilt", "裤", "护腿"];
const BOOT_KEYWORDS: &[&str] = &["boot", "shoe", "sandal", "靴", "鞋"];

const BODY_SLOTS: &[(EquipmentSlot, &[&str])] = &[
    (EquipmentSlot::Head, HEAD_KEYWORDS),
    (EquipmentSlot::Shoulder, SHOULDER_KEYWORDS),
    (EquipmentSlot::Chest, CHEST_KEYWORDS),
    (EquipmentSlot::Gloves, GLOVE_KEYWORDS),
    (EquipmentSlot::Legs, LEG_KEYWORDS),
    (EquipmentSlot::Boots, BOOT_KEYWORDS),
];

const RING_KEYWORDS: &[&str] = &["ring", "band", "戒", "指环"];
const ACCESSORY_KEYWORDS: &[&str] = &[
    "amulet", "necklace", "pendant", "earring", "bracelet", "talisman", "charm", "brooch", "佩",
    "坠", "项链", "手镯",
];
const ARTIFACT_KEYWORDS: &[&str] = &[
    "gourd", "cauldron", "vessel", "mirror", "tower", "pagoda", "fan", "bead", "seal", "tray",
    "plate", "brush", "pen", "bag", "pouch", "banner", "flag", "furnace", "map", "treasure",
    "bell", "葫芦", "鼎", "瓶", "镜", "塔", "扇", "珠", "印", "盘", "笔", "袋", "幡", "旗", "炉",
    "图", "宝", "钟",
];

/// Ordered by priority: the first matching family wins.
const RULES: &[Rule] = &[
    Rule {
        family: Family::Weapon,
        keywords: WEAPON_KEYWORDS,
    },
    Rule {
        family: Family::BodySlot,
        keywords: &[],
    },
    Rule {
        family: Family::Ring,
        keywords: RING_KEYWORDS,
    },
    Rule {
        family: Family::Accessory,
        keywords: ACCESSORY_KEYWORDS,
    },
    Rule {
        family: Family::Artifact,
        keywords: ARTIFACT_KEYWORDS,
    },
];

/// Infer an item's type and slot from its name, falling back to the description.
///
/// Pure and deterministic: the same inputs always produce the same result.
#[must_use]
pub fn infer_item_type_and_slot(
    name: &str,
    declared_type: ItemType,
    description: &str,
    declared_equippable: bool,
) -> Classification {
    let declared_equipment = declared_type.is_equipment() || declared_equippable;
    for text in [name, description] {
        let probe = Probe::new(text);
        if !declared_equipment && probe.hits_any(CONSUMABLE_KEYWORDS) {
            return Classification::declared(declared_type);
        }
        if let Some(classification) = classify_text(&probe) {
            return classification;
        }
    }
    Classification::declared(declared_type)
}

fn classify_text(probe: &Probe) -> Option<Classification> {
    for rule in RULES {
        let matched = match rule.family {
            Family::Weapon => probe
                .hits_any(rule.keywords)
                .then_some(Classification::inferred(ItemType::Weapon, EquipmentSlot::Weapon)),
            Family::BodySlot => body_slot(probe)
                .map(|slot| Classification::inferred(ItemType::Armor, slot)),
            Family::Ring => probe
                .hits_any(rule.keywords)
                .then_some(Classification::inferred(ItemType::Ring, EquipmentSlot::Ring)),
            Family::Accessory => probe.hits_any(rule.keywords).then_some(
                Classification::inferred(ItemType::Accessory, EquipmentSlot::Accessory),
            ),
            Family::Artifact => probe.hits_any(rule.keywords).then_some(
                Classification::inferred(ItemType::Artifact, EquipmentSlot::Artifact),
            ),
        };
        if matched.is_some() {
            return matched;
        }
    }
    None
}

/// A body slot is only inferred when exactly one slot vocabulary matches.
fn body_slot(probe: &Probe) -> Option<EquipmentSlot> {
    let mut hits = BODY_SLOTS
        .iter()
        .filter(|(_, keywords)| probe.hits_any(keywords))
        .map(|(slot, _)| *slot);
    let first = hits.next()?;
    if hits.next().is_some() {
        return None;
    }
    Some(first)
}

/// Lowercased text plus its ASCII words for whole-word keyword matching.
struct Probe {
    lowered: String,
    words: Vec<String>,
}

impl Probe {
    fn new(text: &str) -> Self {
        let lowered = text.to_lowercase();
        let words = lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .map(str::to_string)
            .collect();
        Self { lowered, words }
    }

    /// ASCII keywords match whole words (with an optional plural `s`);
    /// CJK keywords match as substrings.
    fn hits(&self, keyword: &str) -> bool {
        if keyword.is_ascii() {
            self.words
                .iter()
                .any(|word| word == keyword || word.strip_suffix('s') == Some(keyword))
        } else {
            self.lowered.contains(keyword)
        }
    }

    fn hits_any(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|keyword| self.hits(keyword))
    }
}
