//! The player aggregate, its invariants and the single-writer store around it.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::companion::{Companion, CompanionId};
use crate::constants::INHERITANCE_CEILING;
use crate::items::{EquipmentSlot, Item, ItemId};
use crate::realm::Realm;
use crate::unlocks::{ArtId, TalentId};

const STARTING_MAX_EXP: i64 = 100;

/// Presentation colour of a log line or narrative event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogColor {
    #[default]
    Normal,
    Gain,
    Loss,
    Danger,
    Rare,
    Legendary,
}

impl LogColor {
    /// Tolerant parsing of generator colour labels; unknown labels are `Normal`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "gain" | "success" | "green" | "good" => Self::Gain,
            "loss" | "warning" | "bad" | "orange" => Self::Loss,
            "danger" | "red" | "error" => Self::Danger,
            "rare" | "blue" | "purple" | "info" => Self::Rare,
            "legendary" | "gold" | "epic" => Self::Legendary,
            _ => Self::Normal,
        }
    }
}

/// One player-facing adventure log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    pub color: LogColor,
}

impl LogEntry {
    pub fn new(message: impl Into<String>, color: LogColor) -> Self {
        Self {
            message: message.into(),
            color,
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// The six attributes subject to capped reductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Attack,
    Defense,
    SpiritPower,
    Physique,
    Speed,
    MaxHp,
}

impl Attribute {
    pub const ALL: [Self; 6] = [
        Self::Attack,
        Self::Defense,
        Self::SpiritPower,
        Self::Physique,
        Self::Speed,
        Self::MaxHp,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Attack => "attack",
            Self::Defense => "defense",
            Self::SpiritPower => "spirit power",
            Self::Physique => "physique",
            Self::Speed => "speed",
            Self::MaxHp => "max hp",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Statistics {
    pub kill_count: u64,
    pub battles_won: u64,
    pub battles_lost: u64,
    pub adventure_count: u64,
    pub meditate_count: u64,
    pub secret_realms_entered: u64,
    pub items_obtained: u64,
}

/// A sect's hunt for the player, active until `expires_at_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PursuitStatus {
    pub level: u32,
    pub expires_at_ms: i64,
    #[serde(default)]
    pub pursuer: String,
}

impl PursuitStatus {
    #[must_use]
    pub const fn is_active(&self, now_ms: i64) -> bool {
        self.expires_at_ms > now_ms
    }
}

/// The mutable aggregate root. Plain data so it can be persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: String,
    pub name: String,
    pub realm: Realm,
    pub realm_level: u8,
    pub exp: i64,
    pub max_exp: i64,
    /// Not floored at zero: a non-positive value signals death to an outside observer.
    pub hp: i64,
    pub max_hp: i64,
    pub attack: i64,
    pub defense: i64,
    pub spirit_power: i64,
    pub physique: i64,
    pub speed: i64,
    pub luck: i64,
    pub spirit_stones: i64,
    #[serde(default)]
    pub inventory: Vec<Item>,
    #[serde(default)]
    pub equipment: BTreeMap<EquipmentSlot, ItemId>,
    #[serde(default)]
    pub learned_arts: Vec<ArtId>,
    #[serde(default)]
    pub talent: Option<TalentId>,
    #[serde(default)]
    pub companions: Vec<Companion>,
    #[serde(default)]
    pub active_companion: Option<CompanionId>,
    #[serde(default)]
    pub lottery_tickets: i64,
    #[serde(default)]
    pub inheritance_level: i64,
    #[serde(default)]
    pub pursuit: Option<PursuitStatus>,
    #[serde(default)]
    pub statistics: Statistics,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            id: String::from("player"),
            name: String::from("Wanderer"),
            realm: Realm::QiRefining,
            realm_level: 1,
            exp: 0,
            max_exp: STARTING_MAX_EXP,
            hp: 100,
            max_hp: 100,
            attack: 10,
            defense: 5,
            spirit_power: 10,
            physique: 10,
            speed: 10,
            luck: 10,
            spirit_stones: 0,
            inventory: Vec::new(),
            equipment: BTreeMap::new(),
            learned_arts: Vec::new(),
            talent: None,
            companions: Vec::new(),
            active_companion: None,
            lottery_tickets: 0,
            inheritance_level: 0,
            pursuit: None,
            statistics: Statistics::default(),
        }
    }
}

impl PlayerState {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Re-establish every aggregate invariant. `hp` is only clamped from above.
    pub fn enforce_invariants(&mut self) {
        self.max_hp = self.max_hp.max(1);
        self.hp = self.hp.min(self.max_hp);
        self.exp = self.exp.max(0);
        self.max_exp = self.max_exp.max(1);
        self.spirit_stones = self.spirit_stones.max(0);
        self.attack = self.attack.max(0);
        self.defense = self.defense.max(0);
        self.spirit_power = self.spirit_power.max(0);
        self.physique = self.physique.max(0);
        self.speed = self.speed.max(0);
        self.lottery_tickets = self.lottery_tickets.max(0);
        self.inheritance_level = self.inheritance_level.clamp(0, INHERITANCE_CEILING);
        self.realm_level = self.realm_level.clamp(1, Realm::max_level());
        if let Some(active) = &self.active_companion
            && !self.companions.iter().any(|companion| &companion.id == active)
        {
            self.active_companion = None;
        }
    }

    /// Whether the external death detector should react.
    #[must_use]
    pub const fn is_fallen(&self) -> bool {
        self.hp <= 0
    }

    #[must_use]
    pub const fn attribute(&self, attribute: Attribute) -> i64 {
        match attribute {
            Attribute::Attack => self.attack,
            Attribute::Defense => self.defense,
            Attribute::SpiritPower => self.spirit_power,
            Attribute::Physique => self.physique,
            Attribute::Speed => self.speed,
            Attribute::MaxHp => self.max_hp,
        }
    }

    pub const fn attribute_mut(&mut self, attribute: Attribute) -> &mut i64 {
        match attribute {
            Attribute::Attack => &mut self.attack,
            Attribute::Defense => &mut self.defense,
            Attribute::SpiritPower => &mut self.spirit_power,
            Attribute::Physique => &mut self.physique,
            Attribute::Speed => &mut self.speed,
            Attribute::MaxHp => &mut self.max_hp,
        }
    }

    /// Sum of the six reducible attributes, used as the basis of the total cap.
    #[must_use]
    pub fn attribute_total(&self) -> i64 {
        Attribute::ALL
            .iter()
            .map(|attribute| self.attribute(*attribute).max(0))
            .sum()
    }

    /// Combat power used for boss comparisons.
    #[must_use]
    pub const fn power_rating(&self) -> i64 {
        self.attack
            .saturating_add(self.defense)
            .saturating_add(self.max_hp)
            .saturating_add(self.speed)
    }

    #[must_use]
    pub fn pursuit_level(&self, now_ms: i64) -> Option<u32> {
        self.pursuit
            .as_ref()
            .filter(|pursuit| pursuit.is_active(now_ms))
            .map(|pursuit| pursuit.level)
    }

    /// Add an item, stacking onto an identical entry when allowed.
    ///
    /// Returns `true` when the item merged into an existing entry.
    pub fn add_item(&mut self, item: Item) -> bool {
        self.statistics.items_obtained += u64::from(item.quantity);
        if let Some(existing) = self
            .inventory
            .iter_mut()
            .find(|existing| existing.stacks_with(&item))
        {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
            return true;
        }
        self.inventory.push(item);
        false
    }

    #[must_use]
    pub fn companion(&self, id: &str) -> Option<&Companion> {
        self.companions.iter().find(|companion| companion.id == id)
    }
}

/// Single-writer handle to the aggregate.
///
/// Every mutation is a read-compute-replace step performed under the lock on
/// a draft copy; the live state is only replaced once the step completes.
#[derive(Debug, Clone, Default)]
pub struct PlayerStore {
    inner: Arc<Mutex<PlayerState>>,
}

impl PlayerStore {
    #[must_use]
    pub fn new(state: PlayerState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> PlayerState {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run `update` against a draft of the state and commit it.
    ///
    /// Invariants are enforced on the draft before it replaces the live state.
    pub fn transact<T, F>(&self, update: F) -> T
    where
        F: FnOnce(&mut PlayerState) -> T,
    {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut draft = guard.clone();
        let result = update(&mut draft);
        draft.enforce_invariants();
        *guard = draft;
        result
    }

    /// Replace the whole aggregate (load, rebirth).
    pub fn replace(&self, state: PlayerState) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = state;
        guard.enforce_invariants();
    }
}
