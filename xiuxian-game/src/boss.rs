//! Tier-gate bosses and the power comparison shown before committing to one.
use serde::{Deserialize, Serialize};

use crate::items::LootEntry;
use crate::numbers::{i64_to_f64, round_f64_to_i64};
use crate::state::PlayerState;

const DEFAULT_BOSS_DATA: &str = include_str!("../assets/data/bosses.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub title: String,
    /// Realm tiers above the challenger.
    #[serde(default)]
    pub realm_offset: i64,
    pub strength_multiplier: f64,
    pub attack: i64,
    pub defense: i64,
    pub max_hp: i64,
    pub speed: i64,
    /// Guaranteed drop on victory.
    #[serde(default)]
    pub loot: Option<LootEntry>,
}

impl BossProfile {
    #[must_use]
    pub const fn base_power(&self) -> i64 {
        self.attack
            .saturating_add(self.defense)
            .saturating_add(self.max_hp)
            .saturating_add(self.speed)
    }

    /// Boss power after its strength multiplier.
    #[must_use]
    pub fn effective_power(&self) -> i64 {
        round_f64_to_i64(i64_to_f64(self.base_power()) * self.strength_multiplier)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossConfig {
    pub bosses: Vec<BossProfile>,
}

impl Default for BossConfig {
    fn default() -> Self {
        serde_json::from_str(DEFAULT_BOSS_DATA).unwrap_or_else(|_| Self {
            bosses: vec![BossProfile {
                id: String::from("thunder_tribulation_beast"),
                name: String::from("Thunder Tribulation Beast"),
                title: String::from("Herald of the Heavenly Tribulation"),
                realm_offset: 1,
                strength_multiplier: 1.4,
                attack: 30,
                defense: 20,
                max_hp: 300,
                speed: 15,
                loot: None,
            }],
        })
    }
}

impl BossConfig {
    #[must_use]
    pub fn load_from_static() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BossProfile> {
        self.bosses.iter().find(|boss| boss.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BossVerdict {
    Favoured,
    Even,
    Outmatched,
}

/// Summary presented at the confirmation gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossAssessment {
    pub boss_id: String,
    pub boss_name: String,
    pub player_power: i64,
    pub boss_power: i64,
    pub ratio: f64,
    pub verdict: BossVerdict,
    pub summary: String,
}

const FAVOURED_RATIO: f64 = 1.15;
const EVEN_RATIO: f64 = 0.85;

#[must_use]
pub fn assess_boss(player: &PlayerState, boss: &BossProfile) -> BossAssessment {
    let player_power = player.power_rating().max(0);
    let boss_power = boss.effective_power().max(1);
    let ratio = i64_to_f64(player_power) / i64_to_f64(boss_power);
    let verdict = if ratio >= FAVOURED_RATIO {
        BossVerdict::Favoured
    } else if ratio >= EVEN_RATIO {
        BossVerdict::Even
    } else {
        BossVerdict::Outmatched
    };
    let advice = match verdict {
        BossVerdict::Favoured => "Your strength clearly surpasses it.",
        BossVerdict::Even => "The outcome hangs by a thread.",
        BossVerdict::Outmatched => "Its aura crushes yours. Retreat may be wise.",
    };
    BossAssessment {
        boss_id: boss.id.clone(),
        boss_name: boss.name.clone(),
        player_power,
        boss_power,
        ratio,
        verdict,
        summary: format!(
            "{} ({}) | your power {player_power} vs {boss_power}. {advice}",
            boss.name, boss.title
        ),
    }
}
