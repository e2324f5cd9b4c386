//! Centralized balance and tuning constants for the adventure core.
//!
//! These values define the numeric contracts of battles, rewards and
//! penalties. Keeping them together ensures that balance can only be
//! adjusted via reviewed code changes rather than through content assets.

// Logging keys -------------------------------------------------------------
pub(crate) const DEBUG_ENV_VAR: &str = "XIUXIAN_DEBUG_LOGS";

// Realm bounds -------------------------------------------------------------
pub(crate) const MAX_REALM_LEVEL: u8 = 9;
pub(crate) const REALM_REWARD_STEP: f64 = 0.6;

// Enemy construction -------------------------------------------------------
pub(crate) const ENEMY_ATTACK_FLOOR: i64 = 12;
pub(crate) const ENEMY_DEFENSE_FLOOR: i64 = 10;
pub(crate) const ENEMY_HP_FLOOR: i64 = 60;
pub(crate) const ENEMY_SPEED_FLOOR: i64 = 8;
pub(crate) const ENEMY_ATTACK_PER_LEVEL: f64 = 5.0;
pub(crate) const ENEMY_DEFENSE_PER_LEVEL: f64 = 4.0;
pub(crate) const ENEMY_STAT_VARIANCE: (f64, f64) = (0.85, 1.2);
pub(crate) const ENEMY_HP_VARIANCE: (f64, f64) = (0.75, 1.25);
pub(crate) const ENEMY_SPEED_VARIANCE: (f64, f64) = (0.8, 1.2);
pub(crate) const GENERATED_NAME_CHANCE: f64 = 0.15;

// Difficulty per encounter kind -------------------------------------------
pub(crate) const DIFFICULTY_NORMAL: f64 = 1.0;
pub(crate) const DIFFICULTY_FORTUNATE: f64 = 0.85;
pub(crate) const DIFFICULTY_SECRET_REALM: f64 = 1.25;
pub(crate) const DIFFICULTY_PURSUIT_BASE: f64 = 1.0;
pub(crate) const DIFFICULTY_PURSUIT_PER_LEVEL: f64 = 0.15;

// Turn loop ----------------------------------------------------------------
pub(crate) const MAX_BATTLE_ROUNDS: usize = 40;
pub(crate) const DAMAGE_ATTACK_WEIGHT: f64 = 0.9;
pub(crate) const DAMAGE_DEFENSE_WEIGHT: f64 = 0.45;
pub(crate) const MIN_DAMAGE_FLOOR: f64 = 5.0;
pub(crate) const MIN_DAMAGE_ATTACK_RATIO: f64 = 0.25;
pub(crate) const DAMAGE_VARIANCE: (f64, f64) = (0.9, 1.15);
pub(crate) const CRIT_BASE_CHANCE: f64 = 0.08;
pub(crate) const CRIT_SPEED_WEIGHT: f64 = 0.2;
pub(crate) const CRIT_MULTIPLIER: f64 = 1.5;
pub(crate) const DEFEAT_HP_FLOOR_RATIO: f64 = 0.08;

// Battle rewards -----------------------------------------------------------
pub(crate) const BATTLE_EXP_BASE: f64 = 25.0;
pub(crate) const BATTLE_EXP_PER_LEVEL: f64 = 12.0;
pub(crate) const BATTLE_EXP_LOSS_RATIO: f64 = 0.5;
pub(crate) const BATTLE_EXP_LOSS_FLOOR: i64 = 5;
pub(crate) const BATTLE_STONES_BASE: f64 = 6.0;
pub(crate) const BATTLE_STONES_PER_LEVEL: f64 = 2.0;
pub(crate) const BATTLE_STONES_FLOOR: i64 = 3;
pub(crate) const BATTLE_STONES_LOSS_RATIO: f64 = 0.6;
pub(crate) const BATTLE_STONES_LOSS_FLOOR: i64 = 2;
pub(crate) const BATTLE_LOOT_CHANCE: f64 = 0.35;

// Encounter direction ------------------------------------------------------
pub(crate) const HUNTED_BATTLE_CHANCE: f64 = 0.11;
pub(crate) const BATTLE_CHANCE_NORMAL: f64 = 0.22;
pub(crate) const BATTLE_CHANCE_FORTUNATE: f64 = 0.08;
pub(crate) const BATTLE_CHANCE_SECRET_REALM: f64 = 0.45;
pub(crate) const BATTLE_CHANCE_REALM_WEIGHT: f64 = 0.015;
pub(crate) const BATTLE_CHANCE_SPEED_WEIGHT: f64 = 0.0004;
pub(crate) const BATTLE_CHANCE_LUCK_WEIGHT: f64 = 0.0002;
pub(crate) const BATTLE_CHANCE_MIN: f64 = 0.05;
pub(crate) const BATTLE_CHANCE_MAX: f64 = 0.75;
pub(crate) const SHOP_INTERRUPT_CHANCE: f64 = 0.15;
pub(crate) const FORTUNE_BASE_CHANCE: f64 = 0.05;
pub(crate) const FORTUNE_REALM_WEIGHT: f64 = 0.02;
pub(crate) const FORTUNE_LEVEL_WEIGHT: f64 = 0.01;
pub(crate) const FORTUNE_LUCK_WEIGHT: f64 = 0.001;
pub(crate) const FORTUNE_MAX_CHANCE: f64 = 0.3;
pub(crate) const DEFAULT_OUTCOME_EXP: f64 = 10.0;
pub(crate) const TEMPLATE_REPEAT_WINDOW: usize = 3;

// Cooldowns and pacing (seconds / milliseconds) ----------------------------
pub(crate) const ADVENTURE_COOLDOWN_SECS: u32 = 5;
pub(crate) const HANDOFF_COOLDOWN_SECS: u32 = 2;
pub(crate) const SHOP_COOLDOWN_SECS: u32 = 3;
pub(crate) const DECLINE_COOLDOWN_SECS: u32 = 2;
pub(crate) const NARRATIVE_PACING_MS: u64 = 2_000;
pub(crate) const CHAINED_EVENT_DELAY_MS: u64 = 1_000;

// Applicator caps ----------------------------------------------------------
pub(crate) const INHERITANCE_CEILING: i64 = 4;
pub(crate) const COMPANION_MAX_EVOLUTION: u8 = 2;
pub(crate) const COMPANION_MAX_LEVEL_GAIN: u32 = 5;
pub(crate) const COMPANION_EXP_CURVE: f64 = 1.5;
pub(crate) const ART_UNLOCK_CHANCE: f64 = 0.03;
pub(crate) const ART_UNLOCK_CHANCE_ZONE: f64 = 0.05;
pub(crate) const TALENT_UNLOCK_CHANCE: f64 = 0.01;
pub(crate) const TALENT_UNLOCK_CHANCE_ZONE: f64 = 0.02;
pub(crate) const TALENT_UNLOCK_CHANCE_FORTUNATE: f64 = 0.05;
pub(crate) const PRIMARY_TOTAL_REDUCTION_CAP: f64 = 0.15;
pub(crate) const PRIMARY_ATTRIBUTE_REDUCTION_CAP: f64 = 0.10;
pub(crate) const CHAINED_TOTAL_REDUCTION_CAP: f64 = 0.10;
pub(crate) const CHAINED_ATTRIBUTE_REDUCTION_CAP: f64 = 0.05;
pub(crate) const MAX_HP_REDUCTION_FLOOR: f64 = 0.5;
pub(crate) const CHAINED_COMPENSATION_EXP: f64 = 30.0;
pub(crate) const CHAINED_COMPENSATION_STONES: f64 = 10.0;
pub(crate) const CHAINED_REWARD_THRESHOLD_EXP: f64 = 10.0;
pub(crate) const CHAINED_REWARD_THRESHOLD_STONES: f64 = 5.0;

// Item synthesis -----------------------------------------------------------
pub(crate) const ARTIFACT_JITTER: (f64, f64) = (0.8, 1.2);
pub(crate) const ARTIFACT_MAX_SYNTH_ATTRIBUTES: usize = 3;

// Merchant -----------------------------------------------------------------
pub(crate) const MERCHANT_MIN_OFFERS: usize = 3;
pub(crate) const MERCHANT_MAX_OFFERS: usize = 5;
pub(crate) const MERCHANT_REALM_PRICE_STEP: f64 = 0.5;

#[cfg(test)]
pub(crate) const FLOAT_EPSILON: f64 = 1e-9;
