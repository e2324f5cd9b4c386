//! Turn-based battle resolution.
//!
//! A battle is fully simulated up front and returned as an immutable
//! [`BattleReplay`]; presentation layers reveal it round by round through a
//! [`ReplayCursor`].
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::boss::BossProfile;
use crate::collaborators::EnemyNameGenerator;
#[cfg(debug_assertions)]
use crate::constants::DEBUG_ENV_VAR;
use crate::constants::{
    BATTLE_EXP_BASE, BATTLE_EXP_LOSS_FLOOR, BATTLE_EXP_LOSS_RATIO, BATTLE_EXP_PER_LEVEL,
    BATTLE_STONES_BASE, BATTLE_STONES_FLOOR, BATTLE_STONES_LOSS_FLOOR, BATTLE_STONES_LOSS_RATIO,
    BATTLE_STONES_PER_LEVEL, CRIT_BASE_CHANCE, CRIT_MULTIPLIER, CRIT_SPEED_WEIGHT,
    DAMAGE_ATTACK_WEIGHT, DAMAGE_DEFENSE_WEIGHT, DAMAGE_VARIANCE, DEFEAT_HP_FLOOR_RATIO,
    DIFFICULTY_FORTUNATE, DIFFICULTY_NORMAL, DIFFICULTY_PURSUIT_BASE,
    DIFFICULTY_PURSUIT_PER_LEVEL, DIFFICULTY_SECRET_REALM, ENEMY_ATTACK_FLOOR,
    ENEMY_ATTACK_PER_LEVEL, ENEMY_DEFENSE_FLOOR, ENEMY_DEFENSE_PER_LEVEL, ENEMY_HP_FLOOR,
    ENEMY_HP_VARIANCE, ENEMY_SPEED_FLOOR, ENEMY_SPEED_VARIANCE, ENEMY_STAT_VARIANCE,
    GENERATED_NAME_CHANCE, MAX_BATTLE_ROUNDS, MIN_DAMAGE_ATTACK_RATIO, MIN_DAMAGE_FLOOR,
};
use crate::data::EnemyNamePools;
use crate::encounters::{EncounterKind, RiskLevel};
use crate::numbers::{i64_to_f64, roll_between, round_f64_to_i64};
use crate::realm::Realm;
use crate::state::PlayerState;

#[cfg(debug_assertions)]
fn debug_log_enabled() -> bool {
    matches!(std::env::var(DEBUG_ENV_VAR), Ok(val) if val != "0")
}

#[cfg(not(debug_assertions))]
const fn debug_log_enabled() -> bool {
    false
}

/// Tunable knobs of the battle simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    pub stat_variance: (f64, f64),
    pub hp_variance: (f64, f64),
    pub speed_variance: (f64, f64),
    pub damage_variance: (f64, f64),
    pub crits_enabled: bool,
    pub crit_base_chance: f64,
    pub crit_speed_weight: f64,
    pub crit_multiplier: f64,
    pub max_rounds: usize,
    pub generated_name_chance: f64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            stat_variance: ENEMY_STAT_VARIANCE,
            hp_variance: ENEMY_HP_VARIANCE,
            speed_variance: ENEMY_SPEED_VARIANCE,
            damage_variance: DAMAGE_VARIANCE,
            crits_enabled: true,
            crit_base_chance: CRIT_BASE_CHANCE,
            crit_speed_weight: CRIT_SPEED_WEIGHT,
            crit_multiplier: CRIT_MULTIPLIER,
            max_rounds: MAX_BATTLE_ROUNDS,
            generated_name_chance: GENERATED_NAME_CHANCE,
        }
    }
}

impl CombatConfig {
    /// Every variance pinned to 1.0, no crits, no generated names.
    #[must_use]
    pub fn deterministic() -> Self {
        Self {
            stat_variance: (1.0, 1.0),
            hp_variance: (1.0, 1.0),
            speed_variance: (1.0, 1.0),
            damage_variance: (1.0, 1.0),
            crits_enabled: false,
            generated_name_chance: 0.0,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyCombatant {
    pub name: String,
    pub title: String,
    pub realm: Realm,
    pub max_hp: i64,
    pub hp: i64,
    pub attack: i64,
    pub defense: i64,
    pub speed: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Player,
    Enemy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRound {
    pub round: usize,
    pub attacker: Side,
    pub damage: i64,
    pub crit: bool,
    pub description: String,
    pub player_hp: i64,
    pub enemy_hp: i64,
}

/// A fully resolved battle. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleReplay {
    pub enemy: EnemyCombatant,
    pub rounds: Vec<BattleRound>,
    pub victory: bool,
    /// The round cap ended the fight; counted as a defeat.
    pub timed_out: bool,
    pub hp_lost: i64,
    pub player_hp_before: i64,
    pub player_hp_after: i64,
    pub exp_change: i64,
    pub spirit_stones_change: i64,
    pub summary: String,
    pub encounter: EncounterKind,
    pub risk: Option<RiskLevel>,
    pub difficulty: f64,
    pub boss_id: Option<String>,
}

/// Progressive reveal of replay rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayCursor {
    total: usize,
    revealed: usize,
}

impl ReplayCursor {
    #[must_use]
    pub const fn new(replay: &BattleReplay) -> Self {
        Self {
            total: replay.rounds.len(),
            revealed: 0,
        }
    }

    /// Reveal the next round. Returns `false` once everything is visible.
    pub const fn advance(&mut self) -> bool {
        if self.revealed >= self.total {
            return false;
        }
        self.revealed += 1;
        true
    }

    pub const fn reveal_all(&mut self) {
        self.revealed = self.total;
    }

    #[must_use]
    pub const fn revealed(&self) -> usize {
        self.revealed
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.revealed >= self.total
    }

    #[must_use]
    pub fn visible<'a>(&self, replay: &'a BattleReplay) -> &'a [BattleRound] {
        let end = self.revealed.min(replay.rounds.len());
        &replay.rounds[..end]
    }
}

/// Everything that shapes the enemy besides the player.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BattleSetup {
    pub kind: EncounterKind,
    pub risk: Option<RiskLevel>,
    /// Overrides the kind's realm offset.
    pub realm_hint: Option<Realm>,
    pub pursuit_level: u32,
    pub boss: Option<BossProfile>,
}

impl BattleSetup {
    #[must_use]
    pub fn new(kind: EncounterKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }
}

/// Enemy strength multiplier for an encounter.
#[must_use]
pub fn difficulty_for(setup: &BattleSetup) -> f64 {
    match setup.kind {
        EncounterKind::Normal => DIFFICULTY_NORMAL,
        EncounterKind::Fortunate => DIFFICULTY_FORTUNATE,
        EncounterKind::SecretRealm => {
            DIFFICULTY_SECRET_REALM
                * setup
                    .risk
                    .map_or(RiskLevel::Medium.difficulty_factor(), RiskLevel::difficulty_factor)
        }
        EncounterKind::Pursuit => {
            DIFFICULTY_PURSUIT_BASE
                + DIFFICULTY_PURSUIT_PER_LEVEL * f64::from(setup.pursuit_level)
        }
        EncounterKind::BossGate => setup
            .boss
            .as_ref()
            .map_or(DIFFICULTY_NORMAL, |boss| boss.strength_multiplier),
    }
}

/// Scale the player's own numbers into an opponent.
pub fn build_enemy<R>(
    player: &PlayerState,
    setup: &BattleSetup,
    config: &CombatConfig,
    (name, title): (String, String),
    rng: &mut R,
) -> EnemyCombatant
where
    R: Rng + ?Sized,
{
    let difficulty = difficulty_for(setup);
    let realm = setup
        .realm_hint
        .unwrap_or_else(|| player.realm.offset(setup.kind.realm_offset()));
    let level = i64_to_f64(i64::from(player.realm_level));

    let mut attack = round_f64_to_i64(
        (i64_to_f64(player.attack) + level * ENEMY_ATTACK_PER_LEVEL)
            * roll_between(rng, config.stat_variance)
            * difficulty,
    )
    .max(ENEMY_ATTACK_FLOOR);
    let mut defense = round_f64_to_i64(
        (i64_to_f64(player.defense) + level * ENEMY_DEFENSE_PER_LEVEL)
            * roll_between(rng, config.stat_variance)
            * difficulty,
    )
    .max(ENEMY_DEFENSE_FLOOR);
    let mut max_hp = round_f64_to_i64(
        i64_to_f64(player.max_hp) * roll_between(rng, config.hp_variance) * difficulty,
    )
    .max(ENEMY_HP_FLOOR);
    let mut speed =
        round_f64_to_i64(i64_to_f64(player.speed) * roll_between(rng, config.speed_variance))
            .max(ENEMY_SPEED_FLOOR);

    let (name, title) = match &setup.boss {
        Some(boss) => {
            let floor = |stat: i64| round_f64_to_i64(i64_to_f64(stat) * boss.strength_multiplier);
            attack = attack.max(floor(boss.attack));
            defense = defense.max(floor(boss.defense));
            max_hp = max_hp.max(floor(boss.max_hp));
            speed = speed.max(floor(boss.speed));
            (boss.name.clone(), boss.title.clone())
        }
        None => (name, title),
    };

    EnemyCombatant {
        name,
        title,
        realm,
        max_hp,
        hp: max_hp,
        attack,
        defense,
        speed,
    }
}

fn roll_damage<R>(
    attacker_attack: i64,
    defender_defense: i64,
    crit_chance: f64,
    config: &CombatConfig,
    rng: &mut R,
) -> (i64, bool)
where
    R: Rng + ?Sized,
{
    let attack = i64_to_f64(attacker_attack.max(0));
    let min_damage = MIN_DAMAGE_FLOOR.max(attack * MIN_DAMAGE_ATTACK_RATIO);
    let raw = attack * DAMAGE_ATTACK_WEIGHT
        - i64_to_f64(defender_defense.max(0)) * DAMAGE_DEFENSE_WEIGHT;
    let damage = round_f64_to_i64(raw.max(min_damage) * roll_between(rng, config.damage_variance));
    let crit = config.crits_enabled && rng.r#gen::<f64>() < crit_chance;
    if crit {
        (round_f64_to_i64(i64_to_f64(damage) * config.crit_multiplier), true)
    } else {
        (damage, false)
    }
}

/// Run the turn loop between a player snapshot and an already built enemy.
pub fn simulate<R>(
    player: &PlayerState,
    enemy: EnemyCombatant,
    setup: &BattleSetup,
    config: &CombatConfig,
    rng: &mut R,
) -> BattleReplay
where
    R: Rng + ?Sized,
{
    let difficulty = difficulty_for(setup);
    let player_hp_before = player.hp;
    let mut player_hp = player.hp;
    let mut enemy_hp = enemy.hp;
    let speed_pool = i64_to_f64(player.speed.max(0) + enemy.speed.max(0) + 1);
    let crit_chance = |speed: i64| {
        config.crit_base_chance + i64_to_f64(speed.max(0)) / speed_pool * config.crit_speed_weight
    };

    let mut attacker = if player.speed >= enemy.speed {
        Side::Player
    } else {
        Side::Enemy
    };
    let mut rounds = Vec::new();
    while rounds.len() < config.max_rounds && player_hp > 0 && enemy_hp > 0 {
        let (damage, crit, description) = match attacker {
            Side::Player => {
                let (damage, crit) = roll_damage(
                    player.attack,
                    enemy.defense,
                    crit_chance(player.speed),
                    config,
                    rng,
                );
                enemy_hp = (enemy_hp - damage).max(0);
                let verb = if crit { "land a critical strike on" } else { "strike" };
                (damage, crit, format!("You {verb} {} for {damage} damage.", enemy.name))
            }
            Side::Enemy => {
                let (damage, crit) = roll_damage(
                    enemy.attack,
                    player.defense,
                    crit_chance(enemy.speed),
                    config,
                    rng,
                );
                player_hp = (player_hp - damage).max(0);
                let verb = if crit { "critically hits" } else { "hits" };
                (damage, crit, format!("{} {verb} you for {damage} damage.", enemy.name))
            }
        };
        rounds.push(BattleRound {
            round: rounds.len() + 1,
            attacker,
            damage,
            crit,
            description,
            player_hp,
            enemy_hp,
        });
        attacker = match attacker {
            Side::Player => Side::Enemy,
            Side::Enemy => Side::Player,
        };
    }

    let victory = enemy_hp <= 0 && player_hp > 0;
    let timed_out = !victory && enemy_hp > 0 && player_hp > 0;
    let player_hp_after = if victory {
        player_hp
    } else {
        round_f64_to_i64(i64_to_f64(player.max_hp) * DEFEAT_HP_FLOOR_RATIO).max(1)
    };
    let hp_lost = (player_hp_before - player_hp_after).max(0);

    let level = i64_to_f64(i64::from(player.realm_level));
    let exp_reward =
        round_f64_to_i64((BATTLE_EXP_BASE + level * BATTLE_EXP_PER_LEVEL) * difficulty);
    let stones_reward = round_f64_to_i64(
        (BATTLE_STONES_BASE + level * BATTLE_STONES_PER_LEVEL) * difficulty,
    )
    .max(BATTLE_STONES_FLOOR);
    let (exp_change, spirit_stones_change) = if victory {
        (exp_reward, stones_reward)
    } else {
        (
            -round_f64_to_i64(i64_to_f64(exp_reward) * BATTLE_EXP_LOSS_RATIO)
                .max(BATTLE_EXP_LOSS_FLOOR),
            -round_f64_to_i64(i64_to_f64(stones_reward) * BATTLE_STONES_LOSS_RATIO)
                .max(BATTLE_STONES_LOSS_FLOOR),
        )
    };

    let summary = if victory {
        format!(
            "You defeated {} after {} rounds, gaining {exp_change} exp \
             and {spirit_stones_change} spirit stones.",
            enemy.name,
            rounds.len()
        )
    } else if timed_out {
        format!(
            "Neither side could prevail against {} after {} rounds. You withdrew, battered.",
            enemy.name,
            rounds.len()
        )
    } else {
        format!("{} overwhelmed you. You barely escaped with your life.", enemy.name)
    };

    if debug_log_enabled() {
        log::debug!(
            "Battle resolved | kind:{} difficulty:{difficulty:.2} rounds:{} \
             victory:{victory} timed_out:{timed_out}",
            setup.kind,
            rounds.len()
        );
    }

    BattleReplay {
        enemy,
        rounds,
        victory,
        timed_out,
        hp_lost,
        player_hp_before,
        player_hp_after,
        exp_change,
        spirit_stones_change,
        summary,
        encounter: setup.kind,
        risk: setup.risk,
        difficulty,
        boss_id: setup.boss.as_ref().map(|boss| boss.id.clone()),
    }
}

/// Pick the enemy's name: usually the static pools, occasionally the generator.
async fn enemy_name<R>(
    realm: Realm,
    kind: EncounterKind,
    config: &CombatConfig,
    pools: &EnemyNamePools,
    generator: Option<&dyn EnemyNameGenerator>,
    rng: &mut R,
) -> (String, String)
where
    R: Rng + Send + ?Sized,
{
    let use_generator = rng.r#gen::<f64>() < config.generated_name_chance;
    let pooled = pools.draw(rng);
    let Some(generator) = generator.filter(|_| use_generator) else {
        return pooled;
    };
    match generator.generate(realm, kind).await {
        Ok(generated) if !generated.name.trim().is_empty() => {
            (generated.name.trim().to_string(), generated.title)
        }
        Ok(_) => pooled,
        Err(err) => {
            log::warn!("Enemy name generator fallback: {err}");
            pooled
        }
    }
}

/// Build an enemy for the encounter and fight it out.
pub async fn resolve_battle_encounter<R>(
    player: &PlayerState,
    setup: &BattleSetup,
    config: &CombatConfig,
    pools: &EnemyNamePools,
    name_generator: Option<&dyn EnemyNameGenerator>,
    rng: &mut R,
) -> BattleReplay
where
    R: Rng + Send + ?Sized,
{
    let realm = setup
        .realm_hint
        .unwrap_or_else(|| player.realm.offset(setup.kind.realm_offset()));
    let names = if setup.boss.is_some() {
        (String::new(), String::new())
    } else {
        enemy_name(realm, setup.kind, config, pools, name_generator, rng).await
    };
    let enemy = build_enemy(player, setup, config, names, rng);
    simulate(player, enemy, setup, config, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::EnemyName;
    use crate::error::CollaboratorError;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn scenario_player() -> PlayerState {
        PlayerState {
            attack: 100,
            defense: 50,
            hp: 500,
            max_hp: 500,
            realm: Realm::QiRefining,
            realm_level: 1,
            speed: 20,
            ..PlayerState::default()
        }
    }

    fn names() -> (String, String) {
        (String::from("Grey Wolf"), String::new())
    }

    #[test]
    fn deterministic_normal_battle_decreases_hp_monotonically() {
        let player = scenario_player();
        let setup = BattleSetup::new(EncounterKind::Normal);
        let config = CombatConfig::deterministic();
        let mut rng = SmallRng::seed_from_u64(1);
        let enemy = build_enemy(&player, &setup, &config, names(), &mut rng);
        assert_eq!(enemy.attack, 105);
        assert_eq!(enemy.defense, 54);
        assert_eq!(enemy.max_hp, 500);
        assert_eq!(enemy.speed, 20);

        let replay = simulate(&player, enemy, &setup, &config, &mut rng);
        let mut player_hp = player.hp;
        let mut enemy_hp = replay.enemy.hp;
        for round in &replay.rounds {
            match round.attacker {
                Side::Player => {
                    assert!(round.enemy_hp < enemy_hp);
                    assert_eq!(round.player_hp, player_hp);
                }
                Side::Enemy => {
                    assert!(round.player_hp < player_hp);
                    assert_eq!(round.enemy_hp, enemy_hp);
                }
            }
            assert!(!round.crit);
            player_hp = round.player_hp;
            enemy_hp = round.enemy_hp;
        }
        // Ties go to the player.
        assert_eq!(replay.rounds[0].attacker, Side::Player);
        assert_eq!(replay.victory, enemy_hp == 0);
        assert!(replay.rounds.len() <= MAX_BATTLE_ROUNDS);
    }

    #[test]
    fn damage_formula_matches_floor_rules() {
        let config = CombatConfig::deterministic();
        let mut rng = SmallRng::seed_from_u64(3);
        // 100×0.9 − 54×0.45 = 65.7
        assert_eq!(roll_damage(100, 54, 0.0, &config, &mut rng), (66, false));
        // Heavy armour: min(5, 25) floor wins.
        assert_eq!(roll_damage(100, 1_000, 0.0, &config, &mut rng), (25, false));
        assert_eq!(roll_damage(4, 1_000, 0.0, &config, &mut rng), (5, false));
    }

    #[test]
    fn crits_multiply_damage() {
        let config = CombatConfig {
            crits_enabled: true,
            ..CombatConfig::deterministic()
        };
        let mut rng = SmallRng::seed_from_u64(3);
        assert_eq!(roll_damage(100, 54, 1.0, &config, &mut rng), (99, true));
    }

    #[test]
    fn victory_and_defeat_obey_hp_laws() {
        let config = CombatConfig::default();
        let setup = BattleSetup::new(EncounterKind::Normal);
        let mut rng = SmallRng::seed_from_u64(99);
        let mut victories = 0;
        let mut defeats = 0;
        for seed in 0..300_u64 {
            let player = PlayerState {
                attack: 20 + i64::try_from(seed % 60).unwrap(),
                hp: 100,
                max_hp: 100,
                ..PlayerState::default()
            };
            let enemy = build_enemy(&player, &setup, &config, names(), &mut rng);
            let replay = simulate(&player, enemy, &setup, &config, &mut rng);
            assert!(replay.rounds.len() <= MAX_BATTLE_ROUNDS);
            assert_eq!(replay.hp_lost, (replay.player_hp_before - replay.player_hp_after).max(0));
            if replay.victory {
                victories += 1;
                assert!(replay.player_hp_after > 0);
                assert!(replay.exp_change > 0);
                assert!(replay.spirit_stones_change >= BATTLE_STONES_FLOOR);
            } else {
                defeats += 1;
                assert_eq!(replay.player_hp_after, 8);
                assert!(replay.exp_change <= -BATTLE_EXP_LOSS_FLOOR);
                assert!(replay.spirit_stones_change <= -BATTLE_STONES_LOSS_FLOOR);
            }
        }
        assert!(victories > 0 && defeats > 0);
    }

    #[test]
    fn round_cap_is_a_defeat() {
        let player = PlayerState {
            attack: 1,
            defense: 10_000,
            hp: 1_000,
            max_hp: 1_000,
            ..PlayerState::default()
        };
        let setup = BattleSetup::new(EncounterKind::Normal);
        let config = CombatConfig::deterministic();
        let mut rng = SmallRng::seed_from_u64(5);
        let enemy = EnemyCombatant {
            name: "Stone Golem".into(),
            title: String::new(),
            realm: Realm::QiRefining,
            max_hp: 10_000,
            hp: 10_000,
            attack: 1,
            defense: 10_000,
            speed: 1,
        };
        let replay = simulate(&player, enemy, &setup, &config, &mut rng);
        assert_eq!(replay.rounds.len(), MAX_BATTLE_ROUNDS);
        assert!(!replay.victory);
        assert!(replay.timed_out);
        assert_eq!(replay.player_hp_after, 80);
        // round(37 × 0.5) exceeds the loss floor.
        assert_eq!(replay.exp_change, -19);
    }

    #[test]
    fn difficulty_follows_encounter_kind() {
        let mut setup = BattleSetup::new(EncounterKind::SecretRealm);
        setup.risk = Some(RiskLevel::Extreme);
        assert!((difficulty_for(&setup) - 1.625).abs() < 1e-9);
        setup.kind = EncounterKind::Pursuit;
        setup.pursuit_level = 2;
        assert!((difficulty_for(&setup) - 1.3).abs() < 1e-9);
        setup.kind = EncounterKind::Fortunate;
        assert!((difficulty_for(&setup) - 0.85).abs() < 1e-9);
    }

    #[test]
    fn boss_stats_respect_profile_floor() {
        let bosses = crate::boss::BossConfig::default();
        let boss = bosses.get("thunder_tribulation_beast").unwrap().clone();
        let setup = BattleSetup {
            kind: EncounterKind::BossGate,
            boss: Some(boss.clone()),
            realm_hint: Some(Realm::QiRefining.offset(boss.realm_offset)),
            ..BattleSetup::default()
        };
        let config = CombatConfig::deterministic();
        let mut rng = SmallRng::seed_from_u64(8);
        let enemy = build_enemy(&PlayerState::default(), &setup, &config, names(), &mut rng);
        assert_eq!(enemy.name, boss.name);
        assert_eq!(enemy.max_hp, 420);
        assert_eq!(enemy.attack, 42);
        assert_eq!(enemy.realm, Realm::FoundationEstablishment);
        let replay = simulate(&PlayerState::default(), enemy, &setup, &config, &mut rng);
        assert_eq!(replay.boss_id.as_deref(), Some("thunder_tribulation_beast"));
    }

    #[test]
    fn cursor_never_passes_total() {
        let player = scenario_player();
        let setup = BattleSetup::new(EncounterKind::Normal);
        let config = CombatConfig::default();
        let mut rng = SmallRng::seed_from_u64(4);
        let enemy = build_enemy(&player, &setup, &config, names(), &mut rng);
        let replay = simulate(&player, enemy, &setup, &config, &mut rng);
        let mut cursor = ReplayCursor::new(&replay);
        let mut steps = 0;
        while cursor.advance() {
            steps += 1;
            assert!(cursor.revealed() <= cursor.total());
            assert_eq!(cursor.visible(&replay).len(), cursor.revealed());
        }
        assert_eq!(steps, replay.rounds.len());
        assert!(cursor.is_complete());
        assert!(!cursor.advance());
    }

    struct ScriptedNames(Result<EnemyName, CollaboratorError>);

    #[async_trait]
    impl EnemyNameGenerator for ScriptedNames {
        async fn generate(
            &self,
            _realm: Realm,
            _kind: EncounterKind,
        ) -> Result<EnemyName, CollaboratorError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn name_generator_is_used_and_failures_fall_back() {
        let config = CombatConfig {
            generated_name_chance: 1.0,
            ..CombatConfig::deterministic()
        };
        let pools = EnemyNamePools::default();
        let setup = BattleSetup::new(EncounterKind::Normal);
        let player = PlayerState::default();
        let mut rng = SmallRng::seed_from_u64(12);

        let named = ScriptedNames(Ok(EnemyName {
            name: "Crimson Serpent Elder".into(),
            title: "of the Blood Pool".into(),
        }));
        let replay = resolve_battle_encounter(
            &player,
            &setup,
            &config,
            &pools,
            Some(&named as &dyn EnemyNameGenerator),
            &mut rng,
        )
        .await;
        assert_eq!(replay.enemy.name, "Crimson Serpent Elder");

        let broken = ScriptedNames(Err(CollaboratorError::Unavailable("offline".into())));
        let replay = resolve_battle_encounter(
            &player,
            &setup,
            &config,
            &pools,
            Some(&broken as &dyn EnemyNameGenerator),
            &mut rng,
        )
        .await;
        assert!(pools.names.contains(&replay.enemy.name));

        let blank = ScriptedNames(Ok(EnemyName {
            name: "  ".into(),
            title: String::new(),
        }));
        let replay = resolve_battle_encounter(
            &player,
            &setup,
            &config,
            &pools,
            Some(&blank as &dyn EnemyNameGenerator),
            &mut rng,
        )
        .await;
        assert!(pools.names.contains(&replay.enemy.name));
    }
}
