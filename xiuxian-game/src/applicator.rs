//! Commits resolved outcomes onto the player aggregate.
//!
//! Every rule here clamps instead of failing. The logs it emits always carry
//! the amounts that were actually applied, never the amounts requested.
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::combat::BattleReplay;
use crate::companion::{
    Companion, CompanionGrant, CompanionId, PetOpportunity, PetOpportunityKind,
};
use crate::constants::{
    BATTLE_LOOT_CHANCE, CHAINED_ATTRIBUTE_REDUCTION_CAP, CHAINED_COMPENSATION_EXP,
    CHAINED_COMPENSATION_STONES, CHAINED_REWARD_THRESHOLD_EXP, CHAINED_REWARD_THRESHOLD_STONES,
    CHAINED_TOTAL_REDUCTION_CAP, INHERITANCE_CEILING, MAX_HP_REDUCTION_FLOOR,
    PRIMARY_ATTRIBUTE_REDUCTION_CAP, PRIMARY_TOTAL_REDUCTION_CAP,
};
use crate::data::GameContent;
use crate::encounters::EncounterKind;
use crate::items::{ItemId, Rarity, materialize_loot};
use crate::numbers::{ceil_f64_to_i64, floor_f64_to_i64, i64_to_f64, round_f64_to_i64};
use crate::outcome::{AdventureOutcome, AttributeReduction};
use crate::realm::Realm;
use crate::state::{Attribute, LogColor, LogEntry, PlayerState};
use crate::unlocks::{ArtId, TalentId, roll_art_unlock, roll_talent_unlock};

/// Limits on how much of the player an outcome may take away.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReductionCaps {
    /// Share of the six-attribute sum the whole reduction may remove.
    pub total_ratio: f64,
    /// Share of each attribute's current value.
    pub attribute_ratio: f64,
    /// `max_hp` never drops below this share of its current value.
    pub max_hp_floor_ratio: f64,
}

impl ReductionCaps {
    pub const PRIMARY: Self = Self {
        total_ratio: PRIMARY_TOTAL_REDUCTION_CAP,
        attribute_ratio: PRIMARY_ATTRIBUTE_REDUCTION_CAP,
        max_hp_floor_ratio: MAX_HP_REDUCTION_FLOOR,
    };

    pub const CHAINED: Self = Self {
        total_ratio: CHAINED_TOTAL_REDUCTION_CAP,
        attribute_ratio: CHAINED_ATTRIBUTE_REDUCTION_CAP,
        max_hp_floor_ratio: MAX_HP_REDUCTION_FLOOR,
    };
}

/// Which mutation pass an outcome is applied in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ApplyPass {
    Primary,
    /// A sub-event fired by an earlier outcome. The multiplier comes from the
    /// snapshot taken before that earlier outcome was applied.
    Chained { snapshot_multiplier: f64 },
}

impl ApplyPass {
    #[must_use]
    pub const fn caps(self) -> ReductionCaps {
        match self {
            Self::Primary => ReductionCaps::PRIMARY,
            Self::Chained { .. } => ReductionCaps::CHAINED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ApplyContext {
    pub kind: EncounterKind,
    /// The outcome came from a dangerous zone rather than a plain excursion.
    pub zone_sourced: bool,
    pub pass: ApplyPass,
    pub unlock_rolls: bool,
}

impl ApplyContext {
    #[must_use]
    pub const fn primary(kind: EncounterKind) -> Self {
        Self {
            kind,
            zone_sourced: matches!(kind, EncounterKind::SecretRealm),
            pass: ApplyPass::Primary,
            unlock_rolls: true,
        }
    }

    #[must_use]
    pub const fn chained(snapshot_multiplier: f64) -> Self {
        Self {
            kind: EncounterKind::SecretRealm,
            zone_sourced: true,
            pass: ApplyPass::Chained {
                snapshot_multiplier,
            },
            unlock_rolls: false,
        }
    }

    /// Battles roll unlocks under the same kind and zone odds as narrated outcomes.
    #[must_use]
    pub const fn battle(kind: EncounterKind) -> Self {
        Self::primary(kind)
    }
}

pub type AppliedReductions = SmallVec<[(Attribute, i64); 6]>;

/// What a single transition actually did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub logs: Vec<LogEntry>,
    pub items_added: Vec<ItemId>,
    pub lottery_tickets_applied: i64,
    pub inheritance_applied: i64,
    pub companion_added: Option<CompanionId>,
    pub art_unlocked: Option<ArtId>,
    pub talent_unlocked: Option<TalentId>,
    pub reductions: AppliedReductions,
    pub hp_applied: i64,
    pub exp_applied: i64,
    pub spirit_stones_applied: i64,
    pub compensated: bool,
    pub trigger_secret_realm: bool,
    pub replay: Option<BattleReplay>,
}

impl ApplyReport {
    fn log(&mut self, message: impl Into<String>, color: LogColor) {
        self.logs.push(LogEntry::new(message, color));
    }
}

const fn rarity_color(rarity: Rarity) -> LogColor {
    match rarity {
        Rarity::Common => LogColor::Gain,
        Rarity::Rare => LogColor::Rare,
        Rarity::Legendary | Rarity::Immortal => LogColor::Legendary,
    }
}

/// Apply one outcome. Call inside [`crate::PlayerStore::transact`].
pub fn apply_outcome<R>(
    state: &mut PlayerState,
    outcome: &AdventureOutcome,
    context: &ApplyContext,
    content: &GameContent,
    rng: &mut R,
) -> ApplyReport
where
    R: Rng + ?Sized,
{
    let mut report = ApplyReport {
        trigger_secret_realm: outcome.trigger_secret_realm,
        ..ApplyReport::default()
    };
    if !outcome.story.trim().is_empty() {
        report.log(outcome.story.trim(), outcome.event_color);
    }

    ingest_loot(state, outcome, content, rng, &mut report);
    // Chained sub-events keep to items, reductions and vitals.
    if matches!(context.pass, ApplyPass::Primary) {
        apply_tokens(state, outcome, &mut report);
        if let Some(grant) = &outcome.pet_obtained {
            acquire_companion(state, grant, rng, &mut report);
        }
        if let Some(opportunity) = &outcome.pet_opportunity {
            apply_pet_opportunity(state, opportunity, rng, &mut report);
        }
        if context.unlock_rolls {
            roll_unlocks(state, context, content, rng, &mut report);
        }
    }
    if let Some(reduction) = &outcome.attribute_reduction {
        let applied = apply_reduction(state, reduction, context.pass.caps());
        for (attribute, amount) in &applied {
            report.log(
                format!("Your {} fell by {amount}.", attribute.label()),
                LogColor::Loss,
            );
        }
        report.reductions = applied;
    }
    apply_vitals(state, outcome, &mut report);

    if let ApplyPass::Chained {
        snapshot_multiplier,
    } = context.pass
    {
        compensate_chained(state, outcome, snapshot_multiplier, &mut report);
    }
    state.enforce_invariants();
    report
}

fn ingest_loot<R>(
    state: &mut PlayerState,
    outcome: &AdventureOutcome,
    content: &GameContent,
    rng: &mut R,
    report: &mut ApplyReport,
) where
    R: Rng + ?Sized,
{
    for entry in outcome.loot() {
        let item = materialize_loot(entry, &content.known_items, rng);
        let message = if item.quantity > 1 {
            format!("Obtained {} ×{}.", item.name, item.quantity)
        } else {
            format!("Obtained {}.", item.name)
        };
        report.log(message, rarity_color(item.rarity));
        report.items_added.push(item.id.clone());
        state.add_item(item);
    }
}

fn apply_tokens(state: &mut PlayerState, outcome: &AdventureOutcome, report: &mut ApplyReport) {
    let tickets = outcome
        .lottery_tickets_change
        .max(state.lottery_tickets.saturating_neg());
    if tickets != 0 {
        state.lottery_tickets = state.lottery_tickets.saturating_add(tickets);
        report.lottery_tickets_applied = tickets;
        report.log(
            format!("Lottery tickets {tickets:+}."),
            if tickets > 0 { LogColor::Gain } else { LogColor::Loss },
        );
    }

    let requested = outcome.inheritance_level_change;
    let current = state.inheritance_level.clamp(0, INHERITANCE_CEILING);
    let inheritance = if requested > 0 {
        requested.min(INHERITANCE_CEILING - current)
    } else {
        requested.max(-current)
    };
    if inheritance != 0 {
        state.inheritance_level = current + inheritance;
        report.inheritance_applied = inheritance;
        report.log(
            format!(
                "Inheritance level {inheritance:+} (now {}).",
                state.inheritance_level
            ),
            if inheritance > 0 { LogColor::Legendary } else { LogColor::Loss },
        );
    } else if requested > 0 {
        report.log(
            "An ancient legacy stirs, but your inheritance is already complete.",
            LogColor::Normal,
        );
    }
}

fn acquire_companion<R>(
    state: &mut PlayerState,
    grant: &CompanionGrant,
    rng: &mut R,
    report: &mut ApplyReport,
) where
    R: Rng + ?Sized,
{
    if grant.name.trim().is_empty() && grant.species.trim().is_empty() {
        return;
    }
    let id = format!("pet-{:016x}", rng.next_u64());
    let companion = Companion::from_grant(id, grant);
    if state
        .companions
        .iter()
        .any(|owned| owned.same_species(&companion.species))
    {
        report.log(
            format!(
                "A {} eyes you curiously, but you already travel with one of its kind. \
                 It slips away.",
                companion.species
            ),
            LogColor::Normal,
        );
        return;
    }
    report.log(
        format!("{} the {} joins you as a companion!", companion.name, companion.species),
        rarity_color(companion.rarity),
    );
    if state.active_companion.is_none() {
        state.active_companion = Some(companion.id.clone());
    }
    report.companion_added = Some(companion.id.clone());
    state.companions.push(companion);
}

fn pick_companion<R>(state: &PlayerState, explicit: Option<&str>, rng: &mut R) -> Option<usize>
where
    R: Rng + ?Sized,
{
    let position = |id: &str| state.companions.iter().position(|c| c.id == id);
    explicit
        .and_then(position)
        .or_else(|| state.active_companion.as_deref().and_then(position))
        .or_else(|| {
            let indices: Vec<usize> = (0..state.companions.len()).collect();
            indices.choose(rng).copied()
        })
}

fn apply_pet_opportunity<R>(
    state: &mut PlayerState,
    opportunity: &PetOpportunity,
    rng: &mut R,
    report: &mut ApplyReport,
) where
    R: Rng + ?Sized,
{
    let Some(index) = pick_companion(state, opportunity.companion_id.as_deref(), rng) else {
        return;
    };
    let Some(companion) = state.companions.get_mut(index) else {
        return;
    };
    let (message, color) = match opportunity.kind {
        PetOpportunityKind::Evolution => {
            if companion.evolve() {
                (
                    format!("{} evolves to stage {}!", companion.name, companion.evolution),
                    LogColor::Legendary,
                )
            } else {
                (
                    format!("{} has already reached its final form.", companion.name),
                    LogColor::Normal,
                )
            }
        }
        PetOpportunityKind::LevelUp => {
            let requested = u32::try_from(opportunity.levels.max(1)).unwrap_or(1);
            let gained = companion.gain_levels(requested);
            (
                format!(
                    "{} gains {gained} level(s), now level {}.",
                    companion.name, companion.level
                ),
                LogColor::Rare,
            )
        }
        PetOpportunityKind::StatBoost => {
            companion.boost(&opportunity.boost);
            (format!("{} grows stronger.", companion.name), LogColor::Gain)
        }
        PetOpportunityKind::ExpGain => {
            let exp = opportunity.exp.max(0);
            let gained = companion.gain_exp(exp);
            let suffix = if gained > 0 {
                format!(" and reaches level {}", companion.level)
            } else {
                String::new()
            };
            (
                format!("{} absorbs {exp} exp{suffix}.", companion.name),
                LogColor::Gain,
            )
        }
    };
    report.log(message, color);
}

fn roll_unlocks<R>(
    state: &mut PlayerState,
    context: &ApplyContext,
    content: &GameContent,
    rng: &mut R,
    report: &mut ApplyReport,
) where
    R: Rng + ?Sized,
{
    if let Some(art) =
        roll_art_unlock(state, &content.arts, context.kind, context.zone_sourced, rng)
    {
        report.log(
            format!("Insight strikes! You comprehend the {}.", art.name),
            LogColor::Rare,
        );
        state.learned_arts.push(art.id.clone());
        report.art_unlocked = Some(art.id.clone());
    }
    if let Some(talent) =
        roll_talent_unlock(state, &content.talents, context.kind, context.zone_sourced, rng)
    {
        report.log(
            format!("A latent talent awakens: {}.", talent.name),
            LogColor::Legendary,
        );
        state.talent = Some(talent.id.clone());
        report.talent_unlocked = Some(talent.id.clone());
    }
}

/// Apply a capped attribute reduction and return what was actually removed.
///
/// The whole request is scaled down proportionally when it exceeds the total
/// cap, then each attribute is held to its own cap and `max_hp` to its floor.
pub fn apply_reduction(
    state: &mut PlayerState,
    reduction: &AttributeReduction,
    caps: ReductionCaps,
) -> AppliedReductions {
    let mut applied = AppliedReductions::new();
    let requested_total = reduction.requested_total();
    if requested_total == 0 {
        return applied;
    }
    let total_cap = floor_f64_to_i64(i64_to_f64(state.attribute_total()) * caps.total_ratio);
    let scale = if requested_total > total_cap {
        i64_to_f64(total_cap) / i64_to_f64(requested_total)
    } else {
        1.0
    };

    for attribute in Attribute::ALL {
        let requested = reduction.requested(attribute);
        if requested == 0 {
            continue;
        }
        let current = state.attribute(attribute).max(0);
        let mut amount = floor_f64_to_i64(i64_to_f64(requested) * scale)
            .min(floor_f64_to_i64(i64_to_f64(current) * caps.attribute_ratio));
        if attribute == Attribute::MaxHp {
            let floor = ceil_f64_to_i64(i64_to_f64(current) * caps.max_hp_floor_ratio).max(1);
            amount = amount.min(current - floor);
        }
        let amount = amount.max(0);
        if amount > 0 {
            let value = state.attribute_mut(attribute);
            *value = (*value - amount).max(0);
            applied.push((attribute, amount));
        }
    }
    applied
}

fn apply_vitals(state: &mut PlayerState, outcome: &AdventureOutcome, report: &mut ApplyReport) {
    let hp_before = state.hp;
    state.hp = state.hp.saturating_add(outcome.hp_change).min(state.max_hp);
    report.hp_applied = state.hp - hp_before;

    let exp_before = state.exp;
    state.exp = state.exp.saturating_add(outcome.exp_change).max(0);
    report.exp_applied = state.exp - exp_before;

    let stones_before = state.spirit_stones;
    state.spirit_stones = state
        .spirit_stones
        .saturating_add(outcome.spirit_stones_change)
        .max(0);
    report.spirit_stones_applied = state.spirit_stones - stones_before;

    if report.hp_applied != 0 {
        report.log(
            format!("HP {:+}.", report.hp_applied),
            if report.hp_applied > 0 { LogColor::Gain } else { LogColor::Danger },
        );
    }
    if report.exp_applied != 0 {
        report.log(
            format!("Cultivation exp {:+}.", report.exp_applied),
            if report.exp_applied > 0 { LogColor::Gain } else { LogColor::Loss },
        );
    }
    if report.spirit_stones_applied != 0 {
        report.log(
            format!("Spirit stones {:+}.", report.spirit_stones_applied),
            if report.spirit_stones_applied > 0 { LogColor::Gain } else { LogColor::Loss },
        );
    }
}

/// A chained sub-event that only took something away pays a consolation.
fn compensate_chained(
    state: &mut PlayerState,
    outcome: &AdventureOutcome,
    multiplier: f64,
    report: &mut ApplyReport,
) {
    let meaningful_reward = outcome.has_loot()
        || i64_to_f64(outcome.exp_change) >= CHAINED_REWARD_THRESHOLD_EXP * multiplier
        || i64_to_f64(outcome.spirit_stones_change) >= CHAINED_REWARD_THRESHOLD_STONES * multiplier;
    if report.reductions.is_empty() || meaningful_reward {
        return;
    }
    let exp = round_f64_to_i64(CHAINED_COMPENSATION_EXP * multiplier);
    let stones = round_f64_to_i64(CHAINED_COMPENSATION_STONES * multiplier);
    state.exp = state.exp.saturating_add(exp);
    state.spirit_stones = state.spirit_stones.saturating_add(stones);
    report.exp_applied += exp;
    report.spirit_stones_applied += stones;
    report.compensated = true;
    report.log(
        format!("Tempered by hardship, you glean {exp} exp and {stones} spirit stones."),
        LogColor::Gain,
    );
}

/// The numbers a finished battle contributes, however it was fought.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleSettlement {
    pub encounter: EncounterKind,
    pub victory: bool,
    pub enemy_name: String,
    pub summary: String,
    pub player_hp_before: i64,
    pub player_hp_after: i64,
    pub exp_change: i64,
    pub spirit_stones_change: i64,
    pub boss_id: Option<String>,
}

impl From<&BattleReplay> for BattleSettlement {
    fn from(replay: &BattleReplay) -> Self {
        Self {
            encounter: replay.encounter,
            victory: replay.victory,
            enemy_name: replay.enemy.name.clone(),
            summary: replay.summary.clone(),
            player_hp_before: replay.player_hp_before,
            player_hp_after: replay.player_hp_after,
            exp_change: replay.exp_change,
            spirit_stones_change: replay.spirit_stones_change,
            boss_id: replay.boss_id.clone(),
        }
    }
}

/// Express a battle as an ordinary outcome so it flows through the same rules.
pub fn battle_outcome<R>(
    settlement: &BattleSettlement,
    realm: Realm,
    content: &GameContent,
    rng: &mut R,
) -> AdventureOutcome
where
    R: Rng + ?Sized,
{
    let item_obtained = if settlement.victory {
        match settlement
            .boss_id
            .as_deref()
            .and_then(|id| content.bosses.get(id))
        {
            Some(boss) => boss.loot.clone(),
            None if rng.r#gen::<f64>() < BATTLE_LOOT_CHANCE => {
                content.battle_loot.roll(realm, rng).cloned()
            }
            None => None,
        }
    } else {
        None
    };
    AdventureOutcome {
        story: settlement.summary.clone(),
        hp_change: settlement.player_hp_after - settlement.player_hp_before,
        exp_change: settlement.exp_change,
        spirit_stones_change: settlement.spirit_stones_change,
        event_color: if settlement.victory {
            LogColor::Gain
        } else {
            LogColor::Danger
        },
        item_obtained,
        ..AdventureOutcome::default()
    }
}

/// Apply a finished battle: rewards, loot and battle statistics.
pub fn apply_battle<R>(
    state: &mut PlayerState,
    settlement: &BattleSettlement,
    content: &GameContent,
    rng: &mut R,
) -> ApplyReport
where
    R: Rng + ?Sized,
{
    let outcome = battle_outcome(settlement, state.realm, content, rng);
    if settlement.victory {
        state.statistics.kill_count += 1;
        state.statistics.battles_won += 1;
    } else {
        state.statistics.battles_lost += 1;
    }
    let mut report = apply_outcome(
        state,
        &outcome,
        &ApplyContext::battle(settlement.encounter),
        content,
        rng,
    );
    if settlement.victory
        && settlement.encounter == EncounterKind::Pursuit
        && let Some(pursuit) = state.pursuit.take()
    {
        report.log(
            format!("The hunters of {} scatter. The pursuit is over.", pursuit.pursuer),
            LogColor::Gain,
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::companion::CompanionBoost;
    use crate::constants::FLOAT_EPSILON;
    use crate::items::{ItemType, LootEntry};
    use crate::state::PursuitStatus;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn content() -> &'static GameContent {
        GameContent::default_content()
    }

    fn no_unlocks(kind: EncounterKind) -> ApplyContext {
        ApplyContext {
            unlock_rolls: false,
            ..ApplyContext::primary(kind)
        }
    }

    #[test]
    fn single_attribute_cap_binds_first() {
        let mut state = PlayerState {
            attack: 100,
            ..PlayerState::default()
        };
        let outcome = AdventureOutcome {
            attribute_reduction: Some(AttributeReduction {
                attack: 10_000,
                ..AttributeReduction::default()
            }),
            ..AdventureOutcome::default()
        };
        let mut rng = SmallRng::seed_from_u64(1);
        let report = apply_outcome(
            &mut state,
            &outcome,
            &no_unlocks(EncounterKind::Normal),
            content(),
            &mut rng,
        );
        assert_eq!(report.reductions.as_slice(), &[(Attribute::Attack, 10)]);
        assert_eq!(state.attack, 90);
        assert!(report.logs.iter().any(|log| log.message.contains("attack fell by 10")));
    }

    #[test]
    fn inheritance_is_capped_and_logged_as_applied() {
        let mut state = PlayerState {
            inheritance_level: 3,
            ..PlayerState::default()
        };
        let outcome = AdventureOutcome {
            inheritance_level_change: 4,
            ..AdventureOutcome::default()
        };
        let mut rng = SmallRng::seed_from_u64(2);
        let report = apply_outcome(
            &mut state,
            &outcome,
            &no_unlocks(EncounterKind::Normal),
            content(),
            &mut rng,
        );
        assert_eq!(state.inheritance_level, INHERITANCE_CEILING);
        assert_eq!(report.inheritance_applied, 1);
        let line = report
            .logs
            .iter()
            .find(|log| log.message.starts_with("Inheritance"))
            .unwrap();
        assert!(line.message.contains("+1"));
        assert!(!line.message.contains("+4"));
    }

    #[test]
    fn randomized_reductions_stay_within_caps() {
        let mut rng = SmallRng::seed_from_u64(33);
        for pass in [ApplyPass::Primary, ApplyPass::Chained { snapshot_multiplier: 1.0 }] {
            let caps = pass.caps();
            for _ in 0..500 {
                let mut state = PlayerState {
                    attack: rng.gen_range(0..500),
                    defense: rng.gen_range(0..500),
                    spirit_power: rng.gen_range(0..500),
                    physique: rng.gen_range(0..500),
                    speed: rng.gen_range(0..500),
                    max_hp: rng.gen_range(1..5_000),
                    ..PlayerState::default()
                };
                let before = state.clone();
                let reduction = AttributeReduction {
                    attack: rng.gen_range(-50_000..50_000),
                    defense: rng.gen_range(0..50_000),
                    spirit_power: rng.gen_range(0..50_000),
                    physique: rng.gen_range(0..50_000),
                    speed: rng.gen_range(0..50_000),
                    max_hp: rng.gen_range(0..50_000),
                };
                let applied = apply_reduction(&mut state, &reduction, caps);
                let total: i64 = applied.iter().map(|(_, amount)| amount).sum();
                assert!(
                    i64_to_f64(total)
                        <= i64_to_f64(before.attribute_total()) * caps.total_ratio + FLOAT_EPSILON
                );
                for attribute in Attribute::ALL {
                    let lost = before.attribute(attribute) - state.attribute(attribute);
                    assert!(lost >= 0);
                    assert!(
                        i64_to_f64(lost)
                            <= i64_to_f64(before.attribute(attribute)) * caps.attribute_ratio
                                + FLOAT_EPSILON
                    );
                }
                assert!(state.max_hp * 2 >= before.max_hp);
            }
        }
    }

    #[test]
    fn oversized_deltas_keep_invariants() {
        let mut state = PlayerState::default();
        let outcome = AdventureOutcome {
            hp_change: -1_000,
            exp_change: -1_000,
            spirit_stones_change: -1_000,
            lottery_tickets_change: -9,
            ..AdventureOutcome::default()
        };
        let mut rng = SmallRng::seed_from_u64(3);
        let report = apply_outcome(
            &mut state,
            &outcome,
            &no_unlocks(EncounterKind::Normal),
            content(),
            &mut rng,
        );
        assert_eq!(state.hp, -900);
        assert!(state.is_fallen());
        assert_eq!(state.exp, 0);
        assert_eq!(state.spirit_stones, 0);
        assert_eq!(state.lottery_tickets, 0);
        assert_eq!(report.exp_applied, 0);

        let heal = AdventureOutcome {
            hp_change: 5_000,
            ..AdventureOutcome::default()
        };
        apply_outcome(&mut state, &heal, &no_unlocks(EncounterKind::Normal), content(), &mut rng);
        assert_eq!(state.hp, state.max_hp);
    }

    #[test]
    fn loot_is_classified_and_stacked() {
        let mut state = PlayerState::default();
        let outcome = AdventureOutcome {
            item_obtained: Some(LootEntry {
                name: "Mystic Treasure Sword".into(),
                item_type: Some("artifact".into()),
                ..LootEntry::default()
            }),
            items_obtained: vec![
                LootEntry::named("Spirit Grass", ItemType::Herb, Rarity::Common),
                LootEntry::named("Spirit Grass", ItemType::Herb, Rarity::Common),
            ],
            ..AdventureOutcome::default()
        };
        let mut rng = SmallRng::seed_from_u64(4);
        let report = apply_outcome(
            &mut state,
            &outcome,
            &no_unlocks(EncounterKind::Normal),
            content(),
            &mut rng,
        );
        assert_eq!(report.items_added.len(), 3);
        assert_eq!(state.inventory.len(), 2);
        let sword = state
            .inventory
            .iter()
            .find(|item| item.name == "Mystic Treasure Sword")
            .unwrap();
        assert_eq!(sword.item_type, ItemType::Weapon);
        assert!(sword.permanent_effect.is_none());
        assert_eq!(state.statistics.items_obtained, 3);
    }

    #[test]
    fn duplicate_species_is_a_near_miss() {
        let grant = CompanionGrant {
            name: "Ember".into(),
            species: "Fire Fox".into(),
            attack: 10,
            defense: 10,
            hp: 50,
            speed: 12,
            ..CompanionGrant::default()
        };
        let outcome = AdventureOutcome {
            pet_obtained: Some(grant),
            ..AdventureOutcome::default()
        };
        let mut state = PlayerState::default();
        let mut rng = SmallRng::seed_from_u64(5);
        let context = no_unlocks(EncounterKind::Normal);
        let first = apply_outcome(&mut state, &outcome, &context, content(), &mut rng);
        assert!(first.companion_added.is_some());
        assert_eq!(state.active_companion, first.companion_added);
        let second = apply_outcome(&mut state, &outcome, &context, content(), &mut rng);
        assert!(second.companion_added.is_none());
        assert_eq!(state.companions.len(), 1);
        assert!(second.logs.iter().any(|log| log.message.contains("already travel")));
    }

    #[test]
    fn pet_opportunity_targets_active_companion() {
        let mut state = PlayerState::default();
        let mut rng = SmallRng::seed_from_u64(6);
        let context = no_unlocks(EncounterKind::Normal);
        for species in ["Fire Fox", "Jade Turtle"] {
            let outcome = AdventureOutcome {
                pet_obtained: Some(CompanionGrant {
                    name: species.into(),
                    species: species.into(),
                    attack: 100,
                    defense: 100,
                    hp: 100,
                    speed: 100,
                    ..CompanionGrant::default()
                }),
                ..AdventureOutcome::default()
            };
            apply_outcome(&mut state, &outcome, &context, content(), &mut rng);
        }
        let active = state.active_companion.clone().unwrap();
        let evolve = AdventureOutcome {
            pet_opportunity: Some(PetOpportunity {
                kind: PetOpportunityKind::Evolution,
                companion_id: None,
                levels: 0,
                exp: 0,
                boost: CompanionBoost::default(),
            }),
            ..AdventureOutcome::default()
        };
        apply_outcome(&mut state, &evolve, &context, content(), &mut rng);
        let pet = state.companion(&active).unwrap();
        assert_eq!(pet.evolution, 1);
        assert_eq!(pet.attack, 150);
        assert!(state.companions.iter().filter(|c| c.evolution == 0).count() == 1);
    }

    fn scarring_outcome() -> AdventureOutcome {
        AdventureOutcome {
            story: "The realm's collapse tears at your meridians.".into(),
            attribute_reduction: Some(AttributeReduction {
                attack: 50,
                defense: 50,
                ..AttributeReduction::default()
            }),
            exp_change: 3,
            ..AdventureOutcome::default()
        }
    }

    #[test]
    fn chained_pass_compensates_pure_losses() {
        let mut state = PlayerState {
            attack: 200,
            defense: 200,
            ..PlayerState::default()
        };
        let mut rng = SmallRng::seed_from_u64(7);
        let context = ApplyContext {
            unlock_rolls: false,
            ..ApplyContext::chained(Realm::FoundationEstablishment.reward_multiplier())
        };
        let report = apply_outcome(&mut state, &scarring_outcome(), &context, content(), &mut rng);
        // Chained caps: 5% of 200.
        assert_eq!(
            report.reductions.as_slice(),
            &[(Attribute::Attack, 10), (Attribute::Defense, 10)]
        );
        assert!(report.compensated);
        // 3 from the outcome plus round(30 × 1.6).
        assert_eq!(state.exp, 3 + 48);
        assert_eq!(state.spirit_stones, 16);
    }

    #[test]
    fn primary_pass_never_compensates() {
        let mut state = PlayerState {
            attack: 200,
            defense: 200,
            ..PlayerState::default()
        };
        let mut rng = SmallRng::seed_from_u64(8);
        let report = apply_outcome(
            &mut state,
            &scarring_outcome(),
            &no_unlocks(EncounterKind::SecretRealm),
            content(),
            &mut rng,
        );
        assert_eq!(
            report.reductions.as_slice(),
            &[(Attribute::Attack, 20), (Attribute::Defense, 20)]
        );
        assert!(!report.compensated);
        assert_eq!(state.exp, 3);
    }

    #[test]
    fn chained_rewards_above_threshold_skip_compensation() {
        let mut state = PlayerState {
            attack: 200,
            ..PlayerState::default()
        };
        let mut outcome = scarring_outcome();
        outcome.exp_change = 10;
        let mut rng = SmallRng::seed_from_u64(9);
        let context = ApplyContext {
            unlock_rolls: false,
            ..ApplyContext::chained(1.0)
        };
        let report = apply_outcome(&mut state, &outcome, &context, content(), &mut rng);
        assert!(!report.reductions.is_empty());
        assert!(!report.compensated);
    }

    fn settlement(victory: bool) -> BattleSettlement {
        BattleSettlement {
            encounter: EncounterKind::Pursuit,
            victory,
            enemy_name: "Blood Sect Enforcer".into(),
            summary: "The enforcer falls.".into(),
            player_hp_before: 100,
            player_hp_after: if victory { 70 } else { 8 },
            exp_change: if victory { 37 } else { -19 },
            spirit_stones_change: if victory { 8 } else { -5 },
            boss_id: None,
        }
    }

    #[test]
    fn battles_update_statistics_and_clear_pursuit() {
        let mut state = PlayerState {
            spirit_stones: 3,
            pursuit: Some(PursuitStatus {
                level: 1,
                expires_at_ms: i64::MAX,
                pursuer: "Blood Sect".into(),
            }),
            ..PlayerState::default()
        };
        let mut rng = SmallRng::seed_from_u64(10);
        let report = apply_battle(&mut state, &settlement(false), content(), &mut rng);
        assert_eq!(state.statistics.battles_lost, 1);
        assert_eq!(state.hp, 8);
        assert_eq!(state.spirit_stones, 0);
        assert_eq!(report.spirit_stones_applied, -3);
        assert!(state.pursuit.is_some());

        state.hp = 100;
        apply_battle(&mut state, &settlement(true), content(), &mut rng);
        assert_eq!(state.statistics.kill_count, 1);
        assert_eq!(state.statistics.battles_won, 1);
        assert_eq!(state.hp, 70);
        assert!(state.pursuit.is_none());
    }

    #[test]
    fn boss_victories_always_drop_profile_loot() {
        let mut rng = SmallRng::seed_from_u64(11);
        let settlement = BattleSettlement {
            encounter: EncounterKind::BossGate,
            boss_id: Some("thunder_tribulation_beast".into()),
            ..settlement(true)
        };
        for _ in 0..20 {
            let outcome = battle_outcome(&settlement, Realm::QiRefining, content(), &mut rng);
            assert_eq!(
                outcome.item_obtained.map(|loot| loot.name),
                Some(String::from("Foundation Pill"))
            );
        }
    }

    #[test]
    fn battle_loot_drops_about_a_third_of_victories() {
        const SAMPLE_SIZE: usize = 20_000;
        const TOLERANCE: f64 = 0.015;
        let mut rng = SmallRng::seed_from_u64(12);
        let settlement = settlement(true);
        let drops = (0..SAMPLE_SIZE)
            .filter(|_| {
                battle_outcome(&settlement, Realm::QiRefining, content(), &mut rng)
                    .item_obtained
                    .is_some()
            })
            .count();
        let rate = i64_to_f64(i64::try_from(drops).unwrap())
            / i64_to_f64(i64::try_from(SAMPLE_SIZE).unwrap());
        assert!((rate - BATTLE_LOOT_CHANCE).abs() < TOLERANCE, "rate {rate}");
        assert!(
            battle_outcome(&self::settlement(false), Realm::QiRefining, content(), &mut rng)
                .item_obtained
                .is_none()
        );
    }

    #[test]
    fn battle_settlements_can_teach_arts() {
        let mut rng = SmallRng::seed_from_u64(13);
        let learned = (0..2_000).find_map(|_| {
            let mut state = PlayerState::default();
            let report = apply_battle(&mut state, &settlement(true), content(), &mut rng);
            report.art_unlocked.inspect(|art| assert!(state.learned_arts.contains(art)))
        });
        assert!(learned.is_some());
    }

    #[test]
    fn chained_pass_ignores_companions_and_tokens() {
        let outcome = AdventureOutcome {
            story: "A spirit beast slumbers beside an ancestral stele.".into(),
            items_obtained: vec![LootEntry::named("Spirit Grass", ItemType::Herb, Rarity::Common)],
            pet_obtained: Some(CompanionGrant {
                name: "Ember".into(),
                species: "Fire Fox".into(),
                attack: 10,
                ..CompanionGrant::default()
            }),
            pet_opportunity: Some(PetOpportunity {
                kind: PetOpportunityKind::LevelUp,
                companion_id: None,
                levels: 3,
                exp: 0,
                boost: CompanionBoost::default(),
            }),
            inheritance_level_change: 2,
            lottery_tickets_change: 5,
            exp_change: 40,
            ..AdventureOutcome::default()
        };
        let mut rng = SmallRng::seed_from_u64(14);
        for _ in 0..500 {
            let mut state = PlayerState::default();
            let context = ApplyContext::chained(1.0);
            let report = apply_outcome(&mut state, &outcome, &context, content(), &mut rng);
            assert!(state.companions.is_empty());
            assert!(report.companion_added.is_none());
            assert_eq!(state.inheritance_level, 0);
            assert_eq!(state.lottery_tickets, 0);
            assert!(state.learned_arts.is_empty());
            assert!(state.talent.is_none());
            assert_eq!(report.items_added.len(), 1);
            assert_eq!(state.exp, 40);
        }
    }
}
