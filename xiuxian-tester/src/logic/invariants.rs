//! Invariant checks run after every harness step.
use xiuxian_game::{Attribute, BattleReplay, CombatConfig, PlayerState};

/// Largest share of the attribute total one step may remove: a primary pass
/// plus its chained sub-event.
const STEP_LOSS_PERCENT: i64 = 25;
const INHERITANCE_CEILING: i64 = 4;

pub fn check_state(state: &PlayerState) -> Vec<String> {
    let mut violations = Vec::new();
    if state.max_hp < 1 {
        violations.push(format!("max_hp {} below 1", state.max_hp));
    }
    if state.hp > state.max_hp {
        violations.push(format!("hp {} exceeds max_hp {}", state.hp, state.max_hp));
    }
    for attribute in Attribute::ALL {
        if state.attribute(attribute) < 0 {
            violations.push(format!("{} is negative", attribute.label()));
        }
    }
    if state.exp < 0 || state.spirit_stones < 0 || state.lottery_tickets < 0 {
        violations.push(format!(
            "negative counters exp:{} stones:{} tickets:{}",
            state.exp, state.spirit_stones, state.lottery_tickets
        ));
    }
    if !(0..=INHERITANCE_CEILING).contains(&state.inheritance_level) {
        violations.push(format!("inheritance level {} out of range", state.inheritance_level));
    }
    for (index, item) in state.inventory.iter().enumerate() {
        if let Some(twin) = state.inventory[index + 1..]
            .iter()
            .find(|other| item.stacks_with(other))
        {
            violations.push(format!("{} and {} should have stacked", item.id, twin.id));
        }
    }
    if let Some(active) = &state.active_companion
        && state.companion(active).is_none()
    {
        violations.push(format!("active companion {active} is not owned"));
    }
    violations
}

pub fn check_transition(before: &PlayerState, after: &PlayerState) -> Vec<String> {
    let mut violations = check_state(after);
    let lost: i64 = Attribute::ALL
        .iter()
        .map(|attribute| (before.attribute(*attribute) - after.attribute(*attribute)).max(0))
        .sum();
    if lost * 100 > before.attribute_total() * STEP_LOSS_PERCENT {
        violations.push(format!(
            "lost {lost} attribute points of {}",
            before.attribute_total()
        ));
    }
    if after.max_hp * 2 < before.max_hp {
        violations.push(format!(
            "max_hp fell from {} to {}",
            before.max_hp, after.max_hp
        ));
    }
    violations
}

pub fn check_replay(replay: &BattleReplay, config: &CombatConfig) -> Vec<String> {
    let mut violations = Vec::new();
    if replay.victory && replay.player_hp_after > replay.player_hp_before {
        violations.push(String::from("victory restored hp"));
    }
    if replay.player_hp_after < 1 {
        violations.push(String::from("battle left the player at zero hp"));
    }
    if replay.hp_lost != (replay.player_hp_before - replay.player_hp_after).max(0) {
        violations.push(format!(
            "hp_lost {} does not match {} -> {}",
            replay.hp_lost, replay.player_hp_before, replay.player_hp_after
        ));
    }
    if replay.rounds.len() > config.max_rounds {
        violations.push(format!("{} rounds exceed the cap", replay.rounds.len()));
    }
    if replay.victory && replay.exp_change <= 0 {
        violations.push(String::from("victory without experience"));
    }
    if !replay.victory && (replay.exp_change > 0 || replay.spirit_stones_change > 0) {
        violations.push(String::from("defeat granted rewards"));
    }
    violations
}
