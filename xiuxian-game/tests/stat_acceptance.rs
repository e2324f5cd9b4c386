use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::convert::TryFrom;
use std::sync::Arc;
use xiuxian_game::{
    AdventureRequest, AdventureStep, BattleSetup, Collaborators, CombatConfig, Director,
    DirectorConfig, EncounterKind, FixedClock, GameContent, PlayerState, PlayerStore, RiskLevel,
    build_enemy, simulate,
};

const SAMPLE_SIZE: usize = 4000;
const TOLERANCE: f64 = 0.025;

fn rate(hits: usize, samples: usize) -> f64 {
    let hits = f64::from(u32::try_from(hits).expect("count fits"));
    hits / f64::from(u32::try_from(samples).expect("sample size fits u32"))
}

fn veteran() -> PlayerState {
    PlayerState {
        attack: 60,
        defense: 40,
        max_hp: 400,
        hp: 400,
        speed: 30,
        ..PlayerState::new("Li Qingyun")
    }
}

#[tokio::test]
async fn merchant_interrupt_tracks_base_rate() {
    let content = GameContent::default_content();
    let mut director = Director::new(
        PlayerStore::new(veteran()),
        Arc::new(content.clone()),
        Collaborators::offline(content).with_clock(Arc::new(FixedClock(0))),
        DirectorConfig::instant(0x5EED),
    );
    let mut shops = 0usize;
    for _ in 0..SAMPLE_SIZE {
        director.tick(u32::MAX);
        director.close_shop();
        director
            .store()
            .transact(|state| state.hp = state.max_hp);
        let step = director.execute_adventure(AdventureRequest::excursion()).await;
        director.settle().await.expect("chained events finish");
        match step {
            AdventureStep::ShopOpened(_) => shops += 1,
            AdventureStep::BossGatePending(_) => {
                director.decide_boss_gate(false).await.expect("gate pending");
            }
            _ => {}
        }
    }
    let observed = rate(shops, SAMPLE_SIZE);
    assert!(
        (observed - 0.15).abs() <= TOLERANCE,
        "merchant rate drifted: observed {observed:.4}"
    );
}

fn win_rate(setup: &BattleSetup, seed: u64) -> f64 {
    let player = veteran();
    let config = CombatConfig::default();
    let mut rng = SmallRng::seed_from_u64(seed);
    let wins = (0..SAMPLE_SIZE)
        .filter(|_| {
            let enemy = build_enemy(
                &player,
                setup,
                &config,
                (String::from("Rogue Cultivator"), String::new()),
                &mut rng,
            );
            simulate(&player, enemy, setup, &config, &mut rng).victory
        })
        .count();
    rate(wins, SAMPLE_SIZE)
}

#[test]
fn harder_encounters_win_less_often() {
    let fortunate = win_rate(&BattleSetup::new(EncounterKind::Fortunate), 7);
    let extreme = win_rate(
        &BattleSetup {
            risk: Some(RiskLevel::Extreme),
            ..BattleSetup::new(EncounterKind::SecretRealm)
        },
        7,
    );
    assert!(
        fortunate > extreme + 0.2,
        "fortunate {fortunate:.3} vs extreme {extreme:.3}"
    );
}

#[test]
fn pursuit_difficulty_climbs_with_level() {
    let mild = win_rate(
        &BattleSetup {
            pursuit_level: 0,
            ..BattleSetup::new(EncounterKind::Pursuit)
        },
        9,
    );
    let fierce = win_rate(
        &BattleSetup {
            pursuit_level: 5,
            ..BattleSetup::new(EncounterKind::Pursuit)
        },
        9,
    );
    assert!(mild >= fierce, "level 0 {mild:.3} vs level 5 {fierce:.3}");
}
