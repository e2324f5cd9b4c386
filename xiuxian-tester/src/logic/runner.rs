use anyhow::{Context, Result, bail};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;
use xiuxian_game::{
    AdventureReport, AdventureStep, BattleRequest, BattleResultData, BattleSetup, BattleSurface,
    Collaborators, CombatConfig, Director, DirectorConfig, FixedClock, GameContent,
    OutcomeSource, PlayerStore, resolve_battle_encounter,
};

use super::flaky::FlakyNarrative;
use super::invariants::{check_replay, check_state, check_transition};
use super::plan::{NarrativeMode, RunSummary, SimulationPlan, StepCounts};

/// Hand-off target that does nothing; the runner fights the battle itself.
struct HeadlessArena;

impl BattleSurface for HeadlessArena {
    fn open(&self, request: BattleRequest) {
        log::trace!("Battle {} handed off ({})", request.ticket, request.kind);
    }
}

/// Drives one director session through a plan.
pub struct PlanRunner {
    content: Arc<GameContent>,
    verbose: bool,
}

struct Session {
    director: Director,
    flaky: Option<Arc<FlakyNarrative>>,
    rng: ChaCha20Rng,
    counts: StepCounts,
    violations: Vec<String>,
}

impl PlanRunner {
    #[must_use]
    pub const fn new(content: Arc<GameContent>, verbose: bool) -> Self {
        Self { content, verbose }
    }

    /// Run `plan` once for `seed`.
    ///
    /// # Errors
    ///
    /// Returns an error when the director rejects a result the runner gave it
    /// or a deferred task panics.
    pub async fn run_plan(&self, plan: &SimulationPlan, seed: u64) -> Result<RunSummary> {
        let summary = self.run_once(plan, seed).await?;
        if plan.check_determinism {
            let replayed = self.run_once(plan, seed).await?;
            let first = serde_json::to_string(&summary.final_state)?;
            let second = serde_json::to_string(&replayed.final_state)?;
            if first != second || summary.counts != replayed.counts {
                bail!("seed {seed} diverged between two identical runs");
            }
        }
        Ok(summary)
    }

    async fn run_once(&self, plan: &SimulationPlan, seed: u64) -> Result<RunSummary> {
        let mut session = self.session(plan, seed);
        for step in 0..plan.steps {
            session.director.tick(u32::MAX);
            let before = session.director.store().snapshot();
            let served_before = session.served_len();
            let outcome = session
                .director
                .execute_adventure(plan.requests.request(step))
                .await;
            session.drive(plan, outcome, served_before, &self.content).await?;
            session.director.settle().await.context("chained event failed")?;

            let after = session.director.store().snapshot();
            for violation in check_transition(&before, &after) {
                session.violations.push(format!("step {step}: {violation}"));
            }
            if after.is_fallen() {
                session.counts.falls += 1;
                session.director.store().transact(|state| state.hp = state.max_hp);
            }
            if self.verbose {
                log::debug!(
                    "step {step} | realm:{} hp:{}/{} exp:{} stones:{}",
                    after.realm,
                    after.hp,
                    after.max_hp,
                    after.exp,
                    after.spirit_stones
                );
            }
        }
        let final_state = session.director.store().snapshot();
        session.violations.extend(check_state(&final_state));
        if let Some(flaky) = &session.flaky {
            let served = flaky.served();
            session.counts.generator_calls = served.len();
            session.counts.junk_replies = served.iter().filter(|kind| kind.is_junk()).count();
        }
        Ok(RunSummary {
            seed,
            steps: plan.steps,
            counts: session.counts,
            final_state,
            violations: session.violations,
        })
    }

    fn session(&self, plan: &SimulationPlan, seed: u64) -> Session {
        let mut collaborators =
            Collaborators::offline(&self.content).with_clock(Arc::new(FixedClock(0)));
        let flaky = match plan.narrative {
            NarrativeMode::Templates => None,
            NarrativeMode::Flaky => Some(Arc::new(FlakyNarrative::new(seed))),
        };
        if let Some(flaky) = &flaky {
            collaborators = collaborators.with_narrative(flaky.clone());
        }
        if plan.interactive_battles {
            collaborators = collaborators.with_battle_surface(Arc::new(HeadlessArena));
        }
        let director = Director::new(
            PlayerStore::new(plan.preset.build()),
            Arc::clone(&self.content),
            collaborators,
            DirectorConfig::instant(seed),
        );
        Session {
            director,
            flaky,
            rng: ChaCha20Rng::seed_from_u64(seed ^ 0x5eed),
            counts: StepCounts::default(),
            violations: Vec::new(),
        }
    }
}

impl Session {
    fn served_len(&self) -> usize {
        self.flaky.as_ref().map_or(0, |flaky| flaky.served().len())
    }

    /// Follow one adventure through shops, boss gates and hand-offs.
    async fn drive(
        &mut self,
        plan: &SimulationPlan,
        mut step: AdventureStep,
        served_before: usize,
        content: &GameContent,
    ) -> Result<()> {
        loop {
            step = match step {
                AdventureStep::Completed(report) => {
                    self.record(&report, served_before);
                    return Ok(());
                }
                AdventureStep::ShopOpened(_) => {
                    self.counts.shops += 1;
                    if plan.buy_from_merchant {
                        self.shop_spree();
                    }
                    self.director.close_shop();
                    return Ok(());
                }
                AdventureStep::BossGatePending(assessment) => {
                    self.counts.boss_gates += 1;
                    log::debug!("Boss gate {} ({:?})", assessment.boss_name, assessment.verdict);
                    self.director.decide_boss_gate(plan.accept_bosses).await?
                }
                AdventureStep::BattleHandedOff(request) => {
                    self.counts.handoffs += 1;
                    let report = self.fight_handed_off(&request, content).await?;
                    self.record(&report, served_before);
                    return Ok(());
                }
                AdventureStep::Misadventure(line) => {
                    self.counts.misadventures += 1;
                    log::debug!("Misadventure: {line}");
                    return Ok(());
                }
                other @ (AdventureStep::Cancelled | AdventureStep::Busy) => {
                    self.violations
                        .push(format!("unexpected {other:?} on an idle director"));
                    return Ok(());
                }
            };
        }
    }

    async fn fight_handed_off(
        &mut self,
        request: &BattleRequest,
        content: &GameContent,
    ) -> Result<AdventureReport> {
        let player = self.director.store().snapshot();
        let setup = BattleSetup {
            kind: request.kind,
            risk: request.risk,
            realm_hint: request.realm_hint,
            pursuit_level: player.pursuit_level(0).unwrap_or(0),
            boss: request
                .boss_id
                .as_deref()
                .and_then(|id| content.bosses.get(id))
                .cloned(),
        };
        let replay = resolve_battle_encounter(
            &player,
            &setup,
            &CombatConfig::default(),
            &content.enemy_names,
            None,
            &mut self.rng,
        )
        .await;
        let report = self
            .director
            .handle_battle_result(request.ticket, BattleResultData::from_replay(replay))?;
        Ok(report)
    }

    fn shop_spree(&mut self) {
        let Some(stock) = self.director.shop().cloned() else {
            return;
        };
        for offer in stock.offers {
            if offer.price > self.director.store().snapshot().spirit_stones {
                continue;
            }
            match self.director.purchase(&offer.offer_id) {
                Ok(_) => self.counts.purchases += 1,
                Err(err) => self
                    .violations
                    .push(format!("affordable offer {} refused: {err}", offer.offer_id)),
            }
        }
        for violation in check_state(&self.director.store().snapshot()) {
            self.violations.push(format!("after shopping: {violation}"));
        }
    }

    fn record(&mut self, report: &AdventureReport, served_before: usize) {
        self.counts.completed += 1;
        if report.chained_scheduled {
            self.counts.chained += 1;
        }
        if report.source == OutcomeSource::Battle {
            self.counts.battles += 1;
            if let Some(replay) = &report.apply.replay {
                self.violations
                    .extend(check_replay(replay, &CombatConfig::default()));
            }
        }
        if report.source == OutcomeSource::Generator {
            self.check_junk_neutralized(report, served_before);
        }
    }

    /// A reply the core could not salvage must apply nothing but its story.
    fn check_junk_neutralized(&mut self, report: &AdventureReport, served_before: usize) {
        let Some(flaky) = &self.flaky else {
            return;
        };
        let Some(kind) = flaky.served().get(served_before).copied() else {
            return;
        };
        let apply = &report.apply;
        if kind.is_junk()
            && (apply.exp_applied != 0 || apply.hp_applied != 0 || apply.spirit_stones_applied != 0)
        {
            self.violations.push(format!(
                "{kind:?} reply applied exp:{} hp:{} stones:{}",
                apply.exp_applied, apply.hp_applied, apply.spirit_stones_applied
            ));
        }
    }
}
