//! The Encounter Director: decides what an excursion turns into and drives it
//! to a committed outcome.
//!
//! The director is an explicit state machine. Interactive battles and boss
//! gates park it in a waiting phase; the host resumes it with
//! [`Director::handle_battle_result`] or [`Director::decide_boss_gate`].
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::applicator::{
    ApplyContext, ApplyReport, BattleSettlement, apply_battle, apply_outcome,
};
use crate::boss::{BossAssessment, BossProfile, assess_boss};
use crate::collaborators::{
    BattleRequest, BattleSurface, Clock, EnemyNameGenerator, NarrativeGenerator, NullSink,
    PersistenceSink, ShopSurface, SystemClock, TemplateLibrary,
};
use crate::combat::{BattleReplay, BattleSetup, CombatConfig, resolve_battle_encounter};
#[cfg(debug_assertions)]
use crate::constants::DEBUG_ENV_VAR;
use crate::constants::{
    ADVENTURE_COOLDOWN_SECS, CHAINED_EVENT_DELAY_MS, DECLINE_COOLDOWN_SECS,
    HANDOFF_COOLDOWN_SECS, HUNTED_BATTLE_CHANCE, NARRATIVE_PACING_MS, SHOP_COOLDOWN_SECS,
    SHOP_INTERRUPT_CHANCE,
};
use crate::data::GameContent;
use crate::encounters::{
    EncounterKind, EventTemplate, RiskLevel, StaticTemplateLibrary, battle_chance, fortune_chance,
};
use crate::error::{BattleResultError, ContentError, DirectorError, MerchantError};
use crate::merchant::{MerchantStock, PurchaseReceipt, build_merchant_stock, purchase};
use crate::narrative::resolve_reply;
use crate::outcome::AdventureOutcome;
use crate::state::{LogColor, LogEntry, PlayerState, PlayerStore};

#[cfg(debug_assertions)]
fn debug_log_enabled() -> bool {
    matches!(std::env::var(DEBUG_ENV_VAR), Ok(val) if val != "0")
}

#[cfg(not(debug_assertions))]
const fn debug_log_enabled() -> bool {
    false
}

const MISADVENTURE_LINE: &str =
    "Misadventure! A sudden disturbance in the qi forces you to withdraw.";
const DECLINE_LINE: &str =
    "You judge the odds and withdraw. The presence lingers, then fades into the mist.";

/// Identifies one interactive battle hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BattleTicket(pub u64);

impl fmt::Display for BattleTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorConfig {
    pub pacing: Duration,
    pub chained_delay: Duration,
    /// Resolve battles in-process even when an interactive surface exists.
    pub auto_skip_battles: bool,
    pub seed: u64,
    pub combat: CombatConfig,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(NARRATIVE_PACING_MS),
            chained_delay: Duration::from_millis(CHAINED_EVENT_DELAY_MS),
            auto_skip_battles: false,
            seed: 0,
            combat: CombatConfig::default(),
        }
    }
}

impl DirectorConfig {
    /// No pacing or chained delays; used by tests and headless runs.
    #[must_use]
    pub fn instant(seed: u64) -> Self {
        Self {
            pacing: Duration::ZERO,
            chained_delay: Duration::ZERO,
            seed,
            ..Self::default()
        }
    }
}

/// Everything outside the core the director talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub narrative: Option<Arc<dyn NarrativeGenerator>>,
    pub enemy_names: Option<Arc<dyn EnemyNameGenerator>>,
    pub templates: Arc<dyn TemplateLibrary>,
    pub battle_surface: Option<Arc<dyn BattleSurface>>,
    pub shop_surface: Option<Arc<dyn ShopSurface>>,
    pub persistence: Arc<dyn PersistenceSink>,
    pub clock: Arc<dyn Clock>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("narrative", &self.narrative.is_some())
            .field("enemy_names", &self.enemy_names.is_some())
            .field("battle_surface", &self.battle_surface.is_some())
            .field("shop_surface", &self.shop_surface.is_some())
            .finish_non_exhaustive()
    }
}

impl Collaborators {
    /// Template library over `content`, no generators or surfaces, wall clock.
    #[must_use]
    pub fn offline(content: &GameContent) -> Self {
        Self {
            narrative: None,
            enemy_names: None,
            templates: Arc::new(StaticTemplateLibrary::new(Arc::new(content.templates.clone()))),
            battle_surface: None,
            shop_surface: None,
            persistence: Arc::new(NullSink),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_narrative(mut self, generator: Arc<dyn NarrativeGenerator>) -> Self {
        self.narrative = Some(generator);
        self
    }

    #[must_use]
    pub fn with_enemy_names(mut self, generator: Arc<dyn EnemyNameGenerator>) -> Self {
        self.enemy_names = Some(generator);
        self
    }

    #[must_use]
    pub fn with_templates(mut self, templates: Arc<dyn TemplateLibrary>) -> Self {
        self.templates = templates;
        self
    }

    #[must_use]
    pub fn with_battle_surface(mut self, surface: Arc<dyn BattleSurface>) -> Self {
        self.battle_surface = Some(surface);
        self
    }

    #[must_use]
    pub fn with_shop_surface(mut self, surface: Arc<dyn ShopSurface>) -> Self {
        self.shop_surface = Some(surface);
        self
    }

    #[must_use]
    pub fn with_persistence(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.persistence = sink;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn persist(&self, store: &PlayerStore, logs: &[LogEntry]) {
        if logs.is_empty() {
            return;
        }
        if let Err(err) = self.persistence.persist(&store.snapshot(), logs) {
            log::warn!("Failed to persist player state: {err:#}");
        }
    }
}

/// What the player asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AdventureRequest {
    pub kind: EncounterKind,
    /// Named dangerous zone the excursion targets.
    pub zone: Option<String>,
    pub risk: Option<RiskLevel>,
}

impl AdventureRequest {
    #[must_use]
    pub fn excursion() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn secret_realm(zone: impl Into<String>, risk: RiskLevel) -> Self {
        Self {
            kind: EncounterKind::SecretRealm,
            zone: Some(zone.into()),
            risk: Some(risk),
        }
    }

    #[must_use]
    pub fn is_plain_excursion(&self) -> bool {
        self.kind == EncounterKind::Normal && self.zone.is_none()
    }

    fn zone_sourced(&self) -> bool {
        self.zone.is_some() || self.kind == EncounterKind::SecretRealm
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PendingBattle {
    ticket: BattleTicket,
    kind: EncounterKind,
    player_hp_before: i64,
    boss_id: Option<String>,
    zone_sourced: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingBoss {
    boss: BossProfile,
    assessment: BossAssessment,
    zone_sourced: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Idle,
    AwaitingBattle(PendingBattle),
    AwaitingBossDecision(PendingBoss),
}

/// Observable summary of the director's phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Idle,
    AwaitingBattle,
    AwaitingBossDecision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeSource {
    Battle,
    Generator,
    Template,
    Default,
    BossDeclined,
}

/// A committed adventure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdventureReport {
    pub kind: EncounterKind,
    pub source: OutcomeSource,
    pub apply: ApplyReport,
    pub chained_scheduled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AdventureStep {
    Completed(Box<AdventureReport>),
    ShopOpened(MerchantStock),
    BattleHandedOff(BattleRequest),
    BossGatePending(BossAssessment),
    /// Cancelled during pacing; nothing was applied.
    Cancelled,
    Misadventure(LogEntry),
    /// Cooling down, suspended, or deferred work is still running.
    Busy,
}

/// Result reported by an interactive battle surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleResultData {
    pub victory: bool,
    pub player_hp_after: i64,
    pub exp_change: i64,
    pub spirit_stones_change: i64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub replay: Option<BattleReplay>,
}

impl BattleResultData {
    #[must_use]
    pub fn from_replay(replay: BattleReplay) -> Self {
        Self {
            victory: replay.victory,
            player_hp_after: replay.player_hp_after,
            exp_change: replay.exp_change,
            spirit_stones_change: replay.spirit_stones_change,
            summary: replay.summary.clone(),
            replay: Some(replay),
        }
    }
}

/// Cancels paced or chained work from outside the director.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<u64>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_modify(|generation| *generation = generation.wrapping_add(1));
    }
}

/// Pick the narrative for an excursion: generator, else template, else default.
async fn narrate<R>(
    collaborators: &Collaborators,
    snapshot: &PlayerState,
    kind: EncounterKind,
    risk: Option<RiskLevel>,
    rng: &mut R,
) -> (AdventureOutcome, OutcomeSource, Option<EventTemplate>)
where
    R: RngCore + Send,
{
    if let Some(generator) = &collaborators.narrative {
        let reply = generator.generate(snapshot, kind, risk).await;
        return (resolve_reply(reply), OutcomeSource::Generator, None);
    }
    match collaborators
        .templates
        .random_template(kind, risk, snapshot.realm, snapshot.realm_level, rng)
    {
        Some(template) => (
            template.instantiate(snapshot.realm),
            OutcomeSource::Template,
            Some(template),
        ),
        None => (
            AdventureOutcome::default_for(snapshot.realm),
            OutcomeSource::Default,
            None,
        ),
    }
}

/// Wait for `delay` unless cancelled first. Returns `false` on cancellation.
async fn paced(delay: Duration, cancel: &mut watch::Receiver<u64>) -> bool {
    if delay.is_zero() {
        return !cancel.has_changed().unwrap_or(false);
    }
    tokio::select! {
        () = tokio::time::sleep(delay) => true,
        _ = cancel.changed() => false,
    }
}

/// Everything a chained sub-event needs, owned so it can run detached.
struct ChainedEvent {
    store: PlayerStore,
    content: Arc<GameContent>,
    collaborators: Collaborators,
    /// Taken before the triggering outcome was applied.
    snapshot: PlayerState,
    delay: Duration,
    cancel: watch::Receiver<u64>,
    rng: ChaCha20Rng,
}

impl ChainedEvent {
    async fn run(mut self) {
        if !paced(self.delay, &mut self.cancel).await {
            log::debug!("Chained secret realm cancelled before it fired");
            return;
        }
        let (mut outcome, _, template) = narrate(
            &self.collaborators,
            &self.snapshot,
            EncounterKind::SecretRealm,
            None,
            &mut self.rng,
        )
        .await;
        // Boss gates only open from a primary adventure.
        if let Some(boss) = template.and_then(|template| template.boss) {
            log::debug!("Chained secret realm drew boss template {boss}; using default outcome");
            outcome = AdventureOutcome::default_for(self.snapshot.realm);
        }
        if self.cancel.has_changed().unwrap_or(false) {
            return;
        }
        let multiplier = self.snapshot.realm.reward_multiplier();
        let content = &self.content;
        let rng = &mut self.rng;
        let report = self.store.transact(|state| {
            state.statistics.secret_realms_entered += 1;
            let mut report = ApplyReport::default();
            report.logs.push(LogEntry::new(
                "The ground gives way and you tumble into a hidden secret realm!",
                LogColor::Rare,
            ));
            let applied = apply_outcome(
                state,
                &outcome,
                &ApplyContext::chained(multiplier),
                content,
                rng,
            );
            report.logs.extend(applied.logs);
            report
        });
        self.collaborators.persist(&self.store, &report.logs);
    }
}

pub struct Director {
    store: PlayerStore,
    content: Arc<GameContent>,
    collaborators: Collaborators,
    config: DirectorConfig,
    rng: ChaCha20Rng,
    phase: Phase,
    cooldown_secs: u32,
    next_ticket: u64,
    shop: Option<MerchantStock>,
    cancel_tx: Arc<watch::Sender<u64>>,
    deferred: Vec<JoinHandle<()>>,
}

impl fmt::Debug for Director {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Director")
            .field("phase", &self.phase)
            .field("cooldown_secs", &self.cooldown_secs)
            .field("deferred", &self.deferred.len())
            .finish_non_exhaustive()
    }
}

impl Director {
    #[must_use]
    pub fn new(
        store: PlayerStore,
        content: Arc<GameContent>,
        collaborators: Collaborators,
        config: DirectorConfig,
    ) -> Self {
        let (cancel_tx, _) = watch::channel(0_u64);
        Self {
            rng: ChaCha20Rng::seed_from_u64(config.seed),
            store,
            content,
            collaborators,
            config,
            phase: Phase::Idle,
            cooldown_secs: 0,
            next_ticket: 1,
            shop: None,
            cancel_tx: Arc::new(cancel_tx),
            deferred: Vec::new(),
        }
    }

    #[must_use]
    pub const fn store(&self) -> &PlayerStore {
        &self.store
    }

    #[must_use]
    pub fn content(&self) -> &GameContent {
        &self.content
    }

    #[must_use]
    pub const fn cooldown(&self) -> u32 {
        self.cooldown_secs
    }

    #[must_use]
    pub const fn phase(&self) -> PhaseKind {
        match self.phase {
            Phase::Idle => PhaseKind::Idle,
            Phase::AwaitingBattle(_) => PhaseKind::AwaitingBattle,
            Phase::AwaitingBossDecision(_) => PhaseKind::AwaitingBossDecision,
        }
    }

    #[must_use]
    pub fn shop(&self) -> Option<&MerchantStock> {
        self.shop.as_ref()
    }

    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::clone(&self.cancel_tx),
        }
    }

    /// Drop any paced or chained work that has not mutated yet.
    pub fn cancel(&self) {
        self.cancel_handle().cancel();
    }

    /// Count the cooldown down.
    pub const fn tick(&mut self, seconds: u32) {
        self.cooldown_secs = self.cooldown_secs.saturating_sub(seconds);
    }

    /// Whether a new adventure would be rejected right now.
    pub fn is_busy(&mut self) -> bool {
        self.deferred.retain(|handle| !handle.is_finished());
        self.cooldown_secs > 0 || self.phase != Phase::Idle || !self.deferred.is_empty()
    }

    /// Wait for every chained sub-event to finish.
    ///
    /// # Errors
    ///
    /// Returns [`DirectorError::TaskJoin`] when a deferred task panicked.
    pub async fn settle(&mut self) -> Result<(), DirectorError> {
        for handle in self.deferred.drain(..) {
            handle.await.map_err(DirectorError::TaskJoin)?;
        }
        Ok(())
    }

    /// Run one excursion to completion or to the next hand-off.
    pub async fn execute_adventure(&mut self, request: AdventureRequest) -> AdventureStep {
        if self.is_busy() {
            return AdventureStep::Busy;
        }
        if request.is_plain_excursion() && self.rng.r#gen::<f64>() < SHOP_INTERRUPT_CHANCE {
            let snapshot = self.store.snapshot();
            return self.open_shop(&snapshot);
        }
        let mut cancel = self.cancel_tx.subscribe();
        if !paced(self.config.pacing, &mut cancel).await {
            return AdventureStep::Cancelled;
        }

        let snapshot = self.store.snapshot();
        let mut kind = request.kind;
        if request.is_plain_excursion() && self.rng.r#gen::<f64>() < fortune_chance(&snapshot) {
            kind = EncounterKind::Fortunate;
        }

        let now = self.collaborators.clock.now_ms();
        let hunted = snapshot
            .pursuit_level(now)
            .filter(|_| self.rng.r#gen::<f64>() < HUNTED_BATTLE_CHANCE);
        let setup = match hunted {
            Some(level) => Some(BattleSetup {
                pursuit_level: level,
                ..BattleSetup::new(EncounterKind::Pursuit)
            }),
            None if self.rng.r#gen::<f64>() < battle_chance(kind, &snapshot) => Some(BattleSetup {
                risk: request.risk,
                ..BattleSetup::new(kind)
            }),
            None => None,
        };

        if debug_log_enabled() {
            log::debug!(
                "Adventure decided | kind:{kind} battle:{} hunted:{}",
                setup.is_some(),
                hunted.is_some()
            );
        }

        match setup {
            Some(setup) => self.fight(&snapshot, setup, request.zone_sourced()).await,
            None => self.narrative(&snapshot, kind, &request).await,
        }
    }

    async fn narrative(
        &mut self,
        snapshot: &PlayerState,
        kind: EncounterKind,
        request: &AdventureRequest,
    ) -> AdventureStep {
        let (outcome, source, template) =
            narrate(&self.collaborators, snapshot, kind, request.risk, &mut self.rng).await;

        if let Some(boss_id) = template.as_ref().and_then(|template| template.boss.as_deref()) {
            return match self.content.bosses.get(boss_id).cloned() {
                Some(boss) => self.open_boss_gate(snapshot, &outcome, boss, request.zone_sourced()),
                None => self.misadventure(&DirectorError::from(ContentError::UnknownBoss(
                    boss_id.to_string(),
                ))),
            };
        }

        let context = ApplyContext {
            zone_sourced: request.zone_sourced(),
            ..ApplyContext::primary(kind)
        };
        let content = &self.content;
        let rng = &mut self.rng;
        let zone_sourced = request.zone_sourced();
        let report = self.store.transact(|state| {
            state.statistics.adventure_count += 1;
            if zone_sourced {
                state.statistics.secret_realms_entered += 1;
            }
            apply_outcome(state, &outcome, &context, content, rng)
        });
        self.collaborators.persist(&self.store, &report.logs);

        let chained_scheduled = report.trigger_secret_realm;
        if chained_scheduled {
            self.schedule_chained(snapshot.clone());
        }
        self.cooldown_secs = ADVENTURE_COOLDOWN_SECS;
        AdventureStep::Completed(Box::new(AdventureReport {
            kind,
            source,
            apply: report,
            chained_scheduled,
        }))
    }

    fn schedule_chained(&mut self, snapshot: PlayerState) {
        let event = ChainedEvent {
            store: self.store.clone(),
            content: Arc::clone(&self.content),
            collaborators: self.collaborators.clone(),
            snapshot,
            delay: self.config.chained_delay,
            cancel: self.cancel_tx.subscribe(),
            rng: ChaCha20Rng::seed_from_u64(self.rng.next_u64()),
        };
        self.deferred.push(tokio::spawn(event.run()));
    }

    async fn fight(
        &mut self,
        snapshot: &PlayerState,
        setup: BattleSetup,
        zone_sourced: bool,
    ) -> AdventureStep {
        if let Some(surface) = self
            .collaborators
            .battle_surface
            .clone()
            .filter(|_| !self.config.auto_skip_battles)
        {
            let ticket = BattleTicket(self.next_ticket);
            self.next_ticket += 1;
            let request = BattleRequest {
                ticket,
                kind: setup.kind,
                risk: setup.risk,
                realm_hint: setup.realm_hint,
                boss_id: setup.boss.as_ref().map(|boss| boss.id.clone()),
            };
            self.phase = Phase::AwaitingBattle(PendingBattle {
                ticket,
                kind: setup.kind,
                player_hp_before: snapshot.hp,
                boss_id: request.boss_id.clone(),
                zone_sourced,
            });
            self.cooldown_secs = HANDOFF_COOLDOWN_SECS;
            self.collaborators.persist(
                &self.store,
                &[LogEntry::new(
                    "Killing intent sweeps over you. You ready yourself for battle!",
                    LogColor::Danger,
                )],
            );
            surface.open(request.clone());
            return AdventureStep::BattleHandedOff(request);
        }

        let name_generator = self.collaborators.enemy_names.clone();
        let replay = resolve_battle_encounter(
            snapshot,
            &setup,
            &self.config.combat,
            &self.content.enemy_names,
            name_generator.as_deref(),
            &mut self.rng,
        )
        .await;
        let settlement = BattleSettlement::from(&replay);
        let mut report = self.commit_battle(&settlement, zone_sourced);
        report.replay = Some(replay);
        self.cooldown_secs = ADVENTURE_COOLDOWN_SECS;
        AdventureStep::Completed(Box::new(AdventureReport {
            kind: setup.kind,
            source: OutcomeSource::Battle,
            apply: report,
            chained_scheduled: false,
        }))
    }

    fn commit_battle(&mut self, settlement: &BattleSettlement, zone_sourced: bool) -> ApplyReport {
        let content = &self.content;
        let rng = &mut self.rng;
        let report = self.store.transact(|state| {
            state.statistics.adventure_count += 1;
            if zone_sourced {
                state.statistics.secret_realms_entered += 1;
            }
            apply_battle(state, settlement, content, rng)
        });
        self.collaborators.persist(&self.store, &report.logs);
        report
    }

    fn open_shop(&mut self, snapshot: &PlayerState) -> AdventureStep {
        let stock = build_merchant_stock(&self.content, snapshot, &mut self.rng);
        self.collaborators.persist(
            &self.store,
            &[LogEntry::new(
                "A wandering merchant waves you over, wares glinting with spiritual light.",
                LogColor::Rare,
            )],
        );
        if let Some(surface) = &self.collaborators.shop_surface {
            surface.open(&stock);
        }
        self.shop = Some(stock.clone());
        self.cooldown_secs = SHOP_COOLDOWN_SECS;
        AdventureStep::ShopOpened(stock)
    }

    /// Buy from the merchant opened by the last shop interrupt.
    ///
    /// # Errors
    ///
    /// See [`crate::merchant::purchase`]; no shop open is an unknown offer.
    pub fn purchase(&mut self, offer_id: &str) -> Result<PurchaseReceipt, MerchantError> {
        let stock = self
            .shop
            .as_mut()
            .ok_or_else(|| MerchantError::UnknownOffer(offer_id.to_string()))?;
        let receipt = self.store.transact(|state| purchase(state, stock, offer_id))?;
        self.collaborators.persist(
            &self.store,
            &[LogEntry::new(
                format!(
                    "Bought {} for {} spirit stones.",
                    receipt.item_name, receipt.price
                ),
                LogColor::Gain,
            )],
        );
        Ok(receipt)
    }

    pub fn close_shop(&mut self) {
        self.shop = None;
    }

    fn open_boss_gate(
        &mut self,
        snapshot: &PlayerState,
        outcome: &AdventureOutcome,
        boss: BossProfile,
        zone_sourced: bool,
    ) -> AdventureStep {
        let assessment = assess_boss(snapshot, &boss);
        let mut logs = Vec::new();
        if !outcome.story.trim().is_empty() {
            logs.push(LogEntry::new(outcome.story.trim(), LogColor::Danger));
        }
        logs.push(LogEntry::new(assessment.summary.clone(), LogColor::Danger));
        self.collaborators.persist(&self.store, &logs);
        self.phase = Phase::AwaitingBossDecision(PendingBoss {
            boss,
            assessment: assessment.clone(),
            zone_sourced,
        });
        AdventureStep::BossGatePending(assessment)
    }

    /// Answer a pending boss gate.
    ///
    /// # Errors
    ///
    /// Returns [`DirectorError::NoBossDecisionPending`] outside a boss gate.
    pub async fn decide_boss_gate(&mut self, accept: bool) -> Result<AdventureStep, DirectorError> {
        let Phase::AwaitingBossDecision(pending) = &self.phase else {
            return Err(DirectorError::NoBossDecisionPending);
        };
        let pending = pending.clone();
        self.phase = Phase::Idle;
        let snapshot = self.store.snapshot();
        if !accept {
            let line = LogEntry::new(DECLINE_LINE, LogColor::Normal);
            self.collaborators.persist(&self.store, std::slice::from_ref(&line));
            self.cooldown_secs = DECLINE_COOLDOWN_SECS;
            return Ok(AdventureStep::Completed(Box::new(AdventureReport {
                kind: EncounterKind::BossGate,
                source: OutcomeSource::BossDeclined,
                apply: ApplyReport {
                    logs: vec![line],
                    ..ApplyReport::default()
                },
                chained_scheduled: false,
            })));
        }
        log::debug!(
            "Boss gate accepted | boss:{} verdict:{:?}",
            pending.boss.id,
            pending.assessment.verdict
        );
        let setup = BattleSetup {
            realm_hint: Some(snapshot.realm.offset(pending.boss.realm_offset)),
            boss: Some(pending.boss),
            ..BattleSetup::new(EncounterKind::BossGate)
        };
        Ok(self.fight(&snapshot, setup, pending.zone_sourced).await)
    }

    /// Consume the interactive battle surface's result.
    ///
    /// # Errors
    ///
    /// Rejects results when no battle is awaited or the ticket is stale;
    /// the player is not touched in either case.
    pub fn handle_battle_result(
        &mut self,
        ticket: BattleTicket,
        data: BattleResultData,
    ) -> Result<AdventureReport, BattleResultError> {
        let pending = match &self.phase {
            Phase::AwaitingBattle(pending) if pending.ticket == ticket => pending.clone(),
            Phase::AwaitingBattle(pending) => {
                return Err(BattleResultError::TicketMismatch {
                    expected: pending.ticket,
                    received: ticket,
                });
            }
            Phase::Idle | Phase::AwaitingBossDecision(_) => {
                return Err(BattleResultError::NotAwaiting);
            }
        };
        let enemy_name = data
            .replay
            .as_ref()
            .map(|replay| replay.enemy.name.clone())
            .unwrap_or_default();
        let summary = if data.summary.trim().is_empty() {
            if data.victory {
                String::from("You emerge victorious.")
            } else {
                String::from("You are defeated and flee.")
            }
        } else {
            data.summary.clone()
        };
        let settlement = BattleSettlement {
            encounter: pending.kind,
            victory: data.victory,
            enemy_name,
            summary,
            player_hp_before: pending.player_hp_before,
            player_hp_after: data.player_hp_after,
            exp_change: data.exp_change,
            spirit_stones_change: data.spirit_stones_change,
            boss_id: pending.boss_id.clone(),
        };
        let mut report = self.commit_battle(&settlement, pending.zone_sourced);
        report.replay = data.replay;
        self.phase = Phase::Idle;
        self.cooldown_secs = ADVENTURE_COOLDOWN_SECS;
        Ok(AdventureReport {
            kind: pending.kind,
            source: OutcomeSource::Battle,
            apply: report,
            chained_scheduled: false,
        })
    }

    fn misadventure(&mut self, err: &DirectorError) -> AdventureStep {
        log::warn!("Adventure aborted: {err}");
        let line = LogEntry::new(MISADVENTURE_LINE, LogColor::Loss);
        self.collaborators.persist(&self.store, std::slice::from_ref(&line));
        self.phase = Phase::Idle;
        self.cooldown_secs = ADVENTURE_COOLDOWN_SECS;
        AdventureStep::Misadventure(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boss::BossConfig;
    use crate::collaborators::{FixedClock, GeneratorReply};
    use crate::error::CollaboratorError;
    use crate::realm::Realm;
    use crate::state::PursuitStatus;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedTemplates(Option<EventTemplate>);

    impl TemplateLibrary for FixedTemplates {
        fn random_template(
            &self,
            _kind: EncounterKind,
            _risk: Option<RiskLevel>,
            _realm: Realm,
            _realm_level: u8,
            _rng: &mut dyn RngCore,
        ) -> Option<EventTemplate> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct RecordingSurface(Mutex<Vec<BattleRequest>>);

    impl BattleSurface for RecordingSurface {
        fn open(&self, request: BattleRequest) {
            self.0.lock().unwrap().push(request);
        }
    }

    struct RawGenerator(&'static str);

    #[async_trait]
    impl NarrativeGenerator for RawGenerator {
        async fn generate(
            &self,
            _player: &PlayerState,
            _kind: EncounterKind,
            _risk: Option<RiskLevel>,
        ) -> Result<GeneratorReply, CollaboratorError> {
            Ok(GeneratorReply::Raw(self.0.to_string()))
        }
    }

    fn template(id: &str, outcome: AdventureOutcome, boss: Option<&str>) -> EventTemplate {
        EventTemplate {
            id: id.into(),
            kinds: vec![EncounterKind::Normal, EncounterKind::Fortunate],
            risks: Vec::new(),
            min_realm: Realm::QiRefining,
            max_realm: None,
            weight: 1,
            boss: boss.map(String::from),
            outcome,
        }
    }

    /// A player the battle roll almost never picks: minimum battle chance.
    fn peaceful_player() -> PlayerState {
        PlayerState {
            luck: 100_000,
            speed: 0,
            ..PlayerState::default()
        }
    }

    fn director(player: PlayerState, collaborators: Collaborators, seed: u64) -> Director {
        let content = Arc::new(GameContent::default());
        Director::new(
            PlayerStore::new(player),
            content,
            collaborators,
            DirectorConfig::instant(seed),
        )
    }

    fn offline() -> Collaborators {
        Collaborators::offline(GameContent::default_content())
    }

    async fn next_completed(director: &mut Director, request: AdventureRequest) -> AdventureStep {
        loop {
            director.tick(u32::MAX);
            director.close_shop();
            let step = director.execute_adventure(request.clone()).await;
            if !matches!(step, AdventureStep::ShopOpened(_)) {
                return step;
            }
        }
    }

    #[tokio::test]
    async fn cooldown_rejects_overlapping_calls() {
        let mut director = director(PlayerState::default(), offline(), 1);
        let first = director.execute_adventure(AdventureRequest::excursion()).await;
        assert!(!matches!(first, AdventureStep::Busy));
        assert!(director.cooldown() > 0);
        assert_eq!(
            director.execute_adventure(AdventureRequest::excursion()).await,
            AdventureStep::Busy
        );
        director.tick(60);
        assert_eq!(director.cooldown(), 0);
    }

    #[tokio::test]
    async fn empty_library_yields_default_outcome() {
        let collaborators = offline().with_templates(Arc::new(FixedTemplates(None)));
        let mut director = director(peaceful_player(), collaborators, 2);
        let mut saw_default = false;
        for _ in 0..20 {
            if let AdventureStep::Completed(report) =
                next_completed(&mut director, AdventureRequest::excursion()).await
                && report.source == OutcomeSource::Default
            {
                assert_eq!(report.apply.exp_applied, 10);
                assert_eq!(report.apply.hp_applied, 0);
                saw_default = true;
            }
        }
        assert!(saw_default);
    }

    #[tokio::test]
    async fn malformed_generator_output_is_salvaged() {
        let collaborators = offline().with_narrative(Arc::new(RawGenerator(
            "```json\n{\"story\": \"A quiet spring.\", \"expChange\": +25}\n```",
        )));
        let mut director = director(peaceful_player(), collaborators, 3);
        for _ in 0..20 {
            if let AdventureStep::Completed(report) =
                next_completed(&mut director, AdventureRequest::excursion()).await
                && report.source == OutcomeSource::Generator
            {
                assert_eq!(report.apply.exp_applied, 25);
                return;
            }
        }
        panic!("generator path never taken");
    }

    #[tokio::test]
    async fn interactive_battles_suspend_until_result() {
        let surface = Arc::new(RecordingSurface::default());
        let collaborators = offline()
            .with_templates(Arc::new(FixedTemplates(None)))
            .with_battle_surface(surface.clone());
        let hunted = PlayerState {
            speed: 10_000,
            ..PlayerState::default()
        };
        let mut director = director(hunted, collaborators, 4);
        let request = loop {
            let request = AdventureRequest::secret_realm("Ashen Vale", RiskLevel::High);
            if let AdventureStep::BattleHandedOff(request) =
                next_completed(&mut director, request).await
            {
                break request;
            }
        };
        assert_eq!(surface.0.lock().unwrap().len(), 1);
        assert_eq!(director.phase(), PhaseKind::AwaitingBattle);
        director.tick(u32::MAX);
        assert_eq!(
            director.execute_adventure(AdventureRequest::excursion()).await,
            AdventureStep::Busy
        );

        let stale = BattleTicket(request.ticket.0 + 7);
        let data = BattleResultData {
            victory: true,
            player_hp_after: 60,
            exp_change: 40,
            spirit_stones_change: 9,
            summary: String::new(),
            replay: None,
        };
        let before = director.store().snapshot();
        assert_eq!(
            director.handle_battle_result(stale, data.clone()),
            Err(BattleResultError::TicketMismatch {
                expected: request.ticket,
                received: stale,
            })
        );
        assert_eq!(director.store().snapshot(), before);

        let report = director
            .handle_battle_result(request.ticket, data.clone())
            .unwrap();
        assert_eq!(report.source, OutcomeSource::Battle);
        let after = director.store().snapshot();
        assert_eq!(after.hp, 60);
        assert_eq!(after.statistics.battles_won, before.statistics.battles_won + 1);
        assert_eq!(director.phase(), PhaseKind::Idle);
        assert_eq!(
            director.handle_battle_result(request.ticket, data),
            Err(BattleResultError::NotAwaiting)
        );
    }

    #[tokio::test]
    async fn boss_gate_waits_for_a_decision() {
        let gate = template(
            "gate",
            AdventureOutcome::neutral("Thunder rolls across a scorched plain."),
            Some("thunder_tribulation_beast"),
        );
        let collaborators = offline().with_templates(Arc::new(FixedTemplates(Some(gate))));
        let mut director = director(peaceful_player(), collaborators, 5);

        let assessment = loop {
            if let AdventureStep::BossGatePending(assessment) =
                next_completed(&mut director, AdventureRequest::excursion()).await
            {
                break assessment;
            }
        };
        let boss = BossConfig::default();
        assert_eq!(
            assessment.boss_power,
            boss.get("thunder_tribulation_beast").unwrap().effective_power()
        );
        assert_eq!(director.phase(), PhaseKind::AwaitingBossDecision);

        let declined = director.decide_boss_gate(false).await.unwrap();
        let AdventureStep::Completed(report) = declined else {
            panic!("decline should complete");
        };
        assert_eq!(report.source, OutcomeSource::BossDeclined);
        assert_eq!(director.cooldown(), DECLINE_COOLDOWN_SECS);
        assert!(matches!(
            director.decide_boss_gate(true).await,
            Err(DirectorError::NoBossDecisionPending)
        ));

        loop {
            if let AdventureStep::BossGatePending(_) =
                next_completed(&mut director, AdventureRequest::excursion()).await
            {
                break;
            }
        }
        let accepted = director.decide_boss_gate(true).await.unwrap();
        let AdventureStep::Completed(report) = accepted else {
            panic!("accepted gate should resolve the battle");
        };
        let replay = report.apply.replay.as_ref().unwrap();
        assert_eq!(replay.encounter, EncounterKind::BossGate);
        assert_eq!(replay.enemy.name, "Thunder Tribulation Beast");
    }

    #[tokio::test]
    async fn unknown_boss_is_a_misadventure() {
        let gate = template("gate", AdventureOutcome::neutral("?"), Some("no_such_boss"));
        let collaborators = offline().with_templates(Arc::new(FixedTemplates(Some(gate))));
        let mut director = director(peaceful_player(), collaborators, 6);
        loop {
            match next_completed(&mut director, AdventureRequest::excursion()).await {
                AdventureStep::Misadventure(line) => {
                    assert_eq!(line.message, MISADVENTURE_LINE);
                    break;
                }
                AdventureStep::Completed(_) => continue,
                other => panic!("unexpected step {other:?}"),
            }
        }
        assert_eq!(director.phase(), PhaseKind::Idle);
        assert_eq!(director.cooldown(), ADVENTURE_COOLDOWN_SECS);
    }

    #[tokio::test]
    async fn chained_event_uses_pre_mutation_snapshot() {
        let trigger = template(
            "trigger",
            AdventureOutcome {
                story: "The cave collapses beneath you.".into(),
                trigger_secret_realm: true,
                ..AdventureOutcome::default()
            },
            None,
        );
        let collaborators = offline().with_templates(Arc::new(FixedTemplates(Some(trigger))));
        let mut director = director(peaceful_player(), collaborators, 7);
        loop {
            if let AdventureStep::Completed(report) =
                next_completed(&mut director, AdventureRequest::excursion()).await
                && report.chained_scheduled
            {
                break;
            }
        }
        director.settle().await.unwrap();
        let state = director.store().snapshot();
        assert!(state.statistics.secret_realms_entered >= 1);
    }

    #[tokio::test]
    async fn cancelled_pacing_never_mutates() {
        let content = Arc::new(GameContent::default());
        let store = PlayerStore::new(PlayerState::default());
        let mut director = Director::new(
            store.clone(),
            content,
            offline(),
            DirectorConfig {
                pacing: Duration::from_secs(30),
                ..DirectorConfig::instant(8)
            },
        );
        let handle = director.cancel_handle();
        let before = store.snapshot();
        let (step, ()) = tokio::join!(
            director.execute_adventure(AdventureRequest::secret_realm(
                "Ashen Vale",
                RiskLevel::High
            )),
            async {
                tokio::task::yield_now().await;
                handle.cancel();
            }
        );
        assert_eq!(step, AdventureStep::Cancelled);
        assert_eq!(store.snapshot(), before);
        assert_eq!(director.cooldown(), 0);
    }

    #[tokio::test]
    async fn pursuit_can_force_a_battle() {
        let hunted = PlayerState {
            pursuit: Some(PursuitStatus {
                level: 3,
                expires_at_ms: 10_000,
                pursuer: "Blood Sect".into(),
            }),
            ..peaceful_player()
        };
        let collaborators = offline()
            .with_templates(Arc::new(FixedTemplates(None)))
            .with_clock(Arc::new(FixedClock(0)));
        let mut director = director(hunted, collaborators, 9);
        for _ in 0..400 {
            if let AdventureStep::Completed(report) =
                next_completed(&mut director, AdventureRequest::excursion()).await
                && report.kind == EncounterKind::Pursuit
            {
                let replay = report.apply.replay.as_ref().unwrap();
                assert!((replay.difficulty - 1.45).abs() < 1e-9);
                return;
            }
            director.store().transact(|state| state.hp = state.max_hp);
        }
        panic!("pursuit battle never triggered");
    }

    #[tokio::test]
    async fn shop_interrupt_skips_pacing() {
        let mut director = Director::new(
            PlayerStore::new(PlayerState::default()),
            Arc::new(GameContent::default()),
            offline(),
            DirectorConfig {
                pacing: Duration::from_secs(30),
                ..DirectorConfig::instant(10)
            },
        );
        let handle = director.cancel_handle();
        let mut shops = 0;
        for _ in 0..200 {
            director.tick(u32::MAX);
            director.close_shop();
            let (step, ()) = tokio::join!(
                director.execute_adventure(AdventureRequest::excursion()),
                async {
                    tokio::task::yield_now().await;
                    handle.cancel();
                }
            );
            match step {
                AdventureStep::ShopOpened(_) => shops += 1,
                AdventureStep::Cancelled => {}
                other => panic!("unexpected step {other:?}"),
            }
        }
        assert!(shops > 0);
    }

    #[tokio::test]
    async fn chained_event_never_pays_boss_rewards() {
        let gate = EventTemplate {
            kinds: vec![EncounterKind::SecretRealm],
            ..template(
                "ancient_demon_gate",
                AdventureOutcome {
                    story: "An ancient demon stirs behind a sealed gate.".into(),
                    exp_change: 120,
                    spirit_stones_change: 40,
                    ..AdventureOutcome::default()
                },
                Some("thunder_tribulation_beast"),
            )
        };
        let collaborators = offline().with_templates(Arc::new(FixedTemplates(Some(gate))));
        let player = PlayerState {
            realm: Realm::CoreFormation,
            ..peaceful_player()
        };
        let mut director = director(player, collaborators, 11);
        let before = director.store().snapshot();
        director.schedule_chained(before.clone());
        director.settle().await.unwrap();

        let after = director.store().snapshot();
        let fallback = AdventureOutcome::default_for(Realm::CoreFormation);
        assert_eq!(after.exp, before.exp + fallback.exp_change);
        assert_eq!(after.spirit_stones, before.spirit_stones);
        assert_eq!(after.statistics.battles_won, before.statistics.battles_won);
        assert_eq!(
            after.statistics.secret_realms_entered,
            before.statistics.secret_realms_entered + 1
        );
        assert_eq!(director.phase(), PhaseKind::Idle);
    }
}
