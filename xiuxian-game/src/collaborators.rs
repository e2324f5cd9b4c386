//! Seams to everything outside the core: generators, surfaces, sinks, time.
//!
//! The async traits model remote services (narrative text, enemy names).
//! The sync traits are in-process hand-offs the host application implements.
use async_trait::async_trait;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::director::BattleTicket;
use crate::encounters::{EncounterKind, EventTemplate, RiskLevel};
use crate::error::CollaboratorError;
use crate::merchant::MerchantStock;
use crate::outcome::AdventureOutcome;
use crate::realm::Realm;
use crate::state::{LogEntry, PlayerState};

/// What a narrative generator hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorReply {
    /// Already decoded by the transport.
    Structured(AdventureOutcome),
    /// Raw model text, decoded and salvaged by the core.
    Raw(String),
}

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Produce an outcome for the player's excursion.
    ///
    /// # Errors
    ///
    /// Any error is treated as a transport failure and replaced with a neutral outcome.
    async fn generate(
        &self,
        player: &PlayerState,
        kind: EncounterKind,
        risk: Option<RiskLevel>,
    ) -> Result<GeneratorReply, CollaboratorError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyName {
    pub name: String,
    #[serde(default)]
    pub title: String,
}

#[async_trait]
pub trait EnemyNameGenerator: Send + Sync {
    /// # Errors
    ///
    /// Errors and empty names fall back to the static pools.
    async fn generate(
        &self,
        realm: Realm,
        kind: EncounterKind,
    ) -> Result<EnemyName, CollaboratorError>;
}

pub trait TemplateLibrary: Send + Sync {
    fn random_template(
        &self,
        kind: EncounterKind,
        risk: Option<RiskLevel>,
        realm: Realm,
        realm_level: u8,
        rng: &mut dyn RngCore,
    ) -> Option<EventTemplate>;
}

/// Parameters for an interactive battle run by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRequest {
    pub ticket: BattleTicket,
    pub kind: EncounterKind,
    pub risk: Option<RiskLevel>,
    pub realm_hint: Option<Realm>,
    pub boss_id: Option<String>,
}

pub trait BattleSurface: Send + Sync {
    /// Open the interactive battle. The result comes back through
    /// [`crate::Director::handle_battle_result`].
    fn open(&self, request: BattleRequest);
}

pub trait ShopSurface: Send + Sync {
    fn open(&self, stock: &MerchantStock);
}

pub trait PersistenceSink: Send + Sync {
    /// Persist the aggregate after a mutation batch.
    ///
    /// # Errors
    ///
    /// Failures are logged and never roll back the mutation.
    fn persist(&self, player: &PlayerState, logs: &[LogEntry]) -> anyhow::Result<()>;
}

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock pinned to one instant.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl PersistenceSink for NullSink {
    fn persist(&self, _player: &PlayerState, _logs: &[LogEntry]) -> anyhow::Result<()> {
        Ok(())
    }
}
