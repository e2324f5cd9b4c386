//! Xiuxian Adventure Core
//!
//! Platform-agnostic adventure, battle and reward logic for an idle
//! cultivation RPG. Rendering, networking and save formats live with the host;
//! this crate only talks to them through the traits in [`collaborators`].

pub mod applicator;
pub mod boss;
pub mod collaborators;
pub mod combat;
pub mod companion;
pub mod constants;
pub mod data;
pub mod director;
pub mod encounters;
pub mod error;
pub mod items;
pub mod lenient;
pub mod merchant;
pub mod narrative;
pub mod numbers;
pub mod outcome;
pub mod realm;
pub mod state;
pub mod unlocks;

use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::io;
use std::path::PathBuf;

// Re-export commonly used types
pub use applicator::{
    ApplyContext, ApplyPass, ApplyReport, BattleSettlement, ReductionCaps, apply_battle,
    apply_outcome, apply_reduction,
};
pub use boss::{BossAssessment, BossConfig, BossProfile, BossVerdict, assess_boss};
pub use collaborators::{
    BattleRequest, BattleSurface, Clock, EnemyName, EnemyNameGenerator, FixedClock,
    GeneratorReply, NarrativeGenerator, NullSink, PersistenceSink, ShopSurface, SystemClock,
    TemplateLibrary,
};
pub use combat::{
    BattleReplay, BattleRound, BattleSetup, CombatConfig, EnemyCombatant, ReplayCursor, Side,
    build_enemy, difficulty_for, resolve_battle_encounter, simulate,
};
pub use companion::{Companion, CompanionBoost, CompanionGrant, PetOpportunity};
pub use data::{GameContent, KnownItem, KnownItemCatalog};
pub use director::{
    AdventureReport, AdventureRequest, AdventureStep, BattleResultData, BattleTicket,
    CancelHandle, Collaborators, Director, DirectorConfig, OutcomeSource, PhaseKind,
};
pub use encounters::{
    EncounterKind, EventTemplate, RiskLevel, StaticTemplateLibrary, TemplateCatalog,
};
pub use error::{
    BattleResultError, CollaboratorError, ContentError, DirectorError, MerchantError,
};
pub use items::{
    Classification, EquipmentSlot, Item, ItemType, LootEntry, NormalizedEffect, Rarity,
    StatBundle, infer_item_type_and_slot, normalize_item_effect,
};
pub use merchant::{MerchantStock, PurchaseReceipt, StockOffer, build_merchant_stock, purchase};
pub use narrative::{decode_outcome, neutral_outcome};
pub use outcome::{AdventureOutcome, AttributeReduction};
pub use realm::Realm;
pub use state::{Attribute, LogColor, LogEntry, PlayerState, PlayerStore, Statistics};

/// Trait for abstracting content loading operations
/// Platform-specific implementations should provide this
pub trait ContentLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load every content table the engine needs.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be loaded or is inconsistent.
    fn load_content(&self) -> Result<GameContent, Self::Error>;
}

/// The content compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticContent;

impl ContentLoader for StaticContent {
    type Error = Infallible;

    fn load_content(&self) -> Result<GameContent, Self::Error> {
        Ok(GameContent::default_content().clone())
    }
}

/// Loads content tables from a directory of JSON files.
///
/// A missing file keeps the embedded table; a present but malformed file is
/// an error.
#[derive(Debug, Clone)]
pub struct JsonContentLoader {
    root: PathBuf,
}

impl JsonContentLoader {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn table<T>(&self, asset: &'static str, fallback: &T) -> Result<T, ContentError>
    where
        T: DeserializeOwned + Clone,
    {
        let path = self.root.join(asset);
        match std::fs::read_to_string(&path) {
            Ok(json) => {
                serde_json::from_str(&json).map_err(|source| ContentError::Parse { asset, source })
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("Content asset {asset} not found; using embedded table");
                Ok(fallback.clone())
            }
            Err(source) => Err(ContentError::Io { path, source }),
        }
    }
}

impl ContentLoader for JsonContentLoader {
    type Error = ContentError;

    fn load_content(&self) -> Result<GameContent, Self::Error> {
        let defaults = GameContent::default_content();
        let content = GameContent {
            known_items: self.table("known_items.json", &defaults.known_items)?,
            templates: self.table("templates.json", &defaults.templates)?,
            arts: self.table("arts.json", &defaults.arts)?,
            talents: self.table("talents.json", &defaults.talents)?,
            battle_loot: self.table("battle_loot.json", &defaults.battle_loot)?,
            merchant: self.table("merchant.json", &defaults.merchant)?,
            bosses: self.table("bosses.json", &defaults.bosses)?,
            enemy_names: self.table("enemy_names.json", &defaults.enemy_names)?,
        };
        content.validate()?;
        Ok(content)
    }
}

/// Trait for abstracting save/load operations
/// Platform-specific implementations should provide this
pub trait PlayerStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Save the player aggregate
    ///
    /// # Errors
    ///
    /// Returns an error if the player cannot be saved.
    fn save_player(&self, slot: &str, player: &PlayerState) -> Result<(), Self::Error>;

    /// Load the player aggregate
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be read.
    fn load_player(&self, slot: &str) -> Result<Option<PlayerState>, Self::Error>;

    /// Delete a save slot
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be deleted.
    fn delete_save(&self, slot: &str) -> Result<(), Self::Error>;
}

/// Entry point tying content and storage to director sessions
pub struct AdventureEngine<L, S>
where
    L: ContentLoader,
    S: PlayerStorage,
{
    content_loader: L,
    storage: S,
}

impl<L, S> AdventureEngine<L, S>
where
    L: ContentLoader,
    S: PlayerStorage,
{
    /// Create a new engine with the provided content loader and storage
    pub const fn new(content_loader: L, storage: S) -> Self {
        Self {
            content_loader,
            storage,
        }
    }

    /// Start a director session for `player`.
    ///
    /// When `collaborators` is `None` the session runs offline against the
    /// loaded template library.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be loaded.
    pub fn start_session(
        &self,
        player: PlayerState,
        collaborators: Option<Collaborators>,
        config: DirectorConfig,
    ) -> Result<Director, L::Error> {
        let content = self.content_loader.load_content()?;
        let collaborators = collaborators.unwrap_or_else(|| Collaborators::offline(&content));
        Ok(Director::new(
            PlayerStore::new(player),
            std::sync::Arc::new(content),
            collaborators,
            config,
        ))
    }

    /// Save the current player aggregate
    ///
    /// # Errors
    ///
    /// Returns an error if the player cannot be saved.
    pub fn save_player(&self, slot: &str, store: &PlayerStore) -> Result<(), S::Error> {
        self.storage.save_player(slot, &store.snapshot())
    }

    /// Load a player aggregate, re-establishing its invariants
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be read.
    pub fn load_player(&self, slot: &str) -> Result<Option<PlayerState>, anyhow::Error>
    where
        S::Error: Into<anyhow::Error>,
    {
        let Some(mut player) = self.storage.load_player(slot).map_err(Into::into)? else {
            return Ok(None);
        };
        player.enforce_invariants();
        Ok(Some(player))
    }

    /// Delete a save slot
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be deleted.
    pub fn delete_player(&self, slot: &str) -> Result<(), S::Error> {
        self.storage.delete_save(slot)
    }
}
