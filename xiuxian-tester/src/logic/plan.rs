use serde::{Deserialize, Serialize};
use xiuxian_game::{AdventureRequest, PlayerState, Realm, RiskLevel};

/// Starting character for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerPreset {
    Novice,
    Veteran,
    Swift,
    Wealthy,
}

impl PlayerPreset {
    #[must_use]
    pub fn build(self) -> PlayerState {
        let base = PlayerState::new("Tester");
        match self {
            Self::Novice => base,
            Self::Veteran => PlayerState {
                realm: Realm::FoundationEstablishment,
                realm_level: 3,
                attack: 60,
                defense: 40,
                spirit_power: 40,
                physique: 40,
                max_hp: 400,
                hp: 400,
                speed: 30,
                ..base
            },
            Self::Swift => PlayerState {
                attack: 40,
                defense: 30,
                max_hp: 300,
                hp: 300,
                speed: 400,
                ..base
            },
            Self::Wealthy => PlayerState {
                spirit_stones: 100_000,
                luck: 60,
                ..base
            },
        }
    }
}

const ZONE_NAME: &str = "Thousand Corpse Ravine";
const RISK_CYCLE: [RiskLevel; 4] = [
    RiskLevel::Low,
    RiskLevel::Medium,
    RiskLevel::High,
    RiskLevel::Extreme,
];

/// Which adventure the harness asks for at each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestMix {
    Excursions,
    SecretRealms(RiskLevel),
    /// Every third step enters a zone, cycling through the risk levels.
    Mixed,
}

impl RequestMix {
    #[must_use]
    pub fn request(self, step: usize) -> AdventureRequest {
        match self {
            Self::Excursions => AdventureRequest::excursion(),
            Self::SecretRealms(risk) => AdventureRequest::secret_realm(ZONE_NAME, risk),
            Self::Mixed if step % 3 == 2 => {
                AdventureRequest::secret_realm(ZONE_NAME, RISK_CYCLE[(step / 3) % RISK_CYCLE.len()])
            }
            Self::Mixed => AdventureRequest::excursion(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeMode {
    /// Offline template library only.
    Templates,
    /// A scripted generator that mixes valid, salvageable and junk payloads.
    Flaky,
}

/// Counters gathered over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCounts {
    pub completed: usize,
    pub battles: usize,
    pub handoffs: usize,
    pub shops: usize,
    pub purchases: usize,
    pub boss_gates: usize,
    pub misadventures: usize,
    pub chained: usize,
    pub falls: usize,
    pub generator_calls: usize,
    pub junk_replies: usize,
}

impl StepCounts {
    pub const fn absorb(&mut self, other: &Self) {
        self.completed += other.completed;
        self.battles += other.battles;
        self.handoffs += other.handoffs;
        self.shops += other.shops;
        self.purchases += other.purchases;
        self.boss_gates += other.boss_gates;
        self.misadventures += other.misadventures;
        self.chained += other.chained;
        self.falls += other.falls;
        self.generator_calls += other.generator_calls;
        self.junk_replies += other.junk_replies;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub seed: u64,
    pub steps: usize,
    pub counts: StepCounts,
    pub final_state: PlayerState,
    pub violations: Vec<String>,
}

pub type Expectation = fn(&RunSummary) -> Result<(), String>;

#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub preset: PlayerPreset,
    pub requests: RequestMix,
    pub narrative: NarrativeMode,
    pub steps: usize,
    /// Route battles through the hand-off surface instead of auto-resolving.
    pub interactive_battles: bool,
    pub accept_bosses: bool,
    pub buy_from_merchant: bool,
    /// Run each seed twice and compare the final state.
    pub check_determinism: bool,
    pub expectations: Vec<Expectation>,
}

impl SimulationPlan {
    #[must_use]
    pub fn new(preset: PlayerPreset, requests: RequestMix, steps: usize) -> Self {
        Self {
            preset,
            requests,
            narrative: NarrativeMode::Templates,
            steps,
            interactive_battles: false,
            accept_bosses: true,
            buy_from_merchant: false,
            check_determinism: false,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: Expectation) -> Self {
        self.expectations.push(expectation);
        self
    }
}
