//! A narrative generator that misbehaves on purpose.
use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use xiuxian_game::{
    AdventureOutcome, CollaboratorError, EncounterKind, GeneratorReply, NarrativeGenerator,
    PlayerState, RiskLevel,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Structured,
    Fenced,
    PlusSigned,
    Chatter,
    Garbage,
    Empty,
    Unavailable,
}

impl PayloadKind {
    const ALL: [Self; 7] = [
        Self::Structured,
        Self::Fenced,
        Self::PlusSigned,
        Self::Chatter,
        Self::Garbage,
        Self::Empty,
        Self::Unavailable,
    ];

    /// Replies the core must replace with a neutral outcome.
    #[must_use]
    pub const fn is_junk(self) -> bool {
        matches!(self, Self::Garbage | Self::Empty | Self::Unavailable)
    }
}

const OBJECT: &str = concat!(
    r#"{"story": "A wandering sword spirit tests your resolve.", "#,
    r#""expChange": 18, "spiritStonesChange": 6, "eventColor": "gain"}"#,
);
const PLUS_SIGNED: &str = concat!(
    r#"{"story": "Thunder tempers your bones.", "hpChange": -8, "#,
    r#""expChange": +22, "attributeReduction": {"speed": +2}}"#,
);

#[derive(Debug)]
pub struct FlakyNarrative {
    rng: Mutex<ChaCha20Rng>,
    served: Mutex<Vec<PayloadKind>>,
}

impl FlakyNarrative {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
            served: Mutex::new(Vec::new()),
        }
    }

    /// Kinds served so far, in call order.
    #[must_use]
    pub fn served(&self) -> Vec<PayloadKind> {
        self.served
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_kind(&self) -> PayloadKind {
        let index = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(0..PayloadKind::ALL.len());
        let kind = PayloadKind::ALL[index];
        self.served
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(kind);
        kind
    }
}

#[async_trait]
impl NarrativeGenerator for FlakyNarrative {
    async fn generate(
        &self,
        _player: &PlayerState,
        _kind: EncounterKind,
        _risk: Option<RiskLevel>,
    ) -> Result<GeneratorReply, CollaboratorError> {
        let reply = match self.next_kind() {
            PayloadKind::Structured => GeneratorReply::Structured(AdventureOutcome {
                story: String::from("A fox spirit leaves a pouch of stones at your feet."),
                spirit_stones_change: 12,
                ..AdventureOutcome::default()
            }),
            PayloadKind::Fenced => GeneratorReply::Raw(format!("```json\n{OBJECT}\n```")),
            PayloadKind::PlusSigned => GeneratorReply::Raw(PLUS_SIGNED.to_string()),
            PayloadKind::Chatter => GeneratorReply::Raw(format!(
                "Certainly! Here is the event:\n{OBJECT}\nMay the Dao guide you."
            )),
            PayloadKind::Garbage => {
                GeneratorReply::Raw(String::from("<html>502 Bad Gateway</html>"))
            }
            PayloadKind::Empty => GeneratorReply::Raw(String::new()),
            PayloadKind::Unavailable => {
                return Err(CollaboratorError::Unavailable(String::from("upstream timeout")));
            }
        };
        Ok(reply)
    }
}
