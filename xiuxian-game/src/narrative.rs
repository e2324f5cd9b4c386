//! Decoding and salvage of narrative generator replies.
//!
//! Generators wrap JSON in markdown fences, prepend chatter, and write
//! `"hpChange": +10`. The decoder repairs what it can; anything still
//! undecodable is treated exactly like a transport failure.
use regex::Regex;
use std::sync::OnceLock;

use crate::collaborators::GeneratorReply;
use crate::error::CollaboratorError;
use crate::outcome::AdventureOutcome;

const NEUTRAL_STORY: &str =
    "The mists thicken and the path fades. You return without incident, mind a little clearer.";

fn plus_sign_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"("\s*:\s*)\+(\d)"#).ok())
        .as_ref()
}

/// Remove a surrounding markdown code fence, with or without a language tag.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// The outermost `{…}` span, if any.
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn remove_plus_signs(text: &str) -> String {
    match plus_sign_pattern() {
        Some(pattern) => pattern.replace_all(text, "${1}${2}").into_owned(),
        None => text.to_string(),
    }
}

/// Decode raw generator text into an outcome.
///
/// # Errors
///
/// Returns [`CollaboratorError::Empty`] for blank input and
/// [`CollaboratorError::Malformed`] when no object can be salvaged.
pub fn decode_outcome(raw: &str) -> Result<AdventureOutcome, CollaboratorError> {
    if raw.trim().is_empty() {
        return Err(CollaboratorError::Empty);
    }
    let unfenced = strip_fences(raw);
    if let Ok(outcome) = serde_json::from_str::<AdventureOutcome>(unfenced) {
        return Ok(outcome);
    }
    let object = outermost_object(unfenced)
        .ok_or_else(|| CollaboratorError::Malformed(String::from("no JSON object found")))?;
    serde_json::from_str::<AdventureOutcome>(&remove_plus_signs(object))
        .map_err(|err| CollaboratorError::Malformed(err.to_string()))
}

/// Zero-impact outcome used when the generator cannot be relied on.
#[must_use]
pub fn neutral_outcome() -> AdventureOutcome {
    AdventureOutcome::neutral(NEUTRAL_STORY)
}

/// Turn a generator result into an outcome, degrading to neutral on any failure.
#[must_use]
pub fn resolve_reply(reply: Result<GeneratorReply, CollaboratorError>) -> AdventureOutcome {
    let decoded = reply.and_then(|reply| match reply {
        GeneratorReply::Structured(outcome) => Ok(outcome),
        GeneratorReply::Raw(raw) => decode_outcome(&raw),
    });
    match decoded {
        Ok(outcome) if outcome.story.trim().is_empty() && !outcome.has_loot() => {
            log::warn!("Narrative generator returned an empty story; using neutral outcome");
            neutral_outcome()
        }
        Ok(outcome) => outcome,
        Err(err) => {
            log::warn!("Narrative generator fallback: {err}");
            neutral_outcome()
        }
    }
}
