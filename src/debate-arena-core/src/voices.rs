//! Voice catalog entries and persona voice selection.

use serde::{Deserialize, Serialize};

use crate::persona::{Identity, Speaker, display_name};

/// A voice offered by the generation service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Voice {
    pub voice_id: String,
    pub name: String,
}

impl Voice {
    pub fn display_name(&self) -> String {
        display_name(&self.name)
    }
}

/// Initial voice picks for both personas.
///
/// Two or more voices: the first two. One voice: both personas get it, which
/// validation then rejects until the user picks differently. No voices: nothing.
pub fn default_selection(voices: &[Voice]) -> (Option<String>, Option<String>) {
    match voices {
        [] => (None, None),
        [only] => (Some(only.voice_id.clone()), Some(only.voice_id.clone())),
        [first, second, ..] => (Some(first.voice_id.clone()), Some(second.voice_id.clone())),
    }
}

/// Name of the voice with `voice_id`, or the speaker's default label.
pub fn persona_name(voices: &[Voice], voice_id: &str, speaker: Speaker) -> String {
    voices
        .iter()
        .find(|v| v.voice_id == voice_id)
        .map(|v| v.name.clone())
        .unwrap_or_else(|| speaker.default_label().to_string())
}

/// Build the identity for `speaker` from a catalog voice id.
///
/// An empty id stays empty so validation reports the missing persona.
pub fn identity_for(voices: &[Voice], voice_id: Option<&str>, speaker: Speaker) -> Identity {
    match voice_id {
        Some(id) => Identity::voice(id, persona_name(voices, id, speaker)),
        None => Identity::voice("", speaker.default_label()),
    }
}
