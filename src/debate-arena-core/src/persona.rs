//! Debate personas.
//!
//! Represents the two sides of a debate and the identities chosen for them.

use serde::{Deserialize, Serialize};

/// Which side of the debate is speaking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The first persona, opening the debate.
    PersonaA,
    /// The second persona.
    PersonaB,
}

impl Speaker {
    /// Short tag used in logs and validation messages.
    pub fn tag(&self) -> char {
        match self {
            Speaker::PersonaA => 'A',
            Speaker::PersonaB => 'B',
        }
    }

    pub fn default_label(&self) -> &'static str {
        match self {
            Speaker::PersonaA => "Persona A",
            Speaker::PersonaB => "Persona B",
        }
    }
}

/// The identity selected for one persona.
///
/// Either a free-text persona label, or a voice from the catalog together with
/// the voice's name as its label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    /// Label sent as `persona_a` / `persona_b`.
    pub label: String,
    /// Catalog voice id, when the persona was picked by voice.
    pub voice_id: Option<String>,
}

impl Identity {
    /// A fixed persona given by its label.
    pub fn persona(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            voice_id: None,
        }
    }

    /// A persona picked from the voice catalog.
    pub fn voice(voice_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            label: name.into(),
            voice_id: Some(voice_id.into()),
        }
    }

    /// The value that distinguishes two identities: the voice id when present,
    /// otherwise the label.
    pub fn key(&self) -> &str {
        match &self.voice_id {
            Some(id) => id.trim(),
            None => self.label.trim(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.key().is_empty()
    }

    /// Label shown next to a subtitle.
    pub fn display_label(&self) -> String {
        display_name(&self.label)
    }
}

/// Shorten a catalog voice name such as `"Rachel - calm narrator"` to `"Rachel"`.
pub fn display_name(name: &str) -> String {
    name.split(" - ").next().unwrap_or(name).trim().to_string()
}
