//! Generated debates and their audio clips.
//!
//! A [`ClipStore`] is built once from the generation service's response and is
//! never mutated afterwards.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, PlaybackError};
use crate::persona::{Identity, Speaker};

/// Audio encodings the playback output can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    /// Resolve a MIME type such as `audio/mpeg` to a supported format.
    pub fn from_mime(mime: &str) -> Result<Self, PlaybackError> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "audio/mp3" | "audio/mpeg" => Ok(AudioFormat::Mp3),
            "audio/wav" | "audio/x-wav" | "audio/wave" => Ok(AudioFormat::Wav),
            other => Err(PlaybackError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Encoded audio for one turn, kept as delivered (base64 text).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioPayload {
    pub mime: String,
    pub base64: String,
}

impl AudioPayload {
    pub fn format(&self) -> Result<AudioFormat, PlaybackError> {
        AudioFormat::from_mime(&self.mime)
    }

    /// Embeddable source for this clip, e.g. `data:audio/mp3;base64,...`.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.base64)
    }

    /// Decode the payload to raw encoded audio bytes.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.base64.trim())
    }
}

/// One unit of debate content: a speaker, their words and the narrated clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub index: usize,
    pub speaker: Speaker,
    pub display_label: String,
    pub text: String,
    pub audio: AudioPayload,
}

/// The ordered, immutable turns of one generated debate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClipStore {
    topic: String,
    turns: Vec<Turn>,
}

impl ClipStore {
    /// Build a store from turns already in playback order.
    ///
    /// Indices are reassigned from 0 so they are always contiguous.
    pub fn new(topic: impl Into<String>, turns: Vec<Turn>) -> Result<Self, GenerationError> {
        if turns.is_empty() {
            return Err(GenerationError::EmptyDebate);
        }

        let turns = turns
            .into_iter()
            .enumerate()
            .map(|(index, turn)| Turn { index, ..turn })
            .collect();

        Ok(Self {
            topic: topic.into(),
            turns,
        })
    }

    /// Map a service response onto the store, labelling speakers from the
    /// identities the request was made with.
    pub fn from_response(
        response: DebateResponse,
        persona_a: &Identity,
        persona_b: &Identity,
    ) -> Result<Self, GenerationError> {
        if response.turns.is_empty() {
            return Err(GenerationError::EmptyDebate);
        }

        let mut turns = Vec::with_capacity(response.turns.len());
        for (position, wire) in response.turns.into_iter().enumerate() {
            if let Some(turn_index) = wire.turn_index {
                if turn_index != position {
                    return Err(GenerationError::MalformedResponse(format!(
                        "turn at position {} carries turn_index {}",
                        position, turn_index
                    )));
                }
            }

            let mime = match (wire.audio_mime_type, wire.audio_format) {
                (Some(mime), _) => mime,
                (None, Some(format)) => format!("audio/{}", format),
                (None, None) => {
                    return Err(GenerationError::MalformedResponse(format!(
                        "turn {} has no audio format",
                        position
                    )));
                }
            };

            let display_label = match wire.persona.filter(|p| !p.trim().is_empty()) {
                Some(persona) => persona,
                None => match wire.speaker {
                    Speaker::PersonaA => persona_a.display_label(),
                    Speaker::PersonaB => persona_b.display_label(),
                },
            };

            turns.push(Turn {
                index: position,
                speaker: wire.speaker,
                display_label,
                text: wire.text,
                audio: AudioPayload {
                    mime,
                    base64: wire.audio_base64,
                },
            });
        }

        Ok(Self {
            topic: response.topic,
            turns,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn get(&self, index: usize) -> Option<&Turn> {
        self.turns.get(index)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Response body of the generation service.
#[derive(Debug, Clone, Deserialize)]
pub struct DebateResponse {
    pub topic: String,
    pub turns: Vec<WireTurn>,
}

/// A turn as sent by the generation service.
///
/// Services either send `audio_format` (`"mp3"`) or a full `audio_mime_type`
/// (`"audio/wav"`); some also send the turn index and resolved persona label.
#[derive(Debug, Clone, Deserialize)]
pub struct WireTurn {
    pub speaker: Speaker,
    pub text: String,
    pub audio_base64: String,
    #[serde(default)]
    pub audio_format: Option<String>,
    #[serde(default)]
    pub audio_mime_type: Option<String>,
    #[serde(default)]
    pub turn_index: Option<usize>,
    #[serde(default)]
    pub persona: Option<String>,
}
