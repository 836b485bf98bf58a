//! Error types for the debate arena.

use thiserror::Error;

/// Why a set of selections could not become a generation request.
///
/// These never leave the client: no request is sent when validation fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Topic must be longer than {min} characters")]
    TopicTooShort { min: usize },

    #[error("Persona {0} has no identity selected")]
    MissingPersona(char),

    #[error("Choose two different personas for the debate")]
    SamePersona,

    #[error("Invalid turn count: expected {min}-{max}, got {actual}")]
    TurnCountOutOfRange { min: u32, max: u32, actual: u32 },
}

/// Failures of a generation request, from submission to the parsed clip store.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The service answered with a non-success status.
    #[error("{status}: {body}")]
    Transport { status: u16, body: String },

    /// The service could not be reached at all.
    #[error("Service unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Service returned a debate with no turns")]
    EmptyDebate,

    /// A newer request was submitted before this one resolved.
    #[error("Generation superseded by a newer request")]
    Superseded,

    #[error("Generation cancelled")]
    Cancelled,
}

impl GenerationError {
    /// Message recorded in the generation state and shown to the user.
    pub fn user_message(&self) -> String {
        format!("Unable to generate debate: {}", self)
    }
}

/// Failures of the audio output while playing a turn.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("Unsupported audio format '{0}'")]
    UnsupportedFormat(String),

    #[error("Turn {index}: audio payload is not valid base64: {reason}")]
    InvalidPayload { index: usize, reason: String },

    #[error("Turn {index}: could not decode audio: {reason}")]
    Decode { index: usize, reason: String },

    #[error("Turn {index}: playback failed: {reason}")]
    Interrupted { index: usize, reason: String },

    #[error("Audio output unavailable: {0}")]
    Output(String),
}

/// Failures while loading the voice catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Voices request failed with {status}")]
    Status { status: u16 },

    #[error("Voices request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Top-level error for the arena.
#[derive(Error, Debug)]
pub enum ArenaError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{}", .0.user_message())]
    Generation(#[from] GenerationError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Unable to load voices: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_message_is_shared_with_arena_error() {
        let error = GenerationError::Transport {
            status: 500,
            body: "service unavailable".to_string(),
        };
        let message = error.user_message();
        assert_eq!(message, "Unable to generate debate: 500: service unavailable");
        assert_eq!(ArenaError::from(error).to_string(), message);
    }

    #[test]
    fn test_arena_error_prefixes() {
        let playback = ArenaError::from(PlaybackError::Output("no device".to_string()));
        assert_eq!(playback.to_string(), "Playback error: Audio output unavailable: no device");

        let catalog = ArenaError::from(CatalogError::Status { status: 502 });
        assert_eq!(catalog.to_string(), "Unable to load voices: Voices request failed with 502");

        let validation = ArenaError::from(ValidationError::SamePersona);
        assert_eq!(validation.to_string(), "Choose two different personas for the debate");
    }
}
