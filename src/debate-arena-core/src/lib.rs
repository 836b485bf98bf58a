//! Debate Arena Core Library
//!
//! Generates scripted audio debates through a remote service and plays their
//! turns back to back.

pub mod audio;
pub mod clip_store;
pub mod config;
pub mod error;
pub mod generation;
pub mod persona;
pub mod playback;
pub mod service;
pub mod voices;

pub use audio::RodioOutput;
pub use clip_store::{AudioFormat, AudioPayload, ClipStore, DebateResponse, Turn, WireTurn};
pub use config::{Config, default_config};
pub use error::{ArenaError, CatalogError, GenerationError, PlaybackError, ValidationError};
pub use generation::{
    GenerationInput, GenerationPhase, GenerationPipeline, GenerationRequest, GenerationState,
    phase_label, validate,
};
pub use persona::{Identity, Speaker};
pub use playback::{
    AudioOutput, ClipTicket, PlaybackEvent, PlaybackScheduler, PlaybackState, PlaybackUpdate,
};
pub use service::{DebateService, HttpDebateService};
pub use voices::Voice;
