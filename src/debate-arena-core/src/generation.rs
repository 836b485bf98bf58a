//! Debate generation lifecycle.
//!
//! Validates the user's selections into a [`GenerationRequest`], submits it to a
//! [`DebateService`] and tracks progress in a [`GenerationState`] that observers
//! read through a `watch` channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info, warn};

use crate::clip_store::ClipStore;
use crate::error::{GenerationError, ValidationError};
use crate::persona::{Identity, Speaker};
use crate::service::DebateService;

/// Topics must be longer than this many characters once trimmed.
pub const MIN_TOPIC_CHARS: usize = 2;
pub const MIN_TURNS: u32 = 2;
pub const MAX_TURNS: u32 = 20;

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Raw selections, as entered by the user.
#[derive(Debug, Clone)]
pub struct GenerationInput {
    pub topic: String,
    pub persona_a: Identity,
    pub persona_b: Identity,
    pub turns: u32,
    pub humor_mode: Option<bool>,
}

/// Extra request fields passed through to the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    pub humor_mode: Option<bool>,
}

/// A request that passed validation. Only [`validate`] creates one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    topic: String,
    persona_a: Identity,
    persona_b: Identity,
    turns: u32,
    options: RequestOptions,
}

impl GenerationRequest {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn persona_a(&self) -> &Identity {
        &self.persona_a
    }

    pub fn persona_b(&self) -> &Identity {
        &self.persona_b
    }

    pub fn turns(&self) -> u32 {
        self.turns
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }
}

/// Check the selections and build a request from them.
pub fn validate(input: &GenerationInput) -> Result<GenerationRequest, ValidationError> {
    let topic = input.topic.trim();
    if topic.chars().count() <= MIN_TOPIC_CHARS {
        return Err(ValidationError::TopicTooShort {
            min: MIN_TOPIC_CHARS,
        });
    }

    if input.persona_a.is_empty() {
        return Err(ValidationError::MissingPersona(Speaker::PersonaA.tag()));
    }
    if input.persona_b.is_empty() {
        return Err(ValidationError::MissingPersona(Speaker::PersonaB.tag()));
    }
    if input.persona_a.key() == input.persona_b.key() {
        return Err(ValidationError::SamePersona);
    }

    if !(MIN_TURNS..=MAX_TURNS).contains(&input.turns) {
        return Err(ValidationError::TurnCountOutOfRange {
            min: MIN_TURNS,
            max: MAX_TURNS,
            actual: input.turns,
        });
    }

    Ok(GenerationRequest {
        topic: topic.to_string(),
        persona_a: input.persona_a.clone(),
        persona_b: input.persona_b.clone(),
        turns: input.turns,
        options: RequestOptions {
            humor_mode: input.humor_mode,
        },
    })
}

/// Coarse progress label for a request that has been waiting `elapsed_seconds`.
pub fn phase_label(elapsed_seconds: u64) -> &'static str {
    if elapsed_seconds < 3 {
        "generating script"
    } else if elapsed_seconds < 9 {
        "synthesizing audio"
    } else {
        "finalizing"
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GenerationPhase {
    #[default]
    Idle,
    InFlight,
    Succeeded,
    Failed,
}

/// Snapshot of the pipeline.
#[derive(Debug, Clone, Default)]
pub struct GenerationState {
    pub phase: GenerationPhase,
    pub elapsed_seconds: u64,
    pub result: Option<Arc<ClipStore>>,
    pub error_message: Option<String>,
    /// Token of the request this state belongs to (0 before any request).
    pub generation: u64,
}

impl GenerationState {
    /// Progress label while a request is in flight.
    pub fn phase_label(&self) -> Option<&'static str> {
        (self.phase == GenerationPhase::InFlight).then(|| phase_label(self.elapsed_seconds))
    }

    /// Whether a new request may be triggered.
    pub fn can_generate(&self) -> bool {
        self.phase != GenerationPhase::InFlight
    }
}

/// Drives generation requests against a service and owns their state.
pub struct GenerationPipeline<S> {
    service: S,
    state: Arc<watch::Sender<GenerationState>>,
    latest: AtomicU64,
}

impl<S: DebateService> GenerationPipeline<S> {
    pub fn new(service: S) -> Self {
        let (state, _) = watch::channel(GenerationState::default());
        Self {
            service,
            state: Arc::new(state),
            latest: AtomicU64::new(0),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Receive every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<GenerationState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> GenerationState {
        self.state.borrow().clone()
    }

    /// Validate `input` and generate from it. Validation failures return
    /// before anything is sent and leave the state untouched.
    pub async fn submit(&self, input: &GenerationInput) -> Result<Arc<ClipStore>, GenerationError> {
        let request = validate(input)?;
        self.generate(request).await
    }

    /// Run one generation request to completion.
    ///
    /// If another call starts before this one resolves, this call's result is
    /// discarded and [`GenerationError::Superseded`] is returned.
    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<Arc<ClipStore>, GenerationError> {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(GenerationState {
            phase: GenerationPhase::InFlight,
            elapsed_seconds: 0,
            result: None,
            error_message: None,
            generation,
        });
        debug!(generation, "Generation in flight");

        let in_flight = InFlight::begin(Arc::clone(&self.state), generation);

        let outcome = match self.service.generate(&request).await {
            Ok(response) => {
                ClipStore::from_response(response, request.persona_a(), request.persona_b())
                    .map(Arc::new)
            }
            Err(e) => Err(e),
        };

        in_flight.finish(outcome)
    }
}

/// One request's hold on the state while it is in flight.
///
/// Dropping it before [`InFlight::finish`] (the `generate` future was dropped)
/// stops the ticker and resolves the phase to `Failed`.
struct InFlight {
    state: Arc<watch::Sender<GenerationState>>,
    generation: u64,
    ticker: Option<ProgressTicker>,
}

impl InFlight {
    fn begin(state: Arc<watch::Sender<GenerationState>>, generation: u64) -> Self {
        let ticker = ProgressTicker::start(Arc::clone(&state), generation);
        Self {
            state,
            generation,
            ticker: Some(ticker),
        }
    }

    fn finish(
        mut self,
        outcome: Result<Arc<ClipStore>, GenerationError>,
    ) -> Result<Arc<ClipStore>, GenerationError> {
        self.ticker.take();

        let generation = self.generation;
        let committed = self.state.send_if_modified(|state| {
            if state.generation != generation || state.phase != GenerationPhase::InFlight {
                return false;
            }
            match &outcome {
                Ok(store) => {
                    state.phase = GenerationPhase::Succeeded;
                    state.result = Some(Arc::clone(store));
                }
                Err(e) => {
                    state.phase = GenerationPhase::Failed;
                    state.error_message = Some(e.user_message());
                }
            }
            true
        });

        if !committed {
            debug!(generation, "Discarding result of superseded generation");
            return Err(GenerationError::Superseded);
        }

        match &outcome {
            Ok(store) => info!(generation, turns = store.len(), "Debate generated"),
            Err(e) => warn!(generation, error = %e, "Debate generation failed"),
        }
        outcome
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.ticker.take().is_none() {
            return;
        }

        let generation = self.generation;
        let cancelled = self.state.send_if_modified(|state| {
            if state.generation != generation || state.phase != GenerationPhase::InFlight {
                return false;
            }
            state.phase = GenerationPhase::Failed;
            state.error_message = Some(GenerationError::Cancelled.user_message());
            true
        });
        if cancelled {
            warn!(generation, "Generation cancelled while in flight");
        }
    }
}

/// Once-a-second elapsed counter for one generation. Aborted on drop.
struct ProgressTicker {
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    fn start(state: Arc<watch::Sender<GenerationState>>, generation: u64) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            loop {
                interval.tick().await;
                let mut live = true;
                state.send_if_modified(|s| {
                    if s.generation == generation && s.phase == GenerationPhase::InFlight {
                        s.elapsed_seconds += 1;
                        true
                    } else {
                        live = false;
                        false
                    }
                });
                if !live {
                    break;
                }
            }
        });
        Self { handle }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
