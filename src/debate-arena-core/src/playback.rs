//! Sequential playback of a generated debate.
//!
//! The [`PlaybackScheduler`] owns the audio output and walks a [`ClipStore`] in
//! index order. Every clip it starts gets a fresh [`ClipTicket`]; the output
//! reports back with [`PlaybackEvent`]s carrying that ticket, and events for any
//! other ticket are ignored. This keeps a late "ended" from a stopped clip from
//! advancing playback.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::clip_store::{ClipStore, Turn};
use crate::error::PlaybackError;
use crate::persona::Speaker;

/// Shown when nothing is playing.
pub const IDLE_SUBTITLE: &str = "Press Play to start debate narration.";

/// Identifies one started clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipTicket(u64);

impl ClipTicket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// What the audio output reports about a clip it was asked to play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The clip played to its natural end.
    Finished(ClipTicket),
    /// The clip could not continue playing.
    Failed { ticket: ClipTicket, reason: String },
}

/// A single-stream audio device.
pub trait AudioOutput {
    /// Halt whatever is playing and start `turn`'s clip. Completion must be
    /// reported as a [`PlaybackEvent`] carrying `ticket`.
    fn start(&mut self, turn: &Turn, ticket: ClipTicket) -> Result<(), PlaybackError>;

    /// Pause, rewind and detach the current clip. Its events must no longer be
    /// delivered, or must be ignorable by ticket.
    fn halt(&mut self);
}

/// Readable playback state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub active_index: Option<usize>,
    pub is_playing: bool,
}

/// Notifications for whoever displays the debate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackUpdate {
    /// A turn's clip started.
    TurnStarted {
        index: usize,
        speaker: Speaker,
        label: String,
        text: String,
    },
    /// The last turn finished.
    Completed,
    /// Playback was stopped before the end.
    Stopped,
    /// A turn could not be played.
    Failed { index: usize, error: PlaybackError },
}

pub type PlaybackCallback = Box<dyn Fn(PlaybackUpdate) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Stopped,
    Playing { index: usize, ticket: ClipTicket },
}

/// Plays the turns of one [`ClipStore`] back to back.
pub struct PlaybackScheduler<O> {
    output: O,
    store: Option<Arc<ClipStore>>,
    mode: Mode,
    next_ticket: u64,
    callback: Option<PlaybackCallback>,
}

impl<O: AudioOutput> PlaybackScheduler<O> {
    pub fn new(output: O) -> Self {
        Self {
            output,
            store: None,
            mode: Mode::Stopped,
            next_ticket: 0,
            callback: None,
        }
    }

    /// Set a callback for playback updates.
    pub fn with_callback(mut self, callback: PlaybackCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn store(&self) -> Option<&Arc<ClipStore>> {
        self.store.as_ref()
    }

    pub fn state(&self) -> PlaybackState {
        match self.mode {
            Mode::Stopped => PlaybackState::default(),
            Mode::Playing { index, .. } => PlaybackState {
                active_index: Some(index),
                is_playing: true,
            },
        }
    }

    pub fn active_turn(&self) -> Option<&Turn> {
        let index = self.state().active_index?;
        self.store.as_ref()?.get(index)
    }

    /// Subtitle for the current state.
    pub fn subtitle(&self) -> &str {
        self.active_turn()
            .map(|turn| turn.text.as_str())
            .unwrap_or(IDLE_SUBTITLE)
    }

    /// Install a newly generated debate, stopping playback of the old one first.
    pub fn replace_store(&mut self, store: Arc<ClipStore>) {
        self.stop();
        debug!(turns = store.len(), "Installed new clip store");
        self.store = Some(store);
    }

    /// Stop playback. Pending completion events of the stopped clip are ignored.
    pub fn stop(&mut self) {
        let was_playing = matches!(self.mode, Mode::Playing { .. });
        self.halt();
        if was_playing {
            info!("Playback stopped");
            self.emit(PlaybackUpdate::Stopped);
        }
    }

    /// Play turns from `index` onwards.
    ///
    /// Any clip already playing is stopped first. Starting past the last turn,
    /// or with no store installed, leaves playback stopped.
    pub fn play_from(&mut self, index: usize) -> Result<(), PlaybackError> {
        self.halt();

        let Some(store) = self.store.clone() else {
            return Ok(());
        };
        let Some(turn) = store.get(index) else {
            debug!(index, "Reached end of debate");
            self.emit(PlaybackUpdate::Completed);
            return Ok(());
        };

        self.next_ticket += 1;
        let ticket = ClipTicket(self.next_ticket);

        if let Err(error) = self.output.start(turn, ticket) {
            warn!(index, error = %error, "Could not start clip");
            self.halt();
            self.emit(PlaybackUpdate::Failed {
                index,
                error: error.clone(),
            });
            return Err(error);
        }

        self.mode = Mode::Playing { index, ticket };
        debug!(index, ticket = ticket.value(), "Playing turn");
        self.emit(PlaybackUpdate::TurnStarted {
            index,
            speaker: turn.speaker,
            label: turn.display_label.clone(),
            text: self.subtitle().to_string(),
        });
        Ok(())
    }

    /// Apply an event reported by the output.
    ///
    /// Events for clips that are no longer current are ignored.
    pub fn handle_event(&mut self, event: PlaybackEvent) -> Result<(), PlaybackError> {
        let Mode::Playing { index, ticket } = self.mode else {
            debug!(?event, "Ignoring playback event while stopped");
            return Ok(());
        };

        match event {
            PlaybackEvent::Finished(finished) if finished == ticket => self.play_from(index + 1),
            PlaybackEvent::Failed {
                ticket: failed,
                reason,
            } if failed == ticket => {
                let error = PlaybackError::Interrupted { index, reason };
                warn!(index, error = %error, "Clip failed during playback");
                self.halt();
                self.emit(PlaybackUpdate::Failed {
                    index,
                    error: error.clone(),
                });
                Err(error)
            }
            stale => {
                debug!(?stale, "Ignoring event for stale clip");
                Ok(())
            }
        }
    }

    /// Feed events into the scheduler until playback stops.
    pub async fn run(
        &mut self,
        events: &mut UnboundedReceiver<PlaybackEvent>,
    ) -> Result<(), PlaybackError> {
        while self.state().is_playing {
            match events.recv().await {
                Some(event) => self.handle_event(event)?,
                None => {
                    self.stop();
                    return Err(PlaybackError::Output(
                        "audio output closed its event channel".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn halt(&mut self) {
        self.output.halt();
        self.mode = Mode::Stopped;
    }

    fn emit(&self, update: PlaybackUpdate) {
        if let Some(ref callback) = self.callback {
            callback(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip_store::AudioPayload;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Start(usize, ClipTicket),
        Halt,
    }

    #[derive(Default)]
    struct RecordingOutput {
        calls: Vec<Call>,
        fail_on: Option<usize>,
    }

    impl RecordingOutput {
        fn started(&self) -> Vec<usize> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Start(index, _) => Some(*index),
                    Call::Halt => None,
                })
                .collect()
        }

        fn last_ticket(&self) -> ClipTicket {
            self.calls
                .iter()
                .rev()
                .find_map(|c| match c {
                    Call::Start(_, ticket) => Some(*ticket),
                    Call::Halt => None,
                })
                .unwrap()
        }
    }

    impl AudioOutput for RecordingOutput {
        fn start(&mut self, turn: &Turn, ticket: ClipTicket) -> Result<(), PlaybackError> {
            if self.fail_on == Some(turn.index) {
                return Err(PlaybackError::Decode {
                    index: turn.index,
                    reason: "corrupt frame".to_string(),
                });
            }
            self.calls.push(Call::Start(turn.index, ticket));
            Ok(())
        }

        fn halt(&mut self) {
            self.calls.push(Call::Halt);
        }
    }

    fn store(turns: usize) -> Arc<ClipStore> {
        let turns = (0..turns)
            .map(|i| Turn {
                index: i,
                speaker: if i % 2 == 0 {
                    Speaker::PersonaA
                } else {
                    Speaker::PersonaB
                },
                display_label: (if i % 2 == 0 { "A" } else { "B" }).to_string(),
                text: format!("line {}", i),
                audio: AudioPayload {
                    mime: "audio/mp3".to_string(),
                    base64: "AAAA".to_string(),
                },
            })
            .collect();
        Arc::new(ClipStore::new("Topic", turns).unwrap())
    }

    fn finish_current(scheduler: &mut PlaybackScheduler<RecordingOutput>) {
        let ticket = scheduler.output().last_ticket();
        scheduler
            .handle_event(PlaybackEvent::Finished(ticket))
            .unwrap();
    }

    #[test]
    fn test_auto_advances_in_order_then_stops() {
        let mut scheduler = PlaybackScheduler::new(RecordingOutput::default());
        scheduler.replace_store(store(4));
        scheduler.play_from(0).unwrap();

        let mut seen = Vec::new();
        while let Some(index) = scheduler.state().active_index {
            seen.push(index);
            finish_current(&mut scheduler);
        }

        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(scheduler.state(), PlaybackState::default());
        assert_eq!(scheduler.output().started(), vec![0, 1, 2, 3]);
        assert_eq!(scheduler.subtitle(), IDLE_SUBTITLE);
    }

    #[test]
    fn test_stop_ignores_late_completion() {
        let mut scheduler = PlaybackScheduler::new(RecordingOutput::default());
        scheduler.replace_store(store(3));
        scheduler.play_from(0).unwrap();
        finish_current(&mut scheduler);
        let ticket = scheduler.output().last_ticket();

        scheduler.stop();
        assert_eq!(scheduler.state().active_index, None);

        scheduler
            .handle_event(PlaybackEvent::Finished(ticket))
            .unwrap();
        assert_eq!(scheduler.state().active_index, None);
        assert_eq!(scheduler.output().started(), vec![0, 1]);
    }

    #[test]
    fn test_restart_discards_previous_clip_events() {
        let mut scheduler = PlaybackScheduler::new(RecordingOutput::default());
        scheduler.replace_store(store(3));
        scheduler.play_from(1).unwrap();
        let old = scheduler.output().last_ticket();

        scheduler.play_from(0).unwrap();
        scheduler.handle_event(PlaybackEvent::Finished(old)).unwrap();
        assert_eq!(scheduler.state().active_index, Some(0));

        finish_current(&mut scheduler);
        assert_eq!(scheduler.state().active_index, Some(1));
        assert_eq!(scheduler.subtitle(), "line 1");
    }

    #[test]
    fn test_duplicate_completion_advances_once() {
        let mut scheduler = PlaybackScheduler::new(RecordingOutput::default());
        scheduler.replace_store(store(3));
        scheduler.play_from(0).unwrap();
        let first = scheduler.output().last_ticket();

        scheduler.handle_event(PlaybackEvent::Finished(first)).unwrap();
        scheduler.handle_event(PlaybackEvent::Finished(first)).unwrap();

        assert_eq!(scheduler.state().active_index, Some(1));
    }

    #[test]
    fn test_play_past_end_or_without_store_is_stopped() {
        let mut scheduler = PlaybackScheduler::new(RecordingOutput::default());
        scheduler.play_from(0).unwrap();
        assert_eq!(scheduler.state(), PlaybackState::default());

        scheduler.replace_store(store(2));
        scheduler.play_from(5).unwrap();
        assert_eq!(scheduler.state(), PlaybackState::default());
        assert!(scheduler.output().started().is_empty());
    }

    #[test]
    fn test_start_failure_stops_without_advancing() {
        let output = RecordingOutput {
            fail_on: Some(1),
            ..Default::default()
        };
        let mut scheduler = PlaybackScheduler::new(output);
        scheduler.replace_store(store(3));
        scheduler.play_from(0).unwrap();

        let ticket = scheduler.output().last_ticket();
        let result = scheduler.handle_event(PlaybackEvent::Finished(ticket));

        assert!(matches!(result, Err(PlaybackError::Decode { index: 1, .. })));
        assert_eq!(scheduler.state(), PlaybackState::default());
        assert_eq!(scheduler.output().started(), vec![0]);
    }

    #[test]
    fn test_error_event_stops_playback() {
        let mut scheduler = PlaybackScheduler::new(RecordingOutput::default());
        scheduler.replace_store(store(3));
        scheduler.play_from(0).unwrap();
        let ticket = scheduler.output().last_ticket();

        let result = scheduler.handle_event(PlaybackEvent::Failed {
            ticket,
            reason: "device lost".to_string(),
        });

        assert_eq!(
            result,
            Err(PlaybackError::Interrupted {
                index: 0,
                reason: "device lost".to_string()
            })
        );
        assert_eq!(scheduler.state().active_index, None);
        assert_eq!(scheduler.output().started(), vec![0]);
    }

    #[test]
    fn test_replace_store_stops_before_install() {
        let mut scheduler = PlaybackScheduler::new(RecordingOutput::default());
        scheduler.replace_store(store(4));
        scheduler.play_from(0).unwrap();
        finish_current(&mut scheduler);
        finish_current(&mut scheduler);
        assert_eq!(scheduler.state().active_index, Some(2));
        let stale = scheduler.output().last_ticket();

        scheduler.replace_store(store(2));
        assert_eq!(scheduler.state(), PlaybackState::default());
        assert_eq!(scheduler.output().calls.last(), Some(&Call::Halt));

        scheduler.handle_event(PlaybackEvent::Finished(stale)).unwrap();
        assert_eq!(scheduler.state().active_index, None);

        scheduler.play_from(0).unwrap();
        assert_eq!(scheduler.state().active_index, Some(0));
        assert_eq!(scheduler.store().map(|s| s.len()), Some(2));
    }

    #[test]
    fn test_callback_receives_updates() {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&updates);
        let mut scheduler = PlaybackScheduler::new(RecordingOutput::default())
            .with_callback(Box::new(move |u| sink.lock().unwrap().push(u)));
        scheduler.replace_store(store(1));

        scheduler.play_from(0).unwrap();
        finish_current(&mut scheduler);

        let updates = updates.lock().unwrap();
        assert_eq!(updates.len(), 2);
        assert!(matches!(
            &updates[0],
            PlaybackUpdate::TurnStarted { index: 0, speaker: Speaker::PersonaA, text, .. }
                if text == "line 0"
        ));
        assert_eq!(updates[1], PlaybackUpdate::Completed);
    }

    #[tokio::test]
    async fn test_run_drains_events_until_stopped() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut scheduler = PlaybackScheduler::new(RecordingOutput::default());
        scheduler.replace_store(store(2));
        scheduler.play_from(0).unwrap();

        tx.send(PlaybackEvent::Finished(ClipTicket(1))).unwrap();
        tx.send(PlaybackEvent::Finished(ClipTicket(2))).unwrap();

        scheduler.run(&mut rx).await.unwrap();
        assert_eq!(scheduler.output().started(), vec![0, 1]);
        assert_eq!(scheduler.state(), PlaybackState::default());
    }
}
