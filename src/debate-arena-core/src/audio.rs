//! Speaker output for debate clips, backed by rodio.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::clip_store::Turn;
use crate::error::PlaybackError;
use crate::playback::{AudioOutput, ClipTicket, PlaybackEvent};

/// How often the sink is checked for the end of the current clip.
const END_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// No clip is current.
const NO_TICKET: u64 = 0;

/// Plays clips on the default output device.
///
/// Must be used from within a tokio runtime: each started clip gets a small
/// task that reports [`PlaybackEvent::Finished`] once the sink drains.
pub struct RodioOutput {
    _stream: OutputStream,
    sink: Arc<Sink>,
    current: Arc<AtomicU64>,
    events: UnboundedSender<PlaybackEvent>,
}

impl RodioOutput {
    /// Open the default output device.
    pub fn open(events: UnboundedSender<PlaybackEvent>) -> Result<Self, PlaybackError> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| PlaybackError::Output(e.to_string()))?;
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());

        Ok(Self {
            _stream: stream,
            sink: Arc::new(sink),
            current: Arc::new(AtomicU64::new(NO_TICKET)),
            events,
        })
    }

    fn watch_for_end(&self, ticket: ClipTicket) {
        let sink = Arc::clone(&self.sink);
        let current = Arc::clone(&self.current);
        let events = self.events.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(END_POLL_INTERVAL);
            loop {
                interval.tick().await;
                if current.load(Ordering::SeqCst) != ticket.value() {
                    return;
                }
                if sink.empty() {
                    debug!(ticket = ticket.value(), "Clip reached its end");
                    let _ = events.send(PlaybackEvent::Finished(ticket));
                    return;
                }
            }
        });
    }
}

impl AudioOutput for RodioOutput {
    fn start(&mut self, turn: &Turn, ticket: ClipTicket) -> Result<(), PlaybackError> {
        self.halt();

        turn.audio.format()?;
        let bytes = turn
            .audio
            .decode()
            .map_err(|e| PlaybackError::InvalidPayload {
                index: turn.index,
                reason: e.to_string(),
            })?;
        let source = Decoder::new(Cursor::new(bytes)).map_err(|e| PlaybackError::Decode {
            index: turn.index,
            reason: e.to_string(),
        })?;

        self.current.store(ticket.value(), Ordering::SeqCst);
        self.sink.append(source);
        self.sink.play();
        self.watch_for_end(ticket);
        Ok(())
    }

    fn halt(&mut self) {
        self.current.store(NO_TICKET, Ordering::SeqCst);
        self.sink.clear();
    }
}
