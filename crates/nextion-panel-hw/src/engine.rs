//! Receive engine: frame assembly, classification and dispatch.
//!
//! The engine owns all receive-side state and is driven one byte at a time
//! through [`ReceiveEngine::feed_byte`]. It never allocates while feeding:
//! the frame buffer and the result buffer are fixed arrays, and replies are
//! handed to a waiting get request by value through a one-shot channel.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, oneshot};
use tracing::{debug, trace, warn};

use crate::protocol::{
    classify, ClassifiedEvent, DisplayEvent, FrameAssembler, ReturnCode, SystemEvent,
    MAX_FRAME_LEN, TERMINATOR,
};
use crate::registry::SharedRegistry;
use crate::{Error, Result};

/// Longest text a string reply can carry.
pub const TEXT_CAPACITY: usize = MAX_FRAME_LEN - TERMINATOR.len() - 1;

/// Text decoded from a string reply.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TextReply {
    bytes: [u8; TEXT_CAPACITY],
    len: usize,
}

impl TextReply {
    fn from_slice(text: &[u8]) -> Self {
        let len = text.len().min(TEXT_CAPACITY);
        let mut bytes = [0; TEXT_CAPACITY];
        bytes[..len].copy_from_slice(&text[..len]);
        Self { bytes, len }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_bytes()).ok()
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }
}

impl Default for TextReply {
    fn default() -> Self {
        Self {
            bytes: [0; TEXT_CAPACITY],
            len: 0,
        }
    }
}

impl AsRef<[u8]> for TextReply {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for TextReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextReply({:?})", self.to_string_lossy())
    }
}

/// Most recently decoded text and number replies.
///
/// Each reply overwrites the previous one, whoever asked for it.
#[derive(Debug, Default, Clone)]
pub struct ResultBuffer {
    text: TextReply,
    number: i32,
}

impl ResultBuffer {
    pub fn text(&self) -> &TextReply {
        &self.text
    }

    pub fn number(&self) -> i32 {
        self.number
    }
}

/// Counters kept by the engine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Frames classified.
    pub frames: u64,
    /// Frames dropped for outgrowing the receive buffer.
    pub overflows: u64,
    /// Frames whose length did not fit their opcode.
    pub malformed: u64,
    /// Touch events with no registered handler.
    pub unmatched_touches: u64,
    /// Replies that arrived with no get request waiting for them.
    pub unsolicited_replies: u64,
}

/// Where the reply to the outstanding get request goes.
#[derive(Debug)]
pub(crate) enum ReplySender {
    Text(oneshot::Sender<Result<TextReply>>),
    Number(oneshot::Sender<Result<i32>>),
}

impl ReplySender {
    fn fail(self, error: Error) {
        // The waiter may already be gone.
        let _ = match self {
            ReplySender::Text(tx) => tx.send(Err(error)).is_ok(),
            ReplySender::Number(tx) => tx.send(Err(error)).is_ok(),
        };
    }
}

/// A value a get request can wait for.
pub(crate) trait ReplyValue: Sized {
    const KIND: &'static str;

    fn sender(tx: oneshot::Sender<Result<Self>>) -> ReplySender;

    /// Takes the channel out of `sender` if it waits for this kind.
    fn claim(
        sender: ReplySender,
    ) -> std::result::Result<oneshot::Sender<Result<Self>>, ReplySender>;
}

impl ReplyValue for TextReply {
    const KIND: &'static str = "Text";

    fn sender(tx: oneshot::Sender<Result<Self>>) -> ReplySender {
        ReplySender::Text(tx)
    }

    fn claim(
        sender: ReplySender,
    ) -> std::result::Result<oneshot::Sender<Result<Self>>, ReplySender> {
        match sender {
            ReplySender::Text(tx) => Ok(tx),
            other => Err(other),
        }
    }
}

impl ReplyValue for i32 {
    const KIND: &'static str = "Number";

    fn sender(tx: oneshot::Sender<Result<Self>>) -> ReplySender {
        ReplySender::Number(tx)
    }

    fn claim(
        sender: ReplySender,
    ) -> std::result::Result<oneshot::Sender<Result<Self>>, ReplySender> {
        match sender {
            ReplySender::Number(tx) => Ok(tx),
            other => Err(other),
        }
    }
}

/// The single outstanding get request.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub(crate) token: u64,
    pub(crate) reply: ReplySender,
}

pub(crate) type RequestSlot = Arc<Mutex<Option<PendingRequest>>>;

pub(crate) fn lock_slot(slot: &Mutex<Option<PendingRequest>>) -> MutexGuard<'_, Option<PendingRequest>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Classified-frame side of the engine.
struct Dispatcher {
    registry: SharedRegistry,
    results: ResultBuffer,
    requests: RequestSlot,
    events: broadcast::Sender<DisplayEvent>,
    stats: EngineStats,
}

impl Dispatcher {
    fn handle(&mut self, frame: &[u8]) {
        self.stats.frames += 1;
        let event = classify(frame);
        debug!("Received frame {:02X?} -> {:?}", frame, event);

        match event {
            ClassifiedEvent::Touch(touch) => {
                let invoked = self.registry.read().dispatch(touch);
                if invoked == 0 {
                    self.stats.unmatched_touches += 1;
                    trace!(
                        "No handler for {} on page {} id {}",
                        touch.action,
                        touch.page,
                        touch.id
                    );
                }
                self.publish(DisplayEvent::Touch(touch));
            }
            ClassifiedEvent::Text(text) => {
                let text = TextReply::from_slice(text);
                self.results.text = text;
                self.complete(Ok(text));
            }
            ClassifiedEvent::Number(value) => {
                self.results.number = value;
                self.complete(Ok(value));
            }
            ClassifiedEvent::System(system) => {
                if let SystemEvent::Error(code) = system {
                    self.reject(code);
                }
                self.publish(DisplayEvent::System(system));
            }
            ClassifiedEvent::Malformed { opcode, len } => {
                self.stats.malformed += 1;
                warn!(
                    "Frame 0x{:02X} has unexpected length {}; possible embedded terminator",
                    opcode, len
                );
                if ReturnCode::from_byte(opcode) == Some(ReturnCode::NumberReturn) {
                    self.complete::<i32>(Err(Error::AmbiguousFrame { opcode, len }));
                }
            }
            ClassifiedEvent::Unclassified(opcode) => {
                debug!("Unclassified opcode 0x{:02X}", opcode);
                self.publish(DisplayEvent::Unclassified(opcode));
            }
        }
    }

    /// Hands `outcome` to the outstanding request if it waits for a `V`.
    fn complete<V: ReplyValue>(&mut self, outcome: Result<V>) {
        let mut slot = lock_slot(&self.requests);
        let unclaimed = match slot.take() {
            Some(PendingRequest { token, reply }) => match V::claim(reply) {
                Ok(tx) => {
                    if tx.send(outcome).is_err() {
                        debug!("Get request {} abandoned before its reply", token);
                    }
                    return;
                }
                Err(reply) => Some(PendingRequest { token, reply }),
            },
            None => None,
        };
        *slot = unclaimed;
        if outcome.is_ok() {
            self.stats.unsolicited_replies += 1;
            debug!("{} reply with no matching request", V::KIND);
        }
    }

    fn reject(&mut self, code: ReturnCode) {
        match lock_slot(&self.requests).take() {
            Some(request) => {
                warn!("Get request {} rejected: {}", request.token, code);
                request.reply.fail(Error::Rejected(code));
            }
            None => warn!("Display reported {}", code),
        }
    }

    fn publish(&self, event: DisplayEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Receive-side protocol state machine.
pub struct ReceiveEngine {
    assembler: FrameAssembler,
    dispatcher: Dispatcher,
}

impl ReceiveEngine {
    /// Creates an engine dispatching touch events through `registry`.
    pub fn new(registry: SharedRegistry, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            assembler: FrameAssembler::new(),
            dispatcher: Dispatcher {
                registry,
                results: ResultBuffer::default(),
                requests: Arc::new(Mutex::new(None)),
                events,
                stats: EngineStats::default(),
            },
        }
    }

    /// Processes one received byte. Call this for every byte, in order.
    ///
    /// Framing faults are logged and recovered here; they never propagate.
    pub fn feed_byte(&mut self, byte: u8) {
        match self.assembler.feed(byte) {
            Ok(Some(frame)) => self.dispatcher.handle(frame),
            Ok(None) => {}
            Err(e) => {
                self.dispatcher.stats.overflows += 1;
                warn!("{}; receive buffer reset", e);
            }
        }
    }

    /// Processes a run of received bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.feed_byte(byte);
        }
    }

    /// Fails the outstanding get request, if any, with [`Error::LinkClosed`].
    pub fn close(&mut self) {
        if let Some(request) = lock_slot(&self.dispatcher.requests).take() {
            request.reply.fail(Error::LinkClosed);
        }
        self.assembler.reset();
    }

    pub fn results(&self) -> &ResultBuffer {
        &self.dispatcher.results
    }

    pub fn stats(&self) -> EngineStats {
        self.dispatcher.stats
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.dispatcher.registry
    }

    /// Subscribes to touch, system and unclassified events.
    pub fn subscribe(&self) -> broadcast::Receiver<DisplayEvent> {
        self.dispatcher.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<DisplayEvent> {
        self.dispatcher.events.clone()
    }

    pub(crate) fn request_slot(&self) -> RequestSlot {
        self.dispatcher.requests.clone()
    }
}
