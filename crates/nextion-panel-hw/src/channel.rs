//! Command channel: outbound get/set commands and reply correlation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::DriverConfig;
use crate::engine::{lock_slot, PendingRequest, ReceiveEngine, ReplyValue, RequestSlot, TextReply};
use crate::protocol::{
    build_get_command, build_packet, build_set_text_command, build_set_value_command, Attribute,
    TERMINATOR,
};
use crate::registry::ComponentHandle;
use crate::{Error, Result};

/// Something a command can address by object name.
pub trait Target {
    fn object_name(&self) -> Result<&str>;
}

impl Target for str {
    fn object_name(&self) -> Result<&str> {
        Ok(self)
    }
}

impl Target for String {
    fn object_name(&self) -> Result<&str> {
        Ok(self.as_str())
    }
}

impl Target for ComponentHandle {
    fn object_name(&self) -> Result<&str> {
        self.name().ok_or(Error::Unnamed {
            page: self.page(),
            id: self.id(),
        })
    }
}

/// Clears the request slot when the waiting get call ends, however it ends.
struct RequestGuard<'a> {
    slot: &'a Mutex<Option<PendingRequest>>,
    token: u64,
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        let mut slot = lock_slot(self.slot);
        if slot.as_ref().is_some_and(|r| r.token == self.token) {
            *slot = None;
        }
    }
}

/// Sends commands over the link and waits for get replies.
///
/// At most one get request is outstanding at a time; a second one fails
/// with [`Error::Busy`] instead of queueing.
pub struct CommandChannel<W> {
    writer: AsyncMutex<W>,
    requests: RequestSlot,
    next_token: AtomicU64,
    /// A timed-out write may have left part of a command on the link.
    resync: AtomicBool,
    transmit_timeout: Duration,
    response_timeout: Duration,
}

impl<W> CommandChannel<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a channel whose replies are delivered by `engine`.
    pub fn new(writer: W, engine: &ReceiveEngine, config: &DriverConfig) -> Self {
        Self {
            writer: AsyncMutex::new(writer),
            requests: engine.request_slot(),
            next_token: AtomicU64::new(1),
            resync: AtomicBool::new(false),
            transmit_timeout: config.transmit_timeout,
            response_timeout: config.response_timeout,
        }
    }

    /// Sends a command body followed by the terminator.
    ///
    /// After a transmit timeout the next send starts with a bare terminator,
    /// so the display discards whatever fragment of the abandoned command
    /// reached it.
    pub async fn send_raw(&self, command: &str) -> Result<()> {
        let packet = build_packet(command.as_bytes());

        let write = async {
            let mut writer = self.writer.lock().await;
            if self.resync.load(Ordering::Acquire) {
                debug!("Terminating partial command before {:?}", command);
                writer.write_all(&TERMINATOR).await?;
                self.resync.store(false, Ordering::Release);
            }
            writer.write_all(&packet).await?;
            writer.flush().await
        };
        match timeout(self.transmit_timeout, write).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Timed out sending {:?}", command);
                self.resync.store(true, Ordering::Release);
                return Err(Error::TransmitTimeout(self.transmit_timeout));
            }
        }

        debug!("Sent command {:?}", command);
        Ok(())
    }

    /// Sets a component's text. No reply is expected.
    pub async fn set_text<T: Target + ?Sized>(&self, target: &T, value: &str) -> Result<()> {
        let command = build_set_text_command(target.object_name()?, value)?;
        self.send_raw(&command).await
    }

    /// Sets a component's numeric value. No reply is expected.
    pub async fn set_value<T: Target + ?Sized>(&self, target: &T, value: i32) -> Result<()> {
        let command = build_set_value_command(target.object_name()?, value)?;
        self.send_raw(&command).await
    }

    /// Reads a component's text.
    ///
    /// Replies carry no request id. An error code the display sends while
    /// this request waits fails it with [`Error::Rejected`], even when the
    /// code answers an earlier `set_*` command; the real reply then arrives
    /// unsolicited and only updates the result buffer.
    pub async fn get_text<T: Target + ?Sized>(&self, target: &T) -> Result<TextReply> {
        let command = build_get_command(target.object_name()?, Attribute::Text)?;
        self.request::<TextReply>(&command).await
    }

    /// Reads a component's numeric value.
    ///
    /// Error codes are matched to this request the same way as for
    /// [`get_text`](Self::get_text).
    pub async fn get_value<T: Target + ?Sized>(&self, target: &T) -> Result<i32> {
        let command = build_get_command(target.object_name()?, Attribute::Value)?;
        self.request::<i32>(&command).await
    }

    /// Whether a get request is waiting for its reply.
    pub fn is_busy(&self) -> bool {
        lock_slot(&self.requests).is_some()
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    async fn request<V: ReplyValue>(&self, command: &str) -> Result<V> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut slot = lock_slot(&self.requests);
            if slot.is_some() {
                return Err(Error::Busy);
            }
            *slot = Some(PendingRequest {
                token,
                reply: V::sender(tx),
            });
        }
        let _guard = RequestGuard {
            slot: &self.requests,
            token,
        };

        self.send_raw(command).await?;

        match timeout(self.response_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped without answering: the engine went away.
            Ok(Err(_)) => Err(Error::LinkClosed),
            Err(_) => {
                warn!(
                    "No reply to {:?} within {:?}",
                    command, self.response_timeout
                );
                Err(Error::ResponseTimeout(self.response_timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Callbacks, ComponentRegistry, SharedRegistry};
    use tokio::io::AsyncReadExt;

    fn config() -> DriverConfig {
        DriverConfig {
            transmit_timeout: Duration::from_millis(50),
            response_timeout: Duration::from_millis(50),
            ..DriverConfig::default()
        }
    }

    #[tokio::test]
    async fn test_send_raw_appends_terminator() {
        let engine = ReceiveEngine::new(SharedRegistry::new(1), 1);
        let (writer, mut display) = tokio::io::duplex(64);
        let channel = CommandChannel::new(writer, &engine, &config());

        channel.send_raw("page 1").await.unwrap();
        channel.set_value("n0", 5).await.unwrap();

        let mut buf = [0u8; 20];
        display.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"page 1\xFF\xFF\xFFn0.val=5\xFF\xFF\xFF");
    }

    #[tokio::test]
    async fn test_transmit_timeout() {
        let engine = ReceiveEngine::new(SharedRegistry::new(1), 1);
        // Nobody reads the other end, so a long write stalls.
        let (writer, _display) = tokio::io::duplex(4);
        let channel = CommandChannel::new(writer, &engine, &config());

        let err = channel.set_text("t0", "too long").await.unwrap_err();
        assert!(matches!(err, Error::TransmitTimeout(_)));
    }

    #[tokio::test]
    async fn test_send_after_transmit_timeout_terminates_fragment() {
        let engine = ReceiveEngine::new(SharedRegistry::new(1), 1);
        let (writer, mut display) = tokio::io::duplex(4);
        let config = DriverConfig {
            transmit_timeout: Duration::from_millis(30),
            ..config()
        };
        let channel = CommandChannel::new(writer, &engine, &config);

        let err = channel.set_text("t0", "hello").await.unwrap_err();
        assert!(matches!(err, Error::TransmitTimeout(_)));

        // Only the first four bytes of the abandoned command fit in the pipe.
        let mut received = [0u8; 18];
        let (sent, _) = tokio::join!(channel.set_value("n0", 5), async {
            display.read_exact(&mut received).await.unwrap();
        });
        sent.unwrap();
        assert_eq!(&received, b"t0.t\xFF\xFF\xFFn0.val=5\xFF\xFF\xFF");

        // The link is clean again.
        let mut next = [0u8; 11];
        let (sent, _) = tokio::join!(channel.set_value("n1", 6), async {
            display.read_exact(&mut next).await.unwrap();
        });
        sent.unwrap();
        assert_eq!(&next, b"n1.val=6\xFF\xFF\xFF");
    }

    #[tokio::test]
    async fn test_response_timeout_clears_request() {
        let engine = ReceiveEngine::new(SharedRegistry::new(1), 1);
        let (writer, _display) = tokio::io::duplex(64);
        let channel = CommandChannel::new(writer, &engine, &config());

        let err = channel.get_value("n0").await.unwrap_err();
        assert!(matches!(err, Error::ResponseTimeout(_)));
        assert!(!channel.is_busy());
    }

    #[tokio::test]
    async fn test_busy_while_request_outstanding() {
        let engine = ReceiveEngine::new(SharedRegistry::new(1), 1);
        let (writer, _display) = tokio::io::duplex(64);
        let channel = CommandChannel::new(writer, &engine, &config());

        let (first, second) = tokio::join!(channel.get_value("n0"), async {
            tokio::task::yield_now().await;
            channel.get_value("n1").await
        });
        assert!(matches!(first, Err(Error::ResponseTimeout(_))));
        assert!(matches!(second, Err(Error::Busy)));
    }

    #[tokio::test]
    async fn test_unnamed_component_cannot_be_addressed() {
        let engine = ReceiveEngine::new(SharedRegistry::new(1), 1);
        let (writer, _display) = tokio::io::duplex(64);
        let channel = CommandChannel::new(writer, &engine, &config());

        let mut registry = ComponentRegistry::new(1);
        let handle = registry.register(0, 3, Callbacks::None).unwrap();
        let err = channel.get_text(&handle).await.unwrap_err();
        assert!(matches!(err, Error::Unnamed { page: 0, id: 3 }));
    }
}
