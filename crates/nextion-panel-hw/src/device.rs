//! Display driver over a serial port or any async byte stream.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, WriteHalf};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{info, warn};

use crate::channel::{CommandChannel, Target};
use crate::config::DriverConfig;
use crate::engine::{ReceiveEngine, TextReply};
use crate::protocol::DisplayEvent;
use crate::registry::{Callbacks, ComponentHandle, SharedRegistry};
use crate::{Error, Result};

/// Bytes read from the link per call.
const READ_CHUNK: usize = 64;

/// A running display driver.
///
/// A receiver task owns the [`ReceiveEngine`] and feeds it every byte read
/// from the link. Commands go out through a shared [`CommandChannel`].
/// Dropping the driver stops the receiver.
pub struct NextionDevice<W = WriteHalf<SerialStream>> {
    commands: Arc<CommandChannel<W>>,
    registry: SharedRegistry,
    events: broadcast::Sender<DisplayEvent>,
    receiver: JoinHandle<()>,
}

impl NextionDevice<WriteHalf<SerialStream>> {
    /// Opens a serial port (8N1) and starts the receiver.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(port_path: &str, baud_rate: u32, config: DriverConfig) -> Result<Self> {
        let port = tokio_serial::new(port_path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .open_native_async()
            .map_err(|e| {
                if let tokio_serial::ErrorKind::Io(kind) = &e.kind {
                    if (*kind == std::io::ErrorKind::NotFound
                        || *kind == std::io::ErrorKind::PermissionDenied)
                        && !std::path::Path::new(port_path).exists()
                    {
                        return Error::PortNotFound(port_path.to_string());
                    }
                }
                Error::Serial(e)
            })?;

        info!("Opened display port {} at {} baud", port_path, baud_rate);

        let (reader, writer) = tokio::io::split(port);
        Ok(Self::from_stream(reader, writer, config))
    }
}

impl<W> NextionDevice<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Starts a driver over an arbitrary reader/writer pair.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_stream<R>(reader: R, writer: W, config: DriverConfig) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let registry = SharedRegistry::new(config.registry_capacity);
        let engine = ReceiveEngine::new(registry.clone(), config.event_capacity);
        let commands = Arc::new(CommandChannel::new(writer, &engine, &config));
        let events = engine.event_sender();
        let receiver = tokio::spawn(receive_loop(reader, engine));

        Self {
            commands,
            registry,
            events,
            receiver,
        }
    }

    /// Registers an unnamed component, e.g. a button only used for events.
    pub fn register(&self, page: u8, id: u8, callbacks: Callbacks) -> Result<ComponentHandle> {
        self.registry.write().register(page, id, callbacks)
    }

    /// Registers a component addressable by `name` in commands.
    pub fn register_named(
        &self,
        name: &str,
        page: u8,
        id: u8,
        callbacks: Callbacks,
    ) -> Result<ComponentHandle> {
        self.registry.write().register_named(name, page, id, callbacks)
    }

    pub async fn send_raw(&self, command: &str) -> Result<()> {
        self.commands.send_raw(command).await
    }

    pub async fn set_text<T: Target + ?Sized>(&self, target: &T, value: &str) -> Result<()> {
        self.commands.set_text(target, value).await
    }

    pub async fn set_value<T: Target + ?Sized>(&self, target: &T, value: i32) -> Result<()> {
        self.commands.set_value(target, value).await
    }

    pub async fn get_text<T: Target + ?Sized>(&self, target: &T) -> Result<TextReply> {
        self.commands.get_text(target).await
    }

    pub async fn get_value<T: Target + ?Sized>(&self, target: &T) -> Result<i32> {
        self.commands.get_value(target).await
    }

    /// Command channel, shareable with other tasks.
    pub fn commands(&self) -> Arc<CommandChannel<W>> {
        self.commands.clone()
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Subscribes to touch, system and unclassified events.
    pub fn subscribe(&self) -> broadcast::Receiver<DisplayEvent> {
        self.events.subscribe()
    }

    /// Whether the receiver is still reading the link.
    pub fn is_running(&self) -> bool {
        !self.receiver.is_finished()
    }
}

impl<W> Drop for NextionDevice<W> {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}

async fn receive_loop<R>(mut reader: R, mut engine: ReceiveEngine)
where
    R: AsyncRead + Unpin,
{
    info!("Receiver started");
    let mut buffer = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => {
                info!("Display link closed");
                break;
            }
            Ok(n) => engine.feed(&buffer[..n]),
            Err(e) => {
                warn!("Display link read error: {}", e);
                break;
            }
        }
    }
    engine.close();
    info!("Receiver stopped: {:?}", engine.stats());
}
