//! Nextion Panel Hardware Library
//!
//! Drives Nextion-style touchscreen displays over a serial link: assembles
//! and classifies `0xFF 0xFF 0xFF`-terminated frames, dispatches touch
//! events to registered components, and sends get/set attribute commands
//! with request/reply correlation.

pub mod channel;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod registry;

pub use channel::{CommandChannel, Target};
pub use config::DriverConfig;
pub use device::NextionDevice;
pub use engine::{EngineStats, ReceiveEngine, ResultBuffer, TextReply};
pub use error::{Error, Result};
pub use protocol::{DisplayEvent, ReturnCode, SystemEvent, TouchAction, TouchEvent};
pub use registry::{Callbacks, ComponentHandle, ComponentRegistry, SharedRegistry, TouchHandler};

/// Factory default baud rate of the display.
pub const DEFAULT_BAUD_RATE: u32 = 9600;
