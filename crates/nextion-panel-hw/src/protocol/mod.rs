//! Wire protocol: framing, classification and command encoding.
//!
//! Protocol structure:
//! - Every message in either direction ends with `0xFF 0xFF 0xFF`
//! - Inbound frames start with a one-byte return code
//! - Outbound messages are ASCII instructions

mod classify;
mod command;
mod frame;
mod opcode;

pub use classify::{classify, ClassifiedEvent, DisplayEvent, SystemEvent, TouchEvent};
pub use command::{
    build_get_command, build_packet, build_set_text_command, build_set_value_command,
    escape_text, validate_object_name, Attribute,
};
pub use frame::{FrameAssembler, MAX_FRAME_LEN, TERMINATOR, TERMINATOR_BYTE};
pub use opcode::{ReturnCode, TouchAction};
