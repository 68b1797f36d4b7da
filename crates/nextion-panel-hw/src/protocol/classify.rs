//! Frame classification by leading opcode.

use super::opcode::{ReturnCode, TouchAction};

/// Component press or release reported by the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TouchEvent {
    pub page: u8,
    pub id: u8,
    pub action: TouchAction,
}

/// Non-component notifications from the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEvent {
    CommandFinished,
    Launched,
    Upgraded,
    PageChanged(u8),
    /// Raw touch position; `asleep` is set when the display was sleeping.
    Coordinate {
        x: u16,
        y: u16,
        action: TouchAction,
        asleep: bool,
    },
    /// An instruction failed.
    Error(ReturnCode),
}

/// Events published to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEvent {
    Touch(TouchEvent),
    System(SystemEvent),
    Unclassified(u8),
}

/// What a frame means, borrowing text payloads from the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifiedEvent<'a> {
    Touch(TouchEvent),
    Text(&'a [u8]),
    Number(i32),
    System(SystemEvent),
    /// Known opcode with a payload that does not fit it.
    Malformed { opcode: u8, len: usize },
    /// Opcode this engine does not know. Not an error.
    Unclassified(u8),
}

/// Classifies a frame payload (terminator already stripped).
///
/// `frame` must be non-empty; the assembler never yields an empty frame.
pub fn classify(frame: &[u8]) -> ClassifiedEvent<'_> {
    let Some((&opcode, body)) = frame.split_first() else {
        return ClassifiedEvent::Malformed {
            opcode: 0,
            len: 0,
        };
    };
    let malformed = ClassifiedEvent::Malformed {
        opcode,
        len: frame.len(),
    };

    let Some(code) = ReturnCode::from_byte(opcode) else {
        return ClassifiedEvent::Unclassified(opcode);
    };

    match code {
        ReturnCode::TouchEvent => match *body {
            [page, id, flag] => match TouchAction::from_byte(flag) {
                Some(action) => ClassifiedEvent::Touch(TouchEvent { page, id, action }),
                None => malformed,
            },
            _ => malformed,
        },
        ReturnCode::StringReturn => ClassifiedEvent::Text(body),
        ReturnCode::NumberReturn => match *body {
            [b0, b1, b2, b3] => ClassifiedEvent::Number(i32::from_le_bytes([b0, b1, b2, b3])),
            _ => malformed,
        },
        ReturnCode::CurrentPage => match *body {
            [page] => ClassifiedEvent::System(SystemEvent::PageChanged(page)),
            _ => malformed,
        },
        ReturnCode::TouchCoordinate | ReturnCode::SleepTouchCoordinate => match *body {
            [x_hi, x_lo, y_hi, y_lo, flag] => match TouchAction::from_byte(flag) {
                Some(action) => ClassifiedEvent::System(SystemEvent::Coordinate {
                    x: u16::from_be_bytes([x_hi, x_lo]),
                    y: u16::from_be_bytes([y_hi, y_lo]),
                    action,
                    asleep: code == ReturnCode::SleepTouchCoordinate,
                }),
                None => malformed,
            },
            _ => malformed,
        },
        ReturnCode::CommandFinished => ClassifiedEvent::System(SystemEvent::CommandFinished),
        ReturnCode::Launched => ClassifiedEvent::System(SystemEvent::Launched),
        ReturnCode::Upgraded => ClassifiedEvent::System(SystemEvent::Upgraded),
        code => ClassifiedEvent::System(SystemEvent::Error(code)),
    }
}
