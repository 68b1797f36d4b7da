//! Return codes sent by the display as the first byte of a frame.

use std::fmt;

/// Display return codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReturnCode {
    /// Instruction not understood.
    InvalidCommand = 0x00,
    /// Instruction executed.
    CommandFinished = 0x01,
    InvalidComponentId = 0x02,
    InvalidPageId = 0x03,
    InvalidPictureId = 0x04,
    InvalidFontId = 0x05,
    InvalidBaud = 0x11,
    /// Unknown object or attribute name.
    InvalidVariable = 0x1A,
    InvalidOperation = 0x1B,
    /// Component press/release: `[page, id, action]`.
    TouchEvent = 0x65,
    /// Current page: `[page]`.
    CurrentPage = 0x66,
    /// Raw touch coordinate: `[x_hi, x_lo, y_hi, y_lo, action]`.
    TouchCoordinate = 0x67,
    /// Raw touch coordinate while the display sleeps.
    SleepTouchCoordinate = 0x68,
    /// Text reply to a `get`.
    StringReturn = 0x70,
    /// Number reply to a `get`: 4 bytes little-endian.
    NumberReturn = 0x71,
    /// Display finished booting.
    Launched = 0x88,
    /// Display finished a firmware upgrade.
    Upgraded = 0x89,
}

impl ReturnCode {
    /// Converts a frame's leading byte to a return code.
    pub fn from_byte(value: u8) -> Option<Self> {
        let code = match value {
            0x00 => ReturnCode::InvalidCommand,
            0x01 => ReturnCode::CommandFinished,
            0x02 => ReturnCode::InvalidComponentId,
            0x03 => ReturnCode::InvalidPageId,
            0x04 => ReturnCode::InvalidPictureId,
            0x05 => ReturnCode::InvalidFontId,
            0x11 => ReturnCode::InvalidBaud,
            0x1A => ReturnCode::InvalidVariable,
            0x1B => ReturnCode::InvalidOperation,
            0x65 => ReturnCode::TouchEvent,
            0x66 => ReturnCode::CurrentPage,
            0x67 => ReturnCode::TouchCoordinate,
            0x68 => ReturnCode::SleepTouchCoordinate,
            0x70 => ReturnCode::StringReturn,
            0x71 => ReturnCode::NumberReturn,
            0x88 => ReturnCode::Launched,
            0x89 => ReturnCode::Upgraded,
            _ => return None,
        };
        Some(code)
    }

    /// Whether the code reports a failed instruction.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            ReturnCode::InvalidCommand
                | ReturnCode::InvalidComponentId
                | ReturnCode::InvalidPageId
                | ReturnCode::InvalidPictureId
                | ReturnCode::InvalidFontId
                | ReturnCode::InvalidBaud
                | ReturnCode::InvalidVariable
                | ReturnCode::InvalidOperation
        )
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReturnCode::InvalidCommand => "invalid command",
            ReturnCode::CommandFinished => "command finished",
            ReturnCode::InvalidComponentId => "invalid component id",
            ReturnCode::InvalidPageId => "invalid page id",
            ReturnCode::InvalidPictureId => "invalid picture id",
            ReturnCode::InvalidFontId => "invalid font id",
            ReturnCode::InvalidBaud => "invalid baud rate",
            ReturnCode::InvalidVariable => "invalid variable",
            ReturnCode::InvalidOperation => "invalid operation",
            ReturnCode::TouchEvent => "touch event",
            ReturnCode::CurrentPage => "current page",
            ReturnCode::TouchCoordinate => "touch coordinate",
            ReturnCode::SleepTouchCoordinate => "sleep touch coordinate",
            ReturnCode::StringReturn => "string return",
            ReturnCode::NumberReturn => "number return",
            ReturnCode::Launched => "launched",
            ReturnCode::Upgraded => "upgraded",
        };
        write!(f, "{} (0x{:02X})", name, *self as u8)
    }
}

/// Press flag carried by touch frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TouchAction {
    Release = 0x00,
    Press = 0x01,
}

impl TouchAction {
    /// Converts the flag byte, rejecting anything other than 0 or 1.
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(TouchAction::Release),
            0x01 => Some(TouchAction::Press),
            _ => None,
        }
    }
}

impl fmt::Display for TouchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TouchAction::Press => write!(f, "press"),
            TouchAction::Release => write!(f, "release"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_byte_round_trips_known_codes() {
        for byte in [0x00, 0x01, 0x1A, 0x65, 0x70, 0x71, 0x88, 0x89] {
            let code = ReturnCode::from_byte(byte).unwrap();
            assert_eq!(code as u8, byte);
        }
        assert_eq!(ReturnCode::from_byte(0x42), None);
    }

    #[test]
    fn test_is_error() {
        assert!(ReturnCode::InvalidVariable.is_error());
        assert!(ReturnCode::InvalidCommand.is_error());
        assert!(!ReturnCode::CommandFinished.is_error());
        assert!(!ReturnCode::StringReturn.is_error());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ReturnCode::InvalidVariable.to_string(),
            "invalid variable (0x1A)"
        );
    }

    #[test]
    fn test_touch_action() {
        assert_eq!(TouchAction::from_byte(1), Some(TouchAction::Press));
        assert_eq!(TouchAction::from_byte(0), Some(TouchAction::Release));
        assert_eq!(TouchAction::from_byte(2), None);
    }
}
