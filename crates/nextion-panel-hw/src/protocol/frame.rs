//! Frame assembly from the inbound byte stream.
//!
//! Every message from the display ends with three `0xFF` bytes. There is no
//! length prefix and no escaping, so a payload that itself contains three
//! consecutive `0xFF` bytes ends the frame early. The assembler does not try
//! to repair that; the classifier flags replies whose length does not fit.

use tracing::debug;

use crate::{Error, Result};

/// Byte value of the terminator.
pub const TERMINATOR_BYTE: u8 = 0xFF;

/// Terminator appended to every message in both directions.
pub const TERMINATOR: [u8; 3] = [TERMINATOR_BYTE; 3];

/// Receive buffer size, terminator included.
pub const MAX_FRAME_LEN: usize = 96;

/// Accumulates bytes until a terminator run completes a frame.
///
/// The buffer is a fixed array; feeding bytes never allocates.
#[derive(Debug)]
pub struct FrameAssembler<const N: usize = MAX_FRAME_LEN> {
    buffer: [u8; N],
    len: usize,
    run: u8,
    /// Set after an overflow until the oversized frame's terminator passes.
    discarding: bool,
    discarded: usize,
}

impl<const N: usize> Default for FrameAssembler<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FrameAssembler<N> {
    /// Creates an empty assembler.
    pub const fn new() -> Self {
        Self {
            buffer: [0; N],
            len: 0,
            run: 0,
            discarding: false,
            discarded: 0,
        }
    }

    /// Feeds one received byte.
    ///
    /// Returns the payload (terminator stripped) once a frame completes. The
    /// slice borrows the internal buffer and is valid until the next call.
    /// A bare terminator carries no opcode and yields nothing.
    ///
    /// On overflow the bytes received so far are dropped, the rest of the
    /// oversized frame is skipped up to its terminator, and
    /// [`Error::FrameOverflow`] is returned once. The assembler stays usable.
    pub fn feed(&mut self, byte: u8) -> Result<Option<&[u8]>> {
        if byte == TERMINATOR_BYTE {
            self.run += 1;
        } else {
            self.run = 0;
        }

        if self.discarding {
            self.discarded += 1;
            if usize::from(self.run) == TERMINATOR.len() {
                debug!(
                    "Resynchronised after discarding {} bytes of oversized frame",
                    self.discarded
                );
                self.run = 0;
                self.discarding = false;
                self.discarded = 0;
            }
            return Ok(None);
        }

        if self.len == N {
            let discarded = self.len + 1;
            self.len = 0;
            if usize::from(self.run) == TERMINATOR.len() {
                self.run = 0;
            } else {
                self.discarding = true;
                self.discarded = discarded;
            }
            return Err(Error::FrameOverflow { discarded });
        }

        self.buffer[self.len] = byte;
        self.len += 1;

        if usize::from(self.run) < TERMINATOR.len() {
            return Ok(None);
        }

        let end = self.len - TERMINATOR.len();
        self.len = 0;
        self.run = 0;
        if end == 0 {
            return Ok(None);
        }
        Ok(Some(&self.buffer[..end]))
    }

    /// Number of bytes of the frame currently being assembled.
    pub fn pending_len(&self) -> usize {
        self.len
    }

    /// Drops any partially assembled frame.
    pub fn reset(&mut self) {
        self.len = 0;
        self.run = 0;
        self.discarding = false;
        self.discarded = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all<const N: usize>(assembler: &mut FrameAssembler<N>, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        for &byte in bytes {
            if let Ok(Some(frame)) = assembler.feed(byte) {
                frames.push(frame.to_vec());
            }
        }
        frames
    }

    #[test]
    fn test_single_frame() {
        let mut assembler = FrameAssembler::<MAX_FRAME_LEN>::new();
        let frames = feed_all(&mut assembler, &[0x65, 0x02, 0x05, 0x01, 0xFF, 0xFF, 0xFF]);
        assert_eq!(frames, vec![vec![0x65, 0x02, 0x05, 0x01]]);
        assert_eq!(assembler.pending_len(), 0);
    }

    #[test]
    fn test_frame_split_across_feeds() {
        let mut assembler = FrameAssembler::<MAX_FRAME_LEN>::new();
        assert!(feed_all(&mut assembler, &[0x70, b'O']).is_empty());
        assert_eq!(assembler.pending_len(), 2);
        let frames = feed_all(&mut assembler, &[b'K', 0xFF, 0xFF, 0xFF]);
        assert_eq!(frames, vec![b"pOK".to_vec()]);
    }

    #[test]
    fn test_broken_terminator_run_continues_frame() {
        let mut assembler = FrameAssembler::<MAX_FRAME_LEN>::new();
        let frames = feed_all(
            &mut assembler,
            &[0x71, 0xFF, 0xFF, 0x00, 0x00, 0xFF, 0xFF, 0xFF],
        );
        assert_eq!(frames, vec![vec![0x71, 0xFF, 0xFF, 0x00, 0x00]]);
    }

    #[test]
    fn test_embedded_terminator_splits_frame() {
        // A number whose low bytes are 0xFF ends the frame early.
        let mut assembler = FrameAssembler::<MAX_FRAME_LEN>::new();
        let frames = feed_all(
            &mut assembler,
            &[0x71, 0xFF, 0xFF, 0xFF, 0x00, 0xFF, 0xFF, 0xFF],
        );
        assert_eq!(frames, vec![vec![0x71], vec![0x00]]);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut assembler = FrameAssembler::<MAX_FRAME_LEN>::new();
        let frames = feed_all(
            &mut assembler,
            &[0x01, 0xFF, 0xFF, 0xFF, 0x66, 0x03, 0xFF, 0xFF, 0xFF],
        );
        assert_eq!(frames, vec![vec![0x01], vec![0x66, 0x03]]);
    }

    #[test]
    fn test_bare_terminator_ignored() {
        let mut assembler = FrameAssembler::<MAX_FRAME_LEN>::new();
        assert!(feed_all(&mut assembler, &[0xFF, 0xFF, 0xFF]).is_empty());
        let frames = feed_all(&mut assembler, &[0x88, 0xFF, 0xFF, 0xFF]);
        assert_eq!(frames, vec![vec![0x88]]);
    }

    #[test]
    fn test_overflow_recovers() {
        let mut assembler = FrameAssembler::<8>::new();
        for &byte in &[0x70, 1, 2, 3, 4, 5, 6, 7] {
            assert!(assembler.feed(byte).unwrap().is_none());
        }
        let err = assembler.feed(8).unwrap_err();
        assert!(matches!(err, Error::FrameOverflow { discarded: 9 }));

        // The tail of the oversized frame is skipped, not parsed.
        assert!(feed_all(&mut assembler, &[9, 10, 0xFF, 0xFF, 0xFF]).is_empty());

        let frames = feed_all(&mut assembler, &[0x71, 0x2A, 0, 0, 0, 0xFF, 0xFF, 0xFF]);
        assert_eq!(frames, vec![vec![0x71, 0x2A, 0, 0, 0]]);
    }

    #[test]
    fn test_overflow_on_terminator_boundary() {
        let mut assembler = FrameAssembler::<4>::new();
        for &byte in &[0x70, 1, 0xFF, 0xFF] {
            assert!(assembler.feed(byte).unwrap().is_none());
        }
        assert!(assembler.feed(0xFF).is_err());
        // Boundary already reached, so the next frame is parsed normally.
        let frames = feed_all(&mut assembler, &[0x01, 0xFF, 0xFF, 0xFF]);
        assert_eq!(frames, vec![vec![0x01]]);
    }

    #[test]
    fn test_reset_drops_partial_frame() {
        let mut assembler = FrameAssembler::<MAX_FRAME_LEN>::new();
        feed_all(&mut assembler, &[0x70, b'a', 0xFF]);
        assembler.reset();
        let frames = feed_all(&mut assembler, &[0x01, 0xFF, 0xFF, 0xFF]);
        assert_eq!(frames, vec![vec![0x01]]);
    }
}
