use crate::{Error, Surface};
use std::path::Path;

/// Numeric properties a [`Capture`] can report or accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    /// Codec tag packed as a little-endian 32-bit fourcc.
    FourCc,
    /// Frames per second.
    Fps,
    /// Total number of frames in the stream.
    FrameCount,
    FrameWidth,
    FrameHeight,
    /// Timestamp of the last grabbed frame (or of the last seek target) in milliseconds.
    PosMsec,
    /// Relative position in the stream, `0.0` at the start and `1.0` at the end.
    PosRatio,
    /// 0-based index of the frame the next [`Capture::grab`] will deliver.
    PosFrames,
}

/// A decode engine that can be stepped one frame at a time.
///
/// The player never decodes anything itself; it only moves this cursor around
/// and asks for the pixels of whatever frame was grabbed last.
pub trait Capture {
    /// Opens the media at `path`, replacing anything opened before.
    fn open(&mut self, path: &Path) -> Result<(), Error>;

    /// Whether a source is currently open.
    fn is_opened(&self) -> bool;

    /// Reads a property. Values the engine cannot provide read as `0.0`.
    fn get(&self, property: Property) -> f64;

    /// Writes a property, returning `false` if it is unsupported or was rejected.
    fn set(&mut self, property: Property, value: f64) -> bool;

    /// Advances to the next frame and buffers it.
    fn grab(&mut self) -> bool;

    /// Whether the last failed [`Capture::grab`] was caused by the end of the stream.
    fn is_end_of_stream(&self) -> bool {
        false
    }

    /// Returns the pixels of the most recently grabbed frame.
    fn retrieve(&mut self) -> Option<Surface>;

    /// Frees every resource held for the open source.
    fn release(&mut self);
}

/// Packs four characters into a fourcc, first character in the lowest byte.
pub const fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*code)
}

/// Unpacks a fourcc into its characters, stopping at the first NUL byte.
pub fn fourcc_to_string(code: u32) -> String {
    let chars = [
        (code & 0x0000_00FF) as u8,
        ((code & 0x0000_FF00) >> 8) as u8,
        ((code & 0x00FF_0000) >> 16) as u8,
        ((code & 0xFF00_0000) >> 24) as u8,
    ];
    chars
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpacks_little_endian() {
        assert_eq!(fourcc_to_string(0x3163_7661), "avc1");
        assert_eq!(fourcc_to_string(fourcc(b"MJPG")), "MJPG");
    }

    #[test]
    fn zero_code_is_empty() {
        assert_eq!(fourcc_to_string(0), "");
    }

    #[test]
    fn stops_at_nul() {
        assert_eq!(fourcc_to_string(fourcc(b"AB\0D")), "AB");
    }
}
