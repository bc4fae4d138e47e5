//! Transcoder trait - wide text to channel bytes

/// Borrowed text in a non-UTF-8 code unit width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WideText<'a> {
    Utf16(&'a [u16]),
    Utf32(&'a [u32]),
    Latin1(&'a [u8]),
}

impl WideText<'_> {
    /// Number of source code units.
    pub fn unit_count(&self) -> usize {
        match self {
            WideText::Utf16(units) => units.len(),
            WideText::Utf32(units) => units.len(),
            WideText::Latin1(units) => units.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.unit_count() == 0
    }
}

/// Pure conversion from wide text into the byte encoding sinks receive.
///
/// Applied to a channel's private buffer, never under a sink lock.
pub trait Transcoder: Send + Sync {
    /// Append the converted form of `source` to `dest`, returning the
    /// number of bytes appended.
    fn convert(&self, source: WideText<'_>, dest: &mut Vec<u8>) -> usize;
}
