//! Transcoders from wide text into channel bytes

use contracts::{Transcoder, WideText};

/// Converts wide text to UTF-8; invalid units become U+FFFD
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Transcoder;

impl Utf8Transcoder {
    fn push(dest: &mut Vec<u8>, c: char) {
        let mut buf = [0u8; 4];
        dest.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    }
}

impl Transcoder for Utf8Transcoder {
    fn convert(&self, source: WideText<'_>, dest: &mut Vec<u8>) -> usize {
        let start = dest.len();
        match source {
            WideText::Utf16(units) => {
                for decoded in char::decode_utf16(units.iter().copied()) {
                    Self::push(dest, decoded.unwrap_or(char::REPLACEMENT_CHARACTER));
                }
            }
            WideText::Utf32(units) => {
                for unit in units {
                    Self::push(
                        dest,
                        char::from_u32(*unit).unwrap_or(char::REPLACEMENT_CHARACTER),
                    );
                }
            }
            WideText::Latin1(units) => {
                for unit in units {
                    Self::push(dest, char::from(*unit));
                }
            }
        }
        dest.len() - start
    }
}

/// Truncates every code unit to its low byte
///
/// The non-converting path: only meaningful when the text is known to be
/// ASCII, as with most diagnostic output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NarrowingTranscoder;

impl Transcoder for NarrowingTranscoder {
    fn convert(&self, source: WideText<'_>, dest: &mut Vec<u8>) -> usize {
        match source {
            WideText::Utf16(units) => dest.extend(units.iter().map(|u| *u as u8)),
            WideText::Utf32(units) => dest.extend(units.iter().map(|u| *u as u8)),
            WideText::Latin1(units) => dest.extend_from_slice(units),
        }
        source.unit_count()
    }
}
