use std::io::{Cursor, Write};

use chrono::Local;
use contracts::Stamp;

const FORMAT: &str = "%Y-%m-%d %H:%M:%S:%3f ";

/// Local wall-clock prefix, `YYYY-MM-DD HH:MM:SS:mmm `
///
/// The rendered width never changes, so it is measured once at construction.
#[derive(Debug, Clone)]
pub struct SystemTimeStamp {
    len: usize,
}

impl Default for SystemTimeStamp {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemTimeStamp {
    pub fn new() -> Self {
        Self {
            len: Local::now().format(FORMAT).to_string().len(),
        }
    }
}

impl Stamp for SystemTimeStamp {
    fn max_len(&self) -> usize {
        self.len
    }

    fn len(&self) -> usize {
        self.len
    }

    fn write_stamp(&self, out: &mut [u8]) -> usize {
        let mut cursor = Cursor::new(out);
        // A short buffer truncates the stamp; the bytes that fit are kept.
        let _ = write!(cursor, "{}", Local::now().format(FORMAT));
        cursor.position() as usize
    }
}
