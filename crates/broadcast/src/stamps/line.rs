use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{Stamp, StampLock};
use parking_lot::Mutex;

/// Message counter prefix, `"<n> "`, numbered from 1
///
/// Each render consumes one number, so a stamp shared by several sinks or
/// channels numbers their messages jointly.
#[derive(Debug, Default)]
pub struct LineStamp {
    /// Last number written
    counter: AtomicU64,
    lock: Mutex<()>,
}

impl LineStamp {
    pub const MAX_LEN: usize = 32;

    pub fn new() -> Self {
        Self::default()
    }

    /// Number the next render will write.
    pub fn next_line(&self) -> u64 {
        self.counter.load(Ordering::Relaxed) + 1
    }
}

fn digits(mut n: u64) -> usize {
    let mut count = 1;
    while n >= 10 {
        n /= 10;
        count += 1;
    }
    count
}

impl Stamp for LineStamp {
    fn max_len(&self) -> usize {
        Self::MAX_LEN
    }

    fn len(&self) -> usize {
        digits(self.next_line()) + 1
    }

    fn write_stamp(&self, out: &mut [u8]) -> usize {
        let line = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let mut cursor = Cursor::new(out);
        let _ = write!(cursor, "{line} ");
        cursor.position() as usize
    }

    fn lock(&self) -> StampLock<'_> {
        StampLock::held(self.lock.lock())
    }
}
