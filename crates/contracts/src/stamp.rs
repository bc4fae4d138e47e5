//! Stamp trait - message prefix generation
//!
//! Every message buffer begins with a reserved region of `max_len()` bytes.
//! On flush the stamp renders its current text (`len()` bytes) into the
//! *tail* of that region, so the payload always starts at offset `max_len()`
//! and the bytes handed to a backend are `region[max_len - len..]`.

use parking_lot::MutexGuard;

/// Guard held across measure + write of a variable stamp.
///
/// Dropping it releases the stamp. Stamps whose text never changes hand out
/// an empty guard.
#[must_use = "the stamp is released as soon as the guard is dropped"]
#[derive(Default)]
pub struct StampLock<'a> {
    guard: Option<MutexGuard<'a, ()>>,
}

impl<'a> StampLock<'a> {
    /// Guard that holds nothing.
    pub fn unlocked() -> Self {
        Self { guard: None }
    }

    /// Wrap a held mutex guard.
    pub fn held(guard: MutexGuard<'a, ()>) -> Self {
        Self { guard: Some(guard) }
    }

    pub fn is_held(&self) -> bool {
        self.guard.is_some()
    }
}

/// Prefix generator shared by sinks and channels
pub trait Stamp: Send + Sync {
    /// Upper bound of `len()`; the width of the reserved region.
    fn max_len(&self) -> usize;

    /// Length of the text the next `write_stamp` will produce.
    ///
    /// Variable stamps must be called with [`Stamp::lock`] held so that the
    /// measured length matches what gets written.
    fn len(&self) -> usize;

    /// Render the stamp into `out`, returning the number of bytes written.
    ///
    /// `out` is exactly `len()` bytes long.
    fn write_stamp(&self, out: &mut [u8]) -> usize;

    /// Lock the stamp for a measure + write sequence.
    fn lock(&self) -> StampLock<'_> {
        StampLock::unlocked()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render into the tail of `region` and return the rendered length.
    ///
    /// `region` must be `max_len()` bytes wide. A short write is moved to
    /// the end of the region so the stamp always ends at `max_len()`.
    fn render_tail(&self, region: &mut [u8]) -> usize {
        let max_len = self.max_len();
        debug_assert_eq!(region.len(), max_len);

        let _lock = self.lock();
        let len = self.len().min(max_len);
        if len == 0 {
            return 0;
        }
        let start = max_len - len;
        let written = self.write_stamp(&mut region[start..]).min(len);
        if written < len {
            region.copy_within(start..start + written, max_len - written);
        }
        written
    }
}
