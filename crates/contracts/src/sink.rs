//! Backend trait - sink output interface
//!
//! A backend is the concrete destination behind a sink (file, stdout,
//! memory, ...). Backends are only ever called with the owning sink's lock
//! held, so they take `&mut self` and need no internal synchronization.

use crate::ContractError;

/// Byte destination behind a sink
///
/// Output is best effort: a returned error is logged and counted by the
/// caller but never interrupts a broadcast.
pub trait Backend: Send {
    /// Backend name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one stamped message.
    ///
    /// `char_count` is the number of UTF-8 characters in `bytes`, which is
    /// less than `bytes.len()` for non-ASCII text.
    ///
    /// # Errors
    /// Returns write error (should include context)
    fn output(&mut self, bytes: &[u8], char_count: usize) -> Result<(), ContractError>;

    /// Flush buffered output (if any)
    fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn output(&mut self, bytes: &[u8], char_count: usize) -> Result<(), ContractError> {
        (**self).output(bytes, char_count)
    }

    fn flush(&mut self) -> Result<(), ContractError> {
        (**self).flush()
    }
}
