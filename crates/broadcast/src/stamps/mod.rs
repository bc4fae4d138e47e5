//! Stamp implementations
//!
//! - [`NullStamp`]: no prefix
//! - [`TextStamp`], [`SystemTimeStamp`]: fixed length, measured once
//! - [`LineStamp`]: variable length, measured under its lock on every render

mod line;
mod null;
mod system_time;
mod text;

use std::sync::Arc;

use contracts::{Stamp, StampKind};

pub use line::LineStamp;
pub use null::NullStamp;
pub use system_time::SystemTimeStamp;
pub use text::TextStamp;

/// Build the stamp described by a config entry.
pub fn from_kind(kind: &StampKind) -> Arc<dyn Stamp> {
    match kind {
        StampKind::None => Arc::new(NullStamp),
        StampKind::SystemTime => Arc::new(SystemTimeStamp::new()),
        StampKind::Line => Arc::new(LineStamp::new()),
        StampKind::Text(label) => Arc::new(TextStamp::new(label)),
    }
}
