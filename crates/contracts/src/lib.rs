//! # Contracts
//!
//! Shared interface contracts for the broadcast workspace: identifiers,
//! settings storage, the backend / stamp / transcoder traits, the config
//! model and the unified error type.
//! All business crates depend on this crate; reverse dependencies are prohibited.
//!
//! ## Priority model
//! - Priority `0` is the most severe message
//! - A message passes a target when it is enabled and `priority <= filter`

mod config;
mod error;
mod ids;
mod report;
mod settings;
mod sink;
mod stamp;
mod transcode;

pub use config::*;
pub use error::*;
pub use ids::{ChannelId, SinkId, MAX_CHANNELS};
pub use report::{FlushOutcome, FlushReport};
pub use settings::*;
pub use sink::Backend;
pub use stamp::{Stamp, StampLock};
pub use transcode::{Transcoder, WideText};
