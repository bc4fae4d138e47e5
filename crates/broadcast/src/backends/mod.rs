//! Backend implementations

mod file;
mod log;
mod memory;
mod stdout;

pub use self::file::{FileBackend, FileBackendConfig};
pub use self::log::TracingBackend;
pub use self::memory::{MemoryBackend, MemoryBuffer};
pub use self::stdout::StdoutBackend;
