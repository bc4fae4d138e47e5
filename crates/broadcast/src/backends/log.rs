//! TracingBackend - forwards messages as `tracing` events

use contracts::{Backend, ContractError};
use tracing::{info, instrument};

/// Backend that logs every message at `info` level
#[derive(Debug)]
pub struct TracingBackend {
    name: String,
}

impl TracingBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Backend for TracingBackend {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "tracing_backend_output",
        level = "trace",
        skip(self, bytes),
        fields(sink = %self.name, chars = char_count)
    )]
    fn output(&mut self, bytes: &[u8], char_count: usize) -> Result<(), ContractError> {
        let text = String::from_utf8_lossy(bytes);
        info!(sink = %self.name, message = %text.trim_end(), "Broadcast message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_backend_output() {
        let mut backend = TracingBackend::new("my_logger");
        assert_eq!(backend.name(), "my_logger");
        assert!(backend.output(b"hello\n", 6).is_ok());
        assert!(backend.flush().is_ok());
    }
}
