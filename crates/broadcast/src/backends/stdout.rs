//! StdoutBackend - process standard output

use std::io::{self, Write};

use contracts::{Backend, ContractError};

/// Backend writing every message to stdout
#[derive(Debug)]
pub struct StdoutBackend {
    name: String,
}

impl StdoutBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Backend for StdoutBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn output(&mut self, bytes: &[u8], _char_count: usize) -> Result<(), ContractError> {
        io::stdout()
            .lock()
            .write_all(bytes)
            .map_err(|e| ContractError::backend_write(&self.name, e.to_string()))
    }

    fn flush(&mut self) -> Result<(), ContractError> {
        io::stdout()
            .flush()
            .map_err(|e| ContractError::backend_write(&self.name, e.to_string()))
    }
}
