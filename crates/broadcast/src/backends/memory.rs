//! MemoryBackend - growable in-memory buffer

use std::sync::Arc;

use contracts::{Backend, ContractError};
use parking_lot::Mutex;

/// Cloneable view of a [`MemoryBackend`]'s contents
#[derive(Debug, Clone, Default)]
pub struct MemoryBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemoryBuffer {
    /// Copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the contents, leaving the buffer empty.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.bytes.lock())
    }
}

/// Backend that appends every message to a shared buffer
#[derive(Debug)]
pub struct MemoryBackend {
    name: String,
    buffer: MemoryBuffer,
    messages: u64,
}

impl MemoryBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            buffer: MemoryBuffer::default(),
            messages: 0,
        }
    }

    /// Handle for reading the contents after the backend moved into a sink.
    pub fn buffer(&self) -> MemoryBuffer {
        self.buffer.clone()
    }

    /// Messages received.
    pub fn messages(&self) -> u64 {
        self.messages
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn output(&mut self, bytes: &[u8], _char_count: usize) -> Result<(), ContractError> {
        self.buffer.bytes.lock().extend_from_slice(bytes);
        self.messages += 1;
        Ok(())
    }
}
