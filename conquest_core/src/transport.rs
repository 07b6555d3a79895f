use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
    #[error("{0} is not supported by this transport")]
    Unsupported(&'static str),
    #[error("transport I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Byte channel between clients and the server.
///
/// Sends are attempted once; a failure is returned to the caller and nothing
/// is queued for retry.
pub trait Transport {
    fn send_to_server(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Delivers to every connected client; each client filters by address.
    fn broadcast(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send_to_server(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).send_to_server(bytes)
    }

    fn broadcast(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).broadcast(bytes)
    }
}

/// In-process transport that keeps every frame until it is taken.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    to_server: Vec<Vec<u8>>,
    broadcasts: Vec<Vec<u8>>,
    closed: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later send fail with [`TransportError::Closed`].
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn to_server(&self) -> &[Vec<u8>] {
        &self.to_server
    }

    pub fn broadcasts(&self) -> &[Vec<u8>] {
        &self.broadcasts
    }

    pub fn take_to_server(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.to_server)
    }

    pub fn take_broadcasts(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.broadcasts)
    }
}

impl Transport for MemoryTransport {
    fn send_to_server(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.to_server.push(bytes.to_vec());
        Ok(())
    }

    fn broadcast(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.broadcasts.push(bytes.to_vec());
        Ok(())
    }
}
