//! Transport abstraction: any byte-oriented channel to the peer.
//!
//! Concrete implementations:
//! - USB/UART serial port ([`crate::adapters::serial`])
//! - scripted in-memory transports in tests
//!
//! The I/O thread is generic over [`Connector`], so the reconnect and
//! framing logic never depends on the serial crate.

use crate::error::ConnectionError;

/// Byte-oriented, blocking-with-timeout transport.
pub trait Transport: Send {
    /// Read up to `buf.len()` bytes.  Returns 0 when the read timeout
    /// elapsed with no data; an `Err` means the link is gone.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ConnectionError>;

    /// Write all of `data`.
    fn write_all(&mut self, data: &[u8]) -> Result<(), ConnectionError>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), ConnectionError>;
}

/// Opens fresh [`Transport`]s.  Called again after every link loss.
pub trait Connector: Send {
    type Transport: Transport;

    fn connect(&mut self) -> Result<Self::Transport, ConnectionError>;

    /// Human-readable endpoint name for logs.
    fn endpoint(&self) -> &str;
}
