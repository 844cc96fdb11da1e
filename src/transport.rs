//! The abstract, non-blocking transport the engine is driven by.
//!
//! The engine never reads or writes a socket directly. It calls into a
//! [`Transport`] to open a connection, hand it bytes to send, and close
//! it; the embedder drives the engine back with the matching events
//! (`on_connect_active`, `on_data_received`, `on_send_complete`,
//! `on_poll`, `on_closed`, `on_connect_error`) as they occur on the real
//! link. Everything here runs synchronously and non-blockingly: a
//! `Transport` implementation must never park the calling thread.

/// Host-provided non-blocking transport.
///
/// Implementations drive the client back by calling its `on_*` event
/// methods as the underlying link makes progress. See the module
/// documentation for the full event contract.
pub trait Transport {
    /// An opaque error type surfaced to the user through
    /// [`crate::error::Error::Transport`].
    type Error;

    /// Begin opening a connection to `host:port`. Must not block; the
    /// outcome is reported later via `on_connect_active` or
    /// `on_connect_error`.
    fn start(&mut self, host: &str, port: u16) -> Result<(), Self::Error>;

    /// Hand `data` to the transport for sending. Must not block and must
    /// not be called again until the previous send has completed (the
    /// engine enforces this with its own `is_sending` flag). Returns
    /// `Ok(())` if the send was accepted for processing; completion is
    /// reported later via `on_send_complete`.
    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Begin closing the connection. Completion (or an already-closed
    /// link) is reported via `on_closed`.
    fn close(&mut self) -> Result<(), Self::Error>;
}
