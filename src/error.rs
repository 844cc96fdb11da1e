//! Error types for the MQTT engine.

/// A common error type for the MQTT engine.
///
/// This enum covers both local rejections (bad arguments, exhausted
/// resources) and errors surfaced by the embedder's transport, which are
/// carried through opaquely rather than inspected.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error<T> {
    /// A generic, otherwise-uncategorized failure.
    Err,
    /// The TX ring buffer or the request table has no room for this
    /// operation.
    ErrMem,
    /// The operation requires a connected (or connecting) client but the
    /// client is `Disconnected`.
    Closed,
    /// A malformed packet was received where a well-formed one was
    /// expected (used internally; protocol violations from the peer are
    /// otherwise logged and ignored per the state machine's policy).
    Protocol,
    /// The topic name/filter was empty, which MQTT 3.1.1 never permits.
    InvalidTopic,
    /// An error reported by the embedder's transport implementation.
    Transport(T),
}

#[cfg(feature = "defmt")]
impl<T: defmt::Format> defmt::Format for Error<T> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Err => defmt::write!(f, "Err"),
            Error::ErrMem => defmt::write!(f, "ErrMem"),
            Error::Closed => defmt::write!(f, "Closed"),
            Error::Protocol => defmt::write!(f, "Protocol"),
            Error::InvalidTopic => defmt::write!(f, "InvalidTopic"),
            Error::Transport(e) => defmt::write!(f, "Transport({})", e),
        }
    }
}

#[cfg(feature = "std")]
impl<T: core::fmt::Debug> core::fmt::Display for Error<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(self, f)
    }
}

#[cfg(feature = "std")]
impl<T: core::fmt::Debug> std::error::Error for Error<T> {}
