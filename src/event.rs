//! Events delivered to the user callback.
//!
//! The event is a tagged sum type: callers match on the variant, and a
//! producer populates only the matching arm's fields.

use crate::qos::QoS;

/// Outcome of a CONNECT attempt, as reported in a [`Event::Connect`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConnectStatus {
    /// The broker accepted the connection.
    Accepted,
    /// The broker rejected an unacceptable protocol version.
    RefusedProtocol,
    /// The broker rejected the client identifier.
    RefusedIdentifier,
    /// The broker (or its backing service) is unavailable.
    RefusedServer,
    /// The broker rejected the supplied username/password.
    RefusedUserPass,
    /// The broker rejected the client as not authorized.
    RefusedNotAuthorized,
    /// The transport failed to establish a connection at all.
    TcpFailed,
}

impl ConnectStatus {
    /// Map a CONNACK return code to a status. Any code ≥ 6 (outside the
    /// five standard codes) is treated as `RefusedServer`.
    pub(crate) fn from_connack_code(code: u8) -> ConnectStatus {
        match code {
            0 => ConnectStatus::Accepted,
            1 => ConnectStatus::RefusedProtocol,
            2 => ConnectStatus::RefusedIdentifier,
            3 => ConnectStatus::RefusedServer,
            4 => ConnectStatus::RefusedUserPass,
            5 => ConnectStatus::RefusedNotAuthorized,
            _ => ConnectStatus::RefusedServer,
        }
    }
}

/// The result of a single acknowledged request (publish/subscribe/
/// unsubscribe completion).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RequestResult {
    /// The broker acknowledged the request successfully.
    Ok,
    /// The broker's acknowledgement carried a failure return code, or the
    /// request was cancelled by a forced teardown.
    Err,
}

/// Events delivered synchronously to the user callback from within the
/// engine.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a, Arg> {
    /// The outcome of a `connect()` call.
    Connect {
        /// Acceptance or refusal status.
        status: ConnectStatus,
    },
    /// The link has gone down, whether cleanly or not.
    Disconnect {
        /// Whether this followed a graceful `disconnect()` (true) or an
        /// unexpected transport closure / send failure (false is also
        /// possible mid-CONNECT; see the state machine).
        is_accepted: bool,
    },
    /// A previously issued publish has completed (QoS 1/2 acknowledged,
    /// or QoS 0 fully handed to the transport).
    Publish {
        /// The argument supplied to the originating `publish()` call.
        arg: Option<Arg>,
        /// Whether the broker acknowledged success.
        result: RequestResult,
    },
    /// An inbound PUBLISH from the broker.
    PublishRecv {
        /// The topic name.
        topic: &'a str,
        /// The payload bytes.
        payload: &'a [u8],
        /// The QoS the publish arrived at.
        qos: QoS,
        /// The DUP flag on the wire packet.
        dup: bool,
        /// The RETAIN flag on the wire packet.
        retain: bool,
    },
    /// A previously issued subscribe has been acknowledged.
    Subscribe {
        /// The argument supplied to the originating `subscribe()` call.
        arg: Option<Arg>,
        /// Whether the broker granted at least one requested QoS.
        result: RequestResult,
    },
    /// A previously issued unsubscribe has been acknowledged.
    Unsubscribe {
        /// The argument supplied to the originating `unsubscribe()` call.
        arg: Option<Arg>,
        /// Whether the broker acknowledged success.
        result: RequestResult,
    },
    /// A PINGRESP arrived, confirming the link is alive.
    KeepAlive,
}
