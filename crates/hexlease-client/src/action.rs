//! Actions returned by the engine for the driver to execute.

use std::net::SocketAddrV6;

use bytes::Bytes;
use hexlease_proto::MessageType;

use crate::lease::LeaseSnapshot;

/// Handle correlating an Information-Request with its completion action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHandle(pub u64);

/// One effect the driver must carry out.
///
/// The driver (host glue or test harness) executes these in order:
/// `Transmit` goes to the UDP send primitive, everything else notifies
/// the host. The engine never performs I/O itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Send this datagram.
    Transmit {
        /// Unicast override or the all-servers multicast group, port 547.
        destination: SocketAddrV6,
        /// The serialized message.
        payload: Bytes,
    },

    /// The lease changed: a new binding, a refreshed one, or addresses
    /// zero-lifetimed on failure. Around a Confirm-triggered restart the
    /// snapshot also carries the previous addresses with valid lifetime
    /// zero so the host can tear down stale forwarding state.
    LeaseUpdated {
        /// Snapshot of the IA after the change.
        lease: LeaseSnapshot,
    },

    /// An exchange exhausted its retry budget.
    ExchangeFailed {
        /// Message type of the abandoned exchange.
        exchange: MessageType,
    },

    /// A Decline or Release exchange finished (any server status counts
    /// as completion).
    SurrenderComplete {
        /// `Decline` or `Release`.
        exchange: MessageType,
        /// Addresses that were surrendered.
        surrendered: Vec<std::net::Ipv6Addr>,
        /// True when the whole lease was surrendered and the session
        /// returned to Init.
        lease_cleared: bool,
    },

    /// A Reply answered an Information-Request.
    InfoReply {
        /// Handle returned from [`crate::Client::info_request`].
        handle: InfoHandle,
        /// Raw option region of the Reply, passed through opaquely.
        options: Bytes,
    },

    /// An Information-Request exhausted its retry budget or the session
    /// was stopped while it was pending.
    InfoTimeout {
        /// Handle returned from [`crate::Client::info_request`].
        handle: InfoHandle,
    },
}
