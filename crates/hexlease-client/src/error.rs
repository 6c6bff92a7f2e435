//! Engine error types.

use std::net::Ipv6Addr;

use hexlease_proto::ProtocolError;
use thiserror::Error;

use crate::lease::ClientState;

/// Errors returned to the host from synchronous engine operations.
///
/// Received messages never produce errors — a message that fails
/// validation is discarded and the receive loop re-armed, per the
/// protocol-level error policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Operation is not valid in the current client state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// State the engine was in.
        state: ClientState,
        /// Operation the host attempted.
        operation: &'static str,
    },

    /// Operation needs a bound lease and none is held.
    #[error("no lease is currently held")]
    NoLease,

    /// Host asked to surrender an address the lease does not contain.
    #[error("address {0} is not part of the current lease")]
    AddressNotLeased(Ipv6Addr),

    /// Message assembly failed; the send was aborted and no retry record
    /// was created.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, ClientError>;
