//! DHCPv6 client protocol engine.
//!
//! Drives a single client conversation with DHCPv6 servers per RFC
//! 3315/8415: Solicit/Advertise/Request/Reply, Renew/Rebind, Confirm,
//! Decline, Release, and Information-Request, with randomized-backoff
//! retransmission and best-advertisement selection.
//!
//! # Architecture: Action-Based State Machine
//!
//! The engine follows the action pattern:
//! - The once-per-second [`Client::tick`] and the transport's
//!   [`Client::handle_receive`] are the only two entry points
//! - Both return `Vec<ClientAction>` describing intended effects
//! - Driver code executes actions (send datagrams, notify the host, etc.)
//!
//! This enables:
//! - Pure protocol logic (no sockets, no clocks, nothing blocks)
//! - Deterministic testing (seeded RNG, virtual ticks)
//! - One serialized execution context per session: both entry points take
//!   `&mut self`, so the required non-interleaving is enforced by the
//!   borrow checker rather than by convention
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐ Solicit ┌───────────┐ Advertise ┌────────────┐ Reply ┌───────┐
//! │ Init │────────>│ Selecting │──────────>│ Requesting │──────>│ Bound │
//! └──────┘         └───────────┘           └────────────┘       └───┬───┘
//!     ^                                                            │
//!     │  budget exhausted / lease surrendered      t1 / t2 / link  │
//!     └──────────────┬─────────────────────────────────────────────┘
//!          ┌─────────┴──────────┬────────────┬───────────┐
//!          │ Renewing/Rebinding │ Confirming │ Declining │ Releasing
//!          └────────────────────┴────────────┴───────────┘
//! ```
//!
//! # Components
//!
//! - [`config`]: exchange parameters, immutable after construction
//! - [`lease`]: the IA control block and its merge/deprive/timer algebra
//! - [`retry`]: per-message retransmission records and backoff timing
//! - [`build`]: client message assembly
//! - [`engine`]: the instance, host operations, and the tick driver
//! - [`handler`]: dispatch of received Advertise/Reply messages

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod action;
pub mod build;
pub mod config;
pub mod engine;
pub mod error;
pub mod handler;
pub mod lease;
pub mod retry;
pub mod timing;

pub use action::{ClientAction, InfoHandle};
pub use config::{ClientConfig, IaDescriptor, IaKind, RawOption};
pub use engine::Client;
pub use error::ClientError;
pub use lease::{ClientState, Lease, LeaseAddress, LeaseSnapshot};
pub use timing::RetransmitParams;
