//! Message header and framing.

use std::fmt;
use std::net::Ipv6Addr;

use bytes::Bytes;
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::error::{ProtocolError, Result};

/// UDP port the client listens on.
pub const CLIENT_PORT: u16 = 546;

/// UDP port servers and relay agents listen on.
pub const SERVER_PORT: u16 = 547;

/// All_DHCP_Relay_Agents_and_Servers link-scoped multicast group.
pub const ALL_RELAY_AGENTS_AND_SERVERS: Ipv6Addr =
    Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0x1, 0x2);

/// Length of the fixed message header (type + transaction id).
pub const HEADER_LEN: usize = 4;

/// DHCPv6 message types, RFC 8415 §7.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum MessageType {
    /// Client locates servers.
    Solicit = 1,
    /// Server answers a Solicit.
    Advertise = 2,
    /// Client requests addresses from a chosen server.
    Request = 3,
    /// Client verifies addresses after a possible link change.
    Confirm = 4,
    /// Client extends lifetimes with the binding server.
    Renew = 5,
    /// Client extends lifetimes with any server.
    Rebind = 6,
    /// Server answers Request/Confirm/Renew/Rebind/Decline/Release, or a
    /// Solicit when rapid commit is in play.
    Reply = 7,
    /// Client returns addresses it no longer uses.
    Release = 8,
    /// Client reports addresses already in use on the link.
    Decline = 9,
    /// Server asks the client to initiate an exchange.
    Reconfigure = 10,
    /// Client requests configuration without addresses.
    InformationRequest = 11,
    /// Relay agent towards a server.
    RelayForward = 12,
    /// Server towards a relay agent.
    RelayReply = 13,
}

impl MessageType {
    /// Decode a wire message-type octet.
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            1 => Self::Solicit,
            2 => Self::Advertise,
            3 => Self::Request,
            4 => Self::Confirm,
            5 => Self::Renew,
            6 => Self::Rebind,
            7 => Self::Reply,
            8 => Self::Release,
            9 => Self::Decline,
            10 => Self::Reconfigure,
            11 => Self::InformationRequest,
            12 => Self::RelayForward,
            13 => Self::RelayReply,
            other => return Err(ProtocolError::InvalidMessageType(other)),
        })
    }

    /// True for message types only a server originates.
    pub fn is_server_message(self) -> bool {
        matches!(self, Self::Advertise | Self::Reply | Self::Reconfigure | Self::RelayReply)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Solicit => "solicit",
            Self::Advertise => "advertise",
            Self::Request => "request",
            Self::Confirm => "confirm",
            Self::Renew => "renew",
            Self::Rebind => "rebind",
            Self::Reply => "reply",
            Self::Release => "release",
            Self::Decline => "decline",
            Self::Reconfigure => "reconfigure",
            Self::InformationRequest => "information-request",
            Self::RelayForward => "relay-forw",
            Self::RelayReply => "relay-repl",
        };
        f.write_str(name)
    }
}

/// 24-bit transaction id correlating an exchange, RFC 8415 §16.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId([u8; 3]);

impl TransactionId {
    /// Build from the low 24 bits of `value`.
    pub fn from_u32(value: u32) -> Self {
        Self([(value >> 16) as u8, (value >> 8) as u8, value as u8])
    }

    /// Wire representation.
    pub fn as_bytes(&self) -> [u8; 3] {
        self.0
    }
}

impl From<[u8; 3]> for TransactionId {
    fn from(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

/// A parsed incoming message: header fields plus the raw option region.
///
/// The option region is kept as [`Bytes`] so handlers can hold on to a
/// received Reply (the engine caches the winning one) without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Message type from the first header octet.
    pub msg_type: MessageType,
    /// Transaction id from the remaining three header octets.
    pub xid: TransactionId,
    /// Flat option region following the header.
    pub options: Bytes,
}

impl Packet {
    /// Parse a datagram into header fields and option region.
    ///
    /// Option contents are not validated here; handlers walk the region
    /// with the bounds-checked seek functions as they need to.
    pub fn parse(datagram: Bytes) -> Result<Self> {
        if datagram.len() < HEADER_LEN {
            return Err(ProtocolError::ShortMessage(datagram.len()));
        }
        let msg_type = MessageType::from_u8(datagram[0])?;
        let xid = TransactionId::from([datagram[1], datagram[2], datagram[3]]);
        Ok(Self { msg_type, xid, options: datagram.slice(HEADER_LEN..) })
    }
}

/// Write the fixed 4-byte header into the front of `out`.
pub fn encode_header(msg_type: MessageType, xid: TransactionId, out: &mut [u8]) -> Result<()> {
    if out.len() < HEADER_LEN {
        return Err(ProtocolError::BufferTooSmall { needed: HEADER_LEN, capacity: out.len() });
    }
    out[0] = msg_type as u8;
    out[1..HEADER_LEN].copy_from_slice(&xid.as_bytes());
    Ok(())
}
