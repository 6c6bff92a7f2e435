//! Exchange configuration, immutable once the engine is constructed.

use hexlease_proto::options::code;
use hexlease_proto::Duid;
use serde::{Deserialize, Serialize};

use crate::timing::RetransmitParams;

/// Which identity-association flavor the session manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IaKind {
    /// Non-temporary addresses (IA-NA), with T1/T2 renewal thresholds.
    Na,
    /// Temporary addresses (IA-TA), no renewal thresholds on the wire.
    Ta,
}

impl IaKind {
    /// Wire option code for this IA flavor.
    pub fn option_code(self) -> u16 {
        match self {
            Self::Na => code::IA_NA,
            Self::Ta => code::IA_TA,
        }
    }
}

/// The IA the session requests: flavor plus the client-chosen IAID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IaDescriptor {
    /// IA flavor.
    pub kind: IaKind,
    /// Identity association id, chosen by the host and stable for the
    /// session.
    pub iaid: u32,
}

/// An opaque option the host wants carried in every outgoing message.
///
/// The engine never interprets these; they are appended after all
/// engine-generated options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOption {
    /// Option code.
    pub code: u16,
    /// Raw payload bytes.
    pub data: Vec<u8>,
}

impl RawOption {
    /// Worst-case wire footprint: header plus payload.
    pub fn wire_len(&self) -> usize {
        hexlease_proto::options::OPTION_HEADER_LEN + self.data.len()
    }
}

/// Exchange parameters for one client session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The client's DUID, read from durable storage once at creation.
    pub duid: Duid,
    /// The single IA this session manages.
    pub ia: IaDescriptor,
    /// Option codes requested from servers via the option-request option.
    pub oro: Vec<u16>,
    /// Host-supplied pass-through options, appended last to every message.
    pub options: Vec<RawOption>,
    /// Ask servers for the rapid-commit shortcut on Solicit.
    pub rapid_commit: bool,
    /// Override for the Solicit retransmission profile.
    pub solicit_timing: Option<RetransmitParams>,
    /// Override for the Information-Request retransmission profile.
    pub info_timing: Option<RetransmitParams>,
    /// Carry the client identifier in Information-Request messages.
    ///
    /// RFC 8415 §18.2.6 makes the client identifier optional there; hosts
    /// that want anonymity for stateless queries turn this off.
    pub send_client_id_in_info: bool,
}

impl ClientConfig {
    /// Configuration with defaults: no extra options, no overrides, no
    /// rapid commit.
    pub fn new(duid: Duid, ia: IaDescriptor) -> Self {
        Self {
            duid,
            ia,
            oro: Vec::new(),
            options: Vec::new(),
            rapid_commit: false,
            solicit_timing: None,
            info_timing: None,
            send_client_id_in_info: true,
        }
    }
}
