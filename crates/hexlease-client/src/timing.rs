//! Per-message-type retransmission timing profiles.
//!
//! The quadruplets come from the RFC 8415 §7.6 table. Solicit and
//! Information-Request accept configured overrides; Renew and Rebind
//! derive their maximum duration from the live lease at enqueue time.

use hexlease_proto::MessageType;
use serde::{Deserialize, Serialize};

/// Retransmission profile for one message type. All values are whole
/// seconds; zero means "no limit" for `mrc`, `mrt`, and `mrd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetransmitParams {
    /// Initial retransmission timeout.
    pub irt: u32,
    /// Maximum retransmission count.
    pub mrc: u32,
    /// Maximum retransmission timeout.
    pub mrt: u32,
    /// Maximum retransmission duration.
    pub mrd: u32,
}

/// SOL_TIMEOUT / SOL_MAX_RT.
pub const SOLICIT: RetransmitParams = RetransmitParams { irt: 1, mrc: 0, mrt: 3600, mrd: 0 };

/// REQ_TIMEOUT / REQ_MAX_RT / REQ_MAX_RC.
pub const REQUEST: RetransmitParams = RetransmitParams { irt: 1, mrc: 10, mrt: 30, mrd: 0 };

/// CNF_TIMEOUT / CNF_MAX_RT / CNF_MAX_RD.
pub const CONFIRM: RetransmitParams = RetransmitParams { irt: 1, mrc: 0, mrt: 4, mrd: 10 };

/// REN_TIMEOUT / REN_MAX_RT; duration bounded by the live `t2 - t1`.
pub const RENEW: RetransmitParams = RetransmitParams { irt: 10, mrc: 0, mrt: 600, mrd: 0 };

/// REB_TIMEOUT / REB_MAX_RT; duration bounded by the live expiry − `t2`.
pub const REBIND: RetransmitParams = RetransmitParams { irt: 10, mrc: 0, mrt: 600, mrd: 0 };

/// REL_TIMEOUT / REL_MAX_RC.
pub const RELEASE: RetransmitParams = RetransmitParams { irt: 1, mrc: 4, mrt: 0, mrd: 0 };

/// DEC_TIMEOUT / DEC_MAX_RC.
pub const DECLINE: RetransmitParams = RetransmitParams { irt: 1, mrc: 4, mrt: 0, mrd: 0 };

/// INF_TIMEOUT / INF_MAX_RT.
pub const INFO_REQUEST: RetransmitParams = RetransmitParams { irt: 1, mrc: 0, mrt: 3600, mrd: 0 };

/// Default profile for a client message type.
///
/// Server-originated types never reach the registry; they fall back to
/// the Solicit profile rather than panicking.
pub fn defaults(msg_type: MessageType) -> RetransmitParams {
    match msg_type {
        MessageType::Request => REQUEST,
        MessageType::Confirm => CONFIRM,
        MessageType::Renew => RENEW,
        MessageType::Rebind => REBIND,
        MessageType::Release => RELEASE,
        MessageType::Decline => DECLINE,
        MessageType::InformationRequest => INFO_REQUEST,
        _ => SOLICIT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_rfc_8415() {
        assert_eq!(defaults(MessageType::Solicit), SOLICIT);
        assert_eq!(defaults(MessageType::Request).mrc, 10);
        assert_eq!(defaults(MessageType::Confirm).mrd, 10);
        assert_eq!(defaults(MessageType::Renew).irt, 10);
        assert_eq!(defaults(MessageType::Release).mrc, 4);
        assert_eq!(defaults(MessageType::Decline).mrc, 4);
        assert_eq!(defaults(MessageType::InformationRequest).mrt, 3600);
    }
}
