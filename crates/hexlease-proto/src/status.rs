//! Status codes carried in the status-code option, RFC 8415 §21.13.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-reported outcome of an exchange or of a single IA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    /// Success.
    Success,
    /// Failure for an unspecified reason.
    UnspecFail,
    /// Server has no addresses available for the IA.
    NoAddrsAvail,
    /// Server has no binding for the client.
    NoBinding,
    /// Address prefix is not appropriate for the client's link.
    NotOnLink,
    /// Client must use the multicast address to reach the server.
    UseMulticast,
    /// Server has no prefixes available for the IA.
    NoPrefixAvail,
    /// Code this client does not recognize.
    Unknown(u16),
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::UnspecFail,
            2 => Self::NoAddrsAvail,
            3 => Self::NoBinding,
            4 => Self::NotOnLink,
            5 => Self::UseMulticast,
            6 => Self::NoPrefixAvail,
            other => Self::Unknown(other),
        }
    }
}

impl From<StatusCode> for u16 {
    fn from(status: StatusCode) -> Self {
        match status {
            StatusCode::Success => 0,
            StatusCode::UnspecFail => 1,
            StatusCode::NoAddrsAvail => 2,
            StatusCode::NoBinding => 3,
            StatusCode::NotOnLink => 4,
            StatusCode::UseMulticast => 5,
            StatusCode::NoPrefixAvail => 6,
            StatusCode::Unknown(other) => other,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::UnspecFail => f.write_str("unspec-fail"),
            Self::NoAddrsAvail => f.write_str("no-addrs-avail"),
            Self::NoBinding => f.write_str("no-binding"),
            Self::NotOnLink => f.write_str("not-on-link"),
            Self::UseMulticast => f.write_str("use-multicast"),
            Self::NoPrefixAvail => f.write_str("no-prefix-avail"),
            Self::Unknown(code) => write!(f, "unknown({code})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_known_codes() {
        for code in 0..7u16 {
            assert_eq!(u16::from(StatusCode::from(code)), code);
        }
    }

    #[test]
    fn unknown_codes_preserved() {
        assert_eq!(StatusCode::from(700), StatusCode::Unknown(700));
        assert_eq!(u16::from(StatusCode::Unknown(700)), 700);
    }
}
