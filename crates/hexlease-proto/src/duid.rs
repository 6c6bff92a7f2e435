//! DUID: the durable identifier correlating a client or server across
//! messages, RFC 8415 §11.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Opaque DUID. The engine never interprets the contents; it only compares
/// them byte-for-byte and copies them into client/server identifier
/// options.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Duid(Vec<u8>);

impl Duid {
    /// Maximum DUID length, RFC 8415 §11.1.
    pub const MAX_LEN: usize = 130;

    /// Wrap raw DUID bytes, rejecting empty or oversized identifiers.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() || bytes.len() > Self::MAX_LEN {
            return Err(ProtocolError::InvalidDuidLength(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// Wire representation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; `new` rejects empty DUIDs.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Duid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(Duid::new(Vec::new()).is_err());
        assert!(Duid::new(vec![0u8; 131]).is_err());
        assert!(Duid::new(vec![0u8; 130]).is_ok());
    }

    #[test]
    fn display_is_hex() {
        let duid = Duid::new(vec![0x00, 0x01, 0xab]).unwrap();
        assert_eq!(duid.to_string(), "0001ab");
    }
}
