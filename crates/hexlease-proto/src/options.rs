//! Option TLV encoding, seeking, and parsing.
//!
//! The option region of a message is a flat sequence of
//! `(2-byte code, 2-byte length, payload)` triples in network byte order.
//! Seeking trusts each option's self-reported length to skip to the next
//! one, but never past the enclosing buffer: a declared length that
//! overruns the region terminates the scan. IA options additionally
//! carry a fixed header (IAID, and T1/T2 for IA-NA) which must be
//! length-validated before the nested option region is computed.

use std::net::Ipv6Addr;

use crate::error::{ProtocolError, Result};
use crate::status::StatusCode;

/// Option codes used by the client exchange, RFC 8415 §21.
pub mod code {
    /// Client identifier (DUID).
    pub const CLIENT_ID: u16 = 1;
    /// Server identifier (DUID).
    pub const SERVER_ID: u16 = 2;
    /// Identity association for non-temporary addresses.
    pub const IA_NA: u16 = 3;
    /// Identity association for temporary addresses.
    pub const IA_TA: u16 = 4;
    /// Address nested inside an IA option.
    pub const IA_ADDR: u16 = 5;
    /// Option request list.
    pub const ORO: u16 = 6;
    /// Server preference in an Advertise.
    pub const PREFERENCE: u16 = 7;
    /// Time since the exchange began, in centiseconds.
    pub const ELAPSED_TIME: u16 = 8;
    /// Server unicast address the client may send to directly.
    pub const UNICAST: u16 = 12;
    /// Exchange or per-IA status.
    pub const STATUS_CODE: u16 = 13;
    /// Rapid commit: a Reply may answer a Solicit directly.
    pub const RAPID_COMMIT: u16 = 14;
}

/// Bytes occupied by an option's code + length header.
pub const OPTION_HEADER_LEN: usize = 4;

/// Fixed IA-NA header: IAID + T1 + T2.
pub const IA_NA_HEADER_LEN: usize = 12;

/// Fixed IA-TA header: IAID only.
pub const IA_TA_HEADER_LEN: usize = 4;

/// Fixed IA-Address layout: address + preferred + valid lifetimes.
pub const IA_ADDR_FIXED_LEN: usize = 24;

/// Maximum preference a server can declare; ends selection immediately.
pub const PREFERENCE_MAX: u8 = 255;

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

/// Bounds-checked option emitter over a caller-sized buffer.
///
/// Builders size the destination for the header plus every option's worst
/// case before writing, so [`ProtocolError::BufferTooSmall`] indicates a
/// sizing bug rather than a recoverable condition.
#[derive(Debug)]
pub struct OptionWriter<'a> {
    buf: &'a mut [u8],
    cursor: usize,
}

impl<'a> OptionWriter<'a> {
    /// Wrap a destination buffer; emission starts at `offset`.
    pub fn new(buf: &'a mut [u8], offset: usize) -> Self {
        Self { buf, cursor: offset }
    }

    /// Emit one `(code, length, payload)` triple.
    ///
    /// Returns the absolute offset of the payload within the buffer, so
    /// callers that must patch a field on retransmit (elapsed time) can
    /// record where it lives.
    pub fn emit(&mut self, code: u16, payload: &[u8]) -> Result<usize> {
        if payload.len() > usize::from(u16::MAX) {
            return Err(ProtocolError::OversizedOption(payload.len()));
        }
        let needed = OPTION_HEADER_LEN + payload.len();
        let capacity = self.buf.len().saturating_sub(self.cursor);
        if capacity < needed {
            return Err(ProtocolError::BufferTooSmall { needed, capacity });
        }
        self.buf[self.cursor..self.cursor + 2].copy_from_slice(&code.to_be_bytes());
        self.buf[self.cursor + 2..self.cursor + 4]
            .copy_from_slice(&(payload.len() as u16).to_be_bytes());
        let payload_at = self.cursor + OPTION_HEADER_LEN;
        self.buf[payload_at..payload_at + payload.len()].copy_from_slice(payload);
        self.cursor += needed;
        Ok(payload_at)
    }

    /// Total bytes written so far, including any offset passed to `new`.
    pub fn len(&self) -> usize {
        self.cursor
    }

    /// True when nothing has been emitted and `new` was given offset 0.
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }
}

/// Find the first option with `wanted` in a flat option region.
///
/// Returns the option payload. A truncated trailing option terminates the
/// scan without being matched.
pub fn seek_option(region: &[u8], wanted: u16) -> Option<&[u8]> {
    let mut offset = 0;
    while offset + OPTION_HEADER_LEN <= region.len() {
        let code = read_u16(region, offset);
        let len = usize::from(read_u16(region, offset + 2));
        let payload_at = offset + OPTION_HEADER_LEN;
        if payload_at + len > region.len() {
            return None;
        }
        if code == wanted {
            return Some(&region[payload_at..payload_at + len]);
        }
        offset = payload_at + len;
    }
    None
}

/// Find the IA option of `ia_code` whose 4-byte IAID at the fixed offset
/// matches `iaid`. Returns the whole option payload (fixed header plus
/// nested options).
pub fn seek_ia_option(region: &[u8], ia_code: u16, iaid: u32) -> Option<&[u8]> {
    let mut offset = 0;
    while offset + OPTION_HEADER_LEN <= region.len() {
        let code = read_u16(region, offset);
        let len = usize::from(read_u16(region, offset + 2));
        let payload_at = offset + OPTION_HEADER_LEN;
        if payload_at + len > region.len() {
            return None;
        }
        if code == ia_code && len >= 4 && read_u32(region, payload_at) == iaid {
            return Some(&region[payload_at..payload_at + len]);
        }
        offset = payload_at + len;
    }
    None
}

/// Fixed header of an IA option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IaHeader {
    /// Identity association id.
    pub iaid: u32,
    /// Renew threshold in seconds; zero for IA-TA.
    pub t1: u32,
    /// Rebind threshold in seconds; zero for IA-TA.
    pub t2: u32,
}

/// Split an IA option payload into its fixed header and nested option
/// region, validating the declared length against the fixed IA-NA or
/// IA-TA header first. An undersized payload is malformed.
pub fn parse_ia(ia_code: u16, payload: &[u8]) -> Result<(IaHeader, &[u8])> {
    let fixed = match ia_code {
        code::IA_NA => IA_NA_HEADER_LEN,
        code::IA_TA => IA_TA_HEADER_LEN,
        other => return Err(ProtocolError::MalformedOption { code: other, len: payload.len() }),
    };
    if payload.len() < fixed {
        return Err(ProtocolError::MalformedOption { code: ia_code, len: payload.len() });
    }
    let header = IaHeader {
        iaid: read_u32(payload, 0),
        t1: if ia_code == code::IA_NA { read_u32(payload, 4) } else { 0 },
        t2: if ia_code == code::IA_NA { read_u32(payload, 8) } else { 0 },
    };
    Ok((header, &payload[fixed..]))
}

/// One leased address as carried by an IA-Address option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IaAddress {
    /// The leased IPv6 address.
    pub addr: Ipv6Addr,
    /// Preferred lifetime in seconds.
    pub preferred: u32,
    /// Valid lifetime in seconds.
    pub valid: u32,
}

impl IaAddress {
    /// Parse the fixed IA-Address layout, returning the address fields and
    /// the nested option region that follows them.
    pub fn parse(payload: &[u8]) -> Result<(Self, &[u8])> {
        if payload.len() < IA_ADDR_FIXED_LEN {
            return Err(ProtocolError::MalformedOption {
                code: code::IA_ADDR,
                len: payload.len(),
            });
        }
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&payload[..16]);
        let addr = Self {
            addr: Ipv6Addr::from(octets),
            preferred: read_u32(payload, 16),
            valid: read_u32(payload, 20),
        };
        Ok((addr, &payload[IA_ADDR_FIXED_LEN..]))
    }

    /// Encode the fixed layout (no nested options).
    pub fn encode(&self) -> [u8; IA_ADDR_FIXED_LEN] {
        let mut out = [0u8; IA_ADDR_FIXED_LEN];
        out[..16].copy_from_slice(&self.addr.octets());
        out[16..20].copy_from_slice(&self.preferred.to_be_bytes());
        out[20..24].copy_from_slice(&self.valid.to_be_bytes());
        out
    }
}

/// Look up the status-code option in a region. Absent status means
/// success, so the return distinguishes "no option" from a parsed code.
pub fn seek_status(region: &[u8]) -> Option<StatusCode> {
    let payload = seek_option(region, code::STATUS_CODE)?;
    if payload.len() < 2 {
        return None;
    }
    Some(StatusCode::from(read_u16(payload, 0)))
}

/// Iterate the 16-bit option codes of an ORO payload.
pub fn oro_codes(payload: &[u8]) -> impl Iterator<Item = u16> + '_ {
    payload.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
}

/// A parsed option, borrowed from the enclosing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dhcp6Option<'a> {
    /// Client identifier DUID bytes.
    ClientId(&'a [u8]),
    /// Server identifier DUID bytes.
    ServerId(&'a [u8]),
    /// IA-NA: fixed header plus nested option region.
    IaNa {
        /// Fixed IA header.
        header: IaHeader,
        /// Nested option region (IA-Address, status).
        options: &'a [u8],
    },
    /// IA-TA: IAID plus nested option region.
    IaTa {
        /// Identity association id.
        iaid: u32,
        /// Nested option region.
        options: &'a [u8],
    },
    /// IA-Address: address fields plus nested option region.
    IaAddr {
        /// Address and lifetimes.
        address: IaAddress,
        /// Nested option region (status).
        options: &'a [u8],
    },
    /// Option request list.
    Oro(&'a [u8]),
    /// Server preference.
    Preference(u8),
    /// Elapsed time in centiseconds.
    ElapsedTime(u16),
    /// Status code plus UTF-8 message bytes.
    Status {
        /// Parsed status code.
        status: StatusCode,
        /// Server-supplied message, passed through opaquely.
        message: &'a [u8],
    },
    /// Rapid commit marker.
    RapidCommit,
    /// Server unicast address.
    Unicast(Ipv6Addr),
    /// Any option this client does not interpret; passed through opaquely.
    Other {
        /// Option code.
        code: u16,
        /// Raw payload.
        data: &'a [u8],
    },
}

impl<'a> Dhcp6Option<'a> {
    fn parse(code_val: u16, payload: &'a [u8]) -> Result<Self> {
        let malformed =
            || ProtocolError::MalformedOption { code: code_val, len: payload.len() };
        Ok(match code_val {
            code::CLIENT_ID => Self::ClientId(payload),
            code::SERVER_ID => Self::ServerId(payload),
            code::IA_NA => {
                let (header, options) = parse_ia(code::IA_NA, payload)?;
                Self::IaNa { header, options }
            },
            code::IA_TA => {
                let (header, options) = parse_ia(code::IA_TA, payload)?;
                Self::IaTa { iaid: header.iaid, options }
            },
            code::IA_ADDR => {
                let (address, options) = IaAddress::parse(payload)?;
                Self::IaAddr { address, options }
            },
            code::ORO => {
                if payload.len() % 2 != 0 {
                    return Err(malformed());
                }
                Self::Oro(payload)
            },
            code::PREFERENCE => {
                let value = *payload.first().ok_or_else(malformed)?;
                Self::Preference(value)
            },
            code::ELAPSED_TIME => {
                if payload.len() < 2 {
                    return Err(malformed());
                }
                Self::ElapsedTime(read_u16(payload, 0))
            },
            code::STATUS_CODE => {
                if payload.len() < 2 {
                    return Err(malformed());
                }
                Self::Status { status: StatusCode::from(read_u16(payload, 0)), message: &payload[2..] }
            },
            code::RAPID_COMMIT => Self::RapidCommit,
            code::UNICAST => {
                if payload.len() < 16 {
                    return Err(malformed());
                }
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&payload[..16]);
                Self::Unicast(Ipv6Addr::from(octets))
            },
            other => Self::Other { code: other, data: payload },
        })
    }
}

/// Iterator over the options of a flat region.
///
/// Yields `Err` once for a truncated trailing option, then stops. Fixed-
/// layout violations surface as per-item errors so callers can skip a bad
/// option without abandoning the rest of the region.
#[derive(Debug)]
pub struct OptionIter<'a> {
    region: &'a [u8],
    offset: usize,
    poisoned: bool,
}

impl<'a> OptionIter<'a> {
    /// Iterate the options of `region`.
    pub fn new(region: &'a [u8]) -> Self {
        Self { region, offset: 0, poisoned: false }
    }
}

impl<'a> Iterator for OptionIter<'a> {
    type Item = Result<Dhcp6Option<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.poisoned || self.offset >= self.region.len() {
            return None;
        }
        if self.offset + OPTION_HEADER_LEN > self.region.len() {
            self.poisoned = true;
            return Some(Err(ProtocolError::Truncated { offset: self.offset }));
        }
        let code_val = read_u16(self.region, self.offset);
        let len = usize::from(read_u16(self.region, self.offset + 2));
        let payload_at = self.offset + OPTION_HEADER_LEN;
        if payload_at + len > self.region.len() {
            self.poisoned = true;
            return Some(Err(ProtocolError::Truncated { offset: self.offset }));
        }
        self.offset = payload_at + len;
        Some(Dhcp6Option::parse(code_val, &self.region[payload_at..payload_at + len]))
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn emit_and_seek_round_trip() {
        let mut buf = [0u8; 64];
        let mut writer = OptionWriter::new(&mut buf, 0);
        writer.emit(code::CLIENT_ID, &[0xaa, 0xbb]).unwrap();
        writer.emit(code::ELAPSED_TIME, &[0x01, 0x02]).unwrap();
        let written = writer.len();

        assert_eq!(seek_option(&buf[..written], code::CLIENT_ID), Some(&[0xaa, 0xbb][..]));
        assert_eq!(seek_option(&buf[..written], code::ELAPSED_TIME), Some(&[0x01, 0x02][..]));
        assert_eq!(seek_option(&buf[..written], code::SERVER_ID), None);
    }

    #[test]
    fn emit_reports_payload_offset() {
        let mut buf = [0u8; 32];
        let mut writer = OptionWriter::new(&mut buf, 4);
        let at = writer.emit(code::ELAPSED_TIME, &[0, 0]).unwrap();
        assert_eq!(at, 8);
        buf[at..at + 2].copy_from_slice(&0x1234u16.to_be_bytes());
        assert_eq!(seek_option(&buf[4..12], code::ELAPSED_TIME), Some(&[0x12, 0x34][..]));
    }

    #[test]
    fn emit_rejects_undersized_buffer() {
        let mut buf = [0u8; 6];
        let mut writer = OptionWriter::new(&mut buf, 0);
        let err = writer.emit(code::CLIENT_ID, &[1, 2, 3]).unwrap_err();
        assert_eq!(err, ProtocolError::BufferTooSmall { needed: 7, capacity: 6 });
    }

    #[test]
    fn truncated_option_terminates_seek() {
        // Declares 8 payload bytes but only 2 follow.
        let region = hex!("0001 0008 aabb");
        assert_eq!(seek_option(&region, code::CLIENT_ID), None);
        assert_eq!(seek_option(&region, code::SERVER_ID), None);
    }

    #[test]
    fn seek_ia_matches_on_iaid() {
        let mut buf = [0u8; 64];
        let mut writer = OptionWriter::new(&mut buf, 0);
        let mut ia = Vec::new();
        ia.extend_from_slice(&7u32.to_be_bytes());
        ia.extend_from_slice(&100u32.to_be_bytes());
        ia.extend_from_slice(&200u32.to_be_bytes());
        writer.emit(code::IA_NA, &ia).unwrap();
        let written = writer.len();

        assert!(seek_ia_option(&buf[..written], code::IA_NA, 7).is_some());
        assert!(seek_ia_option(&buf[..written], code::IA_NA, 8).is_none());
        assert!(seek_ia_option(&buf[..written], code::IA_TA, 7).is_none());
    }

    #[test]
    fn undersized_ia_rejected_not_overread() {
        // IA-NA payload of 8 bytes: shorter than the 12-byte fixed header.
        let err = parse_ia(code::IA_NA, &[0u8; 8]).unwrap_err();
        assert_eq!(err, ProtocolError::MalformedOption { code: code::IA_NA, len: 8 });

        // IA-TA needs only the 4-byte IAID.
        let (header, inner) = parse_ia(code::IA_TA, &[0, 0, 0, 9]).unwrap();
        assert_eq!(header.iaid, 9);
        assert_eq!(header.t1, 0);
        assert!(inner.is_empty());
    }

    #[test]
    fn ia_addr_round_trip() {
        let original = IaAddress {
            addr: "2001:db8::1".parse().unwrap(),
            preferred: 1800,
            valid: 3600,
        };
        let encoded = original.encode();
        let (parsed, inner) = IaAddress::parse(&encoded).unwrap();
        assert_eq!(parsed, original);
        assert!(inner.is_empty());

        let err = IaAddress::parse(&encoded[..20]).unwrap_err();
        assert_eq!(err, ProtocolError::MalformedOption { code: code::IA_ADDR, len: 20 });
    }

    #[test]
    fn option_iter_parses_tagged_variants() {
        let mut buf = [0u8; 96];
        let mut writer = OptionWriter::new(&mut buf, 0);
        writer.emit(code::PREFERENCE, &[255]).unwrap();
        writer.emit(code::RAPID_COMMIT, &[]).unwrap();
        writer.emit(code::STATUS_CODE, &hex!("0003 6e6f 2d62 696e 64")).unwrap();
        writer.emit(0x00f0, &[1, 2, 3]).unwrap();
        let written = writer.len();

        let parsed: Vec<_> =
            OptionIter::new(&buf[..written]).collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(parsed.len(), 4);
        assert_eq!(parsed[0], Dhcp6Option::Preference(255));
        assert_eq!(parsed[1], Dhcp6Option::RapidCommit);
        assert!(matches!(
            parsed[2],
            Dhcp6Option::Status { status: StatusCode::NoBinding, .. }
        ));
        assert!(matches!(parsed[3], Dhcp6Option::Other { code: 0x00f0, .. }));
    }

    #[test]
    fn option_iter_poisons_on_truncation() {
        let region = hex!("0007 0001 ff 0001 00ff");
        let mut iter = OptionIter::new(&region);
        assert!(matches!(iter.next(), Some(Ok(Dhcp6Option::Preference(255)))));
        assert!(matches!(iter.next(), Some(Err(ProtocolError::Truncated { .. }))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn status_defaults_to_absent() {
        let mut buf = [0u8; 32];
        let mut writer = OptionWriter::new(&mut buf, 0);
        writer.emit(code::CLIENT_ID, &[1]).unwrap();
        let written = writer.len();
        assert_eq!(seek_status(&buf[..written]), None);
    }

    proptest! {
        // Encoding an option then seeking it recovers the original
        // code/length/payload for any payload length a 16-bit field can
        // describe (bounded here to keep the test fast).
        #[test]
        fn emit_seek_round_trip(code_val in 1u16..=100, payload in proptest::collection::vec(any::<u8>(), 0..512)) {
            let mut buf = vec![0u8; OPTION_HEADER_LEN + payload.len()];
            let mut writer = OptionWriter::new(&mut buf, 0);
            writer.emit(code_val, &payload).unwrap();
            let written = writer.len();
            prop_assert_eq!(written, OPTION_HEADER_LEN + payload.len());
            prop_assert_eq!(seek_option(&buf[..written], code_val), Some(payload.as_slice()));
        }
    }
}
