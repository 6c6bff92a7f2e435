//! Client message assembly.
//!
//! One build input describes any of the eight client message types; the
//! engine fills it from the current lease/config state. Buffers are sized
//! for the fixed base plus every option's worst case before writing, so
//! the bounds-checked emitter only fails on a sizing bug.

use bytes::BytesMut;
use hexlease_proto::message::{self, HEADER_LEN};
use hexlease_proto::options::{self, code, OptionWriter, OPTION_HEADER_LEN};
use hexlease_proto::{Duid, MessageType, TransactionId};

use crate::config::RawOption;
use crate::error::Result;
use crate::lease::IaBuildRequest;

/// Everything needed to assemble one outgoing message.
#[derive(Debug)]
pub struct BuildInput<'a> {
    /// Message type being assembled.
    pub msg_type: MessageType,
    /// Transaction id for the new exchange.
    pub xid: TransactionId,
    /// Client identifier; `None` only for an anonymous
    /// Information-Request.
    pub client_duid: Option<&'a Duid>,
    /// Server identifier where the exchange targets a specific server.
    pub server_duid: Option<&'a [u8]>,
    /// IA option to carry, already snapshotted from the lease.
    pub ia: Option<&'a IaBuildRequest>,
    /// Carry T1/T2 on the wire; Decline/Release zero them.
    pub ia_with_timers: bool,
    /// Option-request list.
    pub oro: &'a [u16],
    /// Ask for the rapid-commit shortcut (Solicit only).
    pub rapid_commit: bool,
    /// Host pass-through options, appended last.
    pub extra: &'a [RawOption],
}

/// An assembled message plus the offset of its elapsed-time field.
#[derive(Debug)]
pub struct BuiltMessage {
    /// Serialized message.
    pub payload: BytesMut,
    /// Absolute offset of the 2-byte elapsed-time value, patched on each
    /// retransmit.
    pub elapsed_at: usize,
}

/// Assemble a message in the fixed option order: client identifier,
/// elapsed time, IA, server identifier, option-request list, rapid
/// commit, pass-through options last.
pub fn build_message(input: &BuildInput<'_>) -> Result<BuiltMessage> {
    let mut capacity = HEADER_LEN + OPTION_HEADER_LEN + 2;
    if let Some(duid) = input.client_duid {
        capacity += OPTION_HEADER_LEN + duid.len();
    }
    if let Some(server) = input.server_duid {
        capacity += OPTION_HEADER_LEN + server.len();
    }
    if let Some(ia) = input.ia {
        capacity += ia.wire_len();
    }
    if !input.oro.is_empty() {
        capacity += OPTION_HEADER_LEN + 2 * input.oro.len();
    }
    if input.rapid_commit {
        capacity += OPTION_HEADER_LEN;
    }
    capacity += input.extra.iter().map(RawOption::wire_len).sum::<usize>();

    let mut buf = BytesMut::zeroed(capacity);
    message::encode_header(input.msg_type, input.xid, &mut buf)?;

    let written;
    let elapsed_at;
    {
        let mut writer = OptionWriter::new(&mut buf, HEADER_LEN);
        if let Some(duid) = input.client_duid {
            writer.emit(code::CLIENT_ID, duid.as_bytes())?;
        }
        elapsed_at = writer.emit(code::ELAPSED_TIME, &[0, 0])?;
        if let Some(ia) = input.ia {
            let ia_payload = encode_ia(ia, input.ia_with_timers);
            writer.emit(ia.ia.kind.option_code(), &ia_payload)?;
        }
        if let Some(server) = input.server_duid {
            writer.emit(code::SERVER_ID, server)?;
        }
        if !input.oro.is_empty() {
            let mut oro = Vec::with_capacity(2 * input.oro.len());
            for code_val in input.oro {
                oro.extend_from_slice(&code_val.to_be_bytes());
            }
            writer.emit(code::ORO, &oro)?;
        }
        if input.rapid_commit {
            writer.emit(code::RAPID_COMMIT, &[])?;
        }
        for opt in input.extra {
            writer.emit(opt.code, &opt.data)?;
        }
        written = writer.len();
    }
    buf.truncate(written);
    Ok(BuiltMessage { payload: buf, elapsed_at })
}

fn encode_ia(ia: &IaBuildRequest, with_timers: bool) -> Vec<u8> {
    use crate::config::IaKind;

    let mut payload = Vec::with_capacity(ia.wire_len() - OPTION_HEADER_LEN);
    payload.extend_from_slice(&ia.ia.iaid.to_be_bytes());
    if ia.ia.kind == IaKind::Na {
        let (t1, t2) = if with_timers { (ia.t1, ia.t2) } else { (0, 0) };
        payload.extend_from_slice(&t1.to_be_bytes());
        payload.extend_from_slice(&t2.to_be_bytes());
    }
    for entry in &ia.addresses {
        let fixed = options::IaAddress {
            addr: entry.addr,
            preferred: entry.preferred,
            valid: entry.valid,
        }
        .encode();
        payload.extend_from_slice(&code::IA_ADDR.to_be_bytes());
        payload.extend_from_slice(&(fixed.len() as u16).to_be_bytes());
        payload.extend_from_slice(&fixed);
    }
    payload
}

/// Re-locate the elapsed-time field after a pre-send hook may have
/// replaced the buffer wholesale.
pub fn locate_elapsed(payload: &[u8]) -> Option<usize> {
    if payload.len() < HEADER_LEN {
        return None;
    }
    let region = &payload[HEADER_LEN..];
    let mut offset = 0;
    while offset + OPTION_HEADER_LEN <= region.len() {
        let code_val = u16::from_be_bytes([region[offset], region[offset + 1]]);
        let len = usize::from(u16::from_be_bytes([region[offset + 2], region[offset + 3]]));
        let payload_at = offset + OPTION_HEADER_LEN;
        if payload_at + len > region.len() {
            return None;
        }
        if code_val == code::ELAPSED_TIME && len >= 2 {
            return Some(HEADER_LEN + payload_at);
        }
        offset = payload_at + len;
    }
    None
}

#[cfg(test)]
mod tests {
    use hexlease_proto::options::seek_option;
    use hexlease_proto::Packet;

    use super::*;
    use crate::config::{IaDescriptor, IaKind};
    use crate::lease::LeaseAddress;

    fn duid() -> Duid {
        Duid::new(vec![0x00, 0x03, 0x00, 0x01, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]).unwrap()
    }

    fn ia_request() -> IaBuildRequest {
        IaBuildRequest {
            ia: IaDescriptor { kind: IaKind::Na, iaid: 0x1234 },
            t1: 100,
            t2: 200,
            addresses: vec![LeaseAddress {
                addr: "2001:db8::1".parse().unwrap(),
                preferred: 1800,
                valid: 3600,
            }],
        }
    }

    #[test]
    fn option_order_is_fixed() {
        let duid = duid();
        let ia = ia_request();
        let server = [0u8; 6];
        let input = BuildInput {
            msg_type: MessageType::Request,
            xid: TransactionId::from_u32(0xabcdef),
            client_duid: Some(&duid),
            server_duid: Some(&server),
            ia: Some(&ia),
            ia_with_timers: true,
            oro: &[23, 24],
            rapid_commit: false,
            extra: &[RawOption { code: 0x99, data: vec![1] }],
        };
        let built = build_message(&input).unwrap();

        let packet = Packet::parse(built.payload.clone().freeze()).unwrap();
        assert_eq!(packet.msg_type, MessageType::Request);

        // Every option present and the elapsed offset points at its field.
        let region = packet.options.as_ref();
        assert_eq!(seek_option(region, code::CLIENT_ID), Some(duid.as_bytes()));
        assert!(seek_option(region, code::SERVER_ID).is_some());
        assert!(seek_option(region, code::IA_NA).is_some());
        assert_eq!(seek_option(region, code::ORO), Some(&[0, 23, 0, 24][..]));
        assert!(seek_option(region, 0x99).is_some());
        assert_eq!(locate_elapsed(&built.payload), Some(built.elapsed_at));
    }

    #[test]
    fn ia_timers_zeroed_for_surrender() {
        let ia = ia_request();
        let with = encode_ia(&ia, true);
        let without = encode_ia(&ia, false);
        assert_eq!(&with[4..8], &100u32.to_be_bytes());
        assert_eq!(&without[4..12], &[0u8; 8]);
        // Addresses still carried either way.
        assert_eq!(with.len(), without.len());
    }

    #[test]
    fn anonymous_info_request_omits_client_id() {
        let input = BuildInput {
            msg_type: MessageType::InformationRequest,
            xid: TransactionId::from_u32(1),
            client_duid: None,
            server_duid: None,
            ia: None,
            ia_with_timers: false,
            oro: &[23],
            rapid_commit: false,
            extra: &[],
        };
        let built = build_message(&input).unwrap();
        let packet = Packet::parse(built.payload.clone().freeze()).unwrap();
        assert_eq!(seek_option(&packet.options, code::CLIENT_ID), None);
        assert!(seek_option(&packet.options, code::ELAPSED_TIME).is_some());
    }

    #[test]
    fn buffer_sized_exactly() {
        let duid = duid();
        let input = BuildInput {
            msg_type: MessageType::Solicit,
            xid: TransactionId::from_u32(2),
            client_duid: Some(&duid),
            server_duid: None,
            ia: None,
            ia_with_timers: false,
            oro: &[],
            rapid_commit: true,
            extra: &[],
        };
        let built = build_message(&input).unwrap();
        // header + client id + elapsed + rapid commit
        let expected = HEADER_LEN
            + OPTION_HEADER_LEN
            + duid.len()
            + OPTION_HEADER_LEN
            + 2
            + OPTION_HEADER_LEN;
        assert_eq!(built.payload.len(), expected);
    }
}
