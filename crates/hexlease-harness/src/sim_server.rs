//! A scripted DHCPv6 server model.
//!
//! Answers client messages the way a real server would for the happy
//! path, with per-exchange status overrides so scenarios can script
//! partial failures (`NoBinding` on Renew, `NotOnLink` on Confirm, and
//! so on). Counters record what the client actually sent.

use std::net::Ipv6Addr;

use bytes::Bytes;
use hexlease_proto::message::encode_header;
use hexlease_proto::options::{code, Dhcp6Option, IaAddress, OptionIter, OptionWriter};
use hexlease_proto::{MessageType, Packet, ProtocolError, StatusCode, TransactionId};

/// Scripted server: fixed identity, a fixed set of addresses to offer,
/// and optional status overrides per exchange.
#[derive(Debug, Clone)]
pub struct SimServer {
    /// Server DUID.
    pub duid: Vec<u8>,
    /// Preference carried in Advertise messages.
    pub preference: Option<u8>,
    /// Server unicast option carried in Advertise messages.
    pub unicast: Option<Ipv6Addr>,
    /// Honor rapid commit on Solicit.
    pub rapid_commit: bool,
    /// Addresses offered, as (address, preferred, valid).
    pub offers: Vec<(Ipv6Addr, u32, u32)>,
    /// T1 carried in IA options; zero lets the client derive it.
    pub t1: u32,
    /// T2 carried in IA options; zero lets the client derive it.
    pub t2: u32,
    /// Status attached to Advertise messages instead of addresses.
    pub advertise_status: Option<StatusCode>,
    /// Status answering Request instead of a binding.
    pub request_status: Option<StatusCode>,
    /// Status answering Renew instead of a binding.
    pub renew_status: Option<StatusCode>,
    /// Status answering Rebind instead of a binding.
    pub rebind_status: Option<StatusCode>,
    /// Status answering Confirm; defaults to Success.
    pub confirm_status: Option<StatusCode>,
    /// Options returned to Information-Request.
    pub info_options: Vec<(u16, Vec<u8>)>,
    /// Drop everything (simulates an unreachable server).
    pub silent: bool,
    /// Count of Solicit messages seen.
    pub solicits: usize,
    /// Count of Request messages seen.
    pub requests: usize,
    /// Count of Renew messages seen.
    pub renews: usize,
    /// Count of Rebind messages seen.
    pub rebinds: usize,
    /// Count of Confirm messages seen.
    pub confirms: usize,
    /// Count of Decline messages seen.
    pub declines: usize,
    /// Count of Release messages seen.
    pub releases: usize,
    /// Count of Information-Request messages seen.
    pub infos: usize,
}

impl SimServer {
    /// Server with the given DUID and nothing to offer yet.
    pub fn new(duid: impl Into<Vec<u8>>) -> Self {
        Self {
            duid: duid.into(),
            preference: None,
            unicast: None,
            rapid_commit: false,
            offers: Vec::new(),
            t1: 0,
            t2: 0,
            advertise_status: None,
            request_status: None,
            renew_status: None,
            rebind_status: None,
            confirm_status: None,
            info_options: Vec::new(),
            silent: false,
            solicits: 0,
            requests: 0,
            renews: 0,
            rebinds: 0,
            confirms: 0,
            declines: 0,
            releases: 0,
            infos: 0,
        }
    }

    /// Add one address to offer.
    pub fn offer(mut self, addr: Ipv6Addr, preferred: u32, valid: u32) -> Self {
        self.offers.push((addr, preferred, valid));
        self
    }

    /// Set the Advertise preference.
    pub fn preference(mut self, preference: u8) -> Self {
        self.preference = Some(preference);
        self
    }

    /// Set the IA timers carried on the wire.
    pub fn timers(mut self, t1: u32, t2: u32) -> Self {
        self.t1 = t1;
        self.t2 = t2;
        self
    }

    /// Handle one client datagram, producing the server's answer.
    pub fn handle(&mut self, datagram: &[u8]) -> Option<Vec<u8>> {
        if self.silent {
            return None;
        }
        let packet = Packet::parse(Bytes::copy_from_slice(datagram)).ok()?;
        let client_id =
            hexlease_proto::options::seek_option(&packet.options, code::CLIENT_ID)?.to_vec();
        // A message carrying a server identifier targets that server.
        if let Some(target) =
            hexlease_proto::options::seek_option(&packet.options, code::SERVER_ID)
        {
            if target != self.duid.as_slice() {
                return None;
            }
        }
        let ia = client_ia(&packet);

        match packet.msg_type {
            MessageType::Solicit => {
                self.solicits += 1;
                let wants_rapid = hexlease_proto::options::seek_option(
                    &packet.options,
                    code::RAPID_COMMIT,
                )
                .is_some();
                if self.rapid_commit && wants_rapid {
                    self.compose(MessageType::Reply, packet.xid, &client_id, |server, writer| {
                        writer.emit(code::RAPID_COMMIT, &[])?;
                        server.emit_ia(writer, ia)
                    })
                } else {
                    self.compose(
                        MessageType::Advertise,
                        packet.xid,
                        &client_id,
                        |server, writer| {
                            if let Some(preference) = server.preference {
                                writer.emit(code::PREFERENCE, &[preference])?;
                            }
                            if let Some(unicast) = server.unicast {
                                writer.emit(code::UNICAST, &unicast.octets())?;
                            }
                            if let Some(status) = server.advertise_status {
                                emit_status(writer, status)
                            } else {
                                server.emit_ia(writer, ia)
                            }
                        },
                    )
                }
            },
            MessageType::Request => {
                self.requests += 1;
                let status = self.request_status;
                self.binding_reply(packet.xid, &client_id, ia, status)
            },
            MessageType::Renew => {
                self.renews += 1;
                let status = self.renew_status;
                self.binding_reply(packet.xid, &client_id, ia, status)
            },
            MessageType::Rebind => {
                self.rebinds += 1;
                let status = self.rebind_status;
                self.binding_reply(packet.xid, &client_id, ia, status)
            },
            MessageType::Confirm => {
                self.confirms += 1;
                let status = self.confirm_status.unwrap_or(StatusCode::Success);
                self.compose(MessageType::Reply, packet.xid, &client_id, |_, writer| {
                    emit_status(writer, status)
                })
            },
            MessageType::Decline => {
                self.declines += 1;
                self.compose(MessageType::Reply, packet.xid, &client_id, |_, writer| {
                    emit_status(writer, StatusCode::Success)
                })
            },
            MessageType::Release => {
                self.releases += 1;
                self.compose(MessageType::Reply, packet.xid, &client_id, |_, writer| {
                    emit_status(writer, StatusCode::Success)
                })
            },
            MessageType::InformationRequest => {
                self.infos += 1;
                // Only return what the client asked for, when it asked.
                let requested: Option<Vec<u16>> =
                    hexlease_proto::options::seek_option(&packet.options, code::ORO)
                        .map(|oro| hexlease_proto::options::oro_codes(oro).collect());
                self.compose(MessageType::Reply, packet.xid, &client_id, |server, writer| {
                    for (code_val, data) in &server.info_options {
                        let wanted =
                            requested.as_ref().is_none_or(|codes| codes.contains(code_val));
                        if wanted {
                            writer.emit(*code_val, data)?;
                        }
                    }
                    Ok(())
                })
            },
            _ => None,
        }
    }

    fn binding_reply(
        &mut self,
        xid: TransactionId,
        client_id: &[u8],
        ia: Option<(u16, u32)>,
        status: Option<StatusCode>,
    ) -> Option<Vec<u8>> {
        self.compose(MessageType::Reply, xid, client_id, |server, writer| {
            if let Some(status) = status {
                emit_status(writer, status)
            } else {
                server.emit_ia(writer, ia)
            }
        })
    }

    fn compose(
        &mut self,
        msg_type: MessageType,
        xid: TransactionId,
        client_id: &[u8],
        build: impl FnOnce(&Self, &mut OptionWriter) -> Result<(), ProtocolError>,
    ) -> Option<Vec<u8>> {
        let mut buf = vec![0u8; 1024];
        encode_header(msg_type, xid, &mut buf).ok()?;
        let written;
        {
            let mut writer = OptionWriter::new(&mut buf, 4);
            writer.emit(code::CLIENT_ID, client_id).ok()?;
            writer.emit(code::SERVER_ID, &self.duid).ok()?;
            build(self, &mut writer).ok()?;
            written = writer.len();
        }
        buf.truncate(written);
        Some(buf)
    }

    fn emit_ia(
        &self,
        writer: &mut OptionWriter,
        ia: Option<(u16, u32)>,
    ) -> Result<(), ProtocolError> {
        let Some((kind, iaid)) = ia else {
            return Ok(());
        };
        let mut payload = Vec::new();
        payload.extend_from_slice(&iaid.to_be_bytes());
        if kind == code::IA_NA {
            payload.extend_from_slice(&self.t1.to_be_bytes());
            payload.extend_from_slice(&self.t2.to_be_bytes());
        }
        for &(addr, preferred, valid) in &self.offers {
            let fixed = IaAddress { addr, preferred, valid }.encode();
            payload.extend_from_slice(&code::IA_ADDR.to_be_bytes());
            payload.extend_from_slice(&(fixed.len() as u16).to_be_bytes());
            payload.extend_from_slice(&fixed);
        }
        writer.emit(kind, &payload)?;
        Ok(())
    }
}

fn emit_status(writer: &mut OptionWriter, status: StatusCode) -> Result<(), ProtocolError> {
    writer.emit(code::STATUS_CODE, &u16::from(status).to_be_bytes())?;
    Ok(())
}

/// The IA flavor and id the client asked about, if any.
fn client_ia(packet: &Packet) -> Option<(u16, u32)> {
    for item in OptionIter::new(&packet.options) {
        match item {
            Ok(Dhcp6Option::IaNa { header, .. }) => return Some((code::IA_NA, header.iaid)),
            Ok(Dhcp6Option::IaTa { iaid, .. }) => return Some((code::IA_TA, iaid)),
            Ok(_) => {},
            Err(_) => return None,
        }
    }
    None
}
