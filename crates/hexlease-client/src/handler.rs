//! Dispatch of received messages against the current client state.
//!
//! Everything arriving here is untrusted. A message that fails any sanity
//! check — wrong direction, missing client/server identifier, transaction
//! id matching no outstanding record, malformed options — is silently
//! discarded and the receive loop simply re-arms; the retransmission
//! timers carry the exchange.

use std::net::Ipv6Addr;

use bytes::Bytes;
use hexlease_proto::options::{self, code, Dhcp6Option, OptionIter, PREFERENCE_MAX};
use hexlease_proto::{MessageType, Packet, StatusCode};
use tracing::{debug, trace};

use crate::action::ClientAction;
use crate::engine::{Advertisement, Client};
use crate::lease::{ClientState, Lease, LeaseAddress};

impl Client {
    /// The transport's receive entry point: parse, sanity-check, and
    /// dispatch one datagram.
    pub fn handle_receive(&mut self, datagram: &[u8]) -> Vec<ClientAction> {
        let packet = match Packet::parse(Bytes::copy_from_slice(datagram)) {
            Ok(packet) => packet,
            Err(err) => {
                trace!(%err, "discarding undecodable datagram");
                return Vec::new();
            },
        };
        if !packet.msg_type.is_server_message() {
            trace!(msg_type = %packet.msg_type, "discarding client-direction message");
            return Vec::new();
        }
        match options::seek_option(&packet.options, code::CLIENT_ID) {
            Some(duid) if duid == self.config.duid.as_bytes() => {},
            _ => {
                trace!("discarding message without our client identifier");
                return Vec::new();
            },
        }
        match packet.msg_type {
            MessageType::Advertise => self.on_advertise(packet),
            MessageType::Reply => self.on_reply(&packet),
            other => {
                trace!(msg_type = %other, "discarding unsupported server message");
                Vec::new()
            },
        }
    }

    fn on_advertise(&mut self, packet: Packet) -> Vec<ClientAction> {
        if self.state != ClientState::Selecting {
            trace!(state = %self.state, "advertise outside selecting");
            return Vec::new();
        }
        match self.retries.find(packet.xid) {
            Some(record) if record.msg_type == MessageType::Solicit => {},
            _ => {
                trace!(xid = %packet.xid, "advertise matches no outstanding solicit");
                return Vec::new();
            },
        }
        let Some(server_duid) = options::seek_option(&packet.options, code::SERVER_ID) else {
            trace!("advertise without server identifier");
            return Vec::new();
        };
        let server_duid = server_duid.to_vec();
        if self.exchange_status(&packet.options) == Some(StatusCode::NoAddrsAvail) {
            trace!("advertise reports no addresses available");
            return Vec::new();
        }
        let preference = options::seek_option(&packet.options, code::PREFERENCE)
            .and_then(|p| p.first().copied());
        let unicast = seek_unicast(&packet.options);

        let advertisement = Advertisement { server_duid, preference, unicast, packet };
        let accepted =
            self.advertise_selector.as_mut().is_some_and(|hook| hook(&advertisement));

        if accepted
            || advertisement.preference == Some(PREFERENCE_MAX)
            || self.accept_any_advertisement
        {
            debug!(preference = ?advertisement.preference, "advertisement selected");
            self.best_advertisement = Some(advertisement);
            return self.select_advertisement();
        }

        let better = match &self.best_advertisement {
            None => true,
            Some(best) => {
                advertisement.preference.unwrap_or(0) > best.preference.unwrap_or(0)
            },
        };
        if better {
            trace!(preference = ?advertisement.preference, "retaining advertisement");
            self.best_advertisement = Some(advertisement);
        }
        Vec::new()
    }

    /// Commit to the retained Advertise: retire the Solicit, adopt the
    /// server's unicast address, import the offered lease exactly as a
    /// Reply would, and move on to Request.
    pub(crate) fn select_advertisement(&mut self) -> Vec<ClientAction> {
        let Some(advertisement) = self.best_advertisement.take() else {
            return Vec::new();
        };
        self.retries.dequeue_type(MessageType::Solicit);
        self.accept_any_advertisement = false;
        if let Some(unicast) = advertisement.unicast {
            self.unicast_override = Some(unicast);
        }
        self.server_duid = Some(advertisement.server_duid.clone());
        // Advertise-driven import skips the T1/T2 ordering check; only
        // Reply processing enforces it.
        self.import_lease(&advertisement.packet.options, false);
        match self.send_request() {
            Ok(actions) => actions,
            Err(err) => {
                debug!(%err, "request send failed after selection");
                Vec::new()
            },
        }
    }

    fn on_reply(&mut self, packet: &Packet) -> Vec<ClientAction> {
        let Some(record) = self.retries.find(packet.xid) else {
            trace!(xid = %packet.xid, "reply matches no outstanding exchange");
            return Vec::new();
        };
        let origin = record.msg_type;
        let Some(server_duid) = options::seek_option(&packet.options, code::SERVER_ID) else {
            trace!("reply without server identifier");
            return Vec::new();
        };
        let server_duid = server_duid.to_vec();
        match origin {
            MessageType::Solicit => self.on_rapid_reply(packet, server_duid),
            MessageType::Decline | MessageType::Release => self.on_surrender_reply(packet, origin),
            MessageType::InformationRequest => self.on_info_reply(packet),
            MessageType::Request
            | MessageType::Renew
            | MessageType::Rebind
            | MessageType::Confirm => self.on_stateful_reply(packet, origin, server_duid),
            other => {
                trace!(origin = %other, "reply for unexpected exchange");
                Vec::new()
            },
        }
    }

    /// A Reply answering a Solicit is only valid under rapid commit, on
    /// both sides: the option must be present and we must have asked.
    fn on_rapid_reply(&mut self, packet: &Packet, server_duid: Vec<u8>) -> Vec<ClientAction> {
        let has_rapid = options::seek_option(&packet.options, code::RAPID_COMMIT).is_some();
        if !(self.config.rapid_commit && has_rapid) {
            trace!(
                configured = self.config.rapid_commit,
                offered = has_rapid,
                "rapid-commit mismatch"
            );
            return Vec::new();
        }
        if self.state != ClientState::Selecting {
            return Vec::new();
        }
        let status = self.exchange_status(&packet.options).unwrap_or(StatusCode::Success);
        if status != StatusCode::Success {
            trace!(%status, "rapid-commit reply not successful");
            return Vec::new();
        }
        if !self.import_lease(&packet.options, true) {
            return Vec::new();
        }
        self.retries.dequeue(packet.xid);
        self.best_advertisement = None;
        self.accept_any_advertisement = false;
        self.server_duid = Some(server_duid);
        if let Some(unicast) = seek_unicast(&packet.options) {
            self.unicast_override = Some(unicast);
        }
        self.bind(packet)
    }

    /// Any valid Reply completes a Decline/Release exchange, whatever its
    /// status says.
    fn on_surrender_reply(&mut self, packet: &Packet, origin: MessageType) -> Vec<ClientAction> {
        self.retries.dequeue(packet.xid);
        let surrendered: Vec<Ipv6Addr> =
            self.pending_surrender.drain(..).map(|entry| entry.addr).collect();
        let lease_cleared = self.lease.as_ref().is_none_or(Lease::is_exhausted);
        debug!(%origin, count = surrendered.len(), lease_cleared, "surrender complete");
        if lease_cleared {
            // Whole lease surrendered: back to Init, and this reply is
            // not worth caching.
            self.lease = None;
            self.state = ClientState::Init;
            self.server_duid = None;
            self.unicast_override = None;
        } else {
            self.state = ClientState::Bound;
        }
        vec![ClientAction::SurrenderComplete { exchange: origin, surrendered, lease_cleared }]
    }

    fn on_info_reply(&mut self, packet: &Packet) -> Vec<ClientAction> {
        self.retries.dequeue(packet.xid);
        let Some(at) = self.infos.iter().position(|info| info.xid == packet.xid) else {
            return Vec::new();
        };
        let info = self.infos.remove(at);
        debug!(xid = %packet.xid, "information-request complete");
        vec![ClientAction::InfoReply { handle: info.handle, options: packet.options.clone() }]
    }

    fn on_stateful_reply(
        &mut self,
        packet: &Packet,
        origin: MessageType,
        server_duid: Vec<u8>,
    ) -> Vec<ClientAction> {
        let status = self.exchange_status(&packet.options).unwrap_or(StatusCode::Success);
        match status {
            StatusCode::UseMulticast => {
                // The server refuses unicast; drop the override and let
                // the timer retransmit over multicast.
                debug!("server demands multicast, clearing unicast override");
                self.unicast_override = None;
                Vec::new()
            },
            StatusCode::NoBinding
                if matches!(origin, MessageType::Renew | MessageType::Rebind) =>
            {
                self.retries.dequeue(packet.xid);
                debug!(%origin, "server has no binding, falling back to request");
                match self.send_request() {
                    Ok(actions) => actions,
                    Err(err) => {
                        debug!(%err, "request send failed after no-binding");
                        Vec::new()
                    },
                }
            },
            StatusCode::NotOnLink if origin == MessageType::Confirm => {
                self.retries.dequeue(packet.xid);
                debug!("addresses not on link, restarting from solicit");
                self.stash_expired_addresses();
                self.server_duid = None;
                self.unicast_override = None;
                match self.send_solicit() {
                    Ok(actions) => actions,
                    Err(err) => {
                        debug!(%err, "solicit send failed after not-on-link");
                        Vec::new()
                    },
                }
            },
            StatusCode::Success => {
                if !self.import_lease(&packet.options, true) {
                    return Vec::new();
                }
                self.retries.dequeue(packet.xid);
                self.server_duid = Some(server_duid);
                if let Some(unicast) = seek_unicast(&packet.options) {
                    self.unicast_override = Some(unicast);
                }
                self.bind(packet)
            },
            other => {
                trace!(status = %other, %origin, "leaving exchange to the timer");
                Vec::new()
            },
        }
    }

    /// Import lease contents from an option region: replace the address
    /// set with every IA-Address whose valid lifetime covers its
    /// preferred lifetime, then recompute the timers. Returns false when
    /// the message must be discarded instead.
    fn import_lease(&mut self, region: &[u8], validate_timers: bool) -> bool {
        let kind_code = self.config.ia.kind.option_code();
        let Some(ia_payload) = options::seek_ia_option(region, kind_code, self.config.ia.iaid)
        else {
            // No IA for us is not a protocol violation (a Confirm reply
            // carries none); there is just nothing to import.
            return true;
        };
        let Ok((header, inner)) = options::parse_ia(kind_code, ia_payload) else {
            trace!("malformed IA option");
            return false;
        };
        if validate_timers && header.t2 != 0 && header.t1 > header.t2 {
            trace!(t1 = header.t1, t2 = header.t2, "rejecting IA with t1 > t2");
            return false;
        }
        let mut addrs = Vec::new();
        for item in OptionIter::new(inner) {
            match item {
                Ok(Dhcp6Option::IaAddr { address, .. }) => {
                    if address.valid >= address.preferred {
                        addrs.push(LeaseAddress {
                            addr: address.addr,
                            preferred: address.preferred,
                            valid: address.valid,
                        });
                    } else {
                        trace!(addr = %address.addr, "skipping address with valid < preferred");
                    }
                },
                Ok(_) => {},
                Err(err) => {
                    trace!(%err, "malformed IA sub-option");
                    return false;
                },
            }
        }
        let lease = self.lease.get_or_insert_with(|| Lease::new(self.config.ia));
        lease.replace_addresses(addrs);
        lease.compute_timers(header.t1, header.t2);
        true
    }

    /// Transition to Bound, cache the winning reply, and emit the lease
    /// snapshot (merging any addresses stashed before a Confirm restart).
    fn bind(&mut self, packet: &Packet) -> Vec<ClientAction> {
        debug!(from = %self.state, "bound");
        self.state = ClientState::Bound;
        self.last_reply = Some(packet.clone());
        let Some(lease) = self.lease.as_mut() else {
            return Vec::new();
        };
        lease.age = 0;
        let snapshot = lease.snapshot(&self.expired_cache);
        self.expired_cache.clear();
        vec![ClientAction::LeaseUpdated { lease: snapshot }]
    }

    /// Preserve the current addresses with zeroed lifetimes so the next
    /// bind's notification lets the host retire them.
    fn stash_expired_addresses(&mut self) {
        if let Some(lease) = self.lease.as_mut() {
            let mut stale = std::mem::take(&mut lease.addresses);
            for entry in &mut stale {
                entry.preferred = 0;
                entry.valid = 0;
            }
            for entry in stale {
                if !self.expired_cache.iter().any(|held| held.addr == entry.addr) {
                    self.expired_cache.push(entry);
                }
            }
            lease.t1 = 0;
            lease.t2 = 0;
            lease.all_expire = 0;
            lease.age = 0;
        }
    }

    /// Status-code search order: message level first, then inside our IA.
    fn exchange_status(&self, region: &[u8]) -> Option<StatusCode> {
        if let Some(status) = options::seek_status(region) {
            return Some(status);
        }
        let kind_code = self.config.ia.kind.option_code();
        let ia_payload = options::seek_ia_option(region, kind_code, self.config.ia.iaid)?;
        let (_, inner) = options::parse_ia(kind_code, ia_payload).ok()?;
        options::seek_status(inner)
    }
}

fn seek_unicast(region: &[u8]) -> Option<Ipv6Addr> {
    let payload = options::seek_option(region, code::UNICAST)?;
    if payload.len() < 16 {
        return None;
    }
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&payload[..16]);
    Some(Ipv6Addr::from(octets))
}
