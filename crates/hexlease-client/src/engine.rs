//! The client instance: host operations and the per-second tick driver.
//!
//! One [`Client`] is one session. The host calls the operation surface
//! (`start`, `renew`, `decline`, `release`, `info_request`, `stop`) and
//! feeds the two entry points — [`Client::tick`] once per second and
//! [`Client::handle_receive`] for every datagram — executing the returned
//! [`ClientAction`]s. Both entry points take `&mut self`, so the
//! serialization the protocol requires is enforced by the borrow checker.

use std::fmt;
use std::net::{Ipv6Addr, SocketAddrV6};

use bytes::BytesMut;
use hexlease_proto::message::{ALL_RELAY_AGENTS_AND_SERVERS, SERVER_PORT};
use hexlease_proto::{MessageType, Packet, TransactionId};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, trace, warn};

use crate::action::{ClientAction, InfoHandle};
use crate::build::{build_message, locate_elapsed, BuildInput, BuiltMessage};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::lease::{ClientState, IaBuildRequest, Lease, LeaseAddress, LeaseSnapshot};
use crate::retry::{CleanupScope, RetryRegistry};
use crate::timing::{self, RetransmitParams};

/// An Advertise retained during server selection.
#[derive(Debug, Clone)]
pub struct Advertisement {
    /// DUID of the advertising server.
    pub server_duid: Vec<u8>,
    /// Declared preference, if the server sent one.
    pub preference: Option<u8>,
    /// Server unicast address, if offered.
    pub unicast: Option<Ipv6Addr>,
    /// The full Advertise, imported on selection exactly as a Reply
    /// would be.
    pub packet: Packet,
}

/// A pending stateless exchange.
#[derive(Debug, Clone)]
pub struct InfoRequestRecord {
    /// Transaction id of the outstanding Information-Request.
    pub xid: TransactionId,
    /// Handle the completion action will carry.
    pub handle: InfoHandle,
}

/// Hook that may inspect or wholesale-replace an outgoing message.
pub type SendHook = Box<dyn FnMut(MessageType, &mut BytesMut) + Send>;

/// Hook consulted per Advertise; returning true selects it immediately.
pub type AdvertiseSelector = Box<dyn FnMut(&Advertisement) -> bool + Send>;

/// One DHCPv6 client session.
pub struct Client {
    pub(crate) config: ClientConfig,
    pub(crate) state: ClientState,
    pub(crate) lease: Option<Lease>,
    pub(crate) retries: RetryRegistry,
    pub(crate) infos: Vec<InfoRequestRecord>,
    pub(crate) best_advertisement: Option<Advertisement>,
    pub(crate) accept_any_advertisement: bool,
    pub(crate) unicast_override: Option<Ipv6Addr>,
    pub(crate) server_duid: Option<Vec<u8>>,
    pub(crate) pending_surrender: Vec<LeaseAddress>,
    pub(crate) expired_cache: Vec<LeaseAddress>,
    pub(crate) last_reply: Option<Packet>,
    pub(crate) exchange_start: Option<u64>,
    pub(crate) ticks: u64,
    link_present: bool,
    next_info_handle: u64,
    rng: StdRng,
    send_hook: Option<SendHook>,
    pub(crate) advertise_selector: Option<AdvertiseSelector>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state)
            .field("lease", &self.lease)
            .field("in_flight", &self.retries.len())
            .field("pending_infos", &self.infos.len())
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a session with entropy-seeded backoff jitter.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create a session with a fixed seed for deterministic tests.
    pub fn with_seed(config: ClientConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: ClientConfig, rng: StdRng) -> Self {
        Self {
            config,
            state: ClientState::Init,
            lease: None,
            retries: RetryRegistry::new(),
            infos: Vec::new(),
            best_advertisement: None,
            accept_any_advertisement: false,
            unicast_override: None,
            server_duid: None,
            pending_surrender: Vec::new(),
            expired_cache: Vec::new(),
            last_reply: None,
            exchange_start: None,
            ticks: 0,
            link_present: true,
            next_info_handle: 0,
            rng,
            send_hook: None,
            advertise_selector: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Snapshot of the current IA, if one is held.
    pub fn lease(&self) -> Option<LeaseSnapshot> {
        self.lease.as_ref().map(|lease| lease.snapshot(&self.expired_cache))
    }

    /// The raw Reply that produced the current binding, if cached.
    pub fn last_reply(&self) -> Option<&Packet> {
        self.last_reply.as_ref()
    }

    /// Install a hook that may replace any outgoing message wholesale.
    pub fn set_send_hook(&mut self, hook: SendHook) {
        self.send_hook = Some(hook);
    }

    /// Install the per-Advertise selection hook.
    pub fn set_advertise_selector(&mut self, selector: AdvertiseSelector) {
        self.advertise_selector = Some(selector);
    }

    /// Begin the stateful conversation: send Solicit and enter Selecting.
    pub fn start(&mut self) -> Result<Vec<ClientAction>> {
        if self.state != ClientState::Init {
            return Err(ClientError::InvalidState { state: self.state, operation: "start" });
        }
        self.lease = Some(Lease::new(self.config.ia));
        self.send_solicit()
    }

    /// Host-initiated Renew (or Rebind when `rebind` is set).
    pub fn renew(&mut self, rebind: bool) -> Result<Vec<ClientAction>> {
        if self.state != ClientState::Bound {
            return Err(ClientError::InvalidState { state: self.state, operation: "renew" });
        }
        if rebind { self.send_rebind() } else { self.send_renew() }
    }

    /// Report `addrs` as already in use on the link, surrendering them.
    pub fn decline(&mut self, addrs: &[Ipv6Addr]) -> Result<Vec<ClientAction>> {
        self.surrender(MessageType::Decline, ClientState::Declining, addrs)
    }

    /// Return `addrs` to the server, surrendering them.
    pub fn release(&mut self, addrs: &[Ipv6Addr]) -> Result<Vec<ClientAction>> {
        self.surrender(MessageType::Release, ClientState::Releasing, addrs)
    }

    /// Launch a stateless Information-Request. The returned handle
    /// correlates with the eventual `InfoReply` or `InfoTimeout` action.
    pub fn info_request(&mut self, oro: &[u16]) -> Result<(InfoHandle, Vec<ClientAction>)> {
        let handle = InfoHandle(self.next_info_handle);
        self.next_info_handle += 1;
        let xid = self.new_xid();
        let client_duid =
            if self.config.send_client_id_in_info { Some(&self.config.duid) } else { None };
        let input = BuildInput {
            msg_type: MessageType::InformationRequest,
            xid,
            client_duid,
            server_duid: None,
            ia: None,
            ia_with_timers: false,
            oro,
            rapid_commit: false,
            extra: &self.config.options,
        };
        let built = build_message(&input)?;
        let params = self.config.info_timing.unwrap_or(timing::INFO_REQUEST);
        self.infos.push(InfoRequestRecord { xid, handle });
        let actions = self.transmit(MessageType::InformationRequest, xid, built, params, None);
        Ok((handle, actions))
    }

    /// Tear the session down: every in-flight record is removed, pending
    /// Information-Requests fire their timeout actions, and the lease is
    /// released from memory.
    pub fn stop(&mut self) -> Vec<ClientAction> {
        let removed = self.retries.cleanup(CleanupScope::All);
        let mut actions = Vec::new();
        for record in &removed {
            if record.is_stateless() {
                if let Some(at) = self.infos.iter().position(|i| i.xid == record.xid) {
                    let info = self.infos.remove(at);
                    actions.push(ClientAction::InfoTimeout { handle: info.handle });
                }
            }
        }
        debug!(dropped = removed.len(), "session stopped");
        self.infos.clear();
        self.lease = None;
        self.state = ClientState::Init;
        self.best_advertisement = None;
        self.accept_any_advertisement = false;
        self.unicast_override = None;
        self.server_duid = None;
        self.pending_surrender.clear();
        self.expired_cache.clear();
        self.last_reply = None;
        actions
    }

    /// The once-per-second entry point: ages the lease, watches the link,
    /// and drives every outstanding retransmission timer.
    pub fn tick(&mut self, link_present: bool) -> Vec<ClientAction> {
        self.ticks += 1;
        let mut actions = Vec::new();

        if self.state.ages_lease() {
            if let Some(lease) = self.lease.as_mut() {
                lease.age += 1;
                let (age, t1, t2) = (lease.age, lease.t1, lease.t2);
                if t2 != 0 && age > t2 && self.state != ClientState::Rebinding {
                    debug!(age, t2, "crossed t2, rebinding");
                    match self.send_rebind() {
                        Ok(sent) => actions.extend(sent),
                        Err(err) => warn!(%err, "rebind send failed"),
                    }
                } else if t1 != 0 && age > t1 && self.state == ClientState::Bound {
                    debug!(age, t1, "crossed t1, renewing");
                    match self.send_renew() {
                        Ok(sent) => actions.extend(sent),
                        Err(err) => warn!(%err, "renew send failed"),
                    }
                }
            }
        }

        let was_present = self.link_present;
        self.link_present = link_present;
        if !was_present
            && link_present
            && self.state == ClientState::Bound
            && self.lease.as_ref().is_some_and(|l| !l.is_exhausted())
        {
            debug!("link reattached, confirming");
            match self.send_confirm() {
                Ok(sent) => actions.extend(sent),
                Err(err) => warn!(%err, "confirm send failed"),
            }
        }

        actions.extend(self.drive_retries());
        actions
    }

    fn drive_retries(&mut self) -> Vec<ClientAction> {
        let mut actions = Vec::new();
        let mut idx = 0;
        while idx < self.retries.records.len() {
            let due = {
                let record = &mut self.retries.records[idx];
                record.ticks_since_send += 1;
                record.ticks_since_send > record.current_timeout
            };
            if !due {
                idx += 1;
                continue;
            }

            let (msg_type, first_timeout) = {
                let record = &self.retries.records[idx];
                (record.msg_type, record.retry_count == 0)
            };

            // A Solicit's first timeout runs selection instead of
            // retransmitting once at least one Advertise has been seen.
            if msg_type == MessageType::Solicit && first_timeout {
                if self.best_advertisement.is_some() {
                    debug!("first solicit timeout, selecting best advertisement");
                    actions.extend(self.select_advertisement());
                    continue; // selection dequeued the record
                }
                self.accept_any_advertisement = true;
            }

            if self.retries.records[idx].consume_timeout() {
                let record = self.retries.records.remove(idx);
                actions.extend(self.exchange_exhausted(&record));
                continue;
            }

            let elapsed = self.elapsed_hundredths();
            let destination = self.destination_for(msg_type);
            let Self { retries, rng, .. } = self;
            let record = &mut retries.records[idx];
            record.advance(rng);
            record.refresh_elapsed(elapsed);
            trace!(
                xid = %record.xid,
                %msg_type,
                timeout = record.current_timeout,
                retry = record.retry_count,
                "retransmit"
            );
            actions.push(ClientAction::Transmit {
                destination,
                payload: record.payload.clone().freeze(),
            });
            idx += 1;
        }
        actions
    }

    /// Budget exhaustion per the error policy: Solicit/Request/Rebind
    /// reset the session, everything else degrades gracefully.
    fn exchange_exhausted(&mut self, record: &crate::retry::RetryRecord) -> Vec<ClientAction> {
        debug!(msg_type = %record.msg_type, retries = record.retry_count, "retry budget exhausted");
        let mut actions = Vec::new();
        match record.msg_type {
            MessageType::InformationRequest => {
                if let Some(at) = self.infos.iter().position(|i| i.xid == record.xid) {
                    let info = self.infos.remove(at);
                    actions.push(ClientAction::InfoTimeout { handle: info.handle });
                }
            },
            MessageType::Renew | MessageType::Confirm => {
                // A failed Renew/Confirm does not lose an already-bound
                // lease; only the attempt is abandoned.
                actions.push(ClientAction::ExchangeFailed { exchange: record.msg_type });
                self.state =
                    if self.lease.is_some() { ClientState::Bound } else { ClientState::Init };
            },
            MessageType::Decline | MessageType::Release => {
                actions.push(ClientAction::ExchangeFailed { exchange: record.msg_type });
                self.pending_surrender.clear();
                if self.lease.as_ref().is_none_or(Lease::is_exhausted) {
                    self.lease = None;
                    self.state = ClientState::Init;
                } else {
                    self.state = ClientState::Bound;
                }
            },
            _ => {
                actions.push(ClientAction::ExchangeFailed { exchange: record.msg_type });
                if let Some(lease) = self.lease.as_mut() {
                    lease.zero_lifetimes();
                    let snapshot = lease.snapshot(&self.expired_cache);
                    self.expired_cache.clear();
                    actions.push(ClientAction::LeaseUpdated { lease: snapshot });
                }
                self.lease = None;
                self.state = ClientState::Init;
                self.best_advertisement = None;
                self.accept_any_advertisement = false;
                self.unicast_override = None;
                self.server_duid = None;
            },
        }
        actions
    }

    // ---- message sends ------------------------------------------------

    pub(crate) fn send_solicit(&mut self) -> Result<Vec<ClientAction>> {
        self.best_advertisement = None;
        self.accept_any_advertisement = false;
        let ia_req = self
            .lease
            .as_ref()
            .map_or_else(|| IaBuildRequest::surrender(self.config.ia, Vec::new()), Lease::build_request);
        let xid = self.new_xid();
        let input = BuildInput {
            msg_type: MessageType::Solicit,
            xid,
            client_duid: Some(&self.config.duid),
            server_duid: None,
            ia: Some(&ia_req),
            ia_with_timers: false,
            oro: &self.config.oro,
            rapid_commit: self.config.rapid_commit,
            extra: &self.config.options,
        };
        let built = build_message(&input)?;
        let params = self.config.solicit_timing.unwrap_or(timing::SOLICIT);
        Ok(self.transmit(MessageType::Solicit, xid, built, params, Some(ClientState::Selecting)))
    }

    pub(crate) fn send_request(&mut self) -> Result<Vec<ClientAction>> {
        let lease = self.lease.as_ref().ok_or(ClientError::NoLease)?;
        let ia_req = lease.build_request();
        let server = self.server_duid.clone();
        let xid = self.new_xid();
        let input = BuildInput {
            msg_type: MessageType::Request,
            xid,
            client_duid: Some(&self.config.duid),
            server_duid: server.as_deref(),
            ia: Some(&ia_req),
            ia_with_timers: true,
            oro: &self.config.oro,
            rapid_commit: false,
            extra: &self.config.options,
        };
        let built = build_message(&input)?;
        Ok(self.transmit(MessageType::Request, xid, built, timing::REQUEST, Some(ClientState::Requesting)))
    }

    fn send_renew(&mut self) -> Result<Vec<ClientAction>> {
        let lease = self.lease.as_ref().ok_or(ClientError::NoLease)?;
        let ia_req = lease.build_request();
        let mut params = timing::RENEW;
        params.mrd = lease.t2.saturating_sub(lease.t1);
        let server = self.server_duid.clone();
        let xid = self.new_xid();
        let input = BuildInput {
            msg_type: MessageType::Renew,
            xid,
            client_duid: Some(&self.config.duid),
            server_duid: server.as_deref(),
            ia: Some(&ia_req),
            ia_with_timers: true,
            oro: &self.config.oro,
            rapid_commit: false,
            extra: &self.config.options,
        };
        let built = build_message(&input)?;
        Ok(self.transmit(MessageType::Renew, xid, built, params, Some(ClientState::Renewing)))
    }

    fn send_rebind(&mut self) -> Result<Vec<ClientAction>> {
        let lease = self.lease.as_ref().ok_or(ClientError::NoLease)?;
        let ia_req = lease.build_request();
        let mut params = timing::REBIND;
        params.mrd = lease.all_expire.saturating_sub(lease.t2);
        let xid = self.new_xid();
        let input = BuildInput {
            msg_type: MessageType::Rebind,
            xid,
            client_duid: Some(&self.config.duid),
            server_duid: None,
            ia: Some(&ia_req),
            ia_with_timers: true,
            oro: &self.config.oro,
            rapid_commit: false,
            extra: &self.config.options,
        };
        let built = build_message(&input)?;
        // Cancel any in-flight Renew; Rebind supersedes it.
        self.retries.dequeue_type(MessageType::Renew);
        Ok(self.transmit(MessageType::Rebind, xid, built, params, Some(ClientState::Rebinding)))
    }

    fn send_confirm(&mut self) -> Result<Vec<ClientAction>> {
        let lease = self.lease.as_ref().ok_or(ClientError::NoLease)?;
        let ia_req = lease.build_request();
        let xid = self.new_xid();
        let input = BuildInput {
            msg_type: MessageType::Confirm,
            xid,
            client_duid: Some(&self.config.duid),
            server_duid: None,
            ia: Some(&ia_req),
            ia_with_timers: true,
            oro: &self.config.oro,
            rapid_commit: false,
            extra: &self.config.options,
        };
        let built = build_message(&input)?;
        Ok(self.transmit(MessageType::Confirm, xid, built, timing::CONFIRM, Some(ClientState::Confirming)))
    }

    fn surrender(
        &mut self,
        msg_type: MessageType,
        next_state: ClientState,
        addrs: &[Ipv6Addr],
    ) -> Result<Vec<ClientAction>> {
        if self.state != ClientState::Bound {
            return Err(ClientError::InvalidState {
                state: self.state,
                operation: if msg_type == MessageType::Decline { "decline" } else { "release" },
            });
        }
        let lease = self.lease.as_ref().ok_or(ClientError::NoLease)?;
        for addr in addrs {
            if !lease.addresses.iter().any(|entry| entry.addr == *addr) {
                return Err(ClientError::AddressNotLeased(*addr));
            }
        }
        let surrendered: Vec<LeaseAddress> =
            lease.addresses.iter().filter(|entry| addrs.contains(&entry.addr)).copied().collect();
        let ia_req = IaBuildRequest::surrender(lease.ia, surrendered);

        let server = self.server_duid.clone();
        let xid = self.new_xid();
        let input = BuildInput {
            msg_type,
            xid,
            client_duid: Some(&self.config.duid),
            server_duid: server.as_deref(),
            ia: Some(&ia_req),
            ia_with_timers: false,
            oro: &self.config.oro,
            rapid_commit: false,
            extra: &self.config.options,
        };
        let built = build_message(&input)?;

        // Only split the live lease once the message exists; a build
        // failure must leave the lease untouched.
        let params =
            if msg_type == MessageType::Decline { timing::DECLINE } else { timing::RELEASE };
        if let Some(lease) = self.lease.as_mut() {
            self.pending_surrender = lease.deprive(addrs);
        }
        Ok(self.transmit(msg_type, xid, built, params, Some(next_state)))
    }

    // ---- send plumbing ------------------------------------------------

    fn transmit(
        &mut self,
        msg_type: MessageType,
        xid: TransactionId,
        mut built: BuiltMessage,
        params: RetransmitParams,
        next_state: Option<ClientState>,
    ) -> Vec<ClientAction> {
        let mut elapsed_at = Some(built.elapsed_at);
        if let Some(hook) = self.send_hook.as_mut() {
            hook(msg_type, &mut built.payload);
            elapsed_at = locate_elapsed(&built.payload);
        }

        if let Some(next) = next_state {
            debug!(from = %self.state, to = %next, %msg_type, %xid, "exchange started");
            self.state = next;
        } else {
            debug!(%msg_type, %xid, "exchange started");
        }
        self.exchange_start = Some(self.ticks);

        let destination = self.destination_for(msg_type);
        let actions = vec![ClientAction::Transmit {
            destination,
            payload: built.payload.clone().freeze(),
        }];
        self.retries.enqueue(xid, msg_type, built.payload, elapsed_at, params, &mut self.rng);
        actions
    }

    pub(crate) fn destination_for(&self, msg_type: MessageType) -> SocketAddrV6 {
        let server_targeted = matches!(
            msg_type,
            MessageType::Request | MessageType::Renew | MessageType::Decline | MessageType::Release
        );
        let addr = match self.unicast_override {
            Some(unicast) if server_targeted => unicast,
            _ => ALL_RELAY_AGENTS_AND_SERVERS,
        };
        SocketAddrV6::new(addr, SERVER_PORT, 0, 0)
    }

    pub(crate) fn elapsed_hundredths(&mut self) -> u16 {
        let start = *self.exchange_start.get_or_insert(self.ticks);
        let elapsed = self.ticks.saturating_sub(start).saturating_mul(100);
        u16::try_from(elapsed).unwrap_or(u16::MAX)
    }

    fn new_xid(&mut self) -> TransactionId {
        TransactionId::from_u32(self.rng.next_u32())
    }
}

#[cfg(test)]
mod tests {
    use hexlease_proto::options::{code, seek_ia_option, seek_option};
    use hexlease_proto::Duid;

    use super::*;
    use crate::config::{IaDescriptor, IaKind};

    fn config() -> ClientConfig {
        ClientConfig::new(
            Duid::new(vec![0x00, 0x01, 0xca, 0xfe]).unwrap(),
            IaDescriptor { kind: IaKind::Na, iaid: 42 },
        )
    }

    fn transmit_packet(action: &ClientAction) -> Packet {
        match action {
            ClientAction::Transmit { payload, .. } => {
                Packet::parse(payload.clone()).expect("transmit payload parses")
            },
            other => panic!("expected transmit, got {other:?}"),
        }
    }

    #[test]
    fn start_sends_solicit_to_multicast() {
        let mut client = Client::with_seed(config(), 1);
        let actions = client.start().unwrap();
        assert_eq!(actions.len(), 1);

        let ClientAction::Transmit { destination, .. } = &actions[0] else {
            panic!("expected transmit");
        };
        assert_eq!(*destination.ip(), ALL_RELAY_AGENTS_AND_SERVERS);
        assert_eq!(destination.port(), SERVER_PORT);

        let packet = transmit_packet(&actions[0]);
        assert_eq!(packet.msg_type, MessageType::Solicit);
        assert_eq!(
            seek_option(&packet.options, code::CLIENT_ID),
            Some(client.config.duid.as_bytes())
        );
        assert!(seek_option(&packet.options, code::ELAPSED_TIME).is_some());
        assert!(seek_ia_option(&packet.options, code::IA_NA, 42).is_some());
        assert_eq!(seek_option(&packet.options, code::RAPID_COMMIT), None);

        assert_eq!(client.state(), ClientState::Selecting);
        assert_eq!(client.retries.len(), 1);
    }

    #[test]
    fn start_twice_is_invalid() {
        let mut client = Client::with_seed(config(), 1);
        client.start().unwrap();
        let err = client.start().unwrap_err();
        assert!(matches!(err, ClientError::InvalidState { operation: "start", .. }));
    }

    #[test]
    fn renew_and_surrender_require_bound() {
        let mut client = Client::with_seed(config(), 1);
        assert!(matches!(client.renew(false), Err(ClientError::InvalidState { .. })));
        let addr: Ipv6Addr = "2001:db8::1".parse().unwrap();
        assert!(matches!(client.decline(&[addr]), Err(ClientError::InvalidState { .. })));
        assert!(matches!(client.release(&[addr]), Err(ClientError::InvalidState { .. })));
    }

    #[test]
    fn retransmit_intervals_do_not_shrink() {
        let mut cfg = config();
        cfg.solicit_timing = Some(RetransmitParams { irt: 1, mrc: 0, mrt: 60, mrd: 0 });
        let mut client = Client::with_seed(cfg, 3);
        client.start().unwrap();

        let mut send_ticks = Vec::new();
        for tick in 1..=120u32 {
            for action in client.tick(true) {
                if matches!(action, ClientAction::Transmit { .. }) {
                    send_ticks.push(tick);
                }
            }
        }
        assert!(send_ticks.len() >= 3, "expected several retransmits, got {send_ticks:?}");
        let gaps: Vec<u32> = send_ticks.windows(2).map(|w| w[1] - w[0]).collect();
        for pair in gaps.windows(2) {
            assert!(pair[1] >= pair[0], "backoff shrank: {gaps:?}");
        }
    }

    #[test]
    fn retransmit_payload_stable_except_elapsed() {
        let mut cfg = config();
        cfg.solicit_timing = Some(RetransmitParams { irt: 1, mrc: 0, mrt: 60, mrd: 0 });
        let mut client = Client::with_seed(cfg, 3);
        let first = transmit_packet(&client.start().unwrap()[0]);

        let mut retransmit = None;
        for _ in 0..30 {
            let actions = client.tick(true);
            if let Some(action) =
                actions.iter().find(|a| matches!(a, ClientAction::Transmit { .. }))
            {
                retransmit = Some(transmit_packet(action));
                break;
            }
        }
        let retransmit = retransmit.expect("solicit retransmitted");
        assert_eq!(retransmit.msg_type, MessageType::Solicit);
        assert_eq!(retransmit.xid, first.xid);
        // Identical bytes apart from the refreshed elapsed-time field.
        assert_eq!(retransmit.options.len(), first.options.len());
        assert_ne!(
            seek_option(&retransmit.options, code::ELAPSED_TIME),
            seek_option(&first.options, code::ELAPSED_TIME)
        );
    }

    #[test]
    fn solicit_exhaustion_returns_to_init() {
        let mut cfg = config();
        cfg.solicit_timing = Some(RetransmitParams { irt: 1, mrc: 2, mrt: 0, mrd: 0 });
        let mut client = Client::with_seed(cfg, 5);
        client.start().unwrap();

        let mut failed = false;
        for _ in 0..120 {
            for action in client.tick(true) {
                if let ClientAction::ExchangeFailed { exchange } = action {
                    assert_eq!(exchange, MessageType::Solicit);
                    failed = true;
                }
            }
            if failed {
                break;
            }
        }
        assert!(failed, "solicit retry budget never exhausted");
        assert_eq!(client.state(), ClientState::Init);
        assert!(client.lease().is_none());
        assert!(client.retries.is_empty());
    }

    #[test]
    fn info_request_timeout_budget() {
        let mut cfg = config();
        cfg.info_timing = Some(RetransmitParams { irt: 1, mrc: 1, mrt: 0, mrd: 0 });
        let mut client = Client::with_seed(cfg, 5);
        let (handle, actions) = client.info_request(&[23]).unwrap();
        assert!(matches!(actions[0], ClientAction::Transmit { .. }));

        let mut timed_out = false;
        for _ in 0..60 {
            for action in client.tick(true) {
                if let ClientAction::InfoTimeout { handle: h } = action {
                    assert_eq!(h, handle);
                    timed_out = true;
                }
            }
            if timed_out {
                break;
            }
        }
        assert!(timed_out, "information-request never timed out");
        assert!(client.infos.is_empty());
    }

    #[test]
    fn stop_fires_pending_info_timeouts() {
        let mut client = Client::with_seed(config(), 9);
        client.start().unwrap();
        let (handle, _) = client.info_request(&[23, 24]).unwrap();

        let actions = client.stop();
        assert_eq!(actions, vec![ClientAction::InfoTimeout { handle }]);
        assert_eq!(client.state(), ClientState::Init);
        assert!(client.retries.is_empty());
        assert!(client.lease().is_none());
    }

    #[test]
    fn concurrent_info_requests_get_distinct_handles() {
        let mut client = Client::with_seed(config(), 2);
        let (first, _) = client.info_request(&[23]).unwrap();
        let (second, _) = client.info_request(&[24]).unwrap();
        assert_ne!(first, second);
        assert_eq!(client.retries.len(), 2);
        assert_eq!(client.infos.len(), 2);
    }

    #[test]
    fn send_hook_replaces_payload() {
        let mut client = Client::with_seed(config(), 4);
        client.set_send_hook(Box::new(|_msg, payload| {
            payload.clear();
            payload.extend_from_slice(&[1, 0xaa, 0xbb, 0xcc]);
        }));
        let actions = client.start().unwrap();
        let ClientAction::Transmit { payload, .. } = &actions[0] else {
            panic!("expected transmit");
        };
        assert_eq!(payload.as_ref(), &[1, 0xaa, 0xbb, 0xcc]);
    }
}
