//! World state for scenario execution.
//!
//! The World owns the client engine and the scripted servers, routes
//! `Transmit` actions onto the simulated multicast wire, and records
//! everything the client sent and every host-visible action it emitted.

use hexlease_client::{Client, ClientAction, ClientState, LeaseSnapshot};
use hexlease_proto::{MessageType, Packet};
use tracing::trace;

use crate::sim_server::SimServer;

/// World state containing the client, the servers, and the wire log.
pub struct World {
    /// The engine under test.
    pub client: Client,
    /// Scripted servers; all of them see every client datagram, as on a
    /// multicast link.
    pub servers: Vec<SimServer>,
    /// Link attachment reported on each tick.
    pub link_present: bool,
    /// Every message the client put on the wire, in order.
    pub sent: Vec<Packet>,
    /// Every non-transmit action the client emitted, in order.
    pub events: Vec<ClientAction>,
    partitioned: bool,
    dropped: usize,
}

impl World {
    /// World around a client engine, with no servers yet.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            servers: Vec::new(),
            link_present: true,
            sent: Vec::new(),
            events: Vec::new(),
            partitioned: false,
            dropped: 0,
        }
    }

    /// Add a scripted server to the link.
    pub fn add_server(&mut self, server: SimServer) {
        self.servers.push(server);
    }

    /// Start the client conversation and route the initial Solicit.
    pub fn start(&mut self) -> Result<(), String> {
        let actions = self.client.start().map_err(|err| err.to_string())?;
        self.pump(actions);
        Ok(())
    }

    /// Advance virtual time by whole seconds, routing everything the
    /// client sends.
    pub fn step(&mut self, ticks: u32) {
        for _ in 0..ticks {
            let actions = self.client.tick(self.link_present);
            self.pump(actions);
        }
    }

    /// Step until `predicate` holds, up to `max_ticks`. Returns whether
    /// it held.
    pub fn step_until(&mut self, max_ticks: u32, predicate: impl Fn(&World) -> bool) -> bool {
        for _ in 0..max_ticks {
            if predicate(self) {
                return true;
            }
            self.step(1);
        }
        predicate(self)
    }

    /// Cut the wire: client datagrams are logged but no server sees them.
    pub fn partition(&mut self) {
        self.partitioned = true;
    }

    /// Reconnect the wire.
    pub fn heal(&mut self) {
        self.partitioned = false;
    }

    /// Messages dropped while partitioned.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Route a batch of actions: transmissions to the servers (and their
    /// answers straight back into the client), everything else into the
    /// event log.
    pub fn pump(&mut self, actions: Vec<ClientAction>) {
        let mut queue: std::collections::VecDeque<ClientAction> = actions.into();
        while let Some(action) = queue.pop_front() {
            match action {
                ClientAction::Transmit { payload, destination } => {
                    if let Ok(packet) = Packet::parse(payload.clone()) {
                        trace!(msg_type = %packet.msg_type, %destination, "client sent");
                        self.sent.push(packet);
                    }
                    if self.partitioned {
                        self.dropped += 1;
                        continue;
                    }
                    let mut answers = Vec::new();
                    for server in &mut self.servers {
                        if let Some(answer) = server.handle(&payload) {
                            answers.push(answer);
                        }
                    }
                    for answer in answers {
                        queue.extend(self.client.handle_receive(&answer));
                    }
                },
                other => self.events.push(other),
            }
        }
    }

    /// True once the client holds a binding.
    pub fn bound(&self) -> bool {
        self.client.state() == ClientState::Bound
    }

    /// The client's current lease snapshot.
    pub fn lease(&self) -> Option<LeaseSnapshot> {
        self.client.lease()
    }

    /// How many messages of the given type the client has sent.
    pub fn sent_count(&self, msg_type: MessageType) -> usize {
        self.sent.iter().filter(|packet| packet.msg_type == msg_type).count()
    }

    /// The most recent sent message of the given type.
    pub fn last_sent(&self, msg_type: MessageType) -> Option<&Packet> {
        self.sent.iter().rev().find(|packet| packet.msg_type == msg_type)
    }
}
