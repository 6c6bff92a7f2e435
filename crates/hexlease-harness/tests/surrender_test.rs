//! Decline/Release integration tests: partial surrender keeps the
//! remainder bound, full surrender resets the session.

use std::net::Ipv6Addr;

use hexlease_client::{Client, ClientAction, ClientConfig, ClientState, IaDescriptor, IaKind};
use hexlease_harness::{SimServer, World};
use hexlease_proto::{Duid, MessageType};

const SERVER_ONE: &[u8] = &[0x00, 0x02, 0x11];

fn config() -> ClientConfig {
    ClientConfig::new(
        Duid::new(vec![0x00, 0x01, 0xca, 0xfe]).unwrap(),
        IaDescriptor { kind: IaKind::Na, iaid: 3 },
    )
}

fn addr(last: u16) -> Ipv6Addr {
    Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, last)
}

fn bound_world() -> World {
    let mut world = World::new(Client::with_seed(config(), 21));
    world.add_server(
        SimServer::new(SERVER_ONE)
            .preference(255)
            .timers(1000, 1600)
            .offer(addr(1), 4000, 8000)
            .offer(addr(2), 4000, 8000),
    );
    world.start().unwrap();
    assert!(world.bound());
    assert_eq!(world.lease().unwrap().addresses.len(), 2);
    world
}

#[test]
fn declining_one_address_keeps_the_other() {
    let mut world = bound_world();

    let actions = world.client.decline(&[addr(1)]).unwrap();
    world.pump(actions);

    assert_eq!(world.sent_count(MessageType::Decline), 1);
    assert_eq!(world.servers[0].declines, 1);
    assert!(world.events.iter().any(|event| matches!(
        event,
        ClientAction::SurrenderComplete {
            exchange: MessageType::Decline,
            lease_cleared: false,
            ..
        }
    )));

    assert!(world.bound());
    let lease = world.lease().unwrap();
    assert_eq!(lease.addresses.len(), 1);
    assert_eq!(lease.addresses[0].addr, addr(2));
}

#[test]
fn releasing_every_address_resets_to_init() {
    let mut world = bound_world();

    let actions = world.client.release(&[addr(1), addr(2)]).unwrap();
    world.pump(actions);

    assert_eq!(world.sent_count(MessageType::Release), 1);
    let complete = world
        .events
        .iter()
        .find_map(|event| match event {
            ClientAction::SurrenderComplete { exchange, surrendered, lease_cleared } => {
                Some((*exchange, surrendered.clone(), *lease_cleared))
            },
            _ => None,
        })
        .expect("release completion");
    assert_eq!(complete.0, MessageType::Release);
    assert_eq!(complete.1, vec![addr(1), addr(2)]);
    assert!(complete.2);

    assert_eq!(world.client.state(), ClientState::Init);
    assert!(world.lease().is_none());
}

#[test]
fn decline_reply_is_not_cached() {
    let mut world = bound_world();
    let bind_xid = world.client.last_reply().unwrap().xid;

    let actions = world.client.decline(&[addr(1), addr(2)]).unwrap();
    world.pump(actions);

    assert_eq!(world.client.state(), ClientState::Init);
    // The completing reply was discarded; the cached reply is still the
    // one that produced the binding.
    assert_eq!(world.client.last_reply().unwrap().xid, bind_xid);
}

#[test]
fn surrender_exchange_survives_losing_the_first_reply() {
    // The Decline retransmits on its own budget until a reply lands.
    let mut world = bound_world();
    world.partition();

    let actions = world.client.decline(&[addr(1)]).unwrap();
    world.pump(actions);
    world.step(2);
    assert!(world.dropped() >= 1);

    world.heal();
    assert!(
        world.step_until(10, |w| w.events.iter().any(|event| matches!(
            event,
            ClientAction::SurrenderComplete { .. }
        ))),
        "decline never completed"
    );
    assert!(world.bound());
    assert_eq!(world.lease().unwrap().addresses.len(), 1);
}

#[test]
fn decline_exhaustion_degrades_back_to_bound() {
    // DEC_MAX_RC retransmissions with no reply at all: the attempt is
    // abandoned but the remaining address stays bound.
    let mut world = bound_world();
    world.partition();

    let actions = world.client.decline(&[addr(1)]).unwrap();
    world.pump(actions);

    assert!(
        world.step_until(120, |w| w.events.iter().any(|event| matches!(
            event,
            ClientAction::ExchangeFailed { exchange: MessageType::Decline }
        ))),
        "decline never exhausted"
    );
    assert_eq!(world.client.state(), ClientState::Bound);
    assert_eq!(world.lease().unwrap().addresses.len(), 1);
}
