//! Stateless Information-Request integration tests.

use hexlease_client::{Client, ClientAction, ClientConfig, IaDescriptor, IaKind};
use hexlease_harness::{SimServer, World};
use hexlease_proto::options::seek_option;
use hexlease_proto::{Duid, MessageType};

const SERVER_ONE: &[u8] = &[0x00, 0x02, 0x11];
const DNS_SERVERS: u16 = 23;

fn config() -> ClientConfig {
    ClientConfig::new(
        Duid::new(vec![0x00, 0x01, 0xca, 0xfe]).unwrap(),
        IaDescriptor { kind: IaKind::Na, iaid: 2 },
    )
}

fn world_with_info_server() -> World {
    let mut world = World::new(Client::with_seed(config(), 41));
    let mut server = SimServer::new(SERVER_ONE);
    server.info_options = vec![(DNS_SERVERS, vec![0x20, 0x01, 0x0d, 0xb8])];
    world.add_server(server);
    world
}

#[test]
fn info_request_completes_with_options() {
    let mut world = world_with_info_server();

    let (handle, actions) = world.client.info_request(&[DNS_SERVERS]).unwrap();
    world.pump(actions);

    assert_eq!(world.sent_count(MessageType::InformationRequest), 1);
    assert_eq!(world.servers[0].infos, 1);

    let reply = world
        .events
        .iter()
        .find_map(|event| match event {
            ClientAction::InfoReply { handle: got, options } if *got == handle => {
                Some(options.clone())
            },
            _ => None,
        })
        .expect("info reply");
    assert_eq!(seek_option(&reply, DNS_SERVERS), Some(&[0x20, 0x01, 0x0d, 0xb8][..]));
}

#[test]
fn concurrent_info_requests_complete_independently() {
    let mut world = world_with_info_server();
    world.partition();

    let (first, actions) = world.client.info_request(&[DNS_SERVERS]).unwrap();
    world.pump(actions);
    let (second, actions) = world.client.info_request(&[DNS_SERVERS]).unwrap();
    world.pump(actions);
    assert_ne!(first, second);

    world.heal();
    assert!(
        world.step_until(10, |w| {
            w.events.iter().filter(|e| matches!(e, ClientAction::InfoReply { .. })).count() == 2
        }),
        "both info requests should complete"
    );
}

#[test]
fn stop_fires_pending_info_timeouts() {
    let mut world = world_with_info_server();
    world.partition();

    let (handle, actions) = world.client.info_request(&[DNS_SERVERS]).unwrap();
    world.pump(actions);

    let actions = world.client.stop();
    world.pump(actions);
    assert!(world
        .events
        .iter()
        .any(|event| matches!(event, ClientAction::InfoTimeout { handle: got } if *got == handle)));
}

#[test]
fn info_request_runs_beside_a_stateful_exchange() {
    let mut world = world_with_info_server();
    world.servers[0].preference = Some(255);
    world.servers[0].offers.push(("2001:db8::1".parse().unwrap(), 600, 1200));
    world.start().unwrap();
    assert!(world.bound());

    let (handle, actions) = world.client.info_request(&[DNS_SERVERS]).unwrap();
    world.pump(actions);
    assert!(world
        .events
        .iter()
        .any(|event| matches!(event, ClientAction::InfoReply { handle: got, .. } if *got == handle)));
    // The binding is untouched by the stateless exchange.
    assert!(world.bound());
}
