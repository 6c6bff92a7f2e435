//! Async driver wiring the engine to a turmoil UDP socket.
//!
//! The engine never touches sockets itself; this loop executes its
//! `Transmit` actions, feeds received datagrams back in, and supplies
//! the 1 Hz tick from virtual time.

use std::time::Duration;

use hexlease_client::{Client, ClientAction, ClientState};

/// Drive `client` over the simulated socket until it binds or
/// `max_ticks` virtual seconds elapse. Returns the number of datagrams
/// sent; the caller inspects `client.state()` for the outcome.
pub async fn drive_until_bound(
    client: &mut Client,
    socket: &turmoil::net::UdpSocket,
    server: &str,
    max_ticks: u32,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut pending = client.start()?;
    let mut buf = [0u8; 1500];
    let mut sent = 0usize;

    for _ in 0..max_ticks {
        for action in pending.drain(..) {
            if let ClientAction::Transmit { payload, .. } = action {
                sent += 1;
                socket.send_to(&payload, server).await?;
            }
        }
        if client.state() == ClientState::Bound {
            break;
        }
        // Wait most of a virtual second for an answer, then tick.
        match tokio::time::timeout(Duration::from_millis(950), socket.recv_from(&mut buf)).await {
            Ok(received) => {
                let (len, _from) = received?;
                pending.extend(client.handle_receive(&buf[..len]));
            },
            Err(_elapsed) => {
                pending.extend(client.tick(true));
            },
        }
    }
    Ok(sent)
}
