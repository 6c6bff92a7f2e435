//! Fuzz the engine's receive entry point: any datagram fed to a live
//! session must be either processed or silently discarded, never a
//! panic.

#![no_main]

use hexlease_client::{Client, ClientConfig, IaDescriptor, IaKind};
use hexlease_proto::Duid;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(duid) = Duid::new(vec![0x00, 0x01, 0xfa, 0xce]) else {
        return;
    };
    let config = ClientConfig::new(duid, IaDescriptor { kind: IaKind::Na, iaid: 1 });
    let mut client = Client::with_seed(config, 0);
    if client.start().is_err() {
        return;
    }
    let _ = client.handle_receive(data);
    let _ = client.tick(true);
});
