//! The IA control block: addresses, renewal timers, and the merge /
//! deprive / diff algebra over address sets.

use std::fmt;
use std::net::Ipv6Addr;

use serde::{Deserialize, Serialize};

use crate::config::{IaDescriptor, IaKind};

/// Client lifecycle state.
///
/// In-flight states name the exchange whose response is outstanding;
/// `Bound` means the lease is held and only the renewal timers run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientState {
    /// No exchange started.
    Init,
    /// Solicit sent, collecting Advertise messages.
    Selecting,
    /// Request sent to the selected server.
    Requesting,
    /// Confirm sent after a link reattachment.
    Confirming,
    /// Renew sent to the binding server.
    Renewing,
    /// Rebind sent to any server.
    Rebinding,
    /// Lease held.
    Bound,
    /// Release sent.
    Releasing,
    /// Decline sent.
    Declining,
}

impl ClientState {
    /// True while the lease ages: crossing `t1`/`t2` only matters when
    /// the client holds (or is refreshing) a binding.
    pub fn ages_lease(self) -> bool {
        matches!(self, Self::Bound | Self::Renewing | Self::Rebinding)
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Selecting => "selecting",
            Self::Requesting => "requesting",
            Self::Confirming => "confirming",
            Self::Renewing => "renewing",
            Self::Rebinding => "rebinding",
            Self::Bound => "bound",
            Self::Releasing => "releasing",
            Self::Declining => "declining",
        };
        f.write_str(name)
    }
}

/// One leased address with its lifetimes, unique by address within a
/// lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseAddress {
    /// The leased IPv6 address.
    pub addr: Ipv6Addr,
    /// Preferred lifetime in seconds.
    pub preferred: u32,
    /// Valid lifetime in seconds.
    pub valid: u32,
}

/// The live IA control block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    /// IA flavor and id this lease belongs to.
    pub ia: IaDescriptor,
    /// Current addresses, order preserved from the server.
    pub addresses: Vec<LeaseAddress>,
    /// Renew threshold in seconds after binding.
    pub t1: u32,
    /// Rebind threshold in seconds after binding.
    pub t2: u32,
    /// Largest valid lifetime across the addresses.
    pub all_expire: u32,
    /// Seconds since the last successful bind.
    pub age: u32,
}

impl Lease {
    /// Empty lease for the configured IA.
    pub fn new(ia: IaDescriptor) -> Self {
        Self { ia, addresses: Vec::new(), t1: 0, t2: 0, all_expire: 0, age: 0 }
    }

    /// Replace the address set, keeping entries unique by address (the
    /// first occurrence wins).
    pub fn replace_addresses(&mut self, addrs: Vec<LeaseAddress>) {
        self.addresses.clear();
        for entry in addrs {
            if !self.addresses.iter().any(|held| held.addr == entry.addr) {
                self.addresses.push(entry);
            }
        }
    }

    /// Recompute `t1`/`t2`/`all_expire` after a bind and reset the age.
    ///
    /// A supplied zero means "server left it to us": `t1` defaults to 50%
    /// and `t2` to 80% of the shortest valid lifetime. The caller has
    /// already rejected a supplied pair with `t1 > t2 > 0`.
    pub fn compute_timers(&mut self, supplied_t1: u32, supplied_t2: u32) {
        let min_valid = self.addresses.iter().map(|a| a.valid).min().unwrap_or(0);
        self.t1 = if supplied_t1 != 0 { supplied_t1 } else { min_valid / 2 };
        self.t2 =
            if supplied_t2 != 0 { supplied_t2 } else { (u64::from(min_valid) * 4 / 5) as u32 };
        self.all_expire = self.addresses.iter().map(|a| a.valid).max().unwrap_or(0);
        self.age = 0;
    }

    /// Split `subset` out of the live lease, in place.
    ///
    /// Returns the deprived entries in lease order; the remainder stays.
    /// Addresses in `subset` that the lease does not hold are ignored —
    /// the caller validates membership first.
    pub fn deprive(&mut self, subset: &[Ipv6Addr]) -> Vec<LeaseAddress> {
        let mut deprived = Vec::new();
        self.addresses.retain(|entry| {
            if subset.contains(&entry.addr) {
                deprived.push(*entry);
                false
            } else {
                true
            }
        });
        deprived
    }

    /// Force every lifetime to zero, keeping the addresses visible so the
    /// host can observe what was lost.
    pub fn zero_lifetimes(&mut self) {
        for entry in &mut self.addresses {
            entry.preferred = 0;
            entry.valid = 0;
        }
        self.t1 = 0;
        self.t2 = 0;
        self.all_expire = 0;
    }

    /// True once every address has been surrendered or expired away.
    pub fn is_exhausted(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Snapshot for the host, optionally prepending cached zero-lifetime
    /// addresses from before a Confirm-triggered restart.
    pub fn snapshot(&self, expired: &[LeaseAddress]) -> LeaseSnapshot {
        let mut addresses: Vec<LeaseAddress> = expired.to_vec();
        for entry in &self.addresses {
            if !addresses.iter().any(|held| held.addr == entry.addr) {
                addresses.push(*entry);
            }
        }
        LeaseSnapshot {
            ia: self.ia,
            addresses,
            t1: self.t1,
            t2: self.t2,
            all_expire: self.all_expire,
            age: self.age,
        }
    }

    /// Immutable build input for an outgoing IA option (the message
    /// builders copy the lease at the point of use rather than aliasing
    /// it).
    pub fn build_request(&self) -> IaBuildRequest {
        IaBuildRequest {
            ia: self.ia,
            t1: self.t1,
            t2: self.t2,
            addresses: self.addresses.clone(),
        }
    }
}

/// Point-in-time copy of the lease exported to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseSnapshot {
    /// IA flavor and id.
    pub ia: IaDescriptor,
    /// Addresses, possibly including zero-lifetime entries being
    /// retired.
    pub addresses: Vec<LeaseAddress>,
    /// Renew threshold.
    pub t1: u32,
    /// Rebind threshold.
    pub t2: u32,
    /// Largest valid lifetime.
    pub all_expire: u32,
    /// Seconds since the last bind.
    pub age: u32,
}

/// Frozen input for building one IA option: a value snapshot, never a
/// pointer into the live lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IaBuildRequest {
    /// IA flavor and id.
    pub ia: IaDescriptor,
    /// T1 to put on the wire (zeroed for Decline/Release).
    pub t1: u32,
    /// T2 to put on the wire (zeroed for Decline/Release).
    pub t2: u32,
    /// Addresses to carry.
    pub addresses: Vec<LeaseAddress>,
}

impl IaBuildRequest {
    /// Build input carrying only the given addresses with zeroed timers,
    /// as Decline/Release want.
    pub fn surrender(ia: IaDescriptor, addresses: Vec<LeaseAddress>) -> Self {
        Self { ia, t1: 0, t2: 0, addresses }
    }

    /// Worst-case wire footprint of the IA option this request encodes.
    pub fn wire_len(&self) -> usize {
        use hexlease_proto::options::{IA_ADDR_FIXED_LEN, IA_NA_HEADER_LEN, IA_TA_HEADER_LEN, OPTION_HEADER_LEN};

        let fixed = match self.ia.kind {
            IaKind::Na => IA_NA_HEADER_LEN,
            IaKind::Ta => IA_TA_HEADER_LEN,
        };
        OPTION_HEADER_LEN
            + fixed
            + self.addresses.len() * (OPTION_HEADER_LEN + IA_ADDR_FIXED_LEN)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn descriptor() -> IaDescriptor {
        IaDescriptor { kind: IaKind::Na, iaid: 1 }
    }

    fn addr(last: u16, preferred: u32, valid: u32) -> LeaseAddress {
        LeaseAddress {
            addr: Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, last),
            preferred,
            valid,
        }
    }

    #[test]
    fn derived_timers_from_shortest_valid() {
        let mut lease = Lease::new(descriptor());
        lease.replace_addresses(vec![addr(1, 1000, 2000), addr(2, 1500, 3000)]);
        lease.compute_timers(0, 0);
        assert_eq!(lease.t1, 1000);
        assert_eq!(lease.t2, 1600);
        assert_eq!(lease.all_expire, 3000);
        assert_eq!(lease.age, 0);
    }

    #[test]
    fn supplied_timers_win() {
        let mut lease = Lease::new(descriptor());
        lease.replace_addresses(vec![addr(1, 1000, 2000)]);
        lease.compute_timers(300, 500);
        assert_eq!((lease.t1, lease.t2), (300, 500));
    }

    #[test]
    fn replace_deduplicates_by_address() {
        let mut lease = Lease::new(descriptor());
        lease.replace_addresses(vec![addr(1, 10, 20), addr(1, 99, 99), addr(2, 10, 20)]);
        assert_eq!(lease.addresses.len(), 2);
        assert_eq!(lease.addresses[0].preferred, 10);
    }

    #[test]
    fn deprive_full_set_empties_lease() {
        let mut lease = Lease::new(descriptor());
        lease.replace_addresses(vec![addr(1, 10, 20), addr(2, 10, 20)]);
        let all: Vec<Ipv6Addr> = lease.addresses.iter().map(|a| a.addr).collect();
        let deprived = lease.deprive(&all);
        assert_eq!(deprived.len(), 2);
        assert!(lease.is_exhausted());
    }

    #[test]
    fn snapshot_merges_expired_first() {
        let mut lease = Lease::new(descriptor());
        lease.replace_addresses(vec![addr(2, 10, 20)]);
        let expired = vec![addr(1, 0, 0)];
        let snapshot = lease.snapshot(&expired);
        assert_eq!(snapshot.addresses.len(), 2);
        assert_eq!(snapshot.addresses[0].valid, 0);
        assert_eq!(snapshot.addresses[1].addr, addr(2, 10, 20).addr);
    }

    proptest! {
        // deprive is a partition: deprived ∪ remaining == original and
        // deprived ∩ remaining == ∅.
        #[test]
        fn deprive_partitions(last_octets in proptest::collection::hash_set(1u16..=64, 1..12), picks in proptest::collection::vec(any::<bool>(), 64)) {
            let mut lease = Lease::new(descriptor());
            let original: Vec<LeaseAddress> =
                last_octets.iter().map(|&o| addr(o, 100, 200)).collect();
            lease.replace_addresses(original.clone());

            let subset: Vec<Ipv6Addr> = original
                .iter()
                .enumerate()
                .filter(|(i, _)| picks[*i % picks.len()])
                .map(|(_, a)| a.addr)
                .collect();

            let deprived = lease.deprive(&subset);

            prop_assert_eq!(deprived.len() + lease.addresses.len(), original.len());
            for entry in &deprived {
                prop_assert!(subset.contains(&entry.addr));
                prop_assert!(!lease.addresses.iter().any(|held| held.addr == entry.addr));
            }
            for entry in &lease.addresses {
                prop_assert!(!subset.contains(&entry.addr));
            }
        }

        // Derived defaults always satisfy t1 <= t2.
        #[test]
        fn derived_timers_ordered(valids in proptest::collection::vec(1u32..=1_000_000, 1..8)) {
            let mut lease = Lease::new(descriptor());
            let addrs: Vec<LeaseAddress> = valids
                .iter()
                .enumerate()
                .map(|(i, &v)| addr((i + 1) as u16, v / 2, v))
                .collect();
            lease.replace_addresses(addrs);
            lease.compute_timers(0, 0);
            prop_assert!(lease.t1 <= lease.t2);
        }
    }
}
