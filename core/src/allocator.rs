//! First-fit address allocation over the interface subnet

use crate::{ConfigDocument, Error, Result};
use std::collections::HashSet;
use std::net::IpAddr;

/// Finds unassigned host addresses in the interface subnet
///
/// Recomputed from the current peer set on every call; there is no cached
/// free list to go stale.
#[derive(Debug)]
pub struct AddressAllocator;

impl AddressAllocator {
    /// Addresses already taken: the interface's own plus every peer's
    pub fn used_addresses(doc: &ConfigDocument) -> Result<HashSet<IpAddr>> {
        let network = doc.interface().network()?;
        let mut used: HashSet<IpAddr> = doc.peers().iter().filter_map(|p| p.address()).collect();
        used.insert(network.addr());
        Ok(used)
    }

    /// Lowest free host address, without prefix length
    pub fn find_free_address(doc: &ConfigDocument) -> Result<IpAddr> {
        let network = doc.interface().network()?;
        let used = Self::used_addresses(doc)?;

        // IPv6 ranges include the subnet-router anycast address
        let anycast = network.network();
        network
            .hosts()
            .filter(|addr| !(addr.is_ipv6() && *addr == anycast))
            .find(|addr| !used.contains(addr))
            .ok_or_else(|| Error::AllocationExhausted(network.trunc().to_string()))
    }
}
