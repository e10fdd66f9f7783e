//! IPv4 CIDR blocks and sequential subnet carving.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TopologyError, TopologyResult};

/// An IPv4 network block such as `10.1.0.0/16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    /// Create a block, rejecting prefixes over 32 and addresses with host bits set.
    pub fn new(network: Ipv4Addr, prefix: u8) -> TopologyResult<Self> {
        if prefix > 32 {
            return Err(TopologyError::InvalidCidr(format!(
                "{}/{}: prefix must be at most 32",
                network, prefix
            )));
        }
        let cidr = Self { network, prefix };
        if u32::from(network) & !cidr.netmask() != 0 {
            return Err(TopologyError::InvalidCidr(format!(
                "{}/{}: host bits must be zero",
                network, prefix
            )));
        }
        Ok(cidr)
    }

    /// Build a block from parts already known to be aligned.
    pub(crate) const fn from_aligned(network: Ipv4Addr, prefix: u8) -> Self {
        Self { network, prefix }
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of addresses covered by the block.
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    fn netmask(&self) -> u32 {
        if self.prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(self.prefix))
        }
    }

    fn start(&self) -> u64 {
        u64::from(u32::from(self.network))
    }

    /// Whether `other` lies entirely inside this block.
    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.prefix >= self.prefix
            && other.start() >= self.start()
            && other.start() + other.size() <= self.start() + self.size()
    }

    /// How many blocks of the given mask fit in this block.
    pub fn capacity_for(&self, mask: u8) -> u64 {
        if mask < self.prefix || mask > 32 {
            return 0;
        }
        1u64 << (u32::from(mask) - u32::from(self.prefix))
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| TopologyError::InvalidCidr(format!("{}: missing prefix length", s)))?;
        let network: Ipv4Addr = addr
            .trim()
            .parse()
            .map_err(|_| TopologyError::InvalidCidr(format!("{}: bad address", s)))?;
        let prefix: u8 = prefix
            .trim()
            .parse()
            .map_err(|_| TopologyError::InvalidCidr(format!("{}: bad prefix length", s)))?;
        Self::new(network, prefix)
    }
}

impl TryFrom<String> for Ipv4Cidr {
    type Error = TopologyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Ipv4Cidr> for String {
    fn from(value: Ipv4Cidr) -> Self {
        value.to_string()
    }
}

/// Carves subnets out of a block in request order.
///
/// Each subnet starts at the next offset aligned to its own size, so mixed
/// masks never overlap.
#[derive(Debug, Clone)]
pub struct SubnetAllocator {
    block: Ipv4Cidr,
    next: u64,
}

impl SubnetAllocator {
    pub fn new(block: Ipv4Cidr) -> Self {
        Self { block, next: 0 }
    }

    /// Allocate the next free subnet with the given mask.
    pub fn allocate(&mut self, mask: u8) -> TopologyResult<Ipv4Cidr> {
        if mask < self.block.prefix || mask > 32 {
            return Err(TopologyError::SubnetAllocation(format!(
                "mask /{} does not fit in {}",
                mask, self.block
            )));
        }

        let size = 1u64 << (32 - u32::from(mask));
        let offset = self.next.div_ceil(size) * size;
        if offset + size > self.block.size() {
            return Err(TopologyError::SubnetAllocation(format!(
                "{} has no room left for a /{} subnet",
                self.block, mask
            )));
        }

        self.next = offset + size;
        let address = (self.block.start() + offset) as u32;
        Ipv4Cidr::new(Ipv4Addr::from(address), mask)
    }

    /// Addresses not yet handed out.
    pub fn remaining(&self) -> u64 {
        self.block.size().saturating_sub(self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let cidr: Ipv4Cidr = "10.1.0.0/16".parse().unwrap();
        assert_eq!(cidr.prefix(), 16);
        assert_eq!(cidr.size(), 65536);
        assert_eq!(cidr.to_string(), "10.1.0.0/16");
    }

    #[test]
    fn test_parse_rejects_host_bits() {
        assert!("10.1.0.1/16".parse::<Ipv4Cidr>().is_err());
        assert!("10.1.0.0".parse::<Ipv4Cidr>().is_err());
        assert!("10.1.0.0/33".parse::<Ipv4Cidr>().is_err());
        assert!("10.300.0.0/16".parse::<Ipv4Cidr>().is_err());
    }

    #[test]
    fn test_contains() {
        let block: Ipv4Cidr = "10.1.0.0/16".parse().unwrap();
        let inside: Ipv4Cidr = "10.1.4.0/24".parse().unwrap();
        let outside: Ipv4Cidr = "10.2.0.0/24".parse().unwrap();
        assert!(block.contains(&inside));
        assert!(!block.contains(&outside));
        assert!(!inside.contains(&block));
    }

    #[test]
    fn test_capacity_for() {
        let block: Ipv4Cidr = "10.1.0.0/16".parse().unwrap();
        assert_eq!(block.capacity_for(24), 256);
        assert_eq!(block.capacity_for(16), 1);
        assert_eq!(block.capacity_for(8), 0);
    }

    #[test]
    fn test_allocator_sequential() {
        let mut alloc = SubnetAllocator::new("10.1.0.0/16".parse().unwrap());
        assert_eq!(alloc.allocate(24).unwrap().to_string(), "10.1.0.0/24");
        assert_eq!(alloc.allocate(24).unwrap().to_string(), "10.1.1.0/24");
        assert_eq!(alloc.allocate(24).unwrap().to_string(), "10.1.2.0/24");
    }

    #[test]
    fn test_allocator_aligns_mixed_masks() {
        let mut alloc = SubnetAllocator::new("10.0.0.0/16".parse().unwrap());
        assert_eq!(alloc.allocate(26).unwrap().to_string(), "10.0.0.0/26");
        assert_eq!(alloc.allocate(24).unwrap().to_string(), "10.0.1.0/24");
        assert_eq!(alloc.allocate(26).unwrap().to_string(), "10.0.2.0/26");
    }

    #[test]
    fn test_allocator_exhaustion() {
        let mut alloc = SubnetAllocator::new("10.0.0.0/24".parse().unwrap());
        alloc.allocate(25).unwrap();
        alloc.allocate(25).unwrap();
        assert_eq!(alloc.remaining(), 0);
        assert!(matches!(
            alloc.allocate(28),
            Err(TopologyError::SubnetAllocation(_))
        ));
    }

    #[test]
    fn test_allocator_rejects_wider_mask() {
        let mut alloc = SubnetAllocator::new("10.1.0.0/16".parse().unwrap());
        assert!(alloc.allocate(8).is_err());
    }
}
