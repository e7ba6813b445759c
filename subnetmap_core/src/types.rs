//! Key and match types shared by the trie and the subnet map

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;

use ipnet::IpNet;

use crate::constants::ADDR_BITS;
use crate::errors::SubnetParseError;
use crate::helpers::{canonical, mask, v4_key, v4_plen};

/// A prefix in the unified 128-bit address space.
///
/// IPv4 prefixes live inside `::ffff:0:0/96`, so `203.0.113.0/24` is stored as
/// `::ffff:203.0.113.0/120`. Host bits beyond `prefix_len` are always zero,
/// which makes the derived equality the prefix equality.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressSpace {
    bits: u128,
    prefix_len: u8,
}

impl AddressSpace {
    /// Returns `None` if `prefix_len` exceeds 128.
    pub fn new(bits: u128, prefix_len: u8) -> Option<Self> {
        if prefix_len > ADDR_BITS {
            return None;
        }
        Some(Self {
            bits: canonical(bits, prefix_len),
            prefix_len,
        })
    }

    /// Full-length key for a single address; IPv4 is mapped first.
    pub fn host(ip: IpAddr) -> Self {
        let bits = match ip {
            IpAddr::V4(v4) => v4_key(u32::from(v4)),
            IpAddr::V6(v6) => u128::from(v6),
        };
        Self {
            bits,
            prefix_len: ADDR_BITS,
        }
    }

    /// The whole address space (`::/0`).
    pub const fn any() -> Self {
        Self {
            bits: 0,
            prefix_len: 0,
        }
    }

    #[inline]
    pub fn bits(&self) -> u128 {
        self.bits
    }

    #[inline]
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn network(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.bits)
    }

    /// True when `other` is equal to or nested inside `self`.
    pub fn contains(&self, other: &AddressSpace) -> bool {
        self.prefix_len <= other.prefix_len
            && canonical(other.bits, self.prefix_len) == self.bits
    }

    /// True when `ip` falls inside this prefix.
    pub fn contains_addr(&self, ip: IpAddr) -> bool {
        self.contains(&AddressSpace::host(ip))
    }

    /// Keeps the first `len` bits; `len` is clamped to the current length.
    pub(crate) fn truncate(&self, len: u8) -> Self {
        let len = len.min(self.prefix_len);
        Self {
            bits: canonical(self.bits, len),
            prefix_len: len,
        }
    }

    /// Last address covered by the prefix.
    pub fn last(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.bits | !mask(self.prefix_len))
    }
}

impl From<IpNet> for AddressSpace {
    fn from(net: IpNet) -> Self {
        match net {
            IpNet::V4(n) => Self {
                bits: v4_key(u32::from(n.network())),
                prefix_len: v4_plen(n.prefix_len()),
            },
            IpNet::V6(n) => Self {
                bits: u128::from(n.network()),
                prefix_len: n.prefix_len(),
            },
        }
    }
}

/// Canonical key text: IPv6 notation, IPv4-mapped entries as `::ffff:a.b.c.d/len`.
impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix_len)
    }
}

/// Accepts every key form the decoder accepts and normalizes it.
impl FromStr for AddressSpace {
    type Err = SubnetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::decoder::parse_subnet(s).map(|parsed| parsed.address_space())
    }
}

/// Result of a successful lookup.
#[derive(Debug, PartialEq, Eq)]
pub struct Match<'a, V> {
    pub prefix: AddressSpace,
    pub value: &'a V,
}

// derive would demand `V: Copy`
impl<V> Clone for Match<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for Match<'_, V> {}
