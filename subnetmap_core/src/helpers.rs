//! Bit helpers for the prefix trie

use crate::constants::{V4_MAPPED_OFFSET, V4_MAPPED_PREFIX};

/// Map an IPv4 address into the IPv6 space (`::ffff:a.b.c.d`).
#[inline]
pub fn v4_key(addr: u32) -> u128 {
    V4_MAPPED_PREFIX | addr as u128
}

#[inline]
pub fn v4_plen(plen: u8) -> u8 {
    plen.saturating_add(V4_MAPPED_OFFSET)
}

pub fn common_prefix_len(key1: u128, key2: u128, max_len: u8) -> u8 {
    if max_len == 0 {
        return 0;
    }
    let diff = (key1 ^ key2) & mask(max_len);
    if diff == 0 {
        return max_len;
    }
    (diff.leading_zeros() as u8).min(max_len)
}

#[inline]
pub fn get_bit(key: u128, index: u8) -> u8 {
    debug_assert!(index <= 127);
    ((key >> (127 - index)) & 1) as u8
}

#[inline]
pub fn mask(prefix_len: u8) -> u128 {
    if prefix_len == 0 {
        0
    } else if prefix_len >= 128 {
        !0u128
    } else {
        !(!0u128 >> prefix_len)
    }
}

// Canonicalise a key: zero host bits beyond `plen`.
#[inline(always)]
pub fn canonical(key: u128, plen: u8) -> u128 {
    key & mask(plen)
}

/// Prefix length of a left-aligned netmask, `None` if its ones are not contiguous.
pub fn netmask_len(netmask: u128) -> Option<u8> {
    let ones = netmask.leading_ones() as u8;
    (netmask == mask(ones)).then_some(ones)
}
