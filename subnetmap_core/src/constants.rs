//! Constants shared by the trie, the decoder and the canonicalizer

/// Width of the unified address space.
pub const ADDR_BITS: u8 = 128;

/// Width of an IPv4 address / netmask.
pub const V4_BITS: u8 = 32;

/// IPv4 prefixes are shifted by this many bits once mapped into `::ffff:0:0/96`.
pub const V4_MAPPED_OFFSET: u8 = 96;

/// High bits of an IPv4-mapped IPv6 address (`::ffff:0.0.0.0`).
pub const V4_MAPPED_PREFIX: u128 = 0xffff_u128 << 32;

/// Canonical key used for the single-value shorthand.
pub const MATCH_ALL_KEY: &str = "::/0";

pub const METRIC_DECODES: &str = "subnetmap_decodes_total";
pub const METRIC_DECODE_FAILURES: &str = "subnetmap_decode_failures_total";
pub const METRIC_DECLINED: &str = "subnetmap_declined_total";
pub const METRIC_ENTRIES: &str = "subnetmap_entries";
