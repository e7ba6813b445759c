//! The public subnet-keyed table and its canonical form.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::de::DeserializeOwned;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::decoder::decode_hook;
use crate::errors::DecodeError;
use crate::trie::PrefixTrie;
use crate::types::{AddressSpace, Match};

/// Maps subnets to values and answers lookups by IP address with the most
/// specific matching subnet.
///
/// Everything is stored as IPv6, IPv4 subnets as v6-mapped addresses. Built
/// once by the decoder, then read-only: share it behind an `Arc` and look it
/// up from as many threads as needed.
#[derive(Debug, Clone)]
pub struct SubnetMap<V> {
    trie: Option<PrefixTrie<V>>,
}

impl<V> Default for SubnetMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SubnetMap<V> {
    /// Empty table: every lookup misses.
    pub fn new() -> Self {
        Self { trie: None }
    }

    pub(crate) fn from_trie(trie: PrefixTrie<V>) -> Self {
        if trie.is_empty() {
            return Self::new();
        }
        Self { trie: Some(trie) }
    }

    /// Most specific value covering `ip`.
    pub fn lookup(&self, ip: IpAddr) -> Option<&V> {
        self.lookup_match(ip).map(|m| m.value)
    }

    /// Like [`lookup`](Self::lookup), also reporting which prefix matched.
    pub fn lookup_match(&self, ip: IpAddr) -> Option<Match<'_, V>> {
        self.trie.as_ref()?.lookup(&AddressSpace::host(ip))
    }

    /// `(value, true)` on a hit, `(V::default(), false)` on a miss.
    pub fn lookup_or_default(&self, ip: IpAddr) -> (V, bool)
    where
        V: Clone + Default,
    {
        match self.lookup(ip) {
            Some(value) => (value.clone(), true),
            None => (V::default(), false),
        }
    }

    pub fn len(&self) -> usize {
        self.trie.as_ref().map_or(0, PrefixTrie::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored prefixes, outer prefixes first.
    pub fn iter(&self) -> impl Iterator<Item = (AddressSpace, &V)> + '_ {
        self.trie.iter().flat_map(PrefixTrie::iter)
    }

    /// Entries keyed by their canonical CIDR text.
    pub fn canonical_entries(&self) -> impl Iterator<Item = (String, &V)> + '_ {
        self.iter().map(|(prefix, value)| (prefix.to_string(), value))
    }

    /// Canonical mapping used to persist or display the table. Re-decoding it
    /// gives back a table with the same lookup results.
    pub fn to_canonical_map(&self) -> BTreeMap<String, V>
    where
        V: Clone,
    {
        self.canonical_entries()
            .map(|(key, value)| (key, value.clone()))
            .collect()
    }
}

impl<V: DeserializeOwned> SubnetMap<V> {
    /// Decode a raw configuration value, see [`decode_hook`].
    pub fn from_value(raw: Value) -> Result<Self, DecodeError> {
        decode_hook(raw).into_result()
    }
}

impl<V: Serialize> Serialize for SubnetMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.canonical_entries() {
            map.serialize_entry(&key, value)?;
        }
        map.end()
    }
}
