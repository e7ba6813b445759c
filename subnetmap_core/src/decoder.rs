//! Turning configuration values into [`SubnetMap`]s.
//!
//! Keys may be written as IPv4 or IPv6 CIDR, with either a prefix length or a
//! netmask. They are validated, normalized to their canonical IPv6 spelling
//! (`203.0.113.0/24` becomes `::ffff:203.0.113.0/120`) and the values are then
//! decoded in one go through serde, so `V` keeps its own defaults and
//! `deny_unknown_fields` rules. A bare value instead of a map applies to the
//! whole address space (`::/0`).

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use log::{debug, trace, warn};
use metrics::{counter, gauge};
use serde::de::{self, DeserializeOwned, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::constants::*;
use crate::errors::{DecodeError, SubnetParseError};
use crate::helpers::netmask_len;
use crate::subnet_map::SubnetMap;
use crate::trie::PrefixTrie;
use crate::types::AddressSpace;

// ───────────────────────── key parsing ───────────────────────────────── //

/// A subnet key as written in the configuration, before normalization.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ParsedSubnet {
    net: IpNet,
    mask_bits: u8,
}

impl ParsedSubnet {
    pub fn net(&self) -> IpNet {
        self.net
    }

    /// Width of the mask as written: 32 for IPv4 keys, 128 for IPv6 keys.
    pub fn mask_bits(&self) -> u8 {
        self.mask_bits
    }

    /// Position in the unified space; IPv4 gets `len + 96`.
    pub fn address_space(&self) -> AddressSpace {
        AddressSpace::from(self.net)
    }
}

/// Parse `addr/len`, `a.b.c.d/255.255.255.0` or `addr6/ffff:ffff::`.
///
/// Host bits are accepted and dropped (`192.0.2.1/24` is `192.0.2.0/24`).
pub fn parse_subnet(s: &str) -> Result<ParsedSubnet, SubnetParseError> {
    let (addr, mask) = s.split_once('/').ok_or(SubnetParseError::MissingSeparator)?;
    let addr: IpAddr = addr.parse()?;
    let family_bits = match addr {
        IpAddr::V4(_) => V4_BITS,
        IpAddr::V6(_) => ADDR_BITS,
    };

    let prefix_len = if !mask.is_empty() && mask.bytes().all(|b| b.is_ascii_digit()) {
        match mask.parse::<u16>() {
            Ok(len) if len <= family_bits as u16 => len as u8,
            _ => {
                return Err(SubnetParseError::PrefixLength {
                    len: mask.to_string(),
                    max: family_bits,
                })
            }
        }
    } else if let Ok(netmask) = mask.parse::<Ipv4Addr>() {
        if !addr.is_ipv4() {
            return Err(SubnetParseError::FamilyMismatch { mask: mask.to_string() });
        }
        netmask_len((u32::from(netmask) as u128) << 96)
            .ok_or_else(|| SubnetParseError::Netmask(mask.to_string()))?
    } else if let Ok(netmask) = mask.parse::<Ipv6Addr>() {
        if !addr.is_ipv6() {
            return Err(SubnetParseError::FamilyMismatch { mask: mask.to_string() });
        }
        netmask_len(u128::from(netmask))
            .ok_or_else(|| SubnetParseError::Netmask(mask.to_string()))?
    } else {
        return Err(SubnetParseError::Netmask(mask.to_string()));
    };

    let net = match addr {
        IpAddr::V4(v4) => Ipv4Net::new(v4, prefix_len).map(IpNet::V4),
        IpAddr::V6(v6) => Ipv6Net::new(v6, prefix_len).map(IpNet::V6),
    }
    .map_err(|_| SubnetParseError::PrefixLength {
        len: mask.to_string(),
        max: family_bits,
    })?;

    Ok(ParsedSubnet {
        net: net.trunc(),
        mask_bits: family_bits,
    })
}

// `parse_subnet` only yields 32 or 128; this guards other producers of `ParsedSubnet`.
fn normalize(index: usize, parsed: &ParsedSubnet) -> Result<AddressSpace, DecodeError> {
    match parsed.mask_bits() {
        V4_BITS | ADDR_BITS => Ok(parsed.address_space()),
        bits => Err(DecodeError::InvalidNetmask { index, bits }),
    }
}

// ───────────────────────── decoding ──────────────────────────────────── //

/// A map key as found in the raw document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawKey {
    Text(String),
    /// Anything else; carries the kind for diagnostics.
    Other(&'static str),
}

impl From<String> for RawKey {
    fn from(s: String) -> Self {
        RawKey::Text(s)
    }
}

impl From<&str> for RawKey {
    fn from(s: &str) -> Self {
        RawKey::Text(s.to_string())
    }
}

/// Build a table from map entries, in iteration order.
///
/// Two keys normalizing to the same prefix: the later one wins.
pub fn decode_entries<V, I, K>(entries: I) -> Result<SubnetMap<V>, DecodeError>
where
    V: DeserializeOwned,
    I: IntoIterator<Item = (K, Value)>,
    K: Into<RawKey>,
{
    let mut output = Map::new();
    for (index, (key, value)) in entries.into_iter().enumerate() {
        let text = match key.into() {
            RawKey::Text(text) => text,
            RawKey::Other(kind) => return Err(DecodeError::InvalidKeyType { index, kind }),
        };
        let parsed = parse_subnet(&text).map_err(|source| DecodeError::InvalidSubnet {
            index,
            key: text.clone(),
            source,
        })?;
        let canonical = normalize(index, &parsed)?.to_string();
        trace!("[DECODE] key {index} {text:?} -> {canonical}");
        if output.insert(canonical.clone(), value).is_some() {
            warn!("[DECODE] key {index} ({text:?}) overrides an earlier entry for {canonical}");
        }
    }

    let intermediate: HashMap<String, V> = serde_json::from_value(Value::Object(output))
        .map_err(|source| DecodeError::SubDecodeFailed {
            type_name: type_name::<V>(),
            source,
        })?;

    let mut trie = PrefixTrie::new();
    for (index, (key, value)) in intermediate.into_iter().enumerate() {
        let prefix: AddressSpace = key.parse().map_err(|source| DecodeError::InvalidSubnet {
            index,
            key: key.clone(),
            source,
        })?;
        trie.insert(prefix, value);
    }
    debug!("[DECODE] built subnet map with {} prefixes", trie.len());
    Ok(SubnetMap::from_trie(trie))
}

/// Outcome of running a decode hook on a raw value.
#[derive(Debug)]
pub enum HookOutcome<V> {
    Handled(SubnetMap<V>),
    /// The hook does not apply; the input is handed back untouched.
    NotApplicable(Value),
    Failed(DecodeError),
}

impl<V> HookOutcome<V> {
    /// Try `next` when this hook declined.
    pub fn or_else<F>(self, next: F) -> HookOutcome<V>
    where
        F: FnOnce(Value) -> HookOutcome<V>,
    {
        match self {
            HookOutcome::NotApplicable(raw) => next(raw),
            other => other,
        }
    }

    /// A decline becomes [`DecodeError::NotApplicable`].
    pub fn into_result(self) -> Result<SubnetMap<V>, DecodeError> {
        match self {
            HookOutcome::Handled(map) => Ok(map),
            HookOutcome::NotApplicable(_) => Err(DecodeError::NotApplicable {
                type_name: type_name::<V>(),
            }),
            HookOutcome::Failed(err) => Err(err),
        }
    }

    pub fn is_handled(&self) -> bool {
        matches!(self, HookOutcome::Handled(_))
    }
}

impl<V> From<Result<SubnetMap<V>, DecodeError>> for HookOutcome<V> {
    fn from(result: Result<SubnetMap<V>, DecodeError>) -> Self {
        match result {
            Ok(map) => HookOutcome::Handled(map),
            Err(err) => HookOutcome::Failed(err),
        }
    }
}

/// Something that can turn a raw configuration value into a `SubnetMap<V>`.
pub trait DecodeHook<V> {
    fn decode(&self, raw: Value) -> HookOutcome<V>;
}

impl<V, F> DecodeHook<V> for F
where
    F: Fn(Value) -> HookOutcome<V>,
{
    fn decode(&self, raw: Value) -> HookOutcome<V> {
        self(raw)
    }
}

/// The subnet map hook for value type `V`.
pub struct SubnetMapHook<V>(PhantomData<fn() -> V>);

impl<V> SubnetMapHook<V> {
    pub const fn new() -> Self {
        SubnetMapHook(PhantomData)
    }
}

impl<V> Default for SubnetMapHook<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for SubnetMapHook<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for SubnetMapHook<V> {}

impl<V: DeserializeOwned> DecodeHook<V> for SubnetMapHook<V> {
    fn decode(&self, raw: Value) -> HookOutcome<V> {
        decode_hook(raw)
    }
}

/// Run `hooks` in order until one of them handles (or fails on) `raw`.
pub fn run_hooks<V>(hooks: &[&dyn DecodeHook<V>], raw: Value) -> HookOutcome<V> {
    hooks
        .iter()
        .fold(HookOutcome::NotApplicable(raw), |outcome, hook| {
            outcome.or_else(|raw| hook.decode(raw))
        })
}

/// Decode `raw` as a `SubnetMap<V>`.
///
/// * a JSON object is a map of subnets to values;
/// * `null` is an absent map and gives an empty table;
/// * anything decoding as `V` applies to `::/0`;
/// * anything else is handed back as [`HookOutcome::NotApplicable`].
pub fn decode_hook<V: DeserializeOwned>(raw: Value) -> HookOutcome<V> {
    let outcome = match raw {
        Value::Null => HookOutcome::Handled(SubnetMap::new()),
        Value::Object(map) => decode_entries(map).into(),
        other => decode_single(other),
    };
    observe(&outcome);
    outcome
}

fn decode_single<V: DeserializeOwned>(raw: Value) -> HookOutcome<V> {
    if let Err(err) = V::deserialize(&raw) {
        debug!("[DECODE] not a {}: {err}", type_name::<V>());
        return HookOutcome::NotApplicable(raw);
    }
    decode_entries([(MATCH_ALL_KEY, raw)]).into()
}

fn observe<V>(outcome: &HookOutcome<V>) {
    match outcome {
        HookOutcome::Handled(map) => {
            counter!(METRIC_DECODES).increment(1);
            gauge!(METRIC_ENTRIES).set(map.len() as f64);
        }
        HookOutcome::NotApplicable(_) => counter!(METRIC_DECLINED).increment(1),
        HookOutcome::Failed(_) => counter!(METRIC_DECODE_FAILURES).increment(1),
    }
}

// ───────────────────────── serde entry point ─────────────────────────── //

impl<'de> Deserialize<'de> for RawKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RawKeyVisitor)
    }
}

struct RawKeyVisitor;

impl<'de> Visitor<'de> for RawKeyVisitor {
    type Value = RawKey;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map key")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<RawKey, E> {
        Ok(RawKey::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<RawKey, E> {
        Ok(RawKey::Text(v))
    }

    fn visit_char<E: de::Error>(self, v: char) -> Result<RawKey, E> {
        Ok(RawKey::Text(v.to_string()))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<RawKey, E> {
        Ok(RawKey::Other("bool"))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<RawKey, E> {
        Ok(RawKey::Other("int"))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<RawKey, E> {
        Ok(RawKey::Other("uint"))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<RawKey, E> {
        Ok(RawKey::Other("float"))
    }

    fn visit_bytes<E: de::Error>(self, _: &[u8]) -> Result<RawKey, E> {
        Ok(RawKey::Other("bytes"))
    }

    fn visit_unit<E: de::Error>(self) -> Result<RawKey, E> {
        Ok(RawKey::Other("null"))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RawKey, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(RawKey::Other("sequence"))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawKey, A::Error> {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(RawKey::Other("map"))
    }
}

/// Same rules as [`decode_hook`], driven from any self-describing format.
/// Serde has no fall-through, so a value that is neither a map nor a `V`
/// is an error here.
impl<'de, V: DeserializeOwned> Deserialize<'de> for SubnetMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SubnetMapVisitor(PhantomData))
    }
}

struct SubnetMapVisitor<V>(PhantomData<fn() -> V>);

impl<V: DeserializeOwned> SubnetMapVisitor<V> {
    fn finish<E: de::Error>(outcome: HookOutcome<V>) -> Result<SubnetMap<V>, E> {
        observe(&outcome);
        outcome.into_result().map_err(E::custom)
    }

    fn single<E: de::Error>(raw: Value) -> Result<SubnetMap<V>, E> {
        Self::finish(decode_single(raw))
    }
}

impl<'de, V: DeserializeOwned> Visitor<'de> for SubnetMapVisitor<V> {
    type Value = SubnetMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a map of subnets to {} or a single value", type_name::<V>())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(key) = access.next_key::<RawKey>()? {
            let value: Value = access.next_value()?;
            entries.push((key, value));
        }
        Self::finish(decode_entries(entries).into())
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Self::finish(HookOutcome::Handled(SubnetMap::new()))
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        self.visit_unit()
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Self::single(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Self::single(Value::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Self::single(Value::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Self::single(Value::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Self::single(Value::from(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Self::single(Value::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<Value>()? {
            items.push(item);
        }
        Self::single(Value::Array(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn netmask_width_other_than_32_or_128_is_rejected() {
        let parsed = ParsedSubnet {
            net: "192.0.2.0/24".parse().unwrap(),
            mask_bits: 64,
        };
        let err = normalize(3, &parsed).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidNetmask { index: 3, bits: 64 }));
    }

    #[test]
    fn parse_accepts_every_mask_notation() {
        let cases = [
            ("192.0.2.1/24", "192.0.2.0/24", 32),
            ("192.0.2.1/255.255.255.0", "192.0.2.0/24", 32),
            ("2001:db8::1/32", "2001:db8::/32", 128),
            ("2001:db8::1/ffff:ffff::", "2001:db8::/32", 128),
            ("::ffff:192.0.2.0/120", "::ffff:192.0.2.0/120", 128),
        ];
        for (input, net, bits) in cases {
            let parsed = parse_subnet(input).unwrap();
            assert_eq!(parsed.net(), net.parse::<IpNet>().unwrap(), "{input}");
            assert_eq!(parsed.mask_bits(), bits, "{input}");
        }
    }

    #[test]
    fn parse_rejects_malformed_keys() {
        assert_eq!(
            parse_subnet("192.0.2.0").unwrap_err(),
            SubnetParseError::MissingSeparator
        );
        assert!(matches!(
            parse_subnet("192.0.2.1/38"),
            Err(SubnetParseError::PrefixLength { max: 32, .. })
        ));
        assert!(matches!(
            parse_subnet("2001:db8::/1000"),
            Err(SubnetParseError::PrefixLength { max: 128, .. })
        ));
        assert!(matches!(
            parse_subnet("192.0.2.1/255.0.255.0"),
            Err(SubnetParseError::Netmask(_))
        ));
        assert!(matches!(
            parse_subnet("2001:db8::/255.255.0.0"),
            Err(SubnetParseError::FamilyMismatch { .. })
        ));
        assert!(matches!(
            parse_subnet("192.0.2.0/ffff::"),
            Err(SubnetParseError::FamilyMismatch { .. })
        ));
        assert!(matches!(
            parse_subnet("example.com/24"),
            Err(SubnetParseError::Address(_))
        ));
        assert!(matches!(
            parse_subnet("192.0.2.0/"),
            Err(SubnetParseError::Netmask(_))
        ));
    }

    #[test]
    fn ipv4_keys_are_shifted_by_96() {
        let prefix = parse_subnet("203.0.113.0/24").unwrap().address_space();
        assert_eq!(prefix.prefix_len(), 120);
        assert_eq!(prefix.to_string(), "::ffff:203.0.113.0/120");
    }
}
