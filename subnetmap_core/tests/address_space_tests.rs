use std::net::{IpAddr, Ipv6Addr};

use ipnet::IpNet;
use subnetmap_core::{AddressSpace, SubnetParseError};

#[test]
fn host_bits_are_cleared() {
    let a = AddressSpace::new(u128::MAX, 64).unwrap();
    assert_eq!(a.bits(), (u64::MAX as u128) << 64);
    assert_eq!(a, AddressSpace::new((u64::MAX as u128) << 64 | 5, 64).unwrap());
    assert!(AddressSpace::new(0, 129).is_none());
}

#[test]
fn ipv4_is_mapped_into_the_v6_space() {
    let host = AddressSpace::host("203.0.113.7".parse().unwrap());
    let mapped = AddressSpace::host("::ffff:203.0.113.7".parse().unwrap());
    assert_eq!(host, mapped);
    assert_eq!(host.prefix_len(), 128);

    let net = AddressSpace::from("203.0.113.0/24".parse::<IpNet>().unwrap());
    assert_eq!(net.prefix_len(), 120);
    assert!(net.contains(&host));
    assert_eq!(net.to_string(), "::ffff:203.0.113.0/120");
    assert_eq!(net.last(), "::ffff:203.0.113.255".parse::<Ipv6Addr>().unwrap());
}

#[test]
fn containment_is_nested() {
    let outer: AddressSpace = "10.0.0.0/8".parse().unwrap();
    let inner: AddressSpace = "10.0.0.0/16".parse().unwrap();
    let other: AddressSpace = "10.1.0.0/16".parse().unwrap();
    assert!(outer.contains(&inner));
    assert!(outer.contains(&other));
    assert!(!inner.contains(&outer));
    assert!(!inner.contains(&other));
    assert!(AddressSpace::any().contains(&outer));
    assert!(inner.contains_addr(IpAddr::from([10, 0, 255, 255])));
    assert!(!inner.contains_addr(IpAddr::from([10, 1, 0, 0])));
}

#[test]
fn canonical_text_parses_back() {
    for text in ["::/0", "::ffff:192.0.2.0/120", "2001:db8::/32", "2001:db8::1/128"] {
        let prefix: AddressSpace = text.parse().unwrap();
        assert_eq!(prefix.to_string(), text);
    }
    assert_eq!(
        "192.0.2.0/255.255.255.0".parse::<AddressSpace>().unwrap().to_string(),
        "::ffff:192.0.2.0/120"
    );
    assert_eq!(
        "not-a-subnet".parse::<AddressSpace>().unwrap_err(),
        SubnetParseError::MissingSeparator
    );
}
