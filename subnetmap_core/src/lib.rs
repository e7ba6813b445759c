//! Subnet-keyed lookup tables.
//!
//! A [`SubnetMap<V>`] associates values with IPv4 and IPv6 subnets and answers
//! "which value applies to this address?" with a longest-prefix match. Tables
//! are decoded from configuration (a map of CIDR strings to values, or a
//! single value for the whole address space) and serialize back to their
//! canonical form.
//!
//! ```
//! use subnetmap_core::SubnetMap;
//!
//! let map: SubnetMap<String> = serde_json::from_str(
//!     r#"{"10.0.0.0/8": "X", "10.0.0.0/16": "Y"}"#,
//! ).unwrap();
//! assert_eq!(map.lookup("10.0.0.1".parse().unwrap()).map(String::as_str), Some("Y"));
//! assert_eq!(map.lookup("10.1.0.1".parse().unwrap()).map(String::as_str), Some("X"));
//! ```

pub mod constants;
pub mod decoder;
pub mod errors;
pub mod helpers;
pub mod subnet_map;
pub mod telemetry;
pub mod trie;
pub mod types;

use once_cell::sync::OnceCell;

pub use decoder::{
    decode_entries, decode_hook, parse_subnet, run_hooks, DecodeHook, HookOutcome, RawKey,
    SubnetMapHook,
};
pub use errors::{DecodeError, ErrorCode, SubnetParseError};
pub use subnet_map::SubnetMap;
pub use trie::PrefixTrie;
pub use types::{AddressSpace, Match};

/// Install a plain `env_logger` (no timestamps) for hosts without a logger of
/// their own. Decoding never calls this. Only the first call does anything;
/// returns `false` if another logger was already installed at that point.
pub fn init_logging() -> bool {
    static INSTALLED: OnceCell<bool> = OnceCell::new();
    *INSTALLED.get_or_init(|| {
        env_logger::builder()
            .format_timestamp(None)
            .is_test(std::env::var("RUST_TEST_THREADS").is_ok())
            .try_init()
            .is_ok()
    })
}
