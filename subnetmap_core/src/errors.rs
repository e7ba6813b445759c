//! Error types for subnet map decoding

use std::net::AddrParseError;

use thiserror::Error;

/// Flat classification of [`DecodeError`], stable across releases.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidKeyType,
    InvalidSubnet,
    InvalidNetmask,
    SubDecodeFailed,
    NotApplicable,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidKeyType => "Invalid key type",
            ErrorCode::InvalidSubnet => "Invalid subnet",
            ErrorCode::InvalidNetmask => "Invalid netmask",
            ErrorCode::SubDecodeFailed => "Value decoding failed",
            ErrorCode::NotApplicable => "Not a subnet map",
        }
    }
}

/// Why a subnet key could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubnetParseError {
    #[error("missing '/' separator")]
    MissingSeparator,
    #[error("invalid address: {0}")]
    Address(#[from] AddrParseError),
    #[error("invalid prefix length {len} (maximum is {max})")]
    PrefixLength { len: String, max: u8 },
    #[error("invalid netmask {0}")]
    Netmask(String),
    #[error("netmask {mask} does not match the address family")]
    FamilyMismatch { mask: String },
}

/// Failure while turning a raw configuration value into a `SubnetMap`.
///
/// Every variant is fatal: no partially built table is ever returned.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("key {index} is not a string ({kind})")]
    InvalidKeyType { index: usize, kind: &'static str },

    #[error("key {index} ({key:?}) is not a valid subnet: {source}")]
    InvalidSubnet {
        index: usize,
        key: String,
        #[source]
        source: SubnetParseError,
    },

    #[error("key {index} has an invalid netmask ({bits} bits)")]
    InvalidNetmask { index: usize, bits: u8 },

    #[error("unable to decode {type_name:?}: {source}")]
    SubDecodeFailed {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("input is neither a map nor a {type_name:?}")]
    NotApplicable { type_name: &'static str },
}

impl DecodeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DecodeError::InvalidKeyType { .. } => ErrorCode::InvalidKeyType,
            DecodeError::InvalidSubnet { .. } => ErrorCode::InvalidSubnet,
            DecodeError::InvalidNetmask { .. } => ErrorCode::InvalidNetmask,
            DecodeError::SubDecodeFailed { .. } => ErrorCode::SubDecodeFailed,
            DecodeError::NotApplicable { .. } => ErrorCode::NotApplicable,
        }
    }
}
