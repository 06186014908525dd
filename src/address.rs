use ethers::types::Address;
use ethers::utils::to_checksum;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const ADDRESS_HEX_LEN: usize = 40;

/// Why a string was rejected as a chain address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidAddress {
    #[error("expected 40 hex characters, got {0}")]
    WrongLength(usize),
    #[error("address contains non-hex characters")]
    NonHex,
    #[error("mixed-case address has an invalid checksum")]
    ChecksumMismatch,
}

/// A validated 20-byte EVM address.
///
/// The only ways to build one are [`ChainAddress::parse`] (and its `FromStr`
/// impl) and [`ChainAddress::from_numeric_id`]; everything handed to the chain
/// client has been through one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainAddress(Address);

impl ChainAddress {
    /// Validate `candidate` and normalise it to checksum form.
    ///
    /// Accepts an optional `0x`/`0X` prefix and surrounding whitespace.
    /// All-lowercase or all-uppercase hex is accepted without a checksum
    /// check; mixed case must match EIP-55.
    pub fn parse(candidate: &str) -> Result<Self, InvalidAddress> {
        let trimmed = candidate.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if hex_part.len() != ADDRESS_HEX_LEN {
            return Err(InvalidAddress::WrongLength(hex_part.len()));
        }
        if !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidAddress::NonHex);
        }

        let address =
            Address::from_str(&hex_part.to_ascii_lowercase()).map_err(|_| InvalidAddress::NonHex)?;

        let has_lower = hex_part.bytes().any(|b| b.is_ascii_lowercase());
        let has_upper = hex_part.bytes().any(|b| b.is_ascii_uppercase());
        if has_lower && has_upper {
            let expected = to_checksum(&address, None);
            if &expected[2..] != hex_part {
                return Err(InvalidAddress::ChecksumMismatch);
            }
        }

        Ok(Self(address))
    }

    /// Placeholder address built by left-padding the id's hex form to 20 bytes.
    ///
    /// Nobody holds a key for this address. Callers must treat it as a
    /// degraded fallback.
    pub fn from_numeric_id(id: u64) -> Self {
        Self(Address::from_low_u64_be(id))
    }

    pub fn checksummed(&self) -> String {
        to_checksum(&self.0, None)
    }

    pub fn as_address(&self) -> Address {
        self.0
    }
}

impl FromStr for ChainAddress {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ChainAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.checksummed())
    }
}

impl Serialize for ChainAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.checksummed())
    }
}
