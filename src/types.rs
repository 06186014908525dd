use ethers::types::U256;
use serde::Serialize;

use crate::address::ChainAddress;

/// A wallet the platform says belongs to the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletClaim {
    pub address: String,
    /// Set when the platform attested the wallet (e.g. a signed verification).
    pub verified: bool,
}

/// Who is asking, as far as the interaction payload can tell.
///
/// Platform payloads usually carry several parts at once (a numeric user id
/// plus attested wallets), so every part is optional. An identity with no
/// parts at all resolves to `NoIdentity`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerIdentity {
    pub numeric_id: Option<u64>,
    pub claim: Option<WalletClaim>,
    pub raw_text: Option<String>,
}

impl ViewerIdentity {
    pub fn from_numeric_id(id: u64) -> Self {
        Self::default().with_numeric_id(id)
    }

    pub fn from_claim(address: impl Into<String>, verified: bool) -> Self {
        Self::default().with_claim(address, verified)
    }

    pub fn from_raw_text(text: impl Into<String>) -> Self {
        Self::default().with_raw_text(text)
    }

    pub fn with_numeric_id(mut self, id: u64) -> Self {
        self.numeric_id = Some(id);
        self
    }

    /// A blank address means no wallet is connected; the claim is dropped.
    pub fn with_claim(mut self, address: impl Into<String>, verified: bool) -> Self {
        let address = address.into();
        self.claim = if address.trim().is_empty() {
            None
        } else {
            Some(WalletClaim { address, verified })
        };
        self
    }

    /// Blank text is treated as absent.
    pub fn with_raw_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.raw_text = if text.trim().is_empty() { None } else { Some(text) };
        self
    }

    pub fn is_empty(&self) -> bool {
        self.numeric_id.is_none() && self.claim.is_none() && self.raw_text.is_none()
    }
}

/// How a candidate address was obtained. Declaration order is priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    VerifiedAttested,
    Claimed,
    ExternalLookup,
    DerivedFromId,
    UserSupplied,
}

impl CandidateSource {
    /// Sources whose balance should be shown with reduced confidence.
    pub fn confidence_warning(self) -> Option<ConfidenceWarning> {
        match self {
            CandidateSource::DerivedFromId => Some(ConfidenceWarning::DerivedPlaceholder),
            CandidateSource::Claimed => Some(ConfidenceWarning::UnverifiedClaim),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceWarning {
    /// Address was padded out of a numeric id; not a custody address.
    DerivedPlaceholder,
    /// Wallet claim was not attested by the platform.
    UnverifiedClaim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedCandidate {
    pub address: ChainAddress,
    pub source: CandidateSource,
}

impl ResolvedCandidate {
    pub fn new(address: ChainAddress, source: CandidateSource) -> Self {
        Self { address, source }
    }
}

/// Network + token the balance is read from. Built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEndpoint {
    pub chain_id: u64,
    pub rpc_url: String,
    pub token_contract: ChainAddress,
    pub token_symbol: String,
}

/// Raw `balanceOf` / `decimals` pair as read from the token contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawBalance {
    pub amount: U256,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceResult {
    #[serde(serialize_with = "serialize_u256")]
    pub raw_amount: U256,
    pub decimals: u8,
    /// Two fractional digits, banker's rounding.
    pub formatted: String,
    /// Full precision, `formatUnits` style.
    pub exact: String,
    pub fiat_estimate: Option<String>,
}

fn serialize_u256<S: serde::Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}
