use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::directory::IdentityDirectory;
use crate::address::{ChainAddress, InvalidAddress};
use crate::types::{CandidateSource, ResolvedCandidate, ViewerIdentity};

/// Candidates for one identity, plus the validation failure that left the
/// list empty (if any).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub candidates: Vec<ResolvedCandidate>,
    pub rejected: Option<InvalidAddress>,
}

impl Resolution {
    fn found(candidates: Vec<ResolvedCandidate>) -> Self {
        Self {
            candidates,
            rejected: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Turns a [`ViewerIdentity`] into chain addresses.
///
/// Strategies run in a fixed order and stop at the first one that yields a
/// candidate:
///
/// 1. platform-attested wallet claim (`VerifiedAttested`)
/// 2. unattested wallet claim (`Claimed`)
/// 3. directory lookup by numeric id (`ExternalLookup`), bounded by a timeout
/// 4. placeholder padded from the numeric id (`DerivedFromId`)
/// 5. free text parsed as an address (`UserSupplied`)
pub struct IdentityResolver {
    directory: Option<Arc<dyn IdentityDirectory>>,
    lookup_timeout: Duration,
    allow_derived_fallback: bool,
}

impl IdentityResolver {
    pub fn new(
        directory: Option<Arc<dyn IdentityDirectory>>,
        lookup_timeout: Duration,
        allow_derived_fallback: bool,
    ) -> Self {
        Self {
            directory,
            lookup_timeout,
            allow_derived_fallback,
        }
    }

    pub async fn resolve(&self, identity: &ViewerIdentity) -> Resolution {
        let mut rejected = None;

        if let Some(claim) = &identity.claim {
            let source = if claim.verified {
                CandidateSource::VerifiedAttested
            } else {
                CandidateSource::Claimed
            };
            match ChainAddress::parse(&claim.address) {
                Ok(address) => {
                    return Resolution::found(vec![ResolvedCandidate::new(address, source)]);
                }
                Err(e) => {
                    warn!("⚠️ Ignoring {:?} wallet claim {:?}: {}", source, claim.address, e);
                    rejected = Some(e);
                }
            }
        }

        if let Some(id) = identity.numeric_id {
            let looked_up = self.lookup(id).await;
            if !looked_up.is_empty() {
                return Resolution::found(looked_up);
            }

            if self.allow_derived_fallback {
                let address = ChainAddress::from_numeric_id(id);
                warn!(
                    "⚠️ No wallet for id {}, falling back to placeholder {}",
                    id, address
                );
                return Resolution::found(vec![ResolvedCandidate::new(
                    address,
                    CandidateSource::DerivedFromId,
                )]);
            }
        }

        if let Some(text) = &identity.raw_text {
            match ChainAddress::parse(text) {
                Ok(address) => {
                    return Resolution::found(vec![ResolvedCandidate::new(
                        address,
                        CandidateSource::UserSupplied,
                    )]);
                }
                Err(e) => {
                    debug!("Rejected user-supplied address {:?}: {}", text, e);
                    rejected = Some(e);
                }
            }
        }

        Resolution {
            candidates: Vec::new(),
            rejected,
        }
    }

    /// Directory candidates, deduplicated, in directory order. Any failure
    /// (timeout, transport, bad addresses) just yields fewer candidates.
    async fn lookup(&self, id: u64) -> Vec<ResolvedCandidate> {
        let Some(directory) = &self.directory else {
            return Vec::new();
        };

        let addresses =
            match tokio::time::timeout(self.lookup_timeout, directory.lookup_addresses(id)).await {
                Ok(Ok(addresses)) => addresses,
                Ok(Err(e)) => {
                    warn!("⚠️ Directory lookup for id {} failed: {}", id, e);
                    return Vec::new();
                }
                Err(_) => {
                    warn!(
                        "⚠️ Directory lookup for id {} timed out after {:?}",
                        id, self.lookup_timeout
                    );
                    return Vec::new();
                }
            };

        let mut candidates: Vec<ResolvedCandidate> = Vec::new();
        for raw in addresses {
            match ChainAddress::parse(&raw) {
                Ok(address) if candidates.iter().all(|c| c.address != address) => {
                    candidates.push(ResolvedCandidate::new(address, CandidateSource::ExternalLookup));
                }
                Ok(_) => {}
                Err(e) => warn!("⚠️ Directory returned unusable address {:?}: {}", raw, e),
            }
        }

        if !candidates.is_empty() {
            info!("✅ Directory resolved id {} to {} address(es)", id, candidates.len());
        }
        candidates
    }
}
