//! Resolve a viewer identity to an ERC-20 balance for a "check my balance"
//! card.
//!
//! The pipeline runs [`identity`] → [`chain`] → [`format`], and
//! [`balance::BalanceResolver`] turns every failure into a
//! [`balance::ResolutionOutcome`].

pub mod address;
pub mod balance;
pub mod chain;
pub mod config;
pub mod format;
pub mod identity;
pub mod pricefeed;
pub mod types;

pub use address::{ChainAddress, InvalidAddress};
pub use balance::{BalanceResolver, Portfolio, ResolutionOutcome};
pub use types::{CandidateSource, ChainEndpoint, ViewerIdentity};
