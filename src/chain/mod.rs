pub mod client;
pub mod contracts;
pub mod error;
pub mod reader;

pub use client::{CallPolicy, ChainClient};
pub use error::{ChainCallError, FailureReason};
pub use reader::{EthersTokenReader, TokenReader};
