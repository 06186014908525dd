pub mod directory;
pub mod resolver;

pub use directory::{DirectoryError, IdentityDirectory, NeynarDirectory};
pub use resolver::{IdentityResolver, Resolution};
