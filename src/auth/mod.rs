//! Identity verification and token primitives
//!
//! Provides:
//! - Opaque identifier generation
//! - JWT signing and verification with a process-lifetime secret
//! - The key vault backing issued tokens
//! - Guard strategies and the guard chain

pub mod guards;
pub mod identifier;
pub mod jwt;
pub mod vault;

pub use guards::{GuardChain, GuardRegistry, GuardStrategy, IpRangeGuard, PasswordGuard};
pub use identifier::{IdentifierGenerator, UuidGenerator};
pub use jwt::{TokenClaims, TokenRejection, TokenSigner, TOKEN_TTL_SECS};
pub use vault::{spawn_compaction_task, KeyVault, VaultCheck, VaultStats};
