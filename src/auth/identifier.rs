//! Opaque identifier generation

use uuid::Uuid;

use crate::types::Result;

/// Source of unique opaque identifiers
///
/// Implementations must be safe to call from many requests at once.
pub trait IdentifierGenerator: Send + Sync {
    fn generate(&self) -> Result<String>;
}

/// Random (v4) UUID generator
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdentifierGenerator for UuidGenerator {
    fn generate(&self) -> Result<String> {
        Ok(Uuid::new_v4().to_string())
    }
}
