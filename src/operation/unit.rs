//! Operation unit identifiers

use std::fmt;

use uuid::Uuid;

/// Identifier binding the page operations of one atomic unit of work
///
/// Generated once per unit and never reused. The nil id marks records that
/// have not been captured by a unit yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct OperationUnitId(Uuid);

impl OperationUnitId {
    /// Encoded size in bytes
    pub const SIZE: usize = 16;

    pub const NIL: Self = Self(Uuid::nil());

    /// Fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; Self::SIZE] {
        self.0.as_bytes()
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for OperationUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}
