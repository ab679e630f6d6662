//! Cache key builders
//!
//! Keys are namespaced by entity so a flush of one family never touches another.

use std::fmt;
use uuid::Uuid;

/// `payment:{id}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentKey {
    id: Uuid,
}

impl PaymentKey {
    pub const PREFIX: &'static str = "payment";

    pub fn new(id: Uuid) -> Self {
        Self { id }
    }
}

impl fmt::Display for PaymentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", Self::PREFIX, self.id)
    }
}
