//! Identifiers for objects tracked by the model store.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of a model placed on the build plate.
///
/// Generated from a random v4 UUID when the model is added. The display
/// form is `model-` followed by the first eight hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId(Uuid);

impl ModelId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ModelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let simple = self.0.simple().to_string();
        write!(f, "model-{}", &simple[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_id_display() {
        let id = ModelId::from_uuid(Uuid::nil());
        assert_eq!(id.to_string(), "model-00000000");
    }

    #[test]
    fn test_model_ids_are_unique() {
        let a = ModelId::new();
        let b = ModelId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_model_id_serialization() {
        let id = ModelId::new();
        let json = serde_json::to_string(&id).expect("Should serialize");
        let parsed: ModelId = serde_json::from_str(&json).expect("Should deserialize");
        assert_eq!(id, parsed);
    }
}
