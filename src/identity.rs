// src/identity.rs

use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a logical endpoint: a `(type, name)` pair plus free-form
/// metadata. The derived key `"type#name"` is the unit of addressing; two
/// identities are equal exactly when their keys are equal, metadata is
/// descriptive only.
#[derive(Debug, Clone, Default)]
pub struct ActorIdentity {
    actor_type: String,
    name: String,
    metadata: Vec<(String, String)>,
}

impl ActorIdentity {
    pub const KEY_SEPARATOR: char = '#';

    pub fn new(actor_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            actor_type: actor_type.into(),
            name: name.into(),
            metadata: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn actor_type(&self) -> &str {
        &self.actor_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    pub(crate) fn set_metadata(&mut self, metadata: Vec<(String, String)>) {
        self.metadata = metadata;
    }

    /// Composed addressing key, `"type#name"`.
    pub fn key(&self) -> String {
        Self::compose_key(&self.actor_type, &self.name)
    }

    pub fn compose_key(actor_type: &str, name: &str) -> String {
        let mut key = String::with_capacity(actor_type.len() + 1 + name.len());
        key.push_str(actor_type);
        key.push(Self::KEY_SEPARATOR);
        key.push_str(name);
        key
    }

    /// True when either half of the key is missing. An empty identity never
    /// names a reachable endpoint.
    pub fn is_empty(&self) -> bool {
        self.actor_type.is_empty() || self.name.is_empty()
    }
}

impl PartialEq for ActorIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.actor_type == other.actor_type && self.name == other.name
    }
}

impl Eq for ActorIdentity {}

impl Hash for ActorIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.actor_type.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for ActorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.actor_type, Self::KEY_SEPARATOR, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_type_hash_name() {
        let identity = ActorIdentity::new("chat", "lobby-1");
        assert_eq!(identity.key(), "chat#lobby-1");
        assert_eq!(identity.to_string(), "chat#lobby-1");
    }

    #[test]
    fn equality_is_by_key_only() {
        let a = ActorIdentity::new("worker", "w1").with_metadata("region", "eu");
        let b = ActorIdentity::new("worker", "w1").with_metadata("region", "us");
        let c = ActorIdentity::new("worker", "w2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn empty_when_either_half_missing() {
        assert!(ActorIdentity::new("", "x").is_empty());
        assert!(ActorIdentity::new("x", "").is_empty());
        assert!(ActorIdentity::default().is_empty());
        assert!(!ActorIdentity::new("x", "y").is_empty());
    }
}
