// ABOUTME: In-memory group membership: identity to alias mapping
// ABOUTME: Authoritative list of who may post and who receives relayed messages

use std::collections::BTreeMap;

/// Identity -> Alias mapping defining group membership.
///
/// Backed by a `BTreeMap` so iteration (and therefore outbound message
/// order) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    members: BTreeMap<String, String>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.members.contains_key(identity)
    }

    /// Current alias of a member
    pub fn alias_of(&self, identity: &str) -> Option<&str> {
        self.members.get(identity).map(|s| s.as_str())
    }

    /// First member (in identity order) whose alias equals `alias` exactly
    pub fn find_by_alias(&self, alias: &str) -> Option<(&str, &str)> {
        self.members
            .iter()
            .find(|(_, a)| a.as_str() == alias)
            .map(|(id, a)| (id.as_str(), a.as_str()))
    }

    /// Register a member with alias = identity. An existing member keeps its
    /// alias. Returns true if the member is new.
    pub fn add(&mut self, identity: &str) -> bool {
        if self.members.contains_key(identity) {
            return false;
        }
        self.members
            .insert(identity.to_string(), identity.to_string());
        true
    }

    /// Insert or overwrite a member with an explicit alias
    pub fn insert(&mut self, identity: impl Into<String>, alias: impl Into<String>) {
        self.members.insert(identity.into(), alias.into());
    }

    /// Remove a member, returning its alias if it was present
    pub fn remove(&mut self, identity: &str) -> Option<String> {
        self.members.remove(identity)
    }

    /// Change the alias of an existing member. Returns the previous alias, or
    /// `None` (and changes nothing) if the identity is not a member.
    pub fn set_alias(&mut self, identity: &str, alias: &str) -> Option<String> {
        self.members
            .get_mut(identity)
            .map(|current| std::mem::replace(current, alias.to_string()))
    }

    /// Member identities in order
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(|k| k.as_str())
    }

    /// (identity, alias) pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.members.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Roster {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            members: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
