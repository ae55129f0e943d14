// ABOUTME: Participant identities and their persisted aliases
// ABOUTME: Loads/saves the whole roster through a key-value store using an index record

use crate::roster::Roster;
use crate::storage::{KeyValueStore, WriteOp};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Reserved key holding the newline-joined list of registered identities
pub const USERS_KEY: &str = "users";

/// Strip the `/resource` qualifier from a protocol address.
///
/// `alice@example.com/laptop` -> `alice@example.com`
pub fn identity_from_address(address: &str) -> &str {
    match address.split_once('/') {
        Some((bare, _)) => bare,
        None => address,
    }
}

/// Check that a string can be used as a roster identity
pub fn validate_identity(identity: &str) -> Result<()> {
    if identity.trim().is_empty() {
        anyhow::bail!("Identity cannot be empty");
    }
    if identity.trim() != identity {
        anyhow::bail!("Identity cannot start or end with whitespace: {:?}", identity);
    }
    if identity.contains('\n') || identity.contains('\r') {
        anyhow::bail!("Identity cannot contain line breaks: {:?}", identity);
    }
    if identity.contains('/') {
        anyhow::bail!(
            "Identity must not carry a resource qualifier: {} (use {})",
            identity,
            identity_from_address(identity)
        );
    }
    if identity == USERS_KEY {
        anyhow::bail!("'{}' is a reserved key and cannot be an identity", USERS_KEY);
    }
    Ok(())
}

/// Result of loading the roster
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub roster: Roster,
    /// Identities listed in the index whose record could not be read
    pub missing: Vec<String>,
    /// Whether the index record was present and readable
    pub index_found: bool,
}

impl LoadReport {
    /// True when every indexed identity was loaded
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Persists the roster as one record per identity plus the index record.
#[derive(Clone)]
pub struct IdentityStore {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for IdentityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityStore")
            .field("store", &"<KeyValueStore>")
            .finish()
    }
}

impl IdentityStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read the index record. `Ok(None)` means no index has been written yet.
    ///
    /// Lines are kept verbatim; only empty lines are skipped.
    fn read_index(&self) -> Result<Option<Vec<String>>> {
        let Some(bytes) = self.store.get(USERS_KEY).context("Failed to read user index")? else {
            return Ok(None);
        };
        let text = String::from_utf8(bytes).context("User index is not valid UTF-8")?;

        Ok(Some(
            text.split('\n')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ))
    }

    /// Load the full roster.
    ///
    /// Never fails: a missing index gives an empty roster, and identities whose
    /// record is missing or unreadable are left out and listed in `missing`.
    pub fn load_all(&self) -> LoadReport {
        let identities = match self.read_index() {
            Ok(Some(identities)) => identities,
            Ok(None) => {
                tracing::info!("No user index found, starting with an empty roster");
                return LoadReport::default();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable user index, starting with an empty roster");
                return LoadReport::default();
            }
        };

        let mut report = LoadReport {
            index_found: true,
            ..Default::default()
        };

        for identity in identities {
            match self.store.get(&identity) {
                Ok(Some(bytes)) => match String::from_utf8(bytes) {
                    Ok(alias) => report.roster.insert(identity, alias),
                    Err(_) => {
                        tracing::warn!(identity = %identity, "Alias record is not valid UTF-8");
                        report.missing.push(identity);
                    }
                },
                Ok(None) => {
                    tracing::warn!(identity = %identity, "Could not locate user record");
                    report.missing.push(identity);
                }
                Err(e) => {
                    tracing::warn!(identity = %identity, error = %e, "Failed to read user record");
                    report.missing.push(identity);
                }
            }
        }

        tracing::info!(
            members = report.roster.len(),
            missing = report.missing.len(),
            "Roster loaded"
        );

        report
    }

    /// Persist the full roster.
    ///
    /// Writes every identity record, drops records of identities that left
    /// the roster, then rewrites the index, all in one batch.
    pub fn save_all(&self, roster: &Roster) -> Result<()> {
        let previous: BTreeSet<String> = match self.read_index() {
            Ok(index) => index.unwrap_or_default().into_iter().collect(),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Previous user index unreadable, stale user records will not be removed"
                );
                BTreeSet::new()
            }
        };

        let mut batch = Vec::with_capacity(roster.len() + previous.len() + 1);
        for (identity, alias) in roster.iter() {
            batch.push(WriteOp::Put {
                key: identity.to_string(),
                value: alias.as_bytes().to_vec(),
            });
        }
        for stale in previous.iter().filter(|id| !roster.contains(id)) {
            batch.push(WriteOp::Remove { key: stale.clone() });
        }

        let index = roster.identities().collect::<Vec<_>>().join("\n");
        batch.push(WriteOp::Put {
            key: USERS_KEY.to_string(),
            value: index.into_bytes(),
        });

        self.store
            .apply(batch)
            .context("Failed to save roster to identity store")?;

        tracing::debug!(members = roster.len(), "Roster saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store_with(records: &[(&str, &str)]) -> (MemoryStore, IdentityStore) {
        let mem = MemoryStore::new();
        for (k, v) in records {
            mem.put(k, v.as_bytes()).unwrap();
        }
        let identities = IdentityStore::new(Arc::new(mem.clone()));
        (mem, identities)
    }

    #[test]
    fn test_identity_from_address_strips_resource() {
        assert_eq!(identity_from_address("a@example.com/phone"), "a@example.com");
        assert_eq!(identity_from_address("a@example.com/x/y"), "a@example.com");
        assert_eq!(identity_from_address("a@example.com"), "a@example.com");
        assert_eq!(identity_from_address(""), "");
    }

    #[test]
    fn test_validate_identity() {
        assert!(validate_identity("a@example.com").is_ok());
        assert!(validate_identity("").is_err());
        assert!(validate_identity("   ").is_err());
        assert!(validate_identity("a@example.com/res").is_err());
        assert!(validate_identity("a\nb").is_err());
        assert!(validate_identity(USERS_KEY).is_err());
        assert!(validate_identity(" a@example.com").is_err());
        assert!(validate_identity("a@example.com\t").is_err());
    }

    #[test]
    fn test_index_lines_are_not_trimmed() {
        let (_, identities) = store_with(&[
            (USERS_KEY, " a@example.com\n\nb@example.com"),
            (" a@example.com", "Alice"),
            ("b@example.com", "Bob"),
        ]);
        let report = identities.load_all();
        assert!(report.is_complete());
        assert_eq!(report.roster.alias_of(" a@example.com"), Some("Alice"));
        assert_eq!(report.roster.alias_of("b@example.com"), Some("Bob"));
        assert_eq!(report.roster.len(), 2);
    }

    #[test]
    fn test_round_trip_keeps_surrounding_whitespace() {
        let (_, identities) = store_with(&[]);
        let roster: Roster = [(" alice@example.com", "Alice")].into_iter().collect();

        identities.save_all(&roster).unwrap();
        let report = identities.load_all();
        assert_eq!(report.roster, roster);
        assert!(report.missing.is_empty());
    }

    #[test]
    fn test_save_rewrites_unreadable_index() {
        let mem = MemoryStore::new();
        mem.put(USERS_KEY, &[0xff, 0xfe, 0x00]).unwrap();
        let identities = IdentityStore::new(Arc::new(mem.clone()));

        let report = identities.load_all();
        assert!(report.roster.is_empty());
        assert!(!report.index_found);

        let roster: Roster = [("a", "Bob")].into_iter().collect();
        identities.save_all(&roster).unwrap();

        assert_eq!(mem.get(USERS_KEY).unwrap(), Some(b"a".to_vec()));
        assert_eq!(identities.load_all().roster, roster);
    }

    #[test]
    fn test_load_without_index_is_empty() {
        let (_, identities) = store_with(&[("a@example.com", "Bob")]);
        let report = identities.load_all();
        assert!(report.roster.is_empty());
        assert!(!report.index_found);
        assert!(report.is_complete());
    }

    #[test]
    fn test_load_reports_missing_records() {
        let (_, identities) = store_with(&[
            (USERS_KEY, "a@example.com\nb@example.com\n"),
            ("a@example.com", "Bob"),
        ]);
        let report = identities.load_all();
        assert!(report.index_found);
        assert_eq!(report.roster.len(), 1);
        assert_eq!(report.roster.alias_of("a@example.com"), Some("Bob"));
        assert_eq!(report.missing, vec!["b@example.com".to_string()]);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let (_, identities) = store_with(&[]);
        let roster: Roster = [("a", "Bob"), ("b", "Ann"), ("c", "c")]
            .into_iter()
            .collect();

        identities.save_all(&roster).unwrap();
        let report = identities.load_all();
        assert_eq!(report.roster, roster);
        assert!(report.is_complete());
    }

    #[test]
    fn test_save_removes_stale_records() {
        let (mem, identities) = store_with(&[]);
        let mut roster: Roster = [("a", "Bob"), ("b", "Ann")].into_iter().collect();
        identities.save_all(&roster).unwrap();

        roster.remove("b");
        identities.save_all(&roster).unwrap();

        assert_eq!(mem.keys(), vec!["a".to_string(), USERS_KEY.to_string()]);
        assert_eq!(mem.get(USERS_KEY).unwrap(), Some(b"a".to_vec()));
    }

    #[test]
    fn test_save_surfaces_write_errors() {
        let (mem, identities) = store_with(&[]);
        mem.set_fail_writes(true);
        let roster: Roster = [("a", "Bob")].into_iter().collect();
        assert!(identities.save_all(&roster).is_err());
    }
}
