// ABOUTME: Tests for roster persistence on the SQLite-backed identity store
// ABOUTME: Verifies round-trips, index/record consistency and degraded loads

use chatty_core::{
    identity::USERS_KEY, IdentityStore, KeyValueStore, Roster, SqliteStore,
};
use std::sync::Arc;

fn open(dir: &std::path::Path) -> (SqliteStore, IdentityStore) {
    let sqlite = SqliteStore::open(dir).unwrap();
    let identities = IdentityStore::new(Arc::new(sqlite.clone()));
    (sqlite, identities)
}

#[test]
fn test_round_trip_across_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let roster: Roster = [
        ("alice@example.com", "Alice"),
        ("bob@example.com", "bob@example.com"),
        ("carol@example.com", "Ca rol [x]"),
        ("dave@example.com", "Dävé ✓"),
    ]
    .into_iter()
    .collect();

    {
        let (_, identities) = open(tmp.path());
        identities.save_all(&roster).unwrap();
    }

    let (_, identities) = open(tmp.path());
    let report = identities.load_all();
    assert!(report.index_found);
    assert!(report.is_complete());
    assert_eq!(report.roster, roster);
}

#[test]
fn test_index_is_newline_joined_identities() {
    let tmp = tempfile::tempdir().unwrap();
    let (sqlite, identities) = open(tmp.path());
    let roster: Roster = [("b", "Ann"), ("a", "Bob")].into_iter().collect();
    identities.save_all(&roster).unwrap();

    assert_eq!(sqlite.get(USERS_KEY).unwrap(), Some(b"a\nb".to_vec()));
    assert_eq!(sqlite.get("a").unwrap(), Some(b"Bob".to_vec()));
    assert_eq!(sqlite.get("b").unwrap(), Some(b"Ann".to_vec()));
}

#[test]
fn test_empty_roster_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let (sqlite, identities) = open(tmp.path());
    identities.save_all(&Roster::new()).unwrap();

    assert_eq!(sqlite.get(USERS_KEY).unwrap(), Some(Vec::new()));
    let report = identities.load_all();
    assert!(report.index_found);
    assert!(report.roster.is_empty());
    assert!(report.is_complete());
}

#[test]
fn test_fresh_store_loads_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, identities) = open(tmp.path());
    let report = identities.load_all();
    assert!(!report.index_found);
    assert!(report.roster.is_empty());
}

#[test]
fn test_removed_member_record_is_deleted() {
    let tmp = tempfile::tempdir().unwrap();
    let (sqlite, identities) = open(tmp.path());
    let mut roster: Roster = [("a", "Bob"), ("b", "Ann")].into_iter().collect();
    identities.save_all(&roster).unwrap();

    roster.remove("a");
    identities.save_all(&roster).unwrap();

    assert_eq!(sqlite.get("a").unwrap(), None);
    assert_eq!(sqlite.get(USERS_KEY).unwrap(), Some(b"b".to_vec()));
}

#[test]
fn test_missing_and_corrupt_records_are_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let (sqlite, identities) = open(tmp.path());
    sqlite.put(USERS_KEY, b"a\nghost\nbroken").unwrap();
    sqlite.put("a", b"Bob").unwrap();
    sqlite.put("broken", &[0xff, 0xfe]).unwrap();

    let report = identities.load_all();
    assert_eq!(report.roster.len(), 1);
    assert_eq!(report.roster.alias_of("a"), Some("Bob"));
    assert_eq!(
        report.missing,
        vec!["ghost".to_string(), "broken".to_string()]
    );
}
