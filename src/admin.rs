// ABOUTME: One-shot roster administration: add, remove and list participants
// ABOUTME: Each action loads the roster, changes at most one entry and saves it back

use anyhow::Result;
use chatty_core::identity::validate_identity;
use chatty_core::{IdentityStore, Roster};

/// Administrative action requested on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminAction {
    Add(String),
    Remove(String),
    List,
}

/// Register a participant with alias = identity. Re-adding an existing
/// participant keeps their alias. Returns true if the participant is new.
pub fn add_participant(store: &IdentityStore, identity: &str) -> Result<bool> {
    validate_identity(identity)?;

    let mut roster = store.load_all().roster;
    let added = roster.add(identity);
    store.save_all(&roster)?;

    if added {
        tracing::info!(identity = %identity, "Participant added");
    } else {
        tracing::info!(identity = %identity, "Participant already registered");
    }
    Ok(added)
}

/// Remove a participant. Returns true if they were registered.
pub fn remove_participant(store: &IdentityStore, identity: &str) -> Result<bool> {
    let mut roster = store.load_all().roster;
    let removed = roster.remove(identity).is_some();
    store.save_all(&roster)?;

    if removed {
        tracing::info!(identity = %identity, "Participant removed");
    } else {
        tracing::warn!(identity = %identity, "Participant was not registered");
    }
    Ok(removed)
}

/// Current roster as stored
pub fn list_participants(store: &IdentityStore) -> Roster {
    store.load_all().roster
}

/// Run an action and print its outcome to stdout
pub fn run(store: &IdentityStore, action: &AdminAction) -> Result<()> {
    match action {
        AdminAction::Add(identity) => {
            if add_participant(store, identity)? {
                println!("Added {}", identity);
            } else {
                println!("{} is already registered", identity);
            }
        }
        AdminAction::Remove(identity) => {
            if remove_participant(store, identity)? {
                println!("Removed {}", identity);
            } else {
                println!("{} was not registered", identity);
            }
        }
        AdminAction::List => {
            let roster = list_participants(store);
            if roster.is_empty() {
                println!("No participants registered");
            }
            for (identity, alias) in roster.iter() {
                println!("{}\t[{}]", identity, alias);
            }
        }
    }
    Ok(())
}
