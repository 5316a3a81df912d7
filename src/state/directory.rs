//! Name directory: authenticated name to live session.
//!
//! Keys are case-folded so uniqueness is case-insensitive. Lookups for
//! routing additionally require the exact stored spelling.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use relay_proto::casefold;
use thiserror::Error;

use super::lanes::LaneHandle;
use super::session::SessionId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("name already registered: {0}")]
    DuplicateName(String),
}

/// Everything needed to reach a session from outside its lane.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    /// Name as the client spelled it.
    pub name: String,
    pub lane: LaneHandle,
}

#[derive(Default)]
pub struct Directory {
    entries: DashMap<String, SessionHandle>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its name.
    pub fn register(&self, handle: SessionHandle) -> Result<(), DirectoryError> {
        match self.entries.entry(casefold(&handle.name)) {
            Entry::Occupied(_) => Err(DirectoryError::DuplicateName(handle.name)),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                Ok(())
            }
        }
    }

    /// Remove the entry for `name` if it still belongs to `id`.
    ///
    /// Returns whether an entry was removed; repeated calls are harmless.
    pub fn unregister(&self, name: &str, id: SessionId) -> bool {
        self.entries
            .remove_if(&casefold(name), |_, handle| handle.id == id)
            .is_some()
    }

    /// Find the session registered under exactly `name`.
    pub fn find(&self, name: &str) -> Option<SessionHandle> {
        self.entries
            .get(&casefold(name))
            .filter(|entry| entry.name == name)
            .map(|entry| entry.value().clone())
    }

    /// Every registered session except `exclude`.
    pub fn others(&self, exclude: SessionId) -> Vec<SessionHandle> {
        self.entries
            .iter()
            .filter(|entry| entry.id != exclude)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(id: u64, name: &str) -> SessionHandle {
        SessionHandle {
            id: SessionId::new(id),
            name: name.to_string(),
            lane: LaneHandle::detached(0).0,
        }
    }

    #[test]
    fn register_rejects_case_insensitive_duplicate() {
        let dir = Directory::new();
        dir.register(handle(1, "Alice")).unwrap();
        assert_eq!(
            dir.register(handle(2, "alice")),
            Err(DirectoryError::DuplicateName("alice".into()))
        );
        assert_eq!(dir.len(), 1);
        assert!(dir.find("Alice").is_some());
    }

    #[test]
    fn find_requires_exact_spelling() {
        let dir = Directory::new();
        dir.register(handle(1, "Alice")).unwrap();
        assert_eq!(dir.find("Alice").map(|h| h.id), Some(SessionId::new(1)));
        assert!(dir.find("alice").is_none());
        assert!(dir.find("bob").is_none());
    }

    #[test]
    fn unregister_checks_owner_and_is_idempotent() {
        let dir = Directory::new();
        dir.register(handle(1, "bob")).unwrap();
        assert!(!dir.unregister("bob", SessionId::new(9)));
        assert_eq!(dir.len(), 1);
        assert!(dir.unregister("BOB", SessionId::new(1)));
        assert!(!dir.unregister("bob", SessionId::new(1)));
        assert!(dir.is_empty());
        // The name is free again.
        dir.register(handle(3, "bob")).unwrap();
    }

    #[test]
    fn others_excludes_self() {
        let dir = Directory::new();
        dir.register(handle(1, "a")).unwrap();
        dir.register(handle(2, "b")).unwrap();
        dir.register(handle(3, "c")).unwrap();
        let mut names: Vec<String> = dir.others(SessionId::new(2)).into_iter().map(|h| h.name).collect();
        names.sort();
        assert_eq!(names, vec!["a", "c"]);
    }
}
