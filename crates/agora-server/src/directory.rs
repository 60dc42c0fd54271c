//! User-directory seam.
//!
//! Display identities, name search, and the follow graph live in the
//! surrounding platform; the messaging core only consumes them through
//! this interface, e.g. to let a user find someone to message.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use serde::Serialize;

use agora_shared::types::UserId;

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryEntry {
    pub id: UserId,
    pub display_name: String,
}

/// Read-only view of the platform's user directory.
pub trait UserDirectory: Send + Sync {
    fn display_name(&self, user: UserId) -> Option<String>;

    /// Search users by (partial, case-insensitive) display name. The caller
    /// is excluded from results; `followed_only` restricts results to users
    /// the caller follows.
    fn search(&self, query: &str, for_user: UserId, followed_only: bool) -> Vec<DirectoryEntry>;

    fn follows(&self, follower: UserId, followed: UserId) -> bool;
}

/// In-memory directory for development and tests.
#[derive(Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<UserId, String>>,
    follow_edges: RwLock<HashSet<(UserId, UserId)>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: UserId, display_name: &str) {
        self.users
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(user, display_name.to_string());
    }

    pub fn add_follow(&self, follower: UserId, followed: UserId) {
        self.follow_edges
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert((follower, followed));
    }
}

impl UserDirectory for InMemoryDirectory {
    fn display_name(&self, user: UserId) -> Option<String> {
        self.users
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&user)
            .cloned()
    }

    fn search(&self, query: &str, for_user: UserId, followed_only: bool) -> Vec<DirectoryEntry> {
        let needle = query.to_lowercase();
        let users = self.users.read().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut entries: Vec<DirectoryEntry> = users
            .iter()
            .filter(|(id, name)| {
                **id != for_user
                    && name.to_lowercase().contains(&needle)
                    && (!followed_only || self.follows(for_user, **id))
            })
            .map(|(id, name)| DirectoryEntry {
                id: *id,
                display_name: name.clone(),
            })
            .collect();

        entries.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        entries
    }

    fn follows(&self, follower: UserId, followed: UserId) -> bool {
        self.follow_edges
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&(follower, followed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user() -> UserId {
        UserId(Uuid::new_v4())
    }

    #[test]
    fn test_search_excludes_self_and_filters_follows() {
        let directory = InMemoryDirectory::new();
        let (me, alice, bob) = (user(), user(), user());

        directory.add_user(me, "Cleo");
        directory.add_user(alice, "Alice");
        directory.add_user(bob, "Alibi Bob");
        directory.add_follow(me, alice);

        let all = directory.search("ali", me, false);
        assert_eq!(all.len(), 2);

        let followed = directory.search("ali", me, true);
        assert_eq!(followed.len(), 1);
        assert_eq!(followed[0].id, alice);

        // Searching for my own name finds nothing.
        assert!(directory.search("cleo", me, false).is_empty());
    }
}
