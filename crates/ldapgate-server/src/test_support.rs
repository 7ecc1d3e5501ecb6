//! In-memory directory for handler and router tests

use async_trait::async_trait;
use ldapgate_auth::{Directory, DirectoryError};
use ldapgate_core::types::Identity;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn jdoe() -> Identity {
    Identity::new(
        "jdoe",
        "uid=jdoe,ou=people,dc=example,dc=com",
        vec!["platform-admins".to_string(), "developers".to_string()],
    )
}

/// Behaves like a directory holding `users`. Usernames in `duplicated`
/// match two entries.
#[derive(Default)]
pub struct FakeDirectory {
    users: HashMap<String, (String, Identity)>,
    duplicated: Vec<String>,
    unreachable: bool,
    calls: AtomicUsize,
}

impl FakeDirectory {
    /// `jdoe` / `correct-horse`, plus a `twin` username matching two entries
    pub fn with_jdoe() -> Self {
        let mut users = HashMap::new();
        users.insert("jdoe".to_string(), ("correct-horse".to_string(), jdoe()));
        Self {
            users,
            duplicated: vec!["twin".to_string()],
            ..Default::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Directory for FakeDirectory {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Identity, DirectoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.unreachable {
            return Err(DirectoryError::Connection("connection refused".to_string()));
        }
        if self.duplicated.iter().any(|u| u == username) {
            return Err(DirectoryError::AmbiguousIdentity { count: 2 });
        }

        match self.users.get(username) {
            None => Err(DirectoryError::UserNotFound),
            Some((expected, _)) if expected != password => Err(DirectoryError::InvalidCredentials),
            Some((_, identity)) => Ok(identity.clone()),
        }
    }
}
