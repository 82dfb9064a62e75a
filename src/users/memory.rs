use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CreateUserOutcome, User, UserStore};

/// In-memory user store for tests.
#[derive(Default)]
pub(crate) struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
    /// When set, the next create reports a conflict after inserting the user,
    /// as if a concurrent request won the race.
    race_next_create: AtomicBool,
    /// When set, creates report a conflict without inserting anything, as if
    /// the competing row vanished before the retried lookup.
    conflict_without_user: AtomicBool,
}

impl MemoryUserStore {
    pub(crate) async fn insert(&self, user: User) {
        self.users.lock().await.insert(user.id, user);
    }

    pub(crate) async fn remove(&self, id: Uuid) {
        self.users.lock().await.remove(&id);
    }

    pub(crate) async fn len(&self) -> usize {
        self.users.lock().await.len()
    }

    pub(crate) fn race_next_create(&self) {
        self.race_next_create.store(true, Ordering::SeqCst);
    }

    pub(crate) fn conflict_without_user(&self) {
        self.conflict_without_user.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn create_user_by_email(&self, email: &str) -> Result<CreateUserOutcome> {
        if self.conflict_without_user.load(Ordering::SeqCst) {
            return Ok(CreateUserOutcome::Conflict);
        }
        let mut users = self.users.lock().await;
        if users.values().any(|user| user.email == email) {
            return Ok(CreateUserOutcome::Conflict);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            subscriptions: Vec::new(),
        };
        users.insert(user.id, user.clone());
        if self.race_next_create.swap(false, Ordering::SeqCst) {
            return Ok(CreateUserOutcome::Conflict);
        }
        Ok(CreateUserOutcome::Created(user))
    }
}
