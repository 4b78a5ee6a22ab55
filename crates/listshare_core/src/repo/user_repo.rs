//! User directory persisted as one JSON array under `users`.

use crate::model::user::{normalize_email, User, UserId};
use crate::repo::{RepoError, RepoResult};
use crate::storage::{load_json, save_json, KvStore, StorageResult};

const USERS_KEY: &str = "users";

/// Directory of known users on this device.
pub trait UserRepository {
    /// All users in registration order.
    fn list_users(&self) -> StorageResult<Vec<User>>;
    fn get_user(&self, id: UserId) -> StorageResult<Option<User>>;
    /// Case-insensitive lookup.
    fn find_by_email(&self, email: &str) -> StorageResult<Option<User>>;
    /// Appends a user; fails when the email is taken.
    fn create_user(&self, user: &User) -> RepoResult<()>;
    /// Replaces a stored user by id; fails when the new email is taken by
    /// someone else.
    fn update_user(&self, user: &User) -> RepoResult<()>;
}

/// `UserRepository` over a `KvStore`.
#[derive(Debug, Clone)]
pub struct KvUserRepository<S: KvStore> {
    store: S,
}

impl<S: KvStore> KvUserRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: KvStore> UserRepository for KvUserRepository<S> {
    fn list_users(&self) -> StorageResult<Vec<User>> {
        Ok(load_json(&self.store, USERS_KEY)?.unwrap_or_default())
    }

    fn get_user(&self, id: UserId) -> StorageResult<Option<User>> {
        Ok(self.list_users()?.into_iter().find(|user| user.id == id))
    }

    fn find_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let needle = normalize_email(email);
        Ok(self
            .list_users()?
            .into_iter()
            .find(|user| user.email.eq_ignore_ascii_case(&needle)))
    }

    fn create_user(&self, user: &User) -> RepoResult<()> {
        let mut users = self.list_users()?;
        if users
            .iter()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(RepoError::DuplicateEmail(user.email.clone()));
        }
        users.push(user.clone());
        save_json(&self.store, USERS_KEY, &users)?;
        Ok(())
    }

    fn update_user(&self, user: &User) -> RepoResult<()> {
        let mut users = self.list_users()?;
        if users
            .iter()
            .any(|existing| existing.id != user.id && existing.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(RepoError::DuplicateEmail(user.email.clone()));
        }
        let slot = users
            .iter_mut()
            .find(|existing| existing.id == user.id)
            .ok_or(RepoError::UserNotFound(user.id))?;
        *slot = user.clone();
        save_json(&self.store, USERS_KEY, &users)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{KvUserRepository, UserRepository};
    use crate::model::user::User;
    use crate::repo::RepoError;
    use crate::storage::MemoryKvStore;
    use uuid::Uuid;

    fn user(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: String::new(),
            name: "Test".to_string(),
            created_at: 0,
        }
    }

    #[test]
    fn keeps_registration_order_and_rejects_duplicates() {
        let store = MemoryKvStore::new();
        let repo = KvUserRepository::new(&store);
        let first = user("b@example.com");
        let second = user("a@example.com");
        repo.create_user(&first).unwrap();
        repo.create_user(&second).unwrap();

        let err = repo.create_user(&user("B@example.com")).unwrap_err();
        assert!(matches!(err, RepoError::DuplicateEmail(_)));

        let ids: Vec<Uuid> = repo.list_users().unwrap().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert_eq!(
            repo.find_by_email(" A@EXAMPLE.com").unwrap().map(|u| u.id),
            Some(second.id)
        );
    }

    #[test]
    fn update_rejects_email_taken_by_other_user() {
        let store = MemoryKvStore::new();
        let repo = KvUserRepository::new(&store);
        let first = user("one@example.com");
        let mut second = user("two@example.com");
        repo.create_user(&first).unwrap();
        repo.create_user(&second).unwrap();

        second.email = "one@example.com".to_string();
        assert!(matches!(
            repo.update_user(&second).unwrap_err(),
            RepoError::DuplicateEmail(_)
        ));
    }
}
