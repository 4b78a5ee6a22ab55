//! Repositories over the device-local key-value store.
//!
//! # Responsibility
//! - Map domain records onto storage keys.
//! - Keep key layout and JSON shape out of the services.
//!
//! # Invariants
//! - Lists live in their owner's partition (`lists_<ownerId>`).
//! - The user directory enumerates users in registration order.
//! - The share index is a lookup hint; callers verify every hit against
//!   the owner's partition.

use crate::model::user::UserId;
use crate::storage::StorageError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod list_repo;
pub mod share_index;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Storage(StorageError),
    DuplicateEmail(String),
    UserNotFound(UserId),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "{err}"),
            Self::DuplicateEmail(email) => write!(f, "email already registered: {email}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::DuplicateEmail(_) | Self::UserNotFound(_) => None,
        }
    }
}

impl From<StorageError> for RepoError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}
