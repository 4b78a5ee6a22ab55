//! Domain model for users, task lists and their derived projections.
//!
//! # Responsibility
//! - Define the persisted record shapes (`User`, `TaskList`, `Task`).
//! - Define derived read models (`ListStatistics`, `ListWithStats`).
//! - Own input validation shared by services.
//!
//! # Invariants
//! - Every task belongs to exactly one list; tasks are only reachable
//!   through their list.
//! - Persisted JSON uses camelCase field names.

pub mod filter;
pub mod list;
pub mod user;
