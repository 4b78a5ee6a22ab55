//! Pure state containers for UI-facing view state.
//!
//! Each container is an action enum plus a total transition function; the
//! UI layer owns the current value and replaces it with the returned one.

pub mod lists;
pub mod session;
