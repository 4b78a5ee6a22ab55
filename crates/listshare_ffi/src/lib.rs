//! Flutter bridge for the ListShare core.

pub mod api;
