//! A manager of [`Worker`](crate::Worker)s.
mod base;
pub use base::Coordinator;
