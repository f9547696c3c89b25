//! Domain records persisted by the store.

pub mod member;
