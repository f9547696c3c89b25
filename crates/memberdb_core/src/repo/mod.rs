//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define record-oriented data access contracts.
//! - Isolate SQL statements and row mapping from callers.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`) in addition to
//!   connection and statement errors.

pub mod member_repo;
