//! Member record.
//!
//! # Invariants
//! - `member_id` is assigned by the caller and never generated by the store.
//! - The database is the only source of truth; no copy is cached between calls.

use serde::{Deserialize, Serialize};

/// Caller-assigned member identifier (`MEMBER.MEMBER_ID`).
pub type MemberId = String;

/// One row of the `MEMBER` table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub member_id: MemberId,
    /// Account balance (`MEMBER.MONEY`).
    pub money: i64,
}

impl Member {
    pub fn new(member_id: impl Into<MemberId>, money: i64) -> Self {
        Self {
            member_id: member_id.into(),
            money,
        }
    }
}
