//! Caller identity and tenant scope
//!
//! Every billing call runs on behalf of a user inside exactly one school.
//! The context is resolved by the authentication collaborator before any
//! billing operation and every query and write is scoped by its `school_id`.

use serde::{Deserialize, Serialize};

use crate::identifiers::{SchoolId, UserId};

/// Resolved `(user, school)` pair for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    /// Staff member performing the operation
    pub user_id: UserId,
    /// School that scopes all reads and writes
    pub school_id: SchoolId,
}

impl TenantContext {
    pub fn new(user_id: UserId, school_id: SchoolId) -> Self {
        Self { user_id, school_id }
    }
}
