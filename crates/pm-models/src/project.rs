//! Project entity
//!
//! A project has a single owner and a set of members. The owner is always a
//! member: the invariant is established at creation and member removal
//! refuses to touch the owner.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use pm_core::Id;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub owner_id: Id,
    /// Soft-delete flag; inactive projects stay in storage
    pub is_active: bool,
    pub member_ids: HashSet<Id>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn is_owner(&self, user_id: Id) -> bool {
        self.owner_id == user_id
    }

    pub fn is_member(&self, user_id: Id) -> bool {
        self.member_ids.contains(&user_id)
    }

    /// Add a member. Returns false if already present.
    pub fn add_member(&mut self, user_id: Id) -> bool {
        self.member_ids.insert(user_id)
    }

    /// Remove a member. The owner can never be removed; attempting to do so
    /// leaves the member set untouched and returns false.
    pub fn remove_member(&mut self, user_id: Id) -> bool {
        if self.is_owner(user_id) {
            return false;
        }
        self.member_ids.remove(&user_id)
    }

    pub fn member_count(&self) -> usize {
        self.member_ids.len()
    }
}
