//! Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Write operations, used where create and update rules differ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Update,
}
