//! Domain model: templates, content records, and the invalidation audit trail.

pub mod entities;
pub mod error;
pub mod slug;
pub mod types;
