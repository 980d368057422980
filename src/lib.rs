//! # chain-orm: Relation Hydration for Record Trees
//!
//! Given a root set of records and a list of dot-separated field paths,
//! this crate recursively resolves each requested relation, fetches the
//! related records from pluggable data sources, grafts them onto the right
//! field of the right owner, and lets registered subscribers observe or
//! alter the traversal. Save operations are wrapped the same way so hooks
//! can compare incoming records against their persisted counterparts.
//!
//! Storage stays out of scope: queries and writes go through the
//! [`store::RecordStore`] trait, and records are plain `serde_json::Value`
//! objects owned by the caller.

pub mod bridge;
pub mod error;
pub mod memory;
pub mod path;
pub mod query;
pub mod record;
pub mod registry;
pub mod relation;
pub mod repository;
pub mod store;
pub mod subscriber;


// Re-export core traits and types
pub use bridge::*;
pub use error::*;
pub use memory::*;
pub use query::*;
pub use registry::*;
pub use relation::*;
pub use repository::*;
pub use store::*;
pub use subscriber::*;
