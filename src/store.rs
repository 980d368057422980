//! External collaborator seam
//!
//! The engine consumes storage through this trait: a select that executes
//! a [`SelectQuery`], and a persist that performs the base create/update
//! the save pipeline wraps. Persist mutates the incoming records in place
//! so generated keys and merged state land on the caller's objects.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ChainResult;
use crate::query::{SaveOptions, SelectQuery};

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Execute a select and return the matching records.
    async fn select(&self, query: &SelectQuery) -> ChainResult<Vec<Value>>;

    /// Insert or update the records of one entity, assigning generated
    /// keys and merged state back onto them.
    async fn persist(
        &self,
        entity: &str,
        records: &mut Vec<Value>,
        options: &SaveOptions,
    ) -> ChainResult<()>;
}
