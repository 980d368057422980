//! Relation chain model
//!
//! Each relation field of an entity is configured as one of two entries:
//! a *delegated* entry that resolves related records through the registry
//! repository of another entity, or an *ad-hoc* entry that fetches its own
//! records. Both compute a bridge first; the bridge decides which fetched
//! record lands on which owner.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::bridge::Bridge;
use crate::error::ChainResult;

/// Boxed future alias for stored async seams
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Computes the join mapping for one relation field.
///
/// The closure receives the current self-records; anything the returned
/// future needs must be extracted (cloned) before the async part starts.
pub type BridgeFn =
    Arc<dyn Fn(&[Value]) -> BoxFuture<'static, ChainResult<Vec<Bridge>>> + Send + Sync>;

/// Fetches related records for an ad-hoc relation, given the self-records,
/// the sub-paths requested beneath the field, and the resolved bridges.
pub type DataFn = Arc<
    dyn Fn(&[Value], &[String], &[Bridge]) -> BoxFuture<'static, ChainResult<Vec<Value>>>
        + Send
        + Sync,
>;

/// Fetch strategy for one relation field
#[derive(Clone)]
pub enum RelationSetting {
    /// Resolve through the registered repository of another entity; the
    /// nested repository hydrates the fetched records recursively.
    Delegated {
        entity: String,
        many: bool,
        bridges: BridgeFn,
    },
    /// Fetch independently; the engine grafts locally when both the
    /// bridges and the fetched data are non-empty.
    AdHoc {
        many: bool,
        bridges: BridgeFn,
        datas: DataFn,
    },
}

impl RelationSetting {
    pub fn many(&self) -> bool {
        match self {
            RelationSetting::Delegated { many, .. } => *many,
            RelationSetting::AdHoc { many, .. } => *many,
        }
    }

    pub fn bridges(&self) -> &BridgeFn {
        match self {
            RelationSetting::Delegated { bridges, .. } => bridges,
            RelationSetting::AdHoc { bridges, .. } => bridges,
        }
    }
}

/// Ordered relation-chain configuration of one entity
#[derive(Clone, Default)]
pub struct RelationChain {
    entries: Vec<(String, RelationSetting)>,
}

impl RelationChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a delegated relation resolved through the repository registered
    /// for `entity`.
    pub fn delegated<F, Fut>(mut self, field: &str, entity: &str, many: bool, bridges: F) -> Self
    where
        F: Fn(&[Value]) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ChainResult<Vec<Bridge>>> + Send + 'static,
    {
        self.entries.push((
            field.to_string(),
            RelationSetting::Delegated {
                entity: entity.to_string(),
                many,
                bridges: Arc::new(move |records| Box::pin(bridges(records))),
            },
        ));
        self
    }

    /// Add an ad-hoc relation with its own fetcher.
    pub fn ad_hoc<B, BFut, D, DFut>(mut self, field: &str, many: bool, bridges: B, datas: D) -> Self
    where
        B: Fn(&[Value]) -> BFut + Send + Sync + 'static,
        BFut: Future<Output = ChainResult<Vec<Bridge>>> + Send + 'static,
        D: Fn(&[Value], &[String], &[Bridge]) -> DFut + Send + Sync + 'static,
        DFut: Future<Output = ChainResult<Vec<Value>>> + Send + 'static,
    {
        self.entries.push((
            field.to_string(),
            RelationSetting::AdHoc {
                many,
                bridges: Arc::new(move |records| Box::pin(bridges(records))),
                datas: Arc::new(move |records, paths, resolved| {
                    Box::pin(datas(records, paths, resolved))
                }),
            },
        ));
        self
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &RelationSetting)> {
        self.entries
            .iter()
            .map(|(field, setting)| (field.as_str(), setting))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A cross-type relation link: how records of this repository's entity
/// hang off foreign owner records.
#[derive(Clone)]
pub struct RelationLink {
    /// Field on the owners to graft onto
    pub field: String,
    /// One-to-many vs one-to-one
    pub many: bool,
    /// Join mapping between owners and this entity's records
    pub bridges: Vec<Bridge>,
}

impl RelationLink {
    pub fn new(field: &str, many: bool, bridges: Vec<Bridge>) -> Self {
        Self {
            field: field.to_string(),
            many,
            bridges,
        }
    }
}
