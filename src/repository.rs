//! Chain repository - the hydration dispatcher and save pipeline
//!
//! One repository handle per entity type. Reads run the caller's query and
//! then descend the requested paths through the relation chain; writes are
//! wrapped so save subscribers can compare incoming records against their
//! persisted counterparts on both sides of the write.

use std::mem;
use std::sync::Arc;

use futures::future::try_join_all;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::bridge::{self, Bridge};
use crate::error::{ChainError, ChainResult};
use crate::path;
use crate::query::{SaveOptions, SelectQuery};
use crate::record;
use crate::registry::{ChainRegistry, RepositoryConfig};
use crate::relation::{BoxFuture, RelationLink, RelationSetting};
use crate::subscriber::{self, HydrateParam, SaveSubscriber};

/// What `set_property` accepts: a bare path list, or paths plus free-form
/// side data shared with the subscriber hooks.
#[derive(Debug, Clone, Default)]
pub struct SetPropertyOptions {
    pub details: Vec<String>,
    pub data: Value,
}

impl SetPropertyOptions {
    pub fn new<I, S>(details: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            details: details.into_iter().map(Into::into).collect(),
            data: Value::Null,
        }
    }

    pub fn with_data<I, S>(details: I, data: Value) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            details: details.into_iter().map(Into::into).collect(),
            data,
        }
    }
}

impl From<Vec<String>> for SetPropertyOptions {
    fn from(details: Vec<String>) -> Self {
        Self::new(details)
    }
}

impl From<Vec<&str>> for SetPropertyOptions {
    fn from(details: Vec<&str>) -> Self {
        Self::new(details)
    }
}

impl<const N: usize> From<[&str; N]> for SetPropertyOptions {
    fn from(details: [&str; N]) -> Self {
        Self::new(details)
    }
}

/// One relation field's resolved fetch, waiting to be grafted
struct GraftJob {
    field: String,
    many: bool,
    bridges: Vec<Bridge>,
    related: Vec<Value>,
}

/// Repository handle for one entity type
#[derive(Clone)]
pub struct ChainRepository {
    registry: ChainRegistry,
    config: Arc<RepositoryConfig>,
}

impl ChainRepository {
    pub(crate) fn new(registry: ChainRegistry, config: Arc<RepositoryConfig>) -> Self {
        Self { registry, config }
    }

    pub fn entity(&self) -> &str {
        &self.config.entity
    }

    pub fn alias(&self) -> &str {
        &self.config.alias
    }

    pub fn primary_keys(&self) -> &[String] {
        &self.config.primary_keys
    }

    /// Run a query and hydrate the requested paths onto the first result.
    pub async fn get_one<F>(
        &self,
        build: F,
        options: impl Into<SetPropertyOptions>,
    ) -> ChainResult<Option<Value>>
    where
        F: FnOnce(&ChainRepository) -> SelectQuery,
    {
        Ok(self.get_many(build, options).await?.into_iter().next())
    }

    /// Run a query and hydrate the requested paths onto the results.
    pub async fn get_many<F>(
        &self,
        build: F,
        options: impl Into<SetPropertyOptions>,
    ) -> ChainResult<Vec<Value>>
    where
        F: FnOnce(&ChainRepository) -> SelectQuery,
    {
        let query = build(self);
        let mut records = self.registry.store().select(&query).await?;
        self.set_property(options, &mut records).await?;
        Ok(records)
    }

    /// Hydrate the requested paths onto the given records in place.
    pub async fn set_property(
        &self,
        options: impl Into<SetPropertyOptions>,
        records: &mut Vec<Value>,
    ) -> ChainResult<()> {
        let options = options.into();
        if records.iter().all(Value::is_null) {
            return Ok(());
        }
        let data = if options.data.is_null() {
            Value::Object(Map::new())
        } else {
            options.data
        };
        let mut param = HydrateParam {
            details: options.details,
            records: mem::take(records),
            data,
        };
        let result = self.chaining_set_property(&mut param).await;
        *records = mem::take(&mut param.records);
        result
    }

    /// Cross-type form: fetch this entity's records along a relation link
    /// computed for foreign owner records, hydrate them, and graft them
    /// onto the owners.
    pub async fn set_property_related(
        &self,
        options: impl Into<SetPropertyOptions>,
        owners: &mut Vec<Value>,
        link: RelationLink,
    ) -> ChainResult<()> {
        let options = options.into();
        if owners.iter().all(Value::is_null) {
            return Ok(());
        }
        let Some(related) = self.fetch_related(options, &link.bridges).await? else {
            return Ok(());
        };
        bridge::attach(owners, &related, &link.bridges, link.many, &link.field);
        Ok(())
    }

    /// One hydration level: before-hooks, concurrent relation fetches,
    /// grafts, after-hooks, pruning.
    fn chaining_set_property<'a>(
        &'a self,
        param: &'a mut HydrateParam,
    ) -> BoxFuture<'a, ChainResult<()>> {
        Box::pin(async move {
            if self.config.relation_chain.is_empty() {
                return Ok(());
            }
            let subscribers = &self.config.subscribers;

            for rule in subscribers {
                if let Some(hook) = &rule.before {
                    if (rule.matches)(param) {
                        hook.call(param).await?;
                    }
                }
            }

            let plan = subscriber::plan(param, subscribers);
            if let Some(plan) = &plan {
                param.details = plan.refresh_details.clone();
            }

            let mut jobs = Vec::new();
            for (field, setting) in self.config.relation_chain.entries() {
                if !param
                    .details
                    .iter()
                    .any(|requested| path::starts_with_field(requested, field))
                {
                    continue;
                }
                let sub_paths = path::strip_prefix_paths(&param.details, field);
                jobs.push(self.fetch_relation(
                    field,
                    setting,
                    &param.records,
                    sub_paths,
                    param.data.clone(),
                ));
            }
            debug!(
                entity = %self.config.entity,
                relations = jobs.len(),
                "dispatching relation fetches"
            );
            let grafts = try_join_all(jobs).await?;
            for job in grafts.into_iter().flatten() {
                bridge::attach(
                    &mut param.records,
                    &job.related,
                    &job.bridges,
                    job.many,
                    &job.field,
                );
            }

            if let Some(plan) = plan {
                for rule in subscribers {
                    if let Some(hook) = &rule.after {
                        if (rule.matches)(param) {
                            hook.call(param).await?;
                        }
                    }
                }
                path::prune(&mut param.records, &plan.will_removes);
            }

            Ok(())
        })
    }

    /// Resolve one relation field into a pending graft. Reads the records
    /// but never mutates them, so every field of a level can run
    /// concurrently.
    async fn fetch_relation(
        &self,
        field: &str,
        setting: &RelationSetting,
        records: &[Value],
        sub_paths: Vec<String>,
        data: Value,
    ) -> ChainResult<Option<GraftJob>> {
        match setting {
            RelationSetting::Delegated {
                entity,
                many,
                bridges,
            } => {
                let Some(repository) = self.registry.try_repository(entity) else {
                    // Unreachable after registry validation; kept as a
                    // read-path-over-crash fallback.
                    warn!(
                        entity = %entity,
                        field = %field,
                        "delegated relation target is not registered, skipping"
                    );
                    return Ok(None);
                };
                let resolved = (bridges)(records).await?;
                let options = SetPropertyOptions {
                    details: sub_paths,
                    data,
                };
                let Some(related) = repository.fetch_related(options, &resolved).await? else {
                    return Ok(None);
                };
                Ok(Some(GraftJob {
                    field: field.to_string(),
                    many: *many,
                    bridges: resolved,
                    related,
                }))
            }
            RelationSetting::AdHoc {
                many,
                bridges,
                datas,
            } => {
                let resolved = (bridges)(records).await?;
                let related = (datas)(records, &sub_paths, &resolved).await?;
                if resolved.is_empty() || related.is_empty() {
                    return Ok(None);
                }
                Ok(Some(GraftJob {
                    field: field.to_string(),
                    many: *many,
                    bridges: resolved,
                    related,
                }))
            }
        }
    }

    /// Fetch this entity's records matching the bridges' inverse keys and
    /// hydrate them. `None` when the bridge keys are all blank or nothing
    /// matches.
    async fn fetch_related(
        &self,
        options: SetPropertyOptions,
        bridges: &[Bridge],
    ) -> ChainResult<Option<Vec<Value>>> {
        let key_sets = bridge::inverse_key_values(bridges, &self.config.primary_keys);
        if record::all_columns_blank(&key_sets) {
            return Ok(None);
        }
        let query = SelectQuery::by_keys(&self.config.entity, &self.config.alias, &key_sets);
        let mut related = self.registry.store().select(&query).await?;
        if related.is_empty() {
            return Ok(None);
        }
        self.set_property(options, &mut related).await?;
        Ok(Some(related))
    }

    /// Save records through the store, running any matching save events
    /// with old/new state around the write.
    pub async fn save(
        &self,
        mut records: Vec<Value>,
        options: SaveOptions,
    ) -> ChainResult<Vec<Value>> {
        let Some(save_subscriber) = &self.config.save_subscriber else {
            self.persist(&mut records, &options).await?;
            return Ok(records);
        };
        if !save_subscriber.matches_any(&records) {
            self.persist(&mut records, &options).await?;
            return Ok(records);
        }

        let (before_events, after_events) = subscriber::partition_events(save_subscriber, &records);

        if !before_events.is_empty() {
            let persisted = self.fetch_persisted(&records, save_subscriber).await?;
            for event in &before_events {
                let matched = find_persisted(
                    &persisted,
                    &records[event.index],
                    &self.config.primary_keys,
                )
                .cloned();
                event
                    .hook
                    .call(&mut records[event.index], matched.as_ref())
                    .await?;
            }
        }

        self.persist(&mut records, &options).await?;

        if !after_events.is_empty() {
            let persisted = self.fetch_persisted(&records, save_subscriber).await?;
            for event in &after_events {
                let matched = find_persisted(
                    &persisted,
                    &records[event.index],
                    &self.config.primary_keys,
                )
                .cloned();
                event
                    .hook
                    .call(&records[event.index], &event.snapshot, matched.as_ref())
                    .await?;
            }
        }

        Ok(records)
    }

    /// Single-record convenience wrapper around [`ChainRepository::save`].
    pub async fn save_one(&self, record: Value, options: SaveOptions) -> ChainResult<Value> {
        let mut saved = self.save(vec![record], options).await?;
        if saved.is_empty() {
            return Err(ChainError::Store(
                "persist returned no records".to_string(),
            ));
        }
        Ok(saved.swap_remove(0))
    }

    async fn persist(&self, records: &mut Vec<Value>, options: &SaveOptions) -> ChainResult<()> {
        self.registry
            .store()
            .persist(&self.config.entity, records, options)
            .await
    }

    /// The persisted counterparts of a batch, hydrated with the save
    /// subscriber's declared paths. Empty when some record lacks full keys.
    async fn fetch_persisted(
        &self,
        records: &[Value],
        save_subscriber: &SaveSubscriber,
    ) -> ChainResult<Vec<Value>> {
        let key_sets = record::key_values(records, &self.config.primary_keys);
        if record::any_column_blank(&key_sets) {
            return Ok(Vec::new());
        }
        self.get_many(
            |repository| SelectQuery::by_keys(repository.entity(), repository.alias(), &key_sets),
            save_subscriber.details.clone(),
        )
        .await
    }
}

/// Match one incoming record to its persisted counterpart by exact
/// primary-key-tuple equality. `None` when the record lacks full keys.
fn find_persisted<'a>(persisted: &'a [Value], record: &Value, keys: &[String]) -> Option<&'a Value> {
    let projection = record::key_projection(record, keys)?;
    persisted
        .iter()
        .find(|candidate| record::projection_matches(candidate, &projection))
}
