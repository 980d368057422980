//! Repository registry
//!
//! Entity configurations are plain data registered once at startup. The
//! registry validates the whole graph when it is built: a delegated
//! relation pointing at an unregistered entity is a configuration error
//! here, not a silent no-op at hydration time.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ChainError, ChainResult};
use crate::relation::{RelationChain, RelationSetting};
use crate::repository::ChainRepository;
use crate::store::RecordStore;
use crate::subscriber::{HydrateSubscriber, SaveSubscriber};

/// Everything the engine needs to know about one entity type
#[derive(Clone)]
pub struct RepositoryConfig {
    /// Entity name; the registry key and the name delegated relations use
    pub entity: String,
    /// Alias used to qualify columns in generated key lookups
    pub alias: String,
    /// Declared primary-key tuple, in order
    pub primary_keys: Vec<String>,
    /// Relation fields and their fetch strategies
    pub relation_chain: RelationChain,
    /// Set-property subscription rules
    pub subscribers: Vec<HydrateSubscriber>,
    /// Save subscription, if any
    pub save_subscriber: Option<SaveSubscriber>,
}

impl RepositoryConfig {
    pub fn new<I, S>(entity: &str, alias: &str, primary_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entity: entity.to_string(),
            alias: alias.to_string(),
            primary_keys: primary_keys.into_iter().map(Into::into).collect(),
            relation_chain: RelationChain::new(),
            subscribers: Vec::new(),
            save_subscriber: None,
        }
    }

    pub fn relation_chain(mut self, chain: RelationChain) -> Self {
        self.relation_chain = chain;
        self
    }

    pub fn subscriber(mut self, subscriber: HydrateSubscriber) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn save_subscriber(mut self, subscriber: SaveSubscriber) -> Self {
        self.save_subscriber = Some(subscriber);
        self
    }
}

struct RegistryInner {
    repositories: HashMap<String, Arc<RepositoryConfig>>,
    store: Arc<dyn RecordStore>,
}

/// Registry of entity configurations sharing one record store.
///
/// Cloning is cheap; all clones share the same immutable inner state.
#[derive(Clone)]
pub struct ChainRegistry {
    inner: Arc<RegistryInner>,
}

impl ChainRegistry {
    pub fn builder(store: Arc<dyn RecordStore>) -> ChainRegistryBuilder {
        ChainRegistryBuilder {
            configs: Vec::new(),
            store,
        }
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.inner.repositories.contains_key(entity)
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.inner.store
    }

    /// A repository handle for an entity.
    pub fn repository(&self, entity: &str) -> ChainResult<ChainRepository> {
        self.try_repository(entity).ok_or_else(|| {
            ChainError::Configuration(format!("entity '{}' is not registered", entity))
        })
    }

    pub(crate) fn try_repository(&self, entity: &str) -> Option<ChainRepository> {
        let config = self.inner.repositories.get(entity)?;
        Some(ChainRepository::new(self.clone(), Arc::clone(config)))
    }
}

/// Collects configurations and validates the graph on build
pub struct ChainRegistryBuilder {
    configs: Vec<RepositoryConfig>,
    store: Arc<dyn RecordStore>,
}

impl ChainRegistryBuilder {
    pub fn register(mut self, config: RepositoryConfig) -> Self {
        self.configs.push(config);
        self
    }

    pub fn build(self) -> ChainResult<ChainRegistry> {
        let mut repositories: HashMap<String, Arc<RepositoryConfig>> = HashMap::new();

        for config in &self.configs {
            if config.entity.is_empty() {
                return Err(ChainError::Configuration(
                    "entity name cannot be empty".to_string(),
                ));
            }
            if config.alias.is_empty() {
                return Err(ChainError::Configuration(format!(
                    "entity '{}' has an empty alias",
                    config.entity
                )));
            }
            if config.primary_keys.is_empty() {
                return Err(ChainError::Configuration(format!(
                    "entity '{}' declares no primary keys",
                    config.entity
                )));
            }
        }

        let registered: Vec<&str> = self.configs.iter().map(|c| c.entity.as_str()).collect();

        for config in &self.configs {
            for (field, setting) in config.relation_chain.entries() {
                if field.is_empty() {
                    return Err(ChainError::Configuration(format!(
                        "entity '{}' has a relation with an empty field name",
                        config.entity
                    )));
                }
                if let RelationSetting::Delegated { entity, .. } = setting {
                    if !registered.contains(&entity.as_str()) {
                        return Err(ChainError::Configuration(format!(
                            "relation '{}.{}' delegates to unregistered entity '{}'",
                            config.entity, field, entity
                        )));
                    }
                }
            }
        }

        for config in self.configs {
            let entity = config.entity.clone();
            if repositories.insert(entity.clone(), Arc::new(config)).is_some() {
                return Err(ChainError::Configuration(format!(
                    "entity '{}' is registered twice",
                    entity
                )));
            }
        }

        Ok(ChainRegistry {
            inner: Arc::new(RegistryInner {
                repositories,
                store: self.store,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::relation::RelationChain;

    fn store() -> Arc<dyn RecordStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn build_validates_delegated_targets() {
        let chain = RelationChain::new().delegated("orders", "order", true, |_records| async {
            Ok(Vec::new())
        });
        let result = ChainRegistry::builder(store())
            .register(RepositoryConfig::new("user", "u", ["id"]).relation_chain(chain))
            .build();

        let err = result.err().expect("unregistered delegate must fail");
        assert!(matches!(err, ChainError::Configuration(_)));
        assert!(err.to_string().contains("order"));
    }

    #[test]
    fn build_rejects_duplicates_and_empty_keys() {
        let duplicated = ChainRegistry::builder(store())
            .register(RepositoryConfig::new("user", "u", ["id"]))
            .register(RepositoryConfig::new("user", "u2", ["id"]))
            .build();
        assert!(duplicated.is_err());

        let keyless = ChainRegistry::builder(store())
            .register(RepositoryConfig::new("user", "u", Vec::<String>::new()))
            .build();
        assert!(keyless.is_err());
    }

    #[test]
    fn repository_lookup() {
        let registry = ChainRegistry::builder(store())
            .register(RepositoryConfig::new("user", "u", ["id"]))
            .build()
            .expect("valid registry");

        assert!(registry.contains("user"));
        assert!(registry.repository("user").is_ok());
        assert!(registry.repository("ghost").is_err());
    }
}
