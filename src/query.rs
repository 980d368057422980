//! Select descriptor and save options
//!
//! The engine never renders SQL; it describes what it wants as a
//! [`SelectQuery`] and hands it to the store. The only conditions the
//! engine generates itself are key `IN`-lists, which is all the hydration
//! and diff paths ever need.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One `column IN (values)` condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyCondition {
    pub column: String,
    pub values: Vec<Value>,
}

/// A select over one entity, restricted by key `IN`-conditions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectQuery {
    pub entity: String,
    pub alias: String,
    pub conditions: Vec<KeyCondition>,
    pub limit: Option<u64>,
}

impl SelectQuery {
    /// Start a query over an entity; the alias defaults to the entity name.
    pub fn from(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            alias: entity.to_string(),
            conditions: Vec::new(),
            limit: None,
        }
    }

    /// Override the alias used to qualify columns.
    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = alias.to_string();
        self
    }

    /// Add a `column IN (values)` condition.
    pub fn where_key_in(mut self, column: &str, values: Vec<Value>) -> Self {
        self.conditions.push(KeyCondition {
            column: column.to_string(),
            values,
        });
        self
    }

    /// Add a LIMIT.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The key lookup the engine issues internally: one `IN`-condition per
    /// non-empty key column, in declared key order.
    pub fn by_keys(entity: &str, alias: &str, columns: &[(String, Vec<Value>)]) -> Self {
        let mut query = Self::from(entity).alias(alias);
        for (column, values) in columns {
            if !values.is_empty() {
                query = query.where_key_in(column, values.clone());
            }
        }
        query
    }
}

/// Options forwarded to the underlying persistence primitive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveOptions {
    /// Reload generated/merged state into the incoming records after the
    /// write.
    pub reload: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self { reload: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn by_keys_skips_empty_columns() {
        let columns = vec![
            ("id".to_string(), vec![json!(1), json!(2)]),
            ("tenant".to_string(), vec![]),
        ];
        let query = SelectQuery::by_keys("order", "o", &columns);
        assert_eq!(query.entity, "order");
        assert_eq!(query.alias, "o");
        assert_eq!(query.conditions.len(), 1);
        assert_eq!(query.conditions[0].column, "id");
        assert_eq!(query.conditions[0].values, vec![json!(1), json!(2)]);
    }

    #[test]
    fn builder_chains() {
        let query = SelectQuery::from("user")
            .alias("u")
            .where_key_in("id", vec![json!(7)])
            .limit(1);
        assert_eq!(query.alias, "u");
        assert_eq!(query.limit, Some(1));
    }
}
