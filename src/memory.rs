//! In-memory record store
//!
//! Reference [`RecordStore`] implementation: tables are plain vectors of
//! JSON rows, selects filter on the key `IN`-conditions, persists upsert by
//! primary-key projection and assign incrementing keys to records whose
//! declared key columns are blank. Issued selects are counted so tests can
//! assert on query traffic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ChainError, ChainResult};
use crate::query::{SaveOptions, SelectQuery};
use crate::record;
use crate::store::RecordStore;

#[derive(Default)]
struct Table {
    /// Declared key columns; persists assign these when blank. A table
    /// without declared keys appends blindly and never upserts.
    keys: Vec<String>,
    rows: Vec<Value>,
}

/// In-memory [`RecordStore`] keyed by entity name
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Table>>,
    select_count: AtomicUsize,
    next_key: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            select_count: AtomicUsize::new(0),
            // Generated keys start at 1; zero is a blank key.
            next_key: AtomicI64::new(1),
        }
    }

    /// Seed a table with declared key columns and initial rows.
    pub fn with_table<I, S>(self, entity: &str, keys: I, rows: Vec<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
            tables.insert(
                entity.to_string(),
                Table {
                    keys: keys.into_iter().map(Into::into).collect(),
                    rows,
                },
            );
        }
        self
    }

    /// The current rows of a table, cloned.
    pub fn rows(&self, entity: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity)
            .map(|table| table.rows.clone())
            .unwrap_or_default()
    }

    /// How many selects have been issued so far.
    pub fn select_count(&self) -> usize {
        self.select_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn select(&self, query: &SelectQuery) -> ChainResult<Vec<Value>> {
        self.select_count.fetch_add(1, Ordering::SeqCst);
        let tables = self
            .tables
            .lock()
            .map_err(|_| ChainError::Store("memory store lock poisoned".to_string()))?;
        let Some(table) = tables.get(&query.entity) else {
            return Ok(Vec::new());
        };
        let mut matched: Vec<Value> = table
            .rows
            .iter()
            .filter(|row| {
                query.conditions.iter().all(|condition| {
                    row.get(&condition.column)
                        .is_some_and(|value| condition.values.contains(value))
                })
            })
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            matched.truncate(limit as usize);
        }
        Ok(matched)
    }

    async fn persist(
        &self,
        entity: &str,
        records: &mut Vec<Value>,
        _options: &SaveOptions,
    ) -> ChainResult<()> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| ChainError::Store("memory store lock poisoned".to_string()))?;
        let table = tables.entry(entity.to_string()).or_default();

        for incoming in records.iter_mut() {
            {
                let object = record::as_object_mut(incoming)?;
                for key in &table.keys {
                    if record::is_blank_key(object.get(key)) {
                        let assigned = self.next_key.fetch_add(1, Ordering::SeqCst);
                        object.insert(key.clone(), Value::from(assigned));
                    }
                }
            }

            if table.keys.is_empty() {
                table.rows.push(incoming.clone());
                continue;
            }

            let Some(projection) = record::key_projection(incoming, &table.keys) else {
                table.rows.push(incoming.clone());
                continue;
            };
            match table
                .rows
                .iter_mut()
                .find(|row| record::projection_matches(row, &projection))
            {
                Some(row) => {
                    // Merge incoming fields over the stored row, then
                    // reload the merged state onto the incoming record.
                    if let (Some(stored), Some(fields)) =
                        (row.as_object_mut(), incoming.as_object())
                    {
                        for (field, value) in fields {
                            stored.insert(field.clone(), value.clone());
                        }
                    }
                    *incoming = row.clone();
                }
                None => table.rows.push(incoming.clone()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn select_filters_on_key_conditions() {
        let store = MemoryStore::new().with_table(
            "user",
            ["id"],
            vec![
                json!({"id": 1, "name": "a"}),
                json!({"id": 2, "name": "b"}),
                json!({"id": 3, "name": "c"}),
            ],
        );
        let query = SelectQuery::from("user").where_key_in("id", vec![json!(1), json!(3)]);
        let rows = store.select(&query).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(store.select_count(), 1);
    }

    #[tokio::test]
    async fn persist_assigns_keys_and_upserts() {
        let store = MemoryStore::new().with_table(
            "user",
            ["id"],
            vec![json!({"id": 7, "name": "old", "role": "admin"})],
        );

        let mut inserts = vec![json!({"name": "fresh"})];
        store
            .persist("user", &mut inserts, &SaveOptions::default())
            .await
            .unwrap();
        assert!(!record::is_blank_key(inserts[0].get("id")));

        let mut updates = vec![json!({"id": 7, "name": "new"})];
        store
            .persist("user", &mut updates, &SaveOptions::default())
            .await
            .unwrap();
        // Merged state is reloaded onto the incoming record.
        assert_eq!(updates[0]["role"], "admin");
        assert_eq!(updates[0]["name"], "new");

        let rows = store.rows("user");
        assert_eq!(rows.len(), 2);
        let stored = rows.iter().find(|row| row["id"] == json!(7)).unwrap();
        assert_eq!(stored["name"], "new");
    }

    #[tokio::test]
    async fn undeclared_table_appends_without_keys() {
        let store = MemoryStore::new();
        let mut records = vec![json!({"note": "x"})];
        store
            .persist("audit", &mut records, &SaveOptions::default())
            .await
            .unwrap();
        assert!(records[0].get("id").is_none());
        assert_eq!(store.rows("audit").len(), 1);
    }
}
