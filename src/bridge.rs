//! Bridges and the graft primitive
//!
//! A bridge is the computed join mapping between self-records and the
//! records of a related type: for each owner, the key fields a matching
//! inverse record must carry. Bridges live for one hydration pass only.

use serde_json::{Map, Value};

use crate::record;

/// One (owner, inverse-match) entry of a computed join mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bridge {
    /// Key fields identifying the owning record
    pub self_keys: Map<String, Value>,
    /// Key fields a matching inverse record must carry
    pub inverse_keys: Map<String, Value>,
}

impl Bridge {
    pub fn new(self_keys: Map<String, Value>, inverse_keys: Map<String, Value>) -> Self {
        Self {
            self_keys,
            inverse_keys,
        }
    }

    /// Single-column convenience: owner's `self_key = self_value` matches
    /// inverse records where `inverse_key = inverse_value`.
    pub fn link(self_key: &str, self_value: Value, inverse_key: &str, inverse_value: Value) -> Self {
        let mut self_keys = Map::new();
        self_keys.insert(self_key.to_string(), self_value);
        let mut inverse_keys = Map::new();
        inverse_keys.insert(inverse_key.to_string(), inverse_value);
        Self::new(self_keys, inverse_keys)
    }
}

/// Per inverse key column, the deduplicated non-blank values across the
/// bridges. Feeds the key lookup for delegated relations.
pub fn inverse_key_values(bridges: &[Bridge], keys: &[String]) -> Vec<(String, Vec<Value>)> {
    keys.iter()
        .map(|key| {
            let mut values: Vec<Value> = Vec::new();
            for bridge in bridges {
                if let Some(value) = bridge.inverse_keys.get(key) {
                    if !record::is_blank_key(Some(value)) && !values.contains(value) {
                        values.push(value.clone());
                    }
                }
            }
            (key.clone(), values)
        })
        .collect()
}

/// The graft primitive: attach fetched related records onto the owners.
///
/// For each owner, its bridges are found by `self_keys` projection match
/// and the related records matching those bridges' `inverse_keys` are
/// collected. `many` decides between the matched list and the first match.
/// Owners with no match are left untouched; the field is never assigned.
pub fn attach(owners: &mut [Value], related: &[Value], bridges: &[Bridge], many: bool, field: &str) {
    for owner in owners.iter_mut() {
        let mut matches: Vec<Value> = Vec::new();
        'bridges: for bridge in bridges {
            if !record::projection_matches(owner, &bridge.self_keys) {
                continue;
            }
            for candidate in related {
                if record::projection_matches(candidate, &bridge.inverse_keys)
                    && !matches.contains(candidate)
                {
                    matches.push(candidate.clone());
                    if !many {
                        break 'bridges;
                    }
                }
            }
        }
        if matches.is_empty() {
            continue;
        }
        let Some(object) = owner.as_object_mut() else {
            continue;
        };
        if many {
            object.insert(field.to_string(), Value::Array(matches));
        } else {
            object.insert(field.to_string(), matches.swap_remove(0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_bridges() -> Vec<Bridge> {
        vec![
            Bridge::link("id", json!(1), "user_id", json!(1)),
            Bridge::link("id", json!(2), "user_id", json!(2)),
        ]
    }

    #[test]
    fn attach_many_groups_per_owner() {
        let mut owners = vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})];
        let related = vec![
            json!({"id": 10, "user_id": 1}),
            json!({"id": 11, "user_id": 2}),
            json!({"id": 12, "user_id": 1}),
        ];
        attach(&mut owners, &related, &order_bridges(), true, "orders");

        assert_eq!(owners[0]["orders"].as_array().unwrap().len(), 2);
        assert_eq!(owners[1]["orders"].as_array().unwrap().len(), 1);
        // No bridge for owner 3: the field is never assigned.
        assert!(owners[2].get("orders").is_none());
    }

    #[test]
    fn attach_single_takes_the_first_match() {
        let mut owners = vec![json!({"id": 1})];
        let related = vec![
            json!({"id": 10, "user_id": 1}),
            json!({"id": 12, "user_id": 1}),
        ];
        attach(&mut owners, &related, &order_bridges(), false, "latest_order");
        assert_eq!(owners[0]["latest_order"]["id"], 10);
    }

    #[test]
    fn attach_without_matching_related_leaves_owner_untouched() {
        let mut owners = vec![json!({"id": 1})];
        let related = vec![json!({"id": 10, "user_id": 99})];
        attach(&mut owners, &related, &order_bridges(), true, "orders");
        assert_eq!(owners[0], json!({"id": 1}));
    }

    #[test]
    fn inverse_key_values_dedup_and_skip_blanks() {
        let bridges = vec![
            Bridge::link("id", json!(1), "user_id", json!(1)),
            Bridge::link("id", json!(2), "user_id", json!(1)),
            Bridge::link("id", json!(3), "user_id", json!(null)),
        ];
        let columns = inverse_key_values(&bridges, &["user_id".to_string()]);
        assert_eq!(columns[0], ("user_id".to_string(), vec![json!(1)]));
    }
}
