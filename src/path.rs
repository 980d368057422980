//! Path model and compaction
//!
//! Requested relations arrive as dot-separated paths (`orders.items.sku`).
//! Before dispatch they are compacted into a minimal list of segment
//! sequences: duplicates collapse, a shallow request absorbs a deeper one
//! for the same branch by being extended in place, and a request already
//! covered by a longer entry is dropped. Divergent continuations after a
//! shared prefix stay separate entries; the set is a flat list, not a
//! prefix tree.
//!
//! The same walk is reused to find out which hook-requested extensions go
//! beyond what the caller asked for; those boundaries become removal paths
//! that are pruned from the records once the hooks are done with them.

use serde_json::Value;

/// Split a raw dot-path into segments. A blank segment anywhere makes the
/// whole path invalid.
pub fn split_path(raw: &str) -> Option<Vec<String>> {
    let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
    if segments.iter().any(|segment| segment.trim().is_empty()) {
        return None;
    }
    Some(segments)
}

/// Compact a list of raw paths into the canonical segment-sequence list.
pub fn compact<I, S>(raw_paths: I) -> Vec<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    compact_into(raw_paths, Vec::new())
}

/// Compact raw paths into an existing accumulator.
///
/// The accumulator is the caller's already-compacted request set when the
/// incoming paths come from subscribers; extensions then mutate the
/// accumulator entries in place, which is what lets a hook deepen a branch
/// the caller already requested.
pub fn compact_into<I, S>(raw_paths: I, mut accumulator: Vec<Vec<String>>) -> Vec<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for raw in raw_paths {
        let Some(parts) = split_path(raw.as_ref()) else {
            continue;
        };
        merge_path(&mut accumulator, parts);
    }
    accumulator
}

/// Merge one segment sequence into the accumulator.
fn merge_path(accumulator: &mut Vec<Vec<String>>, parts: Vec<String>) {
    let mut survivors: Vec<usize> = (0..accumulator.len()).collect();
    let mut same_index: Option<usize> = None;
    let mut last_same: Vec<usize> = Vec::new();

    for (position, part) in parts.iter().enumerate() {
        if position != 0 && same_index.is_none() {
            break;
        }
        survivors.retain(|&entry| accumulator[entry].get(position) == Some(part));
        if !survivors.is_empty() {
            same_index = Some(position);
            last_same = survivors.clone();
        }
    }

    let Some(same_index) = same_index else {
        // No entry shares even the first segment.
        accumulator.push(parts);
        return;
    };

    let extend_targets: Vec<usize> = last_same
        .into_iter()
        .filter(|&entry| accumulator[entry].len() == same_index + 1)
        .collect();

    if !extend_targets.is_empty() {
        // Exact-prefix entries become deep enough to also cover the tail.
        let tail = &parts[same_index + 1..];
        for entry in extend_targets {
            accumulator[entry].extend(tail.iter().cloned());
        }
    } else if same_index == parts.len() - 1 {
        // Pure prefix of an existing longer entry; already covered.
    } else {
        accumulator.push(parts);
    }
}

/// Compute the removal paths: for every entry of the hook-extended set,
/// re-walk the prefix match against the caller's original compacted set.
/// An entry longer than its matched prefix contributes the prefix plus one
/// segment as a removal path.
pub fn removal_set(extended: &[Vec<String>], baseline: &[Vec<String>]) -> Vec<String> {
    let mut removals: Vec<String> = Vec::new();

    for parts in extended {
        let mut survivors: Vec<usize> = (0..baseline.len()).collect();
        let mut same_index: Option<usize> = None;

        for (position, part) in parts.iter().enumerate() {
            if position != 0 && same_index.is_none() {
                break;
            }
            survivors.retain(|&entry| baseline[entry].get(position) == Some(part));
            if !survivors.is_empty() {
                same_index = Some(position);
            }
        }

        let boundary = same_index.map_or(0, |index| index + 1);
        if parts.len() != boundary {
            let key = parts[..boundary + 1].join(".");
            if !removals.contains(&key) {
                removals.push(key);
            }
        }
    }

    removals
}

/// Does `path` address the relation field `field`, either exactly or as the
/// first segment of a deeper path?
pub fn starts_with_field(path: &str, field: &str) -> bool {
    path == field
        || path
            .strip_prefix(field)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// The sub-paths beneath a relation field: drop the field segment, drop
/// entries with nothing left underneath.
pub fn strip_prefix_paths(details: &[String], field: &str) -> Vec<String> {
    details
        .iter()
        .filter_map(|path| {
            path.strip_prefix(field)
                .and_then(|rest| rest.strip_prefix('.'))
                .map(str::to_string)
        })
        .filter(|rest| !rest.is_empty())
        .collect()
}

/// Clear every removal path from every record.
pub fn prune(records: &mut [Value], removals: &[String]) {
    if removals.is_empty() {
        return;
    }
    for record in records.iter_mut() {
        for removal in removals {
            let Some(parts) = split_path(removal) else {
                continue;
            };
            clear_path(record, &parts);
        }
    }
}

/// Remove a field path from one record, descending through relation fields
/// that hold either a single object or an array of objects.
fn clear_path(record: &mut Value, parts: &[String]) {
    let Some(object) = record.as_object_mut() else {
        return;
    };
    match parts {
        [] => {}
        [field] => {
            object.remove(field);
        }
        [field, rest @ ..] => match object.get_mut(field) {
            Some(Value::Array(items)) => {
                for item in items {
                    clear_path(item, rest);
                }
            }
            Some(item @ Value::Object(_)) => clear_path(item, rest),
            _ => {}
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn joined(compacted: &[Vec<String>]) -> Vec<String> {
        compacted.iter().map(|parts| parts.join(".")).collect()
    }

    #[test]
    fn blank_segments_invalidate_the_path() {
        assert!(split_path("orders..items").is_none());
        assert!(split_path(".orders").is_none());
        assert!(split_path("orders.").is_none());
        assert!(split_path("").is_none());
        assert_eq!(
            split_path("orders.items"),
            Some(vec!["orders".to_string(), "items".to_string()])
        );
    }

    #[test]
    fn empty_input_compacts_to_empty() {
        assert!(compact(Vec::<&str>::new()).is_empty());
    }

    #[test]
    fn shorter_prefix_entry_is_extended_in_place() {
        let compacted = compact(["orders", "orders.items"]);
        assert_eq!(joined(&compacted), vec!["orders.items"]);
    }

    #[test]
    fn path_covered_by_longer_entry_is_dropped() {
        let compacted = compact(["orders.items", "orders"]);
        assert_eq!(joined(&compacted), vec!["orders.items"]);
    }

    #[test]
    fn divergent_continuations_stay_separate() {
        let compacted = compact(["orders.items", "orders.customer"]);
        assert_eq!(joined(&compacted), vec!["orders.items", "orders.customer"]);
    }

    #[test]
    fn duplicates_collapse_and_order_is_preserved() {
        let compacted = compact(["profile", "orders.items", "profile", "orders.items"]);
        assert_eq!(joined(&compacted), vec!["profile", "orders.items"]);
    }

    #[test]
    fn compaction_is_idempotent() {
        let first = compact(["orders", "orders.items.sku", "profile", "orders.customer"]);
        let again = compact(joined(&first));
        assert_eq!(first, again);
    }

    #[test]
    fn invalid_paths_are_discarded() {
        let compacted = compact(["orders..items", "profile"]);
        assert_eq!(joined(&compacted), vec!["profile"]);
    }

    #[test]
    fn removal_set_marks_hook_only_extension() {
        let baseline = compact(["orders"]);
        let extended = compact_into(["orders.items"], baseline.clone());
        assert_eq!(removal_set(&extended, &baseline), vec!["orders.items"]);
    }

    #[test]
    fn removal_set_is_empty_when_caller_already_asked() {
        let baseline = compact(["orders.items"]);
        let extended = compact_into(["orders.items"], baseline.clone());
        assert!(removal_set(&extended, &baseline).is_empty());
    }

    #[test]
    fn removal_set_stops_at_the_first_divergent_segment() {
        // The caller asked one level deep; the hook went two further. Only
        // the first hook-only boundary needs clearing.
        let baseline = compact(["orders.items"]);
        let extended = compact_into(["orders.items.sku.vendor"], baseline.clone());
        assert_eq!(removal_set(&extended, &baseline), vec!["orders.items.sku"]);
    }

    #[test]
    fn removal_set_covers_brand_new_roots() {
        let baseline = compact(["orders"]);
        let extended = compact_into(["audit.entries"], baseline.clone());
        assert_eq!(removal_set(&extended, &baseline), vec!["audit"]);
    }

    #[test]
    fn field_prefix_matching_requires_a_segment_boundary() {
        assert!(starts_with_field("orders", "orders"));
        assert!(starts_with_field("orders.items", "orders"));
        assert!(!starts_with_field("ordersx", "orders"));
        assert!(!starts_with_field("order", "orders"));
    }

    #[test]
    fn stripping_drops_the_field_and_leafless_entries() {
        let details = vec![
            "orders".to_string(),
            "orders.items".to_string(),
            "orders.items.sku".to_string(),
            "profile".to_string(),
        ];
        assert_eq!(
            strip_prefix_paths(&details, "orders"),
            vec!["items", "items.sku"]
        );
        assert!(strip_prefix_paths(&details, "profile").is_empty());
    }

    #[test]
    fn prune_clears_top_level_and_nested_fields() {
        let mut records = vec![json!({
            "id": 1,
            "profile": {"bio": "x"},
            "orders": [
                {"id": 10, "items": [{"sku": "a"}]},
                {"id": 11, "items": [{"sku": "b"}]}
            ]
        })];
        prune(&mut records, &["orders.items".to_string(), "profile".to_string()]);
        assert!(records[0].get("profile").is_none());
        let orders = records[0]["orders"].as_array().unwrap();
        assert!(orders.iter().all(|order| order.get("items").is_none()));
        assert_eq!(orders[0]["id"], 10);
    }

    #[test]
    fn prune_descends_single_object_relations() {
        let mut records = vec![json!({
            "id": 1,
            "customer": {"id": 7, "address": {"city": "x"}}
        })];
        prune(&mut records, &["customer.address".to_string()]);
        assert!(records[0]["customer"].get("address").is_none());
        assert_eq!(records[0]["customer"]["id"], 7);
    }
}
