//! Subscriber protocol
//!
//! Set-property subscribers watch hydration calls: a predicate selects the
//! calls they care about, optional before/after hooks run around the
//! relation fetches, and declared extra paths are merged into the caller's
//! request for the duration of the call. Whatever a hook requested beyond
//! the caller's ask is stripped again before the call returns.
//!
//! Save subscribers watch writes: their events match individual incoming
//! records and receive the persisted counterpart (matched by primary-key
//! tuple) before and after the write.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ChainResult;
use crate::path;

/// The shared state of one hydration call, handed to every matching hook.
///
/// Hooks mutate it in place; mutations made by one hook are visible to the
/// hooks that run after it within the same call. Hooks matched by the same
/// phase must not rely on their relative order.
#[derive(Debug, Default)]
pub struct HydrateParam {
    /// Requested paths (rewritten to the hook-extended set before dispatch)
    pub details: Vec<String>,
    /// The records being hydrated
    pub records: Vec<Value>,
    /// Free-form side data shared between hooks
    pub data: Value,
}

/// Predicate selecting the hydration calls a subscriber applies to
pub type HydratePredicate = Arc<dyn Fn(&HydrateParam) -> bool + Send + Sync>;

/// A before/after hydration hook
#[async_trait]
pub trait HydrateHook: Send + Sync {
    async fn call(&self, param: &mut HydrateParam) -> ChainResult<()>;
}

/// A set-property subscription rule
#[derive(Clone)]
pub struct HydrateSubscriber {
    pub(crate) matches: HydratePredicate,
    pub(crate) details: Vec<String>,
    pub(crate) before: Option<Arc<dyn HydrateHook>>,
    pub(crate) after: Option<Arc<dyn HydrateHook>>,
}

impl HydrateSubscriber {
    /// Start a rule from its predicate.
    pub fn when<F>(matches: F) -> Self
    where
        F: Fn(&HydrateParam) -> bool + Send + Sync + 'static,
    {
        Self {
            matches: Arc::new(matches),
            details: Vec::new(),
            before: None,
            after: None,
        }
    }

    /// Extra paths this rule needs hydrated while its hooks run.
    pub fn details<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.details = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Hook run before the relation fetches of a matched call.
    pub fn before(mut self, hook: impl HydrateHook + 'static) -> Self {
        self.before = Some(Arc::new(hook));
        self
    }

    /// Hook run after the relation fetches, with hydrated data visible.
    pub fn after(mut self, hook: impl HydrateHook + 'static) -> Self {
        self.after = Some(Arc::new(hook));
        self
    }
}

/// The path rewrite computed for one hydration call: the hook-extended set
/// used for the actual fetch, and the hook-only boundaries to strip after
/// the after-hooks have run.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriberPlan {
    pub refresh_details: Vec<String>,
    pub will_removes: Vec<String>,
}

/// Select the matching subscribers and merge their extra paths into the
/// caller's compacted baseline. `None` when no subscriber carrying hooks
/// matches this call.
pub(crate) fn plan(
    param: &HydrateParam,
    subscribers: &[HydrateSubscriber],
) -> Option<SubscriberPlan> {
    if subscribers.is_empty() {
        return None;
    }
    let matched: Vec<&HydrateSubscriber> = subscribers
        .iter()
        .filter(|rule| (rule.before.is_some() || rule.after.is_some()) && (rule.matches)(param))
        .collect();
    if matched.is_empty() {
        return None;
    }

    let baseline = path::compact(param.details.iter());

    let mut extras: Vec<&str> = Vec::new();
    for rule in &matched {
        for detail in &rule.details {
            if !detail.is_empty() && !extras.contains(&detail.as_str()) {
                extras.push(detail);
            }
        }
    }

    let refreshed = path::compact_into(extras, baseline.clone());
    let will_removes = path::removal_set(&refreshed, &baseline);

    Some(SubscriberPlan {
        refresh_details: refreshed.iter().map(|parts| parts.join(".")).collect(),
        will_removes,
    })
}

/// Predicate selecting the incoming records a save event applies to
pub type SavePredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Hook run before the write for each matched record
#[async_trait]
pub trait BeforeSaveHook: Send + Sync {
    /// `record` is the incoming record; mutations land in the write.
    /// `persisted` is the counterpart matched by primary-key tuple, absent
    /// on insert.
    async fn call(&self, record: &mut Value, persisted: Option<&Value>) -> ChainResult<()>;
}

/// Hook run after the write for each matched record
#[async_trait]
pub trait AfterSaveHook: Send + Sync {
    /// `record` carries the merged/assigned post-write state, `snapshot`
    /// is the deep clone taken before the write, `persisted` is the
    /// re-fetched stored record if its keys resolve.
    async fn call(
        &self,
        record: &Value,
        snapshot: &Value,
        persisted: Option<&Value>,
    ) -> ChainResult<()>;
}

/// One save subscription rule
#[derive(Clone)]
pub struct SaveEvent {
    pub(crate) matches: SavePredicate,
    pub(crate) before_save: Option<Arc<dyn BeforeSaveHook>>,
    pub(crate) after_save: Option<Arc<dyn AfterSaveHook>>,
}

impl SaveEvent {
    pub fn when<F>(matches: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            matches: Arc::new(matches),
            before_save: None,
            after_save: None,
        }
    }

    pub fn before_save(mut self, hook: impl BeforeSaveHook + 'static) -> Self {
        self.before_save = Some(Arc::new(hook));
        self
    }

    pub fn after_save(mut self, hook: impl AfterSaveHook + 'static) -> Self {
        self.after_save = Some(Arc::new(hook));
        self
    }
}

/// The save subscription of one entity
#[derive(Clone, Default)]
pub struct SaveSubscriber {
    /// Paths hydrated onto the persisted records fetched for diffing
    pub(crate) details: Vec<String>,
    pub(crate) events: Vec<SaveEvent>,
}

impl SaveSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn details<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.details = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn event(mut self, event: SaveEvent) -> Self {
        self.events.push(event);
        self
    }

    pub(crate) fn matches_any(&self, records: &[Value]) -> bool {
        records
            .iter()
            .any(|record| self.events.iter().any(|event| (event.matches)(record)))
    }
}

/// A matched before-save hook, bound to its record index
pub(crate) struct BeforeEventRef {
    pub index: usize,
    pub hook: Arc<dyn BeforeSaveHook>,
}

/// A matched after-save hook, bound to its record index and the pre-save
/// snapshot of the record
pub(crate) struct AfterEventRef {
    pub index: usize,
    pub snapshot: Value,
    pub hook: Arc<dyn AfterSaveHook>,
}

/// Partition the matching events of a batch. After-entries capture a deep
/// clone of the incoming record now, before the write mutates it.
pub(crate) fn partition_events(
    subscriber: &SaveSubscriber,
    records: &[Value],
) -> (Vec<BeforeEventRef>, Vec<AfterEventRef>) {
    let mut before_events = Vec::new();
    let mut after_events = Vec::new();

    for (index, record) in records.iter().enumerate() {
        for event in &subscriber.events {
            if !(event.matches)(record) {
                continue;
            }
            if let Some(hook) = &event.before_save {
                before_events.push(BeforeEventRef {
                    index,
                    hook: Arc::clone(hook),
                });
            }
            if let Some(hook) = &event.after_save {
                after_events.push(AfterEventRef {
                    index,
                    snapshot: record.clone(),
                    hook: Arc::clone(hook),
                });
            }
        }
    }

    (before_events, after_events)
}
