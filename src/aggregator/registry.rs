// Live specification registry

use super::TrackerError;
use crate::model::{FeatureId, SpecId, SpecInfo};
use crate::state::{FeatureRun, Snapshot};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, ThreadId};
use std::time::Instant;

/// One running specification.
///
/// The descriptor sits outside the lock so the resolver can walk the
/// hierarchy without touching the snapshot. The snapshot slot is emptied
/// when it is handed to the report sink; late writers find it empty.
#[derive(Debug)]
pub struct LiveSpec {
    spec: Arc<SpecInfo>,
    started_at: Instant,
    /// Registration order within the registry
    order: u64,
    /// Thread that called `before_spec`
    thread: ThreadId,
    snapshot: Mutex<Option<Snapshot>>,
}

impl LiveSpec {
    fn new(spec: Arc<SpecInfo>, wall: DateTime<Utc>, started_at: Instant, order: u64) -> Self {
        let snapshot = Snapshot::new(Arc::clone(&spec), wall);
        Self {
            spec,
            started_at,
            order,
            thread: thread::current().id(),
            snapshot: Mutex::new(Some(snapshot)),
        }
    }

    pub fn order(&self) -> u64 {
        self.order
    }

    /// Whether the run was started on the calling thread
    pub fn on_current_thread(&self) -> bool {
        self.thread == thread::current().id()
    }

    /// State of `feature` in this run's snapshot
    pub fn feature_state(&self, feature: &FeatureId) -> FeatureState {
        let open = self.with_snapshot(|snap| snap.feature_run(feature).map(FeatureRun::is_open));
        match open {
            Ok(None) => FeatureState::Undeclared,
            Ok(Some(true)) => FeatureState::Open,
            Ok(Some(false)) => FeatureState::Completed,
            Err(_) => FeatureState::Finalized,
        }
    }

    pub fn spec(&self) -> &SpecInfo {
        &self.spec
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Run `f` against the in-progress snapshot
    pub fn with_snapshot<R>(
        &self,
        f: impl FnOnce(&mut Snapshot) -> R,
    ) -> Result<R, TrackerError> {
        let mut slot = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_mut() {
            Some(snapshot) => Ok(f(snapshot)),
            None => Err(TrackerError::AlreadyFinalized(self.spec.id.clone())),
        }
    }

    pub(crate) fn take(&self) -> Option<Snapshot> {
        self.snapshot.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

/// Where a feature stands within one live run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureState {
    Undeclared,
    /// Declared and `after_feature` not seen yet
    Open,
    Completed,
    /// The snapshot was already handed off
    Finalized,
}

/// Maps running specification identities to their live state
#[derive(Debug, Default)]
pub struct SpecRegistry {
    live: RwLock<HashMap<SpecId, Arc<LiveSpec>>>,
    next_order: AtomicU64,
}

impl SpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run. Fails if the identity is still running.
    pub fn begin(
        &self,
        spec: Arc<SpecInfo>,
        wall: DateTime<Utc>,
        started_at: Instant,
    ) -> Result<Arc<LiveSpec>, TrackerError> {
        let mut live = self.live.write().unwrap_or_else(|e| e.into_inner());
        if live.contains_key(&spec.id) {
            return Err(TrackerError::AlreadyRunning(spec.id.clone()));
        }
        let order = self.next_order.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(LiveSpec::new(Arc::clone(&spec), wall, started_at, order));
        live.insert(spec.id.clone(), Arc::clone(&entry));
        Ok(entry)
    }

    /// Remove a run. `None` means it was already handled.
    pub fn end(&self, id: &SpecId) -> Option<Arc<LiveSpec>> {
        self.live.write().unwrap_or_else(|e| e.into_inner()).remove(id)
    }

    pub fn get(&self, id: &SpecId) -> Option<Arc<LiveSpec>> {
        self.live.read().unwrap_or_else(|e| e.into_inner()).get(id).cloned()
    }

    /// Slow path: the earliest started live run whose hierarchy contains `id`.
    ///
    /// Scans every live run, so O(n) in the number of running specifications.
    pub fn find_in_hierarchy(&self, id: &SpecId) -> Option<Arc<LiveSpec>> {
        self.hierarchy_matches(id).into_iter().next()
    }

    /// Every live run whose hierarchy contains `id`, in start order. O(n).
    pub fn hierarchy_matches(&self, id: &SpecId) -> Vec<Arc<LiveSpec>> {
        let live = self.live.read().unwrap_or_else(|e| e.into_inner());
        let mut matches: Vec<Arc<LiveSpec>> = live
            .values()
            .filter(|entry| entry.spec.is_or_extends(id))
            .cloned()
            .collect();
        matches.sort_by_key(|entry| entry.order);
        matches
    }

    pub fn len(&self) -> usize {
        self.live.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FeatureInfo;

    fn begin(registry: &SpecRegistry, spec: SpecInfo) -> Result<Arc<LiveSpec>, TrackerError> {
        registry.begin(Arc::new(spec), Utc::now(), Instant::now())
    }

    #[test]
    fn test_begin_twice_fails() {
        let registry = SpecRegistry::new();
        begin(&registry, SpecInfo::new("S")).unwrap();

        let err = begin(&registry, SpecInfo::new("S")).unwrap_err();

        assert_eq!(err, TrackerError::AlreadyRunning(SpecId::new("S")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_begin_after_end_is_allowed() {
        let registry = SpecRegistry::new();
        begin(&registry, SpecInfo::new("S")).unwrap();
        assert!(registry.end(&SpecId::new("S")).is_some());

        assert!(begin(&registry, SpecInfo::new("S")).is_ok());
    }

    #[test]
    fn test_end_is_single_shot() {
        let registry = SpecRegistry::new();
        begin(&registry, SpecInfo::new("S")).unwrap();

        assert!(registry.end(&SpecId::new("S")).is_some());
        assert!(registry.end(&SpecId::new("S")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_find_in_hierarchy_matches_ancestor() {
        let registry = SpecRegistry::new();
        begin(&registry, SpecInfo::new("Child").extending(SpecInfo::new("Base"))).unwrap();

        let found = registry.find_in_hierarchy(&SpecId::new("Base")).unwrap();

        assert_eq!(found.spec().id, SpecId::new("Child"));
        assert!(registry.get(&SpecId::new("Base")).is_none());
    }

    #[test]
    fn test_hierarchy_matches_in_start_order() {
        let registry = SpecRegistry::new();
        for name in ["ChildC", "ChildA", "ChildB"] {
            begin(&registry, SpecInfo::new(name).extending(SpecInfo::new("Base"))).unwrap();
        }
        begin(&registry, SpecInfo::new("Unrelated")).unwrap();

        let names: Vec<String> = registry
            .hierarchy_matches(&SpecId::new("Base"))
            .iter()
            .map(|live| live.spec().id.to_string())
            .collect();

        assert_eq!(names, vec!["ChildC", "ChildA", "ChildB"]);
        assert_eq!(
            registry.find_in_hierarchy(&SpecId::new("Base")).unwrap().spec().id,
            SpecId::new("ChildC")
        );
    }

    #[test]
    fn test_feature_state_follows_run() {
        let registry = SpecRegistry::new();
        let live = begin(&registry, SpecInfo::new("S")).unwrap();
        let id = FeatureId::new("F");
        assert_eq!(live.feature_state(&id), FeatureState::Undeclared);

        live.with_snapshot(|s| s.add_feature(FeatureRun::new(FeatureInfo::new("F", "S"))))
            .unwrap();
        assert_eq!(live.feature_state(&id), FeatureState::Open);
        assert!(live.on_current_thread());

        live.with_snapshot(|s| s.feature_run_mut(&id).map(FeatureRun::complete))
            .unwrap();
        assert_eq!(live.feature_state(&id), FeatureState::Completed);

        live.take();
        assert_eq!(live.feature_state(&id), FeatureState::Finalized);
    }

    #[test]
    fn test_taken_snapshot_rejects_writes() {
        let registry = SpecRegistry::new();
        let live = begin(&registry, SpecInfo::new("S")).unwrap();

        assert!(live.take().is_some());
        let err = live.with_snapshot(|_| ()).unwrap_err();

        assert_eq!(err, TrackerError::AlreadyFinalized(SpecId::new("S")));
    }
}
