// Feature-to-specification resolution

use super::registry::{FeatureState, LiveSpec, SpecRegistry};
use crate::model::{FeatureId, FeatureInfo, SpecId};
use std::collections::HashMap;
use std::ptr;
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Finds the running specification a feature belongs to.
///
/// Features inherited from an ancestor specification name the ancestor as
/// their owner, while the run is registered under the descendant. Lookup
/// therefore goes:
///
/// 1. direct: the declared owner is itself running
/// 2. cache: runs that declared this inherited feature earlier
/// 3. slow path: scan every live run and walk its hierarchy
///
/// Several descendants of one ancestor may run at once and share the same
/// inherited feature. A declaration goes to a matching run that has not
/// declared the feature yet; later events go to a run where it is still
/// open. Ties prefer the run started on the calling thread, then the one
/// started first.
///
/// The cache holds one weak entry per (feature, run) pair and never keeps a
/// run alive. An entry is evicted when its feature completes in that run.
#[derive(Debug)]
pub struct FeatureResolver {
    cache: Mutex<HashMap<FeatureId, Vec<Weak<LiveSpec>>>>,
    capacity: usize,
}

impl Default for FeatureResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn same_run(entry: &Weak<LiveSpec>, live: &Arc<LiveSpec>) -> bool {
    ptr::eq(entry.as_ptr(), Arc::as_ptr(live))
}

/// Calling thread first, then start order
fn preferred(candidates: impl IntoIterator<Item = Arc<LiveSpec>>) -> Option<Arc<LiveSpec>> {
    candidates
        .into_iter()
        .min_by_key(|live| (!live.on_current_thread(), live.order()))
}

impl FeatureResolver {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Run that receives iteration, error and completion events of `feature`
    pub fn resolve(&self, registry: &SpecRegistry, feature: &FeatureInfo) -> Option<Arc<LiveSpec>> {
        if let Some(live) = registry.get(&feature.spec) {
            return Some(live);
        }

        let open = |live: &Arc<LiveSpec>| live.feature_state(&feature.id) == FeatureState::Open;

        if let Some(live) = preferred(self.cached(&feature.id).into_iter().filter(open)) {
            return Some(live);
        }

        let matches = registry.hierarchy_matches(&feature.spec);
        if let Some(live) = preferred(matches.iter().filter(|live| open(*live)).cloned()) {
            debug!(
                "Feature {} resolved to {} through hierarchy of {}",
                feature.id,
                live.spec().id,
                feature.spec
            );
            self.remember(&feature.id, &live);
            return Some(live);
        }

        // Not declared anywhere; the caller reports the missing feature run
        preferred(matches)
    }

    /// Run that receives the `before_feature` declaration of `feature`
    pub fn resolve_for_declaration(
        &self,
        registry: &SpecRegistry,
        feature: &FeatureInfo,
    ) -> Option<Arc<LiveSpec>> {
        if let Some(live) = registry.get(&feature.spec) {
            return Some(live);
        }

        let undeclared = registry
            .hierarchy_matches(&feature.spec)
            .into_iter()
            .filter(|live| live.feature_state(&feature.id) == FeatureState::Undeclared)
            .min_by_key(|live| {
                let lists = live.spec().features.iter().any(|f| f.id == feature.id);
                (!lists, !live.on_current_thread(), live.order())
            });

        match undeclared {
            Some(live) => {
                debug!(
                    "Feature {} declared in {} through hierarchy of {}",
                    feature.id,
                    live.spec().id,
                    feature.spec
                );
                self.remember(&feature.id, &live);
                Some(live)
            }
            None => self.resolve(registry, feature),
        }
    }

    /// Resolve a specification identity that may name an ancestor of the
    /// running specification. Nothing is cached.
    pub fn resolve_spec(&self, registry: &SpecRegistry, spec: &SpecId) -> Option<Arc<LiveSpec>> {
        registry
            .get(spec)
            .or_else(|| registry.find_in_hierarchy(spec))
    }

    /// Forget that `live` runs `feature`
    pub fn evict(&self, feature: &FeatureId, live: &Arc<LiveSpec>) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entries) = cache.get_mut(feature) {
            entries.retain(|entry| entry.strong_count() > 0 && !same_run(entry, live));
            if entries.is_empty() {
                cache.remove(feature);
            }
        }
    }

    /// Number of cached (feature, run) pairs
    pub fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Live runs cached for `feature`; dead entries are dropped on the way
    fn cached(&self, feature: &FeatureId) -> Vec<Arc<LiveSpec>> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entries) = cache.get_mut(feature) else {
            return Vec::new();
        };
        entries.retain(|entry| entry.strong_count() > 0);
        let live: Vec<Arc<LiveSpec>> = entries.iter().filter_map(Weak::upgrade).collect();
        if entries.is_empty() {
            cache.remove(feature);
        }
        live
    }

    fn remember(&self, feature: &FeatureId, live: &Arc<LiveSpec>) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if cache
            .get(feature)
            .is_some_and(|entries| entries.iter().any(|entry| same_run(entry, live)))
        {
            return;
        }

        let mut len: usize = cache.values().map(Vec::len).sum();
        if len >= self.capacity {
            for entries in cache.values_mut() {
                entries.retain(|entry| entry.strong_count() > 0);
            }
            cache.retain(|_, entries| !entries.is_empty());
            len = cache.values().map(Vec::len).sum();
        }
        if len >= self.capacity {
            debug!("Resolver cache full, not caching {} for {}", feature, live.spec().id);
            return;
        }
        cache
            .entry(feature.clone())
            .or_default()
            .push(Arc::downgrade(live));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SpecInfo;
    use crate::state::FeatureRun;
    use chrono::Utc;
    use std::time::Instant;

    fn begin(registry: &SpecRegistry, spec: SpecInfo) -> Arc<LiveSpec> {
        registry.begin(Arc::new(spec), Utc::now(), Instant::now()).unwrap()
    }

    #[test]
    fn test_direct_lookup_does_not_cache() {
        let registry = SpecRegistry::new();
        let resolver = FeatureResolver::new();
        begin(&registry, SpecInfo::new("S"));

        let live = resolver.resolve(&registry, &FeatureInfo::new("F", "S")).unwrap();

        assert_eq!(live.spec().id, SpecId::new("S"));
        assert_eq!(resolver.cached_len(), 0);
    }

    #[test]
    fn test_inherited_feature_resolves_to_descendant_and_caches() {
        let registry = SpecRegistry::new();
        let resolver = FeatureResolver::new();
        begin(&registry, SpecInfo::new("Child").extending(SpecInfo::new("Base")));
        let feature = FeatureInfo::new("inherited", "Base");

        let live = resolver.resolve_for_declaration(&registry, &feature).unwrap();

        assert_eq!(live.spec().id, SpecId::new("Child"));
        assert_eq!(resolver.cached_len(), 1);

        resolver.evict(&feature.id, &live);
        assert_eq!(resolver.cached_len(), 0);
    }

    #[test]
    fn test_unknown_feature_is_not_found() {
        let registry = SpecRegistry::new();
        let resolver = FeatureResolver::new();
        begin(&registry, SpecInfo::new("S"));

        assert!(resolver.resolve(&registry, &FeatureInfo::new("F", "Elsewhere")).is_none());
        assert_eq!(resolver.cached_len(), 0);
    }

    #[test]
    fn test_cache_does_not_keep_run_alive() {
        let registry = SpecRegistry::new();
        let resolver = FeatureResolver::new();
        begin(&registry, SpecInfo::new("Child").extending(SpecInfo::new("Base")));
        let feature = FeatureInfo::new("inherited", "Base");
        resolver.resolve_for_declaration(&registry, &feature).unwrap();
        assert_eq!(resolver.cached_len(), 1);

        drop(registry.end(&SpecId::new("Child")));

        assert!(resolver.resolve(&registry, &feature).is_none());
        assert_eq!(resolver.cached_len(), 0);
    }

    #[test]
    fn test_full_cache_skips_new_entries() {
        let registry = SpecRegistry::new();
        let resolver = FeatureResolver::with_capacity(1);
        begin(&registry, SpecInfo::new("Child").extending(SpecInfo::new("Base")));

        resolver.resolve_for_declaration(&registry, &FeatureInfo::new("a", "Base")).unwrap();
        let second = resolver.resolve_for_declaration(&registry, &FeatureInfo::new("b", "Base"));

        assert!(second.is_some());
        assert_eq!(resolver.cached_len(), 1);
    }

    fn declare(live: &LiveSpec, feature: &FeatureInfo) {
        live.with_snapshot(|s| s.add_feature(FeatureRun::new(feature.clone())))
            .unwrap();
    }

    #[test]
    fn test_shared_inherited_feature_declared_once_per_descendant() {
        let registry = SpecRegistry::new();
        let resolver = FeatureResolver::new();
        let a = begin(&registry, SpecInfo::new("ChildA").extending(SpecInfo::new("Base")));
        let b = begin(&registry, SpecInfo::new("ChildB").extending(SpecInfo::new("Base")));
        let feature = FeatureInfo::new("inherited", "Base");

        let first = resolver.resolve_for_declaration(&registry, &feature).unwrap();
        declare(&first, &feature);
        let second = resolver.resolve_for_declaration(&registry, &feature).unwrap();
        declare(&second, &feature);

        assert!(Arc::ptr_eq(&first, &a));
        assert!(Arc::ptr_eq(&second, &b));
        assert_eq!(resolver.cached_len(), 2);
    }

    #[test]
    fn test_events_follow_open_feature() {
        let registry = SpecRegistry::new();
        let resolver = FeatureResolver::new();
        let a = begin(&registry, SpecInfo::new("ChildA").extending(SpecInfo::new("Base")));
        let b = begin(&registry, SpecInfo::new("ChildB").extending(SpecInfo::new("Base")));
        let feature = FeatureInfo::new("inherited", "Base");
        declare(&a, &feature);
        declare(&b, &feature);
        resolver.resolve_for_declaration(&registry, &feature);

        assert!(Arc::ptr_eq(&resolver.resolve(&registry, &feature).unwrap(), &a));

        a.with_snapshot(|s| s.feature_run_mut(&feature.id).map(FeatureRun::complete))
            .unwrap();
        resolver.evict(&feature.id, &a);

        assert!(Arc::ptr_eq(&resolver.resolve(&registry, &feature).unwrap(), &b));
    }

    #[test]
    fn test_declaration_prefers_descendant_listing_the_feature() {
        let registry = SpecRegistry::new();
        let resolver = FeatureResolver::new();
        let feature = FeatureInfo::new("inherited", "Base");
        begin(&registry, SpecInfo::new("Other").extending(SpecInfo::new("Base")));
        let listing = begin(
            &registry,
            SpecInfo::new("Listing")
                .extending(SpecInfo::new("Base"))
                .with_feature(feature.clone()),
        );

        let live = resolver.resolve_for_declaration(&registry, &feature).unwrap();

        assert!(Arc::ptr_eq(&live, &listing));
    }

    #[test]
    fn test_resolve_spec_walks_hierarchy() {
        let registry = SpecRegistry::new();
        let resolver = FeatureResolver::new();
        begin(&registry, SpecInfo::new("Child").extending(SpecInfo::new("Base")));

        let live = resolver.resolve_spec(&registry, &SpecId::new("Base")).unwrap();

        assert_eq!(live.spec().id, SpecId::new("Child"));
    }
}
