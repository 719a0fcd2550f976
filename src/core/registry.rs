// src/core/registry.rs

//! The in-memory, lock-free-readable snapshot of supported and enabled feature
//! flags.
//!
//! The original system keeps this hot path fast by regenerating a dispatch module
//! on every change. This crate gets the same O(1), allocation-free read without any
//! metaprogramming: the current `(all, enabled)` pair is published as an immutable
//! value behind an `ArcSwap`, and readers load the current pointer without taking a
//! lock. Rebuilds are serialised by a dedicated mutex so two concurrent enables on
//! the same node can't publish an interleaved snapshot.

use super::flags::{FeatureFlag, ListFilter, Name};
use arc_swap::ArcSwap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// An immutable point-in-time view of every flag this node knows about and which
/// of them are currently enabled.
#[derive(Clone)]
pub struct RegistrySnapshot {
    all: Arc<HashMap<Name, FeatureFlag>>,
    enabled: Arc<HashSet<Name>>,
}

impl RegistrySnapshot {
    /// Builds a snapshot from a freshly merged flag map and the persisted enabled
    /// set. Enabled names absent from `all` are dropped silently, per the data
    /// model's `EnabledNames ⊆ keys(AllFlags)` invariant.
    pub fn build(all: HashMap<Name, FeatureFlag>, enabled_names: &[Name]) -> Self {
        let enabled: HashSet<Name> = enabled_names
            .iter()
            .filter(|n| all.contains_key(*n))
            .cloned()
            .collect();
        Self {
            all: Arc::new(all),
            enabled: Arc::new(enabled),
        }
    }

    pub fn empty() -> Self {
        Self {
            all: Arc::new(HashMap::new()),
            enabled: Arc::new(HashSet::new()),
        }
    }

    pub fn is_supported(&self, name: &Name) -> bool {
        self.all.contains_key(name)
    }

    pub fn is_enabled(&self, name: &Name) -> bool {
        self.enabled.contains(name)
    }

    pub fn get(&self, name: &Name) -> Option<&FeatureFlag> {
        self.all.get(name)
    }

    pub fn list(&self, filter: ListFilter) -> HashMap<Name, FeatureFlag> {
        match filter {
            ListFilter::All => (*self.all).clone(),
            ListFilter::Enabled => self
                .all
                .iter()
                .filter(|(n, _)| self.enabled.contains(*n))
                .map(|(n, f)| (n.clone(), f.clone()))
                .collect(),
            ListFilter::Disabled => self
                .all
                .iter()
                .filter(|(n, _)| !self.enabled.contains(*n))
                .map(|(n, f)| (n.clone(), f.clone()))
                .collect(),
        }
    }

    pub fn enabled_names(&self) -> Vec<Name> {
        self.enabled.iter().cloned().collect()
    }
}

/// Publishes and serves `RegistrySnapshot`s.
pub struct Registry {
    current: ArcSwap<RegistrySnapshot>,
    rebuild_lock: Mutex<()>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RegistrySnapshot::empty()),
            rebuild_lock: Mutex::new(()),
        }
    }

    /// Returns the current snapshot. Lock-free; never blocks on a concurrent
    /// rebuild.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.load_full()
    }

    /// Replaces the published snapshot. Callers MUST hold `rebuild_guard` for the
    /// duration of building `next` so that two concurrent rebuilds can't race each
    /// other to publish stale data last.
    pub async fn rebuild_guard(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.rebuild_lock.lock().await
    }

    pub fn publish(&self, next: RegistrySnapshot) {
        self.current.store(Arc::new(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag(desc: &str) -> FeatureFlag {
        FeatureFlag::new(desc)
    }

    #[test]
    fn enabled_names_outside_all_are_dropped() {
        let mut all = HashMap::new();
        all.insert(Name::from("a"), flag("a"));
        let snap = RegistrySnapshot::build(all, &[Name::from("a"), Name::from("ghost")]);
        assert!(snap.is_enabled(&Name::from("a")));
        assert!(!snap.is_enabled(&Name::from("ghost")));
        assert!(!snap.is_supported(&Name::from("ghost")));
    }

    #[test]
    fn disabled_is_all_minus_enabled() {
        let mut all = HashMap::new();
        all.insert(Name::from("a"), flag("a"));
        all.insert(Name::from("b"), flag("b"));
        let snap = RegistrySnapshot::build(all, &[Name::from("a")]);
        let disabled = snap.list(ListFilter::Disabled);
        assert_eq!(disabled.len(), 1);
        assert!(disabled.contains_key(&Name::from("b")));
    }

    #[tokio::test]
    async fn publish_is_visible_to_new_readers() {
        let registry = Registry::new();
        assert!(!registry.snapshot().is_supported(&Name::from("a")));

        let mut all = HashMap::new();
        all.insert(Name::from("a"), flag("a"));
        let guard = registry.rebuild_guard().await;
        registry.publish(RegistrySnapshot::build(all, &[]));
        drop(guard);

        assert!(registry.snapshot().is_supported(&Name::from("a")));
    }
}
