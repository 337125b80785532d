use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tenantmon_monitor::Collector;

/// Tenant id to metric source.
///
/// The lock covers membership only: `add`, `remove` and the shallow copy made
/// by `snapshot`. Sources handed out by a snapshot are read without it.
#[derive(Default)]
pub struct TenantRegistryTable {
    entries: Mutex<HashMap<String, Arc<dyn Collector>>>,
}

/// Table membership at one instant, ordered by tenant id.
#[derive(Clone, Default)]
pub struct TenantSnapshot {
    entries: Vec<(String, Arc<dyn Collector>)>,
}

impl TenantSnapshot {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Collector>)> {
        self.entries.iter().map(|(id, source)| (id.as_str(), source))
    }

    pub fn tenants(&self) -> Vec<&str> {
        self.entries.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TenantRegistryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `source` for `tenant`, returning the source it replaced.
    pub fn add(&self, tenant: impl Into<String>, source: Arc<dyn Collector>) -> Option<Arc<dyn Collector>> {
        let tenant = tenant.into();
        tracing::debug!(tenant = %tenant, "Adding tenant metric source");
        self.entries.lock().insert(tenant, source)
    }

    /// Deregister `tenant`. Unknown ids are ignored.
    pub fn remove(&self, tenant: &str) -> Option<Arc<dyn Collector>> {
        let removed = self.entries.lock().remove(tenant);
        if removed.is_some() {
            tracing::debug!(tenant = %tenant, "Removed tenant metric source");
        }
        removed
    }

    pub fn snapshot(&self) -> TenantSnapshot {
        let mut entries: Vec<(String, Arc<dyn Collector>)> = self
            .entries
            .lock()
            .iter()
            .map(|(id, source)| (id.clone(), source.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        TenantSnapshot { entries }
    }

    pub fn contains(&self, tenant: &str) -> bool {
        self.entries.lock().contains_key(tenant)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantmon_monitor::MetricsRegistry;

    fn source() -> Arc<dyn Collector> {
        Arc::new(MetricsRegistry::new())
    }

    #[test]
    fn test_add_replaces() {
        let table = TenantRegistryTable::new();
        let first = source();
        assert!(table.add("user1", first.clone()).is_none());
        let replaced = table.add("user1", source()).unwrap();
        assert!(Arc::ptr_eq(&replaced, &first));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_add_same_source_is_idempotent() {
        let table = TenantRegistryTable::new();
        let s = source();
        table.add("user1", s.clone());
        table.add("user1", s.clone());
        let snap = table.snapshot();
        assert_eq!(snap.len(), 1);
        assert!(Arc::ptr_eq(snap.iter().next().unwrap().1, &s));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let table = TenantRegistryTable::new();
        table.add("user1", source());
        assert!(table.remove("nobody").is_none());
        assert!(table.contains("user1"));
        assert!(table.remove("user1").is_some());
        assert!(table.is_empty());
    }

    #[test]
    fn test_snapshot_is_sorted_and_detached() {
        let table = TenantRegistryTable::new();
        table.add("user3", source());
        table.add("user1", source());
        table.add("user2", source());

        let snap = table.snapshot();
        table.remove("user2");
        table.add("user4", source());

        assert_eq!(snap.tenants(), vec!["user1", "user2", "user3"]);
        assert_eq!(table.snapshot().tenants(), vec!["user1", "user3", "user4"]);
    }

    #[test]
    fn test_concurrent_membership_changes() {
        let table = TenantRegistryTable::new();
        std::thread::scope(|s| {
            for t in 0..4 {
                let table = &table;
                s.spawn(move || {
                    for i in 0..200 {
                        let id = format!("t{}-{}", t, i % 10);
                        table.add(id.clone(), source());
                        if i % 3 == 0 {
                            table.remove(&id);
                        }
                    }
                });
            }
            s.spawn(|| {
                for _ in 0..200 {
                    let snap = table.snapshot();
                    let ids = snap.tenants();
                    let mut sorted = ids.clone();
                    sorted.dedup();
                    assert_eq!(ids, sorted);
                }
            });
        });
        assert!(table.len() <= 40);
    }
}
