//! Priority-ordered entry sets.
//!
//! An [`EntrySet`] keeps its items sorted by ascending priority behind a
//! reader/writer lock. Dispatch only ever takes the read lock for the time it
//! needs to pick an item; the item itself is an `Arc` that outlives the lock.
//!
//! Structural mutations take a second, administrative mutex for their whole
//! duration (including the pipeline build) and the write lock only for the
//! final change, so there is at most one mutation per set at a time and
//! dispatch never waits on a build.

use crate::error::{Result, RouterError};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::Arc;

/// An item that can live in an [`EntrySet`].
pub(crate) trait Ranked: Send + Sync {
    /// Unique name within the set.
    fn name(&self) -> &str;

    /// Current priority. Only changes under the set's write lock.
    fn priority(&self) -> u32;

    /// Change the priority. Called under the set's write lock.
    fn set_priority(&self, priority: u32);
}

/// A sorted, lock-guarded collection of entries.
pub(crate) struct EntrySet<T> {
    entries: RwLock<Vec<Arc<T>>>,
    admin: Mutex<()>,
}

impl<T: Ranked> EntrySet<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            admin: Mutex::new(()),
        }
    }

    /// Serialize a structural mutation.
    pub(crate) fn lock_admin(&self) -> MutexGuard<'_, ()> {
        self.admin.lock()
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub(crate) fn get(&self, name: &str) -> Option<Arc<T>> {
        self.entries
            .read()
            .iter()
            .find(|e| e.name() == name)
            .cloned()
    }

    /// The first item, in priority order, accepted by `pred`.
    pub(crate) fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<Arc<T>> {
        self.entries.read().iter().find(|e| pred(e)).cloned()
    }

    /// Every item accepted by `pred`, in priority order.
    pub(crate) fn select(&self, mut pred: impl FnMut(&T) -> bool) -> Vec<Arc<T>> {
        self.entries
            .read()
            .iter()
            .filter(|e| pred(e))
            .cloned()
            .collect()
    }

    /// Map every item while holding the read lock, so priorities and order
    /// come from the same state.
    pub(crate) fn collect<R>(&self, f: impl FnMut(&Arc<T>) -> R) -> Vec<R> {
        self.entries.read().iter().map(f).collect()
    }

    pub(crate) fn max_priority(&self) -> Option<u32> {
        self.entries.read().last().map(|e| e.priority())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Fail if `name` or `priority` is already taken.
    pub(crate) fn check_vacancy(&self, name: &str, priority: u32) -> Result<()> {
        Self::vacancy(&self.entries.read(), name, priority)
    }

    fn vacancy(entries: &[Arc<T>], name: &str, priority: u32) -> Result<()> {
        if entries.iter().any(|e| e.name() == name) {
            return Err(RouterError::DuplicateName(name.to_owned()));
        }
        match entries.iter().find(|e| e.priority() == priority) {
            Some(other) => Err(RouterError::PriorityConflict {
                priority,
                reason: format!("already used by '{}'", other.name()),
            }),
            None => Ok(()),
        }
    }

    /// Insert at the position given by the item's priority.
    pub(crate) fn insert(&self, item: Arc<T>) -> Result<()> {
        let mut entries = self.entries.write();
        Self::vacancy(&entries, item.name(), item.priority())?;
        let at = entries.partition_point(|e| e.priority() < item.priority());
        entries.insert(at, item);
        Ok(())
    }

    pub(crate) fn remove(&self, name: &str) -> Option<Arc<T>> {
        let mut entries = self.entries.write();
        let at = entries.iter().position(|e| e.name() == name)?;
        Some(entries.remove(at))
    }

    /// Remove every item accepted by `pred`, returning them in order.
    pub(crate) fn remove_where(&self, mut pred: impl FnMut(&T) -> bool) -> Vec<Arc<T>> {
        let mut entries = self.entries.write();
        let (removed, kept): (Vec<_>, Vec<_>) = entries.drain(..).partition(|e| pred(e));
        *entries = kept;
        removed
    }

    /// Move an item to a new priority in one step.
    pub(crate) fn reprioritize(&self, name: &str, priority: u32) -> Result<()> {
        let mut entries = self.entries.write();
        let item = entries
            .iter()
            .find(|e| e.name() == name)
            .cloned()
            .ok_or_else(|| RouterError::NotFound(name.to_owned()))?;
        if item.priority() == priority {
            return Ok(());
        }
        if let Some(other) = entries.iter().find(|e| e.priority() == priority) {
            return Err(RouterError::PriorityConflict {
                priority,
                reason: format!("already used by '{}'", other.name()),
            });
        }
        item.set_priority(priority);
        entries.sort_by_key(|e| e.priority());
        Ok(())
    }

    /// Run `f` while holding the write lock.
    pub(crate) fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.entries.write();
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Item {
        name: String,
        priority: AtomicU32,
    }

    impl Ranked for Item {
        fn name(&self) -> &str {
            &self.name
        }

        fn priority(&self) -> u32 {
            self.priority.load(Ordering::Acquire)
        }

        fn set_priority(&self, priority: u32) {
            self.priority.store(priority, Ordering::Release);
        }
    }

    fn item(name: &str, priority: u32) -> Arc<Item> {
        Arc::new(Item {
            name: name.to_owned(),
            priority: AtomicU32::new(priority),
        })
    }

    fn order(set: &EntrySet<Item>) -> Vec<(String, u32)> {
        set.collect(|e| (e.name.clone(), e.priority()))
    }

    #[test]
    fn test_insert_keeps_order() {
        let set = EntrySet::new();
        set.insert(item("c", 30)).unwrap();
        set.insert(item("a", 10)).unwrap();
        set.insert(item("b", 20)).unwrap();

        let names: Vec<_> = order(&set).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(set.max_priority(), Some(30));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_conflicts() {
        let set = EntrySet::new();
        set.insert(item("a", 10)).unwrap();
        assert!(matches!(
            set.insert(item("a", 11)),
            Err(RouterError::DuplicateName(_))
        ));
        assert!(matches!(
            set.insert(item("b", 10)),
            Err(RouterError::PriorityConflict { priority: 10, .. })
        ));
        assert!(set.check_vacancy("b", 11).is_ok());
    }

    #[test]
    fn test_reprioritize() {
        let set = EntrySet::new();
        set.insert(item("a", 1)).unwrap();
        set.insert(item("b", 2)).unwrap();
        set.insert(item("c", 3)).unwrap();

        set.reprioritize("a", 10).unwrap();
        assert_eq!(
            order(&set),
            vec![("b".into(), 2), ("c".into(), 3), ("a".into(), 10)]
        );
        assert!(set.reprioritize("a", 10).is_ok());
        assert!(matches!(
            set.reprioritize("a", 2),
            Err(RouterError::PriorityConflict { .. })
        ));
        assert!(matches!(
            set.reprioritize("z", 5),
            Err(RouterError::NotFound(_))
        ));
    }

    #[test]
    fn test_find_and_remove() {
        let set = EntrySet::new();
        set.insert(item("a", 1)).unwrap();
        set.insert(item("b", 2)).unwrap();
        set.insert(item("c", 3)).unwrap();

        assert_eq!(set.find(|e| e.priority() > 1).unwrap().name, "b");
        assert_eq!(set.select(|e| e.priority() > 1).len(), 2);
        assert!(set.remove("b").is_some());
        assert!(set.remove("b").is_none());

        let removed = set.remove_where(|e| e.name == "c");
        assert_eq!(removed.len(), 1);
        assert_eq!(order(&set), vec![("a".into(), 1)]);
    }
}
