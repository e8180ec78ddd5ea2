//! In-memory storage
//!
//! One [`Store`] per entity type, each guarded by its own lock and holding an
//! atomic id counter. Callers never see the lock: every operation takes and
//! releases it internally.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::care::{HealthRecord, Medication, Notification, Patient};
use crate::error::{CareError, CareResult};

/// Something a [`Store`] can hold.
pub trait Entity: Clone + Send + Sync {
    /// Name used in not-found errors.
    const KIND: &'static str;

    fn id(&self) -> Option<u64>;

    fn assign_id(&mut self, id: u64);
}

#[derive(Debug)]
pub struct Store<T> {
    items: RwLock<HashMap<u64, T>>,
    next_id: AtomicU64,
}

impl<T: Entity> Default for Store<T> {
    fn default() -> Self {
        Store::new()
    }
}

impl<T: Entity> Store<T> {
    pub fn new() -> Self {
        Store {
            items: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    // A panic while holding the lock cannot leave a half-applied update,
    // since updates are committed by a single insert.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<u64, T>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<u64, T>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// All entities ordered by id.
    pub fn list(&self) -> Vec<T> {
        let items = self.read();
        let mut ids: Vec<&u64> = items.keys().collect();
        ids.sort_unstable();
        ids.into_iter().map(|id| items[id].clone()).collect()
    }

    pub fn get(&self, id: u64) -> Option<T> {
        self.read().get(&id).cloned()
    }

    pub fn require(&self, id: u64) -> CareResult<T> {
        self.get(id).ok_or_else(|| CareError::not_found(T::KIND, id))
    }

    /// Inserts or replaces. Entities without an id get the next one.
    pub fn save(&self, mut entity: T) -> T {
        let id = match entity.id() {
            Some(id) => {
                self.next_id.fetch_max(id + 1, Ordering::SeqCst);
                id
            }
            None => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                entity.assign_id(id);
                id
            }
        };
        self.write().insert(id, entity.clone());
        entity
    }

    pub fn remove(&self, id: u64) -> Option<T> {
        self.write().remove(&id)
    }

    /// Applies `f` to a copy of the entity and stores the copy only if `f`
    /// succeeds.
    pub fn update<R>(&self, id: u64, f: impl FnOnce(&mut T) -> CareResult<R>) -> CareResult<R> {
        let mut items = self.write();
        let current = items
            .get(&id)
            .ok_or_else(|| CareError::not_found(T::KIND, id))?;
        let mut draft = current.clone();
        let result = f(&mut draft)?;
        items.insert(id, draft);
        Ok(result)
    }

    /// Entities matching `pred`, ordered by id.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        let mut found: Vec<(u64, T)> = self
            .read()
            .iter()
            .filter(|(_, item)| pred(item))
            .map(|(id, item)| (*id, item.clone()))
            .collect();
        found.sort_unstable_by_key(|(id, _)| *id);
        found.into_iter().map(|(_, item)| item).collect()
    }

    /// Removes every entity matching `pred` and returns how many went.
    pub fn remove_where(&self, pred: impl Fn(&T) -> bool) -> usize {
        let mut items = self.write();
        let before = items.len();
        items.retain(|_, item| !pred(item));
        before - items.len()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

/// Every store the services share, created once at startup.
#[derive(Debug, Default)]
pub struct CareStores {
    pub patients: Store<Patient>,
    pub medications: Store<Medication>,
    pub notifications: Store<Notification>,
    pub records: Store<HealthRecord>,
}

impl CareStores {
    pub fn new() -> Self {
        CareStores::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::thread;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: Option<u64>,
        text: String,
    }

    impl Note {
        fn new(text: &str) -> Self {
            Note {
                id: None,
                text: text.to_string(),
            }
        }
    }

    impl Entity for Note {
        const KIND: &'static str = "Note";

        fn id(&self) -> Option<u64> {
            self.id
        }

        fn assign_id(&mut self, id: u64) {
            self.id = Some(id);
        }
    }

    #[test]
    fn test_save_assigns_ids_from_one() {
        let store = Store::new();
        let first = store.save(Note::new("a"));
        let second = store.save(Note::new("b"));
        assert_eq!(first.id, Some(1));
        assert_eq!(second.id, Some(2));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_save_with_id_replaces() {
        let store = Store::new();
        let mut note = store.save(Note::new("a"));
        note.text = "changed".to_string();
        store.save(note);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(1).unwrap().text, "changed");
    }

    #[test]
    fn test_explicit_id_advances_counter() {
        let store = Store::new();
        store.save(Note {
            id: Some(10),
            text: "imported".to_string(),
        });
        assert_eq!(store.save(Note::new("next")).id, Some(11));
    }

    #[test]
    fn test_failed_update_leaves_entity_unchanged() {
        let store = Store::new();
        store.save(Note::new("original"));

        let result: CareResult<()> = store.update(1, |note| {
            note.text = "half-done".to_string();
            Err(CareError::validation("rejected"))
        });
        assert!(result.is_err());
        assert_eq!(store.get(1).unwrap().text, "original");

        let len = store
            .update(1, |note| {
                note.text = "done".to_string();
                Ok(note.text.len())
            })
            .unwrap();
        assert_eq!(len, 4);
        assert_eq!(store.get(1).unwrap().text, "done");
    }

    #[test]
    fn test_missing_entity_is_not_found() {
        let store: Store<Note> = Store::new();
        assert_eq!(
            store.update(3, |_| Ok(())),
            Err(CareError::not_found("Note", 3))
        );
        assert_eq!(store.require(3), Err(CareError::not_found("Note", 3)));
        assert_eq!(store.remove(3), None);
    }

    #[test]
    fn test_list_and_find_are_ordered_by_id() {
        let store = Store::new();
        for text in ["c", "a", "b", "a"] {
            store.save(Note::new(text));
        }
        let ids: Vec<u64> = store.list().iter().filter_map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        let found: Vec<u64> = store
            .find(|n| n.text == "a")
            .iter()
            .filter_map(|n| n.id)
            .collect();
        assert_eq!(found, vec![2, 4]);

        assert_eq!(store.remove_where(|n| n.text == "a"), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_concurrent_inserts_get_unique_ids() {
        let store = Arc::new(Store::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    (0..50)
                        .map(|i| store.save(Note::new(&format!("{}-{}", t, i))).id.unwrap())
                        .collect::<Vec<u64>>()
                })
            })
            .collect();

        let mut ids: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 400);
        assert_eq!(store.len(), 400);
        assert_eq!(ids.first(), Some(&1));
        assert_eq!(ids.last(), Some(&400));
    }
}
