//! Optimistic, single-flight status transitions over an in-memory list.
//!
//! A transition is applied to the list right away, before anything is sent to
//! the persistence endpoint. The full list is snapshotted first and the
//! snapshot is kept under the record id while the call is outstanding; that
//! entry doubles as the "working" marker, so a second transition for the same
//! id is rejected until the first one settles.
//!
//! Several ids may be in flight at once. When one settles, its final value is
//! written into the snapshots of the others, so restoring any snapshot later
//! never brings back a value that was already rolled back, nor drops one that
//! was already confirmed.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard, PoisonError};

use spdlog::warn;

use crate::record::RecordId;

pub trait Keyed {
    fn key(&self) -> &RecordId;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Begin<T> {
    /// Applied locally, waiting for the persistence call
    Started(T),
    /// Another transition for the same id is still outstanding
    Busy,
    NotFound,
}

#[derive(Debug)]
pub struct OptimisticList<T> {
    items: Vec<T>,
    in_flight: HashMap<RecordId, Vec<T>>,
}

impl<T> Default for OptimisticList<T> {
    fn default() -> Self {
        OptimisticList {
            items: vec![],
            in_flight: HashMap::new(),
        }
    }
}

impl<T: Keyed + Clone> OptimisticList<T> {
    pub fn new(items: Vec<T>) -> Self {
        OptimisticList {
            items,
            in_flight: HashMap::new(),
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, key: &RecordId) -> Option<&T> {
        self.items.iter().find(|item| item.key() == key)
    }

    pub fn contains(&self, key: &RecordId) -> bool {
        self.get(key).is_some()
    }

    /// Stored id written as `segment`, as it appears in a url. A numeric id
    /// wins over a text id with the same digits.
    pub fn resolve(&self, segment: &str) -> Option<RecordId> {
        let parsed = RecordId::from_path(segment);
        if self.contains(&parsed) {
            return Some(parsed);
        }
        self.items.iter()
            .map(|item| item.key())
            .find(|key| key.to_string() == segment)
            .cloned()
    }

    pub fn is_working(&self, key: &RecordId) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Appends `item` unless its id is already present.
    pub fn push(&mut self, item: T) -> bool {
        if self.contains(item.key()) {
            return false;
        }
        for snapshot in self.in_flight.values_mut() {
            snapshot.push(item.clone());
        }
        self.items.push(item);
        true
    }

    pub fn begin<F>(&mut self, key: &RecordId, apply: F) -> Begin<T>
        where
            F: FnOnce(&mut T),
    {
        if self.is_working(key) {
            return Begin::Busy;
        }

        let Some(idx) = self.items.iter().position(|item| item.key() == key) else {
            return Begin::NotFound;
        };

        let snapshot = self.items.clone();
        apply(&mut self.items[idx]);
        self.in_flight.insert(key.clone(), snapshot);

        Begin::Started(self.items[idx].clone())
    }

    /// Keeps the optimistic value and releases the marker.
    pub fn commit(&mut self, key: &RecordId) -> Option<T> {
        self.in_flight.remove(key)?;
        let settled = self.get(key).cloned()?;
        self.patch_snapshots(&settled);
        Some(settled)
    }

    /// Restores the list saved when the transition began and releases the
    /// marker. Records with their own transition still outstanding keep
    /// their current value.
    pub fn rollback(&mut self, key: &RecordId) -> Option<T> {
        let mut restored = self.in_flight.remove(key)?;

        for item in restored.iter_mut() {
            if item.key() != key && self.in_flight.contains_key(item.key()) {
                if let Some(current) = self.items.iter().find(|cur| cur.key() == item.key()) {
                    *item = current.clone();
                }
            }
        }

        self.items = restored;
        let settled = self.get(key).cloned()?;
        self.patch_snapshots(&settled);
        Some(settled)
    }

    fn patch_snapshots(&mut self, settled: &T) {
        for snapshot in self.in_flight.values_mut() {
            if let Some(item) = snapshot.iter_mut().find(|item| item.key() == settled.key()) {
                *item = settled.clone();
            }
        }
    }
}

pub(crate) fn lock<S>(state: &Mutex<S>) -> MutexGuard<'_, S> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scoped ownership of a working marker held across an `.await`.
///
/// The marker is released on every exit path: `commit`, `rollback`, or drop.
/// Dropping an unsettled transition (the future driving it was cancelled)
/// rolls it back, as the outcome of the persistence call is unknown.
pub(crate) struct InFlight<'a, S, T>
    where
        S: AsMut<OptimisticList<T>>,
        T: Keyed + Clone,
{
    state: &'a Mutex<S>,
    key: RecordId,
    settled: bool,
    _item: PhantomData<fn() -> T>,
}

impl<'a, S, T> InFlight<'a, S, T>
    where
        S: AsMut<OptimisticList<T>>,
        T: Keyed + Clone,
{
    pub(crate) fn new(state: &'a Mutex<S>, key: RecordId) -> Self {
        InFlight {
            state,
            key,
            settled: false,
            _item: PhantomData,
        }
    }

    pub(crate) fn commit(mut self) -> Option<T> {
        self.settled = true;
        lock(self.state).as_mut().commit(&self.key)
    }

    pub(crate) fn rollback(mut self) -> Option<T> {
        self.settled = true;
        lock(self.state).as_mut().rollback(&self.key)
    }
}

impl<S, T> Drop for InFlight<'_, S, T>
    where
        S: AsMut<OptimisticList<T>>,
        T: Keyed + Clone,
{
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!("Transition for {} dropped before settling, rolling back", self.key);
        lock(self.state).as_mut().rollback(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: RecordId,
        value: u32,
    }

    impl Keyed for Item {
        fn key(&self) -> &RecordId {
            &self.id
        }
    }

    fn item(id: i64, value: u32) -> Item {
        Item { id: RecordId::Num(id), value }
    }

    fn values(list: &OptimisticList<Item>) -> Vec<u32> {
        list.items().iter().map(|i| i.value).collect()
    }

    #[test]
    fn test_begin_applies_and_marks_working() {
        let mut list = OptimisticList::new(vec![item(1, 0), item(2, 0)]);
        let id = RecordId::Num(1);

        assert_eq!(list.begin(&id, |i| i.value = 5), Begin::Started(item(1, 5)));
        assert!(list.is_working(&id));
        assert_eq!(values(&list), vec![5, 0]);

        assert_eq!(list.begin(&id, |i| i.value = 9), Begin::Busy);
        assert_eq!(values(&list), vec![5, 0]);

        assert_eq!(list.commit(&id), Some(item(1, 5)));
        assert!(!list.is_working(&id));
    }

    #[test]
    fn test_resolve_matches_stored_ids() {
        let list = OptimisticList::new(vec![
            Item { id: RecordId::Text("7".to_string()), value: 0 },
            Item { id: RecordId::Num(8), value: 0 },
            Item { id: RecordId::Text("8".to_string()), value: 0 },
            Item { id: RecordId::Text("abc".to_string()), value: 0 },
        ]);
        assert_eq!(list.resolve("7"), Some(RecordId::Text("7".to_string())));
        assert_eq!(list.resolve("8"), Some(RecordId::Num(8)));
        assert_eq!(list.resolve("abc"), Some(RecordId::Text("abc".to_string())));
        assert_eq!(list.resolve("9"), None);
    }

    #[test]
    fn test_unknown_id_never_marks() {
        let mut list = OptimisticList::new(vec![item(1, 0)]);
        let id = RecordId::Num(3);
        assert_eq!(list.begin(&id, |i| i.value = 5), Begin::NotFound);
        assert!(!list.is_working(&id));
        assert!(list.in_flight.is_empty());
    }

    #[test]
    fn test_rollback_restores_snapshot() {
        let mut list = OptimisticList::new(vec![item(1, 0), item(2, 7)]);
        let before = list.items().to_vec();
        let id = RecordId::Num(2);

        list.begin(&id, |i| i.value = 8);
        assert_eq!(list.rollback(&id), Some(item(2, 7)));
        assert_eq!(list.items(), before.as_slice());
        assert!(!list.is_working(&id));
    }

    #[test]
    fn test_settle_without_marker_is_noop() {
        let mut list = OptimisticList::new(vec![item(1, 0)]);
        let id = RecordId::Num(1);
        assert_eq!(list.commit(&id), None);
        assert_eq!(list.rollback(&id), None);
        assert_eq!(values(&list), vec![0]);
    }

    #[test]
    fn test_rollback_keeps_other_in_flight_value() {
        let mut list = OptimisticList::new(vec![item(1, 0), item(2, 0)]);
        let (a, b) = (RecordId::Num(1), RecordId::Num(2));

        list.begin(&a, |i| i.value = 1);
        list.begin(&b, |i| i.value = 2);

        list.rollback(&a);
        assert_eq!(values(&list), vec![0, 2]);

        // b's snapshot was taken while a was optimistic; it must not bring a back
        list.rollback(&b);
        assert_eq!(values(&list), vec![0, 0]);
    }

    #[test]
    fn test_rollback_keeps_committed_value() {
        let mut list = OptimisticList::new(vec![item(1, 0), item(2, 0)]);
        let (a, b) = (RecordId::Num(1), RecordId::Num(2));

        list.begin(&a, |i| i.value = 1);
        list.begin(&b, |i| i.value = 2);

        list.commit(&b);
        list.rollback(&a);
        assert_eq!(values(&list), vec![0, 2]);
    }

    #[test]
    fn test_push_rejects_duplicates() {
        let mut list = OptimisticList::new(vec![item(1, 0)]);
        assert!(!list.push(item(1, 3)));
        assert!(list.push(item(2, 3)));

        let id = RecordId::Num(1);
        list.begin(&id, |i| i.value = 4);
        assert!(list.push(item(3, 3)));
        list.rollback(&id);
        assert_eq!(values(&list), vec![0, 3, 3]);
    }

    struct Holder(OptimisticList<Item>);

    impl AsMut<OptimisticList<Item>> for Holder {
        fn as_mut(&mut self) -> &mut OptimisticList<Item> {
            &mut self.0
        }
    }

    #[test]
    fn test_dropped_guard_rolls_back() {
        let state = Mutex::new(Holder(OptimisticList::new(vec![item(1, 0)])));
        let id = RecordId::Num(1);

        lock(&state).0.begin(&id, |i| i.value = 3);
        {
            let _guard: InFlight<'_, Holder, Item> = InFlight::new(&state, id.clone());
        }

        let holder = lock(&state);
        assert!(!holder.0.is_working(&id));
        assert_eq!(values(&holder.0), vec![0]);
    }

    #[test]
    fn test_committed_guard_keeps_value() {
        let state = Mutex::new(Holder(OptimisticList::new(vec![item(1, 0)])));
        let id = RecordId::Num(1);

        lock(&state).0.begin(&id, |i| i.value = 3);
        let guard: InFlight<'_, Holder, Item> = InFlight::new(&state, id.clone());
        assert_eq!(guard.commit(), Some(item(1, 3)));

        let holder = lock(&state);
        assert!(!holder.0.is_working(&id));
        assert_eq!(values(&holder.0), vec![3]);
    }
}
