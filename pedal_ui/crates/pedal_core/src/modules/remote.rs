use crate::modules::error::RemoteError;
use futures_util::future::LocalBoxFuture;
use log::trace;
use pedal_protocol::{FileProperty, InstanceId, PresetIndex, TypedValue};
use std::cell::RefCell;
use std::rc::Rc;

pub type RemoteFuture<T> = LocalBoxFuture<'static, Result<T, RemoteError>>;
pub type StateChangedCallback = Rc<dyn Fn(InstanceId)>;

/// One live subscription to state-changed pushes for an instance. The only
/// way to cancel it is to hand it back to the service that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenHandle {
    id: u64,
    instance_id: InstanceId,
}

impl ListenHandle {
    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }
}

/// The engine as seen from the UI thread. Futures are `'static` so callers
/// can hand them to `spawn_local` without holding borrows.
pub trait RemoteService {
    fn get_patch_property(&self, instance_id: InstanceId, property_uri: &str)
        -> RemoteFuture<TypedValue>;

    fn set_patch_property(
        &self,
        instance_id: InstanceId,
        property_uri: &str,
        value: TypedValue,
    ) -> RemoteFuture<()>;

    fn request_file_list(&self, file_property: &FileProperty) -> RemoteFuture<Vec<String>>;

    fn add_state_changed_listener(
        &self,
        instance_id: InstanceId,
        callback: StateChangedCallback,
    ) -> ListenHandle;

    /// Returns false when the handle was already released.
    fn remove_state_changed_listener(&self, handle: ListenHandle) -> bool;

    fn update_presets(&self, presets: &PresetIndex) -> RemoteFuture<()>;

    /// Resolves to the preset that should be selected afterwards.
    fn delete_preset_item(&self, instance_id: InstanceId) -> RemoteFuture<InstanceId>;

    fn rename_preset_item(&self, instance_id: InstanceId, name: &str) -> RemoteFuture<()>;

    /// Resolves to the id of the copy.
    fn duplicate_preset(&self, instance_id: InstanceId) -> RemoteFuture<InstanceId>;

    fn load_preset(&self, instance_id: InstanceId) -> RemoteFuture<()>;
}

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    entries: Vec<(ListenHandle, StateChangedCallback)>,
}

/// Bookkeeping for state-changed listeners, shared by `RemoteService`
/// implementations.
#[derive(Clone, Default)]
pub struct StateChangedListeners {
    inner: Rc<RefCell<ListenerTable>>,
}

impl StateChangedListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, instance_id: InstanceId, callback: StateChangedCallback) -> ListenHandle {
        let mut table = self.inner.borrow_mut();
        let handle = ListenHandle {
            id: table.next_id,
            instance_id,
        };
        table.next_id += 1;
        table.entries.push((handle, callback));
        handle
    }

    pub fn remove(&self, handle: ListenHandle) -> bool {
        // The callback is dropped after the table borrow ends.
        let removed = {
            let mut table = self.inner.borrow_mut();
            table
                .entries
                .iter()
                .position(|(h, _)| *h == handle)
                .map(|pos| table.entries.remove(pos))
        };
        removed.is_some()
    }

    /// Calls every listener for `instance_id`. Listeners released by an
    /// earlier callback in the same pass are skipped.
    pub fn notify(&self, instance_id: InstanceId) {
        let matching: Vec<(ListenHandle, StateChangedCallback)> = self
            .inner
            .borrow()
            .entries
            .iter()
            .filter(|(h, _)| h.instance_id == instance_id)
            .cloned()
            .collect();
        trace!("state changed for {instance_id}: {} listener(s)", matching.len());

        for (handle, callback) in matching {
            if !self.contains(handle) {
                continue;
            }
            callback(instance_id);
        }
    }

    pub fn contains(&self, handle: ListenHandle) -> bool {
        self.inner.borrow().entries.iter().any(|(h, _)| *h == handle)
    }

    pub fn count_for(&self, instance_id: InstanceId) -> usize {
        self.inner
            .borrow()
            .entries
            .iter()
            .filter(|(h, _)| h.instance_id == instance_id)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn notify_targets_instance_and_respects_removal() {
        let listeners = StateChangedListeners::new();
        let hits = Rc::new(Cell::new(0));

        let counter = Rc::clone(&hits);
        let five = listeners.add(5, Rc::new(move |_: InstanceId| counter.set(counter.get() + 1)));
        let counter = Rc::clone(&hits);
        listeners.add(6, Rc::new(move |_: InstanceId| counter.set(counter.get() + 10)));

        listeners.notify(5);
        assert_eq!(hits.get(), 1);

        assert!(listeners.remove(five));
        assert!(!listeners.remove(five));
        listeners.notify(5);
        assert_eq!(hits.get(), 1);
        assert_eq!(listeners.count_for(6), 1);
    }
}
