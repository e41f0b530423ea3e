#![allow(dead_code)]

use futures_util::future::{self, FutureExt};
use pedal_core::error::RemoteError;
use pedal_core::protocol::{
    ErrorCode, FileProperty, InstanceId, PresetIndex, PresetIndexEntry, TypedValue,
};
use pedal_core::remote::{
    ListenHandle, RemoteFuture, RemoteService, StateChangedCallback, StateChangedListeners,
};
use std::cell::{Cell, RefCell};
use tokio::sync::oneshot;

pub const IMPULSE: &str = "urn:test:reverb#impulseFile";

pub struct PendingFetch {
    pub instance_id: InstanceId,
    pub property_uri: String,
    reply: oneshot::Sender<Result<TypedValue, RemoteError>>,
}

impl PendingFetch {
    pub fn resolve(self, value: TypedValue) {
        let _ = self.reply.send(Ok(value));
    }

    pub fn fail(self, error: RemoteError) {
        let _ = self.reply.send(Err(error));
    }
}

/// In-memory engine. Property reads stay pending until the test resolves
/// them; preset operations answer immediately.
#[derive(Default)]
pub struct ScriptedService {
    pub listeners: StateChangedListeners,
    pub fetches: RefCell<Vec<PendingFetch>>,
    pub calls: RefCell<Vec<String>>,
    pub fail_preset_ops: Cell<bool>,
    pub presets: RefCell<PresetIndex>,
}

impl ScriptedService {
    pub fn with_presets(presets: PresetIndex) -> Self {
        Self {
            presets: RefCell::new(presets),
            ..Self::default()
        }
    }

    pub fn take_fetch(&self) -> PendingFetch {
        let mut fetches = self.fetches.borrow_mut();
        assert!(!fetches.is_empty(), "no pending fetch");
        fetches.remove(0)
    }

    pub fn pending_fetches(&self) -> usize {
        self.fetches.borrow().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn preset_op<T: 'static>(
        &self,
        op: impl FnOnce(&mut PresetIndex) -> Option<T>,
    ) -> RemoteFuture<T> {
        let result = if self.fail_preset_ops.get() {
            Err(RemoteError::Engine {
                code: ErrorCode::InvalidValue,
                msg: "rejected by test".to_string(),
            })
        } else {
            op(&mut *self.presets.borrow_mut()).ok_or(RemoteError::Engine {
                code: ErrorCode::NotFound,
                msg: "no such preset".to_string(),
            })
        };
        future::ready(result).boxed_local()
    }
}

impl RemoteService for ScriptedService {
    fn get_patch_property(
        &self,
        instance_id: InstanceId,
        property_uri: &str,
    ) -> RemoteFuture<TypedValue> {
        let (reply, rx) = oneshot::channel();
        self.fetches.borrow_mut().push(PendingFetch {
            instance_id,
            property_uri: property_uri.to_string(),
            reply,
        });
        async move { rx.await.unwrap_or(Err(RemoteError::Disconnected)) }.boxed_local()
    }

    fn set_patch_property(
        &self,
        instance_id: InstanceId,
        property_uri: &str,
        value: TypedValue,
    ) -> RemoteFuture<()> {
        self.record(format!("set {instance_id} {property_uri} {value:?}"));
        future::ready(Ok(())).boxed_local()
    }

    fn request_file_list(&self, file_property: &FileProperty) -> RemoteFuture<Vec<String>> {
        self.record(format!("files {}", file_property.directory));
        future::ready(Ok(vec![format!("{}/Hall.wav", file_property.directory)])).boxed_local()
    }

    fn add_state_changed_listener(
        &self,
        instance_id: InstanceId,
        callback: StateChangedCallback,
    ) -> ListenHandle {
        self.listeners.add(instance_id, callback)
    }

    fn remove_state_changed_listener(&self, handle: ListenHandle) -> bool {
        self.listeners.remove(handle)
    }

    fn update_presets(&self, presets: &PresetIndex) -> RemoteFuture<()> {
        self.record("update_presets".to_string());
        let presets = presets.clone();
        self.preset_op(move |current| {
            let selected = current.selected_instance_id;
            *current = presets;
            current.selected_instance_id = selected;
            Some(())
        })
    }

    fn delete_preset_item(&self, instance_id: InstanceId) -> RemoteFuture<InstanceId> {
        self.record(format!("delete {instance_id}"));
        self.preset_op(move |current| {
            let pos = current.index_of(instance_id)?;
            current.presets.remove(pos);
            let next = current.presets.get(pos).or(current.presets.last())?;
            Some(next.instance_id)
        })
    }

    fn rename_preset_item(&self, instance_id: InstanceId, name: &str) -> RemoteFuture<()> {
        self.record(format!("rename {instance_id} {name}"));
        let name = name.to_string();
        self.preset_op(move |current| {
            let entry = current
                .presets
                .iter_mut()
                .find(|p| p.instance_id == instance_id)?;
            entry.name = name;
            Some(())
        })
    }

    fn duplicate_preset(&self, instance_id: InstanceId) -> RemoteFuture<InstanceId> {
        self.record(format!("duplicate {instance_id}"));
        self.preset_op(move |current| {
            let pos = current.index_of(instance_id)?;
            let new_id = current.presets.iter().map(|p| p.instance_id).max()? + 1;
            let name = format!("{} (copy)", current.presets[pos].name);
            current.presets.insert(
                pos + 1,
                PresetIndexEntry {
                    instance_id: new_id,
                    name,
                },
            );
            Some(new_id)
        })
    }

    fn load_preset(&self, instance_id: InstanceId) -> RemoteFuture<()> {
        self.record(format!("load {instance_id}"));
        self.preset_op(move |current| {
            current.get_item(instance_id)?;
            current.selected_instance_id = Some(instance_id);
            Some(())
        })
    }
}

pub fn presets(names: &[&str], selected: Option<InstanceId>) -> PresetIndex {
    PresetIndex {
        selected_instance_id: selected,
        presets: names
            .iter()
            .zip(1..)
            .map(|(name, instance_id)| PresetIndexEntry {
                instance_id,
                name: name.to_string(),
            })
            .collect(),
    }
}

pub fn names(index: &PresetIndex) -> Vec<String> {
    index.presets.iter().map(|p| p.name.clone()).collect()
}

/// Lets spawned local tasks run until they block again.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
