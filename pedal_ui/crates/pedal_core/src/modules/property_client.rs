use crate::modules::alerts::Alerts;
use crate::modules::error::RemoteError;
use crate::modules::observable::Observable;
use crate::modules::remote::{ListenHandle, RemoteService, StateChangedCallback};
use log::{debug, trace};
use pedal_protocol::{FileProperty, InstanceId, TypedValue};
use std::cell::RefCell;
use std::path::Path;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyTarget {
    pub instance_id: InstanceId,
    pub property_uri: String,
}

#[derive(Default)]
struct WatchState {
    target: Option<PropertyTarget>,
    listen_handle: Option<ListenHandle>,
    /// Bumped by every fetch and every teardown; a response is applied only
    /// if its fetch is still the latest one.
    generation: u64,
}

struct WatcherInner {
    service: Rc<dyn RemoteService>,
    alerts: Alerts,
    state: RefCell<WatchState>,
    value: Rc<Observable<Option<TypedValue>>>,
}

/// Widget-side cache of one patch property.
///
/// While subscribed it fetches the value once, then refetches whenever the
/// engine reports a state change for the instance. Fetches are
/// `spawn_local`ed, so this must be used inside a `LocalSet`.
pub struct PatchPropertyWatcher {
    inner: Rc<WatcherInner>,
}

impl PatchPropertyWatcher {
    pub fn new(service: Rc<dyn RemoteService>, alerts: Alerts) -> Self {
        Self {
            inner: Rc::new(WatcherInner {
                service,
                alerts,
                state: RefCell::new(WatchState::default()),
                value: Rc::new(Observable::new(None)),
            }),
        }
    }

    pub fn value(&self) -> &Rc<Observable<Option<TypedValue>>> {
        &self.inner.value
    }

    pub fn target(&self) -> Option<PropertyTarget> {
        self.inner.state.borrow().target.clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.state.borrow().listen_handle.is_some()
    }

    /// Path shown for a `Path` value, empty for anything else.
    pub fn path(&self) -> String {
        self.inner.value.with(|v| {
            v.as_ref()
                .and_then(TypedValue::as_path)
                .unwrap_or_default()
                .to_string()
        })
    }

    /// Starts watching `(instance_id, property_uri)`. Watching a different
    /// pair first tears the old subscription down and clears the value;
    /// re-subscribing to the current pair is a no-op.
    pub fn subscribe(&self, instance_id: InstanceId, property_uri: &str) {
        let target = PropertyTarget {
            instance_id,
            property_uri: property_uri.to_string(),
        };
        {
            let state = self.inner.state.borrow();
            if state.listen_handle.is_some() && state.target.as_ref() == Some(&target) {
                return;
            }
        }

        self.unsubscribe();
        self.inner.value.set_if_changed(None);

        let weak = Rc::downgrade(&self.inner);
        let callback: StateChangedCallback = Rc::new(move |changed: InstanceId| {
            if let Some(inner) = weak.upgrade() {
                trace!("state changed for {changed}, refetching");
                WatcherInner::refresh(&inner);
            }
        });
        let handle = self
            .inner
            .service
            .add_state_changed_listener(instance_id, callback);
        debug!("watching {} on {instance_id}", target.property_uri);

        {
            let mut state = self.inner.state.borrow_mut();
            state.target = Some(target);
            state.listen_handle = Some(handle);
        }
        WatcherInner::refresh(&self.inner);
    }

    /// Cancels the listen handle; responses still in flight are discarded.
    pub fn unsubscribe(&self) {
        self.inner.teardown();
    }

    /// Writes a new value. The engine answers with a state-changed push,
    /// which refreshes the cached value.
    pub fn set_value(&self, value: TypedValue) {
        let Some(target) = self.target() else {
            debug!("set_value without a target ignored");
            return;
        };
        let request =
            self.inner
                .service
                .set_patch_property(target.instance_id, &target.property_uri, value);
        let alerts = self.inner.alerts.clone();
        tokio::task::spawn_local(async move {
            if let Err(e) = request.await {
                alerts.show(format!("Unable to set {}: {e}", target.property_uri));
            }
        });
    }
}

impl Drop for PatchPropertyWatcher {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl WatcherInner {
    fn teardown(&self) {
        let handle = {
            let mut state = self.state.borrow_mut();
            state.generation += 1;
            state.target = None;
            state.listen_handle.take()
        };
        if let Some(handle) = handle {
            self.service.remove_state_changed_listener(handle);
        }
    }

    fn refresh(inner: &Rc<WatcherInner>) {
        let (target, generation) = {
            let mut state = inner.state.borrow_mut();
            let Some(target) = state.target.clone() else {
                return;
            };
            state.generation += 1;
            (target, state.generation)
        };

        let request = inner
            .service
            .get_patch_property(target.instance_id, &target.property_uri);
        let weak: Weak<WatcherInner> = Rc::downgrade(inner);
        tokio::task::spawn_local(async move {
            let result = request.await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.state.borrow().generation != generation {
                trace!(
                    "discarding stale value of {} for {}",
                    target.property_uri,
                    target.instance_id
                );
                return;
            }
            inner.apply(&target, result);
        });
    }

    fn apply(&self, target: &PropertyTarget, result: Result<TypedValue, RemoteError>) {
        match result {
            Ok(value) => {
                self.value.set_if_changed(Some(value));
            }
            Err(e) => {
                self.alerts.show(format!(
                    "Unable to read {} of {}: {e}",
                    target.property_uri, target.instance_id
                ));
            }
        }
    }
}

/// Fetches the files a file property may choose from.
pub async fn request_file_list(
    service: &dyn RemoteService,
    file_property: &FileProperty,
) -> Result<Vec<String>, RemoteError> {
    service.request_file_list(file_property).await
}

/// File name without directory or extension, as shown on a file control.
pub fn file_name_only(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
