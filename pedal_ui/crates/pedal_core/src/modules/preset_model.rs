use crate::modules::alerts::Alerts;
use crate::modules::drag::DragController;
use crate::modules::error::{ModelError, RemoteError};
use crate::modules::observable::{Observable, OnChangedHandler};
use crate::modules::remote::RemoteService;
use crate::modules::subscriptions::SubscriptionRegistry;
use log::debug;
use pedal_protocol::{InstanceId, PresetIndex, StateError};
use std::rc::{Rc, Weak};

/// The engine's preset list as last seen by this client.
#[derive(Clone)]
pub struct PresetModel {
    presets: Rc<Observable<PresetIndex>>,
    service: Rc<dyn RemoteService>,
}

impl PresetModel {
    pub fn new(service: Rc<dyn RemoteService>, presets: PresetIndex) -> Self {
        Self {
            presets: Rc::new(Observable::new(presets)),
            service,
        }
    }

    pub fn observable(&self) -> &Rc<Observable<PresetIndex>> {
        &self.presets
    }

    pub fn get(&self) -> PresetIndex {
        self.presets.get()
    }

    /// Adopts an index pushed by the engine; identical pushes stay silent.
    pub fn replace(&self, presets: PresetIndex) -> bool {
        self.presets.set_if_changed(presets)
    }

    /// Publishes `presets` locally right away, then sends the whole index.
    /// On failure local state is left as is; the next push corrects it.
    pub async fn update_presets(&self, presets: PresetIndex) -> Result<(), RemoteError> {
        let request = self.service.update_presets(&presets);
        self.presets.set_if_changed(presets);
        request.await
    }

    pub async fn load_preset(&self, instance_id: InstanceId) -> Result<(), ModelError> {
        if self.presets.with(|p| p.get_item(instance_id).is_none()) {
            return Err(StateError::InvalidReference(instance_id).into());
        }
        self.service.load_preset(instance_id).await?;
        let mut presets = self.presets.get();
        presets.selected_instance_id = Some(instance_id);
        self.presets.set_if_changed(presets);
        Ok(())
    }

    pub async fn delete_preset_item(&self, instance_id: InstanceId) -> Result<InstanceId, RemoteError> {
        self.service.delete_preset_item(instance_id).await
    }

    pub async fn rename_preset_item(
        &self,
        instance_id: InstanceId,
        name: &str,
    ) -> Result<(), RemoteError> {
        self.service.rename_preset_item(instance_id, name).await
    }

    pub async fn duplicate_preset(&self, instance_id: InstanceId) -> Result<InstanceId, RemoteError> {
        self.service.duplicate_preset(instance_id).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorState {
    pub presets: PresetIndex,
    /// The entry the editor acts on; independent of the engine's loaded preset.
    pub selected_item: Option<InstanceId>,
    pub edit_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemClick {
    /// Edit mode: the entry became the editor selection.
    Selected(InstanceId),
    /// Normal mode: the preset is being loaded and the editor can close.
    Loaded(InstanceId),
}

struct EditorInner {
    model: PresetModel,
    alerts: Alerts,
    state: Rc<Observable<EditorState>>,
    subscriptions: SubscriptionRegistry,
}

/// Working copy of the preset list behind the preset editor. Holds its own
/// clone of the index so a drag in progress is not disturbed by echoes of
/// its own updates.
///
/// Operations that talk to the engine in the background use
/// `tokio::task::spawn_local` and must run inside a `LocalSet`.
#[derive(Clone)]
pub struct PresetEditor {
    inner: Rc<EditorInner>,
}

impl PresetEditor {
    pub fn new(model: PresetModel, alerts: Alerts) -> Self {
        let presets = model.get();
        let state = EditorState {
            selected_item: presets.selected_instance_id,
            presets,
            edit_mode: false,
        };
        Self {
            inner: Rc::new(EditorInner {
                model,
                alerts,
                state: Rc::new(Observable::new(state)),
                subscriptions: SubscriptionRegistry::new(),
            }),
        }
    }

    pub fn attach(&self) {
        let weak: Weak<EditorInner> = Rc::downgrade(&self.inner);
        let handler: OnChangedHandler<PresetIndex> = Rc::new(move |incoming: &PresetIndex| {
            if let Some(inner) = weak.upgrade() {
                inner.reconcile(incoming);
            }
        });
        self.inner
            .subscriptions
            .subscribe(self.inner.model.observable(), handler);
        self.inner.reconcile(&self.inner.model.get());
    }

    pub fn detach(&self) {
        self.inner.subscriptions.unsubscribe_all();
    }

    pub fn observable(&self) -> &Rc<Observable<EditorState>> {
        &self.inner.state
    }

    pub fn state(&self) -> EditorState {
        self.inner.state.get()
    }

    pub fn selected_item(&self) -> Option<InstanceId> {
        self.inner.state.with(|s| s.selected_item)
    }

    /// Position to highlight: the editor selection in edit mode, otherwise
    /// the preset the engine has loaded.
    pub fn selected_index(&self) -> Option<usize> {
        self.inner.state.with(|s| {
            let highlighted = if s.edit_mode {
                s.selected_item
            } else {
                s.presets.selected_instance_id
            };
            highlighted.and_then(|id| s.presets.index_of(id))
        })
    }

    pub fn is_edit_mode(&self) -> bool {
        self.inner.state.with(|s| s.edit_mode)
    }

    pub fn set_edit_mode(&self, edit_mode: bool) {
        self.update(|s| s.edit_mode = edit_mode);
    }

    pub fn toggle_edit_mode(&self) {
        self.update(|s| s.edit_mode = !s.edit_mode);
    }

    pub fn select(&self, instance_id: InstanceId) {
        self.update(|s| s.selected_item = Some(instance_id));
    }

    pub fn handle_item_click(&self, instance_id: InstanceId) -> ItemClick {
        if self.is_edit_mode() {
            self.select(instance_id);
            return ItemClick::Selected(instance_id);
        }

        let model = self.inner.model.clone();
        let alerts = self.inner.alerts.clone();
        tokio::task::spawn_local(async move {
            if let Err(e) = model.load_preset(instance_id).await {
                alerts.show(format!("Unable to load preset: {e}"));
            }
        });
        ItemClick::Loaded(instance_id)
    }

    /// Reorders the working copy immediately, selects the moved entry and
    /// sends the new order to the engine in the background.
    pub fn move_element(&self, from: usize, to: usize) -> Result<(), StateError> {
        let mut presets = self.inner.state.with(|s| s.presets.clone());
        presets.move_preset(from, to)?;
        let moved = presets.presets[to].instance_id;

        self.update(|s| {
            s.presets = presets.clone();
            s.selected_item = Some(moved);
        });

        let model = self.inner.model.clone();
        let alerts = self.inner.alerts.clone();
        tokio::task::spawn_local(async move {
            if let Err(e) = model.update_presets(presets).await {
                alerts.show(format!("Unable to reorder presets: {e}"));
            }
        });
        Ok(())
    }

    /// Drag controller for the preset list: a drop reorders through
    /// `move_element`, a long press toggles edit mode.
    pub fn drag_controller(&self, extents: Vec<f64>) -> DragController {
        let on_move = Rc::downgrade(&self.inner);
        let on_long_press = Rc::downgrade(&self.inner);
        DragController::new(
            extents,
            move |from, to| {
                let Some(inner) = on_move.upgrade() else { return };
                let editor = PresetEditor { inner };
                if let Err(e) = editor.move_element(from, to) {
                    editor.inner.alerts.show(e.to_string());
                }
            },
            move |_| {
                if let Some(inner) = on_long_press.upgrade() {
                    inner.update(|s| s.edit_mode = !s.edit_mode);
                }
            },
        )
    }

    pub async fn rename_selected(&self, name: &str) -> Result<(), ModelError> {
        let instance_id = self.require_selection()?;
        self.surface(self.inner.model.rename_preset_item(instance_id, name).await)
    }

    /// On success the copy becomes the editor selection.
    pub async fn duplicate_selected(&self) -> Result<InstanceId, ModelError> {
        let instance_id = self.require_selection()?;
        let copy = self.surface(self.inner.model.duplicate_preset(instance_id).await)?;
        self.select(copy);
        Ok(copy)
    }

    /// On success the engine's replacement selection becomes the editor selection.
    pub async fn delete_selected(&self) -> Result<InstanceId, ModelError> {
        let instance_id = self.require_selection()?;
        let next = self.surface(self.inner.model.delete_preset_item(instance_id).await)?;
        self.select(next);
        Ok(next)
    }

    fn require_selection(&self) -> Result<InstanceId, StateError> {
        self.inner.state.with(|s| {
            s.selected_item
                .filter(|id| s.presets.get_item(*id).is_some())
                .ok_or(StateError::InvariantViolation("no preset selected"))
        })
    }

    fn surface<T>(&self, result: Result<T, RemoteError>) -> Result<T, ModelError> {
        result.map_err(|e| {
            self.inner.alerts.show(e.to_string());
            ModelError::from(e)
        })
    }

    fn update(&self, f: impl FnOnce(&mut EditorState)) {
        self.inner.update(f);
    }
}

impl EditorInner {
    fn update(&self, f: impl FnOnce(&mut EditorState)) {
        let mut next = self.state.get();
        f(&mut next);
        self.state.set_if_changed(next);
    }

    /// Ignores pushes that match the working copy apart from selection, so
    /// an echo of our own reorder does not reset the list under the user.
    fn reconcile(&self, incoming: &PresetIndex) {
        self.update(|state| {
            if incoming.are_equal(&state.presets, false) {
                state.presets.selected_instance_id = incoming.selected_instance_id;
                return;
            }
            debug!("adopting preset index from engine ({} entries)", incoming.presets.len());
            let still_present = state
                .selected_item
                .is_some_and(|id| incoming.get_item(id).is_some());
            state.presets = incoming.clone();
            if !still_present {
                state.selected_item = incoming.selected_instance_id;
            }
        });
    }
}
