use crate::modules::observable::Observable;
use log::debug;
use pedal_protocol::{ControlValue, InstanceId, Pedalboard, Placement, StateError};
use std::rc::Rc;

/// Owns the live pedalboard. Every successful mutation publishes the new
/// tree with exactly one `set`; a failed one publishes nothing.
#[derive(Clone)]
pub struct PedalboardModel {
    pedalboard: Rc<Observable<Pedalboard>>,
}

impl PedalboardModel {
    pub fn new(pedalboard: Pedalboard) -> Self {
        Self {
            pedalboard: Rc::new(Observable::new(pedalboard)),
        }
    }

    pub fn observable(&self) -> &Rc<Observable<Pedalboard>> {
        &self.pedalboard
    }

    pub fn get(&self) -> Pedalboard {
        self.pedalboard.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&Pedalboard) -> R) -> R {
        self.pedalboard.with(f)
    }

    pub fn can_delete(&self, instance_id: InstanceId) -> bool {
        self.with(|board| board.can_delete(instance_id))
    }

    pub fn insert(
        &self,
        anchor: InstanceId,
        placement: Placement,
    ) -> Result<InstanceId, StateError> {
        self.mutate(|board| board.insert(anchor, placement))
    }

    pub fn append(&self, anchor: InstanceId) -> Result<InstanceId, StateError> {
        self.mutate(|board| board.append(anchor))
    }

    pub fn insert_split(
        &self,
        anchor: InstanceId,
        placement: Placement,
    ) -> Result<InstanceId, StateError> {
        self.mutate(|board| board.insert_split(anchor, placement))
    }

    pub fn delete(&self, instance_id: InstanceId) -> Result<Option<InstanceId>, StateError> {
        self.mutate(|board| board.delete(instance_id))
    }

    pub fn move_item(
        &self,
        instance_id: InstanceId,
        anchor: InstanceId,
        placement: Placement,
    ) -> Result<(), StateError> {
        // dropping a node onto itself changes nothing and publishes nothing
        if instance_id == anchor {
            return self.with(|board| {
                board
                    .get_item(instance_id)
                    .map(|_| ())
                    .ok_or(StateError::InvalidReference(instance_id))
            });
        }
        self.mutate(|board| board.move_item(instance_id, anchor, placement))
    }

    pub fn load_plugin(
        &self,
        instance_id: InstanceId,
        uri: &str,
        plugin_name: &str,
        control_values: Vec<ControlValue>,
    ) -> Result<InstanceId, StateError> {
        self.mutate(|board| board.load_plugin(instance_id, uri, plugin_name, control_values))
    }

    pub fn set_control_value(
        &self,
        instance_id: InstanceId,
        key: &str,
        value: f32,
    ) -> Result<(), StateError> {
        self.mutate(|board| board.set_control_value(instance_id, key, value))
    }

    pub fn set_enabled(&self, instance_id: InstanceId, enabled: bool) -> Result<(), StateError> {
        self.mutate(|board| board.set_enabled(instance_id, enabled))
    }

    pub fn toggle_ab(&self, split_id: InstanceId) -> Result<bool, StateError> {
        self.mutate(|board| board.toggle_ab(split_id))
    }

    /// Adopts a board pushed by the engine. Identical pushes are dropped so
    /// that echoes of our own edits do not re-render every widget.
    pub fn replace(&self, pedalboard: Pedalboard) -> bool {
        let changed = self.pedalboard.set_if_changed(pedalboard);
        debug!("pedalboard push (changed: {changed})");
        changed
    }

    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Pedalboard) -> Result<R, StateError>,
    ) -> Result<R, StateError> {
        let mut next = self.pedalboard.get();
        let result = f(&mut next)?;
        self.pedalboard.set(next);
        Ok(result)
    }
}
