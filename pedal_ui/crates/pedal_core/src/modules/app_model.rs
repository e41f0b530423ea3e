use crate::modules::alerts::Alerts;
use crate::modules::pedalboard_model::PedalboardModel;
use crate::modules::preset_model::{PresetEditor, PresetModel};
use crate::modules::property_client::PatchPropertyWatcher;
use crate::modules::remote::RemoteService;
use log::info;
use pedal_protocol::{Pedalboard, PresetIndex};
use std::rc::Rc;

/// Whole-state pushes from the engine. Per-instance state changes go
/// through the service's listener table instead.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePush {
    Snapshot {
        presets: PresetIndex,
        pedalboard: Pedalboard,
    },
    Presets(PresetIndex),
    Pedalboard(Pedalboard),
    Alert(String),
}

/// Application state, built once and passed to every component that needs it.
pub struct AppModel {
    pub pedalboard: PedalboardModel,
    pub presets: PresetModel,
    pub alerts: Alerts,
    service: Rc<dyn RemoteService>,
}

impl AppModel {
    pub fn new(service: Rc<dyn RemoteService>) -> Self {
        Self::with_state(service, PresetIndex::default(), Pedalboard::default())
    }

    pub fn with_state(
        service: Rc<dyn RemoteService>,
        presets: PresetIndex,
        pedalboard: Pedalboard,
    ) -> Self {
        Self {
            pedalboard: PedalboardModel::new(pedalboard),
            presets: PresetModel::new(Rc::clone(&service), presets),
            alerts: Alerts::new(),
            service,
        }
    }

    pub fn service(&self) -> &Rc<dyn RemoteService> {
        &self.service
    }

    pub fn apply_push(&self, push: EnginePush) {
        match push {
            EnginePush::Snapshot {
                presets,
                pedalboard,
            } => {
                info!("engine snapshot: {} preset(s)", presets.presets.len());
                self.presets.replace(presets);
                self.pedalboard.replace(pedalboard);
            }
            EnginePush::Presets(presets) => {
                self.presets.replace(presets);
            }
            EnginePush::Pedalboard(pedalboard) => {
                self.pedalboard.replace(pedalboard);
            }
            EnginePush::Alert(message) => {
                self.alerts.show(message);
            }
        }
    }

    pub fn preset_editor(&self) -> PresetEditor {
        PresetEditor::new(self.presets.clone(), self.alerts.clone())
    }

    pub fn property_watcher(&self) -> PatchPropertyWatcher {
        PatchPropertyWatcher::new(Rc::clone(&self.service), self.alerts.clone())
    }
}
