use crate::modules::observable::Observable;
use log::warn;
use serde::Serialize;
use std::cell::Cell;
use std::rc::Rc;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub id: u64,
    pub message: String,
}

/// Dismissible user-facing error messages. Clones share the same queue.
#[derive(Clone, Default)]
pub struct Alerts {
    queue: Rc<Observable<Vec<Alert>>>,
    next_id: Rc<Cell<u64>>,
}

impl Alerts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observable(&self) -> &Rc<Observable<Vec<Alert>>> {
        &self.queue
    }

    pub fn show(&self, message: impl Into<String>) -> u64 {
        let message = message.into();
        warn!("{message}");

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let mut alerts = self.queue.get();
        alerts.push(Alert { id, message });
        self.queue.set(alerts);
        id
    }

    pub fn dismiss(&self, id: u64) {
        let mut alerts = self.queue.get();
        alerts.retain(|a| a.id != id);
        self.queue.set_if_changed(alerts);
    }

    pub fn current(&self) -> Vec<Alert> {
        self.queue.get()
    }
}
