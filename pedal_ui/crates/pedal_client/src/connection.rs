use crate::config::ClientConfig;
use crate::ws_actor::{self, ActorCommand, ConnectionStatus, EngineEvent};
use futures_util::future::FutureExt;
use pedal_core::app_model::{AppModel, EnginePush};
use pedal_core::error::RemoteError;
use pedal_core::observable::Observable;
use pedal_core::remote::{
    ListenHandle, RemoteFuture, RemoteService, StateChangedCallback, StateChangedListeners,
};
use pedal_protocol::{ClientCommand, FileProperty, InstanceId, PresetIndex, ReplyPayload, TypedValue};
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

const COMMAND_CAP: usize = 64;

/// `RemoteService` backed by the websocket actor.
///
/// Lives on the UI thread; the actor itself is a regular tokio task.
pub struct EngineConnection {
    tx: mpsc::Sender<ActorCommand>,
    listeners: StateChangedListeners,
    status: Rc<Observable<ConnectionStatus>>,
    request_timeout: Duration,
}

/// Starts the actor and returns the UI-side handle plus the event stream
/// that must be pumped for pushes to reach the models.
pub fn spawn(config: ClientConfig) -> (Rc<EngineConnection>, EngineEvents) {
    let (tx, rx) = mpsc::channel(COMMAND_CAP);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let request_timeout = config.request_timeout;
    tokio::spawn(ws_actor::run(config, rx, event_tx));

    let connection = Rc::new(EngineConnection {
        tx,
        listeners: StateChangedListeners::new(),
        status: Rc::new(Observable::new(ConnectionStatus::Connecting)),
        request_timeout,
    });
    (connection, EngineEvents { rx: event_rx })
}

impl EngineConnection {
    pub fn listeners(&self) -> &StateChangedListeners {
        &self.listeners
    }

    pub fn status(&self) -> &Rc<Observable<ConnectionStatus>> {
        &self.status
    }

    pub fn connect(&self) {
        if self.tx.try_send(ActorCommand::Connect).is_err() {
            warn!("connect request dropped");
        }
    }

    pub fn disconnect(&self) {
        if self.tx.try_send(ActorCommand::Disconnect).is_err() {
            warn!("disconnect request dropped");
        }
    }

    fn request(&self, command: ClientCommand) -> RemoteFuture<ReplyPayload> {
        let tx = self.tx.clone();
        let timeout = self.request_timeout;
        async move {
            let name = command.name();
            let (reply, rx) = oneshot::channel();
            tx.send(ActorCommand::Request { command, reply })
                .await
                .map_err(|_| RemoteError::Disconnected)?;
            match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(RemoteError::Disconnected),
                Err(_) => {
                    warn!("{name} timed out after {timeout:?}");
                    Err(RemoteError::Timeout)
                }
            }
        }
        .boxed_local()
    }

    fn call<T: 'static>(
        &self,
        command: ClientCommand,
        extract: fn(ReplyPayload) -> Option<T>,
    ) -> RemoteFuture<T> {
        let name = command.name();
        let request = self.request(command);
        async move {
            let payload = request.await?;
            extract(payload).ok_or(RemoteError::UnexpectedReply(name))
        }
        .boxed_local()
    }
}

fn done(payload: ReplyPayload) -> Option<()> {
    matches!(payload, ReplyPayload::Done).then_some(())
}

fn value(payload: ReplyPayload) -> Option<TypedValue> {
    match payload {
        ReplyPayload::Value { value } => Some(value),
        _ => None,
    }
}

fn files(payload: ReplyPayload) -> Option<Vec<String>> {
    match payload {
        ReplyPayload::Files { files } => Some(files),
        _ => None,
    }
}

fn instance_id(payload: ReplyPayload) -> Option<InstanceId> {
    match payload {
        ReplyPayload::InstanceId { instance_id } => Some(instance_id),
        _ => None,
    }
}

impl RemoteService for EngineConnection {
    fn get_patch_property(
        &self,
        instance_id: InstanceId,
        property_uri: &str,
    ) -> RemoteFuture<TypedValue> {
        self.call(
            ClientCommand::GetPatchProperty {
                instance_id,
                property_uri: property_uri.to_string(),
            },
            value,
        )
    }

    fn set_patch_property(
        &self,
        instance_id: InstanceId,
        property_uri: &str,
        value: TypedValue,
    ) -> RemoteFuture<()> {
        self.call(
            ClientCommand::SetPatchProperty {
                instance_id,
                property_uri: property_uri.to_string(),
                value,
            },
            done,
        )
    }

    fn request_file_list(&self, file_property: &FileProperty) -> RemoteFuture<Vec<String>> {
        self.call(
            ClientCommand::RequestFileList {
                file_property: file_property.clone(),
            },
            files,
        )
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
        self.call(
            ClientCommand::UpdatePresets {
                presets: presets.clone(),
            },
            done,
        )
    }

    fn delete_preset_item(&self, instance_id: InstanceId) -> RemoteFuture<InstanceId> {
        self.call(
            ClientCommand::DeletePresetItem { instance_id },
            self::instance_id,
        )
    }

    fn rename_preset_item(&self, instance_id: InstanceId, name: &str) -> RemoteFuture<()> {
        self.call(
            ClientCommand::RenamePresetItem {
                instance_id,
                name: name.to_string(),
            },
            done,
        )
    }

    fn duplicate_preset(&self, instance_id: InstanceId) -> RemoteFuture<InstanceId> {
        self.call(
            ClientCommand::DuplicatePreset { instance_id },
            self::instance_id,
        )
    }

    fn load_preset(&self, instance_id: InstanceId) -> RemoteFuture<()> {
        self.call(ClientCommand::LoadPreset { instance_id }, done)
    }
}

/// Receiving end of the actor's event channel.
pub struct EngineEvents {
    rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl EngineEvents {
    pub async fn next(&mut self) -> Option<EngineEvent> {
        self.rx.recv().await
    }

    /// Routes events until the first handshake has been applied to `model`.
    pub async fn until_ready(
        &mut self,
        connection: &EngineConnection,
        model: &AppModel,
    ) -> Result<(), RemoteError> {
        while let Some(event) = self.next().await {
            let handshake = matches!(event, EngineEvent::Handshake { .. });
            dispatch(connection, model, event);
            if handshake {
                return Ok(());
            }
        }
        Err(RemoteError::Disconnected)
    }

    /// Routes every further event on the current `LocalSet`.
    pub fn pump(mut self, connection: Rc<EngineConnection>, model: Rc<AppModel>) -> JoinHandle<()> {
        tokio::task::spawn_local(async move {
            while let Some(event) = self.next().await {
                dispatch(&connection, &model, event);
            }
        })
    }
}

/// Feeds one engine event into the listener table or the application model.
pub fn dispatch(connection: &EngineConnection, model: &AppModel, event: EngineEvent) {
    match event {
        EngineEvent::Status(status) => {
            info!("engine connection: {status:?}");
            connection.status.set_if_changed(status);
        }
        EngineEvent::Handshake {
            presets,
            pedalboard,
        } => model.apply_push(EnginePush::Snapshot {
            presets,
            pedalboard,
        }),
        EngineEvent::StateChanged(instance_id) => connection.listeners.notify(instance_id),
        EngineEvent::PresetsChanged(presets) => model.apply_push(EnginePush::Presets(presets)),
        EngineEvent::PedalboardChanged(pedalboard) => {
            model.apply_push(EnginePush::Pedalboard(pedalboard))
        }
        EngineEvent::Alert(message) => model.apply_push(EnginePush::Alert(message)),
    }
}
