use crate::engine_state::{EngineState, Rejection};
use crate::protocol::{
    ClientCommand, ErrorCode, InboundMsg, InstanceId, OutboundMsg, ReplyPayload, RequestId,
    ServerMessage,
};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::{debug, info};

/// Engine-side owner of all state. `tick` is driven from a single thread.
pub struct EngineLoop {
    inbound_rx: Receiver<InboundMsg>,
    outbound_tx: Sender<OutboundMsg>,
    state: EngineState,
    active_session_token: Option<String>,
}

impl EngineLoop {
    pub fn new(
        inbound_rx: Receiver<InboundMsg>,
        outbound_tx: Sender<OutboundMsg>,
        state: EngineState,
    ) -> Self {
        Self {
            inbound_rx,
            outbound_tx,
            state,
            active_session_token: None,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn tick(&mut self) {
        loop {
            match self.inbound_rx.try_recv() {
                Ok(InboundMsg::ClientConnected { session_token, .. }) => {
                    self.active_session_token = Some(session_token.clone());
                    self.send(ServerMessage::Handshake {
                        session_token,
                        presets: self.state.presets.clone(),
                        pedalboard: self.state.pedalboard.clone(),
                    });
                }
                Ok(InboundMsg::ClientDisconnected) => {
                    self.active_session_token = None;
                }
                Ok(InboundMsg::Command { request_id, cmd }) => self.handle(request_id, cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    /// Out-of-band change, as if a MIDI binding or another client wrote the property.
    pub fn set_property_external(
        &mut self,
        instance_id: InstanceId,
        property_uri: &str,
        value: pedal_protocol::TypedValue,
    ) -> Result<(), Rejection> {
        self.state.set_property(instance_id, property_uri, value)?;
        self.send(ServerMessage::StateChanged { instance_id });
        Ok(())
    }

    fn handle(&mut self, request_id: RequestId, cmd: ClientCommand) {
        if self.active_session_token.is_none() {
            self.send(ServerMessage::Error {
                request_id: Some(request_id),
                msg: "not ready (no active session)".to_string(),
                code: ErrorCode::NotReady,
            });
            return;
        }

        debug!(request_id, command = cmd.name(), "engine request");
        let result = match cmd {
            ClientCommand::HandshakeAck => {
                info!("client acknowledged handshake");
                return;
            }
            ClientCommand::GetPatchProperty {
                instance_id,
                property_uri,
            } => self
                .state
                .get_property(instance_id, &property_uri)
                .map(|value| ReplyPayload::Value { value }),
            ClientCommand::SetPatchProperty {
                instance_id,
                property_uri,
                value,
            } => self
                .state
                .set_property(instance_id, &property_uri, value)
                .map(|()| {
                    self.send(ServerMessage::StateChanged { instance_id });
                    ReplyPayload::Done
                }),
            ClientCommand::RequestFileList { file_property } => self
                .state
                .file_list(&file_property)
                .map(|files| ReplyPayload::Files { files }),
            ClientCommand::UpdatePresets { presets } => self
                .state
                .update_presets(presets)
                .map(|()| self.presets_changed(ReplyPayload::Done)),
            ClientCommand::DeletePresetItem { instance_id } => self
                .state
                .delete_preset(instance_id)
                .map(|instance_id| self.presets_changed(ReplyPayload::InstanceId { instance_id })),
            ClientCommand::RenamePresetItem { instance_id, name } => self
                .state
                .rename_preset(instance_id, &name)
                .map(|()| self.presets_changed(ReplyPayload::Done)),
            ClientCommand::DuplicatePreset { instance_id } => self
                .state
                .duplicate_preset(instance_id)
                .map(|instance_id| self.presets_changed(ReplyPayload::InstanceId { instance_id })),
            ClientCommand::LoadPreset { instance_id } => self
                .state
                .load_preset(instance_id)
                .map(|()| self.presets_changed(ReplyPayload::Done)),
        };

        match result {
            Ok(payload) => self.send(ServerMessage::Reply {
                request_id,
                payload,
            }),
            Err(Rejection { code, msg }) => {
                debug!(request_id, ?code, "request rejected: {msg}");
                self.send(ServerMessage::Error {
                    request_id: Some(request_id),
                    msg,
                    code,
                });
            }
        }
    }

    fn presets_changed(&mut self, payload: ReplyPayload) -> ReplyPayload {
        self.send(ServerMessage::PresetsChanged {
            presets: self.state.presets.clone(),
        });
        payload
    }

    fn send(&mut self, msg: ServerMessage) {
        // Best effort; a full outbound queue drops the message.
        let _ = self.outbound_tx.try_send(OutboundMsg::Send { msg });
    }
}
