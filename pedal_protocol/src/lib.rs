mod atom;
mod error;
mod file_property;
mod pedalboard;
mod presets;

use serde::{Deserialize, Serialize};

pub use atom::TypedValue;
pub use error::StateError;
pub use file_property::{FileProperty, FileType};
pub use pedalboard::{
    split_keys, ControlValue, Items, Pedalboard, PedalboardItem, PedalboardNode,
    PedalboardSplitItem, Placement, SplitType, ToggleControl, SPLIT_ITEM_URI,
};
pub use presets::{PresetIndex, PresetIndexEntry};

pub type InstanceId = i64;
pub type RequestId = u64;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Busy,
    NotFound,
    InvalidValue,
    InvalidCommand,
    NotReady,
    InternalError,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ServerMessage {
    Handshake {
        session_token: String,
        presets: PresetIndex,
        pedalboard: Pedalboard,
    },
    Reply {
        request_id: RequestId,
        payload: ReplyPayload,
    },
    Error {
        #[serde(default)]
        request_id: Option<RequestId>,
        msg: String,
        code: ErrorCode,
    },
    StateChanged {
        instance_id: InstanceId,
    },
    PresetsChanged {
        presets: PresetIndex,
    },
    PedalboardChanged {
        pedalboard: Pedalboard,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ReplyPayload {
    Done,
    Value { value: TypedValue },
    Files { files: Vec<String> },
    InstanceId { instance_id: InstanceId },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ClientCommand {
    HandshakeAck,
    GetPatchProperty {
        instance_id: InstanceId,
        property_uri: String,
    },
    SetPatchProperty {
        instance_id: InstanceId,
        property_uri: String,
        value: TypedValue,
    },
    RequestFileList {
        file_property: FileProperty,
    },
    UpdatePresets {
        presets: PresetIndex,
    },
    DeletePresetItem {
        instance_id: InstanceId,
    },
    RenamePresetItem {
        instance_id: InstanceId,
        name: String,
    },
    DuplicatePreset {
        instance_id: InstanceId,
    },
    LoadPreset {
        instance_id: InstanceId,
    },
}

impl ClientCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::HandshakeAck => "handshake_ack",
            ClientCommand::GetPatchProperty { .. } => "get_patch_property",
            ClientCommand::SetPatchProperty { .. } => "set_patch_property",
            ClientCommand::RequestFileList { .. } => "request_file_list",
            ClientCommand::UpdatePresets { .. } => "update_presets",
            ClientCommand::DeletePresetItem { .. } => "delete_preset_item",
            ClientCommand::RenamePresetItem { .. } => "rename_preset_item",
            ClientCommand::DuplicatePreset { .. } => "duplicate_preset",
            ClientCommand::LoadPreset { .. } => "load_preset",
        }
    }
}

/// Every client frame carries the session token handed out in the handshake.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClientEnvelope {
    pub session_token: String,
    #[serde(default)]
    pub request_id: RequestId,
    #[serde(flatten)]
    pub command: ClientCommand,
}
