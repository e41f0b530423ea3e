use crate::protocol::{ErrorCode, InstanceId};
use pedal_protocol::{
    ControlValue, FileProperty, Pedalboard, PresetIndex, PresetIndexEntry, TypedValue,
};
use std::collections::HashMap;

pub const DEMO_REVERB_URI: &str = "urn:pedal:convolution-reverb";
pub const DEMO_IMPULSE_PROPERTY: &str = "urn:pedal:convolution-reverb#impulseFile";

/// A request the engine refuses, turned into a `ServerMessage::Error` by the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub code: ErrorCode,
    pub msg: String,
}

impl Rejection {
    fn new(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
        }
    }

    fn not_found(what: &str, instance_id: InstanceId) -> Self {
        Self::new(ErrorCode::NotFound, format!("{what} {instance_id} not found"))
    }
}

/// Everything the mock engine owns: the preset list, the live pedalboard,
/// patch-property values and the file tree offered to file pickers.
pub struct EngineState {
    pub presets: PresetIndex,
    pub pedalboard: Pedalboard,
    pub properties: HashMap<(InstanceId, String), TypedValue>,
    /// Upload directory name -> file paths.
    pub files: HashMap<String, Vec<String>>,
}

impl EngineState {
    pub fn new(presets: PresetIndex, pedalboard: Pedalboard) -> Self {
        Self {
            presets,
            pedalboard,
            properties: HashMap::new(),
            files: HashMap::new(),
        }
    }

    /// Three presets and a board with one convolution reverb whose impulse
    /// file is a patch property.
    pub fn demo() -> Self {
        let presets = PresetIndex {
            selected_instance_id: Some(1),
            presets: ["Clean", "Crunch", "Lead"]
                .iter()
                .zip(1..)
                .map(|(name, instance_id)| PresetIndexEntry {
                    instance_id,
                    name: name.to_string(),
                })
                .collect(),
        };

        let mut pedalboard = Pedalboard::new("Clean");
        let first = pedalboard.items().next().map(|n| n.instance_id()).unwrap_or(1);
        let reverb = pedalboard
            .load_plugin(
                first,
                DEMO_REVERB_URI,
                "Convolution Reverb",
                vec![ControlValue::new("mix", 0.35), ControlValue::new("predelay", 0.0)],
            )
            .unwrap_or(first);

        let mut state = Self::new(presets, pedalboard);
        state.properties.insert(
            (reverb, DEMO_IMPULSE_PROPERTY.to_string()),
            TypedValue::path("ReverbImpulseFiles/Hall.wav"),
        );
        state.files.insert(
            "ReverbImpulseFiles".to_string(),
            vec![
                "ReverbImpulseFiles/Hall.wav".to_string(),
                "ReverbImpulseFiles/Plate.wav".to_string(),
                "ReverbImpulseFiles/Spring.flac".to_string(),
                "ReverbImpulseFiles/readme.txt".to_string(),
            ],
        );
        state
    }

    pub fn get_property(
        &self,
        instance_id: InstanceId,
        property_uri: &str,
    ) -> Result<TypedValue, Rejection> {
        self.require_instance(instance_id)?;
        self.properties
            .get(&(instance_id, property_uri.to_string()))
            .cloned()
            .ok_or_else(|| {
                Rejection::new(
                    ErrorCode::NotFound,
                    format!("instance {instance_id} has no property {property_uri}"),
                )
            })
    }

    pub fn set_property(
        &mut self,
        instance_id: InstanceId,
        property_uri: &str,
        value: TypedValue,
    ) -> Result<(), Rejection> {
        self.require_instance(instance_id)?;
        self.properties
            .insert((instance_id, property_uri.to_string()), value);
        Ok(())
    }

    pub fn file_list(&self, file_property: &FileProperty) -> Result<Vec<String>, Rejection> {
        if !FileProperty::is_directory_name_valid(&file_property.directory) {
            return Err(Rejection::new(
                ErrorCode::InvalidValue,
                format!("invalid directory {:?}", file_property.directory),
            ));
        }
        let files = self
            .files
            .get(&file_property.directory)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(files
            .iter()
            .filter(|path| {
                let extension = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
                file_property.is_valid_extension(extension)
            })
            .cloned()
            .collect())
    }

    /// Accepts a reordered index; the set of presets must not change.
    pub fn update_presets(&mut self, presets: PresetIndex) -> Result<(), Rejection> {
        let mut incoming: Vec<_> = presets.presets.iter().map(|p| p.instance_id).collect();
        let mut current: Vec<_> = self.presets.presets.iter().map(|p| p.instance_id).collect();
        incoming.sort_unstable();
        current.sort_unstable();
        if incoming != current {
            return Err(Rejection::new(
                ErrorCode::InvalidValue,
                "preset list does not match the engine's presets",
            ));
        }
        let selected = self.presets.selected_instance_id;
        self.presets = presets;
        self.presets.selected_instance_id = selected;
        Ok(())
    }

    /// Returns the id that takes the deleted preset's place in the list.
    pub fn delete_preset(&mut self, instance_id: InstanceId) -> Result<InstanceId, Rejection> {
        let pos = self
            .presets
            .index_of(instance_id)
            .ok_or_else(|| Rejection::not_found("preset", instance_id))?;
        if self.presets.presets.len() == 1 {
            return Err(Rejection::new(
                ErrorCode::InvalidValue,
                "cannot delete the last preset",
            ));
        }
        self.presets.presets.remove(pos);
        let next = self.presets.presets[pos.min(self.presets.presets.len() - 1)].instance_id;
        if self.presets.selected_instance_id == Some(instance_id) {
            self.presets.selected_instance_id = Some(next);
        }
        Ok(next)
    }

    pub fn rename_preset(&mut self, instance_id: InstanceId, name: &str) -> Result<(), Rejection> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Rejection::new(ErrorCode::InvalidValue, "preset name is empty"));
        }
        let entry = self
            .presets
            .presets
            .iter_mut()
            .find(|p| p.instance_id == instance_id)
            .ok_or_else(|| Rejection::not_found("preset", instance_id))?;
        entry.name = name.to_string();
        Ok(())
    }

    /// Inserts the copy directly after the original and returns its id.
    pub fn duplicate_preset(&mut self, instance_id: InstanceId) -> Result<InstanceId, Rejection> {
        let pos = self
            .presets
            .index_of(instance_id)
            .ok_or_else(|| Rejection::not_found("preset", instance_id))?;
        let new_id = self
            .presets
            .presets
            .iter()
            .map(|p| p.instance_id)
            .max()
            .unwrap_or(0)
            + 1;
        let name = format!("{} (copy)", self.presets.presets[pos].name);
        self.presets.presets.insert(
            pos + 1,
            PresetIndexEntry {
                instance_id: new_id,
                name,
            },
        );
        Ok(new_id)
    }

    pub fn load_preset(&mut self, instance_id: InstanceId) -> Result<(), Rejection> {
        let entry = self
            .presets
            .get_item(instance_id)
            .ok_or_else(|| Rejection::not_found("preset", instance_id))?;
        self.pedalboard.name = entry.name.clone();
        self.presets.selected_instance_id = Some(instance_id);
        Ok(())
    }

    fn require_instance(&self, instance_id: InstanceId) -> Result<(), Rejection> {
        match self.pedalboard.get_item(instance_id) {
            Some(_) => Ok(()),
            None => Err(Rejection::not_found("pedalboard item", instance_id)),
        }
    }
}
