use crate::error::StateError;
use crate::InstanceId;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PresetIndexEntry {
    pub instance_id: InstanceId,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetIndex {
    #[serde(default)]
    pub selected_instance_id: Option<InstanceId>,
    pub presets: Vec<PresetIndexEntry>,
}

impl PresetIndex {
    pub fn get_item(&self, instance_id: InstanceId) -> Option<&PresetIndexEntry> {
        self.presets.iter().find(|p| p.instance_id == instance_id)
    }

    pub fn index_of(&self, instance_id: InstanceId) -> Option<usize> {
        self.presets.iter().position(|p| p.instance_id == instance_id)
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected_instance_id.and_then(|id| self.index_of(id))
    }

    /// Array-style remove at `from`, insert at `to`. Selection is by id and
    /// therefore follows the moved entry.
    pub fn move_preset(&mut self, from: usize, to: usize) -> Result<(), StateError> {
        let len = self.presets.len();
        if from >= len {
            return Err(StateError::InvalidIndex { index: from, len });
        }
        if to >= len {
            return Err(StateError::InvalidIndex { index: to, len });
        }
        let entry = self.presets.remove(from);
        self.presets.insert(to, entry);
        Ok(())
    }

    pub fn are_equal(&self, other: &PresetIndex, include_selection: bool) -> bool {
        if include_selection && self.selected_instance_id != other.selected_instance_id {
            return false;
        }
        self.presets == other.presets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(names: &[&str], selected: Option<InstanceId>) -> PresetIndex {
        PresetIndex {
            selected_instance_id: selected,
            presets: names
                .iter()
                .enumerate()
                .map(|(i, name)| PresetIndexEntry {
                    instance_id: i as InstanceId + 1,
                    name: name.to_string(),
                })
                .collect(),
        }
    }

    fn names(index: &PresetIndex) -> Vec<&str> {
        index.presets.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn move_keeps_selection_on_entry() {
        let mut presets = index(&["A", "B", "C"], Some(2));
        assert_eq!(presets.selected_index(), Some(1));

        presets.move_preset(0, 2).unwrap();
        assert_eq!(names(&presets), vec!["B", "C", "A"]);
        assert_eq!(presets.selected_instance_id, Some(2));
        assert_eq!(presets.selected_index(), Some(0));
    }

    #[test]
    fn move_and_back_restores_order() {
        let original = index(&["A", "B", "C", "D"], Some(3));
        for (i, j) in [(0, 3), (3, 0), (1, 2), (2, 2)] {
            let mut presets = original.clone();
            presets.move_preset(i, j).unwrap();
            presets.move_preset(j, i).unwrap();
            assert_eq!(presets, original);
        }
    }

    #[test]
    fn move_rejects_out_of_range() {
        let mut presets = index(&["A"], None);
        assert_eq!(
            presets.move_preset(0, 1),
            Err(StateError::InvalidIndex { index: 1, len: 1 })
        );
    }

    #[test]
    fn equality_can_ignore_selection() {
        let a = index(&["A", "B"], Some(1));
        let b = index(&["A", "B"], Some(2));
        assert!(a.are_equal(&b, false));
        assert!(!a.are_equal(&b, true));

        let mut renamed = a.clone();
        renamed.presets[0].name = "Z".to_string();
        assert!(!a.are_equal(&renamed, false));

        let mut reordered = a.clone();
        reordered.move_preset(0, 1).unwrap();
        assert!(!a.are_equal(&reordered, false));
    }
}
