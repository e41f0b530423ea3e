use crate::error::StateError;
use crate::InstanceId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const SPLIT_ITEM_URI: &str = "uri://two-play/pipedal/pedalboard#Split";

pub mod split_keys {
    pub const SPLIT_TYPE: &str = "splitType";
    pub const SELECT: &str = "select";
    pub const MIX: &str = "mix";
    pub const PAN_L: &str = "panL";
    pub const VOL_L: &str = "volL";
    pub const PAN_R: &str = "panR";
    pub const VOL_R: &str = "volR";
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ControlValue {
    pub key: String,
    pub value: f32,
}

impl ControlValue {
    pub fn new(key: impl Into<String>, value: f32) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Where a new or moved node lands relative to its anchor.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Before,
    After,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PedalboardItem {
    pub instance_id: InstanceId,
    /// Empty for an unoccupied slot.
    pub uri: String,
    #[serde(default)]
    pub plugin_name: String,
    pub is_enabled: bool,
    #[serde(default)]
    pub control_values: Vec<ControlValue>,
    #[serde(default)]
    pub path_properties: BTreeMap<String, String>,
}

impl PedalboardItem {
    pub fn is_empty_slot(&self) -> bool {
        self.uri.is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SplitType {
    Ab,
    Parallel,
    Serial,
}

impl SplitType {
    pub fn from_control_value(value: f32) -> Self {
        match value.round() as i64 {
            1 => SplitType::Parallel,
            2 => SplitType::Serial,
            _ => SplitType::Ab,
        }
    }
}

/// The boolean switch an A/B split exposes to the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct ToggleControl {
    pub binding_key: String,
    pub key: &'static str,
    pub value: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PedalboardSplitItem {
    pub instance_id: InstanceId,
    pub is_enabled: bool,
    #[serde(default)]
    pub control_values: Vec<ControlValue>,
    pub top_chain: Vec<PedalboardNode>,
    pub bottom_chain: Vec<PedalboardNode>,
}

impl PedalboardSplitItem {
    pub fn split_type(&self) -> SplitType {
        self.control_value(split_keys::SPLIT_TYPE)
            .map(SplitType::from_control_value)
            .unwrap_or(SplitType::Ab)
    }

    pub fn control_value(&self, key: &str) -> Option<f32> {
        self.control_values
            .iter()
            .find(|cv| cv.key == key)
            .map(|cv| cv.value)
    }

    pub fn toggle_ab_control(&self) -> Option<ToggleControl> {
        if self.split_type() != SplitType::Ab {
            return None;
        }
        let select = self.control_value(split_keys::SELECT).unwrap_or(0.0);
        Some(ToggleControl {
            binding_key: format!("{}/{}", self.instance_id, split_keys::SELECT),
            key: split_keys::SELECT,
            value: select != 0.0,
        })
    }

    /// Pre-order walk of both branches, top first.
    pub fn branch_items(&self) -> Items<'_> {
        Items {
            stack: vec![self.bottom_chain.iter(), self.top_chain.iter()],
        }
    }

    pub fn contains(&self, instance_id: InstanceId) -> bool {
        self.branch_items().any(|n| n.instance_id() == instance_id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PedalboardNode {
    Item(PedalboardItem),
    Split(PedalboardSplitItem),
}

impl PedalboardNode {
    pub fn instance_id(&self) -> InstanceId {
        match self {
            PedalboardNode::Item(item) => item.instance_id,
            PedalboardNode::Split(split) => split.instance_id,
        }
    }

    pub fn uri(&self) -> &str {
        match self {
            PedalboardNode::Item(item) => &item.uri,
            PedalboardNode::Split(_) => SPLIT_ITEM_URI,
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            PedalboardNode::Item(item) => item.is_enabled,
            PedalboardNode::Split(split) => split.is_enabled,
        }
    }

    pub fn is_empty_slot(&self) -> bool {
        matches!(self, PedalboardNode::Item(item) if item.is_empty_slot())
    }

    pub fn control_values(&self) -> &[ControlValue] {
        match self {
            PedalboardNode::Item(item) => &item.control_values,
            PedalboardNode::Split(split) => &split.control_values,
        }
    }

    pub fn control_value(&self, key: &str) -> Option<f32> {
        self.control_values()
            .iter()
            .find(|cv| cv.key == key)
            .map(|cv| cv.value)
    }

    pub fn as_split(&self) -> Option<&PedalboardSplitItem> {
        match self {
            PedalboardNode::Split(split) => Some(split),
            PedalboardNode::Item(_) => None,
        }
    }

    fn control_values_mut(&mut self) -> &mut Vec<ControlValue> {
        match self {
            PedalboardNode::Item(item) => &mut item.control_values,
            PedalboardNode::Split(split) => &mut split.control_values,
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        match self {
            PedalboardNode::Item(item) => item.is_enabled = enabled,
            PedalboardNode::Split(split) => split.is_enabled = enabled,
        }
    }
}

/// Lazy depth-first pre-order traversal. Split nodes are yielded before
/// their top chain, which comes before their bottom chain.
pub struct Items<'a> {
    stack: Vec<std::slice::Iter<'a, PedalboardNode>>,
}

impl<'a> Iterator for Items<'a> {
    type Item = &'a PedalboardNode;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(node) => {
                    if let PedalboardNode::Split(split) = node {
                        self.stack.push(split.bottom_chain.iter());
                        self.stack.push(split.top_chain.iter());
                    }
                    return Some(node);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Pedalboard {
    pub name: String,
    #[serde(default)]
    pub input_volume_db: f32,
    #[serde(default)]
    pub output_volume_db: f32,
    pub items: Vec<PedalboardNode>,
    pub next_instance_id: InstanceId,
}

impl Default for Pedalboard {
    fn default() -> Self {
        Self::new("Default Preset")
    }
}

impl Pedalboard {
    /// A board holding a single empty slot.
    pub fn new(name: impl Into<String>) -> Self {
        let mut board = Self {
            name: name.into(),
            input_volume_db: 0.0,
            output_volume_db: 0.0,
            items: Vec::new(),
            next_instance_id: 1,
        };
        let first = board.make_empty_item();
        board.items.push(PedalboardNode::Item(first));
        board
    }

    pub fn items(&self) -> Items<'_> {
        Items {
            stack: vec![self.items.iter()],
        }
    }

    pub fn get_item(&self, instance_id: InstanceId) -> Option<&PedalboardNode> {
        self.items().find(|n| n.instance_id() == instance_id)
    }

    pub fn make_empty_item(&mut self) -> PedalboardItem {
        PedalboardItem {
            instance_id: self.allocate_id(),
            uri: String::new(),
            plugin_name: String::new(),
            is_enabled: true,
            control_values: Vec::new(),
            path_properties: BTreeMap::new(),
        }
    }

    pub fn make_split(&mut self) -> PedalboardSplitItem {
        let instance_id = self.allocate_id();
        let top = self.make_empty_item();
        let bottom = self.make_empty_item();
        PedalboardSplitItem {
            instance_id,
            is_enabled: true,
            control_values: vec![
                ControlValue::new(split_keys::SPLIT_TYPE, 0.0),
                ControlValue::new(split_keys::SELECT, 0.0),
                ControlValue::new(split_keys::MIX, 0.0),
                ControlValue::new(split_keys::PAN_L, 0.0),
                ControlValue::new(split_keys::VOL_L, -3.0),
                ControlValue::new(split_keys::PAN_R, 0.0),
                ControlValue::new(split_keys::VOL_R, -3.0),
            ],
            top_chain: vec![PedalboardNode::Item(top)],
            bottom_chain: vec![PedalboardNode::Item(bottom)],
        }
    }

    /// Inserts a new empty slot next to `anchor` and returns its id.
    pub fn insert(
        &mut self,
        anchor: InstanceId,
        placement: Placement,
    ) -> Result<InstanceId, StateError> {
        self.require(anchor)?;
        let item = PedalboardNode::Item(self.make_empty_item());
        self.insert_node(anchor, placement, item)
    }

    pub fn append(&mut self, anchor: InstanceId) -> Result<InstanceId, StateError> {
        self.insert(anchor, Placement::After)
    }

    pub fn insert_split(
        &mut self,
        anchor: InstanceId,
        placement: Placement,
    ) -> Result<InstanceId, StateError> {
        self.require(anchor)?;
        let split = PedalboardNode::Split(self.make_split());
        self.insert_node(anchor, placement, split)
    }

    /// Replaces the item with a freshly loaded plugin. The new item gets a new
    /// instance id, which is returned as the new selection.
    pub fn load_plugin(
        &mut self,
        instance_id: InstanceId,
        uri: impl Into<String>,
        plugin_name: impl Into<String>,
        control_values: Vec<ControlValue>,
    ) -> Result<InstanceId, StateError> {
        if let PedalboardNode::Split(_) = self.require(instance_id)? {
            return Err(StateError::InvariantViolation(
                "cannot load a plugin into a split",
            ));
        }
        let mut keys = BTreeSet::new();
        if !control_values.iter().all(|cv| keys.insert(cv.key.as_str())) {
            return Err(StateError::InvariantViolation("duplicate control key"));
        }
        let item = PedalboardItem {
            instance_id: self.allocate_id(),
            uri: uri.into(),
            plugin_name: plugin_name.into(),
            is_enabled: true,
            control_values,
            path_properties: BTreeMap::new(),
        };
        let new_id = item.instance_id;
        let (chain, pos) = find_chain_mut(&mut self.items, instance_id)
            .ok_or(StateError::InvalidReference(instance_id))?;
        chain[pos] = PedalboardNode::Item(item);
        Ok(new_id)
    }

    pub fn set_control_value(
        &mut self,
        instance_id: InstanceId,
        key: &str,
        value: f32,
    ) -> Result<(), StateError> {
        let node = find_node_mut(&mut self.items, instance_id)
            .ok_or(StateError::InvalidReference(instance_id))?;
        let slot = node
            .control_values_mut()
            .iter_mut()
            .find(|cv| cv.key == key)
            .ok_or_else(|| StateError::UnknownKey {
                instance_id,
                key: key.to_string(),
            })?;
        slot.value = value;
        Ok(())
    }

    pub fn set_enabled(&mut self, instance_id: InstanceId, enabled: bool) -> Result<(), StateError> {
        let node = find_node_mut(&mut self.items, instance_id)
            .ok_or(StateError::InvalidReference(instance_id))?;
        node.set_enabled(enabled);
        Ok(())
    }

    /// Flips the A/B selector of a split and returns the new state.
    pub fn toggle_ab(&mut self, split_id: InstanceId) -> Result<bool, StateError> {
        let control = self
            .get_item(split_id)
            .ok_or(StateError::InvalidReference(split_id))?
            .as_split()
            .and_then(PedalboardSplitItem::toggle_ab_control)
            .ok_or(StateError::InvariantViolation("item is not an A/B split"))?;
        let next = !control.value;
        self.set_control_value(split_id, control.key, if next { 1.0 } else { 0.0 })?;
        Ok(next)
    }

    pub fn can_delete(&self, instance_id: InstanceId) -> bool {
        if self.items.iter().any(|n| n.instance_id() == instance_id) {
            return self.items.len() > 1;
        }
        self.get_item(instance_id).is_some()
    }

    /// Removes a node and returns the id that should become selected: the
    /// next sibling, else the previous one. A split branch is never left
    /// empty; its last node is swapped for a fresh empty slot instead.
    pub fn delete(&mut self, instance_id: InstanceId) -> Result<Option<InstanceId>, StateError> {
        if let Some(pos) = self.items.iter().position(|n| n.instance_id() == instance_id) {
            if self.items.len() == 1 {
                return Err(StateError::InvariantViolation(
                    "cannot delete the last item of the pedalboard",
                ));
            }
            self.items.remove(pos);
            return Ok(neighbour(&self.items, pos));
        }

        let branch_len = find_chain(&self.items, instance_id)
            .map(|(chain, _)| chain.len())
            .ok_or(StateError::InvalidReference(instance_id))?;
        let filler = (branch_len == 1).then(|| PedalboardNode::Item(self.make_empty_item()));

        let (chain, pos) = find_chain_mut(&mut self.items, instance_id)
            .ok_or(StateError::InvalidReference(instance_id))?;
        match filler {
            Some(filler) => {
                let filler_id = filler.instance_id();
                chain[pos] = filler;
                Ok(Some(filler_id))
            }
            None => {
                chain.remove(pos);
                Ok(neighbour(chain, pos))
            }
        }
    }

    /// Moves a node (with its subtree) next to `anchor`.
    pub fn move_item(
        &mut self,
        instance_id: InstanceId,
        anchor: InstanceId,
        placement: Placement,
    ) -> Result<(), StateError> {
        let node = self.require(instance_id)?;
        if let PedalboardNode::Split(split) = node {
            if split.contains(anchor) {
                return Err(StateError::InvariantViolation(
                    "cannot move a split into its own branch",
                ));
            }
        }
        self.require(anchor)?;
        if instance_id == anchor {
            return Ok(());
        }

        let top_level = self.items.iter().any(|n| n.instance_id() == instance_id);
        let filler = if top_level {
            if self.items.len() == 1 {
                return Err(StateError::InvariantViolation(
                    "cannot move the last item of the pedalboard",
                ));
            }
            None
        } else {
            let branch_len = find_chain(&self.items, instance_id)
                .map(|(chain, _)| chain.len())
                .unwrap_or_default();
            (branch_len == 1).then(|| PedalboardNode::Item(self.make_empty_item()))
        };

        let (chain, pos) = find_chain_mut(&mut self.items, instance_id)
            .ok_or(StateError::InvalidReference(instance_id))?;
        let moved = match filler {
            Some(filler) => std::mem::replace(&mut chain[pos], filler),
            None => chain.remove(pos),
        };
        self.insert_node(anchor, placement, moved).map(|_| ())
    }

    /// Same ids, uris and branch shapes; control values may differ.
    pub fn is_structure_identical(&self, other: &Pedalboard) -> bool {
        same_structure(&self.items, &other.items)
    }

    fn require(&self, instance_id: InstanceId) -> Result<&PedalboardNode, StateError> {
        self.get_item(instance_id)
            .ok_or(StateError::InvalidReference(instance_id))
    }

    fn allocate_id(&mut self) -> InstanceId {
        let id = self.next_instance_id;
        self.next_instance_id += 1;
        id
    }

    fn insert_node(
        &mut self,
        anchor: InstanceId,
        placement: Placement,
        node: PedalboardNode,
    ) -> Result<InstanceId, StateError> {
        let id = node.instance_id();
        let (chain, pos) =
            find_chain_mut(&mut self.items, anchor).ok_or(StateError::InvalidReference(anchor))?;
        let at = match placement {
            Placement::Before => pos,
            Placement::After => pos + 1,
        };
        chain.insert(at, node);
        Ok(id)
    }
}

fn neighbour(chain: &[PedalboardNode], removed_at: usize) -> Option<InstanceId> {
    chain
        .get(removed_at)
        .or_else(|| removed_at.checked_sub(1).and_then(|p| chain.get(p)))
        .map(PedalboardNode::instance_id)
}

fn find_node_mut(chain: &mut [PedalboardNode], id: InstanceId) -> Option<&mut PedalboardNode> {
    for node in chain.iter_mut() {
        if node.instance_id() == id {
            return Some(node);
        }
        if let PedalboardNode::Split(PedalboardSplitItem {
            top_chain,
            bottom_chain,
            ..
        }) = node
        {
            if let Some(found) = find_node_mut(top_chain, id) {
                return Some(found);
            }
            if let Some(found) = find_node_mut(bottom_chain, id) {
                return Some(found);
            }
        }
    }
    None
}

fn find_chain(chain: &[PedalboardNode], id: InstanceId) -> Option<(&[PedalboardNode], usize)> {
    if let Some(pos) = chain.iter().position(|n| n.instance_id() == id) {
        return Some((chain, pos));
    }
    chain.iter().filter_map(PedalboardNode::as_split).find_map(|split| {
        find_chain(&split.top_chain, id).or_else(|| find_chain(&split.bottom_chain, id))
    })
}

fn find_chain_mut(
    chain: &mut Vec<PedalboardNode>,
    id: InstanceId,
) -> Option<(&mut Vec<PedalboardNode>, usize)> {
    if let Some(pos) = chain.iter().position(|n| n.instance_id() == id) {
        return Some((chain, pos));
    }
    for node in chain.iter_mut() {
        if let PedalboardNode::Split(PedalboardSplitItem {
            top_chain,
            bottom_chain,
            ..
        }) = node
        {
            if let Some(found) = find_chain_mut(top_chain, id) {
                return Some(found);
            }
            if let Some(found) = find_chain_mut(bottom_chain, id) {
                return Some(found);
            }
        }
    }
    None
}

fn same_structure(a: &[PedalboardNode], b: &[PedalboardNode]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|pair| match pair {
            (PedalboardNode::Item(x), PedalboardNode::Item(y)) => {
                x.instance_id == y.instance_id && x.uri == y.uri
            }
            (PedalboardNode::Split(x), PedalboardNode::Split(y)) => {
                x.instance_id == y.instance_id
                    && same_structure(&x.top_chain, &y.top_chain)
                    && same_structure(&x.bottom_chain, &y.bottom_chain)
            }
            _ => false,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(board: &Pedalboard) -> Vec<InstanceId> {
        board.items().map(PedalboardNode::instance_id).collect()
    }

    fn top_ids(board: &Pedalboard) -> Vec<InstanceId> {
        board.items.iter().map(PedalboardNode::instance_id).collect()
    }

    #[test]
    fn insert_before_then_delete_selects_anchor() {
        let mut board = Pedalboard::new("test");
        assert_eq!(top_ids(&board), vec![1]);

        let new_id = board.insert(1, Placement::Before).unwrap();
        assert_eq!(top_ids(&board), vec![new_id, 1]);
        assert!(board.can_delete(1));

        assert_eq!(board.delete(new_id), Ok(Some(1)));
        assert_eq!(top_ids(&board), vec![1]);
    }

    #[test]
    fn last_top_level_item_cannot_be_deleted() {
        let mut board = Pedalboard::new("test");
        let before = board.clone();
        assert!(!board.can_delete(1));
        assert!(matches!(
            board.delete(1),
            Err(StateError::InvariantViolation(_))
        ));
        assert_eq!(board, before);
    }

    #[test]
    fn delete_prefers_next_sibling_then_previous() {
        let mut board = Pedalboard::new("test");
        let b = board.append(1).unwrap();
        let c = board.append(b).unwrap();
        assert_eq!(board.delete(b), Ok(Some(c)));
        assert_eq!(board.delete(c), Ok(Some(1)));
    }

    #[test]
    fn traversal_is_preorder_top_before_bottom() {
        let mut board = Pedalboard::new("test");
        let split = board.insert_split(1, Placement::After).unwrap();
        let tail = board.append(split).unwrap();

        let node = board.get_item(split).unwrap().as_split().unwrap().clone();
        let top = node.top_chain[0].instance_id();
        let bottom = node.bottom_chain[0].instance_id();

        assert_eq!(ids(&board), vec![1, split, top, bottom, tail]);
        assert_eq!(board.items().count(), 5);
        // restartable
        assert_eq!(ids(&board), vec![1, split, top, bottom, tail]);
    }

    #[test]
    fn emptied_branch_gets_a_fresh_slot() {
        let mut board = Pedalboard::new("test");
        let split = board.insert_split(1, Placement::After).unwrap();
        let top = board.get_item(split).unwrap().as_split().unwrap().top_chain[0].instance_id();

        assert!(board.can_delete(top));
        let replacement = board.delete(top).unwrap().unwrap();
        assert_ne!(replacement, top);

        let node = board.get_item(split).unwrap().as_split().unwrap();
        assert_eq!(node.top_chain.len(), 1);
        assert!(node.top_chain[0].is_empty_slot());
        assert_eq!(node.top_chain[0].instance_id(), replacement);
    }

    #[test]
    fn control_values_require_known_keys() {
        let mut board = Pedalboard::new("test");
        let split = board.insert_split(1, Placement::After).unwrap();

        board.set_control_value(split, split_keys::MIX, 0.25).unwrap();
        assert_eq!(board.get_item(split).unwrap().control_value(split_keys::MIX), Some(0.25));

        assert_eq!(
            board.set_control_value(split, "gain", 1.0),
            Err(StateError::UnknownKey {
                instance_id: split,
                key: "gain".to_string()
            })
        );
        assert_eq!(
            board.set_control_value(99, split_keys::MIX, 1.0),
            Err(StateError::InvalidReference(99))
        );
        assert_eq!(board.set_enabled(99, false), Err(StateError::InvalidReference(99)));
    }

    #[test]
    fn toggle_ab_flips_select() {
        let mut board = Pedalboard::new("test");
        let split = board.insert_split(1, Placement::After).unwrap();

        let control = board.get_item(split).unwrap().as_split().unwrap().toggle_ab_control().unwrap();
        assert_eq!(control.binding_key, format!("{split}/select"));
        assert!(!control.value);

        assert_eq!(board.toggle_ab(split), Ok(true));
        assert_eq!(board.toggle_ab(split), Ok(false));
        assert!(board.toggle_ab(1).is_err());
    }

    #[test]
    fn move_rejects_own_subtree() {
        let mut board = Pedalboard::new("test");
        let split = board.insert_split(1, Placement::After).unwrap();
        let top = board.get_item(split).unwrap().as_split().unwrap().top_chain[0].instance_id();

        assert!(matches!(
            board.move_item(split, top, Placement::After),
            Err(StateError::InvariantViolation(_))
        ));

        board.move_item(1, top, Placement::After).unwrap();
        assert_eq!(top_ids(&board), vec![split]);
        let node = board.get_item(split).unwrap().as_split().unwrap();
        assert_eq!(
            node.top_chain.iter().map(PedalboardNode::instance_id).collect::<Vec<_>>(),
            vec![top, 1]
        );
    }

    #[test]
    fn load_plugin_replaces_item_with_new_id() {
        let mut board = Pedalboard::new("test");
        let new_id = board
            .load_plugin(1, "urn:fx:reverb", "Reverb", vec![ControlValue::new("mix", 0.3)])
            .unwrap();
        assert_ne!(new_id, 1);
        assert!(board.get_item(1).is_none());
        let node = board.get_item(new_id).unwrap();
        assert_eq!(node.uri(), "urn:fx:reverb");
        assert_eq!(node.control_value("mix"), Some(0.3));
    }

    #[test]
    fn load_plugin_rejects_duplicate_control_keys() {
        let mut board = Pedalboard::new("test");
        let before = board.clone();
        let gain = || ControlValue::new("gain", 0.0);
        assert_eq!(
            board.load_plugin(1, "urn:fx:drive", "Drive", vec![gain(), gain()]),
            Err(StateError::InvariantViolation("duplicate control key"))
        );
        assert_eq!(board, before);

        // the failed load must not have consumed an id
        let drive = board
            .load_plugin(1, "urn:fx:drive", "Drive", vec![gain()])
            .unwrap();
        let mut expected = before.clone();
        let next = expected.append(1).unwrap();
        assert_eq!(drive, next);

        board.set_control_value(drive, "gain", 1.0).unwrap();
        assert_eq!(board.get_item(drive).unwrap().control_values().len(), 1);
        assert_eq!(board.get_item(drive).unwrap().control_value("gain"), Some(1.0));
    }

    #[test]
    fn load_plugin_refuses_splits() {
        let mut board = Pedalboard::new("test");
        let split = board.insert_split(1, Placement::After).unwrap();
        let before = board.clone();
        assert_eq!(
            board.load_plugin(split, "urn:fx:drive", "Drive", Vec::new()),
            Err(StateError::InvariantViolation("cannot load a plugin into a split"))
        );
        assert_eq!(board, before);
    }

    #[test]
    fn structure_ignores_control_values() {
        let mut board = Pedalboard::new("test");
        let split = board.insert_split(1, Placement::After).unwrap();
        let mut other = board.clone();
        other.set_control_value(split, split_keys::MIX, 1.0).unwrap();
        assert!(board.is_structure_identical(&other));
        other.append(split).unwrap();
        assert!(!board.is_structure_identical(&other));
    }
}
