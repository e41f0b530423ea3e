use crate::InstanceId;
use thiserror::Error;

/// Local model errors. All of them are raised before anything is mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("no pedalboard item with instance id {0}")]
    InvalidReference(InstanceId),
    #[error("item {instance_id} has no control {key:?}")]
    UnknownKey { instance_id: InstanceId, key: String },
    #[error("{0}")]
    InvariantViolation(&'static str),
    #[error("index {index} out of range (len {len})")]
    InvalidIndex { index: usize, len: usize },
}
