//! Journal record payloads
//!
//! Defines the operation tag and the transaction carried after each header.

use serde::{Deserialize, Serialize};

use crate::error::{CairnError, Result};
use crate::value::{State, Value};

/// Operations that can be journaled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Operation {
    /// Insert or overwrite a key
    Set = 1,

    /// Remove a key
    Unset = 2,
}

impl TryFrom<u8> for Operation {
    type Error = CairnError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(Operation::Set),
            2 => Ok(Operation::Unset),
            other => Err(CairnError::Format(format!(
                "invalid operation tag {}",
                other
            ))),
        }
    }
}

/// One journaled mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub key: String,

    /// Absent for Unset
    pub value: Option<Value>,
}

impl Transaction {
    pub fn new(key: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Apply this transaction to `state` as `operation`
    ///
    /// A Set without a value stores `Value::Null`.
    pub fn apply(self, operation: Operation, state: &mut State) {
        match operation {
            Operation::Set => {
                state.insert(self.key, self.value.unwrap_or(Value::Null));
            }
            Operation::Unset => {
                state.remove(&self.key);
            }
        }
    }
}
