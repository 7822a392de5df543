use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Stable index of a variable's storage. Compiled programs refer to
/// variables only through slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(pub u32);

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnvError {
    #[error("variable '{name}' is already defined")]
    AlreadyDefined { name: String },
    #[error("no variable named '{name}'")]
    Undefined { name: String },
}

impl EnvError {
    pub fn code(&self) -> &'static str {
        match self {
            EnvError::AlreadyDefined { .. } => "VX-V001",
            EnvError::Undefined { .. } => "VX-V002",
        }
    }
}

#[derive(Debug, Clone)]
struct Binding {
    name: String,
    value: Value,
}

/// Named values with stable slots.
///
/// Slots are handed out at creation and never reused: removing a variable
/// leaves a tombstone, so a program compiled against the old binding fails
/// with an unknown-slot error rather than reading whatever was defined later.
#[derive(Debug, Clone, Default)]
pub struct VarEnv {
    names: HashMap<String, Slot>,
    slots: Vec<Option<Binding>>,
}

impl VarEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new variable. Fails if the name is taken.
    pub fn define(&mut self, name: &str, value: Value) -> Result<Slot, EnvError> {
        if self.names.contains_key(name) {
            return Err(EnvError::AlreadyDefined { name: name.to_string() });
        }
        Ok(self.insert(name, value))
    }

    /// Overwrite an existing variable in place, or create it.
    pub fn set(&mut self, name: &str, value: Value) -> Slot {
        match self.names.get(name) {
            Some(&slot) => {
                if let Some(binding) = self.slots[slot.0 as usize].as_mut() {
                    binding.value = value;
                }
                slot
            }
            None => self.insert(name, value),
        }
    }

    fn insert(&mut self, name: &str, value: Value) -> Slot {
        let slot = Slot(self.slots.len() as u32);
        self.slots.push(Some(Binding { name: name.to_string(), value }));
        self.names.insert(name.to_string(), slot);
        tracing::trace!(name, %slot, "bound variable");
        slot
    }

    pub fn remove(&mut self, name: &str) -> Result<Value, EnvError> {
        let slot = self
            .names
            .remove(name)
            .ok_or_else(|| EnvError::Undefined { name: name.to_string() })?;
        let binding = self.slots[slot.0 as usize].take();
        tracing::trace!(name, %slot, "removed variable");
        binding
            .map(|b| b.value)
            .ok_or_else(|| EnvError::Undefined { name: name.to_string() })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.slot(name).and_then(|slot| self.load(slot))
    }

    pub fn slot(&self, name: &str) -> Option<Slot> {
        self.names.get(name).copied()
    }

    /// Current value behind a slot, `None` once the variable was removed.
    pub fn load(&self, slot: Slot) -> Option<&Value> {
        self.slots.get(slot.0 as usize)?.as_ref().map(|b| &b.value)
    }

    /// Write through a slot. Returns false if the slot no longer resolves.
    pub fn store(&mut self, slot: Slot, value: Value) -> bool {
        match self.slots.get_mut(slot.0 as usize) {
            Some(Some(binding)) => {
                binding.value = value;
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Live variables in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.slots.iter().flatten().map(|b| (b.name.as_str(), &b.value))
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            variables: self
                .iter()
                .map(|(name, value)| SnapshotEntry { name: name.to_string(), value: value.clone() })
                .collect(),
        }
    }

    /// Set every entry of a snapshot, in order. Existing names keep their slots.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        for entry in &snapshot.variables {
            self.set(&entry.name, entry.value.clone());
        }
    }
}

/// Durable copy of the current variable values. Compiled programs are never
/// part of a snapshot; they are rebuilt from source each run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub variables: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub name: String,
    pub value: Value,
}

impl Snapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Snapshot> {
        serde_json::from_str(json)
    }
}
