//! Shared base types for adapter configurations.

use candle_core::DType;
use serde_json::Value;

use crate::error::{MixLoraError, Result};

/// Identity and shape metadata shared by every adapter configuration.
///
/// These fields are not part of the persisted dictionary; the host fills
/// them in after import. They carry no validation of their own.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterIdentity {
    /// Adapter name, also the basis for derived per-expert names.
    pub name: String,
    /// Hidden dimension of the host model.
    pub hidden_size: usize,
    /// Host model type tag (e.g. `llama`).
    pub model_type: String,
    /// Numeric precision of the host's tensors. Stored and forwarded,
    /// never interpreted here.
    pub dtype: DType,
}

impl Default for AdapterIdentity {
    fn default() -> Self {
        Self {
            name: String::new(),
            hidden_size: 0,
            model_type: String::new(),
            dtype: DType::F32,
        }
    }
}

/// The seven transformer projections eligible for adaptation, in the order
/// they are emitted on export.
pub const TARGET_MODULE_NAMES: [&str; 7] = [
    "q_proj",
    "k_proj",
    "v_proj",
    "o_proj",
    "gate_proj",
    "down_proj",
    "up_proj",
];

/// Selection of target modules over the fixed universe in
/// [`TARGET_MODULE_NAMES`].
///
/// Names outside the universe are ignored on selection and on import, so
/// configs written by newer tooling still load; a value of the wrong shape
/// is rejected instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetModules {
    selected: [bool; 7],
}

impl TargetModules {
    fn position(name: &str) -> Option<usize> {
        TARGET_MODULE_NAMES.iter().position(|module| *module == name)
    }

    /// Select or deselect a module by name. Unrecognized names are ignored.
    pub fn select(&mut self, name: &str, on: bool) {
        if let Some(index) = Self::position(name) {
            self.selected[index] = on;
        }
    }

    /// Whether a module is currently selected. Unrecognized names are never
    /// selected.
    #[must_use]
    pub fn is_selected(&self, name: &str) -> bool {
        Self::position(name).is_some_and(|index| self.selected[index])
    }

    /// Selected module names, in universe order.
    #[must_use]
    pub fn selected_names(&self) -> Vec<&'static str> {
        TARGET_MODULE_NAMES
            .iter()
            .zip(&self.selected)
            .filter_map(|(name, &on)| on.then_some(*name))
            .collect()
    }

    /// Parse a selection from a persisted `target_modules` value.
    ///
    /// Accepts either an array of module names (each present recognized name
    /// becomes selected) or an object mapping names to booleans (recognized
    /// keys are applied as-is).
    ///
    /// # Errors
    ///
    /// Returns [`MixLoraError::MalformedField`] when the value is neither an
    /// array of strings nor an object of booleans.
    pub fn from_json(value: &Value) -> Result<Self> {
        let mut modules = Self::default();
        match value {
            Value::Array(names) => {
                for name in names {
                    let name = name.as_str().ok_or_else(|| MixLoraError::MalformedField {
                        field: "target_modules",
                        message: "expected an array of module names".into(),
                    })?;
                    modules.select(name, true);
                }
            }
            Value::Object(entries) => {
                for (name, on) in entries {
                    let on = on.as_bool().ok_or_else(|| MixLoraError::MalformedField {
                        field: "target_modules",
                        message: format!("expected a boolean for module `{name}`"),
                    })?;
                    modules.select(name, on);
                }
            }
            _ => {
                return Err(MixLoraError::MalformedField {
                    field: "target_modules",
                    message: "expected an array of names or a name-to-bool map".into(),
                })
            }
        }
        Ok(modules)
    }

    /// Serialize as the array of selected names, in universe order.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.selected_names()
                .into_iter()
                .map(Value::from)
                .collect(),
        )
    }
}
