//! LoRA (Low-Rank Adaptation) configuration.
//!
//! LoRA approximates a weight update of limited rank with a pair of small
//! trainable matrices: `ΔW = BA` where `B ∈ R^{d×r}` and `A ∈ R^{r×k}`.
//!
//! Reference: <https://arxiv.org/abs/2106.09685>

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{AdapterIdentity, TargetModules};
use crate::dict;
use crate::error::{MixLoraError, Result};

/// Initialization scheme for the LoRA weight matrices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoraInit {
    /// A initialized per the reference implementation, B zeroed.
    #[default]
    Original,
    /// Both matrices drawn from a Gaussian.
    Gaussian,
}

impl LoraInit {
    /// Wire spelling of the scheme.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Gaussian => "gaussian",
        }
    }
}

/// Configuration for a LoRA adapter.
///
/// Extends [`AdapterIdentity`] with the LoRA hyperparameters and the
/// target-module selection. A config must pass [`check`](Self::check) before
/// it is handed to anything that instantiates real adapter weights.
#[derive(Debug, Clone, PartialEq)]
pub struct LoraConfig {
    /// Identity and shape metadata, populated by the host.
    pub identity: AdapterIdentity,
    /// Rank of the low-rank decomposition.
    pub r: usize,
    /// Scaling numerator; the adapter scale is `alpha / r`, or
    /// `alpha / sqrt(r)` with `use_rslora`.
    pub alpha: usize,
    /// Dropout probability applied to the adapter path.
    pub dropout: f64,
    /// Weight initialization scheme.
    pub init: LoraInit,
    /// Weight-Decomposed LoRA: adapt magnitude and direction separately.
    pub use_dora: bool,
    /// Rank-Stabilized LoRA scaling.
    pub use_rslora: bool,
    /// Which transformer projections receive adapters.
    pub target_modules: TargetModules,
}

impl Default for LoraConfig {
    fn default() -> Self {
        let mut target_modules = TargetModules::default();
        target_modules.select("q_proj", true);
        target_modules.select("v_proj", true);
        Self {
            identity: AdapterIdentity::default(),
            r: 8,
            alpha: 16,
            dropout: 0.0,
            init: LoraInit::default(),
            use_dora: false,
            use_rslora: false,
            target_modules,
        }
    }
}

impl LoraConfig {
    /// Validate every hyperparameter, reporting the first violation in
    /// declaration order. Identity fields are the host's concern and are
    /// not validated here.
    ///
    /// # Errors
    ///
    /// Returns [`MixLoraError::Validation`] naming the offending field.
    pub fn check(&self) -> Result<()> {
        if self.r == 0 {
            return Err(MixLoraError::Validation {
                field: "r",
                message: "rank must be > 0",
            });
        }
        if self.alpha == 0 {
            return Err(MixLoraError::Validation {
                field: "lora_alpha",
                message: "alpha must be > 0",
            });
        }
        if !self.dropout.is_finite() || self.dropout < 0.0 {
            return Err(MixLoraError::Validation {
                field: "lora_dropout",
                message: "dropout must be >= 0",
            });
        }
        Ok(())
    }

    /// Populate a config from a persisted dictionary.
    ///
    /// `r`, `lora_alpha`, `lora_dropout` and `target_modules` are required;
    /// `use_dora` and `use_rslora` default to `false`, `lora_init` to
    /// `"original"`. Identity fields are left at their defaults for the
    /// host to fill in.
    ///
    /// # Errors
    ///
    /// Returns [`MixLoraError::MissingField`] for an absent required key and
    /// [`MixLoraError::MalformedField`] for a key of the wrong shape.
    pub fn from_config(config: &Map<String, Value>) -> Result<Self> {
        let init = match config.get("lora_init") {
            Some(value) => serde_json::from_value(value.clone()).map_err(|_| {
                MixLoraError::MalformedField {
                    field: "lora_init",
                    message: "expected \"original\" or \"gaussian\"".into(),
                }
            })?,
            None => LoraInit::default(),
        };
        Ok(Self {
            identity: AdapterIdentity::default(),
            r: dict::require_usize(config, "r")?,
            alpha: dict::require_usize(config, "lora_alpha")?,
            dropout: dict::require_f64(config, "lora_dropout")?,
            init,
            use_dora: dict::opt_bool(config, "use_dora", false)?,
            use_rslora: dict::opt_bool(config, "use_rslora", false)?,
            target_modules: TargetModules::from_json(dict::require(config, "target_modules")?)?,
        })
    }

    /// Export to the persisted dictionary form.
    ///
    /// `use_dora`, `use_rslora` and `lora_init` are emitted only when they
    /// differ from their defaults, so omission round-trips. `bias` is always
    /// `"none"` (bias adaptation is unsupported) and `peft_type` is `"LORA"`
    /// at this level.
    #[must_use]
    pub fn export(&self) -> Map<String, Value> {
        let mut config = Map::new();
        if self.use_dora {
            config.insert("use_dora".into(), Value::Bool(true));
        }
        if self.use_rslora {
            config.insert("use_rslora".into(), Value::Bool(true));
        }
        if self.init != LoraInit::default() {
            config.insert("lora_init".into(), self.init.as_str().into());
        }
        config.insert("bias".into(), "none".into());
        config.insert("peft_type".into(), "LORA".into());
        config.insert("r".into(), self.r.into());
        config.insert("lora_alpha".into(), self.alpha.into());
        config.insert("lora_dropout".into(), self.dropout.into());
        config.insert("target_modules".into(), self.target_modules.to_json());
        config
    }
}
