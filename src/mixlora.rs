//! MixLoRA (mixture-of-experts LoRA) configuration.
//!
//! A MixLoRA adapter replaces the adapted feed-forward path with a set of
//! LoRA experts selected per token by a learned router. This module only
//! describes that adapter; routing and expert computation live in the host.

use serde_json::{Map, Value};

use crate::activation::ActivationRegistry;
use crate::dict;
use crate::error::{MixLoraError, Result};
use crate::lora::LoraConfig;

/// Routing strategies this schema supports. Closed set: an unknown strategy
/// is rejected outright, never silently ignored.
pub const ROUTING_STRATEGIES: [&str; 1] = ["mixtral"];

const PEFT_TYPE: &str = "MIXLORA";

fn strategy_supported(strategy: &str) -> bool {
    ROUTING_STRATEGIES.contains(&strategy)
}

/// Configuration for a MixLoRA mixture-of-experts adapter.
///
/// Layers mixture-of-experts routing on top of [`LoraConfig`]: the outer
/// LoRA fields apply to non-expert adapted layers, while `expert_lora`
/// optionally overrides the hyperparameters shared by all experts.
#[derive(Debug, Clone, PartialEq)]
pub struct MixLoraConfig {
    /// Outer LoRA fields.
    pub lora: LoraConfig,
    /// Hyperparameters shared by all experts; `None` means the experts
    /// reuse the outer LoRA fields.
    pub expert_lora: Option<LoraConfig>,
    /// Coefficient of the router auxiliary (load-balancing) loss.
    pub router_aux_loss_coef: f64,
    /// Range of the router weight initialization.
    pub router_init_range: f64,
    /// Routing strategy name; must be one of [`ROUTING_STRATEGIES`].
    pub routing_strategy: String,
    /// Noise injected into router logits during training.
    pub jitter_noise: f64,
    /// Whether the router auxiliary loss is applied during training.
    pub router_loss: bool,
    /// Number of experts.
    pub num_experts: usize,
    /// Activation function override; `None` means the experts use the host
    /// model's native feed-forward activation.
    pub act_fn: Option<String>,
    /// Experts routed per token (mixtral strategy).
    pub top_k: usize,
}

impl Default for MixLoraConfig {
    fn default() -> Self {
        Self {
            lora: LoraConfig::default(),
            expert_lora: None,
            router_aux_loss_coef: 0.001,
            router_init_range: 0.02,
            routing_strategy: "mixtral".to_owned(),
            jitter_noise: 0.0,
            router_loss: true,
            num_experts: 8,
            act_fn: None,
            top_k: 2,
        }
    }
}

impl MixLoraConfig {
    /// Validate the outer LoRA fields, the expert-level fields if present,
    /// and the mixture-specific fields, reporting the first violation.
    ///
    /// `activations` is the host's catalog of activation-function names; it
    /// is consulted only when `act_fn` is set.
    ///
    /// # Errors
    ///
    /// Returns [`MixLoraError::Validation`] for an out-of-range field and
    /// [`MixLoraError::UnsupportedStrategy`] for a routing strategy outside
    /// [`ROUTING_STRATEGIES`].
    pub fn check<R>(&self, activations: &R) -> Result<()>
    where
        R: ActivationRegistry + ?Sized,
    {
        self.lora.check()?;
        if let Some(expert) = &self.expert_lora {
            expert.check()?;
        }
        if !self.router_aux_loss_coef.is_finite() || self.router_aux_loss_coef < 0.0 {
            return Err(MixLoraError::Validation {
                field: "router_aux_loss_coef",
                message: "must be >= 0",
            });
        }
        if !self.router_init_range.is_finite() || self.router_init_range < 0.0 {
            return Err(MixLoraError::Validation {
                field: "router_init_range",
                message: "must be >= 0",
            });
        }
        if !strategy_supported(&self.routing_strategy) {
            return Err(MixLoraError::UnsupportedStrategy(
                self.routing_strategy.clone(),
            ));
        }
        if !self.jitter_noise.is_finite() || self.jitter_noise < 0.0 {
            return Err(MixLoraError::Validation {
                field: "jitter_noise",
                message: "must be >= 0",
            });
        }
        if self.num_experts == 0 {
            return Err(MixLoraError::Validation {
                field: "num_experts",
                message: "must be > 0",
            });
        }
        if let Some(act_fn) = &self.act_fn {
            if !activations.contains(act_fn) {
                return Err(MixLoraError::Validation {
                    field: "act_fn",
                    message: "not a recognized activation function",
                });
            }
        }
        // Only the mixtral strategy reaches this point.
        if self.top_k == 0 {
            return Err(MixLoraError::Validation {
                field: "top_k",
                message: "must be > 0",
            });
        }
        Ok(())
    }

    /// Populate a config from a persisted dictionary.
    ///
    /// The dictionary's `peft_type` must be `"MIXLORA"`. Outer LoRA fields
    /// are read by [`LoraConfig::from_config`]; a nested `expert_lora`
    /// object is overlaid on a copy of the outer dictionary, so experts
    /// inherit every outer key they do not override. `routing_strategy` and
    /// `num_experts` are required; `router_aux_loss_coef` defaults to
    /// `0.001`, `router_loss` to `true`, and for the mixtral strategy
    /// `router_init_range`, `jitter_noise` and `top_k` default to `0.02`,
    /// `0.0` and `2`.
    ///
    /// # Errors
    ///
    /// Returns [`MixLoraError::TypeMismatch`] for a foreign `peft_type`,
    /// [`MixLoraError::UnsupportedStrategy`] for an unknown strategy, and
    /// the [`LoraConfig::from_config`] errors for the remaining keys.
    pub fn from_config(config: &Map<String, Value>) -> Result<Self> {
        let peft_type = dict::require_str(config, "peft_type")?;
        if peft_type != PEFT_TYPE {
            return Err(MixLoraError::TypeMismatch {
                expected: PEFT_TYPE,
                actual: peft_type.to_owned(),
            });
        }

        let lora = LoraConfig::from_config(config)?;
        let expert_lora = match config.get("expert_lora") {
            Some(Value::Object(overrides)) => {
                // Experts inherit every outer key they do not override.
                let mut merged = config.clone();
                merged.extend(overrides.clone());
                Some(LoraConfig::from_config(&merged)?)
            }
            Some(_) => {
                return Err(MixLoraError::MalformedField {
                    field: "expert_lora",
                    message: "expected an object of LoRA overrides".into(),
                })
            }
            None => None,
        };

        let routing_strategy = dict::require_str(config, "routing_strategy")?.to_owned();
        if !strategy_supported(&routing_strategy) {
            return Err(MixLoraError::UnsupportedStrategy(routing_strategy));
        }

        Ok(Self {
            lora,
            expert_lora,
            router_aux_loss_coef: dict::opt_f64(config, "router_aux_loss_coef", 0.001)?,
            router_init_range: dict::opt_f64(config, "router_init_range", 0.02)?,
            jitter_noise: dict::opt_f64(config, "jitter_noise", 0.0)?,
            router_loss: dict::opt_bool(config, "router_loss", true)?,
            num_experts: dict::require_usize(config, "num_experts")?,
            act_fn: dict::opt_string(config, "act_fn")?,
            top_k: dict::opt_usize(config, "top_k", 2)?,
            routing_strategy,
        })
    }

    /// Export to the persisted dictionary form.
    ///
    /// Builds on [`LoraConfig::export`] with `peft_type` overwritten to
    /// `"MIXLORA"`. A present `expert_lora` is nested with its `peft_type`
    /// and `target_modules` stripped: the expert selection is not
    /// independently meaningful, experts follow the outer selection.
    /// `act_fn` is emitted only when set; `top_k` only for the mixtral
    /// strategy.
    ///
    /// # Errors
    ///
    /// Returns [`MixLoraError::UnsupportedStrategy`] when `routing_strategy`
    /// is outside [`ROUTING_STRATEGIES`].
    pub fn export(&self) -> Result<Map<String, Value>> {
        let mut config = self.lora.export();
        config.insert("peft_type".into(), PEFT_TYPE.into());
        if let Some(expert) = &self.expert_lora {
            let mut expert_config = expert.export();
            expert_config.remove("peft_type");
            expert_config.remove("target_modules");
            config.insert("expert_lora".into(), Value::Object(expert_config));
        }
        config.insert(
            "router_aux_loss_coef".into(),
            self.router_aux_loss_coef.into(),
        );
        config.insert("router_loss".into(), self.router_loss.into());
        config.insert("routing_strategy".into(), self.routing_strategy.clone().into());
        config.insert("num_experts".into(), self.num_experts.into());
        if let Some(act_fn) = &self.act_fn {
            config.insert("act_fn".into(), act_fn.clone().into());
        }
        match self.routing_strategy.as_str() {
            "mixtral" => {
                config.insert("router_init_range".into(), self.router_init_range.into());
                config.insert("jitter_noise".into(), self.jitter_noise.into());
                config.insert("top_k".into(), self.top_k.into());
            }
            other => return Err(MixLoraError::UnsupportedStrategy(other.to_owned())),
        }
        Ok(config)
    }

    /// Derive the adapter configuration for expert `index`.
    ///
    /// Returns an independent copy of `expert_lora` when present, otherwise
    /// of the outer LoRA fields, named `moe.<name>.experts.<index>`. The
    /// copy shares no mutable state with this config or with any other
    /// derived expert.
    #[must_use]
    pub fn expert_config(&self, index: usize) -> LoraConfig {
        let mut config = self.expert_lora.as_ref().unwrap_or(&self.lora).clone();
        config.identity.name = format!("moe.{}.experts.{index}", self.lora.identity.name);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ACTIVATIONS: &[&str] = &["silu", "gelu_new", "relu"];

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn minimal() -> Map<String, Value> {
        raw(json!({
            "peft_type": "MIXLORA",
            "r": 8,
            "lora_alpha": 16,
            "lora_dropout": 0.05,
            "target_modules": ["q_proj", "v_proj"],
            "routing_strategy": "mixtral",
            "num_experts": 4
        }))
    }

    #[test]
    fn test_minimal_mixtral_defaults() {
        let config = MixLoraConfig::from_config(&minimal()).unwrap();
        config.check(ACTIVATIONS).unwrap();

        assert_eq!(config.top_k, 2);
        assert!((config.router_init_range - 0.02).abs() < 1e-12);
        assert!((config.jitter_noise - 0.0).abs() < 1e-12);
        assert!((config.router_aux_loss_coef - 0.001).abs() < 1e-12);
        assert!(config.router_loss);
        assert!(config.expert_lora.is_none());
        assert!(config.act_fn.is_none());

        let exported = config.export().unwrap();
        assert_eq!(exported["peft_type"], json!("MIXLORA"));
        assert_eq!(exported["routing_strategy"], json!("mixtral"));
        assert_eq!(exported["top_k"], json!(2));
        assert_eq!(exported["target_modules"], json!(["q_proj", "v_proj"]));
    }

    #[test]
    fn test_from_config_rejects_foreign_peft_type() {
        let mut config = minimal();
        config.insert("peft_type".into(), json!("LORA"));
        assert!(matches!(
            MixLoraConfig::from_config(&config),
            Err(MixLoraError::TypeMismatch { expected: "MIXLORA", .. })
        ));

        config.remove("peft_type");
        assert!(matches!(
            MixLoraConfig::from_config(&config),
            Err(MixLoraError::MissingField("peft_type"))
        ));
    }

    #[test]
    fn test_unsupported_strategy_rejected_everywhere() {
        let mut config = minimal();
        config.insert("routing_strategy".into(), json!("switch"));
        assert!(matches!(
            MixLoraConfig::from_config(&config),
            Err(MixLoraError::UnsupportedStrategy(s)) if s == "switch"
        ));

        let mut built = MixLoraConfig::from_config(&minimal()).unwrap();
        built.routing_strategy = "switch".to_owned();
        assert!(matches!(
            built.check(ACTIVATIONS),
            Err(MixLoraError::UnsupportedStrategy(s)) if s == "switch"
        ));
        assert!(matches!(
            built.export(),
            Err(MixLoraError::UnsupportedStrategy(s)) if s == "switch"
        ));
    }

    #[test]
    fn test_expert_overlay_inherits_outer_keys() {
        let mut config = minimal();
        config.insert("expert_lora".into(), json!({"r": 4, "lora_dropout": 0.0}));
        let config = MixLoraConfig::from_config(&config).unwrap();

        let expert = config.expert_lora.as_ref().unwrap();
        assert_eq!(expert.r, 4);
        assert_eq!(expert.alpha, 16); // inherited
        assert!((expert.dropout - 0.0).abs() < 1e-12); // overridden
        assert_eq!(config.lora.r, 8);
    }

    #[test]
    fn test_expert_lora_must_be_an_object() {
        let mut config = minimal();
        config.insert("expert_lora".into(), json!(["r", 4]));
        assert!(matches!(
            MixLoraConfig::from_config(&config),
            Err(MixLoraError::MalformedField { field: "expert_lora", .. })
        ));
    }

    #[test]
    fn test_expert_config_naming_and_independence() {
        let mut config = MixLoraConfig::from_config(&minimal()).unwrap();
        config.lora.identity.name = "task_adapter".to_owned();

        let expert0 = config.expert_config(0);
        let mut expert3 = config.expert_config(3);
        assert_eq!(expert3.identity.name, "moe.task_adapter.experts.3");

        expert3.r = 64;
        assert_eq!(config.lora.r, 8);
        assert_eq!(expert0.r, 8);
    }

    #[test]
    fn test_expert_config_prefers_expert_lora() {
        let mut config = minimal();
        config.insert("expert_lora".into(), json!({"r": 4}));
        let config = MixLoraConfig::from_config(&config).unwrap();
        assert_eq!(config.expert_config(1).r, 4);
    }

    #[test]
    fn test_export_strips_nested_expert_keys() {
        let mut config = minimal();
        config.insert("expert_lora".into(), json!({"r": 4}));
        let config = MixLoraConfig::from_config(&config).unwrap();

        let exported = config.export().unwrap();
        let nested = exported["expert_lora"].as_object().unwrap();
        assert!(!nested.contains_key("peft_type"));
        assert!(!nested.contains_key("target_modules"));
        assert_eq!(nested["r"], json!(4));
    }

    #[test]
    fn test_act_fn_checked_against_registry() {
        let mut raw = minimal();
        raw.insert("act_fn".into(), json!("silu"));
        let mut config = MixLoraConfig::from_config(&raw).unwrap();
        assert!(config.check(ACTIVATIONS).is_ok());

        config.act_fn = Some("swish".to_owned());
        assert!(matches!(
            config.check(ACTIVATIONS),
            Err(MixLoraError::Validation { field: "act_fn", .. })
        ));
    }

    #[test]
    fn test_check_rejects_out_of_range_router_fields() {
        let mut config = MixLoraConfig::from_config(&minimal()).unwrap();
        config.router_aux_loss_coef = -0.001;
        assert!(matches!(
            config.check(ACTIVATIONS),
            Err(MixLoraError::Validation { field: "router_aux_loss_coef", .. })
        ));

        let mut config = MixLoraConfig::from_config(&minimal()).unwrap();
        config.num_experts = 0;
        assert!(matches!(
            config.check(ACTIVATIONS),
            Err(MixLoraError::Validation { field: "num_experts", .. })
        ));

        let mut config = MixLoraConfig::from_config(&minimal()).unwrap();
        config.top_k = 0;
        assert!(matches!(
            config.check(ACTIVATIONS),
            Err(MixLoraError::Validation { field: "top_k", .. })
        ));
    }

    #[test]
    fn test_full_round_trip() {
        let original = MixLoraConfig::from_config(&raw(json!({
            "peft_type": "MIXLORA",
            "r": 16,
            "lora_alpha": 32,
            "lora_dropout": 0.1,
            "use_dora": true,
            "target_modules": {"q_proj": true, "gate_proj": true},
            "expert_lora": {"r": 4, "lora_alpha": 8},
            "routing_strategy": "mixtral",
            "router_aux_loss_coef": 0.01,
            "router_init_range": 0.1,
            "jitter_noise": 0.05,
            "router_loss": false,
            "num_experts": 6,
            "act_fn": "gelu_new",
            "top_k": 3
        })))
        .unwrap();
        original.check(ACTIVATIONS).unwrap();

        let reimported = MixLoraConfig::from_config(&original.export().unwrap()).unwrap();
        assert_eq!(original, reimported);
    }

    #[test]
    fn test_use_dora_omission_round_trip() {
        let mut config = MixLoraConfig::from_config(&minimal()).unwrap();
        let exported = config.export().unwrap();
        assert!(!exported.contains_key("use_dora"));

        let reimported = MixLoraConfig::from_config(&exported).unwrap();
        assert!(!reimported.lora.use_dora);

        config.lora.use_dora = true;
        let exported = config.export().unwrap();
        assert_eq!(exported["use_dora"], json!(true));
        assert!(MixLoraConfig::from_config(&exported).unwrap().lora.use_dora);
    }
}
