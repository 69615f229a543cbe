//! # mixlora-config
//!
//! Validated configuration schema for MixLoRA, a mixture-of-experts variant
//! of LoRA (Low-Rank Adaptation).
//!
//! Three layers of specialization, composed explicitly:
//! - [`AdapterIdentity`] — name, hidden size, model type tag, and tensor
//!   dtype of an adapter.
//! - [`LoraConfig`] — LoRA hyperparameters and the target-module selection.
//! - [`MixLoraConfig`] — mixture-of-experts routing on top of LoRA, plus
//!   per-expert config derivation.
//!
//! Configs convert to and from the flat `adapter_config.json`-style
//! dictionary (a [`serde_json::Map`]). No tensors are touched here: layer
//! construction, routing, and the activation catalog all belong to the host.
//!
//! ## Quick Start
//!
//! ```rust
//! use mixlora_config::MixLoraConfig;
//! use serde_json::json;
//!
//! let raw = json!({
//!     "peft_type": "MIXLORA",
//!     "r": 8,
//!     "lora_alpha": 16,
//!     "lora_dropout": 0.05,
//!     "target_modules": ["q_proj", "v_proj"],
//!     "routing_strategy": "mixtral",
//!     "num_experts": 4
//! });
//! let mut config = MixLoraConfig::from_config(raw.as_object().unwrap())?;
//! config.lora.identity.name = "task_adapter".to_owned();
//! config.check(&["silu"][..])?;
//! assert_eq!(config.top_k, 2);
//!
//! let expert = config.expert_config(0);
//! assert_eq!(expert.identity.name, "moe.task_adapter.experts.0");
//! # Ok::<(), mixlora_config::MixLoraError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod activation;
pub mod config;
mod dict;
pub mod error;
pub mod lora;
pub mod mixlora;

pub use activation::ActivationRegistry;
pub use config::{AdapterIdentity, TargetModules, TARGET_MODULE_NAMES};
pub use error::{MixLoraError, Result};
pub use lora::{LoraConfig, LoraInit};
pub use mixlora::{MixLoraConfig, ROUTING_STRATEGIES};
