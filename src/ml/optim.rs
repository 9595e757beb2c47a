// ============================================================
// Layer 5: Optimiser Selection
// ============================================================
// Three first-order optimisers, all with element-wise gradient
// clipping to [-5, 5] applied before the update:
//
//   adam     m = β1·m + (1-β1)·g,  v = β2·v + (1-β2)·g²
//            θ = θ - lr · m / (√v + ε)
//   sgd      θ = θ - lr · g
//   rmsprop  v = α·v + (1-α)·g²,   θ = θ - lr · g / (√v + ε)
//
// Parameters without a gradient (the frozen embeddings) are
// absent from GradientsParams and are left untouched.
//
// Reference: Kingma & Ba (2015) Adam
//            Tieleman & Hinton (2012) RMSProp

use burn::{
    grad_clipping::GradientClippingConfig,
    optim::{AdamConfig, RmsPropConfig, SgdConfig},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub const GRADIENT_CLIP: f32 = 5.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    #[default]
    Adam,
    Sgd,
    Rmsprop,
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptimizerKind::Adam    => "adam",
            OptimizerKind::Sgd     => "sgd",
            OptimizerKind::Rmsprop => "rmsprop",
        };
        f.write_str(name)
    }
}

impl FromStr for OptimizerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "adam"    => Ok(OptimizerKind::Adam),
            "sgd"     => Ok(OptimizerKind::Sgd),
            "rmsprop" => Ok(OptimizerKind::Rmsprop),
            other     => anyhow::bail!("Unknown optimizer '{other}' (expected adam, sgd or rmsprop)"),
        }
    }
}

fn clipping() -> Option<GradientClippingConfig> {
    Some(GradientClippingConfig::Value(GRADIENT_CLIP))
}

pub fn adam() -> AdamConfig {
    AdamConfig::new().with_epsilon(1e-8).with_grad_clipping(clipping())
}

pub fn sgd() -> SgdConfig {
    SgdConfig::new().with_gradient_clipping(clipping())
}

pub fn rmsprop() -> RmsPropConfig {
    RmsPropConfig::new().with_grad_clipping(clipping())
}
