//! Sampling decisions for root spans.
//!
//! Child spans never consult the sampler; they inherit the sampled flag of
//! their parent, local or remote.

use rand::Rng;

use crate::config::{SamplerConfig, SamplerKind};
use crate::tracer::TracerError;

/// Sampling strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sampler {
    Const(bool),
    Probabilistic(f64),
}

impl Sampler {
    /// Build a sampler from `sampler.type` / `sampler.param`.
    pub fn from_config(config: &SamplerConfig) -> Result<Self, TracerError> {
        match config.kind {
            SamplerKind::Const if config.param == 0.0 => Ok(Sampler::Const(false)),
            SamplerKind::Const if config.param == 1.0 => Ok(Sampler::Const(true)),
            SamplerKind::Probabilistic if (0.0..=1.0).contains(&config.param) => {
                Ok(Sampler::Probabilistic(config.param))
            }
            kind => Err(TracerError::SamplerParam {
                kind: Sampler::kind_name(kind),
                param: config.param,
            }),
        }
    }

    fn kind_name(kind: SamplerKind) -> &'static str {
        match kind {
            SamplerKind::Const => "const",
            SamplerKind::Probabilistic => "probabilistic",
        }
    }

    /// Decide whether a new root trace is sampled.
    pub fn is_sampled(&self) -> bool {
        match *self {
            Sampler::Const(decision) => decision,
            Sampler::Probabilistic(rate) => rand::thread_rng().gen_bool(rate),
        }
    }

    /// Value of the `sampler.type` tag on sampled root spans.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Sampler::Const(_) => "const",
            Sampler::Probabilistic(_) => "probabilistic",
        }
    }

    /// Value of the `sampler.param` tag on sampled root spans.
    pub fn param_tag(&self) -> f64 {
        match *self {
            Sampler::Const(decision) => f64::from(u8::from(decision)),
            Sampler::Probabilistic(rate) => rate,
        }
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Sampler::Const(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_const_sampler() {
        let config = SamplerConfig { kind: SamplerKind::Const, param: 1.0 };
        let sampler = Sampler::from_config(&config).unwrap();
        assert_eq!(sampler, Sampler::Const(true));
        assert!(sampler.is_sampled());

        let off = Sampler::from_config(&SamplerConfig { kind: SamplerKind::Const, param: 0.0 })
            .unwrap();
        assert!(!off.is_sampled());
    }

    #[test]
    fn test_probabilistic_bounds() {
        let always = Sampler::Probabilistic(1.0);
        let never = Sampler::Probabilistic(0.0);
        for _ in 0..100 {
            assert!(always.is_sampled());
            assert!(!never.is_sampled());
        }
    }

    #[test]
    fn test_rejects_bad_params() {
        let err = Sampler::from_config(&SamplerConfig { kind: SamplerKind::Const, param: 0.5 });
        assert!(matches!(err, Err(TracerError::SamplerParam { kind: "const", .. })));

        let err = Sampler::from_config(&SamplerConfig {
            kind: SamplerKind::Probabilistic,
            param: -0.1,
        });
        assert!(err.is_err());
    }
}
