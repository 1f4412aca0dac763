use crate::*;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// What to do with the flops of a group whose size is not a tray capacity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// Keep the group and give it the smallest tray that fits, leaving slots empty.
    #[default]
    #[display("partial_trays")]
    PartialTrays,
    /// Only fill trays completely; leftover flops stay single-bit.
    #[display("exact_fill")]
    ExactFill,
}

/// Invocation parameters of one optimization run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Size of the worker pool running multi-start trials.
    #[builder(default = 1)]
    pub threads: usize,
    /// Number of independent clustering trials.
    #[builder(default = 20)]
    pub multistart: usize,
    /// Worst timing paths considered for criticality weighting. 0 disables it.
    #[builder(default = 0)]
    pub num_paths: usize,
    /// Report intermediate states to the debug observer.
    #[builder(default = false)]
    pub debug_graphics: bool,
    #[builder(default = 42)]
    pub seed: u64,
    #[builder(default)]
    pub remainder_policy: RemainderPolicy,
    /// Upper bound on k-means refinement rounds per trial.
    #[builder(default = 30)]
    pub max_iterations: usize,
    /// Cost charged per unclustered flop (scaled by its criticality) when comparing trials.
    #[builder(default = 50.0)]
    pub unclustered_penalty: float,
    /// Cost charged per tray feature (scan, reset, set) a cluster leaves unused.
    #[builder(default = 1.0)]
    pub unused_feature_penalty: float,
    /// How much extra weight the most critical flop receives over a non-critical one.
    #[builder(default = 1.0)]
    pub criticality_gain: float,
    /// Flops on a path with slack below this are not clustered at all.
    pub critical_slack_limit: Option<float>,
    /// Legalization search radius (Manhattan) around the solver's tray origin.
    pub max_displacement: Option<float>,
    /// Caller-level limit for the whole multi-start search.
    pub timeout_secs: Option<float>,
    #[builder(default = false)]
    pub quiet: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        if self.multistart == 0 {
            return Err(ConfigError::ZeroMultistart);
        }
        for (field, value) in [
            ("unclustered_penalty", self.unclustered_penalty),
            ("unused_feature_penalty", self.unused_feature_penalty),
            ("criticality_gain", self.criticality_gain),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::NegativeWeight { field, value });
            }
        }
        if let Some(secs) = self.timeout_secs {
            if !secs.is_finite() || secs < 0.0 {
                return Err(ConfigError::InvalidTimeout(secs));
            }
        }
        // an infinite radius is the same as no radius
        if let Some(radius) = self.max_displacement {
            if radius.is_nan() || radius < 0.0 {
                return Err(ConfigError::InvalidDisplacement(radius));
            }
        }
        Ok(())
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &str) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
        Self::from_json_str(&text)
    }

    pub fn timing_enabled(&self) -> bool {
        self.num_paths > 0
    }

    /// Absolute end of the search. A limit too large to represent is no limit.
    pub fn deadline(&self, start: Instant) -> Option<Instant> {
        let limit = Duration::try_from_secs_f64(self.timeout_secs?).ok()?;
        start.checked_add(limit)
    }

    pub fn search_radius(&self) -> float {
        self.max_displacement.unwrap_or(float::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builder_defaults_are_valid() {
        let config = EngineConfig::builder().build();
        assert_eq!(config.threads, 1);
        assert_eq!(config.multistart, 20);
        assert_eq!(config.remainder_policy, RemainderPolicy::PartialTrays);
        assert!(config.validate().is_ok());
        assert!(!config.timing_enabled());
    }

    #[test]
    fn rejects_zero_threads_and_trials() {
        let config = EngineConfig::builder().threads(0).build();
        assert_eq!(config.validate(), Err(ConfigError::ZeroThreads));
        let config = EngineConfig::builder().multistart(0).build();
        assert_eq!(config.validate(), Err(ConfigError::ZeroMultistart));
        let config = EngineConfig::builder().criticality_gain(-1.0).build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NegativeWeight { field: "criticality_gain", .. })
        ));
    }

    #[test]
    fn rejects_unusable_limits() {
        for secs in [float::INFINITY, float::NAN, -1.0] {
            let config = EngineConfig::builder().timeout_secs(secs).build();
            assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout(_))), "{secs}");
        }
        assert!(EngineConfig::builder().timeout_secs(0.0).build().validate().is_ok());
        assert!(EngineConfig::builder().timeout_secs(1e19).build().validate().is_ok());

        for radius in [float::NAN, -1.0] {
            let config = EngineConfig::builder().max_displacement(radius).build();
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidDisplacement(_))
            ));
        }
        let config = EngineConfig::builder().max_displacement(float::INFINITY).build();
        assert!(config.validate().is_ok());
        assert_eq!(config.search_radius(), float::INFINITY);
    }

    #[test]
    fn deadline_overflow_means_no_deadline() {
        let config = EngineConfig::builder().timeout_secs(1e19).build();
        assert_eq!(config.deadline(Instant::now()), None);
        assert!(EngineConfig::default().deadline(Instant::now()).is_none());
        let now = Instant::now();
        let config = EngineConfig::builder().timeout_secs(2.0).build();
        assert_eq!(config.deadline(now), Some(now + Duration::from_secs(2)));
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{"threads": 4, "remainder_policy": "exact_fill"}"#)
                .unwrap();
        assert_eq!(config.threads, 4);
        assert_eq!(config.multistart, 20);
        assert_eq!(config.remainder_policy, RemainderPolicy::ExactFill);
        assert!(EngineConfig::from_json_str(r#"{"threads": 0}"#).is_err());
    }
}
