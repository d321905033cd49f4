use crate::errors::PipelineError;
use serde::{Deserialize, Serialize};

/// Per-factor weights for comp similarity scoring.
///
/// Weights nominally sum to 1.0. When a factor is unavailable for a comp
/// its weight is redistributed proportionally across the available
/// factors, so the sum is a convention rather than a hard invariant.
/// `validate()` still rejects weights that sum to zero or below.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub distance: f64,
    pub price: f64,
    pub sqft: f64,
    pub age: f64,
    pub bed_bath: f64,
    pub features: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            distance: 0.25,
            price: 0.20,
            sqft: 0.20,
            age: 0.15,
            bed_bath: 0.10,
            features: 0.10,
        }
    }
}

/// Configuration for the comp scoring engine.
///
/// Defaults carry the documented business policy; callers may supply
/// their own instance, and `from_env` allows ops overrides of the scalar
/// knobs without a redeploy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: FactorWeights,
    /// Distance in miles at or beyond which the distance factor is 0.0.
    pub max_distance_miles: f64,
    /// Age difference in years at or beyond which the age factor is 0.0.
    pub max_age_diff_years: f64,
    /// Overall score at or above which a comp is tiered `primary`.
    pub primary_threshold: u32,
    /// Overall score at or above which a comp is tiered `supporting`.
    pub supporting_threshold: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: FactorWeights::default(),
            max_distance_miles: 3.0,
            max_age_diff_years: 30.0,
            primary_threshold: 70,
            supporting_threshold: 40,
        }
    }
}

impl ScoringConfig {
    /// Build a config from the environment, starting from defaults.
    ///
    /// Recognized variables (all optional):
    /// - `COMP_MAX_DISTANCE_MILES`
    /// - `COMP_MAX_AGE_DIFF_YEARS`
    /// - `COMP_PRIMARY_THRESHOLD`
    /// - `COMP_SUPPORTING_THRESHOLD`
    ///
    /// Factor weights are fixed business policy and are not overridable
    /// from the environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(raw) = std::env::var("COMP_MAX_DISTANCE_MILES") {
            config.max_distance_miles = raw
                .parse()
                .map_err(|_| anyhow::anyhow!("COMP_MAX_DISTANCE_MILES must be a number"))?;
        }
        if let Ok(raw) = std::env::var("COMP_MAX_AGE_DIFF_YEARS") {
            config.max_age_diff_years = raw
                .parse()
                .map_err(|_| anyhow::anyhow!("COMP_MAX_AGE_DIFF_YEARS must be a number"))?;
        }
        if let Ok(raw) = std::env::var("COMP_PRIMARY_THRESHOLD") {
            config.primary_threshold = raw
                .parse()
                .map_err(|_| anyhow::anyhow!("COMP_PRIMARY_THRESHOLD must be an integer"))?;
        }
        if let Ok(raw) = std::env::var("COMP_SUPPORTING_THRESHOLD") {
            config.supporting_threshold = raw
                .parse()
                .map_err(|_| anyhow::anyhow!("COMP_SUPPORTING_THRESHOLD must be an integer"))?;
        }

        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;

        tracing::info!("Scoring configuration loaded");
        tracing::debug!(
            "max_distance={}mi, max_age_diff={}yr, tiers={}/{}",
            config.max_distance_miles,
            config.max_age_diff_years,
            config.primary_threshold,
            config.supporting_threshold
        );

        Ok(config)
    }

    /// Reject configurations that would make scoring meaningless.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let w = &self.weights;
        let all = [w.distance, w.price, w.sqft, w.age, w.bed_bath, w.features];

        if all.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(PipelineError::InvalidConfig(
                "factor weights must be finite and non-negative".to_string(),
            ));
        }
        if all.iter().sum::<f64>() <= 0.0 {
            return Err(PipelineError::InvalidConfig(
                "factor weights must not all be zero".to_string(),
            ));
        }
        if !self.max_distance_miles.is_finite() || self.max_distance_miles <= 0.0 {
            return Err(PipelineError::InvalidConfig(
                "max_distance_miles must be positive".to_string(),
            ));
        }
        if !self.max_age_diff_years.is_finite() || self.max_age_diff_years <= 0.0 {
            return Err(PipelineError::InvalidConfig(
                "max_age_diff_years must be positive".to_string(),
            ));
        }
        if self.primary_threshold > 100 || self.supporting_threshold > 100 {
            return Err(PipelineError::InvalidConfig(
                "tier thresholds must be within 0-100".to_string(),
            ));
        }
        if self.supporting_threshold > self.primary_threshold {
            return Err(PipelineError::InvalidConfig(
                "supporting_threshold must not exceed primary_threshold".to_string(),
            ));
        }

        Ok(())
    }
}
