//! Scoring strategies: the versioned policy that governs every scoring pass.
//!
//! A [`Strategy`] can only be obtained through validation, so the scoring engine
//! never has to second-guess missing parameters or fall back to defaults.

mod catalog;
mod document;
mod standard;

pub use catalog::StrategyCatalog;
pub use document::StrategyDocument;

use super::domain::TraitId;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Label shown for a rating button and the scale value it records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingOption {
    pub label: String,
    pub value: u8,
}

/// One step of the low-sample penalty table; the first tier whose
/// `max_count` reaches the observed count wins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyTier {
    pub max_count: usize,
    pub factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariancePenalty {
    pub threshold: f64,
    pub max_effect_threshold: f64,
    pub max_penalty_ratio: f64,
}

impl VariancePenalty {
    /// Multiplier for the given variance, or `None` when the variance is tolerated.
    pub fn factor_for(&self, variance: f64) -> Option<f64> {
        if variance <= self.threshold {
            return None;
        }
        let span = self.max_effect_threshold - self.threshold;
        let ratio = ((variance - self.threshold) / span).min(1.0);
        Some(1.0 - ratio * self.max_penalty_ratio)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyBonus {
    pub mean_threshold: f64,
    pub low_variance_threshold: f64,
    pub bonus_factor: f64,
}

impl ConsistencyBonus {
    pub fn qualifies(&self, mean: f64, variance: f64) -> bool {
        mean.abs() > self.mean_threshold && variance < self.low_variance_threshold
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringParameters {
    pub min_reliable_count: usize,
    pub gender_adjustment_factor: f64,
    pub low_sample_tiers: Vec<PenaltyTier>,
    pub variance_penalty: VariancePenalty,
    pub consistency_bonus: ConsistencyBonus,
}

impl ScoringParameters {
    /// Tier factor applied to an aggregate backed by `count` scores, if penalized.
    pub fn low_sample_factor(&self, count: usize) -> Option<f64> {
        if count >= self.min_reliable_count {
            return None;
        }
        self.low_sample_tiers
            .iter()
            .find(|tier| tier.max_count >= count)
            .map(|tier| tier.factor)
    }
}

/// Per trait-group switches.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub enabled: bool,
    pub weight: f64,
    pub is_sexual_filter_target: bool,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            name: None,
            enabled: true,
            weight: 1.0,
            is_sexual_filter_target: false,
        }
    }
}

/// Validated scoring policy. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub key: String,
    pub name: String,
    pub version: String,
    rating_options: Vec<RatingOption>,
    scoring: ScoringParameters,
    groups: HashMap<TraitId, GroupSettings>,
}

impl Strategy {
    pub fn rating_options(&self) -> &[RatingOption] {
        &self.rating_options
    }

    pub fn scoring(&self) -> &ScoringParameters {
        &self.scoring
    }

    pub fn groups(&self) -> &HashMap<TraitId, GroupSettings> {
        &self.groups
    }

    pub fn min_rating(&self) -> u8 {
        self.rating_options
            .iter()
            .map(|option| option.value)
            .min()
            .unwrap_or_default()
    }

    pub fn max_rating(&self) -> u8 {
        self.rating_options
            .iter()
            .map(|option| option.value)
            .max()
            .unwrap_or_default()
    }

    /// Center of the rating scale; validation guarantees it is integral.
    pub fn midpoint(&self) -> i16 {
        (i16::from(self.min_rating()) + i16::from(self.max_rating())) / 2
    }

    pub fn accepts_rating(&self, value: u8) -> bool {
        self.rating_options.iter().any(|option| option.value == value)
    }

    pub fn label_for(&self, value: u8) -> Option<&str> {
        self.rating_options
            .iter()
            .find(|option| option.value == value)
            .map(|option| option.label.as_str())
    }

    pub fn group_settings(&self, group: &TraitId) -> Option<&GroupSettings> {
        self.groups.get(group)
    }

    pub fn group_weight(&self, group: &TraitId) -> f64 {
        self.groups
            .get(group)
            .map(|settings| settings.weight)
            .unwrap_or(1.0)
    }

    pub fn is_group_enabled(&self, group: &TraitId) -> bool {
        self.groups
            .get(group)
            .map(|settings| settings.enabled)
            .unwrap_or(true)
    }

    pub fn is_sexual_group(&self, group: &TraitId) -> bool {
        self.groups
            .get(group)
            .map(|settings| settings.is_sexual_filter_target)
            .unwrap_or(false)
    }

    /// Whether traits of `group` take part in scoring under the given filter flag.
    pub fn admits_group(&self, group: &TraitId, filter_sexual: bool) -> bool {
        self.is_group_enabled(group) && !(filter_sexual && self.is_sexual_group(group))
    }
}

/// Failures while reading or validating a strategy document.
#[derive(Debug, thiserror::Error)]
pub enum StrategyLoadError {
    #[error("unknown strategy '{0}'")]
    UnknownKey(String),
    #[error("failed to read strategy {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("strategy document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("strategy is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("strategy field `{field}` is invalid: {reason}")]
    Invalid { field: String, reason: String },
    #[error("low-sample penalty expressions are not supported; declare explicit tiers instead")]
    ExpressionUnsupported,
}

impl StrategyLoadError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard() -> Strategy {
        standard::standard_strategy()
    }

    #[test]
    fn standard_strategy_uses_seven_point_scale() {
        let strategy = standard();
        assert_eq!(strategy.min_rating(), 1);
        assert_eq!(strategy.max_rating(), 7);
        assert_eq!(strategy.midpoint(), 4);
        assert!(strategy.accepts_rating(7));
        assert!(!strategy.accepts_rating(8));
        assert_eq!(strategy.label_for(4), Some("Indifferent"));
    }

    #[test]
    fn low_sample_factor_uses_first_matching_tier() {
        let scoring = standard().scoring().clone();
        let one = scoring.low_sample_factor(1).expect("count 1 penalized");
        let two = scoring.low_sample_factor(2).expect("count 2 penalized");
        assert!(one < two && two <= 1.0);
        assert_eq!(scoring.low_sample_factor(3), None);
    }

    #[test]
    fn variance_penalty_saturates_at_max_ratio() {
        let curve = VariancePenalty {
            threshold: 0.8,
            max_effect_threshold: 1.5,
            max_penalty_ratio: 0.5,
        };
        assert_eq!(curve.factor_for(0.8), None);
        let partial = curve.factor_for(1.15).expect("penalized");
        assert!((partial - 0.75).abs() < 1e-9);
        assert_eq!(curve.factor_for(8.0), Some(0.5));
    }

    #[test]
    fn unknown_groups_fall_back_to_neutral_settings() {
        let strategy = standard();
        let unknown = TraitId::from("i999999");
        assert!(strategy.is_group_enabled(&unknown));
        assert_eq!(strategy.group_weight(&unknown), 1.0);
        assert!(strategy.admits_group(&unknown, true));
    }

    #[test]
    fn sexual_groups_are_dropped_only_when_filtering() {
        let strategy = standard();
        let engages = TraitId::from("i43");
        assert!(strategy.is_sexual_group(&engages));
        assert!(strategy.admits_group(&engages, false));
        assert!(!strategy.admits_group(&engages, true));
    }
}
