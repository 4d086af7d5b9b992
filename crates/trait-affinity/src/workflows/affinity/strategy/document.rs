use super::{
    ConsistencyBonus, GroupSettings, PenaltyTier, RatingOption, ScoringParameters, Strategy,
    StrategyLoadError, VariancePenalty,
};
use crate::workflows::affinity::domain::TraitId;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

/// Strategy document as written on disk. Every field is optional at this
/// layer so that validation can name exactly what is missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDocument {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub rating_options: Option<Vec<RawRatingOption>>,
    #[serde(default)]
    pub scoring_parameters: Option<RawScoringParameters>,
    #[serde(default)]
    pub trait_groups: BTreeMap<String, RawGroupSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRatingOption {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScoringParameters {
    #[serde(default)]
    pub min_reliable_count: Option<i64>,
    #[serde(default)]
    pub gender_adjustment_factor: Option<f64>,
    #[serde(default)]
    pub low_sample_penalty: Option<RawLowSamplePenalty>,
    #[serde(default)]
    pub variance_penalty: Option<RawVariancePenalty>,
    #[serde(default)]
    pub consistency_bonus: Option<RawConsistencyBonus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLowSamplePenalty {
    #[serde(default)]
    pub tiers: Option<Vec<RawPenaltyTier>>,
    /// Legacy free-form formula. Never evaluated.
    #[serde(default)]
    pub expression: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPenaltyTier {
    #[serde(default)]
    pub max_count: Option<i64>,
    #[serde(default)]
    pub factor: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVariancePenalty {
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub max_effect_threshold: Option<f64>,
    #[serde(default)]
    pub max_penalty_ratio: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConsistencyBonus {
    #[serde(default)]
    pub mean_threshold: Option<f64>,
    #[serde(default)]
    pub low_variance_threshold: Option<f64>,
    #[serde(default)]
    pub bonus_factor: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGroupSettings {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub is_sexual_filter_target: bool,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f64 {
    1.0
}

impl StrategyDocument {
    pub fn from_json(raw: &str) -> Result<Self, StrategyLoadError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Validate the document into a [`Strategy`]. `fallback_key` names the
    /// strategy when the document does not carry its own key.
    pub fn validate(self, fallback_key: &str) -> Result<Strategy, StrategyLoadError> {
        let key = self
            .key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| fallback_key.to_string());
        let name = self.name.unwrap_or_else(|| key.clone());
        let version = self.version.unwrap_or_else(|| "unversioned".to_string());

        let rating_options = validate_rating_options(
            self.rating_options
                .ok_or(StrategyLoadError::MissingField("ratingOptions"))?,
        )?;

        let scoring = validate_scoring(
            self.scoring_parameters
                .ok_or(StrategyLoadError::MissingField("scoringParameters"))?,
        )?;

        let groups = validate_groups(self.trait_groups)?;

        Ok(Strategy {
            key,
            name,
            version,
            rating_options,
            scoring,
            groups,
        })
    }
}

fn validate_rating_options(
    raw: Vec<RawRatingOption>,
) -> Result<Vec<RatingOption>, StrategyLoadError> {
    if raw.is_empty() {
        return Err(StrategyLoadError::invalid(
            "ratingOptions",
            "at least one rating option is required",
        ));
    }

    let mut seen = HashSet::new();
    let mut options = Vec::with_capacity(raw.len());
    for (index, option) in raw.into_iter().enumerate() {
        let field = format!("ratingOptions[{index}].value");
        let value = option
            .value
            .ok_or_else(|| StrategyLoadError::invalid(&field, "missing"))?;
        if value.fract() != 0.0 || !(1.0..=f64::from(u8::MAX)).contains(&value) {
            return Err(StrategyLoadError::invalid(
                &field,
                format!("{value} is not an integer between 1 and 255"),
            ));
        }
        let value = value as u8;
        if !seen.insert(value) {
            return Err(StrategyLoadError::invalid(
                &field,
                format!("duplicate rating value {value}"),
            ));
        }
        let label = option
            .label
            .filter(|label| !label.trim().is_empty())
            .unwrap_or_else(|| value.to_string());
        options.push(RatingOption { label, value });
    }

    let min = options.iter().map(|option| option.value).min();
    let max = options.iter().map(|option| option.value).max();
    if let (Some(min), Some(max)) = (min, max) {
        if (u16::from(min) + u16::from(max)) % 2 != 0 {
            return Err(StrategyLoadError::invalid(
                "ratingOptions",
                format!("scale {min}..{max} has no integral midpoint"),
            ));
        }
    }

    Ok(options)
}

fn validate_scoring(raw: RawScoringParameters) -> Result<ScoringParameters, StrategyLoadError> {
    let min_reliable_count = raw.min_reliable_count.ok_or(StrategyLoadError::MissingField(
        "scoringParameters.minReliableCount",
    ))?;
    if min_reliable_count < 1 {
        return Err(StrategyLoadError::invalid(
            "scoringParameters.minReliableCount",
            "must be at least 1",
        ));
    }
    let min_reliable_count = min_reliable_count as usize;

    let gender_adjustment_factor = raw.gender_adjustment_factor.ok_or(
        StrategyLoadError::MissingField("scoringParameters.genderAdjustmentFactor"),
    )?;
    require_range(
        "scoringParameters.genderAdjustmentFactor",
        gender_adjustment_factor,
        0.0,
        1.0,
    )?;

    let low_sample_tiers = validate_tiers(
        raw.low_sample_penalty.ok_or(StrategyLoadError::MissingField(
            "scoringParameters.lowSamplePenalty",
        ))?,
        min_reliable_count,
    )?;

    let variance_penalty = validate_variance(raw.variance_penalty.ok_or(
        StrategyLoadError::MissingField("scoringParameters.variancePenalty"),
    )?)?;

    let consistency_bonus = validate_consistency(raw.consistency_bonus.ok_or(
        StrategyLoadError::MissingField("scoringParameters.consistencyBonus"),
    )?)?;

    Ok(ScoringParameters {
        min_reliable_count,
        gender_adjustment_factor,
        low_sample_tiers,
        variance_penalty,
        consistency_bonus,
    })
}

fn validate_tiers(
    raw: RawLowSamplePenalty,
    min_reliable_count: usize,
) -> Result<Vec<PenaltyTier>, StrategyLoadError> {
    let has_expression = raw
        .expression
        .as_deref()
        .is_some_and(|expression| !expression.trim().is_empty());

    let raw_tiers = match raw.tiers {
        Some(tiers) if !tiers.is_empty() => {
            if has_expression {
                warn!("strategy declares both penalty tiers and an expression; using tiers");
            }
            tiers
        }
        _ if has_expression => return Err(StrategyLoadError::ExpressionUnsupported),
        Some(tiers) => tiers,
        None => {
            return Err(StrategyLoadError::MissingField(
                "scoringParameters.lowSamplePenalty.tiers",
            ))
        }
    };

    let mut tiers = Vec::with_capacity(raw_tiers.len());
    for (index, tier) in raw_tiers.into_iter().enumerate() {
        let prefix = format!("scoringParameters.lowSamplePenalty.tiers[{index}]");
        let max_count = tier
            .max_count
            .ok_or_else(|| StrategyLoadError::invalid(format!("{prefix}.maxCount"), "missing"))?;
        if max_count < 1 {
            return Err(StrategyLoadError::invalid(
                format!("{prefix}.maxCount"),
                "must be at least 1",
            ));
        }
        let factor = tier
            .factor
            .ok_or_else(|| StrategyLoadError::invalid(format!("{prefix}.factor"), "missing"))?;
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(StrategyLoadError::invalid(
                format!("{prefix}.factor"),
                format!("{factor} must be in (0, 1]"),
            ));
        }
        tiers.push(PenaltyTier {
            max_count: max_count as usize,
            factor,
        });
    }

    if min_reliable_count > 1 {
        let covered = tiers
            .iter()
            .any(|tier| tier.max_count >= min_reliable_count - 1);
        if !covered {
            return Err(StrategyLoadError::invalid(
                "scoringParameters.lowSamplePenalty.tiers",
                format!(
                    "tiers must cover every count below minReliableCount ({min_reliable_count})"
                ),
            ));
        }
    }

    Ok(tiers)
}

fn validate_variance(raw: RawVariancePenalty) -> Result<VariancePenalty, StrategyLoadError> {
    let threshold = raw.threshold.ok_or(StrategyLoadError::MissingField(
        "scoringParameters.variancePenalty.threshold",
    ))?;
    let max_effect_threshold = raw.max_effect_threshold.ok_or(StrategyLoadError::MissingField(
        "scoringParameters.variancePenalty.maxEffectThreshold",
    ))?;
    let max_penalty_ratio = raw.max_penalty_ratio.ok_or(StrategyLoadError::MissingField(
        "scoringParameters.variancePenalty.maxPenaltyRatio",
    ))?;

    if !threshold.is_finite() || threshold < 0.0 {
        return Err(StrategyLoadError::invalid(
            "scoringParameters.variancePenalty.threshold",
            "must be a non-negative number",
        ));
    }
    if !max_effect_threshold.is_finite() || max_effect_threshold <= threshold {
        return Err(StrategyLoadError::invalid(
            "scoringParameters.variancePenalty.maxEffectThreshold",
            format!("{max_effect_threshold} must exceed threshold {threshold}"),
        ));
    }
    require_range(
        "scoringParameters.variancePenalty.maxPenaltyRatio",
        max_penalty_ratio,
        0.0,
        1.0,
    )?;

    Ok(VariancePenalty {
        threshold,
        max_effect_threshold,
        max_penalty_ratio,
    })
}

fn validate_consistency(raw: RawConsistencyBonus) -> Result<ConsistencyBonus, StrategyLoadError> {
    let mean_threshold = raw.mean_threshold.ok_or(StrategyLoadError::MissingField(
        "scoringParameters.consistencyBonus.meanThreshold",
    ))?;
    let low_variance_threshold = raw.low_variance_threshold.ok_or(
        StrategyLoadError::MissingField("scoringParameters.consistencyBonus.lowVarianceThreshold"),
    )?;
    let bonus_factor = raw.bonus_factor.ok_or(StrategyLoadError::MissingField(
        "scoringParameters.consistencyBonus.bonusFactor",
    ))?;

    for (field, value) in [
        ("scoringParameters.consistencyBonus.meanThreshold", mean_threshold),
        (
            "scoringParameters.consistencyBonus.lowVarianceThreshold",
            low_variance_threshold,
        ),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(StrategyLoadError::invalid(
                field,
                "must be a non-negative number",
            ));
        }
    }
    if !bonus_factor.is_finite() || bonus_factor <= 0.0 {
        return Err(StrategyLoadError::invalid(
            "scoringParameters.consistencyBonus.bonusFactor",
            "must be a positive number",
        ));
    }

    Ok(ConsistencyBonus {
        mean_threshold,
        low_variance_threshold,
        bonus_factor,
    })
}

fn validate_groups(
    raw: BTreeMap<String, RawGroupSettings>,
) -> Result<HashMap<TraitId, GroupSettings>, StrategyLoadError> {
    let mut groups = HashMap::with_capacity(raw.len());
    for (key, settings) in raw {
        let id = key.trim();
        if id.is_empty() {
            return Err(StrategyLoadError::invalid(
                "traitGroups",
                "group ids must not be blank",
            ));
        }
        if !settings.weight.is_finite() || settings.weight < 0.0 {
            return Err(StrategyLoadError::invalid(
                format!("traitGroups.{id}.weight"),
                "must be a non-negative number",
            ));
        }
        groups.insert(
            TraitId::new(id),
            GroupSettings {
                name: settings.name,
                enabled: settings.enabled,
                weight: settings.weight,
                is_sexual_filter_target: settings.is_sexual_filter_target,
            },
        );
    }
    Ok(groups)
}

fn require_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), StrategyLoadError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(StrategyLoadError::invalid(
            field,
            format!("{value} must be between {min} and {max}"),
        ))
    }
}
