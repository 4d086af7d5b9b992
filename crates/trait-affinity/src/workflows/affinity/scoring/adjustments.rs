use super::accumulate::Accumulator;
use super::{EntityKey, ScoreFactor, TraitScore};
use crate::workflows::affinity::domain::GenderPreference;
use crate::workflows::affinity::strategy::Strategy;
use std::cmp::Ordering;

/// Turn an accumulator into a scored entry by running the strategy's
/// adjustment pipeline: low-sample penalty, variance penalty, consistency
/// bonus, then group weight.
pub(crate) fn finalize(
    key: &EntityKey,
    accumulator: Accumulator,
    strategy: &Strategy,
    preference: GenderPreference,
) -> TraitScore {
    let parameters = strategy.scoring();
    let count = accumulator.count();
    let mean = accumulator.mean();
    let variance = accumulator.variance();

    let mut factors = Vec::new();
    if preference != GenderPreference::Any {
        factors.push(ScoreFactor::GenderPreference {
            preference,
            adjusted_contributors: accumulator.gender_adjusted,
        });
    }

    let mut final_score = mean;

    let low_sample = parameters.low_sample_factor(count);
    if let Some(factor) = low_sample {
        final_score *= factor;
        factors.push(ScoreFactor::LowSamplePenalty { count, factor });
    }

    if let Some(factor) = parameters.variance_penalty.factor_for(variance) {
        final_score *= factor;
        factors.push(ScoreFactor::VariancePenalty { variance, factor });
    }

    let bonus = parameters.consistency_bonus;
    if low_sample.is_none() && bonus.qualifies(mean, variance) {
        final_score *= bonus.bonus_factor;
        factors.push(ScoreFactor::ConsistencyBonus {
            factor: bonus.bonus_factor,
        });
    }

    if let EntityKey::Group(group) = key {
        let weight = strategy.group_weight(group);
        if weight != 1.0 {
            final_score *= weight;
            factors.push(ScoreFactor::GroupWeight { weight });
        }
    }

    let mut contributors = accumulator.contributors;
    contributors.sort_by(|left, right| {
        right
            .contribution
            .partial_cmp(&left.contribution)
            .unwrap_or(Ordering::Equal)
    });

    TraitScore {
        key: key.clone(),
        name: accumulator.name,
        is_group: key.is_group(),
        group_id: accumulator.group_id,
        group_name: accumulator.group_name,
        count,
        mean,
        variance,
        final_score,
        factors,
        contributors,
    }
}
