use super::{
    ConsistencyBonus, GroupSettings, PenaltyTier, RatingOption, ScoringParameters, Strategy,
    VariancePenalty,
};
use crate::workflows::affinity::domain::TraitId;
use std::collections::HashMap;

pub(crate) const STANDARD_KEY: &str = "standard";

const RATING_LABELS: [(&str, u8); 7] = [
    ("Strongly dislike", 1),
    ("Dislike", 2),
    ("Slightly dislike", 3),
    ("Indifferent", 4),
    ("Slightly like", 5),
    ("Like", 6),
    ("Strongly like", 7),
];

/// VNDB top-level trait groups: (id, name, sexual content).
const TRAIT_GROUPS: [(&str, &str, bool); 11] = [
    ("i1", "Hair", false),
    ("i35", "Eyes", false),
    ("i36", "Body", false),
    ("i37", "Clothes", false),
    ("i38", "Items", false),
    ("i39", "Personality", false),
    ("i40", "Role", false),
    ("i41", "Engages in", false),
    ("i42", "Subject of", false),
    ("i43", "Engages in (Sexual)", true),
    ("i1625", "Subject of (Sexual)", true),
];

/// Built-in strategy: seven-point scale, three ratings for a reliable
/// signal, tier factors of sqrt(n / 3).
pub(crate) fn standard_strategy() -> Strategy {
    let rating_options = RATING_LABELS
        .iter()
        .map(|(label, value)| RatingOption {
            label: (*label).to_string(),
            value: *value,
        })
        .collect();

    let groups: HashMap<TraitId, GroupSettings> = TRAIT_GROUPS
        .iter()
        .map(|(id, name, sexual)| {
            (
                TraitId::from(*id),
                GroupSettings {
                    name: Some((*name).to_string()),
                    enabled: true,
                    weight: 1.0,
                    is_sexual_filter_target: *sexual,
                },
            )
        })
        .collect();

    Strategy {
        key: STANDARD_KEY.to_string(),
        name: "Standard".to_string(),
        version: "1.1.5".to_string(),
        rating_options,
        scoring: ScoringParameters {
            min_reliable_count: 3,
            gender_adjustment_factor: 0.75,
            low_sample_tiers: vec![
                PenaltyTier {
                    max_count: 1,
                    factor: (1.0_f64 / 3.0).sqrt(),
                },
                PenaltyTier {
                    max_count: 2,
                    factor: (2.0_f64 / 3.0).sqrt(),
                },
            ],
            variance_penalty: VariancePenalty {
                threshold: 0.8,
                max_effect_threshold: 1.5,
                max_penalty_ratio: 0.5,
            },
            consistency_bonus: ConsistencyBonus {
                mean_threshold: 0.5,
                low_variance_threshold: 0.5,
                bonus_factor: 1.2,
            },
        },
        groups,
    }
}
