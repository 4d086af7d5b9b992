//! Aggregation of rating records into per-trait and per-group affinity scores.

mod accumulate;
mod adjustments;

use super::domain::{CharacterId, GenderPreference, TraitId};
use super::ratings::RatingRecord;
use super::strategy::Strategy;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Traits and trait groups live in separate namespaces even though VNDB
/// gives them ids of the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    Trait(TraitId),
    Group(TraitId),
}

impl EntityKey {
    pub fn id(&self) -> &TraitId {
        match self {
            Self::Trait(id) | Self::Group(id) => id,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trait(id) => write!(f, "trait:{id}"),
            Self::Group(id) => write!(f, "group:{id}"),
        }
    }
}

impl Serialize for EntityKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// An adjustment that fired while scoring one entity, in application order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreFactor {
    GenderPreference {
        preference: GenderPreference,
        adjusted_contributors: usize,
    },
    LowSamplePenalty {
        count: usize,
        factor: f64,
    },
    VariancePenalty {
        variance: f64,
        factor: f64,
    },
    ConsistencyBonus {
        factor: f64,
    },
    GroupWeight {
        weight: f64,
    },
}

impl ScoreFactor {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::GenderPreference { .. } => "Gender preference",
            Self::LowSamplePenalty { .. } => "Low sample penalty",
            Self::VariancePenalty { .. } => "Variance penalty",
            Self::ConsistencyBonus { .. } => "Consistency bonus",
            Self::GroupWeight { .. } => "Group weight",
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Self::GenderPreference {
                preference,
                adjusted_contributors,
            } if *adjusted_contributors > 0 => format!(
                "preference {}; {adjusted_contributors} rating(s) down-weighted",
                preference.code()
            ),
            Self::GenderPreference { preference, .. } => {
                format!("preference {}; no ratings adjusted", preference.code())
            }
            Self::LowSamplePenalty { count, factor } => {
                format!("only {count} rating(s), x{factor:.2}")
            }
            Self::VariancePenalty { variance, factor } => {
                format!("variance {variance:.2}, x{factor:.2}")
            }
            Self::ConsistencyBonus { factor } => format!("consistent ratings, x{factor:.2}"),
            Self::GroupWeight { weight } => format!("group weight x{weight:.2}"),
        }
    }
}

/// Character whose rating fed an aggregate, with the value it contributed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contributor {
    pub character_id: CharacterId,
    pub character_name: String,
    pub vn_title: String,
    pub contribution: f64,
}

/// Scored trait or trait group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitScore {
    pub key: EntityKey,
    pub name: String,
    pub is_group: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<TraitId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    pub count: usize,
    pub mean: f64,
    pub variance: f64,
    pub final_score: f64,
    pub factors: Vec<ScoreFactor>,
    pub contributors: Vec<Contributor>,
}

impl TraitScore {
    pub fn has_factor(&self, predicate: impl Fn(&ScoreFactor) -> bool) -> bool {
        self.factors.iter().any(predicate)
    }
}

/// Output of one scoring pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileScores {
    pub rated_count: usize,
    pub entries: BTreeMap<EntityKey, TraitScore>,
}

impl ProfileScores {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &EntityKey) -> Option<&TraitScore> {
        self.entries.get(key)
    }

    pub fn trait_score(&self, id: &str) -> Option<&TraitScore> {
        self.entries.get(&EntityKey::Trait(TraitId::from(id)))
    }

    pub fn group_score(&self, id: &str) -> Option<&TraitScore> {
        self.entries.get(&EntityKey::Group(TraitId::from(id)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TraitScore> {
        self.entries.values()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoringOptions {
    pub preference: GenderPreference,
    pub filter_sexual: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoringError {
    #[error("no scoring strategy is loaded for this session")]
    MissingStrategy,
}

/// Deterministic, side-effect free scorer bound to one strategy.
pub struct ScoringEngine {
    strategy: Arc<Strategy>,
}

impl ScoringEngine {
    pub fn new(strategy: Arc<Strategy>) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn score<'a, I>(&self, records: I, options: &ScoringOptions) -> ProfileScores
    where
        I: IntoIterator<Item = &'a RatingRecord>,
    {
        let (rated_count, accumulators) =
            accumulate::accumulate(records, &self.strategy, options.filter_sexual);

        let entries: BTreeMap<EntityKey, TraitScore> = accumulators
            .into_iter()
            .filter(|(_, accumulator)| accumulator.count() > 0)
            .map(|(key, accumulator)| {
                let score =
                    adjustments::finalize(&key, accumulator, &self.strategy, options.preference);
                (key, score)
            })
            .collect();

        debug!(
            strategy = %self.strategy.key,
            rated = rated_count,
            entities = entries.len(),
            "scoring pass complete"
        );

        ProfileScores {
            rated_count,
            entries,
        }
    }
}
