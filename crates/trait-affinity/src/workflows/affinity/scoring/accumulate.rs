use super::{Contributor, EntityKey};
use crate::workflows::affinity::domain::TraitId;
use crate::workflows::affinity::ratings::RatingRecord;
use crate::workflows::affinity::strategy::Strategy;
use std::collections::BTreeMap;

/// Raw per-entity sums gathered from rating records before any adjustment.
#[derive(Debug, Clone, Default)]
pub(crate) struct Accumulator {
    pub name: String,
    pub group_id: Option<TraitId>,
    pub group_name: Option<String>,
    pub scores: Vec<f64>,
    pub contributors: Vec<Contributor>,
    pub gender_adjusted: usize,
}

impl Accumulator {
    fn push(&mut self, record: &RatingRecord, value: f64) {
        self.scores.push(value);
        if record.gender_adjustment_applied {
            self.gender_adjusted += 1;
        }
        self.contributors.push(Contributor {
            character_id: record.character.id.clone(),
            character_name: record.character.name.clone(),
            vn_title: record.character.vn_title.clone(),
            contribution: value,
        });
    }

    pub fn count(&self) -> usize {
        self.scores.len()
    }

    pub fn mean(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().sum::<f64>() / self.scores.len() as f64
    }

    /// Population variance.
    pub fn variance(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        self.scores
            .iter()
            .map(|score| (score - mean).powi(2))
            .sum::<f64>()
            / self.scores.len() as f64
    }
}

/// Fold rated records into trait and group accumulators.
///
/// Skipped records contribute nothing. Traits whose group is disabled, or is a
/// sexual-content group while `filter_sexual` is set, are ignored entirely.
pub(crate) fn accumulate<'a, I>(
    records: I,
    strategy: &Strategy,
    filter_sexual: bool,
) -> (usize, BTreeMap<EntityKey, Accumulator>)
where
    I: IntoIterator<Item = &'a RatingRecord>,
{
    let gender_factor = strategy.scoring().gender_adjustment_factor;
    let mut entries: BTreeMap<EntityKey, Accumulator> = BTreeMap::new();
    let mut rated = 0;

    for record in records {
        let Some(adjusted) = record.adjusted_score() else {
            continue;
        };
        rated += 1;

        let mut effective = f64::from(adjusted);
        if record.gender_adjustment_applied {
            effective *= gender_factor;
        }

        for item in &record.traits {
            if let Some(group) = &item.group_id {
                if !strategy.admits_group(group, filter_sexual) {
                    continue;
                }
            }

            let group_name = item.group_id.as_ref().map(|group| {
                strategy
                    .group_settings(group)
                    .and_then(|settings| settings.name.clone())
                    .or_else(|| item.group_name.clone())
                    .unwrap_or_else(|| group.to_string())
            });

            let trait_entry = entries
                .entry(EntityKey::Trait(item.id.clone()))
                .or_insert_with(|| Accumulator {
                    name: item.name.clone(),
                    group_id: item.group_id.clone(),
                    group_name: group_name.clone(),
                    ..Accumulator::default()
                });
            trait_entry.push(record, effective);

            if let (Some(group), Some(group_name)) = (&item.group_id, group_name) {
                let weight = strategy.group_weight(group);
                entries
                    .entry(EntityKey::Group(group.clone()))
                    .or_insert_with(|| Accumulator {
                        name: group_name,
                        ..Accumulator::default()
                    })
                    .push(record, effective * weight);
            }
        }
    }

    (rated, entries)
}
