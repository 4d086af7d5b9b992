use super::domain::{deserialize_sex, Character, CharacterId, GenderPreference, Sex, Trait, VnId};
use super::strategy::Strategy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identity of the rated character, frozen at rating time for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSnapshot {
    pub id: CharacterId,
    pub name: String,
    #[serde(default)]
    pub romanized_name: String,
    #[serde(default, deserialize_with = "deserialize_sex")]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub vn_id: Option<VnId>,
    #[serde(default)]
    pub vn_title: String,
}

impl CharacterSnapshot {
    pub fn of(character: &Character) -> Self {
        Self {
            id: character.id.clone(),
            name: character.display_name().to_string(),
            romanized_name: character.name.clone(),
            sex: character.sex,
            vn_id: character.source_work.id.clone(),
            vn_title: character.source_work.title.clone(),
        }
    }
}

/// What the user did with a character: a rating or a skip, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RatingOutcome {
    Rated { rating: u8, adjusted_score: i16 },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub character: CharacterSnapshot,
    pub outcome: RatingOutcome,
    pub gender_adjustment_applied: bool,
    pub traits: Vec<Trait>,
}

impl RatingRecord {
    pub fn character_id(&self) -> &CharacterId {
        &self.character.id
    }

    pub fn rating(&self) -> Option<u8> {
        match self.outcome {
            RatingOutcome::Rated { rating, .. } => Some(rating),
            RatingOutcome::Skipped => None,
        }
    }

    pub fn adjusted_score(&self) -> Option<i16> {
        match self.outcome {
            RatingOutcome::Rated { adjusted_score, .. } => Some(adjusted_score),
            RatingOutcome::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, RatingOutcome::Skipped)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RatingError {
    #[error("rating {value} is not on the {min}..={max} scale")]
    OutOfScale { value: u8, min: u8, max: u8 },
}

/// Scale facts the store needs to turn a raw rating into a record. The
/// default scale is empty and rejects every rating.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RatingScale {
    values: Vec<u8>,
    midpoint: i16,
}

impl RatingScale {
    pub fn of(strategy: &Strategy) -> Self {
        Self {
            values: strategy
                .rating_options()
                .iter()
                .map(|option| option.value)
                .collect(),
            midpoint: strategy.midpoint(),
        }
    }

    pub fn midpoint(&self) -> i16 {
        self.midpoint
    }

    fn check(&self, value: u8) -> Result<i16, RatingError> {
        if self.values.contains(&value) {
            Ok(i16::from(value) - self.midpoint)
        } else {
            Err(RatingError::OutOfScale {
                value,
                min: self.values.iter().copied().min().unwrap_or_default(),
                max: self.values.iter().copied().max().unwrap_or_default(),
            })
        }
    }
}

/// Ordered per-character outcomes. A later outcome for the same character
/// replaces the earlier one in place.
#[derive(Debug, Clone)]
pub struct RatingStore {
    scale: RatingScale,
    preference: GenderPreference,
    records: Vec<RatingRecord>,
    index: HashMap<CharacterId, usize>,
}

impl RatingStore {
    pub fn new(scale: RatingScale, preference: GenderPreference) -> Self {
        Self {
            scale,
            preference,
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn preference(&self) -> GenderPreference {
        self.preference
    }

    pub fn scale(&self) -> &RatingScale {
        &self.scale
    }

    pub fn record_rating(
        &mut self,
        character: &Character,
        rating: u8,
    ) -> Result<&RatingRecord, RatingError> {
        let adjusted_score = self.scale.check(rating)?;
        let record = RatingRecord {
            character: CharacterSnapshot::of(character),
            outcome: RatingOutcome::Rated {
                rating,
                adjusted_score,
            },
            gender_adjustment_applied: self.preference.mismatches(character.sex),
            traits: character.traits.clone(),
        };
        Ok(self.upsert(record))
    }

    pub fn record_skip(&mut self, character: &Character) -> &RatingRecord {
        let record = RatingRecord {
            character: CharacterSnapshot::of(character),
            outcome: RatingOutcome::Skipped,
            gender_adjustment_applied: false,
            traits: character.traits.clone(),
        };
        self.upsert(record)
    }

    /// Insert a record rebuilt elsewhere (snapshot restore, report import),
    /// keeping replace-by-character semantics.
    pub fn restore(&mut self, record: RatingRecord) -> Result<&RatingRecord, RatingError> {
        if let RatingOutcome::Rated { rating, .. } = record.outcome {
            let adjusted_score = self.scale.check(rating)?;
            let record = RatingRecord {
                outcome: RatingOutcome::Rated {
                    rating,
                    adjusted_score,
                },
                ..record
            };
            return Ok(self.upsert(record));
        }
        Ok(self.upsert(record))
    }

    fn upsert(&mut self, record: RatingRecord) -> &RatingRecord {
        let position = match self.index.get(record.character_id()) {
            Some(&position) => {
                self.records[position] = record;
                position
            }
            None => {
                self.index
                    .insert(record.character_id().clone(), self.records.len());
                self.records.push(record);
                self.records.len() - 1
            }
        };
        &self.records[position]
    }

    /// Rated (non-skipped) records in insertion order.
    pub fn all_rated(&self) -> Vec<&RatingRecord> {
        self.records
            .iter()
            .filter(|record| !record.is_skipped())
            .collect()
    }

    pub fn records(&self) -> &[RatingRecord] {
        &self.records
    }

    pub fn get(&self, id: &CharacterId) -> Option<&RatingRecord> {
        self.index.get(id).map(|&position| &self.records[position])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn rated_count(&self) -> usize {
        self.records.len() - self.skipped_count()
    }

    pub fn skipped_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.is_skipped())
            .count()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }
}
