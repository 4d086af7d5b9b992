use super::{PersistenceError, APP_VERSION};
use crate::workflows::affinity::domain::{
    deserialize_sex, Character, CharacterId, GenderPreference, LabelId, Sex, Trait, VnId,
};
use crate::workflows::affinity::ratings::{CharacterSnapshot, RatingOutcome, RatingRecord};
use crate::workflows::affinity::sampling::{CandidateFilter, SamplingRate, WorkingSet};
use crate::workflows::affinity::session::{SessionSettings, TestSession};
use crate::workflows::affinity::strategy::StrategyCatalog;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One rating record as stored in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRating {
    pub character_id: CharacterId,
    #[serde(default)]
    pub character_name: String,
    #[serde(default)]
    pub romanized_name: String,
    #[serde(default, deserialize_with = "deserialize_sex")]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub vn_id: Option<VnId>,
    #[serde(default)]
    pub vn_title: String,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default)]
    pub gender_adjustment_applied: bool,
    #[serde(default)]
    pub traits: Vec<Trait>,
}

impl From<&RatingRecord> for SavedRating {
    fn from(record: &RatingRecord) -> Self {
        Self {
            character_id: record.character.id.clone(),
            character_name: record.character.name.clone(),
            romanized_name: record.character.romanized_name.clone(),
            sex: record.character.sex,
            vn_id: record.character.vn_id.clone(),
            vn_title: record.character.vn_title.clone(),
            rating: record.rating(),
            skipped: record.is_skipped(),
            gender_adjustment_applied: record.gender_adjustment_applied,
            traits: record.traits.clone(),
        }
    }
}

impl SavedRating {
    /// Adjusted scores are recomputed when the record is restored into a store.
    fn into_record(self) -> Result<RatingRecord, PersistenceError> {
        let outcome = match (self.rating, self.skipped) {
            (Some(_), true) => {
                return Err(PersistenceError::corrupt(format!(
                    "character {} is both rated and skipped",
                    self.character_id
                )))
            }
            (None, false) => {
                return Err(PersistenceError::corrupt(format!(
                    "character {} has neither a rating nor a skip",
                    self.character_id
                )))
            }
            (Some(rating), false) => RatingOutcome::Rated {
                rating,
                adjusted_score: 0,
            },
            (None, true) => RatingOutcome::Skipped,
        };

        Ok(RatingRecord {
            character: CharacterSnapshot {
                id: self.character_id,
                name: self.character_name,
                romanized_name: self.romanized_name,
                sex: self.sex,
                vn_id: self.vn_id,
                vn_title: self.vn_title,
            },
            outcome,
            gender_adjustment_applied: self.gender_adjustment_applied,
            traits: self.traits,
        })
    }
}

/// Everything needed to resume a session later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub user_id: String,
    #[serde(default)]
    pub vn_labels: Vec<LabelId>,
    #[serde(default)]
    pub character_filters: CandidateFilter,
    #[serde(default)]
    pub user_gender_preference: GenderPreference,
    #[serde(default)]
    pub sampling_rate: SamplingRate,
    pub strategy: String,
    #[serde(default)]
    pub filter_sexual: bool,
    #[serde(default)]
    pub test_characters_snapshot: Vec<Character>,
    #[serde(default)]
    pub user_ratings: Vec<SavedRating>,
    #[serde(default)]
    pub current_character_index: usize,
    #[serde(default = "default_true")]
    pub all_chunks_loaded: bool,
    pub app_version: String,
    pub saved_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl SessionSnapshot {
    pub fn capture(session: &TestSession) -> Self {
        let settings = session.settings();
        Self {
            user_id: settings.user_id.clone(),
            vn_labels: settings.vn_labels.clone(),
            character_filters: settings.filter,
            user_gender_preference: settings.gender_preference,
            sampling_rate: settings.sampling_rate,
            strategy: settings.strategy.clone(),
            filter_sexual: settings.filter_sexual,
            test_characters_snapshot: session.working_set().characters().to_vec(),
            user_ratings: session
                .ratings()
                .records()
                .iter()
                .map(SavedRating::from)
                .collect(),
            current_character_index: session.cursor(),
            all_chunks_loaded: session.working_set().is_fully_loaded(),
            app_version: APP_VERSION.to_string(),
            saved_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, PersistenceError> {
        let snapshot: Self = serde_json::from_str(raw)?;
        if snapshot.current_character_index > snapshot.test_characters_snapshot.len() {
            return Err(PersistenceError::corrupt(format!(
                "cursor {} is past the {} saved characters",
                snapshot.current_character_index,
                snapshot.test_characters_snapshot.len()
            )));
        }
        Ok(snapshot)
    }

    /// Rebuild the session, resolving its strategy through `catalog`.
    pub fn into_session(self, catalog: &StrategyCatalog) -> Result<TestSession, PersistenceError> {
        let strategy = catalog.load(&self.strategy)?;
        let records = self
            .user_ratings
            .into_iter()
            .map(SavedRating::into_record)
            .collect::<Result<Vec<_>, _>>()?;

        let settings = SessionSettings {
            user_id: self.user_id,
            vn_labels: self.vn_labels,
            filter: self.character_filters,
            gender_preference: self.user_gender_preference,
            sampling_rate: self.sampling_rate,
            strategy: self.strategy,
            filter_sexual: self.filter_sexual,
        };
        let started = !self.test_characters_snapshot.is_empty();
        let working_set = WorkingSet::from_parts(
            self.test_characters_snapshot,
            started,
            self.all_chunks_loaded,
        );

        Ok(TestSession::restore(
            settings,
            Some(strategy),
            working_set,
            records,
            self.current_character_index,
        )?)
    }
}
