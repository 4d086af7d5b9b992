use super::{PersistenceError, APP_VERSION};
use crate::workflows::affinity::domain::{
    deserialize_sex, CharacterId, GenderPreference, LabelId, Sex, Trait, VnId,
};
use crate::workflows::affinity::ratings::{CharacterSnapshot, RatingOutcome, RatingRecord};
use crate::workflows::affinity::sampling::{CandidateFilter, SamplingRate, WorkingSet};
use crate::workflows::affinity::scoring::{ProfileScores, TraitScore};
use crate::workflows::affinity::session::{SessionSettings, TestSession};
use crate::workflows::affinity::strategy::Strategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Session settings carried at the top of every report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportHeader {
    #[serde(default = "unknown_user")]
    pub user_id: String,
    #[serde(default)]
    pub vn_labels: Vec<LabelId>,
    #[serde(default)]
    pub character_filters: CandidateFilter,
    #[serde(default)]
    pub user_gender_preference: GenderPreference,
    #[serde(default)]
    pub sampling_rate: SamplingRate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default)]
    pub filter_sexual: bool,
}

fn unknown_user() -> String {
    "N/A".to_string()
}

/// One rated character inside a report, trait objects included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRating {
    pub char_id: CharacterId,
    #[serde(default)]
    pub char_name: String,
    #[serde(default)]
    pub char_romaji_name: String,
    #[serde(default)]
    pub vn_id: Option<VnId>,
    #[serde(default)]
    pub vn_title: String,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub adjusted_score: Option<i16>,
    #[serde(default)]
    pub traits: Vec<Trait>,
    #[serde(default, deserialize_with = "deserialize_sex")]
    pub char_sex: Option<Sex>,
    #[serde(rename = "genderAdjustmentApplied", default)]
    pub gender_adjustment_applied: bool,
}

impl ReportRating {
    fn from_record(record: &RatingRecord) -> Option<Self> {
        let RatingOutcome::Rated {
            rating,
            adjusted_score,
        } = record.outcome
        else {
            return None;
        };
        Some(Self {
            char_id: record.character.id.clone(),
            char_name: record.character.name.clone(),
            char_romaji_name: record.character.romanized_name.clone(),
            vn_id: record.character.vn_id.clone(),
            vn_title: record.character.vn_title.clone(),
            rating: Some(rating),
            adjusted_score: Some(adjusted_score),
            traits: record.traits.clone(),
            char_sex: record.character.sex,
            gender_adjustment_applied: record.gender_adjustment_applied,
        })
    }

    fn into_record(self) -> Option<RatingRecord> {
        let rating = self.rating?;
        let name = if self.char_name.trim().is_empty() {
            self.char_romaji_name.clone()
        } else {
            self.char_name
        };
        Some(RatingRecord {
            character: CharacterSnapshot {
                id: self.char_id,
                name,
                romanized_name: self.char_romaji_name,
                sex: self.char_sex,
                vn_id: self.vn_id,
                vn_title: self.vn_title,
            },
            outcome: RatingOutcome::Rated {
                rating,
                adjusted_score: self.adjusted_score.unwrap_or_default(),
            },
            gender_adjustment_applied: self.gender_adjustment_applied,
            traits: self.traits,
        })
    }
}

/// Precomputed per-entity figures, keyed by display name in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitSummary {
    #[serde(default)]
    pub final_score: Option<f64>,
    #[serde(default)]
    pub mean_adjusted_score: Option<f64>,
    #[serde(default)]
    pub variance: Option<f64>,
    #[serde(default)]
    pub count: Option<usize>,
}

impl From<&TraitScore> for TraitSummary {
    fn from(score: &TraitScore) -> Self {
        Self {
            final_score: Some(score.final_score),
            mean_adjusted_score: Some(score.mean),
            variance: Some(score.variance),
            count: Some(score.count),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedReport {
    #[serde(flatten)]
    pub header: ReportHeader,
    pub rated_characters_count: usize,
    pub user_ratings: Vec<ReportRating>,
    pub trait_analysis: BTreeMap<String, TraitSummary>,
    pub app_version: String,
    pub export_date: DateTime<Utc>,
}

impl ExportedReport {
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Build the report for a session. Sessions without a rating cannot be exported.
pub fn export_report(session: &TestSession) -> Result<ExportedReport, PersistenceError> {
    let user_ratings: Vec<ReportRating> = session
        .ratings()
        .all_rated()
        .into_iter()
        .filter_map(ReportRating::from_record)
        .collect();
    if user_ratings.is_empty() {
        return Err(PersistenceError::EmptyReport);
    }

    let scores = session.score()?;
    let settings = session.settings();

    Ok(ExportedReport {
        header: ReportHeader {
            user_id: settings.user_id.clone(),
            vn_labels: settings.vn_labels.clone(),
            character_filters: settings.filter,
            user_gender_preference: settings.gender_preference,
            sampling_rate: settings.sampling_rate,
            strategy: Some(settings.strategy.clone()),
            filter_sexual: settings.filter_sexual,
        },
        rated_characters_count: user_ratings.len(),
        user_ratings,
        trait_analysis: summarize(&scores),
        app_version: APP_VERSION.to_string(),
        export_date: Utc::now(),
    })
}

fn summary_label(score: &TraitScore) -> String {
    match (&score.group_name, score.is_group) {
        (_, true) => format!("{} (Trait group)", score.name),
        (Some(group), false) => format!("{} ({group})", score.name),
        (None, false) => score.name.clone(),
    }
}

fn summarize(scores: &ProfileScores) -> BTreeMap<String, TraitSummary> {
    let mut analysis = BTreeMap::new();
    for score in scores.iter() {
        let mut label = summary_label(score);
        if analysis.contains_key(&label) {
            label = format!("{label} [{}]", score.key.id());
        }
        analysis.insert(label, TraitSummary::from(score));
    }
    analysis
}

/// A report whose ratings carry trait objects and can be scored again.
#[derive(Debug, Clone, PartialEq)]
pub struct FullReport {
    pub header: ReportHeader,
    pub ratings: Vec<ReportRating>,
}

impl FullReport {
    /// Rebuild a session holding the report's ratings under `strategy`.
    pub fn into_session(self, strategy: Arc<Strategy>) -> Result<TestSession, PersistenceError> {
        let settings = SessionSettings {
            user_id: self.header.user_id,
            vn_labels: self.header.vn_labels,
            filter: self.header.character_filters,
            gender_preference: self.header.user_gender_preference,
            sampling_rate: self.header.sampling_rate,
            strategy: strategy.key.clone(),
            filter_sexual: self.header.filter_sexual,
        };
        let records: Vec<RatingRecord> = self
            .ratings
            .into_iter()
            .filter_map(ReportRating::into_record)
            .collect();
        Ok(TestSession::restore(
            settings,
            Some(strategy),
            WorkingSet::default(),
            records,
            0,
        )?)
    }

    /// Score the report again. `filter_sexual` overrides the report's own flag when set.
    pub fn rescore(
        &self,
        strategy: Arc<Strategy>,
        filter_sexual: Option<bool>,
    ) -> Result<ProfileScores, PersistenceError> {
        let mut report = self.clone();
        if let Some(filter_sexual) = filter_sexual {
            report.header.filter_sexual = filter_sexual;
        }
        let session = report.into_session(strategy)?;
        let scores = session.score()?;
        info!(
            user = %session.settings().user_id,
            rated = scores.rated_count,
            entities = scores.len(),
            "imported report scored"
        );
        Ok(scores)
    }
}

/// A report without usable trait objects; only its precomputed analysis can be shown.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    #[serde(flatten)]
    pub header: ReportHeader,
    pub rated_count: usize,
    pub trait_analysis: BTreeMap<String, TraitSummary>,
}

impl SummaryReport {
    pub fn has_analysis(&self) -> bool {
        !self.trait_analysis.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportedReport {
    Full(FullReport),
    Summary(SummaryReport),
}

impl ImportedReport {
    pub fn from_json(raw: &str) -> Result<Self, PersistenceError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    /// Full fidelity requires the first rating to carry an array of trait objects.
    pub fn from_value(mut value: Value) -> Result<Self, PersistenceError> {
        let Some(document) = value.as_object_mut() else {
            return Err(PersistenceError::corrupt("report must be a JSON object"));
        };

        let ratings = document.remove("userRatings").unwrap_or(Value::Null);
        let analysis = document.remove("traitAnalysis").unwrap_or(Value::Null);
        let declared_count = document
            .get("ratedCharactersCount")
            .and_then(Value::as_u64)
            .map(|count| count as usize);
        let header: ReportHeader = serde_json::from_value(Value::Object(std::mem::take(document)))
            .map_err(|err| PersistenceError::corrupt(format!("report header: {err}")))?;

        if has_trait_objects(&ratings) {
            let ratings: Vec<ReportRating> = serde_json::from_value(ratings)
                .map_err(|err| PersistenceError::corrupt(format!("userRatings: {err}")))?;
            info!(user = %header.user_id, ratings = ratings.len(), "full report imported");
            return Ok(Self::Full(FullReport { header, ratings }));
        }

        let rated_count = declared_count.unwrap_or_else(|| ratings.as_array().map_or(0, Vec::len));
        let trait_analysis: BTreeMap<String, TraitSummary> = match analysis {
            Value::Null => BTreeMap::new(),
            other => serde_json::from_value(other)
                .map_err(|err| PersistenceError::corrupt(format!("traitAnalysis: {err}")))?,
        };
        warn!(
            user = %header.user_id,
            "report lacks trait objects; showing its summary only"
        );
        Ok(Self::Summary(SummaryReport {
            header,
            rated_count,
            trait_analysis,
        }))
    }

    pub fn header(&self) -> &ReportHeader {
        match self {
            Self::Full(report) => &report.header,
            Self::Summary(report) => &report.header,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }
}

fn has_trait_objects(ratings: &Value) -> bool {
    ratings
        .as_array()
        .and_then(|entries| entries.first())
        .and_then(|first| first.get("traits"))
        .and_then(Value::as_array)
        .is_some_and(|traits| traits.iter().all(Value::is_object))
}
