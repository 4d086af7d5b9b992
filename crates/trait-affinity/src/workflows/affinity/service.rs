use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::domain::TraitId;
use super::persistence::{ImportedReport, PersistenceError, SummaryReport};
use super::projection::{project, Projection, ProjectionOptions, SortKey};
use super::strategy::{
    GroupSettings, RatingOption, ScoringParameters, Strategy, StrategyCatalog, StrategyLoadError,
};

/// Fallbacks applied when a request leaves a knob unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDefaults {
    pub strategy: String,
    pub min_count: usize,
}

impl Default for ProfileDefaults {
    fn default() -> Self {
        Self {
            strategy: "standard".to_string(),
            min_count: 1,
        }
    }
}

/// Body of a scoring request: an exported report plus optional overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    pub report: Value,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub sort: Option<SortKey>,
    #[serde(default)]
    pub min_count: Option<usize>,
    #[serde(default)]
    pub filter_sexual: Option<bool>,
}

impl ScoreRequest {
    pub fn for_report(report: Value) -> Self {
        Self {
            report,
            strategy: None,
            sort: None,
            min_count: None,
            filter_sexual: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum ScoreResponse {
    #[serde(rename_all = "camelCase")]
    Full {
        user_id: String,
        strategy: String,
        strategy_version: String,
        projection: Projection,
    },
    Summary {
        summary: SummaryReport,
    },
}

/// Strategy as exposed to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyView {
    pub key: String,
    pub name: String,
    pub version: String,
    pub midpoint: i16,
    pub rating_options: Vec<RatingOption>,
    pub scoring: ScoringParameters,
    pub groups: BTreeMap<TraitId, GroupSettings>,
}

impl From<&Strategy> for StrategyView {
    fn from(strategy: &Strategy) -> Self {
        Self {
            key: strategy.key.clone(),
            name: strategy.name.clone(),
            version: strategy.version.clone(),
            midpoint: strategy.midpoint(),
            rating_options: strategy.rating_options().to_vec(),
            scoring: strategy.scoring().clone(),
            groups: strategy
                .groups()
                .iter()
                .map(|(id, settings)| (id.clone(), settings.clone()))
                .collect(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileServiceError {
    #[error(transparent)]
    Strategy(#[from] StrategyLoadError),
    #[error(transparent)]
    Report(#[from] PersistenceError),
}

/// Scores uploaded reports against catalog strategies.
pub struct ProfileService {
    catalog: Arc<StrategyCatalog>,
    defaults: ProfileDefaults,
}

impl ProfileService {
    pub fn new(catalog: Arc<StrategyCatalog>, defaults: ProfileDefaults) -> Self {
        Self { catalog, defaults }
    }

    pub fn catalog(&self) -> &StrategyCatalog {
        &self.catalog
    }

    pub fn defaults(&self) -> &ProfileDefaults {
        &self.defaults
    }

    /// Full reports are scored again and projected; summary reports come back as they are.
    pub fn score(&self, request: ScoreRequest) -> Result<ScoreResponse, ProfileServiceError> {
        let report = ImportedReport::from_value(request.report)?;
        let full = match report {
            ImportedReport::Summary(summary) => return Ok(ScoreResponse::Summary { summary }),
            ImportedReport::Full(full) => full,
        };

        let reference = request
            .strategy
            .as_deref()
            .or(full.header.strategy.as_deref())
            .unwrap_or(&self.defaults.strategy);
        let strategy = self.catalog.load_key(reference)?;

        let scores = full.rescore(Arc::clone(&strategy), request.filter_sexual)?;
        let projection = project(
            &scores,
            ProjectionOptions {
                min_count: request.min_count.unwrap_or(self.defaults.min_count),
                sort: request.sort.unwrap_or_default(),
            },
        );

        info!(
            user = %full.header.user_id,
            strategy = %strategy.key,
            traits = projection.trait_count(),
            "report scored"
        );

        Ok(ScoreResponse::Full {
            user_id: full.header.user_id,
            strategy: strategy.key.clone(),
            strategy_version: strategy.version.clone(),
            projection,
        })
    }

    pub fn strategy(&self, reference: &str) -> Result<StrategyView, ProfileServiceError> {
        let strategy = self.catalog.load_key(reference)?;
        Ok(StrategyView::from(strategy.as_ref()))
    }

    pub fn strategy_keys(&self) -> Vec<String> {
        self.catalog.available()
    }
}
