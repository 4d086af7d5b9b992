//! Read-side ordering and grouping of scored entries for display and export.

mod export;

pub use export::{ExportFormat, ExportRow, ProjectionExportError};

use super::domain::TraitId;
use super::scoring::{Contributor, EntityKey, ProfileScores, ScoreFactor, TraitScore};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Number of contributors carried on each projected row.
pub const TOP_CONTRIBUTORS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    FinalScore,
    #[serde(alias = "meanAdjustedScore")]
    Mean,
    Count,
    Variance,
    Name,
}

impl SortKey {
    pub const fn label(self) -> &'static str {
        match self {
            Self::FinalScore => "finalScore",
            Self::Mean => "mean",
            Self::Count => "count",
            Self::Variance => "variance",
            Self::Name => "name",
        }
    }

    fn compare(self, left: &TraitScore, right: &TraitScore) -> Ordering {
        match self {
            Self::FinalScore => right.final_score.total_cmp(&left.final_score),
            Self::Mean => right.mean.total_cmp(&left.mean),
            Self::Count => right.count.cmp(&left.count),
            Self::Variance => left.variance.total_cmp(&right.variance),
            Self::Name => left.name.cmp(&right.name),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort key '{0}' (expected finalScore, mean, count, variance or name)")]
pub struct UnknownSortKey(pub String);

impl FromStr for SortKey {
    type Err = UnknownSortKey;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "finalscore" | "final" | "score" => Ok(Self::FinalScore),
            "mean" | "meanadjustedscore" => Ok(Self::Mean),
            "count" => Ok(Self::Count),
            "variance" => Ok(Self::Variance),
            "name" => Ok(Self::Name),
            _ => Err(UnknownSortKey(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionOptions {
    pub min_count: usize,
    pub sort: SortKey,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            min_count: 1,
            sort: SortKey::FinalScore,
        }
    }
}

/// One displayed line: a trait, or a trait group header.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedRow {
    pub key: EntityKey,
    pub id: TraitId,
    pub name: String,
    pub is_group: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    pub count: usize,
    pub mean: f64,
    pub variance: f64,
    pub final_score: f64,
    pub factors: Vec<ScoreFactor>,
    pub top_contributors: Vec<Contributor>,
    /// Header stands in for a group with no aggregate of its own.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub synthesized: bool,
}

impl ProjectedRow {
    fn from_score(score: &TraitScore) -> Self {
        Self {
            key: score.key.clone(),
            id: score.key.id().clone(),
            name: score.name.clone(),
            is_group: score.is_group,
            group_name: score.group_name.clone(),
            count: score.count,
            mean: score.mean,
            variance: score.variance,
            final_score: score.final_score,
            factors: score.factors.clone(),
            top_contributors: score
                .contributors
                .iter()
                .take(TOP_CONTRIBUTORS)
                .cloned()
                .collect(),
            synthesized: false,
        }
    }

    fn placeholder_group(id: TraitId, name: String) -> Self {
        Self {
            key: EntityKey::Group(id.clone()),
            id,
            name,
            is_group: true,
            group_name: None,
            count: 0,
            mean: 0.0,
            variance: 0.0,
            final_score: 0.0,
            factors: Vec::new(),
            top_contributors: Vec::new(),
            synthesized: true,
        }
    }

    pub fn factor_summary(&self) -> String {
        if self.factors.is_empty() {
            return "none".to_string();
        }
        self.factors
            .iter()
            .map(ScoreFactor::summary)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A group header with the traits listed under it. The ungrouped section has no header.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<ProjectedRow>,
    pub traits: Vec<ProjectedRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub sort: SortKey,
    pub min_count: usize,
    pub rated_count: usize,
    pub sections: Vec<ProjectionSection>,
}

impl Projection {
    /// Header then member rows, section by section.
    pub fn rows(&self) -> impl Iterator<Item = &ProjectedRow> {
        self.sections
            .iter()
            .flat_map(|section| section.group.iter().chain(section.traits.iter()))
    }

    pub fn trait_count(&self) -> usize {
        self.sections.iter().map(|section| section.traits.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SectionKey {
    Group(TraitId),
    Ungrouped,
}

/// Filter, order and group scored entries. Never mutates `scores`.
pub fn project(scores: &ProfileScores, options: ProjectionOptions) -> Projection {
    let mut visible: Vec<&TraitScore> = scores
        .iter()
        .filter(|score| score.count >= options.min_count)
        .collect();

    visible.sort_by(|left, right| {
        options
            .sort
            .compare(left, right)
            .then_with(|| left.name.cmp(&right.name))
            .then_with(|| left.key.cmp(&right.key))
    });

    let mut sections: Vec<ProjectionSection> = Vec::new();
    let mut positions: HashMap<SectionKey, usize> = HashMap::new();

    for score in visible.iter().copied() {
        let section_key = match (&score.key, &score.group_id) {
            (EntityKey::Group(id), _) => SectionKey::Group(id.clone()),
            (EntityKey::Trait(_), Some(group)) => SectionKey::Group(group.clone()),
            (EntityKey::Trait(_), None) => SectionKey::Ungrouped,
        };

        let position = *positions.entry(section_key.clone()).or_insert_with(|| {
            let group = match &section_key {
                SectionKey::Ungrouped => None,
                SectionKey::Group(id) => Some(header_for(id, score, &visible)),
            };
            sections.push(ProjectionSection {
                group,
                traits: Vec::new(),
            });
            sections.len() - 1
        });

        if !score.is_group {
            sections[position].traits.push(ProjectedRow::from_score(score));
        }
    }

    Projection {
        sort: options.sort,
        min_count: options.min_count,
        rated_count: scores.rated_count,
        sections,
    }
}

fn header_for(id: &TraitId, first: &TraitScore, visible: &[&TraitScore]) -> ProjectedRow {
    let key = EntityKey::Group(id.clone());
    match visible.iter().find(|score| score.key == key) {
        Some(group) => ProjectedRow::from_score(group),
        None => {
            let name = first
                .group_name
                .clone()
                .unwrap_or_else(|| "Unknown group".to_string());
            ProjectedRow::placeholder_group(id.clone(), name)
        }
    }
}
