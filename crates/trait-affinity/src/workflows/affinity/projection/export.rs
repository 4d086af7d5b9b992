use super::{ProjectedRow, Projection};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Table,
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = ProjectionExportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(ProjectionExportError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Table => "table",
            Self::Json => "json",
            Self::Csv => "csv",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectionExportError {
    #[error("unknown export format '{0}' (expected table, json or csv)")]
    UnknownFormat(String),
    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to serialize json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv output was not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Flat, spreadsheet-friendly view of a projected row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub kind: &'static str,
    pub id: String,
    pub name: String,
    pub group: String,
    pub final_score: String,
    pub mean: String,
    pub variance: String,
    pub count: usize,
    pub factors: String,
    pub top_contributors: String,
}

impl From<&ProjectedRow> for ExportRow {
    fn from(row: &ProjectedRow) -> Self {
        Self {
            kind: if row.is_group { "group" } else { "trait" },
            id: row.id.to_string(),
            name: row.name.clone(),
            group: row.group_name.clone().unwrap_or_default(),
            final_score: format!("{:.2}", row.final_score),
            mean: format!("{:.3}", row.mean),
            variance: format!("{:.3}", row.variance),
            count: row.count,
            factors: row.factor_summary(),
            top_contributors: row
                .top_contributors
                .iter()
                .map(|contributor| {
                    format!(
                        "{} ({:+.2})",
                        contributor.character_name, contributor.contribution
                    )
                })
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl Projection {
    pub fn export_rows(&self) -> Vec<ExportRow> {
        self.rows().map(ExportRow::from).collect()
    }

    pub fn to_csv(&self) -> Result<String, ProjectionExportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in self.export_rows() {
            writer.serialize(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|err| csv::Error::from(err.into_error()))?;
        Ok(String::from_utf8(bytes)?)
    }

    pub fn to_json(&self) -> Result<String, ProjectionExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
