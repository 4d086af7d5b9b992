use std::fmt::Write;

use trait_affinity::workflows::affinity::persistence::SummaryReport;
use trait_affinity::workflows::affinity::projection::{ProjectedRow, ProjectionExportError};
use trait_affinity::workflows::affinity::sampling::LoadSummary;
use trait_affinity::workflows::affinity::{Projection, Strategy, WorkingSet};

pub(crate) fn projection_table(user_id: &str, strategy: &Strategy, projection: &Projection) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Trait affinity profile for {user_id}");
    let _ = writeln!(
        out,
        "Strategy: {} ({} v{}), {} rated characters, sorted by {}, min count {}",
        strategy.key,
        strategy.name,
        strategy.version,
        projection.rated_count,
        projection.sort,
        projection.min_count
    );

    if projection.is_empty() {
        let _ = writeln!(out, "\nNo traits meet the minimum count.");
        return out;
    }

    for section in &projection.sections {
        match &section.group {
            Some(header) => {
                let _ = writeln!(out, "\n{}", row_line(header, ""));
            }
            None => {
                let _ = writeln!(out, "\nUngrouped");
            }
        }
        for row in &section.traits {
            let _ = writeln!(out, "{}", row_line(row, "  - "));
        }
    }
    out
}

fn row_line(row: &ProjectedRow, prefix: &str) -> String {
    let mut line = format!(
        "{prefix}{}: {:+.2} (mean {:+.2}, variance {:.2}, n={})",
        row.name, row.final_score, row.mean, row.variance, row.count
    );
    if row.synthesized {
        line.push_str(" [no aggregate]");
    }
    if !row.factors.is_empty() {
        let _ = write!(line, " | {}", row.factor_summary());
    }
    if !row.top_contributors.is_empty() {
        let names = row
            .top_contributors
            .iter()
            .map(|contributor| contributor.character_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let _ = write!(line, " | top: {names}");
    }
    line
}

pub(crate) fn summary_table(summary: &SummaryReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Summary report for {} ({} rated characters)",
        summary.header.user_id, summary.rated_count
    );
    let _ = writeln!(
        out,
        "Ratings carry no trait details; showing the stored analysis without re-scoring."
    );

    if !summary.has_analysis() {
        let _ = writeln!(out, "\nNo trait analysis stored in the report.");
        return out;
    }

    let _ = writeln!(out);
    for (label, figures) in &summary.trait_analysis {
        let _ = writeln!(
            out,
            "- {label}: {} (mean {}, variance {}, n={})",
            signed(figures.final_score),
            signed(figures.mean_adjusted_score),
            figures
                .variance
                .map_or_else(|| "?".to_string(), |value| format!("{value:.2}")),
            figures
                .count
                .map_or_else(|| "?".to_string(), |count| count.to_string())
        );
    }
    out
}

fn signed(value: Option<f64>) -> String {
    value.map_or_else(|| "?".to_string(), |value| format!("{value:+.2}"))
}

pub(crate) fn summary_csv(summary: &SummaryReport) -> Result<String, ProjectionExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["label", "final_score", "mean", "variance", "count"])?;
    for (label, figures) in &summary.trait_analysis {
        let optional = |value: Option<f64>| value.map(|v| format!("{v:.3}")).unwrap_or_default();
        writer.write_record([
            label.clone(),
            optional(figures.final_score),
            optional(figures.mean_adjusted_score),
            optional(figures.variance),
            figures.count.map(|count| count.to_string()).unwrap_or_default(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

pub(crate) fn strategy_summary(strategy: &Strategy) -> String {
    let scoring = strategy.scoring();
    let mut out = String::new();
    let _ = writeln!(out, "{} ({}), version {}", strategy.name, strategy.key, strategy.version);
    let _ = writeln!(
        out,
        "Rating scale: {}..={} (midpoint {})",
        strategy.min_rating(),
        strategy.max_rating(),
        strategy.midpoint()
    );
    for option in strategy.rating_options() {
        let _ = writeln!(out, "  {} = {}", option.value, option.label);
    }

    let _ = writeln!(out, "Reliable after {} ratings", scoring.min_reliable_count);
    for tier in &scoring.low_sample_tiers {
        let _ = writeln!(out, "  up to {} ratings: x{:.3}", tier.max_count, tier.factor);
    }
    let _ = writeln!(
        out,
        "Gender adjustment factor: {:.2}",
        scoring.gender_adjustment_factor
    );
    let variance = &scoring.variance_penalty;
    let _ = writeln!(
        out,
        "Variance penalty: from {:.2}, full at {:.2}, up to {:.0}%",
        variance.threshold,
        variance.max_effect_threshold,
        variance.max_penalty_ratio * 100.0
    );
    let bonus = &scoring.consistency_bonus;
    let _ = writeln!(
        out,
        "Consistency bonus: x{:.2} when |mean| >= {:.2} and variance <= {:.2}",
        bonus.bonus_factor, bonus.mean_threshold, bonus.low_variance_threshold
    );

    let mut groups: Vec<_> = strategy.groups().iter().collect();
    groups.sort_by(|left, right| left.0.cmp(right.0));
    let _ = writeln!(out, "Trait groups: {}", groups.len());
    for (id, settings) in groups {
        let mut notes = Vec::new();
        if !settings.enabled {
            notes.push("disabled".to_string());
        }
        if settings.is_sexual_filter_target {
            notes.push("sexual".to_string());
        }
        if settings.weight != 1.0 {
            notes.push(format!("weight {:.2}", settings.weight));
        }
        let name = settings.name.as_deref().unwrap_or("unnamed");
        if notes.is_empty() {
            let _ = writeln!(out, "  {id} {name}");
        } else {
            let _ = writeln!(out, "  {id} {name} ({})", notes.join(", "));
        }
    }
    out
}

pub(crate) fn working_set_listing(summary: &LoadSummary, set: &WorkingSet) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Loaded {} batches ({} failed): {} received, {} selected",
        summary.batches,
        summary.failed_batches,
        summary.received,
        set.len()
    );
    for (index, character) in set.characters().iter().enumerate() {
        let sex = character.sex.map_or("?", |sex| sex.code());
        let _ = writeln!(
            out,
            "{:>4}. {} [{}] {} | {} | {} traits",
            index + 1,
            character.display_name(),
            character.id,
            sex,
            character.source_work.title,
            character.traits.len()
        );
    }
    out
}
