use crate::render;
use clap::Args;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use trait_affinity::config::AppConfig;
use trait_affinity::error::AppError;
use trait_affinity::telemetry;
use trait_affinity::workflows::affinity::{
    load_characters, project, CandidateFilter, Character, CharacterSampler, ExportFormat,
    GenderPreference, ImportedReport, ProjectionOptions, RoleFilter, SamplingRate, SortKey,
    StaticCharacterSource, StrategyCatalog, WorkingSet,
};
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Exported report (JSON) to score
    #[arg(long)]
    pub(crate) report: PathBuf,
    /// Strategy key or path. Defaults to the report's strategy, then APP_STRATEGY
    #[arg(long)]
    pub(crate) strategy: Option<String>,
    /// Sort key: finalScore, mean, count, variance or name
    #[arg(long, value_parser = parse_sort)]
    pub(crate) sort: Option<SortKey>,
    /// Hide entries backed by fewer ratings (defaults to APP_MIN_COUNT)
    #[arg(long)]
    pub(crate) min_count: Option<usize>,
    /// Drop traits from sexual trait groups
    #[arg(long)]
    pub(crate) filter_sexual: bool,
    /// Output format: table, json or csv
    #[arg(long, value_parser = parse_format, default_value = "table")]
    pub(crate) format: ExportFormat,
}

#[derive(Args, Debug)]
pub(crate) struct StrategyCheckArgs {
    /// Strategy key under the strategy directory, or a path to a JSON document
    pub(crate) reference: String,
}

#[derive(Args, Debug)]
pub(crate) struct SampleArgs {
    /// JSON array of characters to draw from
    #[arg(long)]
    pub(crate) characters: PathBuf,
    /// Percentage of each eligible batch to keep (1-100)
    #[arg(long, value_parser = parse_rate, default_value = "100")]
    pub(crate) rate: SamplingRate,
    /// Keep only characters of this sex: any, m, f, b or n
    #[arg(long, value_parser = parse_gender, default_value = "any")]
    pub(crate) gender: GenderPreference,
    /// Keep only characters with this role: any, main, primary or side
    #[arg(long, value_parser = parse_role, default_value = "any")]
    pub(crate) role: RoleFilter,
    /// Highest trait spoiler level to keep on sampled characters
    #[arg(long, default_value_t = 0)]
    pub(crate) max_spoiler: u8,
    /// Seed for a reproducible selection
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Characters per upstream batch; sampling applies to each batch separately
    #[arg(long, default_value_t = 100)]
    pub(crate) batch_size: usize,
}

pub(crate) fn parse_sort(raw: &str) -> Result<SortKey, String> {
    raw.parse::<SortKey>().map_err(|err| err.to_string())
}

pub(crate) fn parse_format(raw: &str) -> Result<ExportFormat, String> {
    raw.parse::<ExportFormat>().map_err(|err| err.to_string())
}

pub(crate) fn parse_rate(raw: &str) -> Result<SamplingRate, String> {
    let percent = raw
        .trim()
        .parse::<u8>()
        .map_err(|err| format!("failed to parse '{raw}' as a percentage ({err})"))?;
    SamplingRate::new(percent).map_err(|err| err.to_string())
}

pub(crate) fn parse_gender(raw: &str) -> Result<GenderPreference, String> {
    GenderPreference::parse(raw)
        .ok_or_else(|| format!("unknown gender '{raw}' (expected any, m, f, b or n)"))
}

pub(crate) fn parse_role(raw: &str) -> Result<RoleFilter, String> {
    RoleFilter::parse(raw)
        .ok_or_else(|| format!("unknown role '{raw}' (expected any, main, primary or side)"))
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let raw = std::fs::read_to_string(&args.report)?;
    let full = match ImportedReport::from_json(&raw)? {
        ImportedReport::Full(full) => full,
        ImportedReport::Summary(summary) => {
            let output = match args.format {
                ExportFormat::Table => render::summary_table(&summary),
                ExportFormat::Json => serde_json::to_string_pretty(&summary)? + "\n",
                ExportFormat::Csv => render::summary_csv(&summary)?,
            };
            print!("{output}");
            return Ok(());
        }
    };

    let catalog = StrategyCatalog::new(&config.scoring.strategy_dir);
    let reference = args
        .strategy
        .as_deref()
        .or(full.header.strategy.as_deref())
        .unwrap_or(&config.scoring.default_strategy);
    let strategy = catalog.load(reference)?;

    let scores = full.rescore(Arc::clone(&strategy), args.filter_sexual.then_some(true))?;
    let projection = project(
        &scores,
        ProjectionOptions {
            min_count: args.min_count.unwrap_or(config.scoring.min_count),
            sort: args.sort.unwrap_or_default(),
        },
    );
    info!(
        report = %args.report.display(),
        strategy = %strategy.key,
        traits = projection.trait_count(),
        "report projected"
    );

    let output = match args.format {
        ExportFormat::Table => render::projection_table(&full.header.user_id, &strategy, &projection),
        ExportFormat::Json => projection.to_json()? + "\n",
        ExportFormat::Csv => projection.to_csv()?,
    };
    print!("{output}");
    Ok(())
}

pub(crate) fn run_strategy_check(args: StrategyCheckArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let catalog = StrategyCatalog::new(&config.scoring.strategy_dir);
    let strategy = catalog.load(&args.reference)?;
    print!("{}", render::strategy_summary(&strategy));
    Ok(())
}

pub(crate) fn run_strategy_list() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let catalog = StrategyCatalog::new(&config.scoring.strategy_dir);
    for key in catalog.available() {
        let marker = if key == config.scoring.default_strategy {
            " (default)"
        } else {
            ""
        };
        println!("- {key}{marker}");
    }
    Ok(())
}

pub(crate) async fn run_sample(args: SampleArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let raw = std::fs::read_to_string(&args.characters)?;
    let characters: Vec<Character> = serde_json::from_str(&raw)?;
    let mut source = StaticCharacterSource::chunked(characters, args.batch_size);

    let filter = CandidateFilter {
        gender: args.gender,
        role: args.role,
        max_spoiler: args.max_spoiler,
    };
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut sampler = CharacterSampler::new(filter, args.rate, rng);
    let mut set = WorkingSet::default();
    let cancel = AtomicBool::new(false);

    let summary = load_characters(&mut source, &mut sampler, &mut set, &cancel).await?;
    print!("{}", render::working_set_listing(&summary, &set));
    Ok(())
}
