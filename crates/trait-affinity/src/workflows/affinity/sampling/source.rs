use super::{BatchOutcome, CharacterSampler, SamplingError, WorkingSet};
use crate::workflows::affinity::domain::Character;
use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataSourceError {
    #[error("character source unavailable: {0}")]
    Unavailable(String),
    #[error("character batch was malformed: {0}")]
    Malformed(String),
}

/// Upstream that yields characters in batches. `None` signals exhaustion.
pub trait CharacterSource: Send {
    fn next_batch(
        &mut self,
    ) -> impl Future<Output = Option<Result<Vec<Character>, DataSourceError>>> + Send;
}

/// In-memory source, used by the CLI and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCharacterSource {
    batches: VecDeque<Result<Vec<Character>, DataSourceError>>,
}

impl StaticCharacterSource {
    pub fn new(batches: Vec<Result<Vec<Character>, DataSourceError>>) -> Self {
        Self {
            batches: batches.into(),
        }
    }

    /// Split a flat list into fixed-size batches.
    pub fn chunked(characters: Vec<Character>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        let mut batches = VecDeque::new();
        let mut iter = characters.into_iter().peekable();
        while iter.peek().is_some() {
            batches.push_back(Ok(iter.by_ref().take(batch_size).collect()));
        }
        Self { batches }
    }
}

impl CharacterSource for StaticCharacterSource {
    async fn next_batch(&mut self) -> Option<Result<Vec<Character>, DataSourceError>> {
        self.batches.pop_front()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub batches: usize,
    pub failed_batches: usize,
    pub received: usize,
    pub added: usize,
    pub cancelled: bool,
}

impl LoadSummary {
    fn absorb(&mut self, outcome: BatchOutcome) {
        self.batches += 1;
        self.received += outcome.received;
        self.added += outcome.added;
    }
}

/// Drain `source` into `set` one batch at a time.
///
/// A failed batch is logged and skipped. Setting `cancel` stops further
/// fetches and leaves the set as it is, still usable for rating and scoring.
pub async fn load_characters<S, R>(
    source: &mut S,
    sampler: &mut CharacterSampler<R>,
    set: &mut WorkingSet,
    cancel: &AtomicBool,
) -> Result<LoadSummary, SamplingError>
where
    S: CharacterSource,
    R: Rng,
{
    let mut summary = LoadSummary::default();

    loop {
        if cancel.load(Ordering::Relaxed) {
            info!(added = summary.added, "character loading cancelled");
            summary.cancelled = true;
            return Ok(summary);
        }

        match source.next_batch().await {
            None => break,
            Some(Ok(batch)) => summary.absorb(sampler.ingest(set, batch)),
            Some(Err(err)) => {
                warn!(error = %err, "skipping character batch");
                summary.failed_batches += 1;
            }
        }
    }

    sampler.finish(set)?;
    info!(
        batches = summary.batches,
        failed = summary.failed_batches,
        characters = set.len(),
        "character loading complete"
    );
    Ok(summary)
}
