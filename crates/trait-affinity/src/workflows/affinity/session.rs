use super::domain::{Character, GenderPreference, LabelId};
use super::ratings::{RatingError, RatingRecord, RatingScale, RatingStore};
use super::sampling::{
    load_characters, CandidateFilter, CharacterSampler, CharacterSource, LoadSummary,
    SamplingError, SamplingRate, WorkingSet,
};
use super::scoring::{ProfileScores, ScoringEngine, ScoringError, ScoringOptions};
use super::strategy::Strategy;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, info};

/// Choices the user makes before a test starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    pub user_id: String,
    #[serde(default)]
    pub vn_labels: Vec<LabelId>,
    #[serde(default)]
    pub filter: CandidateFilter,
    #[serde(default)]
    pub gender_preference: GenderPreference,
    #[serde(default)]
    pub sampling_rate: SamplingRate,
    pub strategy: String,
    #[serde(default)]
    pub filter_sexual: bool,
}

impl SessionSettings {
    pub fn new(user_id: impl Into<String>, strategy: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            vn_labels: Vec::new(),
            filter: CandidateFilter::default(),
            gender_preference: GenderPreference::Any,
            sampling_rate: SamplingRate::FULL,
            strategy: strategy.into(),
            filter_sexual: false,
        }
    }

    pub fn scoring_options(&self) -> ScoringOptions {
        ScoringOptions {
            preference: self.gender_preference,
            filter_sexual: self.filter_sexual,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("there is no character waiting to be rated")]
    NoActiveCharacter,
    #[error(transparent)]
    Rating(#[from] RatingError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    Sampling(#[from] SamplingError),
}

/// Everything one rating run owns: settings, strategy, the working set, the
/// cursor into it, and the ratings recorded so far.
#[derive(Debug, Clone)]
pub struct TestSession {
    settings: SessionSettings,
    strategy: Option<Arc<Strategy>>,
    working_set: WorkingSet,
    ratings: RatingStore,
    cursor: usize,
}

impl TestSession {
    pub fn new(settings: SessionSettings, strategy: Option<Arc<Strategy>>) -> Self {
        let ratings = Self::empty_store(&settings, strategy.as_deref());
        Self {
            settings,
            strategy,
            working_set: WorkingSet::default(),
            ratings,
            cursor: 0,
        }
    }

    /// Reassemble a session from persisted parts. Records are re-checked
    /// against the strategy's scale.
    pub fn restore(
        settings: SessionSettings,
        strategy: Option<Arc<Strategy>>,
        working_set: WorkingSet,
        records: Vec<RatingRecord>,
        cursor: usize,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(settings, strategy);
        if !records.is_empty() && session.strategy.is_none() {
            return Err(ScoringError::MissingStrategy.into());
        }
        for record in records {
            session.ratings.restore(record)?;
        }
        session.cursor = cursor.min(working_set.len());
        session.working_set = working_set;
        Ok(session)
    }

    fn empty_store(settings: &SessionSettings, strategy: Option<&Strategy>) -> RatingStore {
        let scale = strategy.map(RatingScale::of).unwrap_or_default();
        RatingStore::new(scale, settings.gender_preference)
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn strategy(&self) -> Result<&Arc<Strategy>, ScoringError> {
        self.strategy.as_ref().ok_or(ScoringError::MissingStrategy)
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.working_set
    }

    pub fn ratings(&self) -> &RatingStore {
        &self.ratings
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn sampler<R: Rng>(&self, rng: R) -> CharacterSampler<R> {
        CharacterSampler::new(self.settings.filter, self.settings.sampling_rate, rng)
    }

    /// Stream characters from `source` into the working set.
    pub async fn load<S, R>(
        &mut self,
        source: &mut S,
        rng: R,
        cancel: &AtomicBool,
    ) -> Result<LoadSummary, SessionError>
    where
        S: CharacterSource,
        R: Rng,
    {
        let mut sampler = self.sampler(rng);
        let summary = load_characters(source, &mut sampler, &mut self.working_set, cancel).await?;
        Ok(summary)
    }

    pub fn current(&self) -> Option<&Character> {
        self.working_set.get(self.cursor)
    }

    pub fn rate_current(&mut self, rating: u8) -> Result<&RatingRecord, SessionError> {
        self.strategy()?;
        let character = self
            .working_set
            .get(self.cursor)
            .ok_or(SessionError::NoActiveCharacter)?;
        self.ratings.record_rating(character, rating)?;
        debug!(character = %character.id, rating, "character rated");
        self.advance()
    }

    pub fn skip_current(&mut self) -> Result<&RatingRecord, SessionError> {
        let character = self
            .working_set
            .get(self.cursor)
            .ok_or(SessionError::NoActiveCharacter)?;
        self.ratings.record_skip(character);
        debug!(character = %character.id, "character skipped");
        self.advance()
    }

    fn advance(&mut self) -> Result<&RatingRecord, SessionError> {
        let id = self
            .working_set
            .get(self.cursor)
            .map(|character| character.id.clone())
            .ok_or(SessionError::NoActiveCharacter)?;
        self.cursor += 1;
        self.ratings.get(&id).ok_or(SessionError::NoActiveCharacter)
    }

    /// Move back one character so it can be re-rated. Returns false at the start.
    pub fn step_back(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    /// All characters have been rated or skipped and no more are coming.
    pub fn is_complete(&self) -> bool {
        self.working_set.is_fully_loaded() && self.cursor >= self.working_set.len()
    }

    pub fn score(&self) -> Result<ProfileScores, SessionError> {
        let strategy = self.strategy()?;
        let engine = ScoringEngine::new(Arc::clone(strategy));
        Ok(engine.score(self.ratings.all_rated(), &self.settings.scoring_options()))
    }

    /// Drop ratings, working set and cursor. Settings and strategy are kept.
    pub fn reset(&mut self) {
        self.working_set.clear();
        self.ratings.clear();
        self.cursor = 0;
        info!(user = %self.settings.user_id, "test session reset");
    }
}
