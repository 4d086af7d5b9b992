//! Streaming selection of the characters a user will be asked to rate.

mod source;

pub use source::{
    load_characters, CharacterSource, DataSourceError, LoadSummary, StaticCharacterSource,
};

use super::domain::{Character, CharacterId, GenderPreference, RoleFilter};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Percentage of each eligible batch that is kept, between 1 and 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SamplingRate(u8);

impl SamplingRate {
    pub const FULL: Self = Self(100);

    pub fn new(percent: u8) -> Result<Self, SamplingError> {
        if (1..=100).contains(&percent) {
            Ok(Self(percent))
        } else {
            Err(SamplingError::InvalidRate(percent))
        }
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Number of characters kept from an eligible batch of `len`.
    pub fn sample_size(self, len: usize) -> usize {
        (len * usize::from(self.0)).div_ceil(100)
    }
}

impl Default for SamplingRate {
    fn default() -> Self {
        Self::FULL
    }
}

impl TryFrom<u8> for SamplingRate {
    type Error = SamplingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SamplingRate> for u8 {
    fn from(rate: SamplingRate) -> Self {
        rate.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SamplingError {
    #[error("sampling rate must be between 1 and 100, got {0}")]
    InvalidRate(u8),
    #[error("no characters matched the selected filters")]
    NoMatchingCharacters,
}

/// Eligibility rules applied to every upstream character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateFilter {
    pub gender: GenderPreference,
    pub role: RoleFilter,
    /// Highest trait spoiler level kept on admitted characters.
    pub max_spoiler: u8,
}

impl CandidateFilter {
    /// The character with over-spoiler traits stripped, or `None` if filtered out.
    pub fn admit(&self, character: Character) -> Option<Character> {
        if !self.gender.admits(character.sex) || !self.role.admits(&character.source_work) {
            return None;
        }
        let traits = character.visible_traits(self.max_spoiler);
        Some(Character {
            traits,
            ..character
        })
    }
}

/// Deduplicated characters selected so far, in presentation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingSet {
    characters: Vec<Character>,
    seen: HashSet<CharacterId>,
    started: bool,
    fully_loaded: bool,
}

impl WorkingSet {
    /// Rebuild a working set from persisted parts.
    pub fn from_parts(characters: Vec<Character>, started: bool, fully_loaded: bool) -> Self {
        let mut set = Self {
            characters: Vec::with_capacity(characters.len()),
            seen: HashSet::new(),
            started,
            fully_loaded,
        };
        for character in characters {
            if set.seen.insert(character.id.clone()) {
                set.characters.push(character);
            }
        }
        set
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn get(&self, index: usize) -> Option<&Character> {
        self.characters.get(index)
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    pub fn contains(&self, id: &CharacterId) -> bool {
        self.seen.contains(id)
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_fully_loaded(&self) -> bool {
        self.fully_loaded
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Counts describing what one upstream batch did to the working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub received: usize,
    pub eligible: usize,
    pub sampled: usize,
    pub added: usize,
    /// The working set received its first characters and was shuffled.
    pub started: bool,
}

/// Applies the candidate filter and sampling rate to upstream batches.
pub struct CharacterSampler<R> {
    filter: CandidateFilter,
    rate: SamplingRate,
    rng: R,
}

impl<R: Rng> CharacterSampler<R> {
    pub fn new(filter: CandidateFilter, rate: SamplingRate, rng: R) -> Self {
        Self { filter, rate, rng }
    }

    pub fn filter(&self) -> &CandidateFilter {
        &self.filter
    }

    pub fn rate(&self) -> SamplingRate {
        self.rate
    }

    /// Filter, sample and merge one batch. Each batch is sampled on its own,
    /// so the realized overall rate is approximate.
    pub fn ingest(&mut self, set: &mut WorkingSet, batch: Vec<Character>) -> BatchOutcome {
        let received = batch.len();
        let mut eligible: Vec<Character> = batch
            .into_iter()
            .filter_map(|character| self.filter.admit(character))
            .collect();
        let eligible_count = eligible.len();

        if self.rate.percent() < 100 {
            eligible.shuffle(&mut self.rng);
            eligible.truncate(self.rate.sample_size(eligible_count));
        }
        let sampled = eligible.len();

        let mut added = 0;
        for character in eligible {
            if set.seen.insert(character.id.clone()) {
                set.characters.push(character);
                added += 1;
            }
        }

        let mut started = false;
        if added > 0 && !set.started {
            set.characters.shuffle(&mut self.rng);
            set.started = true;
            started = true;
        }

        debug!(
            received,
            eligible = eligible_count,
            sampled,
            added,
            total = set.characters.len(),
            "character batch merged"
        );

        BatchOutcome {
            received,
            eligible: eligible_count,
            sampled,
            added,
            started,
        }
    }

    /// Mark the upstream as exhausted; an empty set at that point is terminal.
    pub fn finish(&self, set: &mut WorkingSet) -> Result<(), SamplingError> {
        if set.characters.is_empty() {
            return Err(SamplingError::NoMatchingCharacters);
        }
        set.fully_loaded = true;
        Ok(())
    }
}
