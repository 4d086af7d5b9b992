//! Trait affinity profiling: strategies, rating capture, aggregation, and the
//! read-side projection of the resulting scores.
//!
//! Data flows one way. A [`Strategy`] configures the run, the sampler picks the
//! characters, a [`TestSession`] records ratings, and the [`ScoringEngine`]
//! folds the non-skipped ratings into [`ProfileScores`] for [`project`] to order.

pub mod domain;
pub mod persistence;
pub mod projection;
pub mod ratings;
pub mod router;
pub mod sampling;
pub mod scoring;
pub mod service;
pub mod session;
pub mod strategy;

#[cfg(test)]
mod tests;

pub use domain::{
    Character, CharacterId, CharacterRole, GenderPreference, LabelId, RoleFilter, Sex, SourceWork,
    Trait, TraitId, VnId,
};
pub use persistence::{
    export_report, resume_session, ExportedReport, ImportedReport, JsonFileSessionStore,
    MemorySessionStore, PersistenceError, ResumeOutcome, SessionSnapshot, SessionStore,
};
pub use projection::{project, ExportFormat, Projection, ProjectionOptions, SortKey};
pub use ratings::{RatingError, RatingOutcome, RatingRecord, RatingScale, RatingStore};
pub use router::profile_router;
pub use sampling::{
    load_characters, CandidateFilter, CharacterSampler, CharacterSource, DataSourceError,
    SamplingError, SamplingRate, StaticCharacterSource, WorkingSet,
};
pub use scoring::{
    EntityKey, ProfileScores, ScoreFactor, ScoringEngine, ScoringError, ScoringOptions, TraitScore,
};
pub use service::{ProfileDefaults, ProfileService, ProfileServiceError, ScoreRequest, ScoreResponse};
pub use session::{SessionError, SessionSettings, TestSession};
pub use strategy::{Strategy, StrategyCatalog, StrategyLoadError};
