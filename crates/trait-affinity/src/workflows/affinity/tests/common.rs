use std::path::PathBuf;
use std::sync::Arc;

use axum::response::Response;
use serde_json::{json, Value};

use crate::workflows::affinity::domain::{
    Character, CharacterId, CharacterRole, GenderPreference, Sex, SourceWork, Trait, TraitId, VnId,
};
use crate::workflows::affinity::ratings::{RatingScale, RatingStore};
use crate::workflows::affinity::sampling::WorkingSet;
use crate::workflows::affinity::scoring::{ProfileScores, ScoringEngine, ScoringOptions};
use crate::workflows::affinity::session::{SessionSettings, TestSession};
use crate::workflows::affinity::strategy::{Strategy, StrategyCatalog, StrategyDocument};

pub(super) fn standard() -> Arc<Strategy> {
    Arc::new(StrategyCatalog::standard())
}

/// Strategy with no penalties or bonuses in the way, so means pass straight through.
pub(super) fn neutral_strategy() -> Arc<Strategy> {
    let options: Vec<Value> = (1..=7)
        .map(|value| json!({ "label": format!("option {value}"), "value": value }))
        .collect();
    let document = json!({
        "key": "neutral",
        "version": "test",
        "ratingOptions": options,
        "scoringParameters": {
            "minReliableCount": 1,
            "genderAdjustmentFactor": 0.5,
            "lowSamplePenalty": {"tiers": []},
            "variancePenalty": {"threshold": 100.0, "maxEffectThreshold": 200.0, "maxPenaltyRatio": 0.5},
            "consistencyBonus": {"meanThreshold": 100.0, "lowVarianceThreshold": 0.0, "bonusFactor": 1.0}
        },
        "traitGroups": {
            "g-heavy": {"name": "Heavy", "weight": 2.0},
            "g-off": {"name": "Disabled", "enabled": false},
            "g-adult": {"name": "Adult", "isSexualFilterTarget": true}
        }
    });
    let strategy = StrategyDocument::from_json(&document.to_string())
        .and_then(|document| document.validate("neutral"))
        .expect("neutral strategy validates");
    Arc::new(strategy)
}

pub(super) fn trait_item(id: &str, name: &str, group: Option<(&str, &str)>) -> Trait {
    Trait {
        id: TraitId::from(id),
        name: name.to_string(),
        group_id: group.map(|(group_id, _)| TraitId::from(group_id)),
        group_name: group.map(|(_, group_name)| group_name.to_string()),
        spoiler_level: 0,
    }
}

pub(super) fn hair(id: &str, name: &str) -> Trait {
    trait_item(id, name, Some(("i1", "Hair")))
}

pub(super) fn character(id: &str, sex: Option<Sex>, traits: Vec<Trait>) -> Character {
    Character {
        id: CharacterId::from(id),
        name: format!("Character {id}"),
        original_name: None,
        sex,
        traits,
        source_work: SourceWork {
            id: Some(VnId::from("v1")),
            title: "Test Novel".to_string(),
            role: CharacterRole::Primary,
            spoiler: 0,
        },
    }
}

pub(super) fn with_role(mut character: Character, role: CharacterRole) -> Character {
    character.source_work.role = role;
    character
}

/// `count` primary characters of one sex sharing a single hair trait.
pub(super) fn roster(count: usize, sex: Sex, prefix: &str) -> Vec<Character> {
    (0..count)
        .map(|index| {
            character(
                &format!("{prefix}{index}"),
                Some(sex),
                vec![hair("i10", "Black")],
            )
        })
        .collect()
}

pub(super) fn store(strategy: &Strategy) -> RatingStore {
    RatingStore::new(RatingScale::of(strategy), GenderPreference::Any)
}

pub(super) fn store_with_preference(strategy: &Strategy, preference: GenderPreference) -> RatingStore {
    RatingStore::new(RatingScale::of(strategy), preference)
}

pub(super) fn score(strategy: Arc<Strategy>, store: &RatingStore, options: ScoringOptions) -> ProfileScores {
    ScoringEngine::new(strategy).score(store.all_rated(), &options)
}

pub(super) fn session_with(characters: Vec<Character>) -> TestSession {
    TestSession::restore(
        SessionSettings::new("tester", "standard"),
        Some(standard()),
        WorkingSet::from_parts(characters, true, true),
        Vec::new(),
        0,
    )
    .expect("session restores")
}

pub(super) fn full_report() -> Value {
    json!({
        "userId": "u42",
        "vnLabels": [2],
        "characterFilters": {"gender": "any", "role": "any"},
        "userGenderPreference": "any",
        "samplingRate": 100,
        "ratedCharactersCount": 3,
        "userRatings": [
            {
                "char_id": "c1", "char_name": "Akane", "char_romaji_name": "Akane",
                "vn_id": "v1", "vn_title": "Test Novel", "rating": 7, "adjusted_score": 3,
                "traits": [{"id": "i10", "name": "Black", "group_id": "i1", "group_name": "Hair"}],
                "char_sex": "f", "genderAdjustmentApplied": false
            },
            {
                "char_id": "c2", "char_name": "Botan", "char_romaji_name": "Botan",
                "vn_id": "v1", "vn_title": "Test Novel", "rating": 7, "adjusted_score": 3,
                "traits": [{"id": "i10", "name": "Black", "group_id": "i1", "group_name": "Hair"}],
                "char_sex": "f", "genderAdjustmentApplied": false
            },
            {
                "char_id": "c3", "char_name": "Chiyo", "char_romaji_name": "Chiyo",
                "vn_id": "v1", "vn_title": "Test Novel", "rating": 1, "adjusted_score": -3,
                "traits": [{"id": "i10", "name": "Black", "group_id": "i1", "group_name": "Hair"}],
                "char_sex": "unknown", "genderAdjustmentApplied": false
            }
        ],
        "traitAnalysis": {},
        "appVersion": "1.1.5",
        "exportDate": "2025-01-01T00:00:00Z"
    })
}

/// Shaped like the browser app's export: numeric labels and trait names flattened to strings.
pub(super) fn summary_report() -> Value {
    json!({
        "userId": "u7",
        "vnLabels": [2, 4],
        "characterFilters": {"gender": "any", "role": "any"},
        "userGenderPreference": "f",
        "samplingRate": 50,
        "ratedCharactersCount": 12,
        "userRatings": [
            {
                "char_id": "c1", "char_name": "Akane", "char_romaji_name": "Akane",
                "vn_id": "v1", "vn_title": "Test Novel", "rating": 6, "adjusted_score": 2,
                "traits": ["Black (Hair)", "Kind (Personality)"],
                "char_sex": "unknown", "genderAdjustmentApplied": false
            }
        ],
        "traitAnalysis": {
            "Black (Hair)": {"finalScore": 1.2, "meanAdjustedScore": 1.0, "variance": 0.1, "count": 4}
        },
        "appVersion": "1.1.5",
        "exportDate": "2025-01-01T00:00:00.000Z"
    })
}

pub(super) fn scratch_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "trait-affinity-tests-{}-{name}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

pub(super) fn approx(left: f64, right: f64) -> bool {
    (left - right).abs() < 1e-9
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
