//! End-to-end scenarios through the public workflow facade: sample characters,
//! rate them in a session, persist and resume, export a report, and score it
//! again through the service and HTTP router.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tower::ServiceExt;

use trait_affinity::workflows::affinity::{
    export_report, profile_router, project, resume_session, Character, CharacterRole,
    EntityKey, GenderPreference, ImportedReport, JsonFileSessionStore, ProfileDefaults,
    ProfileService, ProjectionOptions, ResumeOutcome, SamplingRate, ScoreFactor, ScoreRequest,
    ScoreResponse, SessionSettings, SessionSnapshot, SessionStore, Sex, SourceWork,
    StaticCharacterSource, StrategyCatalog, TestSession, Trait,
};

fn strategy_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../strategies")
}

fn scratch_file(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("trait-affinity-workflow-{}", std::process::id()))
        .join(name)
}

fn tagged(id: &str, name: &str, group_id: &str, group_name: &str) -> Trait {
    Trait {
        id: id.into(),
        name: name.to_string(),
        group_id: Some(group_id.into()),
        group_name: Some(group_name.to_string()),
        spoiler_level: 0,
    }
}

fn character(id: &str, sex: Sex, traits: Vec<Trait>) -> Character {
    Character {
        id: id.into(),
        name: format!("Character {id}"),
        original_name: None,
        sex: Some(sex),
        traits,
        source_work: SourceWork {
            id: Some("v17".into()),
            title: "Ever17".to_string(),
            role: CharacterRole::Primary,
            spoiler: 0,
        },
    }
}

fn cast() -> Vec<Character> {
    let twintails = || tagged("i50", "Twintails", "i1", "Hair");
    let kind = || tagged("i60", "Kind", "i39", "Personality");
    let adult = || tagged("i70", "Explicit trait", "i43", "Engages in (Sexual)");
    vec![
        character("c1", Sex::Female, vec![twintails(), kind()]),
        character("c2", Sex::Female, vec![twintails(), kind(), adult()]),
        character("c3", Sex::Female, vec![twintails()]),
        character("c4", Sex::Male, vec![kind()]),
        character("c5", Sex::Female, vec![kind(), adult()]),
    ]
}

async fn rated_session(catalog: &StrategyCatalog) -> TestSession {
    let mut settings = SessionSettings::new("integration", "standard");
    settings.gender_preference = GenderPreference::Female;
    settings.sampling_rate = SamplingRate::FULL;
    let strategy = catalog.load("standard").expect("standard strategy");
    let mut session = TestSession::new(settings, Some(strategy));

    let mut source = StaticCharacterSource::chunked(cast(), 2);
    let cancel = AtomicBool::new(false);
    let summary = session
        .load(&mut source, StdRng::seed_from_u64(42), &cancel)
        .await
        .expect("characters load");
    assert_eq!(summary.batches, 3);
    assert_eq!(session.working_set().len(), 5);

    while let Some(current) = session.current() {
        let rating = match current.id.as_str() {
            "c1" | "c2" | "c3" => 7,
            "c4" => 2,
            _ => 6,
        };
        session.rate_current(rating).expect("rated");
    }
    assert!(session.is_complete());
    session
}

#[tokio::test]
async fn session_scores_reflect_ratings_and_preferences() {
    let catalog = StrategyCatalog::new(strategy_dir());
    let session = rated_session(&catalog).await;

    let scores = session.score().expect("scores");
    assert_eq!(scores.rated_count, 5);

    let twintails = scores.trait_score("i50").expect("twintails scored");
    assert_eq!(twintails.count, 3);
    assert!((twintails.mean - 3.0).abs() < 1e-9);
    assert!(twintails.has_factor(|factor| matches!(factor, ScoreFactor::ConsistencyBonus { .. })));

    let kind = scores.trait_score("i60").expect("kind scored");
    assert_eq!(kind.count, 4);
    assert!(kind.has_factor(|factor| matches!(
        factor,
        ScoreFactor::GenderPreference {
            adjusted_contributors: 1,
            ..
        }
    )));

    let hair = scores
        .get(&EntityKey::Group("i1".into()))
        .expect("hair group scored");
    assert_eq!(hair.count, 3);
    assert_eq!(hair.name, "Hair");
}

#[tokio::test]
async fn saved_session_resumes_from_disk() {
    let catalog = StrategyCatalog::new(strategy_dir());
    let session = rated_session(&catalog).await;
    let store = JsonFileSessionStore::new(scratch_file("session.json"));

    store
        .save(&SessionSnapshot::capture(&session))
        .expect("snapshot saved");

    let ResumeOutcome::Resumed(resumed) = resume_session(&store, &catalog).expect("resumes") else {
        panic!("expected resumed session");
    };
    assert_eq!(resumed.cursor(), 5);
    assert_eq!(resumed.ratings().rated_count(), 5);
    assert_eq!(
        resumed.score().expect("scores"),
        session.score().expect("scores")
    );

    store.clear().expect("cleared");
}

#[tokio::test]
async fn exported_report_rescored_under_the_sfw_strategy_drops_sexual_traits() {
    let catalog = Arc::new(StrategyCatalog::new(strategy_dir()));
    let session = rated_session(&catalog).await;

    let report = export_report(&session).expect("exported");
    assert_eq!(report.rated_characters_count, 5);
    let raw = report.to_json().expect("serialized");

    let ImportedReport::Full(full) = ImportedReport::from_json(&raw).expect("imports") else {
        panic!("expected full report");
    };
    let sfw = catalog.load("sfw").expect("bundled sfw strategy");
    assert_eq!(sfw.key, "sfw");

    let standard_scores = full
        .rescore(catalog.load("standard").expect("standard"), None)
        .expect("rescored");
    let sfw_scores = full.rescore(sfw, None).expect("rescored");

    assert!(standard_scores.trait_score("i70").is_some());
    assert!(sfw_scores.trait_score("i70").is_none());
    assert!(sfw_scores.group_score("i43").is_none());

    let projection = project(&sfw_scores, ProjectionOptions::default());
    assert!(projection
        .rows()
        .all(|row| row.id.as_str() != "i70" && row.id.as_str() != "i43"));
}

#[tokio::test]
async fn service_and_router_agree_on_exported_reports() {
    let catalog = Arc::new(StrategyCatalog::new(strategy_dir()));
    let session = rated_session(&catalog).await;
    let report = serde_json::to_value(export_report(&session).expect("exported"))
        .expect("report value");

    let service = Arc::new(ProfileService::new(
        Arc::clone(&catalog),
        ProfileDefaults::default(),
    ));
    let ScoreResponse::Full { projection, .. } = service
        .score(ScoreRequest::for_report(report.clone()))
        .expect("service scores")
    else {
        panic!("expected full response");
    };

    let body = serde_json::json!({ "report": report });
    let response = profile_router(service)
        .oneshot(
            axum::http::Request::post("/api/v1/profile/score")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&body).expect("serialize body"),
                ))
                .expect("request"),
        )
        .await
        .expect("route responds");
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("read body");
    let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json payload");
    assert_eq!(
        payload["projection"],
        serde_json::to_value(&projection).expect("projection value")
    );
}
