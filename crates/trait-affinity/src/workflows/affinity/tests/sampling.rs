use super::common::*;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::workflows::affinity::domain::{Character, CharacterRole, GenderPreference, RoleFilter, Sex};
use crate::workflows::affinity::sampling::{
    load_characters, CandidateFilter, CharacterSampler, CharacterSource, DataSourceError,
    SamplingError, SamplingRate, StaticCharacterSource, WorkingSet,
};

fn sampler(filter: CandidateFilter, percent: u8) -> CharacterSampler<StdRng> {
    CharacterSampler::new(
        filter,
        SamplingRate::new(percent).expect("valid rate"),
        StdRng::seed_from_u64(7),
    )
}

#[test]
fn half_rate_on_ten_eligible_selects_exactly_five() {
    let mut sampler = sampler(CandidateFilter::default(), 50);
    let mut set = WorkingSet::default();

    let outcome = sampler.ingest(&mut set, roster(10, Sex::Female, "f"));

    assert_eq!(outcome.eligible, 10);
    assert_eq!(outcome.sampled, 5);
    assert_eq!(set.len(), 5);
}

#[test]
fn sample_size_rounds_up() {
    let rate = SamplingRate::new(30).expect("valid rate");
    assert_eq!(rate.sample_size(10), 3);
    assert_eq!(rate.sample_size(1), 1);
    assert_eq!(rate.sample_size(0), 0);
    assert_eq!(SamplingRate::FULL.sample_size(7), 7);
}

#[test]
fn rates_outside_one_to_hundred_are_rejected() {
    assert_eq!(SamplingRate::new(0), Err(SamplingError::InvalidRate(0)));
    assert_eq!(SamplingRate::new(101), Err(SamplingError::InvalidRate(101)));
    assert!(serde_json::from_str::<SamplingRate>("150").is_err());
}

#[test]
fn gender_filter_keeps_only_matching_sex() {
    let filter = CandidateFilter {
        gender: GenderPreference::Male,
        ..CandidateFilter::default()
    };
    let mut sampler = sampler(filter, 100);
    let mut set = WorkingSet::default();

    let mut batch = roster(3, Sex::Female, "f");
    batch.extend(roster(2, Sex::Male, "m"));
    batch.push(character("unknown", None, Vec::new()));
    let outcome = sampler.ingest(&mut set, batch);

    assert_eq!(outcome.received, 6);
    assert_eq!(outcome.eligible, 2);
    assert!(set
        .characters()
        .iter()
        .all(|character| character.sex == Some(Sex::Male)));
}

#[test]
fn side_role_filter_admits_appearances() {
    let filter = CandidateFilter {
        role: RoleFilter::Side,
        ..CandidateFilter::default()
    };
    let mut sampler = sampler(filter, 100);
    let mut set = WorkingSet::default();

    let batch = vec![
        with_role(character("main", None, Vec::new()), CharacterRole::Main),
        with_role(character("side", None, Vec::new()), CharacterRole::Side),
        with_role(character("cameo", None, Vec::new()), CharacterRole::Appears),
    ];
    sampler.ingest(&mut set, batch);

    let ids: HashSet<&str> = set
        .characters()
        .iter()
        .map(|character| character.id.as_str())
        .collect();
    assert_eq!(ids, HashSet::from(["side", "cameo"]));
}

#[test]
fn spoiler_traits_are_stripped_from_admitted_characters() {
    let mut sampler = sampler(CandidateFilter::default(), 100);
    let mut set = WorkingSet::default();
    let mut secret = hair("t-secret", "Secret dye");
    secret.spoiler_level = 2;

    sampler.ingest(
        &mut set,
        vec![character("c1", None, vec![hair("t1", "Black"), secret])],
    );

    let traits = &set.characters()[0].traits;
    assert_eq!(traits.len(), 1);
    assert_eq!(traits[0].id.as_str(), "t1");
}

#[test]
fn duplicates_across_batches_are_added_once() {
    let mut sampler = sampler(CandidateFilter::default(), 100);
    let mut set = WorkingSet::default();

    let first = sampler.ingest(&mut set, roster(4, Sex::Female, "c"));
    let second = sampler.ingest(&mut set, roster(6, Sex::Female, "c"));

    assert!(first.started);
    assert!(!second.started);
    assert_eq!(first.added, 4);
    assert_eq!(second.added, 2);
    assert_eq!(set.len(), 6);
    assert!(set.is_started());
}

#[test]
fn working_set_is_shuffled_once_on_first_addition_only() {
    let ids = |characters: &[Character]| {
        characters
            .iter()
            .map(|character| character.id.as_str().to_string())
            .collect::<Vec<_>>()
    };
    let mut sampler = sampler(CandidateFilter::default(), 100);
    let mut set = WorkingSet::default();

    let first_batch = roster(20, Sex::Female, "a");
    let input_order = ids(&first_batch);
    sampler.ingest(&mut set, first_batch);

    let after_first = ids(set.characters());
    assert_ne!(after_first, input_order);
    let mut sorted = after_first.clone();
    sorted.sort();
    let mut expected = input_order.clone();
    expected.sort();
    assert_eq!(sorted, expected);

    let second_batch = roster(5, Sex::Female, "b");
    let appended = ids(&second_batch);
    sampler.ingest(&mut set, second_batch);

    let after_second = ids(set.characters());
    assert_eq!(&after_second[..20], after_first.as_slice());
    assert_eq!(&after_second[20..], appended.as_slice());
}

#[test]
fn finishing_an_empty_set_is_terminal() {
    let sampler = sampler(CandidateFilter::default(), 100);
    let mut set = WorkingSet::default();

    assert_eq!(
        sampler.finish(&mut set),
        Err(SamplingError::NoMatchingCharacters)
    );
    assert!(!set.is_fully_loaded());
}

#[tokio::test]
async fn failed_batches_are_skipped_and_loading_completes() {
    let mut source = StaticCharacterSource::new(vec![
        Ok(roster(3, Sex::Female, "a")),
        Err(DataSourceError::Unavailable("timeout".to_string())),
        Ok(roster(2, Sex::Male, "b")),
    ]);
    let mut sampler = sampler(CandidateFilter::default(), 100);
    let mut set = WorkingSet::default();
    let cancel = AtomicBool::new(false);

    let summary = load_characters(&mut source, &mut sampler, &mut set, &cancel)
        .await
        .expect("loading completes");

    assert_eq!(summary.batches, 2);
    assert_eq!(summary.failed_batches, 1);
    assert_eq!(summary.added, 5);
    assert!(set.is_fully_loaded());
}

#[tokio::test]
async fn cancellation_keeps_accumulated_state() {
    let mut source = StaticCharacterSource::chunked(roster(10, Sex::Female, "c"), 4);
    let mut sampler = sampler(CandidateFilter::default(), 100);
    let mut set = WorkingSet::default();
    let cancel = AtomicBool::new(false);

    let first = source.next_batch().await.expect("batch").expect("ok");
    sampler.ingest(&mut set, first);
    cancel.store(true, Ordering::Relaxed);

    let summary = load_characters(&mut source, &mut sampler, &mut set, &cancel)
        .await
        .expect("cancelled cleanly");

    assert!(summary.cancelled);
    assert_eq!(set.len(), 4);
    assert!(!set.is_fully_loaded());
}

#[tokio::test]
async fn exhausted_source_with_no_matches_reports_no_matching_characters() {
    let filter = CandidateFilter {
        gender: GenderPreference::Sexless,
        ..CandidateFilter::default()
    };
    let mut source = StaticCharacterSource::chunked(roster(5, Sex::Female, "c"), 2);
    let mut sampler = sampler(filter, 100);
    let mut set = WorkingSet::default();
    let cancel = AtomicBool::new(false);

    let result = load_characters(&mut source, &mut sampler, &mut set, &cancel).await;
    assert_eq!(result, Err(SamplingError::NoMatchingCharacters));
}
