use super::common::*;

use crate::workflows::affinity::domain::{CharacterId, GenderPreference, Sex};
use crate::workflows::affinity::ratings::{RatingError, RatingOutcome};

#[test]
fn adjusted_score_is_rating_minus_midpoint() {
    let strategy = standard();
    let mut store = store(&strategy);

    for (index, rating) in (1..=7).enumerate() {
        let record = store
            .record_rating(
                &character(&format!("c{index}"), None, vec![hair("i10", "Black")]),
                rating,
            )
            .expect("rating on scale");
        assert_eq!(record.adjusted_score(), Some(i16::from(rating) - 4));
    }
}

#[test]
fn rejects_values_off_the_scale() {
    let strategy = standard();
    let mut store = store(&strategy);

    let error = store
        .record_rating(&character("c1", None, Vec::new()), 9)
        .expect_err("9 is not a rating");
    assert_eq!(
        error,
        RatingError::OutOfScale {
            value: 9,
            min: 1,
            max: 7
        }
    );
    assert!(store.is_empty());
}

#[test]
fn rating_the_same_character_twice_replaces_in_place() {
    let strategy = standard();
    let mut store = store(&strategy);
    let first = character("c1", None, vec![hair("i10", "Black")]);
    let second = character("c2", None, vec![hair("i11", "Blond")]);

    store.record_rating(&first, 2).expect("rated");
    store.record_rating(&second, 5).expect("rated");
    store.record_rating(&first, 7).expect("re-rated");

    assert_eq!(store.len(), 2);
    let ids: Vec<&str> = store
        .records()
        .iter()
        .map(|record| record.character_id().as_str())
        .collect();
    assert_eq!(ids, vec!["c1", "c2"]);
    assert_eq!(store.get(&CharacterId::from("c1")).and_then(|r| r.rating()), Some(7));
}

#[test]
fn skip_replaces_an_earlier_rating_and_is_excluded_from_all_rated() {
    let strategy = standard();
    let mut store = store(&strategy);
    let target = character("c1", None, vec![hair("i10", "Black")]);

    store.record_rating(&target, 6).expect("rated");
    let record = store.record_skip(&target);
    assert_eq!(record.outcome, RatingOutcome::Skipped);
    assert_eq!(record.rating(), None);

    assert_eq!(store.len(), 1);
    assert_eq!(store.skipped_count(), 1);
    assert_eq!(store.rated_count(), 0);
    assert!(store.all_rated().is_empty());
}

#[test]
fn gender_adjustment_requires_known_mismatching_sex() {
    let strategy = standard();
    let mut store = store_with_preference(&strategy, GenderPreference::Female);

    let mismatch = store
        .record_rating(&character("m", Some(Sex::Male), Vec::new()), 5)
        .expect("rated")
        .gender_adjustment_applied;
    let matching = store
        .record_rating(&character("f", Some(Sex::Female), Vec::new()), 5)
        .expect("rated")
        .gender_adjustment_applied;
    let unknown = store
        .record_rating(&character("u", None, Vec::new()), 5)
        .expect("rated")
        .gender_adjustment_applied;

    assert!(mismatch);
    assert!(!matching);
    assert!(!unknown);
}

#[test]
fn records_keep_a_snapshot_of_traits_at_rating_time() {
    let strategy = standard();
    let mut store = store(&strategy);
    let mut target = character("c1", None, vec![hair("i10", "Black")]);

    store.record_rating(&target, 6).expect("rated");
    target.traits.push(hair("i11", "Blond"));

    let record = store.get(&CharacterId::from("c1")).expect("record exists");
    assert_eq!(record.traits.len(), 1);
    assert_eq!(record.character.vn_title, "Test Novel");
}

#[test]
fn clear_empties_records_and_index() {
    let strategy = standard();
    let mut store = store(&strategy);
    let target = character("c1", None, Vec::new());
    store.record_rating(&target, 6).expect("rated");

    store.clear();
    assert!(store.is_empty());
    assert!(store.get(&CharacterId::from("c1")).is_none());

    store.record_rating(&target, 2).expect("rated after clear");
    assert_eq!(store.len(), 1);
}
