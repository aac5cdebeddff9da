use chrono::{TimeZone, Utc};
use std::thread;
use topicvote_core::db::{open_db, open_db_in_memory};
use topicvote_core::{
    ErrorKind, SqliteTopicRepository, Topic, TopicRepository, VoteService, VoteServiceError,
};
use uuid::Uuid;

const VOTER_A: &str = "29001011234567";
const VOTER_B: &str = "29001011234568";
const VOTER_C: &str = "29001011234569";

fn seeded_topic() -> Topic {
    Topic::new(
        "Bus route 12",
        "Rate the new bus route",
        Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 6, 20, 0, 0, 0).unwrap(),
    )
}

#[test]
fn rating_tracks_arithmetic_mean_in_submission_order() {
    let mut conn = open_db_in_memory().unwrap();
    let topic = seeded_topic();
    SqliteTopicRepository::try_new(&mut conn)
        .unwrap()
        .create_topic(&topic)
        .unwrap();

    let mut service = VoteService::new(SqliteTopicRepository::try_new(&mut conn).unwrap());
    let first = service.cast_vote(topic.id, VOTER_A, 5).unwrap();
    assert_eq!(first.new_average, 5.0);
    assert_eq!(first.voter_count, 1);

    let second = service.cast_vote(topic.id, VOTER_B, 2).unwrap();
    assert_eq!(second.new_average, 3.5);

    let third = service.cast_vote(topic.id, VOTER_C, 0).unwrap();
    assert!((third.new_average - 7.0 / 3.0).abs() < 1e-9);
    assert_eq!(third.voter_count, 3);
    drop(service);

    let stored = SqliteTopicRepository::try_new(&mut conn)
        .unwrap()
        .get_topic(topic.id)
        .unwrap()
        .unwrap();
    let order: Vec<_> = stored
        .voters
        .iter()
        .map(|voter| voter.national_id.as_str())
        .collect();
    assert_eq!(order, [VOTER_A, VOTER_B, VOTER_C]);
    assert!((stored.rating - 7.0 / 3.0).abs() < 1e-9);
}

#[test]
fn duplicate_vote_is_rejected_without_state_change() {
    let mut conn = open_db_in_memory().unwrap();
    let topic = seeded_topic();
    let mut repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
    repo.create_topic(&topic).unwrap();

    let mut service = VoteService::new(repo);
    service.cast_vote(topic.id, VOTER_A, 4).unwrap();

    let err = service.cast_vote(topic.id, VOTER_A, 1).unwrap_err();
    assert!(matches!(err, VoteServiceError::DuplicateVote(id) if id == topic.id));
    assert_eq!(err.kind(), ErrorKind::DuplicateVote);
    assert_eq!(err.code(), 422);
    drop(service);

    let stored = SqliteTopicRepository::try_new(&mut conn)
        .unwrap()
        .get_topic(topic.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.voters.len(), 1);
    assert_eq!(stored.rating, 4.0);
}

#[test]
fn national_id_length_is_checked_before_topic_lookup() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = VoteService::new(SqliteTopicRepository::try_new(&mut conn).unwrap());

    let err = service
        .cast_vote(Uuid::new_v4(), "1234567890123", 3)
        .unwrap_err();
    assert!(matches!(
        err,
        VoteServiceError::InvalidNationalId { length: 13 }
    ));
    assert_eq!(err.code(), 422);

    let err = service
        .cast_vote(Uuid::new_v4(), "123456789012345", 3)
        .unwrap_err();
    assert!(matches!(
        err,
        VoteServiceError::InvalidNationalId { length: 15 }
    ));
}

#[test]
fn rating_range_is_checked_before_topic_lookup() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = VoteService::new(SqliteTopicRepository::try_new(&mut conn).unwrap());

    let err = service.cast_vote(Uuid::new_v4(), VOTER_A, 6).unwrap_err();
    assert!(matches!(err, VoteServiceError::RatingOutOfRange(6)));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn unknown_topic_is_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = VoteService::new(SqliteTopicRepository::try_new(&mut conn).unwrap());
    let missing = Uuid::new_v4();

    let err = service.cast_vote(missing, VOTER_A, 3).unwrap_err();
    assert!(matches!(err, VoteServiceError::TopicNotFound(id) if id == missing));
    assert_eq!(err.code(), 404);
}

#[test]
fn rejected_vote_leaves_topic_untouched() {
    let mut conn = open_db_in_memory().unwrap();
    let topic = seeded_topic();
    let mut repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
    repo.create_topic(&topic).unwrap();
    let mut service = VoteService::new(repo);

    assert!(service.cast_vote(topic.id, "short", 3).is_err());
    assert!(service.cast_vote(topic.id, VOTER_A, -1).is_err());
    drop(service);

    let stored = SqliteTopicRepository::try_new(&mut conn)
        .unwrap()
        .get_topic(topic.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored, topic);
}

#[test]
fn concurrent_votes_on_one_topic_are_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("votes.db");
    let topic = seeded_topic();
    {
        let mut conn = open_db(&path).unwrap();
        SqliteTopicRepository::try_new(&mut conn)
            .unwrap()
            .create_topic(&topic)
            .unwrap();
    }

    let voters = 8_i64;
    let handles: Vec<_> = (0..voters)
        .map(|index| {
            let path = path.clone();
            let topic_id = topic.id;
            thread::spawn(move || {
                let mut conn = open_db(&path).unwrap();
                let mut service =
                    VoteService::new(SqliteTopicRepository::try_new(&mut conn).unwrap());
                service
                    .cast_vote(topic_id, format!("{:014}", index), index % 6)
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut conn = open_db(&path).unwrap();
    let stored = SqliteTopicRepository::try_new(&mut conn)
        .unwrap()
        .get_topic(topic.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.voters.len(), voters as usize);
    let expected: i64 = (0..voters).map(|index| index % 6).sum();
    assert!((stored.rating - expected as f64 / voters as f64).abs() < 1e-9);
}
