use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::Connection;
use topicvote_core::db::migrations::latest_version;
use topicvote_core::db::open_db_in_memory;
use topicvote_core::{
    RepoError, SqliteTopicRepository, Topic, TopicDatesPatch, TopicListQuery, TopicOrder,
    TopicRepository, TopicValidationError, Voter,
};
use uuid::Uuid;

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
}

fn topic(title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Topic {
    Topic::new(title, "a description long enough", start, end)
}

#[test]
fn create_and_get_roundtrip() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();

    let created = topic("Library hours", at(2024, 6, 10), at(2024, 6, 20));
    let id = repo.create_topic(&created).unwrap();

    let loaded = repo.get_topic(id).unwrap().unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.rating, 0.0);
    assert!(loaded.voters.is_empty());
}

#[test]
fn create_rejects_end_before_start() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();

    let invalid = topic("Backwards", at(2024, 6, 20), at(2024, 6, 10));
    let err = repo.create_topic(&invalid).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(TopicValidationError::EndBeforeStart { .. })
    ));
    assert!(repo.get_topic(invalid.id).unwrap().is_none());
}

#[test]
fn get_unknown_id_returns_none() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
    assert!(repo.get_topic(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn list_supports_insertion_and_start_date_order() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();

    let early = topic("early", at(2024, 1, 1), at(2024, 1, 2));
    let late = topic("late", at(2024, 3, 1), at(2024, 3, 2));
    let middle = topic("middle", at(2024, 2, 1), at(2024, 2, 2));
    for item in [&early, &late, &middle] {
        repo.create_topic(item).unwrap();
    }

    let inserted = repo.list_topics(&TopicListQuery::default()).unwrap();
    let titles: Vec<_> = inserted.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, ["early", "late", "middle"]);

    let by_start = repo
        .list_topics(&TopicListQuery {
            order: TopicOrder::StartDateDesc,
            ..TopicListQuery::default()
        })
        .unwrap();
    let titles: Vec<_> = by_start.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, ["late", "middle", "early"]);

    let paged = repo
        .list_topics(&TopicListQuery {
            limit: Some(1),
            offset: 1,
            ..TopicListQuery::default()
        })
        .unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].title, "late");
}

#[test]
fn update_dates_requires_strictly_future_instants() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
    let now = at(2024, 6, 15);

    let created = topic("Extend me", at(2024, 6, 10), at(2024, 6, 20));
    repo.create_topic(&created).unwrap();

    let at_now = TopicDatesPatch {
        start_date: Some(now),
        end_date: None,
    };
    let err = repo
        .update_topic_dates(created.id, &at_now, now)
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(TopicValidationError::StartNotInFuture { .. })
    ));

    let end_in_past = TopicDatesPatch {
        start_date: None,
        end_date: Some(now - Duration::days(1)),
    };
    let err = repo
        .update_topic_dates(created.id, &end_in_past, now)
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(TopicValidationError::EndNotInFuture { .. })
    ));

    let unchanged = repo.get_topic(created.id).unwrap().unwrap();
    assert_eq!(unchanged.start_date, created.start_date);

    let one_ms_later = TopicDatesPatch {
        start_date: Some(now + Duration::milliseconds(1)),
        end_date: None,
    };
    let updated = repo
        .update_topic_dates(created.id, &one_ms_later, now)
        .unwrap();
    assert_eq!(updated.start_date, now + Duration::milliseconds(1));
    assert_eq!(updated.end_date, created.end_date);

    let reloaded = repo.get_topic(created.id).unwrap().unwrap();
    assert_eq!(reloaded, updated);
}

#[test]
fn update_dates_checks_future_at_stored_precision() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
    let now = at(2024, 6, 15);

    let created = topic("Sub-millisecond", at(2024, 6, 10), at(2024, 6, 20));
    repo.create_topic(&created).unwrap();

    // 500us past `now` is stored as exactly `now`.
    let sub_ms = TopicDatesPatch {
        start_date: Some(now + Duration::microseconds(500)),
        end_date: None,
    };
    let err = repo
        .update_topic_dates(created.id, &sub_ms, now)
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(TopicValidationError::StartNotInFuture { .. })
    ));

    let past_ms = TopicDatesPatch {
        start_date: None,
        end_date: Some(now + Duration::microseconds(1_700)),
    };
    let updated = repo
        .update_topic_dates(created.id, &past_ms, now)
        .unwrap();
    assert_eq!(updated.end_date, now + Duration::milliseconds(1));
    assert_eq!(repo.get_topic(created.id).unwrap().unwrap(), updated);
}

#[test]
fn update_unknown_id_reports_not_found_before_validation() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
    let now = at(2024, 6, 15);
    let missing = Uuid::new_v4();

    let stale = TopicDatesPatch {
        start_date: Some(now - Duration::days(3)),
        end_date: None,
    };
    let err = repo.update_topic_dates(missing, &stale, now).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == missing));
}

#[test]
fn delete_removes_topic_and_voters_permanently() {
    let mut conn = open_db_in_memory().unwrap();
    let created = topic("Short lived", at(2024, 6, 10), at(2024, 6, 20));
    {
        let mut repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
        repo.create_topic(&created).unwrap();
        repo.record_vote(created.id, &Voter::new("12345678901234", 4))
            .unwrap();

        repo.delete_topic(created.id).unwrap();
        assert!(repo.get_topic(created.id).unwrap().is_none());

        let err = repo.delete_topic(created.id).unwrap_err();
        assert!(matches!(err, RepoError::NotFound(id) if id == created.id));
    }

    let voter_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM topic_voters;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(voter_rows, 0);
}

#[test]
fn try_new_rejects_unmigrated_connection() {
    let mut conn = Connection::open_in_memory().unwrap();
    let err = SqliteTopicRepository::try_new(&mut conn)
        .err()
        .expect("unmigrated connection must be rejected");
    match err {
        RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        } => {
            assert_eq!(expected_version, latest_version());
            assert_eq!(actual_version, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn read_path_rejects_corrupted_uuid() {
    let mut conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO topics (uuid, title, description, start_date, end_date)
         VALUES ('not-a-uuid', 't', 'description', 0, 0);",
        [],
    )
    .unwrap();

    let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
    let err = repo.list_topics(&TopicListQuery::default()).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}
