//! Topic repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Own topic records and their embedded voter registry.
//! - Keep SQL details inside the persistence boundary.
//! - Run read-modify-write operations (vote, date extension) in one
//!   immediate transaction so concurrent writers serialize.
//!
//! # Invariants
//! - Create paths call `Topic::validate()` before any SQL mutation.
//! - A failed operation leaves no partial writes behind.
//! - Voters are always returned in vote order (`seq ASC`).
//! - Instants are stored as epoch milliseconds; date checks run on the
//!   truncated value that will actually be stored.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::topic::{Topic, TopicId, TopicValidationError, Voter};
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const TOPIC_SELECT_SQL: &str = "SELECT
    uuid,
    title,
    description,
    start_date,
    end_date,
    rating
FROM topics";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for topic persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(TopicValidationError),
    Db(DbError),
    NotFound(TopicId),
    /// Connection schema is not at the version this binary expects.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "topic not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "topic repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted topic data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::UninitializedConnection { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<TopicValidationError> for RepoError {
    fn from(value: TopicValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Row order for topic listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TopicOrder {
    /// Creation order.
    #[default]
    Inserted,
    /// Latest `start_date` first.
    StartDateDesc,
}

/// Query options for listing topics.
#[derive(Debug, Clone, Default)]
pub struct TopicListQuery {
    pub order: TopicOrder,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Date fields to replace on a topic. `None` leaves the stored value as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicDatesPatch {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl TopicDatesPatch {
    pub fn is_empty(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none()
    }

    /// Truncates supplied dates to the millisecond precision they are stored at.
    pub fn at_storage_precision(&self) -> Self {
        Self {
            start_date: self.start_date.map(|start| start.trunc_subsecs(3)),
            end_date: self.end_date.map(|end| end.trunc_subsecs(3)),
        }
    }

    /// Requires every supplied date to be strictly after `now`.
    ///
    /// Start date is checked before end date.
    pub fn ensure_future(&self, now: DateTime<Utc>) -> Result<(), TopicValidationError> {
        if let Some(start) = self.start_date {
            if start <= now {
                return Err(TopicValidationError::StartNotInFuture { start });
            }
        }
        if let Some(end) = self.end_date {
            if end <= now {
                return Err(TopicValidationError::EndNotInFuture { end });
            }
        }
        Ok(())
    }
}

/// Repository interface for topic CRUD and vote persistence.
pub trait TopicRepository {
    /// Validates and inserts a new topic; returns its id.
    fn create_topic(&self, topic: &Topic) -> RepoResult<TopicId>;
    /// Loads one topic with its voters.
    fn get_topic(&self, id: TopicId) -> RepoResult<Option<Topic>>;
    /// Lists topics with their voters.
    fn list_topics(&self, query: &TopicListQuery) -> RepoResult<Vec<Topic>>;
    /// Replaces supplied dates after checking they are strictly after `now`
    /// at storage (millisecond) precision.
    fn update_topic_dates(
        &mut self,
        id: TopicId,
        patch: &TopicDatesPatch,
        now: DateTime<Utc>,
    ) -> RepoResult<Topic>;
    /// Permanently removes a topic and its voters.
    fn delete_topic(&self, id: TopicId) -> RepoResult<()>;
    /// Appends one voter and persists the recomputed average.
    fn record_vote(&mut self, id: TopicId, voter: &Voter) -> RepoResult<Topic>;
}

/// SQLite-backed topic repository.
pub struct SqliteTopicRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteTopicRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_topic_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TopicRepository for SqliteTopicRepository<'_> {
    fn create_topic(&self, topic: &Topic) -> RepoResult<TopicId> {
        topic.validate()?;

        self.conn.execute(
            "INSERT INTO topics (
                uuid,
                title,
                description,
                start_date,
                end_date,
                rating
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                topic.id.to_string(),
                topic.title.as_str(),
                topic.description.as_str(),
                topic.start_date.timestamp_millis(),
                topic.end_date.timestamp_millis(),
                topic.rating,
            ],
        )?;

        Ok(topic.id)
    }

    fn get_topic(&self, id: TopicId) -> RepoResult<Option<Topic>> {
        load_topic(self.conn, id)
    }

    fn list_topics(&self, query: &TopicListQuery) -> RepoResult<Vec<Topic>> {
        let mut sql = String::from(TOPIC_SELECT_SQL);
        let mut bind_values: Vec<Value> = Vec::new();

        match query.order {
            TopicOrder::Inserted => sql.push_str(" ORDER BY rowid ASC"),
            TopicOrder::StartDateDesc => sql.push_str(" ORDER BY start_date DESC, rowid ASC"),
        }

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut topics = Vec::new();
        while let Some(row) = rows.next()? {
            let mut topic = parse_topic_row(row)?;
            topic.voters = load_voters(self.conn, topic.id)?;
            topics.push(topic);
        }

        Ok(topics)
    }

    fn update_topic_dates(
        &mut self,
        id: TopicId,
        patch: &TopicDatesPatch,
        now: DateTime<Utc>,
    ) -> RepoResult<Topic> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut topic = load_topic(&tx, id)?.ok_or(RepoError::NotFound(id))?;
        let patch = patch.at_storage_precision();
        patch.ensure_future(now)?;

        if let Some(start) = patch.start_date {
            topic.start_date = start;
        }
        if let Some(end) = patch.end_date {
            topic.end_date = end;
        }

        tx.execute(
            "UPDATE topics
             SET
                start_date = ?2,
                end_date = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                id.to_string(),
                topic.start_date.timestamp_millis(),
                topic.end_date.timestamp_millis(),
            ],
        )?;
        tx.commit()?;

        Ok(topic)
    }

    fn delete_topic(&self, id: TopicId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM topics WHERE uuid = ?1;", [id.to_string()])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn record_vote(&mut self, id: TopicId, voter: &Voter) -> RepoResult<Topic> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut topic = load_topic(&tx, id)?.ok_or(RepoError::NotFound(id))?;
        let average = topic.record_vote(voter.clone())?;

        tx.execute(
            "INSERT INTO topic_voters (topic_uuid, national_id, rating)
             VALUES (?1, ?2, ?3);",
            params![id.to_string(), voter.national_id.as_str(), voter.rating],
        )?;
        tx.execute(
            "UPDATE topics
             SET
                rating = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), average],
        )?;
        tx.commit()?;

        Ok(topic)
    }
}

fn load_topic(conn: &Connection, id: TopicId) -> RepoResult<Option<Topic>> {
    let mut stmt = conn.prepare(&format!("{TOPIC_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        let mut topic = parse_topic_row(row)?;
        topic.voters = load_voters(conn, topic.id)?;
        return Ok(Some(topic));
    }

    Ok(None)
}

fn load_voters(conn: &Connection, id: TopicId) -> RepoResult<Vec<Voter>> {
    let mut stmt = conn.prepare(
        "SELECT national_id, rating
         FROM topic_voters
         WHERE topic_uuid = ?1
         ORDER BY seq ASC;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut voters = Vec::new();
    while let Some(row) = rows.next()? {
        voters.push(Voter {
            national_id: row.get("national_id")?,
            rating: row.get("rating")?,
        });
    }
    Ok(voters)
}

fn parse_topic_row(row: &Row<'_>) -> RepoResult<Topic> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in topics.uuid"))
    })?;

    Ok(Topic {
        id,
        title: row.get("title")?,
        description: row.get("description")?,
        start_date: parse_epoch_ms(row.get("start_date")?, "topics.start_date")?,
        end_date: parse_epoch_ms(row.get("end_date")?, "topics.end_date")?,
        rating: row.get("rating")?,
        voters: Vec::new(),
    })
}

fn parse_epoch_ms(value: i64, column: &str) -> RepoResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value).ok_or_else(|| {
        RepoError::InvalidData(format!("out-of-range timestamp `{value}` in {column}"))
    })
}

fn ensure_topic_connection_ready(conn: &Connection) -> RepoResult<()> {
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
