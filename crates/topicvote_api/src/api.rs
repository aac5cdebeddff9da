//! Request/response surface over the topic core.
//!
//! # Responsibility
//! - Decode loosely-typed JSON payloads into core requests.
//! - Gate mutating topic operations behind a live session credential.
//! - Map core errors to status codes and stable user-facing messages.
//!
//! # Invariants
//! - Calls never panic; every outcome is an `ApiResponse`.
//! - Error bodies always have the shape `{message, code}`.
//! - National identifiers and topic text never reach the logs.

use crate::config::ApiConfig;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use log::{error, info, warn};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Map, Value};
use topicvote_core::db::{open_db, DbResult};
use topicvote_core::model::topic::{validate_national_id, validate_rating};
use topicvote_core::{
    Clock, ListPolicy, NewTopicRequest, RepoError, Session, SqliteTopicRepository, SystemClock,
    TopicDatesPatch, TopicId, TopicService, TopicServiceError, TopicValidationError, VoteService,
    VoteServiceError,
};

const MSG_AUTH_FAILED: &str = "Authentication failed!";
const MSG_INVALID_INPUTS: &str = "Invalid inputs passed, please check your data";
const MSG_END_BEFORE_START: &str = "End date cannot be earlier than start date";
const MSG_NO_TOPICS: &str = "No topics found.";
const MSG_LIST_FAILED: &str = "Fetching topics failed, please try again later";
const MSG_TOPIC_NOT_FOUND: &str = "Could not find a topic for the provided id.";
const MSG_GET_FAILED: &str = "Something went wrong, could not find a topic";
const MSG_CREATE_FAILED: &str = "Creating topic failed, please try again";
const MSG_NO_TOPIC_FOR_ID: &str = "Could not find topic for this id";
const MSG_START_NOT_FUTURE: &str = "Start date must be in the future for extension";
const MSG_END_NOT_FUTURE: &str = "End date must be in the future for extension";
const MSG_UPDATE_FAILED: &str = "Something went wrong, could not update topic";
const MSG_DELETED: &str = "Deleted topic";
const MSG_DELETE_FAILED: &str = "Something went wrong, could not delete topic";
const MSG_BAD_NATIONAL_ID: &str = "National ID must be 14 characters long.";
const MSG_BAD_RATING: &str = "Rating must be between 0 and 5.";
const MSG_ALREADY_VOTED: &str = "You have already voted for this topic.";
const MSG_VOTE_SUBMITTED: &str = "Vote submitted";
const MSG_VOTE_FAILED: &str = "Submitting vote failed, please try again";

/// Status code plus JSON body for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn ok(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    fn message(status: u16, message: &str) -> Self {
        Self::ok(status, json!({ "message": message }))
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

/// User-facing failure: stable message plus status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub message: String,
    pub code: u16,
}

impl ApiError {
    pub fn new(message: &str, code: u16) -> Self {
        Self {
            message: message.to_string(),
            code,
        }
    }
}

impl From<ApiError> for ApiResponse {
    fn from(value: ApiError) -> Self {
        Self {
            status: value.code,
            body: json!({ "message": value.message, "code": value.code }),
        }
    }
}

type ApiResult = Result<ApiResponse, ApiError>;

/// Topic operations bound to one SQLite connection and one clock.
pub struct TopicApi<C: Clock = SystemClock> {
    conn: Connection,
    clock: C,
    list_policy: ListPolicy,
}

impl TopicApi<SystemClock> {
    /// Opens the configured database with the wall clock.
    pub fn open(config: &ApiConfig) -> DbResult<Self> {
        let conn = open_db(&config.db_path)?;
        Ok(Self::new(conn, SystemClock).with_list_policy(config.list_policy))
    }
}

impl<C: Clock> TopicApi<C> {
    pub fn new(conn: Connection, clock: C) -> Self {
        Self {
            conn,
            clock,
            list_policy: ListPolicy::default(),
        }
    }

    pub fn with_list_policy(mut self, list_policy: ListPolicy) -> Self {
        self.list_policy = list_policy;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Lists topics, optionally narrowed to one date window.
    pub fn list(&mut self, filter: Option<&str>) -> ApiResponse {
        finish("list", self.try_list(filter))
    }

    /// Fetches one topic by id.
    pub fn get(&mut self, id: &str) -> ApiResponse {
        finish("get", self.try_get(id))
    }

    /// Creates a topic from `{title, description, startDate, endDate}`.
    pub fn create(&mut self, session: Option<&Session>, payload: &Value) -> ApiResponse {
        finish("create", self.try_create(session, payload))
    }

    /// Extends a topic's dates from `{startDate?, endDate?}`.
    pub fn update(&mut self, session: Option<&Session>, id: &str, payload: &Value) -> ApiResponse {
        finish("update", self.try_update(session, id, payload))
    }

    /// Permanently deletes a topic and its voters.
    pub fn delete(&mut self, session: Option<&Session>, id: &str) -> ApiResponse {
        finish("delete", self.try_delete(session, id))
    }

    /// Casts one vote from `{nationalId, rating}`.
    ///
    /// `rating` may be a JSON integer or a numeric string.
    pub fn vote(&mut self, id: &str, payload: &Value) -> ApiResponse {
        finish("vote", self.try_vote(id, payload))
    }

    fn try_list(&mut self, filter: Option<&str>) -> ApiResult {
        let service = self
            .topic_service()
            .map_err(|err| store_failure("list", &err, MSG_LIST_FAILED))?;
        let topics = service.list_topics(filter).map_err(|err| match err {
            TopicServiceError::NoTopicsFound => ApiError::new(MSG_NO_TOPICS, 404),
            other => store_failure("list", &other, MSG_LIST_FAILED),
        })?;
        Ok(ApiResponse::ok(200, keyed("topics", &topics, MSG_LIST_FAILED)?))
    }

    fn try_get(&mut self, id: &str) -> ApiResult {
        let id = parse_topic_id(id).ok_or_else(|| ApiError::new(MSG_TOPIC_NOT_FOUND, 404))?;
        let service = self
            .topic_service()
            .map_err(|err| store_failure("get", &err, MSG_GET_FAILED))?;
        let topic = service.get_topic(id).map_err(|err| match err {
            TopicServiceError::TopicNotFound(_) => ApiError::new(MSG_TOPIC_NOT_FOUND, 404),
            other => store_failure("get", &other, MSG_GET_FAILED),
        })?;
        Ok(ApiResponse::ok(200, keyed("topic", &topic, MSG_GET_FAILED)?))
    }

    fn try_create(&mut self, session: Option<&Session>, payload: &Value) -> ApiResult {
        self.authenticate(session)?;
        let request = parse_new_topic(payload).ok_or_else(invalid_inputs)?;
        let service = self
            .topic_service()
            .map_err(|err| store_failure("create", &err, MSG_CREATE_FAILED))?;
        let topic = service.create_topic(request).map_err(|err| match err {
            TopicServiceError::InvalidInput(TopicValidationError::EndBeforeStart { .. }) => {
                ApiError::new(MSG_END_BEFORE_START, 422)
            }
            TopicServiceError::InvalidInput(_) => invalid_inputs(),
            other => store_failure("create", &other, MSG_CREATE_FAILED),
        })?;
        Ok(ApiResponse::ok(201, keyed("topic", &topic, MSG_CREATE_FAILED)?))
    }

    fn try_update(&mut self, session: Option<&Session>, id: &str, payload: &Value) -> ApiResult {
        self.authenticate(session)?;
        let id = parse_topic_id(id).ok_or_else(|| ApiError::new(MSG_NO_TOPIC_FOR_ID, 404))?;
        let patch = parse_dates_patch(payload).ok_or_else(invalid_inputs)?;
        let mut service = self
            .topic_service()
            .map_err(|err| store_failure("update", &err, MSG_UPDATE_FAILED))?;
        let topic = service.update_topic(id, &patch).map_err(|err| match err {
            TopicServiceError::TopicNotFound(_) => ApiError::new(MSG_NO_TOPIC_FOR_ID, 404),
            TopicServiceError::InvalidInput(TopicValidationError::StartNotInFuture { .. }) => {
                ApiError::new(MSG_START_NOT_FUTURE, 422)
            }
            TopicServiceError::InvalidInput(TopicValidationError::EndNotInFuture { .. }) => {
                ApiError::new(MSG_END_NOT_FUTURE, 422)
            }
            TopicServiceError::InvalidInput(_) => invalid_inputs(),
            other => store_failure("update", &other, MSG_UPDATE_FAILED),
        })?;
        Ok(ApiResponse::ok(200, keyed("topic", &topic, MSG_UPDATE_FAILED)?))
    }

    fn try_delete(&mut self, session: Option<&Session>, id: &str) -> ApiResult {
        self.authenticate(session)?;
        let id = parse_topic_id(id).ok_or_else(|| ApiError::new(MSG_NO_TOPIC_FOR_ID, 404))?;
        let service = self
            .topic_service()
            .map_err(|err| store_failure("delete", &err, MSG_DELETE_FAILED))?;
        service.delete_topic(id).map_err(|err| match err {
            TopicServiceError::TopicNotFound(_) => ApiError::new(MSG_NO_TOPIC_FOR_ID, 404),
            other => store_failure("delete", &other, MSG_DELETE_FAILED),
        })?;
        Ok(ApiResponse::message(200, MSG_DELETED))
    }

    /// Checks run in order: identifier length, rating, topic, duplicate.
    fn try_vote(&mut self, id: &str, payload: &Value) -> ApiResult {
        let national_id = string_field(payload, "nationalId").ok_or_else(invalid_inputs)?;
        validate_national_id(national_id).map_err(|_| ApiError::new(MSG_BAD_NATIONAL_ID, 422))?;
        let rating = parse_rating(payload).ok_or_else(invalid_inputs)?;
        validate_rating(rating).map_err(|_| ApiError::new(MSG_BAD_RATING, 422))?;
        let id = parse_topic_id(id).ok_or_else(|| ApiError::new(MSG_TOPIC_NOT_FOUND, 404))?;
        let repo = SqliteTopicRepository::try_new(&mut self.conn)
            .map_err(|err| store_failure("vote", &err, MSG_VOTE_FAILED))?;
        VoteService::new(repo)
            .cast_vote(id, national_id, rating)
            .map_err(|err| match err {
                VoteServiceError::InvalidNationalId { .. } => {
                    ApiError::new(MSG_BAD_NATIONAL_ID, 422)
                }
                VoteServiceError::RatingOutOfRange(_) => ApiError::new(MSG_BAD_RATING, 422),
                VoteServiceError::DuplicateVote(_) => ApiError::new(MSG_ALREADY_VOTED, 422),
                VoteServiceError::TopicNotFound(_) => ApiError::new(MSG_TOPIC_NOT_FOUND, 404),
                other => store_failure("vote", &other, MSG_VOTE_FAILED),
            })?;
        Ok(ApiResponse::message(201, MSG_VOTE_SUBMITTED))
    }

    fn authenticate(&self, session: Option<&Session>) -> Result<(), ApiError> {
        match session {
            Some(session) if session.is_valid_at(self.clock.now()) => Ok(()),
            _ => Err(ApiError::new(MSG_AUTH_FAILED, 401)),
        }
    }

    fn topic_service(
        &mut self,
    ) -> Result<TopicService<SqliteTopicRepository<'_>, &C>, RepoError> {
        let repo = SqliteTopicRepository::try_new(&mut self.conn)?;
        Ok(TopicService::new(repo, &self.clock).with_list_policy(self.list_policy))
    }
}

fn finish(op: &str, result: ApiResult) -> ApiResponse {
    match result {
        Ok(response) => {
            info!(
                "event=api_request module=api op={op} status=ok code={}",
                response.status
            );
            response
        }
        Err(err) => {
            warn!(
                "event=api_request module=api op={op} status=rejected code={}",
                err.code
            );
            err.into()
        }
    }
}

fn store_failure(op: &str, err: &dyn std::error::Error, message: &str) -> ApiError {
    error!("event=api_request module=api op={op} status=error error={err}");
    ApiError::new(message, 500)
}

fn invalid_inputs() -> ApiError {
    ApiError::new(MSG_INVALID_INPUTS, 422)
}

fn keyed<T: Serialize>(key: &str, value: &T, failure: &str) -> Result<Value, ApiError> {
    let value = serde_json::to_value(value).map_err(|err| {
        error!("event=api_encode module=api status=error error={err}");
        ApiError::new(failure, 500)
    })?;
    let mut body = Map::new();
    body.insert(key.to_string(), value);
    Ok(Value::Object(body))
}

fn parse_topic_id(raw: &str) -> Option<TopicId> {
    TopicId::parse_str(raw.trim()).ok()
}

/// Parses RFC 3339, or a bare `YYYY-MM-DD` as midnight UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0)?))
}

fn string_field<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key)?.as_str()
}

fn instant_field(payload: &Value, key: &str) -> Option<Option<DateTime<Utc>>> {
    match payload.get(key) {
        None | Some(Value::Null) => Some(None),
        Some(Value::String(raw)) => parse_instant(raw).map(Some),
        Some(_) => None,
    }
}

fn parse_new_topic(payload: &Value) -> Option<NewTopicRequest> {
    Some(NewTopicRequest {
        title: string_field(payload, "title")?.to_string(),
        description: string_field(payload, "description")?.to_string(),
        start_date: instant_field(payload, "startDate")??,
        end_date: instant_field(payload, "endDate")??,
    })
}

fn parse_dates_patch(payload: &Value) -> Option<TopicDatesPatch> {
    if !payload.is_object() {
        return None;
    }
    Some(TopicDatesPatch {
        start_date: instant_field(payload, "startDate")?,
        end_date: instant_field(payload, "endDate")?,
    })
}

fn parse_rating(payload: &Value) -> Option<i64> {
    match payload.get("rating")? {
        Value::Number(number) => number.as_i64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_dates_patch, parse_instant, parse_new_topic, parse_rating};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn parse_instant_accepts_rfc3339_and_bare_dates() {
        assert_eq!(
            parse_instant("2024-06-15T14:30:00+02:00"),
            Some(Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 0).unwrap())
        );
        assert_eq!(
            parse_instant("2024-06-15"),
            Some(Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_instant("15/06/2024"), None);
    }

    #[test]
    fn parse_rating_accepts_integer_or_numeric_string() {
        assert_eq!(parse_rating(&json!({ "rating": 4 })), Some(4));
        assert_eq!(parse_rating(&json!({ "rating": " 3 " })), Some(3));
        assert_eq!(parse_rating(&json!({ "rating": 2.5 })), None);
        assert_eq!(parse_rating(&json!({ "rating": "five" })), None);
        assert_eq!(parse_rating(&json!({ "nationalId": "12345678901234" })), None);
    }

    #[test]
    fn parse_new_topic_requires_every_field() {
        let complete = json!({
            "title": "Parks",
            "description": "More trees please",
            "startDate": "2024-06-10",
            "endDate": "2024-06-20T00:00:00Z",
        });
        assert!(parse_new_topic(&complete).is_some());

        let mut missing = complete.clone();
        missing.as_object_mut().unwrap().remove("endDate");
        assert!(parse_new_topic(&missing).is_none());

        let mut garbled = complete;
        garbled["startDate"] = json!("soon");
        assert!(parse_new_topic(&garbled).is_none());
    }

    #[test]
    fn parse_dates_patch_allows_partial_updates() {
        let patch = parse_dates_patch(&json!({ "endDate": "2024-07-01" })).unwrap();
        assert_eq!(patch.start_date, None);
        assert_eq!(
            patch.end_date,
            Some(Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap())
        );
        assert!(parse_dates_patch(&json!({ "startDate": 17 })).is_none());
        assert!(parse_dates_patch(&json!("2024-07-01")).is_none());
    }
}
