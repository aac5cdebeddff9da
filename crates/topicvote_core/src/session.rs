//! Session credential lifetime.
//!
//! # Responsibility
//! - Hold the opaque credential issued by the external identity service.
//! - Own the scheduled expiry of that credential as an explicit handle.
//! - Persist/restore sessions across process restarts.
//!
//! # Invariants
//! - At most one session is active per `SessionManager`.
//! - A session is never reported active at or after its deadline.
//! - Restoring an already-expired stored session is a no-op.

use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::{Deserialize, Serialize};

/// Lifetime applied when the issuer supplies no expiration.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 60 * 60;

/// Scheduled expiry for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryHandle {
    deadline: DateTime<Utc>,
}

impl ExpiryHandle {
    pub fn at(deadline: DateTime<Utc>) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Returns whether the expiry has fired at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    /// Time left before expiry; zero once due.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        if self.is_due(now) {
            Duration::zero()
        } else {
            self.deadline - now
        }
    }
}

/// Authenticated user credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub token: String,
    pub expiry: ExpiryHandle,
}

impl Session {
    pub fn new(
        user_id: impl Into<String>,
        token: impl Into<String>,
        deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
            expiry: ExpiryHandle::at(deadline),
        }
    }

    /// Credential check: non-empty token and expiry not yet due.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.token.trim().is_empty() && !self.expiry.is_due(now)
    }
}

/// Serialized session shape for persistence between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub user_id: String,
    pub token: String,
    pub expiration: DateTime<Utc>,
}

/// Owner of the current session and its expiry.
#[derive(Debug)]
pub struct SessionManager {
    ttl: Duration,
    current: Option<Session>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_SESSION_TTL_SECS))
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `ttl` for logins that carry no explicit expiration.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl, current: None }
    }

    /// Replaces any current session.
    ///
    /// Without `expiration` the session expires `ttl` after `now`.
    pub fn login(
        &mut self,
        user_id: impl Into<String>,
        token: impl Into<String>,
        expiration: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> &Session {
        let deadline = expiration.unwrap_or(now + self.ttl);
        let session = Session::new(user_id, token, deadline);
        info!(
            "event=session_login module=session status=ok expires_in_s={}",
            session.expiry.remaining(now).num_seconds()
        );
        self.current.insert(session)
    }

    /// Drops the current session and cancels its expiry.
    pub fn logout(&mut self) {
        if self.current.take().is_some() {
            info!("event=session_logout module=session status=ok");
        }
    }

    /// Returns the live session, logging out first if its expiry is due.
    pub fn active(&mut self, now: DateTime<Utc>) -> Option<&Session> {
        if self
            .current
            .as_ref()
            .is_some_and(|session| session.expiry.is_due(now))
        {
            info!("event=session_expired module=session status=ok");
            self.current = None;
        }
        self.current.as_ref()
    }

    /// Snapshot suitable for persistence.
    pub fn persisted(&self) -> Option<StoredSession> {
        self.current.as_ref().map(|session| StoredSession {
            user_id: session.user_id.clone(),
            token: session.token.clone(),
            expiration: session.expiry.deadline(),
        })
    }

    /// Restores a stored session if it has not expired yet.
    ///
    /// Returns whether a session was restored.
    pub fn restore(&mut self, stored: StoredSession, now: DateTime<Utc>) -> bool {
        if stored.token.is_empty() || stored.expiration <= now {
            return false;
        }
        self.login(stored.user_id, stored.token, Some(stored.expiration), now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{SessionManager, StoredSession, DEFAULT_SESSION_TTL_SECS};
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn login_defaults_to_one_hour_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let mut manager = SessionManager::new();
        let session = manager.login("u1", "token", None, now);
        assert_eq!(
            session.expiry.deadline(),
            now + Duration::seconds(DEFAULT_SESSION_TTL_SECS)
        );
        assert!(session.is_valid_at(now));
    }

    #[test]
    fn active_logs_out_once_deadline_passes() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let mut manager = SessionManager::new();
        manager.login("u1", "token", Some(now + Duration::minutes(5)), now);

        assert!(manager.active(now + Duration::minutes(4)).is_some());
        assert!(manager.active(now + Duration::minutes(5)).is_none());
        assert!(manager.persisted().is_none());
    }

    #[test]
    fn custom_ttl_applies_without_explicit_expiration() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let mut manager = SessionManager::with_ttl(Duration::minutes(10));
        let session = manager.login("u1", "token", None, now);
        assert_eq!(session.expiry.remaining(now), Duration::minutes(10));
    }

    #[test]
    fn logout_cancels_pending_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let mut manager = SessionManager::new();
        manager.login("u1", "token", None, now);
        manager.logout();
        assert!(manager.active(now).is_none());
    }

    #[test]
    fn restore_ignores_expired_sessions() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let mut manager = SessionManager::new();
        let stale = StoredSession {
            user_id: "u1".to_string(),
            token: "token".to_string(),
            expiration: now,
        };
        assert!(!manager.restore(stale, now));

        let fresh = StoredSession {
            user_id: "u1".to_string(),
            token: "token".to_string(),
            expiration: now + Duration::minutes(30),
        };
        assert!(manager.restore(fresh.clone(), now));
        assert_eq!(manager.persisted(), Some(fresh));
    }

    #[test]
    fn stored_session_uses_camel_case() {
        let stored = StoredSession {
            user_id: "u1".to_string(),
            token: "t".to_string(),
            expiration: Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap(),
        };
        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["userId"], "u1");
        assert!(value.get("expiration").is_some());
    }
}
