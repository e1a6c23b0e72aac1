// common/src/models/session.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated browser session for a room member, tracked server-side
/// by its opaque cookie token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSession {
    /// The member this session belongs to
    pub member_id: i64,
    /// Opaque token stored in the session cookie
    pub session_token: String,
    /// Timestamp when the session was created
    pub created_at: DateTime<Utc>,
    /// Timestamp of last activity
    pub last_active: DateTime<Utc>,
}

impl MemberSession {
    pub fn new(member_id: i64, session_token: String) -> Self {
        let now = Utc::now();
        Self {
            member_id,
            session_token,
            created_at: now,
            last_active: now,
        }
    }

    /// Update session activity timestamp
    pub fn update_activity(&mut self) {
        self.last_active = Utc::now();
    }

    /// Check if the session has expired based on TTL
    pub fn is_expired(&self, ttl_seconds: i64) -> bool {
        let age = Utc::now().signed_duration_since(self.last_active);
        age.num_seconds() > ttl_seconds
    }
}

/// Result of session lookups
#[derive(Debug, Clone)]
pub enum SessionResult {
    Success(MemberSession),
    NotFound,
    Expired,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_is_not_expired() {
        let session = MemberSession::new(1, "tok".to_string());
        assert!(!session.is_expired(60));
    }

    #[test]
    fn stale_session_expires() {
        let mut session = MemberSession::new(1, "tok".to_string());
        session.last_active = Utc::now() - chrono::Duration::seconds(120);
        assert!(session.is_expired(60));
        assert!(!session.is_expired(3600));
    }
}
