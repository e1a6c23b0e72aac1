// web-server/src/session_registry.rs
use actix::{Actor, AsyncContext, Context, Handler, Message, MessageResult};
use chrono::Utc;
use common::httpauth::generate_challenge;
use common::models::session::{MemberSession, SessionResult};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

// Default session TTL in seconds (24 hours)
const DEFAULT_SESSION_TTL: i64 = 86400;

/// Actor message: create a session for a signed-in member
#[derive(Message)]
#[rtype(result = "String")]
pub struct CreateSession {
    pub member_id: i64,
}

/// Actor message: look up a session by its cookie token
#[derive(Message)]
#[rtype(result = "SessionResult")]
pub struct GetSession {
    pub session_token: String,
}

/// Actor message: invalidate/remove a session (logout)
#[derive(Message)]
#[rtype(result = "bool")]
pub struct InvalidateSession {
    pub session_token: String,
}

/// Actor message: clean up expired sessions
#[derive(Message)]
#[rtype(result = "usize")]
pub struct CleanupExpiredSessions;

/// SessionRegistryActor tracks the authenticated browser sessions of room
/// members, keyed by the opaque token in the session cookie.
pub struct SessionRegistryActor {
    // Map from session token to session data
    sessions: Arc<DashMap<String, MemberSession>>,
    // Session TTL in seconds
    session_ttl: i64,
    // Cleanup interval in seconds
    cleanup_interval: u64,
}

impl Default for SessionRegistryActor {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistryActor {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            session_ttl: DEFAULT_SESSION_TTL,
            cleanup_interval: 3600, // Run cleanup every hour
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.session_ttl = ttl_seconds;
        self
    }

    pub fn with_cleanup_interval(mut self, interval_seconds: u64) -> Self {
        self.cleanup_interval = interval_seconds;
        self
    }

    /// Remove expired sessions
    fn cleanup_sessions(&mut self) -> usize {
        let now = Utc::now();
        let ttl = self.session_ttl;

        let expired_tokens: Vec<String> = self
            .sessions
            .iter()
            .filter_map(|entry| {
                let age = now.signed_duration_since(entry.value().last_active);
                (age.num_seconds() > ttl).then(|| entry.key().clone())
            })
            .collect();

        let expired_count = expired_tokens.len();
        for token in expired_tokens {
            self.sessions.remove(&token);
        }

        expired_count
    }
}

impl Actor for SessionRegistryActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("SessionRegistryActor started with TTL: {}s", self.session_ttl);

        // Schedule periodic session cleanup
        ctx.run_interval(Duration::from_secs(self.cleanup_interval), |act, _ctx| {
            let expired_count = act.cleanup_sessions();
            if expired_count > 0 {
                tracing::info!("Cleaned up {} expired sessions", expired_count);
            }
        });
    }
}

impl Handler<CreateSession> for SessionRegistryActor {
    type Result = MessageResult<CreateSession>;

    fn handle(&mut self, msg: CreateSession, _ctx: &mut Self::Context) -> Self::Result {
        let session_token = generate_challenge();
        let session = MemberSession::new(msg.member_id, session_token.clone());

        self.sessions.insert(session_token.clone(), session);

        tracing::info!("Created session for member: {}", msg.member_id);
        MessageResult(session_token)
    }
}

impl Handler<GetSession> for SessionRegistryActor {
    type Result = MessageResult<GetSession>;

    fn handle(&mut self, msg: GetSession, _ctx: &mut Self::Context) -> Self::Result {
        let result = if let Some(mut entry) = self.sessions.get_mut(&msg.session_token) {
            let session = entry.value_mut();

            if session.is_expired(self.session_ttl) {
                tracing::debug!("Session expired for member: {}", session.member_id);
                SessionResult::Expired
            } else {
                session.update_activity();
                SessionResult::Success(session.clone())
            }
        } else {
            tracing::debug!("Session not found");
            SessionResult::NotFound
        };

        MessageResult(result)
    }
}

impl Handler<InvalidateSession> for SessionRegistryActor {
    type Result = MessageResult<InvalidateSession>;

    fn handle(&mut self, msg: InvalidateSession, _ctx: &mut Self::Context) -> Self::Result {
        let removed = self.sessions.remove(&msg.session_token);
        if let Some((_, session)) = &removed {
            tracing::info!("Invalidated session for member: {}", session.member_id);
        }
        MessageResult(removed.is_some())
    }
}

impl Handler<CleanupExpiredSessions> for SessionRegistryActor {
    type Result = MessageResult<CleanupExpiredSessions>;

    fn handle(&mut self, _msg: CleanupExpiredSessions, _ctx: &mut Self::Context) -> Self::Result {
        let expired_count = self.cleanup_sessions();
        tracing::info!("Cleaned up {} expired sessions", expired_count);
        MessageResult(expired_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn create_then_get_then_invalidate() {
        let registry = SessionRegistryActor::new().start();

        let token = registry.send(CreateSession { member_id: 7 }).await.unwrap();

        let found = registry
            .send(GetSession {
                session_token: token.clone(),
            })
            .await
            .unwrap();
        match found {
            SessionResult::Success(session) => assert_eq!(session.member_id, 7),
            other => panic!("expected session, got {:?}", other),
        }

        assert!(registry
            .send(InvalidateSession {
                session_token: token.clone(),
            })
            .await
            .unwrap());

        let gone = registry
            .send(GetSession {
                session_token: token,
            })
            .await
            .unwrap();
        assert!(matches!(gone, SessionResult::NotFound));
    }

    #[actix_web::test]
    async fn expired_sessions_are_cleaned_up() {
        let registry = SessionRegistryActor::new().with_ttl(0).start();

        let _token = registry.send(CreateSession { member_id: 1 }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let cleaned = registry.send(CleanupExpiredSessions).await.unwrap();
        assert_eq!(cleaned, 1);
    }
}
