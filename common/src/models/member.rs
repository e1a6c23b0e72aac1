// common/src/models/member.rs
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::feed::FeedRef;

/// A known participant of the room: somebody whose public key is on the
/// allow list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub pub_key: FeedRef,
}

/// Lookup contract against the member store. The persistent storage layer
/// behind it is an external collaborator.
pub trait Members: Send + Sync {
    fn get_by_feed(&self, feed: &FeedRef) -> Option<Member>;
    fn get_by_id(&self, id: i64) -> Option<Member>;
}

/// Credential check contract for the password fallback. Hashing policy is
/// owned by the implementation.
pub trait FallbackAuth: Send + Sync {
    /// Returns the member id the credentials belong to, or None.
    fn check(&self, user: &str, pass: &str) -> Option<i64>;
}

/// In-memory member list, used for development setups and tests.
#[derive(Default)]
pub struct InMemoryMembers {
    by_feed: DashMap<FeedRef, Member>,
}

impl InMemoryMembers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, member: Member) {
        self.by_feed.insert(member.pub_key.clone(), member);
    }
}

impl Members for InMemoryMembers {
    fn get_by_feed(&self, feed: &FeedRef) -> Option<Member> {
        self.by_feed.get(feed).map(|m| m.clone())
    }

    fn get_by_id(&self, id: i64) -> Option<Member> {
        self.by_feed.iter().find(|m| m.id == id).map(|m| m.clone())
    }
}

/// Fallback credentials taken straight from configuration. Development
/// convenience only; a production deployment plugs in its own store.
pub struct ConfigFallback {
    user: String,
    pass: String,
    member_id: i64,
}

impl ConfigFallback {
    pub fn new(user: impl Into<String>, pass: impl Into<String>, member_id: i64) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
            member_id,
        }
    }
}

impl FallbackAuth for ConfigFallback {
    fn check(&self, user: &str, pass: &str) -> Option<i64> {
        (user == self.user && pass == self.pass).then_some(self.member_id)
    }
}

/// Denies every credential pair. Used when no fallback is configured.
pub struct NoFallback;

impl FallbackAuth for NoFallback {
    fn check(&self, _user: &str, _pass: &str) -> Option<i64> {
        None
    }
}
