// web-server/src/token_exchange.rs
use actix::{Actor, AsyncContext, Context, Handler, Message, MessageResult};
use chrono::{DateTime, Utc};
use common::httpauth::generate_challenge;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

// Default one-time token TTL in seconds (10 minutes)
const DEFAULT_TOKEN_TTL: i64 = 600;
// How often unredeemed tokens are swept
const SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("unknown or already consumed token")]
    NotFound,
}

/// Actor message: mint a one-time token for a verified member
#[derive(Message)]
#[rtype(result = "String")]
pub struct CreateToken {
    pub member_id: i64,
}

/// Actor message: redeem a token, consuming it
#[derive(Message)]
#[rtype(result = "Result<i64, TokenError>")]
pub struct CheckToken {
    pub token: String,
}

struct TokenEntry {
    member_id: i64,
    created_at: DateTime<Utc>,
}

/// Short-lived map from opaque one-time tokens to verified member
/// identities. An entry is written only after a signature check succeeded
/// and read-and-deleted on redemption; consume-once is the sole replay
/// defense. Unredeemed tokens are evicted after an explicit TTL.
pub struct TokenExchangeActor {
    tokens: HashMap<String, TokenEntry>,
    token_ttl: i64,
}

impl Default for TokenExchangeActor {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenExchangeActor {
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
            token_ttl: DEFAULT_TOKEN_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.token_ttl = ttl_seconds;
        self
    }

    fn sweep(&mut self) -> usize {
        let now = Utc::now();
        let ttl = self.token_ttl;
        let before = self.tokens.len();
        self.tokens
            .retain(|_, entry| now.signed_duration_since(entry.created_at).num_seconds() <= ttl);
        before - self.tokens.len()
    }
}

impl Actor for TokenExchangeActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("TokenExchangeActor started with TTL: {}s", self.token_ttl);

        ctx.run_interval(Duration::from_secs(SWEEP_INTERVAL_SECS), |act, _ctx| {
            let swept = act.sweep();
            if swept > 0 {
                tracing::info!("Swept {} unredeemed tokens", swept);
            }
        });
    }
}

impl Handler<CreateToken> for TokenExchangeActor {
    type Result = MessageResult<CreateToken>;

    fn handle(&mut self, msg: CreateToken, _ctx: &mut Self::Context) -> Self::Result {
        let token = generate_challenge();
        self.tokens.insert(
            token.clone(),
            TokenEntry {
                member_id: msg.member_id,
                created_at: Utc::now(),
            },
        );

        tracing::debug!("Minted sign-in token for member {}", msg.member_id);
        MessageResult(token)
    }
}

impl Handler<CheckToken> for TokenExchangeActor {
    type Result = MessageResult<CheckToken>;

    fn handle(&mut self, msg: CheckToken, _ctx: &mut Self::Context) -> Self::Result {
        let Some(entry) = self.tokens.remove(&msg.token) else {
            return MessageResult(Err(TokenError::NotFound));
        };

        // an entry the sweep has not caught up with yet is still dead
        let age = Utc::now().signed_duration_since(entry.created_at);
        if age.num_seconds() > self.token_ttl {
            return MessageResult(Err(TokenError::NotFound));
        }

        MessageResult(Ok(entry.member_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::httpauth::decode_challenge;

    #[actix_web::test]
    async fn token_is_consumed_exactly_once() {
        let exchange = TokenExchangeActor::new().start();

        let token = exchange.send(CreateToken { member_id: 23 }).await.unwrap();
        assert!(decode_challenge(&token).is_ok());

        let first = exchange
            .send(CheckToken {
                token: token.clone(),
            })
            .await
            .unwrap();
        assert_eq!(first, Ok(23));

        let second = exchange.send(CheckToken { token }).await.unwrap();
        assert_eq!(second, Err(TokenError::NotFound));
    }

    #[actix_web::test]
    async fn unknown_token_is_not_found() {
        let exchange = TokenExchangeActor::new().start();

        let res = exchange
            .send(CheckToken {
                token: "never-minted".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(res, Err(TokenError::NotFound));
    }

    #[actix_web::test]
    async fn expired_token_is_not_redeemable() {
        let exchange = TokenExchangeActor::new().with_ttl(0).start();

        let token = exchange.send(CreateToken { member_id: 1 }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let res = exchange.send(CheckToken { token }).await.unwrap();
        assert_eq!(res, Err(TokenError::NotFound));
    }
}
