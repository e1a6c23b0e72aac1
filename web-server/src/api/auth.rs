// web-server/src/api/auth.rs
use actix::Addr;
use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use actix_web_lab::sse;
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use chrono::{DateTime, Utc};
use common::feed::FeedRef;
use common::httpauth::{decode_challenge, generate_challenge, ClientPayload};
use common::models::member::{FallbackAuth, Members};
use common::models::session::SessionResult;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::error::AuthError;
use crate::rpc::{ConnectedPeers, SolutionEndpoint, REQUEST_SOLUTION};
use crate::session_registry::{
    CreateSession, GetSession, InvalidateSession, SessionRegistryActor,
};
use crate::signal_bridge::{
    SessionEvent, SessionFailed, SessionWorked, SignalBridgeActor, Subscribe, Unsubscribe,
};
use crate::token_exchange::{CheckToken, CreateToken, TokenExchangeActor};

// Cookie name for the member session
const SESSION_COOKIE_NAME: &str = "room_session";

/// A sign-in attempt that has been started but whose event stream has not
/// opened yet. Consumed exactly once by the events handler.
pub struct PendingAttempt {
    pub payload: ClientPayload,
    pub member_id: i64,
    pub endpoint: Arc<dyn SolutionEndpoint>,
    pub created_at: DateTime<Utc>,
}

/// Shared state of the login orchestrator, registered as app data.
pub struct AuthService {
    pub room_id: FeedRef,
    pub multiserver_address: String,
    pub members: Arc<dyn Members>,
    pub fallback: Arc<dyn FallbackAuth>,
    pub peers: Arc<ConnectedPeers>,
    pub bridge: Addr<SignalBridgeActor>,
    pub tokens: Addr<TokenExchangeActor>,
    pub sessions: Addr<SessionRegistryActor>,
    pub pending: DashMap<String, PendingAttempt>,
    pub session_ttl: i64,
    pub attempt_ttl: i64,
    pub ping_interval: Duration,
}

impl AuthService {
    /// Drop pending attempts whose browser never opened the event stream.
    pub fn sweep_pending(&self) -> usize {
        let now = Utc::now();
        let ttl = self.attempt_ttl;
        // counted per removal; a len() diff misreads concurrent inserts
        let mut swept = 0;
        self.pending.retain(|_, a| {
            let keep = now.signed_duration_since(a.created_at).num_seconds() <= ttl;
            if !keep {
                swept += 1;
            }
            keep
        });
        swept
    }
}

#[derive(Debug, Deserialize)]
pub struct StartQuery {
    /// client public identity, text-encoded
    pub cid: String,
    /// client challenge
    pub cc: String,
}

// Start a sign-in attempt: check the client is a reachable member, mint the
// server challenge and hand back the connection hints.
#[get("/sign-in/start")]
pub async fn sign_in_start(
    query: web::Query<StartQuery>,
    svc: web::Data<AuthService>,
) -> Result<HttpResponse, AuthError> {
    let client_id: FeedRef = query
        .cid
        .parse()
        .map_err(|e| AuthError::BadRequest(format!("cid: {}", e)))?;
    if !client_id.is_ed25519() {
        return Err(AuthError::BadRequest(format!(
            "cid: unsupported algo {:?}",
            client_id.algo
        )));
    }
    decode_challenge(&query.cc).map_err(|e| AuthError::BadRequest(format!("cc: {}", e)))?;

    let Some(member) = svc.members.get_by_feed(&client_id) else {
        tracing::info!("sign-in rejected: {} is not a member", client_id);
        return Err(AuthError::Forbidden);
    };

    // a member that is not connected right now has nothing to answer the
    // solution request; reject before minting a challenge
    let Some(endpoint) = svc.peers.endpoint_for(&client_id) else {
        tracing::info!("sign-in rejected: {} is not connected", client_id);
        return Err(AuthError::Forbidden);
    };

    let server_challenge = generate_challenge();
    let payload = ClientPayload {
        server_id: svc.room_id.clone(),
        client_id,
        server_challenge: server_challenge.clone(),
        client_challenge: query.cc.clone(),
    };

    svc.pending.insert(
        server_challenge.clone(),
        PendingAttempt {
            payload,
            member_id: member.id,
            endpoint,
            created_at: Utc::now(),
        },
    );

    let uri_query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("action", "start-http-auth")
        .append_pair("sid", &svc.room_id.to_string())
        .append_pair("sc", &server_challenge)
        .append_pair("multiserverAddress", &svc.multiserver_address)
        .finish();

    Ok(HttpResponse::Ok().json(json!({
        "server_challenge": server_challenge,
        "ssb_uri": format!("ssb:experimental?{}", uri_query),
        // Android Chrome cannot open ssb: links directly
        "android_uri": format!("intent://experimental?{}#Intent;scheme=ssb;end;", uri_query),
        "multiserver_address": svc.multiserver_address,
    })))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// server challenge
    pub sc: String,
}

// Long-lived event stream for one sign-in attempt. Registers with the
// signal bridge first, then dispatches the solution request, so a delivery
// can never race a not-yet-arrived registration.
#[get("/sign-in/events")]
pub async fn events(
    query: web::Query<EventsQuery>,
    svc: web::Data<AuthService>,
) -> Result<impl Responder, AuthError> {
    decode_challenge(&query.sc).map_err(|e| AuthError::BadRequest(format!("sc: {}", e)))?;

    let rx = svc
        .bridge
        .send(Subscribe {
            challenge: query.sc.clone(),
        })
        .await
        .map_err(|_| AuthError::Internal)?
        .map_err(|_| AuthError::Forbidden)?;

    let Some((_, attempt)) = svc.pending.remove(&query.sc) else {
        // unknown or expired challenge: free the registration again
        svc.bridge.do_send(Unsubscribe {
            challenge: query.sc.clone(),
        });
        tracing::info!("event stream rejected: no pending attempt for challenge");
        return Err(AuthError::Forbidden);
    };

    dispatch_solution_request(svc.clone(), attempt, query.sc.clone());

    let (tx, event_rx) = mpsc::channel::<sse::Event>(2);
    actix_web::rt::spawn(pump_events(
        tx,
        rx,
        svc.bridge.clone(),
        query.sc.clone(),
        svc.ping_interval,
    ));

    Ok(sse::Sse::from_infallible_receiver(event_rx))
}

/// Issue the solution request to the connected peer (exactly once, no
/// retry), verify the returned signature and resolve the attempt through
/// the bridge. Verification failures never propagate as errors; they become
/// a `failed` signal.
fn dispatch_solution_request(
    svc: web::Data<AuthService>,
    attempt: PendingAttempt,
    challenge: String,
) {
    actix_web::rt::spawn(async move {
        let payload = attempt.payload;
        tracing::debug!("sending {} to {}", REQUEST_SOLUTION, payload.client_id);
        let reply = attempt
            .endpoint
            .request_solution(&payload.server_challenge, &payload.client_challenge)
            .await;

        let failure = match reply {
            Ok(sig_b64) => match B64.decode(sig_b64.trim()) {
                Ok(sig) if payload.validate(&sig) => {
                    let token = match svc.tokens.send(CreateToken {
                        member_id: attempt.member_id,
                    })
                    .await
                    {
                        Ok(token) => token,
                        Err(e) => {
                            tracing::error!("token exchange unavailable: {}", e);
                            return;
                        }
                    };

                    if let Ok(Err(e)) = svc.bridge.send(SessionWorked { challenge, token }).await {
                        // the browser navigated away; benign
                        tracing::debug!("sign-in worked but nobody is waiting: {}", e);
                    }
                    return;
                }
                Ok(_) => "not a valid solution".to_string(),
                Err(_) => "signature is not valid base64".to_string(),
            },
            Err(e) => e.to_string(),
        };

        tracing::info!("sign-in attempt failed: {}", failure);
        if let Ok(Err(e)) = svc
            .bridge
            .send(SessionFailed {
                challenge,
                reason: failure,
            })
            .await
        {
            tracing::debug!("sign-in failed with nobody waiting: {}", e);
        }
    });
}

/// Feed the server-sent-events channel: periodic pings until the terminal
/// event arrives or the client goes away, then deregister.
async fn pump_events(
    sender: mpsc::Sender<sse::Event>,
    mut rx: mpsc::Receiver<SessionEvent>,
    bridge: Addr<SignalBridgeActor>,
    challenge: String,
    ping_interval: Duration,
) {
    let mut ticker = tokio::time::interval(ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let ping = sse::Event::Data(sse::Data::new("Waiting for solution").event("ping"));
                if sender.send(ping).await.is_err() {
                    // client disconnected
                    break;
                }
            }
            event = rx.recv() => {
                match event {
                    Some(SessionEvent::Worked { token }) => {
                        let _ = sender
                            .send(sse::Event::Data(sse::Data::new(token).event("success")))
                            .await;
                    }
                    Some(SessionEvent::Failed { reason }) => {
                        let _ = sender
                            .send(sse::Event::Data(sse::Data::new(reason).event("failed")))
                            .await;
                    }
                    None => {}
                }
                break;
            }
        }
    }

    bridge.do_send(Unsubscribe { challenge });
}

#[derive(Debug, Deserialize)]
pub struct FinalizeQuery {
    pub token: String,
}

// Redeem a one-time token for a browser session.
#[get("/sign-in/finalize")]
pub async fn finalize(
    query: web::Query<FinalizeQuery>,
    svc: web::Data<AuthService>,
) -> Result<HttpResponse, AuthError> {
    let member_id = svc
        .tokens
        .send(CheckToken {
            token: query.token.clone(),
        })
        .await
        .map_err(|_| AuthError::Internal)?
        .map_err(|_| AuthError::Forbidden)?;

    let Some(member) = svc.members.get_by_id(member_id) else {
        tracing::warn!("token redeemed for vanished member {}", member_id);
        return Err(AuthError::Forbidden);
    };

    respond_with_session(&svc, member.id, HttpResponse::TemporaryRedirect()).await
}

#[derive(Debug, Deserialize)]
pub struct FallbackForm {
    pub user: String,
    pub pass: String,
}

// Password fallback for administrators.
#[post("/fallback/finalize")]
pub async fn fallback_finalize(
    form: web::Form<FallbackForm>,
    svc: web::Data<AuthService>,
) -> Result<HttpResponse, AuthError> {
    let Some(member_id) = svc.fallback.check(&form.user, &form.pass) else {
        tracing::info!("fallback sign-in rejected for user {}", form.user);
        return Err(AuthError::Forbidden);
    };

    respond_with_session(&svc, member_id, HttpResponse::SeeOther()).await
}

async fn respond_with_session(
    svc: &web::Data<AuthService>,
    member_id: i64,
    mut response: actix_web::HttpResponseBuilder,
) -> Result<HttpResponse, AuthError> {
    let session_token = svc
        .sessions
        .send(CreateSession { member_id })
        .await
        .map_err(|_| AuthError::Internal)?;

    let cookie = Cookie::build(SESSION_COOKIE_NAME, session_token)
        .path("/")
        .secure(true)
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(svc.session_ttl))
        .finish();

    Ok(response
        .append_header(("Location", "/"))
        .cookie(cookie)
        .finish())
}

// Who am I: resolves the session cookie to a member.
#[get("/me")]
pub async fn me(
    req: HttpRequest,
    svc: web::Data<AuthService>,
) -> Result<HttpResponse, AuthError> {
    let cookie = req.cookie(SESSION_COOKIE_NAME).ok_or(AuthError::Forbidden)?;

    let result = svc
        .sessions
        .send(GetSession {
            session_token: cookie.value().to_string(),
        })
        .await
        .map_err(|_| AuthError::Internal)?;

    let SessionResult::Success(session) = result else {
        return Err(AuthError::Forbidden);
    };

    let Some(member) = svc.members.get_by_id(session.member_id) else {
        return Err(AuthError::Forbidden);
    };

    Ok(HttpResponse::Ok().json(json!({
        "member_id": member.id,
        "pub_key": member.pub_key,
    })))
}

// Invalidate the session cookie.
#[get("/logout")]
pub async fn logout(
    req: HttpRequest,
    svc: web::Data<AuthService>,
) -> Result<HttpResponse, AuthError> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE_NAME) {
        svc.sessions
            .send(InvalidateSession {
                session_token: cookie.value().to_string(),
            })
            .await
            .map_err(|_| AuthError::Internal)?;
    }

    let mut expired = Cookie::build(SESSION_COOKIE_NAME, "")
        .path("/")
        .finish();
    expired.make_removal();

    Ok(HttpResponse::SeeOther()
        .append_header(("Location", "/"))
        .cookie(expired)
        .finish())
}
