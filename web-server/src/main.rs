// web-server/src/main.rs
use actix::Actor;
use actix_web::{web, App, HttpServer};
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use common::feed::FeedRef;
use common::models::member::{ConfigFallback, FallbackAuth, InMemoryMembers, NoFallback};
use common::{setup_tracing, Config};
use dashmap::DashMap;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use std::sync::Arc;
use std::time::Duration;

use web_server::api;
use web_server::api::auth::AuthService;
use web_server::rpc::ConnectedPeers;
use web_server::session_registry::SessionRegistryActor;
use web_server::signal_bridge::SignalBridgeActor;
use web_server::token_exchange::TokenExchangeActor;

/// Load the room's signing identity from config, or mint an ephemeral one
/// for development.
fn room_key(secret: Option<&str>) -> SigningKey {
    if let Some(encoded) = secret {
        match B64.decode(encoded) {
            // ssb secret files store seed and public key concatenated
            Ok(bytes) if bytes.len() == 32 || bytes.len() == 64 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&bytes[..32]);
                return SigningKey::from_bytes(&seed);
            }
            _ => tracing::warn!("ROOM_SECRET_KEY is not a valid key, generating one"),
        }
    } else {
        tracing::warn!("no room secret key configured, generating an ephemeral identity");
    }
    SigningKey::generate(&mut OsRng)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Setup tracing
    setup_tracing();

    // Load configuration
    let config = Config::from_env();

    // Save address before moving config pieces into app data
    let server_addr = config.web_server_addr.clone();

    let signing_key = room_key(config.room.secret_key.as_deref());
    let room_id = FeedRef::new(signing_key.verifying_key().to_bytes(), "ed25519");
    tracing::info!("Starting sign-in service on {} as {}", server_addr, room_id);

    // Process-wide registries
    let bridge = SignalBridgeActor::new().start();
    let tokens = TokenExchangeActor::new()
        .with_ttl(config.auth.token_ttl)
        .start();
    let sessions = SessionRegistryActor::new()
        .with_ttl(config.auth.session_ttl)
        .start();

    // External collaborators: member storage and the peer transport fill
    // these at runtime
    let members = Arc::new(InMemoryMembers::new());
    let peers = Arc::new(ConnectedPeers::new());
    let fallback: Arc<dyn FallbackAuth> =
        match (&config.auth.admin_user, &config.auth.admin_pass) {
            (Some(user), Some(pass)) => Arc::new(ConfigFallback::new(
                user.clone(),
                pass.clone(),
                config.auth.admin_member_id,
            )),
            _ => Arc::new(NoFallback),
        };

    let svc = web::Data::new(AuthService {
        room_id,
        multiserver_address: config.room.multiserver_address.clone(),
        members,
        fallback,
        peers,
        bridge,
        tokens,
        sessions,
        pending: DashMap::new(),
        session_ttl: config.auth.session_ttl,
        attempt_ttl: config.auth.attempt_ttl,
        ping_interval: Duration::from_millis(config.auth.ping_interval_ms),
    });

    // Sweep abandoned sign-in attempts in the background
    let sweeper = svc.clone();
    actix_web::rt::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            let swept = sweeper.sweep_pending();
            if swept > 0 {
                tracing::info!("Swept {} abandoned sign-in attempts", swept);
            }
        }
    });

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(svc.clone())
            .configure(api::configure)
    })
    .bind(&server_addr)?
    .run()
    .await
}
