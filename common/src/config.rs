// common/src/config.rs
use config::{Config as ConfigFile, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Central configuration for the sign-in service
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub web_server_addr: String,

    // Identity and reachability of the room itself
    pub room: RoomConfig,

    // Lifetimes and intervals of the auth machinery
    pub auth: AuthConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Multiserver address clients dial to reach the room's rpc port,
    /// e.g. "net:rooms.example.org:8008~shs:<base64 key>"
    pub multiserver_address: String,
    /// Base64-encoded ed25519 secret key of the room identity. When unset
    /// an ephemeral dev keypair is generated at startup.
    pub secret_key: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Browser session TTL in seconds
    pub session_ttl: i64,
    /// One-time token TTL in seconds
    pub token_ttl: i64,
    /// How long a started but never-subscribed sign-in attempt is kept, in seconds
    pub attempt_ttl: i64,
    /// Server-sent-events ping interval in milliseconds
    pub ping_interval_ms: u64,
    /// Fallback admin credentials; both unset disables password fallback
    pub admin_user: Option<String>,
    pub admin_pass: Option<String>,
    /// Member id the fallback credentials sign in as
    pub admin_member_id: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web_server_addr: "127.0.0.1:8081".to_string(),
            room: RoomConfig {
                multiserver_address: "net:localhost:8008~shs:".to_string(),
                secret_key: None,
            },
            auth: AuthConfig {
                session_ttl: 86400,
                token_ttl: 600,
                attempt_ttl: 300,
                ping_interval_ms: 3000,
                admin_user: None,
                admin_pass: None,
                admin_member_id: 1,
            },
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        // Build configuration
        let config = ConfigFile::builder()
            // Start with defaults
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add environment specific config
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            // Add a local config file for local overrides
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment variables with prefix "APP"
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Build and deserialize
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load from environment variables directly (backward compatibility)
    pub fn from_env() -> Self {
        // Try to load from file first
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            }
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");

                let defaults = Self::default();

                let web_server_addr = env::var("WEB_SERVER_ADDR")
                    .unwrap_or(defaults.web_server_addr);

                let multiserver_address = env::var("MULTISERVER_ADDRESS")
                    .unwrap_or(defaults.room.multiserver_address);

                let secret_key = env::var("ROOM_SECRET_KEY").ok();

                let session_ttl = env::var("SESSION_TTL")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(defaults.auth.session_ttl);

                let token_ttl = env::var("TOKEN_TTL")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(defaults.auth.token_ttl);

                let attempt_ttl = env::var("ATTEMPT_TTL")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(defaults.auth.attempt_ttl);

                let ping_interval_ms = env::var("PING_INTERVAL_MS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(defaults.auth.ping_interval_ms);

                let admin_user = env::var("ADMIN_USER").ok();
                let admin_pass = env::var("ADMIN_PASS").ok();
                let admin_member_id = env::var("ADMIN_MEMBER_ID")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(defaults.auth.admin_member_id);

                Self {
                    web_server_addr,
                    room: RoomConfig {
                        multiserver_address,
                        secret_key,
                    },
                    auth: AuthConfig {
                        session_ttl,
                        token_ttl,
                        attempt_ttl,
                        ping_interval_ms,
                        admin_user,
                        admin_pass,
                        admin_member_id,
                    },
                }
            }
        }
    }
}
