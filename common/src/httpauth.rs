// common/src/httpauth.rs
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use thiserror::Error;

use crate::feed::FeedRef;

/// Decoded length of server challenges, client challenges and one-time
/// tokens. 24 bytes gives 192 bits of entropy.
pub const CHALLENGE_LENGTH: usize = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("challenge is not valid url-safe base64: {0}")]
    BadEncoding(String),
    #[error("wrong challenge length: expected {CHALLENGE_LENGTH} bytes, got {0}")]
    WrongLength(usize),
}

/// Draw a fresh random challenge and return its url-safe, padding-free
/// text encoding. Challenges and one-time tokens share this generator.
pub fn generate_challenge() -> String {
    let mut buf = [0u8; CHALLENGE_LENGTH];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Reverse [`generate_challenge`]. Rejects strings that are not valid
/// url-safe base64 or whose decoded form is not exactly
/// [`CHALLENGE_LENGTH`] bytes, so truncated or forged challenge strings
/// never become valid correlation keys.
pub fn decode_challenge(s: &str) -> Result<Vec<u8>, ChallengeError> {
    let buf = URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| ChallengeError::BadEncoding(e.to_string()))?;
    if buf.len() != CHALLENGE_LENGTH {
        return Err(ChallengeError::WrongLength(buf.len()));
    }
    Ok(buf)
}

/// The signable content of one sign-in attempt. Built up as the handshake
/// progresses, used once to sign or verify, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPayload {
    pub server_id: FeedRef,
    pub client_id: FeedRef,
    pub server_challenge: String,
    pub client_challenge: String,
}

impl ClientPayload {
    /// The canonical message. This is a frozen wire contract shared with
    /// independently implemented peers; the punctuation, field order and
    /// sentinels must be reproduced byte for byte.
    pub fn create_message(&self) -> Vec<u8> {
        format!(
            "=http-auth-sign-in:{}:{}:{}:{}",
            self.server_id, self.client_id, self.server_challenge, self.client_challenge
        )
        .into_bytes()
    }

    /// Sign the canonical message with an ed25519 secret key.
    pub fn sign(&self, key: &SigningKey) -> Vec<u8> {
        key.sign(&self.create_message()).to_bytes().to_vec()
    }

    /// Check `signature` against the client's public key and the exact
    /// reconstructed canonical message. Pure and side-effect free.
    pub fn validate(&self, signature: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.client_id.id) else {
            return false;
        };
        let Ok(sig) = Signature::from_slice(signature) else {
            return false;
        };
        key.verify(&self.create_message(), &sig).is_ok()
    }
}
