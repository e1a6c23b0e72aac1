// common/src/alias.rs
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::feed::FeedRef;

/// A signed statement that `user_id` wants to be known as `alias` on the
/// room identified by `room_id`. Same signing discipline as the sign-in
/// payload, distinct message shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub room_id: FeedRef,
    pub user_id: FeedRef,
    pub alias: String,
    pub signature: Vec<u8>,
}

impl Confirmation {
    /// The canonical alias registration message. Frozen wire contract.
    pub fn create_message(&self) -> Vec<u8> {
        format!(
            "=room-alias-registration:{}:{}:{}",
            self.room_id, self.user_id, self.alias
        )
        .into_bytes()
    }

    /// Sign the registration with the user's secret key, filling in the
    /// signature field.
    pub fn sign(&mut self, key: &SigningKey) {
        self.signature = key.sign(&self.create_message()).to_bytes().to_vec();
    }

    /// Verify the stored signature against the user's public key. Callers
    /// reject the registration or revocation outright on a false result.
    pub fn verify(&self) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.user_id.id) else {
            return false;
        };
        let Ok(sig) = Signature::from_slice(&self.signature) else {
            return false;
        };
        key.verify(&self.create_message(), &sig).is_ok()
    }
}
