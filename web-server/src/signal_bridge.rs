// web-server/src/signal_bridge.rs
use actix::{Actor, Context, Handler, Message, MessageResult};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;

/// Terminal outcome of one sign-in attempt, delivered at most once to the
/// event stream waiting on the same server challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Worked { token: String },
    Failed { reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("a subscription for this challenge is already registered")]
    AlreadyRegistered,
    #[error("no subscription registered for this challenge")]
    NotFound,
}

/// Register a waiter for a server challenge. At most one live subscription
/// per challenge.
#[derive(Message)]
#[rtype(result = "Result<mpsc::Receiver<SessionEvent>, BridgeError>")]
pub struct Subscribe {
    pub challenge: String,
}

/// Deliver a verified sign-in: the one-time token goes out on the matching
/// subscription.
#[derive(Message)]
#[rtype(result = "Result<(), BridgeError>")]
pub struct SessionWorked {
    pub challenge: String,
    pub token: String,
}

/// Deliver a failed sign-in with a human-readable reason.
#[derive(Message)]
#[rtype(result = "Result<(), BridgeError>")]
pub struct SessionFailed {
    pub challenge: String,
    pub reason: String,
}

/// Drop a registration without delivering anything. Sent when the event
/// stream ends or its client disconnects, so a late RPC completion finds
/// NotFound instead of a dead channel.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Unsubscribe {
    pub challenge: String,
}

/// Routes the outcome of an out-of-band RPC solution to whichever event
/// stream is currently waiting on the same server challenge. The actor
/// mailbox serializes registration, delivery and removal; the actual event
/// travels over a per-challenge buffered channel so delivery never blocks
/// unrelated attempts.
pub struct SignalBridgeActor {
    waiting: HashMap<String, mpsc::Sender<SessionEvent>>,
}

impl Default for SignalBridgeActor {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalBridgeActor {
    pub fn new() -> Self {
        Self {
            waiting: HashMap::new(),
        }
    }

    /// Remove the registration and hand the event over. Exactly-once: the
    /// entry is gone before the send, so a racing second delivery gets
    /// NotFound. A receiver that disappeared mid-send counts as NotFound
    /// too (the browser navigated away).
    fn deliver(&mut self, challenge: &str, event: SessionEvent) -> Result<(), BridgeError> {
        let tx = self.waiting.remove(challenge).ok_or(BridgeError::NotFound)?;
        tx.try_send(event).map_err(|_| BridgeError::NotFound)
    }
}

impl Actor for SignalBridgeActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("SignalBridgeActor started");
    }
}

impl Handler<Subscribe> for SignalBridgeActor {
    type Result = MessageResult<Subscribe>;

    fn handle(&mut self, msg: Subscribe, _ctx: &mut Self::Context) -> Self::Result {
        if self.waiting.contains_key(&msg.challenge) {
            tracing::debug!("duplicate subscription rejected for challenge {}", msg.challenge);
            return MessageResult(Err(BridgeError::AlreadyRegistered));
        }

        // Buffer of one: a subscription only ever sees a single terminal event.
        let (tx, rx) = mpsc::channel(1);
        self.waiting.insert(msg.challenge, tx);

        MessageResult(Ok(rx))
    }
}

impl Handler<SessionWorked> for SignalBridgeActor {
    type Result = MessageResult<SessionWorked>;

    fn handle(&mut self, msg: SessionWorked, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.deliver(&msg.challenge, SessionEvent::Worked { token: msg.token }))
    }
}

impl Handler<SessionFailed> for SignalBridgeActor {
    type Result = MessageResult<SessionFailed>;

    fn handle(&mut self, msg: SessionFailed, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.deliver(&msg.challenge, SessionEvent::Failed { reason: msg.reason }))
    }
}

impl Handler<Unsubscribe> for SignalBridgeActor {
    type Result = ();

    fn handle(&mut self, msg: Unsubscribe, _ctx: &mut Self::Context) -> Self::Result {
        if self.waiting.remove(&msg.challenge).is_some() {
            tracing::debug!("subscription removed for challenge {}", msg.challenge);
        }
    }
}
