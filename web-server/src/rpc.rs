// web-server/src/rpc.rs
use async_trait::async_trait;
use common::feed::FeedRef;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;

/// Remote procedure asked of the signing client. Wire contract shared with
/// independently implemented peers; the name and argument order are frozen.
pub const REQUEST_SOLUTION: &str = "httpAuth.requestSolution";

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("rpc transport error: {0}")]
    Transport(String),
}

/// One live, already-encrypted peer connection, reduced to the single call
/// this service needs. Connection establishment, muxing and timeouts are
/// owned by the transport layer behind the implementation.
#[async_trait]
pub trait SolutionEndpoint: Send + Sync {
    /// Invoke `httpAuth.requestSolution(serverChallenge, clientChallenge)`
    /// on the peer and await its single string reply: a base64-encoded
    /// signature over the canonical sign-in message.
    async fn request_solution(
        &self,
        server_challenge: &str,
        client_challenge: &str,
    ) -> Result<String, RpcError>;
}

/// Registry of currently connected peers, keyed by feed. The transport
/// layer adds an endpoint when a peer's connection comes up and removes it
/// on disconnect; the login flow only ever reads.
#[derive(Default)]
pub struct ConnectedPeers {
    endpoints: DashMap<FeedRef, Arc<dyn SolutionEndpoint>>,
}

impl ConnectedPeers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_endpoint(&self, feed: FeedRef, endpoint: Arc<dyn SolutionEndpoint>) {
        tracing::info!("peer connected: {}", feed);
        self.endpoints.insert(feed, endpoint);
    }

    pub fn remove_endpoint(&self, feed: &FeedRef) {
        if self.endpoints.remove(feed).is_some() {
            tracing::info!("peer disconnected: {}", feed);
        }
    }

    pub fn endpoint_for(&self, feed: &FeedRef) -> Option<Arc<dyn SolutionEndpoint>> {
        self.endpoints.get(feed).map(|e| e.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticAnswer(String);

    #[async_trait]
    impl SolutionEndpoint for StaticAnswer {
        async fn request_solution(&self, _sc: &str, _cc: &str) -> Result<String, RpcError> {
            Ok(self.0.clone())
        }
    }

    #[actix_web::test]
    async fn directory_tracks_connections() {
        let peers = ConnectedPeers::new();
        let feed = FeedRef::new([4u8; 32], "ed25519");

        assert!(peers.endpoint_for(&feed).is_none());

        peers.add_endpoint(feed.clone(), Arc::new(StaticAnswer("sig".to_string())));
        let endpoint = peers.endpoint_for(&feed).expect("endpoint registered");
        assert_eq!(endpoint.request_solution("sc", "cc").await.unwrap(), "sig");

        peers.remove_endpoint(&feed);
        assert!(peers.endpoint_for(&feed).is_none());
    }
}
