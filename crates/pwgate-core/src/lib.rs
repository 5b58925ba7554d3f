//! pwgate-core - Core abstractions shared by the gateway proxy crates
//!
//! This crate defines the single capability everything else composes over:
//! handle a request path, produce a buffered status and body. Gateway
//! sessions implement it, the fan-out aggregator both consumes and
//! implements it, and the HTTP layer depends on nothing more.

use async_trait::async_trait;
use bytes::Bytes;

/// A fully buffered response from one request handler.
///
/// Handlers resolve their own errors into a status and body, so this is the
/// only shape the aggregator and the HTTP layer ever see.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response payload.
    pub body: Bytes,
}

impl ProxyResponse {
    /// Successful pass-through of a backend payload.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// An error response carrying a plain-text message.
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: Bytes::from(message.into()),
        }
    }

    /// A response with a status code and no body.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: Bytes::new(),
        }
    }

    /// Whether this response is a winning success for aggregation purposes.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Whether this response signals a backend that is not ready yet,
    /// as opposed to one that actually failed.
    pub fn is_soft_timeout(&self) -> bool {
        self.status == 408
    }
}

/// The capability the HTTP layer and the aggregator depend on.
///
/// Object-safe by design: handlers are composed as `Arc<dyn RequestHandler>`
/// so a single gateway session and an aggregate of many look identical to
/// their callers.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handle a proxied request for `path`, returning the full buffered
    /// response. Implementations never fail outright; errors are resolved
    /// into a status and body.
    async fn handle(&self, path: &str) -> ProxyResponse;
}
