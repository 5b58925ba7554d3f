//! Error classification for gateway responses
//!
//! The gateway embeds a structured error envelope (`code`/`error`/`message`)
//! in response bodies. Bodies that do not decode as that envelope are
//! ordinary payloads and pass through untouched.

use serde::Deserialize;
use thiserror::Error;

/// Fixed message the gateway attaches when the session is expired or invalid.
pub(crate) const UNAUTHORIZED_MESSAGE: &str = "User does not have adequate access rights";

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors produced by login and proxied calls against one gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway rejected the session; a fresh login is required
    #[error("User does not have adequate access rights")]
    Unauthorized,

    /// Structured error returned by the gateway API
    #[error("error from api: code {code}, error: {error:?}, message: {message:?}")]
    Api {
        code: i64,
        error: String,
        message: String,
    },

    /// The call was abandoned before the gateway produced an answer
    #[error("request timed out")]
    Timeout,

    /// Login response carried no session token
    #[error("token missing, unknown response error")]
    MissingToken,

    /// Transport-level failure talking to the gateway
    #[error("http request failed: {0}")]
    Http(reqwest::Error),

    /// Invalid gateway address
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Response body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Http(err)
        }
    }
}

impl GatewayError {
    /// Soft unavailability: the backend has not answered yet, as opposed to
    /// an affirmative failure.
    pub fn is_soft(&self) -> bool {
        matches!(self, GatewayError::Timeout)
    }

    /// Whether a fresh login followed by one retry may resolve this error.
    pub(crate) fn triggers_relogin(&self) -> bool {
        matches!(self, GatewayError::Unauthorized | GatewayError::Timeout)
    }
}

/// Structured error envelope embedded in gateway response bodies.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

impl ErrorBody {
    /// Classify a raw response body.
    ///
    /// A body that is not JSON, or carries none of the envelope fields, is
    /// an ordinary payload and classifies as success.
    pub(crate) fn classify(body: &[u8]) -> Result<()> {
        serde_json::from_slice::<ErrorBody>(body)
            .unwrap_or_default()
            .into_result()
    }

    fn into_result(self) -> Result<()> {
        if self.code == 403 && self.message == UNAUTHORIZED_MESSAGE {
            return Err(GatewayError::Unauthorized);
        }
        if self.code == 0 && self.error.is_empty() && self.message.is_empty() {
            return Ok(());
        }
        Err(GatewayError::Api {
            code: self.code,
            error: self.error,
            message: self.message,
        })
    }
}
