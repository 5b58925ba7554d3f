//! Gateway session: login sequence, cookie store, proxied calls

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use pwgate_core::{ProxyResponse, RequestHandler};

use crate::error::{ErrorBody, GatewayError, Result};
use crate::gate::LoginGate;

/// Default timeout for individual proxied calls
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Account the gateway expects for customer logins
const LOGIN_USERNAME: &str = "customer";

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
    force_sm_off: bool,
}

/// Success body of the authentication endpoint. The gateway also returns a
/// `loginTime` timestamp; the session relies on the cookie instead.
#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: String,
}

/// An authenticated proxy session against one gateway device.
///
/// Owns the device's credentials, an HTTP client bound to a per-session
/// cookie store, and the [`LoginGate`] deduplicating concurrent logins.
/// Cheap to clone; clones share all of it, which lets background login
/// tasks outlive a caller that stopped waiting.
#[derive(Clone)]
pub struct GatewaySession {
    inner: Arc<Inner>,
}

struct Inner {
    host: String,
    base_url: Url,
    email: String,
    password: String,
    login_timeout: Duration,
    client: Client,
    gate: LoginGate,
}

impl GatewaySession {
    /// Create a session for the gateway device at `host` (`host[:port]`).
    ///
    /// The device serves HTTPS with a self-signed certificate, so
    /// certificate validation is disabled for this session only.
    pub fn new(host: &str, email: &str, password: &str, login_timeout: Duration) -> Result<Self> {
        Self::with_base_url(&format!("https://{host}"), email, password, login_timeout, true)
    }

    /// Create a session against an explicit base URL.
    ///
    /// `accept_invalid_certs` sets this session's TLS trust posture;
    /// backends with a valid certificate should keep validation on.
    pub fn with_base_url(
        base_url: &str,
        email: &str,
        password: &str,
        login_timeout: Duration,
        accept_invalid_certs: bool,
    ) -> Result<Self> {
        Self::with_config(
            base_url,
            email,
            password,
            login_timeout,
            DEFAULT_CALL_TIMEOUT,
            DEFAULT_CONNECT_TIMEOUT,
            accept_invalid_certs,
        )
    }

    /// Create a session with custom call timeouts.
    pub fn with_config(
        base_url: &str,
        email: &str,
        password: &str,
        login_timeout: Duration,
        call_timeout: Duration,
        connect_timeout: Duration,
        accept_invalid_certs: bool,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let host = match (base_url.host_str(), base_url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => base_url.to_string(),
        };

        let client = Client::builder()
            .timeout(call_timeout)
            .connect_timeout(connect_timeout)
            .cookie_store(true)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                host,
                base_url,
                email: email.to_string(),
                password: password.to_string(),
                login_timeout,
                client,
                gate: LoginGate::new(),
            }),
        })
    }

    /// The host this session is bound to.
    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// Start (or join) a login sequence and wait for it to finish.
    ///
    /// The attempt runs on a detached task with its own timeout budget; a
    /// caller that stops waiting does not abort it. Completion reports no
    /// error — a failed login surfaces through the next proxied call still
    /// being unauthorized, and through the logs.
    pub async fn login(&self) {
        let _ = self.spawn_login().await;
    }

    /// Run a login attempt and report its real outcome.
    ///
    /// Used by the startup sweep, where whether the login actually
    /// succeeded decides if the process may serve at all. Joining an
    /// attempt already in flight reports `Ok`; its outcome is observed by
    /// the first proxied call instead.
    pub async fn attempt_login(&self) -> Result<()> {
        self.inner.clone().login_once().await.unwrap_or(Ok(()))
    }

    /// Spawn the gate-guarded login attempt on a background task.
    fn spawn_login(&self) -> JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let _ = inner.login_once().await;
        })
    }

    /// Proxy one request, re-authenticating and retrying exactly once if
    /// the gateway reports the session as unauthorized or the call was
    /// abandoned at the retry boundary.
    pub async fn serve(&self, path: &str) -> ProxyResponse {
        let mut outcome = self.inner.proxy_call(path).await;
        if matches!(&outcome, Err(err) if err.triggers_relogin()) {
            self.login().await;
            outcome = self.inner.proxy_call(path).await;
        }

        match outcome {
            Ok(data) => {
                debug!(host = %self.inner.host, path, "proxied call");
                ProxyResponse::ok(data)
            }
            Err(err @ GatewayError::Unauthorized) => {
                warn!(host = %self.inner.host, path, "unauthorized");
                ProxyResponse::error(403, err.to_string())
            }
            Err(err) if err.is_soft() => {
                debug!(host = %self.inner.host, path, "backend not ready");
                ProxyResponse::error(408, err.to_string())
            }
            Err(err) => {
                warn!(host = %self.inner.host, path, error = %err, "proxied call failed");
                ProxyResponse::error(400, err.to_string())
            }
        }
    }
}

impl Inner {
    /// Gate-guarded login attempt. `Some` carries the outcome for the
    /// caller that led the attempt, `None` means an in-flight one was
    /// joined.
    async fn login_once(self: Arc<Self>) -> Option<Result<()>> {
        let attempt = async {
            let outcome = self.run_login().await;
            match &outcome {
                Ok(()) => info!(host = %self.host, "logged in"),
                Err(err) => warn!(host = %self.host, error = %err, "login failed"),
            }
            outcome
        };
        self.gate.run(attempt).await
    }

    /// POST the credentials to the gateway's authentication endpoint.
    ///
    /// The session cookie lands in the cookie store as a side effect of
    /// the round trip. The request carries the login timeout rather than
    /// the per-call default, so a slow gateway still gets its full budget.
    async fn run_login(&self) -> Result<()> {
        let url = self.base_url.join("/api/login/Basic")?;
        debug!(host = %self.host, "attempting login");

        let body = LoginRequest {
            username: LOGIN_USERNAME,
            email: &self.email,
            password: &self.password,
            force_sm_off: false,
        };

        let response = self
            .client
            .post(url)
            .timeout(self.login_timeout)
            .json(&body)
            .send()
            .await?;
        let data = response.bytes().await?;

        ErrorBody::classify(&data)?;

        let parsed: LoginResponse = serde_json::from_slice(&data)?;
        if parsed.token.is_empty() {
            return Err(GatewayError::MissingToken);
        }

        Ok(())
    }

    /// GET `path` from the gateway, path preserved verbatim, and classify
    /// the response body.
    async fn proxy_call(&self, path: &str) -> Result<Bytes> {
        let url = self.base_url.join(path)?;

        let response = self.client.get(url).send().await?;
        let data = response.bytes().await?;

        ErrorBody::classify(&data)?;
        Ok(data)
    }
}

#[async_trait]
impl RequestHandler for GatewaySession {
    async fn handle(&self, path: &str) -> ProxyResponse {
        self.serve(path).await
    }
}
