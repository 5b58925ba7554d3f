//! pwgate-session - Authenticated session handling for one gateway device
//!
//! Each gateway requires a cookie-based login session. A [`GatewaySession`]
//! owns one device's credentials, HTTP client and cookie store, logs in on
//! demand (deduplicating concurrent attempts through a [`LoginGate`]), and
//! proxies individual calls, retrying once after a fresh login when the
//! device reports the session as unauthorized.

pub mod error;
pub mod gate;
pub mod session;

pub use error::{GatewayError, Result};
pub use gate::LoginGate;
pub use session::GatewaySession;
