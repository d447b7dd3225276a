//! Streaming client configuration

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use kalshi_core::{KalshiError, KalshiResult};

use crate::auth::{Credentials, RequestSigner};

/// Production streaming endpoint
pub const KALSHI_WS_URL: &str = "wss://api.elections.kalshi.com/trade-api/ws/v2";

/// Demo environment streaming endpoint
pub const KALSHI_DEMO_WS_URL: &str = "wss://demo-api.kalshi.co/trade-api/ws/v2";

/// Key id used by unauthenticated tooling; never valid for the stream
pub const ANONYMOUS_KEY_ID: &str = "anonymous";

/// Signature placeholder meaning "nothing was signed"
pub const NO_SIGNATURE: &str = "none";

/// Keepalive ping interval
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(10);
/// First reconnect delay
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);
/// Reconnect delay ceiling
pub const DEFAULT_RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);
/// Longest silence tolerated on the socket before it is treated as dead
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for [`StreamClient`](crate::StreamClient)
#[derive(Clone)]
pub struct ClientOptions {
    pub url: String,
    /// Credentials used when no signer is installed, and validated up front
    pub credentials: Credentials,
    /// Re-signs the upgrade request on every dial when present
    pub signer: Option<Arc<dyn RequestSigner>>,
    pub ping_interval: Duration,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub connect_timeout: Duration,
    pub reply_timeout: Duration,
}

impl ClientOptions {
    /// Options with fixed, pre-signed credentials
    pub fn new(url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            url: url.into(),
            credentials,
            signer: None,
            ping_interval: DEFAULT_PING_INTERVAL,
            reconnect_base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            reconnect_max_delay: DEFAULT_RECONNECT_MAX_DELAY,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    /// Options that sign every upgrade request with `signer`
    pub fn signed(url: impl Into<String>, signer: Arc<dyn RequestSigner>) -> KalshiResult<Self> {
        let url = url.into();
        let credentials = signer.sign("GET", &signing_path(&url)?)?;
        let mut options = Self::new(url, credentials);
        options.signer = Some(signer);
        Ok(options)
    }

    /// Signed options for the production exchange
    pub fn production(signer: Arc<dyn RequestSigner>) -> KalshiResult<Self> {
        Self::signed(KALSHI_WS_URL, signer)
    }

    /// Signed options for the demo exchange
    pub fn demo(signer: Arc<dyn RequestSigner>) -> KalshiResult<Self> {
        Self::signed(KALSHI_DEMO_WS_URL, signer)
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_reconnect_delays(mut self, base: Duration, max: Duration) -> Self {
        self.reconnect_base_delay = base;
        self.reconnect_max_delay = max;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Reject incomplete or placeholder configuration before any I/O
    pub fn validate(&self) -> KalshiResult<()> {
        let url = Url::parse(&self.url)
            .map_err(|e| KalshiError::config(format!("Invalid stream URL '{}': {}", self.url, e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(KalshiError::config(format!(
                "Stream URL must use ws:// or wss://, got '{}'",
                url.scheme()
            )));
        }

        let creds = &self.credentials;
        if creds.key_id.trim().is_empty() {
            return Err(KalshiError::config("API key id is required"));
        }
        if creds.key_id.eq_ignore_ascii_case(ANONYMOUS_KEY_ID) {
            return Err(KalshiError::config("API key id is the anonymous placeholder"));
        }
        if creds.signature.trim().is_empty() {
            return Err(KalshiError::config("Request signature is required"));
        }
        if creds.signature.eq_ignore_ascii_case(NO_SIGNATURE) {
            return Err(KalshiError::config("Request signature is the 'none' placeholder"));
        }
        if creds.timestamp.trim().is_empty() {
            return Err(KalshiError::config("Signature timestamp is required"));
        }

        if self.ping_interval.is_zero() {
            return Err(KalshiError::config("Ping interval must be positive"));
        }
        if self.reconnect_base_delay.is_zero() {
            return Err(KalshiError::config("Reconnect base delay must be positive"));
        }
        if self.reconnect_max_delay < self.reconnect_base_delay {
            return Err(KalshiError::config(
                "Reconnect max delay must not be below the base delay",
            ));
        }
        for (name, value) in [
            ("Read timeout", self.read_timeout),
            ("Write timeout", self.write_timeout),
            ("Connect timeout", self.connect_timeout),
            ("Reply timeout", self.reply_timeout),
        ] {
            if value.is_zero() {
                return Err(KalshiError::config(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }

    /// Credentials for the next upgrade request
    pub(crate) fn fresh_credentials(&self) -> KalshiResult<Credentials> {
        match &self.signer {
            Some(signer) => signer.sign("GET", &signing_path(&self.url)?),
            None => Ok(self.credentials.clone()),
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("url", &self.url)
            .field("credentials", &self.credentials)
            .field("signer", &self.signer.as_ref().map(|_| "[REDACTED]"))
            .field("ping_interval", &self.ping_interval)
            .field("reconnect_base_delay", &self.reconnect_base_delay)
            .field("reconnect_max_delay", &self.reconnect_max_delay)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("reply_timeout", &self.reply_timeout)
            .finish()
    }
}

/// Path component the exchange expects in the signed message
fn signing_path(url: &str) -> KalshiResult<String> {
    Url::parse(url)
        .map(|u| u.path().to_string())
        .map_err(|e| KalshiError::config(format!("Invalid stream URL '{}': {}", url, e)))
}
