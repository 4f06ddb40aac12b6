//! Client configuration, resolved from the environment.
//!
//! One backend base URL drives everything: the HTTP API lives under
//! `{backend}/api` and the realtime link under `{backend}/ws` (with the
//! scheme switched to `ws`/`wss`).
//!
//! | Variable | Default |
//! |----------|---------|
//! | `TETHER_MODE` | `development` |
//! | `TETHER_BACKEND_URL` | `http://localhost:5000` (required in production) |
//! | `TETHER_REALTIME_URL` | derived from the backend URL |
//! | `TETHER_HTTP_TIMEOUT_SECS` | `15` |
//! | `TETHER_CONNECT_TIMEOUT_SECS` | `5` |
//! | `TETHER_RECONNECT_ATTEMPTS` | `5` |
//! | `TETHER_RECONNECT_DELAY_MS` | `1000` |
//! | `TETHER_RECONNECT_DELAY_MAX_MS` | `5000` |
//! | `TETHER_CREDENTIAL_PATH` | `.tether/credential` |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tether_realtime::RealtimeConfig;

/// Backend URL used in development when none is configured.
pub const DEFAULT_DEV_BACKEND_URL: &str = "http://localhost:5000";

/// Errors resolving a [`ClientConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A variable is set to something unusable.
    #[error("invalid {key}={value:?}: {reason}")]
    Invalid {
        /// The variable name.
        key: &'static str,
        /// The offending value.
        value: String,
        /// What was expected.
        reason: &'static str,
    },
}

/// Development or production build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Local backend; the backend URL has a default.
    #[default]
    Development,
    /// Deployed backend; the backend URL must be configured.
    Production,
}

impl FromStr for BuildMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(()),
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Development => "development",
            Self::Production => "production",
        })
    }
}

/// Timeouts for the HTTP auth API.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Whole-request timeout.
    pub timeout: Duration,
    /// TCP/TLS connect timeout, also used for the realtime handshake.
    pub connect_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Everything a [`TetherClient`](crate::TetherClient) needs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Build mode.
    pub mode: BuildMode,
    /// Backend base URL without a trailing slash, e.g. `https://api.example.com`.
    pub backend_url: String,
    /// HTTP timeouts.
    pub http: HttpConfig,
    /// Realtime link settings, including its endpoint.
    pub realtime: RealtimeConfig,
    /// Directory the credential file is kept in.
    pub credential_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            mode: BuildMode::Development,
            backend_url: DEFAULT_DEV_BACKEND_URL.to_string(),
            http: HttpConfig::default(),
            realtime: RealtimeConfig::with_endpoint("ws://localhost:5000/ws"),
            credential_path: PathBuf::from(".tether/credential"),
        }
    }
}

impl ClientConfig {
    /// Resolves the configuration from process environment variables.
    ///
    /// # Errors
    /// See [`from_lookup`](Self::from_lookup).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves the configuration through `lookup`, which maps a variable
    /// name to its value.
    ///
    /// # Errors
    /// - [`ConfigError::Missing`] if `TETHER_BACKEND_URL` is unset in
    ///   production.
    /// - [`ConfigError::Invalid`] for an unknown mode, a URL that isn't
    ///   `http(s)://` (or `ws(s)://` for the realtime override), or a
    ///   non-numeric number.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mode = match get("TETHER_MODE") {
            Some(raw) => raw.parse().map_err(|()| ConfigError::Invalid {
                key: "TETHER_MODE",
                value: raw,
                reason: "expected 'development' or 'production'",
            })?,
            None => BuildMode::Development,
        };

        let backend_url = match (get("TETHER_BACKEND_URL"), mode) {
            (Some(url), _) => normalize_backend_url(&url)?,
            (None, BuildMode::Development) => DEFAULT_DEV_BACKEND_URL.to_string(),
            (None, BuildMode::Production) => {
                return Err(ConfigError::Missing("TETHER_BACKEND_URL"));
            }
        };

        let endpoint = match get("TETHER_REALTIME_URL") {
            Some(url) if url.starts_with("ws://") || url.starts_with("wss://") => url,
            Some(url) => {
                return Err(ConfigError::Invalid {
                    key: "TETHER_REALTIME_URL",
                    value: url,
                    reason: "expected a ws:// or wss:// URL",
                });
            }
            None => realtime_endpoint(&backend_url),
        };

        let parse = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            match get(key) {
                Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    key,
                    value: raw,
                    reason: "expected a non-negative integer",
                }),
                None => Ok(default),
            }
        };

        let http = HttpConfig {
            timeout: Duration::from_secs(parse("TETHER_HTTP_TIMEOUT_SECS", 15)?),
            connect_timeout: Duration::from_secs(parse("TETHER_CONNECT_TIMEOUT_SECS", 5)?),
        };

        let attempts = parse("TETHER_RECONNECT_ATTEMPTS", 5)?;
        let realtime = RealtimeConfig {
            endpoint,
            reconnect_attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
            reconnect_delay: Duration::from_millis(parse("TETHER_RECONNECT_DELAY_MS", 1_000)?),
            reconnect_delay_max: Duration::from_millis(parse(
                "TETHER_RECONNECT_DELAY_MAX_MS",
                5_000,
            )?),
            ..RealtimeConfig::default()
        }
        .validated();

        let credential_path = get("TETHER_CREDENTIAL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".tether/credential"));

        Ok(Self {
            mode,
            backend_url,
            http,
            realtime,
            credential_path,
        })
    }

    /// Root of the HTTP API, `{backend_url}/api`.
    pub fn api_base(&self) -> String {
        format!("{}/api", self.backend_url)
    }
}

fn normalize_backend_url(raw: &str) -> Result<String, ConfigError> {
    let url = raw.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.to_string())
    } else {
        Err(ConfigError::Invalid {
            key: "TETHER_BACKEND_URL",
            value: raw.to_string(),
            reason: "expected an http:// or https:// URL",
        })
    }
}

/// `http://host` → `ws://host/ws`, `https://host` → `wss://host/ws`.
fn realtime_endpoint(backend_url: &str) -> String {
    let ws = match backend_url.strip_prefix("https://") {
        Some(rest) => format!("wss://{rest}"),
        None => format!("ws://{}", backend_url.trim_start_matches("http://")),
    };
    format!("{ws}/ws")
}
