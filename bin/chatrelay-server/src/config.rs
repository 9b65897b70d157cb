//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use chatrelay_core::CompletionSettings;

/// Signing secret used when `CHATRELAY_TOKEN_SECRET` is unset. Fine for local
/// development, never for a deployment.
pub const DEV_TOKEN_SECRET: &str = "chatrelay-dev-secret-change-me";

/// Longest credential lifetime accepted from the environment (one year).
pub const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 3600;

/// Runtime configuration for chatrelay-server.
///
/// Every field has a default so the server starts without any environment
/// variables; only the upstream API key is needed for completions to work.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// SQLite database URL (default: `"sqlite://chatrelay.db"`). The pool is
    /// opened on first use, not at startup.
    pub database_url: String,

    /// HS256 key for bearer credentials.
    pub token_secret: String,

    /// Credential lifetime in seconds (default: one day). Clamped to
    /// `1..=MAX_TOKEN_TTL_SECS` by [`Config::token_ttl`].
    pub token_ttl_secs: i64,

    /// Add `Secure` to the `auth-token` cookie.
    pub secure_cookies: bool,

    /// Base URL of the OpenAI-compatible completion API.
    pub upstream_base_url: String,

    pub upstream_api_key: String,

    /// Upstream connect timeout in seconds.
    pub upstream_connect_timeout_secs: u64,

    /// Model used when a request does not name one.
    pub default_model: String,

    pub temperature: f32,

    pub max_tokens: u32,

    /// Sender account for verification mails. Unset means codes are only
    /// written to the log.
    pub email_user: Option<String>,

    /// Comma-separated allowed CORS origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve `/swagger-ui` and `/api-docs/openapi.json`.
    pub enable_swagger: bool,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("CHATRELAY_BIND", "0.0.0.0:3000"),
            database_url: env_or("CHATRELAY_DATABASE_URL", "sqlite://chatrelay.db"),
            token_secret: env_or("CHATRELAY_TOKEN_SECRET", DEV_TOKEN_SECRET),
            token_ttl_secs: parse_env("CHATRELAY_TOKEN_TTL_SECS", 86_400),
            secure_cookies: flag_env("CHATRELAY_SECURE_COOKIES", false),
            upstream_base_url: env_or("CHATRELAY_UPSTREAM_BASE_URL", "https://api.openai.com/v1"),
            upstream_api_key: env_or("CHATRELAY_UPSTREAM_API_KEY", ""),
            upstream_connect_timeout_secs: parse_env("CHATRELAY_UPSTREAM_CONNECT_TIMEOUT_SECS", 30),
            default_model: env_or("CHATRELAY_DEFAULT_MODEL", "gpt-4o-mini"),
            temperature: parse_env("CHATRELAY_TEMPERATURE", 0.7),
            max_tokens: parse_env("CHATRELAY_MAX_TOKENS", 1000),
            email_user: non_empty_env("CHATRELAY_EMAIL_USER"),
            cors_allowed_origins: non_empty_env("CHATRELAY_CORS_ORIGINS"),
            enable_swagger: flag_env("CHATRELAY_ENABLE_SWAGGER", true),
            log_level: env_or("CHATRELAY_LOG", "info"),
            log_json: flag_env("CHATRELAY_LOG_JSON", false),
        }
    }

    /// Defaults applied to every completion request before per-request
    /// overrides.
    pub fn completion_settings(&self) -> CompletionSettings {
        CompletionSettings {
            model: self.default_model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_ttl_secs.clamp(1, MAX_TOKEN_TTL_SECS))
    }

    pub fn upstream_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_connect_timeout_secs)
    }

    pub fn uses_dev_token_secret(&self) -> bool {
        self.token_secret == DEV_TOKEN_SECRET
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn flag_env(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
impl Config {
    /// Defaults with an in-memory database, for router tests.
    pub fn for_tests() -> Self {
        Self {
            bind_address: "127.0.0.1:0".to_owned(),
            database_url: "sqlite::memory:".to_owned(),
            token_secret: "test-secret".to_owned(),
            token_ttl_secs: 3600,
            secure_cookies: false,
            upstream_base_url: "http://127.0.0.1:9".to_owned(),
            upstream_api_key: String::new(),
            upstream_connect_timeout_secs: 1,
            default_model: "test-model".to_owned(),
            temperature: 0.7,
            max_tokens: 1000,
            email_user: None,
            cors_allowed_origins: None,
            enable_swagger: false,
            log_level: "info".to_owned(),
            log_json: false,
        }
    }
}
