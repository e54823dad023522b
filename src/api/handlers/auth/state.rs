//! Auth state and configuration.

use chrono::Duration;
use secrecy::SecretString;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::{
    blacklist::{MemoryBlacklist, TokenBlacklist},
    google::GoogleOAuth,
    rate_limit::{NoopRateLimiter, RateLimiter},
    recaptcha::{CaptchaVerifier, DisabledCaptcha},
    storage::UserStore,
    tokens::TokenService,
};

const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 30;
const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 7;
const DEFAULT_RESET_TOKEN_TTL_SECONDS: i64 = 60 * 60;
pub const MAX_ACCESS_TOKEN_TTL_MINUTES: i64 = 7 * 24 * 60;
pub const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 365;
pub const MAX_RESET_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(format!("unknown environment: {value}")),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    jwt_secret: SecretString,
    frontend_url: String,
    environment: Environment,
    access_token_ttl_minutes: i64,
    refresh_token_ttl_days: i64,
    reset_token_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(jwt_secret: SecretString) -> Self {
        Self {
            jwt_secret,
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            environment: Environment::default(),
            access_token_ttl_minutes: DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
            refresh_token_ttl_days: DEFAULT_REFRESH_TOKEN_TTL_DAYS,
            reset_token_ttl_seconds: DEFAULT_RESET_TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_frontend_url(mut self, frontend_url: String) -> Self {
        self.frontend_url = frontend_url;
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Clamped to `1..=MAX_ACCESS_TOKEN_TTL_MINUTES`.
    #[must_use]
    pub fn with_access_token_ttl_minutes(mut self, minutes: i64) -> Self {
        self.access_token_ttl_minutes = minutes.clamp(1, MAX_ACCESS_TOKEN_TTL_MINUTES);
        self
    }

    /// Clamped to `1..=MAX_REFRESH_TOKEN_TTL_DAYS`.
    #[must_use]
    pub fn with_refresh_token_ttl_days(mut self, days: i64) -> Self {
        self.refresh_token_ttl_days = days.clamp(1, MAX_REFRESH_TOKEN_TTL_DAYS);
        self
    }

    /// Clamped to `1..=MAX_RESET_TOKEN_TTL_SECONDS`.
    #[must_use]
    pub fn with_reset_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_token_ttl_seconds = seconds.clamp(1, MAX_RESET_TOKEN_TTL_SECONDS);
        self
    }

    #[must_use]
    pub fn frontend_url(&self) -> &str {
        &self.frontend_url
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    #[must_use]
    pub fn access_token_ttl_minutes(&self) -> i64 {
        self.access_token_ttl_minutes
    }

    #[must_use]
    pub fn refresh_token_ttl_days(&self) -> i64 {
        self.refresh_token_ttl_days
    }

    #[must_use]
    pub fn reset_token_ttl_seconds(&self) -> i64 {
        self.reset_token_ttl_seconds
    }

    fn token_service(&self) -> TokenService {
        TokenService::new(
            &self.jwt_secret,
            Duration::minutes(self.access_token_ttl_minutes),
            Duration::days(self.refresh_token_ttl_days),
            Duration::seconds(self.reset_token_ttl_seconds),
        )
    }
}

pub struct AuthState {
    config: AuthConfig,
    tokens: TokenService,
    store: Arc<dyn UserStore>,
    blacklist: Arc<dyn TokenBlacklist>,
    rate_limiter: Arc<dyn RateLimiter>,
    captcha: Arc<dyn CaptchaVerifier>,
    google: Option<GoogleOAuth>,
}

impl AuthState {
    /// State with an in-memory blacklist, no rate limiting, no reCAPTCHA and
    /// no Google sign-in; use the `with_*` methods to enable them.
    pub fn new(config: AuthConfig, store: Arc<dyn UserStore>) -> Self {
        let tokens = config.token_service();
        Self {
            config,
            tokens,
            store,
            blacklist: Arc::new(MemoryBlacklist::new()),
            rate_limiter: Arc::new(NoopRateLimiter),
            captcha: Arc::new(DisabledCaptcha),
            google: None,
        }
    }

    #[must_use]
    pub fn with_blacklist(mut self, blacklist: Arc<dyn TokenBlacklist>) -> Self {
        self.blacklist = blacklist;
        self
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    #[must_use]
    pub fn with_captcha(mut self, captcha: Arc<dyn CaptchaVerifier>) -> Self {
        self.captcha = captcha;
        self
    }

    #[must_use]
    pub fn with_google(mut self, google: GoogleOAuth) -> Self {
        self.google = Some(google);
        self
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    #[must_use]
    pub fn store(&self) -> &dyn UserStore {
        self.store.as_ref()
    }

    pub(super) fn blacklist(&self) -> &dyn TokenBlacklist {
        self.blacklist.as_ref()
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }

    pub(super) fn captcha(&self) -> &dyn CaptchaVerifier {
        self.captcha.as_ref()
    }

    pub(super) fn google(&self) -> Option<&GoogleOAuth> {
        self.google.as_ref()
    }
}
