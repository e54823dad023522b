//! Rate limiting primitives for auth flows.
//!
//! Limits are fixed windows counted per action and client IP. Each endpoint
//! keeps its own counters even when two endpoints share a limit.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    Register,
    Login,
    GoogleLogin,
    Refresh,
    ForgotPassword,
    ResetPassword,
    PasswordChange,
}

/// `N` requests per `period`, parsed from strings such as `5/minute`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimit {
    count: u32,
    period: Duration,
    unit: &'static str,
}

impl RateLimit {
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl FromStr for RateLimit {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (count, unit) = value
            .split_once('/')
            .ok_or_else(|| format!("invalid rate limit '{value}', expected N/unit"))?;
        let count = count
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|count| *count > 0)
            .ok_or_else(|| format!("invalid rate limit count in '{value}'"))?;
        let (unit, seconds) = match unit.trim().to_lowercase().as_str() {
            "second" | "seconds" | "s" => ("second", 1),
            "minute" | "minutes" | "m" => ("minute", 60),
            "hour" | "hours" | "h" => ("hour", 60 * 60),
            "day" | "days" | "d" => ("day", 24 * 60 * 60),
            _ => return Err(format!("invalid rate limit unit in '{value}'")),
        };
        Ok(Self {
            count,
            period: Duration::from_secs(seconds),
            unit,
        })
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} per 1 {}", self.count, self.unit)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited(RateLimit),
}

pub trait RateLimiter: Send + Sync {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_ip(&self, _ip: Option<&str>, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

/// Configured limit for every action.
#[derive(Clone, Debug)]
pub struct RateLimits {
    pub register: RateLimit,
    pub login: RateLimit,
    pub refresh: RateLimit,
    pub password_change: RateLimit,
}

impl Default for RateLimits {
    fn default() -> Self {
        let minute = |count| RateLimit {
            count,
            period: Duration::from_secs(60),
            unit: "minute",
        };
        Self {
            register: minute(5),
            login: minute(10),
            refresh: minute(20),
            password_change: minute(3),
        }
    }
}

impl RateLimits {
    fn limit(&self, action: RateLimitAction) -> &RateLimit {
        match action {
            RateLimitAction::Register
            | RateLimitAction::ForgotPassword
            | RateLimitAction::ResetPassword => &self.register,
            RateLimitAction::Login | RateLimitAction::GoogleLogin => &self.login,
            RateLimitAction::Refresh => &self.refresh,
            RateLimitAction::PasswordChange => &self.password_change,
        }
    }
}

struct Window {
    started: Instant,
    hits: u32,
}

/// In-process fixed-window limiter keyed by (action, ip).
pub struct FixedWindowRateLimiter {
    limits: RateLimits,
    windows: Mutex<HashMap<(RateLimitAction, String), Window>>,
}

impl FixedWindowRateLimiter {
    #[must_use]
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            windows: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl RateLimiter for FixedWindowRateLimiter {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision {
        let limit = self.limits.limit(action);
        let key = (action, ip.unwrap_or("unknown").to_string());
        let now = Instant::now();

        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.retain(|(action, _), window| {
            now.duration_since(window.started) < self.limits.limit(*action).period
        });
        let window = windows.entry(key).or_insert(Window {
            started: now,
            hits: 0,
        });
        if now.duration_since(window.started) >= limit.period {
            window.started = now;
            window.hits = 0;
        }
        if window.hits >= limit.count {
            return RateLimitDecision::Limited(limit.clone());
        }
        window.hits += 1;
        RateLimitDecision::Allowed
    }
}
