//! Sliding-window rate limiting with lockout and exponential backoff.
//!
//! Each `(endpoint, identifier)` pair keeps the instants of its recent
//! attempts. Once the window is full the pair is locked out; with backoff
//! enabled every further violation doubles the lockout (capped at 32x)
//! until [`RateLimiter::reset`] is called, e.g. after a successful login.

use super::errors::{RateLimitError, RateLimiterResult};
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

/// Admin login endpoint
pub const LOGIN: &str = "login";
/// Participant score reporting endpoint
pub const SCORE_REPORT: &str = "score_report";

/// Rate limit configuration for an endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum attempts allowed in window
    pub max_attempts: u32,

    /// Sliding window in seconds
    pub window_secs: u64,

    /// Lockout in seconds after exceeding the limit
    pub lockout_secs: u64,

    pub exponential_backoff: bool,
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl RateLimitConfig {
    /// Admin login: 5 attempts per 5 minutes, 15 minute lockout with backoff
    pub fn login() -> Self {
        Self {
            max_attempts: env_u64("RATE_LIMIT_LOGIN_ATTEMPTS", 5) as u32,
            window_secs: env_u64("RATE_LIMIT_LOGIN_WINDOW_SECS", 300),
            lockout_secs: env_u64("RATE_LIMIT_LOGIN_LOCKOUT_SECS", 900),
            exponential_backoff: true,
        }
    }

    /// Participant reports: 20 per minute, 2 minute lockout
    pub fn score_report() -> Self {
        Self {
            max_attempts: env_u64("RATE_LIMIT_REPORT_ATTEMPTS", 20) as u32,
            window_secs: env_u64("RATE_LIMIT_REPORT_WINDOW_SECS", 60),
            lockout_secs: env_u64("RATE_LIMIT_REPORT_LOCKOUT_SECS", 120),
            exponential_backoff: false,
        }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    fn lockout(&self, violations: u32) -> Duration {
        let multiplier = if self.exponential_backoff {
            2u64.pow(violations.min(5))
        } else {
            1
        };
        Duration::from_secs(self.lockout_secs.saturating_mul(multiplier))
    }
}

#[derive(Debug, Default)]
struct AttemptWindow {
    attempts: VecDeque<Instant>,
    locked_until: Option<Instant>,
    violations: u32,
}

impl AttemptWindow {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(first) = self.attempts.front() {
            if now.duration_since(*first) >= window {
                self.attempts.pop_front();
            } else {
                break;
            }
        }
    }

    fn is_idle(&self, now: Instant) -> bool {
        self.attempts.is_empty() && self.locked_until.is_none_or(|until| until <= now)
    }
}

/// Rate limit check result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Action is allowed
    Allowed { remaining: u32 },

    /// Action is blocked; seconds until it may be retried
    Locked { retry_after: u64 },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            RateLimitResult::Locked { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// In-memory rate limiter keyed by endpoint and client identity
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, AttemptWindow>>>,
    configs: Arc<HashMap<String, RateLimitConfig>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// Limiter with the login and score report endpoints configured
    pub fn new() -> Self {
        Self::with_configs([
            (LOGIN, RateLimitConfig::login()),
            (SCORE_REPORT, RateLimitConfig::score_report()),
        ])
    }

    pub fn with_configs<'a>(configs: impl IntoIterator<Item = (&'a str, RateLimitConfig)>) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            configs: Arc::new(
                configs
                    .into_iter()
                    .map(|(endpoint, config)| (endpoint.to_string(), config))
                    .collect(),
            ),
        }
    }

    pub fn config(&self, endpoint: &str) -> Option<&RateLimitConfig> {
        self.configs.get(endpoint)
    }

    /// Check the limit and record the attempt in one step
    ///
    /// ```
    /// # use kart_league::security::rate_limiter::{RateLimiter, RateLimitResult, LOGIN};
    /// # #[tokio::main]
    /// # async fn main() {
    /// let limiter = RateLimiter::new();
    /// match limiter.check_and_record(LOGIN, "192.168.1.1").await.unwrap() {
    ///     RateLimitResult::Allowed { remaining } => println!("{remaining} attempts left"),
    ///     RateLimitResult::Locked { retry_after } => println!("retry in {retry_after}s"),
    /// }
    /// # }
    /// ```
    pub async fn check_and_record(
        &self,
        endpoint: &str,
        identifier: &str,
    ) -> RateLimiterResult<RateLimitResult> {
        self.check_and_record_at(endpoint, identifier, Instant::now())
            .await
    }

    pub(crate) async fn check_and_record_at(
        &self,
        endpoint: &str,
        identifier: &str,
        now: Instant,
    ) -> RateLimiterResult<RateLimitResult> {
        let config = self
            .configs
            .get(endpoint)
            .ok_or_else(|| RateLimitError::InvalidEndpoint(endpoint.to_string()))?;

        let key = format!("{}:{}", endpoint, identifier);
        let mut windows = self.windows.write().await;
        let entry = windows.entry(key).or_default();

        if let Some(until) = entry.locked_until {
            if now < until {
                let retry_after = until.duration_since(now).as_secs().max(1);
                return Ok(RateLimitResult::Locked { retry_after });
            }
            entry.locked_until = None;
        }

        entry.prune(now, config.window());

        if entry.attempts.len() as u32 >= config.max_attempts {
            let lockout = config.lockout(entry.violations);
            entry.violations += 1;
            entry.locked_until = Some(now + lockout);
            entry.attempts.clear();
            log::warn!(
                "Rate limit exceeded on {} for {}, locked for {:?}",
                endpoint,
                identifier,
                lockout
            );
            return Ok(RateLimitResult::Locked {
                retry_after: lockout.as_secs(),
            });
        }

        entry.attempts.push_back(now);
        Ok(RateLimitResult::Allowed {
            remaining: config.max_attempts - entry.attempts.len() as u32,
        })
    }

    /// Forget all attempts and violations of an identifier
    pub async fn reset(&self, endpoint: &str, identifier: &str) {
        let key = format!("{}:{}", endpoint, identifier);
        self.windows.write().await.remove(&key);
    }

    /// Drop entries with no recent attempts and no active lockout
    pub async fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.write().await;
        let before = windows.len();
        windows.retain(|key, entry| {
            let window = key
                .split_once(':')
                .and_then(|(endpoint, _)| self.configs.get(endpoint))
                .map(RateLimitConfig::window)
                .unwrap_or_default();
            entry.prune(now, window);
            !entry.is_idle(now) || entry.violations > 0
        });
        before - windows.len()
    }
}
