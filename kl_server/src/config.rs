//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use kart_league::{
    db::DatabaseConfig,
    security::{RateLimitConfig, RateLimiter, rate_limiter},
    tournament::manager::MAX_TOKEN_TTL_HOURS,
};
use std::{net::SocketAddr, time::Duration};

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Standings cache time to live
    pub cache_ttl: Duration,
    /// Default lifetime of a participant token in hours
    pub participant_token_ttl_hours: i64,
    /// Rate limits for login and participant reports
    pub rate_limits: RateLimitSettings,
    /// Prometheus exporter address, disabled when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Days soft-deleted rows are kept before they are purged, forever when unset
    pub deleted_retention_days: Option<i64>,
}

/// Security-related configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// JWT signing secret (required)
    pub jwt_secret: String,
    /// Password hashing pepper (required)
    pub password_pepper: String,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub login: RateLimitConfig,
    pub score_report: RateLimitConfig,
}

impl RateLimitSettings {
    pub fn limiter(&self) -> RateLimiter {
        RateLimiter::with_configs([
            (rate_limiter::LOGIN, self.login.clone()),
            (rate_limiter::SCORE_REPORT, self.score_report.clone()),
        ])
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            login: RateLimitConfig::login(),
            score_report: RateLimitConfig::score_report(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_env_required_format("SERVER_BIND", DEFAULT_BIND)?,
        };

        let mut database = DatabaseConfig::from_env();
        if let Some(url) = database_url_override {
            database.database_url = url;
        }

        // Security configuration (REQUIRED)
        let jwt_secret = std::env::var("JWT_SECRET").map_err(|_| ConfigError::MissingRequired {
            var: "JWT_SECRET".to_string(),
            hint: "Generate with: openssl rand -hex 32".to_string(),
        })?;

        let password_pepper =
            std::env::var("PASSWORD_PEPPER").map_err(|_| ConfigError::MissingRequired {
                var: "PASSWORD_PEPPER".to_string(),
                hint: "Generate with: openssl rand -hex 16".to_string(),
            })?;

        let metrics_bind = match std::env::var("METRICS_BIND") {
            Ok(raw) if !raw.trim().is_empty() => {
                Some(raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    var: "METRICS_BIND".to_string(),
                    reason: format!("{raw:?} is not a socket address"),
                })?)
            }
            _ => None,
        };

        let deleted_retention_days = match std::env::var("DELETED_RETENTION_DAYS") {
            Ok(raw) if !raw.trim().is_empty() => {
                Some(raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    var: "DELETED_RETENTION_DAYS".to_string(),
                    reason: format!("{raw:?} is not a number of days"),
                })?)
            }
            _ => None,
        };

        let config = ServerConfig {
            bind,
            database,
            security: SecurityConfig {
                jwt_secret,
                password_pepper,
            },
            cache_ttl: Duration::from_secs(parse_env_or("CACHE_TTL_SECS", 300)),
            participant_token_ttl_hours: parse_env_or("PARTICIPANT_TOKEN_TTL_HOURS", 24),
            rate_limits: RateLimitSettings::default(),
            metrics_bind,
            deleted_retention_days,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET".to_string(),
                reason: "Must be at least 32 characters (128-bit security)".to_string(),
            });
        }

        if self.security.password_pepper.len() < 16 {
            return Err(ConfigError::Invalid {
                var: "PASSWORD_PEPPER".to_string(),
                reason: "Must be at least 16 characters (64-bit security)".to_string(),
            });
        }

        if self.cache_ttl.is_zero() {
            return Err(ConfigError::Invalid {
                var: "CACHE_TTL_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&self.participant_token_ttl_hours) {
            return Err(ConfigError::Invalid {
                var: "PARTICIPANT_TOKEN_TTL_HOURS".to_string(),
                reason: format!("Must be between 1 and {MAX_TOKEN_TTL_HOURS}"),
            });
        }

        for (var, limit) in [
            ("RATE_LIMIT_LOGIN_ATTEMPTS", &self.rate_limits.login),
            ("RATE_LIMIT_REPORT_ATTEMPTS", &self.rate_limits.score_report),
        ] {
            if limit.max_attempts == 0 || limit.window_secs == 0 {
                return Err(ConfigError::Invalid {
                    var: var.to_string(),
                    reason: "Attempts and window must be greater than 0".to_string(),
                });
            }
        }

        if self.deleted_retention_days.is_some_and(|days| days < 1) {
            return Err(ConfigError::Invalid {
                var: "DELETED_RETENTION_DAYS".to_string(),
                reason: "Must be at least 1 day".to_string(),
            });
        }

        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS".to_string(),
                reason: format!(
                    "Must be at least DB_MIN_CONNECTIONS ({})",
                    self.database.min_connections
                ),
            });
        }

        Ok(())
    }
}

const DEFAULT_BIND: &str = "127.0.0.1:6969";

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parse a variable that must be well formed when set
fn parse_env_required_format(key: &str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse().map_err(|_| ConfigError::Invalid {
        var: key.to_string(),
        reason: format!("{raw:?} is not a socket address"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn valid_config() -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1:8080".parse().unwrap(),
            database: DatabaseConfig {
                database_url: "test".to_string(),
                max_connections: 10,
                min_connections: 1,
                connection_timeout_secs: 5,
                idle_timeout_secs: 300,
                max_lifetime_secs: 1800,
            },
            security: SecurityConfig {
                jwt_secret: "a".repeat(32),
                password_pepper: "a".repeat(16),
            },
            cache_ttl: Duration::from_secs(300),
            participant_token_ttl_hours: 24,
            rate_limits: RateLimitSettings::default(),
            metrics_bind: None,
            deleted_retention_days: None,
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "JWT_SECRET".to_string(),
            hint: "Use openssl".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("JWT_SECRET"));
        assert!(msg.contains("Use openssl"));
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let mut config = valid_config();
        config.security.jwt_secret = "short".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "JWT_SECRET"));
    }

    #[test]
    fn test_short_pepper_rejected() {
        let mut config = valid_config();
        config.security.password_pepper = "a".repeat(15);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "PASSWORD_PEPPER"));
    }

    #[test]
    fn test_token_ttl_bounds() {
        let mut config = valid_config();
        config.participant_token_ttl_hours = 0;
        assert!(config.validate().is_err());

        config.participant_token_ttl_hours = MAX_TOKEN_TTL_HOURS + 1;
        assert!(config.validate().is_err());

        config.participant_token_ttl_hours = MAX_TOKEN_TTL_HOURS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_cache_ttl_rejected() {
        let mut config = valid_config();
        config.cache_ttl = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retention_must_be_positive() {
        let mut config = valid_config();
        config.deleted_retention_days = Some(0);
        assert!(config.validate().is_err());

        config.deleted_retention_days = Some(30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pool_bounds_checked() {
        let mut config = valid_config();
        config.database.min_connections = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_requires_secrets() {
        // SAFETY: serialized with every other test touching the environment
        unsafe {
            std::env::remove_var("JWT_SECRET");
            std::env::remove_var("PASSWORD_PEPPER");
        }
        let err = ServerConfig::from_env(None, None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref var, .. } if var == "JWT_SECRET"));
    }

    #[test]
    #[serial]
    fn test_from_env_applies_overrides() {
        // SAFETY: serialized with every other test touching the environment
        unsafe {
            std::env::set_var("JWT_SECRET", "s".repeat(40));
            std::env::set_var("PASSWORD_PEPPER", "p".repeat(20));
            std::env::remove_var("METRICS_BIND");
            std::env::set_var("DELETED_RETENTION_DAYS", "45");
        }
        let config = ServerConfig::from_env(
            Some("0.0.0.0:9000".parse().unwrap()),
            Some("postgres://override/db".to_string()),
        )
        .unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.database.database_url, "postgres://override/db");
        assert!(config.metrics_bind.is_none());
        assert_eq!(config.deleted_retention_days, Some(45));
        unsafe {
            std::env::remove_var("JWT_SECRET");
            std::env::remove_var("PASSWORD_PEPPER");
            std::env::remove_var("DELETED_RETENTION_DAYS");
        }
    }
}
