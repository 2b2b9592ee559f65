//! Authentication manager implementation.

use super::{
    errors::{AuthError, AuthResult},
    models::{AccessTokenClaims, CreateUserRequest, LoginRequest, SessionTokens, User, UserId},
};
use crate::{
    db::timeouts::{LONG_OPERATION_TIMEOUT, with_timeout},
    security::{
        PasswordHasherWithPepper,
        sanitize::{MAX_NAME_LEN, sanitize_field},
    },
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::sync::Arc;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, display_name, is_active, created_at, last_login";

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        display_name: row.get("display_name"),
        is_active: row.get("is_active"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        last_login: row
            .get::<Option<chrono::NaiveDateTime>, _>("last_login")
            .map(|dt| dt.and_utc()),
    }
}

/// Authentication manager
#[derive(Clone)]
pub struct AuthManager {
    pool: Arc<PgPool>,
    hasher: PasswordHasherWithPepper,
    jwt_secret: String,
    access_token_duration: Duration,
    refresh_token_duration: Duration,
}

impl AuthManager {
    /// Create a new authentication manager
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    /// * `pepper` - Server-side pepper for password hashing
    /// * `jwt_secret` - Secret key for JWT signing
    pub fn new(pool: Arc<PgPool>, pepper: String, jwt_secret: String) -> Self {
        Self {
            pool,
            hasher: PasswordHasherWithPepper::new(pepper),
            jwt_secret,
            access_token_duration: Duration::minutes(15),
            refresh_token_duration: Duration::days(7),
        }
    }

    /// Create an admin account
    ///
    /// # Errors
    ///
    /// * `AuthError::UsernameTaken` - Username already exists
    /// * `AuthError::InvalidUsername` - Username format invalid
    /// * `AuthError::WeakPassword` - Password too weak
    pub async fn create_user(&self, request: CreateUserRequest) -> AuthResult<User> {
        validate_username(&request.username)?;
        validate_password(&request.password)?;
        let display_name = sanitize_field("display_name", &request.display_name, MAX_NAME_LEN)
            .map_err(|e| AuthError::InvalidUsername(e.to_string()))?;

        let password_hash = self.hasher.hash(&request.password)?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (username, password_hash, display_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (username) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&request.username)
        .bind(&password_hash)
        .bind(&display_name)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(AuthError::UsernameTaken)?;

        let user = user_from_row(&row);
        log::info!("Created admin user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Login an admin
    ///
    /// # Errors
    ///
    /// * `AuthError::UserNotFound` - User doesn't exist
    /// * `AuthError::InvalidPassword` - Incorrect password
    /// * `AuthError::AccountDisabled` - Account was deactivated
    pub async fn login(&self, request: LoginRequest) -> AuthResult<(User, SessionTokens)> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE username = $1"
        ))
        .bind(&request.username)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(AuthError::UserNotFound)?;

        let password_hash: String = row.get("password_hash");
        self.hasher.verify(&request.password, &password_hash)?;

        let user = user_from_row(&row);
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(user.id)
            .execute(self.pool.as_ref())
            .await?;

        let tokens = self.create_session(user.id, &user.username).await?;
        Ok((user, tokens))
    }

    /// Create a new session with access and refresh tokens
    async fn create_session(&self, user_id: UserId, username: &str) -> AuthResult<SessionTokens> {
        let access_token = self.generate_access_token(user_id, username)?;
        let refresh_token = Uuid::new_v4().to_string();

        let expires_at = Utc::now() + self.refresh_token_duration;
        sqlx::query(
            r#"
            INSERT INTO sessions (refresh_token, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&refresh_token)
        .bind(user_id)
        .bind(expires_at.naive_utc())
        .execute(self.pool.as_ref())
        .await?;

        Ok(SessionTokens {
            access_token,
            refresh_token,
            expires_in: self.access_token_duration.num_seconds(),
        })
    }

    /// Exchange a refresh token for new tokens; the old one is consumed
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidRefreshToken` - Refresh token not found
    /// * `AuthError::SessionExpired` - Refresh token expired
    pub async fn refresh_token(&self, refresh_token: &str) -> AuthResult<SessionTokens> {
        // Deleting up front makes a replayed token fail even under concurrency
        let session = sqlx::query(
            "DELETE FROM sessions WHERE refresh_token = $1 RETURNING user_id, expires_at",
        )
        .bind(refresh_token)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(AuthError::InvalidRefreshToken)?;

        let expires_at = session
            .get::<chrono::NaiveDateTime, _>("expires_at")
            .and_utc();
        if expires_at < Utc::now() {
            return Err(AuthError::SessionExpired);
        }

        let user_id: UserId = session.get("user_id");
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let user = user_from_row(&row);
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        self.create_session(user.id, &user.username).await
    }

    /// Logout by invalidating a refresh token
    pub async fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        sqlx::query("DELETE FROM sessions WHERE refresh_token = $1")
            .bind(refresh_token)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    /// Drop expired sessions, returning how many were removed
    pub async fn purge_expired_sessions(&self) -> AuthResult<u64> {
        let result = with_timeout(
            LONG_OPERATION_TIMEOUT,
            sqlx::query("DELETE FROM sessions WHERE expires_at < NOW()").execute(self.pool.as_ref()),
        )
        .await?;
        Ok(result.rows_affected())
    }

    /// Verify an access token
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        let token_data = decode::<AccessTokenClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }

    fn generate_access_token(&self, user_id: UserId, username: &str) -> AuthResult<String> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: user_id,
            username: username.to_string(),
            exp: (now + self.access_token_duration).timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;

        Ok(token)
    }
}

/// Validate username format
fn validate_username(username: &str) -> AuthResult<()> {
    let len = username.len();
    if !(3..=20).contains(&len) {
        return Err(AuthError::InvalidUsername(
            "Username must be 3-20 characters".to_string(),
        ));
    }

    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AuthError::InvalidUsername(
            "Username can only contain letters, numbers, and underscores".to_string(),
        ));
    }

    Ok(())
}

/// Validate password strength
fn validate_password(password: &str) -> AuthResult<()> {
    if password.len() < 8 {
        return Err(AuthError::WeakPassword(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());

    if !has_digit || !has_uppercase || !has_lowercase {
        return Err(AuthError::WeakPassword(
            "Password must contain at least one number, one uppercase and one lowercase letter"
                .to_string(),
        ));
    }

    Ok(())
}
