//! Admin authentication.
//!
//! - Argon2id password hashing with server-side pepper
//! - JWT access tokens (15-minute expiry)
//! - Rotating refresh tokens (7-day expiry) stored in `sessions`
//!
//! Participants never log in; they report scores with the tournament's
//! participant token instead.
//!
//! ## Example
//!
//! ```no_run
//! use kart_league::auth::{AuthManager, CreateUserRequest, LoginRequest};
//! use kart_league::db::{Database, DatabaseConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&DatabaseConfig::development()).await?;
//!     let auth = AuthManager::new(
//!         Arc::new(db.pool().clone()),
//!         "secret_pepper".to_string(),
//!         "jwt_secret".to_string(),
//!     );
//!
//!     auth.create_user(CreateUserRequest {
//!         username: "race_control".to_string(),
//!         password: "Kart2024League".to_string(),
//!         display_name: "Race Control".to_string(),
//!     })
//!     .await?;
//!
//!     let (_, tokens) = auth
//!         .login(LoginRequest {
//!             username: "race_control".to_string(),
//!             password: "Kart2024League".to_string(),
//!         })
//!         .await?;
//!     println!("access token expires in {}s", tokens.expires_in);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{AuthError, AuthResult};
pub use manager::AuthManager;
pub use models::{AccessTokenClaims, CreateUserRequest, LoginRequest, SessionTokens, User, UserId};
