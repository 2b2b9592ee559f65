//! Integration tests for admin authentication.
//!
//! Tests account creation, login, refresh token rotation and logout.
//! Run with `DATABASE_URL` pointing at a migrated database:
//! `cargo test --test auth_integration -- --ignored`

use kart_league::auth::{AuthError, AuthManager, CreateUserRequest, LoginRequest};
use kart_league::db::{Database, DatabaseConfig};
use sqlx::PgPool;
use std::sync::Arc;

const PASSWORD: &str = "SecurePass123!";

/// Helper to create a test database pool
async fn setup_test_db() -> Arc<PgPool> {
    let mut config = DatabaseConfig::from_env();
    config.max_connections = 5;
    config.min_connections = 1;

    let db = Database::new(&config)
        .await
        .expect("Failed to create test database");
    db.migrate().await.expect("Failed to migrate test database");

    Arc::new(db.pool().clone())
}

/// Helper to create test auth manager
async fn setup_auth_manager() -> AuthManager {
    let pool = setup_test_db().await;
    AuthManager::new(
        pool,
        "test_pepper_for_tests".to_string(),
        "test_secret_key_for_jwt_at_least_32_chars".to_string(),
    )
}

fn unique_username(prefix: &str) -> String {
    let rand_id: u32 = rand::random();
    format!("{}_{}", prefix, rand_id % 100000)
}

async fn create_admin(auth: &AuthManager, username: &str) {
    auth.create_user(CreateUserRequest {
        username: username.to_string(),
        password: PASSWORD.to_string(),
        display_name: "Race Director".to_string(),
    })
    .await
    .expect("create admin");
}

fn login_request(username: &str, password: &str) -> LoginRequest {
    LoginRequest {
        username: username.to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_create_user_rejects_duplicate_username() {
    let auth = setup_auth_manager().await;
    let username = unique_username("dup");
    create_admin(&auth, &username).await;

    let result = auth
        .create_user(CreateUserRequest {
            username: username.clone(),
            password: PASSWORD.to_string(),
            display_name: "Second".to_string(),
        })
        .await;

    assert!(matches!(result, Err(AuthError::UsernameTaken)));
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_create_user_rejects_weak_password() {
    let auth = setup_auth_manager().await;

    let result = auth
        .create_user(CreateUserRequest {
            username: unique_username("weak"),
            password: "short".to_string(),
            display_name: "Weak".to_string(),
        })
        .await;

    assert!(matches!(result, Err(AuthError::WeakPassword(_))));
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_login_issues_verifiable_access_token() {
    let auth = setup_auth_manager().await;
    let username = unique_username("login");
    create_admin(&auth, &username).await;

    let (user, tokens) = auth
        .login(login_request(&username, PASSWORD))
        .await
        .expect("login");

    assert_eq!(user.username, username);
    assert!(user.is_active);
    let claims = auth.verify_access_token(&tokens.access_token).unwrap();
    assert_eq!(claims.sub, user.id);
    assert_eq!(claims.username, username);
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_login_wrong_password() {
    let auth = setup_auth_manager().await;
    let username = unique_username("wrongpw");
    create_admin(&auth, &username).await;

    let result = auth.login(login_request(&username, "WrongPass123!")).await;
    assert!(matches!(result, Err(AuthError::InvalidPassword)));
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_login_nonexistent_user() {
    let auth = setup_auth_manager().await;

    let result = auth
        .login(login_request(&unique_username("ghost"), PASSWORD))
        .await;
    assert!(matches!(result, Err(AuthError::UserNotFound)));
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_refresh_token_rotates() {
    let auth = setup_auth_manager().await;
    let username = unique_username("refresh");
    create_admin(&auth, &username).await;
    let (_, tokens) = auth.login(login_request(&username, PASSWORD)).await.unwrap();

    let rotated = auth.refresh_token(&tokens.refresh_token).await.unwrap();
    assert_ne!(rotated.refresh_token, tokens.refresh_token);

    // The consumed token cannot be replayed
    let replay = auth.refresh_token(&tokens.refresh_token).await;
    assert!(matches!(replay, Err(AuthError::InvalidRefreshToken)));

    assert!(auth.refresh_token(&rotated.refresh_token).await.is_ok());
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_logout_invalidates_refresh_token() {
    let auth = setup_auth_manager().await;
    let username = unique_username("logout");
    create_admin(&auth, &username).await;
    let (_, tokens) = auth.login(login_request(&username, PASSWORD)).await.unwrap();

    auth.logout(&tokens.refresh_token).await.unwrap();

    let result = auth.refresh_token(&tokens.refresh_token).await;
    assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_multiple_sessions_same_user() {
    let auth = setup_auth_manager().await;
    let username = unique_username("multi");
    create_admin(&auth, &username).await;

    let (_, first) = auth.login(login_request(&username, PASSWORD)).await.unwrap();
    let (_, second) = auth.login(login_request(&username, PASSWORD)).await.unwrap();
    assert_ne!(first.refresh_token, second.refresh_token);

    // Logging out one session leaves the other usable
    auth.logout(&first.refresh_token).await.unwrap();
    assert!(auth.refresh_token(&second.refresh_token).await.is_ok());
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_invalid_access_token() {
    let auth = setup_auth_manager().await;
    assert!(matches!(
        auth.verify_access_token("not.a.jwt"),
        Err(AuthError::JwtError(_))
    ));
}
