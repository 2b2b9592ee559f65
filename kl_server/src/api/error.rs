//! Mapping of domain errors onto HTTP responses.
//!
//! Every error body is `{"error": "..."}` built from the domain error's
//! `client_message()`, so database details never reach clients. Server-side
//! failures are logged in full before they are sanitized.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use kart_league::{
    auth::AuthError,
    bracket::BracketError,
    finals::FinalsError,
    matches::MatchError,
    player::PlayerError,
    qualification::QualificationError,
    reporting::ReportError,
    time_attack::{PhaseError, TaError},
    tournament::TournamentError,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Any error a handler can return
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Tournament(#[from] TournamentError),

    #[error(transparent)]
    Player(#[from] PlayerError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Qualification(#[from] QualificationError),

    #[error(transparent)]
    Finals(#[from] FinalsError),

    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Too many requests, retry in {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

fn ta_status(e: &TaError) -> StatusCode {
    match e {
        TaError::PhaseFinished => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn match_status(e: &MatchError) -> StatusCode {
    match e {
        MatchError::NotFound(_) => StatusCode::NOT_FOUND,
        MatchError::VersionConflict { .. }
        | MatchError::MissingPlayers(_)
        | MatchError::BracketMatch(_) => StatusCode::CONFLICT,
        MatchError::InvalidScore(_) => StatusCode::BAD_REQUEST,
        MatchError::Corrupt(_) | MatchError::Serialization(_) | MatchError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn tournament_status(e: &TournamentError) -> StatusCode {
    match e {
        TournamentError::NotFound(_) => StatusCode::NOT_FOUND,
        TournamentError::InvalidTransition { .. } | TournamentError::WrongStatus(_) => {
            StatusCode::CONFLICT
        }
        TournamentError::InvalidInput(_) | TournamentError::InvalidTokenTtl => {
            StatusCode::BAD_REQUEST
        }
        TournamentError::TokenInvalid | TournamentError::TokenExpired => StatusCode::UNAUTHORIZED,
        TournamentError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn qualification_status(e: &QualificationError) -> StatusCode {
    match e {
        QualificationError::NotGroupMode(_)
        | QualificationError::NotTimeTrialMode(_)
        | QualificationError::GroupTooSmall(_)
        | QualificationError::DuplicatePlayer(_)
        | QualificationError::UnknownPlayer(_)
        | QualificationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        QualificationError::AlreadySetUp(_) | QualificationError::NotEnoughPlayers { .. } => {
            StatusCode::CONFLICT
        }
        QualificationError::Time(e) => ta_status(e),
        QualificationError::Match(e) => match_status(e),
        QualificationError::Serialization(_) | QualificationError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn bracket_status(e: &BracketError) -> StatusCode {
    match e {
        BracketError::UnknownMatch(_) => StatusCode::NOT_FOUND,
        BracketError::TiedScore(_) => StatusCode::BAD_REQUEST,
        BracketError::UnsupportedSize { .. }
        | BracketError::DuplicateSeed(_)
        | BracketError::SlotsNotFilled(_)
        | BracketError::DownstreamCompleted { .. } => StatusCode::CONFLICT,
        BracketError::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn finals_status(e: &FinalsError) -> StatusCode {
    match e {
        FinalsError::NotBracketMode(_) | FinalsError::InvalidScore(_) => StatusCode::BAD_REQUEST,
        FinalsError::BracketExists(_) => StatusCode::CONFLICT,
        FinalsError::NoBracket(_) => StatusCode::NOT_FOUND,
        FinalsError::Tournament(e) => tournament_status(e),
        FinalsError::Bracket(e) => bracket_status(e),
        FinalsError::Qualification(e) => qualification_status(e),
        FinalsError::Match(e) => match_status(e),
        FinalsError::Timeout(_) | FinalsError::Serialization(_) | FinalsError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(e) => match e {
                AuthError::InvalidPassword
                | AuthError::UserNotFound
                | AuthError::JwtError(_)
                | AuthError::SessionExpired
                | AuthError::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
                AuthError::AccountDisabled => StatusCode::FORBIDDEN,
                AuthError::UsernameTaken => StatusCode::CONFLICT,
                AuthError::InvalidUsername(_) | AuthError::WeakPassword(_) => {
                    StatusCode::BAD_REQUEST
                }
                AuthError::Database(_) | AuthError::Timeout(_) | AuthError::HashingFailed => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Tournament(e) => tournament_status(e),
            ApiError::Player(e) => match e {
                PlayerError::NotFound(_) => StatusCode::NOT_FOUND,
                PlayerError::NicknameTaken(_) => StatusCode::CONFLICT,
                PlayerError::UserNotFound(_) | PlayerError::InvalidInput(_) => {
                    StatusCode::BAD_REQUEST
                }
                PlayerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Match(e) => match_status(e),
            ApiError::Qualification(e) => qualification_status(e),
            ApiError::Finals(e) => finals_status(e),
            ApiError::Phase(e) => match e {
                PhaseError::NotStarted(_) => StatusCode::NOT_FOUND,
                PhaseError::AlreadyStarted(_) => StatusCode::CONFLICT,
                PhaseError::Tournament(e) => tournament_status(e),
                PhaseError::Elimination(e) => ta_status(e),
                PhaseError::Qualification(e) => qualification_status(e),
                PhaseError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                PhaseError::Serialization(_) | PhaseError::Database(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Report(e) => match e {
                ReportError::NotAParticipant { .. } => StatusCode::FORBIDDEN,
                ReportError::AlreadyCompleted(_) => StatusCode::CONFLICT,
                ReportError::Match(e) => match_status(e),
                ReportError::Tournament(e) => tournament_status(e),
                ReportError::Finals(e) => finals_status(e),
                ReportError::Qualification(e) => qualification_status(e),
                ReportError::Serialization(_) | ReportError::Database(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show to clients
    pub fn client_message(&self) -> String {
        match self {
            ApiError::Auth(e) => e.client_message(),
            ApiError::Tournament(e) => e.client_message(),
            ApiError::Player(e) => e.client_message(),
            ApiError::Match(e) => e.client_message(),
            ApiError::Qualification(e) => e.client_message(),
            ApiError::Finals(e) => e.client_message(),
            ApiError::Phase(e) => e.client_message(),
            ApiError::Report(e) => e.client_message(),
            ApiError::Database(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let retry_after = match &self {
            ApiError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };

        let mut response = (
            status,
            Json(ErrorResponse {
                error: self.client_message(),
            }),
        )
            .into_response();

        if let Some(secs) = retry_after
            && let Ok(value) = HeaderValue::from_str(&secs.to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kart_league::modes::GameMode;

    #[test]
    fn test_database_errors_are_hidden() {
        let err = ApiError::from(MatchError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), "Internal server error");

        let err = ApiError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn test_nested_errors_keep_their_status() {
        let err = ApiError::from(ReportError::Finals(FinalsError::Bracket(
            BracketError::DownstreamCompleted {
                source_match: 1,
                downstream: 5,
            },
        )));
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err = ApiError::from(FinalsError::Bracket(BracketError::Corrupt("gap".to_string())));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn test_closed_tournament_is_conflict() {
        use kart_league::tournament::TournamentStatus;

        let err = ApiError::from(FinalsError::Tournament(TournamentError::WrongStatus(
            TournamentStatus::Completed,
        )));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert!(err.client_message().contains("Completed"));

        let err = ApiError::from(PhaseError::Tournament(TournamentError::WrongStatus(
            TournamentStatus::Draft,
        )));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_version_conflict_is_conflict() {
        let err = ApiError::from(MatchError::VersionConflict {
            expected: 1,
            current: 2,
        });
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_login_failures_share_status_and_message() {
        let unknown = ApiError::from(AuthError::UserNotFound);
        let wrong = ApiError::from(AuthError::InvalidPassword);
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.status(), wrong.status());
        assert_eq!(unknown.client_message(), wrong.client_message());
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited { retry_after: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "42");
    }

    #[test]
    fn test_mode_errors_are_bad_requests() {
        let err = ApiError::from(FinalsError::NotBracketMode(GameMode::Ta));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let err = ApiError::from(QualificationError::NotGroupMode(GameMode::Ta));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
