use rocket::http::Status;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication and authorization failures.
///
/// Display strings are the user-facing French messages carried through to the
/// JSON error body; wrong-password and unknown-email share a single variant so
/// the API never leaks which one happened.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email ou mot de passe incorrect")]
    InvalidCredentials,
    #[error("Votre compte a été banni. Veuillez contacter un administrateur.")]
    Banned,
    #[error("Session invalide")]
    InvalidSession,
    #[error("Cet email est déjà utilisé")]
    EmailTaken,
    #[error("Ce nom d'utilisateur est déjà utilisé")]
    UsernameTaken,
    #[error("Utilisateur non trouvé")]
    UserNotFound,
    #[error("Non authentifié")]
    Unauthorized,
    #[error("Accès refusé")]
    Forbidden,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Sqlx(#[from] rocket_db_pools::sqlx::Error),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("argon2 parameter error: {0}")]
    Argon2(String),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
}

impl AuthError {
    pub fn status(&self) -> Status {
        match self {
            AuthError::InvalidCredentials
            | AuthError::Banned
            | AuthError::InvalidSession
            | AuthError::Unauthorized => Status::Unauthorized,
            AuthError::Forbidden => Status::Forbidden,
            AuthError::EmailTaken | AuthError::UsernameTaken => Status::Conflict,
            AuthError::UserNotFound => Status::NotFound,
            // An invalid or expired token is an authentication failure from
            // the caller's point of view.
            AuthError::Jwt(_) => Status::Unauthorized,
            AuthError::Config(_)
            | AuthError::Sqlx(_)
            | AuthError::Argon2(_)
            | AuthError::PasswordHash(_) => Status::InternalServerError,
        }
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::Argon2(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}
