use std::ops::DerefMut;

use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{post, State};
use rocket_db_pools::sqlx::{self, Row};

use crate::auth::guards::{AuthUser, RefreshUser};
use crate::auth::responses::{
    AuthResponse, LoginRequest, MessageResponse, RefreshResponse, RegisterRequest, Role,
};
use crate::auth::{AuthError, AuthState};
use crate::error::ApiError;
use crate::models::{User, UserSummary};

#[post("/auth/register", data = "<payload>")]
pub async fn register(
    state: &State<AuthState>,
    pool: &State<sqlx::PgPool>,
    payload: Json<RegisterRequest>,
) -> Result<status::Custom<Json<AuthResponse>>, ApiError> {
    let email = payload.email.trim().to_string();
    let username = payload.username.trim().to_string();
    let password = payload.password.as_str();

    validate_registration(&email, &username, password)?;

    // Pre-checks give friendly messages; the unique constraints on the table
    // are the actual enforcement point for concurrent registrations.
    let email_taken: Option<i32> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(pool.inner())
        .await?;
    if email_taken.is_some() {
        return Err(AuthError::EmailTaken.into());
    }

    let username_taken: Option<i32> =
        sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
            .bind(&username)
            .fetch_optional(pool.inner())
            .await?;
    if username_taken.is_some() {
        return Err(AuthError::UsernameTaken.into());
    }

    let password_hash = state.password_service.hash(password).map_err(ApiError::from)?;

    let mut tx = pool.begin().await.map_err(ApiError::from)?;

    let row = sqlx::query(
        "INSERT INTO users (email, username, password_hash) VALUES ($1, $2, $3) RETURNING id, role",
    )
    .bind(&email)
    .bind(&username)
    .bind(&password_hash)
    .fetch_one(tx.deref_mut())
    .await
    .map_err(conflict_from_unique)?;

    let user_id: i32 = row.try_get("id")?;
    let role = Role::from_str(&row.try_get::<String, _>("role")?);

    let tokens = state
        .token_service
        .issue_pair(user_id, &email, role)
        .map_err(ApiError::from)?;

    store_refresh_token(state, &mut tx, user_id, &tokens.refresh_token).await?;

    tx.commit().await.map_err(ApiError::from)?;

    log::info!("registered user {} ({})", user_id, username);

    let response = AuthResponse {
        access_token: tokens.access_token,
        user: UserSummary {
            id: user_id,
            email,
            username,
            role,
        },
    };

    Ok(status::Custom(Status::Created, Json(response)))
}

#[post("/auth/login", data = "<payload>")]
pub async fn login(
    state: &State<AuthState>,
    pool: &State<sqlx::PgPool>,
    payload: Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = payload.email.trim();
    let password = payload.password.as_str();

    if email.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Email et mot de passe requis"));
    }

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool.inner())
        .await?;

    // Unknown email and wrong password share one message so the endpoint
    // cannot be used to enumerate accounts.
    let user = user.ok_or(AuthError::InvalidCredentials)?;

    if user.is_banned {
        return Err(AuthError::Banned.into());
    }

    let verified = state
        .password_service
        .verify(password, &user.password_hash)
        .map_err(ApiError::from)?;
    if !verified {
        return Err(AuthError::InvalidCredentials.into());
    }

    let role = Role::from_str(&user.role);
    let tokens = state
        .token_service
        .issue_pair(user.id, &user.email, role)
        .map_err(ApiError::from)?;

    let mut tx = pool.begin().await.map_err(ApiError::from)?;
    store_refresh_token(state, &mut tx, user.id, &tokens.refresh_token).await?;
    tx.commit().await.map_err(ApiError::from)?;

    log::info!("user {} logged in", user.id);

    Ok(Json(AuthResponse {
        access_token: tokens.access_token,
        user: UserSummary::from(&user),
    }))
}

#[post("/auth/logout")]
pub async fn logout(
    pool: &State<sqlx::PgPool>,
    user: AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    // Unconditional clear keeps the operation idempotent.
    sqlx::query("UPDATE users SET refresh_token_hash = NULL, updated_at = now() WHERE id = $1")
        .bind(user.id)
        .execute(pool.inner())
        .await?;

    log::info!("user {} logged out", user.id);

    Ok(Json(MessageResponse {
        message: "Déconnexion réussie".to_string(),
    }))
}

#[post("/auth/refresh")]
pub async fn refresh(
    state: &State<AuthState>,
    user: RefreshUser,
) -> Result<Json<RefreshResponse>, ApiError> {
    // The guard verified the presented token against the stored hash; this
    // flow mints a new access token only, without rotating the refresh token.
    let user = user.0;
    let access_token = state
        .token_service
        .issue_access_token(user.id, &user.email, user.role)
        .map_err(ApiError::from)?;

    Ok(Json(RefreshResponse { access_token }))
}

/// Hash the freshly issued refresh token with the password hasher and persist
/// it on the account, overwriting the previous session generation.
async fn store_refresh_token(
    state: &State<AuthState>,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: i32,
    refresh_token: &str,
) -> Result<(), ApiError> {
    let hash = state
        .password_service
        .hash(refresh_token)
        .map_err(ApiError::from)?;

    sqlx::query("UPDATE users SET refresh_token_hash = $1, updated_at = now() WHERE id = $2")
        .bind(hash)
        .bind(user_id)
        .execute(tx.deref_mut())
        .await?;

    Ok(())
}

fn validate_registration(email: &str, username: &str, password: &str) -> Result<(), ApiError> {
    let mut errors = Vec::new();

    if email.is_empty() {
        errors.push("L'email est requis".to_string());
    } else if !looks_like_email(email) {
        errors.push("L'email doit être valide".to_string());
    }

    if username.is_empty() {
        errors.push("Le nom d'utilisateur est requis".to_string());
    } else if username.chars().count() < 3 {
        errors.push("Le nom d'utilisateur doit contenir au moins 3 caractères".to_string());
    }

    if password.is_empty() {
        errors.push("Le mot de passe est requis".to_string());
    } else if password.chars().count() < 6 {
        errors.push("Le mot de passe doit contenir au moins 6 caractères".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::BadRequest(errors))
    }
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}

/// Map a unique-constraint violation racing past the pre-checks to the same
/// conflict responses the pre-checks produce.
fn conflict_from_unique(err: sqlx::Error) -> ApiError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return match db_err.constraint() {
                Some("users_username_key") => AuthError::UsernameTaken.into(),
                _ => AuthError::EmailTaken.into(),
            };
        }
    }
    ApiError::from(err)
}
