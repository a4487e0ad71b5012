use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::Request;
use rocket::State;
use rocket_db_pools::sqlx::{self, Row};

use crate::auth::tokens::Claims;
use crate::auth::{AuthError, AuthResult, AuthState, Role};
use crate::catchers::GuardFailure;

/// Account resolved from a verified access token. Routes take this guard as a
/// parameter to require authentication.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match extract_user(request, TokenKind::Access).await {
            Ok(resolved) => Outcome::Success(resolved.user),
            Err(err) => fail(request, err),
        }
    }
}

/// Account resolved from a verified refresh token. In addition to the access
/// checks, the presented token must match the refresh-token hash currently
/// stored on the account; logout or a newer login invalidates it immediately.
#[derive(Debug, Clone)]
pub struct RefreshUser(pub AuthUser);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RefreshUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let resolved = match extract_user(request, TokenKind::Refresh).await {
            Ok(resolved) => resolved,
            Err(err) => return fail(request, err),
        };

        let stored_hash = match resolved.refresh_token_hash {
            Some(hash) => hash,
            None => return fail(request, AuthError::InvalidSession),
        };

        let state = match auth_state(request).await {
            Ok(state) => state,
            Err(err) => return fail(request, err),
        };

        match state.password_service.verify(&resolved.token, &stored_hash) {
            Ok(true) => Outcome::Success(RefreshUser(resolved.user)),
            Ok(false) => fail(request, AuthError::InvalidSession),
            Err(err) => fail(request, err),
        }
    }
}

/// Access-token authentication composed with the admin role check.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthUser);

const ADMIN_ONLY: &[Role] = &[Role::Admin];

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequireAdmin {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match AuthUser::from_request(request).await {
            Outcome::Success(user) => {
                if role_allowed(ADMIN_ONLY, user.role) {
                    Outcome::Success(RequireAdmin(user))
                } else {
                    fail(request, AuthError::Forbidden)
                }
            }
            Outcome::Error(err) => Outcome::Error(err),
            Outcome::Forward(_) => fail(request, AuthError::Unauthorized),
        }
    }
}

/// Pure RBAC predicate: an empty required set grants access unconditionally,
/// otherwise the actor's role must be a member of the set.
pub fn role_allowed(required: &[Role], actual: Role) -> bool {
    required.is_empty() || required.contains(&actual)
}

enum TokenKind {
    Access,
    Refresh,
}

struct ResolvedUser {
    user: AuthUser,
    refresh_token_hash: Option<String>,
    token: String,
}

async fn extract_user(request: &Request<'_>, kind: TokenKind) -> AuthResult<ResolvedUser> {
    let token = bearer_token_from_request(request)?.to_string();

    let state = auth_state(request).await?;
    let pool = request
        .guard::<&State<sqlx::PgPool>>()
        .await
        .succeeded()
        .ok_or_else(|| AuthError::Config("database pool missing from state".into()))?;

    let claims: Claims = match kind {
        TokenKind::Access => state.token_service.decode_access_token(&token)?,
        TokenKind::Refresh => state.token_service.decode_refresh_token(&token)?,
    };

    let user_id: i32 = claims.sub.parse().map_err(|_| AuthError::Unauthorized)?;

    let row = sqlx::query(
        "SELECT email, username, role, is_banned, refresh_token_hash FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool.inner())
    .await?;

    let row = row.ok_or(AuthError::Unauthorized)?;
    let email: String = row.try_get("email")?;
    let username: String = row.try_get("username")?;
    let role_str: String = row.try_get("role")?;
    let is_banned: bool = row.try_get("is_banned")?;
    let refresh_token_hash: Option<String> = row.try_get("refresh_token_hash")?;

    // Ban is enforced at token-validation time: a token issued before the ban
    // is rejected on the next authenticated request.
    if is_banned {
        return Err(AuthError::Banned);
    }

    Ok(ResolvedUser {
        user: AuthUser {
            id: user_id,
            email,
            username,
            role: Role::from_str(&role_str),
        },
        refresh_token_hash,
        token,
    })
}

async fn auth_state<'r>(request: &'r Request<'_>) -> AuthResult<&'r AuthState> {
    request
        .guard::<&State<AuthState>>()
        .await
        .succeeded()
        .map(|state| state.inner())
        .ok_or_else(|| AuthError::Config("AuthState missing from state".into()))
}

fn bearer_token_from_request<'r>(request: &'r Request<'_>) -> AuthResult<&'r str> {
    let header = request
        .headers()
        .get_one("Authorization")
        .ok_or(AuthError::Unauthorized)?;
    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default();
    if scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty() {
        Ok(token)
    } else {
        Err(AuthError::Unauthorized)
    }
}

/// Record the failure so the error catcher can render its message, then fail
/// the guard with the matching status.
fn fail<T>(request: &Request<'_>, err: AuthError) -> Outcome<T, AuthError> {
    let status = err.status();
    request.local_cache(|| GuardFailure(Some((status.code, err.to_string()))));
    Outcome::Error((status, err))
}
