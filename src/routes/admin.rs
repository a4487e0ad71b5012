//! Administrative endpoints: account moderation and role promotion.

use rocket::serde::json::Json;
use rocket::State;
use rocket_db_pools::sqlx;
use serde::{Deserialize, Serialize};

use crate::auth::RequireAdmin;
use crate::error::ApiError;
use crate::models::{User, UserSummary};

/// Moderation acknowledgment: a message plus the updated account.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModerationResponse {
    pub message: String,
    pub user: UserSummary,
}

#[post("/admin/users/<id>/ban")]
pub async fn ban_user(
    id: i32,
    pool: &State<sqlx::PgPool>,
    _admin: RequireAdmin,
) -> Result<Json<ModerationResponse>, ApiError> {
    let user = set_ban_flag(pool.inner(), id, true).await?;
    log::info!("user {} banned", id);

    Ok(Json(ModerationResponse {
        message: "Utilisateur banni avec succès".to_string(),
        user: UserSummary::from(&user),
    }))
}

#[post("/admin/users/<id>/unban")]
pub async fn unban_user(
    id: i32,
    pool: &State<sqlx::PgPool>,
    _admin: RequireAdmin,
) -> Result<Json<ModerationResponse>, ApiError> {
    let user = set_ban_flag(pool.inner(), id, false).await?;
    log::info!("user {} unbanned", id);

    Ok(Json(ModerationResponse {
        message: "Utilisateur débanni avec succès".to_string(),
        user: UserSummary::from(&user),
    }))
}

#[post("/admin/users/<id>/make-admin")]
pub async fn make_admin(
    id: i32,
    pool: &State<sqlx::PgPool>,
    _admin: RequireAdmin,
) -> Result<Json<ModerationResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as(
        "UPDATE users SET role = 'ADMIN', updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool.inner())
    .await?;

    let user = user.ok_or_else(|| ApiError::NotFound("Utilisateur non trouvé".to_string()))?;
    log::info!("user {} promoted to admin", id);

    Ok(Json(ModerationResponse {
        message: "Utilisateur promu en ADMIN avec succès".to_string(),
        user: UserSummary::from(&user),
    }))
}

async fn set_ban_flag(pool: &sqlx::PgPool, id: i32, banned: bool) -> Result<User, ApiError> {
    let user: Option<User> = sqlx::query_as(
        "UPDATE users SET is_banned = $1, updated_at = now() WHERE id = $2 RETURNING *",
    )
    .bind(banned)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    user.ok_or_else(|| ApiError::NotFound("Utilisateur non trouvé".to_string()))
}
