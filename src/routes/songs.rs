use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::State;
use rocket_db_pools::sqlx::{self, FromRow};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthUser, Role};
use crate::error::ApiError;
use crate::models::{Paginated, Song, SongWithCreator, UserSummary};
use crate::routes::helpers::fetch_song;
use crate::routes::params::PaginationParams;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSongRequest {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub duration: i32,
    pub release_year: Option<i32>,
    pub cover_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSongRequest {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub duration: Option<i32>,
    pub release_year: Option<i32>,
    pub cover_url: Option<String>,
}

/// Flat row shape for the song + creator join.
#[derive(Debug, FromRow)]
struct SongCreatorRow {
    id: i32,
    title: String,
    artist: String,
    album: Option<String>,
    genre: Option<String>,
    duration: i32,
    release_year: Option<i32>,
    cover_url: Option<String>,
    created_by: Option<i32>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    creator_username: Option<String>,
    creator_email: Option<String>,
    creator_role: Option<String>,
}

impl From<SongCreatorRow> for SongWithCreator {
    fn from(row: SongCreatorRow) -> Self {
        let creator = match (row.created_by, row.creator_username, row.creator_email) {
            (Some(id), Some(username), Some(email)) => Some(UserSummary {
                id,
                username,
                email,
                role: Role::from_str(row.creator_role.as_deref().unwrap_or("USER")),
            }),
            _ => None,
        };

        SongWithCreator {
            song: Song {
                id: row.id,
                title: row.title,
                artist: row.artist,
                album: row.album,
                genre: row.genre,
                duration: row.duration,
                release_year: row.release_year,
                cover_url: row.cover_url,
                created_by: row.created_by,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            creator,
        }
    }
}

const SONG_WITH_CREATOR_QUERY: &str = r#"
    SELECT s.*, u.username AS creator_username, u.email AS creator_email, u.role AS creator_role
    FROM songs s
    LEFT JOIN users u ON u.id = s.created_by
"#;

/// List songs, newest first, with their creator's public fields.
#[get("/songs?<params..>")]
pub async fn list_songs(
    pool: &State<sqlx::PgPool>,
    params: PaginationParams,
    _user: AuthUser,
) -> Result<Json<Paginated<SongWithCreator>>, ApiError> {
    let total_items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM songs")
        .fetch_one(pool.inner())
        .await?;

    let rows: Vec<SongCreatorRow> = sqlx::query_as(&format!(
        "{} ORDER BY s.created_at DESC LIMIT $1 OFFSET $2",
        SONG_WITH_CREATOR_QUERY
    ))
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool.inner())
    .await?;

    let songs = rows.into_iter().map(SongWithCreator::from).collect();

    Ok(Json(Paginated::new(
        songs,
        params.page(),
        params.limit(),
        total_items,
    )))
}

#[get("/songs/<id>")]
pub async fn get_song(
    id: i32,
    pool: &State<sqlx::PgPool>,
    _user: AuthUser,
) -> Result<Json<SongWithCreator>, ApiError> {
    let row: Option<SongCreatorRow> =
        sqlx::query_as(&format!("{} WHERE s.id = $1", SONG_WITH_CREATOR_QUERY))
            .bind(id)
            .fetch_optional(pool.inner())
            .await?;

    let row = row.ok_or_else(|| ApiError::NotFound("Chanson non trouvée".to_string()))?;
    Ok(Json(SongWithCreator::from(row)))
}

#[post("/songs", data = "<payload>")]
pub async fn create_song(
    pool: &State<sqlx::PgPool>,
    user: AuthUser,
    payload: Json<CreateSongRequest>,
) -> Result<status::Custom<Json<Song>>, ApiError> {
    let title = payload.title.trim();
    let artist = payload.artist.trim();

    let mut errors = Vec::new();
    if title.is_empty() {
        errors.push("Le titre est requis".to_string());
    }
    if artist.is_empty() {
        errors.push("L'artiste est requis".to_string());
    }
    if payload.duration <= 0 {
        errors.push("La durée doit être un nombre positif".to_string());
    }
    if !errors.is_empty() {
        return Err(ApiError::BadRequest(errors));
    }

    let song: Song = sqlx::query_as(
        r#"INSERT INTO songs (title, artist, album, genre, duration, release_year, cover_url, created_by)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
           RETURNING *"#,
    )
    .bind(title)
    .bind(artist)
    .bind(&payload.album)
    .bind(&payload.genre)
    .bind(payload.duration)
    .bind(payload.release_year)
    .bind(&payload.cover_url)
    .bind(user.id)
    .fetch_one(pool.inner())
    .await?;

    Ok(status::Custom(Status::Created, Json(song)))
}

#[put("/songs/<id>", data = "<payload>")]
pub async fn update_song(
    id: i32,
    pool: &State<sqlx::PgPool>,
    user: AuthUser,
    payload: Json<UpdateSongRequest>,
) -> Result<Json<Song>, ApiError> {
    let song = fetch_song(pool.inner(), id).await?;
    authorize_song_mutation(&song, &user)?;

    let updated: Song = sqlx::query_as(
        r#"UPDATE songs
           SET title = COALESCE($1, title),
               artist = COALESCE($2, artist),
               album = COALESCE($3, album),
               genre = COALESCE($4, genre),
               duration = COALESCE($5, duration),
               release_year = COALESCE($6, release_year),
               cover_url = COALESCE($7, cover_url),
               updated_at = now()
           WHERE id = $8
           RETURNING *"#,
    )
    .bind(&payload.title)
    .bind(&payload.artist)
    .bind(&payload.album)
    .bind(&payload.genre)
    .bind(payload.duration)
    .bind(payload.release_year)
    .bind(&payload.cover_url)
    .bind(id)
    .fetch_one(pool.inner())
    .await?;

    Ok(Json(updated))
}

#[delete("/songs/<id>")]
pub async fn delete_song(
    id: i32,
    pool: &State<sqlx::PgPool>,
    user: AuthUser,
) -> Result<Status, ApiError> {
    let song = fetch_song(pool.inner(), id).await?;
    authorize_song_mutation(&song, &user)?;

    sqlx::query("DELETE FROM songs WHERE id = $1")
        .bind(id)
        .execute(pool.inner())
        .await?;

    Ok(Status::NoContent)
}

/// A song may be mutated by its creator or by any admin.
fn authorize_song_mutation(song: &Song, user: &AuthUser) -> Result<(), ApiError> {
    if song.created_by == Some(user.id) || user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Vous n'avez pas la permission de modifier cette chanson".to_string(),
        ))
    }
}
