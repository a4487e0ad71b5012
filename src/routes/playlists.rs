use std::ops::DerefMut;

use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::State;
use rocket_db_pools::sqlx::{self, FromRow};
use serde::Deserialize;

use crate::auth::{AuthUser, Role};
use crate::error::ApiError;
use crate::models::{
    Paginated, Playlist, PlaylistDetail, PlaylistTrack, PlaylistWithOwner, Song, TrackWithSong,
    UserSummary,
};
use crate::routes::helpers::{fetch_playlist, fetch_song};
use crate::routes::params::PaginationParams;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlaylistRequest {
    pub name: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlaylistRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTrackRequest {
    pub song_id: i32,
}

/// Flat row shape for the playlist + owner join.
#[derive(Debug, FromRow)]
struct PlaylistOwnerRow {
    id: i32,
    name: String,
    description: Option<String>,
    cover_url: Option<String>,
    is_public: bool,
    owner_id: i32,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    owner_username: String,
    owner_email: String,
    owner_role: String,
}

impl PlaylistOwnerRow {
    fn split(self) -> (Playlist, UserSummary) {
        let owner = UserSummary {
            id: self.owner_id,
            username: self.owner_username,
            email: self.owner_email,
            role: Role::from_str(&self.owner_role),
        };
        let playlist = Playlist {
            id: self.id,
            name: self.name,
            description: self.description,
            cover_url: self.cover_url,
            is_public: self.is_public,
            owner_id: self.owner_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        (playlist, owner)
    }
}

/// Flat row shape for the track + song join.
#[derive(Debug, FromRow)]
struct TrackSongRow {
    id: i32,
    playlist_id: i32,
    song_id: i32,
    position: i32,
    added_at: chrono::DateTime<chrono::Utc>,
    s_id: i32,
    s_title: String,
    s_artist: String,
    s_album: Option<String>,
    s_genre: Option<String>,
    s_duration: i32,
    s_release_year: Option<i32>,
    s_cover_url: Option<String>,
    s_created_by: Option<i32>,
    s_created_at: chrono::DateTime<chrono::Utc>,
    s_updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<TrackSongRow> for TrackWithSong {
    fn from(row: TrackSongRow) -> Self {
        TrackWithSong {
            track: PlaylistTrack {
                id: row.id,
                playlist_id: row.playlist_id,
                song_id: row.song_id,
                position: row.position,
                added_at: row.added_at,
            },
            song: Song {
                id: row.s_id,
                title: row.s_title,
                artist: row.s_artist,
                album: row.s_album,
                genre: row.s_genre,
                duration: row.s_duration,
                release_year: row.s_release_year,
                cover_url: row.s_cover_url,
                created_by: row.s_created_by,
                created_at: row.s_created_at,
                updated_at: row.s_updated_at,
            },
        }
    }
}

const PLAYLIST_WITH_OWNER_QUERY: &str = r#"
    SELECT p.*, u.username AS owner_username, u.email AS owner_email, u.role AS owner_role
    FROM playlists p
    JOIN users u ON u.id = p.owner_id
"#;

/// List playlists, newest first, with their owner's public fields.
#[get("/playlists?<params..>")]
pub async fn list_playlists(
    pool: &State<sqlx::PgPool>,
    params: PaginationParams,
    _user: AuthUser,
) -> Result<Json<Paginated<PlaylistWithOwner>>, ApiError> {
    let total_items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM playlists")
        .fetch_one(pool.inner())
        .await?;

    let rows: Vec<PlaylistOwnerRow> = sqlx::query_as(&format!(
        "{} ORDER BY p.created_at DESC LIMIT $1 OFFSET $2",
        PLAYLIST_WITH_OWNER_QUERY
    ))
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool.inner())
    .await?;

    let playlists = rows
        .into_iter()
        .map(|row| {
            let (playlist, owner) = row.split();
            PlaylistWithOwner { playlist, owner }
        })
        .collect();

    Ok(Json(Paginated::new(
        playlists,
        params.page(),
        params.limit(),
        total_items,
    )))
}

/// Playlist detail with its tracks (and their songs) in playlist order.
#[get("/playlists/<id>")]
pub async fn get_playlist(
    id: i32,
    pool: &State<sqlx::PgPool>,
    _user: AuthUser,
) -> Result<Json<PlaylistDetail>, ApiError> {
    let row: Option<PlaylistOwnerRow> =
        sqlx::query_as(&format!("{} WHERE p.id = $1", PLAYLIST_WITH_OWNER_QUERY))
            .bind(id)
            .fetch_optional(pool.inner())
            .await?;

    let row = row.ok_or_else(|| ApiError::NotFound("Playlist non trouvée".to_string()))?;
    let (playlist, owner) = row.split();

    let tracks: Vec<TrackSongRow> = sqlx::query_as(
        r#"SELECT t.id, t.playlist_id, t.song_id, t.position, t.added_at,
                  s.id AS s_id, s.title AS s_title, s.artist AS s_artist, s.album AS s_album,
                  s.genre AS s_genre, s.duration AS s_duration, s.release_year AS s_release_year,
                  s.cover_url AS s_cover_url, s.created_by AS s_created_by,
                  s.created_at AS s_created_at, s.updated_at AS s_updated_at
           FROM playlist_tracks t
           JOIN songs s ON s.id = t.song_id
           WHERE t.playlist_id = $1
           ORDER BY t.position ASC"#,
    )
    .bind(id)
    .fetch_all(pool.inner())
    .await?;

    Ok(Json(PlaylistDetail {
        playlist,
        owner,
        tracks: tracks.into_iter().map(TrackWithSong::from).collect(),
    }))
}

#[post("/playlists", data = "<payload>")]
pub async fn create_playlist(
    pool: &State<sqlx::PgPool>,
    user: AuthUser,
    payload: Json<CreatePlaylistRequest>,
) -> Result<status::Custom<Json<Playlist>>, ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Le nom est requis"));
    }

    let playlist: Playlist = sqlx::query_as(
        r#"INSERT INTO playlists (name, description, cover_url, is_public, owner_id)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING *"#,
    )
    .bind(name)
    .bind(&payload.description)
    .bind(&payload.cover_url)
    .bind(payload.is_public)
    .bind(user.id)
    .fetch_one(pool.inner())
    .await?;

    Ok(status::Custom(Status::Created, Json(playlist)))
}

#[put("/playlists/<id>", data = "<payload>")]
pub async fn update_playlist(
    id: i32,
    pool: &State<sqlx::PgPool>,
    user: AuthUser,
    payload: Json<UpdatePlaylistRequest>,
) -> Result<Json<Playlist>, ApiError> {
    let playlist = fetch_playlist(pool.inner(), id).await?;
    authorize_playlist_mutation(&playlist, &user)?;

    let updated: Playlist = sqlx::query_as(
        r#"UPDATE playlists
           SET name = COALESCE($1, name),
               description = COALESCE($2, description),
               cover_url = COALESCE($3, cover_url),
               is_public = COALESCE($4, is_public),
               updated_at = now()
           WHERE id = $5
           RETURNING *"#,
    )
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(&payload.cover_url)
    .bind(payload.is_public)
    .bind(id)
    .fetch_one(pool.inner())
    .await?;

    Ok(Json(updated))
}

/// Delete a playlist. Track links are removed explicitly in the same
/// transaction, mirroring the cascade the schema also guarantees.
#[delete("/playlists/<id>")]
pub async fn delete_playlist(
    id: i32,
    pool: &State<sqlx::PgPool>,
    user: AuthUser,
) -> Result<Status, ApiError> {
    let playlist = fetch_playlist(pool.inner(), id).await?;
    authorize_playlist_mutation(&playlist, &user)?;

    let mut tx = pool.begin().await.map_err(ApiError::from)?;

    sqlx::query("DELETE FROM playlist_tracks WHERE playlist_id = $1")
        .bind(id)
        .execute(tx.deref_mut())
        .await?;
    sqlx::query("DELETE FROM playlists WHERE id = $1")
        .bind(id)
        .execute(tx.deref_mut())
        .await?;

    tx.commit().await.map_err(ApiError::from)?;

    Ok(Status::NoContent)
}

#[post("/playlists/<id>/tracks", data = "<payload>")]
pub async fn add_track(
    id: i32,
    pool: &State<sqlx::PgPool>,
    user: AuthUser,
    payload: Json<AddTrackRequest>,
) -> Result<status::Custom<Json<PlaylistTrack>>, ApiError> {
    let playlist = fetch_playlist(pool.inner(), id).await?;
    authorize_playlist_mutation(&playlist, &user)?;

    fetch_song(pool.inner(), payload.song_id).await?;

    let existing: Option<i32> = sqlx::query_scalar(
        "SELECT id FROM playlist_tracks WHERE playlist_id = $1 AND song_id = $2",
    )
    .bind(id)
    .bind(payload.song_id)
    .fetch_optional(pool.inner())
    .await?;
    if existing.is_some() {
        return Err(ApiError::bad_request(
            "Cette chanson est déjà dans la playlist",
        ));
    }

    // New tracks are appended at the end of the playlist.
    let track: PlaylistTrack = sqlx::query_as(
        r#"INSERT INTO playlist_tracks (playlist_id, song_id, position)
           VALUES ($1, $2,
                   (SELECT COALESCE(MAX(position), 0) + 1 FROM playlist_tracks WHERE playlist_id = $1))
           RETURNING *"#,
    )
    .bind(id)
    .bind(payload.song_id)
    .fetch_one(pool.inner())
    .await
    .map_err(duplicate_track_conflict)?;

    Ok(status::Custom(Status::Created, Json(track)))
}

#[delete("/playlists/<id>/tracks/<track_id>")]
pub async fn remove_track(
    id: i32,
    track_id: i32,
    pool: &State<sqlx::PgPool>,
    user: AuthUser,
) -> Result<Status, ApiError> {
    let playlist = fetch_playlist(pool.inner(), id).await?;
    authorize_playlist_mutation(&playlist, &user)?;

    let deleted = sqlx::query("DELETE FROM playlist_tracks WHERE id = $1 AND playlist_id = $2")
        .bind(track_id)
        .bind(id)
        .execute(pool.inner())
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(ApiError::NotFound(
            "Chanson non trouvée dans cette playlist".to_string(),
        ));
    }

    Ok(Status::NoContent)
}

/// A playlist may only be mutated by its owner; admins get no override here.
fn authorize_playlist_mutation(playlist: &Playlist, user: &AuthUser) -> Result<(), ApiError> {
    if playlist.owner_id == user.id {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Vous n'avez pas la permission de modifier cette playlist".to_string(),
        ))
    }
}

/// Map the unique (playlist_id, song_id) violation racing past the pre-check
/// to the same 400 the pre-check produces.
fn duplicate_track_conflict(err: sqlx::Error) -> ApiError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return ApiError::bad_request("Cette chanson est déjà dans la playlist");
        }
    }
    ApiError::from(err)
}
