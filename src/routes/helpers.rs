//! Shared lookup helpers for Rocket route handlers.

use rocket_db_pools::sqlx::{self, PgPool};

use crate::error::ApiError;
use crate::models::{Playlist, Song};

/// Fetch a song by id, returning [`ApiError::NotFound`] when absent.
pub async fn fetch_song(pool: &PgPool, id: i32) -> Result<Song, ApiError> {
    let song: Option<Song> = sqlx::query_as("SELECT * FROM songs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    song.ok_or_else(|| ApiError::NotFound("Chanson non trouvée".to_string()))
}

/// Fetch a playlist by id, returning [`ApiError::NotFound`] when absent.
pub async fn fetch_playlist(pool: &PgPool, id: i32) -> Result<Playlist, ApiError> {
    let playlist: Option<Playlist> = sqlx::query_as("SELECT * FROM playlists WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    playlist.ok_or_else(|| ApiError::NotFound("Playlist non trouvée".to_string()))
}
