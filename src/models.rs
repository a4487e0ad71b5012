use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::FromRow;
use serde::{Deserialize, Serialize};

use crate::auth::Role;

// ===== Users =====

/// Full account row. Never serialized: the password and refresh-token hashes
/// must not leave the process.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub is_banned: bool,
    pub refresh_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public projection of an account, safe to embed in responses.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSummary {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub role: Role,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        UserSummary {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            role: Role::from_str(&user.role),
        }
    }
}

// ===== Songs =====

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: i32,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub duration: i32,
    pub release_year: Option<i32>,
    pub cover_url: Option<String>,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Song joined with its creator's public fields for list/detail responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongWithCreator {
    #[serde(flatten)]
    pub song: Song,
    pub creator: Option<UserSummary>,
}

// ===== Playlists =====

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub is_public: bool,
    pub owner_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistWithOwner {
    #[serde(flatten)]
    pub playlist: Playlist,
    pub owner: UserSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistTrack {
    pub id: i32,
    pub playlist_id: i32,
    pub song_id: i32,
    pub position: i32,
    pub added_at: DateTime<Utc>,
}

/// Track link joined with the song it points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackWithSong {
    #[serde(flatten)]
    pub track: PlaylistTrack,
    pub song: Song,
}

/// Playlist detail: the playlist, its owner and its tracks in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDetail {
    #[serde(flatten)]
    pub playlist: Playlist,
    pub owner: UserSummary,
    pub tracks: Vec<TrackWithSong>,
}

// ===== Pagination =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub current_page: i64,
    pub items_per_page: i64,
    pub total_items: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Paginated<T> {
    /// Assemble a page from already-fetched rows and the total row count.
    pub fn new(data: Vec<T>, page: i64, limit: i64, total_items: i64) -> Self {
        let total_pages = if total_items == 0 {
            0
        } else {
            (total_items + limit - 1) / limit
        };

        Paginated {
            data,
            meta: PageMeta {
                current_page: page,
                items_per_page: limit,
                total_items,
                total_pages,
                has_next_page: page < total_pages,
                has_previous_page: page > 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_meta_is_consistent() {
        let page: Paginated<i32> = Paginated::new(vec![1, 2, 3], 2, 3, 8);
        assert_eq!(page.meta.total_pages, 3);
        assert!(page.meta.has_next_page);
        assert!(page.meta.has_previous_page);

        let last: Paginated<i32> = Paginated::new(vec![7, 8], 3, 3, 8);
        assert!(!last.meta.has_next_page);

        let empty: Paginated<i32> = Paginated::new(vec![], 1, 10, 0);
        assert_eq!(empty.meta.total_pages, 0);
        assert!(!empty.meta.has_next_page);
        assert!(!empty.meta.has_previous_page);
    }
}
