//! HTTP route handlers grouped by resource domain.
//!
//! Each submodule corresponds to a logical area of the API (songs, playlists,
//! admin, health) and exposes typed Rocket handlers. Authentication routes
//! live in `crate::auth::routes`.

pub mod admin;
pub mod health;
pub(crate) mod helpers;
pub mod params;
pub mod playlists;
pub mod songs;
