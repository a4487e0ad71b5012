use rocket_db_pools::{sqlx, Database};
use sqlx::PgPool;

#[derive(Database)]
#[database("playlist_db")]
pub struct PlaylistDb(sqlx::PgPool);

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Apply pending migrations before the server starts accepting traffic.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    log::info!("checking database migration state");
    MIGRATOR.run(pool).await?;
    log::info!("database migrations up to date");
    Ok(())
}
