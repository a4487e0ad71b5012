use crate::auth::{AuthError, AuthResult};

/// Authentication configuration loaded from environment variables.
///
/// Access and refresh tokens are signed with distinct secrets so that a
/// token of one kind is never accepted by the other verification path.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub argon2_memory_kib: u32,
}

impl AuthConfig {
    pub fn from_env() -> AuthResult<Self> {
        let access_secret = std::env::var("JWT_ACCESS_SECRET")
            .map_err(|_| AuthError::Config("JWT_ACCESS_SECRET is required".into()))?;
        let refresh_secret = std::env::var("JWT_REFRESH_SECRET")
            .map_err(|_| AuthError::Config("JWT_REFRESH_SECRET is required".into()))?;
        if access_secret == refresh_secret {
            return Err(AuthError::Config(
                "JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ".into(),
            ));
        }

        let access_token_ttl_secs = std::env::var("JWT_ACCESS_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(15 * 60);
        let refresh_token_ttl_secs = std::env::var("JWT_REFRESH_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(7 * 24 * 60 * 60);
        let argon2_memory_kib = std::env::var("ARGON2_MEMORY_KIB")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(19 * 1024);

        Ok(Self {
            access_secret,
            refresh_secret,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
            argon2_memory_kib,
        })
    }
}
