use argon2::{
    password_hash::SaltString, Algorithm, Argon2, ParamsBuilder, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use rand::RngCore;

use crate::auth::{AuthConfig, AuthError, AuthResult};

const SALT_LEN: usize = 16;

/// One-way adaptive hasher used for account passwords and for refresh tokens
/// at rest. A leaked database row can prove possession of a matching token but
/// cannot be reversed to the original bearer string.
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        let mut builder = ParamsBuilder::new();
        builder.m_cost(config.argon2_memory_kib);
        builder.t_cost(2);
        builder.p_cost(1);
        let params = builder.build().map_err(AuthError::from)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        Ok(Self { argon2 })
    }

    pub fn hash(&self, secret: &str) -> AuthResult<String> {
        let mut salt_bytes = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes).map_err(AuthError::from)?;
        let hash = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(AuthError::from)?
            .to_string();
        Ok(hash)
    }

    pub fn verify(&self, secret: &str, encoded: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(encoded)?;
        match self.argon2.verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(AuthError::from(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::config::AuthConfig;

    fn test_config() -> AuthConfig {
        AuthConfig {
            access_secret: "access-secret".into(),
            refresh_secret: "refresh-secret".into(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 604800,
            // Keep hashing cheap in tests.
            argon2_memory_kib: 8,
        }
    }

    #[test]
    fn hashes_and_verifies_secrets() {
        let service = PasswordService::new(&test_config()).expect("password service");
        let hash = service.hash("super-secret").expect("hash generation");
        assert!(service.verify("super-secret", &hash).expect("verify succeeds"));
        assert!(!service.verify("wrong-password", &hash).expect("verify runs"));
    }

    #[test]
    fn salts_produce_distinct_hashes() {
        let service = PasswordService::new(&test_config()).expect("password service");
        let first = service.hash("secret1").expect("hash");
        let second = service.hash("secret1").expect("hash");
        assert_ne!(first, second);
    }
}
