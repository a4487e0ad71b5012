use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::{AuthConfig, AuthResult, Role};

/// Claim set shared by both token kinds: subject id, email, role, expiry and
/// issued-at. The kinds differ only in signing secret and TTL.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SigningKeys {
    fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_secs),
        }
    }
}

/// Issues and verifies the two independent token kinds.
pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
    validation: Validation,
}

impl TokenService {
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 30;

        Ok(Self {
            access: SigningKeys::new(&config.access_secret, config.access_token_ttl_secs),
            refresh: SigningKeys::new(&config.refresh_secret, config.refresh_token_ttl_secs),
            validation,
        })
    }

    pub fn issue_access_token(&self, user_id: i32, email: &str, role: Role) -> AuthResult<String> {
        issue(&self.access, user_id, email, role)
    }

    pub fn issue_refresh_token(&self, user_id: i32, email: &str, role: Role) -> AuthResult<String> {
        issue(&self.refresh, user_id, email, role)
    }

    /// Mint the access+refresh pair handed out on register and login.
    pub fn issue_pair(&self, user_id: i32, email: &str, role: Role) -> AuthResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue_access_token(user_id, email, role)?,
            refresh_token: self.issue_refresh_token(user_id, email, role)?,
        })
    }

    pub fn decode_access_token(&self, token: &str) -> AuthResult<Claims> {
        let data = decode::<Claims>(token, &self.access.decoding, &self.validation)?;
        Ok(data.claims)
    }

    pub fn decode_refresh_token(&self, token: &str) -> AuthResult<Claims> {
        let data = decode::<Claims>(token, &self.refresh.decoding, &self.validation)?;
        Ok(data.claims)
    }
}

fn issue(keys: &SigningKeys, user_id: i32, email: &str, role: Role) -> AuthResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.as_str().to_string(),
        exp: (now + keys.ttl).timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::config::AuthConfig;

    fn test_config() -> AuthConfig {
        AuthConfig {
            access_secret: "access-test-secret".into(),
            refresh_secret: "refresh-test-secret".into(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 604800,
            argon2_memory_kib: 8,
        }
    }

    #[test]
    fn issues_and_decodes_access_tokens() {
        let service = TokenService::from_config(&test_config()).expect("token service");

        let token = service
            .issue_access_token(42, "user@example.com", Role::User)
            .expect("issue token");
        let claims = service.decode_access_token(&token).expect("decode token");

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.email, "user@example.com");
        assert_eq!(claims.role, "USER");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_kinds_are_not_interchangeable() {
        let service = TokenService::from_config(&test_config()).expect("token service");
        let pair = service
            .issue_pair(7, "user@example.com", Role::Admin)
            .expect("issue pair");

        assert!(service.decode_access_token(&pair.refresh_token).is_err());
        assert!(service.decode_refresh_token(&pair.access_token).is_err());

        let refresh_claims = service
            .decode_refresh_token(&pair.refresh_token)
            .expect("refresh decodes with its own secret");
        assert_eq!(refresh_claims.role, "ADMIN");
    }

    #[test]
    fn refresh_tokens_outlive_access_tokens() {
        let service = TokenService::from_config(&test_config()).expect("token service");
        let pair = service.issue_pair(1, "a@x.com", Role::User).expect("pair");

        let access = service.decode_access_token(&pair.access_token).expect("access");
        let refresh = service.decode_refresh_token(&pair.refresh_token).expect("refresh");
        assert!(refresh.exp > access.exp);
    }
}
