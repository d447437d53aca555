//! Signed access/refresh token pairs (HS256).

use crate::error::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub token_type: TokenType,
    pub user_id: i64,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Signing material plus token lifetimes.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        JwtKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::seconds(access_ttl_secs),
            refresh_ttl: Duration::seconds(refresh_ttl_secs),
        }
    }

    pub fn issue_pair(&self, user_id: i64) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access: self.issue(user_id, TokenType::Access, self.access_ttl)?,
            refresh: self.issue(user_id, TokenType::Refresh, self.refresh_ttl)?,
        })
    }

    pub fn issue_access(&self, user_id: i64) -> Result<String, AppError> {
        self.issue(user_id, TokenType::Access, self.access_ttl)
    }

    fn issue(&self, user_id: i64, token_type: TokenType, ttl: Duration) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            token_type,
            user_id,
            jti: uuid::Uuid::new_v4().simple().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("token signing failed: {}", e)))
    }

    /// Decode and check signature, expiry and token type.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthenticated(format!("invalid token: {}", e)))?;
        if claims.token_type != expected {
            return Err(AppError::Unauthenticated("wrong token type".into()));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> JwtKeys {
        JwtKeys::new("test-secret", 300, 86_400)
    }

    #[test]
    fn access_token_verifies_as_access_only() {
        let k = keys();
        let pair = k.issue_pair(7).unwrap();
        let claims = k.verify(&pair.access, TokenType::Access).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.exp - claims.iat, 300);
        assert!(matches!(
            k.verify(&pair.access, TokenType::Refresh),
            Err(AppError::Unauthenticated(_))
        ));
    }

    #[test]
    fn refresh_token_is_rejected_as_access() {
        let k = keys();
        let pair = k.issue_pair(7).unwrap();
        assert!(k.verify(&pair.refresh, TokenType::Access).is_err());
        let claims = k.verify(&pair.refresh, TokenType::Refresh).unwrap();
        assert_eq!(claims.exp - claims.iat, 86_400);
    }

    #[test]
    fn pair_serializes_as_access_and_refresh() {
        let pair = keys().issue_pair(3).unwrap();
        let body = serde_json::to_value(&pair).unwrap();
        assert_eq!(body["access"], pair.access.as_str());
        assert_eq!(body["refresh"], pair.refresh.as_str());
        assert_eq!(body.as_object().map(|o| o.len()), Some(2));
    }

    #[test]
    fn expired_token_is_rejected() {
        let k = JwtKeys::new("test-secret", -10, 86_400);
        let token = k.issue_access(1).unwrap();
        assert!(k.verify(&token, TokenType::Access).is_err());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = JwtKeys::new("other", 300, 300).issue_access(1).unwrap();
        assert!(keys().verify(&token, TokenType::Access).is_err());
    }

    #[test]
    fn each_token_gets_a_distinct_id() {
        let k = keys();
        let a = k.verify(&k.issue_access(1).unwrap(), TokenType::Access).unwrap();
        let b = k.verify(&k.issue_access(1).unwrap(), TokenType::Access).unwrap();
        assert_ne!(a.jti, b.jti);
    }
}
