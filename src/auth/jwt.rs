use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use crate::errors::{ServiceError, ServiceResult, DomainError};
use crate::types::UserRole;

/// Access tokens are short-lived
const ACCESS_TOKEN_MINUTES: i64 = 15;
/// Refresh tokens outlive many access tokens
const REFRESH_TOKEN_DAYS: i64 = 30;

/// Token type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Access token (short-lived)
    Access,
    /// Refresh token (long-lived)
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub agency_id: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub token_type: TokenType,
}

impl Claims {
    pub fn user_id(&self) -> ServiceResult<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| ServiceError::Authentication("Invalid user ID in token".to_string()))
    }

    pub fn user_role(&self) -> ServiceResult<UserRole> {
        UserRole::from_str(&self.role)
            .ok_or_else(|| ServiceError::Authentication("Invalid role in token".to_string()))
    }

    pub fn agency(&self) -> ServiceResult<Option<Uuid>> {
        self.agency_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|_| ServiceError::Authentication("Invalid agency ID in token".to_string()))
    }
}

/// Signs and checks HS256 tokens with the configured secret
#[derive(Clone)]
pub struct JwtManager {
    secret: String,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager").field("secret", &"<redacted>").finish()
    }
}

impl JwtManager {
    pub fn new(secret: &str) -> Self {
        Self { secret: secret.to_string() }
    }

    /// Generate a JWT token
    pub fn generate_token(
        &self,
        user_id: &Uuid,
        role: &UserRole,
        agency_id: Option<&Uuid>,
        token_type: TokenType,
    ) -> ServiceResult<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expiry = match token_type {
            TokenType::Access => now + Duration::minutes(ACCESS_TOKEN_MINUTES),
            TokenType::Refresh => now + Duration::days(REFRESH_TOKEN_DAYS),
        };

        let claims = Claims {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            agency_id: agency_id.map(|a| a.to_string()),
            iat: now.timestamp(),
            exp: expiry.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type,
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ServiceError::Domain(DomainError::Internal(format!("JWT encoding error: {}", e))))?;

        Ok((token, expiry))
    }

    /// Verify signature and expiry of a token of the expected type
    pub fn verify_token(&self, token: &str, expected: TokenType) -> ServiceResult<Claims> {
        let token_data = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => ServiceError::SessionExpired,
            _ => ServiceError::Authentication(format!("Invalid token: {}", e)),
        })?;

        if token_data.claims.token_type != expected {
            return Err(ServiceError::Authentication(format!(
                "Expected {:?} token, received {:?} token",
                expected, token_data.claims.token_type
            )));
        }

        Ok(token_data.claims)
    }

    /// Decode a token whose signature is valid even if it has expired.
    /// Used on logout, where stale tokens still need their JTI revoked.
    pub fn decode_unverified(&self, token: &str) -> ServiceResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| ServiceError::Authentication(format!("Invalid token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> JwtManager {
        JwtManager::new("test-secret-with-enough-length")
    }

    #[test]
    fn access_token_round_trip_carries_agency() {
        let jwt = manager();
        let user = Uuid::new_v4();
        let agency = Uuid::new_v4();

        let (token, expiry) = jwt
            .generate_token(&user, &UserRole::Focal, Some(&agency), TokenType::Access)
            .unwrap();
        assert!(expiry > Utc::now());

        let claims = jwt.verify_token(&token, TokenType::Access).unwrap();
        assert_eq!(claims.user_id().unwrap(), user);
        assert_eq!(claims.user_role().unwrap(), UserRole::Focal);
        assert_eq!(claims.agency().unwrap(), Some(agency));
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let jwt = manager();
        let (token, _) = jwt
            .generate_token(&Uuid::new_v4(), &UserRole::Admin, None, TokenType::Refresh)
            .unwrap();

        assert!(matches!(
            jwt.verify_token(&token, TokenType::Access),
            Err(ServiceError::Authentication(_))
        ));
        assert!(jwt.verify_token(&token, TokenType::Refresh).is_ok());
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let (token, _) = JwtManager::new("another-secret-of-some-length")
            .generate_token(&Uuid::new_v4(), &UserRole::Admin, None, TokenType::Access)
            .unwrap();

        assert!(manager().verify_token(&token, TokenType::Access).is_err());
        assert!(manager().decode_unverified(&token).is_err());
    }
}
