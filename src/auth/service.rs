use crate::errors::{ServiceError, ServiceResult, DomainError};
use crate::auth::{AuthContext, AuthRepository};
use crate::auth::jwt::{JwtManager, TokenType};
use crate::domains::audit::{AuditAction, AuditRepository, NewAuditEntry, SubjectType};
use crate::domains::core::FindById;
use crate::domains::user::{Credentials, UserRepository, UserResponse};
use crate::validation::Validate;
use argon2::{Argon2, PasswordHash, PasswordVerifier, PasswordHasher, password_hash::SaltString};
// argon2 expects the rand_core 0.6 OsRng
use rand_core::OsRng as ArgonOsRng;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Results from a successful login
#[derive(Debug, Serialize)]
pub struct LoginResult {
    pub user: UserResponse,
    pub access_token: String,
    pub access_expiry: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expiry: DateTime<Utc>,
}

/// A freshly issued access token
#[derive(Debug, Serialize)]
pub struct RefreshResult {
    pub access_token: String,
    pub access_expiry: DateTime<Utc>,
}

/// Auth service for handling user authentication
pub struct AuthService {
    auth_repo: Arc<dyn AuthRepository>,
    user_repo: Arc<dyn UserRepository>,
    audit_repo: Arc<dyn AuditRepository>,
    jwt: JwtManager,
}

impl AuthService {
    pub fn new(
        pool: SqlitePool,
        user_repo: Arc<dyn UserRepository>,
        audit_repo: Arc<dyn AuditRepository>,
        jwt: JwtManager,
    ) -> Self {
        let auth_repo = Arc::new(super::repository::SqliteAuthRepository::new(pool));

        Self {
            auth_repo,
            user_repo,
            audit_repo,
            jwt,
        }
    }

    /// Authenticate a user with email and password, returning access and refresh tokens
    pub async fn login(&self, credentials: &Credentials) -> ServiceResult<LoginResult> {
        credentials.validate()?;
        let email = credentials.email.trim();

        let user = match self.user_repo.find_by_email(email).await? {
            Some(user) => user,
            None => {
                self.record(
                    NewAuditEntry::new(None, AuditAction::LoginFailed, SubjectType::User, None)
                        .details(format!("Unknown email {}", email))
                        .failure(),
                )
                .await;
                return Err(ServiceError::Authentication("Invalid email or password".to_string()));
            }
        };

        if !user.active {
            self.record(
                NewAuditEntry::new(Some(user.id), AuditAction::LoginFailed, SubjectType::User, Some(user.id))
                    .details("Account is inactive")
                    .failure(),
            )
            .await;
            return Err(ServiceError::Authentication("Account is inactive".to_string()));
        }

        if self.verify_password(&credentials.password, &user.password_hash).is_err() {
            self.record(
                NewAuditEntry::new(Some(user.id), AuditAction::LoginFailed, SubjectType::User, Some(user.id))
                    .details("Wrong password")
                    .failure(),
            )
            .await;
            return Err(ServiceError::Authentication("Invalid email or password".to_string()));
        }

        self.user_repo.update_last_login(user.id).await?;

        let (access_token, access_expiry) = self.jwt.generate_token(
            &user.id, &user.role, user.agency_id.as_ref(), TokenType::Access,
        )?;
        let (refresh_token, refresh_expiry) = self.jwt.generate_token(
            &user.id, &user.role, user.agency_id.as_ref(), TokenType::Refresh,
        )?;

        self.record(
            NewAuditEntry::new(Some(user.id), AuditAction::Login, SubjectType::User, Some(user.id))
                .details(format!("Login {}", user.email)),
        )
        .await;
        log::info!("User {} logged in", user.id);

        Ok(LoginResult {
            user: user.into(),
            access_token,
            access_expiry,
            refresh_token,
            refresh_expiry,
        })
    }

    /// Verify an access token and create an auth context
    pub async fn verify_token(&self, token: &str) -> ServiceResult<AuthContext> {
        let claims = self.jwt.verify_token(token, TokenType::Access)?;

        if self.auth_repo.is_token_revoked(&claims.jti).await? {
            log::warn!("Attempted to use revoked token JTI: {}", claims.jti);
            return Err(ServiceError::Authentication("Token has been revoked".to_string()));
        }

        Ok(AuthContext::new(claims.user_id()?, claims.user_role()?, claims.agency()?))
    }

    /// Exchange a refresh token for a new access token.
    /// Role and agency are re-read so changes apply on the next refresh.
    pub async fn refresh_session(&self, refresh_token: &str) -> ServiceResult<RefreshResult> {
        let claims = self.jwt.verify_token(refresh_token, TokenType::Refresh)?;

        if self.auth_repo.is_token_revoked(&claims.jti).await? {
            return Err(ServiceError::Authentication("Token has been revoked".to_string()));
        }

        let user = match self.user_repo.find_by_id(claims.user_id()?).await {
            Ok(user) => user,
            Err(DomainError::EntityNotFound(_, _)) => {
                return Err(ServiceError::Authentication("Account no longer exists".to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        if !user.active {
            return Err(ServiceError::Authentication("Account is inactive".to_string()));
        }

        let (access_token, access_expiry) = self.jwt.generate_token(
            &user.id, &user.role, user.agency_id.as_ref(), TokenType::Access,
        )?;

        Ok(RefreshResult { access_token, access_expiry })
    }

    /// Log out a user (revoking tokens by adding JTI to blocklist)
    pub async fn logout(
        &self,
        auth: &AuthContext,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> ServiceResult<()> {
        let tokens = std::iter::once(access_token).chain(refresh_token);
        for token in tokens {
            match self.jwt.decode_unverified(token) {
                Ok(claims) if claims.sub == auth.user_id.to_string() => {
                    self.auth_repo.add_revoked_token(&claims.jti, claims.exp).await?;
                }
                Ok(claims) => {
                    log::warn!("User {} tried to revoke a token of {}", auth.user_id, claims.sub);
                }
                Err(e) => {
                    log::error!("Failed to decode token during logout for user {}: {}", auth.user_id, e);
                }
            }
        }

        match self.auth_repo.delete_expired_revoked_tokens().await {
            Ok(0) => {}
            Ok(purged) => log::debug!("Purged {} expired revoked tokens", purged),
            Err(e) => log::warn!("Failed to purge expired revoked tokens: {}", e),
        }

        self.record(NewAuditEntry::new(
            Some(auth.user_id),
            AuditAction::Logout,
            SubjectType::User,
            Some(auth.user_id),
        ))
        .await;

        log::info!("User {} logged out", auth.user_id);
        Ok(())
    }

    /// Generate a hash for a new password
    pub fn hash_password(&self, password: &str) -> ServiceResult<String> {
        let salt = SaltString::generate(&mut ArgonOsRng);

        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| ServiceError::Domain(DomainError::Internal(format!("Failed to hash password: {}", e))))?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a hash
    fn verify_password(&self, password: &str, hash: &str) -> ServiceResult<()> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|_| ServiceError::Domain(DomainError::Internal("Invalid password hash format".to_string())))?;

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| ServiceError::Authentication("Invalid password".to_string()))
    }

    /// Authentication events are audited best-effort; a failed write must not change the login outcome
    async fn record(&self, entry: NewAuditEntry) {
        if let Err(e) = self.audit_repo.create(&entry).await {
            log::error!("Failed to write {} audit entry: {}", entry.action.as_str(), e);
        }
    }
}
