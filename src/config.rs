use crate::errors::{ServiceError, ServiceResult};
use std::env;
use std::net::SocketAddr;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://agency_reporting.sqlite?mode=rwc";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const MIN_JWT_SECRET_LEN: usize = 16;

/// Server settings read from the environment (and `.env` when present)
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    /// Created as the first administrator when the users table is empty
    pub bootstrap_admin: Option<(String, String)>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &self.database_url)
            .field("jwt_secret", &"<redacted>")
            .field("bind_addr", &self.bind_addr)
            .field("max_connections", &self.max_connections)
            .field("bootstrap_admin", &self.bootstrap_admin.as_ref().map(|(email, _)| email))
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> ServiceResult<Self> {
        // A missing .env file is fine; the variables may come from the process
        if let Err(e) = dotenv::dotenv() {
            log::debug!("No .env file loaded: {}", e);
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup, so tests need not touch the process environment
    pub fn from_lookup<F>(lookup: F) -> ServiceResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET")
            .ok_or_else(|| ServiceError::Configuration("JWT_SECRET must be set".to_string()))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ServiceError::Configuration(format!(
                "JWT_SECRET must be at least {} characters",
                MIN_JWT_SECRET_LEN
            )));
        }

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ServiceError::Configuration(format!("Invalid BIND_ADDR: {}", e)))?;

        let max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ServiceError::Configuration(format!(
                        "Invalid DB_MAX_CONNECTIONS: {}",
                        raw
                    )))
                }
            },
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let bootstrap_admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some((email, password)),
            (None, None) => None,
            _ => {
                return Err(ServiceError::Configuration(
                    "ADMIN_EMAIL and ADMIN_PASSWORD must be set together".to_string(),
                ))
            }
        };

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            jwt_secret,
            bind_addr,
            max_connections,
            bootstrap_admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_secret_is_set() {
        let config = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "0123456789abcdef")])).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn secret_is_required_and_must_be_long_enough() {
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[])),
            Err(ServiceError::Configuration(_))
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("JWT_SECRET", "short")])),
            Err(ServiceError::Configuration(_))
        ));
    }

    #[test]
    fn admin_credentials_come_in_pairs() {
        let result = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "0123456789abcdef"),
            ("ADMIN_EMAIL", "admin@example.gov"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn invalid_numbers_and_addresses_are_rejected() {
        let base = ("JWT_SECRET", "0123456789abcdef");
        assert!(AppConfig::from_lookup(lookup(&[base, ("DB_MAX_CONNECTIONS", "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[base, ("BIND_ADDR", "not-an-addr")])).is_err());
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let config = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "0123456789abcdef")])).unwrap();
        assert!(!format!("{:?}", config).contains("0123456789abcdef"));
    }
}
