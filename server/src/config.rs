use anyhow::{Context, Result, anyhow};
use platform_authn::AuthConfig;
use platform_db::DatabaseSettings;

pub const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:5173", "https://localhost:5173"];
const MIN_SECRET_LEN: usize = 32;
const DEV_AUTH_SECRET: &str = "crm-development-secret-do-not-deploy!";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub auth: AuthConfig,
    pub cookie_secure: bool,
    pub cors_allowed_origins: Vec<String>,
    pub request_screening: bool,
}

impl AppConfig {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database = DatabaseSettings {
            url: lookup("DATABASE_URL").unwrap_or_else(|| platform_db::DEFAULT_DATABASE_URL.into()),
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
        };

        let jwt_secret = match lookup("AUTH_SECRET") {
            Some(secret) => secret,
            None if cfg!(debug_assertions) => {
                tracing::warn!("AUTH_SECRET not set; using the development secret");
                DEV_AUTH_SECRET.to_string()
            }
            None => return Err(anyhow!("AUTH_SECRET missing")),
        };
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(anyhow!("AUTH_SECRET must be at least {MIN_SECRET_LEN} bytes"));
        }
        let auth = AuthConfig {
            jwt_secret,
            access_ttl_minutes: parse_or(&lookup, "ACCESS_TOKEN_TTL_MINUTES", 30)?,
            refresh_ttl_minutes: parse_or(&lookup, "REFRESH_TOKEN_TTL_MINUTES", 60 * 24 * 7)?,
        };

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect());

        Ok(Self {
            database,
            auth,
            cookie_secure: flag(&lookup, "COOKIE_SECURE"),
            cors_allowed_origins,
            request_screening: flag(&lookup, "REQUEST_SCREENING"),
        })
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> bool {
    lookup(key)
        .map(|val| matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("AUTH_SECRET", SECRET)]).unwrap();
        assert_eq!(cfg.database.url, platform_db::DEFAULT_DATABASE_URL);
        assert_eq!(cfg.auth.access_ttl_minutes, 30);
        assert_eq!(cfg.auth.refresh_ttl_minutes, 10_080);
        assert!(!cfg.cookie_secure);
        assert!(!cfg.request_screening);
        assert_eq!(cfg.cors_allowed_origins, DEFAULT_CORS_ORIGINS);
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = config(&[("AUTH_SECRET", "short")]).unwrap_err();
        assert!(err.to_string().contains("at least 32 bytes"));
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("AUTH_SECRET", SECRET),
            ("DATABASE_URL", "sqlite::memory:"),
            ("ACCESS_TOKEN_TTL_MINUTES", "5"),
            ("COOKIE_SECURE", "true"),
            ("REQUEST_SCREENING", "1"),
            ("CORS_ALLOWED_ORIGINS", "https://crm.example.com, ,http://localhost:3000"),
        ])
        .unwrap();
        assert_eq!(cfg.database.url, "sqlite::memory:");
        assert_eq!(cfg.auth.access_ttl_minutes, 5);
        assert!(cfg.cookie_secure);
        assert!(cfg.request_screening);
        assert_eq!(
            cfg.cors_allowed_origins,
            ["https://crm.example.com", "http://localhost:3000"]
        );
    }

    #[test]
    fn malformed_numbers_fail_loudly() {
        let err = config(&[("AUTH_SECRET", SECRET), ("ACCESS_TOKEN_TTL_MINUTES", "soon")])
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid ACCESS_TOKEN_TTL_MINUTES");
    }
}
