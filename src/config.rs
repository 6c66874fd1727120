use std::{env, str::FromStr};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: u64,
    pub refresh_ttl_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    pub secure: bool,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub redis_url: String,
    pub login_limit: u32,
    pub login_window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub max_bytes: usize,
    pub presign_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub cookies: CookieConfig,
    pub rate_limit: RateLimitConfig,
    pub storage: StorageConfig,
    pub uploads: UploadConfig,
    pub host: String,
    pub port: u16,
    pub cors_origin: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "folio".into()),
            audience: env::var("JWT_AUDIENCE").unwrap_or_else(|_| "folio-users".into()),
            ttl_minutes: minutes("JWT_TTL_MINUTES", 60)?,
            refresh_ttl_minutes: minutes("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14)?,
        };
        let cookies = CookieConfig {
            secure: parsed("COOKIE_SECURE", true)?,
            domain: optional("COOKIE_DOMAIN"),
        };
        let rate_limit = RateLimitConfig {
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            login_limit: parsed("LOGIN_RATE_LIMIT", 5)?,
            login_window_secs: parsed("LOGIN_RATE_WINDOW_SECS", 60)?,
        };
        let storage = StorageConfig {
            endpoint: required("S3_ENDPOINT")?,
            bucket: required("S3_BUCKET")?,
            access_key: required("S3_ACCESS_KEY")?,
            secret_key: required("S3_SECRET_KEY")?,
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };
        let uploads = UploadConfig {
            max_bytes: parsed("UPLOAD_MAX_BYTES", 10 * 1024 * 1024)?,
            presign_ttl_secs: parsed("PRESIGN_TTL_SECS", 30 * 60)?,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parsed("DATABASE_MAX_CONNECTIONS", 10)?,
            jwt,
            cookies,
            rate_limit,
            storage,
            uploads,
            host: env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parsed("APP_PORT", 8080)?,
            cors_origin: optional("CORS_ORIGIN"),
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Ten years.
const MAX_TTL_MINUTES: u64 = 60 * 24 * 365 * 10;

fn minutes(key: &str, default: u64) -> anyhow::Result<u64> {
    let value = parsed(key, default)?;
    if !(1..=MAX_TTL_MINUTES).contains(&value) {
        anyhow::bail!("{key} must be between 1 and {MAX_TTL_MINUTES} minutes");
    }
    Ok(value)
}

fn parsed<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_falls_back_to_default_when_unset() {
        let v: u32 = parsed("FOLIO_TEST_SURELY_UNSET_VAR", 42).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn ttl_minutes_are_bounded() {
        env::set_var("FOLIO_TEST_TTL_ZERO", "0");
        env::set_var("FOLIO_TEST_TTL_HUGE", u64::MAX.to_string());
        env::set_var("FOLIO_TEST_TTL_OK", "15");
        assert!(minutes("FOLIO_TEST_TTL_ZERO", 60).is_err());
        let err = minutes("FOLIO_TEST_TTL_HUGE", 60).unwrap_err();
        assert!(err.to_string().contains("FOLIO_TEST_TTL_HUGE"));
        assert_eq!(minutes("FOLIO_TEST_TTL_OK", 60).unwrap(), 15);
        for key in ["FOLIO_TEST_TTL_ZERO", "FOLIO_TEST_TTL_HUGE", "FOLIO_TEST_TTL_OK"] {
            env::remove_var(key);
        }
    }

    #[test]
    fn parsed_rejects_garbage() {
        env::set_var("FOLIO_TEST_BAD_PORT", "eighty");
        let err = parsed::<u16>("FOLIO_TEST_BAD_PORT", 8080).unwrap_err();
        assert!(err.to_string().contains("FOLIO_TEST_BAD_PORT"));
        env::remove_var("FOLIO_TEST_BAD_PORT");
    }

    #[test]
    fn optional_ignores_blank_values() {
        env::set_var("FOLIO_TEST_BLANK", "   ");
        assert_eq!(optional("FOLIO_TEST_BLANK"), None);
        env::remove_var("FOLIO_TEST_BLANK");
    }
}
