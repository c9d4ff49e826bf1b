use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base URL objects are publicly served from, without trailing slash.
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_secs: u64,
    pub jwt: JwtConfig,
    pub s3: S3Config,
    /// `None` when `SMTP_HOST` is unset; mail is then only logged.
    pub smtp: Option<SmtpConfig>,
    pub frontend_url: String,
    pub public_api_url: String,
    pub default_profile_image: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "TeamFinder".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "TeamFinder".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 24 * 60),
        };

        let s3 = S3Config {
            endpoint: std::env::var("S3_ENDPOINT").context("S3_ENDPOINT is not set")?,
            bucket: std::env::var("S3_BUCKET").unwrap_or_else(|_| "teamfinderimages".into()),
            access_key: std::env::var("S3_ACCESS_KEY").context("S3_ACCESS_KEY is not set")?,
            secret_key: std::env::var("S3_SECRET_KEY").context("S3_SECRET_KEY is not set")?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
            public_url: std::env::var("S3_PUBLIC_URL")
                .context("S3_PUBLIC_URL is not set")?
                .trim_end_matches('/')
                .to_string(),
        };

        let smtp = std::env::var("SMTP_HOST").ok().map(|host| SmtpConfig {
            host,
            port: env_parse("SMTP_PORT", 587),
            user: std::env::var("SMTP_USER").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
            from: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| "TeamFinder <no-reply@teamfinder.local>".into()),
        });

        let default_profile_image = std::env::var("DEFAULT_PROFILE_IMAGE")
            .unwrap_or_else(|_| format!("{}/default_photo.png", s3.public_url));

        Ok(Self {
            database_url,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 10),
            db_timeout_secs: env_parse("DB_TIMEOUT_SECS", 3),
            jwt,
            s3,
            smtp,
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
            public_api_url: std::env::var("PUBLIC_API_URL")
                .unwrap_or_else(|_| "http://localhost:4000".into()),
            default_profile_image,
        })
    }

    pub fn db_timeout(&self) -> Duration {
        Duration::from_secs(self.db_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
