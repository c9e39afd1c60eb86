use std::{env, path::PathBuf};

use actix_web::cookie::Key;

use crate::{errors::AppError, structs::StatusPolicy};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub session_key: Option<String>,
    pub cookie_secure: bool,
    pub status_policy: StatusPolicy,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let port = match env::var("PORT") {
            Ok(v) => v
                .parse::<u16>()
                .map_err(|e| AppError::ConfigError(format!("PORT '{}': {}", v, e)))?,
            Err(_) => 8080,
        };
        let status_policy = match env::var("STATUS_POLICY") {
            Ok(v) => v.parse()?,
            Err(_) => StatusPolicy::default(),
        };
        let cookie_secure = match env::var("COOKIE_SECURE") {
            Ok(v) => v
                .parse::<bool>()
                .map_err(|e| AppError::ConfigError(format!("COOKIE_SECURE '{}': {}", v, e)))?,
            Err(_) => false,
        };
        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES") {
            Ok(v) => v
                .parse::<usize>()
                .map_err(|e| AppError::ConfigError(format!("MAX_UPLOAD_BYTES '{}': {}", v, e)))?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://reembolso.db".into()),
            upload_dir: env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "uploads".into())
                .into(),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            session_key: env::var("SESSION_KEY").ok().filter(|k| !k.is_empty()),
            cookie_secure,
            status_policy,
            max_upload_bytes,
        })
    }

    /// Cookie signing key. Without `SESSION_KEY` a random key is used and
    /// sessions do not survive a restart.
    pub fn session_key(&self) -> Result<Key, AppError> {
        match &self.session_key {
            Some(key_str) if key_str.len() >= 64 => Ok(Key::from(key_str.as_bytes())),
            Some(_) => Err(AppError::ConfigError(
                "SESSION_KEY must be at least 64 bytes long".into(),
            )),
            None => {
                log::warn!("SESSION_KEY not set, generating an ephemeral session key");
                Ok(Key::generate())
            }
        }
    }
}
