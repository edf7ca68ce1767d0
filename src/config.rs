use std::{env, fmt, net::IpAddr, path::PathBuf, str::FromStr};

use chrono::Duration;

use crate::cryptography::generate_secret;

pub struct Config {
    pub address: IpAddr,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: Vec<u8>,
    pub token_lifetime: Duration,
    pub media_root: PathBuf,
    pub max_upload_bytes: u64,
}

#[derive(Debug)]
pub struct ConfigError {
    info: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid configuration: {}", self.info)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Reads the process environment. Call `dotenv` first to honor `.env`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| ConfigError {
            info: String::from("DATABASE_URL must be set"),
        })?;

        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret.into_bytes(),
            _ => {
                log::warn!("JWT_SECRET not set, tokens will not survive a restart");
                generate_secret()
            }
        };

        let token_lifetime_hours: i64 = try_load(&lookup, "TOKEN_LIFETIME_HOURS", "24")?;
        if token_lifetime_hours <= 0 {
            return Err(ConfigError {
                info: String::from("TOKEN_LIFETIME_HOURS must be positive"),
            });
        }

        Ok(Self {
            address: try_load(&lookup, "BIND_ADDRESS", "0.0.0.0")?,
            port: try_load(&lookup, "PORT", "8000")?,
            database_url,
            database_max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", "5")?,
            jwt_secret,
            token_lifetime: Duration::hours(token_lifetime_hours),
            media_root: try_load(&lookup, "MEDIA_ROOT", "media")?,
            max_upload_bytes: try_load(&lookup, "MAX_UPLOAD_BYTES", "5242880")?,
        })
    }
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).unwrap_or_else(|| {
        log::info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.parse().map_err(|e| ConfigError {
        info: format!("{key}={value}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/recipes")]).unwrap();

        assert_eq!(config.port, 8000);
        assert_eq!(config.media_root, PathBuf::from("media"));
        assert_eq!(config.token_lifetime, Duration::hours(24));
        assert_eq!(config.jwt_secret.len(), 64);
    }

    #[test]
    fn database_url_is_required() {
        assert!(load(&[]).is_err());
    }

    #[test]
    fn malformed_values_fail() {
        assert!(load(&[("DATABASE_URL", "postgres://"), ("PORT", "http")]).is_err());
        assert!(load(&[("DATABASE_URL", "postgres://"), ("TOKEN_LIFETIME_HOURS", "0")]).is_err());
    }

    #[test]
    fn configured_secret_is_used() {
        let config = load(&[("DATABASE_URL", "postgres://"), ("JWT_SECRET", "abc")]).unwrap();

        assert_eq!(config.jwt_secret, b"abc");
    }
}
