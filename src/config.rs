use std::{env, fmt::Display, net::IpAddr, str::FromStr};

use thiserror::Error;

use crate::cryptography::generate_secret_key;

const SECRET_KEY_LENGTH: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {0} is required")]
    Missing(&'static str),

    #[error("Invalid {key} value: {info}")]
    Invalid { key: &'static str, info: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    pub secret_key: String,
    pub token_lifetime_hours: i64,
}

impl Config {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            log::info!("No .env file loaded: {e}");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let secret_key = match lookup("SECRET_KEY") {
            Some(key) if !key.is_empty() => key,
            _ => {
                log::warn!("SECRET_KEY not set, generating one; tokens will not survive a restart");
                generate_secret_key(SECRET_KEY_LENGTH)
            }
        };

        Ok(Self {
            host: try_load(&lookup, "FOODGRAM_HOST", "0.0.0.0")?,
            port: try_load(&lookup, "FOODGRAM_PORT", "8000")?,
            database_url,
            max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", "5")?,
            secret_key,
            token_lifetime_hours: try_load(&lookup, "TOKEN_LIFETIME_HOURS", "24")?,
        })
    }
}

fn try_load<T, F>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .unwrap_or_else(|| {
            log::info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            info: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_fill_optional_values() {
        let config = Config::from_lookup(lookup(&[(
            "DATABASE_URL",
            "postgres://foodgram@localhost/foodgram",
        )]))
        .unwrap();

        assert_eq!(config.port, 8000);
        assert_eq!(config.host.to_string(), "0.0.0.0");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.token_lifetime_hours, 24);
        assert_eq!(config.secret_key.len(), SECRET_KEY_LENGTH);
    }

    #[test]
    fn database_url_is_required() {
        let result = Config::from_lookup(lookup(&[("FOODGRAM_PORT", "9000")]));

        assert!(matches!(result, Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn invalid_port_is_reported() {
        let result = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("FOODGRAM_PORT", "eighty"),
        ]));

        match result {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "FOODGRAM_PORT"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn explicit_secret_is_kept() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("SECRET_KEY", "not-so-secret"),
        ]))
        .unwrap();

        assert_eq!(config.secret_key, "not-so-secret");
    }
}
