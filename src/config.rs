use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use anyhow::{Context, Result};

const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_JWT_EXPIRY_HOURS: i64 = 72;
const DEFAULT_HISTORY_QUEUE_CAPACITY: usize = 256;

/// Signing settings shared by token issuance and verification.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiry_hours: i64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub history_queue_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        let config = AppConfig {
            host: env_or("HOST", DEFAULT_HOST)?,
            port: env_or("SERVICE_PORT", DEFAULT_PORT)?,
            database_url,
            jwt: JwtConfig {
                secret,
                expiry_hours: env_or("JWT_EXPIRY_HOURS", DEFAULT_JWT_EXPIRY_HOURS)?,
            },
            history_queue_capacity: env_or(
                "HISTORY_QUEUE_CAPACITY",
                DEFAULT_HISTORY_QUEUE_CAPACITY,
            )?,
        };
        if config.history_queue_capacity == 0 {
            anyhow::bail!("HISTORY_QUEUE_CAPACITY must be greater than zero");
        }
        Ok(config)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{key} has an invalid value `{value}`")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        let port: u16 = env_or("CMS_TEST_UNSET_PORT", DEFAULT_PORT).unwrap();
        assert_eq!(port, 3001);
    }

    #[test]
    fn invalid_values_are_reported() {
        std::env::set_var("CMS_TEST_BAD_CAPACITY", "lots");
        let capacity: Result<usize> = env_or("CMS_TEST_BAD_CAPACITY", 1);
        assert!(capacity.is_err());
    }
}
