use std::{
    env,
    fmt::Display,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    str::FromStr,
};

use anyhow::{anyhow, Context, Result};
use tracing::info;

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiry_days: i64,
    pub host: IpAddr,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_expiry_days: optional("JWT_EXPIRY_DAYS", 30)?,
            host: optional("HOST", IpAddr::V4(Ipv4Addr::LOCALHOST))?,
            port: optional("PORT", 3001)?,
        })
    }

    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn optional<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow!("invalid {key} value {raw:?}: {e}")),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_values_fall_back_to_defaults() {
        let port: u16 = optional("CONDUIT_TEST_UNSET_PORT", 3001).unwrap();
        assert_eq!(port, 3001);
    }

    #[test]
    fn malformed_optional_values_are_rejected() {
        env::set_var("CONDUIT_TEST_BAD_PORT", "eighty");
        let result: Result<u16> = optional("CONDUIT_TEST_BAD_PORT", 3001);
        assert!(result.unwrap_err().to_string().contains("CONDUIT_TEST_BAD_PORT"));
    }

    #[test]
    fn missing_required_values_name_the_key() {
        let error = required("CONDUIT_TEST_UNSET_SECRET").unwrap_err();
        assert_eq!(error.to_string(), "CONDUIT_TEST_UNSET_SECRET must be set");
    }
}
