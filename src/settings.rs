//! Runtime settings read from the environment (a `.env` file is loaded by the binary).

use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub body_limit_bytes: usize,
    /// Created at startup when both are set and the user does not exist yet.
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let required = |name: &'static str| {
            get(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(SettingsError::Missing(name))
        };
        let or_default = |name: &str, default: &str| {
            get(name)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        Ok(Settings {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            bind_addr: parse("BIND_ADDR", or_default("BIND_ADDR", "0.0.0.0:3000"))?,
            db_max_connections: parse("DB_MAX_CONNECTIONS", or_default("DB_MAX_CONNECTIONS", "5"))?,
            access_token_ttl_secs: positive(
                "ACCESS_TOKEN_TTL_SECS",
                or_default("ACCESS_TOKEN_TTL_SECS", "300"),
            )?,
            refresh_token_ttl_secs: positive(
                "REFRESH_TOKEN_TTL_SECS",
                or_default("REFRESH_TOKEN_TTL_SECS", "86400"),
            )?,
            body_limit_bytes: parse("BODY_LIMIT_BYTES", or_default("BODY_LIMIT_BYTES", "1048576"))?,
            admin_username: get("ADMIN_USERNAME").filter(|v| !v.trim().is_empty()),
            admin_password: get("ADMIN_PASSWORD").filter(|v| !v.is_empty()),
        })
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, SettingsError> {
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|_| SettingsError::Invalid { name, value })
}

fn positive(name: &'static str, value: String) -> Result<i64, SettingsError> {
    match parse::<i64>(name, value.clone())? {
        n if n > 0 => Ok(n),
        _ => Err(SettingsError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let s = Settings::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/workshop"),
            ("JWT_SECRET", "s"),
        ]))
        .unwrap();
        assert_eq!(s.bind_addr.to_string(), "0.0.0.0:3000");
        assert_eq!(s.db_max_connections, 5);
        assert_eq!(s.access_token_ttl_secs, 300);
        assert_eq!(s.refresh_token_ttl_secs, 86_400);
        assert_eq!(s.body_limit_bytes, 1_048_576);
        assert!(s.admin_username.is_none());
    }

    #[test]
    fn missing_secret_is_reported() {
        let err = Settings::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")])).unwrap_err();
        assert!(matches!(err, SettingsError::Missing("JWT_SECRET")));
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err = Settings::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("ACCESS_TOKEN_TTL_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { name: "ACCESS_TOKEN_TTL_SECS", .. }));

        let err = Settings::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("BIND_ADDR", "nowhere"),
        ]))
        .unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { name: "BIND_ADDR", .. }));
    }
}
