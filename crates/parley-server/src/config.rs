use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    /// SQLite busy timeout and per-call deadline for store operations.
    pub store_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = lookup("PARLEY_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("PARLEY_JWT_SECRET is unset or still a placeholder");
        }

        let host = get("PARLEY_HOST", "0.0.0.0");
        let port: u16 = get("PARLEY_PORT", "3000")
            .parse()
            .context("PARLEY_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {host}:{port}"))?;

        let timeout_ms: u64 = get("PARLEY_STORE_TIMEOUT_MS", "5000")
            .parse()
            .context("PARLEY_STORE_TIMEOUT_MS must be milliseconds")?;
        if timeout_ms == 0 {
            bail!("PARLEY_STORE_TIMEOUT_MS must be positive");
        }

        Ok(Self {
            addr,
            db_path: get("PARLEY_DB_PATH", "parley.db").into(),
            jwt_secret,
            store_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let cfg = Config::from_lookup(lookup(&[("PARLEY_JWT_SECRET", "k7f2")])).unwrap();
        assert_eq!(cfg.addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(cfg.db_path, PathBuf::from("parley.db"));
        assert_eq!(cfg.store_timeout, Duration::from_secs(5));
    }

    #[test]
    fn placeholder_secret_is_refused() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(
            Config::from_lookup(lookup(&[("PARLEY_JWT_SECRET", "dev-secret-change-me")])).is_err()
        );
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = Config::from_lookup(lookup(&[
            ("PARLEY_JWT_SECRET", "k7f2"),
            ("PARLEY_HOST", "127.0.0.1"),
            ("PARLEY_PORT", "8088"),
            ("PARLEY_STORE_TIMEOUT_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(cfg.addr, "127.0.0.1:8088".parse().unwrap());
        assert_eq!(cfg.store_timeout, Duration::from_millis(250));

        let bad_port = [("PARLEY_JWT_SECRET", "k"), ("PARLEY_PORT", "x")];
        assert!(Config::from_lookup(lookup(&bad_port)).is_err());
        let zero_timeout = [("PARLEY_JWT_SECRET", "k"), ("PARLEY_STORE_TIMEOUT_MS", "0")];
        assert!(Config::from_lookup(lookup(&zero_timeout)).is_err());
    }
}
