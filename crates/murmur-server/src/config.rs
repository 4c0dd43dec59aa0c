use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// "" or a prefix such as "/api".
    pub base_path: String,
    /// Accounts promoted to admin at startup.
    pub admin_usernames: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = var("MURMUR_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("MURMUR_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("MURMUR_PORT must be a port number")?;
        let db_path: PathBuf = var("MURMUR_DB_PATH")
            .unwrap_or_else(|| "murmur.db".into())
            .into();

        let base_path = var("MURMUR_BASE_PATH")
            .unwrap_or_default()
            .trim()
            .trim_end_matches('/')
            .to_string();
        if !base_path.is_empty() && !base_path.starts_with('/') {
            bail!("MURMUR_BASE_PATH must start with '/', got '{}'", base_path);
        }

        let admin_usernames = var("MURMUR_ADMIN_USERNAMES")
            .unwrap_or_default()
            .split(',')
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect();

        Ok(Self {
            host,
            port,
            db_path,
            base_path,
            admin_usernames,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.addr().unwrap().to_string(), "0.0.0.0:3000");
        assert_eq!(cfg.db_path, PathBuf::from("murmur.db"));
        assert_eq!(cfg.base_path, "");
        assert!(cfg.admin_usernames.is_empty());
    }

    #[test]
    fn admin_list_is_normalized() {
        let cfg = config(&[("MURMUR_ADMIN_USERNAMES", " Root, ,ops ")]).unwrap();
        assert_eq!(cfg.admin_usernames, vec!["root", "ops"]);
    }

    #[test]
    fn base_path_trailing_slash_is_dropped() {
        let cfg = config(&[("MURMUR_BASE_PATH", "/api/")]).unwrap();
        assert_eq!(cfg.base_path, "/api");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("MURMUR_PORT", "http")]).is_err());
        assert!(config(&[("MURMUR_BASE_PATH", "api")]).is_err());
        assert!(config(&[("MURMUR_HOST", "not a host")]).unwrap().addr().is_err());
    }
}
