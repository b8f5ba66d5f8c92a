//! Application configuration loaded from environment variables.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::path::PathBuf;

static CONFIG: OnceCell<AppConfig> = OnceCell::new();

const DEFAULT_ALLOWED_HOSTS: &[&str] = &[
    "localhost",
    "127.0.0.1",
    "api.arc.pingtech.dev",
    "arc.pingtech.dev",
];

const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:5173",
    "http://localhost:8080",
    "http://localhost:8000",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:5173",
    "http://127.0.0.1:8080",
    "http://127.0.0.1:8000",
    "https://arc.pingtech.dev",
    "https://api.arc.pingtech.dev",
];

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub debug: bool,
    pub host: String,
    pub port: u16,
    pub media_root: PathBuf,
    pub media_url: String,
    pub static_root: PathBuf,
    pub static_url: String,
    pub allowed_hosts: Vec<String>,
    pub cors_allow_all_origins: bool,
    pub cors_allowed_origins: Vec<String>,
    /// Honour `X-Forwarded-Proto` / `X-Forwarded-Host` when building absolute URLs.
    pub trust_forwarded_headers: bool,
    pub api_default_limit: i64,
    pub api_max_limit: i64,
    pub max_concurrent_requests: usize,
    pub request_timeout_secs: u64,
    pub graceful_timeout_secs: u64,
    pub max_request_body_bytes: usize,
}

impl AppConfig {
    /// Load configuration from the process environment (and `.env` if present).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let debug = parse_bool(lookup("DEBUG").as_deref()).unwrap_or(false);

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse().context("PORT must be a valid number")?,
            None => 8001,
        };

        let api_default_limit = parse_number(&lookup, "API_DEFAULT_LIMIT", 20)?;
        let api_max_limit = parse_number(&lookup, "API_MAX_LIMIT", 20)?;
        if api_default_limit < 1 || api_max_limit < api_default_limit {
            anyhow::bail!("API_DEFAULT_LIMIT must be between 1 and API_MAX_LIMIT");
        }

        Ok(Self {
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            debug,
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            media_root: PathBuf::from(lookup("MEDIA_ROOT").unwrap_or_else(|| "media".to_string())),
            media_url: normalize_url_prefix(
                &lookup("MEDIA_URL").unwrap_or_else(|| "/media/".to_string()),
            ),
            static_root: PathBuf::from(
                lookup("STATIC_ROOT").unwrap_or_else(|| "static".to_string()),
            ),
            static_url: normalize_url_prefix(
                &lookup("STATIC_URL").unwrap_or_else(|| "/static/".to_string()),
            ),
            allowed_hosts: split_list(lookup("ALLOWED_HOSTS"), DEFAULT_ALLOWED_HOSTS),
            cors_allow_all_origins: parse_bool(lookup("CORS_ALLOW_ALL_ORIGINS").as_deref())
                .unwrap_or(debug),
            cors_allowed_origins: split_list(lookup("ALLOWED_ORIGINS"), DEFAULT_CORS_ORIGINS),
            trust_forwarded_headers: parse_bool(lookup("TRUST_FORWARDED_HEADERS").as_deref())
                .unwrap_or(false),
            api_default_limit,
            api_max_limit,
            max_concurrent_requests: parse_number(&lookup, "MAX_CONCURRENT_REQUESTS", 1000)?,
            request_timeout_secs: parse_number(&lookup, "REQUEST_TIMEOUT_SECS", 30)?,
            graceful_timeout_secs: parse_number(&lookup, "GRACEFUL_TIMEOUT_SECS", 30)?,
            max_request_body_bytes: parse_number(
                &lookup,
                "MAX_REQUEST_BODY_BYTES",
                2 * 1024 * 1024,
            )?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Whether `host` (without port) passes the allow-list.
    ///
    /// Entries may be exact names, `*`, or `.example.com` to match the domain
    /// and all of its subdomains.
    pub fn is_allowed_host(&self, host: &str) -> bool {
        let host = strip_port(host).to_ascii_lowercase();
        self.allowed_hosts.iter().any(|pattern| {
            let pattern = pattern.to_ascii_lowercase();
            if pattern == "*" {
                return true;
            }
            match pattern.strip_prefix('.') {
                Some(domain) => host == domain || host.ends_with(&pattern),
                None => host == pattern,
            }
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None).unwrap_or_else(|_| unreachable!("defaults are valid"))
    }
}

/// Install the process-wide configuration. Later calls are ignored.
pub fn init(config: AppConfig) -> &'static AppConfig {
    let _ = CONFIG.set(config);
    get()
}

/// Process-wide configuration, falling back to the environment when `init` was never called.
pub fn get() -> &'static AppConfig {
    CONFIG.get_or_init(|| {
        AppConfig::from_env().unwrap_or_else(|e| {
            tracing::warn!("Invalid configuration in environment ({}), using defaults", e);
            AppConfig::default()
        })
    })
}

fn parse_bool(raw: Option<&str>) -> Option<bool> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}

fn split_list(raw: Option<String>, default: &[&str]) -> Vec<String> {
    let items: Vec<String> = raw
        .map(|s| {
            s.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if items.is_empty() {
        default.iter().map(|s| s.to_string()).collect()
    } else {
        items
    }
}

fn normalize_url_prefix(prefix: &str) -> String {
    let mut prefix = prefix.trim().to_string();
    if !prefix.starts_with('/') && !prefix.contains("://") {
        prefix.insert(0, '/');
    }
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    prefix
}

fn strip_port(host: &str) -> &str {
    // IPv6 literals keep their brackets: [::1]:8000
    if let Some(end) = host.find(']') {
        return &host[..=end];
    }
    host.rsplit_once(':').map(|(name, _)| name).unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8001);
        assert_eq!(config.media_url, "/media/");
        assert_eq!(config.api_default_limit, 20);
        assert_eq!(config.api_max_limit, 20);
        assert!(!config.debug);
        assert!(!config.cors_allow_all_origins);
        assert!(config
            .cors_allowed_origins
            .contains(&"https://arc.pingtech.dev".to_string()));
    }

    #[test]
    fn test_debug_enables_cors_allow_all_by_default() {
        let config = config_with(&[("DEBUG", "true")]).unwrap();
        assert!(config.cors_allow_all_origins);

        let config = config_with(&[("DEBUG", "true"), ("CORS_ALLOW_ALL_ORIGINS", "false")]).unwrap();
        assert!(!config.cors_allow_all_origins);
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        assert!(config_with(&[("PORT", "eighty")]).is_err());
    }

    #[test]
    fn test_limit_bounds_are_checked() {
        assert!(config_with(&[("API_DEFAULT_LIMIT", "50")]).is_err());
        let config = config_with(&[("API_DEFAULT_LIMIT", "50"), ("API_MAX_LIMIT", "100")]).unwrap();
        assert_eq!(config.api_max_limit, 100);
    }

    #[test]
    fn test_url_prefixes_are_normalized() {
        let config = config_with(&[("MEDIA_URL", "uploads"), ("STATIC_URL", "/assets")]).unwrap();
        assert_eq!(config.media_url, "/uploads/");
        assert_eq!(config.static_url, "/assets/");

        let config = config_with(&[("MEDIA_URL", "https://cdn.example.com/media")]).unwrap();
        assert_eq!(config.media_url, "https://cdn.example.com/media/");
    }

    #[test]
    fn test_origin_list_parsing() {
        let config = config_with(&[("ALLOWED_ORIGINS", " https://a.test, ,https://b.test ")]).unwrap();
        assert_eq!(config.cors_allowed_origins, vec!["https://a.test", "https://b.test"]);
    }

    #[test]
    fn test_allowed_host_matching() {
        let config = config_with(&[("ALLOWED_HOSTS", "localhost,.arc.test")]).unwrap();
        assert!(config.is_allowed_host("localhost:8000"));
        assert!(config.is_allowed_host("arc.test"));
        assert!(config.is_allowed_host("api.arc.test"));
        assert!(!config.is_allowed_host("evil.test"));
        assert!(!config.is_allowed_host("notarc.test"));

        let config = config_with(&[("ALLOWED_HOSTS", "*")]).unwrap();
        assert!(config.is_allowed_host("anything.example"));
    }
}
