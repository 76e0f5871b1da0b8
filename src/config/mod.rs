use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub points: PointsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub geo: GeoConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Days a login session stays valid
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: i64,
    /// Bootstrap admin account, created on startup when both email and password are set
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_days: default_session_ttl_days(),
            admin_email: None,
            admin_password: None,
            admin_username: default_admin_username(),
        }
    }
}

fn default_session_ttl_days() -> i64 {
    7
}

const MAX_SESSION_TTL_DAYS: i64 = 3650;

impl AuthConfig {
    /// Session lifetime, `None` unless `session_ttl_days` is between 1 and 3650
    pub fn session_ttl(&self) -> Option<chrono::Duration> {
        if !(1..=MAX_SESSION_TTL_DAYS).contains(&self.session_ttl_days) {
            return None;
        }
        chrono::Duration::try_days(self.session_ttl_days)
    }
}

fn default_admin_username() -> String {
    "admin".to_string()
}

/// Point amounts awarded and deducted by the report workflow
#[derive(Debug, Clone, Deserialize)]
pub struct PointsConfig {
    #[serde(default = "default_report_created")]
    pub report_created: i64,
    #[serde(default = "default_report_resolved")]
    pub report_resolved: i64,
    #[serde(default = "default_report_cancelled")]
    pub report_cancelled: i64,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            report_created: default_report_created(),
            report_resolved: default_report_resolved(),
            report_cancelled: default_report_cancelled(),
        }
    }
}

fn default_report_created() -> i64 {
    10
}

fn default_report_resolved() -> i64 {
    15
}

fn default_report_cancelled() -> i64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    /// Requests per window for authenticated API endpoints
    #[serde(default = "default_api_requests")]
    pub api_requests_per_window: u32,
    /// Requests per window for login and registration
    #[serde(default = "default_auth_requests")]
    pub auth_requests_per_window: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Seconds between sweeps of stale limiter entries
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            api_requests_per_window: default_api_requests(),
            auth_requests_per_window: default_auth_requests(),
            window_seconds: default_window_seconds(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_api_requests() -> u32 {
    120
}

fn default_auth_requests() -> u32 {
    10
}

fn default_window_seconds() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoConfig {
    /// Base URL of the administrative region service
    #[serde(default = "default_region_base_url")]
    pub region_base_url: String,
    /// Search endpoint of the geocoder
    #[serde(default = "default_geocoder_url")]
    pub geocoder_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_geo_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            region_base_url: default_region_base_url(),
            geocoder_url: default_geocoder_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_geo_timeout(),
        }
    }
}

fn default_region_base_url() -> String {
    "https://www.emsifa.com/api-wilayah-indonesia/api".to_string()
}

fn default_geocoder_url() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}

fn default_user_agent() -> String {
    format!("EcoGuard/{}", env!("CARGO_PKG_VERSION"))
}

fn default_geo_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).with_context(|| "Failed to parse configuration file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.auth.session_ttl().is_none() {
            bail!(
                "auth.session_ttl_days must be between 1 and {}, got {}",
                MAX_SESSION_TTL_DAYS,
                self.auth.session_ttl_days
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.session_ttl_days, 7);
        assert_eq!(config.points.report_created, 10);
        assert_eq!(config.points.report_resolved, 15);
        assert_eq!(config.points.report_cancelled, 10);
        assert!(config.rate_limit.enabled);
        assert!(config.auth.admin_email.is_none());
    }

    #[test]
    fn test_partial_sections_override_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 9000

            [points]
            report_resolved = 20

            [auth]
            admin_email = "admin@example.com"
            admin_password = "s3cret-pass"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.points.report_resolved, 20);
        assert_eq!(config.points.report_created, 10);
        assert_eq!(config.auth.admin_email.as_deref(), Some("admin@example.com"));
        assert_eq!(config.auth.admin_username, "admin");
    }

    #[test]
    fn test_session_ttl_out_of_range_is_rejected() {
        for days in ["0", "-3", "3651", "1000000000000000"] {
            let content = format!("[auth]\nsession_ttl_days = {}", days);
            assert!(Config::from_toml(&content).is_err(), "accepted {}", days);
        }

        let config = Config::from_toml("[auth]\nsession_ttl_days = 30").unwrap();
        assert_eq!(config.auth.session_ttl(), chrono::Duration::try_days(30));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::from_toml("[server\nport = ").is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load(Path::new("/nonexistent/ecoguard.toml")).unwrap();
        assert_eq!(config.logging.level, "info");
    }
}
