use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::assessments::scoring::{GradeScale, ScoringPolicy};
use crate::assessments::service::{AssessmentSettings, MAX_EXPIRY_DAYS};
use crate::http::RateLimitConfig;

const MAX_UPLOAD_MB: u32 = 50;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub assessments: AssessmentSettings,
    pub security: SecurityConfig,
    /// Catalog CSV seeded into the store at startup.
    pub catalog_csv: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let defaults = AssessmentSettings::default();
        let public_url = env::var("APP_PUBLIC_URL")
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.public_url);
        let default_expiry_days = bounded_number(
            "APP_DEFAULT_EXPIRY_DAYS",
            defaults.default_expiry_days,
            1,
            MAX_EXPIRY_DAYS,
        )?;
        let upload_max_mb =
            bounded_number("APP_UPLOAD_MAX_SIZE_MB", defaults.upload_max_mb, 1, MAX_UPLOAD_MB)?;
        let scoring = if flag("APP_SCORING_GRADES")? {
            ScoringPolicy::default().with_grades(GradeScale::standard())
        } else {
            ScoringPolicy::default()
        };

        let rate_defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            max_requests: bounded_number(
                "APP_RATE_LIMIT_REQUESTS",
                rate_defaults.max_requests,
                1,
                u32::MAX,
            )?,
            window_secs: u64::from(bounded_number(
                "APP_RATE_LIMIT_WINDOW_SECS",
                rate_defaults.window_secs as u32,
                1,
                86_400,
            )?),
            ..rate_defaults
        };
        let admin_api_keys = env::var("APP_ADMIN_API_KEYS")
            .map(|value| parse_key_list(&value))
            .unwrap_or_default();

        let catalog_csv = env::var("APP_CATALOG_CSV")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            assessments: AssessmentSettings {
                public_url,
                default_expiry_days,
                upload_max_mb,
                scoring,
            },
            security: SecurityConfig {
                admin_api_keys,
                rate_limit,
            },
            catalog_csv,
        })
    }
}

fn bounded_number(key: &'static str, default: u32, min: u32, max: u32) -> Result<u32, ConfigError> {
    let Ok(raw) = env::var(key) else {
        return Ok(default);
    };
    let value = raw
        .trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidNumber { key, value: raw.clone() })?;
    if value < min || value > max {
        return Err(ConfigError::OutOfRange { key, min, max });
    }
    Ok(value)
}

fn flag(key: &'static str) -> Result<bool, ConfigError> {
    let Ok(raw) = env::var(key) else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        _ => Err(ConfigError::InvalidFlag { key, value: raw }),
    }
}

fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Admin API keys and respondent rate limiting.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub admin_api_keys: Vec<String>,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
    OutOfRange { key: &'static str, min: u32, max: u32 },
    InvalidFlag { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a whole number, got '{value}'")
            }
            ConfigError::OutOfRange { key, min, max } => {
                write!(f, "{key} must be between {min} and {max}")
            }
            ConfigError::InvalidFlag { key, value } => {
                write!(f, "{key} must be true or false, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_PUBLIC_URL",
            "APP_DEFAULT_EXPIRY_DAYS",
            "APP_UPLOAD_MAX_SIZE_MB",
            "APP_SCORING_GRADES",
            "APP_RATE_LIMIT_REQUESTS",
            "APP_RATE_LIMIT_WINDOW_SECS",
            "APP_ADMIN_API_KEYS",
            "APP_CATALOG_CSV",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.assessments.public_url, "http://localhost:5173");
        assert_eq!(config.assessments.default_expiry_days, 30);
        assert_eq!(config.assessments.upload_max_mb, 5);
        assert!(config.assessments.scoring.overall_grade_scale.is_none());
        assert_eq!(config.security.rate_limit.max_requests, 30);
        assert_eq!(config.security.rate_limit.window_secs, 60);
        assert!(config.security.admin_api_keys.is_empty());
        assert!(config.catalog_csv.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn reads_assessment_and_security_settings() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_PUBLIC_URL", "https://survey.example.mn/");
        env::set_var("APP_DEFAULT_EXPIRY_DAYS", "14");
        env::set_var("APP_SCORING_GRADES", "true");
        env::set_var("APP_ADMIN_API_KEYS", "first, second ,,");
        env::set_var("APP_RATE_LIMIT_REQUESTS", "5");

        let config = AppConfig::load().expect("config loads");
        reset_env();

        assert_eq!(config.assessments.public_url, "https://survey.example.mn");
        assert_eq!(config.assessments.default_expiry_days, 14);
        assert!(config.assessments.scoring.overall_grade_scale.is_some());
        assert_eq!(config.security.admin_api_keys, vec!["first", "second"]);
        assert_eq!(config.security.rate_limit.max_requests, 5);
    }

    #[test]
    fn rejects_out_of_range_expiry() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_DEFAULT_EXPIRY_DAYS", "0");

        let err = AppConfig::load().expect_err("zero days rejected");
        reset_env();

        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                key: "APP_DEFAULT_EXPIRY_DAYS",
                ..
            }
        ));
    }

    #[test]
    fn rejects_unparseable_flag() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_SCORING_GRADES", "maybe");

        let err = AppConfig::load().expect_err("flag rejected");
        reset_env();

        assert!(matches!(err, ConfigError::InvalidFlag { .. }));
    }
}
