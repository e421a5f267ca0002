//! Service configuration.

use serde::Deserialize;
use std::path::Path;

use pixio_core::{PixioError, PurchasePolicy, DEFAULT_MAX_SETTLED_PER_DAY};

/// Default Razorpay REST endpoint.
pub const DEFAULT_RAZORPAY_API_URL: &str = "https://api.razorpay.com/v1";

/// Default ClipDrop REST endpoint.
pub const DEFAULT_CLIPDROP_API_URL: &str = "https://clipdrop-api.co";

/// Credits granted to a newly registered account.
pub const DEFAULT_SIGNUP_CREDITS: i64 = 5;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:4000").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/pixio").
    pub data_dir: String,

    /// HS256 secret for session tokens.
    pub jwt_secret: String,

    /// Razorpay public key id (optional).
    pub razorpay_key_id: Option<String>,

    /// Razorpay key secret (optional).
    pub razorpay_key_secret: Option<String>,

    /// Razorpay REST base URL.
    pub razorpay_api_url: String,

    /// ClipDrop API key (optional).
    pub clipdrop_api_key: Option<String>,

    /// ClipDrop REST base URL.
    pub clipdrop_api_url: String,

    /// Mail relay endpoint (optional; codes are logged when unset).
    pub mail_api_url: Option<String>,

    /// Mail relay bearer key (optional).
    pub mail_api_key: Option<String>,

    /// Sender address for verification mail.
    pub mail_from: String,

    /// Frontend URL, used as a CORS origin when `cors_origins` is empty.
    pub frontend_url: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Bound on a single image provider call, in seconds.
    pub provider_timeout_seconds: u64,

    /// Bound on a single payment gateway call, in seconds.
    pub gateway_timeout_seconds: u64,

    /// Credits granted at registration.
    pub signup_credits: i64,

    /// Purchase caps and overrides.
    pub purchase_policy: PurchasePolicy,
}

/// Razorpay secrets file structure.
#[derive(Debug, Deserialize)]
struct RazorpaySecrets {
    key_id: String,
    key_secret: String,
}

/// ClipDrop secrets file structure.
#[derive(Debug, Deserialize)]
struct ClipdropSecrets {
    api_key: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    ///
    /// # Errors
    ///
    /// Returns `PixioError::Configuration` if `JWT_SECRET` is unset or
    /// `PURCHASE_CREDIT_OVERRIDE` is not a positive integer.
    pub fn from_env() -> Result<Self, PixioError> {
        let jwt_secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PixioError::Configuration("JWT_SECRET must be set".into()))?;

        // Try to load provider secrets from file first, then fall back to env vars
        let (razorpay_key_id, razorpay_key_secret) = load_razorpay_secrets();
        let clipdrop_api_key = load_clipdrop_secrets();

        let listen_addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| {
            let port = env_parse::<u16>("PORT").unwrap_or(4000);
            format!("0.0.0.0:{port}")
        });

        let frontend_url = env_or("FRONTEND_URL", "http://localhost:5173");

        Ok(Self {
            listen_addr,
            data_dir: env_or("DATA_DIR", "/data/pixio"),
            jwt_secret,
            razorpay_key_id,
            razorpay_key_secret,
            razorpay_api_url: env_or("RAZORPAY_API_URL", DEFAULT_RAZORPAY_API_URL),
            clipdrop_api_key,
            clipdrop_api_url: env_or("CLIPDROP_API_URL", DEFAULT_CLIPDROP_API_URL),
            mail_api_url: std::env::var("MAIL_API_URL").ok(),
            mail_api_key: std::env::var("MAIL_API_KEY").ok(),
            mail_from: env_or("MAIL_FROM", "no-reply@pixio.app"),
            cors_origins: parse_origins(&env_or("CORS_ORIGINS", "*")),
            frontend_url,
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(10 * 1024 * 1024), // 10MB
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS").unwrap_or(120),
            provider_timeout_seconds: env_parse("PROVIDER_TIMEOUT_SECONDS").unwrap_or(60),
            gateway_timeout_seconds: env_parse("GATEWAY_TIMEOUT_SECONDS").unwrap_or(15),
            signup_credits: env_parse("SIGNUP_CREDITS").unwrap_or(DEFAULT_SIGNUP_CREDITS),
            purchase_policy: PurchasePolicy {
                max_settled_per_day: parse_daily_limit(std::env::var("PURCHASE_DAILY_LIMIT").ok()),
                credit_override: parse_credit_override(
                    std::env::var("PURCHASE_CREDIT_OVERRIDE").ok(),
                )?,
            },
        })
    }
}

/// Split a comma-separated origin list.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// `0` or `none` disables the daily cap; unset keeps the default.
fn parse_daily_limit(raw: Option<String>) -> Option<u32> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Some(DEFAULT_MAX_SETTLED_PER_DAY),
        Some("none" | "0") => None,
        Some(value) => value.parse().ok().or(Some(DEFAULT_MAX_SETTLED_PER_DAY)),
    }
}

/// An override must be a positive credit amount; unset means none.
fn parse_credit_override(raw: Option<String>) -> Result<Option<i64>, PixioError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<i64>()
            .ok()
            .filter(|credits| *credits > 0)
            .map(Some)
            .ok_or_else(|| {
                PixioError::Configuration(format!(
                    "PURCHASE_CREDIT_OVERRIDE must be a positive integer, got {value:?}"
                ))
            }),
    }
}

/// Load Razorpay secrets from file or environment.
fn load_razorpay_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [".secrets/razorpay.json", "../.secrets/razorpay.json"];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<RazorpaySecrets>(path) {
            tracing::info!(path = %path, "Loaded Razorpay secrets from file");
            return (Some(secrets.key_id), Some(secrets.key_secret));
        }
    }

    tracing::debug!("Razorpay secrets file not found, using environment variables");
    (
        std::env::var("RAZORPAY_KEY_ID").ok(),
        std::env::var("RAZORPAY_KEY_SECRET").ok(),
    )
}

/// Load the ClipDrop key from file or environment.
fn load_clipdrop_secrets() -> Option<String> {
    let secret_paths = [".secrets/clipdrop.json", "../.secrets/clipdrop.json"];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<ClipdropSecrets>(path) {
            tracing::info!(path = %path, "Loaded ClipDrop secrets from file");
            return Some(secrets.api_key);
        }
    }

    tracing::debug!("ClipDrop secrets file not found, using environment variables");
    std::env::var("CLIPDROP_API").ok()
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:4000".into(),
            data_dir: "/data/pixio".into(),
            jwt_secret: String::new(),
            razorpay_key_id: None,
            razorpay_key_secret: None,
            razorpay_api_url: DEFAULT_RAZORPAY_API_URL.into(),
            clipdrop_api_key: None,
            clipdrop_api_url: DEFAULT_CLIPDROP_API_URL.into(),
            mail_api_url: None,
            mail_api_key: None,
            mail_from: "no-reply@pixio.app".into(),
            frontend_url: "http://localhost:5173".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 10 * 1024 * 1024,
            request_timeout_seconds: 120,
            provider_timeout_seconds: 60,
            gateway_timeout_seconds: 15,
            signup_credits: DEFAULT_SIGNUP_CREDITS,
            purchase_policy: PurchasePolicy::default(),
        }
    }
}
