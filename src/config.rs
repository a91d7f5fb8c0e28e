/*
 * Responsibility
 * - 環境変数や設定の読み込み (DATABASE_URL, 鍵, キャッシュ TTL, 認可ルールなど)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use crate::services::auth::policy::{AuthorizationPolicy, AuthorizationRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Where the active signing key comes from.
#[derive(Clone)]
pub enum SigningKeyConfig {
    Hs256 { secret: String },
    Ed25519 { private_key_pem: String, public_key_pem: String },
}

impl fmt::Debug for SigningKeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        match self {
            SigningKeyConfig::Hs256 { .. } => f.write_str("Hs256"),
            SigningKeyConfig::Ed25519 { .. } => f.write_str("Ed25519"),
        }
    }
}

#[derive(Clone)]
pub struct AuthConfig {
    pub issuer: Option<String>,
    pub signing_kid: String,
    pub signing_key: SigningKeyConfig,
    // Retired keys still accepted for verification: (kid, secret) / (kid, public pem)
    pub verification_secrets: Vec<(String, String)>,
    pub verification_public_keys: Vec<(String, String)>,

    pub clock_skew: Duration,
    pub identity_cache_ttl: Duration,
    pub resolver_timeout: Duration,
    pub call_timeout: Duration,

    pub public_operations: Vec<String>,
    pub rules: Vec<AuthorizationRule>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let retired: Vec<&str> = self
            .verification_secrets
            .iter()
            .chain(&self.verification_public_keys)
            .map(|(kid, _)| kid.as_str())
            .collect();
        f.debug_struct("AuthConfig")
            .field("issuer", &self.issuer)
            .field("signing_kid", &self.signing_kid)
            .field("signing_key", &self.signing_key)
            .field("retired_kids", &retired)
            .field("clock_skew", &self.clock_skew)
            .field("identity_cache_ttl", &self.identity_cache_ttl)
            .field("resolver_timeout", &self.resolver_timeout)
            .field("call_timeout", &self.call_timeout)
            .field("public_operations", &self.public_operations)
            .field("rules", &self.rules.len())
            .finish()
    }
}

#[derive(Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub app_env: AppEnv,
    pub auth: AuthConfig,
}

const CLOCK_SKEW_SECONDS: RangeInclusive<u64> = 0..=3_600;
const IDENTITY_CACHE_TTL_SECONDS: RangeInclusive<u64> = 0..=86_400;
const IDENTITY_RESOLVER_TIMEOUT_MS: RangeInclusive<u64> = 1..=60_000;
const CALL_TIMEOUT_SECONDS: RangeInclusive<u64> = 1..=86_400;

fn parse_bounded(
    key: &'static str,
    raw: Option<&str>,
    default: u64,
    range: RangeInclusive<u64>,
) -> Result<u64, ConfigError> {
    let value = match raw {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key))?,
        None => default,
    };
    if !range.contains(&value) {
        return Err(ConfigError::Invalid(key));
    }
    Ok(value)
}

fn env_bounded(
    key: &'static str,
    default: u64,
    range: RangeInclusive<u64>,
) -> Result<u64, ConfigError> {
    parse_bounded(key, std::env::var(key).ok().as_deref(), default, range)
}

/// `kid:value` entries joined by `separator`.
fn parse_keyed(
    key: &'static str,
    raw: &str,
    separator: char,
) -> Result<Vec<(String, String)>, ConfigError> {
    raw.split(separator)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((kid, value)) if !kid.trim().is_empty() && !value.trim().is_empty() => {
                Ok((kid.trim().to_string(), value.trim().replace("\\n", "\n")))
            }
            _ => Err(ConfigError::Invalid(key)),
        })
        .collect()
}

fn csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let app_env = AppEnv::from_env();
        let auth = AuthConfig::from_env()?;

        Ok(Self {
            addr,
            database_url,
            app_env,
            auth,
        })
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let issuer = std::env::var("AUTH_ISSUER")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let signing_kid =
            std::env::var("AUTH_SIGNING_KEY_ID").unwrap_or_else(|_| "default".to_string());

        let signing_key = match (
            std::env::var("AUTH_SIGNING_SECRET"),
            std::env::var("AUTH_SIGNING_KEY_PEM"),
        ) {
            (Ok(secret), _) if !secret.is_empty() => SigningKeyConfig::Hs256 { secret },
            (_, Ok(private_pem)) => {
                let public_pem = std::env::var("AUTH_VERIFYING_KEY_PEM")
                    .map_err(|_| ConfigError::Missing("AUTH_VERIFYING_KEY_PEM"))?;
                SigningKeyConfig::Ed25519 {
                    private_key_pem: private_pem.replace("\\n", "\n"),
                    public_key_pem: public_pem.replace("\\n", "\n"),
                }
            }
            _ => return Err(ConfigError::Missing("AUTH_SIGNING_SECRET")),
        };

        let verification_secrets = parse_keyed(
            "AUTH_VERIFICATION_SECRETS",
            &std::env::var("AUTH_VERIFICATION_SECRETS").unwrap_or_default(),
            ',',
        )?;
        // PEM bodies contain no ';'
        let verification_public_keys = parse_keyed(
            "AUTH_VERIFICATION_KEYS_PEM",
            &std::env::var("AUTH_VERIFICATION_KEYS_PEM").unwrap_or_default(),
            ';',
        )?;

        let clock_skew =
            Duration::from_secs(env_bounded("CLOCK_SKEW_SECONDS", 0, CLOCK_SKEW_SECONDS)?);
        let identity_cache_ttl = Duration::from_secs(env_bounded(
            "IDENTITY_CACHE_TTL_SECONDS",
            60,
            IDENTITY_CACHE_TTL_SECONDS,
        )?);
        let resolver_timeout = Duration::from_millis(env_bounded(
            "IDENTITY_RESOLVER_TIMEOUT_MS",
            2_000,
            IDENTITY_RESOLVER_TIMEOUT_MS,
        )?);
        let call_timeout =
            Duration::from_secs(env_bounded("CALL_TIMEOUT_SECONDS", 30, CALL_TIMEOUT_SECONDS)?);

        let defaults = AuthorizationPolicy::fleet_default();

        let public_operations = match std::env::var("AUTH_PUBLIC_OPERATIONS") {
            Ok(v) => csv(&v),
            Err(_) => ["Login", "Register", "ValidateToken"].map(String::from).to_vec(),
        };

        let rules = match std::env::var("AUTH_OPERATION_RULES") {
            Ok(v) => AuthorizationPolicy::parse_rules(&v)
                .map_err(|_| ConfigError::Invalid("AUTH_OPERATION_RULES"))?,
            Err(_) => defaults.rules().cloned().collect(),
        };

        Ok(Self {
            issuer,
            signing_kid,
            signing_key,
            verification_secrets,
            verification_public_keys,
            clock_skew,
            identity_cache_ttl,
            resolver_timeout,
            call_timeout,
            public_operations,
            rules,
        })
    }
}
