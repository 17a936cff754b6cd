use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub payments: PaymentsConfig,
    pub site: SiteConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    /// Process-local maps; data is lost on restart.
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    #[serde(default)]
    pub cookie_secure: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_tolerance")]
    pub signature_tolerance_seconds: i64,
}

fn default_api_base() -> String { "https://api.stripe.com".to_string() }
fn default_currency() -> String { "usd".to_string() }
fn default_tolerance() -> i64 { natours_core::webhook::DEFAULT_TOLERANCE_SECONDS }

#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    /// Public origin used for redirect and email links, without trailing slash.
    pub base_url: String,
    pub image_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_from_email")]
    pub from_email: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_smtp_port() -> u16 { 587 }
fn default_from_email() -> String { "hello@natours.io".to_string() }
fn default_from_name() -> String { "Natours".to_string() }

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from_email: default_from_email(),
            from_name: default_from_name(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `NATOURS__PAYMENTS__SECRET_KEY=sk_live_...`
            .add_source(config::Environment::with_prefix("NATOURS").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    const MINIMAL: &str = r#"
        [server]
        port = 3000

        [database]
        url = "postgres://localhost/natours"

        [auth]
        jwt_secret = "secret"
        jwt_expiration_seconds = 7776000

        [payments]
        secret_key = "sk_test_123"
        webhook_secret = "whsec_123"

        [site]
        base_url = "http://127.0.0.1:3000"
        image_base_url = "http://127.0.0.1:3000/img/tours"
    "#;

    fn parse(contents: &str) -> Config {
        config::Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let config = parse(MINIMAL);
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.payments.api_base, "https://api.stripe.com");
        assert_eq!(config.payments.currency, "usd");
        assert_eq!(config.payments.signature_tolerance_seconds, 300);
        assert!(!config.mail.enabled);
        assert_eq!(config.mail.smtp_port, 587);
    }

    #[test]
    fn test_memory_backend() {
        let config = parse(&format!("{}\n[storage]\nbackend = \"memory\"\n", MINIMAL));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }
}
