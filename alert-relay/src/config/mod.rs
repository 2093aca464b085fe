//! Gateway configuration loaded from the environment.
//!
//! Every value has a default. Values that fail to parse fall back to the
//! default with a warning instead of aborting startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use tracing::{error, warn};

use crate::clients::{sms, telegram};
use crate::routing::RoutingSource;

/// Deployment environment. Staging exposes the probe routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Staging,
    Production,
}

/// How telegram messages are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelegramMode {
    /// Stateless `sendMessage` calls, long messages chunked.
    Api,
    /// Long-lived bot client with the silence button.
    Bot,
}

impl TelegramMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "API" => Some(Self::Api),
            "BOT" => Some(Self::Bot),
            _ => None,
        }
    }
}

/// Logging settings. Read separately so the subscriber can be installed
/// before the rest of the configuration is parsed.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            dir: None,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let mut config = Self::default();
        env.string("LOG_LEVEL", &mut config.level);
        if let Some(dir) = env.get("LOG_DIR") {
            config.dir = Some(PathBuf::from(dir));
        }
        config
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoutingConfig {
    pub config_dir: PathBuf,
    pub prometheus_file: String,
    pub splunk_file: String,
    pub reload_interval: Duration,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("configs/"),
            prometheus_file: "alertbot-config.json".to_string(),
            splunk_file: "alertbot-splunk-config.json".to_string(),
            reload_interval: Duration::from_secs(60),
        }
    }
}

impl RoutingConfig {
    pub fn source(&self) -> RoutingSource {
        RoutingSource {
            prometheus_path: self.config_dir.join(&self.prometheus_file),
            splunk_path: self.config_dir.join(&self.splunk_file),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub active: bool,
    /// `None` when the configured mode is not recognised; telegram is then off.
    pub mode: Option<TelegramMode>,
    pub bot_token: String,
    pub api_base_url: String,
    pub send_retries: u32,
    pub retry_delay: Duration,
    pub enable_polling: bool,
    /// Chat used by the staging probe route.
    pub test_group: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            active: true,
            mode: Some(TelegramMode::Api),
            bot_token: String::new(),
            api_base_url: telegram::DEFAULT_API_BASE_URL.to_string(),
            send_retries: 3,
            retry_delay: Duration::from_secs(5),
            enable_polling: true,
            test_group: String::new(),
        }
    }
}

impl TelegramConfig {
    /// Active mode, if telegram is enabled at all.
    pub fn enabled_mode(&self) -> Option<TelegramMode> {
        if self.active { self.mode } else { None }
    }
}

#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub active: bool,
    pub api_key: String,
    pub api_base_url: String,
    pub send_retries: u32,
    pub retry_delay: Duration,
    pub default_sender: String,
    /// Real messages per alert group before the suppression notice.
    pub message_cap: usize,
    /// Recipients of the staging probe route.
    pub test_numbers: Vec<String>,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            active: true,
            api_key: String::new(),
            api_base_url: sms::DEFAULT_API_BASE_URL.to_string(),
            send_retries: 3,
            retry_delay: Duration::from_secs(1),
            default_sender: "100008700".to_string(),
            message_cap: 2,
            test_numbers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub url: String,
    pub route: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8001".to_string(),
            route: "/api/numbers".to_string(),
        }
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub log: LogConfig,
    pub environment: Environment,
    /// Zone used to display SMS timestamps.
    pub timezone: Tz,
    pub splunk_public_host: String,
    pub server: ServerConfig,
    pub routing: RoutingConfig,
    pub telegram: TelegramConfig,
    pub sms: SmsConfig,
    pub directory: DirectoryConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            environment: Environment::Staging,
            timezone: chrono_tz::Asia::Tehran,
            splunk_public_host: "fsplunk.company.com".to_string(),
            server: ServerConfig::default(),
            routing: RoutingConfig::default(),
            telegram: TelegramConfig::default(),
            sms: SmsConfig::default(),
            directory: DirectoryConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load from process environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let mut config = Self {
            log: LogConfig::from_lookup(&env.0),
            ..Self::default()
        };

        if let Some(environment) = env.get("ENVIRONMENT") {
            config.environment = if environment.trim().eq_ignore_ascii_case("STAGING") {
                Environment::Staging
            } else {
                Environment::Production
            };
        }
        if let Some(tz) = env.get("TZ") {
            match tz.trim().parse::<Tz>() {
                Ok(parsed) => config.timezone = parsed,
                Err(e) => {
                    warn!(value = %tz, error = %e, "Unknown TZ, using UTC");
                    config.timezone = Tz::UTC;
                }
            }
        }
        env.string("SPLUNK_PUBLIC_HOST", &mut config.splunk_public_host);

        env.string("API_BIND_ADDRESS", &mut config.server.bind_address);
        env.parse("API_PORT", &mut config.server.port);

        let routing = &mut config.routing;
        if let Some(dir) = env.get("CONFIG_DIR") {
            routing.config_dir = PathBuf::from(dir);
        }
        env.string("CONFIG_JSON_FILE", &mut routing.prometheus_file);
        env.string("CONFIG_SPLUNK_JSON_FILE", &mut routing.splunk_file);
        env.nonzero_seconds("CONFIG_RELOADER_INTERVAL", &mut routing.reload_interval);

        let tg = &mut config.telegram;
        env.flag("ACTIVE_TELEGRAM", &mut tg.active);
        if let Some(mode) = env.get("TELEGRAM_MODE") {
            tg.mode = TelegramMode::parse(&mode);
            if tg.mode.is_none() {
                error!(value = %mode, "TELEGRAM_MODE must be API or BOT, telegram is disabled");
            }
        }
        env.string("TG_BOT_TOKEN", &mut tg.bot_token);
        env.string("TG_API_BASE_URL", &mut tg.api_base_url);
        env.parse("TG_SEND_RETRIES", &mut tg.send_retries);
        env.seconds("TG_SEND_RETRY_DELAY", &mut tg.retry_delay);
        env.flag("ENABLE_POLLING", &mut tg.enable_polling);
        env.string("TG_GROUP_TEST", &mut tg.test_group);

        let sms = &mut config.sms;
        env.flag("ACTIVE_SMS", &mut sms.active);
        env.string("KAVENEGAR_API_KEY", &mut sms.api_key);
        env.string("SMS_API_BASE_URL", &mut sms.api_base_url);
        env.parse("SMS_SEND_RETRIES", &mut sms.send_retries);
        env.seconds("SMS_SEND_RETRY_DELAY", &mut sms.retry_delay);
        env.string("DEFAULT_SENDER", &mut sms.default_sender);
        env.parse("LIMIT_SMS_NUMBER_PER_ALERT_GROUP", &mut sms.message_cap);
        if let Some(numbers) = env.get("SMS_TEST_NUMBERS") {
            sms.test_numbers = numbers
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect();
        }

        env.string("PHONE_SYNC_API_URL", &mut config.directory.url);
        env.string("PHONE_SYNC_API_ROUTE", &mut config.directory.route);

        config
    }

    pub fn is_staging(&self) -> bool {
        self.environment == Environment::Staging
    }
}

/// Typed accessors over a key lookup. Blank values count as unset.
struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn string(&self, key: &str, target: &mut String) {
        if let Some(value) = self.get(key) {
            *target = value.trim().to_string();
        }
    }

    fn parse<T>(&self, key: &str, target: &mut T)
    where
        T: FromStr + std::fmt::Display,
    {
        if let Some(value) = self.get(key) {
            match value.trim().parse::<T>() {
                Ok(parsed) => *target = parsed,
                Err(_) => warn!(key, value = %value, default = %target, "Invalid value, using default"),
            }
        }
    }

    fn seconds(&self, key: &str, target: &mut Duration) {
        let mut secs = target.as_secs();
        self.parse(key, &mut secs);
        *target = Duration::from_secs(secs);
    }

    /// Like [`Env::seconds`], but zero keeps the default.
    fn nonzero_seconds(&self, key: &str, target: &mut Duration) {
        let default = *target;
        self.seconds(key, target);
        if target.is_zero() {
            warn!(key, default = ?default, "Interval must be positive, using default");
            *target = default;
        }
    }

    /// Enabled when the value contains `true`, case-insensitive.
    fn flag(&self, key: &str, target: &mut bool) {
        if let Some(value) = self.get(key) {
            *target = value.to_lowercase().contains("true");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> GatewayConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]);
        assert_eq!(config.log.level, "INFO");
        assert!(config.log.dir.is_none());
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.timezone, chrono_tz::Asia::Tehran);
        assert!(config.is_staging());
        assert_eq!(config.telegram.enabled_mode(), Some(TelegramMode::Api));
        assert_eq!(config.sms.message_cap, 2);
        assert_eq!(config.telegram.retry_delay, Duration::from_secs(5));
        assert_eq!(
            config.routing.source().prometheus_path,
            PathBuf::from("configs/alertbot-config.json")
        );
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("API_PORT", "9090"),
            ("LOG_DIR", "/var/log/alert-relay"),
            ("ENVIRONMENT", "production"),
            ("TZ", "Europe/Berlin"),
            ("TELEGRAM_MODE", "bot"),
            ("ACTIVE_SMS", "False"),
            ("LIMIT_SMS_NUMBER_PER_ALERT_GROUP", "5"),
            ("CONFIG_DIR", "/etc/alertbot"),
            ("CONFIG_RELOADER_INTERVAL", "15"),
            ("SMS_TEST_NUMBERS", "09120000000, 09130000000,"),
        ]);
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.log.dir, Some(PathBuf::from("/var/log/alert-relay")));
        assert!(!config.is_staging());
        assert_eq!(config.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(config.telegram.enabled_mode(), Some(TelegramMode::Bot));
        assert!(!config.sms.active);
        assert_eq!(config.sms.message_cap, 5);
        assert_eq!(config.routing.reload_interval, Duration::from_secs(15));
        assert_eq!(config.sms.test_numbers, vec!["09120000000", "09130000000"]);
        assert_eq!(
            config.routing.source().splunk_path,
            PathBuf::from("/etc/alertbot/alertbot-splunk-config.json")
        );
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = load(&[
            ("API_PORT", "not-a-port"),
            ("SMS_SEND_RETRIES", "-1"),
            ("TZ", "Mars/Olympus"),
            ("TELEGRAM_MODE", "webhook"),
        ]);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.sms.send_retries, 3);
        assert_eq!(config.timezone, Tz::UTC);
        assert_eq!(config.telegram.enabled_mode(), None);
    }

    #[test]
    fn test_zero_reload_interval_keeps_default() {
        let config = load(&[
            ("CONFIG_RELOADER_INTERVAL", "0"),
            ("SMS_SEND_RETRY_DELAY", "0"),
        ]);
        assert_eq!(config.routing.reload_interval, Duration::from_secs(60));
        // Zero is a valid retry delay.
        assert_eq!(config.sms.retry_delay, Duration::ZERO);
    }

    #[test]
    fn test_inactive_telegram_has_no_mode() {
        let config = load(&[("ACTIVE_TELEGRAM", "no")]);
        assert_eq!(config.telegram.enabled_mode(), None);
    }
}
