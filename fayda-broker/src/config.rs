//! Broker configuration

use std::path::PathBuf;
use std::time::Duration;

use fayda_core::ExtractionLayout;

/// Card-order portal entry page
pub const DEFAULT_PORTAL_URL: &str = "https://card-order.fayda.et/home";

#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// Development mode: visible browser and error details in responses
    pub development: bool,

    pub portal: PortalConfig,

    pub sessions: SessionConfig,

    pub delivery: DeliveryConfig,

    /// Optional JSON file overriding the built-in extraction layout
    pub layout_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub url: String,
    pub headless: bool,
    /// Page load / navigation timeout
    pub navigation_timeout: Duration,
    /// How long to wait for the challenge screen or direct access after
    /// submitting the FAN
    pub challenge_timeout: Duration,
    /// Budget for each completion-detection tier after submitting the code
    pub result_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub max_attempts: u32,
    /// Delay before retry `n` is `base_delay * n`
    pub base_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            development: false,
            portal: PortalConfig::default(),
            sessions: SessionConfig::default(),
            delivery: DeliveryConfig::default(),
            layout_file: None,
        }
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PORTAL_URL.to_string(),
            headless: true,
            navigation_timeout: Duration::from_secs(60),
            challenge_timeout: Duration::from_secs(15),
            result_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(120),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Build config from environment variables, falling back to defaults
    ///
    /// - PORT
    /// - APP_ENV (`development` enables development mode)
    /// - PORTAL_URL, BROWSER_HEADLESS, PORTAL_TIMEOUT_SECS
    /// - SESSION_TTL_SECS, SESSION_SWEEP_SECS
    /// - DELIVERY_MAX_ATTEMPTS, DELIVERY_BASE_DELAY_MS, DELIVERY_TIMEOUT_SECS
    /// - FAYDA_LAYOUT_FILE
    pub fn from_env() -> Self {
        fn get_env(key: &str) -> Option<String> {
            std::env::var(key).ok().filter(|s| !s.is_empty())
        }

        fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
            get_env(key).and_then(|s| s.parse().ok())
        }

        let defaults = Self::default();
        let development = get_env("APP_ENV").as_deref() == Some("development");

        let portal = PortalConfig {
            url: get_env("PORTAL_URL").unwrap_or(defaults.portal.url),
            headless: parse_env("BROWSER_HEADLESS").unwrap_or(!development),
            navigation_timeout: parse_env("PORTAL_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.portal.navigation_timeout),
            ..defaults.portal
        };

        let sessions = SessionConfig {
            ttl: parse_env("SESSION_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sessions.ttl),
            sweep_interval: parse_env("SESSION_SWEEP_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sessions.sweep_interval),
        };

        let delivery = DeliveryConfig {
            max_attempts: parse_env("DELIVERY_MAX_ATTEMPTS").unwrap_or(defaults.delivery.max_attempts),
            base_delay: parse_env("DELIVERY_BASE_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.delivery.base_delay),
            request_timeout: parse_env("DELIVERY_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.delivery.request_timeout),
        };

        Self {
            port: parse_env("PORT").unwrap_or(defaults.port),
            development,
            portal,
            sessions,
            delivery,
            layout_file: get_env("FAYDA_LAYOUT_FILE").map(PathBuf::from),
        }
    }

    /// The extraction layout to use: the configured file if any, else v1
    pub fn extraction_layout(&self) -> fayda_core::Result<ExtractionLayout> {
        match &self.layout_file {
            Some(path) => ExtractionLayout::from_file(path),
            None => Ok(ExtractionLayout::v1()),
        }
    }
}
