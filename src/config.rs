use std::env;
use std::time::Duration;

pub const DEFAULT_API_VERSION: &str = "2023-06-01-preview";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";
pub const DEFAULT_IMAGE_QUALITY: &str = "standard";

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub api_version: String,
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub image_size: String,
    pub image_quality: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_file: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub generator: GeneratorConfig,
    pub server: ServerConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            endpoint: None,
            api_key: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            image_size: DEFAULT_IMAGE_SIZE.to_string(),
            image_quality: DEFAULT_IMAGE_QUALITY.to_string(),
        }
    }
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();

        GeneratorConfig {
            endpoint: env::var("AZURE_ENDPOINT").ok(),
            api_key: env::var("AZURE_API_KEY").ok(),
            api_version: env::var("AZURE_API_VERSION").unwrap_or(defaults.api_version),
            timeout_secs: env::var("GENERATION_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            poll_interval_secs: env::var("POLL_INTERVAL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.poll_interval_secs),
            request_timeout_secs: defaults.request_timeout_secs,
            image_size: env::var("IMAGE_SIZE").unwrap_or(defaults.image_size),
            image_quality: env::var("IMAGE_QUALITY").unwrap_or(defaults.image_quality),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_credentials(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_timeouts(mut self, timeout_secs: u64, poll_interval_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self.poll_interval_secs = poll_interval_secs;
        self
    }

    pub fn with_image_options(
        mut self,
        size: impl Into<String>,
        quality: impl Into<String>,
    ) -> Self {
        self.image_size = size.into();
        self.image_quality = quality.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 5000,
            log_file: "logs/image_generator.log".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();

        ServerConfig {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(defaults.port),
            log_file: env::var("LOG_FILE").unwrap_or(defaults.log_file),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        Config {
            generator: GeneratorConfig::from_env(),
            server: ServerConfig::from_env(),
        }
    }

    pub fn with_generator(mut self, config: GeneratorConfig) -> Self {
        self.generator = config;
        self
    }

    pub fn with_server(mut self, config: ServerConfig) -> Self {
        self.server = config;
        self
    }
}
