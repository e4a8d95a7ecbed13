use crate::error::{to_env_var, ConfigError};
use areachat::formatter::DEFAULT_DESCRIPTION_CHARS;
use areachat::functions::{DispatchLimits, DEFAULT_LIMIT, MAX_RESULTS};
use areachat::gateway::GatewayConfig;
use areachat::providers::configs::{OpenAiProviderConfig, OPENAI_HOST, OPENAI_MODEL};
use areachat::store::PostgresAreaStoreConfig;
use config::{Config, Environment};
use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_openai_host")]
    pub host: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<i32>,
}

impl ProviderSettings {
    pub fn into_config(self) -> OpenAiProviderConfig {
        OpenAiProviderConfig {
            host: self.host,
            api_key: self.api_key,
            model: self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub url: String,
}

impl DatabaseSettings {
    pub fn into_config(self) -> PostgresAreaStoreConfig {
        PostgresAreaStoreConfig::new(self.url)
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatSettings {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_description_chars")]
    pub description_chars: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            default_limit: default_limit(),
            description_chars: default_description_chars(),
        }
    }
}

impl ChatSettings {
    pub fn gateway_config(&self) -> GatewayConfig {
        let max_results = self.max_results.max(1);
        GatewayConfig {
            limits: DispatchLimits {
                default_limit: self.default_limit.clamp(1, max_results),
                max_results,
            },
            description_chars: self.description_chars,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub chat: ChatSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("provider.host", default_openai_host())?
            .set_default("provider.model", default_model())?
            .set_default("database.url", "")?
            .add_source(
                Environment::with_prefix("AREACHAT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Self = match config.try_deserialize() {
            Ok(settings) => settings,
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);
                let error_str = err.to_string();
                if let Some(field) = error_str
                    .strip_prefix("missing field `")
                    .and_then(|rest| rest.split('`').next())
                {
                    return Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    });
                }
                if let config::ConfigError::NotFound(field) = &err {
                    return Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    });
                }
                return Err(ConfigError::Other(err));
            }
        };

        for (key, value) in [
            ("provider.api_key", &settings.provider.api_key),
            ("database.url", &settings.database.url),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingEnvVar {
                    env_var: to_env_var(key),
                });
            }
        }

        Ok(settings)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_model() -> String {
    OPENAI_MODEL.to_string()
}

fn default_openai_host() -> String {
    OPENAI_HOST.to_string()
}

fn default_max_results() -> usize {
    MAX_RESULTS
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_description_chars() -> usize {
    DEFAULT_DESCRIPTION_CHARS
}
