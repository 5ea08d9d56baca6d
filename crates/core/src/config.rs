use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub ollama: OllamaConfig,
    pub recommendations: RecommendationsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Outbound LLM endpoint settings. `enabled = false` removes the ranking
/// tier entirely: no probe, no generate call, candidate/fallback logic only.
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub probe_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RecommendationsConfig {
    pub default_limit: usize,
    pub cache_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub ollama_enabled: Option<bool>,
    pub ollama_base_url: Option<String>,
    pub ollama_model: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://verdant.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            ollama: OllamaConfig {
                enabled: true,
                base_url: "http://localhost:11434".to_string(),
                model: "llama3.2".to_string(),
                probe_timeout_secs: 3,
                request_timeout_secs: 15,
            },
            recommendations: RecommendationsConfig { default_limit: 4, cache_ttl_secs: 300 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("verdant.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(ollama) = patch.ollama {
            if let Some(enabled) = ollama.enabled {
                self.ollama.enabled = enabled;
            }
            if let Some(base_url) = ollama.base_url {
                self.ollama.base_url = base_url;
            }
            if let Some(model) = ollama.model {
                self.ollama.model = model;
            }
            if let Some(probe_timeout_secs) = ollama.probe_timeout_secs {
                self.ollama.probe_timeout_secs = probe_timeout_secs;
            }
            if let Some(request_timeout_secs) = ollama.request_timeout_secs {
                self.ollama.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(recommendations) = patch.recommendations {
            if let Some(default_limit) = recommendations.default_limit {
                self.recommendations.default_limit = default_limit;
            }
            if let Some(cache_ttl_secs) = recommendations.cache_ttl_secs {
                self.recommendations.cache_ttl_secs = cache_ttl_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("VERDANT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("VERDANT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("VERDANT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("VERDANT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("VERDANT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("VERDANT_OLLAMA_ENABLED") {
            self.ollama.enabled = parse_bool("VERDANT_OLLAMA_ENABLED", &value)?;
        }
        if let Some(value) = read_env("VERDANT_OLLAMA_BASE_URL") {
            self.ollama.base_url = value;
        }
        if let Some(value) = read_env("VERDANT_OLLAMA_MODEL") {
            self.ollama.model = value;
        }
        if let Some(value) = read_env("VERDANT_OLLAMA_PROBE_TIMEOUT_SECS") {
            self.ollama.probe_timeout_secs =
                parse_u64("VERDANT_OLLAMA_PROBE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("VERDANT_OLLAMA_REQUEST_TIMEOUT_SECS") {
            self.ollama.request_timeout_secs =
                parse_u64("VERDANT_OLLAMA_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("VERDANT_RECOMMENDATIONS_DEFAULT_LIMIT") {
            self.recommendations.default_limit =
                parse_u32("VERDANT_RECOMMENDATIONS_DEFAULT_LIMIT", &value)? as usize;
        }
        if let Some(value) = read_env("VERDANT_RECOMMENDATIONS_CACHE_TTL_SECS") {
            self.recommendations.cache_ttl_secs =
                parse_u64("VERDANT_RECOMMENDATIONS_CACHE_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("VERDANT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("VERDANT_SERVER_PORT") {
            self.server.port = parse_u16("VERDANT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("VERDANT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("VERDANT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("VERDANT_LOGGING_LEVEL").or_else(|| read_env("VERDANT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("VERDANT_LOGGING_FORMAT").or_else(|| read_env("VERDANT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(enabled) = overrides.ollama_enabled {
            self.ollama.enabled = enabled;
        }
        if let Some(base_url) = overrides.ollama_base_url {
            self.ollama.base_url = base_url;
        }
        if let Some(model) = overrides.ollama_model {
            self.ollama.model = model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_ollama(&self.ollama)?;
        validate_recommendations(&self.recommendations)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("verdant.toml"), PathBuf::from("config/verdant.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_ollama(ollama: &OllamaConfig) -> Result<(), ConfigError> {
    if !ollama.enabled {
        return Ok(());
    }

    if !ollama.base_url.starts_with("http://") && !ollama.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "ollama.base_url must start with http:// or https://".to_string(),
        ));
    }

    if ollama.model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "ollama.model is required when ollama.enabled is true".to_string(),
        ));
    }

    if ollama.probe_timeout_secs == 0 || ollama.probe_timeout_secs > 60 {
        return Err(ConfigError::Validation(
            "ollama.probe_timeout_secs must be in range 1..=60".to_string(),
        ));
    }

    if ollama.request_timeout_secs == 0 || ollama.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "ollama.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_recommendations(
    recommendations: &RecommendationsConfig,
) -> Result<(), ConfigError> {
    if recommendations.default_limit == 0 || recommendations.default_limit > 50 {
        return Err(ConfigError::Validation(
            "recommendations.default_limit must be in range 1..=50".to_string(),
        ));
    }

    if recommendations.cache_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "recommendations.cache_ttl_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    ollama: Option<OllamaPatch>,
    recommendations: Option<RecommendationsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct OllamaPatch {
    enabled: Option<bool>,
    base_url: Option<String>,
    model: Option<String>,
    probe_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommendationsPatch {
    default_limit: Option<usize>,
    cache_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
