use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Effective application configuration.
///
/// Layering, lowest to highest precedence: built-in defaults, an optional
/// TOML file (`dicta.toml` or `config/dicta.toml`), `DICTA_*` environment
/// variables, programmatic [`ConfigOverrides`]. Components receive the
/// values they need at construction; nothing reads the environment after
/// load.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub flows: FlowsConfig,
    pub speech: SpeechConfig,
    pub health: HealthConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub chat_model: String,
    pub classify_model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct FlowsConfig {
    pub n8n_base_url: String,
    pub webhook_timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct SpeechConfig {
    pub stt_base_url: String,
    pub tts_base_url: String,
}

#[derive(Clone, Debug)]
pub struct HealthConfig {
    pub probe_timeout_secs: u64,
    pub slow_threshold_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
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
    pub llm_base_url: Option<String>,
    pub n8n_base_url: Option<String>,
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
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8000 },
            database: DatabaseConfig {
                url: "sqlite://dicta.db".to_string(),
                max_connections: 5,
                busy_timeout_secs: 30,
            },
            llm: LlmConfig {
                base_url: "http://ollama:11434".to_string(),
                chat_model: "llama3:8b-instruct-q4_K_M".to_string(),
                classify_model: "qwen3:8b".to_string(),
                timeout_secs: 120,
                max_retries: 2,
            },
            flows: FlowsConfig {
                n8n_base_url: "http://n8n:5678".to_string(),
                webhook_timeout_secs: 60,
                max_retries: 2,
            },
            speech: SpeechConfig {
                stt_base_url: "http://stt:8001".to_string(),
                tts_base_url: "http://tts:8002".to_string(),
            },
            health: HealthConfig { probe_timeout_secs: 5, slow_threshold_secs: 3 },
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("dicta.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(busy_timeout_secs) = database.busy_timeout_secs {
                self.database.busy_timeout_secs = busy_timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(chat_model) = llm.chat_model {
                self.llm.chat_model = chat_model;
            }
            if let Some(classify_model) = llm.classify_model {
                self.llm.classify_model = classify_model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(flows) = patch.flows {
            if let Some(n8n_base_url) = flows.n8n_base_url {
                self.flows.n8n_base_url = n8n_base_url;
            }
            if let Some(webhook_timeout_secs) = flows.webhook_timeout_secs {
                self.flows.webhook_timeout_secs = webhook_timeout_secs;
            }
            if let Some(max_retries) = flows.max_retries {
                self.flows.max_retries = max_retries;
            }
        }

        if let Some(speech) = patch.speech {
            if let Some(stt_base_url) = speech.stt_base_url {
                self.speech.stt_base_url = stt_base_url;
            }
            if let Some(tts_base_url) = speech.tts_base_url {
                self.speech.tts_base_url = tts_base_url;
            }
        }

        if let Some(health) = patch.health {
            if let Some(probe_timeout_secs) = health.probe_timeout_secs {
                self.health.probe_timeout_secs = probe_timeout_secs;
            }
            if let Some(slow_threshold_secs) = health.slow_threshold_secs {
                self.health.slow_threshold_secs = slow_threshold_secs;
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
        if let Some(value) = read_env("DICTA_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("DICTA_SERVER_PORT") {
            self.server.port = parse_u16("DICTA_SERVER_PORT", &value)?;
        }

        if let Some(value) = read_env("DICTA_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("DICTA_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("DICTA_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("DICTA_DATABASE_BUSY_TIMEOUT_SECS") {
            self.database.busy_timeout_secs =
                parse_u64("DICTA_DATABASE_BUSY_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DICTA_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("DICTA_LLM_CHAT_MODEL") {
            self.llm.chat_model = value;
        }
        if let Some(value) = read_env("DICTA_LLM_CLASSIFY_MODEL") {
            self.llm.classify_model = value;
        }
        if let Some(value) = read_env("DICTA_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("DICTA_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("DICTA_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("DICTA_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("DICTA_FLOWS_N8N_BASE_URL") {
            self.flows.n8n_base_url = value;
        }
        if let Some(value) = read_env("DICTA_FLOWS_WEBHOOK_TIMEOUT_SECS") {
            self.flows.webhook_timeout_secs =
                parse_u64("DICTA_FLOWS_WEBHOOK_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("DICTA_FLOWS_MAX_RETRIES") {
            self.flows.max_retries = parse_u32("DICTA_FLOWS_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("DICTA_SPEECH_STT_BASE_URL") {
            self.speech.stt_base_url = value;
        }
        if let Some(value) = read_env("DICTA_SPEECH_TTS_BASE_URL") {
            self.speech.tts_base_url = value;
        }

        if let Some(value) = read_env("DICTA_HEALTH_PROBE_TIMEOUT_SECS") {
            self.health.probe_timeout_secs =
                parse_u64("DICTA_HEALTH_PROBE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("DICTA_HEALTH_SLOW_THRESHOLD_SECS") {
            self.health.slow_threshold_secs =
                parse_u64("DICTA_HEALTH_SLOW_THRESHOLD_SECS", &value)?;
        }

        let log_level = read_env("DICTA_LOGGING_LEVEL").or_else(|| read_env("DICTA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("DICTA_LOGGING_FORMAT").or_else(|| read_env("DICTA_LOG_FORMAT"));
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
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(n8n_base_url) = overrides.n8n_base_url {
            self.flows.n8n_base_url = n8n_base_url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_flows(&self.flows)?;
        validate_speech(&self.speech)?;
        validate_health(&self.health)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("dicta.toml"), PathBuf::from("config/dicta.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    toml::from_str::<ConfigPatch>(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be greater than zero".to_string(),
        ));
    }

    Ok(())
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

    if database.busy_timeout_secs == 0 || database.busy_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.busy_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    validate_http_url("llm.base_url", &llm.base_url)?;

    if llm.chat_model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.chat_model must not be empty".to_string()));
    }
    if llm.classify_model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.classify_model must not be empty".to_string()));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    Ok(())
}

fn validate_flows(flows: &FlowsConfig) -> Result<(), ConfigError> {
    validate_http_url("flows.n8n_base_url", &flows.n8n_base_url)?;

    if flows.webhook_timeout_secs == 0 || flows.webhook_timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "flows.webhook_timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    Ok(())
}

fn validate_speech(speech: &SpeechConfig) -> Result<(), ConfigError> {
    validate_http_url("speech.stt_base_url", &speech.stt_base_url)?;
    validate_http_url("speech.tts_base_url", &speech.tts_base_url)?;
    Ok(())
}

fn validate_health(health: &HealthConfig) -> Result<(), ConfigError> {
    if health.probe_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "health.probe_timeout_secs must be greater than zero".to_string(),
        ));
    }

    if health.slow_threshold_secs == 0 || health.slow_threshold_secs >= health.probe_timeout_secs {
        return Err(ConfigError::Validation(
            "health.slow_threshold_secs must be nonzero and below health.probe_timeout_secs"
                .to_string(),
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

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let url = value.trim();
    if url.is_empty() {
        return Err(ConfigError::Validation(format!("{key} must not be empty")));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{key} must start with http:// or https://"
        )));
    }
    Ok(())
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

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    flows: Option<FlowsPatch>,
    speech: Option<SpeechPatch>,
    health: Option<HealthPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    busy_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    base_url: Option<String>,
    chat_model: Option<String>,
    classify_model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct FlowsPatch {
    n8n_base_url: Option<String>,
    webhook_timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct SpeechPatch {
    stt_base_url: Option<String>,
    tts_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HealthPatch {
    probe_timeout_secs: Option<u64>,
    slow_threshold_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
