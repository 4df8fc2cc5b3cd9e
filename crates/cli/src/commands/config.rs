use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dicta_core::config::{AppConfig, LoadOptions, LogFormat};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let fields: Vec<(&str, String, &[&str])> = vec![
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            &["DICTA_SERVER_BIND_ADDRESS"],
        ),
        ("server.port", config.server.port.to_string(), &["DICTA_SERVER_PORT"]),
        ("database.url", config.database.url.clone(), &["DICTA_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["DICTA_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.busy_timeout_secs",
            config.database.busy_timeout_secs.to_string(),
            &["DICTA_DATABASE_BUSY_TIMEOUT_SECS"],
        ),
        ("llm.base_url", config.llm.base_url.clone(), &["DICTA_LLM_BASE_URL"]),
        ("llm.chat_model", config.llm.chat_model.clone(), &["DICTA_LLM_CHAT_MODEL"]),
        ("llm.classify_model", config.llm.classify_model.clone(), &["DICTA_LLM_CLASSIFY_MODEL"]),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string(), &["DICTA_LLM_TIMEOUT_SECS"]),
        ("llm.max_retries", config.llm.max_retries.to_string(), &["DICTA_LLM_MAX_RETRIES"]),
        ("flows.n8n_base_url", config.flows.n8n_base_url.clone(), &["DICTA_FLOWS_N8N_BASE_URL"]),
        (
            "flows.webhook_timeout_secs",
            config.flows.webhook_timeout_secs.to_string(),
            &["DICTA_FLOWS_WEBHOOK_TIMEOUT_SECS"],
        ),
        ("flows.max_retries", config.flows.max_retries.to_string(), &["DICTA_FLOWS_MAX_RETRIES"]),
        ("speech.stt_base_url", config.speech.stt_base_url.clone(), &["DICTA_SPEECH_STT_BASE_URL"]),
        ("speech.tts_base_url", config.speech.tts_base_url.clone(), &["DICTA_SPEECH_TTS_BASE_URL"]),
        (
            "health.probe_timeout_secs",
            config.health.probe_timeout_secs.to_string(),
            &["DICTA_HEALTH_PROBE_TIMEOUT_SECS"],
        ),
        (
            "health.slow_threshold_secs",
            config.health.slow_threshold_secs.to_string(),
            &["DICTA_HEALTH_SLOW_THRESHOLD_SECS"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["DICTA_LOGGING_LEVEL", "DICTA_LOG_LEVEL"],
        ),
        (
            "logging.format",
            log_format_name(config.logging.format).to_string(),
            &["DICTA_LOGGING_FORMAT", "DICTA_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in fields {
        lines.push(render_line(
            key,
            &value,
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref()),
        ));
    }

    lines.join("\n")
}

fn log_format_name(format: LogFormat) -> &'static str {
    match format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    }
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("dicta.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/dicta.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    for env_key in env_keys {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
