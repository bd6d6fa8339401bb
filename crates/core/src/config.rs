use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feedback::FeedbackRules;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub platform: PlatformConfig,
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PlatformConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub api_username: String,
    pub request_timeout_secs: u64,
    pub calls: CallPolicyConfig,
}

/// Retry discipline for every outbound platform call.
#[derive(Clone, Debug)]
pub struct CallPolicyConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub rate_limit_default_secs: u64,
    pub rate_limit_buffer_ms: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RetrievalConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub k: usize,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub poll_interval_secs: u64,
    pub history_window: usize,
    pub max_reply_tokens: u32,
    pub max_intent_tokens: u32,
    pub positive_keywords: Vec<String>,
    pub negative_keywords: Vec<String>,
    pub feedback_max_chars: usize,
}

impl EngineConfig {
    pub fn feedback_rules(&self) -> FeedbackRules {
        FeedbackRules {
            positive_keywords: self.positive_keywords.clone(),
            negative_keywords: self.negative_keywords.clone(),
            max_feedback_chars: self.feedback_max_chars,
        }
    }
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

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub platform_base_url: Option<String>,
    pub platform_api_key: Option<String>,
    pub platform_api_username: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub retrieval_base_url: Option<String>,
    pub log_level: Option<String>,
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
                url: "sqlite://docent.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            platform: PlatformConfig {
                base_url: String::new(),
                api_key: String::new().into(),
                api_username: "docent-bot".to_string(),
                request_timeout_secs: 30,
                calls: CallPolicyConfig {
                    max_retries: 3,
                    base_delay_ms: 500,
                    max_delay_ms: 8_000,
                    rate_limit_default_secs: 10,
                    rate_limit_buffer_ms: 500,
                },
            },
            llm: LlmConfig {
                base_url: "http://localhost:11434/v1".to_string(),
                api_key: None,
                model: "llama3.1".to_string(),
                timeout_secs: 60,
            },
            retrieval: RetrievalConfig {
                base_url: "http://localhost:9300".to_string(),
                timeout_secs: 10,
                k: 4,
            },
            engine: EngineConfig {
                poll_interval_secs: 15,
                history_window: 10,
                max_reply_tokens: 700,
                max_intent_tokens: 8,
                positive_keywords: FeedbackRules::default().positive_keywords,
                negative_keywords: FeedbackRules::default().negative_keywords,
                feedback_max_chars: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("docent.toml"));
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

        if let Some(platform) = patch.platform {
            if let Some(base_url) = platform.base_url {
                self.platform.base_url = base_url;
            }
            if let Some(api_key_value) = platform.api_key {
                self.platform.api_key = secret_value(api_key_value);
            }
            if let Some(api_username) = platform.api_username {
                self.platform.api_username = api_username;
            }
            if let Some(request_timeout_secs) = platform.request_timeout_secs {
                self.platform.request_timeout_secs = request_timeout_secs;
            }
            if let Some(calls) = platform.calls {
                if let Some(max_retries) = calls.max_retries {
                    self.platform.calls.max_retries = max_retries;
                }
                if let Some(base_delay_ms) = calls.base_delay_ms {
                    self.platform.calls.base_delay_ms = base_delay_ms;
                }
                if let Some(max_delay_ms) = calls.max_delay_ms {
                    self.platform.calls.max_delay_ms = max_delay_ms;
                }
                if let Some(rate_limit_default_secs) = calls.rate_limit_default_secs {
                    self.platform.calls.rate_limit_default_secs = rate_limit_default_secs;
                }
                if let Some(rate_limit_buffer_ms) = calls.rate_limit_buffer_ms {
                    self.platform.calls.rate_limit_buffer_ms = rate_limit_buffer_ms;
                }
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key_value));
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(retrieval) = patch.retrieval {
            if let Some(base_url) = retrieval.base_url {
                self.retrieval.base_url = base_url;
            }
            if let Some(timeout_secs) = retrieval.timeout_secs {
                self.retrieval.timeout_secs = timeout_secs;
            }
            if let Some(k) = retrieval.k {
                self.retrieval.k = k;
            }
        }

        if let Some(engine) = patch.engine {
            if let Some(poll_interval_secs) = engine.poll_interval_secs {
                self.engine.poll_interval_secs = poll_interval_secs;
            }
            if let Some(history_window) = engine.history_window {
                self.engine.history_window = history_window;
            }
            if let Some(max_reply_tokens) = engine.max_reply_tokens {
                self.engine.max_reply_tokens = max_reply_tokens;
            }
            if let Some(max_intent_tokens) = engine.max_intent_tokens {
                self.engine.max_intent_tokens = max_intent_tokens;
            }
            if let Some(positive_keywords) = engine.positive_keywords {
                self.engine.positive_keywords = positive_keywords;
            }
            if let Some(negative_keywords) = engine.negative_keywords {
                self.engine.negative_keywords = negative_keywords;
            }
            if let Some(feedback_max_chars) = engine.feedback_max_chars {
                self.engine.feedback_max_chars = feedback_max_chars;
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
        if let Some(value) = read_env("DOCENT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("DOCENT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("DOCENT_DATABASE_MAX_CONNECTIONS", &value)?;
        }

        if let Some(value) = read_env("DOCENT_PLATFORM_BASE_URL") {
            self.platform.base_url = value;
        }
        if let Some(value) = read_env("DOCENT_PLATFORM_API_KEY") {
            self.platform.api_key = secret_value(value);
        }
        if let Some(value) = read_env("DOCENT_PLATFORM_API_USERNAME") {
            self.platform.api_username = value;
        }

        if let Some(value) = read_env("DOCENT_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("DOCENT_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("DOCENT_LLM_MODEL") {
            self.llm.model = value;
        }

        if let Some(value) = read_env("DOCENT_RETRIEVAL_BASE_URL") {
            self.retrieval.base_url = value;
        }
        if let Some(value) = read_env("DOCENT_RETRIEVAL_K") {
            self.retrieval.k = parse_u32("DOCENT_RETRIEVAL_K", &value)? as usize;
        }

        if let Some(value) = read_env("DOCENT_ENGINE_POLL_INTERVAL_SECS") {
            self.engine.poll_interval_secs = parse_u64("DOCENT_ENGINE_POLL_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("DOCENT_LOGGING_LEVEL").or_else(|| read_env("DOCENT_LOG_LEVEL"))
        {
            self.logging.level = value;
        }
        if let Some(value) =
            read_env("DOCENT_LOGGING_FORMAT").or_else(|| read_env("DOCENT_LOG_FORMAT"))
        {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(base_url) = overrides.platform_base_url {
            self.platform.base_url = base_url;
        }
        if let Some(api_key) = overrides.platform_api_key {
            self.platform.api_key = secret_value(api_key);
        }
        if let Some(api_username) = overrides.platform_api_username {
            self.platform.api_username = api_username;
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = base_url;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(base_url) = overrides.retrieval_base_url {
            self.retrieval.base_url = base_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_platform(&self.platform)?;
        validate_llm(&self.llm)?;
        validate_retrieval(&self.retrieval)?;
        validate_engine(&self.engine)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("docent.toml"), PathBuf::from("config/docent.toml")]
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

    Ok(())
}

fn validate_platform(platform: &PlatformConfig) -> Result<(), ConfigError> {
    let base_url = platform.base_url.trim();
    if base_url.is_empty() {
        return Err(ConfigError::Validation(
            "platform.base_url is required (the discussion platform API root)".to_string(),
        ));
    }
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "platform.base_url must be an http(s) URL".to_string(),
        ));
    }

    if platform.api_key.expose_secret().is_empty() {
        return Err(ConfigError::Validation("platform.api_key is required".to_string()));
    }
    if platform.api_username.trim().is_empty() {
        return Err(ConfigError::Validation("platform.api_username is required".to_string()));
    }
    if platform.request_timeout_secs == 0 || platform.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "platform.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.base_url.trim().is_empty() {
        return Err(ConfigError::Validation("llm.base_url is required".to_string()));
    }
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model is required".to_string()));
    }
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    Ok(())
}

fn validate_retrieval(retrieval: &RetrievalConfig) -> Result<(), ConfigError> {
    if retrieval.base_url.trim().is_empty() {
        return Err(ConfigError::Validation("retrieval.base_url is required".to_string()));
    }
    if retrieval.k == 0 || retrieval.k > 20 {
        return Err(ConfigError::Validation("retrieval.k must be in range 1..=20".to_string()));
    }
    Ok(())
}

fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    if engine.poll_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "engine.poll_interval_secs must be greater than zero".to_string(),
        ));
    }
    if engine.history_window == 0 {
        return Err(ConfigError::Validation(
            "engine.history_window must be greater than zero".to_string(),
        ));
    }
    if engine.max_reply_tokens == 0 || engine.max_intent_tokens == 0 {
        return Err(ConfigError::Validation(
            "engine token budgets must be greater than zero".to_string(),
        ));
    }
    if engine.feedback_max_chars == 0 {
        return Err(ConfigError::Validation(
            "engine.feedback_max_chars must be greater than zero".to_string(),
        ));
    }
    if engine.positive_keywords.is_empty() || engine.negative_keywords.is_empty() {
        return Err(ConfigError::Validation(
            "engine feedback keyword lists must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    platform: Option<PlatformPatch>,
    llm: Option<LlmPatch>,
    retrieval: Option<RetrievalPatch>,
    engine: Option<EnginePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PlatformPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    api_username: Option<String>,
    request_timeout_secs: Option<u64>,
    calls: Option<CallPolicyPatch>,
}

#[derive(Debug, Deserialize)]
struct CallPolicyPatch {
    max_retries: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    rate_limit_default_secs: Option<u64>,
    rate_limit_buffer_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LlmPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RetrievalPatch {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    k: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EnginePatch {
    poll_interval_secs: Option<u64>,
    history_window: Option<usize>,
    max_reply_tokens: Option<u32>,
    max_intent_tokens: Option<u32>,
    positive_keywords: Option<Vec<String>>,
    negative_keywords: Option<Vec<String>>,
    feedback_max_chars: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use secrecy::ExposeSecret;

    use super::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};

    fn valid_overrides() -> ConfigOverrides {
        ConfigOverrides {
            platform_base_url: Some("https://forum.example.com".to_string()),
            platform_api_key: Some("test-api-key".to_string()),
            ..ConfigOverrides::default()
        }
    }

    #[test]
    fn defaults_fail_validation_without_platform_credentials() {
        let result = AppConfig::load(LoadOptions::default());
        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("platform."), "unexpected message: {message}");
    }

    #[test]
    fn overrides_satisfy_validation() {
        let config = AppConfig::load(LoadOptions {
            overrides: valid_overrides(),
            ..LoadOptions::default()
        })
        .expect("config should load with platform overrides");

        assert_eq!(config.platform.base_url, "https://forum.example.com");
        assert_eq!(config.platform.api_key.expose_secret(), "test-api-key");
        assert_eq!(config.engine.history_window, 10);
        assert_eq!(config.retrieval.k, 4);
    }

    #[test]
    fn toml_patch_overrides_engine_values() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"
            [platform]
            base_url = "https://forum.example.com"
            api_key = "file-key"

            [engine]
            poll_interval_secs = 5
            history_window = 6
            positive_keywords = ["yes", "ja"]

            [logging]
            format = "json"
            "#
        )
        .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            ..LoadOptions::default()
        })
        .expect("config should load from file");

        assert_eq!(config.engine.poll_interval_secs, 5);
        assert_eq!(config.engine.history_window, 6);
        assert_eq!(config.engine.positive_keywords, vec!["yes", "ja"]);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn missing_required_file_is_reported() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            require_file: true,
            overrides: valid_overrides(),
        });

        assert!(result.is_err());
        assert!(result.err().expect("error").to_string().contains("does-not-exist.toml"));
    }

    #[test]
    fn rejects_zero_retrieval_k() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"
            [platform]
            base_url = "https://forum.example.com"
            api_key = "file-key"

            [retrieval]
            k = 0
            "#
        )
        .expect("write config");

        let result = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            ..LoadOptions::default()
        });

        assert!(result.is_err());
        assert!(result.err().expect("error").to_string().contains("retrieval.k"));
    }
}
