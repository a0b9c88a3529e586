use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::budget::allocation::{HoursPolicyKind, MAX_MANDATORY_PRODUCTS};

pub const DEFAULT_CATALOG_URL: &str = "https://apis.automy.global/entity/external/read/ZjlmNjY2N2ItNDc2YS00ZThmLTgxNzctNjdiNmJlNTFiMDQ3";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub catalog: CatalogConfig,
    pub allocation: AllocationConfig,
    pub server: ServerConfig,
    pub pdf: PdfConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub selector_temperature: f32,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl LlmConfig {
    /// Explicit `base_url`, or the provider's public endpoint.
    pub fn effective_base_url(&self) -> String {
        match (&self.base_url, self.provider) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, LlmProvider::Gemini) => DEFAULT_GEMINI_BASE_URL.to_string(),
            (None, LlmProvider::OpenAi) => DEFAULT_OPENAI_BASE_URL.to_string(),
            (None, LlmProvider::Ollama) => "http://localhost:11434/v1".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub url: String,
    pub page: u32,
    pub page_size: u32,
    pub timeout_secs: u64,
    pub max_candidates: usize,
}

#[derive(Clone, Debug)]
pub struct AllocationConfig {
    pub hours_policy: HoursPolicyKind,
    pub mandatory_cap: usize,
    pub value_added_target: usize,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PdfConfig {
    pub template_dir: PathBuf,
    pub wkhtmltopdf_path: Option<PathBuf>,
    pub allow_html_fallback: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
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
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub catalog_url: Option<String>,
    pub server_port: Option<u16>,
    pub hours_policy: Option<HoursPolicyKind>,
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
            llm: LlmConfig {
                provider: LlmProvider::Gemini,
                api_key: None,
                base_url: None,
                model: "gemini-2.5-flash".to_string(),
                temperature: 0.2,
                selector_temperature: 0.5,
                max_output_tokens: 65_536,
                timeout_secs: 120,
                max_retries: 2,
            },
            catalog: CatalogConfig {
                url: DEFAULT_CATALOG_URL.to_string(),
                page: 1,
                page_size: 400,
                timeout_secs: 30,
                max_candidates: 80,
            },
            allocation: AllocationConfig {
                hours_policy: HoursPolicyKind::Proportional,
                mandatory_cap: MAX_MANDATORY_PRODUCTS,
                value_added_target: 18,
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            pdf: PdfConfig {
                template_dir: PathBuf::from("templates/proposal"),
                wkhtmltopdf_path: None,
                allow_html_fallback: true,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected gemini|openai|ollama)"
            ))),
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
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("propuesta.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(selector_temperature) = llm.selector_temperature {
                self.llm.selector_temperature = selector_temperature;
            }
            if let Some(max_output_tokens) = llm.max_output_tokens {
                self.llm.max_output_tokens = max_output_tokens;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(url) = catalog.url {
                self.catalog.url = url;
            }
            if let Some(page) = catalog.page {
                self.catalog.page = page;
            }
            if let Some(page_size) = catalog.page_size {
                self.catalog.page_size = page_size;
            }
            if let Some(timeout_secs) = catalog.timeout_secs {
                self.catalog.timeout_secs = timeout_secs;
            }
            if let Some(max_candidates) = catalog.max_candidates {
                self.catalog.max_candidates = max_candidates;
            }
        }

        if let Some(allocation) = patch.allocation {
            if let Some(hours_policy) = allocation.hours_policy {
                self.allocation.hours_policy =
                    hours_policy.parse().map_err(ConfigError::Validation)?;
            }
            if let Some(mandatory_cap) = allocation.mandatory_cap {
                self.allocation.mandatory_cap = mandatory_cap;
            }
            if let Some(value_added_target) = allocation.value_added_target {
                self.allocation.value_added_target = value_added_target;
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

        if let Some(pdf) = patch.pdf {
            if let Some(template_dir) = pdf.template_dir {
                self.pdf.template_dir = template_dir;
            }
            if let Some(wkhtmltopdf_path) = pdf.wkhtmltopdf_path {
                self.pdf.wkhtmltopdf_path = Some(wkhtmltopdf_path);
            }
            if let Some(allow_html_fallback) = pdf.allow_html_fallback {
                self.pdf.allow_html_fallback = allow_html_fallback;
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

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PROPUESTA_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("PROPUESTA_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PROPUESTA_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("PROPUESTA_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("PROPUESTA_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("PROPUESTA_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("PROPUESTA_LLM_SELECTOR_TEMPERATURE") {
            self.llm.selector_temperature =
                parse_f32("PROPUESTA_LLM_SELECTOR_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("PROPUESTA_LLM_MAX_OUTPUT_TOKENS") {
            self.llm.max_output_tokens = parse_u32("PROPUESTA_LLM_MAX_OUTPUT_TOKENS", &value)?;
        }
        if let Some(value) = read_env("PROPUESTA_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("PROPUESTA_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PROPUESTA_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("PROPUESTA_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("PROPUESTA_CATALOG_URL") {
            self.catalog.url = value;
        }
        if let Some(value) = read_env("PROPUESTA_CATALOG_PAGE") {
            self.catalog.page = parse_u32("PROPUESTA_CATALOG_PAGE", &value)?;
        }
        if let Some(value) = read_env("PROPUESTA_CATALOG_PAGE_SIZE") {
            self.catalog.page_size = parse_u32("PROPUESTA_CATALOG_PAGE_SIZE", &value)?;
        }
        if let Some(value) = read_env("PROPUESTA_CATALOG_TIMEOUT_SECS") {
            self.catalog.timeout_secs = parse_u64("PROPUESTA_CATALOG_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PROPUESTA_CATALOG_MAX_CANDIDATES") {
            self.catalog.max_candidates =
                parse_usize("PROPUESTA_CATALOG_MAX_CANDIDATES", &value)?;
        }

        if let Some(value) = read_env("PROPUESTA_ALLOCATION_HOURS_POLICY") {
            self.allocation.hours_policy =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "PROPUESTA_ALLOCATION_HOURS_POLICY".to_string(),
                    value: value.clone(),
                })?;
        }
        if let Some(value) = read_env("PROPUESTA_ALLOCATION_MANDATORY_CAP") {
            self.allocation.mandatory_cap =
                parse_usize("PROPUESTA_ALLOCATION_MANDATORY_CAP", &value)?;
        }
        if let Some(value) = read_env("PROPUESTA_ALLOCATION_VALUE_ADDED_TARGET") {
            self.allocation.value_added_target =
                parse_usize("PROPUESTA_ALLOCATION_VALUE_ADDED_TARGET", &value)?;
        }

        if let Some(value) = read_env("PROPUESTA_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        let port = read_env("PROPUESTA_SERVER_PORT")
            .map(|value| ("PROPUESTA_SERVER_PORT", value))
            .or_else(|| read_env("PORT").map(|value| ("PORT", value)));
        if let Some((key, value)) = port {
            self.server.port = parse_u16(key, &value)?;
        }
        if let Some(value) = read_env("PROPUESTA_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PROPUESTA_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("PROPUESTA_PDF_TEMPLATE_DIR") {
            self.pdf.template_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("PROPUESTA_PDF_WKHTMLTOPDF_PATH") {
            self.pdf.wkhtmltopdf_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("PROPUESTA_PDF_ALLOW_HTML_FALLBACK") {
            self.pdf.allow_html_fallback =
                parse_bool("PROPUESTA_PDF_ALLOW_HTML_FALLBACK", &value)?;
        }

        let log_level =
            read_env("PROPUESTA_LOGGING_LEVEL").or_else(|| read_env("PROPUESTA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PROPUESTA_LOGGING_FORMAT").or_else(|| read_env("PROPUESTA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(catalog_url) = overrides.catalog_url {
            self.catalog.url = catalog_url;
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
        if let Some(hours_policy) = overrides.hours_policy {
            self.allocation.hours_policy = hours_policy;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_catalog(&self.catalog)?;
        validate_allocation(&self.allocation)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("propuesta.toml"), PathBuf::from("config/propuesta.toml")]
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

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    for (key, value) in
        [("llm.temperature", llm.temperature), ("llm.selector_temperature", llm.selector_temperature)]
    {
        if !(0.0..=2.0).contains(&value) {
            return Err(ConfigError::Validation(format!("{key} must be in range 0.0..=2.0")));
        }
    }

    if llm.max_output_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_output_tokens must be greater than zero".to_string(),
        ));
    }

    match llm.provider {
        LlmProvider::Gemini | LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for gemini/openai providers (set PROPUESTA_LLM_API_KEY)"
                        .to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    let url = catalog.url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "catalog.url must start with http:// or https://".to_string(),
        ));
    }

    if catalog.page == 0 || catalog.page_size == 0 {
        return Err(ConfigError::Validation(
            "catalog.page and catalog.page_size must be greater than zero".to_string(),
        ));
    }

    if catalog.timeout_secs == 0 || catalog.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "catalog.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if catalog.max_candidates == 0 {
        return Err(ConfigError::Validation(
            "catalog.max_candidates must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_allocation(allocation: &AllocationConfig) -> Result<(), ConfigError> {
    if allocation.mandatory_cap == 0 || allocation.mandatory_cap > MAX_MANDATORY_PRODUCTS {
        return Err(ConfigError::Validation(format!(
            "allocation.mandatory_cap must be in range 1..={MAX_MANDATORY_PRODUCTS}"
        )));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
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

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.trim().parse::<f32>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    catalog: Option<CatalogPatch>,
    allocation: Option<AllocationPatch>,
    server: Option<ServerPatch>,
    pdf: Option<PdfPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    selector_temperature: Option<f32>,
    max_output_tokens: Option<u32>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    url: Option<String>,
    page: Option<u32>,
    page_size: Option<u32>,
    timeout_secs: Option<u64>,
    max_candidates: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct AllocationPatch {
    hours_policy: Option<String>,
    mandatory_cap: Option<usize>,
    value_added_target: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PdfPatch {
    template_dir: Option<PathBuf>,
    wkhtmltopdf_path: Option<PathBuf>,
    allow_html_fallback: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
