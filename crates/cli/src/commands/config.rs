use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use propuesta_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

const ENV_PREFIX: &str = "PROPUESTA_";

/// Extra env names honoured for a key besides `PROPUESTA_<SECTION>_<KEY>`.
fn env_aliases(key_path: &str) -> &'static [&'static str] {
    match key_path {
        "server.port" => &["PORT"],
        "logging.level" => &["PROPUESTA_LOG_LEVEL"],
        "logging.format" => &["PROPUESTA_LOG_FORMAT"],
        _ => &[],
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value) in effective_values(&config) {
        let source = field_source(key_path, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key_path, &value, source));
    }
    lines.join("\n")
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String)> {
    let optional_path = |path: Option<&Path>| {
        path.map(|path| path.display().to_string()).unwrap_or_else(|| "<unset>".to_string())
    };
    let api_key = match &config.llm.api_key {
        Some(secret) => redact_token(secret.expose_secret()),
        None => "<unset>".to_string(),
    };

    vec![
        ("llm.provider", config.llm.provider.as_str().to_string()),
        ("llm.model", config.llm.model.clone()),
        ("llm.base_url", config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string())),
        ("llm.api_key", api_key),
        ("llm.temperature", config.llm.temperature.to_string()),
        ("llm.selector_temperature", config.llm.selector_temperature.to_string()),
        ("llm.max_output_tokens", config.llm.max_output_tokens.to_string()),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string()),
        ("llm.max_retries", config.llm.max_retries.to_string()),
        ("catalog.url", config.catalog.url.clone()),
        ("catalog.page", config.catalog.page.to_string()),
        ("catalog.page_size", config.catalog.page_size.to_string()),
        ("catalog.timeout_secs", config.catalog.timeout_secs.to_string()),
        ("catalog.max_candidates", config.catalog.max_candidates.to_string()),
        ("allocation.hours_policy", config.allocation.hours_policy.as_str().to_string()),
        ("allocation.mandatory_cap", config.allocation.mandatory_cap.to_string()),
        ("allocation.value_added_target", config.allocation.value_added_target.to_string()),
        ("server.bind_address", config.server.bind_address.clone()),
        ("server.port", config.server.port.to_string()),
        ("server.graceful_shutdown_secs", config.server.graceful_shutdown_secs.to_string()),
        ("pdf.template_dir", config.pdf.template_dir.display().to_string()),
        ("pdf.wkhtmltopdf_path", optional_path(config.pdf.wkhtmltopdf_path.as_deref())),
        ("pdf.allow_html_fallback", config.pdf.allow_html_fallback.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format!("{:?}", config.logging.format).to_ascii_lowercase()),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("propuesta.toml"), PathBuf::from("config/propuesta.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let primary = format!("{ENV_PREFIX}{}", key_path.replace('.', "_").to_ascii_uppercase());
    let env_keys = std::iter::once(primary.as_str()).chain(env_aliases(key_path).iter().copied());
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

/// Keeps a short provider prefix (`sk-`) when present, never the key body.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        if prefix.len() <= 4 {
            return format!("{prefix}-***");
        }
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token};

    #[test]
    fn tokens_are_redacted() {
        assert_eq!(redact_token("sk-live-abcdef"), "sk-***");
        assert_eq!(redact_token("AIzaSyExampleKey"), "<redacted>");
        assert_eq!(redact_token("longprefix-secret"), "<redacted>");
        assert_eq!(redact_token("   "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_the_file() {
        let doc = "[catalog]\nmax_candidates = 40\n".parse::<Value>().expect("toml");
        assert!(contains_path(&doc, "catalog.max_candidates"));
        assert!(!contains_path(&doc, "catalog.url"));
        assert!(!contains_path(&doc, "llm.model"));
    }
}
