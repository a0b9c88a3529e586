use std::collections::HashSet;

use propuesta_agent::providers::client_from_config;
use propuesta_agent::GenerationRequest;
use propuesta_core::catalog::CatalogSource;
use propuesta_core::config::{AppConfig, LoadOptions};
use propuesta_server::catalog::HttpCatalogSource;
use propuesta_server::pdf::is_wkhtmltopdf_available;
use serde::Serialize;

use crate::commands::escape_json;

const CHECK_NAMES: [&str; 3] = ["catalog_reachability", "llm_backend", "document_converter"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub overall_status: CheckStatus,
    pub summary: String,
    pub checks: Vec<DoctorCheck>,
}

/// Returns the exit code (0 when no check failed) and the rendered report.
pub fn run(json_output: bool) -> (u8, String) {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return (exit_code, output);
    }

    (exit_code, render_human(&report))
}

pub fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.extend(collaborator_checks(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(CHECK_NAMES.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let warned = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let (overall_status, summary) = match (failed, warned) {
        (true, _) => (CheckStatus::Fail, "doctor: one or more readiness checks failed"),
        (false, true) => (CheckStatus::Warn, "doctor: ready with warnings"),
        (false, false) => (CheckStatus::Pass, "doctor: all readiness checks passed"),
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn collaborator_checks(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CHECK_NAMES
                .into_iter()
                .map(|name| DoctorCheck {
                    name,
                    status: CheckStatus::Fail,
                    details: format!("failed to initialize async runtime: {error}"),
                })
                .collect();
        }
    };

    let catalog = runtime.block_on(check_catalog(config));
    let llm = runtime.block_on(check_llm_backend(config));
    vec![catalog, llm, check_converter(config)]
}

async fn check_catalog(config: &AppConfig) -> DoctorCheck {
    let name = "catalog_reachability";
    let result = match HttpCatalogSource::from_config(&config.catalog) {
        Ok(source) => source.fetch().await,
        Err(error) => Err(error),
    };

    match result {
        Ok(items) if items.is_empty() => DoctorCheck {
            name,
            status: CheckStatus::Warn,
            details: format!("`{}` answered with no catalog items", config.catalog.url),
        },
        Ok(items) => {
            let categories = items
                .iter()
                .filter_map(|item| item.program_category())
                .collect::<HashSet<_>>()
                .len();
            DoctorCheck {
                name,
                status: CheckStatus::Pass,
                details: format!("{} items across {categories} categories", items.len()),
            }
        }
        Err(error) => DoctorCheck { name, status: CheckStatus::Fail, details: error.to_string() },
    }
}

async fn check_llm_backend(config: &AppConfig) -> DoctorCheck {
    let name = "llm_backend";
    let client = match client_from_config(&config.llm) {
        Ok(client) => client,
        Err(error) => {
            return DoctorCheck { name, status: CheckStatus::Fail, details: error.to_string() }
        }
    };

    let probe = GenerationRequest {
        label: "doctor".to_string(),
        system_instruction: "Responde únicamente con la palabra OK.".to_string(),
        user_instruction: "OK".to_string(),
        temperature: 0.0,
        max_output_tokens: 16,
        structured: false,
    };
    match client.invoke(&probe).await {
        Ok(_) => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!("{} answered using model `{}`", client.name(), config.llm.model),
        },
        Err(error) => DoctorCheck { name, status: CheckStatus::Fail, details: error.to_string() },
    }
}

fn check_converter(config: &AppConfig) -> DoctorCheck {
    let name = "document_converter";
    let available = is_wkhtmltopdf_available(config.pdf.wkhtmltopdf_path.as_deref());
    match (available, config.pdf.allow_html_fallback) {
        (true, _) => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: "wkhtmltopdf available".to_string(),
        },
        (false, true) => DoctorCheck {
            name,
            status: CheckStatus::Warn,
            details: "wkhtmltopdf not found; documents will be rendered as HTML".to_string(),
        },
        (false, false) => DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: "wkhtmltopdf not found and pdf.allow_html_fallback is disabled".to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
