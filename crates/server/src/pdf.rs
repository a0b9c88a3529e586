//! Proposal rendering: a Tera HTML template converted to PDF by
//! `wkhtmltopdf`, with an HTML fallback when no converter is usable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use propuesta_agent::{DocumentRenderer, RenderError, RenderedDocument};
use propuesta_core::config::PdfConfig;
use propuesta_core::domain::proposal::ProposalDocument;
use serde_json::{json, Value};
use tera::{Context, Tera};
use tokio::process::Command;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const TEMPLATE_NAME: &str = "propuesta_comercial.html.tera";
pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

const EMBEDDED_TEMPLATE: &str =
    include_str!("../../../templates/proposal/propuesta_comercial.html.tera");

/// Registers the filters the proposal template uses.
///
/// - `money`: Colombian peso format without decimals, `19200000 | money` → `$19.200.000`
/// - `safe_value`: `N/A` (or `default=...`) for null, empty and `N/A` values
pub fn register_template_filters(tera: &mut Tera) {
    tera.autoescape_on(vec![".html", ".html.tera"]);
    tera.register_filter("money", tera_money_filter);
    tera.register_filter("safe_value", tera_safe_value_filter);
}

fn tera_money_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let amount = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    };
    let formatted = match amount {
        Some(amount) => format_cop(amount),
        None => args.get("default").and_then(Value::as_str).unwrap_or("$0").to_string(),
    };
    Ok(Value::String(formatted))
}

fn tera_safe_value_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let fallback = args.get("default").and_then(Value::as_str).unwrap_or("N/A");
    let rendered = match value {
        Value::Null => fallback.to_string(),
        Value::String(text) if text.trim().is_empty() || text == "N/A" => fallback.to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    Ok(Value::String(rendered))
}

/// `$` plus whole pesos with `.` as thousands separator.
pub fn format_cop(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    if rounded < 0.0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("template error: {0}")]
    Template(String),
    #[error("conversion error: {0}")]
    Conversion(String),
    #[error("wkhtmltopdf not found")]
    WkhtmltopdfNotFound,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PdfError> for RenderError {
    fn from(value: PdfError) -> Self {
        match value {
            PdfError::Template(message) => Self::Template(message),
            PdfError::Conversion(message) => Self::Converter(message),
            PdfError::WkhtmltopdfNotFound => Self::ConverterUnavailable,
            PdfError::Io(error) => Self::Io(error.to_string()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PdfGenerator {
    tera: Tera,
    wkhtmltopdf_path: Option<PathBuf>,
    allow_html_fallback: bool,
}

impl PdfGenerator {
    /// Loads templates from `config.template_dir`, falling back to the
    /// embedded proposal template when the directory has none.
    pub fn from_config(config: &PdfConfig) -> Result<Self, PdfError> {
        let pattern = format!("{}/**/*", config.template_dir.display());
        let mut tera = match Tera::new(&pattern) {
            Ok(tera) => tera,
            Err(error) => {
                warn!(
                    event_name = "pdf.templates.unavailable",
                    template_dir = %config.template_dir.display(),
                    error = %error,
                    "failed to load proposal templates from disk, using embedded template"
                );
                Tera::default()
            }
        };
        if !tera.get_template_names().any(|name| name == TEMPLATE_NAME) {
            tera.add_raw_template(TEMPLATE_NAME, EMBEDDED_TEMPLATE)
                .map_err(|error| PdfError::Template(error.to_string()))?;
        }
        register_template_filters(&mut tera);

        let wkhtmltopdf_path = resolve_converter(config.wkhtmltopdf_path.as_deref());
        match &wkhtmltopdf_path {
            Some(path) => info!(path = %path.display(), "wkhtmltopdf found"),
            None => warn!("wkhtmltopdf not found - proposals will be rendered as HTML"),
        }

        Ok(Self { tera, wkhtmltopdf_path, allow_html_fallback: config.allow_html_fallback })
    }

    /// Embedded template only, no converter, HTML fallback enabled.
    pub fn with_embedded_template() -> Result<Self, PdfError> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, EMBEDDED_TEMPLATE)
            .map_err(|error| PdfError::Template(error.to_string()))?;
        register_template_filters(&mut tera);
        Ok(Self { tera, wkhtmltopdf_path: None, allow_html_fallback: true })
    }

    pub fn with_converter(mut self, path: Option<PathBuf>) -> Self {
        self.wkhtmltopdf_path = path;
        self
    }

    pub fn with_html_fallback(mut self, allowed: bool) -> Self {
        self.allow_html_fallback = allowed;
        self
    }

    pub fn converter_path(&self) -> Option<&Path> {
        self.wkhtmltopdf_path.as_deref()
    }

    pub fn render_html(&self, document: &ProposalDocument) -> Result<String, PdfError> {
        let data =
            serde_json::to_value(document).map_err(|error| PdfError::Template(error.to_string()))?;
        let proposal = data.get("propuesta_comercial").cloned().unwrap_or_else(|| json!({}));
        let section = |key: &str, fallback: Value| proposal.get(key).cloned().unwrap_or(fallback);

        let mut context = Context::new();
        context.insert("cliente", &section("informacion_cliente", json!({})));
        context.insert("perfil", &section("perfil_riesgo", json!({})));
        context.insert("presupuesto", &section("presupuesto", json!({})));
        context.insert("obligatorios", &section("productos_obligatorios", json!([])));
        context.insert("prioritarios", &section("productos_prioritarios", json!([])));
        context.insert("valores", &section("valores_agregados", json!([])));
        context.insert("meta", &data.get("metadatos").cloned().unwrap_or_else(|| json!({})));
        context.insert("nombre_empresa", &document.proposal.client.nombre_empresa);

        self.tera
            .render(TEMPLATE_NAME, &context)
            .map_err(|error| PdfError::Template(error.to_string()))
    }

    pub async fn generate(&self, document: &ProposalDocument) -> Result<PdfResult, PdfError> {
        let html = self.render_html(document)?;

        let Some(wkhtmltopdf) = self.wkhtmltopdf_path.as_deref() else {
            if self.allow_html_fallback {
                return Ok(PdfResult::Html(html));
            }
            return Err(PdfError::WkhtmltopdfNotFound);
        };

        match convert_html_to_pdf(&html, wkhtmltopdf).await {
            Ok(bytes) => Ok(PdfResult::Pdf(bytes)),
            Err(error) if self.allow_html_fallback => {
                warn!(error = %error, "PDF conversion failed, falling back to HTML");
                Ok(PdfResult::Html(html))
            }
            Err(error) => Err(error),
        }
    }
}

#[async_trait]
impl DocumentRenderer for PdfGenerator {
    async fn render(&self, document: &ProposalDocument) -> Result<RenderedDocument, RenderError> {
        Ok(self.generate(document).await?.into_rendered())
    }
}

fn resolve_converter(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) if path.is_file() => Some(path.to_path_buf()),
        Some(path) => {
            warn!(path = %path.display(), "configured wkhtmltopdf path does not exist");
            None
        }
        None => which::which("wkhtmltopdf").ok(),
    }
}

async fn convert_html_to_pdf(html: &str, wkhtmltopdf: &Path) -> Result<Vec<u8>, PdfError> {
    let temp_dir = std::env::temp_dir();
    let stem = Uuid::new_v4();
    let html_path = temp_dir.join(format!("propuesta_{stem}.html"));
    let pdf_path = temp_dir.join(format!("propuesta_{stem}.pdf"));

    tokio::fs::write(&html_path, html).await?;
    let result = run_converter(wkhtmltopdf, &html_path, &pdf_path).await;

    let _ = tokio::fs::remove_file(&html_path).await;
    let _ = tokio::fs::remove_file(&pdf_path).await;

    if let Ok(bytes) = &result {
        info!(size = bytes.len(), "PDF generated successfully");
    }
    result
}

async fn run_converter(
    wkhtmltopdf: &Path,
    html_path: &Path,
    pdf_path: &Path,
) -> Result<Vec<u8>, PdfError> {
    let output = Command::new(wkhtmltopdf)
        .args(["--page-size", "A4"])
        .args(["--margin-top", "10mm", "--margin-bottom", "10mm"])
        .args(["--margin-left", "10mm", "--margin-right", "10mm"])
        .args(["--encoding", "utf-8", "--enable-local-file-access", "--quiet"])
        .arg(html_path)
        .arg(pdf_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(stderr = %stderr, "wkhtmltopdf failed");
        return Err(PdfError::Conversion(stderr.to_string()));
    }
    Ok(tokio::fs::read(pdf_path).await?)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PdfResult {
    Pdf(Vec<u8>),
    Html(String),
}

impl PdfResult {
    pub fn into_rendered(self) -> RenderedDocument {
        match self {
            Self::Pdf(bytes) => RenderedDocument {
                bytes,
                content_type: PDF_CONTENT_TYPE.to_string(),
                extension: "pdf".to_string(),
            },
            Self::Html(html) => RenderedDocument {
                bytes: html.into_bytes(),
                content_type: HTML_CONTENT_TYPE.to_string(),
                extension: "html".to_string(),
            },
        }
    }
}

pub fn is_wkhtmltopdf_available(explicit: Option<&Path>) -> bool {
    resolve_converter(explicit).is_some()
}
