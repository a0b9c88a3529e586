use std::fs;
use std::path::{Path, PathBuf};

use propuesta_agent::{PipelineOutcome, ProposalPipeline};
use propuesta_core::config::{AppConfig, LoadOptions};
use propuesta_core::domain::intake::IntakeDraft;
use propuesta_server::bootstrap::bootstrap_with_config;
use serde_json::Value;

use crate::commands::{CommandResult, ErrorClass};

const COMMAND: &str = "run";

/// Runs the whole pipeline once against the configured collaborators.
pub fn run(input: &Path, output: Option<&Path>) -> CommandResult {
    let payload = match read_intake(input) {
        Ok(payload) => payload,
        Err(result) => return result,
    };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                ErrorClass::ConfigValidation,
                format!("configuration issue: {error}"),
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                ErrorClass::RuntimeInit,
                format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    runtime.block_on(async {
        match bootstrap_with_config(config).await {
            Ok(app) => execute(&app.pipeline, &payload, output).await,
            Err(error) => CommandResult::failure(COMMAND, ErrorClass::Bootstrap, error.to_string()),
        }
    })
}

/// Reads the intake file; it must hold a single JSON object.
pub fn read_intake(path: &Path) -> Result<Value, CommandResult> {
    let raw = fs::read_to_string(path).map_err(|error| {
        CommandResult::failure(
            COMMAND,
            ErrorClass::InputRead,
            format!("could not read `{}`: {error}", path.display()),
        )
    })?;

    match serde_json::from_str::<Value>(&raw) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(CommandResult::failure(
            COMMAND,
            ErrorClass::InputInvalid,
            format!("`{}` must contain a JSON object", path.display()),
        )),
        Err(error) => Err(CommandResult::failure(
            COMMAND,
            ErrorClass::InputInvalid,
            format!("`{}` is not valid JSON: {error}", path.display()),
        )),
    }
}

/// Runs `pipeline` on `payload` and writes the rendered document to
/// `output`, or to `Propuesta_<empresa>.<ext>` in the working directory.
pub async fn execute(
    pipeline: &ProposalPipeline,
    payload: &Value,
    output: Option<&Path>,
) -> CommandResult {
    match pipeline.run(IntakeDraft::from_json(payload)).await {
        PipelineOutcome::Completed(success) => {
            let path = output.map(Path::to_path_buf).unwrap_or_else(|| {
                PathBuf::from(success.document.download_name(&success.rendered.extension))
            });
            if let Err(error) = tokio::fs::write(&path, &success.rendered.bytes).await {
                return CommandResult::failure(
                    COMMAND,
                    ErrorClass::OutputWrite,
                    format!("could not write `{}`: {error}", path.display()),
                );
            }

            let budget = &success.document.proposal.budget;
            CommandResult::success(
                COMMAND,
                format!(
                    "wrote {} ({} bytes, {}); presupuesto_anual={} total_productos={} correlation_id={}",
                    path.display(),
                    success.rendered_len(),
                    success.rendered.content_type,
                    budget.presupuesto_anual,
                    budget.total_productos,
                    success.correlation_id
                ),
            )
        }
        PipelineOutcome::Failed(failure) if failure.is_missing_fields() => {
            let message = failure.message.clone().unwrap_or_else(|| {
                format!("missing fields: {}", failure.missing_field_names().join(", "))
            });
            CommandResult::failure(COMMAND, ErrorClass::MissingFields, message)
        }
        PipelineOutcome::Failed(failure) => CommandResult::failure(
            COMMAND,
            ErrorClass::Pipeline,
            format!(
                "{} stage failed ({}): {} correlation_id={}",
                failure.stage, failure.reason, failure.detail, failure.correlation_id
            ),
        ),
    }
}
