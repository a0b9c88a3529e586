pub mod config;
pub mod doctor;
pub mod run;

use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// Failure classes shared by the commands; each maps to a stable exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    ConfigValidation,
    InputRead,
    InputInvalid,
    RuntimeInit,
    Bootstrap,
    MissingFields,
    Pipeline,
    OutputWrite,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigValidation => "config_validation",
            Self::InputRead => "input_read",
            Self::InputInvalid => "input_invalid",
            Self::RuntimeInit => "runtime_init",
            Self::Bootstrap => "bootstrap",
            Self::MissingFields => "missing_fields",
            Self::Pipeline => "pipeline",
            Self::OutputWrite => "output_write",
        }
    }

    pub fn exit_code(self) -> u8 {
        match self {
            Self::ConfigValidation => 2,
            Self::InputRead | Self::InputInvalid => 3,
            Self::RuntimeInit => 4,
            Self::Bootstrap => 5,
            Self::MissingFields => 6,
            Self::Pipeline => 7,
            Self::OutputWrite => 8,
        }
    }
}

#[derive(Debug, Serialize)]
struct CommandOutcome<'a> {
    command: &'a str,
    status: &'static str,
    error_class: Option<&'static str>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload =
            CommandOutcome { command, status: "ok", error_class: None, message: message.into() };
        Self { exit_code: 0, output: serialize_payload(&payload) }
    }

    pub fn failure(command: &str, class: ErrorClass, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command,
            status: "error",
            error_class: Some(class.as_str()),
            message: message.into(),
        };
        Self { exit_code: class.exit_code(), output: serialize_payload(&payload) }
    }
}

fn serialize_payload(payload: &CommandOutcome<'_>) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"{}\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            escape_json(payload.command),
            escape_json(&error.to_string())
        )
    })
}

pub(crate) fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
