//! Logging initialization and the tracing-backed audit sink.

use propuesta_core::audit::{AuditEvent, AuditOutcome, AuditSink};
use propuesta_core::config::{AppConfig, LogFormat};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `logging.level`
/// when set.
pub fn init_logging(config: &AppConfig) {
    let level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);
    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if installed.is_err() {
        warn!(event_name = "system.logging.already_initialized", "global subscriber already set");
    }
}

/// Forwards audit events to `tracing` so they land in the service log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let metadata = serde_json::to_string(&event.metadata).unwrap_or_default();
        let stage = event.stage.as_deref().unwrap_or("-");
        match event.outcome {
            AuditOutcome::Success => info!(
                event_name = "audit.event",
                correlation_id = %event.correlation_id,
                audit_event_id = %event.event_id,
                audit_event_type = %event.event_type,
                category = ?event.category,
                stage,
                outcome = ?event.outcome,
                metadata = %metadata,
                "audit event"
            ),
            AuditOutcome::Rejected | AuditOutcome::Failed => warn!(
                event_name = "audit.event",
                correlation_id = %event.correlation_id,
                audit_event_id = %event.event_id,
                audit_event_type = %event.event_type,
                category = ?event.category,
                stage,
                outcome = ?event.outcome,
                metadata = %metadata,
                "audit event"
            ),
        }
    }
}
