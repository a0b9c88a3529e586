use thiserror::Error;

use crate::domain::intake::IntakeField;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("missing required intake fields: {}", join_fields(.0))]
    MissingIntakeFields(Vec<IntakeField>),
    #[error("schema mismatch in {stage} output: {detail}")]
    SchemaMismatch { stage: String, detail: String },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

fn join_fields(fields: &[IntakeField]) -> String {
    fields.iter().map(|field| field.wire_name()).collect::<Vec<_>>().join(", ")
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("generative backend failure: {0}")]
    Generative(String),
    #[error("collaborator failure: {0}")]
    Collaborator(String),
    #[error("rendering failure: {0}")]
    Rendering(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "La solicitud no pudo procesarse. Revisa los datos e inténtalo de nuevo."
            }
            Self::ServiceUnavailable { .. } => {
                "El servicio no está disponible temporalmente. Inténtalo más tarde."
            }
            Self::Internal { .. } => "Ocurrió un error interno inesperado.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::MissingIntakeFields(fields)) => {
                Self::BadRequest { message: join_fields(&fields), correlation_id }
            }
            ApplicationError::Domain(error @ DomainError::SchemaMismatch { .. })
            | ApplicationError::Domain(error @ DomainError::InvariantViolation(_)) => {
                Self::Internal { message: error.to_string(), correlation_id }
            }
            ApplicationError::Generative(message) | ApplicationError::Collaborator(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Rendering(message) | ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id }
            }
        }
    }
}
