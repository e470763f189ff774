//! Error handling for the Acopio reconciliation service
//!
//! Provides consistent error responses in Spanish and English

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_es: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Persistence API errors
    #[error("Entity API unavailable: {0}")]
    TransientIo(String),

    #[error("Entity API rejected request: {0}")]
    ExternalService(String),

    #[error("History for {collection} exceeded {max_pages} pages")]
    HistoryTooLarge { collection: String, max_pages: u32 },

    #[error("{rejected} history record(s) could not be decoded")]
    IncompleteHistory { rejected: usize },

    #[error("{entity} {id} changed while it was being reconciled")]
    ConcurrentModification { entity: String, id: String },

    // Reconciliation errors
    #[error("Reconciliation incomplete: {failed} correction(s) failed")]
    ReconciliationIncomplete { failed: usize },

    #[error("Reconciliation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether re-running the whole pass later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::TransientIo(_)
                | AppError::ConcurrentModification { .. }
                | AppError::ReconciliationIncomplete { .. }
                | AppError::Cancelled
                | AppError::DatabaseError(_)
        )
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Validation { field, message, message_es } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_es: message_es.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_es: format!("No se encontró {}", resource),
                    field: None,
                },
            ),
            AppError::TransientIo(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail {
                    code: "ENTITY_API_UNAVAILABLE".to_string(),
                    message_en: format!("Entity API unavailable: {}", msg),
                    message_es: format!("La API de entidades no está disponible: {}", msg),
                    field: None,
                },
            ),
            AppError::ExternalService(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail {
                    code: "ENTITY_API_ERROR".to_string(),
                    message_en: format!("Entity API error: {}", msg),
                    message_es: format!("Error de la API de entidades: {}", msg),
                    field: None,
                },
            ),
            AppError::HistoryTooLarge { collection, max_pages } => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail {
                    code: "HISTORY_TOO_LARGE".to_string(),
                    message_en: format!("{} history exceeded {} pages", collection, max_pages),
                    message_es: format!("El historial de {} superó {} páginas", collection, max_pages),
                    field: None,
                },
            ),
            AppError::IncompleteHistory { rejected } => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail {
                    code: "INCOMPLETE_HISTORY".to_string(),
                    message_en: format!(
                        "{} history record(s) could not be read; nothing was corrected",
                        rejected
                    ),
                    message_es: format!(
                        "No se pudieron leer {} registro(s) del historial; no se corrigió nada",
                        rejected
                    ),
                    field: None,
                },
            ),
            AppError::ConcurrentModification { entity, id } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "CONCURRENT_MODIFICATION".to_string(),
                    message_en: format!("{} {} changed during reconciliation", entity, id),
                    message_es: format!("{} {} cambió durante la conciliación", entity, id),
                    field: None,
                },
            ),
            AppError::ReconciliationIncomplete { failed } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail {
                    code: "RECONCILIATION_INCOMPLETE".to_string(),
                    message_en: format!("{} correction(s) failed; retry later", failed),
                    message_es: format!("Fallaron {} corrección(es); reintente más tarde", failed),
                    field: None,
                },
            ),
            AppError::Cancelled => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail {
                    code: "RECONCILIATION_CANCELLED".to_string(),
                    message_en: "Reconciliation was cancelled".to_string(),
                    message_es: "La conciliación fue cancelada".to_string(),
                    field: None,
                },
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "CONFIGURATION_ERROR".to_string(),
                    message_en: format!("Configuration error: {}", msg),
                    message_es: format!("Error de configuración: {}", msg),
                    field: None,
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message_en: "A database error occurred".to_string(),
                    message_es: "Ocurrió un error de base de datos".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_es: "Error interno del servidor".to_string(),
                    field: None,
                },
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;
