// [apps/control-plane/src/errors.rs]
/*!
 * =================================================================
 * APARATO: API ERROR RENDERER (V12.0 - GENERIC FACADE)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: TRADUCCIÓN DE FALLOS INTERNOS AL CONTRATO HTTP
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. GENERIC MESSAGES: El cuerpo expone códigos estables y mensajes
 *    deliberadamente genéricos; el diagnóstico vive en el rastro por
 *    request_id, jamás en la respuesta.
 * 2. CROSS-TENANT = 404: El enmascaramiento de existencia se decide
 *    aquí: CROSS_TENANT jamás se renderiza como 403.
 * =================================================================
 */

use std::time::Duration;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use panoptes_core_crypto::CryptoError;
use panoptes_infra_db::DbError;
use panoptes_infra_kv::VaultError;
use panoptes_infra_media::MediaClientError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("VALIDATION")]
    Validation(String),

    // --- ESTRATO DE AUTENTICACIÓN ---
    #[error("AUTH_FAILED")]
    AuthFailed,
    #[error("TOKEN_EXPIRED")]
    TokenExpired,
    #[error("TOKEN_REVOKED")]
    TokenRevoked,
    #[error("REFRESH_REUSED")]
    RefreshReused,
    #[error("LOCKED_OUT")]
    LockedOut,

    // --- ESTRATO DE AUTORIZACIÓN ---
    #[error("FORBIDDEN")]
    Forbidden,
    #[error("NOT_FOUND")]
    NotFound,
    #[error("CONFLICT")]
    Conflict,

    // --- ESTRATO DE RÁFAGAS ---
    #[error("{reason_code}")]
    RateLimited {
        reason_code: &'static str,
        retry_after: Duration,
    },

    // --- ESTRATO HLS ---
    #[error("HLS_BAD_PATH")]
    HlsBadPath,
    #[error("HLS_TOKEN_INVALID")]
    HlsTokenInvalid,
    #[error("HLS_TOKEN_EXPIRED")]
    HlsTokenExpired,
    #[error("RANGE_NOT_SATISFIABLE")]
    RangeNotSatisfiable,

    // --- ESTRATO DE LICENCIA Y AUDITORÍA ---
    #[error("{0}")]
    LicenseRestricted(&'static str),
    #[error("AUDIT_EXHAUSTED")]
    AuditExhausted,

    // --- ESTRATO DE COLABORADORES ---
    #[error("{0}")]
    Upstream(&'static str, String),

    #[error("INTERNAL")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::HlsBadPath => StatusCode::BAD_REQUEST,
            Self::AuthFailed
            | Self::TokenExpired
            | Self::TokenRevoked
            | Self::RefreshReused
            | Self::HlsTokenInvalid
            | Self::HlsTokenExpired => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::LicenseRestricted(_) => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::LockedOut => StatusCode::LOCKED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::RangeNotSatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::AuditExhausted => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_, _) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Código estable publicado en el cuerpo y en reason_code de auditoría.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::AuthFailed => "AUTH_FAILED",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenRevoked => "TOKEN_REVOKED",
            Self::RefreshReused => "REFRESH_REUSED",
            Self::LockedOut => "LOCKED_OUT",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::RateLimited { reason_code, .. } => reason_code,
            Self::HlsBadPath => "HLS_BAD_PATH",
            Self::HlsTokenInvalid => "HLS_TOKEN_INVALID",
            Self::HlsTokenExpired => "HLS_TOKEN_EXPIRED",
            Self::RangeNotSatisfiable => "RANGE_NOT_SATISFIABLE",
            Self::LicenseRestricted(reason) => reason,
            Self::AuditExhausted => "AUDIT_EXHAUSTED",
            Self::Upstream(reason, _) => reason,
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Mensaje deliberadamente genérico hacia el operador.
    fn generic_message(&self) -> &'static str {
        match self.status_code() {
            StatusCode::BAD_REQUEST => "Validation failed",
            StatusCode::UNAUTHORIZED => "Authentication failed",
            StatusCode::FORBIDDEN => "Operation not permitted",
            StatusCode::NOT_FOUND => "Resource not found",
            StatusCode::CONFLICT => "Conflicting state",
            StatusCode::LOCKED => "Identity temporarily locked",
            StatusCode::TOO_MANY_REQUESTS => "Too many requests",
            StatusCode::RANGE_NOT_SATISFIABLE => "Requested range not satisfiable",
            StatusCode::SERVICE_UNAVAILABLE => "Service temporarily unavailable",
            _ => "Internal error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(detail) | Self::Upstream(_, detail) => {
                error!("💥 [API_FAULT]: {} -> {}", self.reason_code(), detail);
            }
            Self::Validation(detail) => {
                warn!("🧪 [VALIDATION_FAULT]: {}", detail);
            }
            _ => {}
        }

        // El request_id real lo inyecta el middleware de cierre leyendo el
        // header propagado; aquí se siembra el esqueleto del contrato.
        let error_body = Json(json!({
            "code": self.reason_code(),
            "message": self.generic_message(),
            "request_id": serde_json::Value::Null,
        }));

        let mut response = (self.status_code(), error_body).into_response();

        if let Self::RateLimited { retry_after, .. } = &self {
            if let Ok(retry_header) = retry_after.as_secs().max(1).to_string().parse() {
                response.headers_mut().insert("Retry-After", retry_header);
            }
        }
        response
    }
}

// --- TRIAJE DESDE LOS CATÁLOGOS DE INFRAESTRUCTURA ---

impl From<DbError> for ApiError {
    fn from(fault: DbError) -> Self {
        match fault {
            DbError::NotFound => Self::NotFound,
            DbError::Conflict => Self::Conflict,
            DbError::InvalidState => Self::Conflict,
            DbError::ConnectionError(detail) => Self::Upstream("UPSTREAM_DB", detail),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<VaultError> for ApiError {
    fn from(fault: VaultError) -> Self {
        // El almacén efímero respalda autenticación: indisponible => fail-closed.
        Self::Internal(fault.to_string())
    }
}

impl From<CryptoError> for ApiError {
    fn from(fault: CryptoError) -> Self {
        match fault {
            CryptoError::TokenExpired => Self::TokenExpired,
            CryptoError::TokenInvalid => Self::AuthFailed,
            CryptoError::HlsTokenExpired => Self::HlsTokenExpired,
            CryptoError::HlsTokenInvalid => Self::HlsTokenInvalid,
            CryptoError::Decryption => Self::Internal("DECRYPT_FAILED".into()),
            CryptoError::KeyNotFound(kid) => Self::Internal(format!("KEY_NOT_FOUND[{}]", kid)),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<MediaClientError> for ApiError {
    fn from(fault: MediaClientError) -> Self {
        match &fault {
            MediaClientError::UpstreamSfu(_) => Self::Upstream("UPSTREAM_SFU", fault.to_string()),
            _ => Self::Upstream("UPSTREAM_MEDIA", fault.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_status_mapping() {
        assert_eq!(ApiError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::LockedOut.status_code(), StatusCode::LOCKED);
        assert_eq!(ApiError::AuditExhausted.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ApiError::RefreshReused.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::RateLimited { reason_code: "RATE_LIMITED_IP", retry_after: Duration::from_secs(30) }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn certify_cross_tenant_masks_as_not_found() {
        // La conversión desde persistencia jamás produce 403 para NotFound.
        let rendered: ApiError = DbError::NotFound.into();
        assert_eq!(rendered.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(rendered.reason_code(), "NOT_FOUND");
    }
}
