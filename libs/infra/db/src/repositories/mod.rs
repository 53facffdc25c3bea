// [libs/infra/db/src/repositories/mod.rs]
/*!
 * =================================================================
 * APARATO: REPOSITORY REGISTRY (V12.0 - CONTROL PLANE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: AUTORIDADES DE PERSISTENCIA Y MAPEO COMÚN
 * =================================================================
 */

pub mod audit;
pub mod camera;
pub mod credential;
pub mod nvr;
pub mod rbac;
pub mod refresh_token;
pub mod reset_token;
pub mod tenant;
pub mod user;

pub use audit::AuditRepository;
pub use camera::CameraRepository;
pub use credential::CredentialRepository;
pub use nvr::NvrRepository;
pub use rbac::RbacRepository;
pub use refresh_token::{RefreshTokenRepository, RefreshTokenRow};
pub use reset_token::ResetTokenRepository;
pub use tenant::TenantRepository;
pub use user::UserRepository;

use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::Row;
use uuid::Uuid;

use crate::errors::DbError;

/// Parseo tolerante de marcas temporales (RFC3339 o forma SQLite nativa).
pub(crate) fn parse_timestamp(raw_timestamp: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw_timestamp) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw_timestamp, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

pub(crate) fn extract_datetime(row: &Row, index: i32) -> Option<DateTime<Utc>> {
    row.get::<Option<String>>(index)
        .ok()
        .flatten()
        .and_then(|raw| parse_timestamp(&raw))
}

pub(crate) fn extract_uuid(row: &Row, index: i32) -> Result<Uuid, DbError> {
    let raw_identifier: String = row.get(index)?;
    Uuid::parse_str(&raw_identifier)
        .map_err(|fault| DbError::MappingError(format!("UUID_VIOLATION[{}]: {}", index, fault)))
}

pub(crate) fn extract_optional_uuid(row: &Row, index: i32) -> Option<Uuid> {
    row.get::<Option<String>>(index)
        .ok()
        .flatten()
        .and_then(|raw| Uuid::parse_str(&raw).ok())
}

/// Ligadura nullable explícita para el macro de parámetros.
pub(crate) fn nullable_text(optional_text: Option<String>) -> libsql::Value {
    match optional_text {
        Some(text) => libsql::Value::Text(text),
        None => libsql::Value::Null,
    }
}
