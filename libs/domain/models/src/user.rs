// [libs/domain/models/src/user.rs]
/*!
 * =================================================================
 * APARATO: IDENTITY DOMAIN MODELS (V9.0 - SOFT DELETE)
 * CLASIFICACIÓN: DOMAIN ENTITIES (ESTRATO L2)
 * RESPONSABILIDAD: TENANTS, OPERADORES Y PAYLOADS DE GESTIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SOFT DELETE DISCIPLINE: Un operador jamás se destruye físicamente.
 *    'deleted_at' libera el email para reutilización dentro del tenant.
 * 2. HASH OPACITY: El hash de contraseña nunca se serializa hacia el
 *    exterior del proceso.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;
use uuid::Uuid;

/// Raíz de aislamiento absoluto del sistema multi-inquilino.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    /// Dominio de correo que resuelve el login hacia este tenant.
    pub email_domain: String,
    pub created_at: DateTime<Utc>,
}

/// Operador del VMS dentro de un tenant.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub display_name: String,
    /// Forma codificada Argon2id. Opaca hacia el exterior.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Un operador borrado o deshabilitado no posee capacidad de login.
    pub fn is_login_capable(&self) -> bool {
        !self.is_disabled && self.deleted_at.is_none()
    }
}

// --- ESTRATO DE PAYLOADS DE GESTIÓN (API L3) ---

#[typeshare]
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserPayload {
    pub email: String,
    pub display_name: String,
    pub password: String,
}

#[typeshare]
#[derive(Debug, Clone, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
    /// Slug de tenant explícito cuando el dominio de correo es ambiguo.
    pub tenant_hint: Option<String>,
}

#[typeshare]
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteResetPayload {
    pub token: String,
    pub new_password: String,
}
