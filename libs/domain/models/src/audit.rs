// [libs/domain/models/src/audit.rs]
/*!
 * =================================================================
 * APARATO: AUDIT EVENT CONTRACT (V7.0 - APPEND ONLY)
 * CLASIFICACIÓN: DOMAIN ENTITIES (ESTRATO L2)
 * RESPONSABILIDAD: ESQUEMA ÚNICO DEL RASTRO FORENSE DEL SISTEMA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. WRITE ONCE: Un evento jamás muta tras su emisión. La retención
 *    mínima es de 7 años; ninguna rutina borra filas automáticamente.
 * 2. SPOOL PARITY: La misma forma serde viaja a la base de datos y al
 *    archivo JSONL de contingencia, garantizando replay sin pérdida.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;
use uuid::Uuid;

/// Acciones con emisor centralizado (el resto se nombra en el punto de uso).
pub mod actions {
    pub const PERMISSION_CHECK: &str = "permission.check";
    pub const NVR_DAILY_SYNC: &str = "nvr.channel.daily_sync";
    pub const LICENSE_TRANSITION: &str = "license.state_transition";
    pub const LIVE_CLIENT_EVENT: &str = "live.client_event";
}

/// Veredicto del evento.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditResult {
    Success,
    Failure,
}

impl AuditResult {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }
}

/// Evento de auditoría, inmutable en sentido lógico.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp_utc: DateTime<Utc>,
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub actor_user_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub action: String,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub result: AuditResult,
    pub reason_code: Option<String>,
    pub request_id: Option<String>,
}

impl AuditEvent {
    /// Esqueleto de evento con marca temporal e identificador frescos.
    pub fn now(action: &str, result: AuditResult) -> Self {
        Self {
            timestamp_utc: Utc::now(),
            id: Uuid::new_v4(),
            tenant_id: None,
            actor_user_id: None,
            ip_address: None,
            action: action.to_string(),
            target_type: None,
            target_id: None,
            result,
            reason_code: None,
            request_id: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn with_actor(mut self, actor_user_id: Uuid) -> Self {
        self.actor_user_id = Some(actor_user_id);
        self
    }

    pub fn with_ip(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub fn with_target(mut self, target_type: &str, target_id: impl Into<String>) -> Self {
        self.target_type = Some(target_type.to_string());
        self.target_id = Some(target_id.into());
        self
    }

    pub fn with_reason(mut self, reason_code: &str) -> Self {
        self.reason_code = Some(reason_code.to_string());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_result_wire_rendering() {
        assert_eq!(serde_json::to_string(&AuditResult::Success).unwrap(), "\"SUCCESS\"");
        assert_eq!(serde_json::to_string(&AuditResult::Failure).unwrap(), "\"FAILURE\"");
    }

    #[test]
    fn certify_builder_composition() {
        let tenant = Uuid::new_v4();
        let actor = Uuid::new_v4();

        let event = AuditEvent::now("user.disable", AuditResult::Success)
            .with_tenant(tenant)
            .with_actor(actor)
            .with_ip("10.0.0.9")
            .with_target("user", "some-user-id")
            .with_request_id("req-123");

        assert_eq!(event.tenant_id, Some(tenant));
        assert_eq!(event.actor_user_id, Some(actor));
        assert_eq!(event.target_type.as_deref(), Some("user"));
        assert_eq!(event.request_id.as_deref(), Some("req-123"));

        // Paridad spool: el evento debe sobrevivir un viaje JSONL.
        let line = serde_json::to_string(&event).unwrap();
        let rehydrated: AuditEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(rehydrated.id, event.id);
        assert_eq!(rehydrated.action, "user.disable");
    }
}
