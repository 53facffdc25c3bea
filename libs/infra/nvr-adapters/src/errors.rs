// [libs/infra/nvr-adapters/src/errors.rs]
/*!
 * =================================================================
 * APARATO: ADAPTER ERROR CATALOG (V4.0)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN DE FALLOS DE ENLACE CON GRABADORES
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    /// El grabador no respondió dentro de la ventana de 5 segundos.
    #[error("[L3_NVR_FAULT]: PROBE_TIMEOUT -> {0}")]
    Timeout(String),

    /// El grabador rechazó las credenciales presentadas (401/403).
    #[error("[L3_NVR_FAULT]: AUTH_REJECTED")]
    AuthRejected,

    /// Respuesta ilegible o estado HTTP inesperado del fabricante.
    #[error("[L3_NVR_FAULT]: UPSTREAM_MALFUNCTION -> {0}")]
    Upstream(String),

    /// La plantilla RTSP configurada es inexpandible.
    #[error("[L3_NVR_FAULT]: TEMPLATE_VIOLATION -> {0}")]
    TemplateViolation(String),
}

impl AdapterError {
    /// Triage uniforme de fallos reqwest hacia el catálogo.
    pub fn from_network_fault(fault: reqwest::Error) -> Self {
        if fault.is_timeout() {
            return Self::Timeout(fault.to_string());
        }
        Self::Upstream(fault.to_string())
    }
}
