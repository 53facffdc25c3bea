// [libs/infra/media-client/src/errors.rs]
/*!
 * =================================================================
 * APARATO: MEDIA CLIENT ERROR CATALOG (V3.0)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN DE FALLOS DE ENLACE MEDIA/SFU
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaClientError {
    /// El plano de medios rechazó o no atendió la llamada gRPC.
    #[error("[L3_MEDIA_FAULT]: UPSTREAM_MEDIA -> {0}")]
    UpstreamMedia(String),

    /// El SFU rechazó o no atendió la llamada HTTP interna.
    #[error("[L3_SFU_FAULT]: UPSTREAM_SFU -> {0}")]
    UpstreamSfu(String),

    /// La llamada superó su ventana de 10 segundos.
    #[error("[L3_MEDIA_FAULT]: CALL_DEADLINE_EXCEEDED")]
    DeadlineExceeded,

    /// La tarea de fondo que portaba la llamada colapsó.
    #[error("[L3_MEDIA_FAULT]: BACKGROUND_TASK_COLLAPSE -> {0}")]
    BackgroundCollapse(String),
}
