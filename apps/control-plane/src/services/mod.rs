// [apps/control-plane/src/services/mod.rs]
/*!
 * =================================================================
 * APARATO: BACKGROUND SERVICES REGISTRY (V9.0)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: DAEMONS DE LARGA VIDA CON SEÑAL DE PARO EXPLÍCITA
 * =================================================================
 */

pub mod audit_pipeline;
pub mod health_monitor;
pub mod license_sentinel;
pub mod nvr_census;

pub use audit_pipeline::{AuditPipeline, AuditPipelineError, SpoolWriter};
pub use license_sentinel::LicenseSentinel;
