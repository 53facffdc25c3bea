// [apps/control-plane/src/handlers/mod.rs]
/*!
 * =================================================================
 * APARATO: API HANDLER REGISTRY (V12.0)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: SUPERFICIE HTTP COMPLETA DEL PLANO DE CONTROL
 * =================================================================
 */

pub mod audit;
pub mod auth;
pub mod cameras;
pub mod debug;
pub mod hls;
pub mod license;
pub mod live;
pub mod users;
