// [apps/control-plane/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CONTROL PLANE LIBRARY ROOT (V14.0)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE MÓDULOS PARA BINARIO Y SUITES
 * =================================================================
 */

pub mod config;
pub mod errors;
pub mod handlers;
pub mod kernel;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub mod prelude {
    pub use crate::config::ControlPlaneConfig;
    pub use crate::errors::ApiError;
    pub use crate::kernel::ControlPlaneKernel;
    pub use crate::routes::create_control_plane_router;
    pub use crate::state::AppState;
}
