// [apps/control-plane/src/handlers/license.rs]
/*!
 * =================================================================
 * APARATO: LICENSE HANDLER (V7.0 - STATUS & RELOAD)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: SUPERFICIE HTTP DEL CENTINELA DE LICENCIA
 * =================================================================
 */

use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{info, instrument};

use crate::errors::ApiError;
use crate::middleware::AuthContext;
use crate::state::AppState;
use panoptes_domain_models::rbac::permissions;
use panoptes_domain_models::{AuditEvent, AuditResult};

/**
 * Endpoint: GET /api/v1/license/status
 * Todo operador autenticado puede leer el estado efectivo.
 */
#[instrument(skip_all)]
pub async fn handle_license_status(
    State(state): State<AppState>,
    Extension(_context): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    Ok(Json(state.license_sentinel.current_state()).into_response())
}

/**
 * Endpoint: POST /api/v1/license/reload
 * Re-parsea el archivo instalado; exige 'license.manage'.
 */
#[instrument(skip_all)]
pub async fn handle_license_reload(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    state.authorize_tenant_permission(&context, permissions::LICENSE_MANAGE).await?;

    let refreshed_state = state.license_sentinel.reload();

    let reload_evidence = AuditEvent::now("license.reload", if refreshed_state.valid {
        AuditResult::Success
    } else {
        AuditResult::Failure
    })
    .with_tenant(context.tenant_id)
    .with_actor(context.user_id)
    .with_target("license", refreshed_state.reason.clone().unwrap_or_else(|| "VALID".into()));
    let _ = state.audit_pipeline.record(reload_evidence);

    info!("📜 [LICENSE]: Manual reload by [{}]; valid={}.", context.user_id, refreshed_state.valid);
    Ok(Json(refreshed_state).into_response())
}
