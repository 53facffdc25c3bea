// [apps/control-plane/src/handlers/cameras.rs]
/*!
 * =================================================================
 * APARATO: CAMERA HEALTH HANDLER (V3.0 - EFFECTIVE STATUS)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: SUPERFICIE DE SALUD EFECTIVA POR CÁMARA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. PROPAGATION SURFACE: Publica la salud resuelta (sondeo directo +
 *    propagación del NVR propietario) que el monitor persiste.
 * =================================================================
 */

use axum::extract::{Extension, Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::middleware::AuthContext;
use crate::services::health_monitor::effective_camera_status;
use crate::state::AppState;
use panoptes_domain_models::rbac::permissions;

/**
 * Endpoint: GET /api/v1/cameras/{id}/status
 * Salud efectiva: si el NVR propietario está offline, manda la
 * propagación 'nvr_offline'; si no, el último sondeo directo.
 */
#[instrument(skip_all, fields(camera = %camera_id))]
pub async fn handle_camera_status(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Path(camera_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let camera = state
        .authorize_camera_permission(&context, permissions::CAMERA_VIEW, &camera_id)
        .await?;

    let effective = effective_camera_status(&state, &camera).await;

    Ok(Json(json!({
        "camera_id": camera.id,
        "direct_status": camera.direct_status,
        "status": effective.status,
        "reason": effective.reason,
    })).into_response())
}
